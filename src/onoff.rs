use std::collections::BTreeMap;

use serde::Serialize;

use crate::spatial::SpatialTable;

/// Read count at one observed barcode pair.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SpotRow {
    pub barcode_a: String,
    pub barcode_b: String,
    pub row: Option<u32>,
    pub col: Option<u32>,
    pub on_tissue: bool,
    pub count: u64,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct OnOffMetric {
    pub metric: &'static str,
    pub value: f64,
}

/// On/off tissue classification of a run.
#[derive(Debug, Clone)]
pub struct TissueReport {
    /// one row per observed barcode pair, sorted by pair
    pub spots: Vec<SpotRow>,
    pub total_reads: u64,
    pub reads_on: u64,
    pub reads_off: u64,
    /// reads whose pair is absent from the tissue table (these are also counted in `reads_off`)
    pub reads_unmatched: u64,
}

impl TissueReport {
    /// Partitions the spatial table into on and off tissue. Returns `None` when the table was
    /// built without tissue positions; the on/off metric is then absent rather than zero.
    pub fn classify(table: &SpatialTable) -> Option<Self> {
        if !table.tissue_applied {
            return None;
        }

        let mut spots: BTreeMap<(&str, &str), SpotRow> = BTreeMap::new();
        let mut report = TissueReport {
            spots: Vec::new(),
            total_reads: 0,
            reads_on: 0,
            reads_off: 0,
            reads_unmatched: 0,
        };

        for row in table.rows.iter() {
            let on_tissue = row.on_tissue.unwrap_or(false);
            report.total_reads += 1;
            if on_tissue {
                report.reads_on += 1;
            } else {
                report.reads_off += 1;
            }
            if row.row.is_none() {
                report.reads_unmatched += 1;
            }

            spots
                .entry((row.barcode_a.as_str(), row.barcode_b.as_str()))
                .and_modify(|s| s.count += 1)
                .or_insert_with(|| SpotRow {
                    barcode_a: row.barcode_a.clone(),
                    barcode_b: row.barcode_b.clone(),
                    row: row.row,
                    col: row.col,
                    on_tissue,
                    count: 1,
                });
        }

        report.spots = spots.into_values().collect();
        Some(report)
    }

    /// Fraction of reads with both barcodes that land on tissue.
    pub fn on_tissue_ratio(&self) -> f64 {
        ratio(self.reads_on, self.total_reads)
    }

    /// Pixel level summary over the spots present in the tissue table, plus the unmatched reads.
    pub fn summary(&self) -> Vec<OnOffMetric> {
        let matched = self.spots.iter().filter(|s| s.row.is_some());
        let (on, off): (Vec<&SpotRow>, Vec<&SpotRow>) = matched.partition(|s| s.on_tissue);

        let counts_on: u64 = on.iter().map(|s| s.count).sum();
        let counts_off: u64 = off.iter().map(|s| s.count).sum();
        let per_pix_on = ratio(counts_on, on.len() as u64);
        let per_pix_off = ratio(counts_off, off.len() as u64);
        let frac_per_pix_off_on = if per_pix_on > 0.0 { per_pix_off / per_pix_on } else { 0.0 };

        vec![
            OnOffMetric { metric: "total_pix", value: (on.len() + off.len()) as f64 },
            OnOffMetric { metric: "total_on", value: on.len() as f64 },
            OnOffMetric { metric: "total_off", value: off.len() as f64 },
            OnOffMetric { metric: "counts_on", value: counts_on as f64 },
            OnOffMetric { metric: "counts_off", value: counts_off as f64 },
            OnOffMetric { metric: "ratio_off_on", value: ratio(counts_off, counts_on) },
            OnOffMetric { metric: "counts_per_pix_on", value: per_pix_on },
            OnOffMetric { metric: "counts_per_pix_off", value: per_pix_off },
            OnOffMetric { metric: "frac_per_pix_off_on", value: frac_per_pix_off_on },
            OnOffMetric { metric: "counts_unmatched", value: self.reads_unmatched as f64 },
            OnOffMetric { metric: "on_tissue_ratio", value: self.on_tissue_ratio() },
        ]
    }
}

fn ratio(n: u64, d: u64) -> f64 {
    if d == 0 {
        0.0
    } else {
        n as f64 / d as f64
    }
}
