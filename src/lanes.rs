use itertools::Itertools;
use serde::Serialize;

use crate::calls::Linker;

/// Consistency constant turning the median absolute deviation into an estimate of the standard
/// deviation for normally distributed counts.
const MAD_SCALE: f64 = 1.4826;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum LaneFlag {
    Normal,
    High,
    Low,
}

/// Read count for one whitelisted barcode and the lane it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaneCount {
    pub barcode: String,
    pub lane: u32,
    pub count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LaneParams {
    /// multiplier applied to the spread to obtain the normal interval
    pub k: f64,
    /// lower bound of the spread as a fraction of the median
    pub min_relative_spread: f64,
}

/// A row of the anomalous lane table.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LaneRow {
    pub barcode: String,
    pub lane: u32,
    pub count: u64,
    pub flag: LaneFlag,
}

#[derive(Debug, Clone)]
pub struct LaneReport {
    pub linker: Linker,
    pub median: f64,
    pub spread: f64,
    pub lower: f64,
    pub upper: f64,
    /// one row per lane barcode, ordered by lane
    pub rows: Vec<LaneRow>,
}

impl LaneReport {
    /// Flags barcodes whose count falls outside `median ± k·spread`. The spread is the scaled
    /// median absolute deviation, floored at `min_relative_spread · median`. Counts exactly on a
    /// bound are normal.
    pub fn detect(linker: Linker, counts: &[LaneCount], params: &LaneParams) -> Self {
        let values: Vec<f64> = counts.iter().map(|c| c.count as f64).collect();
        let med = median(&values);
        let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
        let mad = median(&deviations);
        let spread = (MAD_SCALE * mad).max(params.min_relative_spread * med);

        let lower = med - params.k * spread;
        let upper = med + params.k * spread;

        let rows = counts
            .iter()
            .map(|c| {
                let v = c.count as f64;
                let flag = if v > upper {
                    LaneFlag::High
                } else if v < lower {
                    LaneFlag::Low
                } else {
                    LaneFlag::Normal
                };
                LaneRow {
                    barcode: c.barcode.clone(),
                    lane: c.lane,
                    count: c.count,
                    flag,
                }
            })
            .sorted_by(|a, b| a.lane.cmp(&b.lane).then_with(|| a.barcode.cmp(&b.barcode)))
            .collect();

        LaneReport {
            linker,
            median: med,
            spread,
            lower,
            upper,
            rows,
        }
    }

    pub fn high_count(&self) -> usize {
        self.rows.iter().filter(|r| r.flag == LaneFlag::High).count()
    }

    pub fn low_count(&self) -> usize {
        self.rows.iter().filter(|r| r.flag == LaneFlag::Low).count()
    }

    /// Fraction of lane barcodes flagged HIGH or LOW. Undefined (NaN) when no whitelisted
    /// barcode was observed.
    pub fn flagged_fraction(&self) -> f64 {
        if self.rows.is_empty() {
            return f64::NAN;
        }
        (self.high_count() + self.low_count()) as f64 / self.rows.len() as f64
    }

    /// The anomalous lanes, or `None` when every lane is normal. `None` is a result in its own
    /// right: no anomaly table is written for that linker.
    pub fn anomalies(&self) -> Option<Vec<&LaneRow>> {
        let flagged: Vec<&LaneRow> = self
            .rows
            .iter()
            .filter(|r| r.flag != LaneFlag::Normal)
            .collect();
        if flagged.is_empty() {
            None
        } else {
            Some(flagged)
        }
    }

    /// Pairs of neighbouring lanes that are both flagged. Adjacent anomalies usually point at a
    /// physical channel defect rather than a single bad barcode.
    pub fn adjacent_flagged_lanes(&self) -> Vec<(u32, u32)> {
        self.rows
            .iter()
            .filter(|r| r.flag != LaneFlag::Normal)
            .map(|r| r.lane)
            .sorted()
            .dedup()
            .tuple_windows()
            .filter(|(a, b)| b - a == 1)
            .collect()
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sorted: Vec<f64> = values.iter().copied().sorted_by(|a, b| a.total_cmp(b)).collect();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
