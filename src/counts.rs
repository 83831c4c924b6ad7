use indexmap::IndexMap;
use serde::Serialize;

use crate::barcode_set::Whitelist;
use crate::calls::{Linker, LinkerCalls};
use crate::lanes::LaneCount;

/// Number of reads per observed barcode for one linker. Rows are kept sorted by decreasing count,
/// ties broken by sequence, so that every derived table is reproducible.
#[derive(Debug, Clone, PartialEq)]
pub struct CountTable {
    pub linker: Linker,
    counts: IndexMap<String, u64>,
}

impl CountTable {
    pub fn from_calls(calls: &LinkerCalls) -> Self {
        let mut counts: IndexMap<String, u64> = IndexMap::new();
        for rec in calls.records.iter() {
            *counts.entry(rec.barcode.clone()).or_insert(0) += 1;
        }
        Self::from_counts(calls.linker, counts)
    }

    pub fn from_counts(linker: Linker, counts: impl IntoIterator<Item = (String, u64)>) -> Self {
        let mut counts: IndexMap<String, u64> = counts.into_iter().collect();
        counts.sort_by(|a_seq, a_n, b_seq, b_n| b_n.cmp(a_n).then_with(|| a_seq.cmp(b_seq)));
        CountTable { linker, counts }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(k, v)| (k.as_str(), *v))
    }

    #[cfg(test)]
    pub fn get(&self, barcode: &str) -> Option<u64> {
        self.counts.get(barcode).copied()
    }

    /// Number of distinct barcodes observed.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Number of reads with a call, i.e. the sum over all barcodes.
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }
}

/// A row of the per-linker count table artifact.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CountRow {
    pub barcode: String,
    pub count: u64,
    pub frac_count: f64,
    pub cumulative_sum: f64,
    pub whitelisted: bool,
    pub lane: Option<u32>,
}

/// The count table split into whitelisted and non-whitelisted barcodes, with the summary figures
/// reported for each linker.
#[derive(Debug, Clone)]
pub struct WhitelistReport {
    pub linker: Linker,
    pub rows: Vec<CountRow>,
    pub total_reads: u64,
    pub whitelisted_reads: u64,
    /// distinct whitelisted barcodes that were observed
    pub whitelisted_observed: usize,
    pub whitelist_size: usize,
    /// barcodes carrying the first 90% of reads
    pub num_to_ninety: usize,
    pub top50_fraction: f64,
    pub top96_fraction: f64,
}

impl WhitelistReport {
    /// Classifies every observed barcode by exact match against the whitelist. No barcode is
    /// dropped: each row is either whitelisted or flagged as not.
    pub fn classify(table: &CountTable, whitelist: &Whitelist) -> Self {
        let total_reads = table.total();
        let mut cumulative = 0u64;
        let mut whitelisted_reads = 0u64;

        let rows: Vec<CountRow> = table
            .iter()
            .map(|(barcode, count)| {
                cumulative += count;
                let lane = whitelist.lane(barcode);
                if lane.is_some() {
                    whitelisted_reads += count;
                }
                CountRow {
                    barcode: barcode.to_string(),
                    count,
                    frac_count: fraction(count, total_reads),
                    cumulative_sum: fraction(cumulative, total_reads),
                    whitelisted: lane.is_some(),
                    lane,
                }
            })
            .collect();

        let top_fraction = |n: usize| fraction(rows.iter().take(n).map(|r| r.count).sum(), total_reads);

        WhitelistReport {
            linker: table.linker,
            whitelisted_observed: rows.iter().filter(|r| r.whitelisted).count(),
            whitelist_size: whitelist.len(),
            num_to_ninety: rows.iter().filter(|r| r.cumulative_sum <= 0.9).count(),
            top50_fraction: top_fraction(50),
            top96_fraction: top_fraction(96),
            rows,
            total_reads,
            whitelisted_reads,
        }
    }

    pub fn whitelisted_fraction(&self) -> f64 {
        fraction(self.whitelisted_reads, self.total_reads)
    }

    /// Share of reads whose barcode is not in the whitelist.
    pub fn mismatch_rate(&self) -> f64 {
        1.0 - self.whitelisted_fraction()
    }

    pub fn non_whitelisted(&self) -> impl Iterator<Item = &CountRow> {
        self.rows.iter().filter(|r| !r.whitelisted)
    }

    /// The observed lane population handed to the lane anomaly detector.
    pub fn lane_counts(&self) -> Vec<LaneCount> {
        self.rows
            .iter()
            .filter_map(|r| {
                r.lane.map(|lane| LaneCount {
                    barcode: r.barcode.clone(),
                    lane,
                    count: r.count,
                })
            })
            .collect()
    }
}

fn fraction(n: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        n as f64 / total as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use std::path::Path;

    fn whitelist() -> Whitelist {
        Whitelist::from_text(
            "sequence,row,col\nAAAAAAAA,0,0\nCCCCCCCC,1,1\nGGGGGGGG,2,2\n",
            Path::new("wl"),
            Linker::L1,
        )
        .unwrap()
    }

    #[test]
    fn counts_sum_to_calls() {
        let calls = testutil::calls(
            Linker::L1,
            &[("r1", "AAAAAAAA"), ("r2", "CCCCCCCC"), ("r3", "AAAAAAAA"), ("r4", "TTTTTTTT")],
            6,
        );
        let table = CountTable::from_calls(&calls);
        assert_eq!(table.total(), calls.call_count());
        assert_eq!(table.len(), 3);
        assert_eq!(table.get("AAAAAAAA"), Some(2));
        assert_eq!(table.iter().next(), Some(("AAAAAAAA", 2)));
    }

    #[test]
    fn ordering_is_count_then_sequence() {
        let table = CountTable::from_counts(
            Linker::L2,
            [("GGGGGGGG".to_string(), 3), ("CCCCCCCC".to_string(), 5), ("AAAAAAAA".to_string(), 3)],
        );
        let order: Vec<&str> = table.iter().map(|(b, _)| b).collect();
        assert_eq!(order, ["CCCCCCCC", "AAAAAAAA", "GGGGGGGG"]);
    }

    #[test]
    fn classifies_every_barcode() {
        let table = CountTable::from_counts(
            Linker::L1,
            [
                ("AAAAAAAA".to_string(), 6),
                ("CCCCCCCC".to_string(), 2),
                ("TTTTTTTT".to_string(), 1),
                ("ACACACAC".to_string(), 1),
            ],
        );
        let report = WhitelistReport::classify(&table, &whitelist());

        assert_eq!(report.rows.len(), table.len());
        assert_eq!(report.total_reads, 10);
        assert_eq!(report.whitelisted_reads, 8);
        assert!((report.mismatch_rate() - 0.2).abs() < 1e-12);
        assert_eq!(report.whitelisted_observed, 2);
        assert_eq!(report.whitelist_size, 3);

        let missing: Vec<&str> = report.non_whitelisted().map(|r| r.barcode.as_str()).collect();
        assert_eq!(missing, ["ACACACAC", "TTTTTTTT"]);

        let last = report.rows.last().unwrap();
        assert!((last.cumulative_sum - 1.0).abs() < 1e-12);
        // 0.6, 0.8 are within 90%; 0.9 is too (inclusive)
        assert_eq!(report.num_to_ninety, 3);
        assert_eq!(report.top50_fraction, 1.0);

        let lanes = report.lane_counts();
        assert_eq!(lanes.len(), 2);
        assert_eq!(lanes[1].lane, 1);
    }
}
