use std::collections::HashSet;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use regex::Regex;
use serde::Serialize;

use crate::errors::InputIntegrityError;

/// The two fixed linker sequences flanking the spatial barcodes. L1 precedes barcode A and
/// L2 precedes barcode B.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Linker {
    L1,
    L2,
}

impl Linker {
    pub const BOTH: [Linker; 2] = [Linker::L1, Linker::L2];

    pub fn label(&self) -> &'static str {
        match self {
            Linker::L1 => "L1",
            Linker::L2 => "L2",
        }
    }

    /// Wildcard adapter pattern handed to the extraction tool; the leading `N`s capture the
    /// barcode.
    pub fn pattern(&self) -> &'static str {
        match self {
            Linker::L1 => "NNNNNNNNGTGGCCGATGTTTCGCATCGGCGTACGACT",
            Linker::L2 => "NNNNNNNNATCCACGTGCTTGAGAGGCCAGAGCATTCG",
        }
    }
}

impl fmt::Display for Linker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One read with a barcode call for one linker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkerCallRecord {
    pub read_id: String,
    pub barcode: String,
    pub linker: Linker,
}

/// All barcode calls made for one linker, together with the number of reads that were offered
/// to the extraction step. Reads without a call are not stored; they are the difference between
/// `total_reads` and the number of records.
#[derive(Debug, Clone)]
pub struct LinkerCalls {
    pub linker: Linker,
    pub records: Vec<LinkerCallRecord>,
    pub total_reads: u64,
}

impl LinkerCalls {
    /// Validates a set of calls.
    ///
    /// # Errors
    ///
    /// * `NoReads` if `total_reads` is zero. This is reported separately from an empty call set
    ///   because it points at the subsampling step rather than the extraction step.
    /// * `NoCalls` if reads were subsampled but not a single call was made.
    /// * `MoreCallsThanReads` if there are more calls than subsampled reads.
    /// * `DuplicateRead` if a read identifier occurs twice.
    pub fn from_records(
        linker: Linker,
        records: Vec<LinkerCallRecord>,
        total_reads: u64,
        origin: &Path,
    ) -> Result<Self, InputIntegrityError> {
        if total_reads == 0 {
            return Err(InputIntegrityError::NoReads { linker });
        }
        if records.is_empty() {
            return Err(InputIntegrityError::NoCalls {
                linker,
                path: origin.to_path_buf(),
                total_reads,
            });
        }
        if records.len() as u64 > total_reads {
            return Err(InputIntegrityError::MoreCallsThanReads {
                linker,
                calls: records.len() as u64,
                total_reads,
            });
        }

        let mut seen = HashSet::with_capacity(records.len());
        for (i, rec) in records.iter().enumerate() {
            if !seen.insert(rec.read_id.as_str()) {
                return Err(InputIntegrityError::DuplicateRead {
                    linker,
                    read_id: rec.read_id.clone(),
                    line: i + 1,
                });
            }
        }

        Ok(LinkerCalls {
            linker,
            records,
            total_reads,
        })
    }

    /// Parses the wildcard file written by the extraction tool. Every non-blank line has the
    /// form `<BARCODE> <READ NAME> [COMMENT...]`; the read identifier is the first word of the
    /// read name. A line with an empty barcode column (a linker match that covered none of the
    /// barcode positions) is a read without a call.
    pub fn from_reader<R: BufRead>(
        reader: R,
        linker: Linker,
        total_reads: u64,
        origin: &Path,
    ) -> Result<Self, InputIntegrityError> {
        let barcode_re = Regex::new(r"^[ACGTN]+$").expect("static regex");
        let mut records = Vec::new();
        let mut empty_barcodes = 0u64;

        for (i, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| InputIntegrityError::UnreadableCalls {
                linker,
                path: origin.to_path_buf(),
                source: e,
            })?;
            if line.trim().is_empty() {
                continue;
            }
            if line.starts_with(char::is_whitespace) {
                empty_barcodes += 1;
                continue;
            }

            let mut fields = line.split_whitespace();
            let (Some(barcode), Some(read_name)) = (fields.next(), fields.next()) else {
                return Err(InputIntegrityError::MalformedCall {
                    linker,
                    line: i + 1,
                    content: line.clone(),
                });
            };
            if !barcode_re.is_match(barcode) {
                return Err(InputIntegrityError::MalformedCall {
                    linker,
                    line: i + 1,
                    content: line.clone(),
                });
            }

            records.push(LinkerCallRecord {
                read_id: read_name.trim_start_matches('@').to_string(),
                barcode: barcode.to_string(),
                linker,
            });
        }

        if empty_barcodes > 0 {
            debug!("{linker}: {empty_barcodes} reads matched the linker with an empty barcode");
        }

        Self::from_records(linker, records, total_reads, origin)
    }

    pub fn from_path(
        path: &Path,
        linker: Linker,
        total_reads: u64,
    ) -> Result<Self, InputIntegrityError> {
        let file = File::open(path).map_err(|e| InputIntegrityError::UnreadableCalls {
            linker,
            path: path.to_path_buf(),
            source: e,
        })?;
        let calls = Self::from_reader(BufReader::new(file), linker, total_reads, path)?;
        debug!(
            "{linker}: {} calls from {} reads in {}",
            calls.call_count(),
            total_reads,
            path.display()
        );
        Ok(calls)
    }

    pub fn call_count(&self) -> u64 {
        self.records.len() as u64
    }

    /// Reads for which the linker could not be found.
    pub fn failed_reads(&self) -> u64 {
        self.total_reads - self.call_count()
    }

    /// Fraction of subsampled reads that produced a call for this linker.
    pub fn conservation_rate(&self) -> f64 {
        self.call_count() as f64 / self.total_reads as f64
    }
}

/// The read totals reported in an extraction log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractionLog {
    pub total_reads: u64,
    pub reads_with_adapters: u64,
}

impl ExtractionLog {
    pub fn parse(text: &str, linker: Linker, origin: &Path) -> Result<Self, InputIntegrityError> {
        let malformed = |reason: &str| InputIntegrityError::MalformedLog {
            linker,
            path: origin.to_path_buf(),
            reason: reason.to_string(),
        };

        let find = |pattern: &str| -> Option<u64> {
            let re = Regex::new(pattern).expect("static regex");
            let caps = re.captures(text)?;
            caps[1].replace(',', "").parse().ok()
        };

        let total_reads = find(r"Total reads processed:\s*([\d,]+)")
            .ok_or_else(|| malformed("`Total reads processed` not found"))?;
        let reads_with_adapters = find(r"Reads with adapters:\s*([\d,]+)")
            .ok_or_else(|| malformed("`Reads with adapters` not found"))?;

        Ok(ExtractionLog {
            total_reads,
            reads_with_adapters,
        })
    }

    pub fn from_path(path: &Path, linker: Linker) -> Result<Self, InputIntegrityError> {
        let text = std::fs::read_to_string(path).map_err(|e| InputIntegrityError::MalformedLog {
            linker,
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::parse(&text, linker, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn parse(text: &str, total: u64) -> Result<LinkerCalls, InputIntegrityError> {
        LinkerCalls::from_reader(Cursor::new(text), Linker::L1, total, Path::new("wc.txt"))
    }

    #[test]
    fn parses_wildcard_lines() {
        let calls = parse(
            "ACGTACGT read1 1:N:0:1\nTTTTAAAA @read2\n\nNNNNACGT read3\n",
            4,
        )
        .unwrap();
        assert_eq!(calls.call_count(), 3);
        assert_eq!(calls.records[1].read_id, "read2");
        assert_eq!(calls.records[2].barcode, "NNNNACGT");
        assert_eq!(calls.failed_reads(), 1);
        assert_eq!(calls.conservation_rate(), 0.75);
    }

    #[test]
    fn conservation_is_one_only_when_every_read_is_called() {
        let calls = parse("AAAAAAAA r1\nCCCCCCCC r2\n", 2).unwrap();
        assert_eq!(calls.conservation_rate(), 1.0);

        let calls = parse("AAAAAAAA r1\nCCCCCCCC r2\n", 3).unwrap();
        assert!(calls.conservation_rate() < 1.0 && calls.conservation_rate() > 0.0);
    }

    #[test]
    fn empty_output_is_not_zero_conservation() {
        assert!(matches!(parse("", 100), Err(InputIntegrityError::NoCalls { .. })));
        assert!(matches!(parse("\n\n", 100), Err(InputIntegrityError::NoCalls { .. })));
    }

    #[test]
    fn zero_subsampled_reads_is_reported_separately() {
        assert!(matches!(parse("", 0), Err(InputIntegrityError::NoReads { .. })));
    }

    #[test]
    fn rejects_malformed_lines() {
        let err = parse("ACGTACGT r1\nnot-a-barcode r2\n", 10).unwrap_err();
        assert!(matches!(err, InputIntegrityError::MalformedCall { line: 2, .. }));

        let err = parse("ACGTACGT\n", 10).unwrap_err();
        assert!(matches!(err, InputIntegrityError::MalformedCall { line: 1, .. }));
    }

    #[test]
    fn empty_barcode_column_is_no_call() {
        let mut text: String = (0..999).map(|i| format!("ACGTACGT read{i} 2:N:0:1\n")).collect();
        text.push_str(" read999 2:N:0:1\n");

        let calls = parse(&text, 1000).unwrap();
        assert_eq!(calls.call_count(), 999);
        assert_eq!(calls.failed_reads(), 1);
        assert!(calls.records.iter().all(|r| r.barcode == "ACGTACGT"));

        // only empty-barcode lines: still no calls at all
        assert!(matches!(parse(" r1 x\n r2 y\n", 10), Err(InputIntegrityError::NoCalls { .. })));
    }

    #[test]
    fn rejects_duplicates_and_overcounting() {
        let err = parse("AAAAAAAA r1\nCCCCCCCC r1\n", 10).unwrap_err();
        assert!(matches!(err, InputIntegrityError::DuplicateRead { line: 2, .. }));

        let err = parse("AAAAAAAA r1\nCCCCCCCC r2\n", 1).unwrap_err();
        assert!(matches!(err, InputIntegrityError::MoreCallsThanReads { .. }));
    }

    #[test]
    fn missing_file_names_the_linker() {
        let err = LinkerCalls::from_path(Path::new("/no/such/wc.txt"), Linker::L2, 10).unwrap_err();
        assert!(err.to_string().starts_with("L2:"));
    }

    #[test]
    fn parses_extraction_log() {
        let text = "This is cutadapt 4.4\n\n=== Summary ===\n\n\
                    Total reads processed:               1,000,000\n\
                    Reads with adapters:                   952,113 (95.2%)\n";
        let log = ExtractionLog::parse(text, Linker::L1, Path::new("l1.log")).unwrap();
        assert_eq!(log.total_reads, 1_000_000);
        assert_eq!(log.reads_with_adapters, 952_113);

        let err = ExtractionLog::parse("nothing here", Linker::L1, Path::new("l1.log"));
        assert!(matches!(err, Err(InputIntegrityError::MalformedLog { .. })));
    }
}
