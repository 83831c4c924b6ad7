use std::path::PathBuf;

use thiserror::Error;

use crate::calls::Linker;

/// Problems with the run configuration. These are raised before any reads are looked at.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("unknown barcode set `{name}`; expected one of: {expected}")]
    UnknownBarcodeSet { name: String, expected: String },

    #[error("could not read barcode file {path:?}: {source}")]
    UnreadableWhitelist { path: PathBuf, source: csv::Error },

    #[error(
        "invalid barcode file {path:?}, line {line}:
    {reason}
please ensure the data directory holds the correct barcode files"
    )]
    MalformedWhitelist {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("barcode file {path:?} lists `{sequence}` more than once")]
    DuplicateWhitelistEntry { path: PathBuf, sequence: String },

    #[error("barcode file {path:?} contains no barcodes")]
    EmptyWhitelist { path: PathBuf },

    #[error(
        "the default tissue position table for {set} was requested but is missing:
    {path:?}
suggestion: pass --tissue-positions <FILE>, or --no-tissue to skip the on/off tissue metric"
    )]
    MissingDefaultTissueTable { set: String, path: PathBuf },

    #[error("could not read tissue position file {path:?}: {source}")]
    UnreadableTissueTable { path: PathBuf, source: csv::Error },

    #[error(
        "invalid tissue position file {path:?}, line {line}:
    {reason}
please ensure you are using the correct tissue_positions file"
    )]
    MalformedTissueTable {
        path: PathBuf,
        line: u64,
        reason: String,
    },

    #[error("could not load thresholds from {path:?}: {reason}")]
    Thresholds { path: PathBuf, reason: String },

    #[error("threshold `{name}` must be {expected}, got {value}")]
    ThresholdOutOfRange {
        name: &'static str,
        expected: &'static str,
        value: f64,
    },

    #[error("the total number of subsampled reads is unknown: pass --{linker_flag}-log or --total-reads")]
    MissingTotalReads { linker_flag: &'static str },

    #[error("`{0}` could not be found in PATH")]
    MissingExecutable(String),

    #[error("input file does not exist: {0:?}")]
    MissingInput(PathBuf),
}

/// Problems with the data produced by the upstream subsampling and extraction steps.
#[derive(Error, Debug)]
pub enum InputIntegrityError {
    #[error("{linker}: could not read barcode calls from {path:?}: {source}")]
    UnreadableCalls {
        linker: Linker,
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(
        "{linker}: the extraction step produced no barcode calls in {path:?}
although {total_reads} reads were subsampled; the extraction step is likely broken"
    )]
    NoCalls {
        linker: Linker,
        path: PathBuf,
        total_reads: u64,
    },

    #[error(
        "{linker}: malformed barcode call on line {line}:
    `{content}`
expected `<BARCODE> <READ NAME>` with a barcode made of A, C, G, T or N"
    )]
    MalformedCall {
        linker: Linker,
        line: usize,
        content: String,
    },

    #[error("{linker}: read `{read_id}` has more than one barcode call (line {line})")]
    DuplicateRead {
        linker: Linker,
        read_id: String,
        line: usize,
    },

    #[error("{linker}: {calls} barcode calls were found but only {total_reads} reads were subsampled")]
    MoreCallsThanReads {
        linker: Linker,
        calls: u64,
        total_reads: u64,
    },

    #[error("{linker}: subsampling produced zero reads, so no QC metric can be computed")]
    NoReads { linker: Linker },

    #[error("{linker}: could not parse extraction log {path:?}: {reason}")]
    MalformedLog {
        linker: Linker,
        path: PathBuf,
        reason: String,
    },

    #[error(
        "no read identifier is shared between L1 ({l1_calls} calls) and L2 ({l2_calls} calls);
the two extraction outputs do not describe the same reads"
    )]
    NoReadOverlap { l1_calls: usize, l2_calls: usize },
}

/// An external tool (subsampler, extractor) could not be run to completion.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("could not start `{program}`: {source}")]
    Spawn {
        program: String,
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}; see {log:?}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
        log: Option<PathBuf>,
    },
}
