use std::path::PathBuf;

use serde::Serialize;

use crate::barcode_set::BarcodeSetId;
use crate::config::RunConfig;
use crate::onoff::OnOffMetric;
use crate::pipeline::{LinkerInput, LinkerSummary, QcOutcome};
use crate::status::{Status, StatusTable, Thresholds};
use crate::tissue::TissueSource;

/// Inputs recorded in the run summary.
#[derive(Serialize, Debug, Clone, Default)]
pub struct RunInputs {
    /// the read file the run was subsampled from, when the full pipeline ran
    pub r2: Option<PathBuf>,
    pub raw_reads: Option<u64>,
    pub sample_reads: Option<u64>,
    pub seed: Option<u64>,
    pub linkers: Vec<LinkerInput>,
    pub tissue_positions: Option<PathBuf>,
}

/// Contents of `qc_summary.json`.
#[derive(Serialize, Debug)]
pub struct RunSummary<'a> {
    pub version: &'static str,
    pub timestamp: String,
    pub sample_name: &'a str,
    pub barcode_set: BarcodeSetId,
    pub tissue: &'a TissueSource,
    pub inputs: RunInputs,
    pub thresholds: &'a Thresholds,
    pub spatial_reads: usize,
    pub overall: Status,
    pub qc: &'a StatusTable,
    pub linkers: Vec<LinkerSummary>,
    pub on_off: Option<Vec<OnOffMetric>>,
}

impl<'a> RunSummary<'a> {
    pub fn new(config: &'a RunConfig, inputs: RunInputs, outcome: &'a QcOutcome) -> Self {
        RunSummary {
            version: crate::cli::VERSION,
            timestamp: chrono::Local::now().to_rfc3339(),
            sample_name: &config.sample_name,
            barcode_set: config.barcode_set,
            tissue: &config.tissue,
            inputs,
            thresholds: &config.thresholds,
            spatial_reads: outcome.spatial.len(),
            overall: outcome.status.overall(),
            qc: &outcome.status,
            linkers: outcome.linkers.iter().map(|l| l.summary()).collect(),
            on_off: outcome.tissue.as_ref().map(|t| t.summary()),
        }
    }
}

/// Prints the verdict to stdout at the end of a run.
pub fn print_status(sample_name: &str, status: &StatusTable) {
    println!();
    println!("QC summary for {sample_name}");
    println!("{status}");
    for caution in status.cautions() {
        warn!(
            "CAUTION: {} = {:.4} (threshold {})",
            caution.metric, caution.value, caution.threshold
        );
    }
}
