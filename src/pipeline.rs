use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::barcode_set::{BarcodeSet, Whitelist};
use crate::calls::{ExtractionLog, Linker, LinkerCalls};
use crate::config::RunConfig;
use crate::counts::{CountTable, WhitelistReport};
use crate::errors::{ConfigError, InputIntegrityError};
use crate::lanes::{LaneParams, LaneReport};
use crate::onoff::TissueReport;
use crate::output::{self, ArtifactWriter};
use crate::spatial::SpatialTable;
use crate::status::{MetricName, StatusTable, Thresholds};
use crate::summary::{RunInputs, RunSummary};
use crate::tissue::TissuePositions;

/// Where the barcode calls for one linker come from, and how the number of subsampled reads is
/// known.
#[derive(Serialize, Debug, Clone)]
pub struct LinkerInput {
    pub linker: Linker,
    pub calls: PathBuf,
    pub log: Option<PathBuf>,
}

impl LinkerInput {
    /// Loads the calls. The read total comes from the extraction log when there is one, and
    /// from `total_reads` otherwise.
    pub fn load(&self, total_reads: Option<u64>) -> Result<LinkerCalls> {
        let linker = self.linker;
        let (total, log) = match (&self.log, total_reads) {
            (Some(path), _) => {
                let log = ExtractionLog::from_path(path, linker)?;
                (log.total_reads, Some(log))
            }
            (None, Some(total)) => (total, None),
            (None, None) => {
                let linker_flag = match linker {
                    Linker::L1 => "l1",
                    Linker::L2 => "l2",
                };
                return Err(ConfigError::MissingTotalReads { linker_flag }.into());
            }
        };

        let calls = LinkerCalls::from_path(&self.calls, linker, total)?;
        debug!("{linker}: {} reads without a call", calls.failed_reads());

        if let Some(log) = log {
            if log.reads_with_adapters != calls.call_count() {
                warn!(
                    "{linker}: the extraction log reports {} reads with adapters but {} calls were loaded",
                    log.reads_with_adapters,
                    calls.call_count()
                );
            }
        }
        Ok(calls)
    }
}

/// Per-linker figures written to `linker_metrics.csv` and the run summary.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LinkerSummary {
    pub linker: Linker,
    pub total_reads: u64,
    pub reads_with_call: u64,
    pub conservation: f64,
    pub unique_barcodes: usize,
    pub num_to_ninety: usize,
    pub whitelisted_observed: usize,
    pub whitelist_size: usize,
    pub whitelisted_fraction: f64,
    pub non_whitelisted_barcodes: usize,
    pub top50_fraction: f64,
    pub top96_fraction: f64,
    pub lane_median: f64,
    pub lane_spread: f64,
    pub lane_lower: f64,
    pub lane_upper: f64,
    pub lanes_high: usize,
    pub lanes_low: usize,
    pub lane_anomaly_fraction: f64,
}

/// Everything computed for a single linker. Two of these are built independently and only meet
/// again in the status table.
#[derive(Debug, Clone)]
pub struct LinkerAnalysis {
    pub linker: Linker,
    pub total_reads: u64,
    pub reads_with_call: u64,
    pub conservation: f64,
    pub counts: CountTable,
    pub whitelist: WhitelistReport,
    pub lanes: LaneReport,
}

impl LinkerAnalysis {
    pub fn run(calls: &LinkerCalls, whitelist: &Whitelist, params: &LaneParams) -> Self {
        let counts = CountTable::from_calls(calls);
        let report = WhitelistReport::classify(&counts, whitelist);
        let lanes = LaneReport::detect(calls.linker, &report.lane_counts(), params);
        debug_assert_eq!(report.linker, calls.linker);
        debug_assert_eq!(lanes.linker, calls.linker);

        let analysis = LinkerAnalysis {
            linker: calls.linker,
            total_reads: calls.total_reads,
            reads_with_call: calls.call_count(),
            conservation: calls.conservation_rate(),
            counts,
            whitelist: report,
            lanes,
        };
        analysis.log_details();
        analysis
    }

    pub fn metrics(&self) -> [(MetricName, f64); 3] {
        [
            (MetricName::LinkerConservation(self.linker), self.conservation),
            (MetricName::WhitelistMismatch(self.linker), self.whitelist.mismatch_rate()),
            (MetricName::LaneAnomalies(self.linker), self.lanes.flagged_fraction()),
        ]
    }

    pub fn summary(&self) -> LinkerSummary {
        LinkerSummary {
            linker: self.linker,
            total_reads: self.total_reads,
            reads_with_call: self.reads_with_call,
            conservation: self.conservation,
            unique_barcodes: self.counts.len(),
            num_to_ninety: self.whitelist.num_to_ninety,
            whitelisted_observed: self.whitelist.whitelisted_observed,
            whitelist_size: self.whitelist.whitelist_size,
            whitelisted_fraction: self.whitelist.whitelisted_fraction(),
            non_whitelisted_barcodes: self.whitelist.non_whitelisted().count(),
            top50_fraction: self.whitelist.top50_fraction,
            top96_fraction: self.whitelist.top96_fraction,
            lane_median: self.lanes.median,
            lane_spread: self.lanes.spread,
            lane_lower: self.lanes.lower,
            lane_upper: self.lanes.upper,
            lanes_high: self.lanes.high_count(),
            lanes_low: self.lanes.low_count(),
            lane_anomaly_fraction: self.lanes.flagged_fraction(),
        }
    }

    fn log_details(&self) {
        let l = self.linker;
        let w = &self.whitelist;
        debug!("{l}: total reads: {}", self.total_reads);
        debug!("{l}: reads with a call: {}", self.reads_with_call);
        debug!("{l}: unique barcodes: {}", self.counts.len());
        debug!("{l}: barcodes carrying 90% of reads: {}", w.num_to_ninety);
        debug!(
            "{l}: whitelisted barcodes observed: {} of {}",
            w.whitelisted_observed, w.whitelist_size
        );
        debug!("{l}: reads from whitelisted barcodes: {:.4}", w.whitelisted_fraction());
        debug!("{l}: reads in top 50 barcodes: {:.4}", w.top50_fraction);
        debug!("{l}: reads in top 96 barcodes: {:.4}", w.top96_fraction);

        let lanes = self.lanes.rows.len();
        if lanes == 0 {
            debug!("{l}: HIGH lanes: N/A");
            debug!("{l}: LOW lanes: N/A");
        } else {
            debug!(
                "{l}: normal lane counts: [{:.1}, {:.1}]",
                self.lanes.lower, self.lanes.upper
            );
            let high = self.lanes.high_count();
            let low = self.lanes.low_count();
            debug!("{l}: HIGH lanes: {high} ({:.4})", high as f64 / lanes as f64);
            debug!("{l}: LOW lanes: {low} ({:.4})", low as f64 / lanes as f64);
        }

        for (a, b) in self.lanes.adjacent_flagged_lanes() {
            warn!("{l}: neighbouring lanes {a} and {b} are both flagged");
        }
    }
}

/// The complete result of the QC engine for one run.
#[derive(Debug, Clone)]
pub struct QcOutcome {
    pub spatial: SpatialTable,
    pub linkers: [LinkerAnalysis; 2],
    pub tissue: Option<TissueReport>,
    pub status: StatusTable,
}

impl QcOutcome {
    #[cfg(test)]
    pub fn linker(&self, linker: Linker) -> &LinkerAnalysis {
        match linker {
            Linker::L1 => &self.linkers[0],
            Linker::L2 => &self.linkers[1],
        }
    }
}

/// Runs the QC engine over loaded calls. Nothing here touches the filesystem.
pub fn evaluate(
    set: &BarcodeSet,
    l1: &LinkerCalls,
    l2: &LinkerCalls,
    tissue: Option<&TissuePositions>,
    thresholds: &Thresholds,
) -> Result<QcOutcome, InputIntegrityError> {
    let spatial = SpatialTable::build(l1, l2, tissue)?;

    let params = thresholds.lane_params();
    let (a, b) = rayon::join(
        || LinkerAnalysis::run(l1, set.whitelist(Linker::L1), &params),
        || LinkerAnalysis::run(l2, set.whitelist(Linker::L2), &params),
    );

    let tissue = TissueReport::classify(&spatial);
    match &tissue {
        Some(t) => info!(
            "On tissue: {} of {} reads ({:.4})",
            t.reads_on,
            t.total_reads,
            t.on_tissue_ratio()
        ),
        None => info!("No tissue positions; the on/off tissue metric is skipped"),
    }

    let values = a
        .metrics()
        .into_iter()
        .chain(b.metrics())
        .chain(tissue.as_ref().map(|t| (MetricName::OnTissueRatio, t.on_tissue_ratio())));
    let status = StatusTable::aggregate(values, thresholds);

    Ok(QcOutcome {
        spatial,
        linkers: [a, b],
        tissue,
        status,
    })
}

fn counts_name(linker: Linker) -> String {
    format!("{linker}_counts.csv")
}

fn anomalies_name(linker: Linker) -> String {
    format!("{linker}_lane_anomalies.csv")
}

const SPATIAL_TABLE: &str = "spatial_table.csv";
const TISSUE_SPOTS: &str = "tissue_spots.csv";
const ONOFF_TABLE: &str = "onoff_tissue_table.csv";
const LINKER_METRICS: &str = "linker_metrics.csv";
const QC_TABLE: &str = "qc_table.csv";
pub const SUMMARY_JSON: &str = "qc_summary.json";

/// Writes the tables of an outcome. Optional tables that do not apply to this outcome are
/// removed if an earlier run left them behind.
pub fn write_tables(outcome: &QcOutcome, writer: &ArtifactWriter) -> Result<()> {
    writer.write_csv(SPATIAL_TABLE, outcome.spatial.rows.iter())?;

    for analysis in outcome.linkers.iter() {
        let linker = analysis.linker;
        writer.write_csv(&counts_name(linker), analysis.whitelist.rows.iter())?;

        match analysis.lanes.anomalies() {
            Some(rows) => {
                info!("{linker}: {} anomalous lanes", rows.len());
                writer.write_csv(&anomalies_name(linker), rows)?;
            }
            None => {
                info!("{linker}: no anomalous lanes");
                writer.remove_stale(&anomalies_name(linker))?;
            }
        }
    }

    match &outcome.tissue {
        Some(tissue) => {
            writer.write_csv(TISSUE_SPOTS, tissue.spots.iter())?;
            writer.write_csv(ONOFF_TABLE, tissue.summary())?;
        }
        None => {
            writer.remove_stale(TISSUE_SPOTS)?;
            writer.remove_stale(ONOFF_TABLE)?;
        }
    }

    writer.write_csv(
        LINKER_METRICS,
        outcome.linkers.iter().map(LinkerAnalysis::summary),
    )?;
    writer.write_csv(QC_TABLE, outcome.status.results())?;
    Ok(())
}

/// Configuration resolved before any read data is looked at.
pub struct Prepared {
    pub set: BarcodeSet,
    pub tissue: Option<TissuePositions>,
}

/// Loads the barcode set and the tissue table. Every configuration problem surfaces here.
pub fn prepare(config: &RunConfig) -> Result<Prepared> {
    let set = BarcodeSet::load(config.barcode_set, &config.data_dir)
        .with_context(|| format!("Could not load barcode set {}", config.barcode_set))?;
    let tissue = config.tissue.resolve(&set)?;
    Ok(Prepared { set, tissue })
}

/// Runs the engine on existing extraction outputs and writes every artifact.
pub fn analyze(
    config: &RunConfig,
    prepared: &Prepared,
    inputs: &[LinkerInput; 2],
    total_reads: Option<u64>,
    mut run_inputs: RunInputs,
) -> Result<QcOutcome> {
    // a failed run must not leave an earlier verdict behind
    output::remove_stale(&config.tables_dir().join(QC_TABLE))?;
    output::remove_stale(&config.output_dir.join(SUMMARY_JSON))?;

    let [l1, l2] = inputs;
    let l1 = l1.load(total_reads)?;
    let l2 = l2.load(total_reads)?;

    let outcome = evaluate(
        &prepared.set,
        &l1,
        &l2,
        prepared.tissue.as_ref(),
        &config.thresholds,
    )?;

    let tables = ArtifactWriter::new(&config.tables_dir())?;
    write_tables(&outcome, &tables)?;

    run_inputs.linkers = inputs.to_vec();
    run_inputs.tissue_positions = prepared.tissue.as_ref().map(|t| t.path().to_path_buf());
    let summary = RunSummary::new(config, run_inputs, &outcome);
    let root = ArtifactWriter::new(&config.output_dir)?;
    root.write_json(SUMMARY_JSON, &summary)?;

    info!("Wrote QC outputs to {}", config.output_dir.display());
    Ok(outcome)
}

/// The linker inputs left behind by an extraction run.
pub fn extraction_inputs(outputs: &[crate::external::ExtractionOutputs; 2]) -> [LinkerInput; 2] {
    outputs.clone().map(|o| LinkerInput {
        linker: o.linker,
        calls: o.wildcards,
        log: Some(o.log),
    })
}

/// Convenience for callers that only have paths.
pub fn linker_inputs(l1: &Path, l2: &Path, l1_log: Option<&Path>, l2_log: Option<&Path>) -> [LinkerInput; 2] {
    [
        LinkerInput {
            linker: Linker::L1,
            calls: l1.to_path_buf(),
            log: l1_log.map(Path::to_path_buf),
        },
        LinkerInput {
            linker: Linker::L2,
            calls: l2.to_path_buf(),
            log: l2_log.map(Path::to_path_buf),
        },
    ]
}
