use std::path::PathBuf;

use anyhow::Result;
use clap::builder::styling::AnsiColor;
use clap::builder::Styles;
use clap::{Args, Parser, Subcommand};

use crate::barcode_set::BarcodeSetId;
use crate::config::{output_dir_from_sample_name, RunConfig};
use crate::errors::ConfigError;
use crate::status::Thresholds;
use crate::tissue::TissueSource;

const fn extra_build_info() -> &'static str {
    match option_env!("CARGO_BUILD_DESC") {
        Some(e) => e,
        None => env!("CARGO_PKG_VERSION"),
    }
}
pub const VERSION: &str = extra_build_info();
const INFO_STRING: &str = "
🧬 barcodeqc version ";
const AFTER_STRING: &str = "
   ──────────────────────────────────
   barcode QC metrics and PASS/CAUTION status
   for spatial barcoding runs";

// colouring of the help
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().bold())
    .usage(AnsiColor::BrightMagenta.on_default().bold())
    .literal(AnsiColor::BrightMagenta.on_default())
    .placeholder(AnsiColor::White.on_default());

#[derive(Parser)]
#[command(
    version = VERSION,
    about = format!("{}{}{}", INFO_STRING, VERSION, AFTER_STRING),
    arg_required_else_help = true,
    flatten_help = true,
    styles = STYLES
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Subsample a read file, extract both linkers and run the QC engine
    #[command(arg_required_else_help = true)]
    Qc {
        /// the R2 read file (.fastq or .fastq.gz)
        #[arg(long)]
        r2: PathBuf,

        /// the number of reads to subsample
        #[arg(long, default_value_t = 10_000_000)]
        sample_reads: u64,

        /// the random seed used for subsampling
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// the number of cores handed to each extraction run
        #[arg(long, default_value_t = 8)]
        cores: usize,

        /// print the external commands instead of running them
        #[arg(long, action)]
        dry_run: bool,

        /// count every read of the R2 file and record it in the run summary. this reads the
        /// whole file and may take a while.
        #[arg(long, action)]
        count_raw_reads: bool,

        #[command(flatten)]
        common: CommonArgs,
    },

    /// Run the QC engine on existing extraction outputs
    #[command(arg_required_else_help = true)]
    Analyze {
        /// the L1 wildcard file, one `<BARCODE> <READ NAME>` line per read with a call
        #[arg(long)]
        l1: PathBuf,

        /// the L2 wildcard file
        #[arg(long)]
        l2: PathBuf,

        /// the extraction log for L1, giving the number of subsampled reads
        #[arg(long)]
        l1_log: Option<PathBuf>,

        /// the extraction log for L2
        #[arg(long)]
        l2_log: Option<PathBuf>,

        /// the number of subsampled reads, for linkers without an extraction log
        #[arg(long)]
        total_reads: Option<u64>,

        #[command(flatten)]
        common: CommonArgs,
    },
}

#[derive(Args)]
pub struct CommonArgs {
    /// the sample name. outputs are written to `<SAMPLE_NAME>_outputs` unless --output-dir is given
    #[arg(long)]
    pub sample_name: String,

    /// the barcode set: bc50, bc96, fg96, bc220, bc220_05-OCT or bc220_20-MAY
    #[arg(long, value_parser = |x: &str| x.parse::<BarcodeSetId>())]
    pub barcode_set: BarcodeSetId,

    /// the directory holding the barcode files and tissue position lists
    #[arg(long, env = "BARCODEQC_DATA", default_value = "data")]
    pub data_dir: PathBuf,

    /// a tissue position table to use instead of the one packaged with the barcode set
    #[arg(long, conflicts_with = "no_tissue")]
    pub tissue_positions: Option<PathBuf>,

    /// skip the on/off tissue metric
    #[arg(long, action)]
    pub no_tissue: bool,

    /// the output directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    #[command(flatten)]
    pub thresholds: ThresholdArgs,
}

impl CommonArgs {
    pub fn run_config(&self) -> Result<RunConfig> {
        let output_dir = match &self.output_dir {
            Some(dir) => dir.clone(),
            None => output_dir_from_sample_name(&std::env::current_dir()?, &self.sample_name),
        };
        let config = RunConfig::new(
            self.sample_name.clone(),
            self.barcode_set,
            self.data_dir.clone(),
            TissueSource::from_args(self.tissue_positions.clone(), self.no_tissue),
            self.thresholds.resolve()?,
            output_dir,
        )?;
        Ok(config)
    }
}

#[derive(Args)]
pub struct ThresholdArgs {
    /// a JSON file giving every threshold. flags below override single values from it.
    #[arg(long = "thresholds")]
    pub file: Option<PathBuf>,

    /// minimum fraction of reads with a linker call [default: 0.7]
    #[arg(long, value_parser = parse_fraction)]
    pub min_linker_conservation: Option<f64>,

    /// maximum fraction of reads whose barcode is not whitelisted [default: 0.05]
    #[arg(long, value_parser = parse_fraction)]
    pub max_whitelist_mismatch: Option<f64>,

    /// lanes further than k spreads from the median count are flagged [default: 3]
    #[arg(long)]
    pub lane_dispersion_k: Option<f64>,

    /// lower bound of the lane spread, as a fraction of the median count [default: 0.1]
    #[arg(long, value_parser = parse_fraction)]
    pub lane_min_relative_spread: Option<f64>,

    /// maximum fraction of lanes flagged HIGH or LOW [default: 0]
    #[arg(long, value_parser = parse_fraction)]
    pub max_lane_anomaly_fraction: Option<f64>,

    /// minimum fraction of reads on tissue [default: 0.5]
    #[arg(long, value_parser = parse_fraction)]
    pub min_on_tissue_ratio: Option<f64>,
}

impl ThresholdArgs {
    pub fn resolve(&self) -> Result<Thresholds, ConfigError> {
        let mut t = match &self.file {
            Some(path) => Thresholds::from_path(path)?,
            None => Thresholds::default(),
        };

        let overrides = [
            (self.min_linker_conservation, &mut t.min_linker_conservation),
            (self.max_whitelist_mismatch, &mut t.max_whitelist_mismatch),
            (self.lane_dispersion_k, &mut t.lane_dispersion_k),
            (self.lane_min_relative_spread, &mut t.lane_min_relative_spread),
            (self.max_lane_anomaly_fraction, &mut t.max_lane_anomaly_fraction),
            (self.min_on_tissue_ratio, &mut t.min_on_tissue_ratio),
        ];
        for (value, field) in overrides {
            if let Some(v) = value {
                *field = v;
            }
        }

        t.validate()?;
        Ok(t)
    }
}

fn parse_fraction(arg: &str) -> Result<f64, String> {
    match arg.trim().parse::<f64>() {
        Ok(v) if (0.0..=1.0).contains(&v) => Ok(v),
        _ => Err(indoc::formatdoc! {"
            expected a fraction between 0 and 1, got '{arg}'. for example:
              --max-whitelist-mismatch 0.05
              --min-on-tissue-ratio 0.5
            "}),
    }
}
