#[macro_use]
extern crate log;

use anyhow::Result;
use clap::Parser;

mod barcode_set;
mod calls;
mod cli;
mod config;
mod counts;
mod errors;
mod external;
mod lanes;
mod logging;
mod onoff;
mod output;
mod pipeline;
mod spatial;
mod status;
mod summary;
mod tissue;

#[cfg(test)]
mod testutil;

use cli::{Cli, Commands};
use config::require_input;
use external::Subsample;
use summary::RunInputs;

/// External programs the full pipeline shells out to.
const TOOLS: [&str; 3] = ["seqtk", "gzip", "cutadapt"];

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    logging::init();

    info!("barcodeqc v{}", cli::VERSION);

    match &cli.command {
        Commands::Qc {
            r2,
            sample_reads,
            seed,
            cores,
            dry_run,
            count_raw_reads,
            common,
        } => {
            let config = common.run_config()?;
            if !dry_run {
                for tool in TOOLS {
                    external::require_executable(tool)?;
                }
            }
            require_input(r2)?;
            let prepared = pipeline::prepare(&config)?;

            if !dry_run {
                std::fs::create_dir_all(&config.output_dir)?;
                logging::attach_file(&config.logs_dir().join(logging::LOG_FILE))?;
                info!("Writing outputs to {}", config.output_dir.display());
            }

            let raw_reads = if *count_raw_reads && !dry_run {
                let n = external::count_reads(r2)?;
                info!("{n} reads in {}", r2.display());
                Some(n)
            } else {
                None
            };

            let subsample = Subsample {
                r2: r2.clone(),
                reads: *sample_reads,
                seed: *seed,
            };
            let reads = subsample.run(&config.output_dir, *dry_run)?;
            let outputs = external::extract_linkers(
                &reads,
                &config.output_dir,
                &config.logs_dir(),
                *cores,
                *dry_run,
            )?;

            if *dry_run {
                info!("Dry run complete; nothing was computed");
                return Ok(());
            }

            let inputs = pipeline::extraction_inputs(&outputs);
            let run_inputs = RunInputs {
                r2: Some(r2.clone()),
                raw_reads,
                sample_reads: Some(*sample_reads),
                seed: Some(*seed),
                ..Default::default()
            };
            let outcome = pipeline::analyze(&config, &prepared, &inputs, None, run_inputs)?;
            summary::print_status(&config.sample_name, &outcome.status);
        }
        Commands::Analyze {
            l1,
            l2,
            l1_log,
            l2_log,
            total_reads,
            common,
        } => {
            let config = common.run_config()?;
            let prepared = pipeline::prepare(&config)?;
            logging::attach_file(&config.logs_dir().join(logging::LOG_FILE))?;

            let inputs = pipeline::linker_inputs(l1, l2, l1_log.as_deref(), l2_log.as_deref());
            let outcome = pipeline::analyze(
                &config,
                &prepared,
                &inputs,
                *total_reads,
                RunInputs::default(),
            )?;
            summary::print_status(&config.sample_name, &outcome.status);
        }
    };
    Ok(())
}

fn main() {
    if let Err(err) = try_main() {
        error!("{}", err);

        // report any errors that are produced
        err.chain()
            .skip(1)
            .for_each(|cause| error!("  because: {}", cause));

        std::process::exit(1);
    }
}
