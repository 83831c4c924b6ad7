use std::fs::File;
use std::path::Path;
use std::sync::OnceLock;

use anyhow::{Context, Result};
use env_logger::{Builder, Env, Logger, Target, WriteStyle};
use log::{LevelFilter, Log, Metadata, Record};

/// Name of the run log kept in the logs directory.
pub const LOG_FILE: &str = "barcodeqc.log";

/// Sends every record to the console at the level chosen through `RUST_LOG`, and, once a run
/// directory exists, to a DEBUG-level log file inside it.
struct RunLogger {
    console: Logger,
    file: OnceLock<Logger>,
}

static LOGGER: OnceLock<RunLogger> = OnceLock::new();

impl Log for RunLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.console.enabled(metadata) || self.file.get().is_some_and(|f| f.enabled(metadata))
    }

    fn log(&self, record: &Record) {
        if self.console.matches(record) {
            self.console.log(record);
        }
        if let Some(file) = self.file.get() {
            if file.matches(record) {
                file.log(record);
            }
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Some(file) = self.file.get() {
            file.flush();
        }
    }
}

/// Installs the console logger. Calling it again has no effect.
pub fn init() {
    let logger = LOGGER.get_or_init(|| RunLogger {
        console: Builder::from_env(Env::default().default_filter_or("info"))
            .format_target(false)
            .build(),
        file: OnceLock::new(),
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(logger.console.filter());
    }
}

/// Starts copying this crate's DEBUG-level records to `path`, replacing any earlier log there.
pub fn attach_file(path: &Path) -> Result<()> {
    let Some(logger) = LOGGER.get() else {
        return Ok(());
    };
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Could not create log directory {}", dir.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("Could not create log file {}", path.display()))?;

    let file_logger = Builder::new()
        .filter_level(LevelFilter::Info)
        .filter_module(env!("CARGO_CRATE_NAME"), LevelFilter::Debug)
        .format_target(false)
        .write_style(WriteStyle::Never)
        .target(Target::Pipe(Box::new(file)))
        .build();
    let level = file_logger.filter().max(logger.console.filter());

    if logger.file.set(file_logger).is_ok() {
        log::set_max_level(level);
        debug!("Logging to {}", path.display());
    }
    Ok(())
}
