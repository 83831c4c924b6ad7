use std::ffi::OsStr;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use itertools::Itertools;

use crate::calls::Linker;
use crate::errors::{ConfigError, ToolError};

/// Maximum number of mismatches cutadapt may accept inside a linker.
const LINKER_MAX_ERRORS: &str = "5";

/// Locates `program` in `PATH`.
pub fn require_executable(program: &str) -> Result<PathBuf, ConfigError> {
    let paths = std::env::var_os("PATH").unwrap_or_default();
    std::env::split_paths(&paths)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ConfigError::MissingExecutable(program.to_string()))
}

/// Renders a command line for logging and `--dry-run`.
pub fn render(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(OsStr::to_string_lossy)
        .join(" ")
}

fn check_status(cmd: &Command, status: std::process::ExitStatus, log: Option<&Path>) -> Result<(), ToolError> {
    if status.success() {
        Ok(())
    } else {
        Err(ToolError::Failed {
            command: render(cmd),
            status,
            log: log.map(Path::to_path_buf),
        })
    }
}

fn spawn_error(cmd: &Command) -> impl FnOnce(std::io::Error) -> ToolError + '_ {
    move |source| ToolError::Spawn {
        program: cmd.get_program().to_string_lossy().into_owned(),
        source,
    }
}

/// Settings for the random subsampling of the input reads.
#[derive(Debug, Clone)]
pub struct Subsample {
    pub r2: PathBuf,
    pub reads: u64,
    pub seed: u64,
}

impl Subsample {
    pub fn output_path(&self, dir: &Path) -> PathBuf {
        dir.join(format!("ds_{}.fastq.gz", self.reads))
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new("seqtk");
        cmd.arg("sample")
            .arg("-s")
            .arg(self.seed.to_string())
            .arg(&self.r2)
            .arg(self.reads.to_string());
        cmd
    }

    /// Runs `seqtk sample | gzip` and returns the path of the compressed subsample.
    pub fn run(&self, dir: &Path, dry_run: bool) -> Result<PathBuf> {
        let out_path = self.output_path(dir);
        let mut seqtk_cmd = self.command();
        let mut gzip_cmd = Command::new("gzip");

        info!("Running subsample");
        debug!("seqtk cmd: {}", render(&seqtk_cmd));
        debug!("gzip cmd: {} > {}", render(&gzip_cmd), out_path.display());

        if dry_run {
            println!("{} | {} > {}", render(&seqtk_cmd), render(&gzip_cmd), out_path.display());
            return Ok(out_path);
        }

        let out_file = File::create(&out_path)
            .with_context(|| format!("Could not create {}", out_path.display()))?;

        let mut seqtk = seqtk_cmd
            .stdout(Stdio::piped())
            .spawn()
            .map_err(spawn_error(&seqtk_cmd))?;
        let seqtk_out = seqtk.stdout.take().context("seqtk stdout was not captured")?;

        let gzip_status = gzip_cmd
            .stdin(seqtk_out)
            .stdout(out_file)
            .status()
            .map_err(spawn_error(&gzip_cmd))?;
        let seqtk_status = seqtk.wait().map_err(spawn_error(&seqtk_cmd))?;

        check_status(&seqtk_cmd, seqtk_status, None)?;
        check_status(&gzip_cmd, gzip_status, None)?;

        info!("Completed subsampling");
        Ok(out_path)
    }
}

/// Files produced by one extraction run.
#[derive(Debug, Clone)]
pub struct ExtractionOutputs {
    pub linker: Linker,
    pub wildcards: PathBuf,
    pub log: PathBuf,
}

/// Builds the cutadapt invocation that locates `linker` and writes the bases matched by its
/// wildcard prefix, one line per read, to the wildcard file.
pub fn extraction_command(linker: Linker, reads: &Path, wildcards: &Path, cores: usize) -> Command {
    let mut cmd = Command::new("cutadapt");
    cmd.arg("-g")
        .arg(format!("linker{}={}", &linker.label()[1..], linker.pattern()))
        .args(["-o", "/dev/null", "--action=lowercase"])
        .arg("--cores")
        .arg(cores.to_string())
        .arg("--no-indels")
        .args(["-e", LINKER_MAX_ERRORS])
        .arg("--wildcard-file")
        .arg(wildcards)
        .arg(reads);
    cmd
}

fn run_extraction(
    linker: Linker,
    reads: &Path,
    out_dir: &Path,
    log_dir: &Path,
    cores: usize,
    dry_run: bool,
) -> Result<ExtractionOutputs> {
    let outputs = ExtractionOutputs {
        linker,
        wildcards: out_dir.join(format!("cutadapt_wc_{linker}.txt")),
        log: log_dir.join(format!("cutadapt_{linker}.log")),
    };
    let mut cmd = extraction_command(linker, reads, &outputs.wildcards, cores);

    info!("Starting extraction for {linker}");
    debug!("cutadapt {linker} cmd: {} > {}", render(&cmd), outputs.log.display());

    if dry_run {
        println!("{} > {}", render(&cmd), outputs.log.display());
        return Ok(outputs);
    }

    let log = File::create(&outputs.log)
        .with_context(|| format!("Could not create {}", outputs.log.display()))?;
    let status = cmd
        .stdout(log.try_clone()?)
        .stderr(log)
        .status()
        .map_err(spawn_error(&cmd))?;
    check_status(&cmd, status, Some(&outputs.log))?;

    info!("Completed extraction for {linker}");
    Ok(outputs)
}

/// Runs the extraction for both linkers. The two runs read the same subsample and write disjoint
/// files, so they run side by side.
pub fn extract_linkers(
    reads: &Path,
    out_dir: &Path,
    log_dir: &Path,
    cores: usize,
    dry_run: bool,
) -> Result<[ExtractionOutputs; 2]> {
    if !dry_run {
        std::fs::create_dir_all(log_dir)
            .with_context(|| format!("Could not create {}", log_dir.display()))?;
    }

    for_both_linkers(|linker| run_extraction(linker, reads, out_dir, log_dir, cores, dry_run))
}

/// Runs `job` for L1 and L2 on two threads. A failure on either side fails the whole call.
fn for_both_linkers<T, F>(job: F) -> Result<[T; 2]>
where
    T: Send,
    F: Fn(Linker) -> Result<T> + Sync,
{
    let job = &job;
    let result = crossbeam::thread::scope(|scope| -> Result<[T; 2]> {
        let handles = Linker::BOTH.map(|linker| scope.spawn(move |_| job(linker)));
        let [l1, l2] = handles.map(|h| h.join());
        Ok([
            l1.map_err(|_| anyhow::anyhow!("L1 worker thread panicked"))??,
            l2.map_err(|_| anyhow::anyhow!("L2 worker thread panicked"))??,
        ])
    });

    result.unwrap_or_else(|e| {
        error!("Caught a panic which is unrecoverable");
        std::panic::resume_unwind(e)
    })
}

/// Counts the records of a FASTQ or FASTA file, compressed or not.
pub fn count_reads(path: &Path) -> Result<u64> {
    let mut reader = needletail::parse_fastx_file(path)
        .with_context(|| format!("Could not open {}", path.display()))?;
    let mut n = 0;
    while let Some(record) = reader.next() {
        record.with_context(|| format!("Invalid record {} in {}", n + 1, path.display()))?;
        n += 1;
    }
    Ok(n)
}
