use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use tempfile::NamedTempFile;

/// Writes run artifacts into a directory. Every file is first written to a temporary file in
/// the same directory and only moved into place once it is complete, so a file that exists
/// under its final name is never partial.
pub struct ArtifactWriter {
    dir: PathBuf,
}

impl ArtifactWriter {
    pub fn new(dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Could not create output directory {}", dir.display()))?;
        Ok(ArtifactWriter {
            dir: dir.to_path_buf(),
        })
    }

    /// Writes `rows` as a CSV file with a header row derived from `T`.
    pub fn write_csv<T: Serialize>(
        &self,
        name: &str,
        rows: impl IntoIterator<Item = T>,
    ) -> Result<PathBuf> {
        self.persist(name, |file| {
            let mut wtr = WriterBuilder::new().from_writer(file);
            for row in rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
            Ok(())
        })
    }

    pub fn write_json<T: Serialize>(&self, name: &str, value: &T) -> Result<PathBuf> {
        self.persist(name, |file| {
            serde_json::to_writer_pretty(&mut *file, value)?;
            writeln!(file)?;
            Ok(())
        })
    }

    /// Removes an optional artifact left behind by an earlier run into the same directory.
    pub fn remove_stale(&self, name: &str) -> Result<()> {
        remove_stale(&self.dir.join(name))
    }

    fn persist(
        &self,
        name: &str,
        write: impl FnOnce(&mut NamedTempFile) -> Result<()>,
    ) -> Result<PathBuf> {
        let path = self.dir.join(name);
        let mut temp = NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("Could not create a temporary file in {}", self.dir.display()))?;

        write(&mut temp).with_context(|| format!("Could not write {}", path.display()))?;

        temp.persist(&path)
            .with_context(|| format!("Could not move output into place at {}", path.display()))?;
        debug!("Wrote {}", path.display());
        Ok(path)
    }
}

/// Removes `path` if an earlier run left it behind. A missing directory is not an error.
pub fn remove_stale(path: &Path) -> Result<()> {
    if path.exists() {
        std::fs::remove_file(path)
            .with_context(|| format!("Could not remove stale output {}", path.display()))?;
        debug!("Removed stale {}", path.display());
    }
    Ok(())
}
