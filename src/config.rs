use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::barcode_set::BarcodeSetId;
use crate::errors::ConfigError;
use crate::status::Thresholds;
use crate::tissue::TissueSource;

const OUTPUT_DIR_SUFFIX: &str = "_outputs";

/// Output directory for a sample: `<sample>_outputs` under `base`, without doubling the suffix.
pub fn output_dir_from_sample_name(base: &Path, sample_name: &str) -> PathBuf {
    if sample_name.ends_with(OUTPUT_DIR_SUFFIX) {
        base.join(sample_name)
    } else {
        base.join(format!("{sample_name}{OUTPUT_DIR_SUFFIX}"))
    }
}

/// Settings shared by every way of running the QC engine. Built once from the command line and
/// passed down explicitly.
#[derive(Serialize, Debug, Clone)]
pub struct RunConfig {
    pub sample_name: String,
    pub barcode_set: BarcodeSetId,
    pub data_dir: PathBuf,
    pub tissue: TissueSource,
    pub thresholds: Thresholds,
    pub output_dir: PathBuf,
}

impl RunConfig {
    pub fn new(
        sample_name: String,
        barcode_set: BarcodeSetId,
        data_dir: PathBuf,
        tissue: TissueSource,
        thresholds: Thresholds,
        output_dir: PathBuf,
    ) -> Result<Self, ConfigError> {
        thresholds.validate()?;
        Ok(RunConfig {
            sample_name,
            barcode_set,
            data_dir,
            tissue,
            thresholds,
            output_dir,
        })
    }

    pub fn tables_dir(&self) -> PathBuf {
        self.output_dir.join("tables")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.output_dir.join("logs")
    }
}

/// Fails with `MissingInput` unless `path` exists.
pub fn require_input(path: &Path) -> Result<(), ConfigError> {
    if path.exists() {
        Ok(())
    } else {
        Err(ConfigError::MissingInput(path.to_path_buf()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_suffix_is_not_doubled() {
        let base = Path::new("/runs");
        assert_eq!(
            output_dir_from_sample_name(base, "S1"),
            PathBuf::from("/runs/S1_outputs")
        );
        assert_eq!(
            output_dir_from_sample_name(base, "S1_outputs"),
            PathBuf::from("/runs/S1_outputs")
        );
    }

    #[test]
    fn invalid_thresholds_are_rejected_up_front() {
        let mut thresholds = Thresholds::default();
        thresholds.min_on_tissue_ratio = -0.1;
        let res = RunConfig::new(
            "S1".to_string(),
            BarcodeSetId::Bc50,
            "data".into(),
            TissueSource::Disabled,
            thresholds,
            "/tmp/out".into(),
        );
        assert!(matches!(res, Err(ConfigError::ThresholdOutOfRange { .. })));
    }
}
