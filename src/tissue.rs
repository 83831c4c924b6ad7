use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;

use crate::barcode_set::{parse_position, BarcodeSet};
use crate::errors::ConfigError;

/// A spot on the array, as recorded in a tissue position table.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TissueSpot {
    pub on_tissue: bool,
    pub row: u32,
    pub col: u32,
}

/// Key of a spot in the tissue position table. Barcode B is read first, so the 16-mer is
/// barcode B followed by barcode A.
pub fn spot_key(barcode_a: &str, barcode_b: &str) -> String {
    format!("{barcode_b}{barcode_a}")
}

/// Maps barcode pairs to the spots of the array and whether each is covered by tissue.
#[derive(Debug, Clone)]
pub struct TissuePositions {
    path: PathBuf,
    spots: HashMap<String, TissueSpot>,
}

impl TissuePositions {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path).map_err(|e| ConfigError::UnreadableTissueTable {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        Self::from_reader(file, path)
    }

    /// Reads a headerless `barcode,on_off,row,col[,...]` table. Barcodes may carry a trailing
    /// `-1` which is ignored.
    pub fn from_reader<R: Read>(reader: R, path: &Path) -> Result<Self, ConfigError> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let pattern = Regex::new(r"^[ACGTN]{16}$").expect("static regex");
        let malformed = |line: u64, reason: String| ConfigError::MalformedTissueTable {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut spots = HashMap::new();
        for (i, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| ConfigError::UnreadableTissueTable {
                path: path.to_path_buf(),
                source: e,
            })?;
            let line = i as u64 + 1;

            if record.len() < 4 {
                return Err(malformed(
                    line,
                    format!("expected at least 4 columns, found {}", record.len()),
                ));
            }

            let barcode = record[0].strip_suffix("-1").unwrap_or(&record[0]);
            if !pattern.is_match(barcode) {
                return Err(malformed(
                    line,
                    format!("`{}` is not a 16-mer of A/C/G/T/N", &record[0]),
                ));
            }

            let on_off = parse_position(&record[1]).map_err(|r| malformed(line, format!("on_off {r}")))?;
            if on_off > 1 {
                return Err(malformed(line, format!("on_off must be 0 or 1, got {on_off}")));
            }
            let row = parse_position(&record[2]).map_err(|r| malformed(line, format!("row {r}")))?;
            let col = parse_position(&record[3]).map_err(|r| malformed(line, format!("col {r}")))?;

            let spot = TissueSpot {
                on_tissue: on_off == 1,
                row,
                col,
            };
            if spots.insert(barcode.to_string(), spot).is_some() {
                return Err(malformed(line, format!("barcode `{barcode}` is listed twice")));
            }
        }

        Ok(TissuePositions {
            path: path.to_path_buf(),
            spots,
        })
    }

    pub fn lookup(&self, barcode_a: &str, barcode_b: &str) -> Option<TissueSpot> {
        self.spots.get(&spot_key(barcode_a, barcode_b)).copied()
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Where the tissue position table comes from. Whether the on/off tissue metric is computed is
/// decided here rather than by which files happen to exist.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "kind", content = "path")]
pub enum TissueSource {
    /// the table packaged with the barcode set; it must be present
    BarcodeSetDefault,
    /// a table supplied by the user
    File(PathBuf),
    /// on/off tissue classification is switched off
    Disabled,
}

impl TissueSource {
    pub fn from_args(file: Option<PathBuf>, disabled: bool) -> Self {
        match (file, disabled) {
            (_, true) => TissueSource::Disabled,
            (Some(path), false) => TissueSource::File(path),
            (None, false) => TissueSource::BarcodeSetDefault,
        }
    }

    pub fn resolve(&self, set: &BarcodeSet) -> Result<Option<TissuePositions>, ConfigError> {
        let positions = match self {
            TissueSource::Disabled => return Ok(None),
            TissueSource::File(path) => {
                if !path.exists() {
                    return Err(ConfigError::MissingInput(path.clone()));
                }
                TissuePositions::from_path(path)?
            }
            TissueSource::BarcodeSetDefault => set.default_tissue_positions()?,
        };
        debug!(
            "Using tissue positions from {} ({} spots)",
            positions.path().display(),
            positions.len()
        );
        Ok(Some(positions))
    }
}
