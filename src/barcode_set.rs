use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use indexmap::IndexMap;
use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::calls::Linker;
use crate::errors::ConfigError;
use crate::tissue::TissuePositions;

/// The supported barcode-set configurations.
#[derive(Serialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BarcodeSetId {
    /// 50 x 50 barcode set
    #[serde(rename = "bc50")]
    Bc50,

    /// 96 x 96 barcode set
    #[serde(rename = "bc96")]
    Bc96,

    /// 96 x 96 fine-grained barcode set
    #[serde(rename = "fg96")]
    Fg96,

    /// 220 x 220 barcode set, 25-APR revision
    #[serde(rename = "bc220")]
    Bc220,

    /// 220 x 220 barcode set, 05-OCT revision
    #[serde(rename = "bc220_05-OCT")]
    Bc220Oct05,

    /// 220 x 220 barcode set, 20-MAY revision
    #[serde(rename = "bc220_20-MAY")]
    Bc220May20,
}

/// Resource file names for a barcode set, relative to the data directory.
struct SetFiles {
    mer_list: &'static str,
    positions: &'static str,
}

impl BarcodeSetId {
    pub const ALL: [BarcodeSetId; 6] = [
        BarcodeSetId::Bc50,
        BarcodeSetId::Bc96,
        BarcodeSetId::Fg96,
        BarcodeSetId::Bc220,
        BarcodeSetId::Bc220Oct05,
        BarcodeSetId::Bc220May20,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            BarcodeSetId::Bc50 => "bc50",
            BarcodeSetId::Bc96 => "bc96",
            BarcodeSetId::Fg96 => "fg96",
            BarcodeSetId::Bc220 => "bc220",
            BarcodeSetId::Bc220Oct05 => "bc220_05-OCT",
            BarcodeSetId::Bc220May20 => "bc220_20-MAY",
        }
    }

    fn files(&self) -> SetFiles {
        match self {
            BarcodeSetId::Bc50 => SetFiles {
                mer_list: "merList50.tsv",
                positions: "x50_all_tissue_positions_list.csv",
            },
            BarcodeSetId::Bc96 => SetFiles {
                mer_list: "merList96.tsv",
                positions: "x96_all_tissue_positions_list.csv",
            },
            BarcodeSetId::Fg96 => SetFiles {
                mer_list: "merListfg96.tsv",
                positions: "xfg96_11DEC_alltissue_positions_list.csv",
            },
            BarcodeSetId::Bc220 => SetFiles {
                mer_list: "merList220_25-APR.tsv",
                positions: "xbc220_25APR_alltissue_positions_list.csv",
            },
            BarcodeSetId::Bc220Oct05 => SetFiles {
                mer_list: "merList220_05-OCT.tsv",
                positions: "xbc220_05OCT_alltissue_positions_list.csv",
            },
            BarcodeSetId::Bc220May20 => SetFiles {
                mer_list: "merList220_20-MAY.tsv",
                positions: "xbc220-20MAY_alltissue_positions_list.csv",
            },
        }
    }

    /// Location of the whitelist for the barcode read by `linker`.
    pub fn whitelist_path(&self, data_dir: &Path, linker: Linker) -> PathBuf {
        let sub = match linker {
            Linker::L1 => "barcode_A",
            Linker::L2 => "barcode_B",
        };
        data_dir
            .join("barcode_files")
            .join(sub)
            .join(self.files().mer_list)
    }

    /// Location of the packaged tissue position table.
    pub fn positions_path(&self, data_dir: &Path) -> PathBuf {
        data_dir
            .join("position_files")
            .join(self.files().positions)
    }
}

impl fmt::Display for BarcodeSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BarcodeSetId {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BarcodeSetId::ALL
            .into_iter()
            .find(|id| id.name() == s)
            .ok_or_else(|| ConfigError::UnknownBarcodeSet {
                name: s.to_string(),
                expected: BarcodeSetId::ALL.iter().map(|id| id.name()).join(", "),
            })
    }
}

#[derive(Deserialize)]
struct WhitelistRow {
    sequence: String,
    row: String,
    col: String,
}

/// The valid sequences for one barcode position, each mapped to the lane it occupies on the
/// array. Barcode A lanes are rows, barcode B lanes are columns.
#[derive(Debug, Clone)]
pub struct Whitelist {
    path: PathBuf,
    lanes: IndexMap<String, u32>,
}

impl Whitelist {
    pub fn from_path(path: &Path, linker: Linker) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|e| ConfigError::UnreadableWhitelist {
            path: path.to_path_buf(),
            source: e.into(),
        })?;
        Self::from_text(&text, path, linker)
    }

    /// Parses a whitelist with a `sequence,row,col` header. Despite the `.tsv` names, the
    /// packaged files are comma separated, so the delimiter is taken from the header line.
    pub fn from_text(text: &str, path: &Path, linker: Linker) -> Result<Self, ConfigError> {
        let header = text.lines().next().unwrap_or_default();
        let delimiter = if header.contains('\t') { b'\t' } else { b',' };

        let mut rdr = csv::ReaderBuilder::new()
            .delimiter(delimiter)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(text.as_bytes());

        let pattern = Regex::new(r"^[ACGTN]{8}$").expect("static regex");
        let malformed = |line: u64, reason: String| ConfigError::MalformedWhitelist {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut lanes = IndexMap::new();
        for (i, result) in rdr.deserialize().enumerate() {
            let row: WhitelistRow = result.map_err(|e| ConfigError::UnreadableWhitelist {
                path: path.to_path_buf(),
                source: e,
            })?;
            // header is line 1
            let line = i as u64 + 2;

            if !pattern.is_match(&row.sequence) {
                return Err(malformed(
                    line,
                    format!("`{}` is not an 8-mer of A/C/G/T/N", row.sequence),
                ));
            }

            let row_idx = parse_position(&row.row).map_err(|r| malformed(line, format!("row {r}")))?;
            let col_idx = parse_position(&row.col).map_err(|r| malformed(line, format!("col {r}")))?;
            let lane = match linker {
                Linker::L1 => row_idx,
                Linker::L2 => col_idx,
            };

            if lanes.insert(row.sequence.clone(), lane).is_some() {
                return Err(ConfigError::DuplicateWhitelistEntry {
                    path: path.to_path_buf(),
                    sequence: row.sequence,
                });
            }
        }

        if lanes.is_empty() {
            return Err(ConfigError::EmptyWhitelist {
                path: path.to_path_buf(),
            });
        }

        Ok(Whitelist {
            path: path.to_path_buf(),
            lanes,
        })
    }

    #[cfg(test)]
    pub fn contains(&self, sequence: &str) -> bool {
        self.lanes.contains_key(sequence)
    }

    pub fn lane(&self, sequence: &str) -> Option<u32> {
        self.lanes.get(sequence).copied()
    }

    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    #[cfg(test)]
    pub fn sequences(&self) -> impl Iterator<Item = &str> {
        self.lanes.keys().map(|s| s.as_str())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parses a non-negative integer position, accepting integral floats such as `3.0`.
pub(crate) fn parse_position(value: &str) -> Result<u32, String> {
    let v: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("`{value}` is not numeric"))?;
    if v.fract() != 0.0 {
        return Err(format!("`{value}` is not an integer"));
    }
    if v < 0.0 || v > u32::MAX as f64 {
        return Err(format!("`{value}` is out of range"));
    }
    Ok(v as u32)
}

/// A loaded barcode set. Nothing here changes after `load` returns.
#[derive(Debug, Clone)]
pub struct BarcodeSet {
    pub id: BarcodeSetId,
    pub whitelist_a: Whitelist,
    pub whitelist_b: Whitelist,
    pub default_positions: PathBuf,
}

impl BarcodeSet {
    pub fn load(id: BarcodeSetId, data_dir: &Path) -> Result<Self, ConfigError> {
        let whitelist_a = Whitelist::from_path(&id.whitelist_path(data_dir, Linker::L1), Linker::L1)?;
        let whitelist_b = Whitelist::from_path(&id.whitelist_path(data_dir, Linker::L2), Linker::L2)?;
        debug!(
            "Loaded {id}: {} barcode A sequences from {} and {} barcode B sequences from {}",
            whitelist_a.len(),
            whitelist_a.path().display(),
            whitelist_b.len(),
            whitelist_b.path().display()
        );

        Ok(BarcodeSet {
            id,
            whitelist_a,
            whitelist_b,
            default_positions: id.positions_path(data_dir),
        })
    }

    /// The whitelist for the barcode called by the given linker: L1 reads barcode A,
    /// L2 reads barcode B.
    pub fn whitelist(&self, linker: Linker) -> &Whitelist {
        match linker {
            Linker::L1 => &self.whitelist_a,
            Linker::L2 => &self.whitelist_b,
        }
    }

    /// Loads the tissue position table packaged with this barcode set.
    pub fn default_tissue_positions(&self) -> Result<TissuePositions, ConfigError> {
        if !self.default_positions.exists() {
            return Err(ConfigError::MissingDefaultTissueTable {
                set: self.id.to_string(),
                path: self.default_positions.clone(),
            });
        }
        TissuePositions::from_path(&self.default_positions)
    }
}
