use std::collections::HashMap;

use serde::Serialize;

use crate::calls::{Linker, LinkerCalls};
use crate::errors::InputIntegrityError;
use crate::tissue::TissuePositions;

/// A read carrying both barcodes, optionally placed on the tissue map.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct SpatialRow {
    pub read_id: String,
    pub barcode_a: String,
    pub barcode_b: String,
    pub row: Option<u32>,
    pub col: Option<u32>,
    pub on_tissue: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct SpatialTable {
    pub rows: Vec<SpatialRow>,
    /// whether rows were matched against a tissue position table
    pub tissue_applied: bool,
}

impl SpatialTable {
    /// Joins the L1 (barcode A) and L2 (barcode B) calls on read identifier. Only reads with both
    /// calls are kept, in the order they appear among the L1 calls.
    ///
    /// When `tissue` is given every row is classified: a pair found in the table takes its
    /// row, column and on/off call, a pair that is not found is kept and marked off tissue.
    ///
    /// # Errors
    ///
    /// Returns `NoReadOverlap` when no read has calls for both linkers.
    pub fn build(
        l1: &LinkerCalls,
        l2: &LinkerCalls,
        tissue: Option<&TissuePositions>,
    ) -> Result<Self, InputIntegrityError> {
        debug_assert_eq!(l1.linker, Linker::L1);
        debug_assert_eq!(l2.linker, Linker::L2);

        let by_read: HashMap<&str, &str> = l2
            .records
            .iter()
            .map(|r| (r.read_id.as_str(), r.barcode.as_str()))
            .collect();

        let rows: Vec<SpatialRow> = l1
            .records
            .iter()
            .filter_map(|a| {
                let barcode_b = *by_read.get(a.read_id.as_str())?;
                let mut row = SpatialRow {
                    read_id: a.read_id.clone(),
                    barcode_a: a.barcode.clone(),
                    barcode_b: barcode_b.to_string(),
                    row: None,
                    col: None,
                    on_tissue: None,
                };
                if let Some(tissue) = tissue {
                    let spot = tissue.lookup(&row.barcode_a, &row.barcode_b);
                    row.row = spot.map(|s| s.row);
                    row.col = spot.map(|s| s.col);
                    row.on_tissue = Some(spot.is_some_and(|s| s.on_tissue));
                }
                Some(row)
            })
            .collect();

        if rows.is_empty() {
            return Err(InputIntegrityError::NoReadOverlap {
                l1_calls: l1.records.len(),
                l2_calls: l2.records.len(),
            });
        }

        info!(
            "Spatial table: {} reads with both linkers ({} L1 calls, {} L2 calls)",
            rows.len(),
            l1.records.len(),
            l2.records.len()
        );

        Ok(SpatialTable {
            rows,
            tissue_applied: tissue.is_some(),
        })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}
