//! Fixtures shared by the unit tests.

use std::path::Path;

use crate::barcode_set::BarcodeSetId;
use crate::calls::{Linker, LinkerCallRecord, LinkerCalls};

/// The `i`th 8-mer, spelling `i` in base 4 over `ACGT`.
pub fn barcode(i: usize) -> String {
    (0..8)
        .rev()
        .map(|digit| b"ACGT"[(i >> (2 * digit)) & 3] as char)
        .collect()
}

/// A whitelist of `n` barcodes on lanes `0..n`, placed on the diagonal.
pub fn whitelist_text(n: usize) -> String {
    let mut text = String::from("sequence\trow\tcol\n");
    for i in 0..n {
        text.push_str(&format!("{}\t{i}\t{i}\n", barcode(i)));
    }
    text
}

/// An `n` x `n` tissue table; rows in the upper half of the array are on tissue.
pub fn positions_text(n: usize) -> String {
    let mut text = String::new();
    for a in 0..n {
        for b in 0..n {
            let on = u8::from(a < n / 2);
            text.push_str(&format!("{}{}-1,{on},{a},{b}\n", barcode(b), barcode(a)));
        }
    }
    text
}

pub fn write_whitelists(dir: &Path, id: BarcodeSetId, n: usize) {
    for linker in Linker::BOTH {
        let path = id.whitelist_path(dir, linker);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, whitelist_text(n)).unwrap();
    }
}

/// A data directory in which every barcode set has `n` barcodes per whitelist and a packaged
/// tissue table.
pub fn write_data_dir(dir: &Path, n: usize) {
    for id in BarcodeSetId::ALL {
        write_whitelists(dir, id, n);
        let positions = id.positions_path(dir);
        std::fs::create_dir_all(positions.parent().unwrap()).unwrap();
        std::fs::write(positions, positions_text(n)).unwrap();
    }
}

pub fn calls(linker: Linker, records: &[(&str, &str)], total_reads: u64) -> LinkerCalls {
    let records = records
        .iter()
        .map(|(read_id, barcode)| LinkerCallRecord {
            read_id: read_id.to_string(),
            barcode: barcode.to_string(),
            linker,
        })
        .collect();
    LinkerCalls::from_records(linker, records, total_reads, Path::new("test")).unwrap()
}
