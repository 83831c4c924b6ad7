use assert_cmd::prelude::*;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use predicates::prelude::*;
use std::process::Command;

const BINARY: &str = "barcodeqc";
type TestResult = Result<(), Box<dyn std::error::Error>>;

fn barcode(i: usize) -> String {
    (0..8)
        .rev()
        .map(|digit| b"ACGT"[(i >> (2 * digit)) & 3] as char)
        .collect()
}

/// Writes a bc96 data directory with 100 barcodes per side. Barcode A lanes below 50 are on
/// tissue.
fn write_data(temp: &TempDir) -> TestResult {
    let mut whitelist = String::from("sequence,row,col\n");
    for i in 0..100 {
        whitelist.push_str(&format!("{},{i},{i}\n", barcode(i)));
    }
    for side in ["barcode_A", "barcode_B"] {
        let dir = temp.child("data/barcode_files").child(side);
        dir.create_dir_all()?;
        dir.child("merList96.tsv").write_str(&whitelist)?;
    }

    let mut positions = String::new();
    for a in 0..100 {
        for b in 0..100 {
            let on = u8::from(a < 50);
            positions.push_str(&format!("{}{}-1,{on},{a},{b}\n", barcode(b), barcode(a)));
        }
    }
    let dir = temp.child("data/position_files");
    dir.create_dir_all()?;
    dir.child("x96_all_tissue_positions_list.csv").write_str(&positions)?;
    Ok(())
}

/// Writes wildcard files and extraction logs for 1000 reads: 950 with both linkers spread
/// evenly over the whitelist, 50 without an L1 call. `extra` reads with both linkers are added
/// on barcode A 0.
fn write_calls(temp: &TempDir, extra: usize) -> TestResult {
    let total = 1000 + extra;
    let mut l1 = String::new();
    let mut l2 = String::new();
    for i in 0..total {
        let a = match i {
            0..=949 => Some(i % 100),
            950..=999 => None,
            _ => Some(0),
        };
        if let Some(a) = a {
            l1.push_str(&format!("{} read{i} 2:N:0:1\n", barcode(a)));
        }
        l2.push_str(&format!("{} read{i} 2:N:0:1\n", barcode((i * 7) % 100)));
    }

    let log = |calls: usize| {
        format!(
            "This is cutadapt 4.4\n\n=== Summary ===\n\n\
             Total reads processed:                 {total}\n\
             Reads with adapters:                   {calls}\n"
        )
    };
    temp.child("wc_L1.txt").write_str(&l1)?;
    temp.child("wc_L2.txt").write_str(&l2)?;
    temp.child("cutadapt_L1.log").write_str(&log(total - 50))?;
    temp.child("cutadapt_L2.log").write_str(&log(total))?;
    Ok(())
}

fn analyze_with_set(temp: &TempDir, set: &str) -> Result<Command, Box<dyn std::error::Error>> {
    let mut cmd = Command::cargo_bin(BINARY)?;
    cmd.current_dir(temp.path())
        .env_remove("BARCODEQC_DATA")
        .arg("analyze")
        .args(["--l1", "wc_L1.txt", "--l2", "wc_L2.txt"])
        .args(["--l1-log", "cutadapt_L1.log", "--l2-log", "cutadapt_L2.log"])
        .args(["--sample-name", "S1", "--barcode-set", set, "--data-dir", "data"])
        .args(["--min-linker-conservation", "0.9"]);
    Ok(cmd)
}

fn analyze(temp: &TempDir) -> Result<Command, Box<dyn std::error::Error>> {
    analyze_with_set(temp, "bc96")
}

#[test]
fn uniform_run_passes_without_anomaly_tables() -> TestResult {
    let temp = TempDir::new()?;
    write_data(&temp)?;
    write_calls(&temp, 0)?;

    analyze(&temp)?
        .assert()
        .success()
        .stdout(predicate::str::contains("overall: PASS"));

    let tables = temp.child("S1_outputs/tables");
    let qc = std::fs::read_to_string(tables.child("qc_table.csv").path())?;
    assert!(qc.starts_with("metric,value,status,threshold\n"));
    assert!(qc.contains("linker_conservation_L1,0.95,PASS,0.9\n"));
    assert!(qc.contains("whitelist_mismatch_L1,0.0,PASS,0.05\n"));
    assert!(qc.contains("on_tissue_ratio,"));

    tables.child("L1_lane_anomalies.csv").assert(predicate::path::missing());
    tables.child("L2_lane_anomalies.csv").assert(predicate::path::missing());
    tables.child("spatial_table.csv").assert(predicate::path::exists());
    tables.child("tissue_spots.csv").assert(predicate::path::exists());
    let summary = std::fs::read_to_string(temp.child("S1_outputs/qc_summary.json").path())?;
    assert!(summary.contains("\"barcode_set\": \"bc96\""));
    assert!(summary.contains("\"lane_upper\""));

    Ok(())
}

#[test]
fn run_log_keeps_linker_details() -> TestResult {
    let temp = TempDir::new()?;
    write_data(&temp)?;
    write_calls(&temp, 0)?;

    analyze(&temp)?
        .env_remove("RUST_LOG")
        .assert()
        .success()
        .stderr(predicate::str::contains("unique barcodes").not());

    let log = temp.child("S1_outputs/logs/barcodeqc.log");
    log.assert(predicate::str::contains("L1: unique barcodes: 100"));
    log.assert(predicate::str::contains("L2: reads with a call: 1000"));

    Ok(())
}

#[test]
fn inflated_barcode_writes_one_anomaly_row() -> TestResult {
    let temp = TempDir::new()?;
    write_data(&temp)?;
    write_calls(&temp, 190)?;

    analyze(&temp)?
        .assert()
        .success()
        .stdout(predicate::str::contains("overall: CAUTION"));

    let anomalies = temp.child("S1_outputs/tables/L1_lane_anomalies.csv");
    let text = std::fs::read_to_string(anomalies.path())?;
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2, "{text}");
    assert_eq!(lines[0], "barcode,lane,count,flag");
    assert_eq!(lines[1], format!("{},0,200,HIGH", barcode(0)));

    temp.child("S1_outputs/tables/L2_lane_anomalies.csv")
        .assert(predicate::path::missing());

    Ok(())
}

#[test]
fn no_tissue_omits_the_tissue_metric() -> TestResult {
    let temp = TempDir::new()?;
    write_data(&temp)?;
    write_calls(&temp, 0)?;

    analyze(&temp)?.arg("--no-tissue").assert().success();

    let tables = temp.child("S1_outputs/tables");
    let qc = std::fs::read_to_string(tables.child("qc_table.csv").path())?;
    assert!(!qc.contains("on_tissue_ratio"));
    tables.child("tissue_spots.csv").assert(predicate::path::missing());
    tables.child("onoff_tissue_table.csv").assert(predicate::path::missing());

    Ok(())
}

#[test]
fn repeated_runs_are_identical() -> TestResult {
    let temp = TempDir::new()?;
    write_data(&temp)?;
    write_calls(&temp, 190)?;

    let qc_table = temp.child("S1_outputs/tables/qc_table.csv");
    analyze(&temp)?.assert().success();
    let first = std::fs::read_to_string(qc_table.path())?;
    analyze(&temp)?.assert().success();
    let second = std::fs::read_to_string(qc_table.path())?;
    assert_eq!(first, second);

    // a clean rerun into the same directory drops the stale anomaly table
    write_calls(&temp, 0)?;
    analyze(&temp)?.assert().success();
    temp.child("S1_outputs/tables/L1_lane_anomalies.csv")
        .assert(predicate::path::missing());

    Ok(())
}

#[test]
fn unknown_barcode_set_is_rejected() -> TestResult {
    let temp = TempDir::new()?;
    write_data(&temp)?;
    write_calls(&temp, 0)?;

    analyze_with_set(&temp, "bc51")?
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown barcode set"));

    Ok(())
}

#[test]
fn empty_calls_name_the_linker() -> TestResult {
    let temp = TempDir::new()?;
    write_data(&temp)?;
    write_calls(&temp, 0)?;

    // a passing run first, so the failed rerun has a verdict to leave behind
    analyze(&temp)?.assert().success();
    temp.child("S1_outputs/tables/qc_table.csv")
        .assert(predicate::path::exists());

    temp.child("wc_L2.txt").write_str("")?;
    analyze(&temp)?
        .assert()
        .failure()
        .stderr(predicate::str::contains("L2: the extraction step produced no barcode calls"));

    temp.child("S1_outputs/tables/qc_table.csv")
        .assert(predicate::path::missing());
    temp.child("S1_outputs/qc_summary.json")
        .assert(predicate::path::missing());

    Ok(())
}

#[test]
fn missing_default_tissue_table_is_reported() -> TestResult {
    let temp = TempDir::new()?;
    write_data(&temp)?;
    write_calls(&temp, 0)?;
    std::fs::remove_file(
        temp.child("data/position_files/x96_all_tissue_positions_list.csv")
            .path(),
    )?;

    analyze(&temp)?
        .assert()
        .failure()
        .stderr(predicate::str::contains("--no-tissue"));

    Ok(())
}

#[test]
fn dry_run_prints_commands() -> TestResult {
    let temp = TempDir::new()?;
    write_data(&temp)?;
    temp.child("r2.fastq").write_str("@r1\nACGT\n+\nIIII\n")?;

    Command::cargo_bin(BINARY)?
        .current_dir(temp.path())
        .arg("qc")
        .args(["--r2", "r2.fastq", "--sample-reads", "1000", "--dry-run"])
        .args(["--sample-name", "S1", "--barcode-set", "bc96", "--data-dir", "data"])
        .assert()
        .success()
        .stdout(predicate::str::contains("seqtk sample -s 42 r2.fastq 1000"))
        .stdout(predicate::str::contains("--wildcard-file"));

    temp.child("S1_outputs").assert(predicate::path::missing());

    Ok(())
}
