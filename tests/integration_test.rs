use assert_cmd::Command;
use gdubm::report::{OutputMode, ReportOptions};
use gdubm::{read_benchmark_file, BenchmarkRecord, ErrorKind, Sample, Value};
use predicates::prelude::*;
use std::fs::File;
use std::path::Path;
use tempfile::{tempdir, NamedTempFile};

fn scenario() -> BenchmarkRecord {
    BenchmarkRecord {
        device_size:         256_060_514_304,
        timestamp_usec:      1_700_000_000_000_000,
        sample_size:         1_048_576,
        read_samples:        vec![Sample::new(0.0, 500_000_000.0), Sample::new(1000.0, 600_000_000.0)],
        write_samples:       vec![Sample::new(0.0, 400_000_000.0)],
        access_time_samples: vec![Sample::new(0.0, 0.012), Sample::new(500.0, 0.018)],
    }
}

fn write_value(path: &Path, value: &Value) {
    value.write(File::create(path).unwrap()).unwrap();
}

#[test]
fn test_file_roundtrip() {
    let temp_file = NamedTempFile::new().unwrap();
    write_value(temp_file.path(), &scenario().to_value());

    let record = read_benchmark_file(temp_file.path()).unwrap();
    assert_eq!(record.device_size, 256_060_514_304);
    assert_eq!(record.timestamp_usec, 1_700_000_000_000_000);
    assert_eq!(record.sample_size, 1_048_576);
    assert_eq!(record.read_samples.len(), 2);
    for (got, want) in record.access_time_samples.iter().zip(&scenario().access_time_samples) {
        assert_eq!(got.offset, want.offset);
        assert!((got.value - want.value).abs() < 1e-12);
    }
}

#[test]
fn test_summarize_tsv() {
    let temp_file = NamedTempFile::new().unwrap();
    write_value(temp_file.path(), &scenario().to_value());

    let options = ReportOptions { mode: OutputMode::Tsv, ..Default::default() };
    let line = gdubm::summarize(temp_file.path(), &options).unwrap();
    assert_eq!(line, format!("550000000\t400000000\t0.015000\t{}\n", temp_file.path().display()));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("absent.gvariant");
    let err = read_benchmark_file(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert_eq!(err.path(), path);
    assert!(err.to_string().starts_with(&path.display().to_string()));
}

#[test]
fn test_garbage_is_format_error() {
    let temp_file = NamedTempFile::new().unwrap();
    std::fs::write(temp_file.path(), b"this is not a gvariant dictionary at all").unwrap();
    let err = read_benchmark_file(temp_file.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_empty_file_is_format_error() {
    let temp_file = NamedTempFile::new().unwrap();
    let err = read_benchmark_file(temp_file.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(err.to_string().contains("missing required key 'version'"));
}

#[test]
fn test_version_mismatch_is_distinct() {
    let temp_file = NamedTempFile::new().unwrap();
    write_value(temp_file.path(), &Value::dict([("version", Value::Int32(2))]));
    let err = read_benchmark_file(temp_file.path()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
    assert!(err.to_string().contains("version 2 is not supported"));
}

#[test]
fn test_empty_read_samples() {
    let temp_file = NamedTempFile::new().unwrap();
    let mut record = scenario();
    record.read_samples.clear();
    write_value(temp_file.path(), &record.to_value());

    let err = gdubm::summarize(temp_file.path(), &ReportOptions::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::EmptySamples);
}

// ── CLI ──────────────────────────────────────────────────────────────────────

fn cli() -> Command {
    Command::cargo_bin("gdubm-summarize").unwrap()
}

#[test]
fn test_cli_verbose_blocks_in_order() {
    let dir = tempdir().unwrap();
    let first = dir.path().join("first.gvariant");
    let second = dir.path().join("second.gvariant");
    write_value(&first, &scenario().to_value());
    let mut other = scenario();
    other.write_samples = vec![Sample::new(0.0, 100e6), Sample::new(1.0, 300e6), Sample::new(2.0, 200e6)];
    write_value(&second, &other.to_value());

    let output = cli().arg(&first).arg(&second).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();

    let a = stdout.find(&format!("{}:", first.display())).unwrap();
    let b = stdout.find(&format!("{}:", second.display())).unwrap();
    assert!(a < b);
    assert!(stdout[..b].contains("   Average Read Rate  550.0 MB/s (2 samples)"));
    assert!(stdout[..b].contains("  Average Write Rate  400.0 MB/s (1 samples)"));
    assert!(stdout[..b].contains(" Average Access Time  15.00 msec (2 samples)"));
    assert!(stdout[b..].contains("Average Write Rate  200.0 MB/s (3 samples)"));
    assert!(stdout.contains("Last Benchmarked  Tue Nov 14 22:13:20 2023 UTC"));
}

#[test]
fn test_cli_tsv() {
    let temp_file = NamedTempFile::new().unwrap();
    write_value(temp_file.path(), &scenario().to_value());

    cli()
        .arg("--tsv")
        .arg(temp_file.path())
        .assert()
        .success()
        .stdout(format!("550000000\t400000000\t0.015000\t{}\n", temp_file.path().display()));
}

#[test]
fn test_cli_continues_after_failure() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("missing.gvariant");
    let good = dir.path().join("good.gvariant");
    write_value(&good, &scenario().to_value());

    cli()
        .arg("-t")
        .arg(&missing)
        .arg(&good)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("missing.gvariant"))
        .stdout(predicate::str::contains("good.gvariant"));
}

#[test]
fn test_cli_custom_time_format() {
    let temp_file = NamedTempFile::new().unwrap();
    write_value(temp_file.path(), &scenario().to_value());

    cli()
        .args(["--time-format", "%Y-%m-%d %H:%M"])
        .arg(temp_file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Last Benchmarked  2023-11-14 22:13"));
}

#[test]
fn test_cli_local_time() {
    let temp_file = NamedTempFile::new().unwrap();
    write_value(temp_file.path(), &scenario().to_value());

    cli()
        .args(["--local-time", "--time-format", "%Y %Z"])
        .arg(temp_file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Last Benchmarked  2023 "));
}

#[test]
fn test_cli_argument_errors() {
    cli().assert().code(2);
    cli().args(["--bogus", "x"]).assert().code(2);
    cli().args(["--time-format", "%Q", "x"]).assert().code(2);
}
