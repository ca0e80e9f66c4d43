//! Human-readable and tab-separated summaries of a benchmark record.
//!
//! Verbose output mirrors the figures GNOME Disks shows in its benchmark
//! dialog.  TSV output is one line per file for scripts: raw bytes/sec and
//! seconds, no unit conversion.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

use crate::error::Error;
use crate::record::{BenchmarkRecord, Sample};
use crate::stats::average_of_samples;

/// Right-justified width of the verbose labels.
pub const LABEL_WIDTH: usize = 22;
/// `%c` in the C locale, e.g. `Tue Nov 14 22:13:20 2023 UTC`.
pub const DEFAULT_TIME_FORMAT: &str = "%c %Z";

// ── Options ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Summary,
    Tsv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeZoneStyle {
    #[default]
    Utc,
    /// chrono knows no zone abbreviations for the local zone, so `%Z`
    /// renders as a numeric offset such as `+02:00`.
    Local,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid time format {0:?}")]
pub struct InvalidTimeFormat(pub String);

/// A strftime pattern chrono is known to be able to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeFormat(String);

impl TimeFormat {
    pub fn new(pattern: &str) -> Result<Self, InvalidTimeFormat> {
        if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
            return Err(InvalidTimeFormat(pattern.to_owned()));
        }
        Ok(Self(pattern.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TimeFormat {
    fn default() -> Self {
        Self(DEFAULT_TIME_FORMAT.to_owned())
    }
}

impl FromStr for TimeFormat {
    type Err = InvalidTimeFormat;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// How the benchmark timestamp is rendered.  No ambient locale is consulted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimeStyle {
    pub zone:   TimeZoneStyle,
    pub format: TimeFormat,
}

/// Everything the command line can change about a report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportOptions {
    pub mode: OutputMode,
    pub time: TimeStyle,
}

// ── Summary ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeriesAverage {
    pub mean:  f64,
    pub count: usize,
}

/// Every derived figure for one file.  Built in full before anything is
/// printed, so a file yields either a complete report or an error.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub device_size:    u64,
    pub timestamp_usec: u64,
    pub sample_size:    u64,
    /// bytes/sec
    pub read:           SeriesAverage,
    /// bytes/sec
    pub write:          SeriesAverage,
    /// seconds
    pub access_time:    SeriesAverage,
}

impl Summary {
    pub fn from_record(path: &Path, record: &BenchmarkRecord) -> Result<Self, Error> {
        let series = |name: &'static str, samples: &[Sample]| {
            average_of_samples(samples)
                .map(|mean| SeriesAverage { mean, count: samples.len() })
                .map_err(|_| Error::EmptySamples { path: path.to_owned(), series: name })
        };
        Ok(Self {
            device_size:    record.device_size,
            timestamp_usec: record.timestamp_usec,
            sample_size:    record.sample_size,
            read:           series("read samples", &record.read_samples)?,
            write:          series("write samples", &record.write_samples)?,
            access_time:    series("access time samples", &record.access_time_samples)?,
        })
    }

    pub fn render_verbose(&self, filename: &str, time: &TimeStyle) -> String {
        let mut out = format!("{filename}:\n");
        let mut line = |label: &str, value: String| {
            out.push_str(&format!("{label:>width$}  {value}\n", width = LABEL_WIDTH));
        };
        line("Disk or Device", format!("{} bytes", group_thousands(self.device_size)));
        line("Last Benchmarked", format_timestamp(self.timestamp_usec, time));
        line("Sample Size", format!("{} bytes", group_thousands(self.sample_size)));
        line(
            "Average Read Rate",
            format!("{:.1} MB/s ({} samples)", self.read.mean / 1e6, self.read.count),
        );
        line(
            "Average Write Rate",
            format!("{:.1} MB/s ({} samples)", self.write.mean / 1e6, self.write.count),
        );
        line(
            "Average Access Time",
            format!("{:.2} msec ({} samples)", self.access_time.mean * 1e3, self.access_time.count),
        );
        out
    }

    pub fn render_tsv(&self, filename: &str) -> String {
        format!(
            "{}\t{}\t{:.6}\t{}\n",
            self.read.mean.round_ties_even() as i64,
            self.write.mean.round_ties_even() as i64,
            self.access_time.mean,
            filename,
        )
    }
}

/// Render one decoded file in the requested mode.
pub fn render(path: &Path, record: &BenchmarkRecord, options: &ReportOptions) -> Result<String, Error> {
    let summary = Summary::from_record(path, record)?;
    let filename = path.display().to_string();
    Ok(match options.mode {
        OutputMode::Summary => summary.render_verbose(&filename, &options.time),
        OutputMode::Tsv => summary.render_tsv(&filename),
    })
}

// ── Formatting helpers ───────────────────────────────────────────────────────

/// `256060514304` → `256,060,514,304`.
pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn format_timestamp(usec: u64, style: &TimeStyle) -> String {
    let secs = (usec / 1_000_000) as i64;
    let nanos = (usec % 1_000_000) as u32 * 1_000;
    let Some(utc) = DateTime::from_timestamp(secs, nanos) else {
        return format!("{usec} µs after the epoch");
    };
    match style.zone {
        TimeZoneStyle::Utc => utc.format(style.format.as_str()).to_string(),
        TimeZoneStyle::Local => utc.with_timezone(&Local).format(style.format.as_str()).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    #[test]
    fn verbose_scenario() {
        let text = render(Path::new("sda.gvariant"), &scenario(), &ReportOptions::default()).unwrap();
        let expected = "\
sda.gvariant:
        Disk or Device  256,060,514,304 bytes
      Last Benchmarked  Tue Nov 14 22:13:20 2023 UTC
           Sample Size  1,048,576 bytes
     Average Read Rate  550.0 MB/s (2 samples)
    Average Write Rate  400.0 MB/s (1 samples)
   Average Access Time  15.00 msec (2 samples)
";
        assert_eq!(text, expected);
    }

    #[test]
    fn tsv_scenario() {
        let options = ReportOptions { mode: OutputMode::Tsv, ..Default::default() };
        let text = render(Path::new("sda.gvariant"), &scenario(), &options).unwrap();
        assert_eq!(text, "550000000\t400000000\t0.015000\tsda.gvariant\n");
    }

    #[test]
    fn tsv_rounds_half_to_even() {
        let mut record = scenario();
        record.read_samples = vec![Sample::new(0.0, 2.5)];
        record.write_samples = vec![Sample::new(0.0, 3.5)];
        let summary = Summary::from_record(Path::new("x"), &record).unwrap();
        assert!(summary.render_tsv("x").starts_with("2\t4\t"));
    }

    #[test]
    fn sample_counts_follow_series_lengths() {
        let mut record = scenario();
        record.read_samples = (0..37).map(|i| Sample::new(i as f64, 1e8)).collect();
        let summary = Summary::from_record(Path::new("x"), &record).unwrap();
        assert_eq!(summary.read.count, 37);
        assert!(summary.render_verbose("x", &TimeStyle::default()).contains("100.0 MB/s (37 samples)"));
    }

    #[test]
    fn empty_series_names_the_series() {
        let mut record = scenario();
        record.write_samples.clear();
        let err = Summary::from_record(Path::new("disk.gvariant"), &record).unwrap_err();
        assert!(matches!(err, Error::EmptySamples { series: "write samples", .. }));
        assert_eq!(err.to_string(), "disk.gvariant: no write samples to average");
    }

    #[test]
    fn thousands_grouping() {
        assert_eq!(group_thousands(0), "0");
        assert_eq!(group_thousands(999), "999");
        assert_eq!(group_thousands(1000), "1,000");
        assert_eq!(group_thousands(1_048_576), "1,048,576");
        assert_eq!(group_thousands(u64::MAX), "18,446,744,073,709,551,615");
    }

    #[test]
    fn custom_time_format() {
        let style = TimeStyle {
            zone:   TimeZoneStyle::Utc,
            format: TimeFormat::new("%Y-%m-%dT%H:%M:%S%.6fZ").unwrap(),
        };
        assert_eq!(format_timestamp(1_700_000_000_123_456, &style), "2023-11-14T22:13:20.123456Z");
    }

    #[test]
    fn time_format_validation() {
        assert!(TimeFormat::new("%F %T").is_ok());
        assert_eq!(TimeFormat::new("%Q"), Err(InvalidTimeFormat("%Q".into())));
        assert!("%Y %Q".parse::<TimeFormat>().is_err());
        assert_eq!(TimeFormat::default().as_str(), DEFAULT_TIME_FORMAT);
    }

    #[test]
    fn local_zone_renders_without_error() {
        let style = TimeStyle { zone: TimeZoneStyle::Local, format: TimeFormat::default() };
        let text = format_timestamp(1_700_000_000_000_000, &style);
        assert!(text.contains("2023"));
    }
}
