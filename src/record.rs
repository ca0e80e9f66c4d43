//! Typed view of a GNOME Disks benchmark cache file.
//!
//! GNOME Disks writes one `a{sv}` dictionary per device.  Only the keys below
//! are read; anything else in the dictionary is skipped without decoding.
//!
//! | Key | Written as | Meaning |
//! |-----|------------|---------|
//! | `version` | `i` | must be 1 |
//! | `timestamp-usec` | `x` | wall clock at the end of the run, µs since the epoch |
//! | `device-size` | `t` | bytes |
//! | `sample-size` | `t` | bytes transferred per sample |
//! | `read-samples` | `a(dd)` | (offset, bytes/sec) |
//! | `write-samples` | `a(dd)` | (offset, bytes/sec) |
//! | `access-time-samples` | `a(dd)` | (offset, seconds) |

use memmap2::Mmap;
use std::fs::File;
use std::io;
use std::path::Path;

use crate::error::{Error, FormatError};
use crate::variant::{Value, VariantError, VariantRef, VariantType};

pub const BENCHMARK_VERSION: i64 = 1;
pub const ROOT_TYPE: &str = "a{sv}";

const VERSION: &str = "version";
const DEVICE_SIZE: &str = "device-size";
const TIMESTAMP_USEC: &str = "timestamp-usec";
const SAMPLE_SIZE: &str = "sample-size";
const READ_SAMPLES: &str = "read-samples";
const WRITE_SAMPLES: &str = "write-samples";
const ACCESS_TIME_SAMPLES: &str = "access-time-samples";

/// One measurement: where on the device, and what was measured there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub offset: f64,
    pub value:  f64,
}

impl Sample {
    pub fn new(offset: f64, value: f64) -> Self {
        Self { offset, value }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BenchmarkRecord {
    pub device_size:         u64,
    pub timestamp_usec:      u64,
    pub sample_size:         u64,
    pub read_samples:        Vec<Sample>,
    pub write_samples:       Vec<Sample>,
    pub access_time_samples: Vec<Sample>,
}

impl BenchmarkRecord {
    /// Decode a serialised `a{sv}` benchmark dictionary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FormatError> {
        Self::from_variant(&VariantRef::new(VariantType::parse(ROOT_TYPE)?, data))
    }

    /// Extract the record from an already typed root value.
    ///
    /// `version` is checked before anything else is read, so a newer file
    /// layout is reported as such rather than as corruption.
    pub fn from_variant(root: &VariantRef<'_>) -> Result<Self, FormatError> {
        if root.ty().to_string() != ROOT_TYPE {
            return Err(FormatError::WrongRoot(root.ty().to_string()));
        }

        let version = root
            .lookup(VERSION)?
            .ok_or(FormatError::MissingKey(VERSION))
            .and_then(|v| field(VERSION, v.as_variant().and_then(|v| v.as_i64())))?;
        if version != BENCHMARK_VERSION {
            return Err(FormatError::UnsupportedVersion(version));
        }

        let mut device_size = None;
        let mut timestamp_usec = None;
        let mut sample_size = None;
        let mut read_samples = None;
        let mut write_samples = None;
        let mut access_time_samples = None;

        for entry in root.elements()? {
            let (key, value) = entry.entry()?;
            let key = key.as_str()?;
            // First occurrence wins, as with `lookup`.
            match key {
                DEVICE_SIZE if device_size.is_none() => {
                    device_size = Some(unsigned(DEVICE_SIZE, &value)?)
                }
                TIMESTAMP_USEC if timestamp_usec.is_none() => {
                    timestamp_usec = Some(unsigned(TIMESTAMP_USEC, &value)?)
                }
                SAMPLE_SIZE if sample_size.is_none() => {
                    sample_size = Some(unsigned(SAMPLE_SIZE, &value)?)
                }
                READ_SAMPLES if read_samples.is_none() => {
                    read_samples = Some(samples(READ_SAMPLES, &value)?)
                }
                WRITE_SAMPLES if write_samples.is_none() => {
                    write_samples = Some(samples(WRITE_SAMPLES, &value)?)
                }
                ACCESS_TIME_SAMPLES if access_time_samples.is_none() => {
                    access_time_samples = Some(samples(ACCESS_TIME_SAMPLES, &value)?)
                }
                VERSION => {}
                DEVICE_SIZE | TIMESTAMP_USEC | SAMPLE_SIZE | READ_SAMPLES | WRITE_SAMPLES
                | ACCESS_TIME_SAMPLES => log::debug!("ignoring repeated key '{key}'"),
                other => log::debug!("skipping unrecognised key '{other}'"),
            }
        }

        Ok(Self {
            device_size:         device_size.ok_or(FormatError::MissingKey(DEVICE_SIZE))?,
            timestamp_usec:      timestamp_usec.ok_or(FormatError::MissingKey(TIMESTAMP_USEC))?,
            sample_size:         sample_size.ok_or(FormatError::MissingKey(SAMPLE_SIZE))?,
            read_samples:        read_samples.ok_or(FormatError::MissingKey(READ_SAMPLES))?,
            write_samples:       write_samples.ok_or(FormatError::MissingKey(WRITE_SAMPLES))?,
            access_time_samples: access_time_samples
                .ok_or(FormatError::MissingKey(ACCESS_TIME_SAMPLES))?,
        })
    }

    /// The dictionary GNOME Disks would have written for this record.
    pub fn to_value(&self) -> Value {
        let series = |samples: &[Sample]| {
            Value::Array(
                VariantType::Tuple(vec![VariantType::Double, VariantType::Double]),
                samples
                    .iter()
                    .map(|s| Value::Tuple(vec![Value::Double(s.offset), Value::Double(s.value)]))
                    .collect(),
            )
        };
        Value::dict([
            (VERSION, Value::Int32(BENCHMARK_VERSION as i32)),
            (TIMESTAMP_USEC, Value::Uint64(self.timestamp_usec)),
            (DEVICE_SIZE, Value::Uint64(self.device_size)),
            (SAMPLE_SIZE, Value::Uint64(self.sample_size)),
            (READ_SAMPLES, series(&self.read_samples)),
            (WRITE_SAMPLES, series(&self.write_samples)),
            (ACCESS_TIME_SAMPLES, series(&self.access_time_samples)),
        ])
    }
}

fn field<T>(key: &'static str, result: Result<T, VariantError>) -> Result<T, FormatError> {
    result.map_err(|source| FormatError::Field { key, source })
}

fn unsigned(key: &'static str, value: &VariantRef<'_>) -> Result<u64, FormatError> {
    field(key, value.as_variant().and_then(|v| v.as_u64()))
}

/// Integers are widened so that `a(td)` and `a(xd)` read like `a(dd)`.
fn number(value: &VariantRef<'_>) -> Result<f64, VariantError> {
    if value.ty().is_integer() {
        match value.as_i64() {
            Ok(v) => Ok(v as f64),
            Err(_) => Ok(value.as_u64()? as f64),
        }
    } else {
        value.as_f64()
    }
}

fn samples(key: &'static str, value: &VariantRef<'_>) -> Result<Vec<Sample>, FormatError> {
    let series = field(key, value.as_variant())?;
    let is_pair = |ty: &VariantType| {
        matches!(ty, VariantType::Tuple(m) if m.len() == 2
            && m.iter().all(|t| t.is_integer() || *t == VariantType::Double))
    };
    match series.ty() {
        VariantType::Array(elem) if is_pair(elem.as_ref()) => {}
        other => {
            return Err(FormatError::Field {
                key,
                source: VariantError::TypeMismatch { expected: "'a(dd)'", found: other.to_string() },
            })
        }
    }

    let elements = field(key, series.elements())?;
    let mut out = Vec::with_capacity(elements.len());
    for element in elements {
        let pair = field(key, element.items())?;
        out.push(Sample {
            offset: field(key, number(&pair[0]))?,
            value:  field(key, number(&pair[1]))?,
        });
    }
    Ok(out)
}

/// Memory-map `path` and decode it.
///
/// The mapping is dropped before this returns, whether or not decoding
/// succeeded; the record owns copies of everything it needs.
pub fn read_benchmark_file<P: AsRef<Path>>(path: P) -> Result<BenchmarkRecord, Error> {
    let path = path.as_ref();
    let io_err = |source: io::Error| Error::Io { path: path.to_owned(), source };

    let file = File::open(path).map_err(io_err)?;
    if file.metadata().map_err(io_err)?.len() == 0 {
        return BenchmarkRecord::from_bytes(&[]).map_err(|e| Error::format(path, e));
    }
    // SAFETY: the map is read-only and private to this call. A concurrent
    // truncation by GNOME Disks could fault, which the cache's
    // write-then-rename update does not do.
    let map = unsafe { Mmap::map(&file) }.map_err(io_err)?;
    log::debug!("mapped {} ({} bytes)", path.display(), map.len());

    BenchmarkRecord::from_bytes(&map).map_err(|e| Error::format(path, e))
}
