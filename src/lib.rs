pub mod variant;
pub mod record;
pub mod stats;
pub mod report;
pub mod error;

use std::path::Path;

pub use error::{Error, ErrorKind, FormatError};
pub use record::{read_benchmark_file, BenchmarkRecord, Sample};
pub use report::{OutputMode, ReportOptions, TimeFormat, TimeStyle, TimeZoneStyle};
pub use stats::{average_of_samples, EmptySamples};
pub use variant::{Value, VariantError, VariantRef, VariantType};

/// Decode one benchmark cache file and render it.  The file is unmapped
/// before rendering starts.
pub fn summarize<P: AsRef<Path>>(path: P, options: &ReportOptions) -> Result<String, Error> {
    let path = path.as_ref();
    let record = read_benchmark_file(path)?;
    report::render(path, &record, options)
}
