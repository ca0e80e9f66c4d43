use thiserror::Error;

use crate::record::Sample;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot average an empty sample series")]
pub struct EmptySamples;

/// Arithmetic mean of the sample values; offsets play no part.
///
/// Computed as a running mean, so a series of identical values averages to
/// exactly that value.
pub fn average_of_samples(samples: &[Sample]) -> Result<f64, EmptySamples> {
    if samples.is_empty() {
        return Err(EmptySamples);
    }
    let mut mean = 0.0;
    for (n, sample) in samples.iter().enumerate() {
        mean += (sample.value - mean) / (n + 1) as f64;
    }
    Ok(mean)
}
