//! Aggregation of a contiguous range of samples into one value.
//!
//! Every function operates on the inclusive index range `[start, end]` of a sample sequence.
//! Callers guarantee `start <= end < samples.len()`.

use crate::models::{Aggregation, Sample};

/// Reduce the inclusive range `[start, end]` of `samples` to a single value.
///
/// # Arguments
///
/// * `aggregation`: Reducer to apply
/// * `samples`: Complete sample sequence. `Delta` reads the sample preceding `start`.
/// * `start`: Index of the first sample in the range
/// * `end`: Index of the last sample in the range
pub fn aggregate(aggregation: Aggregation, samples: &[Sample], start: usize, end: usize) -> f64 {
    debug_assert!(start <= end && end < samples.len());
    match aggregation {
        Aggregation::Sample => last_of(samples, end),
        Aggregation::Delta => delta_of(samples, start, end),
        Aggregation::Min => min_of(samples, start, end),
        Aggregation::Max => max_of(samples, start, end),
        Aggregation::Sum => sum_of(samples, start, end),
        Aggregation::Average => average_of(samples, start, end),
    }
}

fn values(samples: &[Sample], start: usize, end: usize) -> impl Iterator<Item = f64> + '_ {
    samples[start..=end].iter().map(|sample| sample.value)
}

fn last_of(samples: &[Sample], end: usize) -> f64 {
    samples[end].value
}

/// Change since the sample before the range. Without a left neighbour the change is measured
/// from the first sample of the range, so a single-sample range yields 0.
fn delta_of(samples: &[Sample], start: usize, end: usize) -> f64 {
    let reference = if start == 0 { start } else { start - 1 };
    samples[end].value - samples[reference].value
}

fn min_of(samples: &[Sample], start: usize, end: usize) -> f64 {
    values(samples, start, end).fold(f64::INFINITY, f64::min)
}

fn max_of(samples: &[Sample], start: usize, end: usize) -> f64 {
    values(samples, start, end).fold(f64::NEG_INFINITY, f64::max)
}

fn sum_of(samples: &[Sample], start: usize, end: usize) -> f64 {
    values(samples, start, end).sum()
}

fn average_of(samples: &[Sample], start: usize, end: usize) -> f64 {
    sum_of(samples, start, end) / (end - start + 1) as f64
}
