//! Reduction of an ascending sample sequence to a bounded output.
//!
//! Two policies are supported, selected by the query's [TimeModel](crate::models::TimeModel):
//!
//! * Decimation: the sequence is cut into fixed-size windows from the newest sample backwards,
//!   producing at most `max_points` samples.
//! * Calendar bucketing: one sample per completed local day, week or month.
//!
//! The downsampler performs no I/O and never reorders its input.

use crate::aggregation::aggregate;
use crate::calendar;
use crate::models::{Aggregation, CalendarPeriod, QuerySpec, Sample};

use chrono::{DateTime, TimeZone, Utc};

/// Reduce `samples` according to the query's time model and aggregation.
///
/// # Arguments
///
/// * `samples`: Samples in ascending timestamp order
/// * `spec`: Validated query
/// * `tz`: Timezone of the sensor's project
pub fn downsample<Tz: TimeZone>(samples: &[Sample], spec: &QuerySpec, tz: &Tz) -> Vec<Sample> {
    let align = spec.align.then_some(tz);
    match spec.time_model.period() {
        None => decimate(samples, spec.max_points, spec.aggregation, align),
        Some(period) => bucket(samples, period, spec.aggregation, tz, spec.align),
    }
}

/// Reduce `samples` to at most `max_points` samples using fixed-size windows.
///
/// Windows are carved from the newest sample backwards, so that the most recent data is always
/// represented. Each window is labelled with the timestamp of its last sample, floored to the
/// local 5-minute mark when `align` carries a timezone. Samples at the old end that do not fill
/// a complete window are dropped.
pub fn decimate<Tz: TimeZone>(
    samples: &[Sample],
    max_points: usize,
    aggregation: Aggregation,
    align: Option<&Tz>,
) -> Vec<Sample> {
    let length = samples.len();
    if length == 0 || max_points == 0 {
        return vec![];
    }
    let factor = length / max_points + 1;
    let output_size = length / factor;
    tracing::debug!(
        "Reducing {} samples to at most {} by factor {}",
        length,
        max_points,
        factor
    );

    let mut reduced = Vec::with_capacity(output_size);
    let mut start = length;
    for _ in 0..output_size {
        let end = start - 1;
        start -= factor;
        let timestamp = match align {
            Some(tz) => calendar::align_sample(&samples[end].timestamp, tz),
            None => samples[end].timestamp,
        };
        reduced.push(Sample::new(
            timestamp,
            aggregate(aggregation, samples, start, end),
        ));
    }
    reduced.reverse();
    reduced
}

/// Reduce `samples` to one sample per completed local calendar period.
///
/// The first anchor is the first sample lying at the start of a period (see
/// [calendar::is_period_start]), or the first sample when there is none. Samples before the
/// anchor are ignored. Each time a sample crosses into a new period, the samples since the
/// previous crossing are aggregated and emitted at the anchor's timestamp (or the start of the
/// anchor's period when `align` is set). The trailing period is incomplete and is not emitted.
pub fn bucket<Tz: TimeZone>(
    samples: &[Sample],
    period: CalendarPeriod,
    aggregation: Aggregation,
    tz: &Tz,
    align: bool,
) -> Vec<Sample> {
    let first = match samples
        .iter()
        .position(|sample| calendar::is_period_start(period, &sample.timestamp, tz))
    {
        Some(index) => index,
        None if samples.is_empty() => return vec![],
        None => 0,
    };
    tracing::debug!(
        "Bucketing {} samples by {:?} from index {}",
        samples.len() - first,
        period,
        first
    );

    let label = |anchor: DateTime<Utc>| {
        if align {
            calendar::bucket_start(period, &anchor, tz)
        } else {
            anchor
        }
    };

    let mut reduced = vec![];
    let mut anchor = samples[first].timestamp;
    let mut start = first;
    for (index, sample) in samples.iter().enumerate().skip(first + 1) {
        if calendar::differs(period, &sample.timestamp, &anchor, tz) {
            reduced.push(Sample::new(
                label(anchor),
                aggregate(aggregation, samples, start, index - 1),
            ));
            start = index;
            anchor = sample.timestamp;
        }
    }
    reduced
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TimeModel;
    use crate::test_utils::{get_test_query_spec, sample_at, series, ts};

    use chrono::Duration;

    fn decimate_utc(samples: &[Sample], max_points: usize, aggregation: Aggregation) -> Vec<Sample> {
        decimate::<Utc>(samples, max_points, aggregation, None)
    }

    #[test]
    fn decimate_empty() {
        assert!(decimate_utc(&[], 10, Aggregation::Sum).is_empty());
    }

    #[test]
    fn decimate_zero_max_points() {
        let samples = series(ts(2023, 1, 1, 0, 0), Duration::minutes(1), 10);
        assert!(decimate_utc(&samples, 0, Aggregation::Sum).is_empty());
    }

    #[test]
    fn decimate_identity_below_max_points() {
        let samples = series(ts(2023, 1, 1, 0, 0), Duration::minutes(1), 10);
        assert_eq!(samples, decimate_utc(&samples, 11, Aggregation::Sample));
        assert_eq!(samples, decimate_utc(&samples, 1000, Aggregation::Sample));
    }

    #[test]
    fn decimate_trailing_window() {
        // factor = 4 / 2 + 1 = 3, one window over the newest three samples.
        let samples = vec![
            sample_at(0, 1.0),
            sample_at(1, 3.0),
            sample_at(2, 5.0),
            sample_at(3, 7.0),
        ];
        let reduced = decimate_utc(&samples, 2, Aggregation::Average);
        assert_eq!(vec![sample_at(3, 5.0)], reduced);
    }

    #[test]
    fn decimate_windows_are_labelled_with_last_sample() {
        // factor = 10 / 3 + 1 = 4, two windows [2..=5] and [6..=9], samples 0 and 1 dropped.
        let samples = series(ts(2023, 1, 1, 0, 0), Duration::minutes(1), 10);
        let reduced = decimate_utc(&samples, 3, Aggregation::Sum);
        assert_eq!(
            vec![
                Sample::new(samples[5].timestamp, 2.0 + 3.0 + 4.0 + 5.0),
                Sample::new(samples[9].timestamp, 6.0 + 7.0 + 8.0 + 9.0),
            ],
            reduced
        );
    }

    #[test]
    fn decimate_equal_to_max_points_halves() {
        let samples = series(ts(2023, 1, 1, 0, 0), Duration::minutes(1), 4);
        let reduced = decimate_utc(&samples, 4, Aggregation::Max);
        assert_eq!(
            vec![
                Sample::new(samples[1].timestamp, 1.0),
                Sample::new(samples[3].timestamp, 3.0),
            ],
            reduced
        );
    }

    #[test]
    fn decimate_delta_reads_previous_window() {
        // factor 2: windows [0..=1], [2..=3], [4..=5]
        let samples = series(ts(2023, 1, 1, 0, 0), Duration::minutes(1), 6);
        let reduced = decimate_utc(&samples, 4, Aggregation::Delta);
        let values: Vec<f64> = reduced.iter().map(|s| s.value).collect();
        assert_eq!(vec![1.0, 2.0, 2.0], values);
    }

    #[test]
    fn decimate_bounds() {
        let samples = series(ts(2023, 1, 1, 0, 0), Duration::seconds(7), 1000);
        for max_points in [2, 3, 7, 10, 99, 500, 999, 1000, 1001, 5000] {
            let reduced = decimate_utc(&samples, max_points, Aggregation::Average);
            assert!(reduced.len() <= max_points, "max_points {max_points}");
            assert!(reduced.len() <= samples.len());
            assert!(reduced
                .windows(2)
                .all(|pair| pair[0].timestamp <= pair[1].timestamp));
            assert_eq!(samples.last().unwrap().timestamp, reduced.last().unwrap().timestamp);
        }
    }

    #[test]
    fn decimate_single_point_budget() {
        // factor = n + 1 exceeds the input, so no complete window exists.
        let samples = series(ts(2023, 1, 1, 0, 0), Duration::minutes(1), 10);
        assert!(decimate_utc(&samples, 1, Aggregation::Sum).is_empty());
    }

    #[test]
    fn decimate_aligned_labels() {
        let samples = series(ts(2023, 1, 1, 0, 0), Duration::minutes(1), 12);
        let reduced = decimate(&samples, 3, Aggregation::Sample, Some(&Utc));
        // factor 5: windows end at minutes 6 and 11.
        assert_eq!(
            vec![
                Sample::new(ts(2023, 1, 1, 0, 5), 6.0),
                Sample::new(ts(2023, 1, 1, 0, 10), 11.0),
            ],
            reduced
        );
    }

    #[test]
    fn bucket_empty() {
        assert!(bucket(&[], CalendarPeriod::Day, Aggregation::Sum, &Utc, false).is_empty());
    }

    #[test]
    fn bucket_daily_drops_trailing_day() {
        let samples = series(ts(2023, 1, 1, 0, 0), Duration::hours(1), 72);
        let reduced = bucket(&samples, CalendarPeriod::Day, Aggregation::Sum, &Utc, false);
        let day_sum = |day: usize| (day * 24..(day + 1) * 24).sum::<usize>() as f64;
        assert_eq!(
            vec![
                Sample::new(ts(2023, 1, 1, 0, 0), day_sum(0)),
                Sample::new(ts(2023, 1, 2, 0, 0), day_sum(1)),
            ],
            reduced
        );
    }

    #[test]
    fn bucket_anchor_is_first_period_start() {
        // Starts at 20:00, so the first four samples precede the first local midnight.
        let samples = series(ts(2023, 1, 1, 20, 0), Duration::hours(1), 4 + 48 + 1);
        let reduced = bucket(&samples, CalendarPeriod::Day, Aggregation::Min, &Utc, false);
        assert_eq!(
            vec![
                Sample::new(ts(2023, 1, 2, 0, 0), 4.0),
                Sample::new(ts(2023, 1, 3, 0, 0), 28.0),
            ],
            reduced
        );
    }

    #[test]
    fn bucket_anchor_defaults_to_first_sample() {
        // Hourly from 01:00 to 23:00 on consecutive days never hits local midnight.
        let samples: Vec<Sample> = (0..3)
            .flat_map(|day| (1..24).map(move |hour| ts(2023, 1, 1 + day, hour, 0)))
            .enumerate()
            .map(|(i, t)| Sample::new(t, i as f64))
            .collect();
        let reduced = bucket(&samples, CalendarPeriod::Day, Aggregation::Max, &Utc, false);
        assert_eq!(
            vec![
                Sample::new(ts(2023, 1, 1, 1, 0), 22.0),
                Sample::new(ts(2023, 1, 2, 1, 0), 45.0),
            ],
            reduced
        );
    }

    #[test]
    fn bucket_daily_in_local_timezone() {
        let tz = chrono_tz::Europe::Oslo;
        // Local midnight on 2 January is 23:00 UTC on 1 January.
        let samples = series(ts(2023, 1, 1, 20, 0), Duration::hours(1), 30);
        let reduced = bucket(&samples, CalendarPeriod::Day, Aggregation::Sample, &tz, false);
        assert_eq!(vec![Sample::new(ts(2023, 1, 1, 23, 0), 26.0)], reduced);
    }

    #[test]
    fn bucket_weekly() {
        // Monday 2 January 2023, daily samples for three weeks.
        let samples = series(ts(2023, 1, 2, 12, 0), Duration::days(1), 21);
        let reduced = bucket(&samples, CalendarPeriod::Week, Aggregation::Average, &Utc, false);
        assert_eq!(
            vec![
                Sample::new(ts(2023, 1, 2, 12, 0), 3.0),
                Sample::new(ts(2023, 1, 9, 12, 0), 10.0),
            ],
            reduced
        );
    }

    #[test]
    fn bucket_monthly_delta() {
        // 1 January 2023 to 10 April 2023, daily.
        let samples = series(ts(2023, 1, 1, 0, 0), Duration::days(1), 100);
        let reduced = bucket(&samples, CalendarPeriod::Month, Aggregation::Delta, &Utc, false);
        // January: 30 - 0. February: 58 - 30. March: 89 - 58.
        assert_eq!(
            vec![
                Sample::new(ts(2023, 1, 1, 0, 0), 30.0),
                Sample::new(ts(2023, 2, 1, 0, 0), 28.0),
                Sample::new(ts(2023, 3, 1, 0, 0), 31.0),
            ],
            reduced
        );
    }

    #[test]
    fn bucket_aligned_labels() {
        let samples = series(ts(2023, 1, 4, 6, 30), Duration::days(1), 20);
        let reduced = bucket(&samples, CalendarPeriod::Week, Aggregation::Sum, &Utc, true);
        // The first Monday sample is 9 January 06:30.
        assert_eq!(
            vec![
                Sample::new(ts(2023, 1, 9, 0, 0), (5..12).sum::<usize>() as f64),
                Sample::new(ts(2023, 1, 16, 0, 0), (12..19).sum::<usize>() as f64),
            ],
            reduced
        );
    }

    #[test]
    fn downsample_dispatches_on_time_model() {
        let samples = series(ts(2023, 1, 1, 0, 0), Duration::hours(1), 72);
        let mut spec = get_test_query_spec();
        spec.max_points = 10;
        spec.aggregation = Aggregation::Sum;
        assert!(downsample(&samples, &spec, &Utc).len() <= 10);
        spec.time_model = TimeModel::Daily;
        assert_eq!(2, downsample(&samples, &spec, &Utc).len());
    }

    #[test]
    fn downsample_is_deterministic() {
        let samples = series(ts(2023, 1, 1, 0, 0), Duration::minutes(13), 5000);
        let mut spec = get_test_query_spec();
        spec.aggregation = Aggregation::Average;
        spec.max_points = 333;
        let first = downsample(&samples, &spec, &Utc);
        let second = downsample(&samples, &spec, &Utc);
        assert_eq!(first, second);
    }
}
