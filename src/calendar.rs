//! Timezone-aware calendar alignment.
//!
//! All functions localise instants into the supplied timezone before looking at calendar fields.
//! They are generic over [chrono::TimeZone] so that IANA zones ([chrono_tz::Tz]) and synthetic
//! fixed offsets can be used interchangeably.

use crate::models::CalendarPeriod;

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveTime, Offset, TimeZone, Timelike, Utc, Weekday,
};

/// Granularity in minutes of the labels assigned to aligned decimation windows.
pub const SAMPLE_ALIGNMENT_MINUTES: u32 = 5;

/// Returns true when `sample` and `anchor` fall into different local calendar periods.
///
/// # Arguments
///
/// * `period`: Calendar period to compare
/// * `sample`: Instant being classified
/// * `anchor`: Instant identifying the current period
/// * `tz`: Timezone in which the calendar is evaluated
pub fn differs<Tz: TimeZone>(
    period: CalendarPeriod,
    sample: &DateTime<Utc>,
    anchor: &DateTime<Utc>,
    tz: &Tz,
) -> bool {
    let sample = sample.with_timezone(tz);
    let anchor = anchor.with_timezone(tz);
    match period {
        CalendarPeriod::Day => sample.date_naive() != anchor.date_naive(),
        CalendarPeriod::Week => sample.iso_week() != anchor.iso_week(),
        CalendarPeriod::Month => {
            (sample.year(), sample.month()) != (anchor.year(), anchor.month())
        }
    }
}

/// Returns true when `sample` lies at the start of its local period: within the midnight hour
/// for days, on a Monday for weeks and on the first of the month for months.
pub fn is_period_start<Tz: TimeZone>(
    period: CalendarPeriod,
    sample: &DateTime<Utc>,
    tz: &Tz,
) -> bool {
    let local = sample.with_timezone(tz);
    match period {
        CalendarPeriod::Day => local.hour() == 0,
        CalendarPeriod::Week => local.weekday() == Weekday::Mon,
        CalendarPeriod::Month => local.day() == 1,
    }
}

/// Returns the first instant of the local period containing `sample`.
///
/// This is local midnight of the day, of the preceding (or same) Monday, or of the first of the
/// month. If a DST transition skips local midnight, the first existing local time of that day is
/// used instead.
pub fn bucket_start<Tz: TimeZone>(
    period: CalendarPeriod,
    sample: &DateTime<Utc>,
    tz: &Tz,
) -> DateTime<Utc> {
    let date = sample.with_timezone(tz).date_naive();
    let first = match period {
        CalendarPeriod::Day => date,
        CalendarPeriod::Week => {
            date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
        }
        CalendarPeriod::Month => date.with_day(1).unwrap_or(date),
    };
    start_of_day(first, tz)
}

/// Floors `sample` to the preceding local [SAMPLE_ALIGNMENT_MINUTES] mark.
pub fn align_sample<Tz: TimeZone>(sample: &DateTime<Utc>, tz: &Tz) -> DateTime<Utc> {
    let local = sample.with_timezone(tz);
    let offset = local.offset().fix();
    let naive = local.naive_local();
    let minute = naive.minute() - naive.minute() % SAMPLE_ALIGNMENT_MINUTES;
    match naive.date().and_hms_opt(naive.hour(), minute, 0) {
        Some(floored) => DateTime::from_naive_utc_and_offset(
            floored - Duration::seconds(i64::from(offset.local_minus_utc())),
            Utc,
        ),
        None => *sample,
    }
}

/// First existing local instant of `date`.
fn start_of_day<Tz: TimeZone>(date: NaiveDate, tz: &Tz) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    // DST gaps are at most a few hours; probe in quarter-hour steps.
    for step in 0..(24 * 4) {
        let candidate = midnight + Duration::minutes(15 * step);
        if let Some(start) = tz.from_local_datetime(&candidate).earliest() {
            return start.with_timezone(&Utc);
        }
    }
    DateTime::from_naive_utc_and_offset(midnight, Utc)
}
