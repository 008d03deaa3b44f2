//! Statistics and chart aggregation
//!
//! Derives summary statistics from an entry series and resamples series
//! into chart-ready buckets:
//!
//! - [`compute_stats`]: latest value, trailing 7-point mean, period delta,
//!   overall mean, count, and last-observed date
//! - [`build_chart_series`]: windowed daily/weekly/monthly buckets with a
//!   reference average and an exponentially-weighted trend overlay
//!
//! Null observations are excluded from every aggregate; a recorded zero is
//! a real measurement and counts. An empty series produces a distinguished
//! no-data result, never a numeric zero standing in for absence.

use crate::store::Entry;
use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sentinel shown when a series has no usable observations
pub const NO_DATA: &str = "No Data";

/// One point of a series as seen by the statistics layer.
///
/// The value is optional: imported or drafted rows can be blank, and blanks
/// must not skew aggregates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Observation {
    /// Unix timestamp in milliseconds
    pub recorded_at: i64,
    /// Measured value; None for a blank observation
    pub value: Option<f64>,
}

impl Observation {
    pub fn new(recorded_at: i64, value: Option<f64>) -> Self {
        Self { recorded_at, value }
    }
}

impl From<&Entry> for Observation {
    fn from(entry: &Entry) -> Self {
        Self {
            recorded_at: entry.recorded_at,
            value: Some(entry.value),
        }
    }
}

/// Summary statistics for one metric's series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsSummary {
    /// Number of non-null observations
    pub count: usize,
    /// Most recent value
    pub latest: Option<f64>,
    /// Trailing mean of the last 7 points; None with fewer than 7
    pub ma7: Option<f64>,
    /// Latest minus second-to-latest; None with fewer than 2 points
    pub change: Option<f64>,
    /// Mean over all values
    pub avg: Option<f64>,
    /// Latest timestamp as day + abbreviated month, or the no-data sentinel
    pub last_date: String,
}

impl StatsSummary {
    fn no_data() -> Self {
        Self {
            count: 0,
            latest: None,
            ma7: None,
            change: None,
            avg: None,
            last_date: NO_DATA.to_string(),
        }
    }
}

/// Compute summary statistics over a series.
///
/// Null values are dropped before anything else; if nothing remains the
/// no-data summary is returned. Otherwise the series is sorted by timestamp
/// ascending and aggregated.
pub fn compute_stats(series: &[Observation]) -> StatsSummary {
    let mut points: Vec<(i64, f64)> = series
        .iter()
        .filter_map(|o| o.value.map(|v| (o.recorded_at, v)))
        .collect();

    if points.is_empty() {
        return StatsSummary::no_data();
    }

    points.sort_by_key(|(ts, _)| *ts);
    let values: Vec<f64> = points.iter().map(|(_, v)| *v).collect();
    let count = values.len();

    let latest = *values.last().expect("non-empty");
    let ma7 = if count >= 7 {
        Some(mean(&values[count - 7..]))
    } else {
        None
    };
    let change = if count >= 2 {
        Some(latest - values[count - 2])
    } else {
        None
    };
    let avg = mean(&values);

    let last_ts = points.last().expect("non-empty").0;
    let last_date = DateTime::from_timestamp_millis(last_ts)
        .map(|dt| dt.format("%d %b").to_string())
        .unwrap_or_else(|| NO_DATA.to_string());

    StatsSummary {
        count,
        latest: Some(latest),
        ma7,
        change,
        avg: Some(avg),
        last_date,
    }
}

/// Lookback window and resampling choice for charting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartRange {
    /// Trailing 31 days, daily buckets
    LastMonth,
    /// Trailing 6 months, weekly buckets
    Last6Months,
    /// Trailing 12 months, weekly buckets
    LastYear,
    /// Full span; weekly up to 180 days of data, monthly beyond
    AllTime,
}

impl ChartRange {
    /// Parse from the query-parameter representation
    pub fn parse(s: &str) -> Option<ChartRange> {
        match s.trim().to_lowercase().as_str() {
            "last_month" => Some(ChartRange::LastMonth),
            "last_6_months" => Some(ChartRange::Last6Months),
            "last_year" => Some(ChartRange::LastYear),
            "all_time" => Some(ChartRange::AllTime),
            _ => None,
        }
    }
}

/// Bucket width used for a chart series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    Daily,
    Weekly,
    Monthly,
}

/// One resampled chart bucket
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    /// Bucket start (midnight UTC) in milliseconds
    pub bucket_start: i64,
    /// Arithmetic mean of the points in the bucket
    pub value: f64,
}

/// Chart-ready series: resampled buckets, reference average, trend overlay
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub points: Vec<ChartPoint>,
    pub granularity: Granularity,
    /// Series-wide reference average (unresampled points)
    pub average: Option<f64>,
    /// Exponentially-weighted trend, parallel to `points`; present only for
    /// the longer ranges with at least 3 buckets
    pub trend: Option<Vec<f64>>,
}

/// Resample a series into chart buckets for the chosen range.
///
/// Empty buckets are dropped, not zero-filled. The reference average is
/// computed over the unresampled points inside the window (the entire
/// series for AllTime).
pub fn build_chart_series(
    series: &[Observation],
    range: ChartRange,
    now: DateTime<Utc>,
) -> ChartSeries {
    let mut points: Vec<(i64, f64)> = series
        .iter()
        .filter_map(|o| o.value.map(|v| (o.recorded_at, v)))
        .collect();
    points.sort_by_key(|(ts, _)| *ts);

    let cutoff = match range {
        ChartRange::LastMonth => Some(now - Duration::days(31)),
        ChartRange::Last6Months => now.checked_sub_months(Months::new(6)),
        ChartRange::LastYear => now.checked_sub_months(Months::new(12)),
        ChartRange::AllTime => None,
    };
    let windowed: Vec<(i64, f64)> = match cutoff {
        Some(cutoff) => {
            let cutoff_ms = cutoff.timestamp_millis();
            points.into_iter().filter(|(ts, _)| *ts >= cutoff_ms).collect()
        }
        None => points,
    };

    let granularity = match range {
        ChartRange::LastMonth => Granularity::Daily,
        ChartRange::Last6Months | ChartRange::LastYear => Granularity::Weekly,
        ChartRange::AllTime => {
            let span_days = match (windowed.first(), windowed.last()) {
                (Some((first, _)), Some((last, _))) => (last - first) / (24 * 3600 * 1000),
                _ => 0,
            };
            if span_days <= 180 {
                Granularity::Weekly
            } else {
                Granularity::Monthly
            }
        }
    };

    let average = if windowed.is_empty() {
        None
    } else {
        Some(mean(
            &windowed.iter().map(|(_, v)| *v).collect::<Vec<f64>>(),
        ))
    };

    let mut buckets: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
    for (ts, value) in &windowed {
        if let Some(dt) = DateTime::from_timestamp_millis(*ts) {
            buckets
                .entry(bucket_date(dt.date_naive(), granularity))
                .or_default()
                .push(*value);
        }
    }

    let points: Vec<ChartPoint> = buckets
        .into_iter()
        .map(|(date, values)| ChartPoint {
            bucket_start: date
                .and_hms_opt(0, 0, 0)
                .expect("midnight is valid")
                .and_utc()
                .timestamp_millis(),
            value: mean(&values),
        })
        .collect();

    let trend = if range != ChartRange::LastMonth && points.len() >= 3 {
        let span = points.len().min(5);
        Some(ewm_mean(
            &points.iter().map(|p| p.value).collect::<Vec<f64>>(),
            span,
        ))
    } else {
        None
    };

    ChartSeries {
        points,
        granularity,
        average,
        trend,
    }
}

/// Snap a date to the start of its bucket
fn bucket_date(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    match granularity {
        Granularity::Daily => date,
        Granularity::Weekly => {
            date - Duration::days(date.weekday().num_days_from_monday() as i64)
        }
        Granularity::Monthly => date.with_day(1).expect("day 1 is valid"),
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Exponentially-weighted mean with the given span.
///
/// Weights are normalized over the observations seen so far, so early
/// points aren't biased toward zero:
/// `y_t = sum((1-a)^i * x_(t-i)) / sum((1-a)^i)` with `a = 2 / (span + 1)`.
fn ewm_mean(values: &[f64], span: usize) -> Vec<f64> {
    let alpha = 2.0 / (span as f64 + 1.0);
    let decay = 1.0 - alpha;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    values
        .iter()
        .map(|&x| {
            numerator = numerator * decay + x;
            denominator = denominator * decay + 1.0;
            numerator / denominator
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn obs_on(year: i32, month: u32, day: u32, value: Option<f64>) -> Observation {
        let ts = NaiveDate::from_ymd_opt(year, month, day)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
            .timestamp_millis();
        Observation::new(ts, value)
    }

    #[test]
    fn test_empty_series_yields_no_data() {
        let summary = compute_stats(&[]);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.latest, None);
        assert_eq!(summary.avg, None);
        assert_eq!(summary.last_date, NO_DATA);
    }

    #[test]
    fn test_all_null_series_yields_no_data() {
        let series = vec![
            obs_on(2026, 2, 1, None),
            obs_on(2026, 2, 2, None),
        ];
        let summary = compute_stats(&series);
        assert_eq!(summary.count, 0);
        assert_eq!(summary.last_date, NO_DATA);
    }

    #[test]
    fn test_zero_counts_null_does_not() {
        // [0, None, 2] at Feb 1/2/3 2026
        let series = vec![
            obs_on(2026, 2, 1, Some(0.0)),
            obs_on(2026, 2, 2, None),
            obs_on(2026, 2, 3, Some(2.0)),
        ];
        let summary = compute_stats(&series);
        assert_eq!(summary.count, 2);
        assert_eq!(summary.avg, Some(1.0));
        assert_eq!(summary.latest, Some(2.0));
        assert_eq!(summary.change, Some(2.0));
        assert_eq!(summary.last_date, "03 Feb");
    }

    #[test]
    fn test_sorts_before_aggregating() {
        let series = vec![
            obs_on(2026, 2, 3, Some(9.0)),
            obs_on(2026, 2, 1, Some(1.0)),
            obs_on(2026, 2, 2, Some(5.0)),
        ];
        let summary = compute_stats(&series);
        assert_eq!(summary.latest, Some(9.0));
        assert_eq!(summary.change, Some(4.0));
        assert_eq!(summary.last_date, "03 Feb");
    }

    #[test]
    fn test_ma7_requires_seven_points() {
        let six: Vec<Observation> = (1..=6)
            .map(|d| obs_on(2026, 2, d, Some(d as f64)))
            .collect();
        assert_eq!(compute_stats(&six).ma7, None);

        let eight: Vec<Observation> = (1..=8)
            .map(|d| obs_on(2026, 2, d, Some(d as f64)))
            .collect();
        // Mean of the last 7 values, 2..=8
        assert_eq!(compute_stats(&eight).ma7, Some(5.0));
    }

    #[test]
    fn test_single_point_has_no_change() {
        let series = vec![obs_on(2026, 2, 1, Some(4.0))];
        let summary = compute_stats(&series);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.change, None);
        assert_eq!(summary.ma7, None);
    }

    #[test]
    fn test_chart_range_parse() {
        assert_eq!(ChartRange::parse("last_month"), Some(ChartRange::LastMonth));
        assert_eq!(ChartRange::parse("ALL_TIME"), Some(ChartRange::AllTime));
        assert_eq!(ChartRange::parse("fortnight"), None);
    }

    #[test]
    fn test_last_month_daily_buckets_drop_old_points() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let series = vec![
            obs_on(2025, 6, 1, Some(100.0)), // outside window
            obs_on(2026, 2, 20, Some(4.0)),
            obs_on(2026, 2, 20, Some(6.0)), // same day: averaged
            obs_on(2026, 2, 25, Some(8.0)),
        ];
        let chart = build_chart_series(&series, ChartRange::LastMonth, now);

        assert_eq!(chart.granularity, Granularity::Daily);
        assert_eq!(chart.points.len(), 2);
        assert_eq!(chart.points[0].value, 5.0);
        assert_eq!(chart.points[1].value, 8.0);
        // Reference average over unresampled windowed points: (4+6+8)/3
        assert_eq!(chart.average, Some(6.0));
        // No trend overlay for the short range
        assert_eq!(chart.trend, None);
    }

    #[test]
    fn test_weekly_buckets_snap_to_monday() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();
        // 2026-02-03 is a Tuesday; its week starts Monday 2026-02-02
        let series = vec![obs_on(2026, 2, 3, Some(7.0))];
        let chart = build_chart_series(&series, ChartRange::Last6Months, now);

        assert_eq!(chart.granularity, Granularity::Weekly);
        let bucket = DateTime::from_timestamp_millis(chart.points[0].bucket_start).unwrap();
        assert_eq!(
            bucket.date_naive(),
            NaiveDate::from_ymd_opt(2026, 2, 2).unwrap()
        );
    }

    #[test]
    fn test_all_time_switches_to_monthly_past_180_days() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 0, 0, 0).unwrap();

        let short = vec![
            obs_on(2026, 6, 1, Some(1.0)),
            obs_on(2026, 7, 1, Some(2.0)),
        ];
        assert_eq!(
            build_chart_series(&short, ChartRange::AllTime, now).granularity,
            Granularity::Weekly
        );

        let long = vec![
            obs_on(2025, 1, 1, Some(1.0)),
            obs_on(2025, 6, 1, Some(2.0)),
            obs_on(2026, 7, 1, Some(3.0)),
        ];
        let chart = build_chart_series(&long, ChartRange::AllTime, now);
        assert_eq!(chart.granularity, Granularity::Monthly);
        // Monthly buckets snap to the first of the month
        let bucket = DateTime::from_timestamp_millis(chart.points[0].bucket_start).unwrap();
        assert_eq!(bucket.date_naive().day(), 1);
    }

    #[test]
    fn test_trend_needs_three_buckets() {
        let now = Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap();

        let two_weeks = vec![
            obs_on(2026, 2, 2, Some(1.0)),
            obs_on(2026, 2, 9, Some(2.0)),
        ];
        let chart = build_chart_series(&two_weeks, ChartRange::Last6Months, now);
        assert_eq!(chart.trend, None);

        let three_weeks = vec![
            obs_on(2026, 2, 2, Some(1.0)),
            obs_on(2026, 2, 9, Some(2.0)),
            obs_on(2026, 2, 16, Some(3.0)),
        ];
        let chart = build_chart_series(&three_weeks, ChartRange::Last6Months, now);
        let trend = chart.trend.unwrap();
        assert_eq!(trend.len(), 3);
        // First trend point equals the first bucket value
        assert_eq!(trend[0], 1.0);
    }

    #[test]
    fn test_ewm_mean_constant_series_is_flat() {
        let trend = ewm_mean(&[4.0, 4.0, 4.0, 4.0], 3);
        for value in trend {
            assert!((value - 4.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_ewm_mean_tracks_recent_values() {
        let trend = ewm_mean(&[1.0, 1.0, 1.0, 10.0], 3);
        let last = *trend.last().unwrap();
        // Pulled toward 10 but still below it
        assert!(last > 4.0 && last < 10.0);
    }
}
