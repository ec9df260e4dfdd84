use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;

use super::{AggregatedMetrics, DailyMetrics, MetricSnapshot, MetricTotals, PlatformMetrics};
use crate::models::Platform;

fn percentage_of_views(count: i64, views: i64) -> f64 {
    if views == 0 {
        return 0.0;
    }
    (count as f64 / views as f64) * 100.0
}

pub(crate) fn engagement_rate(likes: i64, shares: i64, views: i64) -> f64 {
    percentage_of_views(likes.saturating_add(shares), views)
}

fn sum_totals<'a>(snapshots: impl IntoIterator<Item = &'a MetricSnapshot>) -> MetricTotals {
    snapshots
        .into_iter()
        .fold(MetricTotals::default(), |mut total, snapshot| {
            // Counts saturate at i64::MAX instead of wrapping
            total.views = total.views.saturating_add(snapshot.views.unwrap_or(0));
            total.likes = total.likes.saturating_add(snapshot.likes.unwrap_or(0));
            total.shares = total.shares.saturating_add(snapshot.shares.unwrap_or(0));
            total.clicks = total.clicks.saturating_add(snapshot.clicks.unwrap_or(0));
            total.conversions = total
                .conversions
                .saturating_add(snapshot.conversions.unwrap_or(0));
            total.revenue += snapshot
                .revenue
                .and_then(|revenue| revenue.to_f64())
                .unwrap_or(0.0);
            total
        })
}

/// Sums a run of snapshots and derives engagement rate, conversion rate and CTR.
///
/// `latest` is the last element of `snapshots` in the order given. Nothing is
/// re-sorted here: callers wanting the most recent snapshot must pass them
/// ordered by `snapshot_date` ascending, which every query in this crate does.
pub fn aggregate(snapshots: &[MetricSnapshot]) -> AggregatedMetrics {
    let total = sum_totals(snapshots);

    AggregatedMetrics {
        engagement_rate: engagement_rate(total.likes, total.shares, total.views),
        conversion_rate: percentage_of_views(total.conversions, total.views),
        ctr: percentage_of_views(total.clicks, total.views),
        latest: snapshots.last().cloned(),
        total,
    }
}

/// One point per day from `start` to `end` inclusive, zero-filled where no
/// snapshot exists. Snapshots outside the range are ignored.
pub fn daily_series(
    snapshots: &[MetricSnapshot],
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<DailyMetrics> {
    let mut by_day: BTreeMap<NaiveDate, Vec<&MetricSnapshot>> = BTreeMap::new();
    for snapshot in snapshots {
        if snapshot.snapshot_date >= start && snapshot.snapshot_date <= end {
            by_day.entry(snapshot.snapshot_date).or_default().push(snapshot);
        }
    }

    let mut series = Vec::new();
    for current in start.iter_days().take_while(|day| *day <= end) {
        let total = by_day
            .get(&current)
            .map(|day| sum_totals(day.iter().copied()))
            .unwrap_or_default();

        series.push(DailyMetrics {
            date: current,
            views: total.views,
            likes: total.likes,
            shares: total.shares,
            clicks: total.clicks,
            conversions: total.conversions,
            revenue: total.revenue,
            engagement_rate: engagement_rate(total.likes, total.shares, total.views),
        });
    }

    series
}

/// Aggregates snapshots per platform, highest total views first.
pub fn platform_breakdown(rows: &[(Platform, MetricSnapshot)]) -> Vec<PlatformMetrics> {
    let mut groups: Vec<(Platform, Vec<MetricSnapshot>)> = Vec::new();
    for (platform, snapshot) in rows {
        match groups.iter_mut().find(|(p, _)| p == platform) {
            Some((_, snapshots)) => snapshots.push(snapshot.clone()),
            None => groups.push((*platform, vec![snapshot.clone()])),
        }
    }

    let mut breakdown: Vec<PlatformMetrics> = groups
        .into_iter()
        .map(|(platform, snapshots)| PlatformMetrics {
            platform,
            metrics: aggregate(&snapshots),
        })
        .collect();
    breakdown.sort_by(|a, b| b.metrics.total.views.cmp(&a.metrics.total.views));
    breakdown
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn snapshot(day: u32, views: i64, likes: i64, shares: i64, clicks: i64) -> MetricSnapshot {
        MetricSnapshot {
            post_id: 1,
            snapshot_date: date(day),
            views: Some(views),
            likes: Some(likes),
            shares: Some(shares),
            clicks: Some(clicks),
            conversions: None,
            revenue: None,
        }
    }

    fn unmeasured(day: u32) -> MetricSnapshot {
        MetricSnapshot {
            post_id: 2,
            snapshot_date: date(day),
            views: None,
            likes: None,
            shares: None,
            clicks: None,
            conversions: None,
            revenue: None,
        }
    }

    #[test]
    fn sums_two_days_of_one_post() {
        let snapshots = vec![snapshot(1, 100, 10, 5, 8), snapshot(2, 200, 20, 10, 16)];
        let result = aggregate(&snapshots);

        assert_eq!(result.total.views, 300);
        assert_eq!(result.total.likes, 30);
        assert_eq!(result.total.shares, 15);
        assert_eq!(result.total.clicks, 24);
        assert!((result.engagement_rate - 15.0).abs() < 1e-9);
        assert!((result.ctr - 8.0).abs() < 1e-9);
        assert_eq!(result.conversion_rate, 0.0);
    }

    #[test]
    fn empty_input_is_all_zero() {
        let result = aggregate(&[]);
        assert_eq!(result.total, MetricTotals::default());
        assert_eq!(result.latest, None);
        assert_eq!(result.engagement_rate, 0.0);
        assert_eq!(result.conversion_rate, 0.0);
        assert_eq!(result.ctr, 0.0);
    }

    #[test]
    fn missing_fields_count_as_zero() {
        let mut partial = snapshot(3, 50, 5, 0, 0);
        partial.shares = None;
        partial.clicks = None;
        partial.conversions = Some(2);
        let snapshots = vec![unmeasured(1), partial, unmeasured(4)];

        let result = aggregate(&snapshots);
        assert_eq!(result.total.views, 50);
        assert_eq!(result.total.likes, 5);
        assert_eq!(result.total.shares, 0);
        assert_eq!(result.total.clicks, 0);
        assert_eq!(result.total.conversions, 2);
        assert!((result.conversion_rate - 4.0).abs() < 1e-9);
    }

    #[test]
    fn zero_views_zero_rates() {
        let mut no_views = snapshot(1, 0, 40, 12, 9);
        no_views.conversions = Some(3);
        let result = aggregate(&[no_views]);
        assert_eq!(result.total.likes, 40);
        assert_eq!(result.engagement_rate, 0.0);
        assert_eq!(result.conversion_rate, 0.0);
        assert_eq!(result.ctr, 0.0);
    }

    #[test]
    fn revenue_converts_decimals() {
        let mut first = snapshot(1, 10, 0, 0, 0);
        first.revenue = Some(Decimal::from_str("19.99").unwrap());
        let mut second = snapshot(2, 10, 0, 0, 0);
        second.revenue = Some(Decimal::from_str("0.01").unwrap());
        let result = aggregate(&[first, unmeasured(3), second]);
        assert!((result.total.revenue - 20.0).abs() < 1e-9);
    }

    #[test]
    fn latest_is_last_element_as_given() {
        // Deliberately unsorted: the aggregator trusts caller order.
        let snapshots = vec![snapshot(9, 1, 0, 0, 0), snapshot(2, 2, 0, 0, 0)];
        let result = aggregate(&snapshots);
        assert_eq!(result.latest.map(|s| s.snapshot_date), Some(date(2)));
    }

    #[test]
    fn daily_series_fills_gaps() {
        let snapshots = vec![
            snapshot(2, 100, 10, 0, 0),
            snapshot(4, 50, 0, 5, 0),
            snapshot(4, 50, 0, 5, 0),
            snapshot(9, 999, 0, 0, 0),
        ];
        let series = daily_series(&snapshots, date(1), date(5));

        assert_eq!(series.len(), 5);
        assert_eq!(series[0].date, date(1));
        assert_eq!(series[0].views, 0);
        assert_eq!(series[1].views, 100);
        assert!((series[1].engagement_rate - 10.0).abs() < 1e-9);
        assert_eq!(series[2].views, 0);
        assert_eq!(series[3].views, 100);
        assert_eq!(series[3].shares, 10);
        assert_eq!(series[4].date, date(5));
    }

    #[test]
    fn huge_counts_saturate_instead_of_wrapping() {
        let half = i64::MAX / 2 + 1;
        let snapshots = vec![
            snapshot(1, half, half, half, half),
            snapshot(2, half, half, half, half),
        ];
        let result = aggregate(&snapshots);

        assert_eq!(result.total.views, i64::MAX);
        assert_eq!(result.total.likes, i64::MAX);
        assert_eq!(result.total.clicks, i64::MAX);
        assert!((result.engagement_rate - 100.0).abs() < 1e-9);
        assert!((result.ctr - 100.0).abs() < 1e-9);
    }

    #[test]
    fn daily_series_stops_at_the_last_representable_day() {
        let series = daily_series(&[], NaiveDate::MAX, NaiveDate::MAX);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].date, NaiveDate::MAX);
    }

    #[test]
    fn daily_series_empty_for_inverted_range() {
        let series = daily_series(&[snapshot(2, 1, 0, 0, 0)], date(5), date(1));
        assert!(series.is_empty());
    }

    #[test]
    fn platform_breakdown_orders_by_views() {
        let rows = vec![
            (Platform::Instagram, snapshot(1, 100, 0, 0, 0)),
            (Platform::TikTok, snapshot(1, 300, 0, 0, 0)),
            (Platform::Instagram, snapshot(2, 150, 0, 0, 0)),
            (Platform::YouTube, snapshot(1, 10, 0, 0, 0)),
        ];
        let breakdown = platform_breakdown(&rows);

        let order: Vec<Platform> = breakdown.iter().map(|p| p.platform).collect();
        assert_eq!(
            order,
            vec![Platform::TikTok, Platform::Instagram, Platform::YouTube]
        );
        assert_eq!(breakdown[1].metrics.total.views, 250);
    }
}
