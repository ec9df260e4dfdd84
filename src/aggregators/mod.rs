use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Platform;

pub mod influencer_ranker;
pub mod period_comparator;
pub mod roi_calculator;
pub mod snapshot_aggregator;

pub use influencer_ranker::rank_influencers;
pub use period_comparator::compare_periods;
pub use roi_calculator::calculate_roi;
pub use snapshot_aggregator::{aggregate, daily_series, platform_breakdown};

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFrame {
    Last7Days,
    #[default]
    Last30Days,
    Last90Days,
    AllTime,
}

impl TimeFrame {
    fn days(self) -> Option<i64> {
        match self {
            TimeFrame::Last7Days => Some(7),
            TimeFrame::Last30Days => Some(30),
            TimeFrame::Last90Days => Some(90),
            TimeFrame::AllTime => None,
        }
    }

    /// Inclusive date range ending at `today`. `None` means unbounded.
    pub fn current_range(self, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let days = self.days()?;
        Some((today - Duration::days(days - 1), today))
    }

    /// The window of equal length immediately before [`TimeFrame::current_range`].
    pub fn previous_range(self, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
        let days = self.days()?;
        let (start, _) = self.current_range(today)?;
        Some((start - Duration::days(days), start - Duration::days(1)))
    }
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RankingMetric {
    Roi,
    Engagement,
    Reach,
    Conversions,
}

/// One post's measurements for a single day. Missing counts mean "not measured".
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub post_id: i64,
    pub snapshot_date: NaiveDate,
    pub views: Option<i64>,
    pub likes: Option<i64>,
    pub shares: Option<i64>,
    pub clicks: Option<i64>,
    pub conversions: Option<i64>,
    pub revenue: Option<Decimal>,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricTotals {
    pub views: i64,
    pub likes: i64,
    pub shares: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub revenue: f64,
}

#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedMetrics {
    pub total: MetricTotals,
    pub latest: Option<MetricSnapshot>,
    pub engagement_rate: f64,
    pub conversion_rate: f64,
    pub ctr: f64,
}

/// Input row for the ranker: an influencer and every snapshot of their posts.
#[derive(Debug, Clone)]
pub struct InfluencerMetrics {
    pub id: i64,
    pub name: String,
    pub metrics: Vec<MetricSnapshot>,
    pub cost: Option<Decimal>,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct InfluencerScoreEntry {
    pub id: i64,
    pub name: String,
    pub metrics: AggregatedMetrics,
    pub score: f64,
    pub rank: usize,
}

#[derive(Serialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct PeriodMeasures {
    pub views: f64,
    pub engagement: f64,
    pub conversions: f64,
}

impl From<&AggregatedMetrics> for PeriodMeasures {
    fn from(metrics: &AggregatedMetrics) -> Self {
        Self {
            views: metrics.total.views as f64,
            engagement: metrics.engagement_rate,
            conversions: metrics.total.conversions as f64,
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PeriodComparison {
    pub value: f64,
    pub change: f64,
    pub is_positive: bool,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq)]
pub struct PeriodComparisons {
    pub views: PeriodComparison,
    pub engagement: PeriodComparison,
    pub conversions: PeriodComparison,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DailyMetrics {
    pub date: NaiveDate,
    pub views: i64,
    pub likes: i64,
    pub shares: i64,
    pub clicks: i64,
    pub conversions: i64,
    pub revenue: f64,
    pub engagement_rate: f64,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct PlatformMetrics {
    pub platform: Platform,
    pub metrics: AggregatedMetrics,
}
