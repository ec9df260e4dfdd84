use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use chrono::{NaiveDate, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use tokio_rusqlite::Connection;
use tracing::debug;

use super::campaigns::{fetch_contracts, total_cost, TimeframeQuery};
use super::influencers::ranking;
use super::snapshots::{SnapshotFilter, SnapshotQueries};
use crate::aggregators::{
    aggregate, calculate_roi, compare_periods, platform_breakdown, AggregatedMetrics,
    InfluencerScoreEntry, PeriodComparisons, PeriodMeasures, PlatformMetrics, RankingMetric,
    TimeFrame,
};
use crate::error::ApiError;
use crate::AppState;

const TOP_INFLUENCERS: usize = 5;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardOverview {
    pub period_start: Option<NaiveDate>,
    pub period_end: Option<NaiveDate>,
    pub current: AggregatedMetrics,
    pub previous: AggregatedMetrics,
    pub comparison: PeriodComparisons,
    pub cost: Option<Decimal>,
    pub roi: f64,
    pub platforms: Vec<PlatformMetrics>,
    pub top_influencers: Vec<InfluencerScoreEntry>,
}

pub(crate) async fn build_dashboard(
    db: Arc<Connection>,
    timeframe: TimeFrame,
    today: NaiveDate,
) -> Result<DashboardOverview, ApiError> {
    let queries = SnapshotQueries::new(db.clone());
    let current_range = timeframe.current_range(today);

    let rows = queries
        .fetch(SnapshotFilter {
            range: current_range,
            ..Default::default()
        })
        .await?;
    let previous_snapshots = match timeframe.previous_range(today) {
        Some(range) => {
            queries
                .fetch_snapshots(SnapshotFilter {
                    range: Some(range),
                    ..Default::default()
                })
                .await?
        }
        None => Vec::new(),
    };
    debug!(
        "Dashboard over {} current and {} previous snapshots",
        rows.len(),
        previous_snapshots.len()
    );

    let by_platform: Vec<_> = rows
        .into_iter()
        .map(|row| (row.platform, row.snapshot))
        .collect();
    let current_snapshots: Vec<_> = by_platform
        .iter()
        .map(|(_, snapshot)| snapshot.clone())
        .collect();

    let current = aggregate(&current_snapshots);
    let previous = aggregate(&previous_snapshots);
    let comparison = compare_periods(
        &PeriodMeasures::from(&current),
        &PeriodMeasures::from(&previous),
    );

    // Contract costs are undated, so the whole cost is set against windowed revenue
    let contracts = fetch_contracts(&db, None).await?;
    let cost = total_cost(contracts.into_iter().map(|c| c.cost));
    let roi = calculate_roi(
        current.total.revenue,
        cost.and_then(|cost| cost.to_f64()).unwrap_or(0.0),
    );

    let mut top_influencers = ranking(db, RankingMetric::Roi, timeframe, None, today).await?;
    top_influencers.truncate(TOP_INFLUENCERS);

    Ok(DashboardOverview {
        period_start: current_range.map(|(start, _)| start),
        period_end: current_range.map(|(_, end)| end),
        platforms: platform_breakdown(&by_platform),
        current,
        previous,
        comparison,
        cost,
        roi,
        top_influencers,
    })
}

pub async fn get_dashboard(
    State(state): State<AppState>,
    Query(query): Query<TimeframeQuery>,
) -> Result<Json<DashboardOverview>, ApiError> {
    let today = Utc::now().date_naive();
    Ok(Json(build_dashboard(state.db, query.timeframe, today).await?))
}
