use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{Duration, NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::Connection;
use tracing::info;

use super::influencers::influencer_exists;
use super::snapshots::{SnapshotFilter, SnapshotQueries};
use crate::aggregators::{
    aggregate, calculate_roi, daily_series, AggregatedMetrics, DailyMetrics, MetricSnapshot,
    TimeFrame,
};
use crate::error::ApiError;
use crate::models::{decimal_column, decimal_to_sql, Campaign, CampaignStatus};
use crate::AppState;

/// Longest all-time series returned, counted back from its last day.
const MAX_SERIES_DAYS: i64 = 3_660;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignInput {
    pub name: String,
    #[serde(default)]
    pub status: CampaignStatus,
    pub budget: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl CampaignInput {
    fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::Validation("name must not be empty".to_string()));
        }
        if self.budget.is_some_and(|budget| budget.is_sign_negative()) {
            return Err(ApiError::Validation("budget must not be negative".to_string()));
        }
        if let (Some(start), Some(end)) = (self.start_date, self.end_date) {
            if end < start {
                return Err(ApiError::Validation(
                    "endDate must not be before startDate".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSummary {
    #[serde(flatten)]
    pub campaign: Campaign,
    pub metrics: AggregatedMetrics,
    pub cost: Option<Decimal>,
    pub roi: f64,
}

impl CampaignSummary {
    fn new(campaign: Campaign, snapshots: &[MetricSnapshot], cost: Option<Decimal>) -> Self {
        let metrics = aggregate(snapshots);
        let roi = calculate_roi(
            metrics.total.revenue,
            cost.and_then(|cost| cost.to_f64()).unwrap_or(0.0),
        );
        Self {
            campaign,
            metrics,
            cost,
            roi,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct ContractInput {
    pub cost: Option<Decimal>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    pub campaign_id: i64,
    pub influencer_id: i64,
    pub cost: Option<Decimal>,
}

#[derive(Debug, Deserialize, Default)]
pub struct TimeframeQuery {
    #[serde(default)]
    pub timeframe: TimeFrame,
}

/// Sum of the known costs, or `None` when no cost is known at all.
pub(crate) fn total_cost(costs: impl IntoIterator<Item = Option<Decimal>>) -> Option<Decimal> {
    costs
        .into_iter()
        .flatten()
        .fold(None, |sum, cost| Some(sum.unwrap_or(Decimal::ZERO) + cost))
}

pub(crate) async fn fetch_contracts(
    db: &Connection,
    campaign_id: Option<i64>,
) -> Result<Vec<Contract>, tokio_rusqlite::Error> {
    db.call(move |conn| {
        let mut stmt = conn.prepare(
            "SELECT campaign_id, influencer_id, cost
             FROM campaign_influencers
             WHERE ?1 IS NULL OR campaign_id = ?1
             ORDER BY campaign_id, influencer_id",
        )?;
        let contracts = stmt
            .query_map([campaign_id], |row| {
                Ok(Contract {
                    campaign_id: row.get(0)?,
                    influencer_id: row.get(1)?,
                    cost: decimal_column(row, 2)?,
                })
            })?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        Ok(contracts)
    })
    .await
}

pub(crate) async fn fetch_campaign(
    db: &Connection,
    id: i64,
) -> Result<Option<Campaign>, tokio_rusqlite::Error> {
    db.call(move |conn| {
        let query = format!("SELECT {} FROM campaigns WHERE id = ?1", Campaign::COLUMNS);
        Ok(conn.query_row(&query, [id], Campaign::from_row).optional()?)
    })
    .await
}

async fn fetch_campaigns(db: &Connection) -> Result<Vec<Campaign>, tokio_rusqlite::Error> {
    db.call(|conn| {
        let query = format!("SELECT {} FROM campaigns ORDER BY id", Campaign::COLUMNS);
        let mut stmt = conn.prepare(&query)?;
        let campaigns = stmt
            .query_map([], Campaign::from_row)?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        Ok(campaigns)
    })
    .await
}

async fn build_summary(
    db: Arc<Connection>,
    campaign: Campaign,
) -> Result<CampaignSummary, ApiError> {
    let snapshots = SnapshotQueries::new(db.clone())
        .fetch_snapshots(SnapshotFilter {
            campaign_id: Some(campaign.id),
            ..Default::default()
        })
        .await?;
    let contracts = fetch_contracts(&db, Some(campaign.id)).await?;
    let cost = total_cost(contracts.into_iter().map(|c| c.cost));
    Ok(CampaignSummary::new(campaign, &snapshots, cost))
}

pub async fn list_campaigns(
    State(state): State<AppState>,
) -> Result<Json<Vec<CampaignSummary>>, ApiError> {
    let campaigns = fetch_campaigns(&state.db).await?;
    let rows = SnapshotQueries::new(state.db.clone())
        .fetch(SnapshotFilter::default())
        .await?;
    let contracts = fetch_contracts(&state.db, None).await?;

    let mut snapshots_by_campaign: HashMap<i64, Vec<MetricSnapshot>> = HashMap::new();
    for row in rows {
        snapshots_by_campaign
            .entry(row.campaign_id)
            .or_default()
            .push(row.snapshot);
    }
    let mut costs_by_campaign: HashMap<i64, Vec<Option<Decimal>>> = HashMap::new();
    for contract in contracts {
        costs_by_campaign
            .entry(contract.campaign_id)
            .or_default()
            .push(contract.cost);
    }

    let summaries = campaigns
        .into_iter()
        .map(|campaign| {
            let snapshots = snapshots_by_campaign.remove(&campaign.id).unwrap_or_default();
            let cost = total_cost(costs_by_campaign.remove(&campaign.id).unwrap_or_default());
            CampaignSummary::new(campaign, &snapshots, cost)
        })
        .collect();

    Ok(Json(summaries))
}

pub async fn create_campaign(
    State(state): State<AppState>,
    Json(input): Json<CampaignInput>,
) -> Result<(StatusCode, Json<Campaign>), ApiError> {
    input.validate()?;

    let id = state
        .db
        .call(move |conn| {
            let id: i64 = conn.query_row(
                "INSERT INTO campaigns (name, status, budget, start_date, end_date)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING id",
                params![
                    input.name.trim(),
                    input.status,
                    decimal_to_sql(input.budget),
                    input.start_date,
                    input.end_date,
                ],
                |row| row.get(0),
            )?;
            Ok(id)
        })
        .await?;
    info!("Created campaign {}", id);

    let campaign = fetch_campaign(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("campaign", id))?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

pub async fn get_campaign(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CampaignSummary>, ApiError> {
    let campaign = fetch_campaign(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("campaign", id))?;
    Ok(Json(build_summary(state.db, campaign).await?))
}

pub async fn update_campaign(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(input): Json<CampaignInput>,
) -> Result<Json<Campaign>, ApiError> {
    input.validate()?;

    let updated = state
        .db
        .call(move |conn| {
            Ok(conn.execute(
                "UPDATE campaigns
                 SET name = ?1, status = ?2, budget = ?3, start_date = ?4, end_date = ?5
                 WHERE id = ?6",
                params![
                    input.name.trim(),
                    input.status,
                    decimal_to_sql(input.budget),
                    input.start_date,
                    input.end_date,
                    id,
                ],
            )?)
        })
        .await?;
    if updated == 0 {
        return Err(ApiError::not_found("campaign", id));
    }

    let campaign = fetch_campaign(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("campaign", id))?;
    Ok(Json(campaign))
}

pub async fn delete_campaign(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .db
        .call(move |conn| Ok(conn.execute("DELETE FROM campaigns WHERE id = ?1", [id])?))
        .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("campaign", id));
    }
    info!("Deleted campaign {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn upsert_contract(
    State(state): State<AppState>,
    Path((campaign_id, influencer_id)): Path<(i64, i64)>,
    Json(input): Json<ContractInput>,
) -> Result<Json<Contract>, ApiError> {
    if input.cost.is_some_and(|cost| cost.is_sign_negative()) {
        return Err(ApiError::Validation("cost must not be negative".to_string()));
    }
    if fetch_campaign(&state.db, campaign_id).await?.is_none() {
        return Err(ApiError::not_found("campaign", campaign_id));
    }
    if !influencer_exists(&state.db, influencer_id).await? {
        return Err(ApiError::not_found("influencer", influencer_id));
    }

    let cost = input.cost;
    state
        .db
        .call(move |conn| {
            conn.execute(
                "INSERT INTO campaign_influencers (campaign_id, influencer_id, cost)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(campaign_id, influencer_id) DO UPDATE SET cost = excluded.cost",
                params![campaign_id, influencer_id, decimal_to_sql(cost)],
            )?;
            Ok(())
        })
        .await?;

    Ok(Json(Contract {
        campaign_id,
        influencer_id,
        cost,
    }))
}

pub(crate) async fn campaign_series(
    db: Arc<Connection>,
    campaign_id: i64,
    timeframe: TimeFrame,
    today: NaiveDate,
) -> Result<Vec<DailyMetrics>, ApiError> {
    if fetch_campaign(&db, campaign_id).await?.is_none() {
        return Err(ApiError::not_found("campaign", campaign_id));
    }

    let range = timeframe.current_range(today);
    let snapshots = SnapshotQueries::new(db)
        .fetch_snapshots(SnapshotFilter {
            campaign_id: Some(campaign_id),
            range,
            ..Default::default()
        })
        .await?;

    let (start, end) = match range {
        Some(range) => range,
        None => match (snapshots.first(), snapshots.last()) {
            (Some(first), Some(last)) => {
                let end = today.max(last.snapshot_date);
                let earliest = end
                    .checked_sub_signed(Duration::days(MAX_SERIES_DAYS - 1))
                    .unwrap_or(NaiveDate::MIN);
                (first.snapshot_date.max(earliest), end)
            }
            _ => return Ok(Vec::new()),
        },
    };
    Ok(daily_series(&snapshots, start, end))
}

pub async fn campaign_timeseries(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Query(query): Query<TimeframeQuery>,
) -> Result<Json<Vec<DailyMetrics>>, ApiError> {
    let today = Utc::now().date_naive();
    Ok(Json(campaign_series(state.db, id, query.timeframe, today).await?))
}
