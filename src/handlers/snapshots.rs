use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{Datelike, NaiveDate};
use rusqlite::{params, params_from_iter, types::Value, OptionalExtension};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio_rusqlite::Connection;
use tracing::{debug, instrument};

use crate::aggregators::MetricSnapshot;
use crate::error::ApiError;
use crate::models::{decimal_column, decimal_to_sql, Platform};
use crate::AppState;

/// Narrows which snapshots [`SnapshotQueries::fetch`] returns. Unset fields match everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct SnapshotFilter {
    pub campaign_id: Option<i64>,
    pub influencer_id: Option<i64>,
    pub post_id: Option<i64>,
    pub range: Option<(NaiveDate, NaiveDate)>,
}

impl SnapshotFilter {
    fn build_conditions(&self) -> (String, Vec<Value>) {
        let mut conditions = Vec::new();
        let mut params = Vec::new();
        if let Some(campaign_id) = self.campaign_id {
            conditions.push("p.campaign_id = ?");
            params.push(Value::Integer(campaign_id));
        }
        if let Some(influencer_id) = self.influencer_id {
            conditions.push("p.influencer_id = ?");
            params.push(Value::Integer(influencer_id));
        }
        if let Some(post_id) = self.post_id {
            conditions.push("s.post_id = ?");
            params.push(Value::Integer(post_id));
        }
        if let Some((start, end)) = self.range {
            conditions.push("s.snapshot_date >= ? AND s.snapshot_date <= ?");
            params.push(Value::Text(start.to_string()));
            params.push(Value::Text(end.to_string()));
        }

        if conditions.is_empty() {
            (String::new(), params)
        } else {
            (format!("WHERE {}", conditions.join(" AND ")), params)
        }
    }
}

/// A snapshot together with the post attributes needed to group it.
#[derive(Debug, Clone)]
pub struct SnapshotRow {
    pub campaign_id: i64,
    pub influencer_id: i64,
    pub platform: Platform,
    pub snapshot: MetricSnapshot,
}

#[derive(Debug, Deserialize, Default)]
pub struct SnapshotInput {
    pub views: Option<i64>,
    pub likes: Option<i64>,
    pub shares: Option<i64>,
    pub clicks: Option<i64>,
    pub conversions: Option<i64>,
    pub revenue: Option<Decimal>,
}

impl SnapshotInput {
    fn validate(&self) -> Result<(), ApiError> {
        let counts = [
            ("views", self.views),
            ("likes", self.likes),
            ("shares", self.shares),
            ("clicks", self.clicks),
            ("conversions", self.conversions),
        ];
        if let Some((field, _)) = counts
            .iter()
            .find(|(_, value)| value.is_some_and(|v| v < 0))
        {
            return Err(ApiError::Validation(format!("{} must not be negative", field)));
        }
        if self.revenue.is_some_and(|revenue| revenue.is_sign_negative()) {
            return Err(ApiError::Validation("revenue must not be negative".to_string()));
        }
        Ok(())
    }
}

/// Snapshot dates must fall within these years.
const SNAPSHOT_YEARS: std::ops::RangeInclusive<i32> = 2000..=2100;

fn validate_snapshot_date(date: NaiveDate) -> Result<(), ApiError> {
    if !SNAPSHOT_YEARS.contains(&date.year()) {
        return Err(ApiError::Validation(format!(
            "snapshot date {} must be between {} and {}",
            date,
            SNAPSHOT_YEARS.start(),
            SNAPSHOT_YEARS.end()
        )));
    }
    Ok(())
}

fn snapshot_from_row(row: &rusqlite::Row, offset: usize) -> rusqlite::Result<MetricSnapshot> {
    Ok(MetricSnapshot {
        post_id: row.get(offset)?,
        snapshot_date: row.get(offset + 1)?,
        views: row.get(offset + 2)?,
        likes: row.get(offset + 3)?,
        shares: row.get(offset + 4)?,
        clicks: row.get(offset + 5)?,
        conversions: row.get(offset + 6)?,
        revenue: decimal_column(row, offset + 7)?,
    })
}

pub struct SnapshotQueries {
    db: Arc<Connection>,
}

impl SnapshotQueries {
    pub fn new(db: Arc<Connection>) -> Self {
        Self { db }
    }

    /// Snapshots ordered by date ascending, so the last one of any subset is
    /// the most recent.
    #[instrument(skip(self))]
    pub async fn fetch(
        &self,
        filter: SnapshotFilter,
    ) -> Result<Vec<SnapshotRow>, tokio_rusqlite::Error> {
        let (conditions, params) = filter.build_conditions();
        let query = format!(
            "SELECT p.campaign_id, p.influencer_id, p.platform,
                    s.post_id, s.snapshot_date, s.views, s.likes, s.shares,
                    s.clicks, s.conversions, s.revenue
             FROM metric_snapshots s
             JOIN posts p ON p.id = s.post_id
             {}
             ORDER BY s.snapshot_date ASC, s.post_id ASC",
            conditions
        );
        debug!("Fetching snapshots: {}", query);

        self.db
            .call(move |conn| {
                let mut stmt = conn.prepare(&query)?;
                let rows = stmt
                    .query_map(params_from_iter(params), |row| {
                        Ok(SnapshotRow {
                            campaign_id: row.get(0)?,
                            influencer_id: row.get(1)?,
                            platform: row.get(2)?,
                            snapshot: snapshot_from_row(row, 3)?,
                        })
                    })?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(rows)
            })
            .await
    }

    pub async fn fetch_snapshots(
        &self,
        filter: SnapshotFilter,
    ) -> Result<Vec<MetricSnapshot>, tokio_rusqlite::Error> {
        Ok(self
            .fetch(filter)
            .await?
            .into_iter()
            .map(|row| row.snapshot)
            .collect())
    }

    /// Inserts or replaces the snapshot for `(post_id, snapshot_date)`.
    #[instrument(skip(self, input))]
    pub async fn upsert(
        &self,
        post_id: i64,
        snapshot_date: NaiveDate,
        input: SnapshotInput,
    ) -> Result<MetricSnapshot, tokio_rusqlite::Error> {
        self.db
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO metric_snapshots (
                        post_id, snapshot_date, views, likes, shares, clicks, conversions, revenue
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(post_id, snapshot_date) DO UPDATE SET
                        views = excluded.views,
                        likes = excluded.likes,
                        shares = excluded.shares,
                        clicks = excluded.clicks,
                        conversions = excluded.conversions,
                        revenue = excluded.revenue,
                        updated_at = unixepoch()",
                    params![
                        post_id,
                        snapshot_date,
                        input.views,
                        input.likes,
                        input.shares,
                        input.clicks,
                        input.conversions,
                        decimal_to_sql(input.revenue),
                    ],
                )?;

                Ok(MetricSnapshot {
                    post_id,
                    snapshot_date,
                    views: input.views,
                    likes: input.likes,
                    shares: input.shares,
                    clicks: input.clicks,
                    conversions: input.conversions,
                    revenue: input.revenue,
                })
            })
            .await
    }
}

pub(crate) async fn post_exists(
    db: &Connection,
    post_id: i64,
) -> Result<bool, tokio_rusqlite::Error> {
    db.call(move |conn| {
        Ok(conn
            .query_row("SELECT 1 FROM posts WHERE id = ?1", [post_id], |_| Ok(()))
            .optional()?
            .is_some())
    })
    .await
}

pub async fn list_post_snapshots(
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> Result<Json<Vec<MetricSnapshot>>, ApiError> {
    if !post_exists(&state.db, post_id).await? {
        return Err(ApiError::not_found("post", post_id));
    }

    let snapshots = SnapshotQueries::new(state.db)
        .fetch_snapshots(SnapshotFilter {
            post_id: Some(post_id),
            ..Default::default()
        })
        .await?;
    Ok(Json(snapshots))
}

pub async fn upsert_snapshot(
    State(state): State<AppState>,
    Path((post_id, snapshot_date)): Path<(i64, NaiveDate)>,
    Json(input): Json<SnapshotInput>,
) -> Result<Json<MetricSnapshot>, ApiError> {
    validate_snapshot_date(snapshot_date)?;
    input.validate()?;
    if !post_exists(&state.db, post_id).await? {
        return Err(ApiError::not_found("post", post_id));
    }

    let snapshot = SnapshotQueries::new(state.db)
        .upsert(post_id, snapshot_date, input)
        .await?;
    Ok(Json(snapshot))
}
