use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{NaiveDate, Utc};
use rusqlite::{params, OptionalExtension};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::Connection;
use tracing::{debug, info};

use super::campaigns::{fetch_contracts, total_cost};
use super::snapshots::{SnapshotFilter, SnapshotQueries};
use crate::aggregators::{
    aggregate, rank_influencers, AggregatedMetrics, InfluencerMetrics, InfluencerScoreEntry,
    MetricSnapshot, RankingMetric, TimeFrame,
};
use crate::error::ApiError;
use crate::models::{Influencer, Platform};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfluencerInput {
    pub name: String,
    pub handle: Option<String>,
    pub platform: Platform,
    pub follower_count: Option<i64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InfluencerDetail {
    #[serde(flatten)]
    pub influencer: Influencer,
    pub metrics: AggregatedMetrics,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingQuery {
    pub metric: RankingMetric,
    #[serde(default)]
    pub timeframe: TimeFrame,
    pub campaign_id: Option<i64>,
}

pub(crate) async fn influencer_exists(
    db: &Connection,
    id: i64,
) -> Result<bool, tokio_rusqlite::Error> {
    db.call(move |conn| {
        Ok(conn
            .query_row("SELECT 1 FROM influencers WHERE id = ?1", [id], |_| Ok(()))
            .optional()?
            .is_some())
    })
    .await
}

async fn fetch_influencers(db: &Connection) -> Result<Vec<Influencer>, tokio_rusqlite::Error> {
    db.call(|conn| {
        let query = format!("SELECT {} FROM influencers ORDER BY id", Influencer::COLUMNS);
        let mut stmt = conn.prepare(&query)?;
        let influencers = stmt
            .query_map([], Influencer::from_row)?
            .collect::<Result<Vec<_>, rusqlite::Error>>()?;
        Ok(influencers)
    })
    .await
}

async fn fetch_influencer(
    db: &Connection,
    id: i64,
) -> Result<Option<Influencer>, tokio_rusqlite::Error> {
    db.call(move |conn| {
        let query = format!("SELECT {} FROM influencers WHERE id = ?1", Influencer::COLUMNS);
        Ok(conn.query_row(&query, [id], Influencer::from_row).optional()?)
    })
    .await
}

/// Builds the leaderboard for `metric`. Every influencer is ranked, including
/// those with no snapshots in the window.
pub(crate) async fn ranking(
    db: Arc<Connection>,
    metric: RankingMetric,
    timeframe: TimeFrame,
    campaign_id: Option<i64>,
    today: NaiveDate,
) -> Result<Vec<InfluencerScoreEntry>, ApiError> {
    let influencers = fetch_influencers(&db).await?;
    let rows = SnapshotQueries::new(db.clone())
        .fetch(SnapshotFilter {
            campaign_id,
            range: timeframe.current_range(today),
            ..Default::default()
        })
        .await?;
    let contracts = fetch_contracts(&db, campaign_id).await?;

    let mut snapshots_by_influencer: HashMap<i64, Vec<MetricSnapshot>> = HashMap::new();
    for row in rows {
        snapshots_by_influencer
            .entry(row.influencer_id)
            .or_default()
            .push(row.snapshot);
    }
    let mut costs_by_influencer: HashMap<i64, Vec<Option<Decimal>>> = HashMap::new();
    for contract in contracts {
        costs_by_influencer
            .entry(contract.influencer_id)
            .or_default()
            .push(contract.cost);
    }

    let inputs: Vec<InfluencerMetrics> = influencers
        .into_iter()
        .map(|influencer| InfluencerMetrics {
            metrics: snapshots_by_influencer
                .remove(&influencer.id)
                .unwrap_or_default(),
            cost: total_cost(costs_by_influencer.remove(&influencer.id).unwrap_or_default()),
            id: influencer.id,
            name: influencer.name,
        })
        .collect();
    debug!("Ranking {} influencers by {:?}", inputs.len(), metric);

    Ok(rank_influencers(&inputs, metric))
}

pub async fn list_influencers(
    State(state): State<AppState>,
) -> Result<Json<Vec<Influencer>>, ApiError> {
    Ok(Json(fetch_influencers(&state.db).await?))
}

pub async fn create_influencer(
    State(state): State<AppState>,
    Json(input): Json<InfluencerInput>,
) -> Result<(StatusCode, Json<Influencer>), ApiError> {
    if input.name.trim().is_empty() {
        return Err(ApiError::Validation("name must not be empty".to_string()));
    }
    if input.follower_count.is_some_and(|count| count < 0) {
        return Err(ApiError::Validation(
            "followerCount must not be negative".to_string(),
        ));
    }

    let id = state
        .db
        .call(move |conn| {
            let id: i64 = conn.query_row(
                "INSERT INTO influencers (name, handle, platform, follower_count)
                 VALUES (?1, ?2, ?3, ?4)
                 RETURNING id",
                params![
                    input.name.trim(),
                    input.handle,
                    input.platform,
                    input.follower_count
                ],
                |row| row.get(0),
            )?;
            Ok(id)
        })
        .await?;
    info!("Created influencer {}", id);

    let influencer = fetch_influencer(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("influencer", id))?;
    Ok((StatusCode::CREATED, Json(influencer)))
}

pub async fn get_influencer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<InfluencerDetail>, ApiError> {
    let influencer = fetch_influencer(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("influencer", id))?;
    let snapshots = SnapshotQueries::new(state.db)
        .fetch_snapshots(SnapshotFilter {
            influencer_id: Some(id),
            ..Default::default()
        })
        .await?;

    Ok(Json(InfluencerDetail {
        influencer,
        metrics: aggregate(&snapshots),
    }))
}

pub async fn delete_influencer(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .db
        .call(move |conn| Ok(conn.execute("DELETE FROM influencers WHERE id = ?1", [id])?))
        .await?;
    if deleted == 0 {
        return Err(ApiError::not_found("influencer", id));
    }
    info!("Deleted influencer {}", id);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_ranking(
    State(state): State<AppState>,
    Query(query): Query<RankingQuery>,
) -> Result<Json<Vec<InfluencerScoreEntry>>, ApiError> {
    let today = Utc::now().date_naive();
    let entries = ranking(
        state.db,
        query.metric,
        query.timeframe,
        query.campaign_id,
        today,
    )
    .await?;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::campaigns::{upsert_contract, ContractInput};
    use crate::handlers::posts::fetch_post;
    use crate::handlers::snapshots::SnapshotInput;
    use crate::test_support::{seed_post, test_state};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 4, d).unwrap()
    }

    async fn record(state: &AppState, post_id: i64, d: u32, views: i64, revenue: i64) {
        SnapshotQueries::new(state.db.clone())
            .upsert(
                post_id,
                day(d),
                SnapshotInput {
                    views: Some(views),
                    likes: Some(views / 10),
                    revenue: Some(Decimal::from(revenue)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn create_and_fetch_with_metrics() {
        let state = test_state().await;
        let (status, Json(created)) = create_influencer(
            State(state.clone()),
            Json(InfluencerInput {
                name: "Grace".to_string(),
                handle: Some("@grace".to_string()),
                platform: Platform::YouTube,
                follower_count: Some(12_000),
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created.platform, Platform::YouTube);

        let Json(detail) = get_influencer(State(state.clone()), Path(created.id)).await.unwrap();
        assert_eq!(detail.influencer.name, "Grace");
        assert_eq!(detail.metrics.total.views, 0);

        let Json(all) = list_influencers(State(state)).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn reach_ranking_covers_everyone_in_window() {
        let state = test_state().await;
        let ada = seed_post(&state, "Spring", "Ada", Platform::Instagram).await;
        let bo = seed_post(&state, "Spring", "Bo", Platform::TikTok).await;
        seed_post(&state, "Spring", "Cy", Platform::YouTube).await;

        record(&state, ada, 19, 500, 0).await;
        record(&state, bo, 20, 1000, 0).await;
        // outside the 7 day window
        record(&state, ada, 1, 9000, 0).await;

        let entries = ranking(
            state.db.clone(),
            RankingMetric::Reach,
            TimeFrame::Last7Days,
            None,
            day(20),
        )
        .await
        .unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Bo", "Ada", "Cy"]);
        assert_eq!(entries.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert_eq!(entries[2].score, 0.0);
    }

    #[tokio::test]
    async fn roi_ranking_without_contracts_is_all_zero() {
        let state = test_state().await;
        let ada = seed_post(&state, "Spring", "Ada", Platform::Instagram).await;
        let bo = seed_post(&state, "Spring", "Bo", Platform::Instagram).await;
        record(&state, ada, 10, 100, 900).await;
        record(&state, bo, 10, 100, 50).await;

        let entries = ranking(
            state.db.clone(),
            RankingMetric::Roi,
            TimeFrame::AllTime,
            None,
            day(20),
        )
        .await
        .unwrap();
        assert!(entries.iter().all(|e| e.score == 0.0));
        // ties keep id order
        assert_eq!(entries[0].name, "Ada");

        let post = fetch_post(&state.db, bo).await.unwrap().unwrap();
        let Json(contract) = upsert_contract(
            State(state.clone()),
            Path((post.campaign_id, post.influencer_id)),
            Json(ContractInput {
                cost: Some(Decimal::from(25)),
            }),
        )
        .await
        .unwrap();
        assert_eq!(contract.cost, Some(Decimal::from(25)));

        let entries = ranking(
            state.db.clone(),
            RankingMetric::Roi,
            TimeFrame::AllTime,
            Some(post.campaign_id),
            day(20),
        )
        .await
        .unwrap();
        assert_eq!(entries[0].name, "Bo");
        assert!((entries[0].score - 100.0).abs() < 1e-9);
    }

    #[tokio::test]
    async fn delete_cascades_and_reports_missing() {
        let state = test_state().await;
        let post_id = seed_post(&state, "Spring", "Ada", Platform::Instagram).await;
        let post = fetch_post(&state.db, post_id).await.unwrap().unwrap();

        let status = delete_influencer(State(state.clone()), Path(post.influencer_id))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(fetch_post(&state.db, post_id).await.unwrap().is_none());

        let again = delete_influencer(State(state), Path(post.influencer_id)).await;
        assert!(matches!(again, Err(ApiError::NotFound { .. })));
    }
}
