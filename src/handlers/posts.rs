use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use chrono::NaiveDate;
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;
use tokio_rusqlite::Connection;
use tracing::info;

use super::campaigns::fetch_campaign;
use super::influencers::influencer_exists;
use crate::error::ApiError;
use crate::models::{Platform, Post};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostInput {
    pub campaign_id: i64,
    pub influencer_id: i64,
    pub platform: Platform,
    pub url: Option<String>,
    pub published_at: NaiveDate,
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PostQuery {
    pub campaign_id: Option<i64>,
    pub influencer_id: Option<i64>,
}

pub(crate) async fn fetch_post(
    db: &Connection,
    id: i64,
) -> Result<Option<Post>, tokio_rusqlite::Error> {
    db.call(move |conn| {
        let query = format!("SELECT {} FROM posts WHERE id = ?1", Post::COLUMNS);
        Ok(conn.query_row(&query, [id], Post::from_row).optional()?)
    })
    .await
}

pub async fn list_posts(
    State(state): State<AppState>,
    Query(query): Query<PostQuery>,
) -> Result<Json<Vec<Post>>, ApiError> {
    let posts = state
        .db
        .call(move |conn| {
            let sql = format!(
                "SELECT {} FROM posts
                 WHERE (?1 IS NULL OR campaign_id = ?1)
                   AND (?2 IS NULL OR influencer_id = ?2)
                 ORDER BY published_at ASC, id ASC",
                Post::COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let posts = stmt
                .query_map(params![query.campaign_id, query.influencer_id], Post::from_row)?
                .collect::<Result<Vec<_>, rusqlite::Error>>()?;
            Ok(posts)
        })
        .await?;
    Ok(Json(posts))
}

pub async fn create_post(
    State(state): State<AppState>,
    Json(input): Json<PostInput>,
) -> Result<(StatusCode, Json<Post>), ApiError> {
    if fetch_campaign(&state.db, input.campaign_id).await?.is_none() {
        return Err(ApiError::Validation(format!(
            "campaign {} does not exist",
            input.campaign_id
        )));
    }
    if !influencer_exists(&state.db, input.influencer_id).await? {
        return Err(ApiError::Validation(format!(
            "influencer {} does not exist",
            input.influencer_id
        )));
    }

    let id = state
        .db
        .call(move |conn| {
            let id: i64 = conn.query_row(
                "INSERT INTO posts (campaign_id, influencer_id, platform, url, published_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 RETURNING id",
                params![
                    input.campaign_id,
                    input.influencer_id,
                    input.platform,
                    input.url,
                    input.published_at,
                ],
                |row| row.get(0),
            )?;
            Ok(id)
        })
        .await?;
    info!("Created post {}", id);

    let post = fetch_post(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("post", id))?;
    Ok((StatusCode::CREATED, Json(post)))
}
