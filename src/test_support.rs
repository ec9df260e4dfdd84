use std::sync::Arc;

use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;

use crate::middleware::Credentials;
use crate::migrations::initialize_database;
use crate::models::Platform;
use crate::AppState;

/// Fresh in-memory database with the full schema.
pub async fn test_state() -> AppState {
    let db = Connection::open_in_memory().await.unwrap();
    initialize_database(&db).await.unwrap();
    AppState {
        db: Arc::new(db),
        credentials: Arc::new(Credentials {
            username: "admin".to_string(),
            password: "admin".to_string(),
        }),
    }
}

/// Inserts a post published on 2024-04-01, creating the named campaign and
/// influencer when they don't exist yet. Returns the post id.
pub async fn seed_post(
    state: &AppState,
    campaign: &str,
    influencer: &str,
    platform: Platform,
) -> i64 {
    let campaign = campaign.to_string();
    let influencer = influencer.to_string();
    state
        .db
        .call(move |conn| {
            let campaign_id = match conn
                .query_row("SELECT id FROM campaigns WHERE name = ?1", [&campaign], |row| {
                    row.get::<_, i64>(0)
                })
                .optional()?
            {
                Some(id) => id,
                None => conn.query_row(
                    "INSERT INTO campaigns (name, status) VALUES (?1, 'active') RETURNING id",
                    [&campaign],
                    |row| row.get(0),
                )?,
            };

            let influencer_id = match conn
                .query_row(
                    "SELECT id FROM influencers WHERE name = ?1",
                    [&influencer],
                    |row| row.get::<_, i64>(0),
                )
                .optional()?
            {
                Some(id) => id,
                None => conn.query_row(
                    "INSERT INTO influencers (name, platform) VALUES (?1, ?2) RETURNING id",
                    params![influencer, platform],
                    |row| row.get(0),
                )?,
            };

            let post_id: i64 = conn.query_row(
                "INSERT INTO posts (campaign_id, influencer_id, platform, published_at)
                 VALUES (?1, ?2, ?3, '2024-04-01')
                 RETURNING id",
                params![campaign_id, influencer_id, platform],
                |row| row.get(0),
            )?;
            Ok(post_id)
        })
        .await
        .unwrap()
}
