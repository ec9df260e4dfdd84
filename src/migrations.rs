use anyhow::{Context, Result};
use rusqlite::params;
use tokio_rusqlite::Connection;
use tracing::info;

#[derive(Debug)]
struct Migration {
    name: &'static str,
    version: i32,
    up: fn(&rusqlite::Connection) -> rusqlite::Result<()>,
}

impl Migration {
    fn new(
        name: &'static str,
        version: i32,
        up: fn(&rusqlite::Connection) -> rusqlite::Result<()>,
    ) -> Self {
        Self { name, version, up }
    }
}

pub async fn initialize_database(db: &Connection) -> Result<()> {
    db.call(|conn| {
        // Off by default in SQLite, and per connection
        conn.execute_batch("PRAGMA foreign_keys = ON")?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS influencers (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                handle TEXT,
                platform TEXT NOT NULL,
                follower_count INTEGER,
                created_at INTEGER NOT NULL DEFAULT (unixepoch())
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS campaigns (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'draft',
                budget TEXT,           -- decimal amount
                start_date TEXT,       -- YYYY-MM-DD
                end_date TEXT,
                created_at INTEGER NOT NULL DEFAULT (unixepoch())
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS posts (
                id INTEGER PRIMARY KEY,
                campaign_id INTEGER NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                influencer_id INTEGER NOT NULL REFERENCES influencers(id) ON DELETE CASCADE,
                platform TEXT NOT NULL,
                url TEXT,
                published_at TEXT NOT NULL,
                created_at INTEGER NOT NULL DEFAULT (unixepoch())
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS metric_snapshots (
                id INTEGER PRIMARY KEY,
                post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
                snapshot_date TEXT NOT NULL,
                views INTEGER,
                likes INTEGER,
                shares INTEGER,
                clicks INTEGER,
                conversions INTEGER,
                revenue TEXT,          -- decimal amount
                updated_at INTEGER NOT NULL DEFAULT (unixepoch()),
                UNIQUE(post_id, snapshot_date)
            )",
            [],
        )?;

        Ok(())
    })
    .await
    .context("failed to create base tables")?;

    run_migrations(db).await?;

    Ok(())
}

fn get_migrations() -> Vec<Migration> {
    vec![
        Migration::new("Add campaign influencer contracts", 1, |conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS campaign_influencers (
                    campaign_id INTEGER NOT NULL REFERENCES campaigns(id) ON DELETE CASCADE,
                    influencer_id INTEGER NOT NULL REFERENCES influencers(id) ON DELETE CASCADE,
                    cost TEXT,         -- decimal amount, NULL when not agreed yet
                    PRIMARY KEY (campaign_id, influencer_id)
                )",
                [],
            )?;
            Ok(())
        }),
        Migration::new("Add optimal indices", 2, |conn| {
            // Dashboard and ranking queries filter snapshots by date range
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_snapshots_date ON metric_snapshots(snapshot_date)",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_posts_campaign ON posts(campaign_id)",
                [],
            )?;
            conn.execute(
                "CREATE INDEX IF NOT EXISTS idx_posts_influencer ON posts(influencer_id)",
                [],
            )?;
            Ok(())
        }),
    ]
}

async fn run_migrations(db: &Connection) -> Result<()> {
    info!("Running database migrations...");

    db.call(|conn| {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS migrations (
                id INTEGER PRIMARY KEY,
                version INTEGER NOT NULL UNIQUE,
                name TEXT NOT NULL,
                executed_at INTEGER NOT NULL
            )",
            [],
        )?;

        let executed_versions: Vec<i32> = {
            let mut stmt = conn.prepare("SELECT version FROM migrations ORDER BY version DESC")?;
            let versions = stmt
                .query_map([], |row| row.get(0))?
                .collect::<Result<Vec<i32>, _>>()?;
            versions
        };

        for migration in get_migrations() {
            if executed_versions.contains(&migration.version) {
                continue;
            }
            info!(
                "Running migration {} (version {})",
                migration.name, migration.version
            );

            let tx = conn.transaction()?;
            (migration.up)(&tx)?;
            tx.execute(
                "INSERT INTO migrations (version, name, executed_at) VALUES (?1, ?2, unixepoch())",
                params![&migration.version, &migration.name],
            )?;
            tx.commit()?;

            info!("Migration {} completed successfully", migration.version);
        }

        Ok(())
    })
    .await
    .context("failed to run database migrations")?;

    info!("All database migrations completed successfully");
    Ok(())
}
