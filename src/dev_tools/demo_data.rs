use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use rusqlite::params;
use rust_decimal::Decimal;
use tokio_rusqlite::Connection;
use tracing::info;

use crate::models::{CampaignStatus, Platform};

const SAMPLE_INFLUENCERS: &[(&str, &str, Platform, i64)] = &[
    ("Maya Chen", "@mayacooks", Platform::Instagram, 184_000),
    ("Leo Park", "@leoplays", Platform::TikTok, 920_000),
    ("Priya Nair", "@priyareviews", Platform::YouTube, 410_000),
    ("Sam Ortiz", "@samortiz", Platform::Twitter, 56_000),
    ("Nora Quinn", "@noraquinnfit", Platform::Instagram, 263_000),
    ("Tariq Bell", "@tariqtech", Platform::YouTube, 1_250_000),
];

const SAMPLE_CAMPAIGNS: &[(&str, CampaignStatus, i64)] = &[
    ("Spring Launch", CampaignStatus::Active, 25_000),
    ("Holiday Bundle", CampaignStatus::Completed, 40_000),
    ("Creator Week", CampaignStatus::Draft, 8_000),
];

const DEMO_DAYS: i64 = 30;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub influencers: usize,
    pub campaigns: usize,
    pub posts: usize,
    pub snapshots: usize,
}

/// Fills an empty database with a reproducible demo data set.
pub struct DemoDataGenerator {
    db: Arc<Connection>,
    seed: u64,
}

impl DemoDataGenerator {
    pub fn new(db: Arc<Connection>, seed: u64) -> Self {
        Self { db, seed }
    }

    /// Seeds `DEMO_DAYS` of snapshots ending at `today`. Does nothing when
    /// influencers already exist.
    pub async fn seed_if_empty(
        &self,
        today: NaiveDate,
    ) -> Result<Option<SeedSummary>, tokio_rusqlite::Error> {
        let seed = self.seed;
        let summary = self
            .db
            .call(move |conn| {
                let existing: i64 =
                    conn.query_row("SELECT COUNT(*) FROM influencers", [], |row| row.get(0))?;
                if existing > 0 {
                    return Ok(None);
                }

                let mut rng = StdRng::seed_from_u64(seed);
                let mut summary = SeedSummary::default();
                let tx = conn.transaction()?;

                let mut influencer_ids = Vec::new();
                for (name, handle, platform, followers) in SAMPLE_INFLUENCERS {
                    tx.execute(
                        "INSERT INTO influencers (name, handle, platform, follower_count)
                         VALUES (?1, ?2, ?3, ?4)",
                        params![name, handle, platform, followers],
                    )?;
                    influencer_ids.push((tx.last_insert_rowid(), *platform));
                    summary.influencers += 1;
                }

                let start = today - Duration::days(DEMO_DAYS - 1);
                for (name, status, budget) in SAMPLE_CAMPAIGNS {
                    tx.execute(
                        "INSERT INTO campaigns (name, status, budget, start_date, end_date)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                        params![name, status, budget.to_string(), start, today],
                    )?;
                    let campaign_id = tx.last_insert_rowid();
                    summary.campaigns += 1;

                    if *status == CampaignStatus::Draft {
                        continue;
                    }

                    let roster: Vec<_> = influencer_ids
                        .choose_multiple(&mut rng, 3)
                        .copied()
                        .collect();
                    for (influencer_id, platform) in roster {
                        // Some contracts are still being negotiated
                        let cost = rng
                            .gen_bool(0.8)
                            .then(|| Decimal::from(rng.gen_range(500_i64..5_000)));
                        tx.execute(
                            "INSERT INTO campaign_influencers (campaign_id, influencer_id, cost)
                             VALUES (?1, ?2, ?3)",
                            params![campaign_id, influencer_id, cost.map(|c| c.to_string())],
                        )?;

                        let published_at = start + Duration::days(rng.gen_range(0..7));
                        let url =
                            format!("https://example.com/{}/{}", platform.as_str(), campaign_id);
                        tx.execute(
                            "INSERT INTO posts (
                                campaign_id, influencer_id, platform, url, published_at
                             ) VALUES (?1, ?2, ?3, ?4, ?5)",
                            params![campaign_id, influencer_id, platform, url, published_at],
                        )?;
                        let post_id = tx.last_insert_rowid();
                        summary.posts += 1;

                        summary.snapshots +=
                            insert_snapshots(&tx, &mut rng, post_id, published_at, today)?;
                    }
                }

                tx.commit()?;
                Ok(Some(summary))
            })
            .await?;

        if let Some(summary) = &summary {
            info!(
                "Seeded demo data: {} influencers, {} campaigns, {} posts, {} snapshots",
                summary.influencers, summary.campaigns, summary.posts, summary.snapshots
            );
        }
        Ok(summary)
    }
}

fn insert_snapshots(
    conn: &rusqlite::Connection,
    rng: &mut StdRng,
    post_id: i64,
    published_at: NaiveDate,
    today: NaiveDate,
) -> rusqlite::Result<usize> {
    let mut inserted = 0;
    let mut date = published_at;
    // Views decay after the first days of a post
    let mut base_views: i64 = rng.gen_range(2_000..20_000);

    while date <= today {
        let views = base_views + rng.gen_range(0..base_views / 4 + 1);
        let likes = views * rng.gen_range(2..9) / 100;
        let shares = likes * rng.gen_range(5..20) / 100;
        let clicks = views * rng.gen_range(1..4) / 100;
        let conversions = clicks * rng.gen_range(2..10) / 100;
        let revenue = Decimal::new(conversions * rng.gen_range(1_500..6_000), 2);

        // Not every platform reports every field every day
        let clicks = rng.gen_bool(0.9).then_some(clicks);
        let revenue = rng.gen_bool(0.9).then_some(revenue);

        conn.execute(
            "INSERT INTO metric_snapshots (
                post_id, snapshot_date, views, likes, shares, clicks, conversions, revenue
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                post_id,
                date,
                views,
                likes,
                shares,
                clicks,
                conversions,
                revenue.map(|r| r.to_string())
            ],
        )?;
        inserted += 1;
        base_views = (base_views * 85 / 100).max(50);
        date += Duration::days(1);
    }

    Ok(inserted)
}
