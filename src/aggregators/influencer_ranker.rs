use std::cmp::Ordering;

use rust_decimal::prelude::ToPrimitive;

use super::{
    aggregate, calculate_roi, AggregatedMetrics, InfluencerMetrics, InfluencerScoreEntry,
    RankingMetric,
};

fn score(metrics: &AggregatedMetrics, metric: RankingMetric, cost: f64) -> f64 {
    match metric {
        RankingMetric::Roi => calculate_roi(metrics.total.revenue, cost),
        RankingMetric::Engagement => metrics.engagement_rate,
        RankingMetric::Reach => metrics.total.views as f64,
        RankingMetric::Conversions => metrics.total.conversions as f64,
    }
}

/// Scores every influencer by `metric` and returns them best first with
/// 1-based ranks. Equal scores keep their input order.
///
/// An influencer without a known cost scores exactly `0` under
/// [`RankingMetric::Roi`].
pub fn rank_influencers(
    influencers: &[InfluencerMetrics],
    metric: RankingMetric,
) -> Vec<InfluencerScoreEntry> {
    let mut entries: Vec<InfluencerScoreEntry> = influencers
        .iter()
        .map(|influencer| {
            let metrics = aggregate(&influencer.metrics);
            let cost = influencer
                .cost
                .and_then(|cost| cost.to_f64())
                .unwrap_or(0.0);

            InfluencerScoreEntry {
                id: influencer.id,
                name: influencer.name.clone(),
                score: score(&metrics, metric, cost),
                metrics,
                rank: 0,
            }
        })
        .collect();

    // sort_by is stable, so ties stay in input order
    entries.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    for (index, entry) in entries.iter_mut().enumerate() {
        entry.rank = index + 1;
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregators::MetricSnapshot;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    fn snapshot(views: i64, likes: i64, conversions: i64, revenue: i64) -> MetricSnapshot {
        MetricSnapshot {
            post_id: 1,
            snapshot_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            views: Some(views),
            likes: Some(likes),
            shares: None,
            clicks: None,
            conversions: Some(conversions),
            revenue: Some(Decimal::from(revenue)),
        }
    }

    fn influencer(
        id: i64,
        name: &str,
        metrics: Vec<MetricSnapshot>,
        cost: Option<i64>,
    ) -> InfluencerMetrics {
        InfluencerMetrics {
            id,
            name: name.to_string(),
            metrics,
            cost: cost.map(Decimal::from),
        }
    }

    fn names(entries: &[InfluencerScoreEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn reach_ties_keep_input_order() {
        let influencers = vec![
            influencer(1, "A", vec![snapshot(500, 0, 0, 0)], None),
            influencer(2, "B", vec![snapshot(1000, 0, 0, 0)], None),
            influencer(3, "C", vec![snapshot(400, 0, 0, 0), snapshot(600, 0, 0, 0)], None),
        ];
        let ranked = rank_influencers(&influencers, RankingMetric::Reach);

        assert_eq!(names(&ranked), vec!["B", "C", "A"]);
        assert_eq!(
            ranked.iter().map(|e| e.rank).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(ranked[0].score, 1000.0);
        assert_eq!(ranked[1].score, 1000.0);
    }

    #[test]
    fn roi_uses_cost_and_missing_cost_scores_zero() {
        let influencers = vec![
            influencer(1, "no-contract", vec![snapshot(10, 0, 0, 5000)], None),
            influencer(2, "loss", vec![snapshot(10, 0, 0, 50)], Some(100)),
            influencer(3, "profit", vec![snapshot(10, 0, 0, 300)], Some(100)),
        ];
        let ranked = rank_influencers(&influencers, RankingMetric::Roi);

        assert_eq!(names(&ranked), vec!["profit", "no-contract", "loss"]);
        assert_eq!(ranked[0].score, 200.0);
        assert_eq!(ranked[1].score, 0.0);
        assert_eq!(ranked[2].score, -50.0);
    }

    #[test]
    fn engagement_and_conversions() {
        let influencers = vec![
            influencer(1, "low", vec![snapshot(1000, 10, 9, 0)], None),
            influencer(2, "high", vec![snapshot(100, 20, 1, 0)], None),
        ];

        let by_engagement = rank_influencers(&influencers, RankingMetric::Engagement);
        assert_eq!(names(&by_engagement), vec!["high", "low"]);
        assert!((by_engagement[0].score - 20.0).abs() < 1e-9);

        let by_conversions = rank_influencers(&influencers, RankingMetric::Conversions);
        assert_eq!(names(&by_conversions), vec!["low", "high"]);
        assert_eq!(by_conversions[0].score, 9.0);
    }

    #[test]
    fn ranks_are_contiguous_and_scores_non_increasing() {
        let influencers: Vec<InfluencerMetrics> = [30, 10, 30, 0, 20, 10]
            .iter()
            .enumerate()
            .map(|(i, views)| {
                influencer(i as i64, &format!("i{i}"), vec![snapshot(*views, 0, 0, 0)], None)
            })
            .collect();
        let ranked = rank_influencers(&influencers, RankingMetric::Reach);

        assert_eq!(ranked.len(), influencers.len());
        for (index, entry) in ranked.iter().enumerate() {
            assert_eq!(entry.rank, index + 1);
        }
        assert!(ranked.windows(2).all(|pair| pair[0].score >= pair[1].score));
    }

    #[test]
    fn influencer_without_snapshots_is_still_ranked() {
        let influencers = vec![
            influencer(1, "quiet", vec![], Some(100)),
            influencer(2, "busy", vec![snapshot(10, 0, 0, 0)], None),
        ];
        let ranked = rank_influencers(&influencers, RankingMetric::Reach);
        assert_eq!(names(&ranked), vec!["busy", "quiet"]);
        assert_eq!(ranked[1].metrics.total.views, 0);
    }

    #[test]
    fn empty_input() {
        assert!(rank_influencers(&[], RankingMetric::Roi).is_empty());
    }
}
