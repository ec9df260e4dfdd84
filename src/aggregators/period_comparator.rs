use super::{PeriodComparison, PeriodComparisons, PeriodMeasures};

fn compare(current: f64, previous: f64) -> PeriodComparison {
    let change = if previous <= 0.0 {
        0.0
    } else {
        ((current - previous) / previous) * 100.0
    };

    PeriodComparison {
        value: current,
        change,
        is_positive: change > 0.0,
    }
}

/// Percentage change of each measure from `previous` to `current`.
/// Measures are compared independently; a previous value of zero gives no change.
pub fn compare_periods(current: &PeriodMeasures, previous: &PeriodMeasures) -> PeriodComparisons {
    PeriodComparisons {
        views: compare(current.views, previous.views),
        engagement: compare(current.engagement, previous.engagement),
        conversions: compare(current.conversions, previous.conversions),
    }
}
