/// Return on investment as a percentage.
///
/// A zero (or NaN) cost yields `0` whatever the revenue, including negative
/// revenue. Callers with no known cost pass `0` and get `0` back.
pub fn calculate_roi(revenue: f64, cost: f64) -> f64 {
    if cost == 0.0 || cost.is_nan() {
        return 0.0;
    }
    ((revenue - cost) / cost) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profit_and_loss() {
        assert_eq!(calculate_roi(150.0, 100.0), 50.0);
        assert_eq!(calculate_roi(50.0, 100.0), -50.0);
        assert_eq!(calculate_roi(100.0, 100.0), 0.0);
    }

    #[test]
    fn zero_cost_is_zero_roi() {
        assert_eq!(calculate_roi(500.0, 0.0), 0.0);
        assert_eq!(calculate_roi(-20.0, 0.0), 0.0);
        assert_eq!(calculate_roi(0.0, 0.0), 0.0);
        assert_eq!(calculate_roi(10.0, f64::NAN), 0.0);
    }

    #[test]
    fn no_revenue_loses_everything() {
        assert_eq!(calculate_roi(0.0, 250.0), -100.0);
    }
}
