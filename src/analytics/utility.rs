/// Computes the arithmetic mean of a slice of values. Returns 0.0 for empty input.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Percent change from `previous` to `current`.
///
/// A zero baseline yields 100.0 when anything appeared and 0.0 otherwise.
pub fn percent_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        if current > 0.0 { 100.0 } else { 0.0 }
    } else {
        (current - previous) / previous * 100.0
    }
}

/// Caps a heuristic confidence at 95.
pub fn capped_confidence(raw: f64) -> f64 {
    raw.clamp(0.0, 95.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
        assert_eq!(mean(&[5.0, 3.0, 5.0, 5.0]), 4.5);
    }

    #[test]
    fn test_percent_change() {
        assert_eq!(percent_change(110.0, 100.0), 10.0);
        assert_eq!(percent_change(50.0, 100.0), -50.0);
        assert_eq!(percent_change(3.0, 0.0), 100.0);
        assert_eq!(percent_change(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_confidence_cap() {
        assert_eq!(capped_confidence(120.0), 95.0);
        assert_eq!(capped_confidence(52.0), 52.0);
    }
}
