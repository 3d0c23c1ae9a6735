const HEADROOM: f64 = 1.15;
const EMPTY_FLOOR: f64 = 5.0;
const SMALL_FLOOR: f64 = 2.0;

fn valid(value: &f64) -> bool {
    value.is_finite() && *value >= 0.0
}

/// Chart range `(0, max)` covering every valid value and threshold with 15%
/// headroom. Always returns `max > 0`.
pub fn compute_display_range(values: &[f64], thresholds: &[f64]) -> (f64, f64) {
    let max_threshold = thresholds
        .iter()
        .copied()
        .filter(valid)
        .fold(f64::NEG_INFINITY, f64::max);
    let max_value = values
        .iter()
        .copied()
        .filter(valid)
        .fold(f64::NEG_INFINITY, f64::max);

    if max_value == f64::NEG_INFINITY {
        return (0.0, (max_threshold * HEADROOM).max(EMPTY_FLOOR));
    }

    let actual_max = max_value.max(max_threshold);
    let upper = actual_max * HEADROOM;
    if actual_max < 1.0 {
        return (0.0, upper.max(SMALL_FLOOR));
    }
    (0.0, upper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn adds_headroom_over_data_and_thresholds() {
        let (min, max) = compute_display_range(&[3.0, 12.0], &[5.0, 20.0, 90.0]);
        assert_eq!(min, 0.0);
        assert!((max - 103.5).abs() < 1e-9);

        let (_, max) = compute_display_range(&[200.0], &[5.0, 20.0, 90.0]);
        assert!((max - 230.0).abs() < 1e-9);
    }

    #[test]
    fn ignores_invalid_values() {
        let (_, max) = compute_display_range(&[f64::NAN, -3.0, f64::INFINITY, 10.0], &[5.0]);
        assert!((max - 11.5).abs() < 1e-9);
    }

    #[test]
    fn empty_series_uses_thresholds_with_floor() {
        assert_eq!(compute_display_range(&[], &[0.07, 0.2, 0.5]), (0.0, 5.0));
        assert_eq!(compute_display_range(&[f64::NAN], &[]), (0.0, 5.0));
        let (_, max) = compute_display_range(&[], &[90.0]);
        assert!((max - 103.5).abs() < 1e-9);
    }

    #[test]
    fn small_values_get_a_readable_floor() {
        assert_eq!(compute_display_range(&[0.01], &[0.07, 0.2, 0.5]), (0.0, 2.0));
        assert_eq!(compute_display_range(&[0.0], &[]), (0.0, 2.0));
    }

    proptest! {
        #[test]
        fn range_is_never_degenerate(
            values in proptest::collection::vec(prop_oneof![any::<f64>(), 0.0f64..1e6], 0..20),
            thresholds in proptest::collection::vec(0.0f64..1e6, 0..5),
        ) {
            let (min, max) = compute_display_range(&values, &thresholds);
            prop_assert_eq!(min, 0.0);
            prop_assert!(max > min);
        }
    }
}
