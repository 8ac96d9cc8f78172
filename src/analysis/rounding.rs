//! Deterministic decimal rounding for reported hour values.

/// Round `value` to `places` decimals, halves away from zero.
///
/// The scaled value is first snapped to 6 extra decimals so binary
/// representation noise (`2.345 * 100 == 234.49999999999997`) does not turn
/// an exact half into a round-down.
pub fn round_half_up(value: f64, places: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }

    let factor = 10f64.powi(places as i32);
    let scaled = (value.abs() * factor * 1e6).round() / 1e6;
    ((scaled + 0.5).trunc() / factor).copysign(value)
}

/// Round to two decimals, the precision of every reported hour value.
pub fn round2(value: f64) -> f64 {
    round_half_up(value, 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_half_rounds_up() {
        assert_eq!(round_half_up(2.345, 2), 2.35);
        assert_eq!(round_half_up(1.005, 2), 1.01);
        assert_eq!(round_half_up(0.125, 2), 0.13);
        assert_eq!(round_half_up(2.5, 0), 3.0);
    }

    #[test]
    fn test_below_half_rounds_down() {
        assert_eq!(round_half_up(2.344, 2), 2.34);
        assert_eq!(round_half_up(10.0 / 3.0, 2), 3.33);
    }

    #[test]
    fn test_negative_and_zero() {
        assert_eq!(round_half_up(0.0, 2), 0.0);
        assert_eq!(round_half_up(-2.345, 2), -2.35);
    }

    #[test]
    fn test_round2_matches_two_places() {
        assert_eq!(round2(11.0), 11.0);
        assert_eq!(round2(1.0 / 8.0), 0.13);
    }
}
