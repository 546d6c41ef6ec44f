/// Level principal-and-interest monthly payment that clears `principal` over
/// `remaining_years` at `annual_rate_pct`.
pub fn level_payment(principal: f64, annual_rate_pct: f64, remaining_years: f64) -> f64 {
    level_payment_for_periods(principal, annual_rate_pct, remaining_years * 12.0)
}

pub(crate) fn level_payment_for_periods(principal: f64, annual_rate_pct: f64, periods: f64) -> f64 {
    if !(principal > 0.0) {
        return 0.0;
    }
    if !(periods > 0.0) {
        return 0.0;
    }

    let monthly_rate = monthly_rate(annual_rate_pct);
    if monthly_rate == 0.0 {
        return principal / periods;
    }

    let denom = 1.0 - (1.0 + monthly_rate).powf(-periods);
    if denom <= 0.0 {
        return 0.0;
    }
    principal * monthly_rate / denom
}

pub(crate) fn monthly_rate(annual_rate_pct: f64) -> f64 {
    if annual_rate_pct.is_finite() {
        annual_rate_pct.max(0.0) / 100.0 / 12.0
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    #[test]
    fn oracle_standard_mortgage_payment() {
        // 600k at 5.99% over 25 years: P*r / (1 - (1+r)^-300) with r = 0.0599/12
        assert_approx_tol(level_payment(600_000.0, 5.99, 25.0), 3_862.141_556_617, 1e-6);
        assert_approx_tol(level_payment(100_000.0, 6.0, 30.0), 599.550_525_152_757, 1e-6);
    }

    #[test]
    fn zero_rate_divides_principal_evenly() {
        assert_approx_tol(level_payment(12_000.0, 0.0, 1.0), 1_000.0, 1e-12);
        assert_approx_tol(level_payment(120_000.0, 0.0, 10.0), 1_000.0, 1e-12);
    }

    #[test]
    fn non_positive_principal_or_term_pays_nothing() {
        assert_eq!(level_payment(0.0, 5.0, 25.0), 0.0);
        assert_eq!(level_payment(-10.0, 5.0, 25.0), 0.0);
        assert_eq!(level_payment(f64::NAN, 5.0, 25.0), 0.0);
        assert_eq!(level_payment(10_000.0, 0.0, 0.0), 0.0);
        assert_eq!(level_payment(10_000.0, 5.0, 0.0), 0.0);
    }

    #[test]
    fn negative_or_non_finite_rate_is_treated_as_zero() {
        assert_approx_tol(level_payment(1_200.0, -3.0, 1.0), 100.0, 1e-12);
        assert_approx_tol(level_payment(1_200.0, f64::INFINITY, 1.0), 100.0, 1e-12);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_payment_covers_first_month_interest(
            principal in 1_000.0f64..2_000_000.0,
            rate in 0.1f64..15.0,
            years in 1u32..40,
        ) {
            let payment = level_payment(principal, rate, years as f64);
            let interest = principal * monthly_rate(rate);
            prop_assert!(payment.is_finite());
            prop_assert!(payment > interest);
            prop_assert!(payment * (years as f64) * 12.0 >= principal);
        }

        #[test]
        fn prop_payment_is_linear_in_principal(
            principal in 1_000.0f64..1_000_000.0,
            rate in 0.0f64..12.0,
            years in 1u32..35,
        ) {
            let single = level_payment(principal, rate, years as f64);
            let double = level_payment(principal * 2.0, rate, years as f64);
            prop_assert!((double - 2.0 * single).abs() <= 1e-6 * double.max(1.0));
        }
    }
}
