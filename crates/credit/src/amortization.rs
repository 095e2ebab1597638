//! Amortization Module
//!
//! Fixed monthly payments for an annuity loan. Rates are annual percents
//! (12 means 12% per year); the monthly rate is `rate / 12 / 100`.
//!
//! Every function is pure and returns `None` on a domain violation or
//! when the decimal range is exceeded.

use rust_decimal::{Decimal, MathematicalOps};

const MONTHS_PER_YEAR: Decimal = Decimal::from_parts(12, 0, 0, false, 0);

/// Monthly rate as a fraction, `None` unless the annual rate is positive
fn monthly_rate(annual_percent: Decimal) -> Option<Decimal> {
    if annual_percent <= Decimal::ZERO {
        return None;
    }
    annual_percent
        .checked_div(MONTHS_PER_YEAR)?
        .checked_div(Decimal::ONE_HUNDRED)
}

/// Fixed monthly payment `P * (p + p / ((1 + p)^n - 1))`
pub fn calculate_monthly_payment(
    principal: Decimal,
    annual_percent: Decimal,
    periods: u32,
) -> Option<Decimal> {
    if periods == 0 {
        return None;
    }
    let p = monthly_rate(annual_percent)?;
    let growth = (Decimal::ONE + p).checked_powi(periods as i64)?;
    let t = growth - Decimal::ONE;
    if t.is_zero() {
        return None;
    }
    principal.checked_mul(p.checked_add(p.checked_div(t)?)?)
}

/// Schedule balance after `paid` regular payments, floored at zero
///
/// `P(1+p)^k - M((1+p)^k - 1)/p`
pub fn remaining_principal(
    principal: Decimal,
    annual_percent: Decimal,
    periods: u32,
    paid: u32,
) -> Option<Decimal> {
    if paid >= periods {
        return Some(Decimal::ZERO);
    }
    let p = monthly_rate(annual_percent)?;
    let payment = calculate_monthly_payment(principal, annual_percent, periods)?;
    let growth = (Decimal::ONE + p).checked_powi(paid as i64)?;

    let accrued = principal.checked_mul(growth)?;
    let repaid = payment.checked_mul(growth - Decimal::ONE)?.checked_div(p)?;
    Some((accrued - repaid).max(Decimal::ZERO))
}

/// One month of interest on the principal
pub fn monthly_interest(principal: Decimal, annual_percent: Decimal) -> Option<Decimal> {
    principal.checked_mul(monthly_rate(annual_percent)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn assert_close(actual: Decimal, expected: Decimal) {
        assert!(
            (actual - expected).abs() < dec!(0.000001),
            "expected {} got {}",
            expected,
            actual
        );
    }

    #[test]
    fn test_monthly_payment_reference_value() {
        // 12000 at 12% over 12 months
        let m = calculate_monthly_payment(dec!(12000), dec!(12), 12).unwrap();
        assert_close(m, dec!(1066.185464));
    }

    #[test]
    fn test_monthly_payment_small_loan() {
        let m = calculate_monthly_payment(dec!(1000), dec!(12), 12).unwrap();
        assert_close(m, dec!(88.848789));
        // Twelve payments repay principal plus interest
        assert_close(m * dec!(12), dec!(1066.185464));
    }

    #[test]
    fn test_single_period_is_principal_plus_interest() {
        let m = calculate_monthly_payment(dec!(1000), dec!(12), 1).unwrap();
        assert_close(m, dec!(1010));
    }

    #[test]
    fn test_domain_violations() {
        assert_eq!(calculate_monthly_payment(dec!(1000), dec!(12), 0), None);
        assert_eq!(calculate_monthly_payment(dec!(1000), dec!(0), 12), None);
        assert_eq!(calculate_monthly_payment(dec!(1000), dec!(-5), 12), None);
    }

    #[test]
    fn test_zero_principal() {
        assert_eq!(
            calculate_monthly_payment(dec!(0), dec!(12), 12),
            Some(dec!(0))
        );
    }

    #[test]
    fn test_remaining_principal_schedule() {
        let p = dec!(1000);
        assert_close(remaining_principal(p, dec!(12), 12, 0).unwrap(), dec!(1000));

        // After one payment: 1000 * 1.01 - 88.848789
        assert_close(remaining_principal(p, dec!(12), 12, 1).unwrap(), dec!(921.151211));

        let mut previous = p;
        for k in 1..12 {
            let balance = remaining_principal(p, dec!(12), 12, k).unwrap();
            assert!(balance < previous);
            previous = balance;
        }

        assert_eq!(remaining_principal(p, dec!(12), 12, 12), Some(dec!(0)));
        assert_eq!(remaining_principal(p, dec!(12), 12, 13), Some(dec!(0)));
    }

    #[test]
    fn test_last_installment_clears_balance() {
        let p = dec!(1000);
        let m = calculate_monthly_payment(p, dec!(12), 12).unwrap();
        let before_last = remaining_principal(p, dec!(12), 12, 11).unwrap();
        assert_close(before_last * dec!(1.01), m);
    }

    #[test]
    fn test_monthly_interest() {
        assert_eq!(monthly_interest(dec!(1000), dec!(12)), Some(dec!(10)));
        assert_eq!(monthly_interest(dec!(1000), dec!(0)), None);
    }
}
