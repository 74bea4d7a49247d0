//! Exact rational prices.
//!
//! A price is the number of units of the buying asset paid per unit of the
//! selling asset, stored as a positive `n/d` pair. Settlement math never
//! leaves integer arithmetic; floats and decimals are for display only.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// Rounding direction for `a * b / c`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rounding {
    /// Toward zero. Used for amounts owed *to* the account.
    Down,
    /// Away from zero. Used for amounts owed *by* the account.
    Up,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    #[error("Arithmetic overflow computing {a} * {b} / {c}")]
    ArithmeticOverflow { a: i64, b: i64, c: i64 },

    #[error("Negative operand in {a} * {b} / {c}")]
    NegativeOperand { a: i64, b: i64, c: i64 },

    #[error("Division by zero")]
    ZeroDivisor,
}

/// Computes `a * b / c` with a 128-bit intermediate and explicit rounding.
///
/// Errors instead of wrapping when the result does not fit an `i64`.
pub fn big_divide(a: i64, b: i64, c: i64, rounding: Rounding) -> Result<i64, PriceError> {
    if c == 0 {
        return Err(PriceError::ZeroDivisor);
    }
    if a < 0 || b < 0 || c < 0 {
        return Err(PriceError::NegativeOperand { a, b, c });
    }

    // both operands are below 2^63 so the product fits below 2^126
    let product = (a as i128) * (b as i128);
    let divisor = c as i128;
    let quotient = match rounding {
        Rounding::Down => product / divisor,
        Rounding::Up => (product + divisor - 1) / divisor,
    };

    i64::try_from(quotient).map_err(|_| PriceError::ArithmeticOverflow { a, b, c })
}

/// Positive rational price `n/d`.
///
/// Equality is structural (`1/2 != 2/4`), matching how prices are persisted;
/// use [`Price::compare`] for value ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Price {
    n: i32,
    d: i32,
}

impl Price {
    #[must_use]
    pub fn new(n: i32, d: i32) -> Option<Self> {
        if n > 0 && d > 0 {
            Some(Self { n, d })
        } else {
            None
        }
    }

    pub fn numerator(&self) -> i32 {
        self.n
    }

    pub fn denominator(&self) -> i32 {
        self.d
    }

    /// Value comparison by cross-multiplication.
    pub fn compare(&self, other: &Price) -> Ordering {
        // i32 * i32 always fits in i64
        let lhs = (self.n as i64) * (other.d as i64);
        let rhs = (other.n as i64) * (self.d as i64);
        lhs.cmp(&rhs)
    }

    /// `amount * n / d`: how much of the buying asset `amount` of the selling asset is worth.
    pub fn counter_amount(&self, amount: i64, rounding: Rounding) -> Result<i64, PriceError> {
        big_divide(amount, self.n as i64, self.d as i64, rounding)
    }

    pub fn inverse(&self) -> Price {
        Price { n: self.d, d: self.n }
    }

    /// Approximate value for ranking and diagnostics. Never use for settlement.
    pub fn effective_price(&self) -> f64 {
        self.n as f64 / self.d as f64
    }

    /// Decimal view for human-facing output.
    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.n) / Decimal::from(self.d)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.n, self.d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejects_non_positive_components() {
        assert!(Price::new(1, 1).is_some());
        assert!(Price::new(0, 1).is_none());
        assert!(Price::new(1, 0).is_none());
        assert!(Price::new(-1, 2).is_none());
    }

    #[test]
    fn compare_is_exact() {
        let half = Price::new(1, 2).unwrap();
        let two_quarters = Price::new(2, 4).unwrap();
        let third = Price::new(1, 3).unwrap();

        assert_eq!(half.compare(&two_quarters), Ordering::Equal);
        assert_ne!(half, two_quarters); // structural equality differs
        assert_eq!(third.compare(&half), Ordering::Less);
        assert_eq!(half.compare(&third), Ordering::Greater);
    }

    #[test]
    fn compare_extreme_components() {
        let max = Price::new(i32::MAX, 1).unwrap();
        let almost = Price::new(i32::MAX - 1, 1).unwrap();
        let tiny = Price::new(1, i32::MAX).unwrap();

        assert_eq!(almost.compare(&max), Ordering::Less);
        assert_eq!(tiny.compare(&almost), Ordering::Less);
    }

    #[test]
    fn counter_amount_rounds_up() {
        let third = Price::new(1, 3).unwrap();
        assert_eq!(third.counter_amount(100, Rounding::Up).unwrap(), 34);
        assert_eq!(third.counter_amount(100, Rounding::Down).unwrap(), 33);
        // exact division is unaffected by rounding direction
        assert_eq!(third.counter_amount(99, Rounding::Up).unwrap(), 33);
    }

    #[test]
    fn counter_amount_overflow() {
        let two = Price::new(2, 1).unwrap();
        let result = two.counter_amount(i64::MAX, Rounding::Up);
        assert!(matches!(result, Err(PriceError::ArithmeticOverflow { .. })));
    }

    #[test]
    fn big_divide_survives_large_intermediate() {
        // i64::MAX * 3 overflows i64 but the quotient fits
        assert_eq!(big_divide(i64::MAX, 3, 3, Rounding::Down).unwrap(), i64::MAX);
    }

    #[test]
    fn big_divide_rejects_bad_operands() {
        assert_eq!(big_divide(1, 1, 0, Rounding::Down), Err(PriceError::ZeroDivisor));
        assert!(matches!(
            big_divide(-1, 1, 1, Rounding::Down),
            Err(PriceError::NegativeOperand { .. })
        ));
    }

    #[test]
    fn decimal_view() {
        assert_eq!(Price::new(3, 2).unwrap().as_decimal(), dec!(1.5));
        assert_eq!(Price::new(3, 2).unwrap().effective_price(), 1.5);
        assert_eq!(Price::new(3, 2).unwrap().to_string(), "3/2");
    }
}
