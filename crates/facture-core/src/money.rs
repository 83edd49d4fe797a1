//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Supplier invoices routinely carry totals in the tens of millions.     │
//! │  Summing thousands of lines as f64 drifts by whole currency units.     │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units                                      │
//! │    Every amount is an i64 in the smallest currency unit.               │
//! │    Tax is computed with i128 intermediates and explicit rounding.      │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use facture_core::money::Money;
//!
//! let price = Money::from_minor(125_000);
//! let doubled = price * 2;
//! let total = price + Money::from_minor(5_000);
//!
//! assert_eq!(doubled.minor(), 250_000);
//! assert_eq!(total.minor(), 130_000);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};

use crate::types::TaxRate;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit.
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  FactureItem.unit_price ──► line_total ──► tax ──► line_total_with_tax  │
/// │                                                          │              │
/// │                                    Σ lines + header tax − discount      │
/// │                                                          ▼              │
/// │  Facture.total_amount ──► outstanding = total − paid ──► aging buckets  │
/// │                                                                         │
/// │  FacturePayment.amount ──► confirm ──► Facture.paid_amount += amount    │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    ///
    /// ## Example
    /// ```rust
    /// use facture_core::money::Money;
    ///
    /// let amount = Money::from_minor(1_000_000);
    /// assert_eq!(amount.minor(), 1_000_000);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Subtraction floored at zero.
    ///
    /// Used for outstanding amounts, which never go negative.
    #[inline]
    pub const fn saturating_sub(&self, other: Money) -> Money {
        let diff = self.0 - other.0;
        if diff < 0 {
            Money(0)
        } else {
            Money(diff)
        }
    }

    /// Calculates tax at the given rate, rounding half up to the minor unit.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`.
    /// The +5000 provides rounding (5000/10000 = 0.5).
    ///
    /// ## Example
    /// ```rust
    /// use facture_core::money::Money;
    /// use facture_core::types::TaxRate;
    ///
    /// let line = Money::from_minor(1_000_000);
    /// let vat = line.calculate_tax(TaxRate::from_bps(1100)); // 11%
    /// assert_eq!(vat.minor(), 110_000);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        // i128 keeps large invoice lines from overflowing
        let tax = (self.0 as i128 * rate.bps() as i128 + 5000) / 10000;
        Money::from_minor(tax as i64)
    }

    /// Multiplies money by a quantity. `None` on overflow.
    #[inline]
    pub const fn checked_mul_quantity(&self, qty: i64) -> Option<Money> {
        match self.0.checked_mul(qty) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Money> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_sub(&self, other: Money) -> Option<Money> {
        match self.0.checked_sub(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Groups thousands with commas: `1,250,000`.
///
/// ## Note
/// For logs and CLI output only. Currency symbols are a presentation concern.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let digits = self.0.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(f, "{}{}", sign, grouped)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0 + other.0)
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 += other.0;
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 -= other.0;
    }
}

impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Money::from_minor(0).to_string(), "0");
        assert_eq!(Money::from_minor(999).to_string(), "999");
        assert_eq!(Money::from_minor(1_000).to_string(), "1,000");
        assert_eq!(Money::from_minor(50_000_000).to_string(), "50,000,000");
        assert_eq!(Money::from_minor(-1_234_567).to_string(), "-1,234,567");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_minor(1000);
        let b = Money::from_minor(500);

        assert_eq!((a + b).minor(), 1500);
        assert_eq!((a - b).minor(), 500);
        assert_eq!((a * 3).minor(), 3000);
    }

    #[test]
    fn test_checked_ops_catch_overflow() {
        let big = Money::from_minor(i64::MAX / 2);

        assert_eq!(Money::from_minor(1000).checked_mul_quantity(3), Some(Money::from_minor(3000)));
        assert!(big.checked_mul_quantity(3).is_none());
        assert!(big.checked_add(big).is_some());
        assert!(big.checked_add(big).and_then(|m| m.checked_add(big)).is_none());
        assert!(Money::from_minor(i64::MIN).checked_sub(Money::from_minor(1)).is_none());
    }

    #[test]
    fn test_saturating_sub_floors_at_zero() {
        let total = Money::from_minor(1_000_000);
        assert_eq!(total.saturating_sub(Money::from_minor(600_000)).minor(), 400_000);
        assert!(total.saturating_sub(Money::from_minor(2_000_000)).is_zero());
    }

    #[test]
    fn test_tax_rounds_half_up() {
        // 1,005 at 10% = 100.5 → 101
        let tax = Money::from_minor(1_005).calculate_tax(TaxRate::from_bps(1000));
        assert_eq!(tax.minor(), 101);

        // 1,004 at 10% = 100.4 → 100
        let tax = Money::from_minor(1_004).calculate_tax(TaxRate::from_bps(1000));
        assert_eq!(tax.minor(), 100);
    }

    #[test]
    fn test_tax_on_large_amount_does_not_overflow() {
        let line = Money::from_minor(9_000_000_000_000);
        let tax = line.calculate_tax(TaxRate::from_bps(1100));
        assert_eq!(tax.minor(), 990_000_000_000);
    }

    #[test]
    fn test_sum() {
        let total: Money = [100, 200, 300].iter().map(|m| Money::from_minor(*m)).sum();
        assert_eq!(total.minor(), 600);
    }
}
