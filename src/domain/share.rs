//! Share units and quotes
//!
//! Share units are fixed-point integers scaled by [`SCALE`]. Every quote is
//! computed with integer floor division; nothing touches floating point.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

use super::error::DomainError;

/// Fixed-point multiplier for share units (4 decimal places).
pub const SCALE: i64 = 10_000;

/// Decimal places carried by [`SCALE`].
pub const UNIT_DECIMALS: u32 = 4;

/// Fractional share units stored as `units * SCALE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ShareUnits(i64);

impl ShareUnits {
    pub fn from_scaled(scaled: i64) -> Self {
        Self(scaled)
    }

    pub fn scaled(&self) -> i64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Exact decimal with scale 4, e.g. `1.5000`.
    pub fn to_decimal(&self) -> Decimal {
        Decimal::new(self.0, UNIT_DECIMALS)
    }

    /// Accept `supplied` if it is within 0.0001 of these units.
    pub fn matches(&self, supplied: Decimal) -> bool {
        (supplied - self.to_decimal()).abs() <= Decimal::new(1, UNIT_DECIMALS)
    }
}

impl fmt::Display for ShareUnits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = SCALE as u64;
        write!(f, "{}{}.{:04}", sign, abs / scale, abs % scale)
    }
}

impl Serialize for ShareUnits {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Result of converting a monetary amount into share units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShareQuote {
    pub amount: i64,
    pub unit_price: i64,
    pub units: ShareUnits,
    /// Money actually consumed by `units` at `unit_price`.
    pub spent: i64,
    /// `amount - spent`; never negative.
    pub remainder: i64,
}

impl ShareQuote {
    /// Floor-divide `amount` into share units at `unit_price`.
    ///
    /// ```text
    /// scaled    = floor(amount * SCALE / unit_price)
    /// spent     = floor(scaled * unit_price / SCALE)
    /// remainder = amount - spent
    /// ```
    ///
    /// # Errors
    /// - `InvalidAmount` if `amount <= 0` or the scaled units overflow i64
    /// - `UnitPriceUnavailable` if `unit_price <= 0`
    pub fn compute(amount: i64, unit_price: i64) -> Result<Self, DomainError> {
        if amount <= 0 {
            return Err(DomainError::InvalidAmount(format!(
                "amount must be positive (got {amount})"
            )));
        }
        if unit_price <= 0 {
            return Err(DomainError::UnitPriceUnavailable);
        }

        let scaled = i128::from(amount) * i128::from(SCALE) / i128::from(unit_price);
        let scaled = i64::try_from(scaled)
            .map_err(|_| DomainError::InvalidAmount(format!("amount {amount} is too large")))?;

        // scaled * unit_price <= amount * SCALE, so this fits back into i64
        let spent = i128::from(scaled) * i128::from(unit_price) / i128::from(SCALE);
        let spent = spent as i64;

        Ok(Self {
            amount,
            unit_price,
            units: ShareUnits::from_scaled(scaled),
            spent,
            remainder: amount - spent,
        })
    }

    /// Description recorded on the purchase entry.
    pub fn purchase_description(&self) -> String {
        format!("Purchase of {} shares", self.units)
    }
}

/// Share lot attached 1:1 to a SHARES deposit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShareLot {
    pub id: Uuid,
    pub entry_id: Uuid,
    /// Serialized as a 4-decimal-place string, e.g. `"1.5000"`.
    pub units: Decimal,
    pub unit_price: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewShareLot {
    pub entry_id: Uuid,
    pub units: ShareUnits,
    pub unit_price: i64,
}

/// One row of the append-only unit price history; the latest row wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnitPrice {
    pub id: Uuid,
    pub price: i64,
    pub set_by: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Aggregate of confirmed share purchases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ShareTotals {
    pub units: Decimal,
    pub amount: i64,
}

impl ShareTotals {
    pub fn zero() -> Self {
        Self {
            units: Decimal::new(0, UNIT_DECIMALS),
            amount: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_exact_quote() {
        let quote = ShareQuote::compute(125_000, 50_000).unwrap();
        assert_eq!(quote.units.to_string(), "2.5000");
        assert_eq!(quote.remainder, 0);
        assert_eq!(quote.spent, 125_000);
    }

    #[test]
    fn test_quote_floors_instead_of_rounding() {
        let quote = ShareQuote::compute(100_001, 50_000).unwrap();
        assert_eq!(quote.units.to_string(), "2.0000");
        assert_eq!(quote.remainder, 1);

        // 7 / 3 = 2.33333.. must floor to 2.3333, not round to 2.3334
        let quote = ShareQuote::compute(7, 3).unwrap();
        assert_eq!(quote.units.to_string(), "2.3333");
        assert_eq!(quote.spent, 6);
        assert_eq!(quote.remainder, 1);
    }

    #[test]
    fn test_fractional_purchase() {
        let quote = ShareQuote::compute(75_000, 50_000).unwrap();
        assert_eq!(quote.units.to_string(), "1.5000");
        assert_eq!(quote.units.to_decimal(), dec!(1.5000));
        assert_eq!(quote.units.to_decimal().to_string(), "1.5000");
        assert_eq!(quote.purchase_description(), "Purchase of 1.5000 shares");
    }

    #[test]
    fn test_tiny_amount_yields_zero_units() {
        let quote = ShareQuote::compute(4, 50_000).unwrap();
        assert!(quote.units.is_zero());
        assert_eq!(quote.remainder, 4);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(matches!(
            ShareQuote::compute(0, 50_000),
            Err(DomainError::InvalidAmount(_))
        ));
        assert!(matches!(
            ShareQuote::compute(-1, 50_000),
            Err(DomainError::InvalidAmount(_))
        ));
        assert_eq!(
            ShareQuote::compute(100, 0),
            Err(DomainError::UnitPriceUnavailable)
        );
    }

    #[test]
    fn test_large_amount_does_not_overflow() {
        let quote = ShareQuote::compute(i64::MAX / 2, 50_000).unwrap();
        assert!(quote.remainder >= 0);
        assert!(quote.remainder < 50_000);

        assert!(ShareQuote::compute(i64::MAX, 1).is_err());
    }

    #[test]
    fn test_units_tolerance() {
        let units = ShareUnits::from_scaled(15_000);
        assert!(units.matches(dec!(1.5)));
        assert!(units.matches(dec!(1.5001)));
        assert!(units.matches(dec!(1.49995)));
        assert!(!units.matches(dec!(1.5002)));
        assert!(!units.matches(dec!(2)));
    }

    #[test]
    fn test_units_serialize_as_string() {
        let json = serde_json::to_string(&ShareUnits::from_scaled(20_001)).unwrap();
        assert_eq!(json, "\"2.0001\"");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        #[test]
        fn prop_quote_never_overspends(amount in 1i64..1_000_000_000_000, price in 1i64..10_000_000) {
            let quote = ShareQuote::compute(amount, price).unwrap();
            prop_assert!(quote.spent <= amount);
            prop_assert!(quote.remainder >= 0);
            prop_assert_eq!(quote.spent + quote.remainder, amount);
        }

        #[test]
        fn prop_one_more_tick_is_unaffordable(amount in 1i64..1_000_000_000_000, price in 1i64..10_000_000) {
            let quote = ShareQuote::compute(amount, price).unwrap();
            let next = i128::from(quote.units.scaled() + 1) * i128::from(price);
            prop_assert!(next > i128::from(amount) * i128::from(SCALE));
        }

        #[test]
        fn prop_display_matches_decimal(scaled in 0i64..i64::MAX) {
            let units = ShareUnits::from_scaled(scaled);
            prop_assert_eq!(units.to_string(), units.to_decimal().to_string());
        }
    }
}
