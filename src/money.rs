use crate::error::{ConvertError, Result};
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Decimal places for share quantities in the output.
pub const QUANTITY_DP: u32 = 4;
/// Decimal places for GBP prices and amounts.
pub const GBP_DP: u32 = 2;

/// Parse a broker amount such as `-1,234.50`, `$12.34` or `-$0.57`.
pub fn parse_amount(raw: &str) -> Result<Decimal> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '"') && !c.is_whitespace())
        .collect();
    if cleaned.is_empty() {
        return Err(ConvertError::malformed(format!("missing amount '{raw}'")));
    }
    Decimal::from_str(&cleaned)
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .map_err(|_| ConvertError::malformed(format!("invalid amount '{raw}'")))
}

pub fn round_gbp(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(GBP_DP, RoundingStrategy::MidpointAwayFromZero)
}

/// Format a GBP amount with exactly two decimal places.
pub fn display_gbp(amount: Decimal) -> String {
    let mut rounded = round_gbp(amount);
    rounded.rescale(GBP_DP);
    rounded.to_string()
}

/// Format a share quantity as a non-negative number with four decimal places.
pub fn display_quantity(quantity: Decimal) -> String {
    let mut rounded = quantity
        .abs()
        .round_dp_with_strategy(QUANTITY_DP, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(QUANTITY_DP);
    rounded.to_string()
}
