//! Upfront/residual commission rate pair and its bounds.

use crate::domain::Decimal;
use crate::error::RateError;
use serde::{Deserialize, Serialize};

/// A validated upfront/residual rate pair, both percentages.
///
/// Invariant: each rate is within `[0, 100]` and their sum is at most 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommissionRates {
    pub upfront_rate: Decimal,
    pub residual_rate: Decimal,
}

impl CommissionRates {
    /// Build a rate pair, rejecting anything outside the percentage bounds.
    ///
    /// # Errors
    /// Returns `RateError::Validation` if either rate is outside `[0, 100]`
    /// or the two rates sum to more than 100.
    pub fn new(upfront_rate: Decimal, residual_rate: Decimal) -> Result<Self, RateError> {
        let rates = CommissionRates {
            upfront_rate,
            residual_rate,
        };
        rates.validate()?;
        Ok(rates)
    }

    /// Check the bounds of an already-constructed pair.
    ///
    /// Pairs can arrive through deserialization, which bypasses `new`.
    pub fn validate(&self) -> Result<(), RateError> {
        check_percentage("upfront rate", self.upfront_rate)?;
        check_percentage("residual rate", self.residual_rate)?;
        let total = self.upfront_rate + self.residual_rate;
        if total > Decimal::hundred() {
            return Err(RateError::Validation(format!(
                "upfront rate {} plus residual rate {} exceeds 100",
                self.upfront_rate, self.residual_rate
            )));
        }
        Ok(())
    }
}

fn check_percentage(label: &str, value: Decimal) -> Result<(), RateError> {
    if value.is_negative() || value > Decimal::hundred() {
        return Err(RateError::Validation(format!(
            "{} {} is outside [0, 100]",
            label, value
        )));
    }
    Ok(())
}
