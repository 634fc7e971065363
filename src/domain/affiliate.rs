//! Affiliate entity and its status/tier enumerations.

use crate::domain::{AffiliateId, CommissionRates, Decimal, TimeMs};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Referral partner earning commission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Affiliate {
    pub id: AffiliateId,
    pub external_id: String,
    pub name: String,
    pub email: String,
    pub status: AffiliateStatus,
    pub upfront_rate: Decimal,
    pub residual_rate: Decimal,
    pub tier_level: TierLevel,
    pub total_sales: Decimal,
    pub total_commissions: Decimal,
    pub onboarding_status: OnboardingStatus,
    pub created_at: TimeMs,
    pub updated_at: TimeMs,
    /// Optimistic concurrency counter, bumped on every rate write.
    pub version: i64,
}

impl Affiliate {
    /// Create a new active affiliate at version 0.
    pub fn new(
        external_id: impl Into<String>,
        name: impl Into<String>,
        email: impl Into<String>,
        rates: CommissionRates,
        tier_level: TierLevel,
    ) -> Self {
        let now = TimeMs::now();
        Affiliate {
            id: AffiliateId::generate(),
            external_id: external_id.into(),
            name: name.into(),
            email: email.into(),
            status: AffiliateStatus::Active,
            upfront_rate: rates.upfront_rate,
            residual_rate: rates.residual_rate,
            tier_level,
            total_sales: Decimal::zero(),
            total_commissions: Decimal::zero(),
            onboarding_status: OnboardingStatus::Completed,
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn rates(&self) -> CommissionRates {
        CommissionRates {
            upfront_rate: self.upfront_rate,
            residual_rate: self.residual_rate,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AffiliateStatus::Active
    }
}

#[derive(Debug, Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    pub(crate) kind: &'static str,
    pub(crate) value: String,
}

/// Generates `as_str`, `Display` and `FromStr` for a lowercase string enum.
macro_rules! string_enum {
    ($ty:ident, $kind:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = UnknownVariant;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($text => Ok($ty::$variant),)+
                    other => Err(UnknownVariant {
                        kind: $kind,
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

pub(crate) use string_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AffiliateStatus {
    Active,
    Inactive,
    Suspended,
}

string_enum!(AffiliateStatus, "affiliate status", {
    Active => "active",
    Inactive => "inactive",
    Suspended => "suspended",
});

/// Named rate bucket. Declaration order is the display rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TierLevel {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Standard,
}

string_enum!(TierLevel, "tier", {
    Bronze => "bronze",
    Silver => "silver",
    Gold => "gold",
    Platinum => "platinum",
    Standard => "standard",
});

impl TierLevel {
    pub const ALL: [TierLevel; 5] = [
        TierLevel::Bronze,
        TierLevel::Silver,
        TierLevel::Gold,
        TierLevel::Platinum,
        TierLevel::Standard,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnboardingStatus {
    Pending,
    InProgress,
    Completed,
}

string_enum!(OnboardingStatus, "onboarding status", {
    Pending => "pending",
    InProgress => "in_progress",
    Completed => "completed",
});
