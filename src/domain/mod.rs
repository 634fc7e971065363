//! Domain types for the commission-rate core.
//!
//! This module provides:
//! - Lossless numeric handling via the Decimal wrapper
//! - Identifier and time primitives
//! - Affiliates, rate templates, rate history and commission entries
//! - Typed metadata payloads

pub mod affiliate;
pub mod commission;
pub mod decimal;
pub mod history;
pub mod metadata;
pub mod primitives;
pub mod rates;
pub mod template;

pub use affiliate::{Affiliate, AffiliateStatus, OnboardingStatus, TierLevel, UnknownVariant};
pub use commission::{CommissionEntry, CommissionStatus, CommissionType};
pub use decimal::Decimal;
pub use history::RateHistoryEntry;
pub use metadata::{CommissionMetadata, Metadata, TemplateMetadata};
pub use primitives::{AffiliateId, TemplateId, TimeMs};
pub use rates::CommissionRates;
pub use template::RateTemplate;
