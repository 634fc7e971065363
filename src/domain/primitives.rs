//! Domain primitives: TimeMs, AffiliateId, TemplateId.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Time in milliseconds since Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeMs(pub i64);

impl TimeMs {
    /// Create a TimeMs from milliseconds.
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    /// Current wall-clock time.
    pub fn now() -> Self {
        TimeMs(Utc::now().timestamp_millis())
    }

    /// Get the underlying milliseconds value.
    pub fn as_i64(&self) -> i64 {
        self.0
    }

    /// Calendar date in UTC, `YYYY-MM-DD`.
    ///
    /// Out-of-range timestamps render as an empty string.
    pub fn to_iso_date(&self) -> String {
        DateTime::<Utc>::from_timestamp_millis(self.0)
            .map(|dt| dt.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
    }
}

/// Affiliate identifier (store primary key).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AffiliateId(pub String);

impl AffiliateId {
    /// Create an AffiliateId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        AffiliateId(id.into())
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        AffiliateId(uuid::Uuid::new_v4().to_string())
    }

    /// Get the id as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AffiliateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Rate template identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TemplateId(pub String);

impl TemplateId {
    /// Create a TemplateId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        TemplateId(id.into())
    }

    /// Generate a fresh random identifier.
    pub fn generate() -> Self {
        TemplateId(uuid::Uuid::new_v4().to_string())
    }

    /// Get the id as a string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TemplateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timems_iso_date_is_utc() {
        // 2024-03-01T23:30:00Z
        let t = TimeMs::new(1_709_335_800_000);
        assert_eq!(t.to_iso_date(), "2024-03-01");
    }

    #[test]
    fn test_timems_ordering() {
        assert!(TimeMs::new(1000) < TimeMs::new(2000));
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(AffiliateId::generate(), AffiliateId::generate());
        assert_ne!(TemplateId::generate(), TemplateId::generate());
    }

    #[test]
    fn test_ids_serialize_transparently() {
        let id = AffiliateId::new("aff-1");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"aff-1\"");
        assert_eq!(id.to_string(), "aff-1");
    }
}
