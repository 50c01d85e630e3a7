//! Core data models for bankfind
//!
//! This module contains the canonical bank record shared by the upstream client,
//! the normalizer, the store and the lookup orchestrator.

pub mod normalize;
pub mod upstream;

pub use normalize::{normalize, Field};
pub use upstream::{PartnerClient, UpstreamError, UpstreamGateway};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One loosely-typed record as decoded from the upstream body
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Prefix for identity keys derived from the bank name
const NAME_KEY_PREFIX: &str = "name:";

/// A bank in its canonical, persisted shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankRecord {
    /// Unique key of the bank within a snapshot
    pub identity_key: String,
    /// Display name
    pub name: String,
    /// Upstream institution code, may be empty
    #[serde(default)]
    pub short_code: String,
    /// Logo URL, if upstream provides one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo_url: Option<String>,
    /// When the upstream fetch that produced this record completed
    pub last_refreshed: DateTime<Utc>,
}

impl BankRecord {
    /// Builds a record, deriving the identity key from the code and name
    pub fn new(
        name: impl Into<String>,
        short_code: impl Into<String>,
        logo_url: Option<String>,
        last_refreshed: DateTime<Utc>,
    ) -> Self {
        let name = name.into().trim().to_string();
        let short_code = short_code.into().trim().to_string();
        let identity_key = identity_key(&name, &short_code);
        Self {
            identity_key,
            name,
            short_code,
            logo_url,
            last_refreshed,
        }
    }

    /// Whether the record may be persisted
    pub fn is_valid(&self) -> bool {
        !self.name.trim().is_empty() && !self.identity_key.is_empty()
    }
}

/// Derives the identity key for a bank
///
/// The trimmed short code is used when present. Otherwise the key is the
/// lower-cased name behind a `name:` prefix, so it can never collide with a
/// real institution code. Returns an empty string when both are blank.
pub fn identity_key(name: &str, short_code: &str) -> String {
    let code = short_code.trim();
    if !code.is_empty() {
        return code.to_string();
    }

    let name = name.trim();
    if name.is_empty() {
        return String::new();
    }
    format!("{}{}", NAME_KEY_PREFIX, name.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_key_prefers_short_code() {
        assert_eq!(identity_key("GTBank", "058"), "058");
        assert_eq!(identity_key("GTBank", "  058 "), "058");
    }

    #[test]
    fn test_identity_key_falls_back_to_lowercased_name() {
        assert_eq!(identity_key("Zenith Bank", ""), "name:zenith bank");
        assert_eq!(identity_key("  Zenith Bank ", "   "), "name:zenith bank");
    }

    #[test]
    fn test_identity_key_empty_when_both_blank() {
        assert_eq!(identity_key("", ""), "");
        assert_eq!(identity_key("  ", " "), "");
    }

    #[test]
    fn test_bank_record_new_trims_fields() {
        let record = BankRecord::new(" Access Bank ", " 044 ", None, Utc::now());

        assert_eq!(record.name, "Access Bank");
        assert_eq!(record.short_code, "044");
        assert_eq!(record.identity_key, "044");
        assert!(record.is_valid());
    }

    #[test]
    fn test_record_with_blank_name_is_invalid() {
        let record = BankRecord::new("  ", "044", None, Utc::now());
        assert!(!record.is_valid());
    }

    #[test]
    fn test_bank_record_serializes_camel_case() {
        let record = BankRecord::new(
            "GTBank",
            "058",
            Some("https://example.com/gtb.png".to_string()),
            Utc::now(),
        );

        let json = serde_json::to_value(&record).expect("Failed to serialize BankRecord");

        assert_eq!(json["identityKey"], "058");
        assert_eq!(json["name"], "GTBank");
        assert_eq!(json["shortCode"], "058");
        assert_eq!(json["logoUrl"], "https://example.com/gtb.png");
        assert!(json["lastRefreshed"].is_string());
    }

    #[test]
    fn test_missing_logo_is_omitted() {
        let record = BankRecord::new("Kuda", "50211", None, Utc::now());
        let json = serde_json::to_value(&record).expect("Failed to serialize BankRecord");
        assert!(json.get("logoUrl").is_none());
    }
}
