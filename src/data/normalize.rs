//! Normalization of upstream records into canonical bank records
//!
//! Upstream deployments disagree on field names, so each logical field is
//! resolved by probing a fixed, ordered list of aliases. Entries without a
//! usable name are dropped and duplicates collapse onto the first occurrence.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::debug;

use super::{BankRecord, RawRecord};

/// Logical fields looked up on each raw record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    ShortCode,
    Logo,
}

impl Field {
    /// Alias field names in priority order
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Name => &["name", "bankName", "bank_name"],
            Field::ShortCode => &["code", "internalCode", "shortcode", "shortCode"],
            Field::Logo => &["logo", "logoUrl", "logo_url"],
        }
    }

    /// Returns the first usable value among this field's aliases
    pub fn resolve(self, raw: &RawRecord) -> Option<String> {
        self.aliases()
            .iter()
            .find_map(|alias| raw.get(*alias).and_then(usable_text))
    }
}

/// Turns a JSON value into trimmed text, if it carries any
fn usable_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Maps raw upstream records to canonical records
///
/// Never fails: records without a name are skipped and later duplicates of an
/// identity key are discarded. Output keeps upstream order and every record is
/// stamped with `refreshed_at`.
pub fn normalize(raw: &[RawRecord], refreshed_at: DateTime<Utc>) -> Vec<BankRecord> {
    let mut seen = HashSet::with_capacity(raw.len());
    let mut banks = Vec::with_capacity(raw.len());
    let mut nameless = 0usize;
    let mut duplicates = 0usize;

    for entry in raw {
        let Some(name) = Field::Name.resolve(entry) else {
            nameless += 1;
            continue;
        };
        let short_code = Field::ShortCode.resolve(entry).unwrap_or_default();
        let logo_url = Field::Logo.resolve(entry);

        let record = BankRecord::new(name, short_code, logo_url, refreshed_at);
        if !seen.insert(record.identity_key.clone()) {
            duplicates += 1;
            continue;
        }
        banks.push(record);
    }

    if nameless > 0 || duplicates > 0 {
        debug!(
            kept = banks.len(),
            nameless, duplicates, "dropped upstream records during normalization"
        );
    }

    banks
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        value.as_object().cloned().expect("test record must be an object")
    }

    #[test]
    fn test_resolves_primary_aliases() {
        let now = Utc::now();
        let banks = normalize(
            &[raw(json!({"name": "GTBank", "code": "058", "logo": "https://x/gtb.png"}))],
            now,
        );

        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].name, "GTBank");
        assert_eq!(banks[0].short_code, "058");
        assert_eq!(banks[0].identity_key, "058");
        assert_eq!(banks[0].logo_url.as_deref(), Some("https://x/gtb.png"));
        assert_eq!(banks[0].last_refreshed, now);
    }

    #[test]
    fn test_resolves_alternate_aliases() {
        let banks = normalize(
            &[
                raw(json!({"bankName": "Zenith Bank", "internalCode": "057"})),
                raw(json!({"bank_name": "Kuda", "shortcode": "50211", "logoUrl": "k.png"})),
            ],
            Utc::now(),
        );

        assert_eq!(banks.len(), 2);
        assert_eq!(banks[0].name, "Zenith Bank");
        assert_eq!(banks[0].short_code, "057");
        assert_eq!(banks[1].name, "Kuda");
        assert_eq!(banks[1].short_code, "50211");
        assert_eq!(banks[1].logo_url.as_deref(), Some("k.png"));
    }

    #[test]
    fn test_alias_priority_order() {
        // "name" outranks "bankName", "code" outranks "shortcode"
        let banks = normalize(
            &[raw(json!({
                "bankName": "Second",
                "name": "First",
                "shortcode": "222",
                "code": "111"
            }))],
            Utc::now(),
        );

        assert_eq!(banks[0].name, "First");
        assert_eq!(banks[0].short_code, "111");
    }

    #[test]
    fn test_blank_alias_falls_through_to_next() {
        let banks = normalize(
            &[raw(json!({"name": "   ", "bankName": "Opay", "code": ""}))],
            Utc::now(),
        );

        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].name, "Opay");
        assert_eq!(banks[0].identity_key, "name:opay");
    }

    #[test]
    fn test_numeric_code_is_rendered_as_text() {
        let banks = normalize(&[raw(json!({"name": "Access Bank", "code": 44}))], Utc::now());
        assert_eq!(banks[0].short_code, "44");
    }

    #[test]
    fn test_records_without_name_are_dropped() {
        let banks = normalize(
            &[
                raw(json!({"code": "001"})),
                raw(json!({"name": "", "code": "002"})),
                raw(json!({"name": null, "code": "003"})),
                raw(json!({"name": ["not", "text"], "code": "004"})),
                raw(json!({"name": "Valid", "code": "005"})),
            ],
            Utc::now(),
        );

        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].short_code, "005");
        assert!(banks.iter().all(|b| !b.name.is_empty()));
    }

    #[test]
    fn test_first_occurrence_wins_on_duplicate_code() {
        let banks = normalize(
            &[
                raw(json!({"name": "Guaranty Trust Bank", "code": "058"})),
                raw(json!({"name": "GTBank Plc", "code": "058"})),
                raw(json!({"name": "Zenith", "code": "057"})),
            ],
            Utc::now(),
        );

        assert_eq!(banks.len(), 2);
        assert_eq!(banks[0].name, "Guaranty Trust Bank");
        assert_eq!(banks[1].name, "Zenith");
    }

    #[test]
    fn test_duplicate_names_without_code_collapse_case_insensitively() {
        let banks = normalize(
            &[
                raw(json!({"name": "Moniepoint"})),
                raw(json!({"name": "MONIEPOINT"})),
            ],
            Utc::now(),
        );

        assert_eq!(banks.len(), 1);
        assert_eq!(banks[0].name, "Moniepoint");
    }

    #[test]
    fn test_identity_keys_are_unique_and_order_is_preserved() {
        let input: Vec<RawRecord> = ["c", "a", "b", "a", "c", "d"]
            .iter()
            .map(|code| raw(json!({"name": format!("Bank {code}"), "code": code})))
            .collect();

        let banks = normalize(&input, Utc::now());
        let keys: Vec<&str> = banks.iter().map(|b| b.identity_key.as_str()).collect();

        assert_eq!(keys, vec!["c", "a", "b", "d"]);
    }

    #[test]
    fn test_empty_input_yields_empty_output() {
        assert!(normalize(&[], Utc::now()).is_empty());
    }
}
