//! Literal, case-insensitive query matching
//!
//! The query is escaped before being compiled, so characters such as `.` or
//! `*` only ever match themselves.

use regex::{Regex, RegexBuilder};
use tracing::warn;

use crate::data::BankRecord;

/// Upper bound on the compiled matcher size
const MATCHER_SIZE_LIMIT: usize = 1 << 20;

/// Matches bank records against a free-text query
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    pattern: Option<Regex>,
    /// Lower-cased query, used if the escaped pattern exceeds the size limit
    literal: String,
}

impl QueryMatcher {
    /// Builds a matcher; an empty or blank query matches every record
    pub fn new(query: &str) -> Self {
        if query.trim().is_empty() {
            return Self {
                pattern: None,
                literal: String::new(),
            };
        }

        let pattern = RegexBuilder::new(&regex::escape(query))
            .case_insensitive(true)
            .size_limit(MATCHER_SIZE_LIMIT)
            .build()
            .map_err(|e| warn!(error = %e, "query too large for matcher, using plain comparison"))
            .ok();

        Self {
            pattern,
            literal: query.to_lowercase(),
        }
    }

    /// Whether this matcher accepts everything
    pub fn matches_all(&self) -> bool {
        self.literal.is_empty()
    }

    /// Tests a single piece of text
    pub fn matches_text(&self, text: &str) -> bool {
        if self.matches_all() {
            return true;
        }
        match self.pattern {
            Some(ref pattern) => pattern.is_match(text),
            None => text.to_lowercase().contains(&self.literal),
        }
    }

    /// Tests a record's name and, when present, its short code
    pub fn matches(&self, record: &BankRecord) -> bool {
        self.matches_text(&record.name)
            || (!record.short_code.is_empty() && self.matches_text(&record.short_code))
    }

    /// Keeps only the matching records, preserving order
    pub fn filter<'a, I>(&self, records: I) -> Vec<BankRecord>
    where
        I: IntoIterator<Item = &'a BankRecord>,
    {
        records
            .into_iter()
            .filter(|r| self.matches(r))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bank(name: &str, code: &str) -> BankRecord {
        BankRecord::new(name, code, None, Utc::now())
    }

    #[test]
    fn test_case_insensitive_substring() {
        let matcher = QueryMatcher::new("gtb");
        assert!(matcher.matches(&bank("GTBank", "058")));
        assert!(matcher.matches(&bank("My gTb Branch", "")));
        assert!(!matcher.matches(&bank("Zenith Bank", "057")));
    }

    #[test]
    fn test_metacharacters_are_literal() {
        let matcher = QueryMatcher::new("a.b");
        assert!(matcher.matches(&bank("Bank a.b Ltd", "")));
        assert!(!matcher.matches(&bank("axb", "")));
        assert!(!matcher.matches(&bank("Arab Bank", "")));
    }

    #[test]
    fn test_pathological_pattern_is_literal() {
        let matcher = QueryMatcher::new("(a+)+$");
        assert!(!matcher.matches(&bank("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa!", "")));
        assert!(matcher.matches(&bank("weird (a+)+$ name", "")));
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let matcher = QueryMatcher::new("");
        assert!(matcher.matches_all());
        assert!(matcher.matches(&bank("Anything", "")));

        let blank = QueryMatcher::new("   ");
        assert!(blank.matches_all());
    }

    #[test]
    fn test_matches_short_code() {
        let matcher = QueryMatcher::new("058");
        assert!(matcher.matches(&bank("Guaranty Trust", "058")));
        assert!(!matcher.matches(&bank("Guaranty Trust", "")));
    }

    #[test]
    fn test_surrounding_whitespace_is_part_of_query() {
        let matcher = QueryMatcher::new(" bank");
        assert!(matcher.matches(&bank("Zenith Bank", "057")));
        assert!(!matcher.matches(&bank("GTBank", "058")));
    }

    #[test]
    fn test_filter_preserves_order() {
        let banks = vec![
            bank("Zenith Bank", "057"),
            bank("Access Bank", "044"),
            bank("Zenith Mobile", "999"),
        ];

        let matched = QueryMatcher::new("zenith").filter(&banks);
        let names: Vec<&str> = matched.iter().map(|b| b.name.as_str()).collect();

        assert_eq!(names, vec!["Zenith Bank", "Zenith Mobile"]);
    }
}
