//! Completion pattern map.
//!
//! The task-completion side of the app keeps a count of completions per
//! `(category, hour)`, keyed by strings of the form `"<categoryCode>_<hour>"`
//! (e.g. `"work_9"`). This module turns that map into typed entries and drops
//! anything that doesn't parse.

use crate::types::{TaskCategory, TimeBucket};
use std::collections::HashMap;

/// Parsed form of a `"<categoryCode>_<hour>"` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CompletionKey {
    pub category: TaskCategory,
    pub hour: u32,
}

impl CompletionKey {
    /// Parse a raw key. Unknown categories and hours outside 0-23 yield `None`.
    pub fn parse(key: &str) -> Option<Self> {
        let (code, hour) = key.rsplit_once('_')?;
        let category = code.parse::<TaskCategory>().ok()?;
        let hour = hour.parse::<u32>().ok()?;
        if hour > 23 {
            return None;
        }
        Some(Self { category, hour })
    }

    pub fn bucket(&self) -> TimeBucket {
        // Hour is validated on construction
        TimeBucket::from_hour(self.hour).unwrap_or(TimeBucket::Night)
    }
}

impl std::fmt::Display for CompletionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}_{}", self.category.as_str(), self.hour)
    }
}

/// Raw key for a category and hour, in the format the completion map uses.
pub fn completion_key(category: TaskCategory, hour: u32) -> String {
    CompletionKey { category, hour }.to_string()
}

/// One usable entry of the completion map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletionEntry {
    pub key: CompletionKey,
    pub count: i64,
}

/// Read-only view of the externally maintained completion counts.
#[derive(Debug, Clone, Default)]
pub struct CompletionPatterns {
    entries: Vec<CompletionEntry>,
}

impl CompletionPatterns {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw `(key, count)` pairs, dropping malformed keys.
    pub fn from_raw<I, K>(raw: I) -> Self
    where
        I: IntoIterator<Item = (K, i64)>,
        K: AsRef<str>,
    {
        let mut entries = Vec::new();
        for (key, count) in raw {
            match CompletionKey::parse(key.as_ref()) {
                Some(key) => entries.push(CompletionEntry { key, count }),
                None => tracing::debug!(key = key.as_ref(), "Ignoring malformed completion key"),
            }
        }
        Self { entries }
    }

    pub fn entries(&self) -> &[CompletionEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<&HashMap<String, i64>> for CompletionPatterns {
    fn from(map: &HashMap<String, i64>) -> Self {
        Self::from_raw(map.iter().map(|(k, v)| (k.as_str(), *v)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_keys() {
        assert_eq!(
            CompletionKey::parse("work_9"),
            Some(CompletionKey {
                category: TaskCategory::Work,
                hour: 9
            })
        );
        assert_eq!(CompletionKey::parse("personal_0").map(|k| k.hour), Some(0));
        assert_eq!(
            CompletionKey::parse("health_23").map(|k| k.bucket()),
            Some(TimeBucket::Night)
        );
    }

    #[test]
    fn test_parse_drops_malformed_keys() {
        for key in ["work", "work_", "_9", "work_24", "work_-1", "chores_9", "work_nine", ""] {
            assert_eq!(CompletionKey::parse(key), None, "{key}");
        }
    }

    #[test]
    fn test_key_format_matches_parser() {
        let key = completion_key(TaskCategory::Shopping, 14);
        assert_eq!(key, "shopping_14");
        assert_eq!(CompletionKey::parse(&key).map(|k| k.to_string()), Some(key));
    }

    #[test]
    fn test_from_raw_skips_bad_entries() {
        let patterns = CompletionPatterns::from_raw(vec![
            ("work_9", 5),
            ("bogus", 10),
            ("home_99", 7),
        ]);
        assert_eq!(patterns.entries().len(), 1);
        assert_eq!(patterns.entries()[0].count, 5);
    }
}
