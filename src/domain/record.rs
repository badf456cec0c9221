//! Content-addressed error records.
//!
//! An ErrorRecord is produced for every citation that fails at least one
//! check. Its id is derived from its own field values, so the same failure
//! recorded at the same instant always hashes to the same id.

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Severity assigned when the citation points at the wrong place or code.
pub const CRITICAL_SEVERITY: u8 = 5;

/// Field separator used when hashing record contents
const FIELD_SEPARATOR: char = '\u{1f}';
/// Stands in for an absent optional so it never hashes like `Some("")`
const ABSENT_FIELD: &str = "\u{0}";

/// Outcome of the five checkers for one citation (None = passed)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckResults {
    pub geography: Option<String>,
    pub code_type: Option<String>,
    pub section: Option<String>,
    pub date: Option<String>,
    pub format: Option<String>,
}

impl CheckResults {
    /// True when every checker passed
    pub fn is_clean(&self) -> bool {
        self.errors().next().is_none()
    }

    /// Non-null error strings in field order
    pub fn errors(&self) -> impl Iterator<Item = &str> {
        [
            &self.geography,
            &self.code_type,
            &self.section,
            &self.date,
            &self.format,
        ]
        .into_iter()
        .filter_map(|e| e.as_deref())
    }

    /// 5 for geography/type errors, otherwise the number of failed checks
    pub fn severity(&self) -> u8 {
        if self.geography.is_some() || self.code_type.is_some() {
            CRITICAL_SEVERITY
        } else {
            self.errors().count() as u8
        }
    }
}

/// A persisted validation failure for one citation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    /// 32 hex chars, hash of every other field
    pub content_id: String,

    /// Upstream id of the failing citation
    pub citation_content_id: String,

    pub place_id: i64,

    pub geography_error: Option<String>,
    pub type_error: Option<String>,
    pub section_error: Option<String>,
    pub date_error: Option<String>,
    pub format_error: Option<String>,

    /// 1-5, see [`CheckResults::severity`]
    pub severity: u8,

    /// "; "-joined error strings
    pub error_message: String,

    /// RFC 3339 UTC timestamp
    pub created_at: String,
}

impl ErrorRecord {
    /// Build a record from checker results.
    ///
    /// Returns None when every check passed; clean citations produce no record.
    pub fn from_results(
        citation_content_id: impl Into<String>,
        place_id: i64,
        results: CheckResults,
        created_at: impl Into<String>,
    ) -> Option<Self> {
        if results.is_clean() {
            return None;
        }

        let severity = results.severity();
        let error_message = results.errors().collect::<Vec<_>>().join("; ");

        let mut record = Self {
            content_id: String::new(),
            citation_content_id: citation_content_id.into(),
            place_id,
            geography_error: results.geography,
            type_error: results.code_type,
            section_error: results.section,
            date_error: results.date,
            format_error: results.format,
            severity,
            error_message,
            created_at: created_at.into(),
        };
        record.content_id = record.compute_content_id();
        Some(record)
    }

    /// Hash of all fields except `content_id`, in a fixed order
    pub fn compute_content_id(&self) -> String {
        let place_id = self.place_id.to_string();
        let severity = self.severity.to_string();
        content_address(&[
            &self.citation_content_id,
            &place_id,
            self.geography_error.as_deref().unwrap_or(ABSENT_FIELD),
            self.type_error.as_deref().unwrap_or(ABSENT_FIELD),
            self.section_error.as_deref().unwrap_or(ABSENT_FIELD),
            self.date_error.as_deref().unwrap_or(ABSENT_FIELD),
            self.format_error.as_deref().unwrap_or(ABSENT_FIELD),
            &severity,
            &self.error_message,
            &self.created_at,
        ])
    }

    /// Geography or type error present
    pub fn is_critical(&self) -> bool {
        self.geography_error.is_some() || self.type_error.is_some()
    }
}

/// Deterministic 32 hex char id for an ordered list of field values
pub fn content_address(fields: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (idx, field) in fields.iter().enumerate() {
        if idx > 0 {
            let mut buf = [0u8; 4];
            hasher.update(FIELD_SEPARATOR.encode_utf8(&mut buf).as_bytes());
        }
        hasher.update(field.as_bytes());
    }
    let digest = hasher.finalize();
    hex::encode(&digest[..16])
}

/// Current time in the format stored on records
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geography_failure() -> CheckResults {
        CheckResults {
            geography: Some("State mismatch".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_clean_results_produce_no_record() {
        let record = ErrorRecord::from_results("c1", 101, CheckResults::default(), "t");
        assert!(record.is_none());
    }

    #[test]
    fn test_severity_rules() {
        assert_eq!(geography_failure().severity(), 5);

        let type_only = CheckResults {
            code_type: Some("wrong".to_string()),
            ..Default::default()
        };
        assert_eq!(type_only.severity(), 5);

        let minor = CheckResults {
            section: Some("a".to_string()),
            date: Some("b".to_string()),
            ..Default::default()
        };
        assert_eq!(minor.severity(), 2);

        let all_minor = CheckResults {
            section: Some("a".to_string()),
            date: Some("b".to_string()),
            format: Some("c".to_string()),
            ..Default::default()
        };
        assert_eq!(all_minor.severity(), 3);
    }

    #[test]
    fn test_error_message_joins_in_field_order() {
        let results = CheckResults {
            format: Some("bad format".to_string()),
            section: Some("no section".to_string()),
            ..Default::default()
        };
        let record = ErrorRecord::from_results("c1", 7, results, "t").unwrap();
        assert_eq!(record.error_message, "no section; bad format");
        assert_eq!(record.severity, 2);
    }

    #[test]
    fn test_content_id_is_deterministic() {
        let a = ErrorRecord::from_results("c1", 101, geography_failure(), "2024-01-01T00:00:00Z")
            .unwrap();
        let b = ErrorRecord::from_results("c1", 101, geography_failure(), "2024-01-01T00:00:00Z")
            .unwrap();
        assert_eq!(a.content_id, b.content_id);
        assert_eq!(a.content_id.len(), 32);
        assert!(a.content_id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_content_id_changes_with_any_field() {
        let base = ErrorRecord::from_results("c1", 101, geography_failure(), "t0").unwrap();

        let mut variants = Vec::new();
        let mut r = base.clone();
        r.citation_content_id = "c2".to_string();
        variants.push(r);
        let mut r = base.clone();
        r.place_id = 102;
        variants.push(r);
        let mut r = base.clone();
        r.geography_error = Some("State mismatch!".to_string());
        variants.push(r);
        let mut r = base.clone();
        r.date_error = Some("late".to_string());
        variants.push(r);
        let mut r = base.clone();
        r.severity = 4;
        variants.push(r);
        let mut r = base.clone();
        r.created_at = "t1".to_string();
        variants.push(r);

        for variant in variants {
            assert_ne!(variant.compute_content_id(), base.content_id);
        }
    }

    #[test]
    fn test_absent_and_empty_messages_differ() {
        let base = ErrorRecord::from_results("c1", 101, geography_failure(), "t0").unwrap();
        let mut empty = base.clone();
        empty.date_error = Some(String::new());

        assert!(base.date_error.is_none());
        assert_ne!(empty.compute_content_id(), base.content_id);
    }

    #[test]
    fn test_content_address_separates_fields() {
        assert_ne!(content_address(&["ab", "c"]), content_address(&["a", "bc"]));
    }
}
