//! Error-pattern frequencies over persisted records.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::domain::ErrorRecord;

/// Counts per error type and severity
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ErrorPatternSummary {
    pub total_records: usize,
    pub geography_errors: usize,
    pub type_errors: usize,
    pub section_errors: usize,
    pub date_errors: usize,
    pub format_errors: usize,
    /// Records with a geography or type error
    pub critical: usize,
    /// Records with only section/date/format errors
    pub minor: usize,
    pub by_severity: BTreeMap<u8, usize>,
    /// Distinct places with at least one record
    pub places_affected: usize,
}

impl ErrorPatternSummary {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ErrorRecord>) -> Self {
        let mut summary = Self::default();
        let mut places = std::collections::BTreeSet::new();

        for record in records {
            summary.total_records += 1;
            summary.geography_errors += usize::from(record.geography_error.is_some());
            summary.type_errors += usize::from(record.type_error.is_some());
            summary.section_errors += usize::from(record.section_error.is_some());
            summary.date_errors += usize::from(record.date_error.is_some());
            summary.format_errors += usize::from(record.format_error.is_some());

            if record.is_critical() {
                summary.critical += 1;
            } else {
                summary.minor += 1;
            }

            *summary.by_severity.entry(record.severity).or_default() += 1;
            places.insert(record.place_id);
        }

        summary.places_affected = places.len();
        summary
    }
}
