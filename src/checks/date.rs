//! Citation year: present, plausible, consistent, and attested in the sources.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{Citation, DateOrYear, Document};

use super::CheckOutcome;

/// Earliest plausible enactment year
pub const YEAR_MIN: i64 = 1776;
/// Latest plausible enactment year
pub const YEAR_MAX: i64 = 2025;

fn trailing_year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\((\d{4})\)\s*$").expect("valid trailing year regex"))
}

fn any_year_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(\d{4})\b").expect("valid year regex"))
}

/// Year from the trailing "(YYYY)" of the citation text
pub fn extract_citation_year(citation_text: &str) -> Option<i64> {
    trailing_year_regex()
        .captures(citation_text)
        .and_then(|caps| caps[1].parse().ok())
}

/// Year from the metadata field: the number itself, or the first 4-digit run
pub fn extract_metadata_year(date_or_year: &DateOrYear) -> Option<i64> {
    match date_or_year {
        DateOrYear::Year(year) => Some(*year),
        DateOrYear::Text(text) => any_year_regex()
            .captures(text)
            .and_then(|caps| caps[1].parse().ok()),
    }
}

pub(crate) fn year_in_range(year: i64) -> bool {
    (YEAR_MIN..=YEAR_MAX).contains(&year)
}

fn out_of_range(year: i64) -> String {
    format!(
        "Year {} outside valid range {}-{}",
        year, YEAR_MIN, YEAR_MAX
    )
}

pub fn check_date(citation: &Citation, documents: Option<&[Document]>) -> CheckOutcome {
    let text_year = extract_citation_year(&citation.citation_text);
    let meta_year = citation.date_or_year.as_ref().and_then(extract_metadata_year);

    let year = match (text_year, meta_year) {
        (None, None) => return Some("No year found in citation text or metadata".to_string()),
        (Some(year), None) | (None, Some(year)) => {
            if !year_in_range(year) {
                return Some(out_of_range(year));
            }
            year
        }
        (Some(text), Some(meta)) => {
            if !year_in_range(text) {
                return Some(out_of_range(text));
            }
            if !year_in_range(meta) {
                return Some(out_of_range(meta));
            }
            if text != meta {
                return Some(format!(
                    "Year mismatch: citation has {}, metadata has {}",
                    text, meta
                ));
            }
            text
        }
    };

    if let Some(documents) = documents {
        let needle = year.to_string();
        if !documents.iter().any(|doc| doc.body_text.contains(&needle)) {
            return Some(format!("Year {} not found in source documents", year));
        }
    }

    None
}
