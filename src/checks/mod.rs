//! Per-citation correctness checks.
//!
//! Every checker returns `None` when the citation passes and `Some(message)`
//! when it does not. Infrastructure problems (a reference lookup failing)
//! are reported the same way, so one bad place never aborts a batch.

pub mod code_type;
pub mod date;
pub mod format;
pub mod geography;
pub mod section;

use crate::adapters::ReferenceLookup;
use crate::domain::{Citation, Document};

pub use crate::domain::CheckResults;
pub use code_type::{check_code_type, expected_code_types};
pub use date::{check_date, extract_citation_year, extract_metadata_year, YEAR_MAX, YEAR_MIN};
pub use format::{check_format, is_bluebook_state, BLUEBOOK_STATES};
pub use geography::check_geography;
pub use section::{check_section, extract_section_number};

/// Result of a single checker
pub type CheckOutcome = Option<String>;

/// Run all five checkers against one citation.
///
/// The date checker only cross-references documents when
/// `check_document_year` is set and at least one document is present.
pub fn run_all(
    citation: &Citation,
    documents: &[Document],
    reference: &dyn ReferenceLookup,
    check_document_year: bool,
) -> CheckResults {
    let date_documents = if check_document_year && !documents.is_empty() {
        Some(documents)
    } else {
        None
    };

    CheckResults {
        geography: check_geography(citation, reference),
        code_type: check_code_type(citation, reference),
        section: check_section(citation, documents),
        date: check_date(citation, date_documents),
        format: check_format(citation),
    }
}

/// Trimmed, case-insensitive equality
pub(crate) fn same_code(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}
