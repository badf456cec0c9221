//! Domain types for citeval.
//!
//! This module contains the core data structures:
//! - Citation, Document, PlaceReference: validation inputs
//! - CheckResults, ErrorRecord: validation outputs

pub mod citation;
pub mod record;

// Re-export commonly used types
pub use citation::{Citation, DateOrYear, Document, PlaceReference};
pub use record::{content_address, timestamp_now, CheckResults, ErrorRecord, CRITICAL_SEVERITY};
