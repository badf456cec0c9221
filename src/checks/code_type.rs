//! Code type claimed by the citation vs. the place's reference class code.
//!
//! C1-C7 are incorporated places (municipal codes), H1/H4/H5/H6 are
//! counties, and C8 is a consolidated city-county that may publish either.

use crate::adapters::ReferenceLookup;
use crate::domain::Citation;

use super::{same_code, CheckOutcome};

pub const MUNICIPAL_CODE: &str = "Municipal Code";
pub const COUNTY_CODE: &str = "County Code";

/// Code types acceptable for a class code; None for unknown codes
pub fn expected_code_types(class_code: &str) -> Option<&'static [&'static str]> {
    match class_code.trim().to_ascii_uppercase().as_str() {
        "C1" | "C2" | "C3" | "C4" | "C5" | "C6" | "C7" => Some(&[MUNICIPAL_CODE]),
        "H1" | "H4" | "H5" | "H6" => Some(&[COUNTY_CODE]),
        "C8" => Some(&[MUNICIPAL_CODE, COUNTY_CODE]),
        _ => None,
    }
}

pub fn check_code_type(citation: &Citation, reference: &dyn ReferenceLookup) -> CheckOutcome {
    let Some(place_id) = citation.place_id else {
        return Some("Cannot verify code type without a place_id".to_string());
    };

    let claimed = citation.code_type.trim();
    if claimed.is_empty() {
        return Some(format!("Citation for place {} is missing a code type", place_id));
    }

    let place = match reference.lookup(place_id) {
        Ok(Some(place)) => place,
        Ok(None) => {
            return Some(format!(
                "Place {} not found in reference database",
                place_id
            ))
        }
        Err(e) => {
            return Some(format!(
                "Reference lookup failed for place {}: {}",
                place_id, e
            ))
        }
    };

    let class_code = place.class_code.trim();
    let Some(expected) = expected_code_types(class_code) else {
        return Some(format!(
            "Unknown class code '{}' for place {}",
            class_code, place_id
        ));
    };

    if expected.iter().any(|e| same_code(e, claimed)) {
        None
    } else {
        Some(format!(
            "Code type mismatch for place {}: citation has '{}', class code {} expects '{}'",
            place_id,
            claimed,
            class_code,
            expected.join("' or '")
        ))
    }
}
