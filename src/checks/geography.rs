//! Claimed state vs. reference state for the citation's place.

use crate::adapters::ReferenceLookup;
use crate::domain::Citation;

use super::{same_code, CheckOutcome};

pub fn check_geography(citation: &Citation, reference: &dyn ReferenceLookup) -> CheckOutcome {
    let Some(place_id) = citation.place_id else {
        return Some("Citation is missing a place_id".to_string());
    };

    let claimed = citation.state_code.trim();
    if claimed.is_empty() {
        return Some(format!("Citation for place {} is missing a state code", place_id));
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

    if same_code(claimed, &place.state_code) {
        None
    } else {
        Some(format!(
            "State mismatch for place {}: citation has '{}', reference has '{}'",
            place_id,
            claimed,
            place.state_code.trim()
        ))
    }
}
