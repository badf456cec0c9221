//! Bluebook shape: `Place, State, {Municipal|County|City} Code, §Section (Year)`.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::Citation;

use super::date::{year_in_range, YEAR_MAX, YEAR_MIN};
use super::CheckOutcome;

/// Bluebook abbreviations for states, D.C. and territories
pub const BLUEBOOK_STATES: &[&str] = &[
    "Ala.", "Alaska", "Ariz.", "Ark.", "Cal.", "Colo.", "Conn.", "Del.", "D.C.", "Fla.", "Ga.",
    "Haw.", "Idaho", "Ill.", "Ind.", "Iowa", "Kan.", "Ky.", "La.", "Me.", "Md.", "Mass.",
    "Mich.", "Minn.", "Miss.", "Mo.", "Mont.", "Neb.", "Nev.", "N.H.", "N.J.", "N.M.", "N.Y.",
    "N.C.", "N.D.", "Ohio", "Okla.", "Or.", "Pa.", "R.I.", "S.C.", "S.D.", "Tenn.", "Tex.",
    "Utah", "Vt.", "Va.", "Wash.", "W. Va.", "Wis.", "Wyo.", "P.R.", "Guam", "V.I.",
    "Am. Samoa", "N. Mar. I.",
];

fn bluebook_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(?P<place>[^,]+),\s*(?P<state>[^,]+),\s*(?P<kind>Municipal|County|City) Code,\s*§\s*(?P<section>[^\s(][^(]*?)\s*\((?P<year>\d{4})\)$",
        )
        .expect("valid bluebook regex")
    })
}

pub fn is_bluebook_state(abbreviation: &str) -> bool {
    BLUEBOOK_STATES.contains(&abbreviation.trim())
}

pub fn check_format(citation: &Citation) -> CheckOutcome {
    let text = citation.citation_text.trim();

    let Some(caps) = bluebook_regex().captures(text) else {
        return Some(format!(
            "Citation does not match Bluebook format 'Place, State, Municipal|County|City Code, §Section (Year)': '{}'",
            text
        ));
    };

    let state = caps["state"].trim();
    if !is_bluebook_state(state) {
        return Some(format!("Unknown Bluebook state abbreviation '{}'", state));
    }

    let year: i64 = caps["year"].parse().unwrap_or_default();
    if !year_in_range(year) {
        return Some(format!(
            "Citation year {} outside valid range {}-{}",
            year, YEAR_MIN, YEAR_MAX
        ));
    }

    None
}
