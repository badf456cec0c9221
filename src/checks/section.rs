//! Cited section number must appear in at least one source document.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{Citation, Document};

use super::CheckOutcome;

fn citation_section_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"§+\s*([0-9A-Za-z][0-9A-Za-z.:\-]*)").expect("valid section regex")
    })
}

fn section_prefix_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:§+|sec(?:tion)?\.?)\s*").expect("valid section prefix regex")
    })
}

/// Bare section number, preferring the explicit field over the citation text
pub fn extract_section_number(citation: &Citation) -> Option<String> {
    let from_field = citation
        .section_id
        .as_deref()
        .map(|raw| section_prefix_regex().replace(raw.trim(), "").into_owned())
        .map(|s| trim_section(&s).to_string())
        .filter(|s| !s.is_empty());

    from_field.or_else(|| {
        citation_section_regex()
            .captures(&citation.citation_text)
            .map(|caps| trim_section(&caps[1]).to_string())
            .filter(|s| !s.is_empty())
    })
}

/// Drop sentence punctuation trailing the number ("14-75." -> "14-75")
fn trim_section(raw: &str) -> &str {
    raw.trim().trim_end_matches(['.', ':', '-', ','])
}

/// `§ n`, `section n`, `sec. n` or `s n`, not followed by more of the number.
///
/// A trailing period ends the number; a period followed by a digit starts a
/// sub-section (`14-75.1`) and does not match `14-75`.
fn section_pattern(section: &str) -> Regex {
    let pattern = format!(
        r"(?i)(?:§+\s*|\bsection\s+|\bsec\.\s*|\bs\s+){}(?:\.(?:[^0-9]|$)|[^0-9A-Za-z\-.]|$)",
        regex::escape(section)
    );
    Regex::new(&pattern).expect("escaped section pattern is valid")
}

pub fn check_section(citation: &Citation, documents: &[Document]) -> CheckOutcome {
    let Some(section) = extract_section_number(citation) else {
        return Some("No section number found in citation".to_string());
    };

    if documents.is_empty() {
        return Some(format!(
            "No source documents available to verify section {}",
            section
        ));
    }

    let pattern = section_pattern(&section);
    if documents.iter().any(|doc| pattern.is_match(&doc.body_text)) {
        None
    } else {
        Some(format!("Section {} not found in source documents", section))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn citation(text: &str) -> Citation {
        Citation::new("c", text)
    }

    fn docs(bodies: &[&str]) -> Vec<Document> {
        bodies.iter().map(|b| Document::new(1, *b)).collect()
    }

    #[test]
    fn test_extract_prefers_explicit_field() {
        let c = citation("Garland, Ark., Municipal Code, §14-75 (2007)").with_section("Sec. 9-1");
        assert_eq!(extract_section_number(&c).as_deref(), Some("9-1"));
    }

    #[test]
    fn test_extract_from_text() {
        let c = citation("Garland, Ark., Municipal Code, §14-75 (2007)");
        assert_eq!(extract_section_number(&c).as_deref(), Some("14-75"));

        let spaced = citation("Somewhere, Tex., City Code, § 2.04.010 (1999)");
        assert_eq!(extract_section_number(&spaced).as_deref(), Some("2.04.010"));
    }

    #[test]
    fn test_all_phrasings_match() {
        let c = citation("X, Ark., Municipal Code, §14-75 (2007)");
        for body in [
            "see § 14-75 for details",
            "SECTION 14-75. Nuisances",
            "Sec. 14-75 applies",
            "under s 14-75, owners",
            "§14-75",
        ] {
            assert!(check_section(&c, &docs(&[body])).is_none(), "{}", body);
        }
    }

    #[test]
    fn test_longer_number_does_not_match() {
        let c = citation("X, Ark., Municipal Code, §14-75 (2007)");
        assert!(check_section(&c, &docs(&["§ 14-751 and sec. 14-7500"])).is_some());
        assert!(check_section(&c, &docs(&["abs 14-75"])).is_some());
    }

    #[test]
    fn test_sub_section_does_not_match_parent() {
        let c = citation("X, Ark., Municipal Code, §14-75 (2007)");
        assert!(check_section(&c, &docs(&["Sec. 14-75.1 Definitions"])).is_some());
        assert!(check_section(&c, &docs(&["Sec. 14-75. Definitions"])).is_none());
        assert!(check_section(&c, &docs(&["ends with § 14-75."])).is_none());

        let dotted = citation("X, Tex., City Code, § 2.04.010 (1999)");
        assert!(check_section(&dotted, &docs(&["Sec. 2.04.010. Scope"])).is_none());
        assert!(check_section(&dotted, &docs(&["Sec. 2.04.0101"])).is_some());
    }

    #[test]
    fn test_found_in_any_document() {
        let c = citation("X, Ark., Municipal Code, §14-75 (2007)");
        assert!(check_section(&c, &docs(&["nothing here", "Sec. 14-75."])).is_none());
    }

    #[test]
    fn test_failure_messages() {
        let missing = citation("X, Ark., Municipal Code (2007)");
        assert_eq!(
            check_section(&missing, &docs(&["§ 1"])).unwrap(),
            "No section number found in citation"
        );

        let c = citation("X, Ark., Municipal Code, §14-75 (2007)");
        assert!(check_section(&c, &[]).unwrap().contains("No source documents"));
        assert_eq!(
            check_section(&c, &docs(&["§ 1-1"])).unwrap(),
            "Section 14-75 not found in source documents"
        );
    }
}
