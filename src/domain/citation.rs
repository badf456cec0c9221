//! Citation and source document records.
//!
//! Both are loaded from the corpus and are read-only to the validator.

use serde::{Deserialize, Serialize};

/// A single scraped Bluebook citation to a municipal or county code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// GNIS identifier of the place the citation refers to
    #[serde(default)]
    pub place_id: Option<i64>,

    /// Full citation string, e.g. "Garland, Ark., Municipal Code, §14-75 (2007)"
    pub citation_text: String,

    /// Explicit section number, when the scraper captured one
    #[serde(default)]
    pub section_id: Option<String>,

    /// Date or year from the citation metadata
    #[serde(default)]
    pub date_or_year: Option<DateOrYear>,

    /// Claimed code type ("Municipal Code", "County Code", ...)
    #[serde(default)]
    pub code_type: String,

    /// Claimed Bluebook state abbreviation ("Ark.", "Tex.", ...)
    #[serde(default)]
    pub state_code: String,

    /// Content hash assigned upstream
    pub content_id: String,
}

impl Citation {
    /// Create a citation with only the text and upstream id set
    pub fn new(content_id: impl Into<String>, citation_text: impl Into<String>) -> Self {
        Self {
            place_id: None,
            citation_text: citation_text.into(),
            section_id: None,
            date_or_year: None,
            code_type: String::new(),
            state_code: String::new(),
            content_id: content_id.into(),
        }
    }

    pub fn with_place(mut self, place_id: i64) -> Self {
        self.place_id = Some(place_id);
        self
    }

    pub fn with_state(mut self, state_code: impl Into<String>) -> Self {
        self.state_code = state_code.into();
        self
    }

    pub fn with_code_type(mut self, code_type: impl Into<String>) -> Self {
        self.code_type = code_type.into();
        self
    }

    pub fn with_section(mut self, section_id: impl Into<String>) -> Self {
        self.section_id = Some(section_id.into());
        self
    }

    pub fn with_date(mut self, date_or_year: DateOrYear) -> Self {
        self.date_or_year = Some(date_or_year);
        self
    }
}

/// Metadata date as scraped: either a bare year or free text containing one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DateOrYear {
    Year(i64),
    Text(String),
}

impl std::fmt::Display for DateOrYear {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DateOrYear::Year(year) => write!(f, "{}", year),
            DateOrYear::Text(text) => write!(f, "{}", text),
        }
    }
}

/// Body text of one source document for a place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub place_id: i64,
    pub body_text: String,
}

impl Document {
    pub fn new(place_id: i64, body_text: impl Into<String>) -> Self {
        Self {
            place_id,
            body_text: body_text.into(),
        }
    }
}

/// One row of the geographic reference table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceReference {
    pub state_code: String,
    pub class_code: String,
}

impl PlaceReference {
    pub fn new(state_code: impl Into<String>, class_code: impl Into<String>) -> Self {
        Self {
            state_code: state_code.into(),
            class_code: class_code.into(),
        }
    }
}
