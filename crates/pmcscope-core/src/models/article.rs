use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel values distinguishing "known absent" from "not yet fetched".
pub const UNKNOWN_TITLE: &str = "Unknown title";
pub const UNKNOWN_DATE: &str = "Unknown";
pub const UNKNOWN_PUBLISHER: &str = "Unknown";
pub const NO_ABSTRACT: &str = "No abstract";
pub const NO_AUTHORS: &str = "No authors";

/// The closed set of section kinds captured from article bodies.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Introduction,
    Conclusion,
}

impl SectionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SectionKind::Introduction => "introduction",
            SectionKind::Conclusion => "conclusion",
        }
    }

    /// Classify a section by its title. The match is a substring probe over
    /// the lower-cased title, introduction checked before conclusion.
    pub fn classify(title: &str) -> Option<Self> {
        let lowered = title.to_lowercase();
        if lowered.contains("introduction") {
            Some(SectionKind::Introduction)
        } else if lowered.contains("conclusion") {
            Some(SectionKind::Conclusion)
        } else {
            None
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One normalized article, reconciled from the efetch XML feed and the
/// rendered article page. Primary key is `id`, used verbatim as the storage
/// key. Every field that can be missing upstream carries a documented
/// sentinel instead of being absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub id: String,
    pub title: String,
    /// Display names in source order; never empty. `["No authors"]` when
    /// the feed has no author data.
    pub authors: Vec<String>,
    /// `YYYY-MM-DD`, or exactly `"Unknown"`. Immutable after creation.
    pub publication_date: String,
    pub publisher: String,
    pub keywords: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    /// Empty when the record is restricted or no matching section was found.
    pub sections: BTreeMap<SectionKind, String>,
    /// True when the upstream feed withholds the full text. Implies
    /// `sections` is empty.
    pub restricted: bool,
    /// Absolute URLs, first-seen order, no duplicates.
    pub images: Vec<String>,
    pub pdf_url: Option<String>,
}

impl ArticleRecord {
    /// A record for `id` with every field at its sentinel.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: UNKNOWN_TITLE.to_string(),
            authors: vec![NO_AUTHORS.to_string()],
            publication_date: UNKNOWN_DATE.to_string(),
            publisher: UNKNOWN_PUBLISHER.to_string(),
            keywords: Vec::new(),
            abstract_text: NO_ABSTRACT.to_string(),
            sections: BTreeMap::new(),
            restricted: false,
            images: Vec::new(),
            pdf_url: None,
        }
    }
}
