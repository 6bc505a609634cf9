use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{HarvestError, Result};

static PMC_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"PMC\d+").expect("valid regex"));
static EXACT_PMC_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^PMC\d+$").expect("valid regex"));

/// A PubMed Central identifier: the literal `PMC` prefix followed by digits.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PmcId(String);

impl PmcId {
    /// Parse an exact identifier, tolerating surrounding whitespace.
    pub fn parse(input: &str) -> Result<Self> {
        let trimmed = input.trim();
        if EXACT_PMC_ID_RE.is_match(trimmed) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(HarvestError::InvalidIdentifier(input.to_string()))
        }
    }

    /// Find the first embedded identifier in a worklist entry, typically a
    /// full article URL.
    pub fn extract(text: &str) -> Option<Self> {
        PMC_ID_RE.find(text).map(|m| Self(m.as_str().to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PmcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
