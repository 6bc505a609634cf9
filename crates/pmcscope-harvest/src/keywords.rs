//! Keyword fallback generation.
//!
//! Primary strategy is a phrase model scoring 1–2-token candidates against
//! the stop-word lexicon; when the model cannot initialize, a deterministic
//! token heuristic takes over for the rest of the process lifetime.

use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Za-z0-9]+").expect("valid regex"));

/// Minimum token length admitted by the deterministic fallback.
const MIN_FALLBACK_TOKEN_LEN: usize = 4;

struct PhraseModel {
    stop_words: HashSet<String>,
}

impl PhraseModel {
    fn load() -> Result<Self, String> {
        let words = stop_words::get(stop_words::LANGUAGE::English);
        if words.is_empty() {
            return Err("empty stop-word lexicon".to_string());
        }
        Ok(Self {
            stop_words: words.into_iter().collect(),
        })
    }

    /// Score 1–2-token phrases over the stop-word-filtered token stream.
    /// Each occurrence contributes its token span, so informative bigrams
    /// outrank their constituent unigrams; ties resolve to first-seen order.
    fn extract(&self, text: &str, count: usize) -> Vec<String> {
        let lowered = text.to_lowercase();
        let content: Vec<&str> = TOKEN_RE
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .filter(|token| !self.stop_words.contains(*token))
            .collect();

        let mut scores: HashMap<String, usize> = HashMap::new();
        let mut order: Vec<String> = Vec::new();
        for window in 1..=2usize {
            if content.len() < window {
                break;
            }
            for chunk in content.windows(window) {
                let phrase = chunk.join(" ");
                match scores.get_mut(&phrase) {
                    Some(score) => *score += window,
                    None => {
                        scores.insert(phrase.clone(), window);
                        order.push(phrase);
                    }
                }
            }
        }

        let mut ranked: Vec<(String, usize, usize)> = order
            .into_iter()
            .enumerate()
            .map(|(position, phrase)| {
                let score = scores.get(&phrase).copied().unwrap_or(0);
                (phrase, score, position)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.2.cmp(&b.2)));
        ranked
            .into_iter()
            .take(count)
            .map(|(phrase, _, _)| phrase)
            .collect()
    }
}

/// Suggests candidate terms for a record with no upstream keywords. The
/// phrase model is initialized at most once and the result is cached; a
/// failed initialization permanently selects the fallback.
pub struct KeywordSuggester {
    model: OnceLock<Option<PhraseModel>>,
}

impl KeywordSuggester {
    pub fn new() -> Self {
        Self {
            model: OnceLock::new(),
        }
    }

    /// Up to `count` ordered terms derived from `text`.
    pub fn suggest(&self, text: &str, count: usize) -> Vec<String> {
        match self.model() {
            Some(model) => model.extract(text, count),
            None => fallback_terms(text, count),
        }
    }

    fn model(&self) -> Option<&PhraseModel> {
        self.model
            .get_or_init(|| match PhraseModel::load() {
                Ok(model) => Some(model),
                Err(err) => {
                    warn!("phrase model unavailable, using token fallback: {err}");
                    None
                }
            })
            .as_ref()
    }
}

impl Default for KeywordSuggester {
    fn default() -> Self {
        Self::new()
    }
}

/// Deterministic fallback: lower-cased alphanumeric tokens longer than three
/// characters, first-seen order, first `count`.
pub fn fallback_terms(text: &str, count: usize) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut seen = HashSet::new();
    let mut terms = Vec::new();
    for token in TOKEN_RE.find_iter(&lowered) {
        let token = token.as_str();
        if token.len() < MIN_FALLBACK_TOKEN_LEN {
            continue;
        }
        if seen.insert(token.to_string()) {
            terms.push(token.to_string());
        }
        if terms.len() == count {
            break;
        }
    }
    terms
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_keeps_long_tokens_in_first_seen_order() {
        let terms = fallback_terms("The Role of Gravity in Muscle Gravity Loss", 3);
        assert_eq!(terms, vec!["role", "gravity", "muscle"]);
    }

    #[test]
    fn fallback_respects_count() {
        let terms = fallback_terms("alpha beta gamma delta epsilon", 2);
        assert_eq!(terms.len(), 2);
    }

    #[test]
    fn fallback_on_empty_text_is_empty() {
        assert!(fallback_terms("", 3).is_empty());
    }

    #[test]
    fn model_excludes_stop_words() {
        let model = PhraseModel::load().unwrap();
        let terms = model.extract("the effect of microgravity on muscle atrophy", 5);
        assert!(!terms.iter().any(|t| t == "the" || t == "of" || t == "on"));
        assert!(terms.iter().any(|t| t.contains("microgravity")));
    }

    #[test]
    fn model_prefers_repeated_bigrams() {
        let model = PhraseModel::load().unwrap();
        let terms = model.extract(
            "muscle atrophy drives outcomes; muscle atrophy persists",
            2,
        );
        assert_eq!(terms[0], "muscle atrophy");
    }

    #[test]
    fn suggestions_are_deterministic() {
        let suggester = KeywordSuggester::new();
        let first = suggester.suggest("Hindlimb suspension in Wistar rats", 3);
        let second = suggester.suggest("Hindlimb suspension in Wistar rats", 3);
        assert_eq!(first, second);
        assert!(first.len() <= 3);
        assert!(!first.is_empty());
    }

    #[test]
    fn zero_count_suggests_nothing() {
        let suggester = KeywordSuggester::new();
        assert!(suggester.suggest("any text here", 0).is_empty());
    }
}
