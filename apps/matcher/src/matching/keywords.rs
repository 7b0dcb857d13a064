//! Keyword pre-filter, a cheap lexical gate in front of the paid scorer.

use std::collections::BTreeSet;

use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeywordResult {
    /// `matched` is empty when the persona declares no mandatory keywords.
    Pass { matched: Vec<String> },
    Fail,
}

/// Case-insensitive, word-boundary match of each mandatory keyword against
/// `job_text`. Fails only when keywords are declared and none match.
pub fn evaluate(mandatory_keywords: &BTreeSet<String>, job_text: &str) -> KeywordResult {
    if mandatory_keywords.is_empty() {
        return KeywordResult::Pass { matched: vec![] };
    }

    let matched: Vec<String> = mandatory_keywords
        .iter()
        .filter(|kw| keyword_pattern(kw).is_some_and(|re| re.is_match(job_text)))
        .cloned()
        .collect();

    if matched.is_empty() {
        KeywordResult::Fail
    } else {
        KeywordResult::Pass { matched }
    }
}

/// `\b` would not anchor keywords ending in symbols ("C++", "C#"), so the
/// boundary is any non-word character or the text edge.
fn keyword_pattern(keyword: &str) -> Option<Regex> {
    let keyword = keyword.trim();
    if keyword.is_empty() {
        return None;
    }
    Regex::new(&format!(r"(?i)(?:^|\W){}(?:\W|$)", regex::escape(keyword))).ok()
}
