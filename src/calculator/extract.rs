//! Expression extraction rules, per spec.md §4.1
//!
//! Applied in order: a bare numeric expression is used verbatim; failing
//! that, word triggers are rewritten to their operator symbols and the
//! longest parseable substring is taken; failing that, no expression.

use regex::Regex;
use std::sync::OnceLock;

/// Word trigger -> operator symbol, in longest-first match order so that
/// e.g. "multiplied by" is matched before a bare "by" would ever confuse
/// anything, and "to the power of" before "power" alone.
const REPLACEMENTS: &[(&str, &str)] = &[
    ("to the power of", "**"),
    ("multiplied by", "*"),
    ("divided by", "/"),
    ("plus", "+"),
    ("minus", "-"),
    ("times", "*"),
    ("over", "/"),
    ("modulo", "%"),
];

fn bare_expression_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"-?\d+(?:\.\d+)?(?:\s*(?:\*\*|[+\-*/%])\s*-?\d+(?:\.\d+)?)+").unwrap()
    })
}

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").unwrap())
}

pub fn has_number(text: &str) -> bool {
    number_re().is_match(text)
}

pub fn has_math_expression(text: &str) -> bool {
    bare_expression_re().is_match(text)
}

/// Normalize whitespace: collapse runs of whitespace to a single space and
/// trim the ends.
fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Rule 1: a bare numeric expression, used verbatim after normalization.
fn extract_bare(text: &str) -> Option<String> {
    bare_expression_re()
        .find(text)
        .map(|m| normalize_whitespace(m.as_str()))
}

/// Rule 2: rewrite word triggers to operator symbols, then extract the
/// longest parseable substring.
fn extract_from_words(text: &str) -> Option<String> {
    let mut rewritten = text.to_lowercase();
    for (word, symbol) in REPLACEMENTS {
        rewritten = rewritten.replace(word, &format!(" {} ", symbol));
    }

    let candidates: Vec<&str> = bare_expression_re()
        .find_iter(&rewritten)
        .map(|m| m.as_str())
        .collect();

    candidates
        .into_iter()
        .max_by_key(|s| s.len())
        .map(normalize_whitespace)
}

/// Extract a canonical expression from free text, trying each rule in
/// order. Returns `None` if no rule yields anything.
pub fn extract_expression(text: &str) -> Option<String> {
    extract_bare(text).or_else(|| extract_from_words(text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_expression() {
        assert_eq!(extract_expression("what is 5 + 3"), Some("5 + 3".to_string()));
    }

    #[test]
    fn test_word_trigger_plus() {
        assert_eq!(extract_expression("what is 5 plus 3"), Some("5 + 3".to_string()));
    }

    #[test]
    fn test_word_trigger_divided_by() {
        assert_eq!(
            extract_expression("what is 100 divided by 0"),
            Some("100 / 0".to_string())
        );
    }

    #[test]
    fn test_no_expression() {
        assert_eq!(extract_expression("show me tumblers"), None);
    }

    #[test]
    fn test_longest_candidate_wins() {
        // "5 + 3" and the longer "5 + 3 people... 2 + 2" style inputs should
        // prefer the longest contiguous numeric-operator run.
        let text = "i need a tumbler for 5 + 3 people";
        assert_eq!(extract_expression(text), Some("5 + 3".to_string()));
    }
}
