//! SQL safety validation for language-model-generated statements
//!
//! Grounded in the same "SELECT-only, forbidden-keyword" check the teacher
//! applies to arbitrary user tables, narrowed here to the single fixed
//! `outlets` schema per spec.md §4.3.

use once_cell::sync::Lazy;
use regex::Regex;

const FORBIDDEN_KEYWORDS: &[&str] = &["insert", "update", "delete", "drop", "alter", "create", "grant"];

static TABLE_REF_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(?:from|join)\s+([a-zA-Z_][a-zA-Z0-9_]*)").unwrap());

/// Validates a generated statement against the rules in spec.md §4.3 step 2.
/// Returns `Err(reason)` describing the first violation found.
pub fn validate_statement(sql: &str) -> Result<(), String> {
    let trimmed = sql.trim();

    if trimmed.is_empty() {
        return Err("generated statement was empty".to_string());
    }

    let lower = trimmed.to_lowercase();
    if !lower.starts_with("select") {
        return Err("statement must begin with SELECT".to_string());
    }

    let body = trimmed.trim_end_matches(';');
    if body.contains(';') {
        return Err("statement must contain ';' only as a terminator".to_string());
    }

    for keyword in FORBIDDEN_KEYWORDS {
        if contains_word(&lower, keyword) {
            return Err(format!("statement contains forbidden keyword '{}'", keyword));
        }
    }

    for capture in TABLE_REF_RE.captures_iter(trimmed) {
        let table = capture.get(1).map(|m| m.as_str()).unwrap_or("");
        if !table.eq_ignore_ascii_case("outlets") {
            return Err(format!("statement references table '{}', only 'outlets' is allowed", table));
        }
    }

    Ok(())
}

fn contains_word(haystack: &str, word: &str) -> bool {
    haystack.split(|c: char| !c.is_alphanumeric() && c != '_').any(|token| token == word)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_select_passes() {
        assert!(validate_statement("SELECT * FROM outlets WHERE city = 'Selangor'").is_ok());
    }

    #[test]
    fn test_trailing_semicolon_allowed() {
        assert!(validate_statement("SELECT COUNT(*) FROM outlets;").is_ok());
    }

    #[test]
    fn test_non_select_rejected() {
        assert!(validate_statement("UPDATE outlets SET name = 'x'").is_err());
    }

    #[test]
    fn test_forbidden_keyword_rejected() {
        assert!(validate_statement("SELECT * FROM outlets; DROP TABLE outlets;").is_err());
    }

    #[test]
    fn test_other_table_rejected() {
        assert!(validate_statement("SELECT * FROM users").is_err());
    }

    #[test]
    fn test_join_on_other_table_rejected() {
        assert!(validate_statement("SELECT * FROM outlets JOIN secrets ON outlets.id = secrets.id").is_err());
    }

    #[test]
    fn test_embedded_semicolon_rejected() {
        assert!(validate_statement("SELECT * FROM outlets WHERE name = 'a'; SELECT 1").is_err());
    }

    #[test]
    fn test_keyword_substring_in_identifier_not_flagged() {
        // "updated_at"-style columns shouldn't trip the forbidden-keyword
        // check for "update" since we match whole tokens only.
        assert!(validate_statement("SELECT updated_at FROM outlets ORDER BY updated_at").is_ok());
    }
}
