//! Entity extraction over a question's raw text, per spec.md §4.5.

use once_cell::sync::Lazy;
use regex::Regex;

pub const PRODUCT_KEYWORDS: &[&str] = &[
    "tumbler", "bottle", "mug", "cup", "cold cup", "drinkware", "straw", "lid", "capacity", "ml", "oz", "price",
    "color",
];

pub const OUTLET_KEYWORDS: &[&str] = &[
    "outlet", "store", "branch", "location", "near", "address", "open", "hours", "map", "city", "state", "postal",
];

const REFERENCE_PRONOUNS: &[&str] = &["it", "that", "those", "them", "there"];

static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?").unwrap());
static OPERATOR_TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?:^|\s)(\*\*|[+\-*/%])(?:\s|$)").unwrap());
static MATH_EXPR_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d+(?:\.\d+)?\s*(?:\*\*|[+\-*/%])\s*\d+(?:\.\d+)?").unwrap());
static POSTAL_CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{5}\b").unwrap());

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Entities {
    pub has_numbers: bool,
    pub has_operators: bool,
    pub has_math_expression: bool,
    pub product_keywords_hit: bool,
    pub outlet_keywords_hit: bool,
    pub location_mentioned: bool,
    pub references_prior_turn: bool,
}

/// Extract all boolean entity flags from a question, given a closed list
/// of known locations (cities/states) loaded from config.
pub fn extract(text: &str, known_locations: &[String]) -> Entities {
    let lower = text.to_lowercase();

    let has_numbers = NUMBER_RE.is_match(&lower);
    let has_operators = OPERATOR_TOKEN_RE.is_match(&lower);
    let has_math_expression = MATH_EXPR_RE.is_match(&lower);
    let product_keywords_hit = PRODUCT_KEYWORDS.iter().any(|k| contains_keyword(&lower, k));
    let outlet_keywords_hit = OUTLET_KEYWORDS.iter().any(|k| contains_keyword(&lower, k));
    let location_mentioned =
        POSTAL_CODE_RE.is_match(&lower) || known_locations.iter().any(|loc| contains_keyword(&lower, &loc.to_lowercase()));
    let references_prior_turn = references_prior_turn(&lower);

    Entities {
        has_numbers,
        has_operators,
        has_math_expression,
        product_keywords_hit,
        outlet_keywords_hit,
        location_mentioned,
        references_prior_turn,
    }
}

fn contains_keyword(lower_text: &str, keyword: &str) -> bool {
    if keyword.contains(' ') {
        lower_text.contains(keyword)
    } else {
        lower_text.split(|c: char| !c.is_alphanumeric()).any(|token| token_matches(token, keyword))
    }
}

/// A token matches a closed-set keyword either exactly or as its plural:
/// "tumblers" must hit the keyword "tumbler", "branches" must hit "branch",
/// per spec.md §4.5's keyword sets being written in the singular.
fn token_matches(token: &str, keyword: &str) -> bool {
    token == keyword || token.strip_suffix("es") == Some(keyword) || token.strip_suffix('s') == Some(keyword)
}

/// A pronoun with no concrete antecedent in the same utterance: we treat
/// any of the closed pronoun set as a prior-turn reference unless the
/// question itself contains a product or outlet keyword (a concrete noun
/// supplying the antecedent).
fn references_prior_turn(lower_text: &str) -> bool {
    let has_pronoun = REFERENCE_PRONOUNS.iter().any(|p| contains_keyword(lower_text, p));
    if !has_pronoun {
        return false;
    }
    let has_concrete_antecedent =
        PRODUCT_KEYWORDS.iter().any(|k| contains_keyword(lower_text, k)) || OUTLET_KEYWORDS.iter().any(|k| contains_keyword(lower_text, k));
    !has_concrete_antecedent
}

/// Count how many distinct product keywords matched, used by the scoring
/// step (1 keyword vs. 2+ keywords are scored differently).
pub fn product_keyword_count(text: &str) -> usize {
    let lower = text.to_lowercase();
    PRODUCT_KEYWORDS.iter().filter(|k| contains_keyword(&lower, k)).count()
}
