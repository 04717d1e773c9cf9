//! Decision scoring, per spec.md §4.5.
//!
//! Pure functions over extracted entities and a small amount of session
//! context. The thresholds below (0.6, 0.65, 0.7, 0.8, 0.85, 0.9) are
//! preserved from the specification verbatim; treat them as a calibration
//! knob rather than a contract (spec.md §9's open question).

use crate::calculator::WORD_TRIGGERS as CALC_TRIGGER_WORDS;
use crate::planner::entities::{product_keyword_count, Entities};
use crate::search::SortKey;

pub fn calculate_score(entities: &Entities, text: &str) -> f64 {
    if entities.has_math_expression {
        0.9
    } else if entities.has_numbers && has_calc_trigger_word(text) {
        0.7
    } else if entities.has_numbers && entities.has_operators {
        0.6
    } else {
        0.0
    }
}

fn has_calc_trigger_word(text: &str) -> bool {
    let lower = text.to_lowercase();
    CALC_TRIGGER_WORDS.iter().any(|w| lower.contains(w))
}

pub fn products_score(entities: &Entities, text: &str, last_action_was_search_products: bool) -> f64 {
    let keyword_count = product_keyword_count(text);
    let has_sort_key = SortKey::detect(text).is_some();

    if keyword_count >= 2 || (keyword_count >= 1 && has_sort_key) {
        0.8
    } else if keyword_count == 1 {
        0.6
    } else if entities.references_prior_turn && last_action_was_search_products {
        0.3
    } else {
        0.0
    }
}

const COUNT_INTENT_WORDS: &[&str] = &["how many", "count", "number of"];

pub fn outlets_score(entities: &Entities, text: &str, last_action_was_search_outlets: bool) -> f64 {
    let lower = text.to_lowercase();
    let has_count_intent = COUNT_INTENT_WORDS.iter().any(|w| lower.contains(w));

    if entities.outlet_keywords_hit && (entities.location_mentioned || has_count_intent) {
        0.85
    } else if entities.outlet_keywords_hit {
        0.65
    } else if entities.references_prior_turn && last_action_was_search_outlets {
        0.3
    } else {
        0.0
    }
}

pub fn hybrid_score(products_score: f64, outlets_score: f64) -> f64 {
    if products_score > 0.5 && outlets_score > 0.5 {
        products_score.min(outlets_score) * 0.9
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::entities::extract;

    #[test]
    fn test_calculate_score_math_expression() {
        let e = extract("what is 5 + 3", &[]);
        assert_eq!(calculate_score(&e, "what is 5 + 3"), 0.9);
    }

    #[test]
    fn test_calculate_score_trigger_word() {
        let e = extract("what is 5 plus 3", &[]);
        assert_eq!(calculate_score(&e, "what is 5 plus 3"), 0.9);
    }

    #[test]
    fn test_calculate_score_zero_without_numbers() {
        let e = extract("show me tumblers", &[]);
        assert_eq!(calculate_score(&e, "show me tumblers"), 0.0);
    }

    #[test]
    fn test_products_score_two_keywords() {
        let e = extract("tumbler and bottle", &[]);
        assert_eq!(products_score(&e, "tumbler and bottle", false), 0.8);
    }

    #[test]
    fn test_products_score_one_keyword_with_sort_key() {
        let e = extract("cheapest tumbler", &[]);
        assert_eq!(products_score(&e, "cheapest tumbler", false), 0.8);
    }

    #[test]
    fn test_products_score_one_keyword() {
        let e = extract("show me tumblers", &[]);
        assert_eq!(products_score(&e, "show me tumblers", false), 0.6);
    }

    #[test]
    fn test_products_score_reference_to_prior_turn() {
        let e = extract("it", &[]);
        assert_eq!(products_score(&e, "it", true), 0.3);
        assert_eq!(products_score(&e, "it", false), 0.0);
    }

    #[test]
    fn test_outlets_score_location_plus_keyword() {
        let e = extract("outlets in Selangor", &["Selangor".to_string()]);
        assert_eq!(outlets_score(&e, "outlets in Selangor", false), 0.85);
    }

    #[test]
    fn test_outlets_score_count_intent() {
        let e = extract("how many outlets are there", &[]);
        assert_eq!(outlets_score(&e, "how many outlets are there", false), 0.85);
    }

    #[test]
    fn test_outlets_score_bare_keyword() {
        let e = extract("show me stores", &[]);
        assert_eq!(outlets_score(&e, "show me stores", false), 0.65);
    }

    #[test]
    fn test_hybrid_score_requires_both_above_half() {
        assert_eq!(hybrid_score(0.8, 0.65), (0.65_f64 * 0.9));
        assert_eq!(hybrid_score(0.8, 0.3), 0.0);
    }
}
