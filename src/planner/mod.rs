//! Planner (C5) — the heart of the system.
//!
//! Produces a [`Decision`] for every incoming question. Pure: the same
//! `(question, context)` pair always produces the same Decision, byte for
//! byte, per spec.md §4.5 and §8's determinism property. All randomness is
//! confined to the language-model-driven tools downstream, never here.

pub mod entities;
mod scoring;

use serde::{Deserialize, Serialize};

use crate::search::SortKey;
use entities::Entities;

/// One of the six tagged actions the Orchestrator dispatches on (spec.md
/// §9's design note: a total match, no default branch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryAction {
    SearchProducts,
    SearchOutlets,
    Calculate,
    Hybrid,
    Clarify,
    AnswerDirectly,
}

impl PrimaryAction {
    /// The snake_case form used as a Session Store metadata value and in
    /// `PlannerContext::last_primary_action` comparisons.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrimaryAction::SearchProducts => "search_products",
            PrimaryAction::SearchOutlets => "search_outlets",
            PrimaryAction::Calculate => "calculate",
            PrimaryAction::Hybrid => "hybrid",
            PrimaryAction::Clarify => "clarify",
            PrimaryAction::AnswerDirectly => "answer_directly",
        }
    }
}

/// A single step in the Decision's execution plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum PlanStep {
    Calculate,
    SearchProducts {
        #[serde(skip_serializing_if = "Option::is_none")]
        sort_key: Option<String>,
    },
    SearchOutlets,
    LanguageModelCompletion,
}

/// Immutable record produced by the Planner for each question, per
/// spec.md §3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub primary_action: PrimaryAction,
    pub confidence: f64,
    pub reasoning: String,
    pub has_numbers: bool,
    pub has_operators: bool,
    pub has_math_expression: bool,
    pub product_keywords_hit: bool,
    pub outlet_keywords_hit: bool,
    pub location_mentioned: bool,
    pub missing_info: Vec<String>,
    pub plan: Vec<PlanStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clarification_prompt: Option<String>,
}

/// The slice of session state the Planner is allowed to see: an immutable
/// snapshot, never a reference into the live Session (spec.md §9).
#[derive(Debug, Clone, Default)]
pub struct PlannerContext<'a> {
    pub last_primary_action: Option<&'a str>,
    pub last_product_query: Option<&'a str>,
    pub last_outlet_query: Option<&'a str>,
    pub has_prior_turns: bool,
}

/// Below this length, a pronoun-only question with no concrete antecedent
/// is assumed to be referring to the prior turn rather than a fresh,
/// self-contained (if terse) question. Calibration knob, not a contract.
const CLARIFY_LENGTH_THRESHOLD: usize = 30;

/// Produce a Decision for `question` given `context` and the closed list
/// of known locations (loaded from config) entity extraction consults.
pub fn decide(question: &str, context: &PlannerContext<'_>, known_locations: &[String]) -> Decision {
    let entities = entities::extract(question, known_locations);

    let last_action_was_search_products = context.last_primary_action == Some("search_products");
    let last_action_was_search_outlets = context.last_primary_action == Some("search_outlets");

    let calculate_score = scoring::calculate_score(&entities, question);
    let products_score = scoring::products_score(&entities, question, last_action_was_search_products);
    let outlets_score = scoring::outlets_score(&entities, question, last_action_was_search_outlets);
    let hybrid_score = scoring::hybrid_score(products_score, outlets_score);

    let retrieval_max = products_score.max(outlets_score);

    if calculate_score >= 0.6 && calculate_score >= retrieval_max {
        return if retrieval_max >= 0.6 {
            build_hybrid_decision(&entities, calculate_score, products_score, outlets_score, question, true)
        } else {
            build_calculate_decision(&entities, calculate_score)
        };
    }

    if hybrid_score >= 0.5 {
        return build_hybrid_decision(&entities, calculate_score, products_score, outlets_score, question, calculate_score >= 0.6);
    }

    if retrieval_max >= 0.6 {
        return build_retrieval_decision(&entities, products_score, outlets_score, question);
    }

    if question.len() < CLARIFY_LENGTH_THRESHOLD && entities.references_prior_turn && context.has_prior_turns {
        return build_clarify_decision(&entities, context);
    }

    build_answer_directly_decision(&entities)
}

fn build_calculate_decision(entities: &Entities, score: f64) -> Decision {
    Decision {
        primary_action: PrimaryAction::Calculate,
        confidence: score,
        reasoning: format!(
            "calculate_score={:.2} dominates (has_math_expression={}, has_numbers={})",
            score, entities.has_math_expression, entities.has_numbers
        ),
        has_numbers: entities.has_numbers,
        has_operators: entities.has_operators,
        has_math_expression: entities.has_math_expression,
        product_keywords_hit: entities.product_keywords_hit,
        outlet_keywords_hit: entities.outlet_keywords_hit,
        location_mentioned: entities.location_mentioned,
        missing_info: Vec::new(),
        plan: vec![PlanStep::Calculate, PlanStep::LanguageModelCompletion],
        clarification_prompt: None,
    }
}

fn build_hybrid_decision(
    entities: &Entities,
    calculate_score: f64,
    products_score: f64,
    outlets_score: f64,
    question: &str,
    include_calculate: bool,
) -> Decision {
    let mut plan = Vec::new();
    if include_calculate {
        plan.push(PlanStep::Calculate);
    }
    if products_score > 0.5 {
        let sort_key = SortKey::detect(question).map(|k| k.as_str().to_string());
        plan.push(PlanStep::SearchProducts { sort_key });
    }
    if outlets_score > 0.5 {
        plan.push(PlanStep::SearchOutlets);
    }
    plan.push(PlanStep::LanguageModelCompletion);

    let confidence = [calculate_score, products_score, outlets_score].into_iter().fold(0.0_f64, f64::max);

    Decision {
        primary_action: PrimaryAction::Hybrid,
        confidence,
        reasoning: format!(
            "hybrid dispatch: calculate_score={:.2}, products_score={:.2}, outlets_score={:.2}",
            calculate_score, products_score, outlets_score
        ),
        has_numbers: entities.has_numbers,
        has_operators: entities.has_operators,
        has_math_expression: entities.has_math_expression,
        product_keywords_hit: entities.product_keywords_hit,
        outlet_keywords_hit: entities.outlet_keywords_hit,
        location_mentioned: entities.location_mentioned,
        missing_info: Vec::new(),
        plan,
        clarification_prompt: None,
    }
}

fn build_retrieval_decision(entities: &Entities, products_score: f64, outlets_score: f64, question: &str) -> Decision {
    let (primary_action, confidence, plan) = if products_score >= outlets_score {
        let sort_key = SortKey::detect(question).map(|k| k.as_str().to_string());
        (
            PrimaryAction::SearchProducts,
            products_score,
            vec![PlanStep::SearchProducts { sort_key }, PlanStep::LanguageModelCompletion],
        )
    } else {
        (PrimaryAction::SearchOutlets, outlets_score, vec![PlanStep::SearchOutlets, PlanStep::LanguageModelCompletion])
    };

    Decision {
        primary_action,
        confidence,
        reasoning: format!(
            "retrieval dispatch: products_score={:.2}, outlets_score={:.2} (product_keywords_hit={}, outlet_keywords_hit={}, location_mentioned={})",
            products_score, outlets_score, entities.product_keywords_hit, entities.outlet_keywords_hit, entities.location_mentioned
        ),
        has_numbers: entities.has_numbers,
        has_operators: entities.has_operators,
        has_math_expression: entities.has_math_expression,
        product_keywords_hit: entities.product_keywords_hit,
        outlet_keywords_hit: entities.outlet_keywords_hit,
        location_mentioned: entities.location_mentioned,
        missing_info: Vec::new(),
        plan,
        clarification_prompt: None,
    }
}

fn build_clarify_decision(entities: &Entities, context: &PlannerContext<'_>) -> Decision {
    let (missing_info, prompt) = match context.last_primary_action {
        Some("search_products") => (
            vec!["missing:product_category".to_string()],
            match context.last_product_query {
                Some(q) => format!("Could you clarify what about \"{}\" you're asking?", q),
                None => "Could you clarify which product you mean?".to_string(),
            },
        ),
        Some("search_outlets") => (
            vec!["missing:location".to_string()],
            match context.last_outlet_query {
                Some(q) => format!("Could you clarify what about \"{}\" you're asking?", q),
                None => "Could you clarify which outlet or location you mean?".to_string(),
            },
        ),
        _ => (vec!["missing:specifics".to_string()], "Could you say a bit more about what you're asking?".to_string()),
    };

    Decision {
        primary_action: PrimaryAction::Clarify,
        confidence: 0.5,
        reasoning: "question references the prior turn without a concrete antecedent".to_string(),
        has_numbers: entities.has_numbers,
        has_operators: entities.has_operators,
        has_math_expression: entities.has_math_expression,
        product_keywords_hit: entities.product_keywords_hit,
        outlet_keywords_hit: entities.outlet_keywords_hit,
        location_mentioned: entities.location_mentioned,
        missing_info,
        plan: Vec::new(),
        clarification_prompt: Some(prompt),
    }
}

fn build_answer_directly_decision(entities: &Entities) -> Decision {
    Decision {
        primary_action: PrimaryAction::AnswerDirectly,
        confidence: 0.0,
        reasoning: "no tool-dispatch score crossed its threshold; answering from the model's own knowledge".to_string(),
        has_numbers: entities.has_numbers,
        has_operators: entities.has_operators,
        has_math_expression: entities.has_math_expression,
        product_keywords_hit: entities.product_keywords_hit,
        outlet_keywords_hit: entities.outlet_keywords_hit,
        location_mentioned: entities.location_mentioned,
        missing_info: Vec::new(),
        plan: vec![PlanStep::LanguageModelCompletion],
        clarification_prompt: None,
    }
}
