//! Orchestrator (C6) — drives one request end to end.
//!
//! Resolves the session, consults the Planner, dispatches to whichever of
//! Calculator/Product Index/Outlet SQL Gate the Decision names, assembles a
//! language-model prompt from the result, and persists the Turn. Grounded in
//! the shape of an agent-loop driver: plan once, dispatch tools, one final
//! model call, never an agentic back-and-forth (spec.md §4.6 is a single
//! pass, not a loop).

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::calculator::{self, CalcResult};
use crate::llm::{LlmClient, LlmRequest};
use crate::outlets::{OutletAnswer, OutletGate};
use crate::planner::{self, Decision, PlanStep, PlannerContext, PrimaryAction};
use crate::search::{ProductIndex, ProductMatch, SortKey};
use crate::session::{SessionStore, Turn, META_LAST_OUTLET_QUERY, META_LAST_PRIMARY_ACTION, META_LAST_PRODUCT_QUERY};

const SYSTEM_PROMPT: &str = "You are the Flaskbot assistant. You answer questions about a drinkware \
product catalog and a retail-outlet directory, and you perform arithmetic when asked. Use only the \
retrieved context given to you below; do not invent product names, prices, or outlet addresses. If no \
context was retrieved and the question is outside the catalog/outlet/arithmetic domain, answer briefly \
from your own general knowledge but say so.";

/// An inbound chat question, per spec.md §3's "Question" record. The
/// client-supplied hint is accepted but ignored by the core, per spec.md §3.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatQuestion {
    pub question: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

/// What the Boundary emits for a chat turn, per spec.md §3.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub response: String,
    pub session_id: String,
    pub planning_info: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calculation_result: Option<CalcResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outlet_count: Option<usize>,
}

/// Collects tool output on the way to the final prompt; dropped once the
/// envelope is built.
#[derive(Default)]
struct ToolOutcome {
    calc: Option<CalcResult>,
    products: Option<Vec<ProductMatch>>,
    outlet: Option<OutletAnswer>,
}

/// Drives the full request lifecycle described in spec.md §4.6.
pub struct Orchestrator {
    pub sessions: Arc<SessionStore>,
    pub product_index: Arc<ProductIndex>,
    pub outlet_gate: Arc<OutletGate>,
    pub llm: Arc<dyn LlmClient>,
    pub known_locations: Vec<String>,
}

impl Orchestrator {
    pub fn new(
        sessions: Arc<SessionStore>,
        product_index: Arc<ProductIndex>,
        outlet_gate: Arc<OutletGate>,
        llm: Arc<dyn LlmClient>,
        known_locations: Vec<String>,
    ) -> Self {
        Self { sessions, product_index, outlet_gate, llm, known_locations }
    }

    pub async fn handle_chat(&self, request: ChatQuestion) -> ResponseEnvelope {
        let session_id = request.session_id.unwrap_or_else(SessionStore::new_session_id);
        let snapshot = self.sessions.get_or_create(&session_id).await;

        let context = PlannerContext {
            last_primary_action: snapshot.metadata.get(META_LAST_PRIMARY_ACTION).map(|s| s.as_str()),
            last_product_query: snapshot.metadata.get(META_LAST_PRODUCT_QUERY).map(|s| s.as_str()),
            last_outlet_query: snapshot.metadata.get(META_LAST_OUTLET_QUERY).map(|s| s.as_str()),
            has_prior_turns: !snapshot.turns.is_empty(),
        };

        let decision = planner::decide(&request.question, &context, &self.known_locations);
        tracing::info!(
            action = decision.primary_action.as_str(),
            confidence = decision.confidence,
            "planner decision"
        );

        let (answer, outcome) = if decision.primary_action == PrimaryAction::Clarify {
            (decision.clarification_prompt.clone().unwrap_or_default(), ToolOutcome::default())
        } else {
            let outcome = self.dispatch(&request.question, &decision).await;
            let answer = self.complete(&request.question, &decision, &outcome, &snapshot.turns).await;
            (answer, outcome)
        };

        self.persist_turn(&session_id, &request.question, &answer, &decision).await;

        ResponseEnvelope {
            response: answer,
            session_id,
            calculation_result: outcome.calc.clone(),
            product_count: product_count(&outcome.products),
            outlet_count: outlet_count(&outcome.outlet),
            planning_info: decision,
        }
    }

    /// Total match over every `PrimaryAction` variant, per spec.md §9's
    /// dispatch-completeness design note: no default arm.
    async fn dispatch(&self, question: &str, decision: &Decision) -> ToolOutcome {
        match decision.primary_action {
            PrimaryAction::Calculate => ToolOutcome { calc: Some(calculator::parse_and_calculate(question)), ..Default::default() },
            PrimaryAction::SearchProducts => {
                let sort_key = sort_key_from_plan(&decision.plan);
                let matches = self.product_index.search_sorted(question, crate::search::DEFAULT_K, sort_key).await;
                ToolOutcome { products: Some(matches), ..Default::default() }
            }
            PrimaryAction::SearchOutlets => ToolOutcome { outlet: Some(self.outlet_gate.answer(question).await), ..Default::default() },
            PrimaryAction::Hybrid => {
                let want_calc = decision.plan.iter().any(|s| matches!(s, PlanStep::Calculate));
                let want_products = decision.plan.iter().any(|s| matches!(s, PlanStep::SearchProducts { .. }));
                let want_outlets = decision.plan.iter().any(|s| matches!(s, PlanStep::SearchOutlets));
                let sort_key = sort_key_from_plan(&decision.plan);

                let products_fut = async {
                    if want_products {
                        Some(self.product_index.search_sorted(question, crate::search::DEFAULT_K, sort_key).await)
                    } else {
                        None
                    }
                };
                let outlets_fut = async {
                    if want_outlets {
                        Some(self.outlet_gate.answer(question).await)
                    } else {
                        None
                    }
                };
                let (products, outlet) = tokio::join!(products_fut, outlets_fut);
                let calc = if want_calc { Some(calculator::parse_and_calculate(question)) } else { None };
                ToolOutcome { calc, products, outlet }
            }
            PrimaryAction::Clarify => ToolOutcome::default(),
            PrimaryAction::AnswerDirectly => ToolOutcome::default(),
        }
    }

    async fn complete(&self, question: &str, decision: &Decision, outcome: &ToolOutcome, history: &[Turn]) -> String {
        let mut context_blocks = Vec::new();

        if let Some(calc) = &outcome.calc {
            context_blocks.push(format_calc_block(calc));
        }
        if let Some(products) = &outcome.products {
            context_blocks.push(format_product_block(products));
        }
        if let Some(outlet) = &outcome.outlet {
            context_blocks.push(format!("Outlet lookup result:\n{}", outlet.formatted_text));
        }

        let mut prompt = String::new();
        for (i, turn) in history.iter().enumerate() {
            prompt.push_str(&format!("Turn {}:\nUser: {}\nAssistant: {}\n\n", i + 1, turn.user_utterance, turn.assistant_utterance));
        }
        if !context_blocks.is_empty() {
            prompt.push_str("Retrieved context:\n");
            prompt.push_str(&context_blocks.join("\n\n"));
            prompt.push_str("\n\n");
        }
        prompt.push_str(&format!("Question: {}", question));

        let request = LlmRequest::new(prompt).with_system(SYSTEM_PROMPT);
        match self.llm.complete(request).await {
            Ok(response) => response.content,
            Err(e) => {
                tracing::warn!("language-model completion failed, degrading: {}", e);
                degraded_answer(decision, outcome)
            }
        }
    }

    async fn persist_turn(&self, session_id: &str, question: &str, answer: &str, decision: &Decision) {
        self.sessions
            .append_turn(
                session_id,
                Turn { user_utterance: question.to_string(), assistant_utterance: answer.to_string(), decision: decision.clone(), timestamp: Utc::now() },
            )
            .await;

        self.sessions.update_metadata(session_id, META_LAST_PRIMARY_ACTION, decision.primary_action.as_str()).await;

        if matches!(decision.primary_action, PrimaryAction::SearchProducts | PrimaryAction::Hybrid) && decision.product_keywords_hit {
            self.sessions.update_metadata(session_id, META_LAST_PRODUCT_QUERY, question).await;
        }
        if matches!(decision.primary_action, PrimaryAction::SearchOutlets | PrimaryAction::Hybrid) && decision.outlet_keywords_hit {
            self.sessions.update_metadata(session_id, META_LAST_OUTLET_QUERY, question).await;
        }
    }
}

fn sort_key_from_plan(plan: &[PlanStep]) -> Option<SortKey> {
    plan.iter().find_map(|step| match step {
        PlanStep::SearchProducts { sort_key: Some(key) } => sort_key_from_str(key),
        _ => None,
    })
}

fn sort_key_from_str(s: &str) -> Option<SortKey> {
    match s {
        "cheapest" => Some(SortKey::Cheapest),
        "most_expensive" => Some(SortKey::MostExpensive),
        "largest" => Some(SortKey::Largest),
        "smallest" => Some(SortKey::Smallest),
        _ => None,
    }
}

fn format_calc_block(calc: &CalcResult) -> String {
    if calc.ok {
        format!("Calculation: {} = {}", calc.expression, calc.formatted.as_deref().unwrap_or_default())
    } else {
        format!(
            "Calculation failed ({:?}): {}",
            calc.error_kind,
            calc.error_message.as_deref().unwrap_or("unknown error")
        )
    }
}

fn format_product_block(matches: &[ProductMatch]) -> String {
    if matches.is_empty() {
        return "No matching products found.".to_string();
    }
    matches
        .iter()
        .map(|m| {
            let capacity = m.product.capacity_ml.map(|c| format!(", {}ml", c)).unwrap_or_default();
            format!("- {} (${:.2}{}): {}", m.product.name, m.product.price, capacity, m.product.description)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Built when the language model call fails: surfaces what was attempted
/// rather than an opaque failure, per spec.md §7's degradation policy.
fn degraded_answer(decision: &Decision, outcome: &ToolOutcome) -> String {
    let mut parts = vec![format!("I attempted to {}", decision.primary_action.as_str())];
    if let Some(calc) = &outcome.calc {
        parts.push(format_calc_block(calc));
    }
    if let Some(products) = &outcome.products {
        parts.push(format_product_block(products));
    }
    if let Some(outlet) = &outcome.outlet {
        parts.push(outlet.formatted_text.clone());
    }
    parts.push("but couldn't reach the language model to compose a final answer.".to_string());
    parts.join(" ")
}

/// Helpers used by the Boundary to derive the counts spec.md §3's envelope
/// calls for without re-running tool dispatch.
pub fn product_count(matches: &Option<Vec<ProductMatch>>) -> Option<usize> {
    matches.as_ref().map(|m| m.len())
}

pub fn outlet_count(answer: &Option<OutletAnswer>) -> Option<usize> {
    answer.as_ref().map(|a| a.count)
}
