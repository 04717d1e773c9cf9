//! Outlet SQL Gate (C3)
//!
//! Turns a natural-language outlet question into a single validated SELECT
//! against the fixed `outlets` schema, executes it read-only, and formats
//! the rows. Never hands the language model direct SQL execution access —
//! the Gate is the only thing that touches the pool.

mod validate;

use std::time::Duration;

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};

use crate::error::Result;
use crate::llm::{LlmClient, LlmRequest};

pub use validate::validate_statement;

pub const DEFAULT_ROW_LIMIT: i64 = 20;
pub const SQL_TIMEOUT_SECS: u64 = 5;

const COUNT_INTENT_WORDS: &[&str] = &["how many", "count", "number of"];

const SCHEMA_PROMPT: &str = r#"You translate a natural-language question about retail outlets into a single PostgreSQL SELECT statement.

Schema:
outlets(id bigint primary key, name text, address text, city text, state text, postal_code text, maps_url text, location_category text, source text, fetched_at timestamp)

Rules:
- Output ONLY the SQL statement, nothing else.
- The statement MUST start with SELECT.
- The statement MUST reference only the outlets table.
- Never use INSERT, UPDATE, DELETE, DROP, ALTER, CREATE, or GRANT.
- Do not include more than one statement; a single trailing semicolon is allowed.
- Use LIMIT to bound row lists when the question does not ask for a count."#;

/// Shape of the Gate's answer; `kind` disambiguates which other fields
/// are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutletAnswerKind {
    List,
    Count,
    Single,
    Empty,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutletRow(pub serde_json::Map<String, serde_json::Value>);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutletAnswer {
    pub kind: OutletAnswerKind,
    pub rows: Vec<OutletRow>,
    pub count: usize,
    pub formatted_text: String,
    pub sql: String,
}

impl OutletAnswer {
    fn error(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            kind: OutletAnswerKind::Error,
            rows: Vec::new(),
            count: 0,
            formatted_text: message.into(),
            sql: sql.into(),
        }
    }
}

fn is_count_intent(question: &str) -> bool {
    let lower = question.to_lowercase();
    COUNT_INTENT_WORDS.iter().any(|w| lower.contains(w))
}

/// The Outlet SQL Gate.
pub struct OutletGate {
    pool: PgPool,
    llm: std::sync::Arc<dyn LlmClient>,
}

impl OutletGate {
    pub fn new(pool: PgPool, llm: std::sync::Arc<dyn LlmClient>) -> Self {
        Self { pool, llm }
    }

    /// Answer a natural-language outlet question, per spec.md §4.3's
    /// five-step algorithm.
    pub async fn answer(&self, question: &str) -> OutletAnswer {
        let count_intent = is_count_intent(question);

        let sql = match self.generate_sql(question, count_intent, None).await {
            Ok(sql) => sql,
            Err(e) => return OutletAnswer::error(format!("could not generate a query: {}", e), String::new()),
        };

        if let Err(reason) = validate_statement(&sql) {
            return OutletAnswer::error(format!("generated query failed validation: {}", reason), sql);
        }

        match self.execute(&sql).await {
            Ok(answer) => answer,
            Err(first_err) => {
                tracing::warn!("outlet query failed, regenerating once: {}", first_err);
                let retry_sql = match self
                    .generate_sql(question, count_intent, Some(&first_err.to_string()))
                    .await
                {
                    Ok(sql) => sql,
                    Err(e) => {
                        return OutletAnswer::error(
                            format!("we couldn't look that up right now: {}", e),
                            sql,
                        )
                    }
                };
                if let Err(reason) = validate_statement(&retry_sql) {
                    return OutletAnswer::error(
                        format!("regenerated query failed validation: {}", reason),
                        retry_sql,
                    );
                }
                match self.execute(&retry_sql).await {
                    Ok(answer) => answer,
                    Err(_) => OutletAnswer::error(
                        "we couldn't look that up right now, please try rephrasing".to_string(),
                        retry_sql,
                    ),
                }
            }
        }
    }

    async fn generate_sql(&self, question: &str, count_intent: bool, error_context: Option<&str>) -> Result<String> {
        let mut prompt = format!("Question: {}\n", question);
        if count_intent {
            prompt.push_str("This question asks for a count; prefer a COUNT(*) shape.\n");
        } else {
            prompt.push_str(&format!("Limit row lists to {} rows.\n", DEFAULT_ROW_LIMIT));
        }
        if let Some(err) = error_context {
            prompt.push_str(&format!("The previous attempt failed with: {}\nFix the query.\n", err));
        }

        let request = LlmRequest::new(prompt).with_system(SCHEMA_PROMPT);
        let response = self.llm.complete(request).await?;
        Ok(extract_sql(&response.content))
    }

    async fn execute(&self, sql: &str) -> Result<OutletAnswer> {
        let rows = tokio::time::timeout(Duration::from_secs(SQL_TIMEOUT_SECS), sqlx::query(sql).fetch_all(&self.pool))
            .await
            .map_err(|_| crate::error::Error::ResourceExhausted("outlet query exceeded deadline".into()))??;

        let json_rows: Vec<OutletRow> = rows.iter().map(row_to_json).collect();

        let kind = if json_rows.is_empty() {
            OutletAnswerKind::Empty
        } else if is_count_result(&json_rows) {
            OutletAnswerKind::Count
        } else if json_rows.len() == 1 {
            OutletAnswerKind::Single
        } else {
            OutletAnswerKind::List
        };

        let formatted_text = format_rows(&kind, &json_rows);
        let count = json_rows.len();

        Ok(OutletAnswer { kind, rows: json_rows, count, formatted_text, sql: sql.to_string() })
    }
}

fn is_count_result(rows: &[OutletRow]) -> bool {
    rows.len() == 1
        && rows[0].0.len() == 1
        && rows[0]
            .0
            .keys()
            .next()
            .map(|k| k.to_lowercase().contains("count"))
            .unwrap_or(false)
}

fn format_rows(kind: &OutletAnswerKind, rows: &[OutletRow]) -> String {
    match kind {
        OutletAnswerKind::Empty => "No outlets matched that question.".to_string(),
        OutletAnswerKind::Count => {
            let value = rows[0].0.values().next().cloned().unwrap_or(serde_json::Value::Null);
            format!("{}", value)
        }
        _ => rows
            .iter()
            .map(|row| {
                let name = row.0.get("name").and_then(|v| v.as_str()).unwrap_or("(unnamed outlet)");
                let address = row.0.get("address").and_then(|v| v.as_str());
                let maps_url = row.0.get("maps_url").and_then(|v| v.as_str());
                let mut line = name.to_string();
                if let Some(address) = address {
                    line.push_str(" — ");
                    line.push_str(address);
                }
                if let Some(maps_url) = maps_url {
                    line.push_str(" (");
                    line.push_str(maps_url);
                    line.push(')');
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

fn row_to_json(row: &sqlx::postgres::PgRow) -> OutletRow {
    use sqlx::Column;
    let mut obj = serde_json::Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        let name = col.name();
        let value = read_cell(row, i);
        obj.insert(name.to_string(), value);
    }
    OutletRow(obj)
}

fn read_cell(row: &sqlx::postgres::PgRow, i: usize) -> serde_json::Value {
    if let Ok(v) = row.try_get::<Option<String>, _>(i) {
        return v.map(serde_json::Value::String).unwrap_or(serde_json::Value::Null);
    }
    if let Ok(v) = row.try_get::<i64, _>(i) {
        return serde_json::json!(v);
    }
    if let Ok(v) = row.try_get::<i32, _>(i) {
        return serde_json::json!(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(i) {
        return serde_json::json!(v);
    }
    if let Ok(v) = row.try_get::<chrono::NaiveDateTime, _>(i) {
        return serde_json::json!(v.to_string());
    }
    serde_json::Value::Null
}

/// Strip Markdown code fences the language model sometimes wraps its SQL
/// in, and take the first statement verbatim otherwise.
fn extract_sql(content: &str) -> String {
    let trimmed = content.trim();
    if let Some(stripped) = trimmed.strip_prefix("```sql") {
        return stripped.trim_end_matches("```").trim().to_string();
    }
    if let Some(stripped) = trimmed.strip_prefix("```") {
        return stripped.trim_end_matches("```").trim().to_string();
    }
    trimmed.to_string()
}
