//! Calculator — arithmetic intent detection and safe expression evaluation
//!
//! A dedicated recursive-descent parser (via `nom`) evaluates expressions;
//! there is deliberately no general-purpose `eval` facility here. The
//! module performs no I/O and touches no global state, per spec.md §4.1.

mod eval;
mod extract;

use serde::{Deserialize, Serialize};

pub use eval::EvalError;

/// Why an expression failed to produce a result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalcErrorKind {
    NoExpression,
    InvalidChars,
    Syntax,
    DivideByZero,
    Overflow,
    Other,
}

/// Result of attempting to evaluate an arithmetic expression.
///
/// `ok` is always present and tells the client which of the two shapes
/// applies; a `false` result never carries `value`/`formatted`, and a
/// `true` result never carries `error_kind`/`error_message` (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalcResult {
    pub ok: bool,
    pub expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<CalcErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl CalcResult {
    fn ok(expression: String, value: f64) -> Self {
        Self {
            ok: true,
            expression,
            value: Some(value),
            formatted: Some(format_value(value)),
            error_kind: None,
            error_message: None,
        }
    }

    fn err(expression: String, error_kind: CalcErrorKind, error_message: impl Into<String>) -> Self {
        Self {
            ok: false,
            expression,
            value: None,
            formatted: None,
            error_kind: Some(error_kind),
            error_message: Some(error_message.into()),
        }
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}

/// Format a finite f64 the way a user would expect to read it: integral
/// values print without a trailing ".0", everything else keeps up to 10
/// significant decimal digits with trailing zeros trimmed.
fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        let s = format!("{:.10}", value);
        let trimmed = s.trim_end_matches('0').trim_end_matches('.');
        trimmed.to_string()
    }
}

/// Closed set of arithmetic trigger words recognized alongside raw operators
pub(crate) const WORD_TRIGGERS: &[&str] = &[
    "plus",
    "minus",
    "times",
    "multiplied by",
    "divided by",
    "over",
    "modulo",
    "to the power of",
    "calculate",
    "compute",
    "what is",
    "equals",
];

/// Result of arithmetic-intent detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentDetection {
    pub has_intent: bool,
    pub reason: String,
}

/// Detect whether `text` carries a recognizable arithmetic intent, per
/// spec.md §4.1: either two or more numeric tokens separated by an
/// operator, or a number paired with a word trigger from the closed set.
pub fn detect_intent(text: &str) -> IntentDetection {
    let lower = text.to_lowercase();

    if extract::has_math_expression(&lower) {
        return IntentDetection {
            has_intent: true,
            reason: "found a bare numeric expression with an operator".to_string(),
        };
    }

    let has_numbers = extract::has_number(&lower);
    if has_numbers {
        if let Some(word) = WORD_TRIGGERS.iter().find(|w| lower.contains(*w)) {
            return IntentDetection {
                has_intent: true,
                reason: format!("found trigger word '{}' alongside a number", word),
            };
        }
    }

    IntentDetection {
        has_intent: false,
        reason: "no operator-linked numbers or trigger word found".to_string(),
    }
}

/// Extract a canonical expression from `text` and evaluate it, per the
/// extraction rules and evaluation contract in spec.md §4.1.
pub fn parse_and_calculate(text: &str) -> CalcResult {
    let expression = match extract::extract_expression(text) {
        Some(expr) => expr,
        None => {
            return CalcResult::err(
                String::new(),
                CalcErrorKind::NoExpression,
                "no arithmetic expression could be extracted from the question",
            )
        }
    };

    if let Some(bad_char) = expression.chars().find(|c| !is_allowed_char(*c)) {
        return CalcResult::err(
            expression.clone(),
            CalcErrorKind::InvalidChars,
            format!("expression contains a disallowed character: '{}'", bad_char),
        );
    }

    match eval::evaluate(&expression) {
        Ok(value) => CalcResult::ok(expression, value),
        Err(EvalError::Syntax(msg)) => CalcResult::err(expression, CalcErrorKind::Syntax, msg),
        Err(EvalError::DivideByZero) => {
            CalcResult::err(expression, CalcErrorKind::DivideByZero, "division by zero")
        }
        Err(EvalError::Overflow) => {
            CalcResult::err(expression, CalcErrorKind::Overflow, "result out of representable range")
        }
    }
}

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_digit() || " .+-*/%()".contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_intent_bare_expression() {
        let d = detect_intent("what is 5 + 3");
        assert!(d.has_intent);
    }

    #[test]
    fn test_detect_intent_word_trigger() {
        let d = detect_intent("what is 5 plus 3");
        assert!(d.has_intent);
    }

    #[test]
    fn test_detect_intent_no_numbers() {
        let d = detect_intent("show me tumblers");
        assert!(!d.has_intent);
    }

    #[test]
    fn test_calculate_addition() {
        let result = parse_and_calculate("what is 5 plus 3");
        assert!(result.ok);
        assert_eq!(result.value, Some(8.0));
        assert_eq!(result.expression, "5 + 3");
    }

    #[test]
    fn test_calculate_divide_by_zero() {
        let result = parse_and_calculate("what is 100 divided by 0");
        assert!(!result.ok);
        assert_eq!(result.error_kind, Some(CalcErrorKind::DivideByZero));
        assert!(result.value().is_none());
    }

    #[test]
    fn test_calculate_no_expression() {
        let result = parse_and_calculate("hello there");
        assert!(!result.ok);
        assert_eq!(result.error_kind, Some(CalcErrorKind::NoExpression));
    }

    #[test]
    fn test_calculate_operator_precedence() {
        let result = parse_and_calculate("2 + 3 * 4");
        assert_eq!(result.value(), Some(14.0));
    }

    #[test]
    fn test_calculate_power_right_assoc_and_unary_precedence() {
        // `**` binds tighter than unary minus: -2 ** 2 == -(2 ** 2) == -4
        let result = parse_and_calculate("-2 ** 2");
        assert_eq!(result.value(), Some(-4.0));
    }

    #[test]
    fn test_calculate_word_replacement() {
        let result = parse_and_calculate("compute 10 multiplied by 2");
        assert_eq!(result.value(), Some(20.0));
    }

    #[test]
    fn test_format_roundtrip() {
        let result = parse_and_calculate("7 / 2");
        assert!(result.ok);
        let formatted = result.formatted.clone().unwrap();
        let reparsed = parse_and_calculate(&formatted);
        assert_eq!(reparsed.value(), result.value());
    }
}
