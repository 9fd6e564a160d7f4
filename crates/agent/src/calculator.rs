//! Safe arithmetic over conversational input.
//!
//! Messages arrive as prose ("Can you calc 1 + 2?"), so evaluation first
//! strips everything outside the arithmetic alphabet, then runs a small
//! recursive descent parser over what remains. No names, no functions,
//! no dynamic evaluation of any kind.

use std::fmt;

use async_trait::async_trait;
use serde_json::json;

use crate::tools::{Tool, ToolContext, ToolResponse};

const ALLOWED_CHARS: &str = "0123456789+-*/(). ";
const BANNED_SEQUENCES: [&str; 2] = ["**", "//"];
const MAX_EXPRESSION_LEN: usize = 128;

#[derive(Debug, Clone, PartialEq)]
pub enum CalcError {
    TooLong,
    Empty,
    BannedSequence(&'static str),
    Syntax(String),
    DivisionByZero,
}

impl fmt::Display for CalcError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong => write!(f, "expression is too long"),
            Self::Empty => write!(f, "no arithmetic expression found"),
            Self::BannedSequence(seq) => write!(f, "sequence {seq:?} is not allowed"),
            Self::Syntax(detail) => write!(f, "invalid expression: {detail}"),
            Self::DivisionByZero => write!(f, "division by zero"),
        }
    }
}

impl std::error::Error for CalcError {}

/// Reduces a free-form message to its arithmetic payload.
///
/// Characters outside the allowed alphabet are dropped rather than
/// rejected so that surrounding words do not break the expression.
pub fn sanitize_expression(raw: &str) -> Result<String, CalcError> {
    if raw.len() > MAX_EXPRESSION_LEN {
        return Err(CalcError::TooLong);
    }
    let kept: String = raw.chars().filter(|c| ALLOWED_CHARS.contains(*c)).collect();
    let kept = kept.trim().to_string();
    if kept.is_empty() {
        return Err(CalcError::Empty);
    }
    for seq in BANNED_SEQUENCES {
        if kept.contains(seq) {
            return Err(CalcError::BannedSequence(seq));
        }
    }
    Ok(kept)
}

/// Evaluates a sanitized expression.
pub fn evaluate(expression: &str) -> Result<f64, CalcError> {
    let mut parser = Parser::new(expression);
    let value = parser.parse_expression()?;
    parser.skip_spaces();
    if !parser.at_end() {
        return Err(CalcError::Syntax(format!(
            "unexpected input at position {}",
            parser.position
        )));
    }
    Ok(value)
}

/// Renders a result the way people write numbers: `3`, not `3.0`.
pub fn format_result(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

struct Parser<'a> {
    input: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            position: 0,
        }
    }

    fn at_end(&self) -> bool {
        self.position >= self.input.len()
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.position).copied()
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.position += 1;
        }
    }

    fn parse_expression(&mut self) -> Result<f64, CalcError> {
        let mut value = self.parse_term()?;
        loop {
            self.skip_spaces();
            match self.peek() {
                Some(b'+') => {
                    self.position += 1;
                    value += self.parse_term()?;
                }
                Some(b'-') => {
                    self.position += 1;
                    value -= self.parse_term()?;
                }
                _ => return Ok(value),
            }
        }
    }

    fn parse_term(&mut self) -> Result<f64, CalcError> {
        let mut value = self.parse_factor()?;
        loop {
            self.skip_spaces();
            match self.peek() {
                Some(b'*') => {
                    self.position += 1;
                    value *= self.parse_factor()?;
                }
                Some(b'/') => {
                    self.position += 1;
                    let divisor = self.parse_factor()?;
                    if divisor == 0.0 {
                        return Err(CalcError::DivisionByZero);
                    }
                    value /= divisor;
                }
                _ => return Ok(value),
            }
        }
    }

    fn parse_factor(&mut self) -> Result<f64, CalcError> {
        self.skip_spaces();
        match self.peek() {
            Some(b'-') => {
                self.position += 1;
                Ok(-self.parse_factor()?)
            }
            Some(b'+') => {
                self.position += 1;
                self.parse_factor()
            }
            Some(b'(') => {
                self.position += 1;
                let value = self.parse_expression()?;
                self.skip_spaces();
                if self.peek() != Some(b')') {
                    return Err(CalcError::Syntax("missing closing parenthesis".into()));
                }
                self.position += 1;
                Ok(value)
            }
            _ => self.parse_number(),
        }
    }

    fn parse_number(&mut self) -> Result<f64, CalcError> {
        let start = self.position;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == b'.') {
            self.position += 1;
        }
        if self.position == start {
            return Err(CalcError::Syntax(format!(
                "expected a number at position {start}"
            )));
        }
        let text = std::str::from_utf8(&self.input[start..self.position])
            .map_err(|_| CalcError::Syntax("invalid number".into()))?;
        text.parse::<f64>()
            .map_err(|_| CalcError::Syntax(format!("invalid number {text:?}")))
    }
}

/// End-to-end helper shared by the tool and the HTTP tool endpoint.
pub fn compute(raw: &str) -> Result<(String, f64), CalcError> {
    let sanitized = sanitize_expression(raw)?;
    let value = evaluate(&sanitized)?;
    Ok((sanitized, value))
}

pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn name(&self) -> &'static str {
        "calculator"
    }

    async fn run(&self, context: ToolContext<'_>) -> anyhow::Result<ToolResponse> {
        let expression = context
            .snapshot
            .slots
            .get("operation")
            .unwrap_or(&context.turn.content);
        match compute(expression) {
            Ok((sanitized, value)) => Ok(ToolResponse::ok(
                format_result(value),
                json!({
                    "expression": sanitized,
                    "result": json_number(value),
                }),
            )),
            Err(err) => {
                tracing::debug!(error = %err, "calculator rejected expression");
                Ok(ToolResponse::failed(
                    "I couldn't compute that expression. Try something like 12 * (3 + 4).",
                    json!({ "error": err.to_string() }),
                ))
            }
        }
    }
}

/// JSON payload form of a result: an integer when the value is whole.
pub fn json_number(value: f64) -> serde_json::Value {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        json!(value as i64)
    } else {
        json!(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kopi_core::{ConversationSnapshot, MessageTurn, TurnRole};

    #[test]
    fn evaluates_basic_arithmetic() {
        let (_, value) = compute("1 + 2").unwrap();
        assert_eq!(value, 3.0);
        let (_, value) = compute("5 * 7").unwrap();
        assert_eq!(value, 35.0);
        let (_, value) = compute("2 * (3 + 4) - 1").unwrap();
        assert_eq!(value, 13.0);
    }

    #[test]
    fn strips_surrounding_prose() {
        let (sanitized, value) = compute("Can you calc 1 + 2?").unwrap();
        assert_eq!(sanitized, "1 + 2");
        assert_eq!(value, 3.0);
    }

    #[test]
    fn handles_decimals_and_unary_minus() {
        let (_, value) = compute("1 / 2").unwrap();
        assert_eq!(value, 0.5);
        let (_, value) = compute("-3 + 5").unwrap();
        assert_eq!(value, 2.0);
    }

    #[test]
    fn rejects_dangling_operator() {
        assert!(matches!(compute("2 + bad"), Err(CalcError::Syntax(_))));
    }

    #[test]
    fn rejects_division_by_zero() {
        assert_eq!(compute("1 / 0"), Err(CalcError::DivisionByZero));
    }

    #[test]
    fn rejects_banned_sequences() {
        assert!(matches!(
            compute("2 ** 3"),
            Err(CalcError::BannedSequence("**"))
        ));
        assert!(matches!(
            compute("7 // 2"),
            Err(CalcError::BannedSequence("//"))
        ));
    }

    #[test]
    fn rejects_oversized_input() {
        let long = "1+".repeat(100);
        assert_eq!(compute(&long), Err(CalcError::TooLong));
    }

    #[test]
    fn rejects_pure_prose() {
        assert_eq!(compute("tell me a joke"), Err(CalcError::Empty));
    }

    #[test]
    fn formats_whole_numbers_without_fraction() {
        assert_eq!(format_result(3.0), "3");
        assert_eq!(format_result(0.5), "0.5");
        assert_eq!(format_result(-14.0), "-14");
    }

    #[tokio::test]
    async fn tool_prefers_operation_slot() {
        let turn = MessageTurn::new("c1", TurnRole::User, "and the answer is?");
        let mut snapshot = ConversationSnapshot::empty("c1");
        snapshot.slots.set("operation", "calc 5 * 7");
        let response = CalculatorTool
            .run(ToolContext {
                turn: &turn,
                snapshot: &snapshot,
            })
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.content, "35");
        assert_eq!(response.data["result"], 35);
    }

    #[tokio::test]
    async fn tool_reports_soft_failure_for_garbage() {
        let turn = MessageTurn::new("c1", TurnRole::User, "calc nothing really");
        let snapshot = ConversationSnapshot::empty("c1");
        let response = CalculatorTool
            .run(ToolContext {
                turn: &turn,
                snapshot: &snapshot,
            })
            .await
            .unwrap();
        assert!(!response.success);
        assert!(response.content.contains("couldn't compute"));
    }
}
