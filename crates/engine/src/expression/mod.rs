//! Expression engine — parses and evaluates `{{ ... }}` templates embedded
//! in node configuration strings.
//!
//! Expressions can reference prior node outputs using `$node["Name"]`,
//! chain property/array access, and combine arithmetic and comparison
//! operators. A template that is exactly one `{{expr}}` region evaluates to
//! the expression's native type; mixed templates evaluate each region and
//! concatenate the results as strings.
//!
//! Resolution failures (unresolved references, bad access, syntax errors)
//! always propagate to the caller; the orchestrator turns them into failed
//! node executions.

mod ast;
mod eval;
mod lexer;
mod parser;

use serde_json::Value;
use thiserror::Error;

use nodes::{ExecutionContext, NodeState};

pub use ast::{BinOp, Expr};

/// Errors produced while resolving a template.
#[derive(Debug, Error, Clone)]
pub enum ExpressionError {
    /// The expression text could not be parsed.
    #[error("syntax error in expression '{expression}': {message}")]
    Syntax { expression: String, message: String },

    /// `$node["X"]` referenced a node absent from the context (not yet
    /// executed, failed upstream, or a typo).
    #[error("unresolved reference to node '{node_name}' in expression '{expression}'")]
    UnresolvedReference {
        node_name: String,
        expression: String,
    },

    /// The expression parsed but could not be evaluated.
    #[error("failed to evaluate expression '{expression}': {message}")]
    Eval { expression: String, message: String },
}

/// Whether a string contains at least one `{{ ... }}` region.
pub fn has_expression(text: &str) -> bool {
    split_template(text)
        .iter()
        .any(|s| matches!(s, Segment::Expr(_)))
}

/// Parse and evaluate a bare expression body (no `{{ }}` markers).
pub fn evaluate_expression(
    expression: &str,
    ctx: &ExecutionContext,
) -> Result<Value, ExpressionError> {
    let expr = parser::parse(expression)?;
    eval::evaluate(&expr, ctx, expression)
}

/// Resolve a template string against the context.
///
/// - No `{{`/`}}` markers: the string is returned unchanged.
/// - Exactly one region and nothing else (modulo surrounding whitespace):
///   the expression's native value.
/// - Mixed literal text and regions: each region is evaluated, stringified,
///   and concatenated with the literals.
pub fn resolve(template: &str, ctx: &ExecutionContext) -> Result<Value, ExpressionError> {
    let trimmed = template.trim();
    let segments = split_template(trimmed);

    if let [Segment::Expr(expression)] = segments.as_slice() {
        return evaluate_expression(expression, ctx);
    }

    if !segments.iter().any(|s| matches!(s, Segment::Expr(_))) {
        return Ok(Value::String(template.to_owned()));
    }

    let mut out = String::new();
    for segment in split_template(template) {
        match segment {
            Segment::Literal(text) => out.push_str(&text),
            Segment::Expr(expression) => {
                let value = evaluate_expression(&expression, ctx)?;
                out.push_str(&eval::to_display_string(&value));
            }
        }
    }
    Ok(Value::String(out))
}

/// Resolve any value: strings go through [`resolve`], objects and arrays are
/// walked recursively, everything else passes through untouched.
pub fn resolve_value(value: &Value, ctx: &ExecutionContext) -> Result<Value, ExpressionError> {
    match value {
        Value::String(s) => resolve(s, ctx),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (key, v) in map {
                out.insert(key.clone(), resolve_value(v, ctx)?);
            }
            Ok(Value::Object(out))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(resolve_value(item, ctx)?);
            }
            Ok(Value::Array(out))
        }
        other => Ok(other.clone()),
    }
}

/// Resolve every field of a node's state mapping in one pass.
///
/// The first failing field aborts the whole resolution — partial results
/// are never exposed.
pub fn resolve_state(state: &NodeState, ctx: &ExecutionContext) -> Result<NodeState, ExpressionError> {
    let mut out = NodeState::new();
    for (key, value) in state {
        out.insert(key.clone(), resolve_value(value, ctx)?);
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Template segmentation
// ---------------------------------------------------------------------------

#[derive(Debug, PartialEq)]
enum Segment {
    Literal(String),
    Expr(String),
}

/// Split a template into literal and `{{expr}}` segments.
///
/// Regions are matched non-greedily; an unterminated `{{` is treated as
/// literal text.
fn split_template(template: &str) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        match rest[open + 2..].find("}}") {
            Some(close) => {
                if open > 0 {
                    segments.push(Segment::Literal(rest[..open].to_owned()));
                }
                let body = &rest[open + 2..open + 2 + close];
                segments.push(Segment::Expr(body.trim().to_owned()));
                rest = &rest[open + 2 + close + 2..];
            }
            None => break,
        }
    }

    if !rest.is_empty() {
        segments.push(Segment::Literal(rest.to_owned()));
    }
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn input_ctx() -> ExecutionContext {
        let mut outputs = BTreeMap::new();
        outputs.insert(
            "Input".to_owned(),
            json!({ "data": { "name": "John", "age": 30 } }),
        );
        ExecutionContext::new(Uuid::new_v4(), Uuid::new_v4(), outputs)
    }

    #[test]
    fn plain_string_passes_through_unchanged() {
        let v = resolve("no expressions here", &input_ctx()).unwrap();
        assert_eq!(v, json!("no expressions here"));
    }

    #[test]
    fn single_region_evaluates_to_native_type() {
        let v = resolve(r#"{{$node["Input"].data.age}}"#, &input_ctx()).unwrap();
        assert_eq!(v, json!(30));
        assert!(v.is_i64(), "expected native integer, not a string");
    }

    #[test]
    fn single_region_with_surrounding_whitespace_is_still_native() {
        let v = resolve(r#"  {{ $node["Input"].data.age }}  "#, &input_ctx()).unwrap();
        assert_eq!(v, json!(30));
    }

    #[test]
    fn mixed_template_concatenates_as_string() {
        let v = resolve(r#"Name: {{$node["Input"].data.name}}"#, &input_ctx()).unwrap();
        assert_eq!(v, json!("Name: John"));
    }

    #[test]
    fn multiple_regions_in_one_template() {
        let v = resolve(
            r#"{{$node["Input"].data.name}} is {{$node["Input"].data.age}}"#,
            &input_ctx(),
        )
        .unwrap();
        assert_eq!(v, json!("John is 30"));
    }

    #[test]
    fn arithmetic_precedence() {
        let v = resolve("{{2 + 3 * 4}}", &input_ctx()).unwrap();
        assert_eq!(v, json!(14));
    }

    #[test]
    fn comparison_yields_native_boolean() {
        let v = resolve(r#"{{$node["Input"].data.age >= 18}}"#, &input_ctx()).unwrap();
        assert_eq!(v, json!(true));
    }

    #[test]
    fn unresolved_reference_propagates() {
        let err = resolve(r#"{{$node["Missing"].data}}"#, &input_ctx()).unwrap_err();
        assert!(matches!(
            err,
            ExpressionError::UnresolvedReference { node_name, .. } if node_name == "Missing"
        ));
    }

    #[test]
    fn unterminated_region_is_literal_text() {
        let v = resolve("broken {{ template", &input_ctx()).unwrap();
        assert_eq!(v, json!("broken {{ template"));
    }

    #[test]
    fn resolve_state_walks_nested_structures() {
        let mut state = NodeState::new();
        state.insert("fullName".into(), json!(r#"{{$node["Input"].data.name}}"#));
        state.insert(
            "nested".into(),
            json!({
                "isAdult": r#"{{$node["Input"].data.age >= 18}}"#,
                "tags": ["static", r#"{{$node["Input"].data.name}}"#],
            }),
        );
        state.insert("count".into(), json!(7));

        let resolved = resolve_state(&state, &input_ctx()).unwrap();
        assert_eq!(resolved["fullName"], json!("John"));
        assert_eq!(resolved["nested"]["isAdult"], json!(true));
        assert_eq!(resolved["nested"]["tags"], json!(["static", "John"]));
        // Non-string values pass through untouched.
        assert_eq!(resolved["count"], json!(7));
    }

    #[test]
    fn resolve_state_fails_whole_pass_on_first_error() {
        let mut state = NodeState::new();
        state.insert("good".into(), json!("literal"));
        state.insert("bad".into(), json!(r#"{{$node["Ghost"].data}}"#));

        assert!(resolve_state(&state, &input_ctx()).is_err());
    }

    #[test]
    fn error_messages_retain_the_failing_expression() {
        let err = resolve(r#"{{$node["Input"].data.phone}}"#, &input_ctx()).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(r#"$node["Input"].data.phone"#), "got: {msg}");
    }

    #[test]
    fn has_expression_detects_regions() {
        assert!(has_expression("{{1}}"));
        assert!(!has_expression("plain"));
        assert!(!has_expression("unclosed {{"));
    }
}
