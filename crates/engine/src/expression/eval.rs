//! Tree-walking evaluator over `serde_json::Value`.

use serde_json::Value;

use nodes::ExecutionContext;

use super::ast::{BinOp, Expr};
use super::ExpressionError;

/// Evaluate a parsed expression against the execution context.
///
/// `expression` is the original source text, retained on every error so the
/// failing template is identifiable after the fact.
pub fn evaluate(
    expr: &Expr,
    ctx: &ExecutionContext,
    expression: &str,
) -> Result<Value, ExpressionError> {
    match expr {
        Expr::Literal(v) => Ok(v.clone()),

        Expr::NodeRef(name) => match ctx.output(name) {
            Some(v) => Ok(v.clone()),
            None => Err(ExpressionError::UnresolvedReference {
                node_name: name.clone(),
                expression: expression.to_owned(),
            }),
        },

        Expr::Field { base, name } => {
            let base = evaluate(base, ctx, expression)?;
            match &base {
                Value::Object(map) => map.get(name).cloned().ok_or_else(|| {
                    eval_error(expression, format!("object has no property '{name}'"))
                }),
                other => Err(eval_error(
                    expression,
                    format!(
                        "cannot access property '{name}' on {} value",
                        type_name(other)
                    ),
                )),
            }
        }

        Expr::Index { base, index } => {
            let base = evaluate(base, ctx, expression)?;
            let index = evaluate(index, ctx, expression)?;
            match (&base, &index) {
                (Value::Array(items), Value::Number(n)) => {
                    let i = n.as_i64().ok_or_else(|| {
                        eval_error(expression, format!("array index must be an integer, got {n}"))
                    })?;
                    let len = items.len();
                    usize::try_from(i)
                        .ok()
                        .and_then(|i| items.get(i))
                        .cloned()
                        .ok_or_else(|| {
                            eval_error(
                                expression,
                                format!("array index {i} out of range (length {len})"),
                            )
                        })
                }
                (Value::Object(map), Value::String(key)) => {
                    map.get(key).cloned().ok_or_else(|| {
                        eval_error(expression, format!("object has no property '{key}'"))
                    })
                }
                (other, Value::Number(_) | Value::String(_)) => Err(eval_error(
                    expression,
                    format!("cannot index into {} value", type_name(other)),
                )),
                (_, other) => Err(eval_error(
                    expression,
                    format!("invalid index of type {}", type_name(other)),
                )),
            }
        }

        Expr::Neg(inner) => {
            let v = evaluate(inner, ctx, expression)?;
            match number_of(&v) {
                Some(Num::Int(i)) => i.checked_neg().map(Value::from).ok_or_else(|| {
                    eval_error(expression, "integer overflow negating value".to_owned())
                }),
                Some(Num::Float(f)) => Ok(Value::from(-f)),
                None => Err(eval_error(
                    expression,
                    format!("cannot negate {} value", type_name(&v)),
                )),
            }
        }

        Expr::Binary { left, op, right } => {
            let lhs = evaluate(left, ctx, expression)?;
            let rhs = evaluate(right, ctx, expression)?;
            apply_binary(&lhs, *op, &rhs, expression)
        }
    }
}

/// Stringify a value for mixed-template substitution and `+` concatenation.
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        // Compact JSON for structured values.
        other => other.to_string(),
    }
}

enum Num {
    Int(i64),
    Float(f64),
}

fn number_of(v: &Value) -> Option<Num> {
    match v {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Num::Int(i))
            } else {
                n.as_f64().map(Num::Float)
            }
        }
        _ => None,
    }
}

fn as_f64(v: &Value) -> Option<f64> {
    v.as_f64()
}

fn eval_error(expression: &str, message: String) -> ExpressionError {
    ExpressionError::Eval {
        expression: expression.to_owned(),
        message,
    }
}

fn apply_binary(
    lhs: &Value,
    op: BinOp,
    rhs: &Value,
    expression: &str,
) -> Result<Value, ExpressionError> {
    match op {
        BinOp::Add => {
            // `+` concatenates when either operand is a string.
            if lhs.is_string() || rhs.is_string() {
                return Ok(Value::String(format!(
                    "{}{}",
                    to_display_string(lhs),
                    to_display_string(rhs)
                )));
            }
            arithmetic(lhs, op, rhs, expression)
        }
        BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => arithmetic(lhs, op, rhs, expression),

        BinOp::Eq => Ok(Value::Bool(values_equal(lhs, rhs))),
        BinOp::Ne => Ok(Value::Bool(!values_equal(lhs, rhs))),

        BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
            let ordering = match (lhs, rhs) {
                (Value::Number(_), Value::Number(_)) => {
                    let (a, b) = (as_f64(lhs).unwrap_or(f64::NAN), as_f64(rhs).unwrap_or(f64::NAN));
                    a.partial_cmp(&b).ok_or_else(|| {
                        eval_error(expression, "cannot order NaN values".to_owned())
                    })?
                }
                (Value::String(a), Value::String(b)) => a.cmp(b),
                _ => {
                    return Err(eval_error(
                        expression,
                        format!(
                            "cannot compare {} with {} using '{}'",
                            type_name(lhs),
                            type_name(rhs),
                            op.symbol()
                        ),
                    ));
                }
            };
            let result = match op {
                BinOp::Lt => ordering.is_lt(),
                BinOp::Le => ordering.is_le(),
                BinOp::Gt => ordering.is_gt(),
                BinOp::Ge => ordering.is_ge(),
                _ => unreachable!(),
            };
            Ok(Value::Bool(result))
        }
    }
}

/// Deep equality; numbers compare by value regardless of int/float encoding.
fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs, rhs) {
        (Value::Number(a), Value::Number(b)) => {
            // Exact integer comparison first: f64 loses precision above
            // 2^53, which would make distinct large integers compare equal.
            match (a.as_i64(), b.as_i64()) {
                (Some(a), Some(b)) => a == b,
                _ => as_f64(lhs) == as_f64(rhs),
            }
        }
        _ => lhs == rhs,
    }
}

fn arithmetic(
    lhs: &Value,
    op: BinOp,
    rhs: &Value,
    expression: &str,
) -> Result<Value, ExpressionError> {
    let (a, b) = match (number_of(lhs), number_of(rhs)) {
        (Some(a), Some(b)) => (a, b),
        _ => {
            return Err(eval_error(
                expression,
                format!(
                    "operator '{}' requires numeric operands, got {} and {}",
                    op.symbol(),
                    type_name(lhs),
                    type_name(rhs)
                ),
            ));
        }
    };

    // Integer arithmetic stays integral except for `/`, which always
    // produces a float (matching the source system's semantics).
    if let (Num::Int(a), Num::Int(b)) = (&a, &b) {
        let (a, b) = (*a, *b);
        let checked = match op {
            BinOp::Add => Some(a.checked_add(b)),
            BinOp::Sub => Some(a.checked_sub(b)),
            BinOp::Mul => Some(a.checked_mul(b)),
            BinOp::Rem => {
                if b == 0 {
                    return Err(eval_error(expression, "modulo by zero".to_owned()));
                }
                Some(a.checked_rem(b))
            }
            BinOp::Div => None, // fall through to float division
            _ => unreachable!(),
        };
        if let Some(result) = checked {
            return result.map(Value::from).ok_or_else(|| {
                eval_error(
                    expression,
                    format!("integer overflow applying '{}'", op.symbol()),
                )
            });
        }
    }

    let (a, b) = (
        match a {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        },
        match b {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        },
    );

    let result = match op {
        BinOp::Add => a + b,
        BinOp::Sub => a - b,
        BinOp::Mul => a * b,
        BinOp::Div => {
            if b == 0.0 {
                return Err(eval_error(expression, "division by zero".to_owned()));
            }
            a / b
        }
        BinOp::Rem => {
            if b == 0.0 {
                return Err(eval_error(expression, "modulo by zero".to_owned()));
            }
            a % b
        }
        _ => unreachable!(),
    };
    Ok(Value::from(result))
}

fn type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
