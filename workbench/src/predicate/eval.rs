//! Evaluation of parsed predicate expressions against one collection item.
//!
//! Semantics follow what the collaborator's generated filters assume:
//! a missing field is *undefined*, member access through undefined or null
//! is an evaluation error, truthiness treats `false`/`0`/`""`/`null`/
//! undefined as false, and `==` (unlike `===`) coerces number-ish strings
//! and treats null and undefined as equal.

use serde_json::Value;

use super::parser::{BinOp, Expr, Lit, Method};
use super::PredicateError;

/// An evaluated operand; `None` is the undefined marker.
type Operand = Option<Value>;

pub(super) fn eval_bool(expr: &Expr, item: &Value) -> Result<bool, PredicateError> {
    Ok(truthy(&eval(expr, item)?))
}

fn eval(expr: &Expr, item: &Value) -> Result<Operand, PredicateError> {
    match expr {
        Expr::Literal(lit) => Ok(Some(lit_value(lit))),
        Expr::Path(segments) => resolve_member(item, segments),
        Expr::Not(inner) => Ok(Some(Value::Bool(!truthy(&eval(inner, item)?)))),
        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, item),
        Expr::Call { path, method, arg } => {
            let receiver = resolve_member(item, path)?;
            eval_call(receiver, *method, arg)
        }
    }
}

fn eval_binary(
    op: BinOp,
    lhs: &Expr,
    rhs: &Expr,
    item: &Value,
) -> Result<Operand, PredicateError> {
    // Boolean operators short-circuit; everything else evaluates both sides.
    let result = match op {
        BinOp::And => truthy(&eval(lhs, item)?) && truthy(&eval(rhs, item)?),
        BinOp::Or => truthy(&eval(lhs, item)?) || truthy(&eval(rhs, item)?),
        _ => {
            let left = eval(lhs, item)?;
            let right = eval(rhs, item)?;
            match op {
                BinOp::StrictEq => strict_eq(&left, &right),
                BinOp::StrictNe => !strict_eq(&left, &right),
                BinOp::LooseEq => loose_eq(&left, &right),
                BinOp::LooseNe => !loose_eq(&left, &right),
                BinOp::Gt | BinOp::Ge | BinOp::Lt | BinOp::Le => ordered(op, &left, &right),
                BinOp::And | BinOp::Or => unreachable!("handled above"),
            }
        }
    };
    Ok(Some(Value::Bool(result)))
}

/// Walk member segments from the item. A missing field yields undefined;
/// going *through* undefined or null is an error, mirroring what the
/// predicate author would see in a browser console.
fn resolve_member(item: &Value, segments: &[String]) -> Result<Operand, PredicateError> {
    let mut current: Option<&Value> = Some(item);
    let mut computed: Operand = None;
    for segment in segments {
        if computed.is_some() {
            // Something beneath an eagerly computed scalar like `length`.
            return Err(PredicateError::Eval(format!(
                "cannot read '{segment}' of a number"
            )));
        }
        current = match current {
            None => {
                return Err(PredicateError::Eval(format!(
                    "cannot read '{segment}' of undefined"
                )))
            }
            Some(Value::Null) => {
                return Err(PredicateError::Eval(format!(
                    "cannot read '{segment}' of null"
                )))
            }
            Some(Value::Object(map)) => map.get(segment),
            Some(Value::Array(items)) => {
                if segment == "length" {
                    computed = Some(Value::from(items.len()));
                    None
                } else {
                    segment.parse::<usize>().ok().and_then(|i| items.get(i))
                }
            }
            Some(Value::String(s)) => {
                if segment == "length" {
                    computed = Some(Value::from(s.chars().count()));
                    None
                } else {
                    None
                }
            }
            // Property access on numbers/booleans is undefined, not an error.
            Some(_) => None,
        };
    }
    if computed.is_some() {
        return Ok(computed);
    }
    Ok(current.cloned())
}

fn eval_call(receiver: Operand, method: Method, arg: &Lit) -> Result<Operand, PredicateError> {
    let arg_value = lit_value(arg);
    match receiver {
        Some(Value::String(s)) => {
            let needle = match &arg_value {
                Value::String(a) => a.clone(),
                other => other.to_string(),
            };
            let result = match method {
                Method::Includes => s.contains(&needle),
                Method::StartsWith => s.starts_with(&needle),
                Method::EndsWith => s.ends_with(&needle),
            };
            Ok(Some(Value::Bool(result)))
        }
        Some(Value::Array(items)) if method == Method::Includes => {
            let found = items
                .iter()
                .any(|v| strict_eq(&Some(v.clone()), &Some(arg_value.clone())));
            Ok(Some(Value::Bool(found)))
        }
        Some(other) => Err(PredicateError::Eval(format!(
            "method not available on {}",
            value_kind(&other)
        ))),
        None => Err(PredicateError::Eval(
            "cannot call a method on undefined".to_string(),
        )),
    }
}

fn lit_value(lit: &Lit) -> Value {
    match lit {
        Lit::Str(s) => Value::String(s.clone()),
        Lit::Num(n) => serde_json::Number::from_f64(*n)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Lit::Bool(b) => Value::Bool(*b),
        Lit::Null => Value::Null,
    }
}

fn truthy(operand: &Operand) -> bool {
    match operand {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

fn strict_eq(left: &Operand, right: &Operand) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(x), Value::Bool(y)) => x == y,
            (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
            (Value::String(x), Value::String(y)) => x == y,
            // Arrays/objects compare by identity in the source language;
            // two distinct values are never identical here.
            _ => false,
        },
        _ => false,
    }
}

fn loose_eq(left: &Operand, right: &Operand) -> bool {
    match (left, right) {
        (None | Some(Value::Null), None | Some(Value::Null)) => true,
        (Some(a), Some(b)) => loose_eq_values(a, b),
        _ => false,
    }
}

fn loose_eq_values(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            match (number_of(a), number_of(b)) {
                (Some(x), Some(y)) => x == y,
                _ => false,
            }
        }
        (Value::Bool(x), other) | (other, Value::Bool(x)) if !other.is_boolean() => {
            number_of(other) == Some(if *x { 1.0 } else { 0.0 })
        }
        _ => strict_eq(&Some(a.clone()), &Some(b.clone())),
    }
}

fn ordered(op: BinOp, left: &Operand, right: &Operand) -> bool {
    // String-to-string comparisons are lexicographic; anything else is
    // numeric. Incomparable operands (undefined, non-numeric strings)
    // compare false, the NaN rule.
    if let (Some(Value::String(a)), Some(Value::String(b))) = (left, right) {
        return match op {
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            _ => false,
        };
    }
    let (Some(a), Some(b)) = (
        left.as_ref().and_then(number_of),
        right.as_ref().and_then(number_of),
    ) else {
        return false;
    };
    match op {
        BinOp::Gt => a > b,
        BinOp::Ge => a >= b,
        BinOp::Lt => a < b,
        BinOp::Le => a <= b,
        _ => false,
    }
}

fn number_of(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                Some(0.0)
            } else {
                trimmed.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::super::Predicate;
    use serde_json::json;

    #[test]
    fn numeric_comparisons() {
        let item = json!({"id": 5, "price": 2.5});
        assert!(Predicate::compile("item.id >= 5").unwrap().test(&item).unwrap());
        assert!(Predicate::compile("item.price < 3").unwrap().test(&item).unwrap());
        assert!(!Predicate::compile("item.id < 5").unwrap().test(&item).unwrap());
    }

    #[test]
    fn string_ordering_is_lexicographic() {
        let item = json!({"name": "beta"});
        assert!(Predicate::compile("item.name > 'alpha'").unwrap().test(&item).unwrap());
    }

    #[test]
    fn undefined_comparisons_are_false_not_errors() {
        let item = json!({"id": 1});
        assert!(!Predicate::compile("item.missing > 3").unwrap().test(&item).unwrap());
        assert!(!Predicate::compile("item.missing === 3").unwrap().test(&item).unwrap());
        // Loose equality treats missing and null alike.
        assert!(Predicate::compile("item.missing == null").unwrap().test(&item).unwrap());
        assert!(!Predicate::compile("item.missing === null").unwrap().test(&item).unwrap());
    }

    #[test]
    fn array_length_and_includes() {
        let item = json!({"tags": ["red", "green"]});
        assert!(Predicate::compile("item.tags.length === 2").unwrap().test(&item).unwrap());
        assert!(Predicate::compile("item.tags.includes('red')").unwrap().test(&item).unwrap());
        assert!(!Predicate::compile("item.tags.includes('blue')").unwrap().test(&item).unwrap());
    }

    #[test]
    fn access_through_null_errors() {
        let item = json!({"meta": null});
        assert!(Predicate::compile("item.meta.flag").unwrap().test(&item).is_err());
    }

    #[test]
    fn bare_item_truthiness() {
        assert!(Predicate::compile("item => item").unwrap().test(&json!({"a": 1})).unwrap());
        assert!(!Predicate::compile("item => item").unwrap().test(&json!(null)).unwrap());
        assert!(!Predicate::compile("item => item").unwrap().test(&json!(0)).unwrap());
    }
}
