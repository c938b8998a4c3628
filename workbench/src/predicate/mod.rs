//! Dynamic predicate filtering over collection items.
//!
//! A predicate arrives as source text in the shape `item => <boolean expr>`
//! (the arrow prefix is optional) and is compiled into a single-parameter
//! boolean test at the point of use. The expression language is a small,
//! explicitly-scoped grammar rather than a general-purpose evaluator:
//! member access on `item`, literals, comparisons, boolean operators, and a
//! handful of string/array methods. See [`parser`] for the exact grammar.
//!
//! Predicates are supplied by the user or by the analysis collaborator and
//! are trusted input only; the evaluator is a power-user convenience, not a
//! security boundary. Compile or evaluation failure means "filter not
//! applicable" — callers fall back to the unfiltered collection and never
//! propagate the error.

mod eval;
mod parser;

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use parser::Expr;

/// Errors from predicate compilation or evaluation. Callers treat either
/// case as "filter inapplicable", never as a hard failure.
#[derive(Debug, Error)]
pub enum PredicateError {
    #[error("predicate parse error: {0}")]
    Parse(String),

    #[error("predicate evaluation error: {0}")]
    Eval(String),
}

/// A compiled single-item boolean test.
#[derive(Debug, Clone)]
pub struct Predicate {
    source: String,
    expr: Expr,
}

impl Predicate {
    /// Compile predicate source text into a callable test.
    pub fn compile(source: &str) -> Result<Self, PredicateError> {
        let expr = parser::parse(source)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    /// Evaluate the predicate against one collection item.
    pub fn test(&self, item: &Value) -> Result<bool, PredicateError> {
        eval::eval_bool(&self.expr, item)
    }

    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Filter a collection with freshly compiled predicate source.
///
/// Compilation happens per application (the user may edit the predicate
/// between checks, so nothing is cached). Returns `None` when the filter is
/// inapplicable — malformed source, or an expression that fails for any
/// item — in which case the caller uses the unfiltered collection.
pub fn apply(items: &[Value], source: &str) -> Option<Vec<Value>> {
    let predicate = match Predicate::compile(source) {
        Ok(predicate) => predicate,
        Err(err) => {
            debug!(%err, "predicate did not compile; leaving collection unfiltered");
            return None;
        }
    };

    let mut kept = Vec::new();
    for item in items {
        match predicate.test(item) {
            Ok(true) => kept.push(item.clone()),
            Ok(false) => {}
            Err(err) => {
                debug!(%err, "predicate failed mid-collection; leaving collection unfiltered");
                return None;
            }
        }
    }
    Some(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items() -> Vec<Value> {
        vec![
            json!({"id": 1, "name": "Alpha", "district": "Dhaka", "active": true}),
            json!({"id": 2, "name": "Beta", "district": "Khulna", "active": false}),
            json!({"id": 3, "name": "Gamma", "district": "Dhaka", "active": true}),
        ]
    }

    #[test]
    fn strict_equality_on_numbers() {
        let filtered = apply(&items(), "item => item.id === 2").expect("applicable");
        assert_eq!(filtered, vec![items()[1].clone()]);
    }

    #[test]
    fn arrow_prefix_is_optional() {
        let with_arrow = apply(&items(), "item => item.district === 'Dhaka'").unwrap();
        let without = apply(&items(), "item.district === 'Dhaka'").unwrap();
        assert_eq!(with_arrow, without);
        assert_eq!(with_arrow.len(), 2);
    }

    #[test]
    fn boolean_operators_and_truthiness() {
        let filtered = apply(&items(), "item => item.active && item.id > 1").unwrap();
        assert_eq!(filtered, vec![items()[2].clone()]);

        let negated = apply(&items(), "item => !item.active").unwrap();
        assert_eq!(negated, vec![items()[1].clone()]);
    }

    #[test]
    fn string_methods() {
        let filtered = apply(&items(), "item => item.name.includes('a')").unwrap();
        // "Alpha", "Gamma" contain a lowercase 'a'; "Beta" does too.
        assert_eq!(filtered.len(), 3);

        let starts = apply(&items(), "item => item.name.startsWith('Al')").unwrap();
        assert_eq!(starts, vec![items()[0].clone()]);
    }

    #[test]
    fn loose_vs_strict_equality() {
        let loose = apply(&items(), "item => item.id == '2'").unwrap();
        assert_eq!(loose.len(), 1);
        let strict = apply(&items(), "item => item.id === '2'").unwrap();
        assert!(strict.is_empty());
    }

    #[test]
    fn malformed_source_is_inapplicable() {
        assert!(apply(&items(), "item => item.id ===").is_none());
        assert!(apply(&items(), "not even close ~~~").is_none());
        assert!(apply(&items(), "").is_none());
    }

    #[test]
    fn access_through_missing_field_is_inapplicable() {
        // item.meta is undefined, so item.meta.flag raises per-item and the
        // whole filter falls back to the unfiltered collection.
        assert!(apply(&items(), "item => item.meta.flag === true").is_none());
    }

    #[test]
    fn missing_leaf_field_compares_false_without_failing() {
        let filtered = apply(&items(), "item => item.nickname === 'Al'").unwrap();
        assert!(filtered.is_empty());
    }

    #[test]
    fn filtering_is_idempotent() {
        let once = apply(&items(), "item => item.district === 'Dhaka'").unwrap();
        let twice = apply(&once, "item => item.district === 'Dhaka'").unwrap();
        assert_eq!(once, twice);
    }
}
