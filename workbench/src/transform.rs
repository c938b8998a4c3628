//! Pure, synchronous derivation of processed views and projections.
//!
//! Nothing in this module suspends, allocates shared state, or returns an
//! error: the processed view is recomputed fresh from document + config +
//! predicate whenever any of them changes, and absence/emptiness is the
//! uniform "not applicable" signal.

use serde_json::Value;

use crate::path;
use crate::predicate;
use crate::types::{ProjectionRow, TransformationConfig};

/// The exportable outcome of [`project`]: either proper label/value rows,
/// or the best-available raw fallback so callers always have *something*.
#[derive(Debug, Clone, PartialEq)]
pub enum Projection {
    Rows(Vec<ProjectionRow>),
    Raw(Value),
}

impl Projection {
    /// Serialize either shape into a plain JSON value for export.
    pub fn to_value(&self) -> Value {
        match self {
            Projection::Rows(rows) => {
                Value::Array(rows.iter().map(|row| row_value(row)).collect())
            }
            Projection::Raw(value) => value.clone(),
        }
    }

    pub fn rows(&self) -> Option<&[ProjectionRow]> {
        match self {
            Projection::Rows(rows) => Some(rows),
            Projection::Raw(_) => None,
        }
    }
}

fn row_value(row: &ProjectionRow) -> Value {
    serde_json::json!({ "label": row.label, "value": row.value })
}

/// Derive the processed view: the document with, if `root_path` denotes a
/// collection and a predicate is active, that collection replaced by its
/// filtered subset.
///
/// With an empty `root_path` the filtered collection *is* the view, not
/// re-wrapped. If the path misses, resolves to a non-array, the predicate
/// is absent, or the filter is inapplicable, the view is the document
/// unchanged. The input document is never mutated.
pub fn derive_view(
    document: &Value,
    config: &TransformationConfig,
    predicate_source: Option<&str>,
) -> Value {
    let Some(source) = predicate_source else {
        return document.clone();
    };
    let Some(Value::Array(items)) = path::resolve(document, &config.root_path) else {
        return document.clone();
    };
    let Some(filtered) = predicate::apply(items, source) else {
        // Filter inapplicable; best-effort convenience, never a hard failure.
        return document.clone();
    };

    if config.root_path.is_empty() {
        return Value::Array(filtered);
    }
    let segments: Vec<&str> = config.root_path.split('.').collect();
    replace_at(document, &segments, Value::Array(filtered))
}

/// Structural copy of `document` with the value at `segments` replaced.
/// Siblings along the path are carried over untouched.
fn replace_at(document: &Value, segments: &[&str], replacement: Value) -> Value {
    let Some((head, rest)) = segments.split_first() else {
        return replacement;
    };
    match document {
        Value::Object(map) => {
            let mut copy = map.clone();
            if let Some(child) = map.get(*head) {
                copy.insert((*head).to_string(), replace_at(child, rest, replacement));
            }
            Value::Object(copy)
        }
        Value::Array(items) => {
            let mut copy = items.clone();
            if let Ok(index) = head.parse::<usize>() {
                if let Some(child) = items.get(index) {
                    copy[index] = replace_at(child, rest, replacement);
                }
            }
            Value::Array(copy)
        }
        other => other.clone(),
    }
}

/// Project the view into label/value rows using the configured keys.
///
/// Falls back to the resolved collection (or the whole view when the path
/// misses) whenever the collection or either key is unavailable.
pub fn project(view: &Value, config: &TransformationConfig) -> Projection {
    let resolved = path::resolve(view, &config.root_path);
    match resolved {
        Some(Value::Array(items))
            if !config.label_key.is_empty() && !config.value_key.is_empty() =>
        {
            let rows = items
                .iter()
                .map(|item| ProjectionRow {
                    label: item.get(&config.label_key).cloned().unwrap_or(Value::Null),
                    value: item.get(&config.value_key).cloned().unwrap_or(Value::Null),
                })
                .collect();
            Projection::Rows(rows)
        }
        Some(other) => Projection::Raw(other.clone()),
        None => Projection::Raw(view.clone()),
    }
}

/// Field names of the first item of the resolved collection, for key
/// pickers. Empty when there is no collection, it is empty, or its first
/// item is not an object.
pub fn available_keys(view: &Value, config: &TransformationConfig) -> Vec<String> {
    match path::resolve(view, &config.root_path) {
        Some(Value::Array(items)) => match items.first() {
            Some(Value::Object(map)) => map.keys().cloned().collect(),
            _ => Vec::new(),
        },
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document() -> Value {
        json!({
            "meta": {"page": 1, "size": 100},
            "data": {
                "list": [
                    {"id": 1, "name": "A"},
                    {"id": 2, "name": "B"}
                ]
            }
        })
    }

    fn config() -> TransformationConfig {
        TransformationConfig::new("data.list", "name", "id")
    }

    #[test]
    fn end_to_end_example() {
        let view = derive_view(&document(), &config(), Some("item => item.id === 2"));
        assert_eq!(
            path::resolve(&view, "data.list"),
            Some(&json!([{"id": 2, "name": "B"}]))
        );

        let projection = project(&view, &config());
        assert_eq!(
            projection.rows().unwrap(),
            &[ProjectionRow {
                label: json!("B"),
                value: json!(2)
            }]
        );
    }

    #[test]
    fn sibling_fields_survive_replacement() {
        let view = derive_view(&document(), &config(), Some("item => item.id === 2"));
        assert_eq!(path::resolve(&view, "meta"), path::resolve(&document(), "meta"));
        assert_eq!(path::resolve(&view, "data.list").unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn no_predicate_passes_through() {
        assert_eq!(derive_view(&document(), &config(), None), document());
    }

    #[test]
    fn empty_root_path_yields_bare_collection() {
        let doc = json!([{"id": 1}, {"id": 2}, {"id": 3}]);
        let config = TransformationConfig::new("", "", "id");
        let view = derive_view(&doc, &config, Some("item => item.id > 1"));
        assert_eq!(view, json!([{"id": 2}, {"id": 3}]));
    }

    #[test]
    fn throwing_predicate_leaves_document_unfiltered() {
        let view = derive_view(&document(), &config(), Some("item => item.a.b.c === 1"));
        assert_eq!(view, document());
    }

    #[test]
    fn malformed_predicate_leaves_document_unfiltered() {
        let view = derive_view(&document(), &config(), Some("garbage ((("));
        assert_eq!(view, document());
    }

    #[test]
    fn non_array_root_passes_through() {
        let config = TransformationConfig::new("meta", "name", "id");
        let view = derive_view(&document(), &config, Some("item => true"));
        assert_eq!(view, document());
    }

    #[test]
    fn projection_is_complete() {
        let projection = project(&document(), &config());
        let rows = projection.rows().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], ProjectionRow { label: json!("A"), value: json!(1) });
    }

    #[test]
    fn projection_falls_back_to_collection_without_keys() {
        let config = TransformationConfig::new("data.list", "", "");
        match project(&document(), &config) {
            Projection::Raw(value) => assert!(value.is_array()),
            Projection::Rows(_) => panic!("expected raw fallback"),
        }
    }

    #[test]
    fn projection_falls_back_to_view_on_path_miss() {
        let config = TransformationConfig::new("nope.nothing", "name", "id");
        match project(&document(), &config) {
            Projection::Raw(value) => assert_eq!(value, document()),
            Projection::Rows(_) => panic!("expected raw fallback"),
        }
    }

    #[test]
    fn missing_projection_keys_become_null() {
        let config = TransformationConfig::new("data.list", "name", "code");
        let rows_projection = project(&document(), &config);
        let rows = rows_projection.rows().unwrap();
        assert_eq!(rows[0].value, Value::Null);
    }

    #[test]
    fn available_keys_come_from_first_item() {
        let keys = available_keys(&document(), &config());
        assert_eq!(keys, vec!["id".to_string(), "name".to_string()]);

        let empty = json!({"data": {"list": []}});
        assert!(available_keys(&empty, &config()).is_empty());
        assert!(available_keys(&json!({"x": 1}), &config()).is_empty());
    }

    #[test]
    fn export_value_shape() {
        let projection = project(&document(), &config());
        assert_eq!(
            projection.to_value(),
            json!([{"label": "A", "value": 1}, {"label": "B", "value": 2}])
        );
    }
}
