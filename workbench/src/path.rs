//! Dot-path resolution inside arbitrary JSON documents.
//!
//! Resolution is read-only and fails soft: a wrong or stale address yields
//! `None`, never a panic. No wildcard, slicing, or escape syntax is
//! supported; a literal `.` inside an object key cannot be addressed.

use serde_json::Value;

/// Resolve a dot-delimited address inside a document.
///
/// The empty address denotes the document itself. Each segment indexes into
/// the current value (object field, or array index when the segment parses
/// as one); resolution short-circuits to `None` as soon as an intermediate
/// value is missing or not indexable.
pub fn resolve<'a>(document: &'a Value, address: &str) -> Option<&'a Value> {
    if address.is_empty() {
        return Some(document);
    }
    address
        .split('.')
        .try_fold(document, |current, segment| match current {
            Value::Object(map) => map.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}
