//! Change detection: the single source of truth for "did anything actually change".
//!
//! Values are compared by their canonical JSON: object keys sorted, null-valued
//! members dropped so that an absent field and an explicit null compare equal.
//! Nothing in this crate compares raw object identity.

use crate::node::DocumentSnapshot;
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

/// Serialize `value` into its canonical JSON string.
pub fn canonical_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let value = serde_json::to_value(value)?;
    serde_json::to_string(&canonicalize(value))
}

fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map
                .into_iter()
                .filter(|(_, value)| !value.is_null())
                .map(|(key, value)| (key, canonicalize(value)))
                .collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Canonical form of a snapshot, or `None` for an absent one.
pub fn normalize(snapshot: Option<&DocumentSnapshot>) -> Option<String> {
    let snapshot = snapshot?;
    match canonical_json(snapshot) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!("Failed to normalize snapshot: {}", e);
            None
        }
    }
}

/// Semantic equality of two optional snapshots. Both absent is equal.
pub fn equal(a: Option<&DocumentSnapshot>, b: Option<&DocumentSnapshot>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => deep_equal(a, b),
        _ => false,
    }
}

/// Deep equality of any two serializable values.
///
/// A value that fails to serialize never compares equal, so callers fall through
/// to their "changed" path instead of silently skipping work.
pub fn deep_equal<T: Serialize + ?Sized>(a: &T, b: &T) -> bool {
    match (canonical_json(a), canonical_json(b)) {
        (Ok(a), Ok(b)) => a == b,
        (Err(e), _) | (_, Err(e)) => {
            warn!("Treating unserializable value as changed: {}", e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::SnapshotNode;
    use serde_json::json;

    fn snapshot(value: Value) -> DocumentSnapshot {
        DocumentSnapshot::from_value(value).unwrap()
    }

    #[test]
    fn test_both_absent_are_equal() {
        assert!(equal(None, None));
        assert!(!equal(Some(&DocumentSnapshot::empty()), None));
        assert!(!equal(None, Some(&DocumentSnapshot::empty())));
    }

    #[test]
    fn test_absent_and_null_fields_compare_equal() {
        let absent = snapshot(json!({"root": {"children": [
            {"type": "link", "url": "https://a.example", "children": []}
        ]}}));
        let null = snapshot(json!({"root": {"children": [
            {"type": "link", "url": "https://a.example", "target": null, "title": null, "children": []}
        ]}}));
        assert!(equal(Some(&absent), Some(&null)));
    }

    #[test]
    fn test_key_order_is_ignored() {
        let a: Value =
            serde_json::from_str(r#"{"b":1,"a":{"y":2,"x":null,"z":[3,{"k":1,"j":2}]}}"#)
                .unwrap();
        let b: Value =
            serde_json::from_str(r#"{"a": {"z": [3, {"j": 2, "k": 1}], "y": 2}, "b": 1}"#).unwrap();
        assert!(deep_equal(&a, &b));
        assert_eq!(
            canonical_json(&a).unwrap(),
            r#"{"a":{"y":2,"z":[3,{"j":2,"k":1}]},"b":1}"#
        );
    }

    #[test]
    fn test_content_difference_is_detected() {
        let a =
            DocumentSnapshot::new(vec![SnapshotNode::paragraph(vec![SnapshotNode::text("Hi")])]);
        let b =
            DocumentSnapshot::new(vec![SnapshotNode::paragraph(vec![SnapshotNode::text("Hi!")])]);
        assert!(!equal(Some(&a), Some(&b)));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_normalization_is_stable_across_calls() {
        let doc = snapshot(json!({"root": {"children": [
            {"type": "quote", "z": 1, "a": 2},
            {"type": "paragraph", "children": [{"type": "text", "text": "x", "format": 1}]}
        ]}}));
        let first = normalize(Some(&doc)).unwrap();
        for _ in 0..10 {
            assert_eq!(normalize(Some(&doc)).unwrap(), first);
            assert_eq!(normalize(Some(&doc.clone())).unwrap(), first);
        }
        let reparsed = DocumentSnapshot::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(normalize(Some(&reparsed)).unwrap(), first);
    }
}
