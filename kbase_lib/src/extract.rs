//! Shape-tolerant payload extraction.
//!
//! The backend's payload shape has drifted over time: a resource may sit at
//! the top level or under a nested `response`, and the same resource may be
//! named differently across versions. Each tolerance rule is an ordered list
//! of candidates tried in sequence, so the accepted shapes are enumerable.

use serde::de::DeserializeOwned;
use serde_json::Value;

/// Prefers a non-null nested `response` over the value itself.
pub fn unwrap_response(payload: &Value) -> &Value {
    match payload.get("response") {
        Some(inner) if !inner.is_null() => inner,
        _ => payload,
    }
}

/// First candidate field present with a non-null value.
pub fn first_field<'a>(value: &'a Value, candidates: &[&str]) -> Option<&'a Value> {
    candidates
        .iter()
        .filter_map(|name| value.get(*name))
        .find(|v| !v.is_null())
}

/// Decodes the list found under the first matching candidate.
///
/// Missing or non-array fields yield an empty list. Elements that fail to
/// decode are skipped individually.
pub fn extract_list<T: DeserializeOwned>(payload: &Value, candidates: &[&str]) -> Vec<T> {
    let Some(field) = first_field(unwrap_response(payload), candidates) else {
        return Vec::new();
    };
    let Some(items) = field.as_array() else {
        tracing::warn!("expected a list under {:?}, got {}", candidates, kind(field));
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(index, item)| match T::deserialize(item) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                tracing::warn!("skipping malformed record {} under {:?}: {}", index, candidates, err);
                None
            }
        })
        .collect()
}

/// Decodes the object found under the first matching candidate, or `None`.
pub fn extract_object<T: DeserializeOwned>(payload: &Value, candidates: &[&str]) -> Option<T> {
    let field = first_field(unwrap_response(payload), candidates)?;
    match T::deserialize(field) {
        Ok(decoded) => Some(decoded),
        Err(err) => {
            tracing::warn!("malformed record under {:?}: {}", candidates, err);
            None
        }
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kbase_api::types::{AdminUser, UserProfile};
    use serde_json::json;

    #[test]
    fn direct_and_nested_shapes_are_equivalent() {
        let users = json!([
            {"id": "u1", "username": "ada", "role": "admin", "email": "a@x.io"},
            {"id": "u2", "username": "bob", "role": "user"}
        ]);
        let direct = json!({"users": users});
        let nested = json!({"response": {"users": users}});

        let a: Vec<AdminUser> = extract_list(&direct, &["users"]);
        let b: Vec<AdminUser> = extract_list(&nested, &["users"]);
        assert_eq!(a.len(), 2);
        assert_eq!(a, b);
    }

    #[test]
    fn null_response_falls_back_to_top_level() {
        let payload = json!({"response": null, "files": [{"id": "f1"}]});
        assert_eq!(unwrap_response(&payload), &payload);
        let files: Vec<Value> = extract_list(&payload, &["files"]);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn candidates_are_tried_in_order() {
        let both = json!({"documents": [1], "files": [2, 3]});
        assert_eq!(first_field(&both, &["documents", "files"]), Some(&json!([1])));

        let only_files = json!({"documents": null, "files": [2, 3]});
        let got: Vec<u32> = extract_list(&only_files, &["documents", "files"]);
        assert_eq!(got, vec![2, 3]);
    }

    #[test]
    fn absent_or_wrong_kind_degrades_to_empty() {
        let none: Vec<Value> = extract_list(&json!({}), &["users"]);
        assert!(none.is_empty());

        let wrong: Vec<Value> = extract_list(&json!({"users": "nope"}), &["users"]);
        assert!(wrong.is_empty());

        let scalar: Vec<Value> = extract_list(&json!(null), &["users"]);
        assert!(scalar.is_empty());
    }

    #[test]
    fn malformed_items_are_skipped() {
        let payload = json!({"users": [
            {"id": "ok", "username": "a", "role": "user"},
            42,
            {"id": "missing-fields"},
            {"id": "also-ok", "username": "b", "role": "user"}
        ]});
        let users: Vec<AdminUser> = extract_list(&payload, &["users"]);
        let ids: Vec<_> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["ok", "also-ok"]);
    }

    #[test]
    fn object_extraction() {
        let payload = json!({"response": {"user": {
            "user_id": "me", "username": "me", "role": "user", "email": "me@x.io"
        }}});
        let profile: Option<UserProfile> = extract_object(&payload, &["user"]);
        assert_eq!(profile.unwrap().user_id, "me");

        assert_eq!(extract_object::<UserProfile>(&json!({}), &["user"]), None);
        assert_eq!(extract_object::<UserProfile>(&json!({"user": []}), &["user"]), None);
    }
}
