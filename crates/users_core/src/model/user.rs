//! User domain model.
//!
//! # Responsibility
//! - Define the read shape (`User`) and the insert request (`NewUser`).
//! - Unwrap the `key` scalar out of the serialized settings document.
//!
//! # Invariants
//! - `User::id` is assigned by the store and never chosen by callers.
//! - Settings decoding never fails: anything unusable becomes `None`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Store-assigned user identifier (`Users.id`).
pub type UserId = i64;

/// One persisted user as returned by read operations.
///
/// Serialized with the field names of the `Users` table so an outer request
/// layer can emit it unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    /// Origin of the user. Stored in the reserved-word column `"from"`;
    /// empty when the row never recorded one.
    pub from: String,
    pub age: i64,
    /// `key` entry of the settings document, if it holds a scalar.
    pub key: Option<String>,
}

/// One tuple of a batch insert request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub name: String,
    #[serde(rename = "lastName")]
    pub last_name: String,
    pub age: i64,
}

impl NewUser {
    pub fn new(name: impl Into<String>, last_name: impl Into<String>, age: i64) -> Self {
        Self {
            name: name.into(),
            last_name: last_name.into(),
            age,
        }
    }
}

/// Extracts the `key` scalar from a serialized settings document.
///
/// Strings are returned verbatim, numbers and booleans as their JSON text.
/// A missing column value, malformed JSON, a non-object document, a missing
/// key, `null` and nested values all yield `None`.
pub fn decode_settings_key(raw: Option<&str>) -> Option<String> {
    let mut document: Value = serde_json::from_str(raw?).ok()?;
    match document.get_mut("key").map(Value::take)? {
        Value::String(value) => Some(value),
        Value::Number(value) => Some(value.to_string()),
        Value::Bool(value) => Some(value.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_settings_key, NewUser, User};

    #[test]
    fn string_key_is_returned_verbatim() {
        assert_eq!(
            decode_settings_key(Some(r#"{"key":"vip"}"#)).as_deref(),
            Some("vip")
        );
    }

    #[test]
    fn scalar_keys_are_rendered_as_text() {
        assert_eq!(decode_settings_key(Some(r#"{"key":42}"#)).as_deref(), Some("42"));
        assert_eq!(
            decode_settings_key(Some(r#"{"key":true,"theme":"dark"}"#)).as_deref(),
            Some("true")
        );
    }

    #[test]
    fn unusable_documents_decode_to_none() {
        for raw in [
            "{}",
            "",
            "not json",
            "{\"key\":",
            "[1,2,3]",
            "\"vip\"",
            r#"{"key":null}"#,
            r#"{"key":{"nested":1}}"#,
            r#"{"key":["a"]}"#,
        ] {
            assert_eq!(decode_settings_key(Some(raw)), None, "raw settings: {raw}");
        }
        assert_eq!(decode_settings_key(None), None);
    }

    #[test]
    fn user_serializes_with_table_field_names() {
        let user = User {
            id: 7,
            name: "Ana".to_string(),
            last_name: "Lopez".to_string(),
            from: "Lima".to_string(),
            age: 31,
            key: None,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert_eq!(json["lastName"], "Lopez");
        assert_eq!(json["from"], "Lima");
        assert!(json["key"].is_null());
        assert!(json.get("last_name").is_none());
    }

    #[test]
    fn new_user_deserializes_from_request_payload() {
        let parsed: NewUser =
            serde_json::from_str(r#"{"name":"Ana","lastName":"Lopez","age":31}"#).unwrap();
        assert_eq!(parsed, NewUser::new("Ana", "Lopez", 31));
    }
}
