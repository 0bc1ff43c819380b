// Submitted form bodies
//
// Bodies arrive as loosely typed JSON. Each field is coerced on its own so a
// bad value becomes a field error on the re-rendered form instead of an
// extractor rejection.

use axum::extract::rejection::JsonRejection;
use axum::Json;
use serde_json::{Map, Value};
use tracing::debug;

use crate::core::GroupId;
use crate::error::FieldErrors;
use crate::services::validation::{INVALID_CHOICE, INVALID_VALUE};

/// Key for errors that belong to the form as a whole.
pub const NON_FIELD_ERRORS: &str = "__all__";
const NOT_AN_OBJECT: &str = "Submit the form as a JSON object.";

/// Fields never echoed back to the client.
const WRITE_ONLY: &[&str] = &["image"];

pub struct Submission {
    fields: Map<String, Value>,
    errors: FieldErrors,
}

impl Submission {
    pub fn from_body(body: Result<Json<Value>, JsonRejection>) -> Self {
        let mut errors = FieldErrors::new();
        let fields = match body {
            Ok(Json(Value::Object(fields))) => fields,
            Ok(Json(_)) => {
                errors.add(NON_FIELD_ERRORS, NOT_AN_OBJECT);
                Map::new()
            }
            Err(rejection) => {
                debug!(%rejection, "unreadable form body");
                errors.add(NON_FIELD_ERRORS, NOT_AN_OBJECT);
                Map::new()
            }
        };
        Self { fields, errors }
    }

    /// A text field. Missing or null is `None`; numbers and booleans take
    /// their literal spelling; lists and objects are invalid.
    pub fn text(&mut self, field: &str) -> Option<String> {
        match self.fields.get(field)? {
            Value::Null => None,
            Value::String(text) => Some(text.clone()),
            Value::Number(number) => Some(number.to_string()),
            Value::Bool(flag) => Some(flag.to_string()),
            Value::Array(_) | Value::Object(_) => {
                self.errors.add(field, INVALID_VALUE);
                None
            }
        }
    }

    /// A group choice. Missing is `None`; null or blank clears the choice.
    /// Accepts an id as a number or a numeric string.
    pub fn group_choice(&mut self, field: &str) -> Option<Option<GroupId>> {
        let choice = match self.fields.get(field)? {
            Value::Null => Some(None),
            Value::String(raw) if raw.trim().is_empty() => Some(None),
            Value::String(raw) => raw.trim().parse::<GroupId>().ok().map(Some),
            Value::Number(number) => number.as_i64().map(|id| Some(GroupId(id))),
            _ => None,
        };
        if choice.is_none() {
            self.errors.add(field, INVALID_CHOICE);
        }
        choice
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// The submitted fields minus write-only ones, for redisplay.
    pub fn echo(&self) -> Value {
        let mut fields = self.fields.clone();
        for field in WRITE_ONLY {
            fields.remove(*field);
        }
        Value::Object(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn submit(value: Value) -> Submission {
        Submission::from_body(Ok(Json(value)))
    }

    #[test]
    fn text_fields_coerce_scalars() {
        let mut form = submit(json!({"text": 5, "flag": true, "name": "sam", "gone": null}));
        assert_eq!(form.text("text").as_deref(), Some("5"));
        assert_eq!(form.text("flag").as_deref(), Some("true"));
        assert_eq!(form.text("name").as_deref(), Some("sam"));
        assert_eq!(form.text("gone"), None);
        assert_eq!(form.text("missing"), None);
        assert!(form.is_valid());
    }

    #[test]
    fn structured_text_is_a_field_error() {
        let mut form = submit(json!({"text": ["x"]}));
        assert_eq!(form.text("text"), None);
        assert!(form.errors().contains("text"));
    }

    #[test]
    fn group_choices() {
        let mut form = submit(json!({
            "a": 3, "b": "4", "c": null, "d": "", "e": "abc", "f": 1.5, "g": [1]
        }));
        assert_eq!(form.group_choice("a"), Some(Some(GroupId(3))));
        assert_eq!(form.group_choice("b"), Some(Some(GroupId(4))));
        assert_eq!(form.group_choice("c"), Some(None));
        assert_eq!(form.group_choice("d"), Some(None));
        assert_eq!(form.group_choice("missing"), None);
        assert!(form.is_valid());

        for field in ["e", "f", "g"] {
            assert_eq!(form.group_choice(field), None);
            assert!(form.errors().contains(field), "{}", field);
        }
    }

    #[test]
    fn non_object_bodies_are_form_errors() {
        let form = submit(json!([1, 2]));
        assert!(!form.is_valid());
        assert!(form.errors().contains(NON_FIELD_ERRORS));
        assert_eq!(form.echo(), json!({}));
    }

    #[test]
    fn echo_drops_uploads() {
        let form = submit(json!({"text": "hi", "image": "R0lGODlh"}));
        assert_eq!(form.echo(), json!({"text": "hi"}));
    }
}
