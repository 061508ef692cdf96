//! Request payload validation.
//!
//! A [`Validator`] walks a JSON object field by field, collecting every
//! failure instead of stopping at the first one, and hands back typed values
//! for the fields that passed. Strings are trimmed and empty strings count as
//! null, except passwords, which are taken verbatim. Numeric strings are
//! accepted where an integer is expected.

use std::fmt;
use std::ops::RangeInclusive;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

use crate::http::error::ApiError;

/// Field-level messages in the order they were raised.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationErrors {
    fields: Vec<(String, Vec<String>)>,
}

impl ValidationErrors {
    pub fn add(&mut self, field: &str, message: String) {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, messages)) => messages.push(message),
            None => self.fields.push((field.to_string(), vec![message])),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, messages)| messages.as_slice())
    }

    /// First message, with a count of the rest.
    pub fn summary(&self) -> String {
        let mut all = self.fields.iter().flat_map(|(_, messages)| messages);
        let Some(first) = all.next() else {
            return "The given data was invalid.".to_string();
        };
        match all.count() {
            0 => first.clone(),
            1 => format!("{first} (and 1 more error)"),
            n => format!("{first} (and {n} more errors)"),
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.summary())
    }
}

impl Serialize for ValidationErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, messages) in &self.fields {
            map.serialize_entry(field, messages)?;
        }
        map.end()
    }
}

enum Input<'a> {
    Absent,
    Null,
    Present(&'a Value),
}

fn label(field: &str) -> String {
    field.replace('_', " ")
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

// One '@', non-empty local part, dotted domain, no whitespace.
fn looks_like_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && domain.split('.').all(|part| !part.is_empty())
        && !value.chars().any(char::is_whitespace)
}

/// Collects field errors over one JSON payload.
pub struct Validator {
    input: Map<String, Value>,
    errors: ValidationErrors,
}

impl Validator {
    /// A payload that is not a JSON object is validated as if it were empty.
    pub fn new(body: Value) -> Self {
        let input = match body {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Validator {
            input,
            errors: ValidationErrors::default(),
        }
    }

    fn lookup(&self, field: &str) -> Input<'_> {
        match self.input.get(field) {
            None => Input::Absent,
            Some(Value::Null) => Input::Null,
            Some(Value::String(text)) if text.trim().is_empty() => Input::Null,
            Some(value) => Input::Present(value),
        }
    }

    pub fn reject(&mut self, field: &str, message: impl Into<String>) {
        self.errors.add(field, message.into());
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn finish(self) -> Result<(), ApiError> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(ApiError::Validation(self.errors))
        }
    }

    pub fn into_error(self) -> ApiError {
        ApiError::Validation(self.errors)
    }

    fn check_string(
        &mut self,
        field: &str,
        value: &Value,
        max: usize,
        trim: bool,
    ) -> Option<String> {
        let Value::String(text) = value else {
            self.reject(field, format!("The {} field must be a string.", label(field)));
            return None;
        };
        let text = if trim { text.trim() } else { text.as_str() };
        if text.chars().count() > max {
            self.reject(
                field,
                format!(
                    "The {} field must not be greater than {max} characters.",
                    label(field)
                ),
            );
            return None;
        }
        Some(text.to_string())
    }

    fn check_integer(
        &mut self,
        field: &str,
        value: &Value,
        range: Option<&RangeInclusive<i64>>,
    ) -> Option<i64> {
        let Some(number) = as_integer(value) else {
            self.reject(field, format!("The {} field must be an integer.", label(field)));
            return None;
        };
        if let Some(range) = range {
            if number < *range.start() {
                self.reject(
                    field,
                    format!("The {} field must be at least {}.", label(field), range.start()),
                );
                return None;
            }
            if number > *range.end() {
                self.reject(
                    field,
                    format!(
                        "The {} field must not be greater than {}.",
                        label(field),
                        range.end()
                    ),
                );
                return None;
            }
        }
        Some(number)
    }

    fn required(&mut self, field: &str) {
        self.reject(field, format!("The {} field is required.", label(field)));
    }

    /// Must be present and a string of at most `max` characters.
    pub fn required_string(&mut self, field: &str, max: usize) -> Option<String> {
        match self.lookup(field) {
            Input::Present(value) => {
                let value = value.clone();
                self.check_string(field, &value, max, true)
            }
            Input::Absent | Input::Null => {
                self.required(field);
                None
            }
        }
    }

    /// Like [`Validator::required_string`], but surrounding whitespace is part
    /// of the secret.
    pub fn required_password(&mut self, field: &str, max: usize) -> Option<String> {
        match self.input.get(field).cloned() {
            None | Some(Value::Null) => {
                self.required(field);
                None
            }
            Some(Value::String(text)) if text.is_empty() => {
                self.required(field);
                None
            }
            Some(value) => self.check_string(field, &value, max, false),
        }
    }

    /// May be absent; when supplied it must be a non-null string.
    pub fn optional_string(&mut self, field: &str, max: usize) -> Option<String> {
        match self.lookup(field) {
            Input::Absent => None,
            Input::Null => {
                self.reject(field, format!("The {} field must be a string.", label(field)));
                None
            }
            Input::Present(value) => {
                let value = value.clone();
                self.check_string(field, &value, max, true)
            }
        }
    }

    /// `None` when absent, `Some(None)` when null, `Some(Some(_))` when valid.
    pub fn nullable_string(&mut self, field: &str, max: usize) -> Option<Option<String>> {
        match self.lookup(field) {
            Input::Absent => None,
            Input::Null => Some(None),
            Input::Present(value) => {
                let value = value.clone();
                self.check_string(field, &value, max, true).map(Some)
            }
        }
    }

    pub fn required_integer(
        &mut self,
        field: &str,
        range: Option<RangeInclusive<i64>>,
    ) -> Option<i64> {
        match self.lookup(field) {
            Input::Present(value) => {
                let value = value.clone();
                self.check_integer(field, &value, range.as_ref())
            }
            Input::Absent | Input::Null => {
                self.required(field);
                None
            }
        }
    }

    pub fn optional_integer(
        &mut self,
        field: &str,
        range: Option<RangeInclusive<i64>>,
    ) -> Option<i64> {
        match self.lookup(field) {
            Input::Absent => None,
            Input::Null => {
                self.reject(field, format!("The {} field must be an integer.", label(field)));
                None
            }
            Input::Present(value) => {
                let value = value.clone();
                self.check_integer(field, &value, range.as_ref())
            }
        }
    }

    pub fn nullable_integer(
        &mut self,
        field: &str,
        range: Option<RangeInclusive<i64>>,
    ) -> Option<Option<i64>> {
        match self.lookup(field) {
            Input::Absent => None,
            Input::Null => Some(None),
            Input::Present(value) => {
                let value = value.clone();
                self.check_integer(field, &value, range.as_ref()).map(Some)
            }
        }
    }

    /// Required address of at most `max` characters, lowercase when `lowercase`.
    pub fn required_email(&mut self, field: &str, max: usize, lowercase: bool) -> Option<String> {
        let email = self.required_string(field, max)?;
        if lowercase && email != email.to_lowercase() {
            self.reject(field, format!("The {} field must be lowercase.", label(field)));
            return None;
        }
        if !looks_like_email(&email) {
            self.reject(
                field,
                format!("The {} field must be a valid email address.", label(field)),
            );
            return None;
        }
        Some(email)
    }

    pub fn min_chars(&mut self, field: &str, value: &str, min: usize) -> bool {
        if value.chars().count() < min {
            self.reject(
                field,
                format!("The {} field must be at least {min} characters.", label(field)),
            );
            return false;
        }
        true
    }

    /// `field` must equal `{field}_confirmation`.
    pub fn confirmed(&mut self, field: &str) -> bool {
        let confirmation = format!("{field}_confirmation");
        if self.input.get(field) != self.input.get(&confirmation) {
            self.reject(
                field,
                format!("The {} field confirmation does not match.", label(field)),
            );
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_required_fields_report_each_failure() {
        let mut v = Validator::new(json!({ "year": 1800 }));
        assert_eq!(v.required_string("title", 255), None);
        assert_eq!(v.nullable_integer("year", Some(1900..=2100)), None);
        assert_eq!(v.required_integer("artist_id", None), None);

        let ApiError::Validation(errors) = v.into_error() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("title").unwrap(), ["The title field is required."]);
        assert_eq!(errors.get("year").unwrap(), ["The year field must be at least 1900."]);
        assert_eq!(
            errors.summary(),
            "The title field is required. (and 2 more errors)"
        );
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({
                "title": ["The title field is required."],
                "year": ["The year field must be at least 1900."],
                "artist_id": ["The artist id field is required."],
            })
        );
    }

    #[test]
    fn test_absent_null_and_present_are_distinct() {
        let mut v = Validator::new(json!({ "genre": null, "country": "  USA " }));
        assert_eq!(v.nullable_string("genre", 100), Some(None));
        assert_eq!(v.nullable_string("country", 100), Some(Some("USA".to_string())));
        assert_eq!(v.nullable_string("name", 100), None);
        assert!(v.is_valid());
    }

    #[test]
    fn test_empty_string_counts_as_null() {
        let mut v = Validator::new(json!({ "name": "   " }));
        assert_eq!(v.required_string("name", 255), None);
        assert!(!v.is_valid());
    }

    #[test]
    fn test_passwords_keep_surrounding_whitespace() {
        let mut v = Validator::new(json!({ "password": "  pass word  ", "blank": "" }));
        assert_eq!(
            v.required_password("password", 255),
            Some("  pass word  ".to_string())
        );
        assert_eq!(v.required_password("blank", 255), None);
        assert_eq!(v.required_password("missing", 255), None);
        let ApiError::Validation(errors) = v.into_error() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("blank").unwrap(), ["The blank field is required."]);
    }

    #[test]
    fn test_optional_string_rejects_null() {
        let mut v = Validator::new(json!({ "title": null }));
        assert_eq!(v.optional_string("title", 255), None);
        assert!(!v.is_valid());
    }

    #[test]
    fn test_string_length_and_type() {
        let mut v = Validator::new(json!({ "name": "x".repeat(256), "genre": 12 }));
        assert_eq!(v.required_string("name", 255), None);
        assert_eq!(v.nullable_string("genre", 100), None);
        let ApiError::Validation(errors) = v.into_error() else {
            panic!("expected validation error");
        };
        assert_eq!(
            errors.get("name").unwrap(),
            ["The name field must not be greater than 255 characters."]
        );
        assert_eq!(errors.get("genre").unwrap(), ["The genre field must be a string."]);
    }

    #[test]
    fn test_integers_accept_numeric_strings() {
        let mut v = Validator::new(json!({ "duration": "404", "year": 2000.5 }));
        assert_eq!(v.required_integer("duration", None), Some(404));
        assert_eq!(v.nullable_integer("year", None), None);
        assert!(!v.is_valid());
    }

    #[test]
    fn test_integer_upper_bound() {
        let mut v = Validator::new(json!({ "duration": 901 }));
        assert_eq!(v.optional_integer("duration", Some(30..=900)), None);
        assert_eq!(
            v.into_error().to_string(),
            "The duration field must not be greater than 900."
        );
    }

    #[test]
    fn test_email_rules() {
        let mut v = Validator::new(json!({ "a": "test@test.com", "b": "Test@test.com", "c": "nope" }));
        assert_eq!(v.required_email("a", 255, true), Some("test@test.com".to_string()));
        assert_eq!(v.required_email("b", 255, true), None);
        assert_eq!(v.required_email("c", 255, false), None);
        let ApiError::Validation(errors) = v.into_error() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("b").unwrap(), ["The b field must be lowercase."]);
        assert_eq!(errors.get("c").unwrap(), ["The c field must be a valid email address."]);
    }

    #[test]
    fn test_confirmation_and_min_length() {
        let mut v = Validator::new(json!({ "password": "1234", "password_confirmation": "4321" }));
        assert!(!v.min_chars("password", "1234", 8));
        assert!(!v.confirmed("password"));
        let ApiError::Validation(errors) = v.into_error() else {
            panic!("expected validation error");
        };
        assert_eq!(errors.get("password").unwrap().len(), 2);
    }

    #[test]
    fn test_non_object_body_is_empty() {
        let mut v = Validator::new(json!([1, 2, 3]));
        assert_eq!(v.required_string("name", 255), None);
        assert!(v.finish().is_err());
    }
}
