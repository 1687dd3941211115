// Declarative input validation for operation parameters.
//
// Each definition carries an `InputSchema`; `validate` collects every
// field-level violation so callers can render them all, not just the
// first.

use chrono::{DateTime, Utc};
use folio_common::error::FieldViolation;
use serde_json::Value;
use uuid::Uuid;

/// Structural kind a parameter field must satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    String,
    Integer,
    Boolean,
    Array,
    Object,
    /// RFC 3339 timestamp carried as a JSON string.
    Timestamp,
    /// UUID carried as a JSON string.
    Uuid,
}

impl FieldKind {
    const fn expectation(self) -> &'static str {
        match self {
            Self::String => "must be a string",
            Self::Integer => "must be an integer",
            Self::Boolean => "must be a boolean",
            Self::Array => "must be an array",
            Self::Object => "must be an object",
            Self::Timestamp => "must be an RFC 3339 timestamp",
            Self::Uuid => "must be a UUID",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Timestamp => value
                .as_str()
                .is_some_and(|raw| raw.parse::<DateTime<Utc>>().is_ok()),
            Self::Uuid => value.as_str().is_some_and(|raw| Uuid::parse_str(raw).is_ok()),
        }
    }
}

#[derive(Debug, Clone)]
struct FieldRule {
    name: &'static str,
    kind: FieldKind,
    required: bool,
    reject_empty: bool,
}

/// Structural validator for one operation's JSON params.
#[derive(Debug, Clone, Default)]
pub struct InputSchema {
    fields: Vec<FieldRule>,
    deny_unknown: bool,
}

impl InputSchema {
    /// A schema expecting a JSON object (or null, treated as `{}`).
    pub fn object() -> Self {
        Self::default()
    }

    pub fn required(mut self, name: &'static str, kind: FieldKind) -> Self {
        self.fields.push(FieldRule { name, kind, required: true, reject_empty: false });
        self
    }

    pub fn optional(mut self, name: &'static str, kind: FieldKind) -> Self {
        self.fields.push(FieldRule { name, kind, required: false, reject_empty: false });
        self
    }

    /// Reject blank strings for the named field (most name/id fields).
    pub fn non_empty(mut self, name: &'static str) -> Self {
        if let Some(rule) = self.fields.iter_mut().find(|rule| rule.name == name) {
            rule.reject_empty = true;
        }
        self
    }

    /// Treat fields outside the schema as violations.
    pub fn deny_unknown_fields(mut self) -> Self {
        self.deny_unknown = true;
        self
    }

    /// Validate raw params, returning the full violation list. Empty
    /// means the input is acceptable.
    pub fn validate(&self, params: &Value) -> Vec<FieldViolation> {
        let object = match params {
            Value::Object(map) => map,
            Value::Null => {
                return self
                    .fields
                    .iter()
                    .filter(|rule| rule.required)
                    .map(|rule| FieldViolation::new(rule.name, "is required"))
                    .collect();
            }
            _ => return vec![FieldViolation::new("params", "must be an object")],
        };

        let mut violations = Vec::new();

        for rule in &self.fields {
            let value = match object.get(rule.name) {
                Some(value) => value,
                None => {
                    if rule.required {
                        violations.push(FieldViolation::new(rule.name, "is required"));
                    }
                    continue;
                }
            };

            // An explicit null on an optional field reads as absent.
            if value.is_null() {
                if rule.required {
                    violations.push(FieldViolation::new(rule.name, "is required"));
                }
                continue;
            }

            if !rule.kind.matches(value) {
                violations.push(FieldViolation::new(rule.name, rule.kind.expectation()));
                continue;
            }

            if rule.reject_empty && value.as_str().is_some_and(|raw| raw.trim().is_empty()) {
                violations.push(FieldViolation::new(rule.name, "must not be empty"));
            }
        }

        if self.deny_unknown {
            for name in object.keys() {
                if !self.fields.iter().any(|rule| rule.name == name) {
                    violations.push(FieldViolation::new(name, "is not a recognized field"));
                }
            }
        }

        violations
    }
}
