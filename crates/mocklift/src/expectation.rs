//! Opaque expectation records exchanged with the mock server.
//!
//! The orchestrator never interprets an expectation. It only checks that a
//! payload is a JSON object, or an array of objects, before forwarding it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A single expectation, carried as an untyped JSON object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Expectation(Map<String, Value>);

impl Expectation {
    /// Wraps a JSON object.
    #[must_use]
    pub const fn new(fields: Map<String, Value>) -> Self {
        Self(fields)
    }

    /// The underlying JSON object.
    #[must_use]
    pub const fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Parses a payload holding one object or an array of objects.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError::Json`] for malformed JSON and
    /// [`ExpectationError::Shape`] for any other JSON shape.
    pub fn parse_many(payload: &str) -> Result<Vec<Self>, ExpectationError> {
        let value: Value = serde_json::from_str(payload).map_err(ExpectationError::Json)?;
        Self::from_value(value)
    }

    /// Splits an already parsed value into expectations.
    ///
    /// # Errors
    ///
    /// Returns [`ExpectationError::Shape`] unless the value is an object or an
    /// array made only of objects.
    pub fn from_value(value: Value) -> Result<Vec<Self>, ExpectationError> {
        match value {
            Value::Object(fields) => Ok(vec![Self(fields)]),
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| match item {
                    Value::Object(fields) => Ok(Self(fields)),
                    other => Err(ExpectationError::Shape {
                        found: format!("{} at index {index}", kind_of(&other)),
                    }),
                })
                .collect(),
            other => Err(ExpectationError::Shape {
                found: kind_of(&other).to_owned(),
            }),
        }
    }
}

impl From<Expectation> for Value {
    fn from(expectation: Expectation) -> Self {
        Self::Object(expectation.0)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Errors raised while reading expectation payloads.
#[derive(Debug, Error)]
pub enum ExpectationError {
    /// The payload is not valid JSON.
    #[error("expectation payload is not valid JSON: {0}")]
    Json(#[source] serde_json::Error),
    /// The payload is JSON but not an object or array of objects.
    #[error("expected an expectation object or an array of objects, found {found}")]
    Shape {
        /// Description of the offending value.
        found: String,
    },
}
