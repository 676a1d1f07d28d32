//! Input specifications for task metadata.
//!
//! The core only carries specifications around; checking a value against
//! one is delegated to a [`MetaVerifier`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Coarse JSON type of a value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    /// `null`
    Null,
    /// `true` / `false`
    Bool,
    /// Integer number
    Integer,
    /// Floating point number
    Float,
    /// String
    String,
    /// Array
    Array,
    /// Object
    Object,
}

impl ValueKind {
    /// Classify a value
    #[must_use]
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => Self::Null,
            Value::Bool(_) => Self::Bool,
            Value::Number(n) if n.is_f64() => Self::Float,
            Value::Number(_) => Self::Integer,
            Value::String(_) => Self::String,
            Value::Array(_) => Self::Array,
            Value::Object(_) => Self::Object,
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::String => "string",
            Self::Array => "array",
            Self::Object => "object",
        };
        f.write_str(s)
    }
}

/// Expected shape of one specification entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldSpec {
    /// Any of the listed kinds
    Types(Vec<ValueKind>),
    /// A nested specification
    Nested(Specification),
}

/// Schema that a task's metadata is expected to satisfy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Specification {
    /// A named record type with its fields
    Record {
        /// Record type name
        name: String,
        /// Declared fields
        fields: Vec<(String, FieldSpec)>,
    },
    /// Ordered key / expectation pairs
    Fields(Vec<(String, FieldSpec)>),
}

impl Specification {
    /// Entries of this specification, in order
    #[must_use]
    pub fn entries(&self) -> &[(String, FieldSpec)] {
        match self {
            Self::Record { fields, .. } | Self::Fields(fields) => fields,
        }
    }
}

/// One mismatch reported by a verifier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Key that was required
    pub required_key: String,
    /// Kinds that would have been accepted
    pub required_types: Vec<ValueKind>,
    /// Kind actually presented, if the key was present
    pub presented_type: Option<ValueKind>,
    /// Value actually presented, if the key was present
    pub presented_value: Option<Value>,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.presented_type {
            Some(kind) => write!(
                f,
                "{}: expected one of {:?}, got {}",
                self.required_key, self.required_types, kind
            ),
            None => write!(f, "{}: missing", self.required_key),
        }
    }
}

/// Checks a value against a specification
pub trait MetaVerifier: Send + Sync {
    /// Return every field error; an empty list means the value conforms
    fn verify(&self, value: &Value, specification: &Specification) -> Vec<FieldError>;
}

impl<F> MetaVerifier for F
where
    F: Fn(&Value, &Specification) -> Vec<FieldError> + Send + Sync,
{
    fn verify(&self, value: &Value, specification: &Specification) -> Vec<FieldError> {
        self(value, specification)
    }
}
