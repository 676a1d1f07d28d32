//! Context records threaded through a task graph.
//!
//! A [`Meta`] is either a free-form mapping or a fixed-schema [`Record`].
//! Both are read and written through the same interface, so callers never
//! need to know which representation they were handed.

use crate::error::{CoreError, CoreResult};
use indexmap::IndexMap;
use serde::de::{Deserialize, Deserializer};
use serde::ser::{Serialize, Serializer};
use serde_json::{Map, Value};

/// Context record passed down a task graph
#[derive(Debug, Clone, PartialEq)]
pub enum Meta {
    /// Free-form string keyed mapping
    Mapping(Map<String, Value>),
    /// Fixed-schema record
    Record(Record),
}

impl Meta {
    /// Create an empty mapping
    #[must_use]
    pub fn new() -> Self {
        Self::Mapping(Map::new())
    }

    /// Build a meta from a JSON value.
    ///
    /// `null` is treated as an empty mapping.
    ///
    /// # Errors
    ///
    /// Returns error if the value is neither an object nor `null`
    pub fn from_value(value: Value) -> CoreResult<Self> {
        match value {
            Value::Object(map) => Ok(Self::Mapping(map)),
            Value::Null => Ok(Self::new()),
            other => Err(CoreError::UnexpectedValue {
                expected: "object".to_string(),
                found: crate::ValueKind::of(&other).to_string(),
            }),
        }
    }

    /// Read a key
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Mapping(map) => map.get(key),
            Self::Record(record) => record.get(key),
        }
    }

    /// Read a key, falling back to `default` when absent
    #[must_use]
    pub fn get_or(&self, key: &str, default: Value) -> Value {
        self.get(key).cloned().unwrap_or(default)
    }

    /// Context for a dependency named `key`.
    ///
    /// Nested objects become the child's mapping; anything else narrows to
    /// an empty mapping.
    #[must_use]
    pub fn child(&self, key: &str) -> Meta {
        match self.get(key) {
            Some(Value::Object(map)) => Self::Mapping(map.clone()),
            _ => Self::new(),
        }
    }

    /// Write a key
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        match self {
            Self::Mapping(map) => {
                map.insert(key.into(), value);
            }
            Self::Record(record) => record.set(key, value),
        }
    }

    /// Write several keys at once
    pub fn update<K, I>(&mut self, pairs: I)
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, Value)>,
    {
        for (key, value) in pairs {
            self.set(key, value);
        }
    }

    /// Check if a key is readable
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Render as a JSON object
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Mapping(map) => Value::Object(map.clone()),
            Self::Record(record) => Value::Object(record.to_map()),
        }
    }
}

impl Default for Meta {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Map<String, Value>> for Meta {
    fn from(map: Map<String, Value>) -> Self {
        Self::Mapping(map)
    }
}

impl TryFrom<Value> for Meta {
    type Error = CoreError;

    fn try_from(value: Value) -> CoreResult<Self> {
        Self::from_value(value)
    }
}

impl From<Record> for Meta {
    fn from(record: Record) -> Self {
        Self::Record(record)
    }
}

impl Serialize for Meta {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Meta {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(serde::de::Error::custom)
    }
}

/// Fixed-schema record.
///
/// Fields declared at construction are the record's schema. Writing a key
/// outside the schema is allowed: it becomes readable through [`Record::get`]
/// but is not listed by [`Record::fields`].
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    name: String,
    declared: IndexMap<String, Value>,
    extra: IndexMap<String, Value>,
}

impl Record {
    /// Create a record type with no fields
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared: IndexMap::new(),
            extra: IndexMap::new(),
        }
    }

    /// Declare a field with its initial value
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.declared.insert(key.into(), value);
        self
    }

    /// Record type name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared field names, in declaration order
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.declared.keys().map(String::as_str)
    }

    /// Read a declared field or an extra attribute
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.declared.get(key).or_else(|| self.extra.get(key))
    }

    /// Write a field; undeclared keys become extra attributes
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        let key = key.into();
        if let Some(slot) = self.declared.get_mut(&key) {
            *slot = value;
        } else {
            self.extra.insert(key, value);
        }
    }

    fn to_map(&self) -> Map<String, Value> {
        self.declared
            .iter()
            .chain(self.extra.iter())
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn example_record() -> Record {
        Record::new("Example")
            .with_field("a", json!(0))
            .with_field("b", json!(0.0))
            .with_field("c", json!([]))
    }

    #[test]
    fn test_mapping_get() {
        let meta = Meta::from_value(json!({"start": 2, "stop": 5})).unwrap();
        assert_eq!(meta.get("start"), Some(&json!(2)));
        assert_eq!(meta.get("missing"), None);
        assert_eq!(meta.get_or("step", json!(1)), json!(1));
    }

    #[test]
    fn test_try_from_value() {
        assert_eq!(Meta::try_from(json!(null)).unwrap(), Meta::new());
        assert!(Meta::try_from(json!([1, 2])).is_err());
    }

    #[test]
    fn test_record_get() {
        let meta = Meta::from(example_record());
        assert_eq!(meta.get("a"), Some(&json!(0)));
        assert_eq!(meta.get("c"), Some(&json!([])));
        assert_eq!(meta.get_or("d", json!("D")), json!("D"));
    }

    #[test]
    fn test_record_update_undeclared_key() {
        let mut meta = Meta::from(example_record());
        meta.update([("a", json!(1)), ("d", json!("D"))]);

        assert_eq!(meta.get("a"), Some(&json!(1)));
        assert_eq!(meta.get("d"), Some(&json!("D")));

        let Meta::Record(record) = &meta else {
            panic!("expected record");
        };
        let fields: Vec<_> = record.fields().collect();
        assert_eq!(fields, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_child_narrowing() {
        let meta = Meta::from_value(json!({
            "int_range": {"start": 3},
            "data_scale": 10
        }))
        .unwrap();

        assert_eq!(meta.child("int_range").get("start"), Some(&json!(3)));
        assert_eq!(meta.child("data_scale"), Meta::new());
        assert_eq!(meta.child("absent"), Meta::new());
    }

    #[test]
    fn test_from_value_rejects_scalars() {
        assert!(Meta::from_value(json!(5)).is_err());
        assert_eq!(Meta::from_value(Value::Null).unwrap(), Meta::new());
    }

    #[test]
    fn test_serialize_record_includes_extra() {
        let mut record = example_record();
        record.set("d", json!(true));
        let value = serde_json::to_value(Meta::from(record)).unwrap();
        assert_eq!(value, json!({"a": 0, "b": 0.0, "c": [], "d": true}));
    }

    #[test]
    fn test_deserialize_roundtrip() {
        let meta: Meta = serde_json::from_str(r#"{"x": [1, 2]}"#).unwrap();
        assert_eq!(meta.get("x"), Some(&json!([1, 2])));
        let back = serde_json::to_string(&meta).unwrap();
        assert_eq!(back, r#"{"x":[1,2]}"#);
    }
}
