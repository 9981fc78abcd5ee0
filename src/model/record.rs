//! In-memory records
//!
//! A record is a bag of JSON values keyed by field name plus the row id the
//! database assigned to it. A key missing from the bag is "undefined" and is
//! left out of writes entirely; an explicit `null` is written as NULL.

use serde_json::{Map, Value};

/// A model instance as seen by the proxy.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    id: Option<i64>,
    phantom: bool,
    data: Map<String, Value>,
}

impl Record {
    /// Create an unsaved (phantom) record
    pub fn new(data: Map<String, Value>) -> Self {
        Self {
            id: None,
            phantom: true,
            data,
        }
    }

    /// Create a record that already exists in the database
    pub fn with_id(id: i64, data: Map<String, Value>) -> Self {
        Self {
            id: Some(id),
            phantom: false,
            data,
        }
    }

    /// Build a phantom record from a JSON object; other values give an empty record.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(data) => Self::new(data),
            _ => Self::new(Map::new()),
        }
    }

    pub fn id(&self) -> Option<i64> {
        self.id
    }

    /// Whether the record has not been assigned a row id yet
    pub fn is_phantom(&self) -> bool {
        self.phantom
    }

    /// Attach a database-issued row id and clear the phantom flag
    pub fn set_id(&mut self, id: i64) {
        self.id = Some(id);
        self.phantom = false;
    }

    /// Get a field value; `None` means the field is undefined
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.data.insert(name.into(), value);
    }

    /// Render as one JSON object with the row id stored under `id_property`.
    pub fn to_json(&self, id_property: &str) -> Value {
        let mut object = self.data.clone();
        object.insert(
            id_property.to_string(),
            self.id.map(Value::from).unwrap_or(Value::Null),
        );
        Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_phantom_lifecycle() {
        let mut record = Record::from_json(json!({"name": "Jo"}));
        assert!(record.is_phantom());
        assert_eq!(record.id(), None);

        record.set_id(7);
        assert!(!record.is_phantom());
        assert_eq!(record.id(), Some(7));
    }

    #[test]
    fn test_undefined_vs_null() {
        let mut record = Record::from_json(json!({"name": null}));
        assert_eq!(record.get("name"), Some(&Value::Null));
        assert_eq!(record.get("age"), None);

        record.set("age", json!(4));
        assert_eq!(record.get("age"), Some(&json!(4)));
    }

    #[test]
    fn test_to_json_includes_id() {
        let record = Record::with_id(3, json!({"name": "Ann"}).as_object().unwrap().clone());
        assert_eq!(record.to_json("id"), json!({"id": 3, "name": "Ann"}));
    }
}
