//! Field descriptors
//!
//! Every model field declares a logical type. The closed set below covers
//! the types the proxy knows how to store; anything else is carried as
//! `Other` and passed through to the column definition untouched.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::convert::Infallible;
use std::str::FromStr;

/// Logical type declared by a model field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogicalType {
    Int,
    Float,
    String,
    Array,
    Object,
    Date,
    Boolean,
    /// Open type: any JSON value, always stored encoded
    #[default]
    Auto,
    /// Unknown declared type, kept verbatim
    Other(String),
}

impl LogicalType {
    /// Get the string representation of the logical type
    pub fn as_str(&self) -> &str {
        match self {
            LogicalType::Int => "int",
            LogicalType::Float => "float",
            LogicalType::String => "string",
            LogicalType::Array => "array",
            LogicalType::Object => "object",
            LogicalType::Date => "date",
            LogicalType::Boolean => "boolean",
            LogicalType::Auto => "auto",
            LogicalType::Other(name) => name,
        }
    }

    /// Whether values of this type have no native column form and must go
    /// through the opaque codec.
    pub fn is_open(&self) -> bool {
        matches!(self, LogicalType::Auto | LogicalType::Array | LogicalType::Object)
    }
}

impl FromStr for LogicalType {
    type Err = Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "int" | "integer" => LogicalType::Int,
            "float" | "number" | "real" => LogicalType::Float,
            "string" | "text" => LogicalType::String,
            "array" => LogicalType::Array,
            "object" => LogicalType::Object,
            "date" | "datetime" => LogicalType::Date,
            "bool" | "boolean" => LogicalType::Boolean,
            "auto" | "" => LogicalType::Auto,
            _ => LogicalType::Other(s.trim().to_string()),
        })
    }
}

impl From<String> for LogicalType {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(ty) => ty,
            Err(never) => match never {},
        }
    }
}

impl From<LogicalType> for String {
    fn from(ty: LogicalType) -> Self {
        ty.as_str().to_string()
    }
}

impl std::fmt::Display for LogicalType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Description of one model field.
///
/// Built once per model and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    /// Field (and column) name
    pub name: String,
    /// Declared logical type
    pub declared_type: LogicalType,
    /// Whether the field is stored at all
    pub persist: bool,
    /// Values are JSON-encoded on write and decoded on read
    pub requires_opaque_codec: bool,
    /// Set on the model's identity field, which maps to the implicit rowid
    pub is_identity: bool,
    /// Extra column definition text appended after the SQL type
    pub option: Option<String>,
    /// Value back-filled into existing rows when the column is added later
    pub default_value: Option<Value>,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, declared_type: LogicalType) -> Self {
        let requires_opaque_codec = declared_type.is_open();
        Self {
            name: name.into(),
            declared_type,
            persist: true,
            requires_opaque_codec,
            is_identity: false,
            option: None,
            default_value: None,
        }
    }

    /// Mark the field as in-memory only
    pub fn transient(mut self) -> Self {
        self.persist = false;
        self
    }

    /// Override whether the opaque codec applies
    pub fn with_opaque_codec(mut self, enabled: bool) -> Self {
        self.requires_opaque_codec = enabled;
        self
    }

    pub fn with_option(mut self, option: impl Into<String>) -> Self {
        self.option = Some(option.into());
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }
}

/// A record shape: the identity property plus the ordered field list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Model {
    id_property: String,
    fields: Vec<FieldDescriptor>,
}

impl Model {
    /// Build a model, flagging the field named `id_property` as the identity.
    pub fn new(id_property: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        let id_property = id_property.into();
        let fields = fields
            .into_iter()
            .map(|mut f| {
                f.is_identity = f.name == id_property;
                f
            })
            .collect();
        Self { id_property, fields }
    }

    pub fn id_property(&self) -> &str {
        &self.id_property
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Find a field by name
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl Default for Model {
    /// The demo `people` shape: an integer id and a name.
    fn default() -> Self {
        Self::new(
            "id",
            vec![
                FieldDescriptor::new("id", LogicalType::Int),
                FieldDescriptor::new("name", LogicalType::String),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_type_parse() {
        assert_eq!("INT".parse::<LogicalType>().unwrap(), LogicalType::Int);
        assert_eq!("Boolean".parse::<LogicalType>().unwrap(), LogicalType::Boolean);
        assert_eq!("".parse::<LogicalType>().unwrap(), LogicalType::Auto);
        assert_eq!(
            "BLOB".parse::<LogicalType>().unwrap(),
            LogicalType::Other("BLOB".to_string())
        );
    }

    #[test]
    fn test_opaque_codec_defaults() {
        assert!(FieldDescriptor::new("tags", LogicalType::Array).requires_opaque_codec);
        assert!(FieldDescriptor::new("meta", LogicalType::Auto).requires_opaque_codec);
        assert!(!FieldDescriptor::new("name", LogicalType::String).requires_opaque_codec);
        assert!(!FieldDescriptor::new("raw", LogicalType::Other("BLOB".into())).requires_opaque_codec);

        let forced = FieldDescriptor::new("name", LogicalType::String).with_opaque_codec(true);
        assert!(forced.requires_opaque_codec);
    }

    #[test]
    fn test_model_marks_identity() {
        let model = Model::default();
        assert!(model.field("id").unwrap().is_identity);
        assert!(!model.field("name").unwrap().is_identity);
        assert!(model.field("missing").is_none());
    }
}
