use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use crate::model::{FieldDescriptor, LogicalType, Model};
use crate::storage::ConnectionConfig;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LitestoreConfig {
    #[serde(default)]
    pub database: ConnectionConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub table: String,
    #[serde(default = "default_id_property")]
    pub id_property: String,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            table: "people".to_string(),
            id_property: default_id_property(),
            fields: vec![FieldConfig::new("id", LogicalType::Int), FieldConfig::new("name", LogicalType::String)],
        }
    }
}

impl ModelConfig {
    pub fn to_model(&self) -> Model {
        Model::new(
            self.id_property.clone(),
            self.fields.iter().map(FieldConfig::to_descriptor).collect(),
        )
    }
}

/// One `[[model.fields]]` entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldConfig {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: LogicalType,
    #[serde(default = "default_persist")]
    pub persist: bool,
    /// Overrides the type-derived opaque codec choice
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opaque: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub option: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldConfig {
    pub fn new(name: impl Into<String>, field_type: LogicalType) -> Self {
        Self {
            name: name.into(),
            field_type,
            persist: true,
            opaque: None,
            option: None,
            default: None,
        }
    }

    pub fn to_descriptor(&self) -> FieldDescriptor {
        let mut field = FieldDescriptor::new(self.name.clone(), self.field_type.clone());
        if !self.persist {
            field = field.transient();
        }
        if let Some(opaque) = self.opaque {
            field = field.with_opaque_codec(opaque);
        }
        if let Some(option) = &self.option {
            field = field.with_option(option.clone());
        }
        if let Some(default) = &self.default {
            field = field.with_default(default.clone());
        }
        field
    }
}

fn default_id_property() -> String {
    "id".to_string()
}

fn default_persist() -> bool {
    true
}

impl LitestoreConfig {
    pub fn from_toml_str(contents: &str) -> crate::Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("litestore.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<LitestoreConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config = LitestoreConfig::from_toml_str(&contents)?;
    Ok(Some(config))
}

pub fn write_config(path: &Path, config: &LitestoreConfig, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("config already exists at {} (use --force to overwrite)", path.display());
    }

    let contents = toml::to_string_pretty(config)?;
    std::fs::write(path, contents)?;
    Ok(())
}

pub fn ensure_db_dir(db_path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_model_config() {
        let config = LitestoreConfig::from_toml_str(
            r#"
            [database]
            name = "data/app.db"

            [model]
            table = "tasks"

            [[model.fields]]
            name = "id"
            type = "int"

            [[model.fields]]
            name = "tags"
            type = "array"

            [[model.fields]]
            name = "done"
            type = "boolean"
            default = false

            [[model.fields]]
            name = "scratch"
            persist = false
            "#,
        )
        .unwrap();

        assert_eq!(config.database.name, "data/app.db");
        assert_eq!(config.database.version, "1.0");

        let model = config.model.to_model();
        assert_eq!(model.id_property(), "id");
        assert!(model.field("id").unwrap().is_identity);
        assert!(model.field("tags").unwrap().requires_opaque_codec);
        assert_eq!(model.field("done").unwrap().default_value, Some(json!(false)));
        assert!(!model.field("scratch").unwrap().persist);
        assert_eq!(model.field("scratch").unwrap().declared_type, LogicalType::Auto);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = LitestoreConfig::from_toml_str("[model\n").unwrap_err();
        assert!(matches!(err, crate::Error::Config(_)));
    }

    #[test]
    fn test_write_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("litestore.toml");

        assert!(load_config(Some(&path)).unwrap().is_none());

        write_config(&path, &LitestoreConfig::default(), false).unwrap();
        assert!(write_config(&path, &LitestoreConfig::default(), false).is_err());
        write_config(&path, &LitestoreConfig::default(), true).unwrap();

        let loaded = load_config(Some(&path)).unwrap().unwrap();
        assert_eq!(loaded.model.table, "people");
        assert_eq!(loaded.model.to_model(), Model::default());
    }

    #[test]
    fn test_ensure_db_dir() {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("nested").join("store.db");
        ensure_db_dir(&db).unwrap();
        assert!(db.parent().unwrap().is_dir());
    }
}
