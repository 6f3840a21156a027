//! YAML configuration file.
//!
//! Decodes the file into the declaration tree (databases → tables → rules and
//! filter groups). Only syntax is checked here; names, columns and
//! cross-table references are resolved by [`crate::schema::DatabaseBuilder`].

use crate::dumper::FailureMode;
use crate::filter::FilterGroupDecl;
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_yaml_ng::Value;
use std::path::Path;

/// Top-level configuration file structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    #[serde(default)]
    pub connection: ConnectionSettings,

    /// mysqldump binary name or path
    #[serde(default = "default_binpath")]
    pub binpath: String,

    /// Extra arguments passed to every extraction
    #[serde(default)]
    pub extra_args: Vec<String>,

    /// Run-wide deadline in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Maximum number of tables dumped at once
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_concurrency: Option<usize>,

    #[serde(default)]
    pub failure_mode: FailureMode,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_character_set: Option<String>,

    /// In megabytes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_allowed_packet: Option<u64>,

    #[serde(default)]
    pub databases: Vec<DatabaseDecl>,
}

fn default_binpath() -> String {
    "mysqldump".to_string()
}

fn default_timeout_secs() -> u64 {
    3600
}

impl DumpConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to read config {}: {}", path.display(), e))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml_ng::from_str(content)?;
        Ok(config)
    }
}

/// Server connection settings shared by schema introspection and extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_user")]
    pub user: String,
    #[serde(default, skip_serializing)]
    pub password: Option<String>,
    /// Unix socket; takes precedence over host/port
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub socket: Option<String>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_user() -> String {
    "root".to_string()
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: None,
            socket: None,
        }
    }
}

/// One database block
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseDecl {
    pub name: String,
    /// Database the output `USE` statement targets (defaults to `name`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default)]
    pub tables: Vec<TableDecl>,
}

impl DatabaseDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            destination: None,
            tables: Vec::new(),
        }
    }

    pub fn table(mut self, table: TableDecl) -> Self {
        self.tables.push(table);
        self
    }
}

/// One table block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableDecl {
    pub name: String,
    /// Literal predicate text, used verbatim
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sample: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
    /// Table name INSERTs are emitted against (defaults to `name`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(default)]
    pub rules: Vec<RuleDecl>,
    /// OR-combined filter groups
    #[serde(default, skip_serializing)]
    pub filter: Vec<FilterGroupDecl>,
}

impl TableDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// One rule block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleDecl {
    #[serde(rename = "type")]
    pub rule_type: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub surrogate: Option<String>,
}

impl RuleDecl {
    pub fn new(rule_type: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            rule_type: rule_type.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            ..Default::default()
        }
    }
}

impl<'de> Deserialize<'de> for FilterGroupDecl {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mapping = serde_yaml_ng::Mapping::deserialize(deserializer)?;
        let mut attributes = Vec::with_capacity(mapping.len());
        for (key, value) in mapping {
            let Value::String(column) = key else {
                return Err(de::Error::custom(format!(
                    "filter column names must be strings, got {}",
                    expression_text(&key)
                )));
            };
            attributes.push((column, expression_text(&value)));
        }
        Ok(FilterGroupDecl(attributes))
    }
}

/// Render a YAML value as filter expression text.
///
/// Strings are taken verbatim. Sequences and mappings render as tuple text,
/// which expression parsing rejects.
fn expression_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => format!(
            "[{}]",
            items.iter().map(expression_text).collect::<Vec<_>>().join(", ")
        ),
        Value::Mapping(map) => format!(
            "{{{}}}",
            map.iter()
                .map(|(k, v)| format!("{}: {}", expression_text(k), expression_text(v)))
                .collect::<Vec<_>>()
                .join(", ")
        ),
        Value::Tagged(tagged) => expression_text(&tagged.value),
    }
}
