#![allow(clippy::result_large_err)] // Definition loading returns AppError to preserve validation context without boxing.

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

/// A migration as written in YAML.
///
/// ```yaml
/// id: legacy_contacts
/// source:
///   ids: [contact_id]
/// process:
///   title: name
///   field_phone:
///     plugin: format_phone_number
///     source: phone
///   uid:
///     - plugin: skip_row_if_entity_not_exist
///       source: author
///       entity_type: user
///       property_name: uid
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MigrationDefinition {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub source: SourceSettings,
    pub process: IndexMap<String, ProcessEntry>,
}

/// Source-side settings of a migration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSettings {
    /// Fields identifying a source row in messages and errors.
    #[serde(default)]
    pub ids: Vec<String>,
}

/// Process configuration for one destination property.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(untagged)]
pub enum ProcessEntry {
    /// `property: source_field` shorthand for the `get` plugin.
    Source(String),
    Stage(StageDefinition),
    Pipeline(Vec<StageDefinition>),
}

impl ProcessEntry {
    pub fn stages(&self) -> Vec<StageDefinition> {
        match self {
            ProcessEntry::Source(source) => vec![StageDefinition {
                plugin: crate::core::process::plugins::get::PLUGIN_ID.to_string(),
                source: Some(source.clone()),
                config: Map::new(),
            }],
            ProcessEntry::Stage(stage) => vec![stage.clone()],
            ProcessEntry::Pipeline(stages) => stages.clone(),
        }
    }
}

/// One plugin invocation; remaining keys are the plugin's own options.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StageDefinition {
    pub plugin: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(flatten)]
    pub config: Map<String, Value>,
}

impl MigrationDefinition {
    pub fn from_yaml_str(content: &str) -> Result<Self, AppError> {
        let definition: MigrationDefinition = serde_yaml::from_str(content).map_err(|e| {
            AppError::configuration(format!("Failed to parse migration definition: {}", e))
                .with_code("MIG-CFG-010")
        })?;
        definition.validate()?;
        Ok(definition)
    }

    /// Load a definition file.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read migration definition {}", path.display()),
            )
            .with_code("MIG-CFG-010")
            .with_source(e)
        })?;
        Self::from_yaml_str(&content).map_err(|mut err| {
            err.add_context("file", &path.display().to_string());
            err
        })
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.id.trim().is_empty() {
            return Err(
                AppError::configuration("migration id cannot be empty").with_code("MIG-CFG-011")
            );
        }
        if self.process.is_empty() {
            return Err(AppError::configuration(format!(
                "migration '{}' has no process configuration",
                self.id
            ))
            .with_code("MIG-CFG-011"));
        }
        for (property, entry) in &self.process {
            let stages = entry.stages();
            if stages.is_empty() {
                return Err(AppError::configuration(format!(
                    "process pipeline for '{}' is empty",
                    property
                ))
                .with_code("MIG-CFG-011"));
            }
            if stages.iter().any(|stage| stage.plugin.trim().is_empty()) {
                return Err(AppError::configuration(format!(
                    "process stage for '{}' is missing a plugin id",
                    property
                ))
                .with_code("MIG-CFG-011"));
            }
        }
        Ok(())
    }
}
