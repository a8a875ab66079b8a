#![allow(clippy::result_large_err)]

//! `compro_entity_generate`: find or create a destination entity from the
//! current value, filling extra properties from the source row.
//!
//! ```yaml
//! field_tags:
//!   plugin: compro_entity_generate
//!   source: tags
//!   entity_type: taxonomy_term
//!   value_key: name
//!   bundle_key: vid
//!   bundle: tags
//!   default_values:
//!     description: source_field_name
//!     field_long_description: Default long description
//! ```
//!
//! A `default_values` entry names a source field when the row has a non-null
//! field of that name, and is a literal otherwise. There is no escape syntax:
//! a literal that happens to equal a field name is read as a reference.

use crate::core::destination::{EntityValueMap, EntityWriter, GenerateRequest};
use crate::core::error::AppError;
use crate::core::process::plugin::{
    parse_config, PluginConfig, PluginDeps, ProcessPlugin, RowContext, StageOutcome,
};
use crate::core::row::{FieldValue, SourceRow};
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub const PLUGIN_ID: &str = "compro_entity_generate";

/// Destination property filled from a source field or a literal.
#[derive(Debug, Clone, PartialEq)]
pub struct DefaultValueRule {
    pub property: String,
    pub value: Value,
}

impl DefaultValueRule {
    pub fn new(property: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }

    /// Source field wins when present; otherwise the rule value is the literal.
    pub fn resolve(&self, row: &SourceRow) -> Value {
        match &self.value {
            Value::String(field) if row.has_value(field) => {
                row.get(field).cloned().unwrap_or(Value::Null)
            }
            literal => literal.clone(),
        }
    }
}

/// Bundle property and the bundle every generated entity belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleTag {
    pub key: String,
    pub bundle: String,
}

/// Keys used to look up (or create) the destination entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityLookup {
    pub entity_type: String,
    pub value_key: String,
    pub bundle: Option<BundleTag>,
}

/// Build the value map for a generated entity.
///
/// The lookup key is always set, the bundle key only when a bundle is
/// configured, then each default rule in declared order. Later rules
/// overwrite earlier keys, including the lookup and bundle keys.
pub fn materialize(
    lookup_value: Value,
    lookup: &EntityLookup,
    rules: &[DefaultValueRule],
    row: &SourceRow,
) -> EntityValueMap {
    let mut values = EntityValueMap::new();
    values.insert(lookup.value_key.clone(), lookup_value);
    if let Some(tag) = &lookup.bundle {
        values.insert(tag.key.clone(), Value::String(tag.bundle.clone()));
    }
    for rule in rules {
        values.insert(rule.property.clone(), rule.resolve(row));
    }
    values
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntityGenerateConfig {
    entity_type: String,
    value_key: String,
    #[serde(default)]
    bundle_key: Option<String>,
    #[serde(default)]
    bundle: Option<String>,
    #[serde(default)]
    default_values: IndexMap<String, Value>,
}

pub struct EntityGenerate {
    lookup: EntityLookup,
    rules: Vec<DefaultValueRule>,
    writer: Arc<dyn EntityWriter>,
}

impl EntityGenerate {
    pub fn new(
        lookup: EntityLookup,
        rules: Vec<DefaultValueRule>,
        writer: Arc<dyn EntityWriter>,
    ) -> Self {
        Self {
            lookup,
            rules,
            writer,
        }
    }

    pub fn from_config(
        config: &PluginConfig,
        deps: &PluginDeps,
    ) -> Result<Arc<dyn ProcessPlugin>, AppError> {
        let parsed: EntityGenerateConfig = parse_config(PLUGIN_ID, config)?;
        if parsed.entity_type.trim().is_empty() || parsed.value_key.trim().is_empty() {
            return Err(AppError::configuration(format!(
                "{}: entity_type and value_key must not be empty",
                PLUGIN_ID
            ))
            .with_code("MIG-CFG-005"));
        }
        let bundle = match (parsed.bundle_key, parsed.bundle) {
            (Some(key), Some(bundle)) => Some(BundleTag { key, bundle }),
            (None, None) => None,
            (Some(_), None) | (None, Some(_)) => {
                return Err(AppError::configuration(format!(
                    "{}: bundle_key and bundle must be configured together",
                    PLUGIN_ID
                ))
                .with_code("MIG-CFG-005"));
            }
        };
        let rules = parsed
            .default_values
            .into_iter()
            .map(|(property, value)| DefaultValueRule { property, value })
            .collect();
        let lookup = EntityLookup {
            entity_type: parsed.entity_type,
            value_key: parsed.value_key,
            bundle,
        };
        Ok(Arc::new(Self::new(lookup, rules, deps.writer.clone())))
    }

    pub fn lookup(&self) -> &EntityLookup {
        &self.lookup
    }
}

impl ProcessPlugin for EntityGenerate {
    fn id(&self) -> &'static str {
        PLUGIN_ID
    }

    fn transform(
        &self,
        value: FieldValue,
        ctx: &RowContext<'_>,
    ) -> Result<StageOutcome, AppError> {
        let value = match value {
            None | Some(Value::Null) => return Ok(StageOutcome::Unset),
            Some(Value::String(text)) if text.is_empty() => return Ok(StageOutcome::Unset),
            Some(value) => value,
        };
        let values = materialize(value, &self.lookup, &self.rules, ctx.row);
        let id = self.writer.lookup_or_create(&GenerateRequest {
            entity_type: &self.lookup.entity_type,
            lookup_key: &self.lookup.value_key,
            bundle_key: self.lookup.bundle.as_ref().map(|tag| tag.key.as_str()),
            values: &values,
        })?;
        Ok(StageOutcome::Value(id))
    }
}
