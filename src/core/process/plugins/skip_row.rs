#![allow(clippy::result_large_err)]

//! Existence gates: skip the current row depending on whether a destination
//! entity matches the value.
//!
//! ```yaml
//! uid:
//!   - plugin: skip_row_if_entity_not_exist
//!     source: author_id
//!     entity_type: user
//!     property_name: uid
//!     message: 'User entity not found.'
//! ```
//!
//! `skip_row_if_entity_exists` skips when a match exists; with
//! `inverse_check: true` it skips when none does, which is exactly what
//! `skip_row_if_entity_not_exist` always does. Both read `entity_type`
//! (default `node`) and `property_name` (default `nid`). An array value is
//! checked as a whole: it matches an entity holding any of its elements.

use crate::core::destination::ExistenceChecker;
use crate::core::error::AppError;
use crate::core::process::plugin::{
    parse_config, PluginConfig, PluginDeps, ProcessPlugin, RowContext, StageOutcome,
};
use crate::core::row::{scalar_text, FieldValue};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

pub const EXISTS_PLUGIN_ID: &str = "skip_row_if_entity_exists";
pub const NOT_EXIST_PLUGIN_ID: &str = "skip_row_if_entity_not_exist";
pub const DEFAULT_ENTITY_TYPE: &str = "node";
pub const DEFAULT_PROPERTY_NAME: &str = "nid";

/// Whether the row continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Pass,
    Skip,
}

/// Skip when something matched and the check is not inverted, or when nothing
/// matched and it is.
pub fn evaluate(count: u64, inverse: bool) -> GateDecision {
    if (count > 0) != inverse {
        GateDecision::Skip
    } else {
        GateDecision::Pass
    }
}

/// Existence check plus polarity and the message recorded on skip.
#[derive(Clone)]
pub struct RowGate {
    checker: ExistenceChecker,
    inverse: bool,
    message: String,
}

impl RowGate {
    pub fn new(checker: ExistenceChecker, inverse: bool, message: impl Into<String>) -> Self {
        Self {
            checker,
            inverse,
            message: message.into(),
        }
    }

    pub fn is_inverse(&self) -> bool {
        self.inverse
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn decide(&self, value: &Value) -> Result<GateDecision, AppError> {
        let count = self.checker.count(value)?;
        Ok(evaluate(count, self.inverse))
    }

    /// Pass returns the input untouched; the gate never rewrites values.
    pub fn apply(&self, value: FieldValue) -> Result<StageOutcome, AppError> {
        let probe = value.clone().unwrap_or(Value::Null);
        match self.decide(&probe)? {
            GateDecision::Pass => Ok(StageOutcome::from_field(value)),
            GateDecision::Skip => {
                tracing::debug!(
                    entity_type = %self.checker.entity_type(),
                    property = %self.checker.property_name(),
                    value = %scalar_text(&probe),
                    inverse = self.inverse,
                    "existence gate skipping row"
                );
                Ok(StageOutcome::SkipRow {
                    message: self.message.clone(),
                })
            }
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntityExistsConfig {
    #[serde(default)]
    entity_type: Option<String>,
    #[serde(default)]
    property_name: Option<String>,
    #[serde(default)]
    inverse_check: bool,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct EntityNotExistConfig {
    #[serde(default)]
    entity_type: Option<String>,
    #[serde(default)]
    property_name: Option<String>,
    #[serde(default)]
    message: String,
}

/// Process plugin wrapping a [`RowGate`]. One type serves both plugin ids.
pub struct SkipRowIfEntity {
    id: &'static str,
    gate: RowGate,
}

impl SkipRowIfEntity {
    pub fn new(id: &'static str, gate: RowGate) -> Self {
        Self { id, gate }
    }

    pub fn gate(&self) -> &RowGate {
        &self.gate
    }

    pub fn exists_from_config(
        config: &PluginConfig,
        deps: &PluginDeps,
    ) -> Result<Arc<dyn ProcessPlugin>, AppError> {
        reject_legacy_keys(EXISTS_PLUGIN_ID, config)?;
        let parsed: EntityExistsConfig = parse_config(EXISTS_PLUGIN_ID, config)?;
        let checker = checker(deps, parsed.entity_type, parsed.property_name);
        Ok(Arc::new(Self::new(
            EXISTS_PLUGIN_ID,
            RowGate::new(checker, parsed.inverse_check, parsed.message),
        )))
    }

    pub fn not_exist_from_config(
        config: &PluginConfig,
        deps: &PluginDeps,
    ) -> Result<Arc<dyn ProcessPlugin>, AppError> {
        reject_legacy_keys(NOT_EXIST_PLUGIN_ID, config)?;
        let parsed: EntityNotExistConfig = parse_config(NOT_EXIST_PLUGIN_ID, config)?;
        let checker = checker(deps, parsed.entity_type, parsed.property_name);
        Ok(Arc::new(Self::new(
            NOT_EXIST_PLUGIN_ID,
            RowGate::new(checker, true, parsed.message),
        )))
    }
}

impl ProcessPlugin for SkipRowIfEntity {
    fn id(&self) -> &'static str {
        self.id
    }

    /// A multi-value input is checked in one query, matching any element.
    fn handles_multiples(&self) -> bool {
        true
    }

    fn transform(
        &self,
        value: FieldValue,
        _ctx: &RowContext<'_>,
    ) -> Result<StageOutcome, AppError> {
        self.gate.apply(value)
    }
}

/// Blank settings fall back to the defaults.
fn checker(
    deps: &PluginDeps,
    entity_type: Option<String>,
    property_name: Option<String>,
) -> ExistenceChecker {
    let entity_type = entity_type
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ENTITY_TYPE.to_string());
    let property_name = property_name
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_PROPERTY_NAME.to_string());
    ExistenceChecker::new(deps.destination.clone(), entity_type, property_name)
}

fn reject_legacy_keys(plugin_id: &str, config: &PluginConfig) -> Result<(), AppError> {
    for (legacy, current) in [("entity", "entity_type"), ("property", "property_name")] {
        if config.contains_key(legacy) {
            return Err(AppError::configuration(format!(
                "{}: '{}' is not a recognized option, use '{}'",
                plugin_id, legacy, current
            ))
            .with_code("MIG-CFG-004"));
        }
    }
    Ok(())
}
