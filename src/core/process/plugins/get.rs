#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::process::plugin::{
    parse_config, PluginConfig, PluginDeps, ProcessPlugin, RowContext, StageOutcome,
};
use crate::core::row::FieldValue;
use serde::Deserialize;
use std::sync::Arc;

pub const PLUGIN_ID: &str = "get";

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct GetConfig {}

/// Copies the selected source value unchanged. `field: source_name` in a
/// migration definition is shorthand for this plugin.
pub struct Get;

impl Get {
    pub fn from_config(
        config: &PluginConfig,
        _deps: &PluginDeps,
    ) -> Result<Arc<dyn ProcessPlugin>, AppError> {
        let _: GetConfig = parse_config(PLUGIN_ID, config)?;
        Ok(Arc::new(Get))
    }
}

impl ProcessPlugin for Get {
    fn id(&self) -> &'static str {
        PLUGIN_ID
    }

    fn handles_multiples(&self) -> bool {
        true
    }

    fn transform(
        &self,
        value: FieldValue,
        _ctx: &RowContext<'_>,
    ) -> Result<StageOutcome, AppError> {
        Ok(StageOutcome::from_field(value))
    }
}
