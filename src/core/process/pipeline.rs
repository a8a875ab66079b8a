#![allow(clippy::result_large_err)]

use crate::core::destination::EntityValueMap;
use crate::core::error::AppError;
use crate::core::process::plugin::{ProcessPlugin, RowContext, StageOutcome};
use crate::core::row::{FieldValue, SourceRow};
use serde_json::Value;
use std::sync::Arc;

/// Where a stage reads its input from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelector {
    /// A field of the source row.
    Row(String),
    /// A destination property already processed for this row (`@name`).
    Destination(String),
}

impl SourceSelector {
    pub fn parse(source: &str) -> Self {
        match source.strip_prefix('@') {
            Some(property) => SourceSelector::Destination(property.to_string()),
            None => SourceSelector::Row(source.to_string()),
        }
    }

    fn read(&self, ctx: &RowContext<'_>) -> FieldValue {
        match self {
            SourceSelector::Row(field) => ctx.row.get(field).cloned(),
            SourceSelector::Destination(property) => ctx.destination.get(property).cloned(),
        }
    }
}

/// One configured plugin in a destination property's pipeline.
#[derive(Clone)]
pub struct ProcessStage {
    plugin: Arc<dyn ProcessPlugin>,
    source: Option<SourceSelector>,
}

impl ProcessStage {
    pub fn new(plugin: Arc<dyn ProcessPlugin>, source: Option<SourceSelector>) -> Self {
        Self { plugin, source }
    }

    pub fn plugin_id(&self) -> &'static str {
        self.plugin.id()
    }

    pub fn source(&self) -> Option<&SourceSelector> {
        self.source.as_ref()
    }

    /// Arrays are split per element unless the plugin takes them whole. A
    /// skip from any element skips the row; unset elements are dropped, and
    /// an array left with no elements is no value.
    fn apply(&self, input: FieldValue, ctx: &RowContext<'_>) -> Result<StageOutcome, AppError> {
        match input {
            Some(Value::Array(items)) if !self.plugin.handles_multiples() => {
                let mut output = Vec::with_capacity(items.len());
                for item in items {
                    match self.plugin.transform(Some(item), ctx)? {
                        StageOutcome::Value(value) => output.push(value),
                        StageOutcome::Unset => {}
                        skip @ StageOutcome::SkipRow { .. } => return Ok(skip),
                    }
                }
                if output.is_empty() {
                    return Ok(StageOutcome::Unset);
                }
                Ok(StageOutcome::Value(Value::Array(output)))
            }
            other => self.plugin.transform(other, ctx),
        }
    }
}

/// Result of running every stage for one destination property.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineOutcome {
    Completed(FieldValue),
    SkipRow { message: String },
}

/// Ordered stages producing one destination property.
#[derive(Clone)]
pub struct ProcessPipeline {
    destination_property: String,
    stages: Vec<ProcessStage>,
}

impl ProcessPipeline {
    pub fn new(destination_property: impl Into<String>, stages: Vec<ProcessStage>) -> Self {
        Self {
            destination_property: destination_property.into(),
            stages,
        }
    }

    pub fn destination_property(&self) -> &str {
        &self.destination_property
    }

    pub fn stages(&self) -> &[ProcessStage] {
        &self.stages
    }

    /// Run the stages in order. A stage with a source reads it; otherwise it
    /// receives the previous stage's value. Stops at the first skip.
    pub fn run(
        &self,
        row: &SourceRow,
        destination: &EntityValueMap,
    ) -> Result<PipelineOutcome, AppError> {
        let ctx = RowContext::new(row, &self.destination_property, destination);
        let mut current: FieldValue = None;
        for stage in &self.stages {
            let input = match &stage.source {
                Some(selector) => selector.read(&ctx),
                None => current.take(),
            };
            current = match stage.apply(input, &ctx)? {
                StageOutcome::Value(value) => Some(value),
                StageOutcome::Unset => None,
                StageOutcome::SkipRow { message } => {
                    tracing::trace!(
                        property = %self.destination_property,
                        plugin = stage.plugin_id(),
                        "stage requested row skip"
                    );
                    return Ok(PipelineOutcome::SkipRow { message });
                }
            };
        }
        Ok(PipelineOutcome::Completed(current))
    }
}
