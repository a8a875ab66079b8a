#![allow(clippy::result_large_err)] // Migration execution returns AppError so fatal rows keep their identity.

//! Row-at-a-time execution of a migration's process pipelines.

pub mod definition;
pub mod source;

pub use definition::{MigrationDefinition, ProcessEntry, SourceSettings, StageDefinition};
pub use source::{JsonRowProvider, RowProvider};

use crate::core::destination::EntityValueMap;
use crate::core::error::AppError;
use crate::core::process::{
    PipelineOutcome, PluginDeps, PluginRegistry, ProcessPipeline, ProcessStage, SourceSelector,
};
use crate::core::row::SourceRow;
use crate::core::types::MessageLevel;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};

/// What happened to one source row.
#[derive(Debug, Clone, PartialEq)]
pub enum RowOutcome {
    /// Every pipeline ran; unset properties are absent from the map.
    Processed(EntityValueMap),
    /// A stage asked to skip the row. Partial results are discarded.
    Skipped { property: String, message: String },
}

/// A message recorded against a source row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowMessage {
    pub migration_id: String,
    pub source_ids: IndexMap<String, Value>,
    pub level: MessageLevel,
    pub message: String,
}

/// Receives the reason a row was skipped.
pub trait SkipChannel: Send + Sync {
    fn record(&self, message: RowMessage);
}

/// Keeps recorded messages in memory.
#[derive(Default)]
pub struct MessageLog {
    messages: Mutex<Vec<RowMessage>>,
}

impl MessageLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<RowMessage> {
        self.messages
            .lock()
            .map(|messages| messages.clone())
            .unwrap_or_default()
    }
}

impl SkipChannel for MessageLog {
    fn record(&self, message: RowMessage) {
        if let Ok(mut messages) = self.messages.lock() {
            messages.push(message);
        }
    }
}

/// Emits skip messages as tracing events.
pub struct TracingSkipChannel;

impl SkipChannel for TracingSkipChannel {
    fn record(&self, message: RowMessage) {
        let ids = serde_json::to_string(&message.source_ids).unwrap_or_default();
        tracing::info!(
            migration = %message.migration_id,
            source_ids = %ids,
            level = %message.level,
            "{}",
            message.message
        );
    }
}

/// A migration with every process stage built and validated.
pub struct Migration {
    id: String,
    source_ids: Vec<String>,
    pipelines: Vec<ProcessPipeline>,
}

impl Migration {
    /// Build every stage up front so configuration errors surface before the
    /// first row is read.
    pub fn build(
        definition: &MigrationDefinition,
        registry: &PluginRegistry,
        deps: &PluginDeps,
    ) -> Result<Self, AppError> {
        definition.validate()?;
        let mut pipelines = Vec::with_capacity(definition.process.len());
        for (property, entry) in &definition.process {
            let mut stages = Vec::new();
            for (index, stage) in entry.stages().iter().enumerate() {
                let plugin = registry
                    .create(&stage.plugin, &stage.config, deps)
                    .map_err(|mut err| {
                        err.add_context("migration", &definition.id);
                        err.add_context("property", property);
                        err.add_context("stage", &index.to_string());
                        err
                    })?;
                let source = stage.source.as_deref().map(SourceSelector::parse);
                stages.push(ProcessStage::new(plugin, source));
            }
            pipelines.push(ProcessPipeline::new(property.clone(), stages));
        }
        Ok(Self {
            id: definition.id.clone(),
            source_ids: definition.source.ids.clone(),
            pipelines,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_ids(&self) -> &[String] {
        &self.source_ids
    }

    pub fn pipelines(&self) -> &[ProcessPipeline] {
        &self.pipelines
    }

    /// Run every destination property's pipeline for one row, in definition
    /// order. Later pipelines can read earlier results through `@property`.
    pub fn process_row(&self, row: &SourceRow) -> Result<RowOutcome, AppError> {
        let mut destination = EntityValueMap::new();
        for pipeline in &self.pipelines {
            let property = pipeline.destination_property();
            let outcome = pipeline.run(row, &destination).map_err(|mut err| {
                err.add_context("migration", &self.id);
                err.add_context("row", &row.id_label());
                err.add_context("property", property);
                err
            })?;
            match outcome {
                PipelineOutcome::Completed(Some(value)) => {
                    destination.insert(property.to_string(), value);
                }
                PipelineOutcome::Completed(None) => {}
                PipelineOutcome::SkipRow { message } => {
                    return Ok(RowOutcome::Skipped {
                        property: property.to_string(),
                        message,
                    });
                }
            }
        }
        Ok(RowOutcome::Processed(destination))
    }
}

/// Totals for a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub migration_id: String,
    pub processed: usize,
    pub skipped: usize,
}

/// Drives a migration over a row provider.
pub struct MigrateExecutable {
    migration: Migration,
    messages: Arc<dyn SkipChannel>,
}

impl MigrateExecutable {
    pub fn new(migration: Migration, messages: Arc<dyn SkipChannel>) -> Self {
        Self {
            migration,
            messages,
        }
    }

    pub fn migration(&self) -> &Migration {
        &self.migration
    }

    /// Process rows until the provider is exhausted.
    ///
    /// Processed rows are handed to `on_row`. Skipped rows are recorded on
    /// the skip channel and the run continues. Any error stops the run and
    /// names the row it came from.
    pub fn run<F>(
        &self,
        provider: &mut dyn RowProvider,
        mut on_row: F,
    ) -> Result<MigrationReport, AppError>
    where
        F: FnMut(&SourceRow, EntityValueMap) -> Result<(), AppError>,
    {
        let mut report = MigrationReport {
            migration_id: self.migration.id.clone(),
            ..MigrationReport::default()
        };
        tracing::info!(migration = %self.migration.id, "migration run started");

        while let Some(row) = provider.next_row().map_err(|mut err| {
            err.add_context("migration", &self.migration.id);
            err
        })? {
            let row = row.with_id_keys(self.migration.source_ids.iter().cloned());
            let outcome = match self.migration.process_row(&row) {
                Ok(outcome) => outcome,
                Err(err) => {
                    tracing::warn!(
                        migration = %self.migration.id,
                        row = %row.id_label(),
                        error = %err.message,
                        "row failed; stopping migration"
                    );
                    return Err(err);
                }
            };
            match outcome {
                RowOutcome::Processed(values) => {
                    on_row(&row, values).map_err(|mut err| {
                        err.add_context("migration", &self.migration.id);
                        err.add_context("row", &row.id_label());
                        err
                    })?;
                    report.processed += 1;
                }
                RowOutcome::Skipped { property, message } => {
                    tracing::info!(
                        migration = %self.migration.id,
                        row = %row.id_label(),
                        property = %property,
                        "row skipped"
                    );
                    self.messages.record(RowMessage {
                        migration_id: self.migration.id.clone(),
                        source_ids: row.source_ids(),
                        level: MessageLevel::Information,
                        message,
                    });
                    report.skipped += 1;
                }
            }
        }

        tracing::info!(
            migration = %self.migration.id,
            processed = report.processed,
            skipped = report.skipped,
            "migration run finished"
        );
        Ok(report)
    }
}
