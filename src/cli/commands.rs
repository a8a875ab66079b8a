use crate::cli::args::{RunArgs, ValidateArgs};
use crate::core::destination::InMemoryDestination;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::migration::{
    JsonRowProvider, MessageLog, MigrateExecutable, Migration, MigrationDefinition,
};
use crate::core::process::{PluginDeps, PluginRegistry};
use crate::Result;
use serde_json::json;
use std::io::{self, Write};
use std::sync::Arc;

/// Build every stage of a definition and report what was found.
pub fn validate(args: ValidateArgs) -> Result<()> {
    let definition = MigrationDefinition::load(&args.definition)?;
    let deps = PluginDeps::from_store(Arc::new(InMemoryDestination::new()));
    let migration = Migration::build(&definition, &PluginRegistry::with_builtins(), &deps)?;

    let stages: usize = migration
        .pipelines()
        .iter()
        .map(|pipeline| pipeline.stages().len())
        .sum();
    tracing::info!(migration = %migration.id(), stages, "definition validated");
    println!(
        "Migration '{}' is valid: {} properties, {} stages",
        migration.id(),
        migration.pipelines().len(),
        stages
    );
    Ok(())
}

/// Run a migration against the in-memory destination.
pub fn run(args: RunArgs) -> Result<()> {
    let definition = MigrationDefinition::load(&args.definition)?;
    let destination = match &args.destination {
        Some(path) => InMemoryDestination::load(path)?,
        None => InMemoryDestination::new(),
    };
    let deps = PluginDeps::from_store(Arc::new(destination));
    let migration = Migration::build(&definition, &PluginRegistry::with_builtins(), &deps)?;
    let mut provider = JsonRowProvider::load(&args.source)?;

    let messages = Arc::new(MessageLog::new());
    let executable = MigrateExecutable::new(migration, messages.clone());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let report = executable.run(&mut provider, |_row, values| {
        let line = serde_json::to_string(&values).map_err(|e| {
            AppError::new(ErrorCategory::SerializationError, e.to_string()).with_source(e)
        })?;
        writeln!(out, "{}", line)
            .map_err(|e| AppError::new(ErrorCategory::IoError, e.to_string()).with_source(e))?;
        Ok(())
    })?;

    for message in messages.messages() {
        let ids = serde_json::to_string(&message.source_ids)?;
        writeln!(out, "skipped {} [{}]: {}", ids, message.level, message.message)?;
    }

    if args.json_summary {
        writeln!(
            out,
            "{}",
            json!({ "summary": report, "messages": messages.messages() })
        )?;
    } else {
        writeln!(
            out,
            "Migration '{}': {} processed, {} skipped",
            report.migration_id, report.processed, report.skipped
        )?;
    }
    out.flush()?;
    Ok(())
}
