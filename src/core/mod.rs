pub mod destination;
pub mod error;
pub mod migration;
pub mod process;
pub mod row;
pub mod types;

pub use destination::{
    DestinationQuery, EntityValueMap, EntityWriter, ExistenceChecker, ExistenceQuery,
    GenerateRequest, InMemoryDestination,
};
pub use error::{AppError, DefaultErrorReporter, ErrorReporter};
pub use migration::{
    MessageLog, MigrateExecutable, Migration, MigrationDefinition, MigrationReport, RowMessage,
    RowOutcome, SkipChannel, TracingSkipChannel,
};
pub use process::{PluginDeps, PluginRegistry, ProcessPlugin, RowContext, StageOutcome};
pub use row::{FieldValue, SourceRow};
pub use types::*;
