//! Process plugins and the per-property stage pipeline.

pub mod pipeline;
pub mod plugin;
pub mod plugins;

pub use pipeline::{PipelineOutcome, ProcessPipeline, ProcessStage, SourceSelector};
pub use plugin::{
    PluginConfig, PluginDeps, PluginRegistry, PluginRegistryBuilder, ProcessPlugin, RowContext,
    StageOutcome,
};
