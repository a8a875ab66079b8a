#![allow(clippy::result_large_err)] // Plugin trait and registry return AppError directly for structured diagnostics without boxing.

use crate::core::destination::{DestinationQuery, EntityValueMap, EntityWriter};
use crate::core::error::AppError;
use crate::core::row::{FieldValue, SourceRow};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Plugin options as written in the migration definition, minus `plugin`
/// and `source`.
pub type PluginConfig = Map<String, Value>;

/// Result of running one stage on one value.
#[derive(Debug, Clone, PartialEq)]
pub enum StageOutcome {
    /// Hand this value to the next stage.
    Value(Value),
    /// The destination field stays unset.
    Unset,
    /// Stop processing the whole row. The message is recorded even when empty.
    SkipRow { message: String },
}

impl StageOutcome {
    pub fn from_field(value: FieldValue) -> Self {
        match value {
            Some(value) => StageOutcome::Value(value),
            None => StageOutcome::Unset,
        }
    }

    pub fn is_skip(&self) -> bool {
        matches!(self, StageOutcome::SkipRow { .. })
    }
}

/// Read-only view of the row a stage is working on.
#[derive(Clone, Copy)]
pub struct RowContext<'a> {
    pub row: &'a SourceRow,
    pub destination_property: &'a str,
    /// Destination properties already processed for this row.
    pub destination: &'a EntityValueMap,
}

impl<'a> RowContext<'a> {
    pub fn new(
        row: &'a SourceRow,
        destination_property: &'a str,
        destination: &'a EntityValueMap,
    ) -> Self {
        Self {
            row,
            destination_property,
            destination,
        }
    }
}

/// Trait implemented by process plugins.
pub trait ProcessPlugin: Send + Sync + 'static {
    /// Plugin id used in migration definitions.
    fn id(&self) -> &'static str;

    /// When false, array values are fed to `transform` one element at a time.
    fn handles_multiples(&self) -> bool {
        false
    }

    /// Transform the current value of the destination field.
    fn transform(&self, value: FieldValue, ctx: &RowContext<'_>)
        -> Result<StageOutcome, AppError>;
}

/// Collaborators injected into plugins when they are built.
#[derive(Clone)]
pub struct PluginDeps {
    pub destination: Arc<dyn DestinationQuery>,
    pub writer: Arc<dyn EntityWriter>,
}

impl PluginDeps {
    pub fn new(destination: Arc<dyn DestinationQuery>, writer: Arc<dyn EntityWriter>) -> Self {
        Self {
            destination,
            writer,
        }
    }

    /// Use one store for both queries and entity generation.
    pub fn from_store<T>(store: Arc<T>) -> Self
    where
        T: DestinationQuery + EntityWriter + 'static,
    {
        Self {
            destination: store.clone(),
            writer: store,
        }
    }
}

/// Builds a configured plugin instance. Configuration problems must be
/// reported here, not when rows are processed.
pub type PluginFactory =
    Arc<dyn Fn(&PluginConfig, &PluginDeps) -> Result<Arc<dyn ProcessPlugin>, AppError> + Send + Sync>;

/// Builder used to register plugin factories before a migration is built.
pub struct PluginRegistryBuilder {
    factories: HashMap<String, PluginFactory>,
}

impl Default for PluginRegistryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistryBuilder {
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register<F>(&mut self, id: &str, factory: F) -> &mut Self
    where
        F: Fn(&PluginConfig, &PluginDeps) -> Result<Arc<dyn ProcessPlugin>, AppError>
            + Send
            + Sync
            + 'static,
    {
        if self.factories.contains_key(id) {
            panic!("duplicate process plugin registered: {}", id);
        }
        self.factories.insert(id.to_string(), Arc::new(factory));
        self
    }

    pub fn build(self) -> PluginRegistry {
        PluginRegistry {
            inner: Arc::new(self.factories),
        }
    }
}

/// Immutable plugin registry shared by every migration of a run.
#[derive(Clone)]
pub struct PluginRegistry {
    inner: Arc<HashMap<String, PluginFactory>>,
}

impl Default for PluginRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl PluginRegistry {
    pub fn new() -> Self {
        PluginRegistryBuilder::new().build()
    }

    pub fn builder() -> PluginRegistryBuilder {
        PluginRegistryBuilder::new()
    }

    /// Registry holding every built-in plugin.
    pub fn with_builtins() -> Self {
        let mut builder = PluginRegistryBuilder::new();
        crate::core::process::plugins::register_builtins(&mut builder);
        builder.build()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.inner.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn create(
        &self,
        id: &str,
        config: &PluginConfig,
        deps: &PluginDeps,
    ) -> Result<Arc<dyn ProcessPlugin>, AppError> {
        let factory = self.inner.get(id).ok_or_else(|| {
            AppError::configuration(format!("unknown process plugin '{}'", id))
                .with_code("MIG-CFG-001")
        })?;
        factory(config, deps)
    }
}

/// Deserialize plugin options into the plugin's typed configuration.
pub fn parse_config<T: DeserializeOwned>(
    plugin_id: &str,
    config: &PluginConfig,
) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(config.clone())).map_err(|err| {
        AppError::configuration(format!("invalid configuration for '{}': {}", plugin_id, err))
            .with_code("MIG-CFG-002")
    })
}
