#![allow(clippy::result_large_err)]

use crate::core::destination::{
    DestinationQuery, EntityValueMap, EntityWriter, ExistenceQuery, GenerateRequest,
};
use crate::core::error::AppError;
use crate::core::row::values_match;
use crate::core::types::ErrorCategory;
use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

const DEFAULT_ID_KEY: &str = "id";

/// Destination store kept in memory.
///
/// Backs the `run` command and the tests. Entities are grouped by entity
/// type; each type has an id key (`id` unless configured otherwise) that
/// newly generated entities receive.
#[derive(Default)]
pub struct InMemoryDestination {
    inner: RwLock<Store>,
}

#[derive(Default)]
struct Store {
    entity_keys: HashMap<String, String>,
    entities: IndexMap<String, Vec<EntityValueMap>>,
}

/// On-disk fixture format accepted by [`InMemoryDestination::load`].
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct DestinationFixture {
    #[serde(default)]
    entity_keys: HashMap<String, String>,
    #[serde(default)]
    entities: IndexMap<String, Vec<EntityValueMap>>,
}

impl InMemoryDestination {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the id property assigned to generated entities of a type.
    pub fn with_id_key(self, entity_type: &str, id_key: &str) -> Self {
        if let Ok(mut store) = self.inner.write() {
            store
                .entity_keys
                .insert(entity_type.to_string(), id_key.to_string());
        }
        self
    }

    pub fn from_fixture(value: Value) -> Result<Self, AppError> {
        let fixture: DestinationFixture = serde_json::from_value(value).map_err(|err| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("invalid destination fixture: {}", err),
            )
            .with_code("MIG-DST-001")
        })?;
        Ok(Self {
            inner: RwLock::new(Store {
                entity_keys: fixture.entity_keys,
                entities: fixture.entities,
            }),
        })
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read destination fixture {}", path.display()),
            )
            .with_code("MIG-DST-001")
            .with_source(e)
        })?;
        let value: Value = serde_json::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::SerializationError,
                format!("Failed to parse destination fixture {}: {}", path.display(), e),
            )
            .with_code("MIG-DST-001")
        })?;
        Self::from_fixture(value)
    }

    pub fn insert(&self, entity_type: &str, values: EntityValueMap) -> Result<(), AppError> {
        self.write()?
            .entities
            .entry(entity_type.to_string())
            .or_default()
            .push(values);
        Ok(())
    }

    /// Snapshot of the stored entities of one type.
    pub fn entities(&self, entity_type: &str) -> Vec<EntityValueMap> {
        self.read()
            .map(|store| store.entities.get(entity_type).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Store>, AppError> {
        self.inner.read().map_err(|_| poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Store>, AppError> {
        self.inner.write().map_err(|_| poisoned())
    }
}

impl Store {
    fn id_key(&self, entity_type: &str) -> String {
        self.entity_keys
            .get(entity_type)
            .cloned()
            .unwrap_or_else(|| DEFAULT_ID_KEY.to_string())
    }

    fn next_id(&self, entity_type: &str, id_key: &str) -> u64 {
        self.entities
            .get(entity_type)
            .into_iter()
            .flatten()
            .filter_map(|entity| entity.get(id_key).and_then(Value::as_u64))
            .max()
            .unwrap_or(0)
            + 1
    }
}

impl DestinationQuery for InMemoryDestination {
    fn count(&self, query: &ExistenceQuery) -> Result<u64, AppError> {
        let store = self.read()?;
        let count = store
            .entities
            .get(&query.entity_type)
            .into_iter()
            .flatten()
            .filter(|entity| {
                entity
                    .get(&query.property_name)
                    .is_some_and(|stored| match &query.value {
                        Value::Array(candidates) => candidates
                            .iter()
                            .any(|candidate| values_match(stored, candidate)),
                        single => values_match(stored, single),
                    })
            })
            .count();
        Ok(count as u64)
    }
}

impl EntityWriter for InMemoryDestination {
    fn lookup_or_create(&self, request: &GenerateRequest<'_>) -> Result<Value, AppError> {
        let lookup_value = request.values.get(request.lookup_key).ok_or_else(|| {
            AppError::new(
                ErrorCategory::InternalError,
                format!("entity values lack lookup key '{}'", request.lookup_key),
            )
        })?;
        let bundle = request
            .bundle_key
            .map(|key| (key, request.values.get(key).cloned().unwrap_or(Value::Null)));

        let mut store = self.write()?;
        let id_key = store.id_key(request.entity_type);

        let existing = store
            .entities
            .get(request.entity_type)
            .into_iter()
            .flatten()
            .find(|entity| {
                let key_matches = entity
                    .get(request.lookup_key)
                    .is_some_and(|stored| values_match(stored, lookup_value));
                let bundle_matches = match &bundle {
                    Some((key, expected)) => entity.get(*key) == Some(expected),
                    None => true,
                };
                key_matches && bundle_matches
            });
        if let Some(entity) = existing {
            return Ok(entity.get(&id_key).cloned().unwrap_or(Value::Null));
        }

        let id = Value::from(store.next_id(request.entity_type, &id_key));
        let mut entity = request.values.clone();
        entity.insert(id_key, id.clone());
        store
            .entities
            .entry(request.entity_type.to_string())
            .or_default()
            .push(entity);
        tracing::debug!(entity_type = %request.entity_type, id = %id, "generated destination entity");
        Ok(id)
    }
}

fn poisoned() -> AppError {
    AppError::new(
        ErrorCategory::InternalError,
        "in-memory destination lock poisoned",
    )
    .with_code("MIG-DST-002")
}
