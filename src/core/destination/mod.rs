#![allow(clippy::result_large_err)] // Destination traits return AppError so query failures carry structured context.

//! Interfaces to the destination store.
//!
//! The process plugins never talk to storage directly: the store handle is
//! injected as an `Arc<dyn DestinationQuery>` / `Arc<dyn EntityWriter>` when
//! the plugin is built.

pub mod memory;

use crate::core::error::AppError;
use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

pub use memory::InMemoryDestination;

/// Ordered destination property name -> value map for one entity.
pub type EntityValueMap = IndexMap<String, Value>;

/// Count request against the destination store.
#[derive(Debug, Clone, PartialEq)]
pub struct ExistenceQuery {
    pub entity_type: String,
    pub property_name: String,
    pub value: Value,
}

/// Unchecked count query against the destination store.
///
/// Implementations must not apply access control: migrations run with full
/// visibility of the destination.
pub trait DestinationQuery: Send + Sync {
    fn count(&self, query: &ExistenceQuery) -> Result<u64, AppError>;
}

/// Lookup parameters handed to an [`EntityWriter`] along with the values.
#[derive(Debug, Clone, Copy)]
pub struct GenerateRequest<'a> {
    pub entity_type: &'a str,
    pub lookup_key: &'a str,
    pub bundle_key: Option<&'a str>,
    pub values: &'a EntityValueMap,
}

/// Finds an entity matching the lookup key (and bundle) or creates one from
/// the value map. Returns the entity id.
pub trait EntityWriter: Send + Sync {
    fn lookup_or_create(&self, request: &GenerateRequest<'_>) -> Result<Value, AppError>;
}

/// Counts destination entities whose property equals a value.
#[derive(Clone)]
pub struct ExistenceChecker {
    query: Arc<dyn DestinationQuery>,
    entity_type: String,
    property_name: String,
}

impl ExistenceChecker {
    pub fn new(
        query: Arc<dyn DestinationQuery>,
        entity_type: impl Into<String>,
        property_name: impl Into<String>,
    ) -> Self {
        Self {
            query,
            entity_type: entity_type.into(),
            property_name: property_name.into(),
        }
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn property_name(&self) -> &str {
        &self.property_name
    }

    /// A failing query is returned as-is; it is never reported as zero.
    pub fn count(&self, value: &Value) -> Result<u64, AppError> {
        let query = ExistenceQuery {
            entity_type: self.entity_type.clone(),
            property_name: self.property_name.clone(),
            value: value.clone(),
        };
        let count = self.query.count(&query)?;
        tracing::debug!(
            entity_type = %self.entity_type,
            property = %self.property_name,
            value = %value,
            count,
            "destination existence check"
        );
        Ok(count)
    }
}
