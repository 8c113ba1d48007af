//! Versioned, immutable schema catalog snapshots.
//!
//! The catalog is read by every request and refreshed rarely. Readers take
//! an `Arc` to the current snapshot and never lock while composing; a
//! refresh builds a complete new snapshot and swaps the pointer, so a
//! composition in flight keeps a consistent view.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::ResourceSchema;

/// Catalog document: base schemas plus resource schemas, in serving order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub base: Vec<ResourceSchema>,
    #[serde(default)]
    pub schemas: Vec<ResourceSchema>,
}

/// One published state of the catalog. Never mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    version: u64,
    base_schemas: Vec<ResourceSchema>,
    schemas: Vec<ResourceSchema>,
}

impl CatalogSnapshot {
    pub fn new(
        version: u64,
        base_schemas: Vec<ResourceSchema>,
        schemas: Vec<ResourceSchema>,
    ) -> Self {
        Self {
            version,
            base_schemas,
            schemas,
        }
    }

    pub fn from_document(version: u64, document: CatalogDocument) -> Self {
        Self::new(version, document.base, document.schemas)
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Schemas added to every caller's registry unfiltered.
    pub fn base_schemas(&self) -> &[ResourceSchema] {
        &self.base_schemas
    }

    /// Catalog schemas in iteration order.
    pub fn schemas(&self) -> &[ResourceSchema] {
        &self.schemas
    }

    pub fn get(&self, id: &str) -> Option<&ResourceSchema> {
        self.schemas.iter().find(|s| s.id == id)
    }
}

/// Shared handle publishing the current catalog snapshot.
///
/// Cloning the handle shares the same publication slot.
#[derive(Debug, Clone, Default)]
pub struct CatalogHandle {
    current: Arc<RwLock<Arc<CatalogSnapshot>>>,
}

impl CatalogHandle {
    pub fn new(snapshot: CatalogSnapshot) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(snapshot))),
        }
    }

    /// The current snapshot. The lock is held only to copy the pointer.
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        Arc::clone(&*self.current.read())
    }

    /// Publish a new catalog as the next version and return it.
    pub fn publish(&self, document: CatalogDocument) -> Arc<CatalogSnapshot> {
        let mut current = self.current.write();
        let next = Arc::new(CatalogSnapshot::from_document(current.version + 1, document));
        *current = Arc::clone(&next);
        info!(
            version = next.version,
            schemas = next.schemas.len(),
            "published schema catalog"
        );
        next
    }
}
