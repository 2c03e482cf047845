//! # Entity ID Registry
//!
//! Scoped uniqueness registry for entity identifiers.
//!
//! ## Purpose
//! Guarantees that no two live entities sharing a registry carry the same ID.
//! Registries are injected rather than global, so independent worlds (for
//! example parallel tests) never interfere with each other.
//!
//! ## Lifecycle
//! - `register` runs as part of entity construction; a collision fails the
//!   construction.
//! - `release` runs as the final step of entity disposal, after which the ID
//!   may be reused.
//!
//! ## Concurrency
//! Backed by a sharded concurrent set. `register` is a single atomic
//! insert-if-absent, so two threads racing on the same ID see exactly one
//! winner.

use dashmap::DashSet;
use tracing::trace;

use crate::engine::error::{EntityError, EntityResult};
use crate::engine::types::{EntityId, DEFAULT_ID_CAPACITY};


/// Set of IDs currently owned by live entities.
#[derive(Debug)]
pub struct IdRegistry {
    ids: DashSet<EntityId>,
}

impl Default for IdRegistry {
    fn default() -> Self { Self::with_capacity(DEFAULT_ID_CAPACITY) }
}

impl IdRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self { Self::default() }

    /// Creates an empty registry with room for `capacity` IDs.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { ids: DashSet::with_capacity(capacity) }
    }

    /// Claims `id`.
    ///
    /// ## Errors
    /// [`EntityError::DuplicateId`] if the ID is already claimed.
    pub fn register(&self, id: &str) -> EntityResult<()> {
        if self.ids.insert(id.to_owned()) {
            trace!(entity = id, "id registered");
            Ok(())
        } else {
            Err(EntityError::DuplicateId { id: id.to_owned() })
        }
    }

    /// Releases `id`. Returns `false` if it was not claimed.
    pub fn release(&self, id: &str) -> bool {
        let released = self.ids.remove(id).is_some();
        if released {
            trace!(entity = id, "id released");
        }
        released
    }

    /// Returns `true` if `id` is currently claimed.
    pub fn contains(&self, id: &str) -> bool { self.ids.contains(id) }

    /// Number of claimed IDs.
    pub fn len(&self) -> usize { self.ids.len() }

    /// Returns `true` if no IDs are claimed.
    pub fn is_empty(&self) -> bool { self.ids.is_empty() }
}
