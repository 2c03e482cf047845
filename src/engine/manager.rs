//! Entity construction and world ownership.
//!
//! This module defines the root object a host creates once per world (a game
//! session, an editor document, a test):
//!
//! * it owns the scoped [`IdRegistry`] that keeps entity IDs unique,
//! * it owns the [`CapabilityFactory`] every entity uses to build components,
//! * it constructs entities bound to both.
//!
//! Two managers never share IDs, so independent worlds can run side by side
//! in one process.
//!
//! ## Configuration
//!
//! [`ManagerConfig`] carries the sizing hints used for new tables; its
//! `Default` uses the constants from [`types`](crate::engine::types).

use std::sync::Arc;

use tracing::debug;

use crate::engine::entity::Entity;
use crate::engine::error::EntityResult;
use crate::engine::factory::CapabilityFactory;
use crate::engine::registry::IdRegistry;
use crate::engine::types::{EntityId, DEFAULT_COMPONENT_CAPACITY, DEFAULT_ID_CAPACITY};


/// Sizing hints for an [`EntityManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Capability slots reserved per entity.
    pub component_capacity: usize,

    /// IDs reserved in the uniqueness registry.
    pub id_capacity: usize,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            component_capacity: DEFAULT_COMPONENT_CAPACITY,
            id_capacity: DEFAULT_ID_CAPACITY,
        }
    }
}

impl ManagerConfig {
    /// Sets the per-entity capability reservation.
    pub fn with_component_capacity(mut self, capacity: usize) -> Self {
        self.component_capacity = capacity;
        self
    }

    /// Sets the registry reservation.
    pub fn with_id_capacity(mut self, capacity: usize) -> Self {
        self.id_capacity = capacity;
        self
    }
}

/// Owns an ID registry and a capability factory and builds entities on them.
///
/// ## Concurrency
/// `EntityManager` is `Send + Sync`; entities may be created from any thread.
pub struct EntityManager {
    registry: Arc<IdRegistry>,
    factory: Arc<dyn CapabilityFactory>,
    config: ManagerConfig,
}

impl EntityManager {
    /// Creates a manager with default sizing.
    pub fn new(factory: Arc<dyn CapabilityFactory>) -> Self {
        Self::with_config(factory, ManagerConfig::default())
    }

    /// Creates a manager with explicit sizing.
    pub fn with_config(factory: Arc<dyn CapabilityFactory>, config: ManagerConfig) -> Self {
        debug!(?config, "entity manager created");
        Self {
            registry: Arc::new(IdRegistry::with_capacity(config.id_capacity)),
            factory,
            config,
        }
    }

    /// Creates an entity with `id`.
    ///
    /// Components are not initialized; attach the initial set, then call
    /// [`Entity::init_components`].
    ///
    /// ## Errors
    /// [`EntityError::DuplicateId`](crate::engine::error::EntityError::DuplicateId)
    /// if a live entity of this manager already owns `id`.
    pub fn create_entity(&self, id: impl Into<EntityId>) -> EntityResult<Entity> {
        Entity::with_capacity(
            id,
            Arc::clone(&self.factory),
            Arc::clone(&self.registry),
            self.config.component_capacity,
        )
    }

    /// The uniqueness registry shared by this manager's entities.
    pub fn registry(&self) -> &Arc<IdRegistry> { &self.registry }

    /// The factory shared by this manager's entities.
    pub fn factory(&self) -> &Arc<dyn CapabilityFactory> { &self.factory }

    /// Active configuration.
    pub fn config(&self) -> ManagerConfig { self.config }

    /// Number of entities currently holding an ID.
    pub fn live_entities(&self) -> usize { self.registry.len() }
}
