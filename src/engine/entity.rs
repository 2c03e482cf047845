//! # Entities
//!
//! Identity, two-phase startup and disposal for a set of components.
//!
//! ## Purpose
//! An [`Entity`] is a uniquely identified composition root. It owns one
//! [`ComponentCollection`], coordinates the first startup pass of its
//! components, and is the root of their disposal.
//!
//! ## Startup
//! [`Entity::init_components`] is a single-caller operation:
//! - **Phase 1** calls `init` on every attached component in attachment order.
//!   Components attached during Phase 1 (for example by a sibling bootstrapping
//!   a dependency) are picked up by the same pass.
//! - **Phase 2** calls `after_init` on every component, only once every
//!   Phase 1 `init` has returned.
//! - The initialized flag then flips (never to revert) and the one-shot
//!   initialized signal fires.
//!
//! Declared [`RequiredComponent`](crate::engine::component::RequiredComponent)
//! metadata does not influence ordering.
//!
//! ## Disposal
//! [`Entity::dispose`] is idempotent and runs, in order:
//! 1. unbind every outstanding binding (their `on_removed` sees live components),
//! 2. fire and clear disposal callbacks,
//! 3. dispose every component directly, without per-item change events,
//! 4. release the ID back to the registry.
//!
//! After disposal every mutating call is a silent no-op.
//!
//! ## Ownership
//! `Entity` is a cheap handle. Components refer back to their entity through
//! [`WeakEntity`], so entity and components never keep each other alive.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use tracing::{debug, warn};

use crate::engine::binding::Binding;
use crate::engine::collection::{ComponentCollection, ComponentsChanged};
use crate::engine::component::{run_after_init, run_init, Component, ComponentRef};
use crate::engine::error::{ComponentResult, EntityResult};
use crate::engine::events::{Event, OnceSignal};
use crate::engine::factory::CapabilityFactory;
use crate::engine::registry::IdRegistry;
use crate::engine::types::{CapabilityId, EntityId, DEFAULT_COMPONENT_CAPACITY};


/// Payload of a display-name change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DisplayNameChanged {
    /// Previous display name.
    pub old: String,

    /// New display name.
    pub new: String,
}

/// An unmet mandatory requirement reported by [`Entity::missing_requirements`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissingRequirement {
    /// Name of the component declaring the requirement.
    pub component: String,

    /// Capability it requires.
    pub capability: CapabilityId,
}

type DisposeCallback = Box<dyn FnOnce(&Entity) + Send>;

struct DisposalState {
    done: bool,
    callbacks: Vec<DisposeCallback>,
}

struct EntityInner {
    id: EntityId,
    display_name: Mutex<String>,
    on_display_name_changed: Event<DisplayNameChanged>,
    collection: Arc<ComponentCollection>,
    registry: Arc<IdRegistry>,
    init_started: AtomicBool,
    disposing: AtomicBool,
    disposal: Mutex<DisposalState>,
}

impl Drop for EntityInner {
    fn drop(&mut self) {
        if !self.disposing.load(Ordering::Acquire) {
            debug!(entity = %self.id, "entity dropped without dispose; releasing id");
            self.registry.release(&self.id);
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to a uniquely identified composition root.
#[derive(Clone)]
pub struct Entity {
    inner: Arc<EntityInner>,
}

/// Non-owning reference to an [`Entity`].
#[derive(Clone, Default)]
pub struct WeakEntity {
    inner: Weak<EntityInner>,
}

impl WeakEntity {
    /// Returns the entity if it is still alive.
    pub fn upgrade(&self) -> Option<Entity> {
        self.inner.upgrade().map(|inner| Entity { inner })
    }

    /// Returns `true` if both refer to the same entity.
    pub fn ptr_eq(&self, other: &WeakEntity) -> bool { Weak::ptr_eq(&self.inner, &other.inner) }
}

impl fmt::Debug for WeakEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.upgrade() {
            Some(entity) => write!(f, "WeakEntity({})", entity.id()),
            None => f.write_str("WeakEntity(<dropped>)"),
        }
    }
}

impl Entity {
    /// Creates an entity, claiming `id` in `registry`.
    ///
    /// ## Errors
    /// [`EntityError::DuplicateId`](crate::engine::error::EntityError::DuplicateId)
    /// if another live entity in `registry` owns `id`. Nothing is constructed.
    pub fn new(
        id: impl Into<EntityId>,
        factory: Arc<dyn CapabilityFactory>,
        registry: Arc<IdRegistry>,
    ) -> EntityResult<Self> {
        Self::with_capacity(id, factory, registry, DEFAULT_COMPONENT_CAPACITY)
    }

    /// Like [`Entity::new`], reserving room for `capacity` capabilities.
    pub fn with_capacity(
        id: impl Into<EntityId>,
        factory: Arc<dyn CapabilityFactory>,
        registry: Arc<IdRegistry>,
        capacity: usize,
    ) -> EntityResult<Self> {
        let id = id.into();
        registry.register(&id)?;

        let inner = Arc::new_cyclic(|weak| EntityInner {
            display_name: Mutex::new(id.clone()),
            on_display_name_changed: Event::new(),
            collection: Arc::new(ComponentCollection::new(
                WeakEntity { inner: weak.clone() },
                id.clone(),
                factory,
                capacity,
            )),
            registry,
            init_started: AtomicBool::new(false),
            disposing: AtomicBool::new(false),
            disposal: Mutex::new(DisposalState { done: false, callbacks: Vec::new() }),
            id,
        });
        debug!(entity = %inner.id, "entity created");
        Ok(Self { inner })
    }

    /// Unique identifier.
    pub fn id(&self) -> &str { &self.inner.id }

    /// Current display name. Defaults to the ID.
    pub fn display_name(&self) -> String { lock(&self.inner.display_name).clone() }

    /// Sets the display name, notifying subscribers if it changed.
    pub fn set_display_name(&self, name: impl Into<String>) {
        if self.is_disposed() {
            return;
        }
        let name = name.into();
        let old = {
            let mut current = lock(&self.inner.display_name);
            if *current == name {
                return;
            }
            std::mem::replace(&mut *current, name.clone())
        };
        self.inner
            .on_display_name_changed
            .emit(&DisplayNameChanged { old, new: name });
    }

    /// Broadcast of display-name changes.
    pub fn on_display_name_changed(&self) -> &Event<DisplayNameChanged> {
        &self.inner.on_display_name_changed
    }

    /// Non-owning handle to this entity.
    pub fn downgrade(&self) -> WeakEntity {
        WeakEntity { inner: Arc::downgrade(&self.inner) }
    }

    /// Returns `true` if both handles refer to the same entity.
    pub fn ptr_eq(&self, other: &Entity) -> bool { Arc::ptr_eq(&self.inner, &other.inner) }

    /// The entity's capability table.
    pub fn collection(&self) -> &Arc<ComponentCollection> { &self.inner.collection }

    /// Returns `true` once the first startup pass has completed.
    pub fn components_initialized(&self) -> bool { self.inner.collection.components_initialized() }

    /// One-shot signal fired when the first startup pass completes.
    pub fn on_components_initialized(&self) -> &OnceSignal {
        self.inner.collection.on_components_initialized()
    }

    /// Broadcast of post-startup additions and removals.
    pub fn on_components_changed(&self) -> &Event<ComponentsChanged> {
        self.inner.collection.on_components_changed()
    }

    /// See [`ComponentCollection::add_component`].
    pub fn add_component<C: ?Sized + Component>(&self) -> ComponentResult<Option<Arc<C>>> {
        self.inner.collection.add_component::<C>()
    }

    /// See [`ComponentCollection::add_component_dyn`].
    pub fn add_component_dyn(&self, capability: CapabilityId) -> ComponentResult<Option<ComponentRef>> {
        self.inner.collection.add_component_dyn(capability)
    }

    /// See [`ComponentCollection::add_component_instance`].
    pub fn add_component_instance<C: ?Sized + Component>(&self, instance: Arc<C>) -> bool {
        self.inner.collection.add_component_instance(instance)
    }

    /// See [`ComponentCollection::remove_component`].
    pub fn remove_component<C: ?Sized + Component>(&self) -> bool {
        self.inner.collection.remove_component::<C>()
    }

    /// See [`ComponentCollection::remove_component_dyn`].
    pub fn remove_component_dyn(&self, capability: CapabilityId) -> bool {
        self.inner.collection.remove_component_dyn(capability)
    }

    /// See [`ComponentCollection::remove_component_instance`].
    pub fn remove_component_instance<C: ?Sized + Component>(&self, instance: &Arc<C>) -> bool {
        self.inner.collection.remove_component_instance(instance)
    }

    /// See [`ComponentCollection::pop_component`].
    pub fn pop_component<C: ?Sized + Component>(&self) -> Option<Arc<C>> {
        self.inner.collection.pop_component::<C>()
    }

    /// See [`ComponentCollection::has_component`].
    pub fn has_component<C: ?Sized + Component>(&self) -> bool {
        self.inner.collection.has_component::<C>()
    }

    /// See [`ComponentCollection::has_component_dyn`].
    pub fn has_component_dyn(&self, capability: CapabilityId) -> bool {
        self.inner.collection.has_component_dyn(capability)
    }

    /// See [`ComponentCollection::has_component_instance`].
    pub fn has_component_instance<C: ?Sized + Component>(&self, instance: &Arc<C>) -> bool {
        self.inner.collection.has_component_instance(instance)
    }

    /// See [`ComponentCollection::get_component`].
    pub fn get_component<C: ?Sized + Component>(&self) -> Option<Arc<C>> {
        self.inner.collection.get_component::<C>()
    }

    /// See [`ComponentCollection::get_component_dyn`].
    pub fn get_component_dyn(&self, capability: CapabilityId) -> Option<ComponentRef> {
        self.inner.collection.get_component_dyn(capability)
    }

    /// See [`ComponentCollection::bind`].
    pub fn bind<C, A, R>(&self, on_added: A, on_removed: R) -> Binding<C>
    where
        C: ?Sized + Component,
        A: Fn(Arc<C>) + Send + Sync + 'static,
        R: Fn(Arc<C>) + Send + Sync + 'static,
    {
        self.inner.collection.bind(on_added, on_removed)
    }

    /// Number of attached components.
    pub fn len(&self) -> usize { self.inner.collection.len() }

    /// Returns `true` if no components are attached.
    pub fn is_empty(&self) -> bool { self.inner.collection.is_empty() }

    /// Snapshot of attached components, in attachment order.
    pub fn components(&self) -> Vec<ComponentRef> { self.inner.collection.components() }

    /// Runs the two-phase startup. Subsequent calls are no-ops.
    ///
    /// Must not be called concurrently from two threads; the owning factory
    /// is responsible for calling it once.
    pub fn init_components(&self) {
        if self.is_disposed() || self.inner.init_started.swap(true, Ordering::AcqRel) {
            debug!(entity = %self.id(), "init_components ignored");
            return;
        }

        let collection = &self.inner.collection;
        let mut initialized = 0usize;
        let mut ready = 0usize;
        loop {
            loop {
                let pending: Vec<ComponentRef> = collection
                    .components()
                    .into_iter()
                    .filter(|item| !item.base().is_initialized())
                    .collect();
                if pending.is_empty() {
                    break;
                }
                for item in &pending {
                    if run_init(item, self) {
                        initialized += 1;
                    }
                }
            }
            debug!(entity = %self.id(), initialized, "startup phase 1 complete");

            let pending: Vec<ComponentRef> = collection
                .components()
                .into_iter()
                .filter(|item| !item.base().is_ready())
                .collect();
            if pending.is_empty() {
                break;
            }
            for item in &pending {
                if run_after_init(item) {
                    ready += 1;
                }
            }
        }
        debug!(entity = %self.id(), ready, "startup phase 2 complete");

        collection.mark_initialized();
    }

    /// Registers `callback` to run on disposal.
    ///
    /// If the entity is already disposed, `callback` runs immediately on this
    /// thread.
    pub fn on_disposed<F>(&self, callback: F)
    where
        F: FnOnce(&Entity) + Send + 'static,
    {
        let mut disposal = lock(&self.inner.disposal);
        if disposal.done {
            drop(disposal);
            callback(self);
            return;
        }
        disposal.callbacks.push(Box::new(callback));
    }

    /// Returns `true` once disposal has begun.
    pub fn is_disposed(&self) -> bool { self.inner.disposing.load(Ordering::Acquire) }

    /// Disposes the entity. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposing.swap(true, Ordering::AcqRel) {
            return;
        }
        debug!(entity = %self.id(), components = self.len(), "disposing entity");

        let collection = &self.inner.collection;
        collection.begin_teardown();
        collection.unbind_all();

        let callbacks = {
            let mut disposal = lock(&self.inner.disposal);
            disposal.done = true;
            std::mem::take(&mut disposal.callbacks)
        };
        for callback in callbacks {
            callback(self);
        }

        let disposed = collection.dispose_all();
        self.inner.on_display_name_changed.clear();

        if !self.inner.registry.release(&self.inner.id) {
            warn!(entity = %self.id(), "id was not registered at disposal");
        }
        debug!(entity = %self.id(), disposed, "entity disposed");
    }

    /// Mandatory requirements declared by attached components that are not
    /// currently satisfied. Informational; never enforced by the runtime.
    pub fn missing_requirements(&self) -> Vec<MissingRequirement> {
        let mut missing = Vec::new();
        for item in self.components() {
            for requirement in item.component().required_components() {
                if requirement.mandatory && !self.has_component_dyn(requirement.capability) {
                    missing.push(MissingRequirement {
                        component: item.name().to_owned(),
                        capability: requirement.capability,
                    });
                }
            }
        }
        missing
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool { self.ptr_eq(other) }
}

impl Eq for Entity {}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.inner.id)
            .field("components", &self.len())
            .field("initialized", &self.components_initialized())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.id)
    }
}
