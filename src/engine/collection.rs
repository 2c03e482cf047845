//! # Component Collection
//!
//! The per-entity capability table.
//!
//! ## Purpose
//! Maps each capability to at most one component, constructs missing
//! capabilities through the entity's factory, runs the post-startup lifecycle
//! for late additions, and publishes change events that bindings subscribe to.
//!
//! ## Design
//! - The table is a sharded concurrent map from [`CapabilityId`] to a
//!   [`Slot`]. A slot is a deferred single-construction cell: the map entry is
//!   created empty (cheap, no factory call) and the factory runs inside the
//!   cell's fallible one-time initializer, outside any map lock.
//! - A failed construction leaves the cell empty, so the next request
//!   retries. A failure is never cached as the instance.
//! - Every filled slot records an attachment sequence number; snapshots are
//!   returned in attachment order, which is the order startup runs `init`.
//!
//! ## Invariants
//! - At most one component per capability at any instant.
//! - Concurrent first requests for a capability run the factory once and all
//!   observe the same instance.
//! - Once torn down, every mutating call is a silent no-op and never errors.
//! - Additions made before the first startup pass completes emit no change
//!   events; the one-shot initialized signal covers them. Removals always
//!   emit, so bindings made during startup see them.
//!
//! ## Re-entrancy
//! Events are delivered inline after all table locks are released, so
//! handlers may add or remove components on the same collection.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::{debug, trace, warn};

use crate::engine::binding::{Binding, Unbind};
use crate::engine::component::{run_after_init, run_dispose, run_init, Component, ComponentRef};
use crate::engine::entity::WeakEntity;
use crate::engine::error::{ComponentError, ComponentResult, FactoryError};
use crate::engine::events::{Event, OnceSignal};
use crate::engine::factory::CapabilityFactory;
use crate::engine::types::{CapabilityId, ChangeKind, EntityId};


/// Payload of a collection change event.
#[derive(Clone, Debug)]
pub struct ComponentsChanged {
    /// Whether components were attached or detached.
    pub kind: ChangeKind,

    /// The affected components.
    pub items: Vec<ComponentRef>,

    /// Collection size after an `Add`, or before a `Remove`.
    pub count_at_change: usize,
}

struct Attached {
    seq: u64,
    item: ComponentRef,
}

/// Deferred single-construction cell for one capability.
#[derive(Default)]
struct Slot {
    cell: OnceCell<Attached>,
}

/// Concurrency-safe capability table owned by one entity.
pub struct ComponentCollection {
    owner: WeakEntity,
    owner_id: EntityId,
    factory: Arc<dyn CapabilityFactory>,
    slots: DashMap<CapabilityId, Arc<Slot>>,
    filled: AtomicUsize,
    next_seq: AtomicU64,
    initialized: AtomicBool,
    torn_down: AtomicBool,
    on_changed: Event<ComponentsChanged>,
    on_initialized: OnceSignal,
    bindings: Mutex<Vec<Arc<dyn Unbind>>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ComponentCollection {
    pub(crate) fn new(
        owner: WeakEntity,
        owner_id: EntityId,
        factory: Arc<dyn CapabilityFactory>,
        capacity: usize,
    ) -> Self {
        Self {
            owner,
            owner_id,
            factory,
            slots: DashMap::with_capacity(capacity),
            filled: AtomicUsize::new(0),
            next_seq: AtomicU64::new(0),
            initialized: AtomicBool::new(false),
            torn_down: AtomicBool::new(false),
            on_changed: Event::new(),
            on_initialized: OnceSignal::new(),
            bindings: Mutex::new(Vec::new()),
        }
    }

    /// Returns `true` once the owning entity finished its first startup pass.
    #[inline]
    pub fn components_initialized(&self) -> bool { self.initialized.load(Ordering::Acquire) }

    /// Returns `true` once the owning entity has been disposed.
    #[inline]
    pub fn is_torn_down(&self) -> bool { self.torn_down.load(Ordering::Acquire) }

    /// Broadcast of post-startup additions and removals.
    pub fn on_components_changed(&self) -> &Event<ComponentsChanged> { &self.on_changed }

    /// One-shot signal fired when the first startup pass completes.
    pub fn on_components_initialized(&self) -> &OnceSignal { &self.on_initialized }

    /// Number of attached components.
    pub fn len(&self) -> usize { self.filled.load(Ordering::Acquire) }

    /// Number of table entries, counting capabilities still under construction.
    pub fn reserved_slots(&self) -> usize { self.slots.len() }

    /// Returns `true` if no components are attached.
    pub fn is_empty(&self) -> bool { self.len() == 0 }

    fn slot_for(&self, capability: CapabilityId) -> Arc<Slot> {
        Arc::clone(&*self.slots.entry(capability).or_default())
    }

    fn is_current(&self, capability: CapabilityId, slot: &Arc<Slot>) -> bool {
        self.slots
            .get(&capability)
            .map_or(false, |current| Arc::ptr_eq(&*current, slot))
    }

    fn next_seq(&self) -> u64 { self.next_seq.fetch_add(1, Ordering::Relaxed) }

    /// Returns the component filed under `C`, constructing it if absent.
    ///
    /// Returns `Ok(None)` once the entity is disposed; nothing is constructed.
    ///
    /// A caller that finds the capability already filled gets the instance
    /// immediately, even if the thread that constructed it is still running
    /// its `init`/`after_init`. Waiting would deadlock an `init` that looks
    /// up its own capability.
    ///
    /// ## Errors
    /// [`ComponentError::Factory`] if construction fails; the next call retries.
    pub fn add_component<C: ?Sized + Component>(&self) -> ComponentResult<Option<Arc<C>>> {
        let capability = CapabilityId::of::<C>();
        let Some(item) = self.add_component_dyn(capability)? else {
            return Ok(None);
        };
        item.downcast::<C>().map(Some).ok_or_else(|| {
            ComponentError::Factory(FactoryError::CapabilityMismatch {
                requested: capability,
                produced: item.capability(),
            })
        })
    }

    /// Runtime-keyed form of [`ComponentCollection::add_component`].
    pub fn add_component_dyn(&self, capability: CapabilityId) -> ComponentResult<Option<ComponentRef>> {
        loop {
            if self.is_torn_down() {
                debug!(entity = %self.owner_id, capability = capability.name(), "add on disposed entity ignored");
                return Ok(None);
            }

            let slot = self.slot_for(capability);
            let mut constructed = false;
            let attached = slot.cell.get_or_try_init(|| {
                let item = self.factory.create(capability)?;
                if item.capability() != capability {
                    return Err(ComponentError::Factory(FactoryError::CapabilityMismatch {
                        requested: capability,
                        produced: item.capability(),
                    }));
                }
                item.base()
                    .attach(&self.owner, &self.owner_id, capability)
                    .map_err(|owner| ComponentError::AlreadyAttached {
                        name: item.name().to_owned(),
                        owner,
                    })?;
                constructed = true;
                Ok::<_, ComponentError>(Attached { seq: self.next_seq(), item })
            });

            let item = match attached {
                Ok(attached) => attached.item.clone(),
                Err(e) => {
                    warn!(entity = %self.owner_id, capability = capability.name(), error = %e, "component construction failed");
                    self.release_empty(capability, slot);
                    return Err(e);
                }
            };

            if constructed {
                self.filled.fetch_add(1, Ordering::AcqRel);
                trace!(entity = %self.owner_id, capability = capability.name(), component = item.name(), "component constructed");
                self.attached(&item);
                return Ok(Some(item));
            }
            if self.is_current(capability, &slot) {
                return Ok(Some(item));
            }
            // Slot was removed between lookup and read; retry against the live table.
        }
    }

    /// Drops a slot left empty by a failed construction, unless another
    /// caller still holds it.
    fn release_empty(&self, capability: CapabilityId, slot: Arc<Slot>) {
        self.slots.remove_if(&capability, |_, current| {
            Arc::ptr_eq(current, &slot) && current.cell.get().is_none() && Arc::strong_count(current) == 2
        });
    }

    /// Files a caller-supplied instance under `C` if the capability is free.
    ///
    /// Returns whether this call won. A losing instance is left untouched:
    /// it is neither attached nor disposed, and remains the caller's
    /// responsibility.
    pub fn add_component_instance<C: ?Sized + Component>(&self, instance: Arc<C>) -> bool {
        self.add_component_ref(ComponentRef::new(instance))
    }

    /// Runtime-keyed form of [`ComponentCollection::add_component_instance`].
    pub fn add_component_ref(&self, item: ComponentRef) -> bool {
        let capability = item.capability();
        if self.is_torn_down() {
            return false;
        }
        if !item.base().can_attach(&self.owner) {
            warn!(
                entity = %self.owner_id,
                component = item.name(),
                owner = item.base().owner_id().unwrap_or_default(),
                "component belongs to another entity"
            );
            return false;
        }

        let slot = self.slot_for(capability);
        let won = slot
            .cell
            .set(Attached { seq: self.next_seq(), item: item.clone() })
            .is_ok();
        if !won {
            return false;
        }

        let _ = item.base().attach(&self.owner, &self.owner_id, capability);
        self.filled.fetch_add(1, Ordering::AcqRel);
        trace!(entity = %self.owner_id, capability = capability.name(), component = item.name(), "component attached");
        self.attached(&item);
        true
    }

    /// Post-startup lifecycle and notification for a newly filed component.
    fn attached(&self, item: &ComponentRef) {
        if !self.components_initialized() {
            return;
        }
        if let Some(entity) = self.owner.upgrade() {
            run_init(item, &entity);
            run_after_init(item);
        }
        self.on_changed.emit(&ComponentsChanged {
            kind: ChangeKind::Add,
            items: vec![item.clone()],
            count_at_change: self.len(),
        });
    }

    /// Detaches the component under `capability`, optionally only if it is
    /// `expected`. Disposes it when asked, then emits the remove event.
    fn detach(
        &self,
        capability: CapabilityId,
        expected: Option<&ComponentRef>,
        dispose: bool,
    ) -> Option<ComponentRef> {
        if self.is_torn_down() {
            return None;
        }

        let (_, slot) = self.slots.remove_if(&capability, |_, slot| match slot.cell.get() {
            Some(attached) => expected.map_or(true, |e| attached.item.ptr_eq(e)),
            None => false,
        })?;
        let item = slot.cell.get()?.item.clone();
        let count_before = self.filled.fetch_sub(1, Ordering::AcqRel);
        trace!(entity = %self.owner_id, capability = capability.name(), component = item.name(), dispose, "component detached");

        if dispose {
            run_dispose(&item);
        }
        self.on_changed.emit(&ComponentsChanged {
            kind: ChangeKind::Remove,
            items: vec![item.clone()],
            count_at_change: count_before,
        });
        Some(item)
    }

    /// Removes and disposes the component filed under `C`.
    pub fn remove_component<C: ?Sized + Component>(&self) -> bool {
        self.remove_component_dyn(CapabilityId::of::<C>())
    }

    /// Runtime-keyed form of [`ComponentCollection::remove_component`].
    pub fn remove_component_dyn(&self, capability: CapabilityId) -> bool {
        self.detach(capability, None, true).is_some()
    }

    /// Removes and disposes `instance` if it is the component filed under `C`.
    pub fn remove_component_instance<C: ?Sized + Component>(&self, instance: &Arc<C>) -> bool {
        self.remove_component_ref(&ComponentRef::new(Arc::clone(instance)))
    }

    /// Removes and disposes the component `item` refers to, if attached.
    pub fn remove_component_ref(&self, item: &ComponentRef) -> bool {
        self.detach(item.capability(), Some(item), true).is_some()
    }

    /// Removes the component filed under `C` without disposing it.
    pub fn pop_component<C: ?Sized + Component>(&self) -> Option<Arc<C>> {
        self.detach(CapabilityId::of::<C>(), None, false)
            .and_then(|item| item.downcast::<C>())
    }

    /// Returns `true` if a component is filed under `C`.
    pub fn has_component<C: ?Sized + Component>(&self) -> bool {
        self.has_component_dyn(CapabilityId::of::<C>())
    }

    /// Runtime-keyed form of [`ComponentCollection::has_component`].
    pub fn has_component_dyn(&self, capability: CapabilityId) -> bool {
        self.get_component_dyn(capability).is_some()
    }

    /// Returns `true` if `instance` is the component filed under `C`.
    pub fn has_component_instance<C: ?Sized + Component>(&self, instance: &Arc<C>) -> bool {
        self.get_component_dyn(CapabilityId::of::<C>())
            .map_or(false, |item| item.is_instance(instance))
    }

    /// Returns `true` if the component `item` refers to is attached.
    pub fn has_component_ref(&self, item: &ComponentRef) -> bool {
        self.get_component_dyn(item.capability())
            .map_or(false, |current| current.ptr_eq(item))
    }

    /// Returns the component filed under `C`.
    pub fn get_component<C: ?Sized + Component>(&self) -> Option<Arc<C>> {
        self.get_component_dyn(CapabilityId::of::<C>())
            .and_then(|item| item.downcast::<C>())
    }

    /// Runtime-keyed form of [`ComponentCollection::get_component`].
    pub fn get_component_dyn(&self, capability: CapabilityId) -> Option<ComponentRef> {
        let slot = self.slots.get(&capability)?;
        slot.cell.get().map(|attached| attached.item.clone())
    }

    /// Snapshot of the attached components, in attachment order.
    pub fn components(&self) -> Vec<ComponentRef> {
        let mut attached: Vec<(u64, ComponentRef)> = self
            .slots
            .iter()
            .filter_map(|entry| entry.value().cell.get().map(|a| (a.seq, a.item.clone())))
            .collect();
        attached.sort_by_key(|(seq, _)| *seq);
        attached.into_iter().map(|(_, item)| item).collect()
    }

    /// Observes attach/detach of capability `C`. See [`Binding`].
    pub fn bind<C, A, R>(self: &Arc<Self>, on_added: A, on_removed: R) -> Binding<C>
    where
        C: ?Sized + Component,
        A: Fn(Arc<C>) + Send + Sync + 'static,
        R: Fn(Arc<C>) + Send + Sync + 'static,
    {
        Binding::bind(self, on_added, on_removed)
    }

    pub(crate) fn track_binding(&self, binding: Arc<dyn Unbind>) -> bool {
        if self.is_torn_down() {
            return false;
        }
        lock(&self.bindings).push(binding);
        true
    }

    pub(crate) fn untrack_binding(&self, binding: *const ()) {
        lock(&self.bindings).retain(|b| Arc::as_ptr(b).cast::<()>() != binding);
    }

    /// Flips the initialized flag and fires the one-shot signal.
    pub(crate) fn mark_initialized(&self) {
        if self.initialized.swap(true, Ordering::AcqRel) {
            return;
        }
        self.on_initialized.fire();
    }

    /// Stops accepting mutations. Returns `false` if already torn down.
    pub(crate) fn begin_teardown(&self) -> bool {
        !self.torn_down.swap(true, Ordering::AcqRel)
    }

    /// Unbinds every outstanding binding, firing their `on_removed`.
    pub(crate) fn unbind_all(&self) {
        let bindings = std::mem::take(&mut *lock(&self.bindings));
        for binding in bindings {
            binding.unbind();
        }
    }

    /// Empties the table and disposes every component directly, without
    /// emitting per-item change events.
    pub(crate) fn dispose_all(&self) -> usize {
        let items = self.components();
        self.slots.clear();
        self.filled.store(0, Ordering::Release);

        let mut disposed = 0;
        for item in &items {
            if run_dispose(item) {
                disposed += 1;
            }
        }
        self.on_changed.clear();
        self.on_initialized.clear();
        disposed
    }
}
