//! # Component Contract
//!
//! This module defines what a component is from the runtime's point of view
//! and the type-erased handle the runtime stores it behind.
//!
//! ## Purpose
//! A component is a behavior unit filed under exactly one *capability* in its
//! entity's table. The capability is usually a trait object the component
//! implements (`dyn Lock`), so call sites look components up by what they can
//! do rather than by concrete type.
//!
//! ## Design
//! - [`Component`] is object safe. Every component embeds a [`ComponentBase`]
//!   that the runtime uses to record the owning entity, the registration type
//!   and lifecycle progress.
//! - [`AsComponent`] upcasts any `Arc<C>` (including `Arc<dyn Lock>` where
//!   `trait Lock: Component`) to `Arc<dyn Component>`. It is implemented for
//!   every sized component automatically.
//! - [`ComponentRef`] pairs the lifecycle view (`Arc<dyn Component>`) with the
//!   typed view (`Arc<C>` erased behind `Any`) so typed lookups never need a
//!   second downcast path.
//!
//! ## Invariants
//! - The owning entity and registration type are set once, by the runtime, and
//!   never change afterwards.
//! - The runtime calls `init`, `after_init` and `dispose` at most once each per
//!   component, and `after_init` only after `init`.
//! - Components are shared (`Arc`); their own mutable state uses interior
//!   mutability.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use crate::engine::entity::{Entity, WeakEntity};
use crate::engine::types::{CapabilityId, EntityId};


/// Upcast helper from any component `Arc` to `Arc<dyn Component>`.
///
/// Implemented automatically for every sized [`Component`]; trait objects
/// whose trait extends `Component` dispatch to it through their vtable.
pub trait AsComponent {
    /// Converts this handle into the lifecycle view.
    fn as_component(self: Arc<Self>) -> Arc<dyn Component>;
}

impl<T: Component> AsComponent for T {
    fn as_component(self: Arc<Self>) -> Arc<dyn Component> { self }
}

/// A behavior unit attached to an entity.
///
/// ## Lifecycle
/// 1. Filed into an entity's table (back-reference recorded).
/// 2. `init` (Phase 1): wire bindings to sibling capabilities here.
/// 3. `after_init` (Phase 2): every sibling has finished `init`.
/// 4. `dispose`: on removal or entity disposal.
///
/// Components added after the entity finished its first startup pass go
/// through steps 2 and 3 inside the `add_component` call.
pub trait Component: AsComponent + Send + Sync + 'static {
    /// Returns the embedded runtime bookkeeping.
    fn base(&self) -> &ComponentBase;

    /// Diagnostic name.
    fn name(&self) -> &str { self.base().name() }

    /// Owning entity, if attached and still alive.
    fn entity(&self) -> Option<Entity> { self.base().entity() }

    /// Capability this component is filed under, once attached.
    fn registration_type(&self) -> Option<CapabilityId> { self.base().registration_type() }

    /// Returns `true` once the runtime has disposed this component.
    fn is_disposed(&self) -> bool { self.base().is_disposed() }

    /// Declarative sibling requirements. Informational only; never enforced.
    fn required_components(&self) -> Vec<RequiredComponent> { Vec::new() }

    /// Phase 1 hook.
    fn init(&self, entity: &Entity, registration: CapabilityId) {
        let _ = (entity, registration);
    }

    /// Phase 2 hook.
    fn after_init(&self) {}

    /// Teardown hook.
    fn dispose(&self) {}
}

/// Declarative dependency on a sibling capability.
///
/// Used by tooling (see `Entity::missing_requirements`); the runtime never
/// sorts or rejects components based on it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RequiredComponent {
    /// Capability the component expects on the same entity.
    pub capability: CapabilityId,

    /// Whether the component cannot function without it.
    pub mandatory: bool,
}

impl RequiredComponent {
    /// Declares a requirement on capability `C`.
    pub fn of<C: ?Sized + 'static>(mandatory: bool) -> Self {
        Self { capability: CapabilityId::of::<C>(), mandatory }
    }
}

struct Owner {
    entity: WeakEntity,
    id: EntityId,
}

/// Runtime bookkeeping embedded in every component.
pub struct ComponentBase {
    name: String,
    owner: OnceLock<Owner>,
    registration: OnceLock<CapabilityId>,
    initialized: AtomicBool,
    ready: AtomicBool,
    disposed: AtomicBool,
}

impl ComponentBase {
    /// Creates bookkeeping with the given diagnostic name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owner: OnceLock::new(),
            registration: OnceLock::new(),
            initialized: AtomicBool::new(false),
            ready: AtomicBool::new(false),
            disposed: AtomicBool::new(false),
        }
    }

    /// Creates bookkeeping named after type `T`, without its module path.
    pub fn named_after<T: ?Sized>() -> Self {
        let full = type_name::<T>();
        Self::new(full.rsplit("::").next().unwrap_or(full))
    }

    /// Diagnostic name.
    pub fn name(&self) -> &str { &self.name }

    /// Owning entity, if attached and still alive.
    pub fn entity(&self) -> Option<Entity> {
        self.owner.get().and_then(|o| o.entity.upgrade())
    }

    /// ID of the entity this component was attached to, even if that entity
    /// has since been dropped.
    pub fn owner_id(&self) -> Option<&str> {
        self.owner.get().map(|o| o.id.as_str())
    }

    /// Capability this component is filed under, once attached.
    pub fn registration_type(&self) -> Option<CapabilityId> { self.registration.get().copied() }

    /// Returns `true` once `init` has been dispatched.
    pub fn is_initialized(&self) -> bool { self.initialized.load(Ordering::Acquire) }

    /// Returns `true` once `after_init` has been dispatched.
    pub fn is_ready(&self) -> bool { self.ready.load(Ordering::Acquire) }

    /// Returns `true` once `dispose` has been dispatched.
    pub fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }

    /// Returns `true` if this component is unowned or already owned by `entity`.
    pub(crate) fn can_attach(&self, entity: &WeakEntity) -> bool {
        self.owner.get().map_or(true, |o| o.entity.ptr_eq(entity))
    }

    /// Records the owning entity and registration type.
    ///
    /// Returns the current owner's ID if the component belongs elsewhere.
    pub(crate) fn attach(
        &self,
        entity: &WeakEntity,
        id: &str,
        registration: CapabilityId,
    ) -> Result<(), EntityId> {
        let owner = self.owner.get_or_init(|| Owner { entity: entity.clone(), id: id.to_owned() });
        if !owner.entity.ptr_eq(entity) {
            return Err(owner.id.clone());
        }
        let _ = self.registration.set(registration);
        Ok(())
    }

    fn claim_init(&self) -> bool { !self.initialized.swap(true, Ordering::AcqRel) }

    fn claim_ready(&self) -> bool {
        self.is_initialized() && !self.ready.swap(true, Ordering::AcqRel)
    }

    fn claim_dispose(&self) -> bool { !self.disposed.swap(true, Ordering::AcqRel) }
}

impl fmt::Debug for ComponentBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentBase")
            .field("name", &self.name)
            .field("owner", &self.owner_id())
            .field("registration", &self.registration_type())
            .field("initialized", &self.is_initialized())
            .field("ready", &self.is_ready())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Type-erased handle to a component filed under one capability.
///
/// ## Identity
/// Two handles are the same component iff they point at the same allocation
/// ([`ComponentRef::ptr_eq`]).
#[derive(Clone)]
pub struct ComponentRef {
    capability: CapabilityId,
    component: Arc<dyn Component>,
    typed: Arc<dyn Any + Send + Sync>,
}

impl ComponentRef {
    /// Wraps `instance` as a component filed under capability `C`.
    pub fn new<C: ?Sized + Component>(instance: Arc<C>) -> Self {
        let component = Arc::clone(&instance).as_component();
        Self {
            capability: CapabilityId::of::<C>(),
            component,
            typed: Arc::new(instance),
        }
    }

    /// Capability this handle is filed under.
    #[inline]
    pub fn capability(&self) -> CapabilityId { self.capability }

    /// Lifecycle view of the component.
    #[inline]
    pub fn component(&self) -> &Arc<dyn Component> { &self.component }

    /// Diagnostic name of the component.
    pub fn name(&self) -> &str { self.component.name() }

    /// Returns the typed handle if this component is filed under `C`.
    pub fn downcast<C: ?Sized + 'static>(&self) -> Option<Arc<C>> {
        self.typed.downcast_ref::<Arc<C>>().cloned()
    }

    /// Returns `true` if both handles refer to the same component.
    pub fn ptr_eq(&self, other: &ComponentRef) -> bool {
        self.addr() == other.addr()
    }

    /// Returns `true` if this handle refers to `instance`.
    pub fn is_instance<C: ?Sized>(&self, instance: &Arc<C>) -> bool {
        self.addr() == Arc::as_ptr(instance).cast::<()>()
    }

    pub(crate) fn base(&self) -> &ComponentBase { self.component.base() }

    fn addr(&self) -> *const () { Arc::as_ptr(&self.component).cast::<()>() }
}

impl fmt::Debug for ComponentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentRef")
            .field("capability", &self.capability.name())
            .field("name", &self.name())
            .finish()
    }
}

/// Dispatches `init` if it has not run yet. Returns whether it ran.
pub(crate) fn run_init(item: &ComponentRef, entity: &Entity) -> bool {
    if !item.base().claim_init() {
        return false;
    }
    item.component.init(entity, item.capability);
    true
}

/// Dispatches `after_init` if `init` ran and `after_init` has not.
pub(crate) fn run_after_init(item: &ComponentRef) -> bool {
    if !item.base().claim_ready() {
        return false;
    }
    item.component.after_init();
    true
}

/// Dispatches `dispose` at most once.
pub(crate) fn run_dispose(item: &ComponentRef) -> bool {
    if !item.base().claim_dispose() {
        return false;
    }
    item.component.dispose();
    true
}
