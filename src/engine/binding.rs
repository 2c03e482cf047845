//! # Component Bindings
//!
//! Reactive observation of one capability on an entity.
//!
//! ## Purpose
//! A binding lets a component discover a sibling capability once and cache a
//! direct reference to it, instead of looking it up on every use. The binding
//! calls `on_added` when the capability becomes available and `on_removed`
//! when it goes away.
//!
//! ## Protocol
//! 1. Subscribe to the collection's change stream.
//! 2. If the capability is already present, call `on_added` before `bind`
//!    returns.
//! 3. If it is absent and the entity has not finished its first startup pass,
//!    also subscribe to the initialized signal. This catches a capability
//!    attached later in the same startup batch; additions made before startup
//!    completes emit no change event.
//! 4. On an `Add` event carrying the capability, bind it.
//! 5. On a `Remove` event carrying the bound instance, call `on_removed`; if
//!    startup is still pending, watch the initialized signal again.
//! 6. [`Binding::unbind`] detaches from both streams and, if something is
//!    bound, calls `on_removed` one final time.
//!
//! ## Invariants
//! - `on_added` and `on_removed` calls are balanced over the binding's life.
//! - The same instance is never reported as added twice in a row.
//! - Callbacks run with no binding or collection lock held, so they may add
//!   or remove components on the same entity.
//!
//! Matching is by registration key: a component implementing `C` but filed
//! under another capability is not reported.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use crate::engine::collection::{ComponentCollection, ComponentsChanged};
use crate::engine::component::Component;
use crate::engine::events::SubscriptionId;
use crate::engine::types::{CapabilityId, ChangeKind};


/// Type-erased unbind handle kept by the collection until disposal.
pub(crate) trait Unbind: Send + Sync {
    fn unbind(&self);
}

type Callback<C> = Box<dyn Fn(Arc<C>) + Send + Sync>;

struct BindingState<C: ?Sized> {
    active: bool,
    bound: Option<Arc<C>>,
    changes: Option<SubscriptionId>,
    startup: Option<SubscriptionId>,
}

struct BindingInner<C: ?Sized> {
    collection: Weak<ComponentCollection>,
    on_added: Callback<C>,
    on_removed: Callback<C>,
    state: Mutex<BindingState<C>>,
}

/// Live subscription to attach/detach of capability `C`.
///
/// Dropping the handle does not unbind; the owning entity keeps the binding
/// alive until [`Binding::unbind`] or entity disposal.
pub struct Binding<C: ?Sized> {
    inner: Arc<BindingInner<C>>,
}

impl<C: ?Sized> Clone for Binding<C> {
    fn clone(&self) -> Self { Self { inner: Arc::clone(&self.inner) } }
}

impl<C: ?Sized> fmt::Debug for Binding<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Binding")
            .field("capability", &std::any::type_name::<C>())
            .field("active", &state.active)
            .field("bound", &state.bound.is_some())
            .finish()
    }
}

impl<C: ?Sized + Component> Binding<C> {
    pub(crate) fn bind<A, R>(collection: &Arc<ComponentCollection>, on_added: A, on_removed: R) -> Self
    where
        A: Fn(Arc<C>) + Send + Sync + 'static,
        R: Fn(Arc<C>) + Send + Sync + 'static,
    {
        let inner = Arc::new(BindingInner {
            collection: Arc::downgrade(collection),
            on_added: Box::new(on_added),
            on_removed: Box::new(on_removed),
            state: Mutex::new(BindingState {
                active: true,
                bound: None,
                changes: None,
                startup: None,
            }),
        });

        if !collection.track_binding(Arc::clone(&inner) as Arc<dyn Unbind>) {
            inner.lock().active = false;
            return Self { inner };
        }

        let weak = Arc::downgrade(&inner);
        let changes = collection.on_components_changed().subscribe(move |change| {
            if let Some(inner) = weak.upgrade() {
                inner.on_change(change);
            }
        });
        inner.lock().changes = Some(changes);

        match collection.get_component::<C>() {
            Some(existing) => inner.try_bind(existing),
            None if !collection.components_initialized() => inner.watch_startup(collection),
            None => {}
        }

        Self { inner }
    }

    /// Currently bound instance, if any.
    pub fn bound(&self) -> Option<Arc<C>> { self.inner.lock().bound.clone() }

    /// Returns `true` until [`Binding::unbind`] (or entity disposal).
    pub fn is_active(&self) -> bool { self.inner.lock().active }

    /// Capability this binding observes.
    pub fn capability(&self) -> CapabilityId { CapabilityId::of::<C>() }

    /// Detaches from the entity. Idempotent.
    ///
    /// If an instance is bound, `on_removed` fires once more so that added and
    /// removed notifications stay balanced.
    pub fn unbind(&self) {
        if let Some(collection) = self.inner.collection.upgrade() {
            collection.untrack_binding(Arc::as_ptr(&self.inner).cast::<()>());
        }
        self.inner.unbind();
    }
}

impl<C: ?Sized> BindingInner<C> {
    fn lock(&self) -> MutexGuard<'_, BindingState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<C: ?Sized + Component> BindingInner<C> {
    fn try_bind(&self, instance: Arc<C>) {
        {
            let mut state = self.lock();
            if !state.active {
                return;
            }
            if state.bound.as_ref().map_or(false, |b| Arc::ptr_eq(b, &instance)) {
                return;
            }
            state.bound = Some(Arc::clone(&instance));
        }
        (self.on_added)(instance);
    }

    fn on_change(self: &Arc<Self>, change: &ComponentsChanged) {
        match change.kind {
            ChangeKind::Add => {
                // A capability never has two simultaneous instances, so the
                // first match is the only one.
                if let Some(instance) = change.items.iter().find_map(|item| item.downcast::<C>()) {
                    self.try_bind(instance);
                }
            }
            ChangeKind::Remove => {
                for item in &change.items {
                    let Some(instance) = item.downcast::<C>() else { continue };
                    let unbound = {
                        let mut state = self.lock();
                        match &state.bound {
                            Some(bound) if state.active && Arc::ptr_eq(bound, &instance) => {
                                state.bound.take()
                            }
                            _ => None,
                        }
                    };
                    if let Some(removed) = unbound {
                        (self.on_removed)(removed);
                        if let Some(collection) = self.collection.upgrade() {
                            if !collection.components_initialized() {
                                self.watch_startup(&collection);
                            }
                        }
                    }
                }
            }
        }
    }

    fn watch_startup(self: &Arc<Self>, collection: &Arc<ComponentCollection>) {
        {
            let state = self.lock();
            if !state.active || state.startup.is_some() {
                return;
            }
        }

        let weak = Arc::downgrade(self);
        let id = collection.on_components_initialized().subscribe(move || {
            let Some(inner) = weak.upgrade() else { return };
            inner.lock().startup = None;
            if let Some(existing) = inner
                .collection
                .upgrade()
                .and_then(|collection| collection.get_component::<C>())
            {
                inner.try_bind(existing);
            }
        });

        if let Some(id) = id {
            let mut state = self.lock();
            if state.active {
                state.startup = Some(id);
            } else {
                drop(state);
                collection.on_components_initialized().unsubscribe(id);
            }
        }
    }
}

impl<C: ?Sized + Component> Unbind for BindingInner<C> {
    fn unbind(&self) {
        let (bound, changes, startup) = {
            let mut state = self.lock();
            if !state.active {
                return;
            }
            state.active = false;
            (state.bound.take(), state.changes.take(), state.startup.take())
        };

        if let Some(collection) = self.collection.upgrade() {
            if let Some(id) = changes {
                collection.on_components_changed().unsubscribe(id);
            }
            if let Some(id) = startup {
                collection.on_components_initialized().unsubscribe(id);
            }
        }

        if let Some(instance) = bound {
            (self.on_removed)(instance);
        }
    }
}
