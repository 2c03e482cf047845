//! # Capability Factories
//!
//! Construction of components on behalf of an entity's table.
//!
//! ## Purpose
//! The runtime never decides how a component is built. When a capability is
//! requested and not yet present, the entity's [`CapabilityFactory`] is asked
//! for an instance. Any strategy satisfies the contract: a service locator, a
//! DI container, or the closure table provided here.
//!
//! ## Provided factories
//! - [`FactoryRegistry`]: a type-keyed table of constructors that can be
//!   `freeze()`d once world setup is complete.
//! - [`FnFactory`]: wraps a single closure handling every capability.
//!
//! ## Invariants
//! - A factory must return a handle filed under the requested capability;
//!   the registry checks this and reports [`FactoryError::CapabilityMismatch`].
//! - Constructors run without any runtime lock held, so they may themselves
//!   add components to other entities or consult the registry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::engine::component::{Component, ComponentRef};
use crate::engine::error::FactoryError;
use crate::engine::types::CapabilityId;


/// Produces component instances for requested capabilities.
pub trait CapabilityFactory: Send + Sync {
    /// Constructs a new component filed under `capability`.
    fn create(&self, capability: CapabilityId) -> Result<ComponentRef, FactoryError>;
}

type Constructor = Arc<dyn Fn() -> Result<ComponentRef, FactoryError> + Send + Sync>;

/// Type-keyed constructor table.
///
/// ## Design
/// - `constructors` maps a capability to the closure that builds it.
/// - `frozen` rejects further registrations once setup is done.
///
/// ## Concurrency
/// Lookups take a shared read lock only long enough to clone the constructor;
/// the constructor itself runs unlocked.
#[derive(Default)]
pub struct FactoryRegistry {
    constructors: RwLock<HashMap<CapabilityId, Constructor>>,
    frozen: AtomicBool,
}

impl FactoryRegistry {
    /// Creates an empty, unfrozen registry.
    pub fn new() -> Self { Self::default() }

    /// Registers an infallible constructor for capability `C`.
    ///
    /// Re-registering a capability replaces its constructor.
    ///
    /// ## Errors
    /// [`FactoryError::Frozen`] after [`FactoryRegistry::freeze`].
    pub fn register<C, F>(&self, constructor: F) -> Result<(), FactoryError>
    where
        C: ?Sized + Component,
        F: Fn() -> Arc<C> + Send + Sync + 'static,
    {
        self.install(
            CapabilityId::of::<C>(),
            Arc::new(move || Ok::<_, FactoryError>(ComponentRef::new(constructor()))),
        )
    }

    /// Registers a constructor for capability `C` that may fail.
    ///
    /// ## Errors
    /// [`FactoryError::Frozen`] after [`FactoryRegistry::freeze`].
    pub fn register_fallible<C, F>(&self, constructor: F) -> Result<(), FactoryError>
    where
        C: ?Sized + Component,
        F: Fn() -> Result<Arc<C>, FactoryError> + Send + Sync + 'static,
    {
        self.install(
            CapabilityId::of::<C>(),
            Arc::new(move || constructor().map(ComponentRef::new)),
        )
    }

    fn install(&self, capability: CapabilityId, constructor: Constructor) -> Result<(), FactoryError> {
        if self.is_frozen() {
            return Err(FactoryError::Frozen { capability });
        }
        self.constructors
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(capability, constructor);
        debug!(capability = capability.name(), "constructor registered");
        Ok(())
    }

    /// Rejects any further registrations.
    pub fn freeze(&self) { self.frozen.store(true, Ordering::Release); }

    /// Returns `true` once the registry has been frozen.
    pub fn is_frozen(&self) -> bool { self.frozen.load(Ordering::Acquire) }

    /// Returns `true` if a constructor exists for `capability`.
    pub fn contains(&self, capability: CapabilityId) -> bool {
        self.constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&capability)
    }

    /// Number of registered capabilities.
    pub fn len(&self) -> usize {
        self.constructors.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if nothing is registered.
    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl CapabilityFactory for FactoryRegistry {
    fn create(&self, capability: CapabilityId) -> Result<ComponentRef, FactoryError> {
        let constructor = self
            .constructors
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&capability)
            .cloned()
            .ok_or(FactoryError::Unregistered { capability })?;

        let item = constructor()?;
        if item.capability() != capability {
            return Err(FactoryError::CapabilityMismatch {
                requested: capability,
                produced: item.capability(),
            });
        }
        Ok(item)
    }
}

/// A [`CapabilityFactory`] backed by a single closure.
///
/// Handy for tests and for hosts that already have their own lookup.
pub struct FnFactory<F>
where
    F: Fn(CapabilityId) -> Result<ComponentRef, FactoryError> + Send + Sync + 'static,
{
    f: F,
}

impl<F> FnFactory<F>
where
    F: Fn(CapabilityId) -> Result<ComponentRef, FactoryError> + Send + Sync + 'static,
{
    /// Wraps `f`.
    pub fn new(f: F) -> Self { Self { f } }
}

impl<F> CapabilityFactory for FnFactory<F>
where
    F: Fn(CapabilityId) -> Result<ComponentRef, FactoryError> + Send + Sync + 'static,
{
    fn create(&self, capability: CapabilityId) -> Result<ComponentRef, FactoryError> {
        (self.f)(capability)
    }
}
