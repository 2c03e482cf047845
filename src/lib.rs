//! # Composition Runtime
//!
//! Entity/component substrate for a 2D adventure-game engine. Rooms,
//! characters, buttons and sliders are all entities composed from components
//! looked up by capability.
//!
//! ## Design Goals
//! - Capability-keyed component tables (look up `dyn Lock`, not `OakLock`)
//! - Thread-safe single construction under concurrent first access
//! - Two-phase startup (`init` then `after_init`)
//! - Reactive bindings with startup catch-up
//! - Idempotent teardown that never fails
//!
//! The runtime knows nothing about game semantics, performs no dependency
//! resolution and schedules nothing. Construction is delegated to an injected
//! [`CapabilityFactory`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::manager::{
    EntityManager,
    ManagerConfig,
};

pub use engine::entity::{
    Entity,
    WeakEntity,
    DisplayNameChanged,
    MissingRequirement,
};

pub use engine::component::{
    AsComponent,
    Component,
    ComponentBase,
    ComponentRef,
    RequiredComponent,
};

pub use engine::collection::{
    ComponentCollection,
    ComponentsChanged,
};

pub use engine::binding::Binding;

pub use engine::factory::{
    CapabilityFactory,
    FactoryRegistry,
    FnFactory,
};

pub use engine::registry::IdRegistry;

pub use engine::events::{
    Event,
    OnceSignal,
    SubscriptionId,
};

pub use engine::error::{
    ComponentError,
    ComponentResult,
    EntityError,
    EntityResult,
    FactoryError,
};

pub use engine::types::{
    CapabilityId,
    ChangeKind,
    EntityId,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used runtime types.
///
/// Import with:
/// ```rust
/// use composition_runtime::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        Binding,
        CapabilityFactory,
        CapabilityId,
        Component,
        ComponentBase,
        ComponentRef,
        Entity,
        EntityManager,
        FactoryRegistry,
        RequiredComponent,
    };
}
