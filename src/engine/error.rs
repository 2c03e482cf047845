//! Error types for entity construction, capability factories and component
//! attachment.
//!
//! Each error type models a narrow family of failures and carries enough
//! context (entity IDs, capability names) to be actionable in logs without
//! reproducing the issue.
//!
//! ## Failure surface
//! * **Entity construction** fails fast on a duplicate ID ([`EntityError`]).
//! * **Capability factories** report unregistered or mismatched capabilities
//!   and construction failures ([`FactoryError`]).
//! * **Component attachment** surfaces factory failures and foreign
//!   ownership ([`ComponentError`]).
//!
//! Calls made against a disposed entity never panic and never error. They
//! report "nothing happened" as `false` or `None`; `add_component` returns
//! `Ok(None)`.
//!
//! Binding callbacks are not wrapped: a panicking `on_added`/`on_removed`
//! unwinds through the add/remove call that triggered it.
//!
//! ## Example
//! ```ignore
//! match entity.add_component::<dyn Lock>() {
//!     Ok(Some(lock)) => lock.engage(),
//!     Ok(None) => {} // entity already disposed
//!     Err(ComponentError::Factory(FactoryError::Unregistered { capability })) => {
//!         eprintln!("no constructor registered for {capability}");
//!     }
//!     Err(e) => eprintln!("{e}"),
//! }
//! ```

use thiserror::Error;

use crate::engine::types::{CapabilityId, EntityId};


/// Returned when an entity cannot be brought into existence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    /// Another live entity in the same registry already owns this ID.
    ///
    /// The entity is never constructed; nothing is attached.
    #[error("entity id `{id}` is already registered")]
    DuplicateId {
        /// The contested identifier.
        id: EntityId,
    },
}

/// Returned by a [`CapabilityFactory`](crate::engine::factory::CapabilityFactory)
/// that cannot produce the requested capability.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FactoryError {
    /// No constructor is registered for the capability.
    #[error("no constructor registered for capability `{capability}`")]
    Unregistered {
        /// Capability that was requested.
        capability: CapabilityId,
    },

    /// The registry was frozen before this registration was attempted.
    #[error("factory registry is frozen; cannot register `{capability}`")]
    Frozen {
        /// Capability whose registration was rejected.
        capability: CapabilityId,
    },

    /// The constructor produced a component filed under a different key.
    #[error("constructor for `{requested}` produced a component filed under `{produced}`")]
    CapabilityMismatch {
        /// Capability that was requested.
        requested: CapabilityId,

        /// Capability the produced handle is filed under.
        produced: CapabilityId,
    },

    /// The constructor itself failed.
    #[error("failed to construct `{capability}`: {reason}")]
    Construction {
        /// Capability being constructed.
        capability: CapabilityId,

        /// Human-readable failure description.
        reason: String,
    },
}

impl FactoryError {
    /// Convenience constructor for [`FactoryError::Construction`].
    pub fn construction<C: ?Sized + 'static>(reason: impl Into<String>) -> Self {
        FactoryError::Construction {
            capability: CapabilityId::of::<C>(),
            reason: reason.into(),
        }
    }
}

/// Errors surfaced while attaching components to an entity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComponentError {
    /// The capability factory failed. The slot stays empty and retryable.
    #[error(transparent)]
    Factory(#[from] FactoryError),

    /// A caller-supplied instance already belongs to another entity.
    #[error("component `{name}` is already attached to entity `{owner}`")]
    AlreadyAttached {
        /// Diagnostic name of the component.
        name: String,

        /// ID of the entity that owns it.
        owner: EntityId,
    },
}

/// Result alias for entity construction.
pub type EntityResult<T> = Result<T, EntityError>;

/// Result alias for component attachment.
pub type ComponentResult<T> = Result<T, ComponentError>;
