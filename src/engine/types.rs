//! Core Runtime Types and Identifiers
//!
//! This module defines the small, copyable identifiers shared by every other
//! part of the runtime: the capability key components are filed under, the
//! entity identifier, the change kind carried by collection events and the
//! compile-time defaults used when sizing the concurrent tables.
//!
//! ## Capability keys
//!
//! A *capability* is the type a component is registered under. It is usually a
//! trait object (`dyn Lock`) but may be a concrete component type. At runtime a
//! capability is identified by its [`TypeId`]; the type name is carried along
//! purely for diagnostics.
//!
//! Two keys are equal if and only if their `TypeId`s are equal.

use std::any::{type_name, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};


/// Process-unique entity identifier.
///
/// Uniqueness is scoped to one [`IdRegistry`](crate::engine::registry::IdRegistry).
pub type EntityId = String;

/// Default number of capability slots reserved per entity table.
pub const DEFAULT_COMPONENT_CAPACITY: usize = 8;

/// Default number of IDs reserved by a fresh uniqueness registry.
pub const DEFAULT_ID_CAPACITY: usize = 64;

/// Runtime key for a capability type.
///
/// ## Purpose
/// Lets lookups be expressed either statically (`get_component::<dyn Lock>()`)
/// or dynamically (`get_component_dyn(CapabilityId::of::<dyn Lock>())`).
///
/// ## Invariants
/// - `name` never participates in equality or hashing.
#[derive(Clone, Copy, Debug)]
pub struct CapabilityId {
    type_id: TypeId,
    name: &'static str,
}

impl CapabilityId {
    /// Returns the key for capability `C`.
    #[inline]
    pub fn of<C: ?Sized + 'static>() -> Self {
        Self { type_id: TypeId::of::<C>(), name: type_name::<C>() }
    }

    /// Returns the underlying `TypeId`.
    #[inline]
    pub fn type_id(&self) -> TypeId { self.type_id }

    /// Returns the Rust type name of the capability.
    #[inline]
    pub fn name(&self) -> &'static str { self.name }

    /// Returns `true` if this key refers to capability `C`.
    #[inline]
    pub fn is<C: ?Sized + 'static>(&self) -> bool {
        self.type_id == TypeId::of::<C>()
    }
}

impl PartialEq for CapabilityId {
    fn eq(&self, other: &Self) -> bool { self.type_id == other.type_id }
}

impl Eq for CapabilityId {}

impl Hash for CapabilityId {
    fn hash<H: Hasher>(&self, state: &mut H) { self.type_id.hash(state); }
}

impl fmt::Display for CapabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Kind of mutation reported by a collection change event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A component was attached.
    Add,

    /// A component was detached.
    Remove,
}
