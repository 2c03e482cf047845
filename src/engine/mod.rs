//! # Engine Module
//!
//! Internal runtime implementation.
//!
//! This module contains the composition building blocks:
//! - Capability keys and identifiers
//! - Synchronous events
//! - The component contract
//! - Capability factories
//! - Entity ID registry
//! - Component collections and bindings
//! - Entities and the entity manager
//!
//! Public API exposure is controlled by `lib.rs`.

pub mod types;
pub mod error;
pub mod events;
pub mod component;
pub mod factory;
pub mod registry;
pub mod collection;
pub mod binding;
pub mod entity;
pub mod manager;
