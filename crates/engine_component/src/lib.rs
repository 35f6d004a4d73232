//! # engine_component
//!
//! The "C" in ECS. Defines what a component is, how component sets are
//! fingerprinted into archetypes, and how systems describe the data they need.
//!
//! This crate provides:
//!
//! - [`Component`] trait and the type-erased [`ComponentValue`].
//! - [`ComponentRegistry`] for decoding components by type id.
//! - [`Entity`] / [`ComponentId`] and the lock-free [`IdGenerators`].
//! - [`Archetype`] / [`ArchetypeFull`] fingerprints.
//! - [`RequirementSpec`] describing what a system reads, writes and excludes.
//! - [`ArchetypeReflector`] which answers "which archetypes match this spec".

pub mod archetype;
pub mod component;
pub mod entity;
pub mod error;
pub mod reflector;
pub mod requirement;

pub use archetype::{Archetype, ArchetypeFull, canonical_types};
pub use component::{
    Component, ComponentKind, ComponentMeta, ComponentRegistry, ComponentTypeId, ComponentValue,
};
pub use entity::{ComponentId, ComponentIdGenerator, Entity, EntityIdGenerator, IdGenerator, IdGenerators};
pub use error::{ReflectError, RequirementError};
pub use reflector::{ArchetypeReflector, QueryId};
pub use requirement::{Access, GroupId, Requirement, RequirementKind, RequirementSpec};
