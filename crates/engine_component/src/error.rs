//! Error types for archetype reflection and requirement validation.

use thiserror::Error;

use crate::archetype::Archetype;
use crate::component::ComponentTypeId;
use crate::reflector::QueryId;

#[derive(Debug, Error)]
pub enum ReflectError {
    #[error("{0} was never added to the library")]
    UnknownArchetype(Archetype),

    /// The same fingerprint was registered with two different type lists.
    #[error("{archetype} already registered with {registered:?}, got {requested:?}")]
    ArchetypeMismatch {
        archetype: Archetype,
        registered: Vec<ComponentTypeId>,
        requested: Vec<ComponentTypeId>,
    },

    #[error("{archetype} is not the fingerprint of {types:?}")]
    FingerprintMismatch {
        archetype: Archetype,
        types: Vec<ComponentTypeId>,
    },

    #[error("query {0} is not tracked")]
    UnknownQuery(QueryId),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequirementError {
    #[error("{0} is both required and subtractive")]
    RequiredAndSubtractive(ComponentTypeId),

    #[error("{0} is both optional and subtractive")]
    OptionalAndSubtractive(ComponentTypeId),

    #[error("{0} belongs to an any-of group and is subtractive")]
    AnyOfAndSubtractive(ComponentTypeId),

    #[error("subtractive requirement on {0} cannot carry a payload or write access")]
    SubtractivePayload(ComponentTypeId),

    #[error("{0} is listed as both required and optional")]
    RequiredAndOptional(ComponentTypeId),
}
