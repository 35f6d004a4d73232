//! Error types of the systems manager.

use engine_component::{
    Archetype, ComponentId, ComponentTypeId, Entity, ReflectError, RequirementError,
};
use engine_message::MessageError;
use thiserror::Error;

use crate::manager::ManagerState;
use crate::registry::SystemHandle;

/// Inconsistencies found while applying a tick's messages. Fatal: the
/// manager stops.
#[derive(Debug, Error)]
pub enum WorldError {
    #[error("{0} already exists")]
    DuplicateEntity(Entity),

    #[error("{0} does not exist")]
    MissingEntity(Entity),

    #[error("{entity} has no component {type_id} (instance {component_id:?})")]
    MissingComponent {
        entity: Entity,
        type_id: ComponentTypeId,
        component_id: Option<ComponentId>,
    },

    #[error("{entity} already has component {type_id} (instance {component_id:?})")]
    DuplicateComponent {
        entity: Entity,
        type_id: ComponentTypeId,
        component_id: Option<ComponentId>,
    },

    #[error("{entity} lives in {actual}, sender expected {expected}")]
    ArchetypeMismatch {
        entity: Entity,
        expected: Archetype,
        actual: Archetype,
    },

    #[error(transparent)]
    Reflect(#[from] ReflectError),
}

/// Why a tick was abandoned. Fatal: the manager stops.
#[derive(Debug, Error)]
pub enum TickError {
    #[error(transparent)]
    World(#[from] WorldError),

    #[error("system `{system}` panicked: {message}")]
    SystemPanicked { system: String, message: String },

    #[error("system `{0}` lost its body in an earlier failed tick")]
    MissingSystemBody(String),

    #[error("tick panicked outside any system: {0}")]
    Panicked(String),
}

/// Rejected system or pipeline registrations.
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("system `{name}` has contradictory requirements: {source}")]
    InvalidRequirements {
        name: String,
        #[source]
        source: RequirementError,
    },

    #[error("a system named `{0}` is already registered")]
    DuplicateName(String),

    #[error("system `{system}` must run after `{target}`, which is not registered in pipeline `{pipeline}`")]
    UnknownOrderingTarget {
        system: String,
        target: String,
        pipeline: String,
    },

    #[error("no pipeline named `{0}`")]
    UnknownPipeline(String),

    #[error("pipeline `{0}` already exists")]
    DuplicatePipeline(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var}={value:?} is not valid, expected {expected}")]
    InvalidValue {
        var: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("invalid configuration JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("`{operation}` is not allowed while the manager is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: ManagerState,
    },

    #[error("no pipeline named `{0}`")]
    UnknownPipeline(String),

    #[error("pipeline `{0}` is paused")]
    PipelinePaused(String),

    #[error("no system registered as {0}")]
    UnknownSystem(SystemHandle),

    #[error("streaming out requires every pipeline to be paused")]
    NotPaused,

    #[error("{0} is already present in the world or the load")]
    DuplicateEntity(Entity),

    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Tick(#[from] TickError),

    #[error(transparent)]
    Message(#[from] MessageError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("failed to build worker pool: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),

    #[error("failed to spawn dispatch thread: {0}")]
    Spawn(#[from] std::io::Error),
}
