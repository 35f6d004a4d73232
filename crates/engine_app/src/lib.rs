//! Systems manager: owns the entity world, schedules systems into
//! conflict-free stages, runs pipelines on their own cadence, and routes
//! each tick's messages to the systems that asked for them.

/// Formats and writes one line to a [`LogSink`](engine_system::LogSink),
/// skipping the formatting when the level is disabled.
macro_rules! log_to {
    ($sink:expr, $level:ident, $($arg:tt)+) => {{
        let level = engine_system::LogLevel::$level;
        if $sink.enabled(level) {
            $sink.log(level, format_args!($($arg)+));
        }
    }};
}

pub mod config;
mod delivery;
pub mod error;
mod manager;
mod pipeline;
mod registry;
pub mod scheduler;
mod table;
mod tick;
pub mod world;

pub use config::{Dispatch, ExecutionMode, ManagerConfig, PipelineConfig};
pub use error::{ConfigError, ManagerError, RegistrationError, TickError, WorldError};
pub use manager::{ManagerState, SystemsManager};
pub use pipeline::{PipelineState, PipelineStats};
pub use registry::SystemHandle;
pub use table::{ArchetypeTable, EntityComponents};
pub use world::World;

pub use engine_component;
pub use engine_message;
pub use engine_system;
