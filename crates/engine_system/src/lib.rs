//! # engine_system
//!
//! Everything a system author touches.
//!
//! A system declares a [`SystemDescriptor`] (name, [`RequirementSpec`] and
//! ordering constraints) and implements one of two traits:
//!
//! - [`DirectSystem`]: runs over packed component arrays
//!   ([`ArchetypeChunk`]) gathered from every matching archetype.
//! - [`IndirectSystem`]: keeps private state and learns about the world
//!   only through message streams.
//!
//! Both record their changes through the [`MessageBuilder`] inside their
//! [`SystemEnv`].
//!
//! ## Usage
//!
//! ```rust
//! use engine_component::{ComponentTypeId, RequirementSpec};
//! use engine_system::{DirectContext, FnDirectSystem, SystemDescriptor};
//!
//! let movement = FnDirectSystem::new(
//!     SystemDescriptor::new(
//!         "movement",
//!         RequirementSpec::new()
//!             .read(ComponentTypeId::from_name("Velocity"))
//!             .write(ComponentTypeId::from_name("Position")),
//!     ),
//!     |_ctx: &mut DirectContext| { /* system logic */ },
//! );
//! # let _ = movement;
//! ```
//!
//! [`RequirementSpec`]: engine_component::RequirementSpec
//! [`MessageBuilder`]: engine_message::MessageBuilder

pub mod chunk;
pub mod context;
pub mod descriptor;
pub mod input;
pub mod log;
pub mod system;

pub use chunk::{ArchetypeChunk, GatheredColumn};
pub use context::{DirectContext, SystemEnv};
pub use descriptor::SystemDescriptor;
pub use input::{DeviceId, InputEvent, InputHandler, InputResponse, KeyEvent, KeyState};
#[cfg(any(test, feature = "test-util"))]
pub use log::MemorySink;
pub use log::{LogLevel, LogSink, TracingSink};
pub use system::{DirectSystem, FnDirectSystem, IndirectSystem};
