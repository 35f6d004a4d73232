//! # engine_message
//!
//! The message protocol through which systems describe changes to the world.
//!
//! This crate provides:
//!
//! - [`messages`]: one record per mutation kind, and the [`Message`] enum.
//! - [`builder`]: [`MessageBuilder`], the per-system, per-tick recorder.
//! - [`stream`]: [`TickMessages`], a tick's messages grouped by kind, with
//!   typed [`Enumerate`] views.
//! - [`entity_stream`]: the pull/push contract for bulk entity state.
//! - [`codec`]: MessagePack helpers and the encoded entity stream.
//! - [`error`]: message-layer error types.

pub mod builder;
pub mod codec;
pub mod entity_stream;
pub mod error;
pub mod messages;
pub mod stream;

pub use builder::MessageBuilder;
pub use codec::{EncodedEntityReader, EncodedEntityWriter, decode, encode};
pub use entity_stream::{EntityRecord, EntitySink, EntityStream, VecEntityStream};
pub use error::MessageError;
pub use messages::{
    ComponentEntry, ComponentRemoval, ComponentUpdate, EntityRemoval, EntityState, Message, MessageKind,
    MessageRef,
};
pub use stream::{Enumerate, MessageStream, TickMessages};
