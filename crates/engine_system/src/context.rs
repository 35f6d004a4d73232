//! Per-tick execution contexts provided to systems.

use std::sync::Arc;

use engine_component::{Entity, IdGenerators};
use engine_message::{MessageBuilder, TickMessages};

use crate::chunk::ArchetypeChunk;

/// Tick metadata plus the system's message builder.
///
/// Handed to indirect systems on every callback and embedded in
/// [`DirectContext`] for direct ones.
#[derive(Debug)]
pub struct SystemEnv {
    /// The current tick ID of the pipeline; `0` during lifecycle callbacks.
    pub tick_id: u64,
    /// Delta time since the pipeline's previous tick, in seconds.
    pub dt: f64,
    /// Where the system records its changes.
    pub messages: MessageBuilder,
}

impl SystemEnv {
    /// Create a new env for a tick.
    #[must_use]
    pub fn new(tick_id: u64, dt: f64, ids: Arc<IdGenerators>) -> Self {
        Self {
            tick_id,
            dt,
            messages: MessageBuilder::new(ids),
        }
    }

    /// Closes the builder.
    #[must_use]
    pub fn finish(self) -> TickMessages {
        self.messages.finish()
    }
}

/// Context of a direct system: the env plus one chunk per matching
/// archetype.
#[derive(Debug)]
pub struct DirectContext {
    pub env: SystemEnv,
    chunks: Vec<ArchetypeChunk>,
}

impl DirectContext {
    #[must_use]
    pub fn new(env: SystemEnv, chunks: Vec<ArchetypeChunk>) -> Self {
        Self { env, chunks }
    }

    #[must_use]
    pub fn tick_id(&self) -> u64 {
        self.env.tick_id
    }

    #[must_use]
    pub fn dt(&self) -> f64 {
        self.env.dt
    }

    pub fn messages(&mut self) -> &mut MessageBuilder {
        &mut self.env.messages
    }

    #[must_use]
    pub fn chunks(&self) -> &[ArchetypeChunk] {
        &self.chunks
    }

    pub fn chunks_mut(&mut self) -> &mut [ArchetypeChunk] {
        &mut self.chunks
    }

    /// Every entity across all chunks, in chunk order.
    pub fn entities(&self) -> impl Iterator<Item = Entity> + '_ {
        self.chunks.iter().flat_map(|c| c.entities().iter().copied())
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.chunks.iter().map(ArchetypeChunk::len).sum()
    }

    #[must_use]
    pub fn into_parts(self) -> (SystemEnv, Vec<ArchetypeChunk>) {
        (self.env, self.chunks)
    }
}
