//! # engine_app demo
//!
//! Runs a small particle simulation for about a second:
//!
//! 1. A spawner creates particles at start and whenever it receives the
//!    `spawn` action.
//! 2. A direct system integrates positions on the `sim` pipeline (60 Hz).
//! 3. A census system on the slower `report` pipeline tracks live particles.
//!
//! The world is then paused, streamed out to bytes, reloaded into a second
//! manager, and both managers are stopped.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use glam::Vec3;
use serde::{Deserialize, Serialize};
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine_app::engine_component::{
    Component, ComponentKind, ComponentRegistry, Entity, RequirementSpec,
};
use engine_app::engine_message::{
    EncodedEntityReader, EncodedEntityWriter, EntityRecord, EntitySink, MessageError, TickMessages,
};
use engine_app::engine_system::{
    DirectContext, FnDirectSystem, IndirectSystem, InputEvent, InputHandler, InputResponse,
    SystemDescriptor, SystemEnv, TracingSink,
};
use engine_app::{Dispatch, ManagerConfig, PipelineConfig, SystemsManager};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Position(Vec3);

impl Component for Position {
    fn type_name() -> &'static str {
        "Position"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Velocity(Vec3);

impl Component for Velocity {
    fn type_name() -> &'static str {
        "Velocity"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct Particle;

impl Component for Particle {
    fn type_name() -> &'static str {
        "Particle"
    }

    fn kind() -> ComponentKind {
        ComponentKind::Tag
    }
}

/// Spawns a burst at creation and on every `spawn` action.
struct Spawner {
    burst: usize,
    requested: usize,
}

impl Spawner {
    fn spawn(&self, env: &mut SystemEnv, count: usize) {
        for i in 0..count {
            let entity = env.messages.add_entity();
            let angle = i as f32 / count as f32 * std::f32::consts::TAU;
            env.messages.add_component(entity, Particle);
            env.messages.add_component(entity, Position(Vec3::ZERO));
            env.messages
                .add_component(entity, Velocity(Vec3::new(angle.cos(), angle.sin(), 0.0)));
        }
    }
}

impl IndirectSystem for Spawner {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new(
            "spawner",
            RequirementSpec::new()
                .adds(Particle::component_type_id())
                .adds(Position::component_type_id())
                .adds(Velocity::component_type_id()),
        )
    }

    fn on_create(&mut self, env: &mut SystemEnv) {
        self.spawn(env, self.burst);
    }

    fn run(&mut self, env: &mut SystemEnv) {
        let requested = std::mem::take(&mut self.requested);
        self.spawn(env, requested);
    }

    fn on_messages(&mut self, _messages: &TickMessages, _env: &mut SystemEnv) {}

    fn input_handler(&mut self) -> Option<&mut dyn InputHandler> {
        Some(self)
    }
}

impl InputHandler for Spawner {
    fn handle_input(&mut self, event: &InputEvent) -> InputResponse {
        match event {
            InputEvent::Action { tag, value } if tag == "spawn" => {
                self.requested += value.max(0.0) as usize;
                InputResponse::Handled
            }
            _ => InputResponse::Ignored,
        }
    }
}

/// Counts the particles it has been told about.
#[derive(Default)]
struct Census {
    live: std::collections::HashSet<Entity>,
}

impl IndirectSystem for Census {
    fn descriptor(&self) -> SystemDescriptor {
        SystemDescriptor::new(
            "census",
            RequirementSpec::new()
                .with(Particle::component_type_id())
                .read(Position::component_type_id()),
        )
    }

    fn on_messages(&mut self, messages: &TickMessages, env: &mut SystemEnv) {
        for state in messages.entity_added().iter().chain(messages.register_entity().iter()) {
            self.live.insert(state.entity);
        }
        for removal in messages.entity_removed().iter().chain(messages.unregister_entity().iter()) {
            self.live.remove(&removal.entity);
        }
        info!(tick_id = env.tick_id, live = self.live.len(), "census");
    }
}

/// A sink that only counts.
struct CountingSink(usize);

impl EntitySink for CountingSink {
    fn add_entity(&mut self, _record: EntityRecord) -> Result<(), MessageError> {
        self.0 += 1;
        Ok(())
    }
}

fn integrate() -> FnDirectSystem<impl FnMut(&mut DirectContext) + Send> {
    let spec = RequirementSpec::new()
        .write(Position::component_type_id())
        .read(Velocity::component_type_id());
    FnDirectSystem::new(SystemDescriptor::new("integrate", spec), |ctx: &mut DirectContext| {
        let dt = ctx.dt() as f32;
        for chunk in ctx.chunks_mut() {
            let velocities: Vec<Velocity> = chunk.read::<Velocity>().to_vec();
            for (position, velocity) in chunk.write::<Position>().iter_mut().zip(velocities) {
                position.0 += velocity.0 * dt;
            }
        }
    })
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("engine_app=info".parse()?)
                .add_directive("engine=info".parse()?),
        )
        .init();

    let config = ManagerConfig::from_env()?;
    info!(?config, "engine demo starting");

    let manager = SystemsManager::new(config.clone())?;
    manager.add_pipeline(PipelineConfig::with_tick_rate("sim", 60.0))?;
    manager.add_pipeline(PipelineConfig::interval("report", Duration::from_millis(250)))?;
    manager.register_indirect("sim", Spawner { burst: 16, requested: 0 })?;
    manager.register_direct("sim", integrate())?;
    manager.register_indirect("report", Census::default())?;

    manager.start()?;
    if config.dispatch == Dispatch::Manual {
        for _ in 0..30 {
            manager.tick_pipeline("sim")?;
        }
        manager.tick_pipeline("report")?;
    } else {
        std::thread::sleep(Duration::from_millis(500));
    }

    let handled = manager.send_input(&InputEvent::Action { tag: "spawn".to_string(), value: 8.0 });
    info!(handled, "spawn action sent");
    if config.dispatch == Dispatch::Manual {
        for _ in 0..30 {
            manager.tick_pipeline("sim")?;
        }
    } else {
        std::thread::sleep(Duration::from_millis(500));
    }

    manager.pause_all(true)?;
    let mut writer = EncodedEntityWriter::new(Vec::new());
    let written = manager.stream_out(&mut writer)?;
    writer.flush()?;
    let bytes = writer.into_inner();
    info!(entities = written, bytes = bytes.len(), "world streamed out");

    for pipeline in ["sim", "report"] {
        if let Some(stats) = manager.stats(pipeline) {
            info!(
                pipeline,
                ticks = stats.executed_ticks,
                avg_us = stats.average_tick_duration().as_micros() as u64,
                "pipeline stats"
            );
        }
    }
    manager.stop()?;
    info!(elapsed_ms = manager.elapsed().as_millis() as u64, "simulation stopped");

    let mut registry = ComponentRegistry::new();
    registry.register::<Position>();
    registry.register::<Velocity>();
    registry.register::<Particle>();
    let replica = SystemsManager::with_context(
        ManagerConfig::sequential().with_dispatch(Dispatch::Manual),
        Arc::clone(manager.ids()),
        Arc::new(TracingSink),
    )?;
    replica.add_pipeline(PipelineConfig::uninterval("sim"))?;
    let mut reader = EncodedEntityReader::new(bytes.as_slice(), &registry)?;
    let loaded = replica.load(&mut reader)?;
    replica.start()?;
    replica.tick_pipeline("sim")?;
    info!(loaded, entities = replica.entity_count(), "replica loaded");
    replica.stop()?;

    let mut counter = CountingSink(0);
    replica.stream_out(&mut counter)?;
    info!(count = counter.0, "engine demo finished");
    Ok(())
}
