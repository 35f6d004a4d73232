#![allow(dead_code)]

use std::sync::Arc;

use engine_app::engine_component::{Component, ComponentKind, Entity, IdGenerators, RequirementSpec};
use engine_app::engine_message::{MessageKind, TickMessages};
use engine_app::engine_system::{IndirectSystem, MemorySink, SystemDescriptor, SystemEnv};
use engine_app::{Dispatch, ManagerConfig, SystemsManager};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter(pub u64);

impl Component for Counter {
    fn type_name() -> &'static str {
        "Counter"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Armor(pub u32);

impl Component for Armor {
    fn type_name() -> &'static str {
        "Armor"
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frozen;

impl Component for Frozen {
    fn type_name() -> &'static str {
        "Frozen"
    }

    fn kind() -> ComponentKind {
        ComponentKind::Tag
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item(pub u32);

impl Component for Item {
    fn type_name() -> &'static str {
        "Item"
    }

    fn kind() -> ComponentKind {
        ComponentKind::NonUnique
    }
}

/// A sequential manager ticked by hand, logging into memory.
pub fn manual() -> (SystemsManager, Arc<MemorySink>) {
    manual_with(ManagerConfig::sequential())
}

pub fn manual_with(config: ManagerConfig) -> (SystemsManager, Arc<MemorySink>) {
    let sink = Arc::new(MemorySink::default());
    let manager = SystemsManager::with_context(
        config.with_dispatch(Dispatch::Manual),
        Arc::new(IdGenerators::new()),
        sink.clone(),
    )
    .unwrap();
    (manager, sink)
}

/// What a [`Recorder`] saw, one batch per `on_messages` call.
#[derive(Debug, Default)]
pub struct Seen {
    pub batches: Vec<Vec<(MessageKind, Entity)>>,
    pub counters: Vec<(Entity, u64)>,
    pub created: bool,
    pub destroyed: bool,
}

impl Seen {
    pub fn flat(&self) -> Vec<(MessageKind, Entity)> {
        self.batches.iter().flatten().copied().collect()
    }

    pub fn count(&self, kind: MessageKind) -> usize {
        self.flat().iter().filter(|(k, _)| *k == kind).count()
    }
}

/// An indirect system that writes down every message it is given.
pub struct Recorder {
    descriptor: SystemDescriptor,
    seen: Arc<Mutex<Seen>>,
}

impl Recorder {
    pub fn new(name: &str, spec: RequirementSpec) -> (Self, Arc<Mutex<Seen>>) {
        let seen = Arc::new(Mutex::new(Seen::default()));
        (Self { descriptor: SystemDescriptor::new(name, spec), seen: seen.clone() }, seen)
    }

    /// Records anything carrying a [`Counter`].
    pub fn counters(name: &str) -> (Self, Arc<Mutex<Seen>>) {
        Self::new(name, RequirementSpec::new().read(Counter::component_type_id()))
    }
}

impl IndirectSystem for Recorder {
    fn descriptor(&self) -> SystemDescriptor {
        self.descriptor.clone()
    }

    fn on_create(&mut self, _env: &mut SystemEnv) {
        self.seen.lock().created = true;
    }

    fn on_messages(&mut self, messages: &TickMessages, _env: &mut SystemEnv) {
        let mut seen = self.seen.lock();
        seen.batches.push(messages.all().map(|m| (m.kind(), m.entity())).collect());
        let added = messages.entity_added().enumerate::<Counter>();
        let registered = messages.register_entity().enumerate::<Counter>();
        let changed = messages.component_changed().enumerate::<Counter>();
        for (entity, counter, _) in added.chain(registered).chain(changed) {
            seen.counters.push((entity, counter.0));
        }
    }

    fn on_destroy(&mut self, _env: &mut SystemEnv) {
        self.seen.lock().destroyed = true;
    }
}
