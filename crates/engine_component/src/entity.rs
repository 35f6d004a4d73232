//! Entity and component-instance identifiers, and their generators.
//!
//! An [`Entity`] is a lightweight `u64` identifier with no inherent data. A
//! [`ComponentId`] names one instance of a non-unique component. Both are
//! drawn from independent monotonic counters and are never reused.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// A unique entity identifier.
///
/// Entities are pure identifiers. Components are attached to entities to give
/// them meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Entity(pub u64);

impl Entity {
    /// The null / invalid entity sentinel.
    pub const INVALID: Entity = Entity(0);

    #[must_use]
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }

    /// Returns `true` if this is a valid (non-zero) entity.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Entity({})", self.0)
    }
}

/// Identifier of one non-unique component instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u64);

impl ComponentId {
    pub const INVALID: ComponentId = ComponentId(0);

    #[must_use]
    pub const fn id(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ComponentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Component({})", self.0)
    }
}

/// Lock-free monotonic counter. The first generated value is 1.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last: AtomicU64,
}

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generate(&self) -> u64 {
        self.last.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// The most recently generated value, `0` if none yet.
    #[must_use]
    pub fn last_generated(&self) -> u64 {
        self.last.load(Ordering::Relaxed)
    }

    /// Makes sure `id` is never generated, e.g. after loading saved state.
    pub fn observe(&self, id: u64) {
        self.last.fetch_max(id, Ordering::Relaxed);
    }
}

/// Generates [`Entity`] ids and keeps their optional debug labels.
#[derive(Debug, Default)]
pub struct EntityIdGenerator {
    ids: IdGenerator,
    labels: DashMap<Entity, String>,
}

impl EntityIdGenerator {
    pub fn generate(&self) -> Entity {
        Entity(self.ids.generate())
    }

    pub fn generate_labeled(&self, label: impl Into<String>) -> Entity {
        let entity = self.generate();
        self.labels.insert(entity, label.into());
        entity
    }

    #[must_use]
    pub fn last_generated(&self) -> Entity {
        Entity(self.ids.last_generated())
    }

    pub fn observe(&self, entity: Entity) {
        self.ids.observe(entity.0);
    }

    pub fn set_label(&self, entity: Entity, label: impl Into<String>) {
        self.labels.insert(entity, label.into());
    }

    #[must_use]
    pub fn label(&self, entity: Entity) -> Option<String> {
        self.labels.get(&entity).map(|l| l.value().clone())
    }

    pub fn forget(&self, entity: Entity) {
        self.labels.remove(&entity);
    }
}

#[derive(Debug, Default)]
pub struct ComponentIdGenerator {
    ids: IdGenerator,
}

impl ComponentIdGenerator {
    pub fn generate(&self) -> ComponentId {
        ComponentId(self.ids.generate())
    }

    #[must_use]
    pub fn last_generated(&self) -> ComponentId {
        ComponentId(self.ids.last_generated())
    }

    pub fn observe(&self, id: ComponentId) {
        self.ids.observe(id.0);
    }
}

/// Both generators, shared between the manager and every message builder.
#[derive(Debug, Default)]
pub struct IdGenerators {
    pub entities: EntityIdGenerator,
    pub components: ComponentIdGenerator,
}

impl IdGenerators {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn test_entity_invalid() {
        assert!(!Entity::INVALID.is_valid());
        assert!(Entity::from_raw(42).is_valid());
    }

    #[test]
    fn test_generator_produces_unique_ids() {
        let ids = IdGenerators::new();
        let e1 = ids.entities.generate();
        let e2 = ids.entities.generate();
        let c1 = ids.components.generate();
        assert_eq!(e1.id(), 1);
        assert_eq!(e2.id(), 2);
        // Component ids use their own counter.
        assert_eq!(c1.id(), 1);
        assert_eq!(ids.entities.last_generated(), e2);
    }

    #[test]
    fn test_generator_is_safe_under_contention() {
        let ids = Arc::new(IdGenerators::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || (0..1000).map(|_| ids.entities.generate()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<Entity> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 4000);
        assert_eq!(ids.entities.last_generated(), Entity(4000));
    }

    #[test]
    fn test_observe_skips_loaded_ids() {
        let ids = IdGenerators::new();
        ids.entities.observe(Entity(50));
        assert_eq!(ids.entities.generate(), Entity(51));
        // Observing a smaller id never moves the counter backwards.
        ids.entities.observe(Entity(3));
        assert_eq!(ids.entities.generate(), Entity(52));
    }

    #[test]
    fn test_labels() {
        let ids = IdGenerators::new();
        let player = ids.entities.generate_labeled("player");
        let other = ids.entities.generate();
        assert_eq!(ids.entities.label(player).as_deref(), Some("player"));
        assert_eq!(ids.entities.label(other), None);
    }

    #[test]
    fn test_entity_serialization_roundtrip() {
        let entity = Entity::from_raw(999);
        let bytes = rmp_serde::to_vec(&entity).unwrap();
        let restored: Entity = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(entity, restored);
    }
}
