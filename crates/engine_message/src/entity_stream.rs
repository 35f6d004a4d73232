//! Bulk entity state: pull ([`EntityStream`]) and push ([`EntitySink`]).
//!
//! Used to seed a world from saved state and to stream live state out of a
//! paused one. Records carry the full component set of one entity.

use std::collections::VecDeque;

use engine_component::{Archetype, Component, ComponentId, Entity};

use crate::error::MessageError;
use crate::messages::{ComponentEntry, EntityState};

#[derive(Debug, Clone)]
pub struct EntityRecord {
    pub entity: Entity,
    pub label: Option<String>,
    pub components: Vec<ComponentEntry>,
}

impl EntityRecord {
    #[must_use]
    pub fn new(entity: Entity) -> Self {
        Self { entity, label: None, components: Vec::new() }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn with_component<T: Component>(mut self, value: T) -> Self {
        self.components.push(ComponentEntry::unique(value));
        self
    }

    #[must_use]
    pub fn with_instance<T: Component>(mut self, value: T, id: ComponentId) -> Self {
        self.components.push(ComponentEntry::instance(value, id));
        self
    }

    #[must_use]
    pub fn archetype(&self) -> Archetype {
        Archetype::from_types(self.components.iter().map(ComponentEntry::type_id))
    }

    /// Typed access to the first component of type `T`.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<&T> {
        self.components.iter().find_map(|c| c.value.downcast_ref::<T>())
    }

    #[must_use]
    pub fn into_state(self) -> EntityState {
        EntityState::new(self.entity, self.components)
    }
}

/// Pull side of an entity stream.
pub trait EntityStream {
    /// The next record, or `None` at the end of the stream.
    fn next_record(&mut self) -> Result<Option<EntityRecord>, MessageError>;

    /// Expected number of records, when the producer announced it.
    fn hint_total(&self) -> Option<usize> {
        None
    }
}

/// Push side of an entity stream.
pub trait EntitySink {
    /// Announces how many records will follow.
    fn hint_total(&mut self, _total: usize) -> Result<(), MessageError> {
        Ok(())
    }

    fn add_entity(&mut self, record: EntityRecord) -> Result<(), MessageError>;
}

/// In-memory entity stream; usable as both source and sink.
#[derive(Debug, Clone, Default)]
pub struct VecEntityStream {
    records: VecDeque<EntityRecord>,
    hint: Option<usize>,
}

impl VecEntityStream {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.iter()
    }

    #[must_use]
    pub fn into_records(self) -> Vec<EntityRecord> {
        self.records.into()
    }
}

impl From<Vec<EntityRecord>> for VecEntityStream {
    fn from(records: Vec<EntityRecord>) -> Self {
        let hint = Some(records.len());
        Self { records: records.into(), hint }
    }
}

impl EntityStream for VecEntityStream {
    fn next_record(&mut self) -> Result<Option<EntityRecord>, MessageError> {
        Ok(self.records.pop_front())
    }

    fn hint_total(&self) -> Option<usize> {
        self.hint
    }
}

impl EntitySink for VecEntityStream {
    fn hint_total(&mut self, total: usize) -> Result<(), MessageError> {
        self.hint = Some(total);
        self.records.reserve(total);
        Ok(())
    }

    fn add_entity(&mut self, record: EntityRecord) -> Result<(), MessageError> {
        self.records.push_back(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Score(i64);

    impl Component for Score {
        fn type_name() -> &'static str {
            "Score"
        }
    }

    #[test]
    fn test_vec_stream_is_fifo() {
        let mut sink = VecEntityStream::new();
        EntitySink::hint_total(&mut sink, 2).unwrap();
        sink.add_entity(EntityRecord::new(Entity(1)).with_component(Score(1))).unwrap();
        sink.add_entity(EntityRecord::new(Entity(2)).with_label("two")).unwrap();

        let mut source = sink;
        assert_eq!(EntityStream::hint_total(&source), Some(2));
        let first = source.next_record().unwrap().unwrap();
        assert_eq!(first.entity, Entity(1));
        assert_eq!(first.get::<Score>(), Some(&Score(1)));
        let second = source.next_record().unwrap().unwrap();
        assert_eq!(second.label.as_deref(), Some("two"));
        assert!(source.next_record().unwrap().is_none());
    }

    #[test]
    fn test_record_archetype() {
        let record = EntityRecord::new(Entity(1)).with_component(Score(3));
        assert_eq!(record.archetype(), Archetype::from_types([Score::component_type_id()]));
        assert_eq!(EntityRecord::new(Entity(2)).archetype(), Archetype::EMPTY);
    }
}
