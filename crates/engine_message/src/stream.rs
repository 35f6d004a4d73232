//! A tick's messages, grouped by kind.
//!
//! [`TickMessages`] keeps one vector per [`MessageKind`]. Consumers read a
//! kind through a [`MessageStream`], either entry by entry or through the
//! typed [`Enumerate`] view that yields only components of one type.

use std::collections::BTreeSet;
use std::marker::PhantomData;

use engine_component::{Component, ComponentId, ComponentTypeId, ComponentValue, Entity};

use crate::messages::{
    ComponentRemoval, ComponentUpdate, EntityRemoval, EntityState, Message, MessageKind, MessageRef,
};

#[derive(Debug, Clone, Default)]
pub struct TickMessages {
    register_entity: Vec<EntityState>,
    entity_added: Vec<EntityState>,
    component_added: Vec<ComponentUpdate>,
    component_changed: Vec<ComponentUpdate>,
    component_removed: Vec<ComponentRemoval>,
    entity_removed: Vec<EntityRemoval>,
    unregister_entity: Vec<EntityRemoval>,
}

impl TickMessages {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of records across all kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        MessageKind::ALL.iter().map(|k| self.len_of(*k)).sum()
    }

    #[must_use]
    pub fn len_of(&self, kind: MessageKind) -> usize {
        match kind {
            MessageKind::RegisterEntity => self.register_entity.len(),
            MessageKind::EntityAdded => self.entity_added.len(),
            MessageKind::ComponentAdded => self.component_added.len(),
            MessageKind::ComponentChanged => self.component_changed.len(),
            MessageKind::ComponentRemoved => self.component_removed.len(),
            MessageKind::EntityRemoved => self.entity_removed.len(),
            MessageKind::UnregisterEntity => self.unregister_entity.len(),
        }
    }

    pub fn push(&mut self, message: Message) {
        match message {
            Message::RegisterEntity(m) => self.register_entity.push(m),
            Message::EntityAdded(m) => self.entity_added.push(m),
            Message::ComponentAdded(m) => self.component_added.push(m),
            Message::ComponentChanged(m) => self.component_changed.push(m),
            Message::ComponentRemoved(m) => self.component_removed.push(m),
            Message::EntityRemoved(m) => self.entity_removed.push(m),
            Message::UnregisterEntity(m) => self.unregister_entity.push(m),
        }
    }

    /// Appends every record of `other`, keeping per-kind order.
    pub fn merge(&mut self, mut other: TickMessages) {
        self.register_entity.append(&mut other.register_entity);
        self.entity_added.append(&mut other.entity_added);
        self.component_added.append(&mut other.component_added);
        self.component_changed.append(&mut other.component_changed);
        self.component_removed.append(&mut other.component_removed);
        self.entity_removed.append(&mut other.entity_removed);
        self.unregister_entity.append(&mut other.unregister_entity);
    }

    /// Pre-allocates room for `additional` records of `kind`.
    pub fn reserve(&mut self, kind: MessageKind, additional: usize) {
        match kind {
            MessageKind::RegisterEntity => self.register_entity.reserve(additional),
            MessageKind::EntityAdded => self.entity_added.reserve(additional),
            MessageKind::ComponentAdded => self.component_added.reserve(additional),
            MessageKind::ComponentChanged => self.component_changed.reserve(additional),
            MessageKind::ComponentRemoved => self.component_removed.reserve(additional),
            MessageKind::EntityRemoved => self.entity_removed.reserve(additional),
            MessageKind::UnregisterEntity => self.unregister_entity.reserve(additional),
        }
    }

    #[must_use]
    pub fn register_entity(&self) -> MessageStream<'_, EntityState> {
        MessageStream::new(MessageKind::RegisterEntity, &self.register_entity)
    }

    #[must_use]
    pub fn entity_added(&self) -> MessageStream<'_, EntityState> {
        MessageStream::new(MessageKind::EntityAdded, &self.entity_added)
    }

    #[must_use]
    pub fn component_added(&self) -> MessageStream<'_, ComponentUpdate> {
        MessageStream::new(MessageKind::ComponentAdded, &self.component_added)
    }

    #[must_use]
    pub fn component_changed(&self) -> MessageStream<'_, ComponentUpdate> {
        MessageStream::new(MessageKind::ComponentChanged, &self.component_changed)
    }

    #[must_use]
    pub fn component_removed(&self) -> MessageStream<'_, ComponentRemoval> {
        MessageStream::new(MessageKind::ComponentRemoved, &self.component_removed)
    }

    #[must_use]
    pub fn entity_removed(&self) -> MessageStream<'_, EntityRemoval> {
        MessageStream::new(MessageKind::EntityRemoved, &self.entity_removed)
    }

    #[must_use]
    pub fn unregister_entity(&self) -> MessageStream<'_, EntityRemoval> {
        MessageStream::new(MessageKind::UnregisterEntity, &self.unregister_entity)
    }

    /// Every record, kind by kind in delivery order.
    pub fn all(&self) -> impl Iterator<Item = MessageRef<'_>> + '_ {
        self.register_entity
            .iter()
            .map(MessageRef::RegisterEntity)
            .chain(self.entity_added.iter().map(MessageRef::EntityAdded))
            .chain(self.component_added.iter().map(MessageRef::ComponentAdded))
            .chain(self.component_changed.iter().map(MessageRef::ComponentChanged))
            .chain(self.component_removed.iter().map(MessageRef::ComponentRemoved))
            .chain(self.entity_removed.iter().map(MessageRef::EntityRemoved))
            .chain(self.unregister_entity.iter().map(MessageRef::UnregisterEntity))
    }

    /// Every component type mentioned by any record.
    #[must_use]
    pub fn touched_types(&self) -> BTreeSet<ComponentTypeId> {
        let states = self.register_entity.iter().chain(&self.entity_added);
        let updates = self.component_added.iter().chain(&self.component_changed);
        states
            .flat_map(|s| s.components.iter().map(|c| c.type_id()))
            .chain(updates.map(ComponentUpdate::type_id))
            .chain(self.component_removed.iter().map(|r| r.type_id))
            .collect()
    }

    /// Every entity mentioned by any record.
    #[must_use]
    pub fn touched_entities(&self) -> BTreeSet<Entity> {
        self.all().map(|m| m.entity()).collect()
    }

    /// Entities whose component set changed without being added or removed
    /// as a whole.
    #[must_use]
    pub fn reshaped_entities(&self) -> BTreeSet<Entity> {
        self.component_added
            .iter()
            .map(|u| u.entity)
            .chain(self.component_removed.iter().map(|r| r.entity))
            .collect()
    }
}

/// Borrowed view over the records of one kind.
#[derive(Debug)]
pub struct MessageStream<'a, M> {
    kind: MessageKind,
    entries: &'a [M],
}

impl<M> Clone for MessageStream<'_, M> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<M> Copy for MessageStream<'_, M> {}

impl<'a, M> MessageStream<'a, M> {
    fn new(kind: MessageKind, entries: &'a [M]) -> Self {
        Self { kind, entries }
    }

    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.kind
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'a, M> {
        self.entries.iter()
    }

    #[must_use]
    pub fn as_slice(&self) -> &'a [M] {
        self.entries
    }
}

impl<'a, M> IntoIterator for MessageStream<'a, M> {
    type Item = &'a M;
    type IntoIter = std::slice::Iter<'a, M>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

impl<'a> MessageStream<'a, EntityState> {
    /// Every component of type `T` carried by the entity records.
    #[must_use]
    pub fn enumerate<T: Component>(&self) -> Enumerate<'a, T> {
        Enumerate::new(
            self.entries
                .iter()
                .flat_map(|s| s.components.iter().map(move |c| (s.entity, &c.value, c.component_id))),
        )
    }
}

impl<'a> MessageStream<'a, ComponentUpdate> {
    /// Every update of type `T`.
    #[must_use]
    pub fn enumerate<T: Component>(&self) -> Enumerate<'a, T> {
        Enumerate::new(self.entries.iter().map(|u| (u.entity, &u.value, u.component_id)))
    }
}

impl<'a> MessageStream<'a, ComponentRemoval> {
    /// Removals of one component type.
    pub fn of_type(&self, type_id: ComponentTypeId) -> impl Iterator<Item = &'a ComponentRemoval> + 'a {
        self.entries.iter().filter(move |r| r.type_id == type_id)
    }
}

type ErasedEntries<'a> = Box<dyn Iterator<Item = (Entity, &'a ComponentValue, Option<ComponentId>)> + 'a>;

/// Typed view over a stream: yields `(entity, &T, component_id)` for every
/// entry whose type is `T`.
///
/// Entries whose type id matches `T` but whose value is not a `T` cause a
/// panic.
pub struct Enumerate<'a, T> {
    inner: ErasedEntries<'a>,
    type_id: ComponentTypeId,
    _marker: PhantomData<fn() -> T>,
}

impl<'a, T: Component> Enumerate<'a, T> {
    fn new(inner: impl Iterator<Item = (Entity, &'a ComponentValue, Option<ComponentId>)> + 'a) -> Self {
        Self {
            inner: Box::new(inner),
            type_id: T::component_type_id(),
            _marker: PhantomData,
        }
    }
}

impl<'a, T: Component> Iterator for Enumerate<'a, T> {
    type Item = (Entity, &'a T, Option<ComponentId>);

    fn next(&mut self) -> Option<Self::Item> {
        for (entity, value, component_id) in self.inner.by_ref() {
            if value.component_type() == self.type_id {
                return Some((entity, value.get::<T>(), component_id));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use engine_component::ComponentKind;
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::messages::ComponentEntry;

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Health(u32);

    impl Component for Health {
        fn type_name() -> &'static str {
            "Health"
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Item(u32);

    impl Component for Item {
        fn type_name() -> &'static str {
            "Item"
        }

        fn kind() -> ComponentKind {
            ComponentKind::NonUnique
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    struct Impostor(String);

    impl Component for Impostor {
        // Same name as `Health`, so the same type id.
        fn type_name() -> &'static str {
            "Health"
        }
    }

    fn changed(entity: u64, value: ComponentValue, id: Option<ComponentId>) -> Message {
        Message::ComponentChanged(ComponentUpdate { entity: Entity(entity), value, component_id: id })
    }

    fn sample() -> TickMessages {
        let mut messages = TickMessages::new();
        messages.push(Message::EntityAdded(EntityState::new(
            Entity(1),
            vec![
                ComponentEntry::unique(Health(10)),
                ComponentEntry::instance(Item(1), ComponentId(1)),
                ComponentEntry::instance(Item(2), ComponentId(2)),
            ],
        )));
        messages.push(changed(2, ComponentValue::new(Health(5)), None));
        messages.push(changed(3, ComponentValue::new(Item(7)), Some(ComponentId(9))));
        messages.push(Message::EntityRemoved(EntityRemoval { entity: Entity(4), archetype: None }));
        messages
    }

    #[test]
    fn test_enumerate_filters_by_type() {
        let messages = sample();

        let items: Vec<_> = messages.entity_added().enumerate::<Item>().collect();
        assert_eq!(
            items,
            vec![(Entity(1), &Item(1), Some(ComponentId(1))), (Entity(1), &Item(2), Some(ComponentId(2)))]
        );

        let health: Vec<_> = messages.component_changed().enumerate::<Health>().collect();
        assert_eq!(health, vec![(Entity(2), &Health(5), None)]);
    }

    #[test]
    #[should_panic(expected = "accessed as")]
    fn test_enumerate_wrong_declared_type_panics() {
        let messages = sample();
        let _ = messages.component_changed().enumerate::<Impostor>().count();
    }

    #[test]
    fn test_all_iterates_in_kind_order() {
        let mut messages = sample();
        messages.push(Message::RegisterEntity(EntityState::new(Entity(5), Vec::new())));

        let kinds: Vec<_> = messages.all().map(|m| m.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                MessageKind::RegisterEntity,
                MessageKind::EntityAdded,
                MessageKind::ComponentChanged,
                MessageKind::ComponentChanged,
                MessageKind::EntityRemoved,
            ]
        );
        assert_eq!(messages.len(), 5);
    }

    #[test]
    fn test_merge_preserves_per_kind_order() {
        let mut first = TickMessages::new();
        first.push(changed(1, ComponentValue::new(Health(1)), None));
        let mut second = TickMessages::new();
        second.push(changed(2, ComponentValue::new(Health(2)), None));

        first.merge(second);
        let order: Vec<_> = first.component_changed().iter().map(|u| u.entity).collect();
        assert_eq!(order, vec![Entity(1), Entity(2)]);
    }

    #[test]
    fn test_touched_summaries() {
        let messages = sample();
        let types = messages.touched_types();
        assert!(types.contains(&Health::component_type_id()));
        assert!(types.contains(&Item::component_type_id()));

        let entities: Vec<_> = messages.touched_entities().into_iter().collect();
        assert_eq!(entities, vec![Entity(1), Entity(2), Entity(3), Entity(4)]);
        assert!(messages.reshaped_entities().is_empty());
    }

    #[test]
    fn test_removal_of_type() {
        let mut messages = TickMessages::new();
        let health = Health::component_type_id();
        messages.push(Message::ComponentRemoved(ComponentRemoval {
            entity: Entity(1),
            type_id: health,
            component_id: None,
        }));
        messages.push(Message::ComponentRemoved(ComponentRemoval {
            entity: Entity(1),
            type_id: Item::component_type_id(),
            component_id: Some(ComponentId(3)),
        }));
        assert_eq!(messages.component_removed().of_type(health).count(), 1);
        assert_eq!(messages.reshaped_entities().len(), 1);
        assert_eq!(messages.component_removed().kind(), MessageKind::ComponentRemoved);
    }
}
