//! The per-system, per-tick message recorder.

use std::collections::HashMap;
use std::sync::Arc;

use engine_component::{
    Archetype, Component, ComponentId, ComponentKind, ComponentTypeId, ComponentValue, Entity,
    IdGenerators,
};

use crate::messages::{
    ComponentEntry, ComponentRemoval, ComponentUpdate, EntityRemoval, EntityState, Message, MessageKind,
    assert_shape,
};
use crate::stream::TickMessages;

/// Records the changes one system makes during one tick.
///
/// Entities created with [`MessageBuilder::add_entity`] stay *pending* until
/// [`MessageBuilder::finish`]: components added to them are folded into a
/// single `EntityAdded` record. Components added to any other entity become
/// `ComponentAdded` records.
///
/// Using the wrong shape for a component (a non-unique value without a
/// [`ComponentId`], or an id on a unique type) panics.
pub struct MessageBuilder {
    ids: Arc<IdGenerators>,
    pending: Vec<(Entity, Vec<ComponentEntry>)>,
    pending_index: HashMap<Entity, usize>,
    messages: TickMessages,
}

impl MessageBuilder {
    pub fn new(ids: Arc<IdGenerators>) -> Self {
        Self {
            ids,
            pending: Vec::new(),
            pending_index: HashMap::new(),
            messages: TickMessages::new(),
        }
    }

    #[must_use]
    pub fn ids(&self) -> &Arc<IdGenerators> {
        &self.ids
    }

    /// Allocates a new entity and opens its `EntityAdded` record.
    pub fn add_entity(&mut self) -> Entity {
        let entity = self.ids.entities.generate();
        self.open(entity);
        entity
    }

    /// Like [`add_entity`](Self::add_entity), attaching a debug label.
    pub fn add_entity_labeled(&mut self, label: impl Into<String>) -> Entity {
        let entity = self.ids.entities.generate_labeled(label);
        self.open(entity);
        entity
    }

    /// Draws a fresh id for a non-unique component instance.
    pub fn new_component_id(&self) -> ComponentId {
        self.ids.components.generate()
    }

    /// Attaches a unique or tag component.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) {
        self.add_component_value(entity, ComponentValue::new(value), None);
    }

    /// Attaches one instance of a non-unique component.
    pub fn add_component_instance<T: Component>(&mut self, entity: Entity, value: T, component_id: ComponentId) {
        self.add_component_value(entity, ComponentValue::new(value), Some(component_id));
    }

    /// Type-erased form of the two methods above.
    ///
    /// # Panics
    ///
    /// Panics on a shape mismatch, or when a unique component is attached
    /// twice to the same pending entity.
    pub fn add_component_value(&mut self, entity: Entity, value: ComponentValue, component_id: Option<ComponentId>) {
        assert_shape(&value, component_id);
        match self.pending_index.get(&entity) {
            Some(&slot) => {
                let components = &mut self.pending[slot].1;
                if value.kind() != ComponentKind::NonUnique {
                    let type_id = value.component_type();
                    assert!(
                        components.iter().all(|c| c.type_id() != type_id),
                        "`{}` added twice to pending {entity}",
                        value.type_name()
                    );
                }
                components.push(ComponentEntry { value, component_id });
            }
            None => self
                .messages
                .push(Message::ComponentAdded(ComponentUpdate { entity, value, component_id })),
        }
    }

    /// Records a new value for a unique component.
    pub fn component_changed<T: Component>(&mut self, entity: Entity, value: T) {
        self.component_changed_value(entity, ComponentValue::new(value), None);
    }

    /// Records a new value for one non-unique instance.
    pub fn component_changed_instance<T: Component>(&mut self, entity: Entity, value: T, component_id: ComponentId) {
        self.component_changed_value(entity, ComponentValue::new(value), Some(component_id));
    }

    pub fn component_changed_value(
        &mut self,
        entity: Entity,
        value: ComponentValue,
        component_id: Option<ComponentId>,
    ) {
        assert_shape(&value, component_id);
        self.messages
            .push(Message::ComponentChanged(ComponentUpdate { entity, value, component_id }));
    }

    /// Announces roughly how many changes of `type_id` will follow so
    /// storage can be reserved up front.
    pub fn component_changed_hint(&mut self, _type_id: ComponentTypeId, expected: usize) {
        self.messages.reserve(MessageKind::ComponentChanged, expected);
    }

    /// Removes a unique or tag component.
    pub fn remove_component(&mut self, entity: Entity, type_id: ComponentTypeId) {
        self.messages.push(Message::ComponentRemoved(ComponentRemoval {
            entity,
            type_id,
            component_id: None,
        }));
    }

    /// Removes one instance of a non-unique component.
    pub fn remove_component_instance(&mut self, entity: Entity, type_id: ComponentTypeId, component_id: ComponentId) {
        self.messages.push(Message::ComponentRemoved(ComponentRemoval {
            entity,
            type_id,
            component_id: Some(component_id),
        }));
    }

    /// Removes an entity. `archetype` is the sender's knowledge of where the
    /// entity lives, if any; it is checked when the removal is applied.
    pub fn remove_entity(&mut self, entity: Entity, archetype: Option<Archetype>) {
        self.messages
            .push(Message::EntityRemoved(EntityRemoval { entity, archetype }));
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.messages.is_empty()
    }

    /// Closes every pending entity and returns the recorded messages.
    #[must_use]
    pub fn finish(mut self) -> TickMessages {
        let mut added = TickMessages::new();
        added.reserve(MessageKind::EntityAdded, self.pending.len());
        for (entity, components) in self.pending.drain(..) {
            added.push(Message::EntityAdded(EntityState::new(entity, components)));
        }
        added.merge(self.messages);
        added
    }

    fn open(&mut self, entity: Entity) {
        self.pending_index.insert(entity, self.pending.len());
        self.pending.push((entity, Vec::new()));
    }
}

impl std::fmt::Debug for MessageBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageBuilder")
            .field("pending", &self.pending.len())
            .field("messages", &self.messages.len())
            .finish()
    }
}
