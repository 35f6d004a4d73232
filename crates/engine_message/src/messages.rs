//! Message records, one per kind of world mutation.
//!
//! Structural messages ([`EntityState`], [`EntityRemoval`],
//! [`ComponentRemoval`]) change which archetype an entity lives in; value
//! messages ([`ComponentUpdate`]) only replace data.

use engine_component::{
    Archetype, ArchetypeFull, Component, ComponentId, ComponentTypeId, ComponentValue, Entity,
};

/// One component attached to an entity: the value plus, for non-unique
/// types, the instance id.
#[derive(Debug, Clone)]
pub struct ComponentEntry {
    pub value: ComponentValue,
    pub component_id: Option<ComponentId>,
}

impl ComponentEntry {
    /// A unique or tag component.
    pub fn unique<T: Component>(value: T) -> Self {
        Self::from_value(ComponentValue::new(value), None)
    }

    /// One instance of a non-unique component.
    pub fn instance<T: Component>(value: T, id: ComponentId) -> Self {
        Self::from_value(ComponentValue::new(value), Some(id))
    }

    /// # Panics
    ///
    /// Panics if the presence of `component_id` does not match the value's
    /// [`ComponentKind`](engine_component::ComponentKind).
    pub fn from_value(value: ComponentValue, component_id: Option<ComponentId>) -> Self {
        assert_shape(&value, component_id);
        Self { value, component_id }
    }

    #[must_use]
    pub fn type_id(&self) -> ComponentTypeId {
        self.value.component_type()
    }
}

/// Asserts that non-unique values carry a component id and all others don't.
pub fn assert_shape(value: &ComponentValue, component_id: Option<ComponentId>) {
    match (value.kind().is_non_unique(), component_id) {
        (true, None) => panic!(
            "non-unique component `{}` requires a component id",
            value.type_name()
        ),
        (false, Some(id)) => panic!(
            "component `{}` is not non-unique but was given {id}",
            value.type_name()
        ),
        _ => {}
    }
}

/// The complete component set of one entity.
///
/// Payload of both `EntityAdded` and `RegisterEntity`.
#[derive(Debug, Clone)]
pub struct EntityState {
    pub entity: Entity,
    pub archetype: Archetype,
    pub components: Vec<ComponentEntry>,
}

impl EntityState {
    /// Builds a state, computing the archetype from the component list.
    pub fn new(entity: Entity, components: Vec<ComponentEntry>) -> Self {
        let archetype = Archetype::from_types(components.iter().map(ComponentEntry::type_id));
        Self { entity, archetype, components }
    }

    #[must_use]
    pub fn full_archetype(&self) -> ArchetypeFull {
        ArchetypeFull::from_instances(self.components.iter().map(|c| (c.type_id(), c.component_id)))
    }

    /// Typed access to the first component of type `T`.
    #[must_use]
    pub fn get<T: Component>(&self) -> Option<&T> {
        self.components.iter().find_map(|c| c.value.downcast_ref::<T>())
    }
}

/// Payload of `ComponentAdded` and `ComponentChanged`.
#[derive(Debug, Clone)]
pub struct ComponentUpdate {
    pub entity: Entity,
    pub value: ComponentValue,
    pub component_id: Option<ComponentId>,
}

impl ComponentUpdate {
    #[must_use]
    pub fn type_id(&self) -> ComponentTypeId {
        self.value.component_type()
    }
}

/// Payload of `ComponentRemoved`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComponentRemoval {
    pub entity: Entity,
    pub type_id: ComponentTypeId,
    /// Set for non-unique components: only this instance is removed.
    pub component_id: Option<ComponentId>,
}

/// Payload of `EntityRemoved` and `UnregisterEntity`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityRemoval {
    pub entity: Entity,
    /// The archetype the entity was in, when the sender knows it.
    pub archetype: Option<Archetype>,
}

/// Message kinds, in delivery order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    RegisterEntity,
    EntityAdded,
    ComponentAdded,
    ComponentChanged,
    ComponentRemoved,
    EntityRemoved,
    UnregisterEntity,
}

impl MessageKind {
    pub const ALL: [MessageKind; 7] = [
        MessageKind::RegisterEntity,
        MessageKind::EntityAdded,
        MessageKind::ComponentAdded,
        MessageKind::ComponentChanged,
        MessageKind::ComponentRemoved,
        MessageKind::EntityRemoved,
        MessageKind::UnregisterEntity,
    ];
}

/// One recorded mutation.
#[derive(Debug, Clone)]
pub enum Message {
    RegisterEntity(EntityState),
    EntityAdded(EntityState),
    ComponentAdded(ComponentUpdate),
    ComponentChanged(ComponentUpdate),
    ComponentRemoved(ComponentRemoval),
    EntityRemoved(EntityRemoval),
    UnregisterEntity(EntityRemoval),
}

impl Message {
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        self.view().kind()
    }

    #[must_use]
    pub fn entity(&self) -> Entity {
        self.view().entity()
    }

    #[must_use]
    pub fn view(&self) -> MessageRef<'_> {
        match self {
            Self::RegisterEntity(m) => MessageRef::RegisterEntity(m),
            Self::EntityAdded(m) => MessageRef::EntityAdded(m),
            Self::ComponentAdded(m) => MessageRef::ComponentAdded(m),
            Self::ComponentChanged(m) => MessageRef::ComponentChanged(m),
            Self::ComponentRemoved(m) => MessageRef::ComponentRemoved(m),
            Self::EntityRemoved(m) => MessageRef::EntityRemoved(m),
            Self::UnregisterEntity(m) => MessageRef::UnregisterEntity(m),
        }
    }
}

/// Borrowed view of a [`Message`], produced when iterating a tick set.
#[derive(Debug, Clone, Copy)]
pub enum MessageRef<'a> {
    RegisterEntity(&'a EntityState),
    EntityAdded(&'a EntityState),
    ComponentAdded(&'a ComponentUpdate),
    ComponentChanged(&'a ComponentUpdate),
    ComponentRemoved(&'a ComponentRemoval),
    EntityRemoved(&'a EntityRemoval),
    UnregisterEntity(&'a EntityRemoval),
}

impl MessageRef<'_> {
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::RegisterEntity(_) => MessageKind::RegisterEntity,
            Self::EntityAdded(_) => MessageKind::EntityAdded,
            Self::ComponentAdded(_) => MessageKind::ComponentAdded,
            Self::ComponentChanged(_) => MessageKind::ComponentChanged,
            Self::ComponentRemoved(_) => MessageKind::ComponentRemoved,
            Self::EntityRemoved(_) => MessageKind::EntityRemoved,
            Self::UnregisterEntity(_) => MessageKind::UnregisterEntity,
        }
    }

    #[must_use]
    pub fn entity(&self) -> Entity {
        match self {
            Self::RegisterEntity(m) | Self::EntityAdded(m) => m.entity,
            Self::ComponentAdded(m) | Self::ComponentChanged(m) => m.entity,
            Self::ComponentRemoved(m) => m.entity,
            Self::EntityRemoved(m) | Self::UnregisterEntity(m) => m.entity,
        }
    }

    #[must_use]
    pub fn to_message(&self) -> Message {
        match *self {
            Self::RegisterEntity(m) => Message::RegisterEntity(m.clone()),
            Self::EntityAdded(m) => Message::EntityAdded(m.clone()),
            Self::ComponentAdded(m) => Message::ComponentAdded(m.clone()),
            Self::ComponentChanged(m) => Message::ComponentChanged(m.clone()),
            Self::ComponentRemoved(m) => Message::ComponentRemoved(*m),
            Self::EntityRemoved(m) => Message::EntityRemoved(*m),
            Self::UnregisterEntity(m) => Message::UnregisterEntity(*m),
        }
    }
}
