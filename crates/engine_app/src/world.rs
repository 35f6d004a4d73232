//! Authoritative entity storage.
//!
//! The [`World`] owns one [`ArchetypeTable`] per archetype and the location
//! of every entity. It changes only through [`World::apply`] (a tick's merged
//! messages), [`World::scatter`] (columns written by direct systems) and
//! [`World::spawn`] (loading).

use std::collections::HashMap;

use engine_component::{
    Access, Archetype, ArchetypeReflector, ComponentId, ComponentTypeId, ComponentValue, Entity,
    EntityIdGenerator, RequirementKind, RequirementSpec,
};
use engine_message::{EntityRecord, EntityState, TickMessages};
use engine_system::ArchetypeChunk;

use crate::error::WorldError;
use crate::table::{ArchetypeTable, EntityComponents};

/// Where an entity's data lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntityLocation {
    pub archetype: Archetype,
    pub row: usize,
}

/// Counters from one [`World::apply`], for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub spawned: usize,
    pub despawned: usize,
    pub reshaped: usize,
    pub changed: usize,
    pub new_archetypes: usize,
}

#[derive(Debug, Default)]
pub struct World {
    /// One table per archetype ever seen. Empty tables are kept.
    tables: HashMap<Archetype, ArchetypeTable>,
    /// Table creation order, for deterministic iteration.
    order: Vec<Archetype>,
    /// Maps each live entity to its table row.
    locations: HashMap<Entity, EntityLocation>,
}

impl World {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.locations.len()
    }

    #[must_use]
    pub fn archetype_count(&self) -> usize {
        self.tables.len()
    }

    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.locations.contains_key(&entity)
    }

    #[must_use]
    pub fn location(&self, entity: Entity) -> Option<EntityLocation> {
        self.locations.get(&entity).copied()
    }

    #[must_use]
    pub fn archetype_of(&self, entity: Entity) -> Option<Archetype> {
        self.locations.get(&entity).map(|location| location.archetype)
    }

    #[must_use]
    pub fn table(&self, archetype: Archetype) -> Option<&ArchetypeTable> {
        self.tables.get(&archetype)
    }

    /// Inserts a new entity, registering its archetype with `reflector` if
    /// it is new. Returns `true` if a table was created.
    pub fn spawn(
        &mut self,
        entity: Entity,
        components: EntityComponents,
        reflector: &mut ArchetypeReflector,
    ) -> Result<bool, WorldError> {
        if self.locations.contains_key(&entity) {
            return Err(WorldError::DuplicateEntity(entity));
        }
        self.place(entity, components, reflector)
    }

    /// Removes an entity and returns its data.
    pub fn despawn(&mut self, entity: Entity) -> Result<(Archetype, EntityComponents), WorldError> {
        let location = self.locations.remove(&entity).ok_or(WorldError::MissingEntity(entity))?;
        let table = self
            .tables
            .get_mut(&location.archetype)
            .ok_or(WorldError::MissingEntity(entity))?;
        let (components, moved) = table.swap_remove(location.row);
        if let Some(moved) = moved {
            self.locations.insert(moved, location);
        }
        Ok((location.archetype, components))
    }

    fn place(
        &mut self,
        entity: Entity,
        components: EntityComponents,
        reflector: &mut ArchetypeReflector,
    ) -> Result<bool, WorldError> {
        let archetype = components.archetype();
        let mut created = false;
        if !self.tables.contains_key(&archetype) {
            let table = ArchetypeTable::new(&components);
            reflector.add_to_library(archetype, table.types().iter().copied())?;
            self.tables.insert(archetype, table);
            self.order.push(archetype);
            created = true;
        }
        let row = self
            .tables
            .get_mut(&archetype)
            .map(|table| table.push(entity, components))
            .ok_or(WorldError::MissingEntity(entity))?;
        self.locations.insert(entity, EntityLocation { archetype, row });
        Ok(created)
    }

    /// Moves `entity` to the table matching its edited component set.
    fn reshape(
        &mut self,
        entity: Entity,
        reflector: &mut ArchetypeReflector,
        edit: impl FnOnce(&mut EntityComponents) -> Result<(), WorldError>,
    ) -> Result<bool, WorldError> {
        if !self.locations.contains_key(&entity) {
            return Err(WorldError::MissingEntity(entity));
        }
        let (_, mut components) = self.despawn(entity)?;
        if let Err(err) = edit(&mut components) {
            self.place(entity, components, reflector)?;
            return Err(err);
        }
        self.place(entity, components, reflector)
    }

    /// Applies one tick's merged messages in delivery order.
    ///
    /// `RegisterEntity` and `UnregisterEntity` are per-system bookkeeping and
    /// are ignored. Any inconsistency aborts the apply; messages before it
    /// stay applied.
    pub fn apply(
        &mut self,
        messages: &TickMessages,
        reflector: &mut ArchetypeReflector,
    ) -> Result<ApplySummary, WorldError> {
        let mut summary = ApplySummary::default();

        for state in messages.entity_added() {
            let components = EntityComponents::from_entries(state.entity, state.components.iter().cloned())?;
            if self.spawn(state.entity, components, reflector)? {
                summary.new_archetypes += 1;
            }
            summary.spawned += 1;
        }

        // Removal hints name the archetype the emitter saw, before any of
        // this tick's reshapes.
        let removed_from: HashMap<Entity, Archetype> = messages
            .entity_removed()
            .iter()
            .filter_map(|removal| Some((removal.entity, self.archetype_of(removal.entity)?)))
            .collect();

        for update in messages.component_added() {
            let value = update.value.clone();
            let component_id = update.component_id;
            if self.reshape(update.entity, reflector, |components| {
                components.insert(update.entity, value, component_id)
            })? {
                summary.new_archetypes += 1;
            }
            summary.reshaped += 1;
        }

        for update in messages.component_changed() {
            self.replace(update.entity, update.value.clone(), update.component_id)?;
            summary.changed += 1;
        }

        for removal in messages.component_removed() {
            if self.reshape(removal.entity, reflector, |components| {
                components.remove(removal.entity, removal.type_id, removal.component_id)
            })? {
                summary.new_archetypes += 1;
            }
            summary.reshaped += 1;
        }

        for removal in messages.entity_removed() {
            if let (Some(expected), Some(&actual)) = (removal.archetype, removed_from.get(&removal.entity))
                && expected != actual
            {
                return Err(WorldError::ArchetypeMismatch { entity: removal.entity, expected, actual });
            }
            self.despawn(removal.entity)?;
            summary.despawned += 1;
        }

        Ok(summary)
    }

    fn replace(
        &mut self,
        entity: Entity,
        value: ComponentValue,
        component_id: Option<ComponentId>,
    ) -> Result<(), WorldError> {
        let location = self.locations.get(&entity).ok_or(WorldError::MissingEntity(entity))?;
        let type_id = value.component_type();
        let replaced = self
            .tables
            .get_mut(&location.archetype)
            .is_some_and(|table| table.replace(location.row, value, component_id));
        if replaced {
            Ok(())
        } else {
            Err(WorldError::MissingComponent { entity, type_id, component_id })
        }
    }

    /// Gathers the payload columns `spec` names from one archetype.
    ///
    /// Returns `None` for unknown or empty archetypes.
    ///
    /// # Panics
    ///
    /// Panics if the archetype lacks a required type, which means the
    /// caller passed an archetype the requirements do not match.
    #[must_use]
    pub fn gather(&self, archetype: Archetype, spec: &RequirementSpec) -> Option<ArchetypeChunk> {
        let table = self.tables.get(&archetype).filter(|table| !table.is_empty())?;
        let mut chunk = ArchetypeChunk::new(archetype, table.entities().to_vec());
        for requirement in spec.payload_entries() {
            match table.gather(requirement.type_id, requirement.access) {
                Some(column) => chunk.push_column(column),
                None => assert!(
                    requirement.kind != RequirementKind::Required,
                    "{archetype} lacks required component {}",
                    requirement.type_id
                ),
            }
        }
        Some(chunk)
    }

    /// Writes back every column of `chunk` gathered with write access.
    ///
    /// # Panics
    ///
    /// Panics if the archetype's entities changed since the gather.
    pub fn scatter(&mut self, chunk: ArchetypeChunk) {
        let (archetype, entities, columns) = chunk.into_parts();
        let Some(table) = self.tables.get_mut(&archetype) else {
            panic!("chunk for unknown {archetype} written back");
        };
        assert_eq!(table.entities(), entities.as_slice(), "{archetype} changed while a system held its columns");
        for column in columns.into_iter().filter(|column| column.access() == Access::Write) {
            table.scatter(column);
        }
    }

    /// Full component set of one entity.
    #[must_use]
    pub fn entity_state(&self, entity: Entity) -> Option<EntityState> {
        let location = self.locations.get(&entity)?;
        let table = self.tables.get(&location.archetype)?;
        Some(EntityState {
            entity,
            archetype: location.archetype,
            components: table.entries(location.row),
        })
    }

    /// Entities of the given archetypes, in table order.
    pub fn entities_in<'a>(&'a self, archetypes: impl IntoIterator<Item = &'a Archetype>) -> Vec<Entity> {
        archetypes
            .into_iter()
            .filter_map(|archetype| self.tables.get(archetype))
            .flat_map(|table| table.entities().iter().copied())
            .collect()
    }

    /// Every entity as a record, labels taken from `labels`.
    pub fn records<'a>(&'a self, labels: &'a EntityIdGenerator) -> impl Iterator<Item = EntityRecord> + 'a {
        self.order
            .iter()
            .filter_map(|archetype| self.tables.get(archetype))
            .flat_map(move |table| {
                table.entities().iter().enumerate().map(move |(row, &entity)| EntityRecord {
                    entity,
                    label: labels.label(entity),
                    components: table.entries(row),
                })
            })
    }

    /// Component types of the entity's current archetype.
    #[must_use]
    pub fn types_of(&self, entity: Entity) -> Option<&[ComponentTypeId]> {
        let location = self.locations.get(&entity)?;
        self.tables.get(&location.archetype).map(|table| &table.types()[..])
    }
}
