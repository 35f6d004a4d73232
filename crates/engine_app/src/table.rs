//! Column storage for one archetype.
//!
//! Unique and tag components are stored one value per row. Non-unique
//! components live in an [`InstanceArena`]: a flat value array plus one span
//! per row, so each entity owns an arena-indexed slice of instances.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::ops::Range;
use std::sync::Arc;

use engine_component::{
    Access, Archetype, ComponentId, ComponentMeta, ComponentTypeId, ComponentValue, Entity,
};
use engine_message::ComponentEntry;
use engine_system::GatheredColumn;

use crate::error::WorldError;

/// The component data of one entity while it moves between tables.
#[derive(Debug, Clone, Default)]
pub struct EntityComponents {
    slots: BTreeMap<ComponentTypeId, Slot>,
}

#[derive(Debug, Clone)]
enum Slot {
    Unique(ComponentValue),
    /// Never empty; the slot is dropped with its last instance.
    Instances(Vec<(ComponentId, ComponentValue)>),
}

impl EntityComponents {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collects `entries`, rejecting duplicate unique components and
    /// duplicate instance ids.
    pub fn from_entries(
        entity: Entity,
        entries: impl IntoIterator<Item = ComponentEntry>,
    ) -> Result<Self, WorldError> {
        let mut components = Self::new();
        for entry in entries {
            components.insert(entity, entry.value, entry.component_id)?;
        }
        Ok(components)
    }

    pub fn insert(
        &mut self,
        entity: Entity,
        value: ComponentValue,
        component_id: Option<ComponentId>,
    ) -> Result<(), WorldError> {
        let type_id = value.component_type();
        let duplicate = WorldError::DuplicateComponent { entity, type_id, component_id };
        match (self.slots.entry(type_id), component_id) {
            (Entry::Vacant(slot), None) => {
                slot.insert(Slot::Unique(value));
            }
            (Entry::Vacant(slot), Some(id)) => {
                slot.insert(Slot::Instances(vec![(id, value)]));
            }
            (Entry::Occupied(mut slot), Some(id)) => match slot.get_mut() {
                Slot::Instances(instances) if instances.iter().all(|(existing, _)| *existing != id) => {
                    instances.push((id, value));
                }
                _ => return Err(duplicate),
            },
            (Entry::Occupied(_), None) => return Err(duplicate),
        }
        Ok(())
    }

    /// Removes a unique component, one instance (`Some(id)`), or every
    /// instance of a non-unique type (`None`).
    pub fn remove(
        &mut self,
        entity: Entity,
        type_id: ComponentTypeId,
        component_id: Option<ComponentId>,
    ) -> Result<(), WorldError> {
        let missing = WorldError::MissingComponent { entity, type_id, component_id };
        let emptied = match (self.slots.get_mut(&type_id), component_id) {
            (None, _) | (Some(Slot::Unique(_)), Some(_)) => return Err(missing),
            (Some(_), None) => true,
            (Some(Slot::Instances(instances)), Some(id)) => {
                let index = instances
                    .iter()
                    .position(|(existing, _)| *existing == id)
                    .ok_or(missing)?;
                instances.remove(index);
                instances.is_empty()
            }
        };
        if emptied {
            self.slots.remove(&type_id);
        }
        Ok(())
    }

    #[must_use]
    pub fn archetype(&self) -> Archetype {
        Archetype::from_types(self.slots.keys().copied())
    }

    pub fn types(&self) -> impl Iterator<Item = ComponentTypeId> + '_ {
        self.slots.keys().copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Flattens back into entries, instances in insertion order.
    #[must_use]
    pub fn into_entries(self) -> Vec<ComponentEntry> {
        let mut entries = Vec::with_capacity(self.slots.len());
        for slot in self.slots.into_values() {
            match slot {
                Slot::Unique(value) => entries.push(ComponentEntry { value, component_id: None }),
                Slot::Instances(instances) => entries.extend(
                    instances
                        .into_iter()
                        .map(|(id, value)| ComponentEntry { value, component_id: Some(id) }),
                ),
            }
        }
        entries
    }

    fn metas(&self) -> impl Iterator<Item = ComponentMeta> + '_ {
        self.slots.values().map(|slot| match slot {
            Slot::Unique(value) => value.meta(),
            Slot::Instances(instances) => instances[0].1.meta(),
        })
    }
}

/// Instances of one non-unique component type across all rows of a table.
#[derive(Debug, Default)]
struct InstanceArena {
    values: Vec<ComponentValue>,
    ids: Vec<ComponentId>,
    /// Per row, the slice of `values`/`ids` it owns.
    spans: Vec<Range<usize>>,
    /// Slots no span points at any more.
    garbage: usize,
}

impl InstanceArena {
    fn push_row(&mut self, instances: Vec<(ComponentId, ComponentValue)>) {
        let start = self.values.len();
        for (id, value) in instances {
            self.ids.push(id);
            self.values.push(value);
        }
        self.spans.push(start..self.values.len());
    }

    fn swap_remove_row(&mut self, row: usize) -> Vec<(ComponentId, ComponentValue)> {
        let span = self.spans.swap_remove(row);
        let removed = span
            .clone()
            .map(|i| (self.ids[i], self.values[i].clone()))
            .collect();
        self.garbage += span.len();
        if self.garbage > self.values.len() / 2 {
            self.compact();
        }
        removed
    }

    fn compact(&mut self) {
        let mut values = Vec::with_capacity(self.values.len() - self.garbage);
        let mut ids = Vec::with_capacity(values.capacity());
        for span in &mut self.spans {
            let start = values.len();
            values.extend_from_slice(&self.values[span.clone()]);
            ids.extend_from_slice(&self.ids[span.clone()]);
            *span = start..values.len();
        }
        self.values = values;
        self.ids = ids;
        self.garbage = 0;
    }

    fn row(&self, row: usize) -> impl Iterator<Item = (ComponentId, &ComponentValue)> + '_ {
        self.spans[row].clone().map(|i| (self.ids[i], &self.values[i]))
    }

    fn replace(&mut self, row: usize, id: ComponentId, value: ComponentValue) -> bool {
        match self.spans[row].clone().find(|&i| self.ids[i] == id) {
            Some(i) => {
                self.values[i] = value;
                true
            }
            None => false,
        }
    }

    /// Row-ordered copies of the live instances, with per-row strides.
    fn flatten(&self) -> (Vec<ComponentValue>, Vec<usize>, Vec<ComponentId>) {
        let mut values = Vec::with_capacity(self.values.len() - self.garbage);
        let mut ids = Vec::with_capacity(values.capacity());
        let mut strides = Vec::with_capacity(self.spans.len());
        for span in &self.spans {
            values.extend_from_slice(&self.values[span.clone()]);
            ids.extend_from_slice(&self.ids[span.clone()]);
            strides.push(span.len());
        }
        (values, strides, ids)
    }

    /// Inverse of [`flatten`](Self::flatten) for the values.
    fn write_back(&mut self, values: Vec<ComponentValue>) {
        let live: usize = self.spans.iter().map(ExactSizeIterator::len).sum();
        assert_eq!(values.len(), live, "instance column written back with the wrong number of values");
        let mut values = values.into_iter();
        for span in &self.spans {
            for (slot, value) in self.values[span.clone()].iter_mut().zip(values.by_ref()) {
                *slot = value;
            }
        }
    }
}

#[derive(Debug)]
enum Storage {
    Unique(Vec<ComponentValue>),
    Instances(InstanceArena),
}

/// All values of one component type in a table.
#[derive(Debug)]
struct Column {
    meta: ComponentMeta,
    storage: Storage,
}

impl Column {
    fn new(meta: ComponentMeta) -> Self {
        let storage = if meta.kind.is_non_unique() {
            Storage::Instances(InstanceArena::default())
        } else {
            Storage::Unique(Vec::new())
        };
        Self { meta, storage }
    }

    fn gather(&self, access: Access) -> GatheredColumn {
        match &self.storage {
            Storage::Unique(values) => {
                GatheredColumn::unique(self.meta.type_id, access, (self.meta.gather_fn)(values), values.len())
            }
            Storage::Instances(arena) => {
                let (values, strides, ids) = arena.flatten();
                GatheredColumn::instances(self.meta.type_id, access, (self.meta.gather_fn)(&values), strides, ids)
            }
        }
    }

    fn scatter(&mut self, column: GatheredColumn) {
        let values = (self.meta.scatter_fn)(column.into_data());
        match &mut self.storage {
            Storage::Unique(existing) => {
                assert_eq!(
                    values.len(),
                    existing.len(),
                    "column `{}` written back with the wrong number of values",
                    self.meta.name
                );
                *existing = values;
            }
            Storage::Instances(arena) => arena.write_back(values),
        }
    }
}

/// Storage for every entity of one archetype.
///
/// `entities[row]` owns row `row` of every column. Removal swaps the last row
/// into the hole.
#[derive(Debug)]
pub struct ArchetypeTable {
    archetype: Archetype,
    types: Arc<[ComponentTypeId]>,
    entities: Vec<Entity>,
    /// Parallel to `types`.
    columns: Vec<Column>,
}

impl ArchetypeTable {
    /// Creates an empty table shaped like `template`.
    #[must_use]
    pub fn new(template: &EntityComponents) -> Self {
        let columns: Vec<Column> = template.metas().map(Column::new).collect();
        let types: Arc<[ComponentTypeId]> = columns.iter().map(|c| c.meta.type_id).collect();
        Self { archetype: template.archetype(), types, entities: Vec::new(), columns }
    }

    #[must_use]
    pub fn archetype(&self) -> Archetype {
        self.archetype
    }

    #[must_use]
    pub fn types(&self) -> &Arc<[ComponentTypeId]> {
        &self.types
    }

    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    fn column_index(&self, type_id: ComponentTypeId) -> Option<usize> {
        self.types.binary_search(&type_id).ok()
    }

    /// Appends `entity`, returning its row.
    ///
    /// # Panics
    ///
    /// Panics if `components` does not have this table's archetype.
    pub fn push(&mut self, entity: Entity, components: EntityComponents) -> usize {
        assert_eq!(components.archetype(), self.archetype, "{entity} pushed into the wrong table");
        for (column, slot) in self.columns.iter_mut().zip(components.slots.into_values()) {
            match (&mut column.storage, slot) {
                (Storage::Unique(values), Slot::Unique(value)) => values.push(value),
                (Storage::Instances(arena), Slot::Instances(instances)) => arena.push_row(instances),
                _ => panic!("component `{}` stored with the wrong kind", column.meta.name),
            }
        }
        self.entities.push(entity);
        self.entities.len() - 1
    }

    /// Removes `row`, returning its components and the entity that was
    /// moved into `row`, if any.
    pub fn swap_remove(&mut self, row: usize) -> (EntityComponents, Option<Entity>) {
        let mut components = EntityComponents::new();
        for column in &mut self.columns {
            let slot = match &mut column.storage {
                Storage::Unique(values) => Slot::Unique(values.swap_remove(row)),
                Storage::Instances(arena) => Slot::Instances(arena.swap_remove_row(row)),
            };
            components.slots.insert(column.meta.type_id, slot);
        }
        self.entities.swap_remove(row);
        (components, self.entities.get(row).copied())
    }

    /// Replaces one value in place. Returns `false` if the row has no such
    /// component or instance.
    pub fn replace(&mut self, row: usize, value: ComponentValue, component_id: Option<ComponentId>) -> bool {
        let Some(index) = self.column_index(value.component_type()) else {
            return false;
        };
        match (&mut self.columns[index].storage, component_id) {
            (Storage::Unique(values), None) => {
                values[row] = value;
                true
            }
            (Storage::Instances(arena), Some(id)) => arena.replace(row, id, value),
            _ => false,
        }
    }

    /// The components of `row` as entries.
    #[must_use]
    pub fn entries(&self, row: usize) -> Vec<ComponentEntry> {
        let mut entries = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            match &column.storage {
                Storage::Unique(values) => {
                    entries.push(ComponentEntry { value: values[row].clone(), component_id: None });
                }
                Storage::Instances(arena) => entries.extend(
                    arena
                        .row(row)
                        .map(|(id, value)| ComponentEntry { value: value.clone(), component_id: Some(id) }),
                ),
            }
        }
        entries
    }

    /// Gathers one column for a system, or `None` if the table lacks it.
    #[must_use]
    pub fn gather(&self, type_id: ComponentTypeId, access: Access) -> Option<GatheredColumn> {
        self.column_index(type_id).map(|i| self.columns[i].gather(access))
    }

    /// Writes a gathered column back.
    ///
    /// # Panics
    ///
    /// Panics if the table has no column of that type or the value count
    /// changed.
    pub fn scatter(&mut self, column: GatheredColumn) {
        let type_id = column.type_id();
        let Some(index) = self.column_index(type_id) else {
            panic!("{} has no column {type_id} to write back", self.archetype);
        };
        self.columns[index].scatter(column);
    }
}
