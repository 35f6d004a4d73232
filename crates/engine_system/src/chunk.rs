//! Packed component arrays handed to direct systems.
//!
//! For every archetype matching a direct system, the manager gathers one
//! [`ArchetypeChunk`]: the entity ids of the archetype plus one
//! [`GatheredColumn`] per requested component type present in it. Unique
//! columns are parallel to the entity array. Non-unique columns are flat;
//! `strides()[i]` instances belong to `entities()[i]`.

use std::any::Any;
use std::fmt;

use engine_component::{Access, Archetype, Component, ComponentId, ComponentTypeId, Entity};

struct InstanceLayout {
    strides: Vec<usize>,
    offsets: Vec<usize>,
    ids: Vec<ComponentId>,
}

/// One gathered column. `data` is a boxed `Vec<T>`.
pub struct GatheredColumn {
    type_id: ComponentTypeId,
    access: Access,
    data: Box<dyn Any + Send>,
    len: usize,
    instances: Option<InstanceLayout>,
}

impl GatheredColumn {
    /// A column with exactly one value per entity.
    pub fn unique(type_id: ComponentTypeId, access: Access, data: Box<dyn Any + Send>, len: usize) -> Self {
        Self { type_id, access, data, len, instances: None }
    }

    /// A flat column of non-unique instances.
    ///
    /// # Panics
    ///
    /// Panics if `ids` and the strides disagree on the number of instances.
    pub fn instances(
        type_id: ComponentTypeId,
        access: Access,
        data: Box<dyn Any + Send>,
        strides: Vec<usize>,
        ids: Vec<ComponentId>,
    ) -> Self {
        let mut offsets = Vec::with_capacity(strides.len() + 1);
        let mut total = 0;
        offsets.push(0);
        for stride in &strides {
            total += stride;
            offsets.push(total);
        }
        assert_eq!(total, ids.len(), "instance strides cover {total} values but {} ids were given", ids.len());
        Self {
            type_id,
            access,
            data,
            len: total,
            instances: Some(InstanceLayout { strides, offsets, ids }),
        }
    }

    #[must_use]
    pub fn type_id(&self) -> ComponentTypeId {
        self.type_id
    }

    #[must_use]
    pub fn access(&self) -> Access {
        self.access
    }

    /// Number of values in the column.
    #[must_use]
    pub fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[must_use]
    pub fn strides(&self) -> Option<&[usize]> {
        self.instances.as_ref().map(|i| i.strides.as_slice())
    }

    #[must_use]
    pub fn component_ids(&self) -> Option<&[ComponentId]> {
        self.instances.as_ref().map(|i| i.ids.as_slice())
    }

    pub fn into_data(self) -> Box<dyn Any + Send> {
        self.data
    }

    fn typed<T: Component>(&self) -> &[T] {
        match self.data.downcast_ref::<Vec<T>>() {
            Some(values) => values,
            None => panic!("column {} read as `{}`", self.type_id, T::type_name()),
        }
    }

    fn typed_mut<T: Component>(&mut self) -> &mut [T] {
        assert_eq!(
            self.access,
            Access::Write,
            "`{}` was requested read-only but written",
            T::type_name()
        );
        let type_id = self.type_id;
        match self.data.downcast_mut::<Vec<T>>() {
            Some(values) => values,
            None => panic!("column {type_id} written as `{}`", T::type_name()),
        }
    }
}

impl fmt::Debug for GatheredColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatheredColumn")
            .field("type_id", &self.type_id)
            .field("access", &self.access)
            .field("len", &self.len)
            .field("non_unique", &self.instances.is_some())
            .finish()
    }
}

/// The gathered data of one archetype.
#[derive(Debug)]
pub struct ArchetypeChunk {
    archetype: Archetype,
    entities: Vec<Entity>,
    columns: Vec<GatheredColumn>,
}

impl ArchetypeChunk {
    #[must_use]
    pub fn new(archetype: Archetype, entities: Vec<Entity>) -> Self {
        Self { archetype, entities, columns: Vec::new() }
    }

    /// Adds a column.
    ///
    /// # Panics
    ///
    /// Panics if the column is not parallel to the entity array.
    pub fn push_column(&mut self, column: GatheredColumn) {
        match &column.instances {
            None => assert_eq!(
                column.len,
                self.entities.len(),
                "column {} has {} values for {} entities",
                column.type_id,
                column.len,
                self.entities.len()
            ),
            Some(layout) => assert_eq!(
                layout.strides.len(),
                self.entities.len(),
                "column {} has {} strides for {} entities",
                column.type_id,
                layout.strides.len(),
                self.entities.len()
            ),
        }
        self.columns.push(column);
    }

    #[must_use]
    pub fn archetype(&self) -> Archetype {
        self.archetype
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

    /// Returns `true` if a column for `T` was gathered.
    #[must_use]
    pub fn has<T: Component>(&self) -> bool {
        self.column(T::component_type_id()).is_some()
    }

    #[must_use]
    pub fn column(&self, type_id: ComponentTypeId) -> Option<&GatheredColumn> {
        self.columns.iter().find(|c| c.type_id == type_id)
    }

    /// The packed values of `T`.
    ///
    /// # Panics
    ///
    /// Panics if `T` was not gathered for this chunk. Use
    /// [`try_read`](Self::try_read) for optional and any-of types.
    #[must_use]
    pub fn read<T: Component>(&self) -> &[T] {
        match self.try_read::<T>() {
            Some(values) => values,
            None => panic!("`{}` was not gathered for {}", T::type_name(), self.archetype),
        }
    }

    #[must_use]
    pub fn try_read<T: Component>(&self) -> Option<&[T]> {
        self.column(T::component_type_id()).map(GatheredColumn::typed::<T>)
    }

    /// Mutable packed values of `T`; written back after the stage.
    ///
    /// # Panics
    ///
    /// Panics if `T` was not gathered or was requested read-only.
    pub fn write<T: Component>(&mut self) -> &mut [T] {
        let archetype = self.archetype;
        match self.try_write::<T>() {
            Some(values) => values,
            None => panic!("`{}` was not gathered for {archetype}", T::type_name()),
        }
    }

    pub fn try_write<T: Component>(&mut self) -> Option<&mut [T]> {
        let type_id = T::component_type_id();
        self.columns
            .iter_mut()
            .find(|c| c.type_id == type_id)
            .map(GatheredColumn::typed_mut::<T>)
    }

    /// Per-entity instance counts of a non-unique `T`.
    #[must_use]
    pub fn strides<T: Component>(&self) -> Option<&[usize]> {
        self.column(T::component_type_id()).and_then(GatheredColumn::strides)
    }

    /// Instance ids of a non-unique `T`, parallel to its packed values.
    #[must_use]
    pub fn component_ids<T: Component>(&self) -> Option<&[ComponentId]> {
        self.column(T::component_type_id()).and_then(GatheredColumn::component_ids)
    }

    /// Iterates `(entity, instances, instance ids)` of a non-unique `T`.
    pub fn instances<T: Component>(&self) -> impl Iterator<Item = (Entity, &[T], &[ComponentId])> + '_ {
        let column = self.column(T::component_type_id());
        let (values, layout) = match column {
            Some(c) => (c.typed::<T>(), c.instances.as_ref()),
            None => (&[][..], None),
        };
        self.entities.iter().enumerate().filter_map(move |(row, entity)| {
            let layout = layout?;
            let span = layout.offsets[row]..layout.offsets[row + 1];
            Some((*entity, &values[span.clone()], &layout.ids[span]))
        })
    }

    /// Splits the chunk for write-back.
    #[must_use]
    pub fn into_parts(self) -> (Archetype, Vec<Entity>, Vec<GatheredColumn>) {
        (self.archetype, self.entities, self.columns)
    }
}
