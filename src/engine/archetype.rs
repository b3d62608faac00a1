//! # Archetype tables
//!
//! An [`Archetype`] stores every entity that shares one exact combination of
//! component types and tags. Storage is structure-of-arrays: a dense
//! entity-id array plus one [`TypeErasedColumn`] per component, all indexed by
//! the same [`RowID`].
//!
//! ## Row lifecycle
//!
//! * [`Archetype::add_row`] appends a row whose component slots hold their
//!   default values; callers write real values afterwards.
//! * [`Archetype::move_entity_to`] migrates a row into another archetype,
//!   cloning every component both tables share.
//! * [`Archetype::remove_last_into`] removes a row by swap-remove: the last
//!   row is moved into the hole so the table stays dense.
//!
//! Whenever a row changes position the caller is told through a
//! [`RowRelocation`] so it can keep its own entity-to-row bookkeeping current.
//!
//! ## Capacity
//!
//! Capacity is always `chunk_count * CHUNK_SIZE`. It grows by whole chunks as
//! soon as the entity count exceeds it, doubling the chunk-array length as
//! needed. It shrinks only once two full chunks are unused, which keeps a
//! table that oscillates around a chunk boundary from reallocating on every
//! add/remove. There is never less than one chunk.
//!
//! The chunk-array length only halves when the chunk count falls to a
//! quarter of it, so it can lag behind: a fully drained table keeps one
//! chunk with an array length of 2. Do not assume it equals
//! `chunk_count.next_power_of_two()`.
//!
//! ## Invariants
//!
//! * `entity_count <= capacity` and `chunk_count >= 1`.
//! * Every column has exactly `chunk_count` chunks.
//! * Rows `>= entity_count` hold default values in every column.
//! * `column_by_type[id]` is `Some(index)` exactly when component `id` is in
//!   the archetype's mask, and `component_ids[index] == id`.

use std::ops::Range;

use tracing::trace;

use crate::engine::types::{
    ArchetypeID,
    ComponentID,
    Component,
    EntityID,
    RowID,
    CHUNK_SIZE,
};

use crate::engine::component::TypeRegistry;
use crate::engine::error::{ColumnError, ECSResult};
use crate::engine::mask::Mask;
use crate::engine::storage::{Column, TypeErasedColumn};


/// Unused rows that must accumulate before a table gives back chunks.
const SHRINK_SLACK: usize = 2 * CHUNK_SIZE;

/// Receives notifications whenever an entity changes row or archetype.
///
/// Implemented for every `FnMut(EntityID, ArchetypeID, RowID)` closure.

pub trait RowRelocation {
    /// `entity` now lives at `row` of `archetype`.
    fn on_row_relocated(&mut self, entity: EntityID, archetype: ArchetypeID, row: RowID);
}

impl<F> RowRelocation for F
where
    F: FnMut(EntityID, ArchetypeID, RowID),
{
    #[inline]
    fn on_row_relocated(&mut self, entity: EntityID, archetype: ArchetypeID, row: RowID) {
        self(entity, archetype, row)
    }
}

/// A [`RowRelocation`] that discards every notification.
#[derive(Clone, Copy, Debug, Default)]
pub struct IgnoreRelocations;

impl RowRelocation for IgnoreRelocations {
    #[inline]
    fn on_row_relocated(&mut self, _: EntityID, _: ArchetypeID, _: RowID) {}
}

/// Table of entities sharing one (component mask, tag mask) pair.

pub struct Archetype {
    archetype_id: ArchetypeID,
    mask: Mask,
    tags: Mask,
    entity_ids: Vec<EntityID>,
    component_ids: Vec<ComponentID>,
    columns: Vec<Box<dyn TypeErasedColumn>>,
    column_by_type: Box<[Option<u16>]>,
    chunk_count: usize,
    chunk_array_len: usize,
}

impl Archetype {
    /// Creates an empty archetype with one chunk of capacity.
    ///
    /// ## Errors
    /// Returns a [`RegistryError`](crate::engine::error::RegistryError) if
    /// either mask names an id the registry has not assigned.

    pub fn new(
        archetype_id: ArchetypeID,
        mask: Mask,
        tags: Mask,
        types: &TypeRegistry,
    ) -> ECSResult<Self> {
        types.validate_component_mask(&mask)?;
        types.validate_tag_mask(&tags)?;

        let mut column_by_type = vec![None; types.max_component_id() as usize + 1].into_boxed_slice();
        let mut component_ids = Vec::with_capacity(mask.count());
        let mut columns = Vec::with_capacity(mask.count());

        for component_id in mask.iter() {
            column_by_type[component_id as usize] = Some(columns.len() as u16);
            component_ids.push(component_id);
            columns.push(types.make_column(component_id, CHUNK_SIZE)?);
        }

        Ok(Self {
            archetype_id,
            mask,
            tags,
            entity_ids: Vec::new(),
            component_ids,
            columns,
            column_by_type,
            chunk_count: 1,
            chunk_array_len: 1,
        })
    }

    /// Returns this archetype's id.
    #[inline]
    pub fn id(&self) -> ArchetypeID { self.archetype_id }

    /// Returns the component mask.
    #[inline]
    pub fn mask(&self) -> &Mask { &self.mask }

    /// Returns the tag mask.
    #[inline]
    pub fn tags(&self) -> &Mask { &self.tags }

    /// Number of live rows.
    #[inline]
    pub fn entity_count(&self) -> usize { self.entity_ids.len() }

    /// Returns `true` if there are no live rows.
    #[inline]
    pub fn is_empty(&self) -> bool { self.entity_ids.is_empty() }

    /// Number of rows the current chunks can hold.
    #[inline]
    pub fn capacity(&self) -> usize { self.chunk_count * CHUNK_SIZE }

    /// Number of allocated chunks per column.
    #[inline]
    pub fn chunk_count(&self) -> usize { self.chunk_count }

    /// Length of each column's chunk array.
    #[inline]
    pub fn chunk_array_len(&self) -> usize { self.chunk_array_len }

    /// Entity ids of the live rows, indexed by row.
    #[inline]
    pub fn entities(&self) -> &[EntityID] { &self.entity_ids }

    /// Component ids stored by this archetype, ascending.
    #[inline]
    pub fn component_ids(&self) -> &[ComponentID] { &self.component_ids }

    /// Returns `true` if the archetype stores component `component_id`.
    #[inline]
    pub fn has_component(&self, component_id: ComponentID) -> bool {
        self.column_index(component_id).is_some()
    }

    #[inline]
    fn column_index(&self, component_id: ComponentID) -> Option<usize> {
        self.column_by_type
            .get(component_id as usize)
            .copied()
            .flatten()
            .map(usize::from)
    }

    /// Returns the type-erased column for `component_id`.
    pub fn column(&self, component_id: ComponentID) -> Option<&dyn TypeErasedColumn> {
        self.column_index(component_id).map(|index| self.columns[index].as_ref())
    }

    /// Returns the type-erased column for `component_id` mutably.
    pub fn column_mut(&mut self, component_id: ComponentID) -> Option<&mut dyn TypeErasedColumn> {
        match self.column_index(component_id) {
            Some(index) => Some(self.columns[index].as_mut()),
            None => None,
        }
    }

    /// Returns the typed column for `component_id`.
    ///
    /// ## Errors
    /// [`ColumnError::MissingColumn`] if the component is absent, or
    /// [`ColumnError::TypeMismatch`] if `T` is not the stored type.

    pub fn column_typed<T: Component>(&self, component_id: ComponentID) -> ECSResult<&Column<T>> {
        let column = self
            .column(component_id)
            .ok_or(ColumnError::MissingColumn { component_id })?;
        Ok(column.typed::<T>()?)
    }

    /// Mutable counterpart of [`column_typed`](Self::column_typed).
    pub fn column_typed_mut<T: Component>(
        &mut self,
        component_id: ComponentID,
    ) -> ECSResult<&mut Column<T>> {
        let column = self
            .column_mut(component_id)
            .ok_or(ColumnError::MissingColumn { component_id })?;
        Ok(column.typed_mut::<T>()?)
    }

    /// Reads component `component_id` at `row`.
    pub fn read<T: Component>(&self, component_id: ComponentID, row: RowID) -> ECSResult<&T> {
        debug_assert!(row < self.entity_count(), "row {row} out of range");
        Ok(self.column_typed::<T>(component_id)?.read(row))
    }

    /// Mutably reads component `component_id` at `row`.
    pub fn read_mut<T: Component>(
        &mut self,
        component_id: ComponentID,
        row: RowID,
    ) -> ECSResult<&mut T> {
        debug_assert!(row < self.entity_count(), "row {row} out of range");
        Ok(self.column_typed_mut::<T>(component_id)?.read_mut(row))
    }

    /// Writes component `component_id` at `row`.
    pub fn write<T: Component>(
        &mut self,
        component_id: ComponentID,
        row: RowID,
        value: T,
    ) -> ECSResult<()> {
        debug_assert!(row < self.entity_count(), "row {row} out of range");
        self.column_typed_mut::<T>(component_id)?.write(row, value);
        Ok(())
    }

    /// Appends a row for `entity` and returns its index.
    ///
    /// Component slots of the new row hold default values.
    pub fn add_row(&mut self, entity: EntityID) -> RowID {
        let row = self.entity_ids.len();
        self.entity_ids.push(entity);
        self.check_chunk_capacity();
        row
    }

    /// Moves `entity` from `source_row` into `target` and returns its new row.
    ///
    /// ## Behavior
    /// 1. Appends a row for `entity` in `target`.
    /// 2. Clones every component present in both archetypes into the new row;
    ///    components only `target` stores keep their default value.
    /// 3. Reports the migrated entity at its new row in `target`.
    /// 4. Swap-removes `source_row` from `self`, reporting the entity that
    ///    was moved into the hole, if any.
    ///
    /// ## Errors
    /// A [`ColumnError::TypeMismatch`] if the two archetypes disagree on the
    /// type of a shared component. The target row is rolled back and `self`
    /// is left untouched in that case.
    ///
    /// ## Panics
    /// In debug builds, if `source_row` is out of range or does not hold
    /// `entity`.

    pub fn move_entity_to<R: RowRelocation + ?Sized>(
        &mut self,
        entity: EntityID,
        source_row: RowID,
        target: &mut Archetype,
        relocations: &mut R,
    ) -> ECSResult<RowID> {
        debug_assert!(source_row < self.entity_count(), "row {source_row} out of range");
        debug_assert_eq!(self.entity_ids[source_row], entity, "row does not hold entity");
        debug_assert_ne!(self.archetype_id, target.archetype_id);

        let target_row = target.add_row(entity);
        for (index, &component_id) in self.component_ids.iter().enumerate() {
            let Some(target_index) = target.column_index(component_id) else {
                continue;
            };
            let copied = self.columns[index].copy_row_to(
                source_row,
                target.columns[target_index].as_mut(),
                target_row,
            );
            if let Err(e) = copied {
                target.remove_last_into(target_row, &mut IgnoreRelocations);
                return Err(e.into());
            }
        }

        relocations.on_row_relocated(entity, target.archetype_id, target_row);
        self.remove_last_into(source_row, relocations);

        trace!(
            entity,
            from = self.archetype_id,
            to = target.archetype_id,
            row = target_row,
            "migrated entity"
        );
        Ok(target_row)
    }

    /// Removes `row` by moving the last row into its place.
    ///
    /// If `row` is already last, the row count is decremented and the slot is
    /// reset to defaults. Otherwise the entity previously in the last row is
    /// reported to `relocations` at `row` and returned.
    ///
    /// ## Panics
    /// In debug builds, if `row` is out of range.

    pub fn remove_last_into<R: RowRelocation + ?Sized>(
        &mut self,
        row: RowID,
        relocations: &mut R,
    ) -> Option<EntityID> {
        debug_assert!(row < self.entity_count(), "row {row} out of range");

        let last = self.entity_ids.len() - 1;
        let moved = if row == last {
            self.entity_ids.pop();
            for column in &mut self.columns {
                column.reset_row(row);
            }
            None
        } else {
            let moved = self.entity_ids[last];
            self.entity_ids.swap_remove(row);
            for column in &mut self.columns {
                column.move_row(last, row);
            }
            relocations.on_row_relocated(moved, self.archetype_id, row);
            Some(moved)
        };

        self.check_chunk_capacity();
        moved
    }

    /// Iterates row ranges covering the live rows one chunk at a time.
    pub fn chunk_ranges(&self) -> impl Iterator<Item = Range<RowID>> {
        let count = self.entity_count();
        (0..count.div_ceil(CHUNK_SIZE)).map(move |chunk| {
            let start = chunk * CHUNK_SIZE;
            start..(start + CHUNK_SIZE).min(count)
        })
    }

    /// Borrows the entity ids together with `N` distinct columns mutably.
    ///
    /// Columns are returned in the order of `component_ids`. Returns `None` if
    /// a component is absent or listed twice.

    pub fn entities_and_columns_mut<const N: usize>(
        &mut self,
        component_ids: [ComponentID; N],
    ) -> Option<(&[EntityID], [&mut Box<dyn TypeErasedColumn>; N])> {
        let indices = component_ids.map(|id| self.column_index(id));
        let mut slots: [Option<&mut Box<dyn TypeErasedColumn>>; N] = std::array::from_fn(|_| None);

        for (index, column) in self.columns.iter_mut().enumerate() {
            if let Some(slot) = indices.iter().position(|&wanted| wanted == Some(index)) {
                slots[slot] = Some(column);
            }
        }

        let columns: Vec<_> = slots.into_iter().collect::<Option<Vec<_>>>()?;
        let columns = columns.try_into().ok()?;
        Some((self.entity_ids.as_slice(), columns))
    }

    fn check_chunk_capacity(&mut self) {
        let count = self.entity_ids.len();
        let capacity = self.capacity();
        let old_chunk_count = self.chunk_count;
        let old_chunk_array_len = self.chunk_array_len;

        let (new_chunk_count, new_chunk_array_len) = if count > capacity {
            let new_chunk_count = count.div_ceil(CHUNK_SIZE);
            let mut new_chunk_array_len = old_chunk_array_len.max(1);
            while new_chunk_array_len < new_chunk_count {
                new_chunk_array_len *= 2;
            }
            (new_chunk_count, new_chunk_array_len)
        } else if capacity >= SHRINK_SLACK && count <= capacity - SHRINK_SLACK {
            let new_chunk_count = count / CHUNK_SIZE + 1;
            let new_chunk_array_len = if new_chunk_count <= old_chunk_array_len / 4 {
                (old_chunk_array_len / 2).max(new_chunk_count)
            } else {
                old_chunk_array_len
            };
            (new_chunk_count, new_chunk_array_len)
        } else {
            return;
        };

        for column in &mut self.columns {
            column.set_chunk_capacity(
                new_chunk_count,
                old_chunk_count,
                new_chunk_array_len,
                old_chunk_array_len,
            );
        }
        self.chunk_count = new_chunk_count;
        self.chunk_array_len = new_chunk_array_len;

        trace!(
            archetype = self.archetype_id,
            entities = count,
            chunks = new_chunk_count,
            chunk_array_len = new_chunk_array_len,
            "resized archetype chunks"
        );
    }
}

impl std::fmt::Debug for Archetype {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Archetype")
            .field("id", &self.archetype_id)
            .field("components", &self.mask)
            .field("tags", &self.tags)
            .field("entities", &self.entity_ids.len())
            .field("chunks", &self.chunk_count)
            .finish()
    }
}
