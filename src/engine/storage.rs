//! Chunked column storage and type-erased access for component data.
//!
//! This module implements the column-oriented container [`Column<T>`], which
//! stores one component value per archetype row in fixed-capacity chunks of
//! [`CHUNK_SIZE`] rows. Archetypes own one column per component type and keep
//! them behind the object-safe [`TypeErasedColumn`] trait so that a single
//! table can hold heterogeneous columns.
//!
//! # Storage model
//!
//! Internally, a column stores its values as:
//!
//! ```text
//! Vec<Box<[T]>>   // every box holds exactly CHUNK_SIZE values
//! ```
//!
//! The column does not track how many rows are live; the owning archetype does.
//! Every slot is always initialized: rows at or beyond the archetype's entity
//! count hold `T::default()`. Removing a row therefore never leaves a stale
//! value behind, and growing never exposes uninitialized memory.
//!
//! Rows are addressed by a linear [`RowID`] that splits into
//! `(row >> CHUNK_SHIFT, row & CHUNK_MASK)` coordinates.
//!
//! # Capacity
//!
//! Capacity is managed by the archetype, which decides on a chunk count and a
//! chunk-array length and applies them to every column through
//! [`TypeErasedColumn::set_chunk_capacity`]. Existing chunks are retained by
//! moving their boxes, so a resize never copies component values.
//!
//! # Type erasure
//!
//! [`TypeErasedColumn`] exposes the element `TypeId` and name, `Any`
//! downcasting hooks, and the row-level operations archetypes need
//! (`move_row`, `reset_row`, `copy_row_to`). Typed access goes through
//! `typed` / `typed_mut` on `dyn TypeErasedColumn`, which fail with [`ColumnError::TypeMismatch`] if the requested type is not the
//! stored one.

use std::{
    any::{type_name, Any, TypeId},
    mem,
};

use crate::engine::types::{
    chunk_position,
    chunks_for_rows,
    Component,
    RowID,
    CHUNK_SIZE,
};

use crate::engine::error::ColumnError;


/// Object-safe interface over a [`Column<T>`] of unknown element type.
///
/// ## Notes
/// Every method taking a row index treats it as a trusted input and panics if
/// it lies outside the column's capacity.

pub trait TypeErasedColumn: Any + Send + Sync {
    /// Returns the `TypeId` of the stored element type.
    fn element_type_id(&self) -> TypeId;

    /// Returns the Rust type name of the stored element type.
    fn element_type_name(&self) -> &'static str;

    /// Upcasts to `&dyn Any` for downcasting.
    fn as_any(&self) -> &dyn Any;

    /// Upcasts to `&mut dyn Any` for downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Number of allocated chunks.
    fn chunk_count(&self) -> usize;

    /// Length reserved for the chunk array (allocated plus spare slots).
    fn chunk_array_len(&self) -> usize;

    /// Resizes the column to `new_chunk_count` chunks and a chunk array of
    /// `new_chunk_array_len` slots.
    ///
    /// The `old_*` arguments restate the values the archetype last applied;
    /// they must match the column's current state.
    fn set_chunk_capacity(
        &mut self,
        new_chunk_count: usize,
        old_chunk_count: usize,
        new_chunk_array_len: usize,
        old_chunk_array_len: usize,
    );

    /// Moves the value at `from` into `to`, leaving `from` at its default.
    fn move_row(&mut self, from: RowID, to: RowID);

    /// Restores the default value at `row`.
    fn reset_row(&mut self, row: RowID);

    /// Clones the value at `row` into `target_row` of `target`.
    ///
    /// ## Errors
    /// [`ColumnError::TypeMismatch`] if `target` stores a different type.
    fn copy_row_to(
        &self,
        row: RowID,
        target: &mut dyn TypeErasedColumn,
        target_row: RowID,
    ) -> Result<(), ColumnError>;

    /// Returns the value at `row` as `&dyn Any`, for diagnostics and tooling.
    fn debug_read(&self, row: RowID) -> &dyn Any;
}

impl<'a> dyn TypeErasedColumn + 'a {
    /// Downcasts to the concrete column type.
    pub fn typed<T: Component>(&self) -> Result<&Column<T>, ColumnError> {
        let actual = self.element_type_name();
        self.as_any()
            .downcast_ref::<Column<T>>()
            .ok_or(ColumnError::TypeMismatch { expected: type_name::<T>(), actual })
    }

    /// Mutably downcasts to the concrete column type.
    pub fn typed_mut<T: Component>(&mut self) -> Result<&mut Column<T>, ColumnError> {
        let actual = self.element_type_name();
        self.as_any_mut()
            .downcast_mut::<Column<T>>()
            .ok_or(ColumnError::TypeMismatch { expected: type_name::<T>(), actual })
    }
}

fn new_chunk<T: Component>() -> Box<[T]> {
    vec![T::default(); CHUNK_SIZE].into_boxed_slice()
}

/// Chunked storage for a single component type.
///
/// ## Invariants
/// - Every chunk holds exactly [`CHUNK_SIZE`] initialized values.
/// - `chunks.len() <= chunk_array_len`.
/// - There is always at least one chunk.

#[derive(Debug)]
pub struct Column<T> {
    chunks: Vec<Box<[T]>>,
    chunk_array_len: usize,
}

impl<T: Component> Column<T> {
    /// Creates a column able to hold `initial_capacity` rows, rounded up to
    /// whole chunks (minimum one chunk).
    pub fn create(initial_capacity: usize) -> Self {
        let chunk_count = chunks_for_rows(initial_capacity);
        let chunk_array_len = chunk_count.next_power_of_two();
        let mut chunks = Vec::with_capacity(chunk_array_len);
        chunks.extend((0..chunk_count).map(|_| new_chunk::<T>()));
        Self { chunks, chunk_array_len }
    }

    /// Number of rows the allocated chunks can hold.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.chunks.len() * CHUNK_SIZE
    }

    /// Returns a reference to the value at `row`.
    #[inline]
    pub fn read(&self, row: RowID) -> &T {
        let (chunk, offset) = chunk_position(row);
        &self.chunks[chunk][offset]
    }

    /// Returns a mutable reference to the value at `row`.
    #[inline]
    pub fn read_mut(&mut self, row: RowID) -> &mut T {
        let (chunk, offset) = chunk_position(row);
        &mut self.chunks[chunk][offset]
    }

    /// Overwrites the value at `row`.
    #[inline]
    pub fn write(&mut self, row: RowID, value: T) {
        *self.read_mut(row) = value;
    }

    /// Returns the first `len` values of chunk `index`.
    #[inline]
    pub fn chunk(&self, index: usize, len: usize) -> &[T] {
        &self.chunks[index][..len]
    }

    /// Returns the first `len` values of chunk `index` mutably.
    #[inline]
    pub fn chunk_mut(&mut self, index: usize, len: usize) -> &mut [T] {
        &mut self.chunks[index][..len]
    }

    /// Iterates the first `len` rows as per-chunk slices: whole chunks first,
    /// then the remainder.
    pub fn chunks_for(&self, len: usize) -> impl Iterator<Item = &[T]> + '_ {
        debug_assert!(len <= self.capacity(), "row count {len} exceeds column capacity");
        self.chunks.iter().enumerate().map_while(move |(index, chunk)| {
            let start = index * CHUNK_SIZE;
            if start >= len {
                return None;
            }
            Some(&chunk[..(len - start).min(CHUNK_SIZE)])
        })
    }

    /// Mutable counterpart of [`chunks_for`](Self::chunks_for).
    pub fn chunks_for_mut(&mut self, len: usize) -> impl Iterator<Item = &mut [T]> + '_ {
        debug_assert!(len <= self.capacity(), "row count {len} exceeds column capacity");
        self.chunks.iter_mut().enumerate().map_while(move |(index, chunk)| {
            let start = index * CHUNK_SIZE;
            if start >= len {
                return None;
            }
            Some(&mut chunk[..(len - start).min(CHUNK_SIZE)])
        })
    }
}

impl<T: Component> TypeErasedColumn for Column<T> {
    fn element_type_id(&self) -> TypeId { TypeId::of::<T>() }
    fn element_type_name(&self) -> &'static str { type_name::<T>() }

    fn as_any(&self) -> &dyn Any { self }
    fn as_any_mut(&mut self) -> &mut dyn Any { self }

    fn chunk_count(&self) -> usize { self.chunks.len() }
    fn chunk_array_len(&self) -> usize { self.chunk_array_len }

    fn set_chunk_capacity(
        &mut self,
        new_chunk_count: usize,
        old_chunk_count: usize,
        new_chunk_array_len: usize,
        old_chunk_array_len: usize,
    ) {
        debug_assert_eq!(old_chunk_count, self.chunks.len());
        debug_assert_eq!(old_chunk_array_len, self.chunk_array_len);
        debug_assert!(new_chunk_count >= 1 && new_chunk_count <= new_chunk_array_len);

        if new_chunk_array_len > old_chunk_array_len {
            self.chunks.reserve_exact(new_chunk_array_len - self.chunks.len());
        }

        if new_chunk_count > old_chunk_count {
            self.chunks
                .extend((old_chunk_count..new_chunk_count).map(|_| new_chunk::<T>()));
        } else {
            self.chunks.truncate(new_chunk_count);
        }

        if new_chunk_array_len < old_chunk_array_len {
            self.chunks.shrink_to(new_chunk_array_len);
        }
        self.chunk_array_len = new_chunk_array_len;
    }

    fn move_row(&mut self, from: RowID, to: RowID) {
        let value = mem::take(self.read_mut(from));
        self.write(to, value);
    }

    fn reset_row(&mut self, row: RowID) {
        self.write(row, T::default());
    }

    fn copy_row_to(
        &self,
        row: RowID,
        target: &mut dyn TypeErasedColumn,
        target_row: RowID,
    ) -> Result<(), ColumnError> {
        let target = target.typed_mut::<T>()?;
        target.write(target_row, self.read(row).clone());
        Ok(())
    }

    fn debug_read(&self, row: RowID) -> &dyn Any {
        self.read(row)
    }
}
