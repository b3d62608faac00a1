//! Core Storage Types, Identifiers, and Layout Constants
//!
//! This module defines the **fundamental identifiers and compile-time layout
//! constants** shared by every layer of the store: masks, the type registry,
//! columns, archetypes and queries.
//!
//! ## Design Philosophy
//!
//! The store is designed around:
//!
//! - **Dense storage** in fixed-size chunks,
//! - **Bitmask identities** for archetypes and queries,
//! - **Small, copyable numeric identifiers**,
//! - **No heap allocation in hot paths**.
//!
//! ## Identifier Spaces
//!
//! Component types and tag types are numbered independently. Both id spaces
//! start at `1`; id `0` is never assigned, so bit `0` of every mask stays
//! clear. Ids are stable only for the lifetime of the registry that issued
//! them and carry no meaning across process runs.
//!
//! ## Chunk Layout
//!
//! Archetype rows are grouped into chunks of [`CHUNK_SIZE`] rows. A row index
//! decomposes into `(row >> CHUNK_SHIFT, row & CHUNK_MASK)`. Capacities are
//! always whole multiples of [`CHUNK_SIZE`].
//!
//! The exact widths are controlled by the constants below and validated with
//! static assertions.

/// Identifier for a registered component type. Valid ids lie in `1..=COMPONENT_CAP`.
pub type ComponentID = u16;

/// Identifier for a registered tag type. Valid ids lie in `1..=TAG_CAP`.
pub type TagID = u16;

/// Identifier for an archetype; equal to its creation index in the registry.
pub type ArchetypeID = u32;

/// Caller-assigned entity identifier.
pub type EntityID = u32;

/// Row index within an archetype.
pub type RowID = usize;

/// Number of rows stored per chunk.
pub const CHUNK_SIZE: usize = 512;
/// `log2(CHUNK_SIZE)`, used to split a row into chunk and offset.
pub const CHUNK_SHIFT: u32 = CHUNK_SIZE.trailing_zeros();
/// Mask selecting the in-chunk offset of a row.
pub const CHUNK_MASK: usize = CHUNK_SIZE - 1;

/// Number of `u64` words backing a [`Mask`](crate::engine::mask::Mask).
pub const MASK_WORDS: usize = 4;
/// Number of addressable bits in a mask.
pub const MASK_BITS: usize = MASK_WORDS * 64;

/// Maximum number of component types a registry accepts.
pub const COMPONENT_CAP: usize = MASK_BITS - 1;
/// Maximum number of tag types a registry accepts.
pub const TAG_CAP: usize = MASK_BITS - 1;

/// Maximum number of components a single query signature may name.
pub const MAX_QUERY_COMPONENTS: usize = 8;

const _: [(); 1] = [(); CHUNK_SIZE.is_power_of_two() as usize];
const _: [(); 1] = [(); (1usize << CHUNK_SHIFT == CHUNK_SIZE) as usize];
const _: [(); 1] = [(); (COMPONENT_CAP <= ComponentID::MAX as usize) as usize];
const _: [(); 1] = [(); (TAG_CAP <= TagID::MAX as usize) as usize];
const _: [(); 1] = [(); (MAX_QUERY_COMPONENTS <= COMPONENT_CAP) as usize];

/// Splits a row index into `(chunk, offset)` coordinates.
#[inline]
pub const fn chunk_position(row: RowID) -> (usize, usize) {
    (row >> CHUNK_SHIFT, row & CHUNK_MASK)
}

/// Number of chunks needed to hold `rows` rows (at least one).
#[inline]
pub const fn chunks_for_rows(rows: usize) -> usize {
    let chunks = (rows + CHUNK_MASK) >> CHUNK_SHIFT;
    if chunks == 0 { 1 } else { chunks }
}

/// Marker trait for values that can be stored in archetype columns.
///
/// Columns keep every unused slot at `T::default()` and migrate rows by
/// cloning, so components must be `Clone + Default` in addition to the usual
/// thread-safety bounds. Implemented automatically for every qualifying type.
pub trait Component: 'static + Send + Sync + Clone + Default {}

impl<T: 'static + Send + Sync + Clone + Default> Component for T {}

/// Marker trait for tag types.
///
/// Tags carry no data; only their presence in an archetype's tag mask is
/// recorded. Any `'static` type may be used as a tag.
pub trait Tag: 'static {}

impl<T: 'static> Tag for T {}
