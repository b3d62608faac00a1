//! # Archetype Store
//!
//! Archetype-based entity/component storage.
//!
//! Entities that share an identical combination of component types and tags
//! are grouped into dense, columnar tables ("archetypes"). Tables are split
//! into fixed 512-row chunks and iterated as contiguous slices.
//!
//! ## Design Goals
//! - Bit-mask identities for archetype lookup and query matching
//! - Chunked structure-of-arrays storage with geometric growth and shrink
//! - Type-erased columns supporting row migration between archetypes
//! - Zero-copy, cache-friendly query iteration
//!
//! ## Layers
//! - [`TypeRegistry`]: assigns component and tag ids
//! - [`ArchetypeRegistry`]: owns one [`Archetype`] per mask pair
//! - [`Query`]: matches archetypes and walks their chunks
//! - [`EntityStore`]: entity-level glue over the registry

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod engine;

// ─────────────────────────────────────────────────────────────────────────────
// Re-exports (Public API)
// ─────────────────────────────────────────────────────────────────────────────

pub use engine::manager::EntityStore;

pub use engine::entity::{
    Entities,
    EntityLocation,
};

pub use engine::component::{
    ComponentDesc,
    TagDesc,
    TypeRegistry,
};

pub use engine::mask::{
    Mask,
    MaskIter,
};

pub use engine::storage::{
    Column,
    TypeErasedColumn,
};

pub use engine::archetype::{
    Archetype,
    IgnoreRelocations,
    RowRelocation,
};

pub use engine::registry::{
    ArchetypeKey,
    ArchetypeRegistry,
    KeyHasher,
};

pub use engine::query::{
    LocateEntity,
    Query,
    QueryBuilder,
    QueryChunk,
    QueryIter,
    Signature,
};

pub use engine::error::{
    ECSResult,
    ECSError,
    RegistryError,
    ColumnError,
    QueryError,
    EntityError,
};

pub use engine::types::{
    ArchetypeID,
    Component,
    ComponentID,
    EntityID,
    RowID,
    Tag,
    TagID,
    CHUNK_SIZE,
};

// ─────────────────────────────────────────────────────────────────────────────
// Prelude
// ─────────────────────────────────────────────────────────────────────────────

/// Commonly used types.
///
/// Import with:
/// ```rust
/// use archetype_store::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        ArchetypeRegistry,
        Component,
        ECSResult,
        EntityID,
        EntityStore,
        LocateEntity,
        Mask,
        Query,
        QueryBuilder,
        Tag,
        TypeRegistry,
    };
}
