//! Error types for type registration, column access, queries and entities.
//!
//! This module declares focused, composable error types used across the
//! storage engine. Each error carries enough context to make failures
//! actionable while remaining small and cheap to pass around or convert into
//! the aggregate [`ECSError`].
//!
//! ## Goals
//! * **Specificity:** Each enum models one layer (registry, column, query,
//!   entity bookkeeping).
//! * **Ergonomics:** All errors implement [`std::error::Error`] via
//!   `thiserror` and convert into [`ECSError`] with `?`.
//! * **Actionability:** Structured fields (offending ids, type names, caps)
//!   make logs useful without reproducing the issue.
//!
//! ## What is *not* an error
//! Row indices are trusted inputs. Passing an out-of-range row to an
//! archetype or column is a programmer error and panics (debug assertions
//! plus slice bounds checks) instead of producing a value of these types.
//!
//! ## Examples
//! ```ignore
//! match store.add_component(entity, Position::default()) {
//!     Ok(()) => {}
//!     Err(ECSError::Registry(RegistryError::ComponentNotRegistered { name })) => {
//!         eprintln!("register {name} before creating archetypes");
//!     }
//!     Err(e) => return Err(e),
//! }
//! ```

use thiserror::Error;

use crate::engine::types::{ArchetypeID, ComponentID, EntityID, TagID};


/// Failures raised by the type registry and by archetype allocation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A new type was registered after the first archetype was created.
    #[error("cannot register `{name}`: type registry is frozen once archetypes exist")]
    Frozen {
        /// Rust type name of the rejected registration.
        name: &'static str,
    },

    /// The id space for components or tags is exhausted.
    #[error("{kind} capacity exceeded (max {cap})")]
    CapacityExceeded {
        /// `"component"` or `"tag"`.
        kind: &'static str,
        /// Configured maximum number of types.
        cap: usize,
    },

    /// A component type was used before being registered.
    #[error("component type `{name}` is not registered")]
    ComponentNotRegistered {
        /// Rust type name of the component.
        name: &'static str,
    },

    /// A tag type was used before being registered.
    #[error("tag type `{name}` is not registered")]
    TagNotRegistered {
        /// Rust type name of the tag.
        name: &'static str,
    },

    /// A mask referenced a component id above the registered maximum.
    #[error("component id {id} is not registered (max {max})")]
    UnknownComponentId {
        /// Offending component id.
        id: ComponentID,
        /// Highest registered component id.
        max: ComponentID,
    },

    /// A mask referenced a tag id above the registered maximum.
    #[error("tag id {id} is not registered (max {max})")]
    UnknownTagId {
        /// Offending tag id.
        id: TagID,
        /// Highest registered tag id.
        max: TagID,
    },

    /// An archetype id was never issued by this registry.
    #[error("archetype {0} does not exist")]
    UnknownArchetype(ArchetypeID),
}

/// Failures raised by type-erased column operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ColumnError {
    /// Two columns, or a column and a requested type, disagree on element type.
    #[error("column type mismatch: expected `{expected}`, found `{actual}`")]
    TypeMismatch {
        /// Element type the operation expected.
        expected: &'static str,
        /// Element type actually stored.
        actual: &'static str,
    },

    /// An archetype has no column for the requested component.
    #[error("archetype has no column for component id {component_id}")]
    MissingColumn {
        /// Component id that was looked up.
        component_id: ComponentID,
    },
}

/// Failures raised while building or running queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    /// A signature must name at least one component.
    #[error("query signature names no components")]
    EmptySignature,

    /// A signature named more components than supported.
    #[error("query signature names {count} components (max {max})")]
    TooManyComponents {
        /// Requested component count.
        count: usize,
        /// Supported maximum.
        max: usize,
    },

    /// A component id appears twice in one signature.
    #[error("component id {id} appears more than once in the query signature")]
    DuplicateComponent {
        /// Repeated component id.
        id: ComponentID,
    },

    /// Component id `0` is reserved and never registered.
    #[error("component id 0 is reserved")]
    ReservedComponentId,

    /// A component id does not fit in a component mask.
    #[error("component id {id} is out of range (max {max})")]
    ComponentIdOutOfRange {
        /// Offending component id.
        id: ComponentID,
        /// Highest id a mask can hold.
        max: usize,
    },

    /// A typed iteration asked for more components than the signature holds.
    #[error("typed iteration needs {needed} components but the signature has {available}")]
    ArityMismatch {
        /// Components the iteration adapter binds.
        needed: usize,
        /// Components in the signature.
        available: usize,
    },
}

/// Failures raised by entity bookkeeping in the entity store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityError {
    /// The entity id is not alive.
    #[error("entity {0} does not exist")]
    NotFound(EntityID),

    /// The entity exists but lacks the requested component.
    #[error("entity {entity} has no component `{name}`")]
    MissingComponent {
        /// Entity that was queried.
        entity: EntityID,
        /// Rust type name of the component.
        name: &'static str,
    },

    /// No more entity ids can be issued.
    #[error("entity id space exhausted")]
    Exhausted,
}

/// Aggregate error for all store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ECSError {
    /// Type registry or archetype allocation failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Column access failure.
    #[error(transparent)]
    Column(#[from] ColumnError),

    /// Query construction or execution failure.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Entity bookkeeping failure.
    #[error(transparent)]
    Entity(#[from] EntityError),

    /// An internal invariant was observed broken.
    #[error("internal invariant violated: {0}")]
    Internal(&'static str),
}

/// Convenience alias used throughout the crate.
pub type ECSResult<T> = Result<T, ECSError>;
