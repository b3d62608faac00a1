//! # Type Registry
//!
//! This module assigns compact ids to Rust component and tag types and keeps
//! the per-component column factories used by archetype construction.
//!
//! ## Purpose
//! The registry decouples component type information (`TypeId`, name, size,
//! alignment) from runtime storage, enabling archetypes to hold
//! heterogeneous columns behind [`TypeErasedColumn`].
//!
//! ## Design
//! - Components and tags live in two independent id spaces, each numbered
//!   sequentially from `1`.
//! - Each component carries a factory function that builds an empty column.
//! - The registry is owned by an
//!   [`ArchetypeRegistry`](crate::engine::registry::ArchetypeRegistry), which
//!   freezes it when the first archetype is allocated. After that point no new
//!   types are accepted, so every archetype can size its direct lookup table
//!   from [`TypeRegistry::max_component_id`].
//!
//! ## Invariants
//! - Ids are unique within their space and never reused.
//! - Re-registering a known type returns its original id, frozen or not.
//! - `components[id - 1]` describes component `id`; likewise for tags.

use std::any::{type_name, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::mem::{align_of, size_of};

use tracing::{debug, info};

use crate::engine::error::{ECSResult, RegistryError};
use crate::engine::mask::Mask;
use crate::engine::storage::{Column, TypeErasedColumn};
use crate::engine::types::{Component, ComponentID, Tag, TagID, COMPONENT_CAP, TAG_CAP};


/// Factory building an empty column with room for `initial_capacity` rows.
pub type ColumnFactory = fn(usize) -> Box<dyn TypeErasedColumn>;

fn new_column<T: Component>(initial_capacity: usize) -> Box<dyn TypeErasedColumn> {
    Box::new(Column::<T>::create(initial_capacity))
}

/// Describes a registered component type.
///
/// ## Notes
/// `ComponentDesc` is `Copy` and safe to hand out freely for diagnostics.

#[derive(Copy, Clone, Debug)]
pub struct ComponentDesc {
    /// Id assigned by the registry.
    pub component_id: ComponentID,

    /// Rust type name for diagnostics.
    pub name: &'static str,

    /// Runtime `TypeId` of the component.
    pub type_id: TypeId,

    /// Size of the component type in bytes.
    pub size: usize,

    /// Alignment of the component type in bytes.
    pub align: usize,

    factory: ColumnFactory,
}

impl ComponentDesc {
    fn of<T: Component>(component_id: ComponentID) -> Self {
        Self {
            component_id,
            name: type_name::<T>(),
            type_id: TypeId::of::<T>(),
            size: size_of::<T>(),
            align: align_of::<T>(),
            factory: new_column::<T>,
        }
    }

    /// Returns `true` if this descriptor refers to type `T`.
    #[inline]
    pub fn matches_type<T: 'static>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Builds an empty column for this component.
    #[inline]
    pub fn make_column(&self, initial_capacity: usize) -> Box<dyn TypeErasedColumn> {
        (self.factory)(initial_capacity)
    }
}

impl fmt::Display for ComponentDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ComponentDesc {{ id: {}, name: {}, size: {}, align: {} }}",
            self.component_id, self.name, self.size, self.align
        )
    }
}

/// Describes a registered tag type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TagDesc {
    /// Id assigned by the registry.
    pub tag_id: TagID,
    /// Rust type name for diagnostics.
    pub name: &'static str,
    /// Runtime `TypeId` of the tag.
    pub type_id: TypeId,
}

/// Mapping between Rust types and compact component/tag ids.
///
/// ## Example
/// ```ignore
/// let mut types = TypeRegistry::new();
/// let position = types.register_component::<Position>()?;
/// let frozen = types.register_tag::<Frozen>()?;
/// let registry = ArchetypeRegistry::new(types);
/// ```

#[derive(Default)]
pub struct TypeRegistry {
    components_by_type: HashMap<TypeId, ComponentID>,
    components: Vec<ComponentDesc>,
    tags_by_type: HashMap<TypeId, TagID>,
    tags: Vec<TagDesc>,
    frozen: bool,
}

impl TypeRegistry {
    /// Creates an empty, unfrozen registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers component type `T` and returns its id.
    ///
    /// ## Behavior
    /// - If `T` is already registered, returns the existing id.
    /// - Otherwise assigns the next sequential id and records a column
    ///   factory for `T`.
    ///
    /// ## Errors
    /// - [`RegistryError::Frozen`] if archetypes already exist.
    /// - [`RegistryError::CapacityExceeded`] past [`COMPONENT_CAP`] types.

    pub fn register_component<T: Component>(&mut self) -> ECSResult<ComponentID> {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.components_by_type.get(&type_id) {
            return Ok(existing);
        }
        if self.frozen {
            return Err(RegistryError::Frozen { name: type_name::<T>() }.into());
        }
        if self.components.len() >= COMPONENT_CAP {
            return Err(RegistryError::CapacityExceeded { kind: "component", cap: COMPONENT_CAP }.into());
        }

        let component_id = (self.components.len() + 1) as ComponentID;
        self.components.push(ComponentDesc::of::<T>(component_id));
        self.components_by_type.insert(type_id, component_id);
        debug!(component = type_name::<T>(), component_id, "registered component type");
        Ok(component_id)
    }

    /// Registers tag type `T` and returns its id.
    ///
    /// ## Errors
    /// Same conditions as [`register_component`](Self::register_component),
    /// checked against [`TAG_CAP`].

    pub fn register_tag<T: Tag>(&mut self) -> ECSResult<TagID> {
        let type_id = TypeId::of::<T>();
        if let Some(&existing) = self.tags_by_type.get(&type_id) {
            return Ok(existing);
        }
        if self.frozen {
            return Err(RegistryError::Frozen { name: type_name::<T>() }.into());
        }
        if self.tags.len() >= TAG_CAP {
            return Err(RegistryError::CapacityExceeded { kind: "tag", cap: TAG_CAP }.into());
        }

        let tag_id = (self.tags.len() + 1) as TagID;
        self.tags.push(TagDesc { tag_id, name: type_name::<T>(), type_id });
        self.tags_by_type.insert(type_id, tag_id);
        debug!(tag = type_name::<T>(), tag_id, "registered tag type");
        Ok(tag_id)
    }

    /// Freezes the registry. Idempotent.
    pub fn freeze(&mut self) {
        if !self.frozen {
            self.frozen = true;
            info!(
                components = self.components.len(),
                tags = self.tags.len(),
                "type registry frozen"
            );
        }
    }

    /// Returns `true` once the registry has been frozen.
    #[inline]
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Highest assigned component id (`0` when none are registered).
    #[inline]
    pub fn max_component_id(&self) -> ComponentID {
        self.components.len() as ComponentID
    }

    /// Highest assigned tag id (`0` when none are registered).
    #[inline]
    pub fn max_tag_id(&self) -> TagID {
        self.tags.len() as TagID
    }

    /// Returns the id of component type `T`.
    pub fn component_id_of<T: 'static>(&self) -> ECSResult<ComponentID> {
        self.components_by_type
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or_else(|| RegistryError::ComponentNotRegistered { name: type_name::<T>() }.into())
    }

    /// Returns the id of tag type `T`.
    pub fn tag_id_of<T: 'static>(&self) -> ECSResult<TagID> {
        self.tags_by_type
            .get(&TypeId::of::<T>())
            .copied()
            .ok_or_else(|| RegistryError::TagNotRegistered { name: type_name::<T>() }.into())
    }

    /// Returns the component id registered for a runtime `TypeId`, if any.
    pub fn component_id_of_type_id(&self, type_id: TypeId) -> Option<ComponentID> {
        self.components_by_type.get(&type_id).copied()
    }

    /// Returns the tag id registered for a runtime `TypeId`, if any.
    pub fn tag_id_of_type_id(&self, type_id: TypeId) -> Option<TagID> {
        self.tags_by_type.get(&type_id).copied()
    }

    /// Returns the descriptor of a component id.
    pub fn component_desc(&self, component_id: ComponentID) -> Option<&ComponentDesc> {
        (component_id as usize)
            .checked_sub(1)
            .and_then(|index| self.components.get(index))
    }

    /// Returns the descriptor of a tag id.
    pub fn tag_desc(&self, tag_id: TagID) -> Option<&TagDesc> {
        (tag_id as usize)
            .checked_sub(1)
            .and_then(|index| self.tags.get(index))
    }

    /// Iterates registered components in id order.
    pub fn components(&self) -> impl Iterator<Item = &ComponentDesc> {
        self.components.iter()
    }

    /// Iterates registered tags in id order.
    pub fn tags(&self) -> impl Iterator<Item = &TagDesc> {
        self.tags.iter()
    }

    /// Builds an empty column for `component_id`.
    ///
    /// ## Errors
    /// [`RegistryError::UnknownComponentId`] if the id was never assigned.

    pub fn make_column(
        &self,
        component_id: ComponentID,
        initial_capacity: usize,
    ) -> ECSResult<Box<dyn TypeErasedColumn>> {
        let desc = self.component_desc(component_id).ok_or(RegistryError::UnknownComponentId {
            id: component_id,
            max: self.max_component_id(),
        })?;
        Ok(desc.make_column(initial_capacity))
    }

    /// Checks that every id in a component mask has been assigned.
    pub fn validate_component_mask(&self, mask: &Mask) -> ECSResult<()> {
        let max = self.max_component_id();
        match mask.iter().find(|&id| id == 0 || id > max) {
            Some(id) => Err(RegistryError::UnknownComponentId { id, max }.into()),
            None => Ok(()),
        }
    }

    /// Checks that every id in a tag mask has been assigned.
    pub fn validate_tag_mask(&self, mask: &Mask) -> ECSResult<()> {
        let max = self.max_tag_id();
        match mask.iter().find(|&id| id == 0 || id > max) {
            Some(id) => Err(RegistryError::UnknownTagId { id, max }.into()),
            None => Ok(()),
        }
    }
}
