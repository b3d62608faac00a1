//! Entity-level access to archetype storage.
//!
//! [`EntityStore`] pairs an [`ArchetypeRegistry`] with an [`Entities`] table
//! and exposes entity-granular operations: spawn, despawn, adding or removing
//! components and tags, and typed component access.
//!
//! ## Structural changes
//!
//! Adding or removing a component or tag migrates the entity to the
//! neighbouring archetype:
//!
//! * the neighbour is found by re-probing the registry with the adjusted masks,
//! * shared component values are cloned into the neighbour,
//! * the source row is swap-removed,
//! * every relocation is written back into the [`Entities`] table.
//!
//! Removing an entity's last component moves it to the archetype with an
//! empty component mask; its tags are kept.
//!
//! ## Queries
//!
//! [`EntityStore::query`] starts a [`QueryBuilder`] over the store's type
//! registry; the resulting [`Query`](crate::engine::query::Query) runs against
//! [`EntityStore::registry_mut`], or against the store itself in copied mode.

use std::any::type_name;

use crate::engine::archetype::Archetype;
use crate::engine::component::TypeRegistry;
use crate::engine::entity::{Entities, EntityLocation};
use crate::engine::error::{ECSError, ECSResult, EntityError};
use crate::engine::mask::Mask;
use crate::engine::query::{LocateEntity, QueryBuilder};
use crate::engine::registry::ArchetypeRegistry;
use crate::engine::types::{ArchetypeID, Component, EntityID, RowID, Tag};


/// Owns archetype storage and the entities placed in it.
///
/// ## Example
/// ```ignore
/// let mut types = TypeRegistry::new();
/// types.register_component::<Position>()?;
/// let mut store = EntityStore::new(types);
/// let entity = store.spawn()?;
/// store.add_component(entity, Position { x: 1.0, y: 2.0 })?;
/// assert_eq!(store.get::<Position>(entity)?.x, 1.0);
/// ```

pub struct EntityStore {
    registry: ArchetypeRegistry,
    entities: Entities,
}

impl EntityStore {
    /// Creates an empty store.
    pub fn new(types: TypeRegistry) -> Self {
        Self::with_capacity(types, 0)
    }

    /// Creates an empty store with room for `entities` ids.
    pub fn with_capacity(types: TypeRegistry, entities: usize) -> Self {
        Self {
            registry: ArchetypeRegistry::new(types),
            entities: Entities::with_capacity(entities),
        }
    }

    /// Returns the archetype registry.
    #[inline]
    pub fn registry(&self) -> &ArchetypeRegistry { &self.registry }

    /// Returns the archetype registry mutably, for running queries.
    #[inline]
    pub fn registry_mut(&mut self) -> &mut ArchetypeRegistry { &mut self.registry }

    /// Returns the type registry.
    #[inline]
    pub fn types(&self) -> &TypeRegistry { self.registry.types() }

    /// Returns the entity table.
    #[inline]
    pub fn entities(&self) -> &Entities { &self.entities }

    /// Number of live entities.
    #[inline]
    pub fn len(&self) -> usize { self.entities.len() }

    /// Returns `true` if no entity is live.
    #[inline]
    pub fn is_empty(&self) -> bool { self.entities.is_empty() }

    /// Returns `true` if `entity` is live.
    #[inline]
    pub fn contains(&self, entity: EntityID) -> bool { self.entities.contains(entity) }

    /// Returns where `entity` is stored.
    pub fn location(&self, entity: EntityID) -> ECSResult<EntityLocation> {
        self.entities
            .location(entity)
            .ok_or_else(|| EntityError::NotFound(entity).into())
    }

    /// Returns the archetype currently holding `entity`.
    pub fn archetype_of(&self, entity: EntityID) -> ECSResult<&Archetype> {
        let location = self.location(entity)?;
        self.archetype(location.archetype)
    }

    fn archetype(&self, archetype_id: ArchetypeID) -> ECSResult<&Archetype> {
        self.registry
            .archetype(archetype_id)
            .ok_or(ECSError::Internal("entity location names a missing archetype"))
    }

    fn archetype_mut(&mut self, archetype_id: ArchetypeID) -> ECSResult<&mut Archetype> {
        self.registry
            .archetype_mut(archetype_id)
            .ok_or(ECSError::Internal("entity location names a missing archetype"))
    }

    /// Spawns an entity with no components and no tags.
    pub fn spawn(&mut self) -> ECSResult<EntityID> {
        let archetype_id = self.registry.get_or_create(Mask::EMPTY, Mask::EMPTY)?;
        self.place(archetype_id)
    }

    /// Spawns an entity holding a single component.
    pub fn spawn_with<T: Component>(&mut self, value: T) -> ECSResult<EntityID> {
        let component_id = self.types().component_id_of::<T>()?;
        let archetype_id = self
            .registry
            .get_or_create(Mask::EMPTY.with(component_id), Mask::EMPTY)?;
        let entity = self.place(archetype_id)?;
        let location = self.location(entity)?;
        self.archetype_mut(archetype_id)?
            .write(component_id, location.row, value)?;
        Ok(entity)
    }

    fn place(&mut self, archetype_id: ArchetypeID) -> ECSResult<EntityID> {
        let row = self.archetype(archetype_id)?.entity_count();
        let entity = self.entities.allocate(EntityLocation { archetype: archetype_id, row })?;
        let added = self.archetype_mut(archetype_id)?.add_row(entity);
        debug_assert_eq!(added, row);
        Ok(entity)
    }

    /// Removes `entity` and all of its components.
    pub fn despawn(&mut self, entity: EntityID) -> ECSResult<()> {
        let location = self.location(entity)?;
        let archetype = self
            .registry
            .archetype_mut(location.archetype)
            .ok_or(ECSError::Internal("entity location names a missing archetype"))?;
        archetype.remove_last_into(location.row, &mut self.entities);
        self.entities.free(entity)?;
        Ok(())
    }

    fn migrate(
        &mut self,
        entity: EntityID,
        from: EntityLocation,
        to: ArchetypeID,
    ) -> ECSResult<RowID> {
        let (source, target) = self
            .registry
            .pair_mut(from.archetype, to)
            .ok_or(ECSError::Internal("migration between missing or identical archetypes"))?;
        source.move_entity_to(entity, from.row, target, &mut self.entities)
    }

    /// Adds `value` to `entity`, or overwrites it if already present.
    pub fn add_component<T: Component>(&mut self, entity: EntityID, value: T) -> ECSResult<()> {
        let component_id = self.types().component_id_of::<T>()?;
        let location = self.location(entity)?;

        let row = if self.archetype(location.archetype)?.has_component(component_id) {
            location.row
        } else {
            let target = self
                .registry
                .with_component_added(location.archetype, component_id)?;
            self.migrate(entity, location, target)?
        };

        let location = self.location(entity)?;
        debug_assert_eq!(location.row, row);
        self.archetype_mut(location.archetype)?
            .write(component_id, row, value)
    }

    /// Removes component `T` from `entity` and returns its value.
    ///
    /// ## Errors
    /// [`EntityError::MissingComponent`] if `entity` has no `T`.

    pub fn remove_component<T: Component>(&mut self, entity: EntityID) -> ECSResult<T> {
        let component_id = self.types().component_id_of::<T>()?;
        let location = self.location(entity)?;
        let archetype = self.archetype(location.archetype)?;
        if !archetype.has_component(component_id) {
            return Err(EntityError::MissingComponent { entity, name: type_name::<T>() }.into());
        }

        let value = archetype.read::<T>(component_id, location.row)?.clone();
        let target = self
            .registry
            .with_component_removed(location.archetype, component_id)?;
        self.migrate(entity, location, target)?;
        Ok(value)
    }

    /// Adds tag `T` to `entity`. Adding a present tag is a no-op.
    pub fn add_tag<T: Tag>(&mut self, entity: EntityID) -> ECSResult<()> {
        let tag_id = self.types().tag_id_of::<T>()?;
        let location = self.location(entity)?;
        if self.archetype(location.archetype)?.tags().has(tag_id) {
            return Ok(());
        }
        let target = self.registry.with_tag_added(location.archetype, tag_id)?;
        self.migrate(entity, location, target)?;
        Ok(())
    }

    /// Removes tag `T` from `entity`. Removing an absent tag is a no-op.
    pub fn remove_tag<T: Tag>(&mut self, entity: EntityID) -> ECSResult<()> {
        let tag_id = self.types().tag_id_of::<T>()?;
        let location = self.location(entity)?;
        if !self.archetype(location.archetype)?.tags().has(tag_id) {
            return Ok(());
        }
        let target = self.registry.with_tag_removed(location.archetype, tag_id)?;
        self.migrate(entity, location, target)?;
        Ok(())
    }

    /// Returns `true` if `entity` has component `T`.
    pub fn has_component<T: Component>(&self, entity: EntityID) -> ECSResult<bool> {
        let component_id = self.types().component_id_of::<T>()?;
        Ok(self.archetype_of(entity)?.has_component(component_id))
    }

    /// Returns `true` if `entity` carries tag `T`.
    pub fn has_tag<T: Tag>(&self, entity: EntityID) -> ECSResult<bool> {
        let tag_id = self.types().tag_id_of::<T>()?;
        Ok(self.archetype_of(entity)?.tags().has(tag_id))
    }

    /// Borrows component `T` of `entity`.
    pub fn get<T: Component>(&self, entity: EntityID) -> ECSResult<&T> {
        let component_id = self.types().component_id_of::<T>()?;
        let location = self.location(entity)?;
        let archetype = self.archetype(location.archetype)?;
        if !archetype.has_component(component_id) {
            return Err(EntityError::MissingComponent { entity, name: type_name::<T>() }.into());
        }
        archetype.read::<T>(component_id, location.row)
    }

    /// Mutably borrows component `T` of `entity`.
    pub fn get_mut<T: Component>(&mut self, entity: EntityID) -> ECSResult<&mut T> {
        let component_id = self.types().component_id_of::<T>()?;
        let location = self.location(entity)?;
        let archetype = self.archetype_mut(location.archetype)?;
        if !archetype.has_component(component_id) {
            return Err(EntityError::MissingComponent { entity, name: type_name::<T>() }.into());
        }
        archetype.read_mut::<T>(component_id, location.row)
    }

    /// Starts building a query over this store's types.
    pub fn query(&self) -> QueryBuilder<'_> {
        QueryBuilder::new(self.types())
    }
}

impl AsRef<ArchetypeRegistry> for EntityStore {
    fn as_ref(&self) -> &ArchetypeRegistry { &self.registry }
}

impl AsMut<ArchetypeRegistry> for EntityStore {
    fn as_mut(&mut self) -> &mut ArchetypeRegistry { &mut self.registry }
}

impl LocateEntity for EntityStore {
    #[inline]
    fn locate(&self, entity: EntityID) -> Option<EntityLocation> {
        self.entities.location(entity)
    }
}
