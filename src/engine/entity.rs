//! Entity id allocation and location tracking.
//!
//! [`Entities`] issues dense `u32` ids, recycles freed ids through a free
//! list, and records where every live entity is stored. It implements
//! [`RowRelocation`], so archetypes can update it directly while they move
//! rows around.
//!
//! Ids carry no generation: once an entity is freed its id may be handed out
//! again by the next allocation.

use crate::engine::archetype::RowRelocation;
use crate::engine::error::{ECSResult, EntityError};
use crate::engine::types::{ArchetypeID, EntityID, RowID};


/// Where an entity's data lives.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct EntityLocation {
    /// Archetype holding the entity.
    pub archetype: ArchetypeID,
    /// Row within that archetype.
    pub row: RowID,
}

/// Allocator and location table for entity ids.
#[derive(Default, Debug)]
pub struct Entities {
    locations: Vec<Option<EntityLocation>>,
    free: Vec<EntityID>,
    alive: usize,
}

impl Entities {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty table with room for `capacity` ids.
    pub fn with_capacity(capacity: usize) -> Self {
        Self { locations: Vec::with_capacity(capacity), ..Self::default() }
    }

    /// Issues an id and records its location.
    ///
    /// ## Errors
    /// [`EntityError::Exhausted`] once every `u32` id is live.
    pub fn allocate(&mut self, location: EntityLocation) -> ECSResult<EntityID> {
        let entity = match self.free.pop() {
            Some(entity) => entity,
            None => {
                let entity = EntityID::try_from(self.locations.len())
                    .map_err(|_| EntityError::Exhausted)?;
                self.locations.push(None);
                entity
            }
        };
        self.locations[entity as usize] = Some(location);
        self.alive += 1;
        Ok(entity)
    }

    /// Releases `entity` and returns its last location.
    pub fn free(&mut self, entity: EntityID) -> ECSResult<EntityLocation> {
        let location = self
            .locations
            .get_mut(entity as usize)
            .and_then(Option::take)
            .ok_or(EntityError::NotFound(entity))?;
        self.free.push(entity);
        self.alive -= 1;
        Ok(location)
    }

    /// Returns the location of a live entity.
    #[inline]
    pub fn location(&self, entity: EntityID) -> Option<EntityLocation> {
        self.locations.get(entity as usize).copied().flatten()
    }

    /// Returns `true` if `entity` is live.
    #[inline]
    pub fn contains(&self, entity: EntityID) -> bool {
        self.location(entity).is_some()
    }

    /// Number of live entities.
    #[inline]
    pub fn len(&self) -> usize { self.alive }

    /// Returns `true` if no entity is live.
    #[inline]
    pub fn is_empty(&self) -> bool { self.alive == 0 }

    /// Iterates live entities with their locations, in id order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityID, EntityLocation)> + '_ {
        self.locations
            .iter()
            .enumerate()
            .filter_map(|(id, location)| location.map(|location| (id as EntityID, location)))
    }
}

impl RowRelocation for Entities {
    #[inline]
    fn on_row_relocated(&mut self, entity: EntityID, archetype: ArchetypeID, row: RowID) {
        debug_assert!(self.contains(entity), "relocated entity {entity} is not live");
        if let Some(slot) = self.locations.get_mut(entity as usize) {
            *slot = Some(EntityLocation { archetype, row });
        }
    }
}
