//! # Archetype Registry
//!
//! Owns every [`Archetype`] and guarantees there is exactly one per
//! (component mask, tag mask) pair.
//!
//! ## Lookup
//! Archetypes live in an arena indexed by [`ArchetypeID`] (creation order).
//! A hash table maps an [`ArchetypeKey`] to that id. The key carries a hash
//! precomputed from both masks, and the table uses [`KeyHasher`], which passes
//! that value straight through instead of rehashing the mask words.
//!
//! ## Neighbours
//! No adjacency graph is stored. Moving an entity to "this archetype plus
//! component X" derives the neighbour's masks and probes the table again;
//! the probe is a single precomputed-hash lookup.
//!
//! ## Freezing
//! The first archetype allocation freezes the owned [`TypeRegistry`], fixing
//! the id spaces every archetype sizes its lookup tables from.

use std::collections::HashMap;
use std::hash::{BuildHasherDefault, Hash, Hasher};

use tracing::debug;

use crate::engine::archetype::Archetype;
use crate::engine::component::TypeRegistry;
use crate::engine::error::{ECSResult, RegistryError};
use crate::engine::mask::{Mask, MIX_PRIME};
use crate::engine::types::{ArchetypeID, ComponentID, TagID};


const KEY_SEED: u64 = 0x9E37_79B9_7F4A_7C15;

/// A hasher for types that hash themselves as one precomputed `u64`.
#[derive(Default, Clone, Copy)]
pub struct KeyHasher(u64);

impl Hasher for KeyHasher {
    #[inline]
    fn finish(&self) -> u64 { self.0 }

    fn write(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 = (self.0.rotate_left(8) ^ byte as u64).wrapping_mul(MIX_PRIME);
        }
    }

    #[inline]
    fn write_u64(&mut self, value: u64) { self.0 = value; }
}

/// Hash-table key identifying an archetype by its mask pair.
#[derive(Clone, Copy, Debug, Default)]
pub struct ArchetypeKey {
    components: Mask,
    tags: Mask,
    hash: u64,
}

impl ArchetypeKey {
    /// Builds a key and precomputes its hash.
    pub fn new(components: Mask, tags: Mask) -> Self {
        let mut key = Self::default();
        key.fill(components, tags);
        key
    }

    /// Overwrites this key in place.
    #[inline]
    pub fn fill(&mut self, components: Mask, tags: Mask) {
        self.components = components;
        self.tags = tags;
        self.hash = tags.mix(components.mix(KEY_SEED));
    }

    /// Component mask of the key.
    #[inline]
    pub fn components(&self) -> &Mask { &self.components }

    /// Tag mask of the key.
    #[inline]
    pub fn tags(&self) -> &Mask { &self.tags }
}

impl PartialEq for ArchetypeKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.components == other.components && self.tags == other.tags
    }
}

impl Eq for ArchetypeKey {}

impl Hash for ArchetypeKey {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

type KeyMap = HashMap<ArchetypeKey, ArchetypeID, BuildHasherDefault<KeyHasher>>;

/// Arena of archetypes with canonical lookup by mask pair.
///
/// ## Example
/// ```ignore
/// let mut types = TypeRegistry::new();
/// let a = types.register_component::<A>()?;
/// let mut registry = ArchetypeRegistry::new(types);
/// let id = registry.get_or_create(Mask::from_ids(&[a]), Mask::EMPTY)?;
/// assert_eq!(registry.get_or_create(Mask::from_ids(&[a]), Mask::EMPTY)?, id);
/// ```

pub struct ArchetypeRegistry {
    types: TypeRegistry,
    archetypes: Vec<Archetype>,
    lookup: KeyMap,
    search_key: ArchetypeKey,
}

impl ArchetypeRegistry {
    /// Creates an empty registry around a populated type registry.
    pub fn new(types: TypeRegistry) -> Self {
        Self {
            types,
            archetypes: Vec::new(),
            lookup: KeyMap::default(),
            search_key: ArchetypeKey::default(),
        }
    }

    /// Returns the owned type registry.
    #[inline]
    pub fn types(&self) -> &TypeRegistry { &self.types }

    /// Returns the owned type registry mutably.
    ///
    /// Registration through this handle fails once any archetype exists.
    #[inline]
    pub fn types_mut(&mut self) -> &mut TypeRegistry { &mut self.types }

    /// Number of archetypes created so far.
    #[inline]
    pub fn len(&self) -> usize { self.archetypes.len() }

    /// Returns `true` if no archetype has been created.
    #[inline]
    pub fn is_empty(&self) -> bool { self.archetypes.is_empty() }

    /// Returns the archetype with `archetype_id`.
    #[inline]
    pub fn archetype(&self, archetype_id: ArchetypeID) -> Option<&Archetype> {
        self.archetypes.get(archetype_id as usize)
    }

    /// Returns the archetype with `archetype_id` mutably.
    #[inline]
    pub fn archetype_mut(&mut self, archetype_id: ArchetypeID) -> Option<&mut Archetype> {
        self.archetypes.get_mut(archetype_id as usize)
    }

    /// Borrows two distinct archetypes mutably at once.
    ///
    /// Returns `None` if `a == b` or either id does not exist.
    pub fn pair_mut(
        &mut self,
        a: ArchetypeID,
        b: ArchetypeID,
    ) -> Option<(&mut Archetype, &mut Archetype)> {
        let (a, b) = (a as usize, b as usize);
        if a == b || a >= self.archetypes.len() || b >= self.archetypes.len() {
            return None;
        }
        if a < b {
            let (low, high) = self.archetypes.split_at_mut(b);
            Some((&mut low[a], &mut high[0]))
        } else {
            let (low, high) = self.archetypes.split_at_mut(a);
            Some((&mut high[0], &mut low[b]))
        }
    }

    /// Iterates archetypes in creation order.
    #[inline]
    pub fn iter(&self) -> std::slice::Iter<'_, Archetype> {
        self.archetypes.iter()
    }

    /// Iterates archetypes mutably in creation order.
    #[inline]
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Archetype> {
        self.archetypes.iter_mut()
    }

    /// Looks up the archetype for a mask pair without creating it.
    pub fn find(&self, components: Mask, tags: Mask) -> Option<ArchetypeID> {
        self.lookup.get(&ArchetypeKey::new(components, tags)).copied()
    }

    /// Returns the archetype for a mask pair, creating it on first use.
    ///
    /// ## Behavior
    /// - Probes the lookup table with the scratch key.
    /// - On a miss, allocates the next [`ArchetypeID`], builds the archetype,
    ///   freezes the type registry and records the key.
    ///
    /// ## Errors
    /// [`RegistryError::UnknownComponentId`] / [`RegistryError::UnknownTagId`]
    /// if a mask names an id above the registered maximum.

    pub fn get_or_create(&mut self, components: Mask, tags: Mask) -> ECSResult<ArchetypeID> {
        self.search_key.fill(components, tags);
        if let Some(&existing) = self.lookup.get(&self.search_key) {
            return Ok(existing);
        }

        debug_assert_eq!(self.lookup.len(), self.archetypes.len());
        debug_assert!(
            !self.archetypes.iter().any(|a| *a.mask() == components && *a.tags() == tags),
            "archetype for mask pair exists but is missing from the lookup table"
        );

        let archetype_id = self.archetypes.len() as ArchetypeID;
        let archetype = Archetype::new(archetype_id, components, tags, &self.types)?;
        self.types.freeze();
        self.archetypes.push(archetype);
        self.lookup.insert(self.search_key, archetype_id);

        debug!(archetype_id, %components, %tags, "created archetype");
        Ok(archetype_id)
    }

    fn masks_of(&self, archetype_id: ArchetypeID) -> ECSResult<(Mask, Mask)> {
        let archetype = self
            .archetype(archetype_id)
            .ok_or(RegistryError::UnknownArchetype(archetype_id))?;
        Ok((*archetype.mask(), *archetype.tags()))
    }

    fn check_component_id(&self, component_id: ComponentID) -> Result<(), RegistryError> {
        let max = self.types.max_component_id();
        if component_id == 0 || component_id > max {
            return Err(RegistryError::UnknownComponentId { id: component_id, max });
        }
        Ok(())
    }

    fn check_tag_id(&self, tag_id: TagID) -> Result<(), RegistryError> {
        let max = self.types.max_tag_id();
        if tag_id == 0 || tag_id > max {
            return Err(RegistryError::UnknownTagId { id: tag_id, max });
        }
        Ok(())
    }

    /// Archetype reached from `archetype_id` by adding `component_id`.
    ///
    /// ## Errors
    /// [`RegistryError::UnknownArchetype`] or
    /// [`RegistryError::UnknownComponentId`].
    pub fn with_component_added(
        &mut self,
        archetype_id: ArchetypeID,
        component_id: ComponentID,
    ) -> ECSResult<ArchetypeID> {
        self.check_component_id(component_id)?;
        let (components, tags) = self.masks_of(archetype_id)?;
        self.get_or_create(components.with(component_id), tags)
    }

    /// Archetype reached from `archetype_id` by removing `component_id`.
    pub fn with_component_removed(
        &mut self,
        archetype_id: ArchetypeID,
        component_id: ComponentID,
    ) -> ECSResult<ArchetypeID> {
        self.check_component_id(component_id)?;
        let (components, tags) = self.masks_of(archetype_id)?;
        self.get_or_create(components.without(component_id), tags)
    }

    /// Archetype reached from `archetype_id` by adding `tag_id`.
    pub fn with_tag_added(
        &mut self,
        archetype_id: ArchetypeID,
        tag_id: TagID,
    ) -> ECSResult<ArchetypeID> {
        self.check_tag_id(tag_id)?;
        let (components, tags) = self.masks_of(archetype_id)?;
        self.get_or_create(components, tags.with(tag_id))
    }

    /// Archetype reached from `archetype_id` by removing `tag_id`.
    pub fn with_tag_removed(
        &mut self,
        archetype_id: ArchetypeID,
        tag_id: TagID,
    ) -> ECSResult<ArchetypeID> {
        self.check_tag_id(tag_id)?;
        let (components, tags) = self.masks_of(archetype_id)?;
        self.get_or_create(components, tags.without(tag_id))
    }
}

impl AsRef<ArchetypeRegistry> for ArchetypeRegistry {
    fn as_ref(&self) -> &ArchetypeRegistry { self }
}

impl AsMut<ArchetypeRegistry> for ArchetypeRegistry {
    fn as_mut(&mut self) -> &mut ArchetypeRegistry { self }
}

impl<'a> IntoIterator for &'a ArchetypeRegistry {
    type Item = &'a Archetype;
    type IntoIter = std::slice::Iter<'a, Archetype>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
