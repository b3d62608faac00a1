//! Query construction and execution over archetype tables.
//!
//! A [`Query`] wraps a [`Signature`], an ordered list of component ids that is
//! resolved once into a [`Mask`]. An archetype matches when its component mask
//! contains the signature mask. Optional tag filters and component exclusions
//! narrow the match further and are unconstrained by default.
//!
//! ## Execution model
//! Queries:
//! 1. Walk the registry's archetypes in creation order and keep the matching ones.
//! 2. Within each archetype, visit whole [`CHUNK_SIZE`]-row chunks, then the remainder.
//! 3. Hand out zero-copy slices of the column chunks, or invoke a closure per row.
//!
//! ## Structural changes
//! Zero-copy iteration borrows the registry, so the borrow checker rejects
//! structural mutation inside the body. The copied adapters
//! ([`Query::for_each_copied`], [`Query::for_each_copied2`]) instead record
//! each matching archetype's entity ids before visiting it, clone values one
//! chunk of those ids at a time, and hand the body mutable access to the owning
//! world. Every entity that stays in the archetype until its turn is visited
//! once, even when the body despawns or migrates other rows. Entities moved
//! into a matching archetype that has already been walked are not revisited;
//! entities moved into one still ahead may be visited again there. Every
//! visited value is a snapshot taken when its batch was copied.
//!
//! ## Parallelism
//! [`Query::par_for_each2`] splits work by chunk and hands every chunk's
//! mutable slice to exactly one rayon task.

use std::ops::Range;

use rayon::prelude::*;

use crate::engine::archetype::Archetype;
use crate::engine::component::TypeRegistry;
use crate::engine::entity::EntityLocation;
use crate::engine::error::{ECSError, ECSResult, QueryError};
use crate::engine::mask::Mask;
use crate::engine::registry::ArchetypeRegistry;
use crate::engine::storage::TypeErasedColumn;
use crate::engine::types::{
    chunk_position,
    ArchetypeID,
    Component,
    ComponentID,
    EntityID,
    RowID,
    Tag,
    CHUNK_SIZE,
    MASK_BITS,
    MAX_QUERY_COMPONENTS,
};


/// Ordered set of component ids a query requires.
///
/// ## Invariants
/// - Holds between 1 and [`MAX_QUERY_COMPONENTS`] ids.
/// - Ids are non-zero and pairwise distinct.
/// - `mask` has exactly the bits of `ids` set.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    ids: [ComponentID; MAX_QUERY_COMPONENTS],
    len: usize,
    mask: Mask,
}

impl Signature {
    /// Builds a signature from ordered component ids.
    ///
    /// ## Errors
    /// [`QueryError::EmptySignature`], [`QueryError::TooManyComponents`],
    /// [`QueryError::ReservedComponentId`],
    /// [`QueryError::ComponentIdOutOfRange`] or
    /// [`QueryError::DuplicateComponent`].

    pub fn new(component_ids: &[ComponentID]) -> Result<Self, QueryError> {
        if component_ids.is_empty() {
            return Err(QueryError::EmptySignature);
        }
        if component_ids.len() > MAX_QUERY_COMPONENTS {
            return Err(QueryError::TooManyComponents {
                count: component_ids.len(),
                max: MAX_QUERY_COMPONENTS,
            });
        }

        let mut ids = [0; MAX_QUERY_COMPONENTS];
        let mut mask = Mask::EMPTY;
        for (slot, &id) in component_ids.iter().enumerate() {
            if id == 0 {
                return Err(QueryError::ReservedComponentId);
            }
            if id as usize >= MASK_BITS {
                return Err(QueryError::ComponentIdOutOfRange { id, max: MASK_BITS - 1 });
            }
            if mask.has(id) {
                return Err(QueryError::DuplicateComponent { id });
            }
            mask.set(id);
            ids[slot] = id;
        }

        Ok(Self { ids, len: component_ids.len(), mask })
    }

    /// Component ids in signature order.
    #[inline]
    pub fn ids(&self) -> &[ComponentID] { &self.ids[..self.len] }

    /// Number of components in the signature.
    #[inline]
    pub fn len(&self) -> usize { self.len }

    /// Always `false`; signatures hold at least one component.
    #[inline]
    pub fn is_empty(&self) -> bool { self.len == 0 }

    /// Mask of the signature's component ids.
    #[inline]
    pub fn mask(&self) -> &Mask { &self.mask }

    fn first<const N: usize>(&self) -> Result<[ComponentID; N], QueryError> {
        if N > self.len {
            return Err(QueryError::ArityMismatch { needed: N, available: self.len });
        }
        Ok(std::array::from_fn(|i| self.ids[i]))
    }
}

/// A reusable archetype filter built from a [`Signature`].
///
/// ## Example
/// ```ignore
/// let query = Query::new(&[position, velocity])?.without_tags(Mask::from_ids(&[frozen]));
/// query.for_each2::<Position, Velocity, _>(&mut registry, |_, pos, vel| {
///     pos.x += vel.x;
/// })?;
/// ```

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Query {
    signature: Signature,
    with_tags: Mask,
    without_tags: Mask,
    without: Mask,
}

impl From<Signature> for Query {
    fn from(signature: Signature) -> Self {
        Self {
            signature,
            with_tags: Mask::EMPTY,
            without_tags: Mask::EMPTY,
            without: Mask::EMPTY,
        }
    }
}

impl Query {
    /// Builds a query requiring `component_ids`.
    pub fn new(component_ids: &[ComponentID]) -> ECSResult<Self> {
        Ok(Signature::new(component_ids)?.into())
    }

    /// Requires every tag in `tags`.
    pub fn with_tags(mut self, tags: Mask) -> Self {
        self.with_tags = self.with_tags.union(&tags);
        self
    }

    /// Rejects archetypes carrying any tag in `tags`.
    pub fn without_tags(mut self, tags: Mask) -> Self {
        self.without_tags = self.without_tags.union(&tags);
        self
    }

    /// Rejects archetypes storing any component in `components`.
    pub fn without(mut self, components: Mask) -> Self {
        self.without = self.without.union(&components);
        self
    }

    /// Returns the signature.
    #[inline]
    pub fn signature(&self) -> &Signature { &self.signature }

    /// Returns `true` if `archetype` satisfies every filter.
    #[inline]
    pub fn matches(&self, archetype: &Archetype) -> bool {
        archetype.mask().has_all(self.signature.mask())
            && !archetype.mask().has_any(&self.without)
            && archetype.tags().has_all(&self.with_tags)
            && !archetype.tags().has_any(&self.without_tags)
    }

    /// Iterates matching archetypes in creation order.
    pub fn matching<'r>(
        &'r self,
        registry: &'r ArchetypeRegistry,
    ) -> impl Iterator<Item = &'r Archetype> + 'r {
        registry.iter().filter(move |archetype| self.matches(archetype))
    }

    /// Total number of rows across matching archetypes.
    pub fn entity_count(&self, registry: &ArchetypeRegistry) -> usize {
        self.matching(registry).map(Archetype::entity_count).sum()
    }

    /// Iterates matching rows chunk by chunk.
    pub fn iter<'r>(&'r self, registry: &'r ArchetypeRegistry) -> QueryIter<'r> {
        QueryIter {
            query: self,
            archetypes: registry.iter(),
            current: None,
            columns: [None; MAX_QUERY_COMPONENTS],
            next_row: 0,
        }
    }

    /// Calls `f` with every matching entity and its first signature component.
    pub fn for_each<A, F>(&self, registry: &mut ArchetypeRegistry, mut f: F) -> ECSResult<()>
    where
        A: Component,
        F: FnMut(EntityID, &mut A),
    {
        let ids = self.signature.first::<1>()?;
        for archetype in registry.iter_mut() {
            if archetype.is_empty() || !self.matches(archetype) {
                continue;
            }
            let count = archetype.entity_count();
            let (entities, [a]) = archetype
                .entities_and_columns_mut(ids)
                .ok_or(ECSError::Internal(MISSING_COLUMN))?;
            let a = a.typed_mut::<A>()?;
            for (entities, a) in entities.chunks(CHUNK_SIZE).zip(a.chunks_for_mut(count)) {
                for (&entity, a) in entities.iter().zip(a) {
                    f(entity, a);
                }
            }
        }
        Ok(())
    }

    /// Calls `f` with every matching entity and its first two signature
    /// components.
    pub fn for_each2<A, B, F>(&self, registry: &mut ArchetypeRegistry, mut f: F) -> ECSResult<()>
    where
        A: Component,
        B: Component,
        F: FnMut(EntityID, &mut A, &mut B),
    {
        let ids = self.signature.first::<2>()?;
        for archetype in registry.iter_mut() {
            if archetype.is_empty() || !self.matches(archetype) {
                continue;
            }
            let count = archetype.entity_count();
            let (entities, [a, b]) = archetype
                .entities_and_columns_mut(ids)
                .ok_or(ECSError::Internal(MISSING_COLUMN))?;
            let a = a.typed_mut::<A>()?;
            let b = b.typed_mut::<B>()?;
            let chunks = entities
                .chunks(CHUNK_SIZE)
                .zip(a.chunks_for_mut(count))
                .zip(b.chunks_for_mut(count));
            for ((entities, a), b) in chunks {
                for ((&entity, a), b) in entities.iter().zip(a).zip(b) {
                    f(entity, a, b);
                }
            }
        }
        Ok(())
    }

    /// Calls `f` with every matching entity and its first three signature
    /// components.
    pub fn for_each3<A, B, C, F>(&self, registry: &mut ArchetypeRegistry, mut f: F) -> ECSResult<()>
    where
        A: Component,
        B: Component,
        C: Component,
        F: FnMut(EntityID, &mut A, &mut B, &mut C),
    {
        let ids = self.signature.first::<3>()?;
        for archetype in registry.iter_mut() {
            if archetype.is_empty() || !self.matches(archetype) {
                continue;
            }
            let count = archetype.entity_count();
            let (entities, [a, b, c]) = archetype
                .entities_and_columns_mut(ids)
                .ok_or(ECSError::Internal(MISSING_COLUMN))?;
            let a = a.typed_mut::<A>()?;
            let b = b.typed_mut::<B>()?;
            let c = c.typed_mut::<C>()?;
            let chunks = entities
                .chunks(CHUNK_SIZE)
                .zip(a.chunks_for_mut(count))
                .zip(b.chunks_for_mut(count))
                .zip(c.chunks_for_mut(count));
            for (((entities, a), b), c) in chunks {
                for (((&entity, a), b), c) in entities.iter().zip(a).zip(b).zip(c) {
                    f(entity, a, b, c);
                }
            }
        }
        Ok(())
    }

    /// Reads the first signature component and writes the second across all
    /// matching chunks in parallel.
    pub fn par_for_each2<A, B, F>(&self, registry: &mut ArchetypeRegistry, f: F) -> ECSResult<()>
    where
        A: Component,
        B: Component,
        F: Fn(EntityID, &A, &mut B) + Send + Sync,
    {
        let ids = self.signature.first::<2>()?;
        let mut jobs: Vec<(&[EntityID], &[A], &mut [B])> = Vec::new();

        for archetype in registry.iter_mut() {
            if archetype.is_empty() || !self.matches(archetype) {
                continue;
            }
            let count = archetype.entity_count();
            let (entities, [a, b]) = archetype
                .entities_and_columns_mut(ids)
                .ok_or(ECSError::Internal(MISSING_COLUMN))?;
            let a = a.typed::<A>()?;
            let b = b.typed_mut::<B>()?;
            let chunks = entities
                .chunks(CHUNK_SIZE)
                .zip(a.chunks_for(count))
                .zip(b.chunks_for_mut(count));
            jobs.extend(chunks.map(|((entities, a), b)| (entities, a, b)));
        }

        jobs.into_par_iter().for_each(|(entities, a, b)| {
            for ((&entity, a), b) in entities.iter().zip(a).zip(b) {
                f(entity, a, b);
            }
        });
        Ok(())
    }

    /// Calls `f` with a snapshot of the first signature component for every
    /// matching entity, passing mutable access to `world`.
    ///
    /// The matching archetypes and their entity ids are fixed before `f` first
    /// runs for each archetype. Rows are then re-resolved through
    /// [`LocateEntity`] one [`CHUNK_SIZE`] batch at a time, so `f` may spawn,
    /// despawn or migrate entities without shifting later entities out of the
    /// walk. Entities that left the archetype before their turn are skipped.

    pub fn for_each_copied<W, A, F>(&self, world: &mut W, mut f: F) -> ECSResult<()>
    where
        W: LocateEntity,
        A: Component,
        F: FnMut(&mut W, EntityID, &A),
    {
        let [a] = self.signature.first::<1>()?;
        let mut pending: Vec<EntityID> = Vec::new();
        let mut snapshot: Vec<(EntityID, A)> = Vec::with_capacity(CHUNK_SIZE);

        for archetype_id in self.matching_ids(world.as_ref()) {
            snapshot_entities(world.as_ref(), archetype_id, &mut pending);
            for batch in pending.chunks(CHUNK_SIZE) {
                snapshot.clear();
                let archetype = archetype_of(world.as_ref(), archetype_id)?;
                let column = archetype.column_typed::<A>(a)?;
                for &entity in batch {
                    if let Some(row) = row_in(&*world, entity, archetype_id) {
                        snapshot.push((entity, column.read(row).clone()));
                    }
                }

                for (entity, value) in snapshot.drain(..) {
                    if row_in(&*world, entity, archetype_id).is_some() {
                        f(world, entity, &value);
                    }
                }
            }
        }
        Ok(())
    }

    /// Two-component counterpart of [`for_each_copied`](Self::for_each_copied).
    pub fn for_each_copied2<W, A, B, F>(&self, world: &mut W, mut f: F) -> ECSResult<()>
    where
        W: LocateEntity,
        A: Component,
        B: Component,
        F: FnMut(&mut W, EntityID, &A, &B),
    {
        let [a, b] = self.signature.first::<2>()?;
        let mut pending: Vec<EntityID> = Vec::new();
        let mut snapshot: Vec<(EntityID, A, B)> = Vec::with_capacity(CHUNK_SIZE);

        for archetype_id in self.matching_ids(world.as_ref()) {
            snapshot_entities(world.as_ref(), archetype_id, &mut pending);
            for batch in pending.chunks(CHUNK_SIZE) {
                snapshot.clear();
                let archetype = archetype_of(world.as_ref(), archetype_id)?;
                let column_a = archetype.column_typed::<A>(a)?;
                let column_b = archetype.column_typed::<B>(b)?;
                for &entity in batch {
                    if let Some(row) = row_in(&*world, entity, archetype_id) {
                        snapshot.push((
                            entity,
                            column_a.read(row).clone(),
                            column_b.read(row).clone(),
                        ));
                    }
                }

                for (entity, value_a, value_b) in snapshot.drain(..) {
                    if row_in(&*world, entity, archetype_id).is_some() {
                        f(world, entity, &value_a, &value_b);
                    }
                }
            }
        }
        Ok(())
    }

    fn matching_ids(&self, registry: &ArchetypeRegistry) -> Vec<ArchetypeID> {
        self.matching(registry).map(Archetype::id).collect()
    }
}

const MISSING_COLUMN: &str = "matched archetype lacks a signature column";

/// A world that can report where each of its entities is stored.
///
/// Copied iteration needs this to find an entity's current row after the
/// body has moved rows around.
pub trait LocateEntity: AsRef<ArchetypeRegistry> {
    /// Returns the location of a live entity.
    fn locate(&self, entity: EntityID) -> Option<EntityLocation>;
}

fn snapshot_entities(
    registry: &ArchetypeRegistry,
    archetype_id: ArchetypeID,
    out: &mut Vec<EntityID>,
) {
    out.clear();
    if let Some(archetype) = registry.archetype(archetype_id) {
        out.extend_from_slice(archetype.entities());
    }
}

fn archetype_of(
    registry: &ArchetypeRegistry,
    archetype_id: ArchetypeID,
) -> ECSResult<&Archetype> {
    registry
        .archetype(archetype_id)
        .ok_or(ECSError::Internal("matched archetype disappeared during iteration"))
}

#[inline]
fn row_in<W: LocateEntity>(
    world: &W,
    entity: EntityID,
    archetype_id: ArchetypeID,
) -> Option<RowID> {
    world
        .locate(entity)
        .filter(|location| location.archetype == archetype_id)
        .map(|location| location.row)
}

/// Zero-copy view of up to [`CHUNK_SIZE`] consecutive rows of one archetype.
#[derive(Clone, Copy)]
pub struct QueryChunk<'a> {
    archetype: &'a Archetype,
    start: RowID,
    end: RowID,
    columns: [Option<&'a dyn TypeErasedColumn>; MAX_QUERY_COMPONENTS],
}

impl<'a> QueryChunk<'a> {
    /// Archetype the rows belong to.
    #[inline]
    pub fn archetype(&self) -> &'a Archetype { self.archetype }

    /// Row range covered by this chunk.
    #[inline]
    pub fn rows(&self) -> Range<RowID> { self.start..self.end }

    /// Number of rows in the chunk.
    #[inline]
    pub fn len(&self) -> usize { self.end - self.start }

    /// Always `false`; empty archetypes produce no chunks.
    #[inline]
    pub fn is_empty(&self) -> bool { self.end == self.start }

    /// Entity ids of the rows.
    #[inline]
    pub fn entities(&self) -> &'a [EntityID] {
        &self.archetype.entities()[self.start..self.end]
    }

    /// Values of the signature component at position `slot`.
    ///
    /// ## Errors
    /// [`QueryError::ArityMismatch`] if `slot` is past the signature, or a
    /// [`ColumnError::TypeMismatch`](crate::engine::error::ColumnError) if `T`
    /// is not the stored type.

    pub fn column<T: Component>(&self, slot: usize) -> ECSResult<&'a [T]> {
        let column = self
            .columns
            .get(slot)
            .copied()
            .flatten()
            .ok_or(QueryError::ArityMismatch {
                needed: slot + 1,
                available: self.columns.iter().flatten().count(),
            })?;
        let (chunk, _) = chunk_position(self.start);
        Ok(column.typed::<T>()?.chunk(chunk, self.len()))
    }

    /// Values of any component the archetype stores, looked up by id.
    pub fn column_of<T: Component>(&self, component_id: ComponentID) -> ECSResult<&'a [T]> {
        let (chunk, _) = chunk_position(self.start);
        Ok(self.archetype.column_typed::<T>(component_id)?.chunk(chunk, self.len()))
    }
}

/// Iterator over the chunks of every archetype matching a [`Query`].
pub struct QueryIter<'a> {
    query: &'a Query,
    archetypes: std::slice::Iter<'a, Archetype>,
    current: Option<&'a Archetype>,
    columns: [Option<&'a dyn TypeErasedColumn>; MAX_QUERY_COMPONENTS],
    next_row: RowID,
}

impl<'a> Iterator for QueryIter<'a> {
    type Item = QueryChunk<'a>;

    fn next(&mut self) -> Option<QueryChunk<'a>> {
        loop {
            if let Some(archetype) = self.current {
                let count = archetype.entity_count();
                if self.next_row < count {
                    let start = self.next_row;
                    let end = (start + CHUNK_SIZE).min(count);
                    self.next_row = end;
                    return Some(QueryChunk { archetype, start, end, columns: self.columns });
                }
            }

            let query = self.query;
            let archetype = self.archetypes.find(|archetype| query.matches(archetype))?;
            let mut columns = [None; MAX_QUERY_COMPONENTS];
            for (slot, &id) in query.signature.ids().iter().enumerate() {
                columns[slot] = archetype.column(id);
            }
            self.columns = columns;
            self.current = Some(archetype);
            self.next_row = 0;
        }
    }
}

/// Builds a [`Query`] from Rust types resolved through a [`TypeRegistry`].
///
/// Resolution errors are deferred to [`build`](Self::build).
///
/// ## Example
/// ```ignore
/// let query = QueryBuilder::new(registry.types())
///     .with::<Position>()
///     .with::<Velocity>()
///     .without_tag::<Frozen>()
///     .build()?;
/// ```

pub struct QueryBuilder<'r> {
    types: &'r TypeRegistry,
    ids: Vec<ComponentID>,
    with_tags: Mask,
    without_tags: Mask,
    without: Mask,
    error: Option<ECSError>,
}

impl<'r> QueryBuilder<'r> {
    /// Creates an empty builder.
    pub fn new(types: &'r TypeRegistry) -> Self {
        Self {
            types,
            ids: Vec::new(),
            with_tags: Mask::EMPTY,
            without_tags: Mask::EMPTY,
            without: Mask::EMPTY,
            error: None,
        }
    }

    fn record<T>(&mut self, resolved: ECSResult<T>) -> Option<T> {
        match resolved {
            Ok(value) => Some(value),
            Err(e) => {
                self.error.get_or_insert(e);
                None
            }
        }
    }

    /// Appends component `T` to the signature.
    pub fn with<T: Component>(mut self) -> Self {
        let resolved = self.types.component_id_of::<T>();
        if let Some(id) = self.record(resolved) {
            self.ids.push(id);
        }
        self
    }

    /// Excludes archetypes storing component `T`.
    pub fn without<T: Component>(mut self) -> Self {
        let resolved = self.types.component_id_of::<T>();
        if let Some(id) = self.record(resolved) {
            self.without.set(id);
        }
        self
    }

    /// Requires tag `T`.
    pub fn with_tag<T: Tag>(mut self) -> Self {
        let resolved = self.types.tag_id_of::<T>();
        if let Some(id) = self.record(resolved) {
            self.with_tags.set(id);
        }
        self
    }

    /// Excludes archetypes carrying tag `T`.
    pub fn without_tag<T: Tag>(mut self) -> Self {
        let resolved = self.types.tag_id_of::<T>();
        if let Some(id) = self.record(resolved) {
            self.without_tags.set(id);
        }
        self
    }

    /// Finishes the query.
    ///
    /// ## Errors
    /// The first type-resolution error, or any [`Signature::new`] error.

    pub fn build(self) -> ECSResult<Query> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok(Query::new(&self.ids)?
            .with_tags(self.with_tags)
            .without_tags(self.without_tags)
            .without(self.without))
    }
}
