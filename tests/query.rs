use std::collections::HashSet;

use archetype_store::engine::component::TypeRegistry;
use archetype_store::engine::error::{ECSError, QueryError, RegistryError};
use archetype_store::engine::manager::EntityStore;
use archetype_store::engine::mask::Mask;
use archetype_store::engine::query::{Query, QueryBuilder, Signature};
use archetype_store::engine::registry::ArchetypeRegistry;
use archetype_store::engine::types::{ArchetypeID, ComponentID, EntityID, CHUNK_SIZE};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct A(u64);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct B(u64);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct C(u64);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Unregistered;

struct Sleeping;

struct Ids {
    a: ComponentID,
    b: ComponentID,
    c: ComponentID,
}

fn types() -> (TypeRegistry, Ids) {
    let mut types = TypeRegistry::new();
    let ids = Ids {
        a: types.register_component::<A>().unwrap(),
        b: types.register_component::<B>().unwrap(),
        c: types.register_component::<C>().unwrap(),
    };
    types.register_tag::<Sleeping>().unwrap();
    (types, ids)
}

/// Fills an archetype with `count` rows; entity ids start at `first`.
fn populate(
    registry: &mut ArchetypeRegistry,
    components: &[ComponentID],
    first: EntityID,
    count: u32,
    ids: &Ids,
) -> ArchetypeID {
    let archetype_id = registry.get_or_create(Mask::from_ids(components), Mask::EMPTY).unwrap();
    let archetype = registry.archetype_mut(archetype_id).unwrap();
    for entity in first..first + count {
        let row = archetype.add_row(entity);
        if archetype.has_component(ids.a) {
            archetype.write(ids.a, row, A(entity as u64)).unwrap();
        }
        if archetype.has_component(ids.b) {
            archetype.write(ids.b, row, B(0)).unwrap();
        }
    }
    archetype_id
}

#[test]
fn signature_validation() {
    assert_eq!(Signature::new(&[]).unwrap_err(), QueryError::EmptySignature);
    assert_eq!(Signature::new(&[0, 1]).unwrap_err(), QueryError::ReservedComponentId);
    assert_eq!(
        Signature::new(&[1, 300]).unwrap_err(),
        QueryError::ComponentIdOutOfRange { id: 300, max: 255 }
    );
    assert_eq!(
        Signature::new(&[256]).unwrap_err(),
        QueryError::ComponentIdOutOfRange { id: 256, max: 255 }
    );
    assert!(Signature::new(&[255]).is_ok());
    assert_eq!(
        Query::new(&[300]).unwrap_err(),
        ECSError::Query(QueryError::ComponentIdOutOfRange { id: 300, max: 255 })
    );
    assert_eq!(
        Signature::new(&[1, 2, 1]).unwrap_err(),
        QueryError::DuplicateComponent { id: 1 }
    );
    assert_eq!(
        Signature::new(&[1, 2, 3, 4, 5, 6, 7, 8, 9]).unwrap_err(),
        QueryError::TooManyComponents { count: 9, max: 8 }
    );

    let signature = Signature::new(&[3, 1]).unwrap();
    assert_eq!(signature.ids(), &[3, 1]);
    assert_eq!(signature.len(), 2);
    assert_eq!(signature.mask(), &Mask::from_ids(&[1, 3]));
}

#[test]
fn matching_uses_mask_containment() {
    let (types, ids) = types();
    let mut registry = ArchetypeRegistry::new(types);
    let abc = registry.get_or_create(Mask::from_ids(&[ids.a, ids.b, ids.c]), Mask::EMPTY).unwrap();
    let ab = registry.get_or_create(Mask::from_ids(&[ids.a, ids.b]), Mask::EMPTY).unwrap();
    let ac = registry.get_or_create(Mask::from_ids(&[ids.a, ids.c]), Mask::EMPTY).unwrap();

    let matched = |query: &Query| -> Vec<ArchetypeID> {
        query.matching(&registry).map(|archetype| archetype.id()).collect()
    };

    assert_eq!(matched(&Query::new(&[ids.a, ids.b, ids.c]).unwrap()), vec![abc]);
    assert_eq!(matched(&Query::new(&[ids.a, ids.b]).unwrap()), vec![abc, ab]);
    assert_eq!(matched(&Query::new(&[ids.c, ids.a]).unwrap()), vec![abc, ac]);
    assert_eq!(matched(&Query::new(&[ids.a]).unwrap()), vec![abc, ab, ac]);

    let without_c = Query::new(&[ids.a]).unwrap().without(Mask::from_ids(&[ids.c]));
    assert_eq!(matched(&without_c), vec![ab]);
}

#[test]
fn tag_filters() {
    let (types, ids) = types();
    let mut registry = ArchetypeRegistry::new(types);
    let sleeping = registry.types().tag_id_of::<Sleeping>().unwrap();
    let awake = registry.get_or_create(Mask::from_ids(&[ids.a]), Mask::EMPTY).unwrap();
    let asleep = registry
        .get_or_create(Mask::from_ids(&[ids.a]), Mask::from_ids(&[sleeping]))
        .unwrap();

    let all = Query::new(&[ids.a]).unwrap();
    let only_sleeping = all.with_tags(Mask::from_ids(&[sleeping]));
    let not_sleeping = all.without_tags(Mask::from_ids(&[sleeping]));

    let ids_of = |query: &Query| -> Vec<ArchetypeID> {
        query.matching(&registry).map(|archetype| archetype.id()).collect()
    };
    assert_eq!(ids_of(&all), vec![awake, asleep]);
    assert_eq!(ids_of(&only_sleeping), vec![asleep]);
    assert_eq!(ids_of(&not_sleeping), vec![awake]);
}

#[test]
fn iteration_visits_every_row_once_in_creation_order() {
    let (types, ids) = types();
    let mut registry = ArchetypeRegistry::new(types);
    let abc = populate(&mut registry, &[ids.a, ids.b, ids.c], 0, 10, &ids);
    let ab = populate(&mut registry, &[ids.a, ids.b], 1000, 600, &ids);
    populate(&mut registry, &[ids.a, ids.c], 5000, 50, &ids);

    let query = Query::new(&[ids.a, ids.b]).unwrap();
    let chunks: Vec<(ArchetypeID, usize)> =
        query.iter(&registry).map(|chunk| (chunk.archetype().id(), chunk.len())).collect();
    assert_eq!(chunks, vec![(abc, 10), (ab, CHUNK_SIZE), (ab, 600 - CHUNK_SIZE)]);

    let mut seen = HashSet::new();
    for chunk in query.iter(&registry) {
        let a = chunk.column::<A>(0).unwrap();
        let b = chunk.column::<B>(1).unwrap();
        assert_eq!(a.len(), chunk.len());
        assert_eq!(b.len(), chunk.len());
        for (&entity, value) in chunk.entities().iter().zip(a) {
            assert_eq!(value, &A(entity as u64));
            assert!(seen.insert(entity), "entity {entity} visited twice");
        }
    }
    assert_eq!(seen.len(), 610);
    assert_eq!(query.entity_count(&registry), 610);
}

#[test]
fn chunk_columns_check_types_and_arity() {
    let (types, ids) = types();
    let mut registry = ArchetypeRegistry::new(types);
    populate(&mut registry, &[ids.a, ids.b], 0, 3, &ids);

    let query = Query::new(&[ids.a]).unwrap();
    let chunk = query.iter(&registry).next().unwrap();
    assert!(matches!(chunk.column::<B>(0), Err(ECSError::Column(_))));
    assert!(matches!(
        chunk.column::<A>(1),
        Err(ECSError::Query(QueryError::ArityMismatch { needed: 2, available: 1 }))
    ));
    assert_eq!(chunk.column_of::<B>(ids.b).unwrap(), &[B(0); 3]);
}

#[test]
fn typed_for_each_writes_through() {
    let (types, ids) = types();
    let mut registry = ArchetypeRegistry::new(types);
    populate(&mut registry, &[ids.a, ids.b, ids.c], 0, 700, &ids);
    populate(&mut registry, &[ids.a, ids.b], 700, 5, &ids);

    let query = Query::new(&[ids.a, ids.b]).unwrap();
    let mut visits = 0;
    query
        .for_each2::<A, B, _>(&mut registry, |entity, a, b| {
            assert_eq!(a.0, entity as u64);
            b.0 = a.0 * 2;
            visits += 1;
        })
        .unwrap();
    assert_eq!(visits, 705);

    let mut total = 0;
    Query::new(&[ids.b])
        .unwrap()
        .for_each::<B, _>(&mut registry, |_, b| total += b.0)
        .unwrap();
    assert_eq!(total, (0..705u64).map(|v| v * 2).sum::<u64>());

    let triple = Query::new(&[ids.a, ids.b, ids.c]).unwrap();
    let mut triples = 0;
    triple
        .for_each3::<A, B, C, _>(&mut registry, |_, a, b, c| {
            c.0 = a.0 + b.0;
            triples += 1;
        })
        .unwrap();
    assert_eq!(triples, 700);
}

#[test]
fn typed_adapters_check_arity() {
    let (types, ids) = types();
    let mut registry = ArchetypeRegistry::new(types);
    populate(&mut registry, &[ids.a], 0, 1, &ids);

    let err = Query::new(&[ids.a])
        .unwrap()
        .for_each2::<A, B, _>(&mut registry, |_, _, _| {})
        .unwrap_err();
    assert_eq!(err, ECSError::Query(QueryError::ArityMismatch { needed: 2, available: 1 }));
}

#[test]
fn par_for_each2_covers_every_chunk() {
    let (types, ids) = types();
    let mut registry = ArchetypeRegistry::new(types);
    populate(&mut registry, &[ids.a, ids.b], 0, 1500, &ids);
    populate(&mut registry, &[ids.a, ids.b, ids.c], 1500, 100, &ids);

    let query = Query::new(&[ids.a, ids.b]).unwrap();
    query
        .par_for_each2::<A, B, _>(&mut registry, |entity, a, b| {
            b.0 = a.0 + entity as u64;
        })
        .unwrap();

    let mut checked = 0;
    for chunk in query.iter(&registry) {
        let b = chunk.column::<B>(1).unwrap();
        for (&entity, b) in chunk.entities().iter().zip(b) {
            assert_eq!(b.0, 2 * entity as u64);
            checked += 1;
        }
    }
    assert_eq!(checked, 1600);
}

#[test]
fn builder_resolves_types() {
    let (types, ids) = types();
    let mut store = EntityStore::new(types);
    let awake = store.spawn_with(A(1)).unwrap();
    let asleep = store.spawn_with(A(2)).unwrap();
    store.add_tag::<Sleeping>(asleep).unwrap();
    let with_b = store.spawn_with(A(3)).unwrap();
    store.add_component(with_b, B(0)).unwrap();

    let query = store.query().with::<A>().without_tag::<Sleeping>().without::<B>().build().unwrap();
    assert_eq!(query.signature().ids(), &[ids.a]);

    let mut seen = Vec::new();
    query.for_each::<A, _>(store.registry_mut(), |entity, _| seen.push(entity)).unwrap();
    assert_eq!(seen, vec![awake]);

    let query = QueryBuilder::new(store.types()).with::<A>().with_tag::<Sleeping>().build().unwrap();
    assert_eq!(query.entity_count(store.registry()), 1);

    let err = store.query().with::<A>().with::<Unregistered>().build().unwrap_err();
    assert!(matches!(err, ECSError::Registry(RegistryError::ComponentNotRegistered { .. })));

    let err = store.query().build().unwrap_err();
    assert_eq!(err, ECSError::Query(QueryError::EmptySignature));
}

#[test]
fn copied_iteration_allows_structural_changes() {
    let (types, _) = types();
    let mut store = EntityStore::new(types);
    let spawned: Vec<EntityID> = (0..5).map(|i| store.spawn_with(A(i)).unwrap()).collect();

    let query = store.query().with::<A>().build().unwrap();
    let mut visited = Vec::new();
    query
        .for_each_copied::<_, A, _>(&mut store, |store, entity, a| {
            visited.push(entity);
            if a.0 % 2 == 0 {
                store.add_component(entity, B(a.0)).unwrap();
            }
        })
        .unwrap();

    visited.sort_unstable();
    assert_eq!(visited, spawned);
    for (i, &entity) in spawned.iter().enumerate() {
        assert_eq!(store.has_component::<B>(entity).unwrap(), i % 2 == 0);
        assert_eq!(store.get::<A>(entity).unwrap(), &A(i as u64));
    }
}

#[test]
fn copied_iteration_sees_snapshot_values() {
    let (types, _) = types();
    let mut store = EntityStore::new(types);
    for i in 0..3 {
        let entity = store.spawn_with(A(i)).unwrap();
        store.add_component(entity, B(i * 10)).unwrap();
    }

    let query = store.query().with::<A>().with::<B>().build().unwrap();
    let mut pairs = Vec::new();
    query
        .for_each_copied2::<_, A, B, _>(&mut store, |store, entity, a, b| {
            pairs.push((a.0, b.0));
            store.despawn(entity).unwrap();
        })
        .unwrap();

    pairs.sort_unstable();
    assert_eq!(pairs, vec![(0, 0), (1, 10), (2, 20)]);
    assert!(store.is_empty());
}

#[test]
fn copied_iteration_despawning_every_entity_spans_chunks() {
    let (types, _) = types();
    let mut store = EntityStore::new(types);
    let spawned: Vec<EntityID> = (0..1000).map(|i| store.spawn_with(A(i)).unwrap()).collect();
    assert!(store.archetype_of(spawned[0]).unwrap().chunk_count() > 1);

    let query = store.query().with::<A>().build().unwrap();
    let mut visited = Vec::new();
    query
        .for_each_copied::<_, A, _>(&mut store, |store, entity, a| {
            assert_eq!(a.0, entity as u64);
            visited.push(entity);
            store.despawn(entity).unwrap();
        })
        .unwrap();

    visited.sort_unstable();
    assert_eq!(visited, spawned);
    assert!(store.is_empty());
}

#[test]
fn copied_iteration_migrating_every_entity_spans_chunks() {
    let (types, _) = types();
    let mut store = EntityStore::new(types);
    let spawned: Vec<EntityID> =
        (0..3 * CHUNK_SIZE as u64 + 7).map(|i| store.spawn_with(A(i)).unwrap()).collect();

    let query = store.query().with::<A>().build().unwrap();
    let mut visited = Vec::new();
    query
        .for_each_copied::<_, A, _>(&mut store, |store, entity, a| {
            visited.push(entity);
            store.add_component(entity, B(a.0 * 2)).unwrap();
        })
        .unwrap();

    visited.sort_unstable();
    assert_eq!(visited, spawned);
    for &entity in &spawned {
        let a = store.get::<A>(entity).unwrap().0;
        assert_eq!(store.get::<B>(entity).unwrap(), &B(a * 2));
    }
}

#[test]
fn copied_iteration_skips_entities_removed_before_their_turn() {
    let (types, _) = types();
    let mut store = EntityStore::new(types);
    let spawned: Vec<EntityID> = (0..1200).map(|i| store.spawn_with(A(i)).unwrap()).collect();

    let query = store.query().with::<A>().build().unwrap();
    let mut visited = HashSet::new();
    query
        .for_each_copied::<_, A, _>(&mut store, |store, entity, _| {
            assert!(visited.insert(entity));
            // Each even entity also takes its odd partner with it.
            if entity % 2 == 0 {
                let partner = entity + 1;
                if store.contains(partner) {
                    store.despawn(partner).unwrap();
                }
            }
        })
        .unwrap();

    for &entity in &spawned {
        assert_eq!(visited.contains(&entity), entity % 2 == 0);
        assert_eq!(store.contains(entity), entity % 2 == 0);
    }
    assert_eq!(store.len(), 600);
}

#[test]
fn copied_pairs_survive_despawns_across_chunks() {
    let (types, _) = types();
    let mut store = EntityStore::new(types);
    for i in 0..1100 {
        let entity = store.spawn_with(A(i)).unwrap();
        store.add_component(entity, B(i + 1)).unwrap();
    }

    let query = store.query().with::<A>().with::<B>().build().unwrap();
    let mut sum = 0;
    let mut calls = 0;
    query
        .for_each_copied2::<_, A, B, _>(&mut store, |store, entity, a, b| {
            assert_eq!(b.0, a.0 + 1);
            sum += a.0;
            calls += 1;
            store.despawn(entity).unwrap();
        })
        .unwrap();

    assert_eq!(calls, 1100);
    assert_eq!(sum, (0..1100).sum::<u64>());
    assert!(store.is_empty());
}
