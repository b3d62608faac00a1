use archetype_store::engine::error::ColumnError;
use archetype_store::engine::storage::{Column, TypeErasedColumn};
use archetype_store::engine::types::CHUNK_SIZE;

#[derive(Clone, Debug, Default, PartialEq)]
struct Name(String);

#[derive(Clone, Copy, Debug, Default, PartialEq)]
struct Mass(f64);

#[test]
fn create_rounds_up_to_whole_chunks() {
    let column = Column::<Mass>::create(0);
    assert_eq!(column.chunk_count(), 1);
    assert_eq!(column.capacity(), CHUNK_SIZE);

    let column = Column::<Mass>::create(CHUNK_SIZE + 1);
    assert_eq!(column.chunk_count(), 2);
    assert_eq!(column.capacity(), 2 * CHUNK_SIZE);
    assert!(column.chunk_array_len() >= column.chunk_count());
}

#[test]
fn slots_start_at_default() {
    let column = Column::<Name>::create(CHUNK_SIZE);
    assert_eq!(column.read(0), &Name::default());
    assert_eq!(column.read(CHUNK_SIZE - 1), &Name::default());
}

#[test]
fn read_write_across_chunk_boundary() {
    let mut column = Column::<Mass>::create(2 * CHUNK_SIZE);
    column.write(CHUNK_SIZE - 1, Mass(1.0));
    column.write(CHUNK_SIZE, Mass(2.0));
    column.read_mut(CHUNK_SIZE).0 += 0.5;

    assert_eq!(column.read(CHUNK_SIZE - 1), &Mass(1.0));
    assert_eq!(column.read(CHUNK_SIZE), &Mass(2.5));
    assert_eq!(column.chunk(1, 1), &[Mass(2.5)]);
}

#[test]
fn move_row_leaves_source_at_default() {
    let mut column = Column::<Name>::create(CHUNK_SIZE);
    column.write(7, Name("moved".into()));

    column.move_row(7, 2);

    assert_eq!(column.read(2), &Name("moved".into()));
    assert_eq!(column.read(7), &Name::default());
}

#[test]
fn reset_row_restores_default() {
    let mut column = Column::<Mass>::create(CHUNK_SIZE);
    column.write(3, Mass(9.0));
    column.reset_row(3);
    assert_eq!(column.read(3), &Mass::default());
}

#[test]
fn copy_row_to_clones_between_columns() {
    let mut source = Column::<Name>::create(CHUNK_SIZE);
    let mut target = Column::<Name>::create(CHUNK_SIZE);
    source.write(4, Name("copied".into()));

    source.copy_row_to(4, &mut target, 0).unwrap();

    assert_eq!(source.read(4), &Name("copied".into()));
    assert_eq!(target.read(0), &Name("copied".into()));
}

#[test]
fn copy_row_to_rejects_other_types() {
    let source = Column::<Name>::create(CHUNK_SIZE);
    let mut target = Column::<Mass>::create(CHUNK_SIZE);

    let err = source.copy_row_to(0, &mut target, 0).unwrap_err();
    assert!(matches!(err, ColumnError::TypeMismatch { .. }));
}

#[test]
fn typed_downcasts_through_trait_object() {
    let mut boxed: Box<dyn TypeErasedColumn> = Box::new(Column::<Mass>::create(CHUNK_SIZE));
    assert!(boxed.element_type_name().ends_with("Mass"));

    boxed.typed_mut::<Mass>().unwrap().write(1, Mass(3.0));
    assert_eq!(boxed.typed::<Mass>().unwrap().read(1), &Mass(3.0));
    assert_eq!(boxed.debug_read(1).downcast_ref::<Mass>(), Some(&Mass(3.0)));

    assert!(matches!(
        boxed.typed::<Name>(),
        Err(ColumnError::TypeMismatch { .. })
    ));
}

#[test]
fn set_chunk_capacity_keeps_existing_values() {
    let mut column = Column::<Mass>::create(CHUNK_SIZE);
    column.write(10, Mass(10.0));

    column.set_chunk_capacity(3, 1, 4, 1);
    assert_eq!(column.chunk_count(), 3);
    assert_eq!(column.chunk_array_len(), 4);
    assert_eq!(column.read(10), &Mass(10.0));
    assert_eq!(column.read(2 * CHUNK_SIZE + 5), &Mass::default());

    column.set_chunk_capacity(1, 3, 2, 4);
    assert_eq!(column.chunk_count(), 1);
    assert_eq!(column.chunk_array_len(), 2);
    assert_eq!(column.read(10), &Mass(10.0));
}

#[test]
fn chunks_for_yields_whole_chunks_then_remainder() {
    let mut column = Column::<Mass>::create(3 * CHUNK_SIZE);
    let len = 2 * CHUNK_SIZE + 10;

    for (i, chunk) in column.chunks_for_mut(len).enumerate() {
        for value in chunk.iter_mut() {
            value.0 = i as f64;
        }
    }

    let lengths: Vec<usize> = column.chunks_for(len).map(<[Mass]>::len).collect();
    assert_eq!(lengths, vec![CHUNK_SIZE, CHUNK_SIZE, 10]);
    assert_eq!(column.read(2 * CHUNK_SIZE + 9), &Mass(2.0));
    assert_eq!(column.read(2 * CHUNK_SIZE + 10), &Mass::default());

    assert_eq!(column.chunks_for(0).count(), 0);
    assert_eq!(column.chunks_for(CHUNK_SIZE).count(), 1);
}
