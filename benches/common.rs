#![allow(dead_code)]

use archetype_store::engine::component::TypeRegistry;
use archetype_store::engine::error::ECSResult;
use archetype_store::engine::manager::EntityStore;

pub const AGENTS_SMALL: usize = 10_000;
pub const AGENTS_MED: usize = 100_000;
pub const AGENTS_LARGE: usize = 1_000_000;

#[derive(Clone, Copy, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Clone, Copy, Default)]
pub struct Wealth {
    pub value: f32,
}

#[derive(Clone, Copy, Default)]
pub struct Productivity {
    pub rate: f32,
}

pub struct Employed;

pub fn make_types() -> TypeRegistry {
    let mut types = TypeRegistry::new();
    types.register_component::<Position>().expect("register Position");
    types.register_component::<Wealth>().expect("register Wealth");
    types.register_component::<Productivity>().expect("register Productivity");
    types.register_tag::<Employed>().expect("register Employed");
    types
}

pub fn setup_store(agent_count: usize) -> ECSResult<EntityStore> {
    let mut store = EntityStore::with_capacity(make_types(), agent_count);
    for i in 0..agent_count {
        let entity = store.spawn_with(Position { x: i as f32, y: 0.0 })?;
        store.add_component(entity, Wealth { value: 100.0 })?;
        store.add_component(entity, Productivity { rate: 1.0 })?;
    }
    Ok(store)
}
