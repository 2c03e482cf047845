#![allow(dead_code)]

use std::sync::Arc;

use composition_runtime::{
    CapabilityFactory, Component, ComponentBase, Entity, EntityManager, FactoryRegistry,
};

pub const ENTITIES_SMALL: usize = 1_000;
pub const ENTITIES_MED: usize = 10_000;
pub const READS: usize = 100_000;

/// Capability read on the hot path.
pub trait Position: Component {
    fn x(&self) -> f32;
}

pub struct Point {
    base: ComponentBase,
    x: f32,
}

impl Point {
    pub fn new(x: f32) -> Self { Self { base: ComponentBase::new("Point"), x } }
}

impl Position for Point {
    fn x(&self) -> f32 { self.x }
}

impl Component for Point {
    fn base(&self) -> &ComponentBase { &self.base }
}

macro_rules! marker {
    ($name:ident) => {
        pub struct $name {
            base: ComponentBase,
        }

        impl $name {
            pub fn new() -> Self { Self { base: ComponentBase::named_after::<Self>() } }
        }

        impl Component for $name {
            fn base(&self) -> &ComponentBase { &self.base }
        }
    };
}

marker!(Health);
marker!(Wealth);
marker!(Productivity);

pub fn registry() -> Arc<FactoryRegistry> {
    let registry = Arc::new(FactoryRegistry::new());
    registry
        .register::<dyn Position, _>(|| Arc::new(Point::new(1.0)) as Arc<dyn Position>)
        .expect("register Position");
    registry.register::<Health, _>(|| Arc::new(Health::new())).expect("register Health");
    registry.register::<Wealth, _>(|| Arc::new(Wealth::new())).expect("register Wealth");
    registry
        .register::<Productivity, _>(|| Arc::new(Productivity::new()))
        .expect("register Productivity");
    registry.freeze();
    registry
}

pub fn manager() -> EntityManager {
    EntityManager::new(registry() as Arc<dyn CapabilityFactory>)
}

pub fn populated_entity(manager: &EntityManager, id: &str) -> Entity {
    let entity = manager.create_entity(id).expect("unique bench id");
    entity.add_component::<dyn Position>().expect("construct Position");
    entity.add_component::<Health>().expect("construct Health");
    entity.add_component::<Wealth>().expect("construct Wealth");
    entity.add_component::<Productivity>().expect("construct Productivity");
    entity.init_components();
    entity
}
