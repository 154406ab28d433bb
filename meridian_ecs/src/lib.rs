use glam::{Mat4, Quat, Vec3};
use hecs::{
    Component, ComponentError, DynamicBundle, NoSuchEntity, Query, QueryBorrow,
    World as HecsWorld,
};

pub use hecs::Entity;

/// Entity storage for instantiated scenes.
pub struct World {
    world: HecsWorld,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Name(pub String);

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LocalTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl LocalTransform {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for LocalTransform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Parent(pub Entity);

#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Children(pub Vec<Entity>);

impl World {
    pub fn new() -> Self {
        Self {
            world: HecsWorld::new(),
        }
    }

    pub fn get(&self) -> &HecsWorld {
        &self.world
    }

    pub fn get_mut(&mut self) -> &mut HecsWorld {
        &mut self.world
    }

    pub fn query<Q: Query>(&self) -> QueryBorrow<'_, Q> {
        self.world.query::<Q>()
    }

    pub fn insert_one(
        &mut self,
        entity: Entity,
        component: impl Component,
    ) -> Result<(), NoSuchEntity> {
        self.world.insert_one(entity, component)
    }

    pub fn spawn(&mut self, components: impl DynamicBundle) -> Entity {
        self.world.spawn(components)
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.world.contains(entity)
    }

    pub fn len(&self) -> u32 {
        self.world.len()
    }

    pub fn is_empty(&self) -> bool {
        self.world.is_empty()
    }

    /// Links `child` under `parent`, appending it to the parent's children.
    pub fn attach_child(&mut self, parent: Entity, child: Entity) -> Result<(), NoSuchEntity> {
        if !self.world.contains(parent) {
            return Err(NoSuchEntity);
        }
        self.world.insert_one(child, Parent(parent))?;

        match self.world.get::<&mut Children>(parent) {
            Ok(mut children) => {
                children.0.push(child);
                return Ok(());
            }
            Err(ComponentError::NoSuchEntity) => return Err(NoSuchEntity),
            Err(ComponentError::MissingComponent(_)) => {}
        }
        self.world.insert_one(parent, Children(vec![child]))
    }

    pub fn children(&self, entity: Entity) -> Vec<Entity> {
        self.world
            .get::<&Children>(entity)
            .map(|children| children.0.clone())
            .unwrap_or_default()
    }

    /// World matrix of `entity`, composed from the local transforms up the
    /// parent chain.
    pub fn world_matrix(&self, entity: Entity) -> Mat4 {
        let mut matrix = Mat4::IDENTITY;
        let mut current = Some(entity);
        while let Some(entity) = current {
            if let Ok(local) = self.world.get::<&LocalTransform>(entity) {
                matrix = local.matrix() * matrix;
            }
            current = self.world.get::<&Parent>(entity).ok().map(|parent| parent.0);
        }
        matrix
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
