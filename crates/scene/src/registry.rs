//! Entity registry read by render subpasses.
//!
//! Components live in `BTreeMap`s keyed by [`Entity`], so iteration order is
//! deterministic and independent of insertion order. Subpasses only borrow
//! the registry immutably; gameplay code mutates it between frames.

use std::collections::{BTreeMap, BTreeSet};

use thiserror::Error;
use tracing::trace;

use crate::transform::Transform;

/// Opaque entity identifier. Ids are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Entity(u64);

impl Entity {
    #[inline]
    pub fn id(self) -> u64 {
        self.0
    }
}

/// Handle to a mesh uploaded to the renderer's mesh library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MeshId(pub u32);

/// Marks an entity as drawable with the given mesh.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MeshRenderer {
    pub mesh: MeshId,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SceneError {
    #[error("entity {0:?} does not exist")]
    UnknownEntity(Entity),
}

#[derive(Debug, Default)]
pub struct Registry {
    next_id: u64,
    entities: BTreeSet<Entity>,
    transforms: BTreeMap<Entity, Transform>,
    mesh_renderers: BTreeMap<Entity, MeshRenderer>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&mut self) -> Entity {
        let entity = Entity(self.next_id);
        self.next_id += 1;
        self.entities.insert(entity);
        trace!("Spawned {:?}", entity);
        entity
    }

    /// Remove `entity` and all its components. Returns whether it existed.
    pub fn despawn(&mut self, entity: Entity) -> bool {
        let existed = self.entities.remove(&entity);
        self.transforms.remove(&entity);
        self.mesh_renderers.remove(&entity);
        existed
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.entities.contains(&entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn insert_transform(&mut self, entity: Entity, transform: Transform) -> Result<(), SceneError> {
        self.check(entity)?;
        self.transforms.insert(entity, transform);
        Ok(())
    }

    pub fn insert_mesh_renderer(
        &mut self,
        entity: Entity,
        renderer: MeshRenderer,
    ) -> Result<(), SceneError> {
        self.check(entity)?;
        self.mesh_renderers.insert(entity, renderer);
        Ok(())
    }

    pub fn transform(&self, entity: Entity) -> Option<&Transform> {
        self.transforms.get(&entity)
    }

    pub fn transform_mut(&mut self, entity: Entity) -> Option<&mut Transform> {
        self.transforms.get_mut(&entity)
    }

    pub fn mesh_renderer(&self, entity: Entity) -> Option<&MeshRenderer> {
        self.mesh_renderers.get(&entity)
    }

    /// Mutable access to every transform, in entity order.
    pub fn transforms_mut(&mut self) -> impl Iterator<Item = (Entity, &mut Transform)> {
        self.transforms.iter_mut().map(|(&entity, t)| (entity, t))
    }

    /// Entities carrying both a transform and a mesh renderer, in entity order.
    pub fn renderables(&self) -> impl Iterator<Item = (Entity, &Transform, &MeshRenderer)> {
        self.mesh_renderers.iter().filter_map(|(&entity, renderer)| {
            self.transforms
                .get(&entity)
                .map(|transform| (entity, transform, renderer))
        })
    }

    fn check(&self, entity: Entity) -> Result<(), SceneError> {
        if self.entities.contains(&entity) {
            Ok(())
        } else {
            Err(SceneError::UnknownEntity(entity))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_spawn_assigns_unique_ids() {
        let mut registry = Registry::new();
        let a = registry.spawn();
        let b = registry.spawn();
        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_ids_not_reused_after_despawn() {
        let mut registry = Registry::new();
        let a = registry.spawn();
        assert!(registry.despawn(a));
        assert!(!registry.despawn(a));
        let b = registry.spawn();
        assert_ne!(a, b);
        assert!(!registry.is_empty());
    }

    #[test]
    fn test_components_on_dead_entity_rejected() {
        let mut registry = Registry::new();
        let a = registry.spawn();
        registry.despawn(a);
        assert_eq!(
            registry.insert_transform(a, Transform::default()),
            Err(SceneError::UnknownEntity(a))
        );
    }

    #[test]
    fn test_renderables_require_both_components() {
        let mut registry = Registry::new();
        let drawn = registry.spawn();
        let no_mesh = registry.spawn();
        let no_transform = registry.spawn();

        registry.insert_transform(drawn, Transform::default()).unwrap();
        registry
            .insert_mesh_renderer(drawn, MeshRenderer { mesh: MeshId(0) })
            .unwrap();
        registry.insert_transform(no_mesh, Transform::default()).unwrap();
        registry
            .insert_mesh_renderer(no_transform, MeshRenderer { mesh: MeshId(1) })
            .unwrap();

        let found: Vec<Entity> = registry.renderables().map(|(e, _, _)| e).collect();
        assert_eq!(found, vec![drawn]);
    }

    #[test]
    fn test_renderables_in_entity_order() {
        let mut registry = Registry::new();
        let entities: Vec<Entity> = (0..4).map(|_| registry.spawn()).collect();
        for &entity in entities.iter().rev() {
            registry
                .insert_mesh_renderer(entity, MeshRenderer { mesh: MeshId(0) })
                .unwrap();
            registry
                .insert_transform(entity, Transform::from_position(Vec3::X))
                .unwrap();
        }

        let found: Vec<Entity> = registry.renderables().map(|(e, _, _)| e).collect();
        assert_eq!(found, entities);
    }

    #[test]
    fn test_despawn_removes_components() {
        let mut registry = Registry::new();
        let a = registry.spawn();
        registry.insert_transform(a, Transform::default()).unwrap();
        registry.despawn(a);
        assert!(registry.transform(a).is_none());
    }
}
