// SPDX-License-Identifier: CEPL-1.0
//! Flat scene of colored, transformed meshes.
//!
//! Objects live in a slot map, so ids are generational handles: a removed
//! object's id never aliases whatever later reuses its slot.

pub mod animation;
pub mod mesh;
mod push;

use prism_math::{srgb_to_linear, Transform2d, Vec2, Vec3};
use slotmap::{new_key_type, SlotMap};

pub use push::PushConstantData;

new_key_type! {
    pub struct ObjectId;
}

#[derive(Clone, Debug)]
pub struct SceneObject<M> {
    pub mesh: M,
    pub color: Vec3,
    pub transform: Transform2d,
}

impl<M> SceneObject<M> {
    pub fn new(mesh: M) -> Self {
        Self {
            mesh,
            color: Vec3::ZERO,
            transform: Transform2d::default(),
        }
    }
}

/// Entity table keyed by [`ObjectId`]. Iteration follows slot order.
#[derive(Debug)]
pub struct Scene<M> {
    objects: SlotMap<ObjectId, SceneObject<M>>,
}

impl<M> Default for Scene<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> Scene<M> {
    pub fn new() -> Self {
        Self {
            objects: SlotMap::with_key(),
        }
    }

    pub fn insert(&mut self, object: SceneObject<M>) -> ObjectId {
        self.objects.insert(object)
    }

    pub fn remove(&mut self, id: ObjectId) -> Option<SceneObject<M>> {
        self.objects.remove(id)
    }

    pub fn get(&self, id: ObjectId) -> Option<&SceneObject<M>> {
        self.objects.get(id)
    }

    pub fn get_mut(&mut self, id: ObjectId) -> Option<&mut SceneObject<M>> {
        self.objects.get_mut(id)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn objects_mut(&mut self) -> impl Iterator<Item = &mut SceneObject<M>> {
        self.objects.values_mut()
    }
}

/// Pastel palette of the spiral demo, in display (sRGB) space.
pub const SPIRAL_PALETTE: [[f32; 3]; 5] = [
    [1.0, 0.7, 0.73],
    [1.0, 0.87, 0.73],
    [1.0, 1.0, 0.73],
    [0.73, 1.0, 0.8],
    [0.73, 0.88, 1.0],
];

/// Adds `count` copies of `mesh`, each a little larger and further turned
/// than the previous one, cycling through [`SPIRAL_PALETTE`].
pub fn spawn_spiral<M: Clone>(scene: &mut Scene<M>, mesh: &M, count: usize) -> Vec<ObjectId> {
    let colors: Vec<Vec3> = SPIRAL_PALETTE
        .iter()
        .map(|&c| srgb_to_linear(Vec3::from(c)))
        .collect();

    (0..count)
        .map(|i| {
            let step = i as f32;
            let mut object = SceneObject::new(mesh.clone());
            object.transform.scale = Vec2::splat(0.5) + step * 0.025;
            object.transform.rotation = step * std::f32::consts::PI * 0.025;
            object.color = colors[i % colors.len()];
            scene.insert(object)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_ids_are_not_reused() {
        let mut scene = Scene::new();
        let a = scene.insert(SceneObject::new("tri"));
        let b = scene.insert(SceneObject::new("quad"));
        assert_eq!(scene.len(), 2);

        assert_eq!(scene.remove(a).map(|o| o.mesh), Some("tri"));
        let c = scene.insert(SceneObject::new("hex"));

        assert!(!scene.contains(a));
        assert_ne!(a, c);
        assert_eq!(scene.get(b).unwrap().mesh, "quad");
        assert_eq!(scene.get(c).unwrap().mesh, "hex");
        assert!(scene.remove(a).is_none());
    }

    #[test]
    fn spiral_grows_and_turns() {
        let mut scene = Scene::new();
        let ids = spawn_spiral(&mut scene, &7u8, 40);
        assert_eq!(ids.len(), 40);
        assert_eq!(scene.len(), 40);

        let first = scene.get(ids[0]).unwrap();
        assert_eq!(first.transform.scale, Vec2::splat(0.5));
        assert_eq!(first.transform.rotation, 0.0);

        let last = scene.get(ids[39]).unwrap();
        assert!((last.transform.scale.x - 1.475).abs() < 1e-5);
        assert!((last.transform.rotation - 39.0 * std::f32::consts::PI * 0.025).abs() < 1e-5);

        // palette cycles every five objects and is linearised
        assert_eq!(scene.get(ids[5]).unwrap().color, first.color);
        assert!(first.color.y < 0.7);
    }

    #[test]
    fn get_mut_edits_in_place() {
        let mut scene = Scene::new();
        let id = scene.insert(SceneObject::new(()));
        scene.get_mut(id).unwrap().transform.translation = Vec2::new(0.2, 0.0);
        assert_eq!(scene.get(id).unwrap().transform.translation.x, 0.2);
    }
}
