// SPDX-License-Identifier: CEPL-1.0
//! Per-frame spin of the spiral demo.
//!
//! Every drawn frame turns each object twice: once in [`spin_prepass`],
//! proportionally to its position in the table, and once more by
//! [`DRAW_STEP`] right before its push constants are built. The combined
//! speed is what the demo has always shown, so both steps are kept.

use crate::{Scene, SceneObject};

/// Prepass increment, multiplied by the 1-based position of the object.
pub const PREPASS_STEP: f32 = 0.0001;
/// Flat increment applied while drawing.
pub const DRAW_STEP: f32 = 0.001;

pub fn spin_prepass<M>(scene: &mut Scene<M>) {
    for (i, object) in scene.objects_mut().enumerate() {
        object.transform.rotate(PREPASS_STEP * (i + 1) as f32);
    }
}

pub fn spin_draw_step<M>(object: &mut SceneObject<M>) {
    object.transform.rotate(DRAW_STEP);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_frame_applies_both_steps() {
        let mut scene = Scene::new();
        let ids: Vec<_> = (0..3).map(|_| scene.insert(SceneObject::new(()))).collect();

        spin_prepass(&mut scene);
        for object in scene.objects_mut() {
            spin_draw_step(object);
        }

        for (i, id) in ids.into_iter().enumerate() {
            let expected = PREPASS_STEP * (i + 1) as f32 + DRAW_STEP;
            let got = scene.get(id).unwrap().transform.rotation;
            assert!((got - expected).abs() < 1e-7, "object {i}: {got} != {expected}");
        }
    }
}
