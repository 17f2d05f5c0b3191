// SPDX-License-Identifier: CEPL-1.0
use std::f32::consts::TAU;

pub use glam::{Mat2, Vec2, Vec3};

/// Display gamma used to move palette colors into linear space.
pub const DISPLAY_GAMMA: f32 = 2.2;

/// Translation, non-uniform scale and rotation (radians) in the plane.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform2d {
    pub translation: Vec2,
    pub scale: Vec2,
    pub rotation: f32,
}

impl Default for Transform2d {
    fn default() -> Self {
        Self {
            translation: Vec2::ZERO,
            scale: Vec2::ONE,
            rotation: 0.0,
        }
    }
}

impl Transform2d {
    /// Rotation applied after scale.
    pub fn mat2(&self) -> Mat2 {
        let (s, c) = self.rotation.sin_cos();
        let rot = Mat2::from_cols(Vec2::new(c, s), Vec2::new(-s, c));
        let scale = Mat2::from_diagonal(self.scale);
        rot * scale
    }

    /// Adds `delta` radians, keeping the result in `[0, TAU)`.
    pub fn rotate(&mut self, delta: f32) {
        self.rotation = wrap_angle(self.rotation + delta);
    }
}

/// Floating modulo into `[0, TAU)`.
pub fn wrap_angle(radians: f32) -> f32 {
    let r = radians.rem_euclid(TAU);
    // rem_euclid can round up to exactly TAU for tiny negative inputs
    if r >= TAU {
        0.0
    } else {
        r
    }
}

pub fn srgb_to_linear(color: Vec3) -> Vec3 {
    color.powf(DISPLAY_GAMMA)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::{FRAC_PI_2, PI};

    fn close(a: Vec2, b: Vec2) -> bool {
        (a - b).length() < 1e-5
    }

    #[test]
    fn identity_transform_is_identity_matrix() {
        assert_eq!(Transform2d::default().mat2(), Mat2::IDENTITY);
    }

    #[test]
    fn scale_is_applied_before_rotation() {
        let t = Transform2d {
            scale: Vec2::new(2.0, 0.5),
            rotation: FRAC_PI_2,
            ..Default::default()
        };
        // x axis is stretched to length 2 and then turned onto +y
        assert!(close(t.mat2() * Vec2::X, Vec2::new(0.0, 2.0)));
        assert!(close(t.mat2() * Vec2::Y, Vec2::new(-0.5, 0.0)));
    }

    #[test]
    fn wrap_angle_stays_in_range() {
        assert_eq!(wrap_angle(0.0), 0.0);
        assert!((wrap_angle(TAU + 0.5) - 0.5).abs() < 1e-5);
        assert!((wrap_angle(-PI) - PI).abs() < 1e-5);
        assert!(wrap_angle(-1e-9) < TAU);
    }

    #[test]
    fn rotate_wraps() {
        let mut t = Transform2d {
            rotation: TAU - 0.1,
            ..Default::default()
        };
        t.rotate(0.2);
        assert!((t.rotation - 0.1).abs() < 1e-4);
    }

    #[test]
    fn srgb_to_linear_darkens_midtones() {
        let c = srgb_to_linear(Vec3::new(1.0, 0.5, 0.0));
        assert_eq!(c.x, 1.0);
        assert!(c.y < 0.25 && c.y > 0.2);
        assert_eq!(c.z, 0.0);
    }
}
