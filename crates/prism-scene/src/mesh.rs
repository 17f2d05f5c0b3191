// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};
use prism_math::Vec2;

/// Vertex layout consumed by the simple shader: binding 0, location 0 is
/// `position`, location 1 is `color`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Vertex2d {
    pub position: [f32; 2],
    pub color: [f32; 3],
}

impl Vertex2d {
    pub const fn new(position: [f32; 2], color: [f32; 3]) -> Self {
        Self { position, color }
    }
}

/// Red/green/blue triangle centred on the origin.
pub fn triangle() -> Vec<Vertex2d> {
    vec![
        Vertex2d::new([0.0, -0.5], [1.0, 0.0, 0.0]),
        Vertex2d::new([0.5, 0.5], [0.0, 1.0, 0.0]),
        Vertex2d::new([-0.5, 0.5], [0.0, 0.0, 1.0]),
    ]
}

/// Sierpinski triangle of the given recursion depth, as a triangle list.
pub fn sierpinski(depth: u32, left: Vec2, right: Vec2, top: Vec2) -> Vec<Vertex2d> {
    let mut out = Vec::with_capacity(3 * 3usize.pow(depth));
    push_sierpinski(&mut out, depth, left, right, top);
    out
}

fn push_sierpinski(out: &mut Vec<Vertex2d>, depth: u32, left: Vec2, right: Vec2, top: Vec2) {
    if depth == 0 {
        for p in [top, right, left] {
            out.push(Vertex2d::new(p.to_array(), [1.0, 1.0, 1.0]));
        }
        return;
    }
    let left_top = 0.5 * (left + top);
    let right_top = 0.5 * (right + top);
    let left_right = 0.5 * (left + right);
    push_sierpinski(out, depth - 1, left, left_right, left_top);
    push_sierpinski(out, depth - 1, left_right, right, right_top);
    push_sierpinski(out, depth - 1, left_top, right_top, top);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_is_tightly_packed() {
        assert_eq!(std::mem::size_of::<Vertex2d>(), 20);
    }

    #[test]
    fn sierpinski_triples_per_level() {
        let (l, r, t) = (Vec2::new(-0.5, 0.5), Vec2::new(0.5, 0.5), Vec2::new(0.0, -0.5));
        assert_eq!(sierpinski(0, l, r, t).len(), 3);
        assert_eq!(sierpinski(1, l, r, t).len(), 9);
        let v = sierpinski(5, l, r, t);
        assert_eq!(v.len(), 3 * 243);
        assert!(v
            .iter()
            .all(|v| v.position[0].abs() <= 0.5 && v.position[1].abs() <= 0.5));
    }
}
