// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};

use crate::SceneObject;

/// Per-object block pushed before each draw.
///
/// Matches the shader's push-constant block: `mat2` (two vec2 columns),
/// `vec2` offset, then a `vec3` color aligned to 16 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PushConstantData {
    pub transform: [f32; 4],
    pub offset: [f32; 2],
    _pad0: [f32; 2],
    pub color: [f32; 3],
    _pad1: f32,
}

impl PushConstantData {
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    pub fn from_object<M>(object: &SceneObject<M>) -> Self {
        Self {
            transform: object.transform.mat2().to_cols_array(),
            offset: object.transform.translation.to_array(),
            color: object.color.to_array(),
            ..Self::default()
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}
