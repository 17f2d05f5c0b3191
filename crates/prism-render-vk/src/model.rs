// SPDX-License-Identifier: CEPL-1.0
use std::mem::{offset_of, size_of};

use anyhow::{ensure, Context, Result};
use ash::vk;
use bytemuck::Pod;
use prism_scene::mesh::Vertex2d;

use crate::VkDevice;

struct Buffer {
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
}

/// Host-visible vertex buffer plus an optional `u32` index buffer.
pub struct Model {
    device: ash::Device,
    vertices: Buffer,
    vertex_count: u32,
    indices: Option<(Buffer, u32)>,
}

impl Drop for Model {
    fn drop(&mut self) {
        unsafe {
            let mut buffers = vec![&self.vertices];
            if let Some((index_buffer, _)) = &self.indices {
                buffers.push(index_buffer);
            }
            for b in buffers {
                self.device.destroy_buffer(b.buffer, None);
                self.device.free_memory(b.memory, None);
            }
        }
    }
}

fn upload<T: Pod>(dev: &VkDevice, data: &[T], usage: vk::BufferUsageFlags) -> Result<Buffer> {
    let bytes: &[u8] = bytemuck::cast_slice(data);
    let size = bytes.len() as vk::DeviceSize;
    let (buffer, memory) = dev.create_buffer(
        size,
        usage,
        vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
    )?;
    unsafe {
        let device = dev.raw();
        let ptr = device
            .map_memory(memory, 0, size, vk::MemoryMapFlags::empty())
            .context("map_memory")?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr.cast::<u8>(), bytes.len());
        device.unmap_memory(memory);
    }
    Ok(Buffer { buffer, memory })
}

impl Model {
    /// Uploads a triangle list. At least one triangle is required.
    pub fn new(dev: &VkDevice, vertices: &[Vertex2d], indices: Option<&[u32]>) -> Result<Self> {
        ensure!(
            vertices.len() >= 3,
            "model needs at least 3 vertices, got {}",
            vertices.len()
        );
        let vertex_buffer = upload(dev, vertices, vk::BufferUsageFlags::VERTEX_BUFFER)?;
        let index_buffer = match indices {
            Some(ix) if !ix.is_empty() => Some((
                upload(dev, ix, vk::BufferUsageFlags::INDEX_BUFFER)?,
                ix.len() as u32,
            )),
            _ => None,
        };
        Ok(Self {
            device: dev.raw().clone(),
            vertices: vertex_buffer,
            vertex_count: vertices.len() as u32,
            indices: index_buffer,
        })
    }

    pub fn bind(&self, cmd: vk::CommandBuffer) {
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(cmd, 0, &[self.vertices.buffer], &[0]);
            if let Some((index_buffer, _)) = &self.indices {
                self.device
                    .cmd_bind_index_buffer(cmd, index_buffer.buffer, 0, vk::IndexType::UINT32);
            }
        }
    }

    pub fn draw(&self, cmd: vk::CommandBuffer) {
        unsafe {
            match &self.indices {
                Some((_, count)) => self.device.cmd_draw_indexed(cmd, *count, 1, 0, 0, 0),
                None => self.device.cmd_draw(cmd, self.vertex_count, 1, 0, 0),
            }
        }
    }

    pub fn binding_descriptions() -> [vk::VertexInputBindingDescription; 1] {
        [vk::VertexInputBindingDescription {
            binding: 0,
            stride: size_of::<Vertex2d>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        }]
    }

    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription {
                location: 0,
                binding: 0,
                format: vk::Format::R32G32_SFLOAT,
                offset: offset_of!(Vertex2d, position) as u32,
            },
            vk::VertexInputAttributeDescription {
                location: 1,
                binding: 0,
                format: vk::Format::R32G32B32_SFLOAT,
                offset: offset_of!(Vertex2d, color) as u32,
            },
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_layout_matches_shader_inputs() {
        let [binding] = Model::binding_descriptions();
        assert_eq!(binding.stride, 20);

        let [position, color] = Model::attribute_descriptions();
        assert_eq!((position.location, position.offset), (0, 0));
        assert_eq!(position.format, vk::Format::R32G32_SFLOAT);
        assert_eq!((color.location, color.offset), (1, 8));
        assert_eq!(color.format, vk::Format::R32G32B32_SFLOAT);
    }
}
