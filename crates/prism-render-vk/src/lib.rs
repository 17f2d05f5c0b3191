// SPDX-License-Identifier: CEPL-1.0
//! Vulkan backend: device, swap chain, pipeline, meshes and the simple
//! push-constant render system.
//!
//! Every object here that owns Vulkan handles keeps a clone of the logical
//! device table and must be dropped before the [`VkDevice`] it came from.

mod device;
mod model;
mod pipeline;
mod render_system;
mod swapchain;

pub use ash::vk;
pub use device::{VkDevice, VkVsyncMode};
pub use model::Model;
pub use pipeline::{read_spirv, DynamicStates, GraphicsPipeline, PipelineConfig};
pub use render_system::SimpleRenderSystem;
pub use swapchain::{SwapChainFormats, VkSwapChain, MAX_FRAMES_IN_FLIGHT};

/// Compiled vertex shader produced by the build script.
pub const DEFAULT_VERT_SPV: &str = concat!(env!("OUT_DIR"), "/simple_shader.vert.spv");
/// Compiled fragment shader produced by the build script.
pub const DEFAULT_FRAG_SPV: &str = concat!(env!("OUT_DIR"), "/simple_shader.frag.spv");

/// Frame renderer specialised to this backend.
pub type VkFrameRenderer<'a, W> = prism_render::FrameRenderer<'a, W, VkDevice, VkSwapChain>;
