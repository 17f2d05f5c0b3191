// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CStr;
use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use ash::util::read_spv;
use ash::vk;
use bitflags::bitflags;
use tracing::debug;

use crate::model::Model;
use crate::VkDevice;

bitflags! {
    /// Pipeline state supplied at record time instead of baked in.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct DynamicStates: u8 {
        const VIEWPORT   = 1 << 0;
        const SCISSOR    = 1 << 1;
        const LINE_WIDTH = 1 << 2;
    }
}

impl DynamicStates {
    pub fn to_vk(self) -> Vec<vk::DynamicState> {
        [
            (Self::VIEWPORT, vk::DynamicState::VIEWPORT),
            (Self::SCISSOR, vk::DynamicState::SCISSOR),
            (Self::LINE_WIDTH, vk::DynamicState::LINE_WIDTH),
        ]
        .into_iter()
        .filter(|(flag, _)| self.contains(*flag))
        .map(|(_, state)| state)
        .collect()
    }
}

/// Fixed-function state for [`GraphicsPipeline::new`].
///
/// `Default` fills everything except the render pass and layout, which the
/// owner of the pipeline must set.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub topology: vk::PrimitiveTopology,
    pub primitive_restart: bool,

    pub polygon_mode: vk::PolygonMode,
    pub cull_mode: vk::CullModeFlags,
    pub front_face: vk::FrontFace,
    pub line_width: f32,

    pub rasterization_samples: vk::SampleCountFlags,

    pub blend_enable: bool,
    pub color_write_mask: vk::ColorComponentFlags,

    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_compare_op: vk::CompareOp,

    pub dynamic_states: DynamicStates,

    pub render_pass: vk::RenderPass,
    pub pipeline_layout: vk::PipelineLayout,
    pub subpass: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            primitive_restart: false,
            polygon_mode: vk::PolygonMode::FILL,
            cull_mode: vk::CullModeFlags::NONE,
            front_face: vk::FrontFace::CLOCKWISE,
            line_width: 1.0,
            rasterization_samples: vk::SampleCountFlags::TYPE_1,
            blend_enable: false,
            color_write_mask: vk::ColorComponentFlags::RGBA,
            depth_test: true,
            depth_write: true,
            depth_compare_op: vk::CompareOp::LESS,
            dynamic_states: DynamicStates::VIEWPORT | DynamicStates::SCISSOR,
            render_pass: vk::RenderPass::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            subpass: 0,
        }
    }
}

fn bool32(b: bool) -> vk::Bool32 {
    if b {
        vk::TRUE
    } else {
        vk::FALSE
    }
}

/// Reads a SPIR-V blob from disk. A missing or unreadable file is an error.
pub fn read_spirv(path: &Path) -> Result<Vec<u32>> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open shader {}", path.display()))?;
    read_spv(&mut file).with_context(|| format!("invalid SPIR-V in {}", path.display()))
}

unsafe fn create_shader_module(device: &ash::Device, code: &[u32]) -> Result<vk::ShaderModule> {
    let ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_code: code.as_ptr(),
        code_size: std::mem::size_of_val(code),
        ..Default::default()
    };
    Ok(device.create_shader_module(&ci, None)?)
}

pub struct GraphicsPipeline {
    device: ash::Device,
    pipeline: vk::Pipeline,
}

impl Drop for GraphicsPipeline {
    fn drop(&mut self) {
        unsafe { self.device.destroy_pipeline(self.pipeline, None) };
    }
}

impl GraphicsPipeline {
    pub fn new(
        dev: &VkDevice,
        vert_path: &Path,
        frag_path: &Path,
        config: &PipelineConfig,
    ) -> Result<Self> {
        if config.pipeline_layout == vk::PipelineLayout::null() {
            bail!("cannot create graphics pipeline: no pipeline layout in config");
        }
        if config.render_pass == vk::RenderPass::null() {
            bail!("cannot create graphics pipeline: no render pass in config");
        }

        let vert_code = read_spirv(vert_path)?;
        let frag_code = read_spirv(frag_path)?;
        debug!(
            "shader sizes: vert {} bytes, frag {} bytes",
            vert_code.len() * 4,
            frag_code.len() * 4
        );

        let device = dev.raw();
        unsafe {
            let vs = create_shader_module(device, &vert_code)?;
            let fs = match create_shader_module(device, &frag_code) {
                Ok(fs) => fs,
                Err(e) => {
                    device.destroy_shader_module(vs, None);
                    return Err(e);
                }
            };

            let result = Self::build(device, vs, fs, config);

            device.destroy_shader_module(vs, None);
            device.destroy_shader_module(fs, None);

            let pipeline = result?;
            Ok(Self {
                device: device.clone(),
                pipeline,
            })
        }
    }

    unsafe fn build(
        device: &ash::Device,
        vs: vk::ShaderModule,
        fs: vk::ShaderModule,
        config: &PipelineConfig,
    ) -> Result<vk::Pipeline> {
        let entry: &CStr = c"main";
        let stages = [
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::VERTEX,
                module: vs,
                p_name: entry.as_ptr(),
                ..Default::default()
            },
            vk::PipelineShaderStageCreateInfo {
                s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
                stage: vk::ShaderStageFlags::FRAGMENT,
                module: fs,
                p_name: entry.as_ptr(),
                ..Default::default()
            },
        ];

        let bindings = Model::binding_descriptions();
        let attributes = Model::attribute_descriptions();
        let vertex_input = vk::PipelineVertexInputStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
            vertex_binding_description_count: bindings.len() as u32,
            p_vertex_binding_descriptions: bindings.as_ptr(),
            vertex_attribute_description_count: attributes.len() as u32,
            p_vertex_attribute_descriptions: attributes.as_ptr(),
            ..Default::default()
        };
        let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
            topology: config.topology,
            primitive_restart_enable: bool32(config.primitive_restart),
            ..Default::default()
        };
        // counts only; viewport and scissor are dynamic
        let viewport_state = vk::PipelineViewportStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };
        let raster = vk::PipelineRasterizationStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
            polygon_mode: config.polygon_mode,
            cull_mode: config.cull_mode,
            front_face: config.front_face,
            line_width: config.line_width,
            ..Default::default()
        };
        let multisample = vk::PipelineMultisampleStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
            rasterization_samples: config.rasterization_samples,
            min_sample_shading: 1.0,
            ..Default::default()
        };
        let color_blend_att = vk::PipelineColorBlendAttachmentState {
            blend_enable: bool32(config.blend_enable),
            src_color_blend_factor: vk::BlendFactor::ONE,
            dst_color_blend_factor: vk::BlendFactor::ZERO,
            color_blend_op: vk::BlendOp::ADD,
            src_alpha_blend_factor: vk::BlendFactor::ONE,
            dst_alpha_blend_factor: vk::BlendFactor::ZERO,
            alpha_blend_op: vk::BlendOp::ADD,
            color_write_mask: config.color_write_mask,
        };
        let color_blend = vk::PipelineColorBlendStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
            logic_op: vk::LogicOp::COPY,
            attachment_count: 1,
            p_attachments: &color_blend_att,
            ..Default::default()
        };
        let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
            depth_test_enable: bool32(config.depth_test),
            depth_write_enable: bool32(config.depth_write),
            depth_compare_op: config.depth_compare_op,
            max_depth_bounds: 1.0,
            ..Default::default()
        };
        let dyn_states = config.dynamic_states.to_vk();
        let dynamic_state = vk::PipelineDynamicStateCreateInfo {
            s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
            dynamic_state_count: dyn_states.len() as u32,
            p_dynamic_states: dyn_states.as_ptr(),
            ..Default::default()
        };

        let pipeline_info = vk::GraphicsPipelineCreateInfo {
            s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
            stage_count: stages.len() as u32,
            p_stages: stages.as_ptr(),
            p_vertex_input_state: &vertex_input,
            p_input_assembly_state: &input_assembly,
            p_viewport_state: &viewport_state,
            p_rasterization_state: &raster,
            p_multisample_state: &multisample,
            p_depth_stencil_state: &depth_stencil,
            p_color_blend_state: &color_blend,
            p_dynamic_state: &dynamic_state,
            layout: config.pipeline_layout,
            render_pass: config.render_pass,
            subpass: config.subpass,
            base_pipeline_index: -1,
            ..Default::default()
        };

        let pipelines = device
            .create_graphics_pipelines(
                vk::PipelineCache::null(),
                std::slice::from_ref(&pipeline_info),
                None,
            )
            .map_err(|(_, err)| anyhow!("create_graphics_pipelines failed: {err:?}"))?;
        pipelines
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("create_graphics_pipelines returned nothing"))
    }

    pub fn bind(&self, cmd: vk::CommandBuffer) {
        unsafe {
            self.device
                .cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline)
        };
    }
}
