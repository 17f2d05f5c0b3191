// SPDX-License-Identifier: CEPL-1.0
use std::path::Path;
use std::rc::Rc;

use anyhow::{Context, Result};
use ash::vk;
use prism_scene::animation::{spin_draw_step, spin_prepass};
use prism_scene::{PushConstantData, Scene};

use crate::{GraphicsPipeline, Model, PipelineConfig, VkDevice};

const PUSH_STAGES: vk::ShaderStageFlags = vk::ShaderStageFlags::from_raw(
    vk::ShaderStageFlags::VERTEX.as_raw() | vk::ShaderStageFlags::FRAGMENT.as_raw(),
);

/// One pipeline, one push-constant block per object, one draw per object.
pub struct SimpleRenderSystem {
    device: ash::Device,
    layout: vk::PipelineLayout,
    pipeline: GraphicsPipeline,
}

impl Drop for SimpleRenderSystem {
    fn drop(&mut self) {
        unsafe { self.device.destroy_pipeline_layout(self.layout, None) };
    }
}

impl SimpleRenderSystem {
    pub fn new(
        dev: &VkDevice,
        render_pass: vk::RenderPass,
        vert_path: &Path,
        frag_path: &Path,
    ) -> Result<Self> {
        let device = dev.raw();
        let range = vk::PushConstantRange {
            stage_flags: PUSH_STAGES,
            offset: 0,
            size: PushConstantData::SIZE,
        };
        let layout_info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            push_constant_range_count: 1,
            p_push_constant_ranges: &range,
            ..Default::default()
        };
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .context("create_pipeline_layout")?;

        let config = PipelineConfig {
            render_pass,
            pipeline_layout: layout,
            ..Default::default()
        };
        let pipeline = match GraphicsPipeline::new(dev, vert_path, frag_path, &config) {
            Ok(p) => p,
            Err(e) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(e);
            }
        };

        Ok(Self {
            device: device.clone(),
            layout,
            pipeline,
        })
    }

    /// Records every object of `scene` into `cmd`, advancing its spin.
    pub fn render_objects(&self, cmd: vk::CommandBuffer, scene: &mut Scene<Rc<Model>>) {
        self.pipeline.bind(cmd);

        spin_prepass(scene);
        for object in scene.objects_mut() {
            spin_draw_step(object);

            let push = PushConstantData::from_object(object);
            unsafe {
                self.device
                    .cmd_push_constants(cmd, self.layout, PUSH_STAGES, 0, push.as_bytes());
            }
            object.mesh.bind(cmd);
            object.mesh.draw(cmd);
        }
    }
}
