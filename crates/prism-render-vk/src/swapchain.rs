// SPDX-License-Identifier: CEPL-1.0
use anyhow::{Context, Result};
use ash::khr::swapchain;
use ash::vk;
use prism_render::{Acquire, PresentStatus, RenderError, RenderSize, SwapChain};
use tracing::debug;

use crate::device::{from_extent, VkDevice, VkVsyncMode};

/// Frames the CPU may record ahead of the GPU.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SwapChainFormats {
    pub image: vk::Format,
    pub depth: vk::Format,
}

#[derive(Default)]
struct DepthImage {
    image: vk::Image,
    memory: vk::DeviceMemory,
    view: vk::ImageView,
}

#[derive(Default)]
struct FrameSync {
    image_available: vk::Semaphore,
    render_finished: vk::Semaphore,
    in_flight: vk::Fence,
}

/// Presentable images with their views, depth buffers, framebuffers and
/// the per-frame semaphores and fences.
///
/// Handles are only ever pushed once created, and unset ones stay null, so
/// dropping a half-built chain releases exactly what was made.
pub struct VkSwapChain {
    device: ash::Device,
    loader: swapchain::Device,
    queue: vk::Queue,

    swapchain: vk::SwapchainKHR,
    formats: SwapChainFormats,
    extent: vk::Extent2D,
    image_views: Vec<vk::ImageView>,
    depth: Vec<DepthImage>,
    render_pass: vk::RenderPass,
    framebuffers: Vec<vk::Framebuffer>,

    frames: Vec<FrameSync>,
    images_in_flight: Vec<vk::Fence>,
    current_frame: usize,
}

impl Drop for VkSwapChain {
    fn drop(&mut self) {
        unsafe {
            let d = &self.device;
            for &fb in &self.framebuffers {
                d.destroy_framebuffer(fb, None);
            }
            d.destroy_render_pass(self.render_pass, None);
            for depth in &self.depth {
                d.destroy_image_view(depth.view, None);
                d.destroy_image(depth.image, None);
                d.free_memory(depth.memory, None);
            }
            for &iv in &self.image_views {
                d.destroy_image_view(iv, None);
            }
            self.loader.destroy_swapchain(self.swapchain, None);
            for f in &self.frames {
                d.destroy_semaphore(f.image_available, None);
                d.destroy_semaphore(f.render_finished, None);
                d.destroy_fence(f.in_flight, None);
            }
        }
    }
}

pub(crate) fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .copied()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first().copied())
}

pub(crate) fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    mode: VkVsyncMode,
) -> vk::PresentModeKHR {
    let order = match mode {
        VkVsyncMode::Mailbox => [vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO],
        VkVsyncMode::Fifo => [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
    };
    order
        .into_iter()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub(crate) fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

pub(crate) fn image_count_from_caps(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    if caps.max_image_count == 0 {
        caps.min_image_count + 1
    } else {
        (caps.min_image_count + 1).min(caps.max_image_count)
    }
}

unsafe fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
    aspect_mask: vk::ImageAspectFlags,
) -> Result<vk::ImageView> {
    let iv_info = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format,
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    Ok(device.create_image_view(&iv_info, None)?)
}

/// Fills `out` one handle at a time; on error the caller still owns
/// whatever was created.
unsafe fn create_depth_image(
    dev: &VkDevice,
    extent: vk::Extent2D,
    format: vk::Format,
    out: &mut DepthImage,
) -> Result<()> {
    let device = dev.raw();
    let img_ci = vk::ImageCreateInfo {
        s_type: vk::StructureType::IMAGE_CREATE_INFO,
        image_type: vk::ImageType::TYPE_2D,
        format,
        extent: vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        },
        mip_levels: 1,
        array_layers: 1,
        samples: vk::SampleCountFlags::TYPE_1,
        tiling: vk::ImageTiling::OPTIMAL,
        usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        sharing_mode: vk::SharingMode::EXCLUSIVE,
        ..Default::default()
    };
    out.image = device.create_image(&img_ci, None)?;

    let mem_req = device.get_image_memory_requirements(out.image);
    let alloc = vk::MemoryAllocateInfo {
        s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
        allocation_size: mem_req.size,
        memory_type_index: dev
            .find_memory_type(mem_req.memory_type_bits, vk::MemoryPropertyFlags::DEVICE_LOCAL)?,
        ..Default::default()
    };
    out.memory = device.allocate_memory(&alloc, None)?;
    device.bind_image_memory(out.image, out.memory, 0)?;

    out.view = create_image_view(device, out.image, format, vk::ImageAspectFlags::DEPTH)?;
    Ok(())
}

unsafe fn create_render_pass(device: &ash::Device, formats: SwapChainFormats) -> Result<vk::RenderPass> {
    let attachments = [
        vk::AttachmentDescription {
            format: formats.image,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            ..Default::default()
        },
        vk::AttachmentDescription {
            format: formats.depth,
            samples: vk::SampleCountFlags::TYPE_1,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            stencil_load_op: vk::AttachmentLoadOp::DONT_CARE,
            stencil_store_op: vk::AttachmentStoreOp::DONT_CARE,
            initial_layout: vk::ImageLayout::UNDEFINED,
            final_layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
            ..Default::default()
        },
    ];
    let color_ref = vk::AttachmentReference {
        attachment: 0,
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
    };
    let depth_ref = vk::AttachmentReference {
        attachment: 1,
        layout: vk::ImageLayout::DEPTH_STENCIL_ATTACHMENT_OPTIMAL,
    };

    let subpass = vk::SubpassDescription {
        pipeline_bind_point: vk::PipelineBindPoint::GRAPHICS,
        color_attachment_count: 1,
        p_color_attachments: &color_ref,
        p_depth_stencil_attachment: &depth_ref,
        ..Default::default()
    };

    // wait for the presentation engine to release the image before writing
    let stages = vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT
        | vk::PipelineStageFlags::EARLY_FRAGMENT_TESTS;
    let dependency = vk::SubpassDependency {
        src_subpass: vk::SUBPASS_EXTERNAL,
        dst_subpass: 0,
        src_stage_mask: stages,
        src_access_mask: vk::AccessFlags::empty(),
        dst_stage_mask: stages,
        dst_access_mask: vk::AccessFlags::COLOR_ATTACHMENT_WRITE
            | vk::AccessFlags::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ..Default::default()
    };

    let rp_info = vk::RenderPassCreateInfo {
        s_type: vk::StructureType::RENDER_PASS_CREATE_INFO,
        attachment_count: attachments.len() as u32,
        p_attachments: attachments.as_ptr(),
        subpass_count: 1,
        p_subpasses: &subpass,
        dependency_count: 1,
        p_dependencies: &dependency,
        ..Default::default()
    };
    Ok(device.create_render_pass(&rp_info, None)?)
}

unsafe fn create_frame_sync(device: &ash::Device, out: &mut FrameSync) -> Result<()> {
    let sem_ci = vk::SemaphoreCreateInfo::default();
    let fence_ci = vk::FenceCreateInfo {
        s_type: vk::StructureType::FENCE_CREATE_INFO,
        flags: vk::FenceCreateFlags::SIGNALED,
        ..Default::default()
    };
    out.image_available = device.create_semaphore(&sem_ci, None)?;
    out.render_finished = device.create_semaphore(&sem_ci, None)?;
    out.in_flight = device.create_fence(&fence_ci, None)?;
    Ok(())
}

impl VkSwapChain {
    fn build(dev: &VkDevice, want: RenderSize, previous: Option<&VkSwapChain>) -> Result<Self> {
        let (caps, surface_formats, modes) = dev.surface_support()?;
        let surf_format = choose_surface_format(&surface_formats)
            .context("surface reports no formats")?;
        let present_mode = choose_present_mode(&modes, dev.vsync());
        let extent = extent_from_caps(&caps, want);
        let formats = SwapChainFormats {
            image: surf_format.format,
            depth: dev.depth_format(),
        };

        let device = dev.raw();
        let loader = dev.swapchain_loader();

        unsafe {
            let swap_info = vk::SwapchainCreateInfoKHR {
                s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
                surface: dev.surface(),
                min_image_count: image_count_from_caps(&caps),
                image_format: surf_format.format,
                image_color_space: surf_format.color_space,
                image_extent: extent,
                image_array_layers: 1,
                image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
                image_sharing_mode: vk::SharingMode::EXCLUSIVE,
                pre_transform: caps.current_transform,
                composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
                present_mode,
                clipped: vk::TRUE,
                old_swapchain: previous.map_or(vk::SwapchainKHR::null(), |p| p.swapchain),
                ..Default::default()
            };

            let swapchain = loader
                .create_swapchain(&swap_info, None)
                .context("create_swapchain")?;

            // from here on an early return drops `chain` and frees what exists
            let mut chain = Self {
                device: device.clone(),
                loader: loader.clone(),
                queue: dev.queue(),
                swapchain,
                formats,
                extent,
                image_views: Vec::new(),
                depth: Vec::new(),
                render_pass: vk::RenderPass::null(),
                framebuffers: Vec::new(),
                frames: Vec::new(),
                images_in_flight: Vec::new(),
                current_frame: 0,
            };

            let images = loader
                .get_swapchain_images(swapchain)
                .context("get_swapchain_images")?;
            for &img in &images {
                let view = create_image_view(device, img, formats.image, vk::ImageAspectFlags::COLOR)?;
                chain.image_views.push(view);
            }
            for _ in &images {
                chain.depth.push(DepthImage::default());
                let i = chain.depth.len() - 1;
                create_depth_image(dev, extent, formats.depth, &mut chain.depth[i])?;
            }

            chain.render_pass = create_render_pass(device, formats)?;

            for (&view, depth) in chain.image_views.iter().zip(&chain.depth) {
                let attachments = [view, depth.view];
                let fb_info = vk::FramebufferCreateInfo {
                    s_type: vk::StructureType::FRAMEBUFFER_CREATE_INFO,
                    render_pass: chain.render_pass,
                    attachment_count: attachments.len() as u32,
                    p_attachments: attachments.as_ptr(),
                    width: extent.width,
                    height: extent.height,
                    layers: 1,
                    ..Default::default()
                };
                let fb = device.create_framebuffer(&fb_info, None)?;
                chain.framebuffers.push(fb);
            }

            for i in 0..MAX_FRAMES_IN_FLIGHT {
                chain.frames.push(FrameSync::default());
                create_frame_sync(device, &mut chain.frames[i])?;
            }
            chain.images_in_flight = vec![vk::Fence::null(); images.len()];

            debug!(
                "swap chain images={} present_mode={:?} old={}",
                images.len(),
                present_mode,
                previous.is_some()
            );
            Ok(chain)
        }
    }
}

impl SwapChain<VkDevice> for VkSwapChain {
    type Formats = SwapChainFormats;

    fn create(
        device: &VkDevice,
        extent: RenderSize,
        previous: Option<Self>,
    ) -> Result<Self, RenderError> {
        // `previous` is retired by the new swapchain and released on return
        Self::build(device, extent, previous.as_ref())
            .map_err(|e| RenderError::backend("swap chain creation", e))
    }

    fn acquire_next_image(&mut self) -> Result<Acquire, RenderError> {
        let sync = &self.frames[self.current_frame];
        unsafe {
            self.device
                .wait_for_fences(&[sync.in_flight], true, u64::MAX)
                .map_err(|e| RenderError::backend("wait_for_fences", e))?;

            match self.loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                sync.image_available,
                vk::Fence::null(),
            ) {
                Ok((index, suboptimal)) => Ok(Acquire::Image { index, suboptimal }),
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(Acquire::OutOfDate),
                Err(e) => Err(RenderError::backend("acquire_next_image", e)),
            }
        }
    }

    fn submit_command_buffers(
        &mut self,
        cmd: vk::CommandBuffer,
        image_index: u32,
    ) -> Result<PresentStatus, RenderError> {
        let img = image_index as usize;
        let sync = &self.frames[self.current_frame];

        unsafe {
            let image_fence = self.images_in_flight[img];
            if image_fence != vk::Fence::null() {
                self.device
                    .wait_for_fences(&[image_fence], true, u64::MAX)
                    .map_err(|e| RenderError::backend("wait_for_fences", e))?;
            }
            self.images_in_flight[img] = sync.in_flight;

            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let submit = vk::SubmitInfo {
                s_type: vk::StructureType::SUBMIT_INFO,
                wait_semaphore_count: 1,
                p_wait_semaphores: &sync.image_available,
                p_wait_dst_stage_mask: wait_stages.as_ptr(),
                command_buffer_count: 1,
                p_command_buffers: &cmd,
                signal_semaphore_count: 1,
                p_signal_semaphores: &sync.render_finished,
                ..Default::default()
            };
            self.device
                .reset_fences(&[sync.in_flight])
                .map_err(|e| RenderError::backend("reset_fences", e))?;
            self.device
                .queue_submit(self.queue, std::slice::from_ref(&submit), sync.in_flight)
                .map_err(|e| RenderError::backend("queue_submit", e))?;

            let present = vk::PresentInfoKHR {
                s_type: vk::StructureType::PRESENT_INFO_KHR,
                wait_semaphore_count: 1,
                p_wait_semaphores: &sync.render_finished,
                swapchain_count: 1,
                p_swapchains: &self.swapchain,
                p_image_indices: &image_index,
                ..Default::default()
            };
            let status = match self.loader.queue_present(self.queue, &present) {
                Ok(false) => PresentStatus::Optimal,
                Ok(true) => PresentStatus::Suboptimal,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => PresentStatus::OutOfDate,
                Err(e) => return Err(RenderError::backend("queue_present", e)),
            };

            self.current_frame = (self.current_frame + 1) % MAX_FRAMES_IN_FLIGHT;
            Ok(status)
        }
    }

    fn image_count(&self) -> usize {
        self.image_views.len()
    }

    fn render_pass(&self) -> vk::RenderPass {
        self.render_pass
    }

    fn framebuffer(&self, image_index: u32) -> vk::Framebuffer {
        self.framebuffers[image_index as usize]
    }

    fn extent(&self) -> RenderSize {
        from_extent(self.extent)
    }

    fn formats(&self) -> SwapChainFormats {
        self.formats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(current: (u32, u32), min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: current.0,
                height: current.1,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            min_image_count: min,
            max_image_count: max,
            ..Default::default()
        }
    }

    #[test]
    fn mailbox_preferred_when_available() {
        let both = [vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX];
        assert_eq!(
            choose_present_mode(&both, VkVsyncMode::Mailbox),
            vk::PresentModeKHR::MAILBOX
        );
        assert_eq!(
            choose_present_mode(&both, VkVsyncMode::Fifo),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::FIFO], VkVsyncMode::Mailbox),
            vk::PresentModeKHR::FIFO
        );
        assert_eq!(
            choose_present_mode(&[vk::PresentModeKHR::IMMEDIATE], VkVsyncMode::Mailbox),
            vk::PresentModeKHR::FIFO
        );
    }

    #[test]
    fn srgb_surface_format_preferred() {
        let unorm = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_UNORM,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let srgb = vk::SurfaceFormatKHR {
            format: vk::Format::B8G8R8A8_SRGB,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let pick = |formats: &[vk::SurfaceFormatKHR]| choose_surface_format(formats).map(|f| f.format);
        assert_eq!(pick(&[unorm, srgb]), Some(vk::Format::B8G8R8A8_SRGB));
        assert_eq!(pick(&[unorm]), Some(vk::Format::B8G8R8A8_UNORM));
        assert_eq!(pick(&[]), None);
    }

    #[test]
    fn extent_follows_surface_unless_undefined() {
        let want = RenderSize::new(800, 600);
        let wh = |e: vk::Extent2D| (e.width, e.height);
        assert_eq!(wh(extent_from_caps(&caps((1024, 768), 2, 3), want)), (1024, 768));
        assert_eq!(
            wh(extent_from_caps(&caps((u32::MAX, u32::MAX), 2, 3), want)),
            (800, 600)
        );
        assert_eq!(
            wh(extent_from_caps(
                &caps((u32::MAX, u32::MAX), 2, 3),
                RenderSize::new(9000, 0)
            )),
            (4096, 1)
        );
    }

    #[test]
    fn image_count_is_one_above_minimum_within_limits() {
        assert_eq!(image_count_from_caps(&caps((1, 1), 2, 0)), 3);
        assert_eq!(image_count_from_caps(&caps((1, 1), 2, 8)), 3);
        assert_eq!(image_count_from_caps(&caps((1, 1), 3, 3)), 3);
    }

    #[test]
    fn unfilled_slots_hold_only_null_handles() {
        // a chain dropped mid-build destroys these; null is a no-op there
        let depth = DepthImage::default();
        assert_eq!(depth.image, vk::Image::null());
        assert_eq!(depth.memory, vk::DeviceMemory::null());
        assert_eq!(depth.view, vk::ImageView::null());

        let sync = FrameSync::default();
        assert_eq!(sync.image_available, vk::Semaphore::null());
        assert_eq!(sync.render_finished, vk::Semaphore::null());
        assert_eq!(sync.in_flight, vk::Fence::null());
    }
}
