// SPDX-License-Identifier: CEPL-1.0
use std::ffi::CString;

use anyhow::{anyhow, Context, Result};
use ash::khr::{surface, swapchain};
use ash::{vk, Entry, Instance};
use prism_render::{ClearValues, GraphicsDevice, RenderError, RenderSize, RenderTarget, Viewport};
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use tracing::info;

/// Preferred presentation mode; falls back to FIFO when unavailable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VkVsyncMode {
    Fifo,
    #[default]
    Mailbox,
}

/// Instance, window surface, logical device and the command pool the frame
/// command buffers come from.
pub struct VkDevice {
    _entry: Entry,
    instance: Instance,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,

    phys: vk::PhysicalDevice,
    device: ash::Device,
    queue: vk::Queue,

    swapchain_loader: swapchain::Device,
    cmd_pool: vk::CommandPool,
    depth_format: vk::Format,
    vsync: VkVsyncMode,
}

impl Drop for VkDevice {
    fn drop(&mut self) {
        unsafe {
            self.device.device_wait_idle().ok();
            self.device.destroy_command_pool(self.cmd_pool, None);
            self.device.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            self.instance.destroy_instance(None);
        }
    }
}

unsafe fn create_instance(entry: &Entry, display_raw: RawDisplayHandle) -> Result<Instance> {
    let app_name = CString::new("Prism")?;

    let app_info = vk::ApplicationInfo {
        s_type: vk::StructureType::APPLICATION_INFO,
        p_application_name: app_name.as_ptr(),
        application_version: 0,
        p_engine_name: app_name.as_ptr(),
        engine_version: 0,
        api_version: vk::API_VERSION_1_0,
        ..Default::default()
    };

    let ext_slice = ash_window::enumerate_required_extensions(display_raw)
        .context("enumerate_required_extensions")?;

    let create_info = vk::InstanceCreateInfo {
        s_type: vk::StructureType::INSTANCE_CREATE_INFO,
        p_application_info: &app_info,
        enabled_extension_count: ext_slice.len() as u32,
        pp_enabled_extension_names: ext_slice.as_ptr(),
        ..Default::default()
    };

    Ok(entry.create_instance(&create_info, None)?)
}

unsafe fn pick_device_and_queue(
    instance: &Instance,
    surface_loader: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, u32)> {
    for phys in instance.enumerate_physical_devices()? {
        let qprops = instance.get_physical_device_queue_family_properties(phys);
        for (i, q) in qprops.iter().enumerate() {
            if q.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && surface_loader
                    .get_physical_device_surface_support(phys, i as u32, surface)
                    .unwrap_or(false)
            {
                return Ok((phys, i as u32));
            }
        }
    }
    Err(anyhow!("no suitable physical device/queue family"))
}

unsafe fn pick_depth_format(instance: &Instance, phys: vk::PhysicalDevice) -> Result<vk::Format> {
    [
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
    ]
    .into_iter()
    .find(|&fmt| {
        instance
            .get_physical_device_format_properties(phys, fmt)
            .optimal_tiling_features
            .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
    })
    .ok_or_else(|| anyhow!("no supported depth format"))
}

impl VkDevice {
    /// Creates the device for a native window. The window must outlive it.
    pub fn new(
        display: RawDisplayHandle,
        window: RawWindowHandle,
        vsync: VkVsyncMode,
    ) -> Result<Self> {
        unsafe {
            let entry = Entry::load().context("loading the Vulkan library")?;
            let instance = create_instance(&entry, display)?;

            let surface = ash_window::create_surface(&entry, &instance, display, window, None)
                .context("create_surface")?;
            let surface_loader = surface::Instance::new(&entry, &instance);

            let (phys, queue_family) = pick_device_and_queue(&instance, &surface_loader, surface)?;

            let priorities = [1.0_f32];
            let qinfo = vk::DeviceQueueCreateInfo {
                s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
                queue_family_index: queue_family,
                queue_count: 1,
                p_queue_priorities: priorities.as_ptr(),
                ..Default::default()
            };

            let device_exts = [swapchain::NAME.as_ptr()];
            let dinfo = vk::DeviceCreateInfo {
                s_type: vk::StructureType::DEVICE_CREATE_INFO,
                queue_create_info_count: 1,
                p_queue_create_infos: &qinfo,
                enabled_extension_count: device_exts.len() as u32,
                pp_enabled_extension_names: device_exts.as_ptr(),
                ..Default::default()
            };

            let device = instance
                .create_device(phys, &dinfo, None)
                .context("create_device")?;
            let queue = device.get_device_queue(queue_family, 0);
            let swapchain_loader = swapchain::Device::new(&instance, &device);

            // buffers are re-recorded every frame
            let pool_info = vk::CommandPoolCreateInfo {
                s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
                queue_family_index: queue_family,
                flags: vk::CommandPoolCreateFlags::TRANSIENT
                    | vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
                ..Default::default()
            };
            let cmd_pool = device
                .create_command_pool(&pool_info, None)
                .context("create_command_pool")?;

            let depth_format = pick_depth_format(&instance, phys)?;

            let props = instance.get_physical_device_properties(phys);
            let name = props
                .device_name_as_c_str()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            info!("Vulkan device: {name} (queue family {queue_family}, vsync {vsync:?})");

            Ok(Self {
                _entry: entry,
                instance,
                surface_loader,
                surface,
                phys,
                device,
                queue,
                swapchain_loader,
                cmd_pool,
                depth_format,
                vsync,
            })
        }
    }

    pub fn raw(&self) -> &ash::Device {
        &self.device
    }

    pub fn vsync(&self) -> VkVsyncMode {
        self.vsync
    }

    pub(crate) fn queue(&self) -> vk::Queue {
        self.queue
    }

    pub(crate) fn swapchain_loader(&self) -> &swapchain::Device {
        &self.swapchain_loader
    }

    pub(crate) fn surface(&self) -> vk::SurfaceKHR {
        self.surface
    }

    pub(crate) fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    pub(crate) fn surface_support(
        &self,
    ) -> Result<(
        vk::SurfaceCapabilitiesKHR,
        Vec<vk::SurfaceFormatKHR>,
        Vec<vk::PresentModeKHR>,
    )> {
        unsafe {
            let l = &self.surface_loader;
            let caps = l
                .get_physical_device_surface_capabilities(self.phys, self.surface)
                .context("surface capabilities")?;
            let formats = l
                .get_physical_device_surface_formats(self.phys, self.surface)
                .context("surface formats")?;
            let modes = l
                .get_physical_device_surface_present_modes(self.phys, self.surface)
                .context("surface present modes")?;
            Ok((caps, formats, modes))
        }
    }

    pub(crate) fn find_memory_type(
        &self,
        type_bits: u32,
        req: vk::MemoryPropertyFlags,
    ) -> Result<u32> {
        let mem = unsafe { self.instance.get_physical_device_memory_properties(self.phys) };
        (0..mem.memory_type_count)
            .find(|&i| {
                (type_bits & (1 << i)) != 0
                    && mem.memory_types[i as usize].property_flags.contains(req)
            })
            .ok_or_else(|| anyhow!("no memory type with {req:?}"))
    }

    pub(crate) fn create_buffer(
        &self,
        size: vk::DeviceSize,
        usage: vk::BufferUsageFlags,
        props: vk::MemoryPropertyFlags,
    ) -> Result<(vk::Buffer, vk::DeviceMemory)> {
        unsafe {
            let bci = vk::BufferCreateInfo {
                s_type: vk::StructureType::BUFFER_CREATE_INFO,
                size,
                usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                ..Default::default()
            };
            let buf = self.device.create_buffer(&bci, None)?;
            let req = self.device.get_buffer_memory_requirements(buf);
            let mem_type = self.find_memory_type(req.memory_type_bits, props)?;
            let mai = vk::MemoryAllocateInfo {
                s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
                allocation_size: req.size,
                memory_type_index: mem_type,
                ..Default::default()
            };
            let mem = self.device.allocate_memory(&mai, None)?;
            self.device.bind_buffer_memory(buf, mem, 0)?;
            Ok((buf, mem))
        }
    }
}

impl GraphicsDevice for VkDevice {
    type CommandBuffer = vk::CommandBuffer;
    type RenderPass = vk::RenderPass;
    type Framebuffer = vk::Framebuffer;

    fn wait_idle(&self) -> Result<(), RenderError> {
        unsafe { self.device.device_wait_idle() }
            .map_err(|e| RenderError::backend("device_wait_idle", e))
    }

    fn allocate_command_buffers(
        &self,
        count: usize,
    ) -> Result<Vec<vk::CommandBuffer>, RenderError> {
        let alloc_info = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.cmd_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: count as u32,
            ..Default::default()
        };
        unsafe { self.device.allocate_command_buffers(&alloc_info) }
            .map_err(|e| RenderError::backend("allocate_command_buffers", e))
    }

    fn free_command_buffers(&self, buffers: &[vk::CommandBuffer]) {
        if buffers.is_empty() {
            return;
        }
        unsafe { self.device.free_command_buffers(self.cmd_pool, buffers) };
    }

    fn begin_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<(), RenderError> {
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        unsafe { self.device.begin_command_buffer(cmd, &begin) }
            .map_err(|e| RenderError::backend("begin_command_buffer", e))
    }

    fn end_command_buffer(&self, cmd: vk::CommandBuffer) -> Result<(), RenderError> {
        unsafe { self.device.end_command_buffer(cmd) }
            .map_err(|e| RenderError::backend("end_command_buffer", e))
    }

    fn cmd_begin_render_pass(
        &self,
        cmd: vk::CommandBuffer,
        target: &RenderTarget<vk::RenderPass, vk::Framebuffer>,
        clear: &ClearValues,
    ) {
        let clears = [
            vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: clear.color,
                },
            },
            vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: clear.depth,
                    stencil: clear.stencil,
                },
            },
        ];
        let rp_begin = vk::RenderPassBeginInfo {
            s_type: vk::StructureType::RENDER_PASS_BEGIN_INFO,
            render_pass: target.render_pass,
            framebuffer: target.framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: to_extent(target.extent),
            },
            clear_value_count: clears.len() as u32,
            p_clear_values: clears.as_ptr(),
            ..Default::default()
        };
        unsafe {
            self.device
                .cmd_begin_render_pass(cmd, &rp_begin, vk::SubpassContents::INLINE)
        };
    }

    fn cmd_set_viewport(&self, cmd: vk::CommandBuffer, viewport: &Viewport) {
        let vp = vk::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
            min_depth: viewport.min_depth,
            max_depth: viewport.max_depth,
        };
        unsafe { self.device.cmd_set_viewport(cmd, 0, &[vp]) };
    }

    fn cmd_set_scissor(&self, cmd: vk::CommandBuffer, extent: RenderSize) {
        let scissor = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: to_extent(extent),
        };
        unsafe { self.device.cmd_set_scissor(cmd, 0, &[scissor]) };
    }

    fn cmd_end_render_pass(&self, cmd: vk::CommandBuffer) {
        unsafe { self.device.cmd_end_render_pass(cmd) };
    }
}

pub(crate) fn to_extent(size: RenderSize) -> vk::Extent2D {
    vk::Extent2D {
        width: size.width,
        height: size.height,
    }
}

pub(crate) fn from_extent(extent: vk::Extent2D) -> RenderSize {
    RenderSize::new(extent.width, extent.height)
}
