// SPDX-License-Identifier: CEPL-1.0
use std::fmt;

use crate::{ClearValues, RenderError, RenderSize, Viewport};

/// The window as seen by the frame lifecycle.
///
/// All methods take `&self`: the renderer and the run loop share the window
/// on one thread, and the resize flag is a plain cell.
pub trait Surface {
    /// Current drawable size in pixels. Zero while minimized.
    fn extent(&self) -> RenderSize;
    fn was_resized(&self) -> bool;
    fn reset_resized_flag(&self);
    fn should_close(&self) -> bool;
    /// Dispatches pending events without blocking.
    fn poll_events(&self);
    /// Blocks until at least one event arrives, then dispatches it.
    fn wait_events(&self);
}

/// Logical device plus the pool command buffers are allocated from.
pub trait GraphicsDevice {
    type CommandBuffer: Copy + PartialEq + fmt::Debug;
    type RenderPass: Copy + fmt::Debug;
    type Framebuffer: Copy + fmt::Debug;

    /// Blocks until no submitted work is pending.
    fn wait_idle(&self) -> Result<(), RenderError>;

    fn allocate_command_buffers(&self, count: usize)
        -> Result<Vec<Self::CommandBuffer>, RenderError>;
    fn free_command_buffers(&self, buffers: &[Self::CommandBuffer]);

    fn begin_command_buffer(&self, cmd: Self::CommandBuffer) -> Result<(), RenderError>;
    fn end_command_buffer(&self, cmd: Self::CommandBuffer) -> Result<(), RenderError>;

    fn cmd_begin_render_pass(
        &self,
        cmd: Self::CommandBuffer,
        target: &RenderTarget<Self::RenderPass, Self::Framebuffer>,
        clear: &ClearValues,
    );
    fn cmd_set_viewport(&self, cmd: Self::CommandBuffer, viewport: &Viewport);
    fn cmd_set_scissor(&self, cmd: Self::CommandBuffer, extent: RenderSize);
    fn cmd_end_render_pass(&self, cmd: Self::CommandBuffer);
}

/// Render pass + framebuffer for one swap chain image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderTarget<P, F> {
    pub render_pass: P,
    pub framebuffer: F,
    pub extent: RenderSize,
}

/// Outcome of asking the chain for the next image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquire {
    Image { index: u32, suboptimal: bool },
    /// No image is usable until the chain is rebuilt.
    OutOfDate,
}

/// Outcome of submit + present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresentStatus {
    Optimal,
    Suboptimal,
    OutOfDate,
}

/// Presentable images, their framebuffers and the frame synchronization.
///
/// Any failure other than the out-of-date / suboptimal statuses comes back
/// as an `Err` and is fatal.
pub trait SwapChain<D: GraphicsDevice>: Sized {
    /// Image and depth formats; drift between generations is fatal.
    type Formats: Copy + PartialEq + fmt::Debug;

    /// Builds a chain for `extent`. `previous` is consumed so its resources
    /// can be handed over to the new chain and then released.
    fn create(device: &D, extent: RenderSize, previous: Option<Self>) -> Result<Self, RenderError>;

    fn acquire_next_image(&mut self) -> Result<Acquire, RenderError>;

    fn submit_command_buffers(
        &mut self,
        cmd: D::CommandBuffer,
        image_index: u32,
    ) -> Result<PresentStatus, RenderError>;

    fn image_count(&self) -> usize;
    fn render_pass(&self) -> D::RenderPass;
    fn framebuffer(&self, image_index: u32) -> D::Framebuffer;
    fn extent(&self) -> RenderSize;
    fn formats(&self) -> Self::Formats;

    /// True when image or depth format differs from `previous`.
    fn compare_formats(&self, previous: &Self::Formats) -> bool {
        self.formats() != *previous
    }
}
