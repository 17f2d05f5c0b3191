// SPDX-License-Identifier: CEPL-1.0
use tracing::{debug, info, warn};

use crate::{
    Acquire, ClearValues, GraphicsDevice, PresentStatus, RenderError, RenderSize, RenderTarget,
    Surface, SwapChain, Viewport,
};

/// Owns the swap chain and one command buffer per swap chain image, and runs
/// the begin/end frame protocol on top of them.
///
/// The window and device are borrowed and must outlive the renderer.
pub struct FrameRenderer<'a, W, D, S>
where
    W: Surface,
    D: GraphicsDevice,
    S: SwapChain<D>,
{
    window: &'a W,
    device: &'a D,
    // None only between a failed recreation and shutdown.
    swap_chain: Option<S>,
    command_buffers: Vec<D::CommandBuffer>,
    current_image_index: u32,
    frame_started: bool,
    clear: ClearValues,
}

impl<'a, W, D, S> FrameRenderer<'a, W, D, S>
where
    W: Surface,
    D: GraphicsDevice,
    S: SwapChain<D>,
{
    /// Builds the initial swap chain and its command buffers.
    pub fn new(window: &'a W, device: &'a D) -> Result<Self, RenderError> {
        let mut renderer = Self {
            window,
            device,
            swap_chain: None,
            command_buffers: Vec::new(),
            current_image_index: 0,
            frame_started: false,
            clear: ClearValues::default(),
        };
        renderer.recreate_swap_chain()?;
        Ok(renderer)
    }

    pub fn is_frame_in_progress(&self) -> bool {
        self.frame_started
    }

    /// Image being recorded, only while a frame is in progress.
    pub fn current_image_index(&self) -> Option<u32> {
        self.frame_started.then_some(self.current_image_index)
    }

    pub fn current_command_buffer(&self) -> Result<D::CommandBuffer, RenderError> {
        if !self.frame_started {
            return Err(RenderError::NoFrameInProgress);
        }
        self.command_buffer(self.current_image_index)
    }

    pub fn swap_chain(&self) -> Option<&S> {
        self.swap_chain.as_ref()
    }

    pub fn swap_chain_render_pass(&self) -> Result<D::RenderPass, RenderError> {
        Ok(self.chain()?.render_pass())
    }

    pub fn extent(&self) -> Result<RenderSize, RenderError> {
        Ok(self.chain()?.extent())
    }

    pub fn aspect_ratio(&self) -> Result<f32, RenderError> {
        Ok(self.extent()?.aspect_ratio())
    }

    pub fn command_buffers(&self) -> &[D::CommandBuffer] {
        &self.command_buffers
    }

    pub fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear.color = rgba;
    }

    /// Acquires the next image and starts recording its command buffer.
    ///
    /// Returns `Ok(None)` when the surface was out of date; the chain has been
    /// rebuilt and the caller should skip drawing until the next tick.
    pub fn begin_frame(&mut self) -> Result<Option<D::CommandBuffer>, RenderError> {
        if self.frame_started {
            return Err(RenderError::FrameAlreadyInProgress);
        }

        let index = match self.chain_mut()?.acquire_next_image()? {
            Acquire::OutOfDate => {
                debug!("acquire: surface out of date, rebuilding swap chain");
                self.recreate_swap_chain()?;
                return Ok(None);
            }
            Acquire::Image { index, suboptimal } => {
                if suboptimal {
                    debug!("acquire: image {} is suboptimal, presenting anyway", index);
                }
                index
            }
        };

        let cmd = self.command_buffer(index)?;
        self.device.begin_command_buffer(cmd)?;

        self.current_image_index = index;
        self.frame_started = true;
        Ok(Some(cmd))
    }

    /// Finishes recording, submits and presents the current image.
    ///
    /// A stale or suboptimal surface, or a pending resize, rebuilds the chain
    /// after the present so the drawn frame is still shown. The frame is over
    /// when this returns, whatever the outcome.
    pub fn end_frame(&mut self) -> Result<(), RenderError> {
        if !self.frame_started {
            return Err(RenderError::NoFrameInProgress);
        }
        self.frame_started = false;

        let index = self.current_image_index;
        let cmd = self.command_buffer(index)?;
        self.device.end_command_buffer(cmd)?;

        let status = self.chain_mut()?.submit_command_buffers(cmd, index)?;
        let resized = self.window.was_resized();

        if status != PresentStatus::Optimal || resized {
            debug!("present: status={:?} resized={}, rebuilding swap chain", status, resized);
            self.window.reset_resized_flag();
            self.recreate_swap_chain()?;
        }
        Ok(())
    }

    /// Begins the single render pass of the frame on `cmd`, clearing color
    /// and depth, and sets a full-surface viewport and scissor.
    pub fn begin_render_pass(&self, cmd: D::CommandBuffer) -> Result<(), RenderError> {
        self.check_current(cmd)?;

        let chain = self.chain()?;
        let target = RenderTarget {
            render_pass: chain.render_pass(),
            framebuffer: chain.framebuffer(self.current_image_index),
            extent: chain.extent(),
        };

        self.device.cmd_begin_render_pass(cmd, &target, &self.clear);
        self.device.cmd_set_viewport(cmd, &Viewport::full(target.extent));
        self.device.cmd_set_scissor(cmd, target.extent);
        Ok(())
    }

    pub fn end_render_pass(&self, cmd: D::CommandBuffer) -> Result<(), RenderError> {
        self.check_current(cmd)?;
        self.device.cmd_end_render_pass(cmd);
        Ok(())
    }

    /// Rebuilds the chain against the window's current size.
    ///
    /// Blocks on window events while minimized and waits for the device to go
    /// idle before the old chain is handed to its replacement. Closing the
    /// window while minimized ends the wait with [`RenderError::WindowClosed`].
    fn recreate_swap_chain(&mut self) -> Result<(), RenderError> {
        let mut extent = self.window.extent();
        while extent.is_degenerate() {
            // a closed window never reports a new size
            if self.window.should_close() {
                return Err(RenderError::WindowClosed);
            }
            self.window.wait_events();
            extent = self.window.extent();
        }

        self.device.wait_idle()?;

        let chain = match self.swap_chain.take() {
            None => S::create(self.device, extent, None)?,
            Some(old) => {
                let previous = old.formats();
                let chain = S::create(self.device, extent, Some(old))?;
                if chain.compare_formats(&previous) {
                    return Err(RenderError::FormatDrift {
                        previous: format!("{previous:?}"),
                        current: format!("{:?}", chain.formats()),
                    });
                }
                chain
            }
        };

        let image_count = chain.image_count();
        info!(
            "swap chain ready ({}x{}, {} images, formats {:?})",
            chain.extent().width,
            chain.extent().height,
            image_count,
            chain.formats()
        );
        if chain.extent() != extent {
            warn!(
                "surface picked {}x{} instead of requested {}x{}",
                chain.extent().width,
                chain.extent().height,
                extent.width,
                extent.height
            );
        }
        self.swap_chain = Some(chain);

        if image_count != self.command_buffers.len() {
            self.reallocate_command_buffers(image_count)?;
        }
        Ok(())
    }

    fn reallocate_command_buffers(&mut self, count: usize) -> Result<(), RenderError> {
        if !self.command_buffers.is_empty() {
            debug!(
                "image count {} -> {}, reallocating command buffers",
                self.command_buffers.len(),
                count
            );
            self.free_command_buffers();
        }
        self.command_buffers = self.device.allocate_command_buffers(count)?;
        Ok(())
    }

    fn free_command_buffers(&mut self) {
        if !self.command_buffers.is_empty() {
            self.device.free_command_buffers(&self.command_buffers);
            self.command_buffers.clear();
        }
    }

    fn check_current(&self, cmd: D::CommandBuffer) -> Result<(), RenderError> {
        if self.current_command_buffer()? != cmd {
            return Err(RenderError::CommandBufferMismatch);
        }
        Ok(())
    }

    fn command_buffer(&self, index: u32) -> Result<D::CommandBuffer, RenderError> {
        self.command_buffers
            .get(index as usize)
            .copied()
            .ok_or(RenderError::ImageIndexOutOfRange {
                index,
                count: self.command_buffers.len(),
            })
    }

    fn chain(&self) -> Result<&S, RenderError> {
        self.swap_chain.as_ref().ok_or(RenderError::NoSwapChain)
    }

    fn chain_mut(&mut self) -> Result<&mut S, RenderError> {
        self.swap_chain.as_mut().ok_or(RenderError::NoSwapChain)
    }
}

impl<W, D, S> Drop for FrameRenderer<'_, W, D, S>
where
    W: Surface,
    D: GraphicsDevice,
    S: SwapChain<D>,
{
    fn drop(&mut self) {
        self.free_command_buffers();
    }
}
