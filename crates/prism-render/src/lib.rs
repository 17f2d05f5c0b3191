// SPDX-License-Identifier: CEPL-1.0
//! Backend-agnostic frame lifecycle.
//!
//! [`FrameRenderer`] owns the presentation chain and the per-image command
//! buffers, enforces one frame in flight at a time and rebuilds the chain
//! when the surface goes stale or the window is resized. Backends plug in
//! through the [`Surface`], [`GraphicsDevice`] and [`SwapChain`] traits.

mod error;
mod frame;
mod traits;

pub use error::RenderError;
pub use frame::FrameRenderer;
pub use traits::{Acquire, GraphicsDevice, PresentStatus, RenderTarget, Surface, SwapChain};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Minimized windows report a zero dimension.
    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// Values written to the color and depth attachments at render-pass begin.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClearValues {
    pub color: [f32; 4],
    pub depth: f32,
    pub stencil: u32,
}

impl Default for ClearValues {
    fn default() -> Self {
        Self {
            color: [0.01, 0.01, 0.01, 1.0],
            depth: 1.0,
            stencil: 0,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub min_depth: f32,
    pub max_depth: f32,
}

impl Viewport {
    /// Covers the whole extent with the full `[0, 1]` depth range.
    pub fn full(extent: RenderSize) -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: extent.width as f32,
            height: extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        }
    }
}
