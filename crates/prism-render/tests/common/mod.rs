// SPDX-License-Identifier: CEPL-1.0
//! Scripted stand-ins for the window, the device and the swap chain.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use prism_render::{
    Acquire, ClearValues, GraphicsDevice, PresentStatus, RenderError, RenderSize, RenderTarget,
    Surface, SwapChain, Viewport,
};

pub struct MockWindow {
    queued: RefCell<VecDeque<RenderSize>>,
    current: Cell<RenderSize>,
    resized: Cell<bool>,
    closed: Cell<bool>,
    close_after_waits: Cell<Option<u32>>,
    pub waits: Cell<u32>,
    pub polls: Cell<u32>,
}

impl MockWindow {
    pub fn new(extent: RenderSize) -> Self {
        Self {
            queued: RefCell::new(VecDeque::new()),
            current: Cell::new(extent),
            resized: Cell::new(false),
            closed: Cell::new(false),
            close_after_waits: Cell::new(None),
            waits: Cell::new(0),
            polls: Cell::new(0),
        }
    }

    /// Successive `extent()` calls return these, then stick to the last one.
    pub fn queue_extents(&self, extents: &[RenderSize]) {
        self.queued.borrow_mut().extend(extents.iter().copied());
    }

    /// What a framebuffer-resize callback would do.
    pub fn resize(&self, extent: RenderSize) {
        self.current.set(extent);
        self.resized.set(true);
    }

    /// The user closes the window once `waits` event-waits have happened.
    pub fn close_after_waits(&self, waits: u32) {
        self.close_after_waits.set(Some(waits));
    }
}

impl Surface for MockWindow {
    fn extent(&self) -> RenderSize {
        if let Some(next) = self.queued.borrow_mut().pop_front() {
            self.current.set(next);
        }
        self.current.get()
    }

    fn was_resized(&self) -> bool {
        self.resized.get()
    }

    fn reset_resized_flag(&self) {
        self.resized.set(false);
    }

    fn should_close(&self) -> bool {
        self.closed.get()
    }

    fn poll_events(&self) {
        self.polls.set(self.polls.get() + 1);
    }

    fn wait_events(&self) {
        assert!(!self.closed.get(), "waiting on a closed window never returns");
        self.waits.set(self.waits.get() + 1);
        if self.close_after_waits.get() == Some(self.waits.get()) {
            self.closed.set(true);
        }
    }
}

/// Scripted result for the next acquire or present.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Ok,
    Suboptimal,
    OutOfDate,
    Fail,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Formats {
    pub image: u32,
    pub depth: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Created {
    pub generation: u32,
    pub extent: RenderSize,
    pub replaced: Option<u32>,
}

#[derive(Debug)]
pub enum Recorded {
    Begin(u64),
    End(u64),
    BeginPass(u64, RenderTarget<u32, (u32, u32)>, ClearValues),
    Viewport(u64, Viewport),
    Scissor(u64, RenderSize),
    EndPass(u64),
}

pub struct Log {
    pub acquire: VecDeque<Step>,
    pub present: VecDeque<Step>,
    pub next_image_count: usize,
    pub next_formats: Formats,
    pub fail_next_create: bool,
    pub fail_begin: bool,
    pub fail_end: bool,

    pub created: Vec<Created>,
    pub wait_idle: u32,
    pub allocated: Vec<Vec<u64>>,
    pub freed: Vec<Vec<u64>>,
    pub acquires: u32,
    pub submits: Vec<(u64, u32)>,
    pub commands: Vec<Recorded>,
    next_cmd: u64,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            acquire: VecDeque::new(),
            present: VecDeque::new(),
            next_image_count: 3,
            next_formats: Formats { image: 44, depth: 126 },
            fail_next_create: false,
            fail_begin: false,
            fail_end: false,
            created: Vec::new(),
            wait_idle: 0,
            allocated: Vec::new(),
            freed: Vec::new(),
            acquires: 0,
            submits: Vec::new(),
            commands: Vec::new(),
            next_cmd: 1,
        }
    }
}

#[derive(Clone, Default)]
pub struct MockDevice {
    pub log: Rc<RefCell<Log>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script_acquire(&self, steps: &[Step]) {
        self.log.borrow_mut().acquire.extend(steps.iter().copied());
    }

    pub fn script_present(&self, steps: &[Step]) {
        self.log.borrow_mut().present.extend(steps.iter().copied());
    }

    pub fn chains_created(&self) -> usize {
        self.log.borrow().created.len()
    }

    pub fn live_command_buffers(&self) -> usize {
        let log = self.log.borrow();
        let allocated: usize = log.allocated.iter().map(Vec::len).sum();
        let freed: usize = log.freed.iter().map(Vec::len).sum();
        allocated - freed
    }
}

impl GraphicsDevice for MockDevice {
    type CommandBuffer = u64;
    type RenderPass = u32;
    type Framebuffer = (u32, u32);

    fn wait_idle(&self) -> Result<(), RenderError> {
        self.log.borrow_mut().wait_idle += 1;
        Ok(())
    }

    fn allocate_command_buffers(&self, count: usize) -> Result<Vec<u64>, RenderError> {
        let mut log = self.log.borrow_mut();
        let start = log.next_cmd;
        log.next_cmd += count as u64;
        let buffers: Vec<u64> = (start..start + count as u64).collect();
        log.allocated.push(buffers.clone());
        Ok(buffers)
    }

    fn free_command_buffers(&self, buffers: &[u64]) {
        self.log.borrow_mut().freed.push(buffers.to_vec());
    }

    fn begin_command_buffer(&self, cmd: u64) -> Result<(), RenderError> {
        let mut log = self.log.borrow_mut();
        if log.fail_begin {
            return Err(RenderError::backend("begin_command_buffer", "out of host memory"));
        }
        log.commands.push(Recorded::Begin(cmd));
        Ok(())
    }

    fn end_command_buffer(&self, cmd: u64) -> Result<(), RenderError> {
        let mut log = self.log.borrow_mut();
        if log.fail_end {
            return Err(RenderError::backend("end_command_buffer", "out of host memory"));
        }
        log.commands.push(Recorded::End(cmd));
        Ok(())
    }

    fn cmd_begin_render_pass(
        &self,
        cmd: u64,
        target: &RenderTarget<u32, (u32, u32)>,
        clear: &ClearValues,
    ) {
        self.log
            .borrow_mut()
            .commands
            .push(Recorded::BeginPass(cmd, *target, *clear));
    }

    fn cmd_set_viewport(&self, cmd: u64, viewport: &Viewport) {
        self.log
            .borrow_mut()
            .commands
            .push(Recorded::Viewport(cmd, *viewport));
    }

    fn cmd_set_scissor(&self, cmd: u64, extent: RenderSize) {
        self.log.borrow_mut().commands.push(Recorded::Scissor(cmd, extent));
    }

    fn cmd_end_render_pass(&self, cmd: u64) {
        self.log.borrow_mut().commands.push(Recorded::EndPass(cmd));
    }
}

pub struct MockSwapChain {
    log: Rc<RefCell<Log>>,
    pub generation: u32,
    extent: RenderSize,
    image_count: usize,
    formats: Formats,
    next_image: u32,
}

impl SwapChain<MockDevice> for MockSwapChain {
    type Formats = Formats;

    fn create(
        device: &MockDevice,
        extent: RenderSize,
        previous: Option<Self>,
    ) -> Result<Self, RenderError> {
        assert!(!extent.is_degenerate(), "zero-sized swap chain requested");
        let mut log = device.log.borrow_mut();
        if log.fail_next_create {
            log.fail_next_create = false;
            return Err(RenderError::backend("create_swapchain", "surface lost"));
        }
        let generation = log.created.len() as u32;
        log.created.push(Created {
            generation,
            extent,
            replaced: previous.as_ref().map(|p| p.generation),
        });
        Ok(Self {
            log: Rc::clone(&device.log),
            generation,
            extent,
            image_count: log.next_image_count,
            formats: log.next_formats,
            next_image: 0,
        })
    }

    fn acquire_next_image(&mut self) -> Result<Acquire, RenderError> {
        let step = {
            let mut log = self.log.borrow_mut();
            log.acquires += 1;
            log.acquire.pop_front().unwrap_or(Step::Ok)
        };
        let index = self.next_image;
        match step {
            Step::OutOfDate => return Ok(Acquire::OutOfDate),
            Step::Fail => return Err(RenderError::backend("acquire_next_image", "device lost")),
            Step::Ok | Step::Suboptimal => {}
        }
        self.next_image = (self.next_image + 1) % self.image_count as u32;
        Ok(Acquire::Image {
            index,
            suboptimal: step == Step::Suboptimal,
        })
    }

    fn submit_command_buffers(&mut self, cmd: u64, image_index: u32) -> Result<PresentStatus, RenderError> {
        let mut log = self.log.borrow_mut();
        log.submits.push((cmd, image_index));
        match log.present.pop_front().unwrap_or(Step::Ok) {
            Step::Ok => Ok(PresentStatus::Optimal),
            Step::Suboptimal => Ok(PresentStatus::Suboptimal),
            Step::OutOfDate => Ok(PresentStatus::OutOfDate),
            Step::Fail => Err(RenderError::backend("queue_present", "device lost")),
        }
    }

    fn image_count(&self) -> usize {
        self.image_count
    }

    fn render_pass(&self) -> u32 {
        self.generation
    }

    fn framebuffer(&self, image_index: u32) -> (u32, u32) {
        (self.generation, image_index)
    }

    fn extent(&self) -> RenderSize {
        self.extent
    }

    fn formats(&self) -> Formats {
        self.formats
    }
}
