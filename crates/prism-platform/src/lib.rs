// SPDX-License-Identifier: CEPL-1.0
//! Desktop window for the renderer.
//!
//! The window is driven by pumping the winit event loop from the run loop
//! instead of handing control to `run_app`, so the frame lifecycle can poll
//! without blocking and block while minimized.

use std::cell::RefCell;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use prism_render::{RenderSize, Surface};
use tracing::{debug, info};

pub use winit;

use winit::{
    application::ApplicationHandler,
    dpi::PhysicalSize,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, EventLoop},
    platform::pump_events::{EventLoopExtPumpEvents, PumpStatus},
    raw_window_handle::{HasDisplayHandle, HasWindowHandle, RawDisplayHandle, RawWindowHandle},
    window::{Window, WindowAttributes, WindowId},
};

/// Receives the window notifications the renderer cares about.
pub trait EventSink {
    fn resized(&mut self, size: RenderSize);
    fn close_requested(&mut self);
}

/// Last known extent plus the flags raised by window events.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WindowState {
    pub extent: RenderSize,
    pub resized: bool,
    pub close_requested: bool,
}

impl EventSink for WindowState {
    fn resized(&mut self, size: RenderSize) {
        self.extent = size;
        self.resized = true;
    }

    fn close_requested(&mut self) {
        self.close_requested = true;
    }
}

/// Routes a winit window event to `sink`. Other events are ignored.
pub fn dispatch(sink: &mut (impl EventSink + ?Sized), event: &WindowEvent) {
    match event {
        WindowEvent::Resized(size) => sink.resized(RenderSize::new(size.width, size.height)),
        WindowEvent::CloseRequested | WindowEvent::Destroyed => sink.close_requested(),
        _ => {}
    }
}

fn render_size(size: PhysicalSize<u32>) -> RenderSize {
    RenderSize::new(size.width, size.height)
}

struct Handler {
    attributes: Option<WindowAttributes>,
    window: Option<Window>,
    state: WindowState,
    listener: Option<Box<dyn EventSink>>,
    create_error: Option<String>,
}

impl Handler {
    fn new(attributes: WindowAttributes, listener: Option<Box<dyn EventSink>>) -> Self {
        Self {
            attributes: Some(attributes),
            window: None,
            state: WindowState::default(),
            listener,
            create_error: None,
        }
    }

    /// The window's own state sees every event first, then the listener.
    fn handle(&mut self, event: &WindowEvent) {
        dispatch(&mut self.state, event);
        if let Some(listener) = self.listener.as_deref_mut() {
            dispatch(listener, event);
        }
    }
}

impl ApplicationHandler for Handler {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        let Some(attributes) = self.attributes.take() else {
            return;
        };
        match event_loop.create_window(attributes) {
            Ok(window) => {
                self.state.extent = render_size(window.inner_size());
                self.window = Some(window);
            }
            Err(e) => {
                self.create_error = Some(e.to_string());
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        self.handle(&event);
    }
}

/// A single native window and the event loop that feeds it.
pub struct PlatformWindow {
    event_loop: RefCell<EventLoop<()>>,
    handler: RefCell<Handler>,
}

impl PlatformWindow {
    /// Opens the window. `listener`, when given, is registered before the
    /// first event and receives every resize and close request.
    pub fn new(
        title: &str,
        width: u32,
        height: u32,
        listener: Option<Box<dyn EventSink>>,
    ) -> Result<Self> {
        let event_loop = EventLoop::new().context("EventLoop::new")?;
        let attributes = Window::default_attributes()
            .with_title(title)
            .with_inner_size(PhysicalSize::new(width, height));

        let window = Self {
            event_loop: RefCell::new(event_loop),
            handler: RefCell::new(Handler::new(attributes, listener)),
        };

        // the native window only exists once the loop has resumed
        while window.handler.borrow().window.is_none() {
            if let PumpStatus::Exit(code) = window.pump(Some(Duration::ZERO)) {
                let handler = window.handler.borrow();
                return Err(match &handler.create_error {
                    Some(e) => anyhow!("create_window: {e}"),
                    None => anyhow!("event loop exited ({code}) before the window was created"),
                });
            }
        }

        let extent = window.extent();
        info!("window \"{title}\" ready ({}x{})", extent.width, extent.height);
        Ok(window)
    }

    fn pump(&self, timeout: Option<Duration>) -> PumpStatus {
        let mut handler = self.handler.borrow_mut();
        let status = self
            .event_loop
            .borrow_mut()
            .pump_app_events(timeout, &mut *handler);
        if let PumpStatus::Exit(code) = status {
            debug!("event loop exited with {code}");
            handler.state.close_requested = true;
        }
        status
    }

    /// Raw handles for surface creation. The window must outlive the surface.
    pub fn raw_handles(&self) -> Result<(RawDisplayHandle, RawWindowHandle)> {
        let handler = self.handler.borrow();
        let window = handler
            .window
            .as_ref()
            .ok_or_else(|| anyhow!("window is gone"))?;
        let display = window.display_handle().context("display_handle")?.as_raw();
        let raw = window.window_handle().context("window_handle")?.as_raw();
        Ok((display, raw))
    }
}

impl Surface for PlatformWindow {
    fn extent(&self) -> RenderSize {
        let handler = self.handler.borrow();
        match &handler.window {
            Some(window) => render_size(window.inner_size()),
            None => handler.state.extent,
        }
    }

    fn was_resized(&self) -> bool {
        self.handler.borrow().state.resized
    }

    fn reset_resized_flag(&self) {
        self.handler.borrow_mut().state.resized = false;
    }

    fn should_close(&self) -> bool {
        self.handler.borrow().state.close_requested
    }

    fn poll_events(&self) {
        self.pump(Some(Duration::ZERO));
    }

    fn wait_events(&self) {
        self.pump(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn resize_records_extent_and_raises_flag() {
        let mut state = WindowState::default();
        dispatch(&mut state, &WindowEvent::Resized(PhysicalSize::new(800, 600)));
        assert_eq!(state.extent, RenderSize::new(800, 600));
        assert!(state.resized);
        assert!(!state.close_requested);
    }

    #[test]
    fn minimize_reports_zero_extent() {
        let mut state = WindowState::default();
        dispatch(&mut state, &WindowEvent::Resized(PhysicalSize::new(0, 0)));
        assert!(state.extent.is_degenerate());
        assert!(state.resized);
    }

    #[test]
    fn close_request_is_latched() {
        let mut state = WindowState::default();
        dispatch(&mut state, &WindowEvent::CloseRequested);
        dispatch(&mut state, &WindowEvent::Focused(true));
        assert!(state.close_requested);
        assert!(!state.resized);
    }

    #[derive(Default)]
    struct Counting {
        resizes: Vec<RenderSize>,
        closes: usize,
    }

    impl EventSink for Counting {
        fn resized(&mut self, size: RenderSize) {
            self.resizes.push(size);
        }
        fn close_requested(&mut self) {
            self.closes += 1;
        }
    }

    struct Shared(Rc<RefCell<Counting>>);

    impl EventSink for Shared {
        fn resized(&mut self, size: RenderSize) {
            self.0.borrow_mut().resized(size);
        }
        fn close_requested(&mut self) {
            self.0.borrow_mut().close_requested();
        }
    }

    #[test]
    fn registered_listener_sees_what_the_window_sees() {
        let seen = Rc::new(RefCell::new(Counting::default()));
        let mut handler = Handler::new(
            Window::default_attributes(),
            Some(Box::new(Shared(Rc::clone(&seen)))),
        );

        handler.handle(&WindowEvent::Resized(PhysicalSize::new(320, 200)));
        handler.handle(&WindowEvent::CloseRequested);

        assert_eq!(handler.state.extent, RenderSize::new(320, 200));
        assert!(handler.state.resized && handler.state.close_requested);
        assert_eq!(seen.borrow().resizes, vec![RenderSize::new(320, 200)]);
        assert_eq!(seen.borrow().closes, 1);
    }

    #[test]
    fn window_state_works_without_a_listener() {
        let mut handler = Handler::new(Window::default_attributes(), None);
        handler.handle(&WindowEvent::Resized(PhysicalSize::new(64, 48)));
        assert_eq!(handler.state.extent, RenderSize::new(64, 48));
    }

    #[test]
    fn custom_sinks_see_every_event() {
        let mut sink = Counting::default();
        for (w, h) in [(640, 480), (1024, 768)] {
            dispatch(&mut sink, &WindowEvent::Resized(PhysicalSize::new(w, h)));
        }
        dispatch(&mut sink, &WindowEvent::Destroyed);
        assert_eq!(
            sink.resizes,
            vec![RenderSize::new(640, 480), RenderSize::new(1024, 768)]
        );
        assert_eq!(sink.closes, 1);
    }
}
