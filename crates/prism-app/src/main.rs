// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use prism_core::{init_tracing, FpsCounter};
use prism_platform::{EventSink, PlatformWindow};
use prism_render::{GraphicsDevice, RenderError, RenderSize, Surface};
use prism_render_vk::{Model, SimpleRenderSystem, VkDevice, VkFrameRenderer};
use prism_scene::{spawn_spiral, Scene};
use tracing::{error, info};

use config::{AppCfg, VsyncMode};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long, default_value = "prism.toml")]
    config: PathBuf,

    /// Exit after this many presented frames
    #[arg(long)]
    frames: Option<u64>,

    /// Override the configured present mode
    #[arg(long, value_enum)]
    vsync: Option<VsyncMode>,
}

/// Logs window events as they arrive.
struct LogEvents;

impl EventSink for LogEvents {
    fn resized(&mut self, size: RenderSize) {
        info!("Resized → {}x{}", size.width, size.height);
    }

    fn close_requested(&mut self) {
        info!("close requested");
    }
}

fn draw_loop(
    window: &PlatformWindow,
    renderer: &mut VkFrameRenderer<'_, PlatformWindow>,
    system: &SimpleRenderSystem,
    scene: &mut Scene<Rc<Model>>,
    frame_limit: Option<u64>,
) -> Result<()> {
    let mut fps = FpsCounter::new();
    let mut presented = 0u64;

    while !window.should_close() {
        window.poll_events();

        // None: the swap chain was rebuilt, try again next tick
        let cmd = match renderer.begin_frame() {
            Ok(Some(cmd)) => cmd,
            Ok(None) => continue,
            Err(RenderError::WindowClosed) => break,
            Err(e) => return Err(e.into()),
        };
        renderer.begin_render_pass(cmd)?;
        system.render_objects(cmd, scene);
        renderer.end_render_pass(cmd)?;
        match renderer.end_frame() {
            Err(RenderError::WindowClosed) => break,
            result => result?,
        }

        fps.frame();
        presented += 1;
        if frame_limit.is_some_and(|limit| presented >= limit) {
            info!("frame limit reached ({presented})");
            break;
        }
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let mut cfg: AppCfg = config::load(&args.config);
    if let Some(mode) = args.vsync {
        cfg.render.vsync_mode = mode;
    }

    let window = PlatformWindow::new(
        &cfg.window.title,
        cfg.window.width,
        cfg.window.height,
        Some(Box::new(LogEvents)),
    )?;
    let (display, raw) = window.raw_handles()?;
    let device = VkDevice::new(display, raw, cfg.render.vsync_mode.into())?;

    let mut renderer = match VkFrameRenderer::new(&window, &device) {
        Ok(renderer) => renderer,
        // closed before it was ever drawable
        Err(RenderError::WindowClosed) => {
            info!("window closed before the first frame");
            return Ok(());
        }
        Err(e) => return Err(e).context("frame renderer"),
    };
    renderer.set_clear_color(cfg.render.clear_color);

    let system = SimpleRenderSystem::new(
        &device,
        renderer.swap_chain_render_pass()?,
        &cfg.render.vert_shader,
        &cfg.render.frag_shader,
    )?;

    let model = Rc::new(Model::new(&device, &cfg.scene.vertices(), None)?);
    let mut scene = Scene::new();
    spawn_spiral(&mut scene, &model, cfg.scene.triangles);
    info!("scene ready ({} objects, {:?} mesh)", scene.len(), cfg.scene.mesh);

    let result = draw_loop(&window, &mut renderer, &system, &mut scene, args.frames);

    // resources below are released on return and may still be in use
    let idle = device.wait_idle();
    result?;
    idle?;
    info!("clean shutdown");
    Ok(())
}

fn main() -> ExitCode {
    init_tracing();
    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
