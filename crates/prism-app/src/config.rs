// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use prism_math::Vec2;
use prism_render_vk::{VkVsyncMode, DEFAULT_FRAG_SPV, DEFAULT_VERT_SPV};
use prism_scene::mesh::{self, Vertex2d};
use serde::Deserialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum VsyncMode {
    Fifo,
    #[default]
    Mailbox,
}

impl From<VsyncMode> for VkVsyncMode {
    fn from(mode: VsyncMode) -> Self {
        match mode {
            VsyncMode::Fifo => VkVsyncMode::Fifo,
            VsyncMode::Mailbox => VkVsyncMode::Mailbox,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        Self {
            title: "Prism".to_owned(),
            width: 800,
            height: 600,
        }
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub vsync_mode: VsyncMode,
    pub vert_shader: PathBuf,
    pub frag_shader: PathBuf,
}

impl Default for RenderCfg {
    fn default() -> Self {
        Self {
            clear_color: [0.01, 0.01, 0.01, 1.0],
            vsync_mode: VsyncMode::default(),
            vert_shader: PathBuf::from(DEFAULT_VERT_SPV),
            frag_shader: PathBuf::from(DEFAULT_FRAG_SPV),
        }
    }
}

/// Shape every spiral object is drawn with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MeshKind {
    #[default]
    Triangle,
    Sierpinski,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneCfg {
    pub triangles: usize,
    pub mesh: MeshKind,
    /// Recursion depth, only read for `mesh = "sierpinski"`.
    pub sierpinski_depth: u32,
}

impl Default for SceneCfg {
    fn default() -> Self {
        Self {
            triangles: 40,
            mesh: MeshKind::default(),
            sierpinski_depth: 5,
        }
    }
}

impl SceneCfg {
    pub fn vertices(&self) -> Vec<Vertex2d> {
        match self.mesh {
            MeshKind::Triangle => mesh::triangle(),
            MeshKind::Sierpinski => mesh::sierpinski(
                self.sierpinski_depth,
                Vec2::new(-0.5, 0.5),
                Vec2::new(0.5, 0.5),
                Vec2::new(0.0, -0.5),
            ),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
    pub scene: SceneCfg,
}

/// Reads `path`. A missing file gives the defaults; so does a malformed one,
/// after a warning.
pub fn load(path: &Path) -> AppCfg {
    match fs::read_to_string(path) {
        Ok(s) => parse(&s).unwrap_or_else(|e| {
            warn!("ignoring {}: {e}", path.display());
            AppCfg::default()
        }),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("no {} found, using defaults", path.display());
            AppCfg::default()
        }
        Err(e) => {
            warn!("cannot read {}: {e}", path.display());
            AppCfg::default()
        }
    }
}

pub fn parse(s: &str) -> Result<AppCfg, toml::de::Error> {
    toml::from_str(s)
}
