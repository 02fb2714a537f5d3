// SPDX-License-Identifier: CEPL-1.0
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use swapline_platform::WindowSpec;
use swapline_render::{EngineConfig, PresentMode, DEFAULT_FRAMES_IN_FLIGHT};
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VsyncMode {
    #[default]
    Mailbox,
    Fifo,
    FifoRelaxed,
    Immediate,
}

impl From<VsyncMode> for PresentMode {
    fn from(m: VsyncMode) -> Self {
        match m {
            VsyncMode::Mailbox => PresentMode::Mailbox,
            VsyncMode::Fifo => PresentMode::Fifo,
            VsyncMode::FifoRelaxed => PresentMode::FifoRelaxed,
            VsyncMode::Immediate => PresentMode::Immediate,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowCfg {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowCfg {
    fn default() -> Self {
        let spec = WindowSpec::default();
        WindowCfg {
            title: spec.title,
            width: spec.width,
            height: spec.height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderCfg {
    pub clear_color: [f32; 4],
    pub vsync_mode: VsyncMode,
    pub frames_in_flight: usize,
    pub validation: bool,
}

impl Default for RenderCfg {
    fn default() -> Self {
        RenderCfg {
            clear_color: [0.0, 0.0, 0.0, 1.0],
            vsync_mode: VsyncMode::Mailbox,
            frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            validation: cfg!(debug_assertions),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
#[serde(default)]
pub struct AppCfg {
    pub window: WindowCfg,
    pub render: RenderCfg,
}

impl AppCfg {
    pub fn parse(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    /// Missing file gives defaults; a malformed one is reported and ignored.
    pub fn load(path: &Path) -> Self {
        match fs::read_to_string(path) {
            Ok(s) => match Self::parse(&s) {
                Ok(cfg) => {
                    info!("loaded {}", path.display());
                    cfg
                }
                Err(e) => {
                    warn!("{}: {e}; using defaults", path.display());
                    AppCfg::default()
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => AppCfg::default(),
            Err(e) => {
                warn!("{}: {e}; using defaults", path.display());
                AppCfg::default()
            }
        }
    }

    pub fn window_spec(&self) -> WindowSpec {
        WindowSpec {
            title: self.window.title.clone(),
            width: self.window.width,
            height: self.window.height,
        }
    }

    pub fn engine_config(&self, frames_override: Option<usize>) -> EngineConfig {
        EngineConfig::default()
            .with_frames_in_flight(frames_override.unwrap_or(self.render.frames_in_flight))
            .with_present_mode(self.render.vsync_mode.into())
            .with_clear_color(self.render.clear_color)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg = AppCfg::parse("").unwrap();
        assert_eq!(cfg, AppCfg::default());
        assert_eq!(cfg.window.title, "Vulkan window");
        assert_eq!((cfg.window.width, cfg.window.height), (800, 600));
        assert_eq!(cfg.render.frames_in_flight, 2);
        assert_eq!(cfg.render.validation, cfg!(debug_assertions));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg = AppCfg::parse(
            r#"
            [window]
            title = "tri"

            [render]
            vsync_mode = "fifo_relaxed"
            clear_color = [0.1, 0.2, 0.3, 1.0]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.window.title, "tri");
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.render.vsync_mode, VsyncMode::FifoRelaxed);
        assert_eq!(cfg.render.clear_color, [0.1, 0.2, 0.3, 1.0]);
        assert_eq!(cfg.render.frames_in_flight, 2);
    }

    #[test]
    fn unknown_vsync_mode_is_an_error() {
        assert!(AppCfg::parse("[render]\nvsync_mode = \"adaptive\"\n").is_err());
    }

    #[test]
    fn missing_file_gives_defaults() {
        let cfg = AppCfg::load(Path::new("definitely/not/here/swapline.toml"));
        assert_eq!(cfg, AppCfg::default());
    }

    #[test]
    fn engine_config_takes_mode_and_override() {
        let mut cfg = AppCfg::default();
        cfg.render.vsync_mode = VsyncMode::Immediate;
        cfg.render.frames_in_flight = 3;

        let engine = cfg.engine_config(None);
        assert_eq!(engine.max_frames_in_flight, 3);
        assert_eq!(engine.present_modes[0], PresentMode::Immediate);

        let engine = cfg.engine_config(Some(4));
        assert_eq!(engine.max_frames_in_flight, 4);
    }

    #[test]
    fn fifo_stays_single_entry_when_chosen() {
        let mut cfg = AppCfg::default();
        cfg.render.vsync_mode = VsyncMode::Fifo;
        let engine = cfg.engine_config(None);
        assert_eq!(engine.present_modes, vec![PresentMode::Fifo, PresentMode::Mailbox]);
    }
}
