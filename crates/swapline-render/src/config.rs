// SPDX-License-Identifier: CEPL-1.0
use crate::commands::DrawCall;
use crate::error::{FrameError, FrameResult};
use crate::surface::{ColorSpace, PixelFormat, PresentMode, SurfaceFormat};

pub const DEFAULT_FRAMES_IN_FLIGHT: usize = 2;

/// Engine-wide constants, fixed at construction.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineConfig {
    /// Size of the frame-slot ring. At least 2.
    pub max_frames_in_flight: usize,
    /// Present modes in priority order. FIFO is the implicit last resort.
    pub present_modes: Vec<PresentMode>,
    pub preferred_format: SurfaceFormat,
    pub clear_color: [f32; 4],
    pub draw: DrawCall,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_frames_in_flight: DEFAULT_FRAMES_IN_FLIGHT,
            present_modes: vec![PresentMode::Mailbox, PresentMode::Fifo],
            preferred_format: SurfaceFormat::new(
                PixelFormat::B8G8R8A8_UNORM,
                ColorSpace::SRGB_NONLINEAR,
            ),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            draw: DrawCall::TRIANGLE,
        }
    }
}

impl EngineConfig {
    pub fn with_frames_in_flight(mut self, frames: usize) -> Self {
        self.max_frames_in_flight = frames;
        self
    }

    /// Puts `mode` at the head of the priority list.
    pub fn with_present_mode(mut self, mode: PresentMode) -> Self {
        self.present_modes.retain(|&m| m != mode);
        self.present_modes.insert(0, mode);
        self
    }

    pub fn with_clear_color(mut self, rgba: [f32; 4]) -> Self {
        self.clear_color = rgba;
        self
    }

    pub fn validate(&self) -> FrameResult<()> {
        if self.max_frames_in_flight < 2 {
            return Err(FrameError::InvalidConfig(format!(
                "max_frames_in_flight must be at least 2, got {}",
                self.max_frames_in_flight
            )));
        }
        if self.draw.vertex_count == 0 || self.draw.instance_count == 0 {
            return Err(FrameError::InvalidConfig(
                "draw call must cover at least one vertex and one instance".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_valid() {
        let cfg = EngineConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.max_frames_in_flight, 2);
        assert_eq!(cfg.present_modes, vec![PresentMode::Mailbox, PresentMode::Fifo]);
    }

    #[test]
    fn single_frame_ring_is_rejected() {
        let cfg = EngineConfig::default().with_frames_in_flight(1);
        assert!(matches!(cfg.validate(), Err(FrameError::InvalidConfig(_))));
    }

    #[test]
    fn preferred_present_mode_moves_to_front() {
        let cfg = EngineConfig::default().with_present_mode(PresentMode::Fifo);
        assert_eq!(cfg.present_modes, vec![PresentMode::Fifo, PresentMode::Mailbox]);

        let cfg = EngineConfig::default().with_present_mode(PresentMode::Immediate);
        assert_eq!(
            cfg.present_modes,
            vec![PresentMode::Immediate, PresentMode::Mailbox, PresentMode::Fifo]
        );
    }
}
