// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use swapline_core::{init_tracing, FrameRateCounter};
use swapline_platform::DesktopWindow;
use swapline_render::Presenter;
use swapline_render_vk::{VkDevice, VkDeviceConfig};
use tracing::{error, info};

mod config;

use config::AppCfg;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// TOML config file
    #[arg(long, default_value = "swapline.toml")]
    config: PathBuf,

    /// Size of the frames-in-flight ring (overrides the config file)
    #[arg(long)]
    frames_in_flight: Option<usize>,

    /// Force the Vulkan validation layer on
    #[arg(long, conflicts_with = "no_validation")]
    validation: bool,

    /// Force the Vulkan validation layer off
    #[arg(long)]
    no_validation: bool,

    /// Exit after presenting this many frames
    #[arg(long)]
    max_frames: Option<u64>,
}

impl Args {
    fn validation(&self) -> Option<bool> {
        match (self.validation, self.no_validation) {
            (true, _) => Some(true),
            (_, true) => Some(false),
            _ => None,
        }
    }
}

fn main() -> Result<()> {
    init_tracing("info");
    let args = Args::parse();
    let cfg = AppCfg::load(&args.config);
    let engine = cfg.engine_config(args.frames_in_flight);

    // Outlives the device: the surface belongs to this window.
    let mut window = DesktopWindow::open(cfg.window_spec())?;

    let vk_cfg = VkDeviceConfig {
        app_name: cfg.window.title.clone(),
        validation: args.validation().unwrap_or(cfg.render.validation),
    };
    let device = VkDevice::new(window.window(), window.window(), &vk_cfg)?;

    let mut presenter = Presenter::new(device, &mut window, &engine).context("presenter setup")?;

    let mut fps = FrameRateCounter::new();
    let mut presented = 0u64;
    let max_frames = args.max_frames;
    let outcome = presenter.run(&mut window, |report| {
        if report.image_index.is_some() {
            presented += 1;
            fps.frame();
        }
        max_frames.map_or(true, |max| presented < max)
    });

    let frames = match outcome {
        Ok(frames) => frames,
        Err(e) => {
            error!("frame loop failed: {e}");
            if let Err(e) = presenter.shutdown() {
                error!("shutdown: {e}");
            }
            return Err(e.into());
        }
    };
    presenter.shutdown().context("shutdown")?;
    info!(frames, "bye");
    Ok(())
}
