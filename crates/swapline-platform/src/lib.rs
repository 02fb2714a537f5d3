// SPDX-License-Identifier: CEPL-1.0
#![deny(unsafe_op_in_unsafe_fn)]
//! Desktop window for the presenter.
//!
//! The event loop is pumped from the frame loop instead of owning it, so the
//! presenter can block on events only while the window is minimized.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use swapline_render::{Extent2D, WindowSurface};
use tracing::{debug, info};
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::error::OsError;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, EventLoop};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Window, WindowId};

pub use winit;

/// Initial window parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WindowSpec {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self {
            title: "Vulkan window".into(),
            width: 800,
            height: 600,
        }
    }
}

struct Host {
    spec: WindowSpec,
    created: Option<Window>,
    window_id: Option<WindowId>,
    error: Option<OsError>,
    resized: bool,
    close_requested: bool,
}

impl ApplicationHandler for Host {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window_id.is_some() {
            return;
        }
        let attrs = Window::default_attributes()
            .with_title(self.spec.title.clone())
            .with_inner_size(LogicalSize::new(
                self.spec.width as f64,
                self.spec.height as f64,
            ))
            .with_resizable(true);
        match event_loop.create_window(attrs) {
            Ok(window) => {
                self.window_id = Some(window.id());
                self.created = Some(window);
            }
            Err(e) => {
                self.error = Some(e);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        if self.window_id != Some(window_id) {
            return;
        }
        match event {
            WindowEvent::CloseRequested => {
                info!("CloseRequested");
                self.close_requested = true;
                event_loop.exit();
            }
            WindowEvent::Resized(size) => {
                debug!("Resized → {}x{}", size.width, size.height);
                self.resized = true;
            }
            _ => {}
        }
    }
}

/// A winit window whose events are handled on demand.
pub struct DesktopWindow {
    // Dropped before the event loop.
    window: Window,
    host: Host,
    event_loop: EventLoop<()>,
    exited: bool,
}

impl DesktopWindow {
    /// Creates the event loop and pumps it until the window exists.
    pub fn open(spec: WindowSpec) -> Result<Self> {
        let mut event_loop = EventLoop::new().context("create event loop")?;
        let mut host = Host {
            spec,
            created: None,
            window_id: None,
            error: None,
            resized: false,
            close_requested: false,
        };

        let window = loop {
            let status = event_loop.pump_app_events(Some(Duration::ZERO), &mut host);
            if let Some(e) = host.error.take() {
                return Err(anyhow!("create_window: {e}"));
            }
            if let Some(window) = host.created.take() {
                break window;
            }
            if let PumpStatus::Exit(code) = status {
                bail!("event loop exited with {code} before the window opened");
            }
        };
        // The first size the engine sees is the current one.
        host.resized = false;

        let size = window.inner_size();
        info!("window open ({}x{})", size.width, size.height);
        Ok(Self {
            window,
            host,
            event_loop,
            exited: false,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    fn pump(&mut self, timeout: Option<Duration>) {
        if self.exited {
            return;
        }
        if let PumpStatus::Exit(code) = self.event_loop.pump_app_events(timeout, &mut self.host) {
            debug!(code, "event loop exited");
            self.exited = true;
        }
    }
}

impl WindowSurface for DesktopWindow {
    fn framebuffer_extent(&self) -> Extent2D {
        let size = self.window.inner_size();
        Extent2D::new(size.width, size.height)
    }

    fn should_continue(&self) -> bool {
        !self.exited && !self.host.close_requested
    }

    fn take_resized(&mut self) -> bool {
        std::mem::take(&mut self.host.resized)
    }

    fn poll_events(&mut self) {
        self.pump(Some(Duration::ZERO));
    }

    fn wait_events(&mut self) {
        self.pump(None);
    }
}
