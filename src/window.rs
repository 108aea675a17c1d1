// Window surface provider
//
// Owns the native window the Vulkan surface is bound to. Event polling is
// driven by winit's event loop; this type only tracks whether a close was
// requested.

use crate::config::WindowConfig;
use anyhow::{Context, Result};
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle};
use winit::dpi::LogicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window, WindowId};

pub struct AppWindow {
    window: Window,
    close_requested: bool,
}

impl AppWindow {
    pub fn create(event_loop: &ActiveEventLoop, config: &WindowConfig) -> Result<Self> {
        let attributes = Window::default_attributes()
            .with_title(&config.title)
            .with_inner_size(LogicalSize::new(config.width, config.height))
            .with_resizable(config.resizable);

        let window = event_loop
            .create_window(attributes)
            .context("Failed to create window")?;

        log::info!("Window: {}x{} ({})", config.width, config.height, config.title);

        Ok(Self {
            window,
            close_requested: false,
        })
    }

    pub fn id(&self) -> WindowId {
        self.window.id()
    }

    pub fn request_close(&mut self) {
        self.close_requested = true;
    }

    pub fn should_close(&self) -> bool {
        self.close_requested
    }
}

unsafe impl HasRawWindowHandle for AppWindow {
    fn raw_window_handle(&self) -> RawWindowHandle {
        self.window.raw_window_handle()
    }
}

unsafe impl HasRawDisplayHandle for AppWindow {
    fn raw_display_handle(&self) -> RawDisplayHandle {
        self.window.raw_display_handle()
    }
}

impl Drop for AppWindow {
    fn drop(&mut self) {
        log::debug!("Destroying window");
    }
}
