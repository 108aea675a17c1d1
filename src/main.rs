// =============================================================================
// VULKAN BOOTSTRAP - window, instance, GPU selection, logical device
// =============================================================================
//
// Brings up a graphics-capable context and hands it to whatever renders next:
//
// ┌─────────────────────────────────────────────────────────────────┐
// │  winit event loop                                               │
// │    └── AppWindow (native window)                                │
// │          └── VulkanContext                                      │
// │                ├── Instance (+ diagnostic messenger)            │
// │                ├── Surface (bound to the window)                │
// │                ├── Physical device (scored selection)           │
// │                └── Logical device + graphics/present queues     │
// └─────────────────────────────────────────────────────────────────┘
//
// Teardown runs in exact reverse order. Exit status is non-zero if
// initialization fails.
//
// =============================================================================

mod backend;
mod config;
mod logging;
mod window;

use anyhow::{Context, Result};
use backend::{AshBackend, ContextDesc, VulkanContext};
use config::Config;
use logging::Logger;
use std::process::ExitCode;
use std::sync::Arc;
use window::AppWindow;
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::WindowId,
};

// =============================================================================
// ENTRY POINT
// =============================================================================

fn main() -> Result<ExitCode> {
    // Load configuration from config.toml
    let (config, config_error) = Config::load();

    // Initialize logging
    logging::init_logging(&config.logging);
    let logger = Arc::new(Logger::stdio(config.logging.log_file_path().as_deref()));
    logger.info("Logger started");
    if let Some(e) = config_error {
        logger.warning(&format!("Failed to load {}: {:#}. Using defaults.", config::CONFIG_PATH, e));
    }
    log::debug!("Config: {:?}", config);
    log::info!("Starting Vulkan bootstrap");
    if config.validation.enabled {
        logger.verbose("Debugging mode enabled!");
        if !cfg!(debug_assertions) {
            logger.warning("Validation layers are enabled in a release build");
        }
    }

    let event_loop = EventLoop::new().context("Failed to create event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config, Arc::clone(&logger));
    event_loop.run_app(&mut app)?;

    // Reported here only, through the injected logger.
    if let Some(e) = app.error.take() {
        logger.error(&format!("{:#}", e));
        return Ok(ExitCode::FAILURE);
    }

    log::info!("Clean shutdown");
    Ok(ExitCode::SUCCESS)
}

// =============================================================================
// APPLICATION STATE
// =============================================================================

/// IMPORTANT: Field order matters for Drop! The context must go before the
/// window its surface is bound to.
struct App {
    config: Config,
    logger: Arc<Logger>,
    context: Option<VulkanContext<AshBackend>>,
    window: Option<AppWindow>,
    /// First fatal error; reported by `main` once the loop has exited.
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config, logger: Arc<Logger>) -> Self {
        Self {
            config,
            logger,
            context: None,
            window: None,
            error: None,
        }
    }

    /// Create the window, then bring up Vulkan against it.
    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = AppWindow::create(event_loop, &self.config.window)?;

        let backend = AshBackend::load()?;
        let validation = self.config.validation_config();
        let device = self.config.device_requirements();

        let context = VulkanContext::new(
            backend,
            &window,
            ContextDesc {
                app_name: &self.config.window.title,
                validation: &validation,
                device: &device,
                sink: Arc::clone(&self.logger) as Arc<dyn logging::LogSink>,
            },
        )
        .context("Vulkan initialization failed")?;

        log_context(&context);

        self.context = Some(context);
        self.window = Some(window);
        Ok(())
    }

    fn shutdown(&mut self) {
        // Reverse order: context (device, surface, instance) then window
        self.context = None;
        self.window = None;
    }
}

fn log_context(context: &VulkanContext<AshBackend>) {
    if let Some(candidate) = context.physical_device() {
        log::info!("Renderer handoff: GPU {} (score {})", candidate.name(), candidate.score);
    }
    log::info!("Queue families: {:?}", context.queue_family_indices());
    log::debug!(
        "Handles: instance {:?}, surface {:?}, device {:?}, queues {:?}",
        context.instance(),
        context.surface(),
        context.device(),
        context.queues()
    );
    log::info!("Context state: {:?}", context.state());
}

// =============================================================================
// EVENT HANDLING
// =============================================================================

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() || self.error.is_some() {
            return;
        }

        if let Err(e) = self.init(event_loop) {
            self.error = Some(e);
            event_loop.exit();
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, id: WindowId, event: WindowEvent) {
        let Some(window) = self.window.as_mut().filter(|w| w.id() == id) else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, shutting down...");
                window.request_close();
            }
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state.is_pressed() && event.physical_key == PhysicalKey::Code(KeyCode::Escape) {
                    log::info!("ESC pressed, exiting...");
                    window.request_close();
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.as_ref().is_some_and(AppWindow::should_close) {
            event_loop.exit();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}
