// Vulkan context - ordered bootstrap and teardown
//
// Creation order: instance (+ diagnostic messenger) -> surface -> physical
// device selection -> logical device + queues. A failure at any step destroys
// everything acquired so far, in reverse, before the error is returned; there
// is no partially ready context.

use super::device::{create_logical_device, Queues};
use super::diagnostics::DiagnosticChannel;
use super::driver::{Backend, SurfaceSource};
use super::error::{InitError, InitResult};
use super::instance::{create_instance, ValidationConfig};
use super::selector::{select_physical_device, DeviceRequirements, PhysicalDeviceCandidate, QueueFamilyIndices};
use crate::logging::LogSink;
use ash::vk;
use std::sync::Arc;

/// Lifecycle of a [`VulkanContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextState {
    Uninitialized,
    /// Window is available for surface binding.
    SurfaceReady,
    /// Instance exists and the window surface is bound to it.
    InstanceReady,
    DeviceSelected,
    Ready,
    TornDown,
}

/// Everything `VulkanContext::new` needs besides the backend and the window.
pub struct ContextDesc<'a> {
    pub app_name: &'a str,
    pub validation: &'a ValidationConfig,
    pub device: &'a DeviceRequirements,
    /// Receives driver diagnostics when validation enables them.
    pub sink: Arc<dyn LogSink>,
}

/// Owns every handle it creates and is the only thing that destroys them.
pub struct VulkanContext<B: Backend> {
    backend: B,
    state: ContextState,

    instance: Option<vk::Instance>,
    // Must outlive the instance: the chained messenger reports until
    // vkDestroyInstance returns.
    channel: Option<DiagnosticChannel>,
    messenger: Option<vk::DebugUtilsMessengerEXT>,
    surface: Option<vk::SurfaceKHR>,
    physical_device: Option<PhysicalDeviceCandidate>,
    device: Option<vk::Device>,
    queues: Option<Queues>,
}

impl<B: Backend> VulkanContext<B> {
    /// Run the whole bootstrap sequence against `window`.
    pub fn new(backend: B, window: &dyn SurfaceSource, desc: ContextDesc<'_>) -> InitResult<Self> {
        let mut context = Self {
            backend,
            state: ContextState::Uninitialized,
            instance: None,
            channel: None,
            messenger: None,
            surface: None,
            physical_device: None,
            device: None,
            queues: None,
        };

        match context.init(window, &desc) {
            Ok(()) => Ok(context),
            Err(e) => {
                log::debug!("Unwinding Vulkan context from state {:?}", context.state);
                context.teardown();
                Err(e)
            }
        }
    }

    fn init(&mut self, window: &dyn SurfaceSource, desc: &ContextDesc<'_>) -> InitResult<()> {
        log::info!("Initializing Vulkan...");
        self.transition(ContextState::SurfaceReady);

        // ─────────────────────────────────────────────────────────────────────
        // STEP 1: Instance, with diagnostics wired in before creation
        // ─────────────────────────────────────────────────────────────────────
        let validation = desc.validation;
        if validation.diagnostics_enabled() {
            self.channel = Some(DiagnosticChannel::new(Arc::clone(&desc.sink)));
        }

        let window_extensions = self.backend.surface_extensions(window)?;
        let instance = create_instance(
            &mut self.backend,
            validation,
            desc.app_name,
            &window_extensions,
            self.channel.as_ref(),
        )?;
        self.instance = Some(instance);

        if let Some(channel) = self.channel.as_ref() {
            self.messenger = Some(channel.attach(&mut self.backend)?);
        }

        // ─────────────────────────────────────────────────────────────────────
        // STEP 2: Bind the window surface
        // ─────────────────────────────────────────────────────────────────────
        let surface = self.backend.create_surface(window)?;
        self.surface = Some(surface);
        self.transition(ContextState::InstanceReady);

        // ─────────────────────────────────────────────────────────────────────
        // STEP 3: Pick the GPU
        // ─────────────────────────────────────────────────────────────────────
        let candidate = select_physical_device(&self.backend, surface, desc.device)?;
        let indices = candidate.indices.complete().ok_or(InitError::NoSuitableDevice)?;
        self.physical_device = Some(candidate);
        self.transition(ContextState::DeviceSelected);

        // ─────────────────────────────────────────────────────────────────────
        // STEP 4: Logical device and queues
        // ─────────────────────────────────────────────────────────────────────
        let (device, queues) = create_logical_device(
            &mut self.backend,
            candidate.device,
            &indices,
            validation,
            desc.device,
        )?;
        self.device = Some(device);
        self.queues = Some(queues);
        self.transition(ContextState::Ready);

        log::info!("Vulkan initialized successfully!");
        Ok(())
    }

    fn transition(&mut self, next: ContextState) {
        log::debug!("Vulkan context: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    /// Destroy every acquired handle in reverse order. Safe to call twice.
    pub fn teardown(&mut self) {
        if self.state == ContextState::TornDown {
            return;
        }
        log::info!("Destroying Vulkan context...");

        self.queues = None;
        if let Some(device) = self.device.take() {
            self.backend.destroy_device(device);
        }
        self.physical_device = None;
        if let Some(surface) = self.surface.take() {
            self.backend.destroy_surface(surface);
        }
        if let Some(messenger) = self.messenger.take() {
            if let Some(channel) = self.channel.as_ref() {
                channel.detach(&mut self.backend, messenger);
            }
        }
        if let Some(instance) = self.instance.take() {
            self.backend.destroy_instance(instance);
        }
        self.channel = None;

        self.transition(ContextState::TornDown);
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn instance(&self) -> Option<vk::Instance> {
        self.instance
    }

    pub fn surface(&self) -> Option<vk::SurfaceKHR> {
        self.surface
    }

    pub fn physical_device(&self) -> Option<&PhysicalDeviceCandidate> {
        self.physical_device.as_ref()
    }

    pub fn queue_family_indices(&self) -> Option<QueueFamilyIndices> {
        self.physical_device.as_ref().map(|candidate| candidate.indices)
    }

    pub fn device(&self) -> Option<vk::Device> {
        self.device
    }

    pub fn queues(&self) -> Option<Queues> {
        self.queues
    }
}

impl<B: Backend> Drop for VulkanContext<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::mock::{physical_device, Call, HeadlessWindow, MockBackend, MockDevice};
    use crate::logging::tests::buffered_logger;

    const VALIDATION: &str = "VK_LAYER_KHRONOS_validation";

    struct Fixture {
        validation: ValidationConfig,
        device: DeviceRequirements,
    }

    impl Fixture {
        fn new(diagnostics: bool) -> Self {
            let layers = if diagnostics { vec![VALIDATION.to_string()] } else { vec![] };
            Self {
                validation: ValidationConfig::new(layers, vec![], diagnostics),
                device: DeviceRequirements::new(vec!["VK_KHR_swapchain".into()]),
            }
        }

        fn build(&self, backend: MockBackend) -> InitResult<VulkanContext<MockBackend>> {
            let (logger, _low, _high) = buffered_logger();
            VulkanContext::new(
                backend,
                &HeadlessWindow,
                ContextDesc {
                    app_name: "test",
                    validation: &self.validation,
                    device: &self.device,
                    sink: Arc::new(logger),
                },
            )
        }
    }

    fn host() -> MockBackend {
        MockBackend::new()
            .with_layers(&[VALIDATION])
            .with_device(MockDevice::integrated(4096))
    }

    fn kinds(calls: &[Call]) -> Vec<&'static str> {
        calls
            .iter()
            .filter_map(|call| match call {
                Call::CreateInstance { .. } => Some("create instance"),
                Call::CreateMessenger => Some("create messenger"),
                Call::CreateSurface => Some("create surface"),
                Call::CreateDevice { .. } => Some("create device"),
                Call::GetQueue { .. } => None,
                Call::DestroyDevice => Some("destroy device"),
                Call::DestroySurface => Some("destroy surface"),
                Call::DestroyMessenger => Some("destroy messenger"),
                Call::DestroyInstance => Some("destroy instance"),
            })
            .collect()
    }

    // ── happy path ────────────────────────────────────────────────────────

    #[test]
    fn full_bootstrap_reaches_ready() {
        let fixture = Fixture::new(true);
        let backend = host();
        let log = backend.call_log();
        let context = fixture.build(backend).unwrap();

        assert_eq!(context.state(), ContextState::Ready);
        assert!(context.instance().is_some());
        assert!(context.surface().is_some());
        assert!(context.device().is_some());
        assert_eq!(context.physical_device().map(|c| c.device), Some(physical_device(0)));
        assert_eq!(
            context.queue_family_indices(),
            Some(QueueFamilyIndices { graphics: Some(0), presentation: Some(0) })
        );
        assert!(context.queues().is_some());

        let created_on: Vec<_> = log
            .lock()
            .iter()
            .filter_map(|call| match call {
                Call::CreateDevice { physical_device: device, .. } => Some(*device),
                _ => None,
            })
            .collect();
        assert_eq!(created_on, vec![physical_device(0)]);
    }

    #[test]
    fn creation_and_destruction_are_mirrored() {
        let fixture = Fixture::new(true);
        let backend = host();
        let log = backend.call_log();

        let context = fixture.build(backend).unwrap();
        drop(context);

        assert_eq!(
            kinds(&log.lock()),
            vec![
                "create instance",
                "create messenger",
                "create surface",
                "create device",
                "destroy device",
                "destroy surface",
                "destroy messenger",
                "destroy instance",
            ]
        );
    }

    #[test]
    fn diagnostics_disabled_skips_messenger() {
        let fixture = Fixture::new(false);
        let backend = host();
        let log = backend.call_log();

        drop(fixture.build(backend).unwrap());

        let calls = log.lock();
        assert!(!calls.iter().any(|c| matches!(c, Call::CreateMessenger | Call::DestroyMessenger)));
        assert!(matches!(calls[0], Call::CreateInstance { chained_diagnostics: false, .. }));
    }

    #[test]
    fn explicit_teardown_is_idempotent() {
        let fixture = Fixture::new(false);
        let backend = host();
        let log = backend.call_log();

        let mut context = fixture.build(backend).unwrap();
        context.teardown();
        assert_eq!(context.state(), ContextState::TornDown);
        assert!(context.device().is_none());
        drop(context);

        let destroys = log
            .lock()
            .iter()
            .filter(|c| matches!(c, Call::DestroyInstance))
            .count();
        assert_eq!(destroys, 1);
    }

    // ── partial-failure unwind ────────────────────────────────────────────

    #[test]
    fn surface_failure_destroys_instance_only() {
        let fixture = Fixture::new(false);
        let backend = host().fail_surface(vk::Result::ERROR_INITIALIZATION_FAILED);
        let log = backend.call_log();

        let err = fixture.build(backend).err().unwrap();

        assert_eq!(err, InitError::SurfaceCreationFailure { code: -3 });
        assert_eq!(
            kinds(&log.lock()),
            vec!["create instance", "create surface", "destroy instance"]
        );
    }

    #[test]
    fn messenger_failure_unwinds_instance() {
        let fixture = Fixture::new(true);
        let backend = host().fail_messenger(vk::Result::ERROR_OUT_OF_HOST_MEMORY);
        let log = backend.call_log();

        let err = fixture.build(backend).err().unwrap();

        assert_eq!(
            err,
            InitError::BackendInitFailure { call: "vkCreateDebugUtilsMessengerEXT", code: -1 }
        );
        assert_eq!(
            kinds(&log.lock()),
            vec!["create instance", "create messenger", "destroy instance"]
        );
    }

    #[test]
    fn unsuitable_devices_unwind_surface_and_instance() {
        let fixture = Fixture::new(true);
        let backend = MockBackend::new()
            .with_layers(&[VALIDATION])
            .with_device(MockDevice::discrete(8192).without_geometry_shader());
        let log = backend.call_log();

        let err = fixture.build(backend).err().unwrap();

        assert_eq!(err, InitError::NoSuitableDevice);
        assert_eq!(
            kinds(&log.lock()),
            vec![
                "create instance",
                "create messenger",
                "create surface",
                "destroy surface",
                "destroy messenger",
                "destroy instance",
            ]
        );
    }

    #[test]
    fn no_devices_is_reported() {
        let fixture = Fixture::new(false);
        let err = fixture.build(MockBackend::new()).err().unwrap();
        assert_eq!(err, InitError::NoCompatibleDevice);
    }

    #[test]
    fn device_failure_unwinds_everything_before_it() {
        let fixture = Fixture::new(false);
        let backend = host().fail_device(vk::Result::ERROR_DEVICE_LOST);
        let log = backend.call_log();

        let err = fixture.build(backend).err().unwrap();

        assert_eq!(err, InitError::BackendInitFailure { call: "vkCreateDevice", code: -4 });
        assert_eq!(
            kinds(&log.lock()),
            vec![
                "create instance",
                "create surface",
                "create device",
                "destroy surface",
                "destroy instance",
            ]
        );
    }

    #[test]
    fn missing_layer_acquires_nothing() {
        let fixture = Fixture::new(true);
        let backend = MockBackend::new().with_device(MockDevice::integrated(4096));
        let log = backend.call_log();

        let err = fixture.build(backend).err().unwrap();

        assert_eq!(err, InitError::UnsupportedLayer { layers: vec![VALIDATION.to_string()] });
        assert!(log.lock().is_empty());
    }
}
