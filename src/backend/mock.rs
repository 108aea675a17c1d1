// Recording backend for tests
//
// Serves a scripted host (layers, devices, queue families) and records every
// call so tests can check request shapes and creation/destruction order.

use super::diagnostics::DiagnosticChannel;
use super::driver::{Backend, DeviceDesc, InstanceDesc, SurfaceSource};
use super::error::{InitError, InitResult};
use ash::vk::{self, Handle};
use parking_lot::Mutex;
use raw_window_handle::{
    HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle, XlibDisplayHandle,
    XlibWindowHandle,
};
use std::sync::Arc;

pub const INSTANCE: u64 = 0x1;
pub const MESSENGER: u64 = 0x2;
pub const SURFACE: u64 = 0x3;
pub const DEVICE: u64 = 0x4;
const PHYSICAL_DEVICE_BASE: u64 = 0x100;

#[derive(Debug, Clone)]
pub enum Call {
    CreateInstance {
        desc: InstanceDesc,
        chained_diagnostics: bool,
    },
    CreateMessenger,
    CreateSurface,
    CreateDevice {
        physical_device: vk::PhysicalDevice,
        desc: DeviceDesc,
    },
    GetQueue {
        family: u32,
        index: u32,
    },
    DestroyDevice,
    DestroySurface,
    DestroyMessenger,
    DestroyInstance,
}

/// A scripted physical device.
#[derive(Debug, Clone)]
pub struct MockDevice {
    properties: vk::PhysicalDeviceProperties,
    features: vk::PhysicalDeviceFeatures,
    /// (queue flags, can present to the surface)
    families: Vec<(vk::QueueFlags, bool)>,
    extensions: Vec<String>,
}

impl MockDevice {
    /// Geometry-capable device with one graphics+present family and the
    /// swapchain extension.
    pub fn new(device_type: vk::PhysicalDeviceType, max_image_dimension_2d: u32) -> Self {
        Self {
            properties: vk::PhysicalDeviceProperties {
                device_type,
                api_version: vk::API_VERSION_1_3,
                limits: vk::PhysicalDeviceLimits {
                    max_image_dimension2_d: max_image_dimension_2d,
                    ..Default::default()
                },
                ..Default::default()
            },
            features: vk::PhysicalDeviceFeatures {
                geometry_shader: vk::TRUE,
                ..Default::default()
            },
            families: vec![(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, true)],
            extensions: vec!["VK_KHR_swapchain".to_string()],
        }
    }

    pub fn discrete(max_image_dimension_2d: u32) -> Self {
        Self::new(vk::PhysicalDeviceType::DISCRETE_GPU, max_image_dimension_2d)
    }

    pub fn integrated(max_image_dimension_2d: u32) -> Self {
        Self::new(vk::PhysicalDeviceType::INTEGRATED_GPU, max_image_dimension_2d)
    }

    pub fn named(mut self, name: &str) -> Self {
        for (dst, src) in self.properties.device_name.iter_mut().zip(name.bytes().take(255)) {
            *dst = src as std::ffi::c_char;
        }
        self
    }

    pub fn without_geometry_shader(mut self) -> Self {
        self.features.geometry_shader = vk::FALSE;
        self
    }

    pub fn with_families(mut self, families: &[(vk::QueueFlags, bool)]) -> Self {
        self.families = families.to_vec();
        self
    }

    pub fn with_extensions(mut self, extensions: &[&str]) -> Self {
        self.extensions = extensions.iter().map(|s| s.to_string()).collect();
        self
    }
}

pub fn physical_device(index: usize) -> vk::PhysicalDevice {
    vk::PhysicalDevice::from_raw(PHYSICAL_DEVICE_BASE + index as u64)
}

#[derive(Default)]
pub struct MockBackend {
    layers: Vec<String>,
    devices: Vec<MockDevice>,
    fail_instance: Option<vk::Result>,
    fail_messenger: Option<vk::Result>,
    fail_surface: Option<vk::Result>,
    fail_device: Option<vk::Result>,
    calls: Arc<Mutex<Vec<Call>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_layers(mut self, layers: &[&str]) -> Self {
        self.layers = layers.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_device(mut self, device: MockDevice) -> Self {
        self.devices.push(device);
        self
    }

    pub fn fail_instance(mut self, result: vk::Result) -> Self {
        self.fail_instance = Some(result);
        self
    }

    pub fn fail_messenger(mut self, result: vk::Result) -> Self {
        self.fail_messenger = Some(result);
        self
    }

    pub fn fail_surface(mut self, result: vk::Result) -> Self {
        self.fail_surface = Some(result);
        self
    }

    pub fn fail_device(mut self, result: vk::Result) -> Self {
        self.fail_device = Some(result);
        self
    }

    /// Shared call log; stays readable after the backend is moved or dropped.
    pub fn call_log(&self) -> Arc<Mutex<Vec<Call>>> {
        Arc::clone(&self.calls)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    fn device(&self, device: vk::PhysicalDevice) -> InitResult<&MockDevice> {
        device
            .as_raw()
            .checked_sub(PHYSICAL_DEVICE_BASE)
            .and_then(|i| self.devices.get(i as usize))
            .ok_or(InitError::NotInitialized("physical device"))
    }
}

impl Backend for MockBackend {
    fn available_layers(&self) -> InitResult<Vec<String>> {
        Ok(self.layers.clone())
    }

    fn surface_extensions(&self, _window: &dyn SurfaceSource) -> InitResult<Vec<String>> {
        Ok(vec!["VK_KHR_surface".to_string(), "VK_KHR_xlib_surface".to_string()])
    }

    fn create_instance(
        &mut self,
        desc: &InstanceDesc,
        diagnostics: Option<&DiagnosticChannel>,
    ) -> InitResult<vk::Instance> {
        self.record(Call::CreateInstance {
            desc: desc.clone(),
            chained_diagnostics: diagnostics.is_some(),
        });
        match self.fail_instance {
            Some(result) => Err(InitError::backend("vkCreateInstance", result)),
            None => Ok(vk::Instance::from_raw(INSTANCE)),
        }
    }

    fn create_messenger(
        &mut self,
        _channel: &DiagnosticChannel,
    ) -> InitResult<vk::DebugUtilsMessengerEXT> {
        self.record(Call::CreateMessenger);
        match self.fail_messenger {
            Some(result) => Err(InitError::backend("vkCreateDebugUtilsMessengerEXT", result)),
            None => Ok(vk::DebugUtilsMessengerEXT::from_raw(MESSENGER)),
        }
    }

    fn create_surface(&mut self, _window: &dyn SurfaceSource) -> InitResult<vk::SurfaceKHR> {
        self.record(Call::CreateSurface);
        match self.fail_surface {
            Some(result) => Err(InitError::SurfaceCreationFailure { code: result.as_raw() }),
            None => Ok(vk::SurfaceKHR::from_raw(SURFACE)),
        }
    }

    fn physical_devices(&self) -> InitResult<Vec<vk::PhysicalDevice>> {
        Ok((0..self.devices.len()).map(physical_device).collect())
    }

    fn device_properties(
        &self,
        device: vk::PhysicalDevice,
    ) -> InitResult<vk::PhysicalDeviceProperties> {
        Ok(self.device(device)?.properties)
    }

    fn device_features(&self, device: vk::PhysicalDevice) -> InitResult<vk::PhysicalDeviceFeatures> {
        Ok(self.device(device)?.features)
    }

    fn queue_families(
        &self,
        device: vk::PhysicalDevice,
    ) -> InitResult<Vec<vk::QueueFamilyProperties>> {
        Ok(self
            .device(device)?
            .families
            .iter()
            .map(|&(queue_flags, _)| vk::QueueFamilyProperties {
                queue_flags,
                queue_count: 1,
                ..Default::default()
            })
            .collect())
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> InitResult<Vec<String>> {
        Ok(self.device(device)?.extensions.clone())
    }

    fn surface_support(
        &self,
        device: vk::PhysicalDevice,
        family: u32,
        _surface: vk::SurfaceKHR,
    ) -> InitResult<bool> {
        Ok(self
            .device(device)?
            .families
            .get(family as usize)
            .map_or(false, |&(_, present)| present))
    }

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> InitResult<vk::Device> {
        self.record(Call::CreateDevice {
            physical_device,
            desc: desc.clone(),
        });
        match self.fail_device {
            Some(result) => Err(InitError::backend("vkCreateDevice", result)),
            None => Ok(vk::Device::from_raw(DEVICE)),
        }
    }

    fn device_queue(&self, family: u32, index: u32) -> InitResult<vk::Queue> {
        self.record(Call::GetQueue { family, index });
        Ok(vk::Queue::from_raw(0x1000 + u64::from(family)))
    }

    fn destroy_device(&mut self, _device: vk::Device) {
        self.record(Call::DestroyDevice);
    }

    fn destroy_surface(&mut self, _surface: vk::SurfaceKHR) {
        self.record(Call::DestroySurface);
    }

    fn destroy_messenger(&mut self, _messenger: vk::DebugUtilsMessengerEXT) {
        self.record(Call::DestroyMessenger);
    }

    fn destroy_instance(&mut self, _instance: vk::Instance) {
        self.record(Call::DestroyInstance);
    }
}

/// Window stand-in with null Xlib handles; only the mock ever sees them.
pub struct HeadlessWindow;

unsafe impl HasRawWindowHandle for HeadlessWindow {
    fn raw_window_handle(&self) -> RawWindowHandle {
        RawWindowHandle::Xlib(XlibWindowHandle::empty())
    }
}

unsafe impl HasRawDisplayHandle for HeadlessWindow {
    fn raw_display_handle(&self) -> RawDisplayHandle {
        RawDisplayHandle::Xlib(XlibDisplayHandle::empty())
    }
}
