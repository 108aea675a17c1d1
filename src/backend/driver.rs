// Backend seam
//
// Every graphics-API call the bootstrap makes goes through `Backend`. Handles
// cross the seam as plain `vk` handles; the implementation owns whatever
// function tables it needs to act on them.

use super::diagnostics::DiagnosticChannel;
use super::error::InitResult;
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle, RawDisplayHandle, RawWindowHandle};

/// Anything that can hand out native window and display handles.
pub trait SurfaceSource {
    fn display_handle(&self) -> RawDisplayHandle;
    fn window_handle(&self) -> RawWindowHandle;
}

impl<T: HasRawDisplayHandle + HasRawWindowHandle> SurfaceSource for T {
    fn display_handle(&self) -> RawDisplayHandle {
        self.raw_display_handle()
    }

    fn window_handle(&self) -> RawWindowHandle {
        self.raw_window_handle()
    }
}

/// Parameters for instance creation.
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceDesc {
    pub app_name: String,
    pub engine_name: String,
    pub layers: Vec<String>,
    pub extensions: Vec<String>,
}

/// One queue-creation request; one per distinct family.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRequest {
    pub family: u32,
    pub priorities: Vec<f32>,
}

/// Parameters for logical device creation.
#[derive(Debug, Clone)]
pub struct DeviceDesc {
    pub queues: Vec<QueueRequest>,
    pub layers: Vec<String>,
    pub extensions: Vec<String>,
    pub features: vk::PhysicalDeviceFeatures,
}

/// Graphics backend operations used during bootstrap.
///
/// Calls are synchronous. `destroy_*` calls never fail; they are only issued
/// for handles this backend created, in reverse order of creation.
pub trait Backend {
    /// Names of the instance layers installed on the host.
    fn available_layers(&self) -> InitResult<Vec<String>>;

    /// Instance extensions the window system needs to create surfaces.
    fn surface_extensions(&self, window: &dyn SurfaceSource) -> InitResult<Vec<String>>;

    /// Create the instance. When `diagnostics` is given its create-info is
    /// chained so messages emitted during creation are delivered.
    fn create_instance(
        &mut self,
        desc: &InstanceDesc,
        diagnostics: Option<&DiagnosticChannel>,
    ) -> InitResult<vk::Instance>;

    fn create_messenger(
        &mut self,
        channel: &DiagnosticChannel,
    ) -> InitResult<vk::DebugUtilsMessengerEXT>;

    fn create_surface(&mut self, window: &dyn SurfaceSource) -> InitResult<vk::SurfaceKHR>;

    fn physical_devices(&self) -> InitResult<Vec<vk::PhysicalDevice>>;

    fn device_properties(
        &self,
        device: vk::PhysicalDevice,
    ) -> InitResult<vk::PhysicalDeviceProperties>;

    fn device_features(&self, device: vk::PhysicalDevice) -> InitResult<vk::PhysicalDeviceFeatures>;

    fn queue_families(
        &self,
        device: vk::PhysicalDevice,
    ) -> InitResult<Vec<vk::QueueFamilyProperties>>;

    /// Names of the device extensions `device` supports.
    fn device_extensions(&self, device: vk::PhysicalDevice) -> InitResult<Vec<String>>;

    fn surface_support(
        &self,
        device: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> InitResult<bool>;

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> InitResult<vk::Device>;

    fn device_queue(&self, family: u32, index: u32) -> InitResult<vk::Queue>;

    fn destroy_device(&mut self, device: vk::Device);

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR);

    fn destroy_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT);

    fn destroy_instance(&mut self, instance: vk::Instance);
}
