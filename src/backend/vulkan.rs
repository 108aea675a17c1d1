// Vulkan backend over ash
//
// Owns the loader and the function tables for the instance and device it
// creates. Handles handed out are only valid with this backend.

use super::diagnostics::DiagnosticChannel;
use super::driver::{Backend, DeviceDesc, InstanceDesc, SurfaceSource};
use super::error::{InitError, InitResult};
use ash::extensions::{ext::DebugUtils, khr::Surface};
use ash::{vk, Entry};
use std::ffi::{c_char, CStr, CString};

const APP_VERSION: u32 = vk::make_api_version(0, 1, 3, 0);

/// Vulkan backend with loaders created on demand
pub struct AshBackend {
    device: Option<ash::Device>,
    surface_loader: Option<Surface>,
    debug_utils: Option<DebugUtils>,
    instance: Option<ash::Instance>,
    entry: Entry,
}

impl AshBackend {
    /// Load the Vulkan runtime library.
    pub fn load() -> InitResult<Self> {
        let entry = unsafe { Entry::load() }
            .map_err(|e| InitError::LoaderUnavailable(e.to_string()))?;

        Ok(Self {
            device: None,
            surface_loader: None,
            debug_utils: None,
            instance: None,
            entry,
        })
    }

    fn instance(&self) -> InitResult<&ash::Instance> {
        self.instance.as_ref().ok_or(InitError::NotInitialized("instance"))
    }

    fn device(&self) -> InitResult<&ash::Device> {
        self.device.as_ref().ok_or(InitError::NotInitialized("logical device"))
    }
}

fn c_strings(names: &[String]) -> InitResult<Vec<CString>> {
    names
        .iter()
        .map(|name| CString::new(name.as_str()).map_err(|_| InitError::InvalidName(name.clone())))
        .collect()
}

fn pointers(names: &[CString]) -> Vec<*const c_char> {
    names.iter().map(|name| name.as_ptr()).collect()
}

/// Read a fixed-size, NUL-terminated name field.
fn name_from(raw: &[c_char]) -> String {
    unsafe { CStr::from_ptr(raw.as_ptr()) }.to_string_lossy().into_owned()
}

impl Backend for AshBackend {
    fn available_layers(&self) -> InitResult<Vec<String>> {
        let layers = self
            .entry
            .enumerate_instance_layer_properties()
            .map_err(|e| InitError::backend("vkEnumerateInstanceLayerProperties", e))?;

        Ok(layers.iter().map(|layer| name_from(&layer.layer_name)).collect())
    }

    fn surface_extensions(&self, window: &dyn SurfaceSource) -> InitResult<Vec<String>> {
        let extensions = ash_window::enumerate_required_extensions(window.display_handle())
            .map_err(|e| InitError::backend("vkEnumerateInstanceExtensionProperties", e))?;

        Ok(extensions
            .iter()
            .map(|&ext| unsafe { CStr::from_ptr(ext) }.to_string_lossy().into_owned())
            .collect())
    }

    fn create_instance(
        &mut self,
        desc: &InstanceDesc,
        diagnostics: Option<&DiagnosticChannel>,
    ) -> InitResult<vk::Instance> {
        let app_name = CString::new(desc.app_name.as_str())
            .map_err(|_| InitError::InvalidName(desc.app_name.clone()))?;
        let engine_name = CString::new(desc.engine_name.as_str())
            .map_err(|_| InitError::InvalidName(desc.engine_name.clone()))?;

        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(APP_VERSION)
            .engine_name(&engine_name)
            .engine_version(APP_VERSION)
            .api_version(vk::API_VERSION_1_3);

        let layers = c_strings(&desc.layers)?;
        let layer_ptrs = pointers(&layers);
        let extensions = c_strings(&desc.extensions)?;
        let extension_ptrs = pointers(&extensions);

        // Chained so instance creation and destruction are reported too.
        let mut debug_info = diagnostics.map(DiagnosticChannel::create_info);

        let mut create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&extension_ptrs);
        if let Some(info) = debug_info.as_mut() {
            create_info = create_info.push_next(info);
        }

        let instance = unsafe { self.entry.create_instance(&create_info, None) }
            .map_err(|e| InitError::backend("vkCreateInstance", e))?;

        let handle = instance.handle();
        self.surface_loader = Some(Surface::new(&self.entry, &instance));
        self.instance = Some(instance);
        Ok(handle)
    }

    fn create_messenger(
        &mut self,
        channel: &DiagnosticChannel,
    ) -> InitResult<vk::DebugUtilsMessengerEXT> {
        let debug_utils = DebugUtils::new(&self.entry, self.instance()?);
        let create_info = channel.create_info();

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .map_err(|e| InitError::backend("vkCreateDebugUtilsMessengerEXT", e))?;

        self.debug_utils = Some(debug_utils);
        Ok(messenger)
    }

    fn create_surface(&mut self, window: &dyn SurfaceSource) -> InitResult<vk::SurfaceKHR> {
        let instance = self.instance()?;
        unsafe {
            ash_window::create_surface(
                &self.entry,
                instance,
                window.display_handle(),
                window.window_handle(),
                None,
            )
        }
        .map_err(|e| InitError::SurfaceCreationFailure { code: e.as_raw() })
    }

    fn physical_devices(&self) -> InitResult<Vec<vk::PhysicalDevice>> {
        unsafe { self.instance()?.enumerate_physical_devices() }
            .map_err(|e| InitError::backend("vkEnumeratePhysicalDevices", e))
    }

    fn device_properties(
        &self,
        device: vk::PhysicalDevice,
    ) -> InitResult<vk::PhysicalDeviceProperties> {
        Ok(unsafe { self.instance()?.get_physical_device_properties(device) })
    }

    fn device_features(&self, device: vk::PhysicalDevice) -> InitResult<vk::PhysicalDeviceFeatures> {
        Ok(unsafe { self.instance()?.get_physical_device_features(device) })
    }

    fn queue_families(
        &self,
        device: vk::PhysicalDevice,
    ) -> InitResult<Vec<vk::QueueFamilyProperties>> {
        Ok(unsafe { self.instance()?.get_physical_device_queue_family_properties(device) })
    }

    fn device_extensions(&self, device: vk::PhysicalDevice) -> InitResult<Vec<String>> {
        let extensions = unsafe { self.instance()?.enumerate_device_extension_properties(device) }
            .map_err(|e| InitError::backend("vkEnumerateDeviceExtensionProperties", e))?;

        Ok(extensions.iter().map(|ext| name_from(&ext.extension_name)).collect())
    }

    fn surface_support(
        &self,
        device: vk::PhysicalDevice,
        family: u32,
        surface: vk::SurfaceKHR,
    ) -> InitResult<bool> {
        let loader = self
            .surface_loader
            .as_ref()
            .ok_or(InitError::NotInitialized("surface loader"))?;

        unsafe { loader.get_physical_device_surface_support(device, family, surface) }
            .map_err(|e| InitError::backend("vkGetPhysicalDeviceSurfaceSupportKHR", e))
    }

    fn create_device(
        &mut self,
        physical_device: vk::PhysicalDevice,
        desc: &DeviceDesc,
    ) -> InitResult<vk::Device> {
        let queue_infos: Vec<vk::DeviceQueueCreateInfo> = desc
            .queues
            .iter()
            .map(|request| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(request.family)
                    .queue_priorities(&request.priorities)
                    .build()
            })
            .collect();

        let layers = c_strings(&desc.layers)?;
        let layer_ptrs = pointers(&layers);
        let extensions = c_strings(&desc.extensions)?;
        let extension_ptrs = pointers(&extensions);

        // Device layers are deprecated but older loaders still read them.
        #[allow(deprecated)]
        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_infos)
            .enabled_layer_names(&layer_ptrs)
            .enabled_extension_names(&extension_ptrs)
            .enabled_features(&desc.features);

        let device = unsafe { self.instance()?.create_device(physical_device, &create_info, None) }
            .map_err(|e| InitError::backend("vkCreateDevice", e))?;

        let handle = device.handle();
        self.device = Some(device);
        Ok(handle)
    }

    fn device_queue(&self, family: u32, index: u32) -> InitResult<vk::Queue> {
        Ok(unsafe { self.device()?.get_device_queue(family, index) })
    }

    fn destroy_device(&mut self, device: vk::Device) {
        if let Some(owned) = self.device.take() {
            debug_assert_eq!(owned.handle(), device);
            unsafe {
                // Nothing has been submitted yet, but a renderer may have.
                let _ = owned.device_wait_idle();
                owned.destroy_device(None);
            }
        }
    }

    fn destroy_surface(&mut self, surface: vk::SurfaceKHR) {
        if let Some(loader) = self.surface_loader.as_ref() {
            unsafe { loader.destroy_surface(surface, None) };
        }
    }

    fn destroy_messenger(&mut self, messenger: vk::DebugUtilsMessengerEXT) {
        if let Some(debug_utils) = self.debug_utils.take() {
            unsafe { debug_utils.destroy_debug_utils_messenger(messenger, None) };
        }
    }

    fn destroy_instance(&mut self, instance: vk::Instance) {
        self.surface_loader = None;
        self.debug_utils = None;
        if let Some(owned) = self.instance.take() {
            debug_assert_eq!(owned.handle(), instance);
            unsafe { owned.destroy_instance(None) };
        }
    }
}
