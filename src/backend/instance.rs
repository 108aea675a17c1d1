// Instance builder
//
// Checks requested layers against what the host provides, assembles the
// extension list, and creates the instance with the diagnostic channel
// chained in when diagnostics are enabled.

use super::diagnostics::DiagnosticChannel;
use super::driver::{Backend, InstanceDesc};
use super::error::{InitError, InitResult};
use ash::vk;

pub const DEBUG_UTILS_EXTENSION: &str = "VK_EXT_debug_utils";
pub const ENGINE_NAME: &str = "VulkanEngine";

/// Validation layers, extra instance extensions and the diagnostics flag.
/// Fixed at start-up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationConfig {
    layers: Vec<String>,
    extensions: Vec<String>,
    diagnostics: bool,
}

impl ValidationConfig {
    pub fn new(layers: Vec<String>, extensions: Vec<String>, diagnostics: bool) -> Self {
        Self {
            layers,
            extensions,
            diagnostics,
        }
    }

    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    pub fn diagnostics_enabled(&self) -> bool {
        self.diagnostics
    }
}

/// Requested layers missing from `available`, in request order.
pub fn check_layer_support(available: &[String], requested: &[String]) -> Vec<String> {
    requested
        .iter()
        .filter(|layer| !available.contains(layer))
        .cloned()
        .collect()
}

/// Window-system extensions, then configured ones, then debug utils when
/// diagnostics are on. Duplicates keep their first position.
pub fn instance_extensions(window_extensions: &[String], config: &ValidationConfig) -> Vec<String> {
    let debug = config
        .diagnostics_enabled()
        .then(|| DEBUG_UTILS_EXTENSION.to_string());

    let mut extensions: Vec<String> = Vec::new();
    for ext in window_extensions
        .iter()
        .chain(config.extensions())
        .cloned()
        .chain(debug)
    {
        if !extensions.contains(&ext) {
            extensions.push(ext);
        }
    }
    extensions
}

/// Create the instance.
///
/// `diagnostics` must be built before this call so messages emitted while the
/// instance is being created reach it; it is only chained when `config`
/// enables diagnostics.
pub fn create_instance<B: Backend>(
    backend: &mut B,
    config: &ValidationConfig,
    app_name: &str,
    window_extensions: &[String],
    diagnostics: Option<&DiagnosticChannel>,
) -> InitResult<vk::Instance> {
    let available = backend.available_layers()?;
    let missing = check_layer_support(&available, config.layers());
    if !missing.is_empty() {
        return Err(InitError::UnsupportedLayer { layers: missing });
    }

    let desc = InstanceDesc {
        app_name: app_name.to_string(),
        engine_name: ENGINE_NAME.to_string(),
        layers: config.layers().to_vec(),
        extensions: instance_extensions(window_extensions, config),
    };

    log::info!("Creating Vulkan instance: {}", app_name);
    log::debug!("Instance layers: {:?}", desc.layers);
    log::debug!("Instance extensions: {:?}", desc.extensions);

    let diagnostics = diagnostics.filter(|_| config.diagnostics_enabled());
    backend.create_instance(&desc, diagnostics)
}
