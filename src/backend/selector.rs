// Physical device selection
//
// Two phases per device: capability filter (required features, required
// extensions, complete queue families), then a heuristic score. A device that
// fails the filter scores 0 no matter how capable it otherwise is.

use super::driver::Backend;
use super::error::{InitError, InitResult};
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::CStr;

/// Multiplier applied to discrete GPUs, expressed as base + base / 4.
const DISCRETE_BONUS_DIVISOR: u64 = 4;

/// Features a device must support to be considered, also enabled on the
/// logical device.
pub fn required_features() -> vk::PhysicalDeviceFeatures {
    vk::PhysicalDeviceFeatures {
        geometry_shader: vk::TRUE,
        ..Default::default()
    }
}

fn supports_required_features(features: &vk::PhysicalDeviceFeatures) -> bool {
    features.geometry_shader == vk::TRUE
}

/// Device extensions every candidate must expose.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceRequirements {
    extensions: Vec<String>,
}

impl DeviceRequirements {
    pub fn new(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn supported_by(&self, available: &[String]) -> bool {
        self.extensions.iter().all(|ext| available.contains(ext))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: Option<u32>,
    pub presentation: Option<u32>,
}

impl QueueFamilyIndices {
    /// Scan queue families in order, taking the first family that satisfies
    /// each role and stopping once both are found.
    pub fn find<B: Backend>(
        backend: &B,
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
    ) -> InitResult<Self> {
        let mut indices = Self::default();
        let families = backend.queue_families(device)?;

        for (index, family) in (0u32..).zip(families.iter()) {
            if indices.graphics.is_none() && family.queue_flags.contains(vk::QueueFlags::GRAPHICS) {
                indices.graphics = Some(index);
            }

            if indices.presentation.is_none() && backend.surface_support(device, index, surface)? {
                indices.presentation = Some(index);
            }

            if indices.is_complete() {
                break;
            }
        }

        Ok(indices)
    }

    pub fn is_complete(&self) -> bool {
        self.graphics.is_some() && self.presentation.is_some()
    }

    pub fn complete(self) -> Option<CompleteQueueFamilyIndices> {
        Some(CompleteQueueFamilyIndices {
            graphics: self.graphics?,
            presentation: self.presentation?,
        })
    }
}

/// Queue family indices with both roles resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompleteQueueFamilyIndices {
    pub graphics: u32,
    pub presentation: u32,
}

impl CompleteQueueFamilyIndices {
    /// Distinct families, ascending.
    pub fn unique(&self) -> Vec<u32> {
        [self.graphics, self.presentation]
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PhysicalDeviceCandidate {
    pub device: vk::PhysicalDevice,
    pub indices: QueueFamilyIndices,
    pub score: u64,
    pub properties: vk::PhysicalDeviceProperties,
}

impl PhysicalDeviceCandidate {
    pub fn is_suitable(&self) -> bool {
        self.score > 0 && self.indices.is_complete()
    }

    pub fn name(&self) -> String {
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

/// Max 2D image dimension, +25% for discrete GPUs; 0 when disqualified.
pub fn score_device(
    properties: &vk::PhysicalDeviceProperties,
    features: &vk::PhysicalDeviceFeatures,
    indices: &QueueFamilyIndices,
    has_required_extensions: bool,
) -> u64 {
    if !supports_required_features(features) || !has_required_extensions || !indices.is_complete() {
        return 0;
    }

    let base = u64::from(properties.limits.max_image_dimension2_d);
    if properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        base + base / DISCRETE_BONUS_DIVISOR
    } else {
        base
    }
}

pub fn evaluate_device<B: Backend>(
    backend: &B,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    requirements: &DeviceRequirements,
) -> InitResult<PhysicalDeviceCandidate> {
    let properties = backend.device_properties(device)?;
    let features = backend.device_features(device)?;
    let indices = QueueFamilyIndices::find(backend, device, surface)?;
    let has_extensions = requirements.supported_by(&backend.device_extensions(device)?);

    let candidate = PhysicalDeviceCandidate {
        device,
        indices,
        score: score_device(&properties, &features, &indices, has_extensions),
        properties,
    };

    log::debug!(
        "GPU candidate {:?} ({:?}): score {}, queues {:?}",
        candidate.name(),
        properties.device_type,
        candidate.score,
        indices
    );

    Ok(candidate)
}

/// Highest score wins; on a tie the earlier candidate stays. `None` when no
/// candidate is suitable.
pub fn pick_best<I>(candidates: I) -> Option<PhysicalDeviceCandidate>
where
    I: IntoIterator<Item = PhysicalDeviceCandidate>,
{
    let mut best: Option<PhysicalDeviceCandidate> = None;

    for candidate in candidates {
        if !candidate.is_suitable() {
            continue;
        }
        let better = best
            .as_ref()
            .map_or(true, |current| candidate.score > current.score);
        if better {
            best = Some(candidate);
        }
    }

    best
}

pub fn select_physical_device<B: Backend>(
    backend: &B,
    surface: vk::SurfaceKHR,
    requirements: &DeviceRequirements,
) -> InitResult<PhysicalDeviceCandidate> {
    let devices = backend.physical_devices()?;
    if devices.is_empty() {
        return Err(InitError::NoCompatibleDevice);
    }

    let candidates = devices
        .into_iter()
        .map(|device| evaluate_device(backend, device, surface, requirements))
        .collect::<InitResult<Vec<_>>>()?;

    let best = pick_best(candidates).ok_or(InitError::NoSuitableDevice)?;

    log::info!("Selected GPU: {}", best.name());
    log::info!(
        "API Version: {}.{}.{}",
        vk::api_version_major(best.properties.api_version),
        vk::api_version_minor(best.properties.api_version),
        vk::api_version_patch(best.properties.api_version)
    );
    log::info!("Device type: {:?}, score {}", best.properties.device_type, best.score);

    Ok(best)
}
