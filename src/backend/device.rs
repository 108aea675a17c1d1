// Logical device builder
//
// One queue-creation request per distinct family; requesting the same family
// twice is rejected by the driver.

use super::driver::{Backend, DeviceDesc, QueueRequest};
use super::error::InitResult;
use super::instance::ValidationConfig;
use super::selector::{required_features, CompleteQueueFamilyIndices, DeviceRequirements};
use ash::vk;

const QUEUE_PRIORITY: f32 = 1.0;

/// Queue handles retrieved from the logical device. Equal when graphics and
/// presentation share a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Queues {
    pub graphics: vk::Queue,
    pub presentation: vk::Queue,
}

pub fn queue_requests(indices: &CompleteQueueFamilyIndices) -> Vec<QueueRequest> {
    indices
        .unique()
        .into_iter()
        .map(|family| QueueRequest {
            family,
            priorities: vec![QUEUE_PRIORITY],
        })
        .collect()
}

pub fn create_logical_device<B: Backend>(
    backend: &mut B,
    physical_device: vk::PhysicalDevice,
    indices: &CompleteQueueFamilyIndices,
    config: &ValidationConfig,
    requirements: &DeviceRequirements,
) -> InitResult<(vk::Device, Queues)> {
    let desc = DeviceDesc {
        queues: queue_requests(indices),
        // Device layers are ignored by current loaders; older ones still
        // expect them to match the instance.
        layers: config.layers().to_vec(),
        extensions: requirements.extensions().to_vec(),
        features: required_features(),
    };

    log::info!(
        "Creating logical device: {} queue famil{} (graphics {}, present {})",
        desc.queues.len(),
        if desc.queues.len() == 1 { "y" } else { "ies" },
        indices.graphics,
        indices.presentation
    );

    let device = backend.create_device(physical_device, &desc)?;

    match retrieve_queues(backend, indices) {
        Ok(queues) => Ok((device, queues)),
        Err(e) => {
            backend.destroy_device(device);
            Err(e)
        }
    }
}

fn retrieve_queues<B: Backend>(backend: &B, indices: &CompleteQueueFamilyIndices) -> InitResult<Queues> {
    let presentation = backend.device_queue(indices.presentation, 0)?;
    let graphics = if indices.graphics == indices.presentation {
        presentation
    } else {
        backend.device_queue(indices.graphics, 0)?
    };

    Ok(Queues {
        graphics,
        presentation,
    })
}
