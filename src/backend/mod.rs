// Backend module - Vulkan bootstrap
//
// Design: ordered creation of instance, surface, physical device and logical
// device behind a `Backend` seam, so the ordering and selection logic runs
// the same against the real driver and the test double.

pub mod context;
pub mod device;
pub mod diagnostics;
pub mod driver;
pub mod error;
pub mod instance;
pub mod selector;
pub mod vulkan;

#[cfg(test)]
pub(crate) mod mock;

pub use context::{ContextDesc, VulkanContext};
pub use instance::ValidationConfig;
pub use selector::DeviceRequirements;
pub use vulkan::AshBackend;
