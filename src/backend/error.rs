// Initialization errors
//
// Every failure in the bootstrap sequence is fatal: the context unwinds what
// it acquired and hands exactly one of these to the caller.

use ash::vk;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InitError {
    /// Requested validation layers the host does not provide.
    #[error("unsupported validation layers:\n{}", .layers.join("\n"))]
    UnsupportedLayer { layers: Vec<String> },

    /// A backend creation/query call returned a non-success status.
    #[error("Vulkan API error: {call} call returned {code}")]
    BackendInitFailure { call: &'static str, code: i32 },

    #[error("failed to find compatible GPUs with Vulkan")]
    NoCompatibleDevice,

    #[error("failed to find a suitable GPU")]
    NoSuitableDevice,

    #[error("window surface creation failed with status {code}")]
    SurfaceCreationFailure { code: i32 },

    /// The Vulkan runtime library could not be loaded.
    #[error("failed to load Vulkan library: {0}")]
    LoaderUnavailable(String),

    /// A layer, extension or application name cannot be passed as a C string.
    #[error("name contains an interior NUL byte: {0:?}")]
    InvalidName(String),

    /// A backend call needed an object that has not been created yet.
    #[error("{0} is not initialized")]
    NotInitialized(&'static str),
}

impl InitError {
    pub fn backend(call: &'static str, result: vk::Result) -> Self {
        Self::BackendInitFailure {
            call,
            code: result.as_raw(),
        }
    }
}

pub type InitResult<T> = Result<T, InitError>;
