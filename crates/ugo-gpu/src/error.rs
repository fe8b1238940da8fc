//! GPU error types.

use std::path::PathBuf;

use ash::vk;
use thiserror::Error;

use crate::device::QueueRole;

/// GPU-related errors.
#[derive(Error, Debug)]
pub enum GpuError {
    /// Vulkan error.
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] vk::Result),

    /// The Vulkan loader could not be found or initialized.
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// A requested instance layer is not installed.
    #[error("Required validation layer {0} not found")]
    LayerNotAvailable(String),

    /// No enumerated GPU passed the usability checks.
    #[error("No usable physical devices found")]
    NoSuitableDevice,

    /// A queue family needed for one of the device roles could not be resolved.
    #[error("No {0} queue family available")]
    MissingQueueFamily(QueueRole),

    /// A bounded wait expired before the GPU signaled.
    #[error("Timed out waiting for {operation}")]
    Timeout {
        /// What was being waited on.
        operation: &'static str,
    },

    /// Surface creation failed.
    #[error("Surface creation failed: {0}")]
    SurfaceCreation(String),

    /// Swapchain creation failed.
    #[error("Swapchain creation failed: {0}")]
    SwapchainCreation(String),

    /// A SPIR-V file could not be read.
    #[error("Could not open file {}: {source}", path.display())]
    ShaderLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Pipeline creation failed.
    #[error("Pipeline creation failed: {0}")]
    PipelineCreation(String),

    /// Invalid state.
    #[error("Invalid state: {0}")]
    InvalidState(String),
}

impl GpuError {
    /// Whether this error is a timeout-class failure.
    pub const fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, GpuError>;

/// Convert the result of a bounded wait into a [`GpuError`].
///
/// `vk::Result::TIMEOUT` and `NOT_READY` become [`GpuError::Timeout`]; every
/// other failure keeps its native result code.
pub fn check_wait<T>(result: ash::prelude::VkResult<T>, operation: &'static str) -> Result<T> {
    result.map_err(|e| match e {
        vk::Result::TIMEOUT | vk::Result::NOT_READY => GpuError::Timeout { operation },
        other => GpuError::Vulkan(other),
    })
}

/// Log a failure that cannot be propagated, such as one inside `Drop`.
///
/// Returns the failing result code, if any.
pub fn warn_on_failure(result: ash::prelude::VkResult<()>, operation: &str) -> Option<vk::Result> {
    let err = result.err()?;
    tracing::warn!("Failed to {operation}: {err}");
    Some(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_timeout_error() {
        let err = check_wait::<()>(Err(vk::Result::TIMEOUT), "fence").unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(err.to_string(), "Timed out waiting for fence");
    }

    #[test]
    fn other_failures_keep_result_code() {
        let err = check_wait::<()>(Err(vk::Result::ERROR_DEVICE_LOST), "fence").unwrap_err();
        assert!(matches!(err, GpuError::Vulkan(vk::Result::ERROR_DEVICE_LOST)));
    }

    #[test]
    fn shader_load_message_names_file() {
        let err = GpuError::ShaderLoad {
            path: PathBuf::from("shader/tri.vert.spv"),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        };
        assert!(err.to_string().contains("shader/tri.vert.spv"));
    }

    #[test]
    fn drop_failures_are_reported() {
        assert_eq!(warn_on_failure(Ok(()), "wait idle"), None);
        assert_eq!(
            warn_on_failure(Err(vk::Result::ERROR_DEVICE_LOST), "wait idle"),
            Some(vk::Result::ERROR_DEVICE_LOST)
        );
    }
}
