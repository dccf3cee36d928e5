//! Vulkan error taxonomy
//!
//! Every native call site maps its `vk::Result` into [`VulkanError`]. Swapchain
//! staleness is not an error: acquire and present results are classified into
//! [`SurfaceStatus`] so the frame loop can rebuild instead of failing.

use ash::vk;
use thiserror::Error;

use crate::window::WindowError;

/// Vulkan-specific error types
#[derive(Error, Debug)]
pub enum VulkanError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// Vulkan context initialization failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// No suitable memory type found for allocation
    #[error("No suitable memory type found")]
    NoSuitableMemoryType,

    /// Data written to a buffer does not fit its allocation
    #[error("Buffer overflow: {requested} bytes requested, {capacity} available")]
    BufferOverflow {
        /// Number of bytes that were requested
        requested: u64,
        /// Size of the allocation
        capacity: u64,
    },

    /// A fence wait ran past its timeout
    #[error("Timed out after {timeout_ns} ns waiting for a frame fence")]
    FenceTimeout {
        /// The timeout that expired, in nanoseconds
        timeout_ns: u64,
    },

    /// The swapchain has a null handle or mismatched image arrays
    #[error("Swapchain is not valid after {0}")]
    SwapchainInvalid(&'static str),

    /// Window system failure surfaced through the renderer
    #[error("Window error: {0}")]
    Window(#[from] WindowError),
}

/// Result type for Vulkan operations
pub type VulkanResult<T> = Result<T, VulkanError>;

/// How well the swapchain still matches its surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceStatus {
    /// The swapchain matches the surface exactly
    Optimal,
    /// Presentation still works but the swapchain should be rebuilt
    Suboptimal,
    /// The swapchain can no longer be used and must be rebuilt
    OutOfDate,
}

impl SurfaceStatus {
    /// Whether a rebuild is required or advisable
    pub const fn needs_rebuild(self) -> bool {
        !matches!(self, Self::Optimal)
    }
}

/// Classify the result of `vkAcquireNextImageKHR`
///
/// Returns the acquired image index with its status. Out-of-date carries no
/// usable image, so it yields `None` for the index.
pub fn classify_acquire(result: Result<(u32, bool), vk::Result>) -> VulkanResult<(Option<u32>, SurfaceStatus)> {
    match result {
        Ok((index, false)) => Ok((Some(index), SurfaceStatus::Optimal)),
        Ok((index, true)) => Ok((Some(index), SurfaceStatus::Suboptimal)),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok((None, SurfaceStatus::OutOfDate)),
        Err(vk::Result::TIMEOUT | vk::Result::NOT_READY) => Err(VulkanError::InvalidOperation {
            reason: "no swapchain image became available".to_string(),
        }),
        Err(e) => Err(VulkanError::Api(e)),
    }
}

/// Classify the result of `vkQueuePresentKHR`
pub fn classify_present(result: Result<bool, vk::Result>) -> VulkanResult<SurfaceStatus> {
    match result {
        Ok(false) => Ok(SurfaceStatus::Optimal),
        Ok(true) => Ok(SurfaceStatus::Suboptimal),
        Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(SurfaceStatus::OutOfDate),
        Err(e) => Err(VulkanError::Api(e)),
    }
}

/// Map a fence wait result, keeping timeouts distinct from device failures
pub fn classify_fence_wait(result: Result<(), vk::Result>, timeout_ns: u64) -> VulkanResult<()> {
    match result {
        Ok(()) => Ok(()),
        Err(vk::Result::TIMEOUT) => Err(VulkanError::FenceTimeout { timeout_ns }),
        Err(e) => Err(VulkanError::Api(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_success_is_optimal() {
        let (index, status) = classify_acquire(Ok((2, false))).unwrap();
        assert_eq!(index, Some(2));
        assert_eq!(status, SurfaceStatus::Optimal);
    }

    #[test]
    fn test_acquire_suboptimal_keeps_image() {
        let (index, status) = classify_acquire(Ok((1, true))).unwrap();
        assert_eq!(index, Some(1));
        assert_eq!(status, SurfaceStatus::Suboptimal);
        assert!(status.needs_rebuild());
    }

    #[test]
    fn test_acquire_out_of_date_has_no_image() {
        let (index, status) = classify_acquire(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap();
        assert_eq!(index, None);
        assert_eq!(status, SurfaceStatus::OutOfDate);
    }

    #[test]
    fn test_acquire_device_lost_is_fatal() {
        let err = classify_acquire(Err(vk::Result::ERROR_DEVICE_LOST)).unwrap_err();
        assert!(matches!(err, VulkanError::Api(vk::Result::ERROR_DEVICE_LOST)));
    }

    #[test]
    fn test_present_statuses() {
        assert_eq!(classify_present(Ok(false)).unwrap(), SurfaceStatus::Optimal);
        assert_eq!(classify_present(Ok(true)).unwrap(), SurfaceStatus::Suboptimal);
        assert_eq!(
            classify_present(Err(vk::Result::ERROR_OUT_OF_DATE_KHR)).unwrap(),
            SurfaceStatus::OutOfDate
        );
        assert!(classify_present(Err(vk::Result::ERROR_SURFACE_LOST_KHR)).is_err());
    }

    #[test]
    fn test_fence_timeout_is_distinct() {
        let err = classify_fence_wait(Err(vk::Result::TIMEOUT), 5_000).unwrap_err();
        assert!(matches!(err, VulkanError::FenceTimeout { timeout_ns: 5_000 }));
        assert!(classify_fence_wait(Ok(()), u64::MAX).is_ok());
    }
}
