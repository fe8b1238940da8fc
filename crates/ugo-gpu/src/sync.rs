//! Synchronization primitives.

use std::sync::Arc;
use std::time::Duration;

use ash::vk;

use crate::device::Device;
use crate::error::{check_wait, Result};

/// Convert a timeout to the nanosecond count Vulkan expects, saturating.
pub fn timeout_ns(timeout: Duration) -> u64 {
    u64::try_from(timeout.as_nanos()).unwrap_or(u64::MAX)
}

/// GPU-to-GPU ordering signal. Destroyed on drop.
pub struct Semaphore {
    device: Arc<Device>,
    semaphore: vk::Semaphore,
}

impl Semaphore {
    /// Create a binary semaphore.
    pub fn new(device: &Arc<Device>, flags: vk::SemaphoreCreateFlags) -> Result<Self> {
        let create_info = vk::SemaphoreCreateInfo::default().flags(flags);
        // SAFETY: the device is valid.
        let semaphore = unsafe { device.handle().create_semaphore(&create_info, None)? };
        Ok(Self {
            device: Arc::clone(device),
            semaphore,
        })
    }

    /// Get the raw semaphore handle.
    pub fn handle(&self) -> vk::Semaphore {
        self.semaphore
    }

    /// Bind this semaphore to `stages` for a `vkQueueSubmit2` wait or signal.
    pub fn submit_info(&self, stages: vk::PipelineStageFlags2) -> vk::SemaphoreSubmitInfo<'static> {
        semaphore_submit_info(self.semaphore, stages)
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        // SAFETY: owners wait for the device to go idle before dropping.
        unsafe {
            self.device.handle().destroy_semaphore(self.semaphore, None);
        }
    }
}

/// Submit info binding a semaphore to a pipeline-stage mask.
pub fn semaphore_submit_info(
    semaphore: vk::Semaphore,
    stages: vk::PipelineStageFlags2,
) -> vk::SemaphoreSubmitInfo<'static> {
    vk::SemaphoreSubmitInfo::default()
        .semaphore(semaphore)
        .stage_mask(stages)
        .device_index(0)
        .value(1)
}

/// GPU-to-CPU completion signal. Destroyed on drop.
pub struct Fence {
    device: Arc<Device>,
    fence: vk::Fence,
}

impl Fence {
    /// Create a fence, optionally already signaled.
    pub fn new(device: &Arc<Device>, flags: vk::FenceCreateFlags) -> Result<Self> {
        let create_info = vk::FenceCreateInfo::default().flags(flags);
        // SAFETY: the device is valid.
        let fence = unsafe { device.handle().create_fence(&create_info, None)? };
        Ok(Self {
            device: Arc::clone(device),
            fence,
        })
    }

    /// Get the raw fence handle.
    pub fn handle(&self) -> vk::Fence {
        self.fence
    }

    /// Block until the fence is signaled.
    ///
    /// Fails with a timeout error if `timeout` elapses first.
    pub fn wait(&self, timeout: Duration) -> Result<()> {
        // SAFETY: the fence belongs to this device.
        let result = unsafe {
            self.device
                .handle()
                .wait_for_fences(&[self.fence], true, timeout_ns(timeout))
        };
        check_wait(result, "fence")
    }

    /// Return the fence to the unsignaled state.
    ///
    /// Must be called before the fence is passed to another submission.
    pub fn reset(&self) -> Result<()> {
        // SAFETY: callers only reset after a successful wait, so the fence is not pending.
        unsafe {
            self.device.handle().reset_fences(&[self.fence])?;
        }
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        // SAFETY: owners wait for the device to go idle before dropping.
        unsafe {
            self.device.handle().destroy_fence(self.fence, None);
        }
    }
}
