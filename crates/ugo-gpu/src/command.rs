//! Command buffer management.

use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::{GpuError, Result};

/// Command pool for allocating command buffers.
pub struct CommandPool {
    device: Arc<Device>,
    pool: vk::CommandPool,
    queue_family: u32,
}

impl CommandPool {
    /// Create a new command pool bound to `queue_family`.
    pub fn new(
        device: &Arc<Device>,
        queue_family: u32,
        flags: vk::CommandPoolCreateFlags,
    ) -> Result<Self> {
        let create_info = vk::CommandPoolCreateInfo::default()
            .queue_family_index(queue_family)
            .flags(flags);

        // SAFETY: the device is valid and queue_family was requested at device creation.
        let pool = unsafe { device.handle().create_command_pool(&create_info, None)? };

        Ok(Self {
            device: Arc::clone(device),
            pool,
            queue_family,
        })
    }

    /// Get the raw pool handle.
    pub fn handle(&self) -> vk::CommandPool {
        self.pool
    }

    /// Get the queue family index.
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Allocate a single primary command buffer.
    ///
    /// The buffer is freed together with the pool.
    pub fn allocate_command_buffer(&self) -> Result<CommandBuffer> {
        let alloc_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);

        // SAFETY: the pool belongs to this device.
        let buffers = unsafe { self.device.handle().allocate_command_buffers(&alloc_info)? };
        let buffer = buffers
            .first()
            .copied()
            .ok_or_else(|| GpuError::InvalidState("Driver returned no command buffer".into()))?;

        Ok(CommandBuffer {
            device: Arc::clone(&self.device),
            buffer,
        })
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        // SAFETY: owners wait for the device to go idle before dropping the pool.
        unsafe {
            self.device.handle().destroy_command_pool(self.pool, None);
        }
    }
}

/// Primary command buffer allocated from a [`CommandPool`].
pub struct CommandBuffer {
    device: Arc<Device>,
    buffer: vk::CommandBuffer,
}

impl CommandBuffer {
    /// Get the raw command buffer handle.
    pub fn handle(&self) -> vk::CommandBuffer {
        self.buffer
    }

    /// Begin recording.
    pub fn begin(&self, flags: vk::CommandBufferUsageFlags) -> Result<()> {
        let begin_info = vk::CommandBufferBeginInfo::default().flags(flags);
        // SAFETY: the caller has waited for any previous submission of this buffer.
        unsafe {
            self.device.handle().begin_command_buffer(self.buffer, &begin_info)?;
        }
        Ok(())
    }

    /// End recording.
    pub fn end(&self) -> Result<()> {
        // SAFETY: the buffer is in the recording state.
        unsafe {
            self.device.handle().end_command_buffer(self.buffer)?;
        }
        Ok(())
    }

    /// Return the buffer to the initial state.
    ///
    /// Requires a pool created with `RESET_COMMAND_BUFFER`.
    pub fn reset(&self) -> Result<()> {
        // SAFETY: the caller has waited for any previous submission of this buffer.
        unsafe {
            self.device
                .handle()
                .reset_command_buffer(self.buffer, vk::CommandBufferResetFlags::empty())?;
        }
        Ok(())
    }

    /// Submit info for `vkQueueSubmit2`.
    pub fn submit_info(&self) -> vk::CommandBufferSubmitInfo<'static> {
        vk::CommandBufferSubmitInfo::default()
            .command_buffer(self.buffer)
            .device_mask(0)
    }
}
