//! GPU context management.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::capabilities::select_physical_device;
use crate::command::CommandPool;
use crate::device::Device;
use crate::error::{GpuError, Result};
use crate::instance::Instance;
use crate::surface::Surface;

/// Everything needed to render to one window: instance, surface and device.
///
/// Fields drop in declaration order, so the device goes before the surface
/// and the surface before the instance.
pub struct GpuContext {
    device: Arc<Device>,
    surface: Arc<Surface>,
    instance: Arc<Instance>,
}

impl GpuContext {
    /// Get the logical device.
    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Get the presentation surface.
    pub fn surface(&self) -> &Arc<Surface> {
        &self.surface
    }

    /// Get the instance.
    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.device.graphics_queue()
    }

    /// Get the present queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.device.present_queue()
    }

    /// Create a resettable command pool on the graphics family.
    pub fn create_graphics_pool(&self) -> Result<CommandPool> {
        self.device
            .alloc_graphics_pool(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }
}

/// Builder for creating a GPU context.
pub struct GpuContextBuilder {
    app_name: String,
    enable_validation: bool,
}

impl Default for GpuContextBuilder {
    fn default() -> Self {
        Self {
            app_name: "ugo-vk".to_string(),
            enable_validation: cfg!(debug_assertions),
        }
    }
}

impl GpuContextBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Enable or disable validation layers.
    pub fn validation(mut self, enable: bool) -> Self {
        self.enable_validation = enable;
        self
    }

    /// Build the GPU context for `window`.
    ///
    /// # Safety
    /// The window must outlive the returned context.
    pub unsafe fn build<W>(self, window: &W) -> Result<GpuContext>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display = window
            .display_handle()
            .map_err(|e| GpuError::SurfaceCreation(format!("Failed to get display handle: {e}")))?
            .as_raw();

        let instance = Arc::new(Instance::new(
            &self.app_name,
            display,
            self.enable_validation,
        )?);
        tracing::info!(
            "Vulkan instance created (validation: {})",
            self.enable_validation
        );

        // SAFETY: caller guarantees the window outlives the context.
        let surface = Arc::new(unsafe { Surface::from_window(&instance, window) }?);

        let physical = select_physical_device(&instance, &surface)?;
        let device = Device::new(&instance, physical)?;

        Ok(GpuContext {
            device,
            surface,
            instance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults() {
        let builder = GpuContextBuilder::new();
        assert_eq!(builder.app_name, "ugo-vk");
        assert_eq!(builder.enable_validation, cfg!(debug_assertions));
    }

    #[test]
    fn builder_overrides() {
        let builder = GpuContextBuilder::new().app_name("tri").validation(false);
        assert_eq!(builder.app_name, "tri");
        assert!(!builder.enable_validation);
    }
}
