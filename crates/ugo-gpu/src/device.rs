//! Logical device and queue management.

use std::collections::BTreeSet;
use std::ffi::c_char;
use std::fmt;
use std::sync::Arc;

use ash::vk;

use crate::capabilities::{required_device_extensions, PhysicalDeviceInfo};
use crate::command::CommandPool;
use crate::error::{warn_on_failure, GpuError, Result};
use crate::instance::Instance;

/// Logical role a queue plays for the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueRole {
    Graphics,
    Present,
    Transfer,
}

impl fmt::Display for QueueRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Graphics => "graphics",
            Self::Present => "present",
            Self::Transfer => "transfer",
        })
    }
}

/// Resolved queue family indices. Roles may share a family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
    pub transfer: u32,
}

impl QueueFamilyIndices {
    /// Resolve all three roles from a probed device.
    pub fn resolve(info: &PhysicalDeviceInfo) -> Result<Self> {
        Ok(Self {
            graphics: info
                .graphics_family()
                .ok_or(GpuError::MissingQueueFamily(QueueRole::Graphics))?,
            present: info
                .present_family()
                .ok_or(GpuError::MissingQueueFamily(QueueRole::Present))?,
            transfer: info
                .transfer_family()
                .ok_or(GpuError::MissingQueueFamily(QueueRole::Transfer))?,
        })
    }

    /// Distinct family indices, ascending. Overlapping roles collapse to one entry.
    pub fn unique(&self) -> Vec<u32> {
        [self.graphics, self.present, self.transfer]
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// One queue-creation entry per distinct family, each with a single queue.
pub fn queue_create_infos<'a>(
    families: &[u32],
    priority: &'a [f32; 1],
) -> Vec<vk::DeviceQueueCreateInfo<'a>> {
    families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(priority)
        })
        .collect()
}

/// Logical device with its resolved queues.
///
/// Owns the probed [`PhysicalDeviceInfo`] so surface and extension data stay
/// queryable for the device's lifetime. Destroys the device on drop; every
/// object created from it holds an `Arc<Device>`, so it is always released last.
pub struct Device {
    instance: Arc<Instance>,
    device: ash::Device,
    physical: PhysicalDeviceInfo,
    swapchain_loader: ash::khr::swapchain::Device,
    families: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    transfer_queue: vk::Queue,
}

impl Device {
    /// Create the logical device and fetch one queue per role.
    pub fn new(instance: &Arc<Instance>, physical: PhysicalDeviceInfo) -> Result<Arc<Self>> {
        let families = QueueFamilyIndices::resolve(&physical)?;

        let priority = [1.0_f32];
        let unique_families = families.unique();
        let queue_infos = queue_create_infos(&unique_families, &priority);

        let extension_names: Vec<*const c_char> = required_device_extensions()
            .iter()
            .map(|ext| ext.as_ptr())
            .collect();

        // No optional base features; dynamic rendering and synchronization2 are chained.
        let features = vk::PhysicalDeviceFeatures::default();
        let mut dynamic_rendering =
            vk::PhysicalDeviceDynamicRenderingFeatures::default().dynamic_rendering(true);
        let mut synchronization2 =
            vk::PhysicalDeviceSynchronization2Features::default().synchronization2(true);

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extension_names)
            .enabled_features(&features)
            .push_next(&mut dynamic_rendering)
            .push_next(&mut synchronization2);

        // SAFETY: physical.handle was enumerated from instance; create_info outlives the call.
        let device = unsafe {
            instance
                .handle()
                .create_device(physical.handle, &create_info, None)?
        };

        // SAFETY: every family was requested with one queue above.
        let (graphics_queue, present_queue, transfer_queue) = unsafe {
            (
                device.get_device_queue(families.graphics, 0),
                device.get_device_queue(families.present, 0),
                device.get_device_queue(families.transfer, 0),
            )
        };

        let swapchain_loader = ash::khr::swapchain::Device::new(instance.handle(), &device);

        tracing::info!(
            graphics = families.graphics,
            present = families.present,
            transfer = families.transfer,
            "Logical device created with {} queue families",
            unique_families.len()
        );

        Ok(Arc::new(Self {
            instance: Arc::clone(instance),
            device,
            physical,
            swapchain_loader,
            families,
            graphics_queue,
            present_queue,
            transfer_queue,
        }))
    }

    /// Get the Vulkan device handle.
    pub fn handle(&self) -> &ash::Device {
        &self.device
    }

    /// Get the instance this device was created from.
    pub fn instance(&self) -> &Arc<Instance> {
        &self.instance
    }

    /// Get the probed physical device.
    pub fn physical(&self) -> &PhysicalDeviceInfo {
        &self.physical
    }

    /// Get the swapchain extension loader.
    pub fn swapchain_loader(&self) -> &ash::khr::swapchain::Device {
        &self.swapchain_loader
    }

    /// Get the resolved queue family indices.
    pub fn families(&self) -> QueueFamilyIndices {
        self.families
    }

    /// Get the graphics queue family index.
    pub fn graphics_family(&self) -> u32 {
        self.families.graphics
    }

    /// Get the present queue family index.
    pub fn present_family(&self) -> u32 {
        self.families.present
    }

    /// Get the transfer queue family index.
    pub fn transfer_family(&self) -> u32 {
        self.families.transfer
    }

    /// Get the graphics queue.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Get the present queue.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    /// Get the transfer queue.
    pub fn transfer_queue(&self) -> vk::Queue {
        self.transfer_queue
    }

    /// Allocate a command pool on the graphics family.
    pub fn alloc_graphics_pool(
        self: &Arc<Self>,
        flags: vk::CommandPoolCreateFlags,
    ) -> Result<CommandPool> {
        CommandPool::new(self, self.families.graphics, flags)
    }

    /// Allocate a command pool on the transfer family.
    pub fn alloc_transfer_pool(
        self: &Arc<Self>,
        flags: vk::CommandPoolCreateFlags,
    ) -> Result<CommandPool> {
        CommandPool::new(self, self.families.transfer, flags)
    }

    /// Wait for device to be idle.
    pub fn wait_idle(&self) -> Result<()> {
        // SAFETY: the device handle is valid for the lifetime of self.
        unsafe {
            self.device.device_wait_idle()?;
        }
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        tracing::debug!("Destroying logical device");
        // SAFETY: child objects hold Arc<Device>, so none remain.
        unsafe {
            warn_on_failure(self.device.device_wait_idle(), "wait idle before device destruction");
            self.device.destroy_device(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::tests::{candidate, family};

    #[test]
    fn shared_family_collapses_to_one_entry() {
        let info = candidate(vec![family(
            vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER,
            true,
        )]);
        let families = QueueFamilyIndices::resolve(&info).unwrap();
        assert_eq!(
            families,
            QueueFamilyIndices {
                graphics: 0,
                present: 0,
                transfer: 0
            }
        );

        let priority = [1.0];
        let infos = queue_create_infos(&families.unique(), &priority);
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].queue_family_index, 0);
        assert_eq!(infos[0].queue_count, 1);
    }

    #[test]
    fn distinct_families_each_get_an_entry() {
        let families = QueueFamilyIndices {
            graphics: 0,
            present: 2,
            transfer: 1,
        };
        assert_eq!(families.unique(), vec![0, 1, 2]);

        let families = QueueFamilyIndices {
            graphics: 0,
            present: 0,
            transfer: 1,
        };
        assert_eq!(families.unique(), vec![0, 1]);
    }

    #[test]
    fn unresolved_family_fails_construction() {
        let info = candidate(vec![family(vk::QueueFlags::COMPUTE, true)]);
        let err = QueueFamilyIndices::resolve(&info).unwrap_err();
        assert!(matches!(err, GpuError::MissingQueueFamily(QueueRole::Graphics)));

        let info = candidate(vec![family(vk::QueueFlags::GRAPHICS, false)]);
        let err = QueueFamilyIndices::resolve(&info).unwrap_err();
        assert!(matches!(err, GpuError::MissingQueueFamily(QueueRole::Present)));
        assert_eq!(err.to_string(), "No present queue family available");
    }
}
