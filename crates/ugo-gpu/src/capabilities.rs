//! GPU capability probing and device selection.
//!
//! A [`PhysicalDeviceInfo`] is a snapshot of everything the renderer needs to
//! know about one GPU: its properties, queue families (with per-family
//! presentation support for the target surface), extensions, and surface
//! support. All selection decisions are pure functions over that snapshot.

use std::ffi::CStr;

use ash::vk;
use thiserror::Error;

use crate::error::{GpuError, Result};
use crate::instance::Instance;
use crate::surface::{Surface, SurfaceSupport};

/// GPU vendor identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl GpuVendor {
    /// Identify vendor from PCI vendor ID.
    pub const fn from_vendor_id(id: u32) -> Self {
        match id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// Device extensions every usable GPU must expose.
pub fn required_device_extensions() -> Vec<&'static CStr> {
    vec![
        ash::khr::swapchain::NAME,
        ash::khr::dynamic_rendering::NAME,
        ash::khr::synchronization2::NAME,
        #[cfg(target_os = "macos")]
        ash::khr::portability_subset::NAME,
    ]
}

/// One queue family as reported by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyInfo {
    /// Capability flags (graphics, compute, transfer, ...).
    pub flags: vk::QueueFlags,
    /// Number of queues in the family.
    pub queue_count: u32,
    /// Whether this family can present to the target surface.
    pub supports_present: bool,
}

/// Why a GPU was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Vulkan {major}.{minor} is older than 1.3.")]
    ApiVersion { major: u32, minor: u32 },
    #[error("No graphics queue found.")]
    NoGraphicsQueue,
    #[error("No queue family can present to the surface.")]
    NoPresentQueue,
    #[error("No supported surface formats.")]
    NoSurfaceFormats,
    #[error("No supported present modes.")]
    NoPresentModes,
    #[error("Extension {0} not found.")]
    MissingExtension(String),
}

/// Everything known about one physical device.
#[derive(Debug, Clone)]
pub struct PhysicalDeviceInfo {
    /// Raw physical device handle.
    pub handle: vk::PhysicalDevice,
    /// Device properties.
    pub properties: vk::PhysicalDeviceProperties,
    /// Device features.
    pub features: vk::PhysicalDeviceFeatures,
    /// Queue families in driver order.
    pub queue_families: Vec<QueueFamilyInfo>,
    /// Supported device extension names.
    pub extensions: Vec<String>,
    /// Surface capabilities, formats and present modes.
    pub surface: SurfaceSupport,
}

impl PhysicalDeviceInfo {
    /// Query a physical device against the target surface.
    ///
    /// # Safety
    /// `physical_device` must have been enumerated from `instance`, and
    /// `surface` must belong to the same instance.
    pub unsafe fn query(
        instance: &Instance,
        surface: &Surface,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let raw = instance.handle();

        // SAFETY: caller guarantees physical_device belongs to instance.
        let (properties, features, families, extensions) = unsafe {
            (
                raw.get_physical_device_properties(physical_device),
                raw.get_physical_device_features(physical_device),
                raw.get_physical_device_queue_family_properties(physical_device),
                raw.enumerate_device_extension_properties(physical_device)?,
            )
        };

        let queue_families = families
            .iter()
            .zip(0u32..)
            .map(|(family, index)| {
                Ok(QueueFamilyInfo {
                    flags: family.queue_flags,
                    queue_count: family.queue_count,
                    supports_present: surface.family_supports_present(physical_device, index)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let extensions = extensions
            .iter()
            .filter_map(|ext| {
                ext.extension_name_as_c_str()
                    .ok()
                    .and_then(|name| name.to_str().ok())
                    .map(String::from)
            })
            .collect();

        Ok(Self {
            handle: physical_device,
            properties,
            features,
            queue_families,
            extensions,
            surface: surface.support(physical_device)?,
        })
    }

    /// Device name as reported by the driver.
    pub fn name(&self) -> String {
        self.properties
            .device_name_as_c_str()
            .map_or_else(|_| "<unnamed>".to_string(), |n| n.to_string_lossy().into_owned())
    }

    /// GPU vendor.
    pub const fn vendor(&self) -> GpuVendor {
        GpuVendor::from_vendor_id(self.properties.vendor_id)
    }

    /// First family whose flags include graphics support.
    pub fn graphics_family(&self) -> Option<u32> {
        self.queue_families
            .iter()
            .position(|f| f.flags.contains(vk::QueueFlags::GRAPHICS))
            .and_then(|i| u32::try_from(i).ok())
    }

    /// The graphics family if it can present, otherwise the first family that can.
    pub fn present_family(&self) -> Option<u32> {
        if let Some(graphics) = self.graphics_family() {
            if self.queue_families[graphics as usize].supports_present {
                return Some(graphics);
            }
        }

        self.queue_families
            .iter()
            .position(|f| f.supports_present)
            .and_then(|i| u32::try_from(i).ok())
    }

    /// A transfer-capable family other than the graphics family, falling back
    /// to the graphics family (graphics queues always accept transfer work).
    pub fn transfer_family(&self) -> Option<u32> {
        let graphics = self.graphics_family();

        self.queue_families
            .iter()
            .zip(0u32..)
            .find(|(f, i)| f.flags.contains(vk::QueueFlags::TRANSFER) && Some(*i) != graphics)
            .map(|(_, i)| i)
            .or(graphics)
    }

    /// Whether the device exposes an extension.
    pub fn supports_extension(&self, name: &CStr) -> bool {
        name.to_str()
            .is_ok_and(|name| self.extensions.iter().any(|ext| ext == name))
    }

    /// The first reason this device cannot be used, if any.
    pub fn rejection(&self) -> Option<Rejection> {
        let api = self.properties.api_version;
        if api < vk::API_VERSION_1_3 {
            return Some(Rejection::ApiVersion {
                major: vk::api_version_major(api),
                minor: vk::api_version_minor(api),
            });
        }
        if self.graphics_family().is_none() {
            return Some(Rejection::NoGraphicsQueue);
        }
        if self.present_family().is_none() {
            return Some(Rejection::NoPresentQueue);
        }
        if self.surface.formats.is_empty() {
            return Some(Rejection::NoSurfaceFormats);
        }
        if self.surface.present_modes.is_empty() {
            return Some(Rejection::NoPresentModes);
        }

        required_device_extensions()
            .into_iter()
            .find(|ext| !self.supports_extension(ext))
            .map(|ext| Rejection::MissingExtension(ext.to_string_lossy().into_owned()))
    }

    /// Whether the device satisfies every requirement.
    pub fn is_usable(&self) -> bool {
        self.rejection().is_none()
    }

    /// Get a human-readable summary of the device.
    pub fn summary(&self) -> String {
        let api = self.properties.api_version;
        format!(
            "{} ({:?}, {:?}) - Vulkan {}.{}.{}",
            self.name(),
            self.vendor(),
            self.properties.device_type,
            vk::api_version_major(api),
            vk::api_version_minor(api),
            vk::api_version_patch(api),
        )
    }
}

/// Take the first usable candidate in enumeration order.
///
/// Rejected candidates are logged with the reason and skipped.
pub fn pick_first_usable(
    candidates: impl IntoIterator<Item = PhysicalDeviceInfo>,
) -> Result<PhysicalDeviceInfo> {
    for (i, candidate) in candidates.into_iter().enumerate() {
        tracing::info!("Device {i}: {}", candidate.name());

        match candidate.rejection() {
            None => {
                tracing::info!("Selected device {i}: {}", candidate.summary());
                return Ok(candidate);
            }
            Some(reason) => {
                tracing::info!("{reason}");
                tracing::info!("Rejected device.");
            }
        }
    }

    Err(GpuError::NoSuitableDevice)
}

/// Enumerate physical devices and select the first usable one for `surface`.
pub fn select_physical_device(instance: &Instance, surface: &Surface) -> Result<PhysicalDeviceInfo> {
    // SAFETY: instance is valid for the duration of the call.
    let devices = unsafe { instance.handle().enumerate_physical_devices()? };

    let candidates = devices.into_iter().filter_map(|device| {
        // SAFETY: device was just enumerated from instance, surface shares the instance.
        match unsafe { PhysicalDeviceInfo::query(instance, surface, device) } {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!("Failed to query device {device:?}: {e}");
                None
            }
        }
    });

    pick_first_usable(candidates)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn family(flags: vk::QueueFlags, supports_present: bool) -> QueueFamilyInfo {
        QueueFamilyInfo {
            flags,
            queue_count: 1,
            supports_present,
        }
    }

    pub(crate) fn candidate(families: Vec<QueueFamilyInfo>) -> PhysicalDeviceInfo {
        PhysicalDeviceInfo {
            handle: vk::PhysicalDevice::null(),
            properties: vk::PhysicalDeviceProperties {
                api_version: vk::API_VERSION_1_3,
                ..Default::default()
            },
            features: vk::PhysicalDeviceFeatures::default(),
            queue_families: families,
            extensions: required_device_extensions()
                .iter()
                .map(|e| e.to_string_lossy().into_owned())
                .collect(),
            surface: SurfaceSupport {
                capabilities: vk::SurfaceCapabilitiesKHR::default(),
                formats: vec![vk::SurfaceFormatKHR::default()],
                present_modes: vec![vk::PresentModeKHR::FIFO],
            },
        }
    }

    const GT: vk::QueueFlags = vk::QueueFlags::from_raw(
        vk::QueueFlags::GRAPHICS.as_raw()
            | vk::QueueFlags::COMPUTE.as_raw()
            | vk::QueueFlags::TRANSFER.as_raw(),
    );

    #[test]
    fn vendor_identification() {
        assert_eq!(GpuVendor::from_vendor_id(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from_vendor_id(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from_vendor_id(0x8086), GpuVendor::Intel);
        assert_eq!(GpuVendor::from_vendor_id(0x1234), GpuVendor::Other(0x1234));
    }

    #[test]
    fn graphics_family_is_first_graphics_capable() {
        let info = candidate(vec![
            family(vk::QueueFlags::TRANSFER, false),
            family(vk::QueueFlags::COMPUTE, false),
            family(GT, true),
            family(vk::QueueFlags::GRAPHICS, true),
        ]);
        assert_eq!(info.graphics_family(), Some(2));
    }

    #[test]
    fn graphics_family_absent() {
        let info = candidate(vec![family(vk::QueueFlags::COMPUTE, true)]);
        assert_eq!(info.graphics_family(), None);
        assert_eq!(info.rejection(), Some(Rejection::NoGraphicsQueue));
    }

    #[test]
    fn present_prefers_graphics_family() {
        let info = candidate(vec![
            family(vk::QueueFlags::TRANSFER, true),
            family(GT, true),
        ]);
        assert_eq!(info.present_family(), Some(1));
    }

    #[test]
    fn present_falls_back_to_first_presenting_family() {
        let info = candidate(vec![
            family(GT, false),
            family(vk::QueueFlags::COMPUTE, false),
            family(vk::QueueFlags::TRANSFER, true),
            family(vk::QueueFlags::COMPUTE, true),
        ]);
        assert_eq!(info.present_family(), Some(2));
    }

    #[test]
    fn no_present_family_rejects() {
        let info = candidate(vec![family(GT, false)]);
        assert_eq!(info.present_family(), None);
        assert!(!info.is_usable());
        assert_eq!(info.rejection(), Some(Rejection::NoPresentQueue));
    }

    #[test]
    fn transfer_prefers_dedicated_family() {
        let info = candidate(vec![
            family(GT, true),
            family(vk::QueueFlags::COMPUTE, false),
            family(vk::QueueFlags::TRANSFER, false),
        ]);
        assert_eq!(info.transfer_family(), Some(2));
    }

    #[test]
    fn transfer_falls_back_to_graphics() {
        let info = candidate(vec![family(GT, true), family(vk::QueueFlags::COMPUTE, false)]);
        assert_eq!(info.transfer_family(), Some(0));
    }

    #[test]
    fn empty_surface_support_rejects() {
        let mut info = candidate(vec![family(GT, true)]);
        info.surface.formats.clear();
        assert_eq!(info.rejection(), Some(Rejection::NoSurfaceFormats));

        let mut info = candidate(vec![family(GT, true)]);
        info.surface.present_modes.clear();
        assert_eq!(info.rejection(), Some(Rejection::NoPresentModes));
    }

    #[test]
    fn each_missing_extension_rejects() {
        for missing in required_device_extensions() {
            let mut info = candidate(vec![family(GT, true)]);
            let name = missing.to_string_lossy().into_owned();
            info.extensions.retain(|e| *e != name);

            assert!(!info.is_usable(), "usable without {name}");
            assert_eq!(info.rejection(), Some(Rejection::MissingExtension(name)));
        }
    }

    #[test]
    fn pre_1_3_driver_rejects() {
        let mut info = candidate(vec![family(GT, true)]);
        info.properties.api_version = vk::make_api_version(0, 1, 2, 198);
        assert_eq!(
            info.rejection(),
            Some(Rejection::ApiVersion { major: 1, minor: 2 })
        );
    }

    #[test]
    fn complete_device_is_usable() {
        let mut info = candidate(vec![family(GT, true)]);
        info.extensions.push("VK_EXT_unrelated".to_string());
        assert!(info.is_usable());
    }

    #[test]
    fn first_usable_candidate_wins() {
        let rejected = candidate(vec![family(vk::QueueFlags::COMPUTE, true)]);
        let mut first = candidate(vec![family(GT, true)]);
        first.properties.vendor_id = 0x10DE;
        let mut second = candidate(vec![family(GT, true)]);
        second.properties.vendor_id = 0x1002;

        let chosen = pick_first_usable(vec![rejected, first, second]).unwrap();
        assert_eq!(chosen.vendor(), GpuVendor::Nvidia);
    }

    #[test]
    fn no_usable_candidate_is_fatal() {
        let rejected = candidate(vec![family(vk::QueueFlags::COMPUTE, true)]);
        let err = pick_first_usable(vec![rejected]).unwrap_err();
        assert!(matches!(err, GpuError::NoSuitableDevice));
    }
}
