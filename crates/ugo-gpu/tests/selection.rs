//! Device selection and swapchain negotiation against synthetic devices.

use ash::vk;
use ugo_gpu::capabilities::required_device_extensions;
use ugo_gpu::device::queue_create_infos;
use ugo_gpu::error::check_wait;
use ugo_gpu::{
    calculate_extent, pick_first_usable, select_image_count, GpuError, ImageSharing,
    PhysicalDeviceInfo, QueueFamilyIndices, QueueFamilyInfo, SurfaceSupport,
};

fn family(flags: vk::QueueFlags, supports_present: bool) -> QueueFamilyInfo {
    QueueFamilyInfo {
        flags,
        queue_count: 1,
        supports_present,
    }
}

fn device(families: Vec<QueueFamilyInfo>) -> PhysicalDeviceInfo {
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
            formats: vec![vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_SRGB,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            }],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        },
    }
}

#[test]
fn combined_family_yields_single_queue_entry() {
    let info = device(vec![family(
        vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER,
        true,
    )]);

    let families = QueueFamilyIndices::resolve(&info).unwrap();
    assert_eq!(families.unique(), vec![0]);

    let priority = [1.0];
    let infos = queue_create_infos(&families.unique(), &priority);
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].queue_family_index, 0);
    assert_eq!(infos[0].queue_count, 1);
}

#[test]
fn split_present_family_requires_concurrent_sharing() {
    let info = device(vec![
        family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::TRANSFER, false),
        family(vk::QueueFlags::TRANSFER, true),
    ]);

    let families = QueueFamilyIndices::resolve(&info).unwrap();
    assert_eq!(families.graphics, 0);
    assert_eq!(families.present, 1);

    let sharing = ImageSharing::for_families(families.graphics, families.present);
    assert!(sharing.is_concurrent());
    assert_eq!(sharing.mode, vk::SharingMode::CONCURRENT);
    assert_eq!(sharing.queue_families, vec![0, 1]);
}

#[test]
fn application_sized_extent_uses_framebuffer() {
    let caps = vk::SurfaceCapabilitiesKHR {
        current_extent: vk::Extent2D {
            width: u32::MAX,
            height: u32::MAX,
        },
        min_image_extent: vk::Extent2D {
            width: 1,
            height: 1,
        },
        max_image_extent: vk::Extent2D {
            width: 4096,
            height: 4096,
        },
        ..Default::default()
    };

    let extent = calculate_extent(
        &caps,
        vk::Extent2D {
            width: 1080,
            height: 720,
        },
    );
    assert_eq!(extent.width, 1080);
    assert_eq!(extent.height, 720);
}

#[test]
fn expired_fence_wait_is_a_timeout_error() {
    let err = check_wait::<()>(Err(vk::Result::TIMEOUT), "fence").unwrap_err();
    assert!(err.is_timeout());
    assert!(matches!(err, GpuError::Timeout { operation: "fence" }));
    assert_eq!(err.to_string(), "Timed out waiting for fence");
}

#[test]
fn image_count_stays_within_bounds() {
    for (min, max) in [(1, 0), (2, 3), (3, 3), (2, 8), (4, 0)] {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            ..Default::default()
        };
        let count = select_image_count(&caps);

        assert!(count >= min);
        if max > 0 {
            assert!(count <= max);
            assert_eq!(count, (min + 1).min(max));
        } else {
            assert_eq!(count, min + 1);
        }
    }
}

#[test]
fn first_usable_device_wins() {
    let mut missing_swapchain = device(vec![family(vk::QueueFlags::GRAPHICS, true)]);
    missing_swapchain.properties.device_id = 1;
    missing_swapchain
        .extensions
        .retain(|e| e != "VK_KHR_swapchain");

    let mut no_present = device(vec![family(vk::QueueFlags::GRAPHICS, false)]);
    no_present.properties.device_id = 2;

    let mut good = device(vec![family(vk::QueueFlags::GRAPHICS, true)]);
    good.properties.device_id = 3;

    let mut also_good = device(vec![family(vk::QueueFlags::GRAPHICS, true)]);
    also_good.properties.device_id = 4;

    let chosen = pick_first_usable(vec![missing_swapchain, no_present, good, also_good]).unwrap();
    assert_eq!(chosen.properties.device_id, 3);
}

#[test]
fn no_usable_device_is_an_error() {
    let mut info = device(vec![family(vk::QueueFlags::COMPUTE, true)]);
    info.extensions.clear();

    let err = pick_first_usable(vec![info]).unwrap_err();
    assert!(matches!(err, GpuError::NoSuitableDevice));
}
