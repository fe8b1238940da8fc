//! Swapchain management.

use std::sync::Arc;
use std::time::Duration;

use ash::vk;

use crate::device::Device;
use crate::error::{check_wait, GpuError, Result};
use crate::surface::Surface;
use crate::sync::{timeout_ns, Semaphore};

/// Preferred surface format: 8-bit BGRA, sRGB nonlinear.
pub const PREFERRED_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
    format: vk::Format::B8G8R8A8_SRGB,
    color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
};

/// Select the surface format: the preferred pair if offered, otherwise the first.
///
/// Returns `None` only for an empty list.
pub fn select_surface_format(available: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    available
        .iter()
        .copied()
        .find(|f| {
            f.format == PREFERRED_SURFACE_FORMAT.format
                && f.color_space == PREFERRED_SURFACE_FORMAT.color_space
        })
        .or_else(|| available.first().copied())
}

/// Select the present mode: mailbox if offered, otherwise FIFO (always supported).
pub fn select_present_mode(available: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if available.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        vk::PresentModeKHR::FIFO
    }
}

/// Calculate swapchain extent.
///
/// When the surface reports `u32::MAX` as its current width the application
/// decides, so the framebuffer size is clamped into the surface bounds.
/// Otherwise the surface's current extent is used verbatim.
pub fn calculate_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    framebuffer: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width != u32::MAX {
        capabilities.current_extent
    } else {
        vk::Extent2D {
            width: framebuffer.width.clamp(
                capabilities.min_image_extent.width,
                capabilities.max_image_extent.width,
            ),
            height: framebuffer.height.clamp(
                capabilities.min_image_extent.height,
                capabilities.max_image_extent.height,
            ),
        }
    }
}

/// One more image than the minimum, capped at the maximum (0 means unbounded).
pub fn select_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let image_count = capabilities.min_image_count.saturating_add(1);
    if capabilities.max_image_count > 0 {
        image_count.min(capabilities.max_image_count)
    } else {
        image_count
    }
}

/// Image usage for chain images: color attachment only.
///
/// Fails if the surface does not list it, which conforming drivers never do.
pub fn swapchain_usage(capabilities: &vk::SurfaceCapabilitiesKHR) -> Result<vk::ImageUsageFlags> {
    let usage = vk::ImageUsageFlags::COLOR_ATTACHMENT;
    if capabilities.supported_usage_flags.contains(usage) {
        Ok(usage)
    } else {
        Err(GpuError::SwapchainCreation(format!(
            "Surface does not support {usage:?} images"
        )))
    }
}

/// How swapchain images are shared between queue families.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSharing {
    pub mode: vk::SharingMode,
    /// Families listed for concurrent sharing; empty when exclusive.
    pub queue_families: Vec<u32>,
}

impl ImageSharing {
    /// Concurrent across both families when they differ, exclusive otherwise.
    pub fn for_families(graphics: u32, present: u32) -> Self {
        if graphics == present {
            Self {
                mode: vk::SharingMode::EXCLUSIVE,
                queue_families: Vec::new(),
            }
        } else {
            Self {
                mode: vk::SharingMode::CONCURRENT,
                queue_families: vec![graphics, present],
            }
        }
    }

    /// Whether ownership is shared across queue families.
    pub fn is_concurrent(&self) -> bool {
        self.mode == vk::SharingMode::CONCURRENT
    }
}

/// Presentable image chain with one view per image.
///
/// Images belong to the chain; views are owned here. On drop the views are
/// destroyed before the chain. Holds the device and surface alive.
pub struct Swapchain {
    device: Arc<Device>,
    _surface: Arc<Surface>,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,
    format: vk::SurfaceFormatKHR,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    sharing: ImageSharing,
}

impl Swapchain {
    /// Create a swapchain sized to the window's framebuffer.
    pub fn new(
        device: &Arc<Device>,
        surface: &Arc<Surface>,
        framebuffer: vk::Extent2D,
    ) -> Result<Self> {
        let support = surface.support(device.physical().handle)?;

        let format = select_surface_format(&support.formats)
            .ok_or_else(|| GpuError::SwapchainCreation("No surface formats".into()))?;
        let present_mode = select_present_mode(&support.present_modes);
        let extent = calculate_extent(&support.capabilities, framebuffer);
        let image_count = select_image_count(&support.capabilities);
        let usage = swapchain_usage(&support.capabilities)?;
        let sharing = ImageSharing::for_families(device.graphics_family(), device.present_family());

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle())
            .min_image_count(image_count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(usage)
            .image_sharing_mode(sharing.mode)
            .queue_family_indices(&sharing.queue_families)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .clipped(true)
            .old_swapchain(vk::SwapchainKHR::null());

        let loader = device.swapchain_loader();

        // SAFETY: the surface and device share an instance; create_info outlives the call.
        let swapchain = unsafe { loader.create_swapchain(&create_info, None) }
            .map_err(|e| GpuError::SwapchainCreation(e.to_string()))?;

        // From here on `this` owns the chain, so early returns release it.
        let mut this = Self {
            device: Arc::clone(device),
            _surface: Arc::clone(surface),
            swapchain,
            images: Vec::new(),
            image_views: Vec::new(),
            format,
            extent,
            present_mode,
            sharing,
        };

        // SAFETY: swapchain was created from this loader.
        let images = unsafe { loader.get_swapchain_images(swapchain)? };
        if images.is_empty() {
            return Err(GpuError::SwapchainCreation("Swapchain has no images".into()));
        }

        for &image in &images {
            let view = create_image_view(device.handle(), image, format.format)?;
            this.image_views.push(view);
        }
        this.images = images;

        tracing::info!(
            "Swapchain created: {}x{} ({} images, {:?}, {:?}, {:?} sharing)",
            extent.width,
            extent.height,
            this.images.len(),
            format.format,
            present_mode,
            this.sharing.mode,
        );

        Ok(this)
    }

    /// Get the raw swapchain handle.
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.swapchain
    }

    /// Get the negotiated surface format.
    pub fn format(&self) -> vk::SurfaceFormatKHR {
        self.format
    }

    /// Get the negotiated extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Get the negotiated present mode.
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Get the image sharing mode, fixed for the chain's lifetime.
    pub fn sharing(&self) -> &ImageSharing {
        &self.sharing
    }

    /// Number of images in the chain.
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    /// Get a chain image by index.
    pub fn image(&self, index: u32) -> Option<vk::Image> {
        self.images.get(index as usize).copied()
    }

    /// Get the view of a chain image by index.
    pub fn image_view(&self, index: u32) -> Option<vk::ImageView> {
        self.image_views.get(index as usize).copied()
    }

    /// Wait for the next image, signaling `completion` when it is ready.
    ///
    /// A wait longer than `timeout` is a timeout error. Out-of-date and other
    /// failures are returned as-is; the chain is never recreated.
    pub fn acquire_image(&self, completion: &Semaphore, timeout: Duration) -> Result<u32> {
        // SAFETY: the semaphore belongs to the same device and is unsignaled.
        let result = unsafe {
            self.device.swapchain_loader().acquire_next_image(
                self.swapchain,
                timeout_ns(timeout),
                completion.handle(),
                vk::Fence::null(),
            )
        };

        let (index, suboptimal) = check_wait(result, "swapchain image")?;
        if suboptimal {
            tracing::debug!("Acquired suboptimal swapchain image {index}");
        }
        Ok(index)
    }

    /// Queue image `index` for presentation once `completion` is signaled.
    pub fn present(&self, index: u32, queue: vk::Queue, completion: &Semaphore) -> Result<()> {
        let swapchains = [self.swapchain];
        let image_indices = [index];
        let wait_semaphores = [completion.handle()];

        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);

        // SAFETY: queue belongs to this device and index came from acquire_image.
        unsafe {
            self.device
                .swapchain_loader()
                .queue_present(queue, &present_info)?;
        }
        Ok(())
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        // SAFETY: owners wait for the device to go idle before dropping.
        unsafe {
            for &view in &self.image_views {
                self.device.handle().destroy_image_view(view, None);
            }
            self.device
                .swapchain_loader()
                .destroy_swapchain(self.swapchain, None);
        }
    }
}

/// 2D color view, identity swizzle, one mip level and layer.
fn create_image_view(
    device: &ash::Device,
    image: vk::Image,
    format: vk::Format,
) -> Result<vk::ImageView> {
    let view_info = vk::ImageViewCreateInfo::default()
        .image(image)
        .view_type(vk::ImageViewType::TYPE_2D)
        .format(format)
        .components(vk::ComponentMapping {
            r: vk::ComponentSwizzle::IDENTITY,
            g: vk::ComponentSwizzle::IDENTITY,
            b: vk::ComponentSwizzle::IDENTITY,
            a: vk::ComponentSwizzle::IDENTITY,
        })
        .subresource_range(
            vk::ImageSubresourceRange::default()
                .aspect_mask(vk::ImageAspectFlags::COLOR)
                .base_mip_level(0)
                .level_count(1)
                .base_array_layer(0)
                .layer_count(1),
        );

    // SAFETY: image belongs to a swapchain created on this device.
    Ok(unsafe { device.create_image_view(&view_info, None)? })
}
