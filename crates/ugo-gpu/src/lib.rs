//! Vulkan plumbing for ugo-vk.
//!
//! This crate provides:
//! - Instance creation with optional validation and debug messaging
//! - Physical device selection against a presentation surface
//! - Logical device and queue management
//! - Swapchain negotiation, acquire and present
//! - Command buffers, fences, semaphores and image barriers
//! - Dynamic-rendering graphics pipelines

pub mod barrier;
pub mod capabilities;
pub mod command;
pub mod context;
pub mod device;
pub mod error;
pub mod instance;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use barrier::{image_barrier, image_range, transition_image, ImageBarrierState};
pub use capabilities::{
    pick_first_usable, select_physical_device, GpuVendor, PhysicalDeviceInfo, QueueFamilyInfo,
    Rejection,
};
pub use command::{CommandBuffer, CommandPool};
pub use context::{GpuContext, GpuContextBuilder};
pub use device::{Device, QueueFamilyIndices, QueueRole};
pub use error::{GpuError, Result};
pub use instance::Instance;
pub use pipeline::{GraphicsPipeline, GraphicsPipelineBuilder};
pub use shader::{load_spirv, ShaderModule};
pub use surface::{Surface, SurfaceSupport};
pub use swapchain::{
    calculate_extent, select_image_count, select_present_mode, select_surface_format,
    swapchain_usage, ImageSharing, Swapchain,
};
pub use sync::{Fence, Semaphore};
