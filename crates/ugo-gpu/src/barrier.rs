//! Image layout transitions.
//!
//! Callers track each image's state themselves and always name both ends of a
//! transition; [`ImageBarrierState`] has no `Default`.

use ash::vk;

/// An image's (layout, stage, access) state at one point in the timeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageBarrierState {
    pub layout: vk::ImageLayout,
    pub stage: vk::PipelineStageFlags2,
    pub access: vk::AccessFlags2,
}

impl ImageBarrierState {
    /// Contents discarded; stage matches the acquire semaphore's wait stage.
    pub const ACQUIRED: Self = Self {
        layout: vk::ImageLayout::UNDEFINED,
        stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        access: vk::AccessFlags2::NONE,
    };

    /// Written as a color attachment.
    pub const COLOR_ATTACHMENT: Self = Self {
        layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        stage: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        access: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
    };

    /// Handed to the presentation engine.
    pub const PRESENT: Self = Self {
        layout: vk::ImageLayout::PRESENT_SRC_KHR,
        stage: vk::PipelineStageFlags2::NONE,
        access: vk::AccessFlags2::NONE,
    };

    /// Create a state from its parts.
    pub const fn new(
        layout: vk::ImageLayout,
        stage: vk::PipelineStageFlags2,
        access: vk::AccessFlags2,
    ) -> Self {
        Self {
            layout,
            stage,
            access,
        }
    }
}

/// Subresource range covering every mip level and array layer of `aspect`.
pub fn image_range(aspect: vk::ImageAspectFlags) -> vk::ImageSubresourceRange {
    vk::ImageSubresourceRange::default()
        .aspect_mask(aspect)
        .base_mip_level(0)
        .level_count(vk::REMAINING_MIP_LEVELS)
        .base_array_layer(0)
        .layer_count(vk::REMAINING_ARRAY_LAYERS)
}

/// Build the barrier describing `from -> to` on `image`.
pub fn image_barrier(
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    from: ImageBarrierState,
    to: ImageBarrierState,
) -> vk::ImageMemoryBarrier2<'static> {
    vk::ImageMemoryBarrier2::default()
        .src_stage_mask(from.stage)
        .src_access_mask(from.access)
        .old_layout(from.layout)
        .dst_stage_mask(to.stage)
        .dst_access_mask(to.access)
        .new_layout(to.layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(range)
}

/// Record a pipeline barrier moving `image` from `from` to `to`.
///
/// # Safety
/// `cmd` must be in the recording state and `image` must be valid for `device`.
pub unsafe fn transition_image(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    image: vk::Image,
    range: vk::ImageSubresourceRange,
    from: ImageBarrierState,
    to: ImageBarrierState,
) {
    let barriers = [image_barrier(image, range, from, to)];
    let dependency = vk::DependencyInfo::default().image_memory_barriers(&barriers);

    // SAFETY: caller guarantees cmd is recording and image is valid.
    unsafe { device.cmd_pipeline_barrier2(cmd, &dependency) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_covers_all_levels_and_layers() {
        let range = image_range(vk::ImageAspectFlags::COLOR);
        assert_eq!(range.aspect_mask, vk::ImageAspectFlags::COLOR);
        assert_eq!(range.base_mip_level, 0);
        assert_eq!(range.level_count, vk::REMAINING_MIP_LEVELS);
        assert_eq!(range.base_array_layer, 0);
        assert_eq!(range.layer_count, vk::REMAINING_ARRAY_LAYERS);
    }

    #[test]
    fn barrier_copies_both_endpoints() {
        let barrier = image_barrier(
            vk::Image::null(),
            image_range(vk::ImageAspectFlags::COLOR),
            ImageBarrierState::ACQUIRED,
            ImageBarrierState::COLOR_ATTACHMENT,
        );

        assert_eq!(barrier.old_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(barrier.src_stage_mask, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(barrier.src_access_mask, vk::AccessFlags2::NONE);
        assert_eq!(barrier.new_layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(barrier.dst_stage_mask, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(barrier.dst_access_mask, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);
    }

    #[test]
    fn identical_states_are_a_valid_no_op() {
        let state = ImageBarrierState::COLOR_ATTACHMENT;
        let barrier = image_barrier(
            vk::Image::null(),
            image_range(vk::ImageAspectFlags::COLOR),
            state,
            state,
        );

        assert_eq!(barrier.old_layout, barrier.new_layout);
        assert_eq!(barrier.src_stage_mask, barrier.dst_stage_mask);
        assert_eq!(barrier.src_access_mask, barrier.dst_access_mask);
        assert_eq!(barrier.src_queue_family_index, vk::QUEUE_FAMILY_IGNORED);
    }

    #[test]
    fn present_transition() {
        let barrier = image_barrier(
            vk::Image::null(),
            image_range(vk::ImageAspectFlags::COLOR),
            ImageBarrierState::COLOR_ATTACHMENT,
            ImageBarrierState::PRESENT,
        );
        assert_eq!(barrier.new_layout, vk::ImageLayout::PRESENT_SRC_KHR);
        assert_eq!(barrier.src_access_mask, vk::AccessFlags2::COLOR_ATTACHMENT_WRITE);
    }
}
