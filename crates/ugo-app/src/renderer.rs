//! Frame loop driver.
//!
//! One frame in flight: each [`Renderer::draw_frame`] waits for the previous
//! submission to retire, records, submits and presents before returning.

use ash::vk;
use tracing::{info, trace_span};
use ugo_gpu::barrier::{image_range, transition_image, ImageBarrierState};
use ugo_gpu::{
    CommandPool, GpuContext, GpuContextBuilder, GpuError, GraphicsPipeline,
    GraphicsPipelineBuilder, Semaphore, Swapchain,
};
use winit::window::Window;

use crate::config::AppConfig;
use crate::frame::{render_complete_semaphores, FrameResources, FrameStats, PerImage};

/// Owns every GPU object the frame loop touches.
///
/// Fields drop in declaration order: frame resources, render-complete
/// semaphores, pipeline, command pool, swapchain, then the context (device,
/// surface, instance).
pub struct Renderer {
    frame: FrameResources,
    render_complete: PerImage<Semaphore>,
    pipeline: Option<GraphicsPipeline>,
    command_pool: CommandPool,
    swapchain: Swapchain,
    gpu: GpuContext,
    config: AppConfig,
    stats: FrameStats,
}

impl Renderer {
    /// Bootstrap Vulkan for `window` and create the frame resources.
    ///
    /// # Safety
    /// The window must outlive the returned renderer.
    pub unsafe fn new(window: &Window, config: AppConfig) -> anyhow::Result<Self> {
        // SAFETY: caller guarantees the window outlives the renderer.
        let gpu = unsafe {
            GpuContextBuilder::new()
                .app_name(&config.title)
                .validation(config.validation)
                .build(window)?
        };

        let size = window.inner_size();
        let framebuffer = vk::Extent2D {
            width: size.width,
            height: size.height,
        };
        let swapchain = Swapchain::new(gpu.device(), gpu.surface(), framebuffer)?;

        let command_pool = gpu.create_graphics_pool()?;

        let pipeline = match &config.shaders {
            Some(paths) => Some(
                GraphicsPipelineBuilder::new(gpu.device())
                    .vertex_shader_from_file(&paths.vertex)?
                    .fragment_shader_from_file(&paths.fragment)?
                    .color_format(swapchain.format().format)
                    .build()?,
            ),
            None => {
                info!("No triangle shaders configured, clearing only");
                None
            }
        };

        let frame = FrameResources::new(gpu.device(), &command_pool)?;
        let render_complete = render_complete_semaphores(gpu.device(), swapchain.image_count())?;

        Ok(Self {
            frame,
            render_complete,
            pipeline,
            command_pool,
            swapchain,
            gpu,
            config,
            stats: FrameStats::new(),
        })
    }

    /// Frame counter and timing.
    pub fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Render and present one frame.
    pub fn draw_frame(&mut self) -> ugo_gpu::Result<()> {
        {
            let _span = trace_span!("frame.wait").entered();
            self.frame.in_flight.wait(self.config.fence_timeout)?;
            self.frame.in_flight.reset()?;
        }

        let image_index = {
            let _span = trace_span!("frame.record").entered();
            self.record()?
        };

        let render_complete = self.render_complete.get(image_index).ok_or_else(|| {
            GpuError::InvalidState(format!("No render-complete semaphore for image {image_index}"))
        })?;

        {
            let _span = trace_span!("frame.submit").entered();
            self.submit(render_complete)?;
        }

        {
            let _span = trace_span!("frame.present").entered();
            self.swapchain
                .present(image_index, self.gpu.present_queue(), render_complete)?;
        }

        self.stats.record_frame();
        Ok(())
    }

    /// Acquire an image and record the clear and triangle into the frame's
    /// command buffer. Returns the acquired image index.
    fn record(&self) -> ugo_gpu::Result<u32> {
        let cmd = &self.frame.command_buffer;
        cmd.reset()?;
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT)?;

        let image_index = self
            .swapchain
            .acquire_image(&self.frame.image_available, self.config.acquire_timeout)?;

        let (Some(image), Some(view)) = (
            self.swapchain.image(image_index),
            self.swapchain.image_view(image_index),
        ) else {
            return Err(GpuError::InvalidState(format!(
                "Acquired image index {image_index} out of range"
            )));
        };

        let device = self.gpu.device().handle();
        let raw = cmd.handle();
        let range = image_range(vk::ImageAspectFlags::COLOR);
        let extent = self.swapchain.extent();

        // SAFETY: the command buffer is recording and the image belongs to the swapchain.
        unsafe {
            transition_image(
                device,
                raw,
                image,
                range,
                ImageBarrierState::ACQUIRED,
                ImageBarrierState::COLOR_ATTACHMENT,
            );

            let color_attachments = [vk::RenderingAttachmentInfo::default()
                .image_view(view)
                .image_layout(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(self.config.clear_value())];

            let rendering_info = vk::RenderingInfo::default()
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D::default(),
                    extent,
                })
                .layer_count(1)
                .color_attachments(&color_attachments);

            device.cmd_begin_rendering(raw, &rendering_info);

            if let Some(pipeline) = &self.pipeline {
                device.cmd_bind_pipeline(raw, vk::PipelineBindPoint::GRAPHICS, pipeline.handle());
                device.cmd_set_viewport(raw, 0, &[full_viewport(extent)]);
                device.cmd_set_scissor(
                    raw,
                    0,
                    &[vk::Rect2D {
                        offset: vk::Offset2D::default(),
                        extent,
                    }],
                );
                device.cmd_draw(raw, 3, 1, 0, 0);
            }

            device.cmd_end_rendering(raw);

            transition_image(
                device,
                raw,
                image,
                range,
                ImageBarrierState::COLOR_ATTACHMENT,
                ImageBarrierState::PRESENT,
            );
        }

        cmd.end()?;
        Ok(image_index)
    }

    /// Submit the recorded buffer to the graphics queue, signaling
    /// `render_complete` when it finishes.
    fn submit(&self, render_complete: &Semaphore) -> ugo_gpu::Result<()> {
        let wait = [self
            .frame
            .image_available
            .submit_info(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)];
        let signal = [render_complete.submit_info(vk::PipelineStageFlags2::ALL_COMMANDS)];
        let command_buffers = [self.frame.command_buffer.submit_info()];

        let submit = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait)
            .command_buffer_infos(&command_buffers)
            .signal_semaphore_infos(&signal);

        // SAFETY: the fence was reset after its last wait and the buffer is fully recorded.
        unsafe {
            self.gpu.device().handle().queue_submit2(
                self.gpu.graphics_queue(),
                &[submit],
                self.frame.in_flight.handle(),
            )?;
        }
        Ok(())
    }

    /// Wait for outstanding GPU work and log frame statistics.
    ///
    /// Resources are released when the renderer is dropped.
    pub fn shutdown(&self) -> ugo_gpu::Result<()> {
        self.stats.log_summary();
        self.gpu.wait_idle()
    }
}

/// Viewport covering `extent` with the standard depth range.
#[allow(clippy::cast_precision_loss)]
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: 0.0,
        width: extent.width as f32,
        height: extent.height as f32,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}
