//! Per-frame resources and statistics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use ash::vk;
use ugo_gpu::{CommandBuffer, CommandPool, Device, Fence, Semaphore};

/// Everything one frame in flight needs.
///
/// The fence starts signaled so the first wait returns immediately.
pub struct FrameResources {
    pub command_buffer: CommandBuffer,
    /// Signaled by the presentation engine once the acquired image is usable.
    pub image_available: Semaphore,
    /// Signaled when the frame's submission retires.
    pub in_flight: Fence,
}

impl FrameResources {
    /// Allocate a command buffer from `pool` plus the frame's sync objects.
    pub fn new(device: &Arc<Device>, pool: &CommandPool) -> ugo_gpu::Result<Self> {
        Ok(Self {
            command_buffer: pool.allocate_command_buffer()?,
            image_available: Semaphore::new(device, vk::SemaphoreCreateFlags::empty())?,
            in_flight: Fence::new(device, vk::FenceCreateFlags::SIGNALED)?,
        })
    }
}

/// One value per swapchain image, looked up by the acquired image index.
///
/// Presentation keeps waiting on a semaphore after the frame fence retires,
/// so render-complete semaphores are keyed by image rather than by frame.
/// An image is not handed out again until its previous present has finished.
#[derive(Debug)]
pub struct PerImage<T> {
    items: Vec<T>,
}

impl<T> PerImage<T> {
    /// Build `count` values with `make`, stopping at the first error.
    pub fn new<E>(count: usize, make: impl FnMut() -> Result<T, E>) -> Result<Self, E> {
        let items = std::iter::repeat_with(make)
            .take(count)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { items })
    }

    /// Value for swapchain image `index`.
    pub fn get(&self, index: u32) -> Option<&T> {
        self.items.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Semaphores signaled when rendering to an image finishes; presentation of
/// that image waits on them.
pub fn render_complete_semaphores(
    device: &Arc<Device>,
    image_count: usize,
) -> ugo_gpu::Result<PerImage<Semaphore>> {
    PerImage::new(image_count, || Semaphore::new(device, vk::SemaphoreCreateFlags::empty()))
}

/// Frame counter and timing.
#[derive(Debug, Clone)]
pub struct FrameStats {
    started: Instant,
    frames: u64,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameStats {
    /// Start counting from now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Start counting from `started`.
    pub fn starting_at(started: Instant) -> Self {
        Self { started, frames: 0 }
    }

    /// Record one presented frame.
    pub fn record_frame(&mut self) {
        self.frames += 1;
    }

    /// Frames presented so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Average frames per second over `elapsed`; zero for an empty interval.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_fps(&self, elapsed: Duration) -> f64 {
        let secs = elapsed.as_secs_f64();
        if secs > 0.0 {
            self.frames as f64 / secs
        } else {
            0.0
        }
    }

    /// Time since counting started.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Log the frame count and average frame rate.
    pub fn log_summary(&self) {
        let elapsed = self.elapsed();
        tracing::info!("Frame Statistics:");
        tracing::info!("  Total frames: {}", self.frames);
        tracing::info!("  Elapsed: {:.2}s", elapsed.as_secs_f64());
        tracing::info!("  Avg FPS: {:.1}", self.average_fps(elapsed));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn per_image_lookup_by_index() {
        let mut next = 0;
        let values = PerImage::new(3, || -> Result<u32, ()> {
            next += 10;
            Ok(next)
        })
        .unwrap();

        assert_eq!(values.len(), 3);
        assert_eq!(values.get(0), Some(&10));
        assert_eq!(values.get(2), Some(&30));
        assert_eq!(values.get(3), None);
    }

    #[test]
    fn per_image_stops_at_first_error() {
        let mut made = 0;
        let result = PerImage::new(4, || {
            made += 1;
            if made == 2 {
                Err("out of memory")
            } else {
                Ok(made)
            }
        });

        assert_eq!(result.unwrap_err(), "out of memory");
        assert_eq!(made, 2);
    }

    #[test]
    fn counts_frames() {
        let mut stats = FrameStats::new();
        assert_eq!(stats.frames(), 0);
        for _ in 0..5 {
            stats.record_frame();
        }
        assert_eq!(stats.frames(), 5);
    }

    #[test]
    fn average_fps_over_interval() {
        let mut stats = FrameStats::new();
        for _ in 0..120 {
            stats.record_frame();
        }
        assert_relative_eq!(stats.average_fps(Duration::from_secs(2)), 60.0);
        assert_relative_eq!(stats.average_fps(Duration::from_millis(500)), 240.0);
    }

    #[test]
    fn zero_interval_has_zero_fps() {
        let mut stats = FrameStats::new();
        stats.record_frame();
        assert_relative_eq!(stats.average_fps(Duration::ZERO), 0.0);
    }
}
