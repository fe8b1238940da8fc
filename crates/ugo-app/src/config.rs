//! Application configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use glam::Vec4;

/// Vertex and fragment SPIR-V files for the triangle pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderPaths {
    pub vertex: PathBuf,
    pub fragment: PathBuf,
}

impl ShaderPaths {
    /// `tri.vert.spv` and `tri.frag.spv` inside `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            vertex: dir.join("tri.vert.spv"),
            fragment: dir.join("tri.frag.spv"),
        }
    }
}

impl Default for ShaderPaths {
    /// The shaders compiled into the `ugo-shaders` build output.
    fn default() -> Self {
        Self {
            vertex: ugo_shaders::triangle_vertex(),
            fragment: ugo_shaders::triangle_fragment(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Window title, also used as the Vulkan application name.
    pub title: String,
    /// Initial window width.
    pub width: u32,
    /// Initial window height.
    pub height: u32,
    /// Enable Vulkan validation layers (default: debug builds only).
    pub validation: bool,
    /// Upper bound on the per-frame fence wait.
    pub fence_timeout: Duration,
    /// Upper bound on swapchain image acquisition.
    pub acquire_timeout: Duration,
    /// Color the swapchain image is cleared to each frame (RGBA).
    pub clear_color: Vec4,
    /// Triangle shaders; `None` renders the clear only.
    pub shaders: Option<ShaderPaths>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            title: "ugo-vk".to_string(),
            width: 1080,
            height: 720,
            validation: cfg!(debug_assertions),
            fence_timeout: Duration::from_secs(1),
            acquire_timeout: Duration::from_secs(1),
            clear_color: Vec4::new(0.0, 0.0, 0.0, 1.0),
            shaders: Some(ShaderPaths::default()),
        }
    }
}

impl AppConfig {
    /// Create a new config with the given title.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    /// Set the window dimensions.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Enable or disable validation layers.
    pub fn with_validation(mut self, validation: bool) -> Self {
        self.validation = validation;
        self
    }

    /// Set the fence and acquire timeouts.
    pub fn with_timeouts(mut self, fence: Duration, acquire: Duration) -> Self {
        self.fence_timeout = fence;
        self.acquire_timeout = acquire;
        self
    }

    /// Set the clear color.
    pub fn with_clear_color(mut self, color: Vec4) -> Self {
        self.clear_color = color;
        self
    }

    /// Set the triangle shaders, or `None` to skip the triangle.
    pub fn with_shaders(mut self, shaders: Option<ShaderPaths>) -> Self {
        self.shaders = shaders;
        self
    }

    /// Clear color as a Vulkan clear value.
    pub fn clear_value(&self) -> ash::vk::ClearValue {
        ash::vk::ClearValue {
            color: ash::vk::ClearColorValue {
                float32: self.clear_color.to_array(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.title, "ugo-vk");
        assert_eq!((config.width, config.height), (1080, 720));
        assert_eq!(config.validation, cfg!(debug_assertions));
        assert_eq!(config.fence_timeout, Duration::from_secs(1));
        assert_eq!(config.acquire_timeout, Duration::from_secs(1));
        assert_eq!(config.shaders, Some(ShaderPaths::in_dir(ugo_shaders::spirv_dir())));
    }

    #[test]
    fn default_shaders_exist() {
        let shaders = ShaderPaths::default();
        for path in [&shaders.vertex, &shaders.fragment] {
            let code = ugo_gpu::load_spirv(path).unwrap();
            assert_eq!(code[0], 0x0723_0203, "{} is not SPIR-V", path.display());
        }
    }

    #[test]
    fn shader_dir_override() {
        let shaders = ShaderPaths::in_dir("build/spv");
        assert_eq!(shaders.vertex, PathBuf::from("build/spv/tri.vert.spv"));
        assert_eq!(shaders.fragment, PathBuf::from("build/spv/tri.frag.spv"));
    }

    #[test]
    fn builder_methods() {
        let config = AppConfig::new("tri")
            .with_size(640, 480)
            .with_validation(false)
            .with_timeouts(Duration::from_millis(250), Duration::from_millis(500))
            .with_shaders(None);

        assert_eq!(config.title, "tri");
        assert_eq!((config.width, config.height), (640, 480));
        assert!(!config.validation);
        assert_eq!(config.fence_timeout, Duration::from_millis(250));
        assert_eq!(config.acquire_timeout, Duration::from_millis(500));
        assert!(config.shaders.is_none());
    }

    #[test]
    fn clear_value_carries_rgba() {
        let config = AppConfig::default().with_clear_color(Vec4::new(0.1, 0.2, 0.3, 1.0));
        // SAFETY: the union was written through `color.float32`.
        let rgba = unsafe { config.clear_value().color.float32 };
        assert_eq!(rgba, [0.1, 0.2, 0.3, 1.0]);
    }
}
