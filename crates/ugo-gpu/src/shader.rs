//! SPIR-V loading and shader modules.

use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;
use std::sync::Arc;

use ash::vk;

use crate::device::Device;
use crate::error::{GpuError, Result};

/// Read SPIR-V words from any seekable reader.
///
/// Rejects blobs whose size is not a multiple of four; byte-swapped modules are
/// converted to native order.
pub fn read_spirv<R: Read + Seek>(reader: &mut R) -> std::io::Result<Vec<u32>> {
    ash::util::read_spv(reader)
}

/// Load a SPIR-V binary from disk.
///
/// Any failure, including a missing file, names the file in the error.
pub fn load_spirv(path: impl AsRef<Path>) -> Result<Vec<u32>> {
    let path = path.as_ref();
    let wrap = |source| GpuError::ShaderLoad {
        path: path.to_path_buf(),
        source,
    };

    let mut file = File::open(path).map_err(wrap)?;
    read_spirv(&mut file).map_err(wrap)
}

/// Owned shader module, destroyed on drop.
pub struct ShaderModule {
    device: Arc<Device>,
    module: vk::ShaderModule,
}

impl ShaderModule {
    /// Create a module from SPIR-V words.
    pub fn new(device: &Arc<Device>, code: &[u32]) -> Result<Self> {
        let info = vk::ShaderModuleCreateInfo::default().code(code);
        // SAFETY: the device is valid; code is 4-byte aligned SPIR-V.
        let module = unsafe { device.handle().create_shader_module(&info, None) }
            .map_err(|e| GpuError::PipelineCreation(format!("Shader module: {e}")))?;
        Ok(Self {
            device: Arc::clone(device),
            module,
        })
    }

    /// Load a module from a SPIR-V file.
    pub fn from_file(device: &Arc<Device>, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let code = load_spirv(path)?;
        tracing::debug!("Loaded shader {} ({} words)", path.display(), code.len());
        Self::new(device, &code)
    }

    /// Get the raw module handle.
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }
}

impl Drop for ShaderModule {
    fn drop(&mut self) {
        // SAFETY: modules are only referenced during pipeline creation.
        unsafe {
            self.device.handle().destroy_shader_module(self.module, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn reads_little_endian_words() {
        let words = [SPIRV_MAGIC, 0x0001_0000, 0, 1, 0];
        let bytes: Vec<u8> = words.iter().flat_map(|w| w.to_le_bytes()).collect();

        let code = read_spirv(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(code, words);
    }

    #[test]
    fn rejects_misaligned_blob() {
        let mut bytes: Vec<u8> = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.push(0);
        assert!(read_spirv(&mut Cursor::new(bytes)).is_err());
    }

    #[test]
    fn missing_file_names_path() {
        let err = load_spirv("does/not/exist/tri.vert.spv").unwrap_err();
        assert!(matches!(err, GpuError::ShaderLoad { .. }));
        assert!(err.to_string().contains("does/not/exist/tri.vert.spv"));
    }
}
