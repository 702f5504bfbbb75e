//! SPIR-V shader modules.
//!
//! Shaders are opaque compiled artifacts loaded by path at pipeline build
//! time. A missing or malformed file is a fatal [`RhiError::ShaderError`]
//! naming the path.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use ash::vk;
use tracing::debug;

use crate::device::Device;
use crate::error::{RhiError, RhiResult, VkResultExt};

/// Entry point every engine shader exports.
const ENTRY_POINT: &std::ffi::CStr = c"main";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }
}

/// A loaded shader module.
pub struct Shader {
    device: Arc<Device>,
    module: vk::ShaderModule,
    stage: ShaderStage,
}

impl Shader {
    /// Load a SPIR-V binary from `path`.
    pub fn load(device: Arc<Device>, path: &Path, stage: ShaderStage) -> RhiResult<Self> {
        let bytes = std::fs::read(path).map_err(|e| {
            RhiError::ShaderError(format!("failed to read {}: {}", path.display(), e))
        })?;
        let code = decode_spirv(&bytes)
            .map_err(|reason| RhiError::ShaderError(format!("{}: {}", path.display(), reason)))?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);
        let module = unsafe { device.handle().create_shader_module(&create_info, None) }
            .context("vkCreateShaderModule")?;
        debug!("Loaded {:?} shader {}", stage, path.display());

        Ok(Self {
            device,
            module,
            stage,
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Stage description for pipeline creation. Borrows `self`.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(ENTRY_POINT)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
    }
}

/// Split a SPIR-V binary into words.
///
/// `read_spv` checks alignment and the magic number, and swaps big-endian
/// input.
fn decode_spirv(bytes: &[u8]) -> Result<Vec<u32>, String> {
    if bytes.is_empty() {
        return Err(String::from("empty shader binary"));
    }
    ash::util::read_spv(&mut Cursor::new(bytes)).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPIRV_MAGIC: u32 = 0x0723_0203;

    #[test]
    fn test_stage_flags() {
        assert_eq!(ShaderStage::Vertex.to_vk_stage(), vk::ShaderStageFlags::VERTEX);
        assert_eq!(ShaderStage::Fragment.to_vk_stage(), vk::ShaderStageFlags::FRAGMENT);
    }

    #[test]
    fn test_decode_valid_header() {
        let mut bytes = SPIRV_MAGIC.to_le_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0000u32.to_le_bytes());

        let words = decode_spirv(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000]);
    }

    #[test]
    fn test_decode_rejects_misaligned() {
        assert!(decode_spirv(&[0x03, 0x02, 0x23]).is_err());
    }

    #[test]
    fn test_decode_rejects_wrong_magic() {
        let err = decode_spirv(&0xdead_beefu32.to_le_bytes()).unwrap_err();
        assert!(err.contains("magic number"), "{err}");
    }

    #[test]
    fn test_decode_swaps_big_endian() {
        let mut bytes = SPIRV_MAGIC.to_be_bytes().to_vec();
        bytes.extend_from_slice(&0x0001_0000u32.to_be_bytes());

        let words = decode_spirv(&bytes).unwrap();
        assert_eq!(words, vec![SPIRV_MAGIC, 0x0001_0000]);
    }

    #[test]
    fn test_decode_rejects_empty() {
        assert_eq!(decode_spirv(&[]).unwrap_err(), "empty shader binary");
    }
}
