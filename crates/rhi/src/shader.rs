//! Shader module loading.
//!
//! SPIR-V binaries live in a `spirv/` directory sibling to the executable
//! and are read as raw blobs. A blob must be 4-byte aligned and start with
//! the SPIR-V magic number; a reversed magic means the file was produced
//! with the wrong endianness. Malformed files are typed errors that the
//! application treats as fatal at startup.

use std::ffi::CString;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};

/// SPIR-V magic number, first word of every valid module.
const SPIRV_MAGIC: u32 = 0x0723_0203;

/// The magic number as it appears when the file was written with swapped
/// endianness.
const SPIRV_MAGIC_REVERSED: u32 = 0x0302_2307;

/// Shader stage type.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader stage
    Vertex,
    /// Fragment shader stage
    Fragment,
}

impl ShaderStage {
    /// Converts the shader stage to Vulkan shader stage flags.
    pub fn to_vk_stage(self) -> vk::ShaderStageFlags {
        match self {
            ShaderStage::Vertex => vk::ShaderStageFlags::VERTEX,
            ShaderStage::Fragment => vk::ShaderStageFlags::FRAGMENT,
        }
    }

    /// Returns a human-readable name for the shader stage.
    pub fn name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        }
    }
}

impl std::fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Vulkan shader module wrapper.
///
/// Immutable after creation. The module can be destroyed as soon as every
/// pipeline using it has been created; the pipeline generators rely on
/// this by letting their shaders drop at the end of construction.
pub struct Shader {
    /// Reference to the logical device.
    device: Arc<Device>,
    /// Vulkan shader module handle.
    module: vk::ShaderModule,
    /// Shader stage type.
    stage: ShaderStage,
    /// Entry point function name.
    entry_point: CString,
}

impl Shader {
    /// Loads a shader by name from the `spirv/` directory next to the
    /// executable.
    ///
    /// `name` is the file stem; `.spv` is appended. The entry point is
    /// always `main`.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::Shader`] when the executable path cannot be
    /// determined, the file cannot be read, or the blob fails validation.
    pub fn load(device: Arc<Device>, name: &str, stage: ShaderStage) -> RhiResult<Self> {
        let path = spirv_dir()?.join(format!("{name}.spv"));
        Self::from_spirv_file(device, &path, stage)
    }

    /// Creates a shader module from a SPIR-V file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the blob fails
    /// validation.
    pub fn from_spirv_file(device: Arc<Device>, path: &Path, stage: ShaderStage) -> RhiResult<Self> {
        debug!("Loading {} shader from {:?}", stage, path);

        let bytes = std::fs::read(path).map_err(|e| {
            RhiError::Shader(format!("Failed to read shader file {:?}: {}", path, e))
        })?;

        Self::from_spirv_bytes(device, &bytes, stage)
    }

    /// Creates a shader module from SPIR-V bytes.
    ///
    /// # Errors
    ///
    /// Returns [`RhiError::Shader`] when the blob is not 4-byte aligned,
    /// is empty, or does not start with the SPIR-V magic number.
    pub fn from_spirv_bytes(device: Arc<Device>, bytes: &[u8], stage: ShaderStage) -> RhiResult<Self> {
        let code = decode_spirv(bytes)?;

        let create_info = vk::ShaderModuleCreateInfo::default().code(&code);

        let module = unsafe { device.handle().create_shader_module(&create_info, None)? };

        info!("Created {} shader module ({} words)", stage, code.len());

        Ok(Self {
            device,
            module,
            stage,
            entry_point: c"main".to_owned(),
        })
    }

    /// Returns the Vulkan shader module handle.
    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.module
    }

    /// Returns the shader stage.
    #[inline]
    pub fn stage(&self) -> ShaderStage {
        self.stage
    }

    /// Creates a pipeline shader stage create info structure.
    ///
    /// The returned structure borrows from this shader and must not
    /// outlive it.
    pub fn stage_create_info(&self) -> vk::PipelineShaderStageCreateInfo<'_> {
        vk::PipelineShaderStageCreateInfo::default()
            .stage(self.stage.to_vk_stage())
            .module(self.module)
            .name(&self.entry_point)
    }
}

impl Drop for Shader {
    fn drop(&mut self) {
        unsafe {
            self.device
                .handle()
                .destroy_shader_module(self.module, None);
        }
        debug!("Destroyed {} shader module", self.stage);
    }
}

/// Resolves the shader directory: `spirv/` next to the executable.
fn spirv_dir() -> RhiResult<PathBuf> {
    let exe = std::env::current_exe()
        .map_err(|e| RhiError::Shader(format!("Failed to locate executable: {}", e)))?;
    let dir = exe
        .parent()
        .ok_or_else(|| RhiError::Shader("Executable has no parent directory".to_string()))?;
    Ok(dir.join("spirv"))
}

/// Validates and decodes a SPIR-V blob into code words.
///
/// Checks 4-byte alignment, a non-empty body, and the magic number. A
/// reversed magic is reported separately since it means the file exists
/// but was written with the wrong endianness.
fn decode_spirv(bytes: &[u8]) -> RhiResult<Vec<u32>> {
    if bytes.is_empty() {
        return Err(RhiError::Shader("SPIR-V blob is empty".to_string()));
    }

    if bytes.len() % 4 != 0 {
        return Err(RhiError::Shader(format!(
            "SPIR-V code must be 4-byte aligned, got {} bytes",
            bytes.len()
        )));
    }

    let code: Vec<u32> = bytes
        .chunks_exact(4)
        .map(|chunk| u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect();

    match code[0] {
        SPIRV_MAGIC => Ok(code),
        SPIRV_MAGIC_REVERSED => Err(RhiError::Shader(
            "SPIR-V blob has reversed endianness".to_string(),
        )),
        other => Err(RhiError::Shader(format!(
            "Bad SPIR-V magic number: {:#010x}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words_to_bytes(words: &[u32]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_le_bytes()).collect()
    }

    #[test]
    fn test_decode_spirv_accepts_valid_blob() {
        let bytes = words_to_bytes(&[SPIRV_MAGIC, 0x0001_0000, 0, 1, 0]);
        let code = decode_spirv(&bytes).unwrap();
        assert_eq!(code.len(), 5);
        assert_eq!(code[0], SPIRV_MAGIC);
    }

    #[test]
    fn test_decode_spirv_rejects_empty() {
        assert!(matches!(decode_spirv(&[]), Err(RhiError::Shader(_))));
    }

    #[test]
    fn test_decode_spirv_rejects_misaligned() {
        let mut bytes = words_to_bytes(&[SPIRV_MAGIC]);
        bytes.push(0);
        assert!(matches!(decode_spirv(&bytes), Err(RhiError::Shader(_))));
    }

    #[test]
    fn test_decode_spirv_rejects_bad_magic() {
        let bytes = words_to_bytes(&[0xdead_beef]);
        assert!(matches!(decode_spirv(&bytes), Err(RhiError::Shader(_))));
    }

    #[test]
    fn test_decode_spirv_reports_reversed_endianness() {
        let bytes = words_to_bytes(&[SPIRV_MAGIC_REVERSED]);
        let err = decode_spirv(&bytes).unwrap_err();
        assert!(err.to_string().contains("endianness"));
    }

    #[test]
    fn test_shader_stage_to_vk_stage() {
        assert_eq!(
            ShaderStage::Vertex.to_vk_stage(),
            vk::ShaderStageFlags::VERTEX
        );
        assert_eq!(
            ShaderStage::Fragment.to_vk_stage(),
            vk::ShaderStageFlags::FRAGMENT
        );
    }

    #[test]
    fn test_shader_stage_display() {
        assert_eq!(format!("{}", ShaderStage::Vertex), "vertex");
        assert_eq!(format!("{}", ShaderStage::Fragment), "fragment");
    }
}
