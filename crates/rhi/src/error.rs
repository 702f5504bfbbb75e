//! Error types for the GPU layer.

use thiserror::Error;

/// Errors raised by the Vulkan layer.
///
/// Every variant is fatal to the caller. Recoverable swapchain states
/// (suboptimal, out of date) are reported as values by
/// [`crate::swapchain::Swapchain`] instead.
#[derive(Error, Debug)]
pub enum RhiError {
    /// A Vulkan call failed; `op` names the call
    #[error("{op} failed: {result}")]
    VulkanError {
        op: &'static str,
        result: ash::vk::Result,
    },

    /// Failed to load the Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    LoadingError(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    AllocatorError(#[from] gpu_allocator::AllocationError),

    /// No physical device satisfies the queue and extension requirements
    #[error("No suitable GPU found")]
    NoSuitableGpu,

    /// No memory type matches the requested bits and properties
    #[error("No memory type matches bits {type_bits:#b} with properties {properties:?}")]
    NoSuitableMemoryType {
        type_bits: u32,
        properties: ash::vk::MemoryPropertyFlags,
    },

    /// No depth format supports optimal-tiling depth attachments
    #[error("No supported depth format")]
    NoSupportedDepthFormat,

    /// Shader loading error
    #[error("Shader error: {0}")]
    ShaderError(String),

    /// Surface creation error
    #[error("Surface error: {0}")]
    SurfaceError(String),

    /// Swapchain creation or use error
    #[error("Swapchain error: {0}")]
    SwapchainError(String),

    /// Graphics pipeline or layout creation error
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Render pass or framebuffer creation error
    #[error("Render pass error: {0}")]
    RenderPassError(String),
}

/// Result type alias for GPU operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;

impl RhiError {
    #[inline]
    pub fn vulkan(op: &'static str, result: ash::vk::Result) -> Self {
        Self::VulkanError { op, result }
    }
}

/// Attaches the name of the failed Vulkan call to a raw `vk::Result`.
pub trait VkResultExt<T> {
    fn context(self, op: &'static str) -> RhiResult<T>;
}

impl<T> VkResultExt<T> for std::result::Result<T, ash::vk::Result> {
    #[inline]
    fn context(self, op: &'static str) -> RhiResult<T> {
        self.map_err(|result| RhiError::vulkan(op, result))
    }
}
