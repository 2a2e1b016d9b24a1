//! RHI-specific error types.
//!
//! The variants are grouped into three tiers that callers treat differently:
//! unrecoverable driver/device failures, capability mismatches detected
//! before any object is created, and recoverable conditions (an outdated
//! swapchain, a missing resource, an expired wait).

use thiserror::Error;

/// RHI-specific error type.
#[derive(Error, Debug)]
pub enum RhiError {
    /// Vulkan API error
    #[error("Vulkan error: {0}")]
    Vulkan(#[from] ash::vk::Result),

    /// Failed to load the Vulkan library
    #[error("Failed to load Vulkan: {0}")]
    Loading(#[from] ash::LoadingError),

    /// GPU allocator error
    #[error("Allocator error: {0}")]
    Allocator(#[from] gpu_allocator::AllocationError),

    /// No Vulkan-capable GPU present
    #[error("No Vulkan-capable GPU found")]
    NoDevice,

    /// No queue family advertising graphics capability
    #[error("Found no queue family with graphics capability")]
    NoGraphicsQueue,

    /// The selected queue family cannot present to the surface
    #[error("Queue family {0} cannot present to the surface")]
    PresentUnsupported(u32),

    /// Surface capability query or adequacy failure
    #[error("Surface error: {0}")]
    Surface(String),

    /// Swapchain creation or negotiation error
    #[error("Swapchain error: {0}")]
    Swapchain(String),

    /// Shader loading or validation error
    #[error("Shader error: {0}")]
    Shader(String),

    /// Pipeline creation error
    #[error("Pipeline error: {0}")]
    Pipeline(String),

    /// Invalid handle or argument
    #[error("Invalid handle: {0}")]
    InvalidHandle(String),

    /// A bounded wait expired before the GPU signaled
    #[error("Timed out waiting for {0}")]
    WaitTimeout(&'static str),
}

/// Result type alias for RHI operations.
pub type RhiResult<T> = std::result::Result<T, RhiError>;
