//! Error types shared by every kvf subsystem

use ash::vk;
use thiserror::Error;

/// kvf error types
#[derive(Error, Debug)]
pub enum KvfError {
    /// General Vulkan API error with result code
    #[error("Vulkan API error: {0:?}")]
    Api(vk::Result),

    /// The Vulkan loader could not be found or loaded
    #[error("Failed to load Vulkan: {0}")]
    Loading(String),

    /// Instance, device or allocator creation failed
    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    /// GLFW initialization or window creation failed
    #[error("Window error: {0}")]
    Window(String),

    /// No physical device satisfies the minimum requirements
    #[error("No viable GPU found")]
    NoViableGpu,

    /// The surface cannot provide more images than frames in flight
    #[error("Insufficient Swapchain images: {count} (need more than {buffering})")]
    InsufficientSwapchainImages {
        /// Image count the surface allows
        count: u32,
        /// Frames in flight
        buffering: usize,
    },

    /// A fence was not signaled within the timeout
    #[error("Timed out waiting for fence")]
    FenceTimeout,

    /// Invalid operation attempted
    #[error("Invalid operation: {reason}")]
    InvalidOperation {
        /// Description of why the operation is invalid
        reason: String,
    },

    /// File access failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Compressed image could not be decoded
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    /// Font data could not be parsed
    #[error("Font error: {0}")]
    Font(String),

    /// Dear ImGui renderer failure
    #[error("ImGui error: {0}")]
    Imgui(String),
}

impl KvfError {
    /// Shorthand for [`KvfError::InvalidOperation`]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidOperation { reason: reason.into() }
    }
}

impl From<vk::Result> for KvfError {
    fn from(result: vk::Result) -> Self {
        Self::Api(result)
    }
}

/// Result type for kvf operations
pub type KvfResult<T> = Result<T, KvfError>;
