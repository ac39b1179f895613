//! # kvf
//!
//! A convenience layer over Vulkan 1.3 built on `ash`, `vk-mem` and GLFW.
//!
//! The crate bundles everything a small application needs to get pixels on screen:
//!
//! - [`Window`](window::Window): GLFW window with Vulkan surface support
//! - [`RenderDevice`](render::RenderDevice): instance/device setup, swapchain, frame loop
//!   with buffered command buffers, scratch descriptor and buffer allocators, and a
//!   Dear ImGui overlay
//! - [`RenderPass`](render::RenderPass): dynamic-rendering attachments with automatic barriers
//! - [`vma`]: buffers, images and textures allocated through VMA
//! - [`ttf`]: glyph rasterization, kerning and text layout
//!
//! A typical frame:
//!
//! ```no_run
//! # fn run() -> kvf::KvfResult<()> {
//! let window = kvf::window::create_window([800, 600], "app", true)?;
//! let mut device = kvf::render::RenderDevice::new(window, kvf::render::RenderDeviceCreateInfo::default())?;
//! while !device.is_window_closing() {
//!     let cmd = device.next_frame()?;
//!     // record work into `cmd` ...
//!     let _ = cmd;
//!     device.render(None, ash::vk::Filter::LINEAR)?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod bitmap;
pub mod buffer_write;
pub mod color;
pub mod config;
pub mod error;
pub mod foundation;
pub mod rect;
pub mod render;
pub mod ttf;
pub mod vma;
pub mod window;

pub use error::{KvfError, KvfResult};

/// Re-exports of the most commonly used types
pub mod prelude {
    pub use crate::bitmap::{Bitmap, ColorBitmap, ImageBitmap};
    pub use crate::buffer_write::BufferWrite;
    pub use crate::color::Color;
    pub use crate::config::{Config, RenderDeviceConfig};
    pub use crate::error::{KvfError, KvfResult};
    pub use crate::foundation::math::{aspect_resize, is_positive, ResizeAspect};
    pub use crate::foundation::time::DeltaTime;
    pub use crate::rect::{uv_rect, Rect, UvRect};
    pub use crate::render::{
        DeviceBlock, FrameIndex, PipelineFormat, PipelineState, RenderDevice,
        RenderDeviceCreateInfo, RenderDeviceFlags, RenderPass, RenderTarget,
    };
    pub use crate::vma::{Buffer, BufferCreateInfo, BufferType, Image, ImageCreateInfo, Texture};
    pub use crate::window::Window;
}
