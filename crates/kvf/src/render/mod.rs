//! Vulkan rendering: context, swapchain, frame loop and GPU resource helpers

pub mod api;
pub mod barriers;
pub mod buffered;
pub mod command_buffer;
pub mod descriptor_allocator;
pub mod device;
pub mod gpu;
pub mod imgui;
pub mod pipeline;
pub mod present;
pub mod render_pass;
pub mod scratch;
pub mod swapchain;
pub mod sync;
pub mod util;

pub use api::{RenderApi, Sampler};
pub use buffered::{Buffered, FrameIndex, RESOURCE_BUFFERING};
pub use command_buffer::CommandBuffer;
pub use device::{DeviceBlock, RenderDevice, RenderDeviceCreateInfo, RenderDeviceFlags};
pub use gpu::{DefaultGpuSelector, Gpu, GpuSelector};
pub use pipeline::{Pipeline, PipelineFlags, PipelineFormat, PipelineState, ShaderModule, ShaderObjects};
pub use render_pass::{RenderPass, RenderTarget};
