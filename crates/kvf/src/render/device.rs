//! Render device: owns the window, swapchain and per-frame resources, and drives the
//! acquire, record, submit, present cycle.
//!
//! ```text
//! next_frame() -> cmd      wait fence, poll input, reset scratch, begin cmd
//!   ... record work into cmd, build the ImGui frame ...
//! render(frame, filter)    end ImGui, acquire, blit frame, draw ImGui, submit, present
//! ```

use std::cell::{RefCell, RefMut};
use std::sync::Arc;

use ash::vk;
use bitflags::bitflags;
use imgui::Ui;

use super::api::RenderApi;
use super::barriers::blit_barriers;
use super::buffered::{try_buffered, Buffered, FrameIndex};
use super::descriptor_allocator::{DescriptorAllocator, DescriptorPoolInfo};
use super::gpu::{Gpu, GpuSelector};
use super::imgui::DearImGui;
use super::pipeline::{self, Pipeline, PipelineFormat, PipelineState, ShaderObjects};
use super::render_pass::RenderTarget;
use super::scratch::BufferAllocator;
use super::swapchain::Swapchain;
use super::sync::{Fence, Semaphore, FENCE_TIMEOUT};
use super::util::record_barriers;
use crate::buffer_write::BufferWrite;
use crate::error::{KvfError, KvfResult};
use crate::vma::{Buffer, BufferCreateInfo, Image, ImageCreateInfo, Texture, TextureCreateInfo};
use crate::window::Window;

bitflags! {
    /// Optional device behaviour
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct RenderDeviceFlags: u32 {
        /// UNORM backbuffer instead of sRGB
        const LINEAR_BACKBUFFER = 1 << 0;
        /// Enable `VK_EXT_shader_object`
        const SHADER_OBJECT_FEATURE = 1 << 1;
        /// Load `VK_LAYER_KHRONOS_shader_object` for drivers without native support
        const SHADER_OBJECT_LAYER = 1 << 2;
    }
}

/// Parameters for [`RenderDevice::new`]
pub struct RenderDeviceCreateInfo {
    /// Optional behaviour
    pub flags: RenderDeviceFlags,
    /// Descriptor pool sizes; empty uses [`RenderDeviceCreateInfo::default_pool_sizes`]
    pub custom_pool_sizes: Vec<vk::DescriptorPoolSize>,
    /// Descriptor sets per pool
    pub sets_per_pool: u32,
    /// GPU picker; `None` prefers the first discrete GPU
    pub gpu_selector: Option<Box<dyn GpuSelector>>,
    /// Present mode to start with, when supported
    pub present_mode: Option<vk::PresentModeKHR>,
    /// Draw the ImGui overlay
    pub render_imgui: bool,
}

impl RenderDeviceCreateInfo {
    /// Default descriptor sets per pool
    pub const SETS_PER_POOL: u32 = 64;
    /// Default descriptors of each type per pool
    pub const DESCRIPTORS_PER_TYPE: u32 = 8;

    /// Uniform buffers, storage buffers and combined image samplers, `count` of each
    pub fn default_pool_sizes(count: u32) -> Vec<vk::DescriptorPoolSize> {
        [
            vk::DescriptorType::UNIFORM_BUFFER,
            vk::DescriptorType::STORAGE_BUFFER,
            vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
        ]
        .into_iter()
        .map(|ty| vk::DescriptorPoolSize {
            ty,
            descriptor_count: count,
        })
        .collect()
    }

    fn pool_info(&self) -> DescriptorPoolInfo {
        let pool_sizes = if self.custom_pool_sizes.is_empty() {
            Self::default_pool_sizes(Self::DESCRIPTORS_PER_TYPE)
        } else {
            self.custom_pool_sizes.clone()
        };
        DescriptorPoolInfo {
            pool_sizes,
            max_sets: self.sets_per_pool.max(1),
        }
    }
}

impl Default for RenderDeviceCreateInfo {
    fn default() -> Self {
        Self {
            flags: RenderDeviceFlags::empty(),
            custom_pool_sizes: Vec::new(),
            sets_per_pool: Self::SETS_PER_POOL,
            gpu_selector: None,
            present_mode: None,
            render_imgui: true,
        }
    }
}

// Synchronization2 treats TOP_OF_PIPE in a wait scope as NONE.
const ACQUIRE_WAIT_STAGE: vk::PipelineStageFlags2 = vk::PipelineStageFlags2::ALL_COMMANDS;

/// What [`RenderDevice::render`] does with the swapchain before acquiring
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FramePlan {
    /// Minimized window: end the command buffer and skip the frame
    Skip,
    /// Size changed or an image was abandoned: rebuild first
    Recreate,
    /// Acquire and render as is
    Render,
}

fn plan_frame(framebuffer: vk::Extent2D, swapchain: vk::Extent2D, stale: bool) -> FramePlan {
    if framebuffer.width == 0 || framebuffer.height == 0 {
        FramePlan::Skip
    } else if stale || framebuffer != swapchain {
        FramePlan::Recreate
    } else {
        FramePlan::Render
    }
}

fn check_frame_target(frame: Option<&RenderTarget>) -> KvfResult<()> {
    match frame {
        Some(target) if target.layout != vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL => Err(KvfError::invalid(format!(
            "frame image must be SHADER_READ_ONLY_OPTIMAL, is {:?}",
            target.layout
        ))),
        _ => Ok(()),
    }
}

/// Anisotropy to request: the requested level clamped to the GPU limit, `None` when disabled
pub fn clamp_anisotropy(requested: f32, max_supported: f32) -> Option<f32> {
    (requested > 0.0 && max_supported > 0.0).then(|| requested.min(max_supported))
}

/// Command pool, command buffer and sync objects of one frame in flight
struct FrameSync {
    pool: vk::CommandPool,
    cmd: vk::CommandBuffer,
    draw: Semaphore,
    drawn: Fence,
    api: Arc<RenderApi>,
}

impl FrameSync {
    fn new(api: &Arc<RenderApi>) -> KvfResult<Self> {
        let device = api.device();
        let draw = Semaphore::new(device.clone())?;
        let drawn = Fence::new(device.clone(), true)?;

        let pool_info = vk::CommandPoolCreateInfo::builder().queue_family_index(api.queue_family());
        let pool = unsafe { device.create_command_pool(&pool_info, None).map_err(KvfError::Api)? };
        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(1);
        match unsafe { device.allocate_command_buffers(&alloc_info) } {
            Ok(buffers) => Ok(Self {
                pool,
                cmd: buffers[0],
                draw,
                drawn,
                api: Arc::clone(api),
            }),
            Err(err) => {
                unsafe { device.destroy_command_pool(pool, None) };
                Err(KvfError::Api(err))
            }
        }
    }
}

impl Drop for FrameSync {
    fn drop(&mut self) {
        unsafe { self.api.device().destroy_command_pool(self.pool, None) };
    }
}

/// Window, swapchain, frame loop and resource factory
pub struct RenderDevice {
    imgui: RefCell<DearImGui>,
    buffer_allocators: RefCell<Buffered<BufferAllocator>>,
    descriptor_allocators: RefCell<Buffered<DescriptorAllocator>>,
    frames: Buffered<FrameSync>,
    swapchain: Swapchain,
    recording: Option<vk::CommandBuffer>,
    render_imgui: bool,
    api: Arc<RenderApi>,
    window: Window,
}

impl RenderDevice {
    /// Create the Vulkan context for `window` and everything needed to render frames
    pub fn new(window: Window, info: RenderDeviceCreateInfo) -> KvfResult<Self> {
        let api = Arc::new(RenderApi::new(&window, info.flags, info.gpu_selector.as_deref())?);

        let mut swapchain = Swapchain::new(Arc::clone(&api))?;
        let present_mode = info
            .present_mode
            .filter(|mode| swapchain.supported_present_modes().contains(mode));
        swapchain.recreate(window.framebuffer_extent(), present_mode)?;

        let frames = try_buffered(|_| FrameSync::new(&api))?;
        let pool_info = info.pool_info();
        let descriptor_allocators = try_buffered(|_| DescriptorAllocator::new(Arc::clone(&api), pool_info.clone()))?;
        let buffer_allocators = try_buffered(|_| Ok::<_, KvfError>(BufferAllocator::new(Arc::clone(&api))))?;

        let mut imgui = DearImGui::new(&api)?;
        imgui.new_frame(&window);
        log::info!("Render device ready: {}", api.gpu().name());

        Ok(Self {
            imgui: RefCell::new(imgui),
            buffer_allocators: RefCell::new(buffer_allocators),
            descriptor_allocators: RefCell::new(descriptor_allocators),
            frames,
            swapchain,
            recording: None,
            render_imgui: info.render_imgui,
            api,
            window,
        })
    }

    /// Begin the next frame and return its command buffer, in the recording state.
    ///
    /// Blocks until the GPU is done with this frame's previous submission.
    pub fn next_frame(&mut self) -> KvfResult<vk::CommandBuffer> {
        let index = self.frame_index().get();
        let frame = &self.frames[index];
        frame.drawn.wait(FENCE_TIMEOUT)?;

        self.window.poll_events();
        {
            let imgui = self.imgui.get_mut();
            imgui.handle_events(self.window.events());
            imgui.new_frame(&self.window);
        }

        self.descriptor_allocators.get_mut()[index].reset()?;
        self.buffer_allocators.get_mut()[index].reset();

        let device = self.api.device();
        let begin_info = vk::CommandBufferBeginInfo::builder().flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
        unsafe {
            device
                .reset_command_pool(frame.pool, vk::CommandPoolResetFlags::empty())
                .map_err(KvfError::Api)?;
            device.begin_command_buffer(frame.cmd, &begin_info).map_err(KvfError::Api)?;
        }
        self.recording = Some(frame.cmd);
        Ok(frame.cmd)
    }

    /// Finish the frame: blit `frame` (if any) to the backbuffer with `filter`, draw ImGui
    /// on top, submit and present.
    ///
    /// `frame` must be in `SHADER_READ_ONLY_OPTIMAL`, as left by [`RenderPass::end_render`](super::RenderPass::end_render).
    pub fn render(&mut self, frame: Option<RenderTarget>, filter: vk::Filter) -> KvfResult<()> {
        self.imgui.get_mut().end_frame();
        let cmd = self
            .recording
            .take()
            .ok_or_else(|| KvfError::invalid("render called without next_frame"))?;
        if let Err(err) = check_frame_target(frame.as_ref()) {
            self.end_recording(cmd)?;
            return Err(err);
        }

        let framebuffer = self.window.framebuffer_extent();
        match plan_frame(framebuffer, self.swapchain.extent(), self.swapchain.is_stale()) {
            FramePlan::Skip => return self.end_recording(cmd),
            FramePlan::Recreate => {
                self.swapchain.recreate(framebuffer, None)?;
            }
            FramePlan::Render => {}
        }

        let api = Arc::clone(&self.api);
        let queue = api.lock_queue();
        let index = self.frame_index().get();
        if !self.swapchain.acquire_next_image(self.frames[index].draw.handle())? {
            drop(queue);
            log::debug!("Swapchain out of date on acquire");
            self.swapchain.recreate(framebuffer, None)?;
            return self.end_recording(cmd);
        }
        self.frames[index].drawn.reset()?;

        if let Err(err) = self.submit_frame(cmd, *queue, index, frame, filter) {
            self.abandon_frame(*queue, index);
            return Err(err);
        }

        let presented = self.swapchain.present(*queue)?;
        drop(queue);
        if !presented {
            log::debug!("Swapchain out of date on present");
            self.swapchain.recreate(self.window.framebuffer_extent(), None)?;
        }

        self.api.advance_frame();
        Ok(())
    }

    fn submit_frame(
        &mut self,
        cmd: vk::CommandBuffer,
        queue: vk::Queue,
        index: usize,
        frame: Option<RenderTarget>,
        filter: vk::Filter,
    ) -> KvfResult<()> {
        let api = Arc::clone(&self.api);
        let device = api.device();
        let backbuffer = self
            .swapchain
            .backbuffer()
            .ok_or_else(|| KvfError::invalid("no acquired swapchain image"))?;

        let mut load_op = vk::AttachmentLoadOp::CLEAR;
        if let Some(target) = frame {
            self.swapchain
                .transition_backbuffer(cmd, vk::ImageLayout::TRANSFER_DST_OPTIMAL)?;
            let template = api.image_barrier(target.aspect);
            let [to_src, to_sampled] = blit_barriers(vk::ImageMemoryBarrier2 {
                image: target.image,
                ..template
            });
            record_barriers(device, cmd, &[to_src]);
            blit(device, cmd, &target, backbuffer.image, backbuffer.extent, filter);
            record_barriers(device, cmd, &[to_sampled]);
            load_op = vk::AttachmentLoadOp::LOAD;
        }

        if self.render_imgui || load_op == vk::AttachmentLoadOp::CLEAR {
            self.swapchain
                .transition_backbuffer(cmd, vk::ImageLayout::ATTACHMENT_OPTIMAL)?;
            let color_attachments = [vk::RenderingAttachmentInfo::builder()
                .image_view(backbuffer.view)
                .image_layout(vk::ImageLayout::ATTACHMENT_OPTIMAL)
                .load_op(load_op)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: [0.0, 0.0, 0.0, 1.0],
                    },
                })
                .build()];
            let rendering_info = vk::RenderingInfo::builder()
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D::default(),
                    extent: backbuffer.extent,
                })
                .layer_count(1)
                .color_attachments(&color_attachments);
            unsafe { device.cmd_begin_rendering(cmd, &rendering_info) };
            let drawn = if self.render_imgui {
                self.imgui.get_mut().draw(cmd)
            } else {
                Ok(())
            };
            unsafe { device.cmd_end_rendering(cmd) };
            drawn?;
        }

        self.swapchain
            .transition_backbuffer(cmd, vk::ImageLayout::PRESENT_SRC_KHR)?;
        unsafe { device.end_command_buffer(cmd).map_err(KvfError::Api)? };

        let sync = &self.frames[index];
        let wait = [vk::SemaphoreSubmitInfo::builder()
            .semaphore(sync.draw.handle())
            .stage_mask(ACQUIRE_WAIT_STAGE)
            .build()];
        let signal = [vk::SemaphoreSubmitInfo::builder()
            .semaphore(backbuffer.present_semaphore)
            .stage_mask(vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT)
            .build()];
        let cmds = [vk::CommandBufferSubmitInfo::builder().command_buffer(cmd).build()];
        let submit = [vk::SubmitInfo2::builder()
            .wait_semaphore_infos(&wait)
            .command_buffer_infos(&cmds)
            .signal_semaphore_infos(&signal)
            .build()];
        unsafe {
            device
                .queue_submit2(queue, &submit, sync.drawn.handle())
                .map_err(KvfError::Api)
        }
    }

    // Nothing was submitted for an acquired image: consume the acquire signal and signal the
    // fence with an empty batch, then drop the image so the swapchain is rebuilt next frame.
    fn abandon_frame(&mut self, queue: vk::Queue, index: usize) {
        let sync = &self.frames[index];
        let wait = [vk::SemaphoreSubmitInfo::builder()
            .semaphore(sync.draw.handle())
            .stage_mask(ACQUIRE_WAIT_STAGE)
            .build()];
        let submit = [vk::SubmitInfo2::builder().wait_semaphore_infos(&wait).build()];
        let restored = unsafe { self.api.device().queue_submit2(queue, &submit, sync.drawn.handle()) };
        if let Err(err) = restored {
            log::error!("Failed to restore frame sync after a failed submit: {err:?}");
        }
        self.swapchain.abandon_image();
    }

    fn end_recording(&self, cmd: vk::CommandBuffer) -> KvfResult<()> {
        unsafe { self.api.device().end_command_buffer(cmd).map_err(KvfError::Api) }
    }

    /// Shared Vulkan context
    pub fn api(&self) -> &Arc<RenderApi> {
        &self.api
    }

    /// Barrier template on the graphics queue family
    pub fn image_barrier(&self, aspect: vk::ImageAspectFlags) -> vk::ImageMemoryBarrier2 {
        self.api.image_barrier(aspect)
    }

    /// Sampler parameters with `wrap` on every axis and `filter` for min and mag.
    ///
    /// `aniso` is clamped to the GPU limit; zero disables anisotropic filtering.
    pub fn sampler_info(&self, wrap: vk::SamplerAddressMode, filter: vk::Filter, aniso: f32) -> vk::SamplerCreateInfo {
        let max_anisotropy = self.api.gpu().properties.limits.max_sampler_anisotropy;
        let anisotropy = clamp_anisotropy(aniso, max_anisotropy);
        vk::SamplerCreateInfo {
            mag_filter: filter,
            min_filter: filter,
            mipmap_mode: vk::SamplerMipmapMode::NEAREST,
            address_mode_u: wrap,
            address_mode_v: wrap,
            address_mode_w: wrap,
            anisotropy_enable: vk::Bool32::from(anisotropy.is_some()),
            max_anisotropy: anisotropy.unwrap_or(0.0),
            max_lod: vk::LOD_CLAMP_NONE,
            border_color: vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
            ..Default::default()
        }
    }

    /// Create a buffer of `size` bytes
    pub fn create_buffer(&self, info: BufferCreateInfo, size: vk::DeviceSize) -> KvfResult<Buffer> {
        Buffer::new(Arc::clone(&self.api), info, size)
    }

    /// Create an image; a zero `extent` defers allocation to the first resize
    pub fn create_image(&self, info: ImageCreateInfo, extent: vk::Extent2D) -> KvfResult<Image> {
        Image::new(Arc::clone(&self.api), info, extent)
    }

    /// Create an empty texture
    pub fn create_texture(&self, info: &TextureCreateInfo) -> KvfResult<Texture> {
        Texture::new(&self.api, info)
    }

    /// Create a graphics pipeline for `format`
    pub fn create_pipeline(
        &self,
        layout: vk::PipelineLayout,
        state: &PipelineState,
        format: &PipelineFormat,
    ) -> KvfResult<Pipeline> {
        pipeline::create_pipeline(&self.api, layout, state, format)
    }

    /// Create linked vertex and fragment shader objects
    pub fn create_shader_objects(
        &self,
        vertex_spirv: &[u32],
        fragment_spirv: &[u32],
        set_layouts: &[vk::DescriptorSetLayout],
    ) -> KvfResult<ShaderObjects> {
        pipeline::create_shader_objects(&self.api, vertex_spirv, fragment_spirv, set_layouts)
    }

    /// Descriptor sets valid until this frame comes around again
    pub fn allocate_sets(&self, layouts: &[vk::DescriptorSetLayout]) -> KvfResult<Vec<vk::DescriptorSet>> {
        let index = self.frame_index().get();
        self.descriptor_allocators.borrow_mut()[index].allocate(layouts)
    }

    /// Host buffer valid until this frame comes around again.
    ///
    /// A `size` of zero keeps whatever size the reused buffer had.
    pub fn allocate_scratch_buffer(&self, usage: vk::BufferUsageFlags, size: vk::DeviceSize) -> KvfResult<RefMut<'_, Buffer>> {
        let index = self.frame_index().get();
        let mut error = None;
        let allocated = RefMut::filter_map(self.buffer_allocators.borrow_mut(), |allocators| {
            allocators[index]
                .allocate(usage, size)
                .map_err(|err| error = Some(err))
                .ok()
        });
        allocated.map_err(|_| error.unwrap_or_else(|| KvfError::invalid("scratch buffer allocation failed")))
    }

    /// Copy `write` into a scratch buffer and describe it for a descriptor write
    pub fn scratch_descriptor_buffer(
        &self,
        usage: vk::BufferUsageFlags,
        write: BufferWrite<'_>,
    ) -> KvfResult<vk::DescriptorBufferInfo> {
        let mut buffer = self.allocate_scratch_buffer(usage, 0)?;
        buffer.overwrite(write)?;
        Ok(buffer.descriptor_info())
    }

    /// Submit to the graphics queue
    pub fn queue_submit(&self, submits: &[vk::SubmitInfo2], fence: vk::Fence) -> KvfResult<()> {
        self.api.queue_submit(submits, fence)
    }

    /// Whether ImGui is drawn over the backbuffer
    pub fn render_imgui(&self) -> bool {
        self.render_imgui
    }

    /// Toggle the ImGui overlay
    pub fn set_render_imgui(&mut self, value: bool) {
        self.render_imgui = value;
    }

    /// The ImGui frame being built, between [`next_frame`](Self::next_frame) and [`render`](Self::render)
    pub fn imgui_frame(&self) -> Option<RefMut<'_, Ui>> {
        RefMut::filter_map(self.imgui.borrow_mut(), DearImGui::ui).ok()
    }

    /// Whether the window was asked to close
    pub fn is_window_closing(&self) -> bool {
        self.window.is_closing()
    }

    /// Request (or cancel) closing the window
    pub fn set_window_closing(&mut self, value: bool) {
        self.window.set_closing(value);
    }

    /// The window being rendered to
    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Mutable access to the window
    pub fn window_mut(&mut self) -> &mut Window {
        &mut self.window
    }

    /// Switch present mode. Returns `false` if the surface does not support `mode`.
    pub fn set_present_mode(&mut self, mode: vk::PresentModeKHR) -> KvfResult<bool> {
        if !self.swapchain.supported_present_modes().contains(&mode) {
            return Ok(false);
        }
        self.swapchain.recreate(self.window.framebuffer_extent(), Some(mode))?;
        Ok(true)
    }

    /// Present modes supported by the surface
    pub fn supported_present_modes(&self) -> &[vk::PresentModeKHR] {
        self.swapchain.supported_present_modes()
    }

    /// Current present mode
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.swapchain.present_mode()
    }

    /// Framebuffer size in pixels
    pub fn framebuffer_extent(&self) -> vk::Extent2D {
        self.window.framebuffer_extent()
    }

    /// Frame currently being recorded
    pub fn frame_index(&self) -> FrameIndex {
        self.api.frame_index()
    }

    /// Vulkan version reported by the loader
    pub fn loader_api_version(&self) -> u32 {
        self.api.loader_api_version()
    }

    /// Selected GPU
    pub fn gpu(&self) -> &Gpu {
        self.api.gpu()
    }
}

impl Drop for RenderDevice {
    fn drop(&mut self) {
        if let Err(err) = self.api.wait_idle() {
            log::error!("Failed to wait for device idle: {err}");
        }
    }
}

fn blit(
    device: &ash::Device,
    cmd: vk::CommandBuffer,
    src: &RenderTarget,
    dst: vk::Image,
    dst_extent: vk::Extent2D,
    filter: vk::Filter,
) {
    let layers = |aspect_mask| vk::ImageSubresourceLayers {
        aspect_mask,
        mip_level: 0,
        base_array_layer: 0,
        layer_count: 1,
    };
    let corner = |extent: vk::Extent2D| vk::Offset3D {
        x: extent.width as i32,
        y: extent.height as i32,
        z: 1,
    };
    let regions = [vk::ImageBlit2::builder()
        .src_subresource(layers(src.aspect))
        .src_offsets([vk::Offset3D::default(), corner(src.extent)])
        .dst_subresource(layers(vk::ImageAspectFlags::COLOR))
        .dst_offsets([vk::Offset3D::default(), corner(dst_extent)])
        .build()];
    let blit_info = vk::BlitImageInfo2::builder()
        .src_image(src.image)
        .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
        .dst_image(dst)
        .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
        .regions(&regions)
        .filter(filter);
    unsafe { device.cmd_blit_image2(cmd, &blit_info) };
}

/// Waits for the device to go idle when dropped.
///
/// Declare before GPU resources owned outside the [`RenderDevice`] so they are not
/// destroyed while still in use.
pub struct DeviceBlock(pub Arc<RenderApi>);

impl DeviceBlock {
    /// Guard `device`'s context
    pub fn new(device: &RenderDevice) -> Self {
        Self(Arc::clone(device.api()))
    }
}

impl Drop for DeviceBlock {
    fn drop(&mut self) {
        if let Err(err) = self.0.wait_idle() {
            log::error!("Failed to wait for device idle: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_sizes() {
        let sizes = RenderDeviceCreateInfo::default_pool_sizes(8);
        let types: Vec<_> = sizes.iter().map(|size| size.ty).collect();
        assert_eq!(
            types,
            [
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::DescriptorType::STORAGE_BUFFER,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            ]
        );
        assert!(sizes.iter().all(|size| size.descriptor_count == 8));
    }

    #[test]
    fn test_pool_info_prefers_custom_sizes() {
        let info = RenderDeviceCreateInfo::default();
        let pool_info = info.pool_info();
        assert_eq!(pool_info.max_sets, 64);
        assert_eq!(pool_info.pool_sizes.len(), 3);

        let custom = RenderDeviceCreateInfo {
            custom_pool_sizes: vec![vk::DescriptorPoolSize {
                ty: vk::DescriptorType::STORAGE_IMAGE,
                descriptor_count: 2,
            }],
            sets_per_pool: 0,
            ..Default::default()
        };
        let pool_info = custom.pool_info();
        assert_eq!(pool_info.max_sets, 1);
        assert_eq!(pool_info.pool_sizes[0].ty, vk::DescriptorType::STORAGE_IMAGE);
    }

    #[test]
    fn test_clamp_anisotropy() {
        assert_eq!(clamp_anisotropy(0.0, 16.0), None);
        assert_eq!(clamp_anisotropy(4.0, 16.0), Some(4.0));
        assert_eq!(clamp_anisotropy(32.0, 16.0), Some(16.0));
        assert_eq!(clamp_anisotropy(8.0, 0.0), None);
    }

    const EXTENT: vk::Extent2D = vk::Extent2D { width: 800, height: 600 };

    #[test]
    fn test_plan_frame() {
        let minimized = vk::Extent2D { width: 0, height: 600 };
        assert_eq!(plan_frame(minimized, EXTENT, false), FramePlan::Skip);
        assert_eq!(plan_frame(minimized, EXTENT, true), FramePlan::Skip);
        assert_eq!(plan_frame(EXTENT, EXTENT, false), FramePlan::Render);
        let resized = vk::Extent2D { width: 1024, height: 600 };
        assert_eq!(plan_frame(resized, EXTENT, false), FramePlan::Recreate);
        assert_eq!(plan_frame(EXTENT, EXTENT, true), FramePlan::Recreate);
    }

    #[test]
    fn test_frame_target_must_be_sampled_layout() {
        let target = RenderTarget {
            image: vk::Image::null(),
            view: vk::ImageView::null(),
            extent: EXTENT,
            format: vk::Format::R8G8B8A8_SRGB,
            aspect: vk::ImageAspectFlags::COLOR,
            layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        };
        assert!(check_frame_target(None).is_ok());
        assert!(check_frame_target(Some(&target)).is_ok());

        let attachment = RenderTarget {
            layout: vk::ImageLayout::ATTACHMENT_OPTIMAL,
            ..target
        };
        assert!(matches!(
            check_frame_target(Some(&attachment)),
            Err(KvfError::InvalidOperation { .. })
        ));
    }

    #[test]
    fn test_acquire_wait_is_not_an_empty_scope() {
        assert_ne!(ACQUIRE_WAIT_STAGE, vk::PipelineStageFlags2::NONE);
        assert_ne!(ACQUIRE_WAIT_STAGE, vk::PipelineStageFlags2::TOP_OF_PIPE);
    }

    #[test]
    fn test_default_flags_are_empty() {
        let info = RenderDeviceCreateInfo::default();
        assert!(info.flags.is_empty());
        assert!(info.render_imgui);
        assert!(info.gpu_selector.is_none());
    }
}
