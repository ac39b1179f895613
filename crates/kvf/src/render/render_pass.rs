//! Offscreen render passes using dynamic rendering
//!
//! A [`RenderPass`] owns one set of attachments per frame in flight. [`RenderPass::begin_render`]
//! sizes and transitions them, [`RenderPass::end_render`] leaves them ready for sampling.

use std::sync::Arc;

use ash::vk;

use super::api::RenderApi;
use super::buffered::{try_buffered, Buffered};
use super::device::RenderDevice;
use super::pipeline::{create_pipeline, Pipeline, PipelineFormat, PipelineState};
use super::present::is_srgb;
use crate::color::Color;
use crate::error::{KvfError, KvfResult};
use crate::foundation::math::Vec2;
use crate::rect::{is_normalized, uv_rect, Rect, UvRect};
use crate::vma::{Image, ImageCreateInfo, ImageFlags};

/// An image that can be rendered into or blitted from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTarget {
    /// Image handle
    pub image: vk::Image,
    /// View covering the image
    pub view: vk::ImageView,
    /// Image size
    pub extent: vk::Extent2D,
    /// Texel format
    pub format: vk::Format,
    /// Aspect of `view`
    pub aspect: vk::ImageAspectFlags,
    /// Layout at the time the target was taken
    pub layout: vk::ImageLayout,
}

/// Attachments for one frame
#[derive(Default)]
pub struct Framebuffer {
    /// Colour attachment, multisampled if the pass is
    pub color: Option<Image>,
    /// Single sampled resolve target for a multisampled colour attachment
    pub resolve: Option<Image>,
    /// Depth attachment
    pub depth: Option<Image>,
}

// `uv` scaled to pixels, or the whole extent when `uv` is outside `[0, 1]`
fn pixel_rect(uv: &UvRect, extent: vk::Extent2D) -> Rect<f32> {
    let uv = if is_normalized(uv) { *uv } else { uv_rect() };
    let size = Vec2::new(extent.width as f32, extent.height as f32);
    Rect {
        lt: uv.lt.component_mul(&size),
        rb: uv.rb.component_mul(&size),
    }
}

/// Viewport covering `uv` of `extent`, flipped so +y points up.
///
/// A rect outside `[0, 1]` falls back to the whole extent.
pub fn to_viewport(uv: &UvRect, extent: vk::Extent2D) -> vk::Viewport {
    let rect = pixel_rect(uv, extent);
    let size = rect.size();
    vk::Viewport {
        x: rect.lt.x,
        y: rect.rb.y,
        width: size.x,
        height: -size.y,
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

/// Scissor covering `uv` of `extent`
pub fn to_scissor(uv: &UvRect, extent: vk::Extent2D) -> vk::Rect2D {
    let rect = pixel_rect(uv, extent);
    let size = rect.size();
    vk::Rect2D {
        offset: vk::Offset2D {
            x: rect.lt.x as i32,
            y: rect.lt.y as i32,
        },
        extent: vk::Extent2D {
            width: size.x as u32,
            height: size.y as u32,
        },
    }
}

fn color_to_attachment() -> vk::ImageMemoryBarrier2 {
    vk::ImageMemoryBarrier2 {
        src_stage_mask: vk::PipelineStageFlags2::FRAGMENT_SHADER,
        src_access_mask: vk::AccessFlags2::SHADER_SAMPLED_READ,
        dst_stage_mask: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        dst_access_mask: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::ATTACHMENT_OPTIMAL,
        ..Default::default()
    }
}

fn depth_to_attachment() -> vk::ImageMemoryBarrier2 {
    vk::ImageMemoryBarrier2 {
        src_stage_mask: vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS | vk::PipelineStageFlags2::FRAGMENT_SHADER,
        src_access_mask: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE | vk::AccessFlags2::SHADER_SAMPLED_READ,
        dst_stage_mask: vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS,
        dst_access_mask: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        old_layout: vk::ImageLayout::UNDEFINED,
        new_layout: vk::ImageLayout::ATTACHMENT_OPTIMAL,
        ..Default::default()
    }
}

fn color_to_sampled() -> vk::ImageMemoryBarrier2 {
    vk::ImageMemoryBarrier2 {
        src_stage_mask: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
        src_access_mask: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        dst_stage_mask: vk::PipelineStageFlags2::FRAGMENT_SHADER,
        dst_access_mask: vk::AccessFlags2::SHADER_SAMPLED_READ,
        old_layout: vk::ImageLayout::ATTACHMENT_OPTIMAL,
        new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ..Default::default()
    }
}

fn depth_to_sampled() -> vk::ImageMemoryBarrier2 {
    vk::ImageMemoryBarrier2 {
        src_stage_mask: vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
        src_access_mask: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        dst_stage_mask: vk::PipelineStageFlags2::FRAGMENT_SHADER,
        dst_access_mask: vk::AccessFlags2::SHADER_SAMPLED_READ,
        old_layout: vk::ImageLayout::ATTACHMENT_OPTIMAL,
        new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ..Default::default()
    }
}

/// Offscreen colour/depth pass with per-frame attachments
pub struct RenderPass {
    framebuffers: Buffered<Framebuffer>,
    samples: vk::SampleCountFlags,
    color_format: vk::Format,
    depth_format: vk::Format,
    /// Colour the colour attachment is cleared to
    pub clear_color: Color,
    /// Whether depth is kept after the pass, `DONT_CARE` by default
    pub depth_store_op: vk::AttachmentStoreOp,
    viewport: UvRect,
    extent: vk::Extent2D,
    cmd: Option<vk::CommandBuffer>,
    api: Arc<RenderApi>,
}

impl RenderPass {
    /// Create a pass without attachments rendering at `samples`
    pub fn new(device: &RenderDevice, samples: vk::SampleCountFlags) -> KvfResult<Self> {
        Ok(Self {
            framebuffers: try_buffered(|_| Ok::<_, KvfError>(Framebuffer::default()))?,
            samples,
            color_format: vk::Format::UNDEFINED,
            depth_format: vk::Format::UNDEFINED,
            clear_color: Color::default(),
            depth_store_op: vk::AttachmentStoreOp::DONT_CARE,
            viewport: uv_rect(),
            extent: vk::Extent2D::default(),
            cmd: None,
            api: Arc::clone(device.api()),
        })
    }

    fn image_info(&self, format: vk::Format, aspect: vk::ImageAspectFlags, usage: vk::ImageUsageFlags) -> ImageCreateInfo {
        ImageCreateInfo {
            format,
            aspect,
            usage,
            samples: self.samples,
            flags: ImageFlags::DEDICATED_ALLOC,
            ..Default::default()
        }
    }

    /// Add a colour attachment. `UNDEFINED` picks RGBA8 matching the backbuffer's encoding.
    pub fn with_color_target(mut self, format: vk::Format) -> KvfResult<Self> {
        let format = match format {
            vk::Format::UNDEFINED if is_srgb(self.api.swapchain_format()) => vk::Format::R8G8B8A8_SRGB,
            vk::Format::UNDEFINED => vk::Format::R8G8B8A8_UNORM,
            format => format,
        };
        let color_info = self.image_info(format, vk::ImageAspectFlags::COLOR, vk::ImageUsageFlags::COLOR_ATTACHMENT);
        let resolve_info = ImageCreateInfo {
            samples: vk::SampleCountFlags::TYPE_1,
            ..color_info
        };
        let multisampled = self.samples != vk::SampleCountFlags::TYPE_1;
        for framebuffer in &mut self.framebuffers {
            framebuffer.color = Some(Image::new(Arc::clone(&self.api), color_info, vk::Extent2D::default())?);
            if multisampled {
                framebuffer.resolve = Some(Image::new(Arc::clone(&self.api), resolve_info, vk::Extent2D::default())?);
            }
        }
        self.color_format = format;
        Ok(self)
    }

    /// Add a depth attachment in the device's depth format
    pub fn with_depth_target(mut self) -> KvfResult<Self> {
        let format = self.api.depth_format();
        let info = self.image_info(
            format,
            vk::ImageAspectFlags::DEPTH,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        );
        for framebuffer in &mut self.framebuffers {
            framebuffer.depth = Some(Image::new(Arc::clone(&self.api), info, vk::Extent2D::default())?);
        }
        self.depth_format = format;
        Ok(self)
    }

    /// Set the area later [`RenderPass::bind_pipeline`] calls draw into
    pub fn set_viewport(&mut self, uv: UvRect) {
        self.viewport = uv;
    }

    /// Resize this frame's attachments to `extent` and begin rendering into them
    pub fn begin_render(&mut self, cmd: vk::CommandBuffer, extent: vk::Extent2D) -> KvfResult<()> {
        if self.cmd.is_some() {
            return Err(KvfError::invalid("render pass already begun"));
        }
        let frame = self.api.frame_index().get();
        let framebuffer = &mut self.framebuffers[frame];
        for image in [&mut framebuffer.color, &mut framebuffer.resolve, &mut framebuffer.depth]
            .into_iter()
            .flatten()
        {
            image.resize(extent)?;
        }

        for image in [&mut framebuffer.color, &mut framebuffer.resolve].into_iter().flatten() {
            image.transition(cmd, color_to_attachment());
        }
        if let Some(depth) = &mut framebuffer.depth {
            depth.transition(cmd, depth_to_attachment());
        }

        let color_attachment = framebuffer.color.as_ref().map(|color| {
            let mut attachment = vk::RenderingAttachmentInfo::builder()
                .image_view(color.view())
                .image_layout(vk::ImageLayout::ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(vk::AttachmentStoreOp::STORE)
                .clear_value(vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: self.clear_color.to_vec4().into(),
                    },
                });
            if let Some(resolve) = &framebuffer.resolve {
                attachment = attachment
                    .resolve_mode(vk::ResolveModeFlags::AVERAGE)
                    .resolve_image_view(resolve.view())
                    .resolve_image_layout(vk::ImageLayout::ATTACHMENT_OPTIMAL);
            }
            attachment.build()
        });
        let depth_attachment = framebuffer.depth.as_ref().map(|depth| {
            vk::RenderingAttachmentInfo::builder()
                .image_view(depth.view())
                .image_layout(vk::ImageLayout::ATTACHMENT_OPTIMAL)
                .load_op(vk::AttachmentLoadOp::CLEAR)
                .store_op(self.depth_store_op)
                .clear_value(vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue { depth: 1.0, stencil: 0 },
                })
                .build()
        });

        let color_attachments: Vec<_> = color_attachment.into_iter().collect();
        let mut rendering_info = vk::RenderingInfo::builder()
            .render_area(vk::Rect2D {
                offset: vk::Offset2D::default(),
                extent,
            })
            .layer_count(1)
            .color_attachments(&color_attachments);
        if let Some(depth) = &depth_attachment {
            rendering_info = rendering_info.depth_attachment(depth);
        }
        unsafe { self.api.device().cmd_begin_rendering(cmd, &rendering_info) };

        self.extent = extent;
        self.cmd = Some(cmd);
        Ok(())
    }

    /// End rendering and transition the attachments for sampling
    pub fn end_render(&mut self) -> KvfResult<()> {
        let cmd = self
            .cmd
            .take()
            .ok_or_else(|| KvfError::invalid("end_render without begin_render"))?;
        unsafe { self.api.device().cmd_end_rendering(cmd) };

        let frame = self.api.frame_index().get();
        let framebuffer = &mut self.framebuffers[frame];
        for image in [&mut framebuffer.color, &mut framebuffer.resolve].into_iter().flatten() {
            image.transition(cmd, color_to_sampled());
        }
        if self.depth_store_op == vk::AttachmentStoreOp::STORE {
            if let Some(depth) = &mut framebuffer.depth {
                depth.transition(cmd, depth_to_sampled());
            }
        }
        Ok(())
    }

    /// Bind `pipeline` and set viewport and scissor for the current pass
    pub fn bind_pipeline(&self, pipeline: vk::Pipeline) -> KvfResult<()> {
        let cmd = self
            .cmd
            .ok_or_else(|| KvfError::invalid("bind_pipeline outside of a render pass"))?;
        let device = self.api.device();
        unsafe {
            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, pipeline);
            device.cmd_set_viewport(cmd, 0, &[to_viewport(&self.viewport, self.extent)]);
            device.cmd_set_scissor(cmd, 0, &[to_scissor(&self.viewport, self.extent)]);
        }
        Ok(())
    }

    /// Attachment formats of this pass
    pub fn pipeline_format(&self) -> PipelineFormat {
        PipelineFormat {
            samples: self.samples,
            color: self.color_format,
            depth: self.depth_format,
        }
    }

    /// Create a pipeline matching this pass's attachments
    pub fn create_pipeline(&self, layout: vk::PipelineLayout, state: &PipelineState) -> KvfResult<Pipeline> {
        create_pipeline(&self.api, layout, state, &self.pipeline_format())
    }

    /// The finished image of the current frame: resolve, else colour, else depth
    pub fn render_target(&self) -> Option<RenderTarget> {
        let framebuffer = &self.framebuffers[self.api.frame_index().get()];
        framebuffer
            .resolve
            .as_ref()
            .or(framebuffer.color.as_ref())
            .or(framebuffer.depth.as_ref())
            .map(Image::render_target)
    }

    /// Command buffer of the pass in progress
    pub fn command_buffer(&self) -> Option<vk::CommandBuffer> {
        self.cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EXTENT: vk::Extent2D = vk::Extent2D { width: 800, height: 600 };

    #[test]
    fn test_full_viewport_is_flipped() {
        let viewport = to_viewport(&uv_rect(), EXTENT);
        assert_relative_eq!(viewport.x, 0.0);
        assert_relative_eq!(viewport.y, 600.0);
        assert_relative_eq!(viewport.width, 800.0);
        assert_relative_eq!(viewport.height, -600.0);
        assert_relative_eq!(viewport.max_depth, 1.0);
    }

    #[test]
    fn test_partial_viewport_and_scissor() {
        let uv = Rect {
            lt: Vec2::new(0.5, 0.0),
            rb: Vec2::new(1.0, 0.5),
        };
        let viewport = to_viewport(&uv, EXTENT);
        assert_relative_eq!(viewport.x, 400.0);
        assert_relative_eq!(viewport.y, 300.0);
        assert_relative_eq!(viewport.width, 400.0);
        assert_relative_eq!(viewport.height, -300.0);

        let scissor = to_scissor(&uv, EXTENT);
        assert_eq!((scissor.offset.x, scissor.offset.y), (400, 0));
        assert_eq!((scissor.extent.width, scissor.extent.height), (400, 300));
    }

    #[test]
    fn test_inverted_uv_rect_keeps_positive_size() {
        let uv = Rect {
            lt: Vec2::new(1.0, 0.5),
            rb: Vec2::new(0.5, 0.0),
        };
        let viewport = to_viewport(&uv, EXTENT);
        assert_relative_eq!(viewport.width, 400.0);
        assert_relative_eq!(viewport.height, -300.0);

        let scissor = to_scissor(&uv, EXTENT);
        assert_eq!((scissor.extent.width, scissor.extent.height), (400, 300));
    }

    #[test]
    fn test_non_normalized_falls_back_to_full() {
        let uv = Rect {
            lt: Vec2::new(-0.5, 0.0),
            rb: Vec2::new(1.0, 2.0),
        };
        let scissor = to_scissor(&uv, EXTENT);
        assert_eq!((scissor.offset.x, scissor.offset.y), (0, 0));
        assert_eq!((scissor.extent.width, scissor.extent.height), (800, 600));
        assert_relative_eq!(to_viewport(&uv, EXTENT).height, -600.0);
    }

    #[test]
    fn test_attachment_barriers() {
        let begin = color_to_attachment();
        assert_eq!(begin.src_access_mask, vk::AccessFlags2::SHADER_SAMPLED_READ);
        assert_eq!(begin.dst_stage_mask, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(begin.old_layout, vk::ImageLayout::UNDEFINED);

        let end = color_to_sampled();
        assert_eq!(end.old_layout, begin.new_layout);
        assert_eq!(end.new_layout, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL);

        assert_eq!(depth_to_attachment().dst_stage_mask, vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS);
    }
}
