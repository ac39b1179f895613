//! GPU images allocated through VMA, with layout tracking and staged uploads

use std::sync::Arc;

use ash::vk;
use bitflags::bitflags;
use vk_mem::Alloc;

use super::buffer::{Buffer, BufferCreateInfo, BufferType};
use crate::bitmap::Bitmap;
use crate::buffer_write::BufferWrite;
use crate::error::{KvfError, KvfResult};
use crate::foundation::math::IVec2;
use crate::render::api::RenderApi;
use crate::render::command_buffer::CommandBuffer;
use crate::render::render_pass::RenderTarget;
use crate::render::util::compute_mip_levels;

const IMPLICIT_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
    vk::ImageUsageFlags::TRANSFER_SRC.as_raw()
        | vk::ImageUsageFlags::TRANSFER_DST.as_raw()
        | vk::ImageUsageFlags::SAMPLED.as_raw(),
);

bitflags! {
    /// Allocation and mip options for [`Image`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ImageFlags: u32 {
        /// Give the image its own memory block
        const DEDICATED_ALLOC = 1 << 0;
        /// Allocate a full mip chain
        const MIP_MAPPED = 1 << 1;
    }
}

/// Image creation parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageCreateInfo {
    /// Texel format
    pub format: vk::Format,
    /// View aspect
    pub aspect: vk::ImageAspectFlags,
    /// Extra usage on top of transfer and sampled
    pub usage: vk::ImageUsageFlags,
    /// Sample count
    pub samples: vk::SampleCountFlags,
    /// Array layers
    pub layers: u32,
    /// View type
    pub view_type: vk::ImageViewType,
    /// Allocation and mip options
    pub flags: ImageFlags,
}

impl Default for ImageCreateInfo {
    fn default() -> Self {
        Self {
            format: vk::Format::R8G8B8A8_SRGB,
            aspect: vk::ImageAspectFlags::COLOR,
            usage: vk::ImageUsageFlags::empty(),
            samples: vk::SampleCountFlags::TYPE_1,
            layers: 1,
            view_type: vk::ImageViewType::TYPE_2D,
            flags: ImageFlags::empty(),
        }
    }
}

impl ImageCreateInfo {
    fn vk_usage(&self) -> vk::ImageUsageFlags {
        self.usage | IMPLICIT_USAGE
    }

    fn mip_levels(&self, extent: vk::Extent2D) -> u32 {
        if self.flags.contains(ImageFlags::MIP_MAPPED) && self.samples == vk::SampleCountFlags::TYPE_1 {
            compute_mip_levels(extent)
        } else {
            1
        }
    }
}

/// Resizable image with a view covering every level and layer
pub struct Image {
    image: vk::Image,
    view: vk::ImageView,
    allocation: Option<vk_mem::Allocation>,
    extent: vk::Extent2D,
    mip_levels: u32,
    layout: vk::ImageLayout,
    info: ImageCreateInfo,
    api: Arc<RenderApi>,
}

impl Image {
    /// Create an image of `extent`. A zero extent defers allocation until [`Image::resize`].
    pub fn new(api: Arc<RenderApi>, info: ImageCreateInfo, extent: vk::Extent2D) -> KvfResult<Self> {
        let mut ret = Self {
            image: vk::Image::null(),
            view: vk::ImageView::null(),
            allocation: None,
            extent: vk::Extent2D::default(),
            mip_levels: 1,
            layout: vk::ImageLayout::UNDEFINED,
            info,
            api,
        };
        ret.resize(extent)?;
        Ok(ret)
    }

    /// Recreate the image at `extent`. Contents are discarded and the layout becomes `UNDEFINED`.
    pub fn resize(&mut self, extent: vk::Extent2D) -> KvfResult<()> {
        if extent == self.extent {
            return Ok(());
        }
        self.destroy();
        if extent.width == 0 || extent.height == 0 {
            return Ok(());
        }

        let mip_levels = self.info.mip_levels(extent);
        let flags = match self.info.view_type {
            vk::ImageViewType::CUBE | vk::ImageViewType::CUBE_ARRAY => vk::ImageCreateFlags::CUBE_COMPATIBLE,
            _ => vk::ImageCreateFlags::empty(),
        };
        let image_info = vk::ImageCreateInfo::builder()
            .flags(flags)
            .image_type(vk::ImageType::TYPE_2D)
            .format(self.info.format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(mip_levels)
            .array_layers(self.info.layers)
            .samples(self.info.samples)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(self.info.vk_usage())
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let alloc_info = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: if self.info.flags.contains(ImageFlags::DEDICATED_ALLOC) {
                vk_mem::AllocationCreateFlags::DEDICATED_MEMORY
            } else {
                vk_mem::AllocationCreateFlags::empty()
            },
            ..Default::default()
        };
        let (image, allocation) = unsafe {
            self.api
                .allocator()
                .create_image(&image_info, &alloc_info)
                .map_err(KvfError::Api)?
        };
        self.image = image;
        self.allocation = Some(allocation);
        self.extent = extent;
        self.mip_levels = mip_levels;

        let view_info = vk::ImageViewCreateInfo::builder()
            .image(image)
            .view_type(self.info.view_type)
            .format(self.info.format)
            .subresource_range(self.subresource_range());
        self.view = unsafe { self.api.device().create_image_view(&view_info, None).map_err(KvfError::Api)? };
        Ok(())
    }

    fn destroy(&mut self) {
        unsafe {
            if self.view != vk::ImageView::null() {
                self.api.device().destroy_image_view(self.view, None);
            }
            if let Some(mut allocation) = self.allocation.take() {
                self.api.allocator().destroy_image(self.image, &mut allocation);
            }
        }
        self.image = vk::Image::null();
        self.view = vk::ImageView::null();
        self.extent = vk::Extent2D::default();
        self.mip_levels = 1;
        self.layout = vk::ImageLayout::UNDEFINED;
    }

    /// Range covering every mip level and layer
    pub fn subresource_range(&self) -> vk::ImageSubresourceRange {
        vk::ImageSubresourceRange {
            aspect_mask: self.info.aspect,
            base_mip_level: 0,
            level_count: self.mip_levels,
            base_array_layer: 0,
            layer_count: self.info.layers,
        }
    }

    /// Record `barrier` for the whole image and track its new layout
    pub fn transition(&mut self, cmd: vk::CommandBuffer, barrier: vk::ImageMemoryBarrier2) {
        let barrier = vk::ImageMemoryBarrier2 {
            image: self.image,
            subresource_range: self.subresource_range(),
            ..barrier
        };
        let barriers = [barrier];
        let dependency = vk::DependencyInfo::builder().image_memory_barriers(&barriers);
        unsafe { self.api.device().cmd_pipeline_barrier2(cmd, &dependency) };
        self.layout = barrier.new_layout;
    }

    /// Resize to the bitmaps' size and upload one bitmap per layer, then build the mip chain.
    ///
    /// Empty bitmaps are replaced by a single white pixel. Blocks until the upload completes.
    pub fn resize_and_overwrite(&mut self, layers: &[Bitmap<'_>]) -> KvfResult<()> {
        let layers: Vec<Bitmap<'_>> = layers
            .iter()
            .map(|bitmap| if bitmap.is_empty() { Bitmap::white_pixel() } else { *bitmap })
            .collect();
        let size = upload_size(&self.info, &layers)?;

        let final_layout = match self.layout {
            vk::ImageLayout::UNDEFINED => vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            layout => layout,
        };
        self.resize(vk::Extent2D {
            width: size.x as u32,
            height: size.y as u32,
        })?;

        let writes: Vec<BufferWrite<'_>> = layers.iter().map(|bitmap| BufferWrite::from_bytes(bitmap.bytes)).collect();
        let mut staging = Buffer::new(
            Arc::clone(&self.api),
            BufferCreateInfo {
                usage: vk::BufferUsageFlags::TRANSFER_SRC,
                kind: BufferType::Host,
            },
            0,
        )?;
        staging.overwrite_contiguous(&writes)?;

        let cmd = CommandBuffer::new(Arc::clone(&self.api))?;
        let layer_size = size.x as vk::DeviceSize * size.y as vk::DeviceSize * vk::DeviceSize::from(Bitmap::CHANNELS);
        self.record_upload(cmd.handle(), &staging, layer_size, final_layout);
        cmd.submit_and_wait()
    }

    fn record_upload(
        &mut self,
        cmd: vk::CommandBuffer,
        staging: &Buffer,
        layer_size: vk::DeviceSize,
        final_layout: vk::ImageLayout,
    ) {
        let device = self.api.device().clone();
        self.transition(
            cmd,
            vk::ImageMemoryBarrier2 {
                src_stage_mask: vk::PipelineStageFlags2::TOP_OF_PIPE,
                dst_stage_mask: vk::PipelineStageFlags2::TRANSFER,
                dst_access_mask: vk::AccessFlags2::TRANSFER_WRITE,
                old_layout: vk::ImageLayout::UNDEFINED,
                new_layout: vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                ..self.api.image_barrier(self.info.aspect)
            },
        );

        let regions: Vec<vk::BufferImageCopy2> = (0..self.info.layers)
            .map(|layer| {
                vk::BufferImageCopy2::builder()
                    .buffer_offset(u64::from(layer) * layer_size)
                    .image_subresource(vk::ImageSubresourceLayers {
                        aspect_mask: self.info.aspect,
                        mip_level: 0,
                        base_array_layer: layer,
                        layer_count: 1,
                    })
                    .image_extent(vk::Extent3D {
                        width: self.extent.width,
                        height: self.extent.height,
                        depth: 1,
                    })
                    .build()
            })
            .collect();
        let copy_info = vk::CopyBufferToImageInfo2::builder()
            .src_buffer(staging.handle())
            .dst_image(self.image)
            .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .regions(&regions);
        unsafe { device.cmd_copy_buffer_to_image2(cmd, &copy_info) };

        let level_barrier = |level: u32,
                             old_layout: vk::ImageLayout,
                             new_layout: vk::ImageLayout,
                             src: (vk::PipelineStageFlags2, vk::AccessFlags2)| {
            vk::ImageMemoryBarrier2 {
                src_stage_mask: src.0,
                src_access_mask: src.1,
                dst_stage_mask: vk::PipelineStageFlags2::ALL_COMMANDS,
                dst_access_mask: vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE,
                old_layout,
                new_layout,
                image: self.image,
                subresource_range: vk::ImageSubresourceRange {
                    base_mip_level: level,
                    level_count: 1,
                    layer_count: self.info.layers,
                    ..self.subresource_range()
                },
                ..self.api.image_barrier(self.info.aspect)
            }
        };
        let transfer_write = (vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE);
        let transfer_read = (vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ);

        let mut final_barriers = Vec::with_capacity(self.mip_levels as usize);
        let mut src_extent = self.extent;
        for level in 1..self.mip_levels {
            let to_src = [level_barrier(
                level - 1,
                vk::ImageLayout::TRANSFER_DST_OPTIMAL,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                transfer_write,
            )];
            unsafe {
                device.cmd_pipeline_barrier2(cmd, &vk::DependencyInfo::builder().image_memory_barriers(&to_src));
            }

            let dst_extent = vk::Extent2D {
                width: (src_extent.width / 2).max(1),
                height: (src_extent.height / 2).max(1),
            };
            let subresource = |mip_level: u32| vk::ImageSubresourceLayers {
                aspect_mask: self.info.aspect,
                mip_level,
                base_array_layer: 0,
                layer_count: self.info.layers,
            };
            let regions = [vk::ImageBlit2::builder()
                .src_subresource(subresource(level - 1))
                .src_offsets([vk::Offset3D::default(), extent_offset(src_extent)])
                .dst_subresource(subresource(level))
                .dst_offsets([vk::Offset3D::default(), extent_offset(dst_extent)])
                .build()];
            let blit_info = vk::BlitImageInfo2::builder()
                .src_image(self.image)
                .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
                .dst_image(self.image)
                .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .regions(&regions)
                .filter(vk::Filter::LINEAR);
            unsafe { device.cmd_blit_image2(cmd, &blit_info) };

            final_barriers.push(level_barrier(
                level - 1,
                vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
                final_layout,
                transfer_read,
            ));
            src_extent = dst_extent;
        }
        final_barriers.push(level_barrier(
            self.mip_levels - 1,
            vk::ImageLayout::TRANSFER_DST_OPTIMAL,
            final_layout,
            transfer_write,
        ));
        unsafe {
            device.cmd_pipeline_barrier2(cmd, &vk::DependencyInfo::builder().image_memory_barriers(&final_barriers));
        }
        self.layout = final_layout;
    }

    /// This image as a blit source or attachment
    pub fn render_target(&self) -> RenderTarget {
        RenderTarget {
            image: self.image,
            view: self.view,
            extent: self.extent,
            format: self.info.format,
            aspect: self.info.aspect,
            layout: self.layout,
        }
    }

    /// Image handle
    pub fn handle(&self) -> vk::Image {
        self.image
    }

    /// View covering every level and layer
    pub fn view(&self) -> vk::ImageView {
        self.view
    }

    /// Current size
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Number of mip levels
    pub fn mip_levels(&self) -> u32 {
        self.mip_levels
    }

    /// Tracked layout
    pub fn layout(&self) -> vk::ImageLayout {
        self.layout
    }

    /// Creation parameters
    pub fn info(&self) -> &ImageCreateInfo {
        &self.info
    }
}

impl Drop for Image {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Size shared by `layers`, if they can be uploaded to an image created with `info`
fn upload_size(info: &ImageCreateInfo, layers: &[Bitmap<'_>]) -> KvfResult<IVec2> {
    let Some(first) = layers.first() else {
        return Err(KvfError::invalid("no image layers to upload"));
    };
    if layers.len() != info.layers as usize {
        return Err(KvfError::invalid(format!(
            "expected {} image layers, got {}",
            info.layers,
            layers.len()
        )));
    }
    if !info.vk_usage().contains(vk::ImageUsageFlags::TRANSFER_DST) {
        return Err(KvfError::invalid("image is not a transfer destination"));
    }
    let size = first.size;
    if layers.iter().any(|bitmap| bitmap.size != size || bitmap.bytes.len() != bitmap.expected_len()) {
        return Err(KvfError::invalid("image layers must share one size and be tightly packed"));
    }
    Ok(size)
}

fn extent_offset(extent: vk::Extent2D) -> vk::Offset3D {
    vk::Offset3D {
        x: extent.width as i32,
        y: extent.height as i32,
        z: 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_always_includes_transfer_and_sampled() {
        let info = ImageCreateInfo {
            usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
            ..Default::default()
        };
        assert!(info.vk_usage().contains(IMPLICIT_USAGE | vk::ImageUsageFlags::COLOR_ATTACHMENT));
    }

    #[test]
    fn test_mip_levels_only_when_requested_and_single_sampled() {
        let extent = vk::Extent2D { width: 256, height: 64 };
        let mut info = ImageCreateInfo::default();
        assert_eq!(info.mip_levels(extent), 1);

        info.flags = ImageFlags::MIP_MAPPED;
        assert_eq!(info.mip_levels(extent), 9);

        info.samples = vk::SampleCountFlags::TYPE_4;
        assert_eq!(info.mip_levels(extent), 1);
    }

    #[test]
    fn test_upload_size_rejects_empty_layers() {
        let info = ImageCreateInfo {
            layers: 0,
            ..Default::default()
        };
        assert!(matches!(upload_size(&info, &[]), Err(KvfError::InvalidOperation { .. })));
        assert!(upload_size(&ImageCreateInfo::default(), &[]).is_err());
    }

    #[test]
    fn test_upload_size_checks_layer_count_and_sizes() {
        let pixels = [0_u8; 16];
        let two_by_two = Bitmap {
            bytes: &pixels,
            size: IVec2::new(2, 2),
        };
        let info = ImageCreateInfo::default();
        assert_eq!(upload_size(&info, &[two_by_two]).ok(), Some(IVec2::new(2, 2)));
        assert!(upload_size(&info, &[two_by_two, two_by_two]).is_err());

        let layered = ImageCreateInfo { layers: 2, ..info };
        assert_eq!(upload_size(&layered, &[two_by_two, two_by_two]).ok(), Some(IVec2::new(2, 2)));
        assert!(upload_size(&layered, &[two_by_two, Bitmap::white_pixel()]).is_err());

        let short = Bitmap {
            bytes: &pixels[..8],
            size: IVec2::new(2, 2),
        };
        assert!(upload_size(&info, &[short]).is_err());
    }
}
