//! Sampled images

use std::sync::Arc;

use ash::vk;

use super::image::{Image, ImageCreateInfo, ImageFlags};
use crate::bitmap::Bitmap;
use crate::error::KvfResult;
use crate::render::api::{RenderApi, Sampler};
use crate::render::render_pass::RenderTarget;

/// Image and sampler parameters for a [`Texture`]
#[derive(Debug, Clone, Copy)]
pub struct TextureCreateInfo {
    /// Image parameters
    pub image: ImageCreateInfo,
    /// Sampler parameters
    pub sampler: vk::SamplerCreateInfo,
}

impl Default for TextureCreateInfo {
    fn default() -> Self {
        Self {
            image: ImageCreateInfo {
                format: vk::Format::R8G8B8A8_SRGB,
                flags: ImageFlags::MIP_MAPPED,
                ..Default::default()
            },
            sampler: vk::SamplerCreateInfo {
                mag_filter: vk::Filter::LINEAR,
                min_filter: vk::Filter::LINEAR,
                mipmap_mode: vk::SamplerMipmapMode::LINEAR,
                address_mode_u: vk::SamplerAddressMode::CLAMP_TO_EDGE,
                address_mode_v: vk::SamplerAddressMode::CLAMP_TO_EDGE,
                address_mode_w: vk::SamplerAddressMode::CLAMP_TO_EDGE,
                max_lod: vk::LOD_CLAMP_NONE,
                border_color: vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
                ..Default::default()
            },
        }
    }
}

/// An [`Image`] with its own sampler
pub struct Texture {
    image: Image,
    sampler: Sampler,
}

impl Texture {
    /// Create an empty texture. Upload with [`Texture::resize_and_overwrite`].
    pub fn new(api: &Arc<RenderApi>, info: &TextureCreateInfo) -> KvfResult<Self> {
        Ok(Self {
            sampler: api.create_sampler(&info.sampler)?,
            image: Image::new(Arc::clone(api), info.image, vk::Extent2D::default())?,
        })
    }

    /// Create a texture holding `bitmap`
    pub fn from_bitmap(api: &Arc<RenderApi>, info: &TextureCreateInfo, bitmap: Bitmap<'_>) -> KvfResult<Self> {
        let mut ret = Self::new(api, info)?;
        ret.resize_and_overwrite(&[bitmap])?;
        Ok(ret)
    }

    /// Upload one bitmap per layer
    pub fn resize_and_overwrite(&mut self, layers: &[Bitmap<'_>]) -> KvfResult<()> {
        self.image.resize_and_overwrite(layers)
    }

    /// Descriptor for sampling in shaders
    pub fn descriptor_info(&self) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo {
            sampler: self.sampler.handle(),
            image_view: self.image.view(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }

    /// Underlying image
    pub fn image(&self) -> &Image {
        &self.image
    }

    /// Underlying image
    pub fn image_mut(&mut self) -> &mut Image {
        &mut self.image
    }

    /// Sampler handle
    pub fn sampler(&self) -> vk::Sampler {
        self.sampler.handle()
    }

    /// The texture as a blit source
    pub fn render_target(&self) -> RenderTarget {
        self.image.render_target()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_texture_info() {
        let info = TextureCreateInfo::default();
        assert_eq!(info.image.format, vk::Format::R8G8B8A8_SRGB);
        assert!(info.image.flags.contains(ImageFlags::MIP_MAPPED));
        assert_eq!(info.sampler.address_mode_u, vk::SamplerAddressMode::CLAMP_TO_EDGE);
        assert_eq!(info.sampler.min_filter, vk::Filter::LINEAR);
    }
}
