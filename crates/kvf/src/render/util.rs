//! Small helpers shared by the render modules and applications

use std::fs::File;
use std::path::Path;

use ash::vk;

use crate::color::Color;
use crate::error::KvfResult;
use crate::foundation::math::{IVec2, Vec2};

pub use super::sync::wait_for_fence;

/// Full mip chain length for `extent`: `floor(log2(max(w, h))) + 1`
pub fn compute_mip_levels(extent: vk::Extent2D) -> u32 {
    let largest = extent.width.max(extent.height).max(1);
    largest.ilog2() + 1
}

/// Scale both dimensions of `extent`, keeping at least one pixel each
pub fn scale_extent(extent: vk::Extent2D, scale: f32) -> vk::Extent2D {
    vk::Extent2D {
        width: ((extent.width as f32 * scale) as u32).max(1),
        height: ((extent.height as f32 * scale) as u32).max(1),
    }
}

/// Extent as a float vector
pub fn extent_to_vec2(extent: vk::Extent2D) -> Vec2 {
    Vec2::new(extent.width as f32, extent.height as f32)
}

/// Integer size to extent. Negative components clamp to zero.
pub fn ivec2_to_extent(size: IVec2) -> vk::Extent2D {
    vk::Extent2D {
        width: size.x.max(0) as u32,
        height: size.y.max(0) as u32,
    }
}

/// Extent as an integer size
pub fn extent_to_ivec2(extent: vk::Extent2D) -> IVec2 {
    IVec2::new(extent.width as i32, extent.height as i32)
}

fn buffer_write<'a>(
    set: vk::DescriptorSet,
    binding: u32,
    ty: vk::DescriptorType,
    info: &'a [vk::DescriptorBufferInfo],
) -> vk::WriteDescriptorSetBuilder<'a> {
    vk::WriteDescriptorSet::builder()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(ty)
        .buffer_info(info)
}

/// Uniform buffer descriptor write
pub fn ubo_write(
    set: vk::DescriptorSet,
    binding: u32,
    info: &[vk::DescriptorBufferInfo],
) -> vk::WriteDescriptorSetBuilder<'_> {
    buffer_write(set, binding, vk::DescriptorType::UNIFORM_BUFFER, info)
}

/// Storage buffer descriptor write
pub fn ssbo_write(
    set: vk::DescriptorSet,
    binding: u32,
    info: &[vk::DescriptorBufferInfo],
) -> vk::WriteDescriptorSetBuilder<'_> {
    buffer_write(set, binding, vk::DescriptorType::STORAGE_BUFFER, info)
}

/// Combined image sampler descriptor write
pub fn image_write(
    set: vk::DescriptorSet,
    binding: u32,
    info: &[vk::DescriptorImageInfo],
) -> vk::WriteDescriptorSetBuilder<'_> {
    vk::WriteDescriptorSet::builder()
        .dst_set(set)
        .dst_binding(binding)
        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
        .image_info(info)
}

/// Record image barriers in a single dependency. Does nothing for an empty list.
pub fn record_barriers(device: &ash::Device, cmd: vk::CommandBuffer, barriers: &[vk::ImageMemoryBarrier2]) {
    if barriers.is_empty() {
        return;
    }
    let dependency = vk::DependencyInfo::builder().image_memory_barriers(barriers);
    unsafe { device.cmd_pipeline_barrier2(cmd, &dependency) };
}

/// Read a UTF-8 text file
pub fn string_from_file(path: impl AsRef<Path>) -> KvfResult<String> {
    Ok(std::fs::read_to_string(path)?)
}

/// Read a binary file
pub fn bytes_from_file(path: impl AsRef<Path>) -> KvfResult<Vec<u8>> {
    Ok(std::fs::read(path)?)
}

/// Read a SPIR-V binary as words
pub fn spirv_from_file(path: impl AsRef<Path>) -> KvfResult<Vec<u32>> {
    let mut file = File::open(path)?;
    Ok(ash::util::read_spv(&mut file)?)
}

/// Parse `#rrggbbaa`
pub fn color_from_hex(hex: &str) -> Option<Color> {
    let digits = hex.strip_prefix('#')?;
    if hex.len() != 9 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok().map(Color::from_mask)
}

/// Format as `#rrggbbaa`
pub fn to_hex_string(color: Color) -> String {
    format!("#{:08x}", color.to_u32())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{MAGENTA, WHITE};

    #[test]
    fn test_compute_mip_levels() {
        let levels = |width, height| compute_mip_levels(vk::Extent2D { width, height });
        assert_eq!(levels(1, 1), 1);
        assert_eq!(levels(2, 1), 2);
        assert_eq!(levels(256, 256), 9);
        assert_eq!(levels(300, 17), 9);
        assert_eq!(levels(0, 0), 1);
    }

    #[test]
    fn test_scale_extent() {
        let extent = scale_extent(vk::Extent2D { width: 800, height: 600 }, 0.5);
        assert_eq!((extent.width, extent.height), (400, 300));
        let tiny = scale_extent(vk::Extent2D { width: 3, height: 3 }, 0.1);
        assert_eq!((tiny.width, tiny.height), (1, 1));
    }

    #[test]
    fn test_extent_conversions() {
        assert_eq!(ivec2_to_extent(IVec2::new(-4, 7)), vk::Extent2D { width: 0, height: 7 });
        let extent = vk::Extent2D { width: 64, height: 32 };
        assert_eq!(extent_to_ivec2(extent), IVec2::new(64, 32));
        assert_eq!(extent_to_vec2(extent), Vec2::new(64.0, 32.0));
    }

    #[test]
    fn test_hex_colors() {
        assert_eq!(color_from_hex("#ff00ffff"), Some(MAGENTA));
        assert_eq!(color_from_hex("#FFFFFFFF"), Some(WHITE));
        assert_eq!(to_hex_string(MAGENTA), "#ff00ffff");
        assert_eq!(color_from_hex(&to_hex_string(Color::new(1, 2, 3, 4))), Some(Color::new(1, 2, 3, 4)));

        assert_eq!(color_from_hex("ff00ffff"), None);
        assert_eq!(color_from_hex("#ff00ff"), None);
        assert_eq!(color_from_hex("#ff00ffzz"), None);
        assert_eq!(color_from_hex("#+f00ffff"), None);
    }

    #[test]
    fn test_spirv_from_missing_file() {
        assert!(spirv_from_file("does/not/exist.spv").is_err());
    }
}
