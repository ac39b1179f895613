//! 8-bit RGBA colour with sRGB/linear conversions

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::Vec4;

/// RGBA colour, one byte per channel
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Pod, Zeroable)]
pub struct Color {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Alpha channel
    pub a: u8,
}

/// Opaque black
pub const BLACK: Color = Color::from_mask(0x0000_00ff);
/// Opaque white
pub const WHITE: Color = Color::from_mask(0xffff_ffff);
/// Opaque red
pub const RED: Color = Color::from_mask(0xff00_00ff);
/// Opaque green
pub const GREEN: Color = Color::from_mask(0x00ff_00ff);
/// Opaque blue
pub const BLUE: Color = Color::from_mask(0x0000_ffff);
/// Opaque cyan
pub const CYAN: Color = Color::from_mask(0x00ff_ffff);
/// Opaque yellow
pub const YELLOW: Color = Color::from_mask(0xffff_00ff);
/// Opaque magenta
pub const MAGENTA: Color = Color::from_mask(0xff00_ffff);

impl Color {
    /// Largest channel value
    pub const CHANNEL_MAX: u8 = 0xff;

    /// Construct from channels
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Construct from a `0xRRGGBBAA` mask
    pub const fn from_mask(mask: u32) -> Self {
        let [r, g, b, a] = mask.to_be_bytes();
        Self { r, g, b, a }
    }

    /// Pack into a `0xRRGGBBAA` mask
    pub const fn to_u32(self) -> u32 {
        u32::from_be_bytes([self.r, self.g, self.b, self.a])
    }

    /// Construct from normalized channels (truncating)
    pub fn from_vec4(norm: Vec4) -> Self {
        Self::new(to_u8(norm.x), to_u8(norm.y), to_u8(norm.z), to_u8(norm.w))
    }

    /// Normalized channels
    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(to_f32(self.r), to_f32(self.g), to_f32(self.b), to_f32(self.a))
    }

    /// Channels as an array, in memory order
    pub const fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Treat these channels as sRGB encoded and convert them to linear
    pub fn to_linear(self) -> Vec4 {
        srgb_to_linear(self.to_vec4())
    }

    /// Treat these channels as linear and encode them as sRGB
    pub fn to_srgb(self) -> Vec4 {
        linear_to_srgb(self.to_vec4())
    }
}

impl From<u32> for Color {
    fn from(mask: u32) -> Self {
        Self::from_mask(mask)
    }
}

fn to_f32(channel: u8) -> f32 {
    f32::from(channel) / f32::from(Color::CHANNEL_MAX)
}

fn to_u8(norm: f32) -> u8 {
    (norm.clamp(0.0, 1.0) * f32::from(Color::CHANNEL_MAX)) as u8
}

fn srgb_channel_to_linear(c: f32) -> f32 {
    if c <= 0.040_45 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn linear_channel_to_srgb(c: f32) -> f32 {
    if c <= 0.003_130_8 {
        c * 12.92
    } else {
        1.055 * c.powf(1.0 / 2.4) - 0.055
    }
}

/// Convert sRGB encoded channels to linear, alpha untouched
pub fn srgb_to_linear(channels: Vec4) -> Vec4 {
    Vec4::new(
        srgb_channel_to_linear(channels.x),
        srgb_channel_to_linear(channels.y),
        srgb_channel_to_linear(channels.z),
        channels.w,
    )
}

/// Convert linear channels to sRGB encoding, alpha untouched
pub fn linear_to_srgb(channels: Vec4) -> Vec4 {
    Vec4::new(
        linear_channel_to_srgb(channels.x),
        linear_channel_to_srgb(channels.y),
        linear_channel_to_srgb(channels.z),
        channels.w,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mask_round_trip() {
        let color = Color::from_mask(0x1234_5678);
        assert_eq!(color, Color::new(0x12, 0x34, 0x56, 0x78));
        assert_eq!(color.to_u32(), 0x1234_5678);
    }

    #[test]
    fn test_named_colors() {
        assert_eq!(CYAN.to_u32(), GREEN.to_u32() | BLUE.to_u32());
        assert_eq!(YELLOW.to_u32(), RED.to_u32() | GREEN.to_u32());
        assert_eq!(MAGENTA.to_u32(), RED.to_u32() | BLUE.to_u32());
        assert_eq!(BLACK.a, 0xff);
    }

    #[test]
    fn test_vec4_conversion_truncates() {
        let color = Color::from_vec4(Vec4::new(1.0, 0.5, 0.0, 1.0));
        assert_eq!(color, Color::new(255, 127, 0, 255));
        assert_relative_eq!(WHITE.to_vec4().x, 1.0);
    }

    #[test]
    fn test_srgb_linear_conversion() {
        let linear = srgb_to_linear(Vec4::new(0.5, 0.0, 1.0, 0.25));
        assert_relative_eq!(linear.x, 0.214_041, epsilon = 1e-5);
        assert_relative_eq!(linear.y, 0.0);
        assert_relative_eq!(linear.z, 1.0, epsilon = 1e-6);
        assert_relative_eq!(linear.w, 0.25);

        let back = linear_to_srgb(linear);
        assert_relative_eq!(back.x, 0.5, epsilon = 1e-5);
    }

    #[test]
    fn test_pod_layout() {
        let bytes: &[u8] = bytemuck::bytes_of(&RED);
        assert_eq!(bytes, &[0xff, 0x00, 0x00, 0xff]);
    }
}
