//! TrueType glyph metrics, kerning and text layout
//!
//! Fonts are parsed and rasterized with `fontdue`. Layout is y-up: a glyph's
//! `left_top` is measured from the pen position on the baseline.

mod layout;
mod typeface;

pub use layout::{glyph_bounds, glyph_or_fallback, layout_glyphs, GlyphLayout, TextInput, DEFAULT_LINE_HEIGHT};
pub use typeface::Typeface;

use crate::foundation::math::{IVec2, Vec2};
use crate::rect::{Rect, UvRect};

/// Index of a glyph inside its font
pub type GlyphIndex = u16;

/// Unicode scalar value of a glyph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Codepoint(pub u32);

impl Codepoint {
    /// Placeholder glyph for missing characters
    pub const TOFU: Self = Self(0);
    /// ASCII space
    pub const SPACE: Self = Self(32);
    /// First printable ASCII character
    pub const ASCII_FIRST: Self = Self::SPACE;
    /// Last printable ASCII character
    pub const ASCII_LAST: Self = Self(126);

    /// The character, if this is a valid scalar value
    pub fn to_char(self) -> Option<char> {
        char::from_u32(self.0)
    }
}

impl From<char> for Codepoint {
    fn from(c: char) -> Self {
        Self(c as u32)
    }
}

/// Tofu followed by printable ASCII
pub fn default_codepoints() -> Vec<Codepoint> {
    std::iter::once(Codepoint::TOFU)
        .chain((Codepoint::ASCII_FIRST.0..=Codepoint::ASCII_LAST.0).map(Codepoint))
        .collect()
}

/// A rasterized glyph: coverage plus metrics
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Slot {
    /// Bitmap size in pixels
    pub size: IVec2,
    /// Offset of the bitmap's top-left from the pen position
    pub left_top: IVec2,
    /// Pen advance after this glyph
    pub advance: IVec2,
    /// One coverage byte per pixel, rows top to bottom
    pub alpha_channels: Vec<u8>,
    /// Index inside the font
    pub glyph_index: GlyphIndex,
}

impl Slot {
    /// Coverage at `(x, y)`, zero outside the bitmap
    pub fn alpha_at(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.size.x {
            return 0;
        }
        let index = (y * self.size.x + x) as usize;
        self.alpha_channels.get(index).copied().unwrap_or(0)
    }
}

/// Glyph metrics and its location in a texture
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glyph {
    /// Character this glyph draws
    pub codepoint: Codepoint,
    /// Bitmap size in pixels
    pub size: IVec2,
    /// Offset of the bitmap's top-left from the pen position
    pub left_top: IVec2,
    /// Pen advance after this glyph
    pub advance: IVec2,
    /// Region of the texture holding the bitmap
    pub uv_rect: UvRect,
    /// Index inside the font
    pub index: GlyphIndex,
}

impl Default for Glyph {
    fn default() -> Self {
        Self::NULL
    }
}

impl Glyph {
    /// Zero-sized glyph covering the whole texture
    pub const NULL: Self = Self {
        codepoint: Codepoint::TOFU,
        size: IVec2::new(0, 0),
        left_top: IVec2::new(0, 0),
        advance: IVec2::new(0, 0),
        uv_rect: Rect {
            lt: Vec2::new(0.0, 0.0),
            rb: Vec2::new(1.0, 1.0),
        },
        index: 0,
    };

    /// Quad covered by the glyph with the pen at `baseline`
    pub fn rect(&self, baseline: Vec2) -> Rect {
        let lt = baseline + self.left_top.cast::<f32>();
        let size = self.size.cast::<f32>();
        Rect {
            lt,
            rb: Vec2::new(lt.x + size.x, lt.y - size.y),
        }
    }

    /// Whether this is the null glyph returned for unknown characters
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_default_codepoints() {
        let codepoints = default_codepoints();
        assert_eq!(codepoints.len(), 96);
        assert_eq!(codepoints[0], Codepoint::TOFU);
        assert_eq!(codepoints[1], Codepoint::SPACE);
        assert_eq!(codepoints.last(), Some(&Codepoint::ASCII_LAST));
        assert_eq!(Codepoint::from('~'), Codepoint::ASCII_LAST);
    }

    #[test]
    fn test_glyph_rect() {
        let glyph = Glyph {
            size: IVec2::new(10, 12),
            left_top: IVec2::new(1, 12),
            ..Default::default()
        };
        let rect = glyph.rect(Vec2::new(100.0, 50.0));
        assert_relative_eq!(rect.lt.x, 101.0);
        assert_relative_eq!(rect.lt.y, 62.0);
        assert_relative_eq!(rect.rb.x, 111.0);
        assert_relative_eq!(rect.rb.y, 50.0);
    }

    #[test]
    fn test_slot_alpha_bounds() {
        let slot = Slot {
            size: IVec2::new(2, 2),
            alpha_channels: vec![1, 2, 3, 4],
            ..Default::default()
        };
        assert_eq!(slot.alpha_at(1, 1), 4);
        assert_eq!(slot.alpha_at(0, 1), 3);
        assert_eq!(slot.alpha_at(2, 0), 0);
        assert_eq!(slot.alpha_at(0, 5), 0);
        assert_eq!(slot.alpha_at(-1, 0), 0);
    }

    #[test]
    fn test_null_glyph() {
        assert!(Glyph::default().is_null());
        let glyph = Glyph {
            codepoint: Codepoint::from('a'),
            ..Default::default()
        };
        assert!(!glyph.is_null());
    }
}
