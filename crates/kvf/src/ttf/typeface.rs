//! Font face loaded with `fontdue`

use fontdue::{Font, FontSettings, Metrics};

use super::layout::{layout_glyphs, GlyphLayout, TextInput};
use super::{Codepoint, Glyph, GlyphIndex, Slot};
use crate::error::{KvfError, KvfResult};
use crate::foundation::math::{IVec2, Vec2};
use crate::rect::uv_rect;

const KERNING_PROBE_HEIGHT: f32 = 32.0;

/// A parsed font, or nothing until [`Typeface::load`] succeeds
#[derive(Default)]
pub struct Typeface {
    font: Option<Font>,
    has_kerning: bool,
}

fn slot_metrics(metrics: &Metrics) -> (IVec2, IVec2, IVec2) {
    let size = IVec2::new(metrics.width as i32, metrics.height as i32);
    let left_top = IVec2::new(metrics.xmin, metrics.ymin + metrics.height as i32);
    let advance = IVec2::new(
        metrics.advance_width.round() as i32,
        metrics.advance_height.round() as i32,
    );
    (size, left_top, advance)
}

// fontdue only answers per-pair queries, so look for any kerned pair among ASCII letters.
fn probe_kerning(font: &Font) -> bool {
    let letters: Vec<char> = ('A'..='Z').chain('a'..='z').collect();
    letters.iter().any(|&left| {
        letters
            .iter()
            .any(|&right| font.horizontal_kern(left, right, KERNING_PROBE_HEIGHT).is_some())
    })
}

impl Typeface {
    /// Parse `bytes` as a TrueType or OpenType font
    pub fn new(bytes: &[u8]) -> KvfResult<Self> {
        let mut ret = Self::default();
        ret.load(bytes)?;
        Ok(ret)
    }

    /// Replace the current font with `bytes`. On failure the previous font is kept.
    pub fn load(&mut self, bytes: &[u8]) -> KvfResult<()> {
        let font = Font::from_bytes(bytes, FontSettings::default()).map_err(|e| KvfError::Font(e.to_string()))?;
        self.has_kerning = probe_kerning(&font);
        log::debug!(
            "Loaded font '{}': {} glyphs, kerning: {}",
            font.name().unwrap_or("unnamed"),
            font.glyph_count(),
            self.has_kerning
        );
        self.font = Some(font);
        Ok(())
    }

    /// Whether a font is loaded
    pub fn is_loaded(&self) -> bool {
        self.font.is_some()
    }

    /// Font name, if the font has one
    pub fn name(&self) -> Option<&str> {
        self.font.as_ref()?.name()
    }

    /// Rasterize `codepoint` at `height` pixels
    pub fn load_slot(&self, height: u32, codepoint: Codepoint) -> Option<Slot> {
        let font = self.font.as_ref()?;
        let glyph_index = font.lookup_glyph_index(codepoint.to_char()?);
        let (metrics, alpha_channels) = font.rasterize_indexed(glyph_index, height as f32);
        let (size, left_top, advance) = slot_metrics(&metrics);
        Some(Slot {
            size,
            left_top,
            advance,
            alpha_channels,
            glyph_index,
        })
    }

    /// Whether the font carries kerning pairs
    pub fn has_kerning(&self) -> bool {
        self.is_loaded() && self.has_kerning
    }

    /// Pen adjustment between `left` and `right` at `height` pixels
    pub fn kerning(&self, height: u32, left: GlyphIndex, right: GlyphIndex) -> IVec2 {
        let Some(font) = self.font.as_ref().filter(|_| self.has_kerning) else {
            return IVec2::zeros();
        };
        let kern = font
            .horizontal_kern_indexed(left, right, height as f32)
            .unwrap_or(0.0);
        IVec2::new(kern.round() as i32, 0)
    }

    /// Metrics for each of `codepoints` at `height` pixels, each covering the whole texture.
    ///
    /// Codepoints that are not valid characters are skipped.
    pub fn load_glyphs(&self, height: u32, codepoints: &[Codepoint]) -> Vec<Glyph> {
        let Some(font) = self.font.as_ref() else {
            return Vec::new();
        };
        codepoints
            .iter()
            .filter_map(|&codepoint| {
                let index = font.lookup_glyph_index(codepoint.to_char()?);
                let (size, left_top, advance) = slot_metrics(&font.metrics_indexed(index, height as f32));
                Some(Glyph {
                    codepoint,
                    size,
                    left_top,
                    advance,
                    uv_rect: uv_rect(),
                    index,
                })
            })
            .collect()
    }

    /// Lay out `input` with this font's kerning. See [`layout_glyphs`].
    pub fn push_layouts<'a>(&self, out: &mut Vec<GlyphLayout<'a>>, input: &TextInput<'a>, use_tofu: bool) -> Vec2 {
        if !self.is_loaded() {
            return Vec2::zeros();
        }
        layout_glyphs(out, input, use_tofu, |left, right| self.kerning(input.height, left, right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unloaded_typeface() {
        let face = Typeface::default();
        assert!(!face.is_loaded());
        assert!(face.name().is_none());
        assert!(!face.has_kerning());
        assert!(face.load_slot(16, Codepoint::from('a')).is_none());
        assert!(face.load_glyphs(16, &[Codepoint::from('a')]).is_empty());
        assert_eq!(face.kerning(16, 1, 2), IVec2::zeros());

        let glyphs = [Glyph::default()];
        let mut out = Vec::new();
        let end = face.push_layouts(&mut out, &TextInput::new("a", &glyphs, 16), true);
        assert!(out.is_empty());
        assert_eq!(end, Vec2::zeros());
    }

    #[test]
    fn test_invalid_font_bytes() {
        let mut face = Typeface::default();
        assert!(matches!(face.load(b"not a font"), Err(KvfError::Font(_))));
        assert!(!face.is_loaded());
    }

    #[test]
    fn test_slot_metrics_are_y_up() {
        let metrics = Metrics {
            xmin: 1,
            ymin: -3,
            width: 8,
            height: 12,
            advance_width: 9.6,
            advance_height: 0.0,
            ..Default::default()
        };
        let (size, left_top, advance) = slot_metrics(&metrics);
        assert_eq!(size, IVec2::new(8, 12));
        assert_eq!(left_top, IVec2::new(1, 9));
        assert_eq!(advance, IVec2::new(10, 0));
    }
}
