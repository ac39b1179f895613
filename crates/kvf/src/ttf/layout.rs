//! Glyph lookup and line layout

use super::{Codepoint, Glyph, GlyphIndex};
use crate::foundation::math::{IVec2, Vec2};
use crate::rect::Rect;

/// Line height as a multiple of the glyph height
pub const DEFAULT_LINE_HEIGHT: f32 = 1.5;

static NULL_GLYPH: Glyph = Glyph::NULL;

/// Text to lay out with a set of loaded glyphs
#[derive(Debug, Clone, Copy)]
pub struct TextInput<'a> {
    /// Text; `'\n'` starts a new line
    pub text: &'a str,
    /// Glyphs to draw with, loaded at `height`
    pub glyphs: &'a [Glyph],
    /// Pixel height the glyphs were loaded at
    pub height: u32,
    /// Line spacing as a multiple of `height`
    pub n_line_height: f32,
}

impl<'a> TextInput<'a> {
    /// Input with [`DEFAULT_LINE_HEIGHT`] spacing
    pub fn new(text: &'a str, glyphs: &'a [Glyph], height: u32) -> Self {
        Self {
            text,
            glyphs,
            height,
            n_line_height: DEFAULT_LINE_HEIGHT,
        }
    }
}

/// A glyph placed with its pen position on the baseline
#[derive(Debug, Clone, Copy)]
pub struct GlyphLayout<'a> {
    /// Glyph to draw
    pub glyph: &'a Glyph,
    /// Pen position
    pub baseline: Vec2,
}

/// Glyph for `codepoint`, else the tofu glyph if `use_tofu`, else a null glyph
pub fn glyph_or_fallback(glyphs: &[Glyph], codepoint: Codepoint, use_tofu: bool) -> &Glyph {
    glyphs
        .iter()
        .find(|glyph| glyph.codepoint == codepoint)
        .or_else(|| {
            use_tofu
                .then(|| glyphs.iter().find(|glyph| glyph.codepoint == Codepoint::TOFU))
                .flatten()
        })
        .unwrap_or(&NULL_GLYPH)
}

/// Append layouts for `input.text` to `out`, kerning consecutive glyphs with `kerning`.
///
/// Returns the pen position after the last glyph.
pub fn layout_glyphs<'a>(
    out: &mut Vec<GlyphLayout<'a>>,
    input: &TextInput<'a>,
    use_tofu: bool,
    kerning: impl Fn(GlyphIndex, GlyphIndex) -> IVec2,
) -> Vec2 {
    let mut baseline = Vec2::zeros();
    if input.text.is_empty() || input.glyphs.is_empty() {
        return baseline;
    }
    out.reserve(input.text.len());
    let mut previous: Option<&Glyph> = None;
    for c in input.text.chars() {
        if c == '\n' {
            baseline.x = 0.0;
            baseline.y -= input.n_line_height * input.height as f32;
            continue;
        }
        let glyph = glyph_or_fallback(input.glyphs, Codepoint::from(c), use_tofu);
        if let Some(previous) = previous {
            baseline += kerning(previous.index, glyph.index).cast::<f32>();
        }
        out.push(GlyphLayout { glyph, baseline });
        baseline += glyph.advance.cast::<f32>();
        previous = Some(glyph);
    }
    baseline
}

/// Bounding rect of every laid out glyph; zero for no layouts.
///
/// Top, bottom and right edges are seeded at the pen origin.
pub fn glyph_bounds(layouts: &[GlyphLayout<'_>]) -> Rect {
    if layouts.is_empty() {
        return Rect::default();
    }
    let seed = Rect {
        lt: Vec2::new(f32::MAX, 0.0),
        rb: Vec2::zeros(),
    };
    layouts.iter().fold(seed, |bounds, layout| {
        let rect = layout.glyph.rect(layout.baseline);
        Rect {
            lt: Vec2::new(bounds.lt.x.min(rect.lt.x), bounds.lt.y.max(rect.lt.y)),
            rb: Vec2::new(bounds.rb.x.max(rect.rb.x), bounds.rb.y.min(rect.rb.y)),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn glyph(c: char, index: GlyphIndex, advance: i32) -> Glyph {
        Glyph {
            codepoint: Codepoint::from(c),
            size: IVec2::new(advance - 2, 10),
            left_top: IVec2::new(1, 10),
            advance: IVec2::new(advance, 0),
            index,
            ..Default::default()
        }
    }

    fn glyphs() -> Vec<Glyph> {
        vec![
            Glyph {
                codepoint: Codepoint::TOFU,
                advance: IVec2::new(5, 0),
                index: 99,
                ..Default::default()
            },
            glyph('a', 1, 8),
            glyph('b', 2, 10),
        ]
    }

    fn no_kerning(_: GlyphIndex, _: GlyphIndex) -> IVec2 {
        IVec2::zeros()
    }

    #[test]
    fn test_glyph_or_fallback() {
        let glyphs = glyphs();
        assert_eq!(glyph_or_fallback(&glyphs, Codepoint::from('b'), false).index, 2);
        assert_eq!(glyph_or_fallback(&glyphs, Codepoint::from('z'), true).index, 99);
        assert!(glyph_or_fallback(&glyphs, Codepoint::from('z'), false).is_null());
        assert!(glyph_or_fallback(&[], Codepoint::from('a'), true).is_null());
    }

    #[test]
    fn test_layout_advances_pen() {
        let glyphs = glyphs();
        let mut out = Vec::new();
        let end = layout_glyphs(&mut out, &TextInput::new("ab", &glyphs, 10), false, no_kerning);
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out[0].baseline.x, 0.0);
        assert_relative_eq!(out[1].baseline.x, 8.0);
        assert_relative_eq!(end.x, 18.0);
    }

    #[test]
    fn test_layout_newline_drops_line() {
        let glyphs = glyphs();
        let mut out = Vec::new();
        let input = TextInput {
            n_line_height: 2.0,
            ..TextInput::new("a\nb", &glyphs, 10)
        };
        let end = layout_glyphs(&mut out, &input, false, no_kerning);
        assert_eq!(out.len(), 2);
        assert_relative_eq!(out[1].baseline.x, 0.0);
        assert_relative_eq!(out[1].baseline.y, -20.0);
        assert_relative_eq!(end.x, 10.0);
        assert_relative_eq!(end.y, -20.0);
    }

    #[test]
    fn test_layout_applies_kerning() {
        let glyphs = glyphs();
        let mut out = Vec::new();
        let kerning = |left: GlyphIndex, right: GlyphIndex| {
            if (left, right) == (1, 2) {
                IVec2::new(-3, 0)
            } else {
                IVec2::zeros()
            }
        };
        let end = layout_glyphs(&mut out, &TextInput::new("aba", &glyphs, 10), false, kerning);
        assert_relative_eq!(out[1].baseline.x, 5.0);
        assert_relative_eq!(out[2].baseline.x, 15.0);
        assert_relative_eq!(end.x, 23.0);
    }

    #[test]
    fn test_layout_tofu_fallback() {
        let glyphs = glyphs();
        let mut out = Vec::new();
        layout_glyphs(&mut out, &TextInput::new("a?", &glyphs, 10), true, no_kerning);
        assert_eq!(out[1].glyph.codepoint, Codepoint::TOFU);

        out.clear();
        layout_glyphs(&mut out, &TextInput::new("", &glyphs, 10), true, no_kerning);
        assert!(out.is_empty());
    }

    #[test]
    fn test_glyph_bounds() {
        assert_eq!(glyph_bounds(&[]), Rect::default());

        let glyphs = glyphs();
        let mut out = Vec::new();
        layout_glyphs(&mut out, &TextInput::new("ab", &glyphs, 10), false, no_kerning);
        let bounds = glyph_bounds(&out);
        assert_relative_eq!(bounds.lt.x, 1.0);
        assert_relative_eq!(bounds.lt.y, 10.0);
        assert_relative_eq!(bounds.rb.x, 17.0);
        assert_relative_eq!(bounds.rb.y, 0.0);
    }

    #[test]
    fn test_glyph_bounds_include_origin() {
        let raised = Glyph {
            size: IVec2::new(4, 5),
            left_top: IVec2::new(2, 20),
            advance: IVec2::new(6, 0),
            ..Default::default()
        };
        let layouts = [GlyphLayout {
            glyph: &raised,
            baseline: Vec2::new(-10.0, 0.0),
        }];
        let bounds = glyph_bounds(&layouts);
        assert_relative_eq!(bounds.lt.x, -8.0);
        assert_relative_eq!(bounds.lt.y, 20.0);
        assert_relative_eq!(bounds.rb.x, 0.0);
        assert_relative_eq!(bounds.rb.y, 0.0);
    }
}
