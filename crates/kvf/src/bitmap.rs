//! RGBA8 bitmaps: borrowed views, owned colour grids and decoded images

use crate::color::{Color, WHITE};
use crate::error::KvfResult;
use crate::foundation::math::IVec2;

static WHITE_PIXEL: [u8; 4] = WHITE.to_array();

/// Borrowed view of tightly packed RGBA8 pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bitmap<'a> {
    /// Pixel bytes, row major
    pub bytes: &'a [u8],
    /// Width and height in pixels
    pub size: IVec2,
}

impl Default for Bitmap<'_> {
    fn default() -> Self {
        Self {
            bytes: &[],
            size: IVec2::zeros(),
        }
    }
}

impl Bitmap<'_> {
    /// Bytes per pixel
    pub const CHANNELS: u32 = 4;

    /// A single opaque white pixel
    pub fn white_pixel() -> Bitmap<'static> {
        Bitmap {
            bytes: &WHITE_PIXEL,
            size: IVec2::new(1, 1),
        }
    }

    /// Whether there is nothing to upload
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty() || self.size.x <= 0 || self.size.y <= 0
    }

    /// Byte count implied by `size`
    pub fn expected_len(&self) -> usize {
        pixel_count(self.size) * Self::CHANNELS as usize
    }
}

/// Pixels in a `size` grid. Negative components count as zero.
pub fn pixel_count(size: IVec2) -> usize {
    size.x.max(0) as usize * size.y.max(0) as usize
}

/// Owned grid of colours, addressable per pixel
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColorBitmap {
    pixels: Vec<Color>,
    size: IVec2,
}

impl ColorBitmap {
    /// Create a transparent bitmap of `size`
    pub fn new(size: IVec2) -> Self {
        let mut ret = Self::default();
        ret.resize(size);
        ret
    }

    /// Resize, clearing to transparent black. Negative sizes clamp to zero.
    pub fn resize(&mut self, size: IVec2) {
        let size = IVec2::new(size.x.max(0), size.y.max(0));
        self.pixels = vec![Color::default(); pixel_count(size)];
        self.size = size;
    }

    /// Width and height in pixels
    pub fn size(&self) -> IVec2 {
        self.size
    }

    fn index(&self, x: i32, y: i32) -> usize {
        assert!(
            (0..self.size.x).contains(&x) && (0..self.size.y).contains(&y),
            "pixel ({x}, {y}) out of bounds for {}x{}",
            self.size.x,
            self.size.y
        );
        (y * self.size.x + x) as usize
    }

    /// Pixel at `(x, y)`
    ///
    /// # Panics
    /// If the coordinate is out of bounds.
    pub fn at(&self, x: i32, y: i32) -> Color {
        self.pixels[self.index(x, y)]
    }

    /// Mutable pixel at `(x, y)`
    ///
    /// # Panics
    /// If the coordinate is out of bounds.
    pub fn at_mut(&mut self, x: i32, y: i32) -> &mut Color {
        let index = self.index(x, y);
        &mut self.pixels[index]
    }

    /// View as an uploadable bitmap
    pub fn bitmap(&self) -> Bitmap<'_> {
        Bitmap {
            bytes: bytemuck::cast_slice(&self.pixels),
            size: self.size,
        }
    }
}

/// A 1x1 bitmap filled with `color`
pub fn pixel_bitmap(color: Color) -> ColorBitmap {
    ColorBitmap {
        pixels: vec![color],
        size: IVec2::new(1, 1),
    }
}

/// Decoded image, always RGBA8
#[derive(Debug, Clone, Default)]
pub struct ImageBitmap {
    bytes: Vec<u8>,
    size: IVec2,
}

impl ImageBitmap {
    /// Bytes per pixel
    pub const CHANNELS: u32 = Bitmap::CHANNELS;

    /// Decode compressed image data (png, jpeg, bmp, pnm)
    pub fn new(compressed: &[u8]) -> KvfResult<Self> {
        let mut ret = Self::default();
        ret.decompress(compressed)?;
        Ok(ret)
    }

    /// Replace the contents with decoded `compressed` data.
    ///
    /// On failure the previous contents are kept.
    pub fn decompress(&mut self, compressed: &[u8]) -> KvfResult<()> {
        let image = image::load_from_memory(compressed)?.to_rgba8();
        self.size = IVec2::new(image.width() as i32, image.height() as i32);
        self.bytes = image.into_raw();
        Ok(())
    }

    /// Whether an image has been decoded
    pub fn is_loaded(&self) -> bool {
        !self.bytes.is_empty()
    }

    /// View as an uploadable bitmap
    pub fn bitmap(&self) -> Bitmap<'_> {
        Bitmap {
            bytes: &self.bytes,
            size: self.size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::{BLUE, RED};

    #[test]
    fn test_color_bitmap_indexing() {
        let mut bitmap = ColorBitmap::new(IVec2::new(2, 2));
        *bitmap.at_mut(1, 0) = RED;
        *bitmap.at_mut(0, 1) = BLUE;

        let view = bitmap.bitmap();
        assert_eq!(view.size, IVec2::new(2, 2));
        assert_eq!(view.bytes.len(), 16);
        assert_eq!(&view.bytes[4..8], &RED.to_array());
        assert_eq!(&view.bytes[8..12], &BLUE.to_array());
        assert_eq!(bitmap.at(1, 0), RED);
    }

    #[test]
    #[should_panic]
    fn test_color_bitmap_out_of_bounds() {
        let bitmap = ColorBitmap::new(IVec2::new(2, 2));
        let _ = bitmap.at(2, 0);
    }

    #[test]
    fn test_pixel_count_does_not_overflow_i32() {
        assert_eq!(pixel_count(IVec2::new(65_536, 65_536)), 1 << 32);
        assert_eq!(pixel_count(IVec2::new(i32::MAX, 2)), i32::MAX as usize * 2);
        assert_eq!(pixel_count(IVec2::new(-3, 5)), 0);
    }

    #[test]
    fn test_pixel_bitmap() {
        let pixel = pixel_bitmap(RED);
        assert_eq!(pixel.size(), IVec2::new(1, 1));
        assert_eq!(pixel.bitmap().bytes, &RED.to_array());
    }

    #[test]
    fn test_white_pixel() {
        let pixel = Bitmap::white_pixel();
        assert!(!pixel.is_empty());
        assert_eq!(pixel.expected_len(), pixel.bytes.len());
    }

    #[test]
    fn test_image_bitmap_decodes_png() {
        let mut encoded = Vec::new();
        let source = image::RgbaImage::from_raw(1, 2, vec![1, 2, 3, 4, 5, 6, 7, 8]).unwrap();
        source
            .write_to(&mut std::io::Cursor::new(&mut encoded), image::ImageFormat::Png)
            .unwrap();

        let decoded = ImageBitmap::new(&encoded).unwrap();
        assert!(decoded.is_loaded());
        assert_eq!(decoded.bitmap().size, IVec2::new(1, 2));
        assert_eq!(decoded.bitmap().bytes, &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_image_bitmap_rejects_garbage() {
        let mut bitmap = ImageBitmap::default();
        assert!(bitmap.decompress(b"not an image").is_err());
        assert!(!bitmap.is_loaded());
    }
}
