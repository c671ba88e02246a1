//! Truecolor bitmaps and the pixel capabilities the bridge works through
//!
//! Pixels are packed into a `u32` as `alpha << 24 | red << 16 | green << 8 | blue`.
//! Alpha is 7 bits wide and inverted: 0 is fully opaque, 127 fully
//! transparent.

use imgref::ImgVec;
use rgb::Rgba;

/// Largest alpha value of a packed pixel (fully transparent)
pub const ALPHA_MAX: u8 = 127;

/// Alpha value of a fully opaque packed pixel
pub const ALPHA_OPAQUE: u8 = 0;

/// Pack channels into a truecolor pixel. `a` uses the 7-bit inverted scale.
#[inline]
pub const fn true_color_alpha(r: u8, g: u8, b: u8, a: u8) -> u32 {
    ((a as u32 & 0x7f) << 24) | ((r as u32) << 16) | ((g as u32) << 8) | b as u32
}

/// Red channel of a packed pixel
#[inline]
pub const fn red(px: u32) -> u8 {
    (px >> 16) as u8
}

/// Green channel of a packed pixel
#[inline]
pub const fn green(px: u32) -> u8 {
    (px >> 8) as u8
}

/// Blue channel of a packed pixel
#[inline]
pub const fn blue(px: u32) -> u8 {
    px as u8
}

/// 7-bit alpha of a packed pixel
#[inline]
pub const fn alpha(px: u32) -> u8 {
    ((px >> 24) & 0x7f) as u8
}

/// Read access to a bitmap being encoded
pub trait PixelSource {
    /// Width in pixels
    fn width(&self) -> u32;
    /// Height in pixels
    fn height(&self) -> u32;
    /// Whether every pixel carries its own packed RGBA value
    fn is_true_color(&self) -> bool;
    /// Packed pixel at `(x, y)`
    fn get_pixel(&self, x: u32, y: u32) -> u32;
}

/// Write access to a bitmap being decoded into
pub trait PixelSink: Sized {
    /// Allocate a truecolor bitmap. `None` when the allocation fails.
    fn new_true_color(width: u32, height: u32) -> Option<Self>;
    /// Width in pixels
    fn width(&self) -> u32;
    /// Height in pixels
    fn height(&self) -> u32;
    /// Store a packed pixel at `(x, y)`
    fn set_pixel(&mut self, x: u32, y: u32, px: u32);
    /// Mark the alpha channel as meaningful
    fn set_save_alpha(&mut self, save: bool);
}

/// How a [`Bitmap`] stores its pixels
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColorMode {
    /// Pixels are packed RGBA values
    TrueColor,
    /// Pixels are indices into this palette
    Palette(Vec<Rgba<u8>>),
}

/// In-memory bitmap, truecolor or palette-indexed
#[derive(Debug, Clone)]
pub struct Bitmap {
    pixels: ImgVec<u32>,
    mode: ColorMode,
    save_alpha: bool,
}

impl Bitmap {
    /// Allocate a truecolor bitmap filled with opaque black
    ///
    /// Returns `None` if the pixel buffer cannot be allocated. Zero-sized
    /// bitmaps are allowed; they hold no pixels.
    pub fn new_true_color(width: u32, height: u32) -> Option<Self> {
        let buf = alloc_pixels(width, height)?;
        Some(Self {
            pixels: pixel_grid(buf, width, height),
            mode: ColorMode::TrueColor,
            save_alpha: false,
        })
    }

    /// Allocate a palette bitmap with every pixel set to index 0
    pub fn new_palette(width: u32, height: u32, palette: Vec<Rgba<u8>>) -> Option<Self> {
        let buf = alloc_pixels(width, height)?;
        Some(Self {
            pixels: pixel_grid(buf, width, height),
            mode: ColorMode::Palette(palette),
            save_alpha: false,
        })
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.pixels.width() as u32
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.pixels.height() as u32
    }

    /// Storage mode
    pub fn mode(&self) -> &ColorMode {
        &self.mode
    }

    /// Returns true for truecolor bitmaps
    pub fn is_true_color(&self) -> bool {
        matches!(self.mode, ColorMode::TrueColor)
    }

    /// Packed pixel (or palette index) at `(x, y)`
    pub fn get_pixel(&self, x: u32, y: u32) -> u32 {
        self.pixels[(x as usize, y as usize)]
    }

    /// Store a packed pixel (or palette index) at `(x, y)`
    pub fn set_pixel(&mut self, x: u32, y: u32, px: u32) {
        self.pixels[(x as usize, y as usize)] = px;
    }

    /// Set every pixel to `px`
    pub fn fill(&mut self, px: u32) {
        self.pixels.buf_mut().fill(px);
    }

    /// Whether alpha should be kept when saving
    pub fn save_alpha(&self) -> bool {
        self.save_alpha
    }

    /// Mark the alpha channel as meaningful
    pub fn set_save_alpha(&mut self, save: bool) {
        self.save_alpha = save;
    }

    /// Borrow the pixels as an image buffer
    pub fn as_img(&self) -> &ImgVec<u32> {
        &self.pixels
    }
}

// imgref rejects a zero stride, so empty rows still get a stride of 1
fn pixel_grid(buf: Vec<u32>, width: u32, height: u32) -> ImgVec<u32> {
    let width = width as usize;
    ImgVec::new_stride(buf, width, height as usize, width.max(1))
}

fn alloc_pixels(width: u32, height: u32) -> Option<Vec<u32>> {
    let len = (width as usize).checked_mul(height as usize)?;
    let mut buf = Vec::new();
    buf.try_reserve_exact(len).ok()?;
    buf.resize(len, true_color_alpha(0, 0, 0, ALPHA_OPAQUE));
    Some(buf)
}

impl PixelSource for Bitmap {
    fn width(&self) -> u32 {
        Bitmap::width(self)
    }

    fn height(&self) -> u32 {
        Bitmap::height(self)
    }

    fn is_true_color(&self) -> bool {
        Bitmap::is_true_color(self)
    }

    fn get_pixel(&self, x: u32, y: u32) -> u32 {
        Bitmap::get_pixel(self, x, y)
    }
}

impl PixelSink for Bitmap {
    fn new_true_color(width: u32, height: u32) -> Option<Self> {
        Bitmap::new_true_color(width, height)
    }

    fn width(&self) -> u32 {
        Bitmap::width(self)
    }

    fn height(&self) -> u32 {
        Bitmap::height(self)
    }

    fn set_pixel(&mut self, x: u32, y: u32, px: u32) {
        Bitmap::set_pixel(self, x, y, px)
    }

    fn set_save_alpha(&mut self, save: bool) {
        Bitmap::set_save_alpha(self, save)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_and_unpack_channels() {
        let px = true_color_alpha(0x12, 0x34, 0x56, 0x7f);
        assert_eq!(px, 0x7f12_3456);
        assert_eq!(red(px), 0x12);
        assert_eq!(green(px), 0x34);
        assert_eq!(blue(px), 0x56);
        assert_eq!(alpha(px), 0x7f);
    }

    #[test]
    fn alpha_is_masked_to_seven_bits() {
        assert_eq!(alpha(true_color_alpha(0, 0, 0, 0xff)), 0x7f);
    }

    #[test]
    fn new_bitmap_is_opaque_black() {
        let bmp = Bitmap::new_true_color(3, 2).unwrap();
        assert_eq!(bmp.width(), 3);
        assert_eq!(bmp.height(), 2);
        assert!(bmp.is_true_color());
        assert!(!bmp.save_alpha());
        assert_eq!(bmp.get_pixel(2, 1), 0);
    }

    #[test]
    fn palette_bitmap_is_not_true_color() {
        let bmp = Bitmap::new_palette(1, 1, vec![Rgba::new(0, 0, 0, 255)]).unwrap();
        assert!(!bmp.is_true_color());
    }

    #[test]
    fn zero_sized_bitmaps_hold_no_pixels() {
        for (w, h) in [(0, 5), (5, 0), (0, 0)] {
            let mut bmp = Bitmap::new_true_color(w, h).unwrap();
            assert_eq!((bmp.width(), bmp.height()), (w, h));
            bmp.fill(true_color_alpha(1, 2, 3, 0));
            assert!(Bitmap::new_palette(w, h, Vec::new()).is_some());
        }
    }

    #[test]
    fn oversized_allocation_fails() {
        assert!(Bitmap::new_true_color(u32::MAX, u32::MAX).is_none());
    }
}
