//! Pixel bridge between packed truecolor bitmaps and interleaved RGBA samples,
//! alpha remapping, and bit depth scaling

use crate::bitmap::{ALPHA_MAX, PixelSink, PixelSource, alpha, blue, green, red, true_color_alpha};
use crate::error::{CodecError, Error, Result};
use crate::image::{RgbImage, Samples};
use whereat::at;

/// Map the bitmap's 7-bit inverted alpha (0 opaque, 127 transparent) onto
/// 8-bit alpha (255 opaque, 0 transparent).
///
/// 127 maps to exactly 0. Everything else is expanded by bit replication and
/// inverted: `255 - ((a << 1) | (a >> 6))`.
#[inline]
pub const fn alpha7_to_alpha8(a: u8) -> u8 {
    let a = a & 0x7f;
    if a == ALPHA_MAX {
        0
    } else {
        255 - ((a << 1) | (a >> 6))
    }
}

/// Map 8-bit alpha back onto the bitmap's 7-bit inverted alpha
#[inline]
pub const fn alpha8_to_alpha7(a: u8) -> u8 {
    ALPHA_MAX - (a >> 1)
}

/// Rescale a sample of `bit_depth` bits to 8 bits, rounding to nearest.
///
/// 0 maps to 0 and the depth's maximum maps to 255.
#[inline]
pub fn scale_to_u8(v: u16, bit_depth: u8) -> u8 {
    if bit_depth <= 8 {
        return v.min(255) as u8;
    }
    let max = (1u32 << bit_depth) - 1;
    let v = (v as u32).min(max);
    ((v * 255 + max / 2) / max) as u8
}

/// Scale a limited-range Y value to full range (8-bit)
#[inline]
pub(crate) fn limited_to_full_8(y: u8) -> u8 {
    // Limited range: Y ∈ [16, 235]
    // Full range: Y ∈ [0, 255]
    ((u32::from(y.saturating_sub(16)) * 255 + 109) / 219).min(255) as u8
}

/// Scale a limited-range Y value to full range (16-bit, given bit depth)
#[inline]
pub(crate) fn limited_to_full_16(y: u16, bit_depth: u8) -> u16 {
    let max_val = (1u32 << bit_depth) - 1;
    let y_min = 16u32 << (bit_depth - 8);
    let y_range = 219u32 << (bit_depth - 8);
    let y32 = y as u32;
    ((y32.saturating_sub(y_min)) * max_val / y_range).min(max_val) as u16
}

/// Pack a truecolor bitmap into an 8-bit RGBA sample buffer
///
/// Palette bitmaps are rejected before any pixel is read.
pub fn pack_rgba8<S: PixelSource + ?Sized>(src: &S) -> Result<RgbImage> {
    if !src.is_true_color() {
        return Err(at(Error::UnsupportedFormat(
            "palette images must be converted to truecolor before encoding",
        )));
    }

    let (width, height) = (src.width(), src.height());
    if width == 0 || height == 0 {
        return Err(at(Error::InvalidDimensions { width, height }));
    }

    let mut rgb = RgbImage::allocate(width, height, 8).map_err(|e| at(alloc_error(e)))?;
    let stride = rgb.stride();
    let Samples::Depth8(buf) = rgb.samples_mut() else {
        return Err(at(Error::Encode(CodecError::UnsupportedDepth(8))));
    };

    for (y, row) in buf.chunks_exact_mut(stride).enumerate() {
        for (x, out) in row[..width as usize * 4].chunks_exact_mut(4).enumerate() {
            let px = src.get_pixel(x as u32, y as u32);
            out[0] = red(px);
            out[1] = green(px);
            out[2] = blue(px);
            out[3] = alpha7_to_alpha8(alpha(px));
        }
    }

    Ok(rgb)
}

/// Unpack an RGBA sample buffer into a newly allocated truecolor bitmap
///
/// Samples deeper than 8 bits are rescaled with [`scale_to_u8`]. The
/// bitmap's alpha flag is always set.
pub fn unpack_rgba<B: PixelSink>(rgb: &RgbImage) -> Result<B> {
    let (width, height) = (rgb.width(), rgb.height());
    let mut bitmap =
        B::new_true_color(width, height).ok_or_else(|| at(Error::OutOfMemory("bitmap")))?;
    debug_assert_eq!((bitmap.width(), bitmap.height()), (width, height));

    let stride = rgb.stride();
    let row_samples = width as usize * 4;
    match rgb.samples() {
        Samples::Depth8(buf) => {
            for (y, row) in buf.chunks(stride).take(height as usize).enumerate() {
                for (x, px) in row[..row_samples].chunks_exact(4).enumerate() {
                    let packed =
                        true_color_alpha(px[0], px[1], px[2], alpha8_to_alpha7(px[3]));
                    bitmap.set_pixel(x as u32, y as u32, packed);
                }
            }
        }
        Samples::Depth16(buf) => {
            let depth = rgb.depth();
            for (y, row) in buf.chunks(stride).take(height as usize).enumerate() {
                for (x, px) in row[..row_samples].chunks_exact(4).enumerate() {
                    let [r, g, b, a] = [px[0], px[1], px[2], px[3]].map(|v| scale_to_u8(v, depth));
                    bitmap.set_pixel(
                        x as u32,
                        y as u32,
                        true_color_alpha(r, g, b, alpha8_to_alpha7(a)),
                    );
                }
            }
        }
    }

    bitmap.set_save_alpha(true);
    Ok(bitmap)
}

/// Returns true if any pixel of an 8-bit RGBA buffer is not fully opaque
pub fn has_translucency(rgb: &RgbImage) -> bool {
    let row_samples = rgb.width() as usize * 4;
    match rgb.samples() {
        Samples::Depth8(buf) => buf
            .chunks(rgb.stride())
            .take(rgb.height() as usize)
            .any(|row| row[..row_samples].chunks_exact(4).any(|px| px[3] != u8::MAX)),
        Samples::Depth16(buf) => {
            let max = ((1u32 << rgb.depth()) - 1) as u16;
            buf.chunks(rgb.stride())
                .take(rgb.height() as usize)
                .any(|row| row[..row_samples].chunks_exact(4).any(|px| px[3] != max))
        }
    }
}

fn alloc_error(e: CodecError) -> Error {
    match e {
        CodecError::OutOfMemory => Error::OutOfMemory("sample buffer"),
        other => Error::Encode(other),
    }
}
