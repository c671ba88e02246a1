//! Colour conversion between the codec's YUV planes and interleaved RGBA
//!
//! The matrix math lives in the `yuv` crate; this module picks the right
//! routine for the frame's depth and subsampling, and moves the alpha plane
//! in and out of the RGBA buffer.

use crate::convert::{has_translucency, limited_to_full_8, limited_to_full_16};
use crate::error::{CodecError, CodecResult};
use crate::image::{
    AlphaPlane, ChromaSampling, ColorRange, FramePlanes, MatrixCoefficients, RgbImage, Samples,
    YuvImage, YuvPlanes, try_alloc,
};
use std::fmt::Debug;
use yuv::{
    BufferStoreMut, YuvConversionMode, YuvGrayImage, YuvPlanarImage, YuvPlanarImageMut, YuvRange,
    YuvStandardMatrix,
};

fn yuv_range(range: ColorRange) -> YuvRange {
    match range {
        ColorRange::Full => YuvRange::Full,
        ColorRange::Limited => YuvRange::Limited,
    }
}

/// Matrix for a frame's coefficients; unsupported matrices fall back to BT.601
fn yuv_matrix(mc: MatrixCoefficients) -> YuvStandardMatrix {
    match mc {
        MatrixCoefficients::BT709 => YuvStandardMatrix::Bt709,
        MatrixCoefficients::BT601 | MatrixCoefficients::BT470BG | MatrixCoefficients::UNKNOWN => {
            YuvStandardMatrix::Bt601
        }
        MatrixCoefficients::BT2020_NCL | MatrixCoefficients::BT2020_CL => {
            YuvStandardMatrix::Bt2020
        }
        MatrixCoefficients::SMPTE240 => YuvStandardMatrix::Smpte240,
        other => {
            log::warn!(
                "matrix coefficients {} not supported, converting as BT.601",
                other.0
            );
            YuvStandardMatrix::Bt601
        }
    }
}

/// Convert a decoded frame to interleaved RGBA at the frame's depth
///
/// Alpha comes from the frame's alpha plane when it has one (expanded to
/// full range), otherwise every pixel is opaque.
pub fn yuv_to_rgb(frame: &YuvImage) -> CodecResult<RgbImage> {
    let mut rgb = RgbImage::allocate(frame.width, frame.height, frame.depth)?;
    let stride = rgb.stride() as u32;
    let range = yuv_range(frame.range);
    let matrix = yuv_matrix(frame.matrix);
    let (width, height) = (frame.width, frame.height);

    match (&frame.planes, rgb.samples_mut()) {
        (FramePlanes::Depth8(p), Samples::Depth8(out)) => {
            if frame.sampling == ChromaSampling::Monochrome {
                let gray = gray_image(p, width, height);
                yuv::yuv400_to_rgba(&gray, out, stride, range, matrix)?;
            } else {
                let planar = planar_image(p, width, height);
                match frame.sampling {
                    ChromaSampling::Cs420 => {
                        yuv::yuv420_to_rgba(&planar, out, stride, range, matrix)?
                    }
                    ChromaSampling::Cs422 => {
                        yuv::yuv422_to_rgba(&planar, out, stride, range, matrix)?
                    }
                    _ => yuv::yuv444_to_rgba(&planar, out, stride, range, matrix)?,
                }
            }
        }
        (FramePlanes::Depth16(p), Samples::Depth16(out)) => {
            if frame.sampling == ChromaSampling::Monochrome {
                let gray = gray_image(p, width, height);
                match frame.depth {
                    10 => yuv::y010_to_rgba10(&gray, out, stride, range, matrix)?,
                    12 => yuv::y012_to_rgba12(&gray, out, stride, range, matrix)?,
                    _ => yuv::y016_to_rgba16(&gray, out, stride, range, matrix)?,
                }
            } else {
                let planar = planar_image(p, width, height);
                match (frame.depth, frame.sampling) {
                    (10, ChromaSampling::Cs420) => {
                        yuv::i010_to_rgba10(&planar, out, stride, range, matrix)?
                    }
                    (10, ChromaSampling::Cs422) => {
                        yuv::i210_to_rgba10(&planar, out, stride, range, matrix)?
                    }
                    (10, _) => yuv::i410_to_rgba10(&planar, out, stride, range, matrix)?,
                    (12, ChromaSampling::Cs420) => {
                        yuv::i012_to_rgba12(&planar, out, stride, range, matrix)?
                    }
                    (12, ChromaSampling::Cs422) => {
                        yuv::i212_to_rgba12(&planar, out, stride, range, matrix)?
                    }
                    (12, _) => yuv::i412_to_rgba12(&planar, out, stride, range, matrix)?,
                    (_, ChromaSampling::Cs420) => {
                        yuv::i016_to_rgba16(&planar, out, stride, range, matrix)?
                    }
                    (_, ChromaSampling::Cs422) => {
                        yuv::i216_to_rgba16(&planar, out, stride, range, matrix)?
                    }
                    (_, _) => yuv::i416_to_rgba16(&planar, out, stride, range, matrix)?,
                }
            }
        }
        _ => return Err(CodecError::UnsupportedDepth(frame.depth)),
    }

    match &frame.alpha {
        Some(alpha) => apply_alpha(&mut rgb, alpha)?,
        None => fill_opaque(&mut rgb),
    }

    Ok(rgb)
}

fn gray_image<T: Copy + Debug>(p: &YuvPlanes<T>, width: u32, height: u32) -> YuvGrayImage<'_, T> {
    YuvGrayImage {
        y_plane: &p.y,
        y_stride: p.y_stride as u32,
        width,
        height,
    }
}

fn planar_image<T: Copy + Debug>(p: &YuvPlanes<T>, width: u32, height: u32) -> YuvPlanarImage<'_, T> {
    YuvPlanarImage {
        y_plane: &p.y,
        y_stride: p.y_stride as u32,
        u_plane: &p.u,
        u_stride: p.uv_stride as u32,
        v_plane: &p.v,
        v_stride: p.uv_stride as u32,
        width,
        height,
    }
}

fn fill_opaque(rgb: &mut RgbImage) {
    let max = ((1u32 << rgb.depth()) - 1) as u16;
    match rgb.samples_mut() {
        Samples::Depth8(buf) => buf.chunks_exact_mut(4).for_each(|px| px[3] = u8::MAX),
        Samples::Depth16(buf) => buf.chunks_exact_mut(4).for_each(|px| px[3] = max),
    }
}

/// Rescale `v` from `from` bits to `to` bits, rounding to nearest
fn rescale(v: u16, from: u8, to: u8) -> u16 {
    if from == to {
        return v;
    }
    let src_max = (1u32 << from) - 1;
    let dst_max = (1u32 << to) - 1;
    ((u32::from(v).min(src_max) * dst_max + src_max / 2) / src_max) as u16
}

/// Write a frame's alpha plane into the alpha channel of `rgb`
fn apply_alpha(rgb: &mut RgbImage, alpha: &AlphaPlane) -> CodecResult<()> {
    let pixels = rgb.width() as usize * rgb.height() as usize;
    let depth = rgb.depth();
    let limited = alpha.range == ColorRange::Limited;

    let expected = match &alpha.samples {
        Samples::Depth8(a) => a.len(),
        Samples::Depth16(a) => a.len(),
    };
    if expected != pixels {
        return Err(CodecError::Decode {
            code: -1,
            msg: "alpha plane size does not match the colour image",
        });
    }

    match (rgb.samples_mut(), &alpha.samples) {
        (Samples::Depth8(buf), Samples::Depth8(a)) => {
            for (px, &a) in buf.chunks_exact_mut(4).zip(a) {
                px[3] = if limited { limited_to_full_8(a) } else { a };
            }
        }
        (Samples::Depth16(buf), Samples::Depth8(a)) => {
            for (px, &a) in buf.chunks_exact_mut(4).zip(a) {
                let a = if limited { limited_to_full_8(a) } else { a };
                px[3] = rescale(u16::from(a), 8, depth);
            }
        }
        (Samples::Depth16(buf), Samples::Depth16(a)) => {
            for (px, &a) in buf.chunks_exact_mut(4).zip(a) {
                let a = if limited {
                    limited_to_full_16(a, alpha.depth)
                } else {
                    a
                };
                px[3] = rescale(a, alpha.depth, depth);
            }
        }
        (Samples::Depth8(buf), Samples::Depth16(a)) => {
            for (px, &a) in buf.chunks_exact_mut(4).zip(a) {
                let a = if limited {
                    limited_to_full_16(a, alpha.depth)
                } else {
                    a
                };
                px[3] = rescale(a, alpha.depth, 8) as u8;
            }
        }
    }
    Ok(())
}

/// Convert an 8-bit RGBA buffer to full-range BT.601 YUV planes
///
/// An alpha plane is attached only if some pixel is not fully opaque.
pub fn rgb_to_yuv(rgb: &RgbImage, sampling: ChromaSampling) -> CodecResult<YuvImage> {
    let Samples::Depth8(src) = rgb.samples() else {
        return Err(CodecError::UnsupportedDepth(rgb.depth()));
    };
    let (width, height) = (rgb.width(), rgb.height());
    let (w, h) = (width as usize, height as usize);
    let (cw, ch) = sampling.chroma_size(w, h);

    let mut y = try_alloc::<u8>(w * h)?;
    let mut u = try_alloc::<u8>(cw * ch)?;
    let mut v = try_alloc::<u8>(cw * ch)?;

    {
        let mut planar = YuvPlanarImageMut {
            y_plane: BufferStoreMut::Borrowed(&mut y),
            y_stride: width,
            u_plane: BufferStoreMut::Borrowed(&mut u),
            u_stride: cw as u32,
            v_plane: BufferStoreMut::Borrowed(&mut v),
            v_stride: cw as u32,
            width,
            height,
        };
        let stride = rgb.stride() as u32;
        let (range, matrix, mode) = (
            YuvRange::Full,
            YuvStandardMatrix::Bt601,
            YuvConversionMode::Balanced,
        );
        match sampling {
            ChromaSampling::Cs420 => {
                yuv::rgba_to_yuv420(&mut planar, src, stride, range, matrix, mode)?
            }
            ChromaSampling::Cs422 => {
                yuv::rgba_to_yuv422(&mut planar, src, stride, range, matrix, mode)?
            }
            ChromaSampling::Cs444 => {
                yuv::rgba_to_yuv444(&mut planar, src, stride, range, matrix, mode)?
            }
            ChromaSampling::Monochrome => {
                return Err(CodecError::InvalidConfig(
                    "monochrome output is not supported".into(),
                ));
            }
        }
    }

    let alpha = if has_translucency(rgb) {
        let mut a = try_alloc::<u8>(w * h)?;
        for (row, out) in src.chunks(rgb.stride()).zip(a.chunks_exact_mut(w)) {
            for (px, dst) in row[..w * 4].chunks_exact(4).zip(out) {
                *dst = px[3];
            }
        }
        Some(AlphaPlane {
            depth: 8,
            range: ColorRange::Full,
            samples: Samples::Depth8(a),
        })
    } else {
        None
    };

    Ok(YuvImage {
        width,
        height,
        depth: 8,
        sampling,
        range: ColorRange::Full,
        matrix: MatrixCoefficients::BT601,
        planes: FramePlanes::Depth8(YuvPlanes {
            y,
            u,
            v,
            y_stride: w,
            uv_stride: cw,
        }),
        alpha,
    })
}
