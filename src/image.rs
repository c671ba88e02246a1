//! Sample buffers exchanged with the codec engine

use crate::error::{CodecError, CodecResult};

/// Chroma subsampling format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChromaSampling {
    /// 4:2:0 - chroma is half resolution in both dimensions
    Cs420,
    /// 4:2:2 - chroma is half resolution horizontally
    Cs422,
    /// 4:4:4 - no chroma subsampling
    Cs444,
    /// Monochrome (no chroma)
    Monochrome,
}

impl ChromaSampling {
    /// Size of each chroma plane for a `width` x `height` luma plane
    pub fn chroma_size(self, width: usize, height: usize) -> (usize, usize) {
        match self {
            ChromaSampling::Cs444 => (width, height),
            ChromaSampling::Cs422 => (width.div_ceil(2), height),
            ChromaSampling::Cs420 => (width.div_ceil(2), height.div_ceil(2)),
            ChromaSampling::Monochrome => (0, 0),
        }
    }
}

/// Matrix coefficients for YUV to RGB conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatrixCoefficients(pub u8);

impl MatrixCoefficients {
    pub const IDENTITY: Self = Self(0);
    pub const BT709: Self = Self(1);
    pub const UNKNOWN: Self = Self(2);
    pub const FCC: Self = Self(4);
    pub const BT470BG: Self = Self(5);
    pub const BT601: Self = Self(6);
    pub const SMPTE240: Self = Self(7);
    pub const YCGCO: Self = Self(8);
    pub const BT2020_NCL: Self = Self(9);
    pub const BT2020_CL: Self = Self(10);
}

/// Color range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorRange {
    /// Limited/studio range (Y: 16-235, UV: 16-240 for 8-bit)
    #[default]
    Limited,
    /// Full range (0-255 for 8-bit)
    Full,
}

/// Validate a sample depth, returning bytes per sample
pub(crate) fn bytes_per_sample(depth: u8) -> CodecResult<usize> {
    match depth {
        8 => Ok(1),
        10 | 12 | 16 => Ok(2),
        other => Err(CodecError::UnsupportedDepth(other)),
    }
}

/// Allocate a zeroed sample vector, reporting failure instead of aborting
pub(crate) fn try_alloc<T: Copy + Default>(len: usize) -> CodecResult<Vec<T>> {
    let mut v = Vec::new();
    v.try_reserve_exact(len).map_err(|_| CodecError::OutOfMemory)?;
    v.resize(len, T::default());
    Ok(v)
}

/// Interleaved samples; two bytes wide above 8 bits
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Samples {
    /// One byte per sample
    Depth8(Vec<u8>),
    /// One native-endian `u16` per sample (10, 12 or 16 significant bits)
    Depth16(Vec<u16>),
}

/// Interleaved RGBA sample buffer
///
/// Every row holds `width * 4` samples followed by padding up to
/// `row_bytes`. Samples are `u8` at depth 8 and `u16` above it.
#[derive(Debug, Clone)]
pub struct RgbImage {
    width: u32,
    height: u32,
    depth: u8,
    row_bytes: usize,
    samples: Samples,
}

impl RgbImage {
    /// Allocate a zeroed, tightly packed RGBA buffer
    pub fn allocate(width: u32, height: u32, depth: u8) -> CodecResult<Self> {
        let bps = bytes_per_sample(depth)?;
        let row_samples = (width as usize)
            .checked_mul(4)
            .ok_or(CodecError::OutOfMemory)?;
        let len = row_samples
            .checked_mul(height as usize)
            .ok_or(CodecError::OutOfMemory)?;
        let samples = if bps == 1 {
            Samples::Depth8(try_alloc(len)?)
        } else {
            Samples::Depth16(try_alloc(len)?)
        };
        Ok(Self {
            width,
            height,
            depth,
            row_bytes: row_samples * bps,
            samples,
        })
    }

    /// Width in pixels
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bits per sample: 8, 10, 12 or 16
    pub fn depth(&self) -> u8 {
        self.depth
    }

    /// Bytes from the start of one row to the next
    pub fn row_bytes(&self) -> usize {
        self.row_bytes
    }

    /// Samples from the start of one row to the next
    pub fn stride(&self) -> usize {
        match self.samples {
            Samples::Depth8(_) => self.row_bytes,
            Samples::Depth16(_) => self.row_bytes / 2,
        }
    }

    /// Sample storage
    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// Mutable sample storage
    pub fn samples_mut(&mut self) -> &mut Samples {
        &mut self.samples
    }
}

/// Y, U and V planes, each tightly packed at its own width
#[derive(Debug, Clone)]
pub struct YuvPlanes<T> {
    pub y: Vec<T>,
    pub u: Vec<T>,
    pub v: Vec<T>,
    pub y_stride: usize,
    pub uv_stride: usize,
}

/// Planes of a frame, by storage width
#[derive(Debug, Clone)]
pub enum FramePlanes {
    /// 8-bit samples
    Depth8(YuvPlanes<u8>),
    /// 10, 12 or 16-bit samples
    Depth16(YuvPlanes<u16>),
}

/// Alpha plane attached to a frame, tightly packed at frame width
#[derive(Debug, Clone)]
pub struct AlphaPlane {
    /// Bits per sample
    pub depth: u8,
    /// Range the alpha samples were coded in
    pub range: ColorRange,
    /// Samples; `Depth16` above 8 bits
    pub samples: Samples,
}

/// A frame in the codec's YUV representation
#[derive(Debug, Clone)]
pub struct YuvImage {
    pub width: u32,
    pub height: u32,
    pub depth: u8,
    pub sampling: ChromaSampling,
    pub range: ColorRange,
    pub matrix: MatrixCoefficients,
    pub planes: FramePlanes,
    pub alpha: Option<AlphaPlane>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eight_bit_buffer_uses_one_byte_per_sample() {
        let img = RgbImage::allocate(3, 2, 8).unwrap();
        assert_eq!(img.row_bytes(), 12);
        assert_eq!(img.stride(), 12);
        assert!(matches!(img.samples(), Samples::Depth8(v) if v.len() == 24));
    }

    #[test]
    fn deep_buffer_uses_two_bytes_per_sample() {
        for depth in [10, 12, 16] {
            let img = RgbImage::allocate(3, 2, depth).unwrap();
            assert_eq!(img.row_bytes(), 24);
            assert_eq!(img.stride(), 12);
            assert!(matches!(img.samples(), Samples::Depth16(v) if v.len() == 24));
        }
    }

    #[test]
    fn odd_depths_are_rejected() {
        assert!(matches!(
            RgbImage::allocate(1, 1, 9),
            Err(CodecError::UnsupportedDepth(9))
        ));
    }

    #[test]
    fn chroma_sizes_round_up() {
        assert_eq!(ChromaSampling::Cs420.chroma_size(5, 3), (3, 2));
        assert_eq!(ChromaSampling::Cs422.chroma_size(5, 3), (3, 3));
        assert_eq!(ChromaSampling::Cs444.chroma_size(5, 3), (5, 3));
        assert_eq!(ChromaSampling::Monochrome.chroma_size(5, 3), (0, 0));
    }
}
