//! # zenavif-bridge
//!
//! Convert between packed truecolor bitmaps and AVIF, powered by
//! [rav1d](https://github.com/memorysafety/rav1d) for decoding and
//! [rav1e](https://github.com/xiph/rav1e) for encoding.
//!
//! Bitmap pixels are packed `u32` values (`alpha << 24 | r << 16 | g << 8 | b`)
//! with 7-bit inverted alpha: 0 is opaque, 127 fully transparent. The bridge
//! maps that alpha onto AVIF's 8-bit alpha in both directions.
//!
//! ## Quick Start
//!
//! ```no_run
//! use zenavif_bridge::{decode, encode_to_vec, Quality, SPEED_DEFAULT};
//!
//! let avif_data = std::fs::read("image.avif").unwrap();
//! let bitmap = decode(&avif_data).unwrap();
//! println!("{}x{}", bitmap.width(), bitmap.height());
//!
//! let reencoded = encode_to_vec(&bitmap, Quality::Value(80), SPEED_DEFAULT).unwrap();
//! std::fs::write("out.avif", reencoded).unwrap();
//! ```
//!
//! ## Byte sources and bitmaps
//!
//! Decoding reads through any [`ByteProvider`] (memory buffers and
//! `Read + Seek` streams are built in), and can populate any [`PixelSink`].
//! Encoding reads from any [`PixelSource`] and writes to any
//! [`std::io::Write`]. The in-crate [`Bitmap`] implements both pixel traits.
//!
//! ```no_run
//! use zenavif_bridge::{decode_with, Bitmap, DecoderConfig, StreamContext};
//!
//! let file = std::fs::File::open("image.avif").unwrap();
//! let config = DecoderConfig::new()
//!     .threads(4)
//!     .frame_size_limit(8192 * 8192);
//! let bitmap: Bitmap = decode_with(StreamContext::new(file), &config).unwrap();
//! ```
//!
//! ## Features
//!
//! - **`encode`** (default): AVIF encoding via rav1e and avif-serialize
//! - **`encode-asm`**: rav1e with hand-written assembly
//! - **`encode-threading`**: let rav1e use the derived per-tile thread count

mod bitmap;
mod config;
mod convert;
mod decoder;
#[cfg(feature = "encode")]
mod encoder;
mod error;
mod image;
mod io;
mod params;
mod pipeline;
mod yuv_convert;

pub use bitmap::{
    ALPHA_MAX, ALPHA_OPAQUE, Bitmap, ColorMode, PixelSink, PixelSource, alpha, blue, green, red,
    true_color_alpha,
};
pub use config::DecoderConfig;
pub use convert::{
    alpha7_to_alpha8, alpha8_to_alpha7, has_translucency, pack_rgba8, scale_to_u8, unpack_rgba,
};
pub use decoder::Decoder;
#[cfg(feature = "encode")]
pub use encoder::{ENGINE_DEFAULT_SPEED, Encoder, av1_quantizer, speed_preset};
pub use error::{CodecError, CodecResult, Error, Result};
pub use image::{
    AlphaPlane, ChromaSampling, ColorRange, FramePlanes, MatrixCoefficients, RgbImage, Samples,
    YuvImage, YuvPlanes,
};
pub use io::{AvifIo, ByteProvider, ContextIo, MemoryContext, StreamContext};
pub use params::{
    EncodeSettings, HIGH_QUALITY_SUBSAMPLING_THRESHOLD, MAX_QUALITY, MAX_THREADS, MAX_TILES,
    MIN_TILE_AREA, QUANTIZER_BEST, QUANTIZER_DEFAULT, QUANTIZER_WORST, Quality, SPEED_DEFAULT,
    SPEED_FASTEST, SPEED_SLOWEST, TileLayout, chroma_sampling_for, quality_to_quantizer,
};
pub use pipeline::{DecodeState, EncodeState};
pub use yuv_convert::{rgb_to_yuv, yuv_to_rgb};

use std::io::{Read, Seek};

/// Decode an AVIF image held in memory
///
/// # Example
///
/// ```no_run
/// let avif_data = std::fs::read("image.avif").unwrap();
/// let bitmap = zenavif_bridge::decode(&avif_data).unwrap();
/// assert!(bitmap.save_alpha());
/// ```
pub fn decode(data: &[u8]) -> Result<Bitmap> {
    decode_from(MemoryContext::new(data))
}

/// Decode an AVIF image from a seekable reader such as a file
pub fn decode_reader<R: Read + Seek>(reader: R) -> Result<Bitmap> {
    decode_from(StreamContext::new(reader))
}

/// Decode an AVIF image from any byte provider with default settings
pub fn decode_from<P: ByteProvider>(provider: P) -> Result<Bitmap> {
    decode_with(provider, &DecoderConfig::default())
}

/// Decode the first frame of an AVIF image into a new bitmap
///
/// The provider is closed exactly once, on success and on every failure.
/// On failure no bitmap is returned.
///
/// # Arguments
///
/// * `provider` - Source of the AVIF bytes
/// * `config` - Decoder configuration
pub fn decode_with<P, B>(provider: P, config: &DecoderConfig) -> Result<B>
where
    P: ByteProvider,
    B: PixelSink,
{
    pipeline::decode_pipeline(provider, config)
}

/// Encode a truecolor bitmap as AVIF and write it to `sink`
///
/// `quality` runs from 0 (worst) to 100 (best); `-1` or
/// [`Quality::Default`] selects the default quantizer. `speed` runs from
/// [`SPEED_SLOWEST`] to [`SPEED_FASTEST`], or [`SPEED_DEFAULT`].
///
/// Nothing is written to `sink` if encoding fails. Palette bitmaps fail
/// with [`Error::UnsupportedFormat`].
///
/// # Example
///
/// ```
/// use zenavif_bridge::{Bitmap, encode_to, true_color_alpha, SPEED_FASTEST};
///
/// let mut bitmap = Bitmap::new_true_color(16, 16).unwrap();
/// bitmap.fill(true_color_alpha(255, 128, 0, 0));
///
/// let mut out = Vec::new();
/// encode_to(&bitmap, 80, SPEED_FASTEST, &mut out).unwrap();
/// assert!(!out.is_empty());
/// ```
#[cfg(feature = "encode")]
pub fn encode_to<S, W>(bitmap: &S, quality: impl Into<Quality>, speed: i32, sink: &mut W) -> Result<()>
where
    S: PixelSource + ?Sized,
    W: std::io::Write + ?Sized,
{
    pipeline::encode_pipeline(bitmap, quality.into(), speed, sink)
}

/// Encode a truecolor bitmap as AVIF into a new buffer
#[cfg(feature = "encode")]
pub fn encode_to_vec<S>(bitmap: &S, quality: impl Into<Quality>, speed: i32) -> Result<Vec<u8>>
where
    S: PixelSource + ?Sized,
{
    let mut out = Vec::new();
    encode_to(bitmap, quality, speed, &mut out)?;
    Ok(out)
}

/// Encode a truecolor bitmap as AVIF with default quality and speed
#[cfg(feature = "encode")]
pub fn encode<S: PixelSource + ?Sized>(bitmap: &S) -> Result<Vec<u8>> {
    encode_to_vec(bitmap, Quality::Default, SPEED_DEFAULT)
}
