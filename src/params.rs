//! Encoder parameter policy: quality to quantizer, tile and thread layout
//!
//! Everything here is a pure function of the public knobs and the image
//! dimensions, recomputed for every encode.

use crate::image::ChromaSampling;

/// Best (lossless-leaning) quantizer
pub const QUANTIZER_BEST: u8 = 0;
/// Worst quantizer
pub const QUANTIZER_WORST: u8 = 63;
/// Quantizer used when the caller asks for the default quality
pub const QUANTIZER_DEFAULT: u8 = 30;

/// Top of the public quality scale
pub const MAX_QUALITY: i32 = 100;

/// Quality at and above which chroma is kept at full resolution
pub const HIGH_QUALITY_SUBSAMPLING_THRESHOLD: i32 = 90;

/// Let the encoder pick its speed
pub const SPEED_DEFAULT: i32 = -1;
/// Slowest speed, best compression
pub const SPEED_SLOWEST: i32 = 0;
/// Fastest speed
pub const SPEED_FASTEST: i32 = 10;

/// Smallest area worth giving its own tile
pub const MIN_TILE_AREA: u64 = 512 * 512;
/// Upper bound on tiles per image
pub const MAX_TILES: u64 = 6;
/// Upper bound on encoder threads
pub const MAX_THREADS: u64 = 64;

/// Encoding quality, 0 (worst) to 100 (best)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    /// Use [`QUANTIZER_DEFAULT`]
    #[default]
    Default,
    /// Explicit quality; values outside 0..=100 are clamped
    Value(i32),
}

impl From<i32> for Quality {
    /// `-1` is the "use default" sentinel; every other value is explicit.
    fn from(q: i32) -> Self {
        if q == -1 {
            Quality::Default
        } else {
            Quality::Value(q)
        }
    }
}

/// Map public quality onto the quantizer scale (0 best, 63 worst)
///
/// The scales run in opposite directions: quality 100 is quantizer 0.
pub fn quality_to_quantizer(quality: Quality) -> u8 {
    match quality {
        Quality::Default => QUANTIZER_DEFAULT,
        Quality::Value(q) => {
            let clamped = q.clamp(0, MAX_QUALITY);
            let scale = QUANTIZER_WORST as f32 / MAX_QUALITY as f32;
            (scale * (MAX_QUALITY - clamped) as f32).round() as u8
        }
    }
}

/// Chroma subsampling for a quality setting
pub fn chroma_sampling_for(quality: Quality) -> ChromaSampling {
    match quality {
        Quality::Value(q) if q.clamp(0, MAX_QUALITY) >= HIGH_QUALITY_SUBSAMPLING_THRESHOLD => {
            ChromaSampling::Cs444
        }
        _ => ChromaSampling::Cs420,
    }
}

/// Tile split and thread count for one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileLayout {
    /// log2 of the number of tile rows
    pub tile_rows_log2: u8,
    /// log2 of the number of tile columns
    pub tile_cols_log2: u8,
    /// Encoder worker threads, one per tile
    pub threads: u32,
}

impl TileLayout {
    /// Compute the layout for a `width` x `height` image
    ///
    /// One tile per [`MIN_TILE_AREA`] pixels, capped by [`MAX_TILES`] and
    /// [`MAX_THREADS`]. The extra power of two goes to columns on wide
    /// images and to rows on tall ones.
    pub fn for_dimensions(width: u32, height: u32) -> Self {
        let area = u64::from(width) * u64::from(height);
        let tile_count = area
            .div_ceil(MIN_TILE_AREA)
            .min(MAX_TILES)
            .min(MAX_THREADS)
            .max(1);
        let tiles_log2 = tile_count.ilog2() as u8;

        let (tile_rows_log2, tile_cols_log2) = if width >= height {
            let rows = tiles_log2 / 2;
            (rows, tiles_log2 - rows)
        } else {
            let cols = tiles_log2 / 2;
            (tiles_log2 - cols, cols)
        };

        Self {
            tile_rows_log2,
            tile_cols_log2,
            threads: tile_count as u32,
        }
    }

    /// Number of tile rows
    pub fn tile_rows(&self) -> usize {
        1 << self.tile_rows_log2
    }

    /// Number of tile columns
    pub fn tile_cols(&self) -> usize {
        1 << self.tile_cols_log2
    }
}

/// Everything the encoder is configured with for one image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodeSettings {
    pub min_quantizer: u8,
    pub max_quantizer: u8,
    pub min_quantizer_alpha: u8,
    pub max_quantizer_alpha: u8,
    pub tiles: TileLayout,
    /// Passed through to the encoder untouched
    pub speed: i32,
    pub sampling: ChromaSampling,
}

impl EncodeSettings {
    /// Derive settings for a `width` x `height` image
    ///
    /// One quantizer is used as both bound for colour and alpha, so the
    /// encoder runs a single fixed-quality pass.
    pub fn derive(width: u32, height: u32, quality: Quality, speed: i32) -> Self {
        let quantizer = quality_to_quantizer(quality);
        Self {
            min_quantizer: quantizer,
            max_quantizer: quantizer,
            min_quantizer_alpha: quantizer,
            max_quantizer_alpha: quantizer,
            tiles: TileLayout::for_dimensions(width, height),
            speed,
            sampling: chroma_sampling_for(quality),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_endpoints() {
        assert_eq!(quality_to_quantizer(Quality::Value(100)), QUANTIZER_BEST);
        assert_eq!(quality_to_quantizer(Quality::Value(0)), QUANTIZER_WORST);
    }

    #[test]
    fn quality_rounds_to_nearest() {
        // 0.63 * 25 = 15.75
        assert_eq!(quality_to_quantizer(Quality::Value(75)), 16);
        // 0.63 * 10 = 6.3
        assert_eq!(quality_to_quantizer(Quality::Value(90)), 6);
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(
            quality_to_quantizer(Quality::Value(-5)),
            quality_to_quantizer(Quality::Value(0))
        );
        assert_eq!(
            quality_to_quantizer(Quality::Value(150)),
            quality_to_quantizer(Quality::Value(100))
        );
    }

    #[test]
    fn default_sentinel_uses_default_quantizer() {
        assert_eq!(Quality::from(-1), Quality::Default);
        assert_eq!(quality_to_quantizer(Quality::from(-1)), QUANTIZER_DEFAULT);
        assert_eq!(quality_to_quantizer(Quality::default()), QUANTIZER_DEFAULT);
        // other negatives are explicit and clamp to 0
        assert_eq!(Quality::from(-2), Quality::Value(-2));
    }

    #[test]
    fn square_megapixel_layout() {
        let layout = TileLayout::for_dimensions(1024, 1024);
        assert_eq!(layout.tile_rows_log2, 1);
        assert_eq!(layout.tile_cols_log2, 1);
        assert_eq!(layout.threads, 4);
        assert_eq!((layout.tile_rows(), layout.tile_cols()), (2, 2));
    }

    #[test]
    fn small_images_get_one_tile() {
        let layout = TileLayout::for_dimensions(100, 100);
        assert_eq!(layout, TileLayout { tile_rows_log2: 0, tile_cols_log2: 0, threads: 1 });
    }

    #[test]
    fn tile_count_is_capped() {
        // 4096 * 4096 / (512 * 512) = 64 tiles before capping
        let layout = TileLayout::for_dimensions(4096, 4096);
        assert_eq!(layout.threads, MAX_TILES as u32);
        // floor(log2(6)) = 2
        assert_eq!(layout.tile_rows_log2 + layout.tile_cols_log2, 2);
    }

    #[test]
    fn odd_exponent_favours_the_long_side() {
        // 2 tiles: log2 = 1
        let wide = TileLayout::for_dimensions(1024, 400);
        assert_eq!((wide.tile_rows_log2, wide.tile_cols_log2), (0, 1));
        let tall = TileLayout::for_dimensions(400, 1024);
        assert_eq!((tall.tile_rows_log2, tall.tile_cols_log2), (1, 0));
    }

    #[test]
    fn settings_use_one_quantizer_everywhere() {
        let s = EncodeSettings::derive(64, 64, Quality::Value(75), 6);
        assert_eq!(s.min_quantizer, 16);
        assert_eq!(s.max_quantizer, 16);
        assert_eq!(s.min_quantizer_alpha, 16);
        assert_eq!(s.max_quantizer_alpha, 16);
        assert_eq!(s.speed, 6);
        assert_eq!(s.sampling, ChromaSampling::Cs420);
    }

    #[test]
    fn high_quality_keeps_full_chroma() {
        assert_eq!(chroma_sampling_for(Quality::Value(90)), ChromaSampling::Cs444);
        assert_eq!(chroma_sampling_for(Quality::Value(150)), ChromaSampling::Cs444);
        assert_eq!(chroma_sampling_for(Quality::Value(89)), ChromaSampling::Cs420);
        assert_eq!(chroma_sampling_for(Quality::Default), ChromaSampling::Cs420);
    }
}
