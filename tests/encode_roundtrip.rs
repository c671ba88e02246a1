//! Roundtrip encode/decode tests for the encode feature

#![cfg(feature = "encode")]

use rgb::Rgba;
use zenavif_bridge::{
    ALPHA_MAX, ALPHA_OPAQUE, Bitmap, CodecError, Error, MemoryContext, PixelSource, Quality,
    SPEED_FASTEST, alpha, blue, decode, decode_from, encode, encode_to, encode_to_vec, green, red,
    true_color_alpha,
};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// 32x24 opaque gradient
fn make_gradient() -> Bitmap {
    let mut bitmap = Bitmap::new_true_color(32, 24).expect("allocation");
    for y in 0..24 {
        for x in 0..32 {
            let px = true_color_alpha((x * 8) as u8, (y * 10) as u8, 128, ALPHA_OPAQUE);
            bitmap.set_pixel(x, y, px);
        }
    }
    bitmap
}

fn assert_close(a: u8, b: u8, tolerance: u8, what: &str) {
    assert!(
        a.abs_diff(b) <= tolerance,
        "{what}: expected {a}, got {b} (tolerance {tolerance})"
    );
}

#[test]
fn roundtrip_opaque_best_quality() {
    init_logger();
    let src = make_gradient();
    let encoded = encode_to_vec(&src, 100, SPEED_FASTEST).expect("encode should succeed");
    assert!(!encoded.is_empty());

    let decoded = decode(&encoded).expect("decode should succeed");
    assert_eq!((decoded.width(), decoded.height()), (32, 24));
    assert!(decoded.is_true_color());
    assert!(decoded.save_alpha());

    for y in 0..24 {
        for x in 0..32 {
            let (want, got) = (src.get_pixel(x, y), decoded.get_pixel(x, y));
            assert_close(red(want), red(got), 6, "red");
            assert_close(green(want), green(got), 6, "green");
            assert_close(blue(want), blue(got), 6, "blue");
            assert_eq!(alpha(got), ALPHA_OPAQUE, "opaque pixel at {x},{y}");
        }
    }
}

#[test]
fn roundtrip_translucent_keeps_alpha() {
    init_logger();
    let mut src = Bitmap::new_true_color(16, 16).expect("allocation");
    for y in 0..16 {
        for x in 0..16 {
            let a = if x < 8 { 64 } else { ALPHA_MAX };
            src.set_pixel(x, y, true_color_alpha(200, 40, 90, a));
        }
    }

    let encoded = encode_to_vec(&src, 100, SPEED_FASTEST).expect("encode should succeed");
    let decoded = decode(&encoded).expect("decode should succeed");

    assert_close(64, alpha(decoded.get_pixel(2, 5)), 2, "half transparent");
    assert_close(ALPHA_MAX, alpha(decoded.get_pixel(12, 5)), 2, "transparent");
}

#[test]
fn default_quality_roundtrip_is_approximate() {
    init_logger();
    let mut src = Bitmap::new_true_color(64, 64).expect("allocation");
    src.fill(true_color_alpha(30, 160, 220, ALPHA_OPAQUE));

    let encoded = encode(&src).expect("encode should succeed");
    let decoded = decode_from(MemoryContext::from_vec(encoded)).expect("decode should succeed");

    let px = decoded.get_pixel(32, 32);
    assert_close(30, red(px), 12, "red");
    assert_close(160, green(px), 12, "green");
    assert_close(220, blue(px), 12, "blue");
}

#[test]
fn quality_sentinel_matches_default() {
    let mut src = Bitmap::new_true_color(8, 8).expect("allocation");
    src.fill(true_color_alpha(10, 20, 30, ALPHA_OPAQUE));

    let a = encode_to_vec(&src, -1, SPEED_FASTEST).expect("encode");
    let b = encode_to_vec(&src, Quality::Default, SPEED_FASTEST).expect("encode");
    assert_eq!(a, b);
}

#[test]
fn odd_dimensions_survive() {
    let mut src = Bitmap::new_true_color(7, 5).expect("allocation");
    src.fill(true_color_alpha(90, 90, 90, ALPHA_OPAQUE));

    let encoded = encode_to_vec(&src, 50, SPEED_FASTEST).expect("encode");
    let decoded = decode(&encoded).expect("decode");
    assert_eq!((decoded.width(), decoded.height()), (7, 5));
}

#[test]
fn palette_bitmap_is_rejected_and_sink_untouched() {
    let palette = vec![Rgba::new(0, 0, 0, 255), Rgba::new(255, 255, 255, 255)];
    let src = Bitmap::new_palette(4, 4, palette).expect("allocation");

    let mut sink = Vec::new();
    let err = encode_to(&src, 80, SPEED_FASTEST, &mut sink).unwrap_err();
    assert!(matches!(err.into_inner(), Error::UnsupportedFormat(_)));
    assert!(sink.is_empty());
}

/// Palette source that must never have a pixel read
struct UntouchablePalette;

impl PixelSource for UntouchablePalette {
    fn width(&self) -> u32 {
        4
    }
    fn height(&self) -> u32 {
        4
    }
    fn is_true_color(&self) -> bool {
        false
    }
    fn get_pixel(&self, _x: u32, _y: u32) -> u32 {
        panic!("palette pixels must not be read");
    }
}

#[test]
fn palette_rejection_happens_before_pixel_access() {
    let err = encode(&UntouchablePalette).unwrap_err();
    assert!(matches!(err.into_inner(), Error::UnsupportedFormat(_)));
}

#[test]
fn empty_bitmap_is_rejected() {
    for (w, h) in [(0, 0), (0, 5), (5, 0)] {
        let src = Bitmap::new_true_color(w, h).expect("allocation");
        let mut sink = Vec::new();
        let err = encode_to(&src, 80, SPEED_FASTEST, &mut sink).unwrap_err();
        assert!(
            matches!(err.into_inner(), Error::InvalidDimensions { width, height } if (width, height) == (w, h))
        );
        assert!(sink.is_empty());
    }
}

#[test]
fn oversized_width_is_rejected_by_encoder_configuration() {
    let mut src = Bitmap::new_true_color(70_000, 1).expect("allocation");
    src.fill(true_color_alpha(1, 2, 3, ALPHA_OPAQUE));

    let mut sink = Vec::new();
    let err = encode_to(&src, 50, SPEED_FASTEST, &mut sink).unwrap_err();
    assert!(matches!(
        err.into_inner(),
        Error::Encode(CodecError::InvalidConfig(_))
    ));
    assert!(sink.is_empty());
}
