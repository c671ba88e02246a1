//! Byte context handling during decode: close-once semantics and error
//! categories

use std::cell::Cell;
use std::io::{self, Cursor};
use std::rc::Rc;
use zenavif_bridge::{
    Bitmap, ByteProvider, DecoderConfig, Error, MemoryContext, decode,
    decode_reader, decode_with,
};

/// Memory provider that counts closes and can be told to fail
struct CountingContext {
    inner: MemoryContext<'static>,
    closes: Rc<Cell<u32>>,
    fail_seek: bool,
    fail_read: bool,
}

impl CountingContext {
    fn new(data: Vec<u8>, closes: Rc<Cell<u32>>) -> Self {
        Self {
            inner: MemoryContext::from_vec(data),
            closes,
            fail_seek: false,
            fail_read: false,
        }
    }
}

impl ByteProvider for CountingContext {
    fn seek(&mut self, pos: u64) -> bool {
        !self.fail_seek && self.inner.seek(pos)
    }

    fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.fail_read {
            return Err(io::Error::other("device unplugged"));
        }
        self.inner.read_into(buf)
    }

    fn close(&mut self) {
        self.closes.set(self.closes.get() + 1);
    }
}

fn decode_counted(ctx: CountingContext) -> zenavif_bridge::Result<Bitmap> {
    decode_with(ctx, &DecoderConfig::default())
}

#[test]
fn failed_seek_is_io_error_and_closes_once() {
    let closes = Rc::new(Cell::new(0));
    let mut ctx = CountingContext::new(vec![0u8; 64], closes.clone());
    ctx.fail_seek = true;

    let err = decode_counted(ctx).unwrap_err();
    assert!(matches!(err.into_inner(), Error::Io(_)));
    assert_eq!(closes.get(), 1);
}

#[test]
fn failed_read_is_io_error_and_closes_once() {
    let closes = Rc::new(Cell::new(0));
    let mut ctx = CountingContext::new(vec![0u8; 64], closes.clone());
    ctx.fail_read = true;

    let err = decode_counted(ctx).unwrap_err();
    assert!(matches!(err.into_inner(), Error::Io(_)));
    assert_eq!(closes.get(), 1);
}

#[test]
fn garbage_is_parse_error_and_closes_once() {
    let closes = Rc::new(Cell::new(0));
    let ctx = CountingContext::new(b"definitely not an avif file".to_vec(), closes.clone());

    let err = decode_counted(ctx).unwrap_err();
    assert!(matches!(err.into_inner(), Error::Parse(_)));
    assert_eq!(closes.get(), 1);
}

#[test]
fn empty_input_is_parse_error() {
    let err = decode(&[]).unwrap_err();
    assert!(matches!(err.into_inner(), Error::Parse(_)));
}

#[test]
fn stream_context_reports_parse_error() {
    let err = decode_reader(Cursor::new(vec![0xffu8; 300])).unwrap_err();
    assert!(matches!(err.into_inner(), Error::Parse(_)));
}

#[test]
fn borrowed_provider_is_closed_through_the_borrow() {
    let closes = Rc::new(Cell::new(0));
    let mut ctx = CountingContext::new(vec![1, 2, 3], closes.clone());

    let result: zenavif_bridge::Result<Bitmap> = decode_with(&mut ctx, &DecoderConfig::new());
    assert!(result.is_err());
    assert_eq!(closes.get(), 1);
}

#[cfg(feature = "encode")]
mod with_encoder {
    use super::*;
    use zenavif_bridge::{ALPHA_OPAQUE, SPEED_FASTEST, encode_to_vec, true_color_alpha};

    fn sample_avif(width: u32, height: u32) -> Vec<u8> {
        let mut bitmap = Bitmap::new_true_color(width, height).expect("allocation");
        bitmap.fill(true_color_alpha(40, 80, 120, ALPHA_OPAQUE));
        encode_to_vec(&bitmap, 60, SPEED_FASTEST).expect("encode")
    }

    #[test]
    fn success_closes_once() {
        let closes = Rc::new(Cell::new(0));
        let ctx = CountingContext::new(sample_avif(20, 10), closes.clone());

        let bitmap = decode_counted(ctx).expect("decode");
        assert_eq!((bitmap.width(), bitmap.height()), (20, 10));
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn stream_and_memory_decode_agree() {
        let data = sample_avif(12, 12);
        let a = decode_with::<_, Bitmap>(MemoryContext::new(&data), &DecoderConfig::default())
            .expect("memory decode");
        let b = decode_reader(Cursor::new(data)).expect("stream decode");
        assert_eq!(a.as_img().buf(), b.as_img().buf());
    }

    #[test]
    fn frame_size_limit_rejects_large_images() {
        let closes = Rc::new(Cell::new(0));
        let ctx = CountingContext::new(sample_avif(40, 40), closes.clone());
        let config = DecoderConfig::new().frame_size_limit(1000);

        let err = decode_with::<_, Bitmap>(ctx, &config).unwrap_err();
        assert!(matches!(
            err.into_inner(),
            Error::ImageTooLarge {
                width: 40,
                height: 40
            }
        ));
        assert_eq!(closes.get(), 1);
    }

    #[test]
    fn truncated_file_fails_without_output() {
        let data = sample_avif(16, 16);
        let cut = &data[..data.len() / 2];
        assert!(decode(cut).is_err());
    }
}
