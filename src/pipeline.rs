//! Decode and encode pipelines
//!
//! Each pipeline walks a fixed sequence of states. A failure in any state is
//! terminal: it is logged with the state it happened in, everything the
//! pipeline acquired so far is dropped, and the caller gets the error with
//! no partial output.

use crate::bitmap::PixelSink;
use crate::config::DecoderConfig;
use crate::convert::unpack_rgba;
use crate::decoder::Decoder;
use crate::error::{CodecError, Error, Result};
use crate::io::{ByteProvider, ContextIo};
use crate::yuv_convert::yuv_to_rgb;
use core::fmt;
use whereat::at;

#[cfg(feature = "encode")]
use crate::{
    bitmap::PixelSource,
    convert::pack_rgba8,
    encoder::Encoder,
    params::{EncodeSettings, Quality},
    yuv_convert::rgb_to_yuv,
};
#[cfg(feature = "encode")]
use std::io::Write;

/// Progress of a decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeState {
    Created,
    Parsed,
    FrameDecoded,
    ColorConverted,
    Unpacked,
    Done,
}

/// Progress of an encode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeState {
    Created,
    Packed,
    ColorConverted,
    EncoderConfigured,
    Encoded,
    OutputWritten,
    Done,
}

impl fmt::Display for DecodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for EncodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Error mapper for engine failures raised in one stage
fn stage(wrap: fn(CodecError) -> Error) -> impl Fn(CodecError) -> whereat::At<Error> {
    move |e| at(e.into_stage_error(wrap))
}

/// Decode the first frame of an AVIF read from `provider` into a new bitmap
///
/// The provider is closed exactly once before this returns, whatever the
/// outcome.
pub fn decode_pipeline<P, B>(provider: P, config: &DecoderConfig) -> Result<B>
where
    P: ByteProvider,
    B: PixelSink,
{
    let mut state = DecodeState::Created;
    let result = run_decode(provider, config, &mut state);
    if let Err(e) = &result {
        log::error!("avif decode failed in state {state}: {e}");
    }
    result
}

fn run_decode<P, B>(provider: P, config: &DecoderConfig, state: &mut DecodeState) -> Result<B>
where
    P: ByteProvider,
    B: PixelSink,
{
    let mut advance = |next: DecodeState| {
        log::trace!("avif decode: {state} -> {next}");
        *state = next;
    };

    let mut decoder = Decoder::new(config);
    decoder.set_io(Box::new(ContextIo::new(provider)));

    decoder.parse().map_err(stage(Error::Parse))?;
    advance(DecodeState::Parsed);

    let frame = decoder.next_image().map_err(stage(Error::Decode))?;
    advance(DecodeState::FrameDecoded);

    let rgb = yuv_to_rgb(&frame).map_err(stage(Error::ColorConversion))?;
    drop(frame);
    advance(DecodeState::ColorConverted);

    let bitmap = unpack_rgba::<B>(&rgb)?;
    advance(DecodeState::Unpacked);

    drop(rgb);
    drop(decoder);
    advance(DecodeState::Done);
    Ok(bitmap)
}

/// Encode `src` as AVIF and write the file to `sink`
///
/// Nothing is written to `sink` unless encoding succeeded.
#[cfg(feature = "encode")]
pub fn encode_pipeline<S, W>(src: &S, quality: Quality, speed: i32, sink: &mut W) -> Result<()>
where
    S: PixelSource + ?Sized,
    W: Write + ?Sized,
{
    let mut state = EncodeState::Created;
    let result = run_encode(src, quality, speed, sink, &mut state);
    if let Err(e) = &result {
        log::error!("avif encode failed in state {state}: {e}");
    }
    result
}

#[cfg(feature = "encode")]
fn run_encode<S, W>(
    src: &S,
    quality: Quality,
    speed: i32,
    sink: &mut W,
    state: &mut EncodeState,
) -> Result<()>
where
    S: PixelSource + ?Sized,
    W: Write + ?Sized,
{
    let mut advance = |next: EncodeState| {
        log::trace!("avif encode: {state} -> {next}");
        *state = next;
    };

    let rgb = pack_rgba8(src)?;
    advance(EncodeState::Packed);

    let (width, height) = (rgb.width(), rgb.height());
    let settings = EncodeSettings::derive(width, height, quality, speed);
    let frame = rgb_to_yuv(&rgb, settings.sampling).map_err(stage(Error::ColorConversion))?;
    drop(rgb);
    advance(EncodeState::ColorConverted);

    let mut encoder = Encoder::new(settings, width, height).map_err(stage(Error::Encode))?;
    advance(EncodeState::EncoderConfigured);

    encoder.add_image(&frame).map_err(stage(Error::Encode))?;
    drop(frame);
    advance(EncodeState::Encoded);

    let data = encoder.finish().map_err(stage(Error::Encode))?;
    sink.write_all(&data).map_err(|e| at(Error::Io(e)))?;
    sink.flush().map_err(|e| at(Error::Io(e)))?;
    advance(EncodeState::OutputWritten);

    advance(EncodeState::Done);
    Ok(())
}
