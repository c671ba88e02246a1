//! AVIF encoding engine: AV1 encoding with rav1e, muxing with avif-serialize
//!
//! The colour planes and the optional alpha plane are encoded as two
//! independent still pictures with the same quantizer, then wrapped into one
//! AVIF container.

use crate::error::{CodecError, CodecResult};
use crate::image::{ChromaSampling, FramePlanes, Samples, YuvImage};
use crate::params::{EncodeSettings, SPEED_DEFAULT, SPEED_FASTEST, SPEED_SLOWEST};
use rav1e::prelude as av1;

/// Speed preset used when the caller passes [`SPEED_DEFAULT`]
pub const ENGINE_DEFAULT_SPEED: u8 = 6;

/// Map a 0-63 AVIF quantizer onto rav1e's 0-255 quantizer index
#[inline]
pub fn av1_quantizer(q: u8) -> u8 {
    (u32::from(q.min(63)) * 255 / 63) as u8
}

/// Map the public speed knob onto a rav1e speed preset
#[inline]
pub fn speed_preset(speed: i32) -> u8 {
    if speed == SPEED_DEFAULT {
        ENGINE_DEFAULT_SPEED
    } else {
        speed.clamp(SPEED_SLOWEST, SPEED_FASTEST) as u8
    }
}

/// AV1 payloads of one encoded image
struct EncodedItems {
    color: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

/// AVIF encoder session
///
/// [`Encoder::new`] configures the AV1 encoders for one image size and
/// rejects settings they cannot run with. Feed the frame with
/// [`Encoder::add_image`] and collect the file with [`Encoder::finish`].
pub struct Encoder {
    settings: EncodeSettings,
    width: u32,
    height: u32,
    color_ctx: av1::Context<u8>,
    alpha_ctx: av1::Context<u8>,
    items: Option<EncodedItems>,
}

impl Encoder {
    /// Configure an encoder for a `width` x `height` image
    pub fn new(settings: EncodeSettings, width: u32, height: u32) -> CodecResult<Self> {
        log::trace!(
            "encoder: {width}x{height}, quantizer {}..={} (alpha {}..={}), tiles {}x{}, {} threads, speed {}",
            settings.min_quantizer,
            settings.max_quantizer,
            settings.min_quantizer_alpha,
            settings.max_quantizer_alpha,
            settings.tiles.tile_cols(),
            settings.tiles.tile_rows(),
            settings.tiles.threads,
            speed_preset(settings.speed),
        );
        let sampling = match settings.sampling {
            ChromaSampling::Cs420 => av1::ChromaSampling::Cs420,
            ChromaSampling::Cs422 => av1::ChromaSampling::Cs422,
            ChromaSampling::Cs444 => av1::ChromaSampling::Cs444,
            ChromaSampling::Monochrome => av1::ChromaSampling::Cs400,
        };

        let color_ctx = context(config(
            &settings,
            width,
            height,
            sampling,
            (settings.min_quantizer, settings.max_quantizer),
            true,
        ))?;
        let alpha_ctx = context(config(
            &settings,
            width,
            height,
            av1::ChromaSampling::Cs400,
            (settings.min_quantizer_alpha, settings.max_quantizer_alpha),
            false,
        ))?;

        Ok(Self {
            settings,
            width,
            height,
            color_ctx,
            alpha_ctx,
            items: None,
        })
    }

    /// Settings this encoder was created with
    pub fn settings(&self) -> &EncodeSettings {
        &self.settings
    }

    /// Encode the single frame of a still image
    ///
    /// The frame must match the size and subsampling the encoder was
    /// configured for.
    pub fn add_image(&mut self, frame: &YuvImage) -> CodecResult<()> {
        if self.items.is_some() {
            return Err(CodecError::InvalidConfig(
                "only one image can be added".into(),
            ));
        }
        if (frame.width, frame.height) != (self.width, self.height)
            || frame.sampling != self.settings.sampling
        {
            return Err(CodecError::InvalidConfig(format!(
                "frame {}x{} {:?} does not match encoder configured for {}x{} {:?}",
                frame.width,
                frame.height,
                frame.sampling,
                self.width,
                self.height,
                self.settings.sampling
            )));
        }
        let FramePlanes::Depth8(planes) = &frame.planes else {
            return Err(CodecError::UnsupportedDepth(frame.depth));
        };

        let color = encode_still(
            &mut self.color_ctx,
            &[
                (planes.y.as_slice(), planes.y_stride),
                (planes.u.as_slice(), planes.uv_stride),
                (planes.v.as_slice(), planes.uv_stride),
            ],
        )?;
        log::trace!("colour item: {} bytes", color.len());

        let alpha = match &frame.alpha {
            Some(alpha) => {
                let Samples::Depth8(a) = &alpha.samples else {
                    return Err(CodecError::UnsupportedDepth(alpha.depth));
                };
                let data = encode_still(&mut self.alpha_ctx, &[(a.as_slice(), frame.width as usize)])?;
                log::trace!("alpha item: {} bytes", data.len());
                Some(data)
            }
            None => None,
        };

        self.items = Some(EncodedItems { color, alpha });
        Ok(())
    }

    /// Wrap the encoded items into an AVIF file
    pub fn finish(self) -> CodecResult<Vec<u8>> {
        let items = self.items.ok_or(CodecError::NoContent)?;
        let sampling = self.settings.sampling;
        let (subsampled, profile) = match sampling {
            ChromaSampling::Cs420 | ChromaSampling::Monochrome => ((true, true), 0),
            ChromaSampling::Cs422 => ((true, false), 2),
            ChromaSampling::Cs444 => ((false, false), 1),
        };

        let mut out = Vec::new();
        avif_serialize::Aviffy::new()
            .set_chroma_subsampling(subsampled)
            .set_monochrome(sampling == ChromaSampling::Monochrome)
            .set_seq_profile(profile)
            .set_full_color_range(true)
            .write(
                &mut out,
                &items.color,
                items.alpha.as_deref(),
                self.width,
                self.height,
                8,
            )
            .map_err(|e| CodecError::Encode(format!("muxing failed: {e}")))?;
        Ok(out)
    }
}

/// rav1e configuration for one item of the image
fn config(
    settings: &EncodeSettings,
    width: u32,
    height: u32,
    sampling: av1::ChromaSampling,
    quantizer: (u8, u8),
    color: bool,
) -> av1::Config {
    let (min_q, max_q) = quantizer;
    let tiles = settings.tiles;
    let color_description = color.then_some(av1::ColorDescription {
        color_primaries: av1::ColorPrimaries::BT709,
        transfer_characteristics: av1::TransferCharacteristics::SRGB,
        matrix_coefficients: av1::MatrixCoefficients::BT601,
    });

    let enc = av1::EncoderConfig {
        width: width as usize,
        height: height as usize,
        bit_depth: 8,
        chroma_sampling: sampling,
        pixel_range: av1::PixelRange::Full,
        color_description,
        still_picture: true,
        quantizer: usize::from(av1_quantizer(max_q)),
        min_quantizer: av1_quantizer(min_q),
        tile_cols: tiles.tile_cols(),
        tile_rows: tiles.tile_rows(),
        speed_settings: av1::SpeedSettings::from_preset(speed_preset(settings.speed)),
        ..Default::default()
    };

    av1::Config::new()
        .with_encoder_config(enc)
        .with_threads(tiles.threads as usize)
}

/// Validate a configuration by building its encoding context
fn context(cfg: av1::Config) -> CodecResult<av1::Context<u8>> {
    cfg.new_context()
        .map_err(|e| CodecError::InvalidConfig(e.to_string()))
}

/// Run rav1e over one still picture and collect its packets
fn encode_still(ctx: &mut av1::Context<u8>, planes: &[(&[u8], usize)]) -> CodecResult<Vec<u8>> {
    let mut frame = ctx.new_frame();
    for (plane, (data, stride)) in frame.planes.iter_mut().zip(planes) {
        plane.copy_from_raw_u8(data, *stride, 1);
    }

    ctx.send_frame(frame)
        .map_err(|e| CodecError::Encode(e.to_string()))?;
    ctx.flush();

    let mut out = Vec::new();
    loop {
        match ctx.receive_packet() {
            Ok(mut packet) => out.append(&mut packet.data),
            Err(av1::EncoderStatus::Encoded) => {}
            Err(av1::EncoderStatus::LimitReached) => break,
            Err(e) => return Err(CodecError::Encode(e.to_string())),
        }
    }

    if out.is_empty() {
        return Err(CodecError::Encode("encoder produced no data".into()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::Quality;

    #[test]
    fn quantizer_scale_endpoints() {
        assert_eq!(av1_quantizer(0), 0);
        assert_eq!(av1_quantizer(63), 255);
        assert_eq!(av1_quantizer(30), 121);
    }

    #[test]
    fn speed_default_and_clamping() {
        assert_eq!(speed_preset(SPEED_DEFAULT), ENGINE_DEFAULT_SPEED);
        assert_eq!(speed_preset(4), 4);
        assert_eq!(speed_preset(42), 10);
        assert_eq!(speed_preset(-7), 0);
    }

    fn settings(width: u32, height: u32) -> EncodeSettings {
        EncodeSettings::derive(width, height, Quality::Default, SPEED_DEFAULT)
    }

    #[test]
    fn finish_without_image_has_no_content() {
        let enc = Encoder::new(settings(8, 8), 8, 8).unwrap();
        assert!(matches!(enc.finish(), Err(CodecError::NoContent)));
    }

    #[test]
    fn unusable_dimensions_fail_at_configuration() {
        for (w, h) in [(0, 8), (8, 0), (70_000, 8)] {
            let result = Encoder::new(settings(8, 8), w, h);
            assert!(matches!(result, Err(CodecError::InvalidConfig(_))), "{w}x{h}");
        }
    }

    #[test]
    fn frame_must_match_configuration() {
        let mut enc = Encoder::new(settings(8, 8), 8, 8).unwrap();
        let frame = YuvImage {
            width: 16,
            height: 8,
            depth: 8,
            sampling: ChromaSampling::Cs420,
            range: crate::image::ColorRange::Full,
            matrix: crate::image::MatrixCoefficients::BT601,
            planes: FramePlanes::Depth8(crate::image::YuvPlanes {
                y: vec![0; 16 * 8],
                u: vec![128; 8 * 4],
                v: vec![128; 8 * 4],
                y_stride: 16,
                uv_stride: 8,
            }),
            alpha: None,
        };
        assert!(matches!(enc.add_image(&frame), Err(CodecError::InvalidConfig(_))));
    }
}
