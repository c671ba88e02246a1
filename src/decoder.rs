//! AVIF decoding engine wrapping avif-parse and rav1d
//!
//! [`Decoder`] is pull-based: it asks the [`AvifIo`] given to
//! [`Decoder::set_io`] for bytes, [`Decoder::parse`] reads the container,
//! and [`Decoder::next_image`] decodes the first frame (and its alpha item)
//! into a [`YuvImage`].

use crate::config::DecoderConfig;
use crate::error::{CodecError, CodecResult};
use crate::image::{
    AlphaPlane, ChromaSampling, ColorRange, FramePlanes, MatrixCoefficients, Samples, YuvImage,
    YuvPlanes, bytes_per_sample,
};
use crate::io::AvifIo;
use rav1d::include::dav1d::data::Dav1dData;
use rav1d::include::dav1d::dav1d::{Dav1dContext, Dav1dSettings};
use rav1d::include::dav1d::headers::{
    DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
    DAV1D_PIXEL_LAYOUT_I444, Dav1dPixelLayout, Rav1dMatrixCoefficients, Rav1dSequenceHeader,
};
use rav1d::include::dav1d::picture::Dav1dPicture;
use rav1d::src::lib::{
    dav1d_close, dav1d_data_wrap, dav1d_default_settings, dav1d_get_picture, dav1d_open,
    dav1d_picture_unref, dav1d_send_data,
};
use rav1d::src::send_sync_non_null::SendSyncNonNull;
use std::ffi::{c_int, c_void};
use std::mem::MaybeUninit;
use std::ptr::NonNull;

/// Bytes requested from the byte source per read
const READ_CHUNK: usize = 64 * 1024;

/// Internal rav1d context wrapper with automatic cleanup
struct Rav1dDecoder {
    ctx: Option<Dav1dContext>,
}

impl Rav1dDecoder {
    /// Create a new rav1d decoder with the given configuration
    fn new(config: &DecoderConfig) -> CodecResult<Self> {
        let mut settings = MaybeUninit::<Dav1dSettings>::uninit();

        // SAFETY: dav1d_default_settings initializes the settings struct
        unsafe {
            dav1d_default_settings(NonNull::from(&mut settings).cast());
        }

        // SAFETY: fully initialized above
        let mut settings = unsafe { settings.assume_init() };
        settings.n_threads = config.threads as c_int;
        settings.apply_grain = config.apply_grain as c_int;
        settings.frame_size_limit = config.frame_size_limit;

        let mut ctx: Option<Dav1dContext> = None;

        // SAFETY: dav1d_open creates a new decoder context
        let result = unsafe {
            dav1d_open(
                NonNull::new(&mut ctx),
                NonNull::new(&mut settings).map(|p| p.cast()),
            )
        };

        if result.0 < 0 {
            return Err(CodecError::Decode {
                code: result.0,
                msg: "failed to open decoder",
            });
        }

        Ok(Self { ctx })
    }

    /// Decode one AV1 item and return its first picture
    fn decode(&mut self, data: &[u8]) -> CodecResult<DecodedPicture> {
        // rav1d reports "try again" as -EAGAIN
        #[cfg(target_os = "macos")]
        const EAGAIN: c_int = -35;
        #[cfg(not(target_os = "macos"))]
        const EAGAIN: c_int = -11;

        let ctx = self.ctx.ok_or(CodecError::Decode {
            code: -1,
            msg: "decoder context is null",
        })?;

        let mut dav1d_data = Dav1dData::default();

        // `data` outlives the decode call, so rav1d never has to free it
        unsafe extern "C" fn null_free(_data: *const u8, _cookie: Option<SendSyncNonNull<c_void>>) {
        }

        // SAFETY: dav1d_data_wrap wraps the data pointer
        let result = unsafe {
            dav1d_data_wrap(
                NonNull::new(&mut dav1d_data),
                NonNull::new(data.as_ptr() as *mut u8),
                data.len(),
                Some(null_free),
                None,
            )
        };

        if result.0 < 0 {
            return Err(CodecError::Decode {
                code: result.0,
                msg: "failed to wrap data",
            });
        }

        // SAFETY: ctx is valid and dav1d_data has been initialized
        loop {
            let result = unsafe { dav1d_send_data(Some(ctx), NonNull::new(&mut dav1d_data)) };

            if result.0 == 0 {
                break;
            } else if result.0 == EAGAIN {
                // Output queue is full; take the picture that is waiting
                let mut picture = Dav1dPicture::default();
                let pic_result =
                    unsafe { dav1d_get_picture(Some(ctx), NonNull::new(&mut picture)) };
                if pic_result.0 == 0 {
                    return Ok(DecodedPicture { picture });
                }
            } else if result.0 < 0 {
                return Err(CodecError::Decode {
                    code: result.0,
                    msg: "failed to send data to decoder",
                });
            }

            if dav1d_data.sz == 0 {
                break;
            }
        }

        let mut picture = Dav1dPicture::default();
        loop {
            // SAFETY: ctx is valid and picture is initialized
            let result = unsafe { dav1d_get_picture(Some(ctx), NonNull::new(&mut picture)) };

            if result.0 == 0 {
                return Ok(DecodedPicture { picture });
            } else if result.0 == EAGAIN {
                std::thread::yield_now();
            } else {
                return Err(CodecError::Decode {
                    code: result.0,
                    msg: "failed to get picture",
                });
            }
        }
    }
}

impl Drop for Rav1dDecoder {
    fn drop(&mut self) {
        if self.ctx.is_some() {
            // SAFETY: ctx is valid
            unsafe {
                dav1d_close(NonNull::new(&mut self.ctx));
            }
        }
    }
}

/// Wrapper around Dav1dPicture that handles cleanup
struct DecodedPicture {
    picture: Dav1dPicture,
}

impl DecodedPicture {
    fn dimensions(&self) -> (u32, u32) {
        (self.picture.p.w as u32, self.picture.p.h as u32)
    }

    fn bit_depth(&self) -> u8 {
        self.picture.p.bpc as u8
    }

    fn layout(&self) -> Dav1dPixelLayout {
        self.picture.p.layout
    }

    fn seq_hdr(&self) -> Option<&Rav1dSequenceHeader> {
        // SAFETY: the sequence header is kept alive by the picture's reference
        self.picture
            .seq_hdr_ref
            .as_ref()
            .map(|arc| unsafe { &**arc.as_ref() })
    }

    fn range(&self) -> ColorRange {
        match self.seq_hdr() {
            Some(h) if h.color_range != 0 => ColorRange::Full,
            _ => ColorRange::Limited,
        }
    }

    fn sampling(&self) -> CodecResult<ChromaSampling> {
        match self.layout() {
            DAV1D_PIXEL_LAYOUT_I400 => Ok(ChromaSampling::Monochrome),
            DAV1D_PIXEL_LAYOUT_I420 => Ok(ChromaSampling::Cs420),
            DAV1D_PIXEL_LAYOUT_I422 => Ok(ChromaSampling::Cs422),
            DAV1D_PIXEL_LAYOUT_I444 => Ok(ChromaSampling::Cs444),
            _ => Err(CodecError::Decode {
                code: -1,
                msg: "unknown pixel layout",
            }),
        }
    }

    /// Copy `rows` rows of `width` samples out of plane `index` into a
    /// tightly packed vector
    fn copy_plane<T: Copy>(&self, index: usize, width: usize, rows: usize) -> CodecResult<Vec<T>> {
        let stride = self.picture.stride[index.min(1)] as usize;
        let ptr = self.picture.data[index].ok_or(CodecError::Decode {
            code: -1,
            msg: "missing plane",
        })?;

        let mut out = Vec::new();
        out.try_reserve_exact(width * rows)
            .map_err(|_| CodecError::OutOfMemory)?;
        for row in 0..rows {
            // SAFETY: the picture owns `rows` rows of `stride` bytes at this plane
            let row_slice = unsafe {
                let start = ptr.as_ptr().cast::<u8>().add(row * stride).cast::<T>();
                std::slice::from_raw_parts(start, width)
            };
            out.extend_from_slice(row_slice);
        }
        Ok(out)
    }

    fn planes<T: Copy>(&self, sampling: ChromaSampling) -> CodecResult<YuvPlanes<T>> {
        let (w, h) = self.dimensions();
        let (w, h) = (w as usize, h as usize);
        let (cw, ch) = sampling.chroma_size(w, h);

        let y = self.copy_plane(0, w, h)?;
        let (u, v) = if sampling == ChromaSampling::Monochrome {
            (Vec::new(), Vec::new())
        } else {
            (self.copy_plane(1, cw, ch)?, self.copy_plane(2, cw, ch)?)
        };

        Ok(YuvPlanes {
            y,
            u,
            v,
            y_stride: w,
            uv_stride: cw,
        })
    }

    /// Copy the colour planes out of the picture
    fn to_yuv_image(&self) -> CodecResult<YuvImage> {
        let (width, height) = self.dimensions();
        let depth = self.bit_depth();
        let sampling = self.sampling()?;

        let planes = if bytes_per_sample(depth)? == 1 {
            FramePlanes::Depth8(self.planes(sampling)?)
        } else {
            FramePlanes::Depth16(self.planes(sampling)?)
        };

        let matrix = self
            .seq_hdr()
            .map(|h| to_matrix(h.mtrx))
            .unwrap_or(MatrixCoefficients::UNKNOWN);

        Ok(YuvImage {
            width,
            height,
            depth,
            sampling,
            range: self.range(),
            matrix,
            planes,
            alpha: None,
        })
    }

    /// Copy the luma plane out of an alpha item's picture
    fn to_alpha_plane(&self) -> CodecResult<AlphaPlane> {
        let (w, h) = self.dimensions();
        let (w, h) = (w as usize, h as usize);
        let depth = self.bit_depth();

        let samples = if bytes_per_sample(depth)? == 1 {
            Samples::Depth8(self.copy_plane(0, w, h)?)
        } else {
            Samples::Depth16(self.copy_plane(0, w, h)?)
        };

        Ok(AlphaPlane {
            depth,
            range: self.range(),
            samples,
        })
    }
}

impl Drop for DecodedPicture {
    fn drop(&mut self) {
        // SAFETY: picture was initialized by dav1d_get_picture
        unsafe {
            dav1d_picture_unref(NonNull::new(&mut self.picture));
        }
    }
}

fn to_matrix(mc: Rav1dMatrixCoefficients) -> MatrixCoefficients {
    match mc {
        Rav1dMatrixCoefficients::IDENTITY => MatrixCoefficients::IDENTITY,
        Rav1dMatrixCoefficients::BT709 => MatrixCoefficients::BT709,
        Rav1dMatrixCoefficients::FCC => MatrixCoefficients::FCC,
        Rav1dMatrixCoefficients::BT470BG => MatrixCoefficients::BT470BG,
        Rav1dMatrixCoefficients::BT601 => MatrixCoefficients::BT601,
        Rav1dMatrixCoefficients::SMPTE240 => MatrixCoefficients::SMPTE240,
        Rav1dMatrixCoefficients::SMPTE_YCGCO => MatrixCoefficients::YCGCO,
        Rav1dMatrixCoefficients::BT2020_NCL => MatrixCoefficients::BT2020_NCL,
        Rav1dMatrixCoefficients::BT2020_CL => MatrixCoefficients::BT2020_CL,
        _ => MatrixCoefficients::UNKNOWN,
    }
}

/// Pull the whole source through `io`, copying each chunk out of the
/// reader's scratch buffer
fn read_all(io: &mut dyn AvifIo) -> CodecResult<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(hint) = io.size_hint() {
        buf.try_reserve_exact(usize::try_from(hint).map_err(|_| CodecError::OutOfMemory)?)
            .map_err(|_| CodecError::OutOfMemory)?;
    }

    let mut offset = 0u64;
    loop {
        let chunk = io.read(0, offset, READ_CHUNK)?;
        let n = chunk.len();
        buf.try_reserve(n).map_err(|_| CodecError::OutOfMemory)?;
        buf.extend_from_slice(chunk);
        offset += n as u64;
        if n < READ_CHUNK {
            break;
        }
    }

    if buf.is_empty() {
        return Err(CodecError::TruncatedData);
    }
    Ok(buf)
}

/// AVIF decoder session
///
/// Owns the byte source for its whole lifetime; dropping the decoder drops
/// the source (closing the wrapped context) and every rav1d handle.
pub struct Decoder<'io> {
    config: DecoderConfig,
    io: Option<Box<dyn AvifIo + 'io>>,
    avif: Option<avif_parse::AvifData>,
    frames_decoded: u32,
}

impl<'io> Decoder<'io> {
    /// Create a decoder with no byte source
    pub fn new(config: &DecoderConfig) -> Self {
        Self {
            config: config.clone(),
            io: None,
            avif: None,
            frames_decoded: 0,
        }
    }

    /// Hand the decoder its byte source
    pub fn set_io(&mut self, io: Box<dyn AvifIo + 'io>) {
        self.io = Some(io);
    }

    /// Read and parse the container
    ///
    /// Fails with [`CodecError::FrameTooLarge`] if the primary image exceeds
    /// the configured frame size limit.
    pub fn parse(&mut self) -> CodecResult<()> {
        let io = self.io.as_deref_mut().ok_or(CodecError::NoContent)?;
        let persistent = io.persistent();
        let bytes = read_all(io)?;
        log::trace!(
            "read {} bytes from {} source",
            bytes.len(),
            if persistent { "persistent" } else { "ephemeral" }
        );

        let avif = avif_parse::read_avif(&mut bytes.as_slice())?;
        let metadata = avif.primary_item_metadata()?;
        let (width, height) = (
            metadata.max_frame_width.get(),
            metadata.max_frame_height.get(),
        );
        if !self.config.allows(width, height) {
            return Err(CodecError::FrameTooLarge { width, height });
        }
        log::trace!(
            "parsed {width}x{height} {}-bit image, alpha: {}",
            metadata.bit_depth,
            avif.alpha_item.is_some()
        );

        self.avif = Some(avif);
        Ok(())
    }

    /// Decode the next image
    ///
    /// Still images hold a single frame, so every call after the first
    /// returns [`CodecError::NoContent`].
    pub fn next_image(&mut self) -> CodecResult<YuvImage> {
        let avif = self.avif.as_ref().ok_or(CodecError::NoContent)?;
        if self.frames_decoded > 0 {
            return Err(CodecError::NoContent);
        }

        let mut color_decoder = Rav1dDecoder::new(&self.config)?;
        let color = color_decoder.decode(&avif.primary_item)?;
        let mut image = color.to_yuv_image()?;
        drop(color);

        if let Some(alpha_item) = &avif.alpha_item {
            let mut alpha_decoder = Rav1dDecoder::new(&self.config)?;
            let alpha = alpha_decoder.decode(alpha_item)?;
            if alpha.dimensions() != (image.width, image.height) {
                return Err(CodecError::Decode {
                    code: -1,
                    msg: "alpha item dimensions differ from the colour item",
                });
            }
            image.alpha = Some(alpha.to_alpha_plane()?);
            if avif.premultiplied_alpha {
                log::warn!("premultiplied alpha is passed through without unpremultiplying");
            }
        }

        self.frames_decoded += 1;
        Ok(image)
    }
}
