//! Error types for zenavif-bridge

/// Error type for AVIF conversions to and from truecolor bitmaps
///
/// Every variant is terminal for the conversion that raised it: the pipeline
/// has already released everything it allocated, and no partial output exists.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Seek, read or write failure on the byte context
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A buffer or bitmap could not be allocated
    #[error("Out of memory: {0}")]
    OutOfMemory(&'static str),

    /// AVIF container or AV1 bitstream could not be parsed
    #[error("Could not parse image: {0}")]
    Parse(CodecError),

    /// The first frame could not be decoded
    #[error("Could not decode image: {0}")]
    Decode(CodecError),

    /// YUV to RGB (decode) or RGB to YUV (encode) conversion failed
    #[error("Color conversion failed: {0}")]
    ColorConversion(CodecError),

    /// Encoding was requested for a bitmap that is not in truecolor mode
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(&'static str),

    /// Encoder configuration or the encode itself failed
    #[error("Could not encode image: {0}")]
    Encode(CodecError),

    /// Zero-sized or otherwise unusable dimensions
    #[error("Invalid dimensions: {width}x{height}")]
    InvalidDimensions {
        /// Image width
        width: u32,
        /// Image height
        height: u32,
    },

    /// Image dimensions exceed the configured frame size limit
    #[error("Image too large: {width}x{height}")]
    ImageTooLarge {
        /// Image width
        width: u32,
        /// Image height
        height: u32,
    },
}

/// Status reported by the codec engine (container parser, AV1 decoder and
/// encoder, colour converter)
///
/// The pipelines wrap these into [`Error`] according to the stage that failed.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CodecError {
    /// The byte source failed to seek or read
    #[error("IO error: {0}")]
    Io(std::io::Error),

    /// A scratch or sample buffer could not be allocated
    #[error("out of memory")]
    OutOfMemory,

    /// The byte source ended before any data was read
    #[error("truncated data")]
    TruncatedData,

    /// ISOBMFF/AVIF container parse failure
    #[error("BMFF parse failed: {0}")]
    Parse(#[from] avif_parse::Error),

    /// Parse has not run, or the container holds no image
    #[error("no content")]
    NoContent,

    /// Frame exceeds the configured size limit
    #[error("frame {width}x{height} exceeds the size limit")]
    FrameTooLarge {
        /// Frame width
        width: u32,
        /// Frame height
        height: u32,
    },

    /// AV1 decode error from rav1d
    #[error("AV1 decode error {code}: {msg}")]
    Decode {
        /// rav1d error code
        code: i32,
        /// Error description
        msg: &'static str,
    },

    /// Bit depth the bridge cannot carry
    #[error("unsupported bit depth: {0}")]
    UnsupportedDepth(u8),

    /// Error from the `yuv` crate
    #[error("{0}")]
    ColorConversion(#[from] yuv::YuvError),

    /// Encoder rejected its configuration
    #[error("invalid encoder configuration: {0}")]
    InvalidConfig(String),

    /// AV1 encoder failure
    #[error("encoding failed: {0}")]
    Encode(String),
}

impl CodecError {
    /// Wrap an engine failure into the public error for the given stage.
    ///
    /// I/O, allocation and size-limit failures keep their own category
    /// whichever stage raised them.
    pub(crate) fn into_stage_error(self, stage: fn(CodecError) -> Error) -> Error {
        match self {
            CodecError::Io(e) => Error::Io(e),
            CodecError::OutOfMemory => Error::OutOfMemory("codec engine buffer"),
            CodecError::FrameTooLarge { width, height } => Error::ImageTooLarge { width, height },
            other => stage(other),
        }
    }
}

/// Result type for engine calls
pub type CodecResult<T> = core::result::Result<T, CodecError>;

/// Result type for zenavif-bridge operations with location tracking
pub type Result<T, E = whereat::At<Error>> = core::result::Result<T, E>;
