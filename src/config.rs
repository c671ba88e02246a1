//! Decoder configuration

/// Configuration for decoding AVIF into a bitmap
///
/// ```
/// use zenavif_bridge::DecoderConfig;
///
/// let config = DecoderConfig::new()
///     .threads(2)
///     .frame_size_limit(4096 * 4096);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Number of AV1 decoder threads (0 = auto)
    pub(crate) threads: u32,
    /// Whether to apply film grain synthesis
    pub(crate) apply_grain: bool,
    /// Maximum frame size in pixels (0 = no limit)
    pub(crate) frame_size_limit: u32,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            threads: 0,
            apply_grain: true,
            frame_size_limit: 0,
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the number of AV1 decoder threads
    ///
    /// 0 means automatic (use available cores)
    pub fn threads(mut self, threads: u32) -> Self {
        self.threads = threads;
        self
    }

    /// Enable or disable film grain synthesis
    ///
    /// When enabled (default), film grain signalled in the AV1 stream
    /// is synthesized onto the decoded frame.
    pub fn apply_grain(mut self, apply: bool) -> Self {
        self.apply_grain = apply;
        self
    }

    /// Set maximum frame size limit in total pixels
    ///
    /// Images whose `width * height` exceeds this limit fail with
    /// [`Error::ImageTooLarge`](crate::Error::ImageTooLarge) before any
    /// frame is decoded. 0 means no limit.
    pub fn frame_size_limit(mut self, limit: u32) -> Self {
        self.frame_size_limit = limit;
        self
    }

    /// Returns true if a `width` x `height` frame is within the size limit
    pub(crate) fn allows(&self, width: u32, height: u32) -> bool {
        self.frame_size_limit == 0
            || u64::from(width) * u64::from(height) <= u64::from(self.frame_size_limit)
    }
}
