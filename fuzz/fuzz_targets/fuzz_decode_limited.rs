#![no_main]

use libfuzzer_sys::fuzz_target;
use zenavif_bridge::{Bitmap, DecoderConfig, MemoryContext, decode_with};

fuzz_target!(|data: &[u8]| {
    let config = DecoderConfig::new().threads(1).frame_size_limit(4096 * 4096);
    if let Ok(bitmap) = decode_with::<_, Bitmap>(MemoryContext::new(data), &config) {
        assert!(u64::from(bitmap.width()) * u64::from(bitmap.height()) <= 4096 * 4096);
        assert!(bitmap.save_alpha());
    }
});
