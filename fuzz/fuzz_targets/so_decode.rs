//! Fuzz target for the SO decoder.
//!
//! Arbitrary bytes must never panic the decoder; any decoded value must
//! re-encode into bytes the decoder accepts again (canonical form may
//! differ from the input, but must be a fixed point).

#![no_main]

use libfuzzer_sys::fuzz_target;
use opatomic_proto::{decode_value, encode_value, so_len};

fuzz_target!(|data: &[u8]| {
    if let Ok((value, used)) = decode_value(data) {
        assert!(used <= data.len());
        assert_eq!(so_len(data).ok(), Some(used));

        let mut canonical = Vec::new();
        encode_value(&value, &mut canonical);
        let (back, reused) = decode_value(&canonical).expect("canonical form decodes");
        assert_eq!(reused, canonical.len());
        assert_eq!(back, value);
    }
});
