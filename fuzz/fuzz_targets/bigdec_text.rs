//! Fuzz target for decimal text parsing and formatting.

#![no_main]

use libfuzzer_sys::fuzz_target;
use opatomic_num::{BigDec, NumInt};

fuzz_target!(|data: &str| {
    if let Ok(value) = data.parse::<BigDec<NumInt>>() {
        // Canonical text must survive a round trip unchanged.
        let text = value.to_string();
        let back: BigDec<NumInt> = text.parse().expect("canonical text parses");
        assert_eq!(back.to_string(), text);
    }
});
