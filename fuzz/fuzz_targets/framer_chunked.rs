//! Fuzz target for the streaming framer.
//!
//! Splitting the input at an arbitrary point must not change the outcome:
//! the chunked scan reports the same end offsets (or the same error) as
//! the single-shot scan.

#![no_main]

use libfuzzer_sys::fuzz_target;
use opatomic_proto::{Framer, ProtocolError};

fn frame_all(chunks: &[&[u8]]) -> Result<Vec<usize>, ProtocolError> {
    let mut framer = Framer::default();
    let mut ends = Vec::new();
    let mut consumed = 0usize;
    for &chunk in chunks {
        let mut window = chunk;
        let mut base = consumed;
        loop {
            match framer.find_end(window)? {
                Some(end) => {
                    ends.push(base + end);
                    base += end;
                    window = &window[end..];
                    if window.is_empty() {
                        break;
                    }
                },
                None => break,
            }
        }
        consumed += chunk.len();
    }
    Ok(ends)
}

fuzz_target!(|input: (&[u8], usize)| {
    let (data, split) = input;
    let split = if data.is_empty() { 0 } else { split % data.len() };
    let whole = frame_all(&[data]);
    let halves = frame_all(&[&data[..split], &data[split..]]);
    assert_eq!(whole, halves);
});
