//! Resumable UTF-8 validation.
//!
//! A byte-at-a-time DFA accepting exactly the RFC 3629 language: overlong
//! encodings and UTF-16 surrogate halves are rejected, four-byte sequences
//! reach `U+10FFFF`, and noncharacters such as `U+FFFE` are permitted. The
//! state is small enough to park inside the streaming framer between reads.
//!
//! Byte ranges:
//!
//! ```text
//! 00-7F
//! C2-DF 80-BF
//! E0    A0-BF 80-BF
//! E1-EC 80-BF 80-BF
//! ED    80-9F 80-BF
//! EE-EF 80-BF 80-BF
//! F0    90-BF 80-BF 80-BF
//! F1-F3 80-BF 80-BF 80-BF
//! F4    80-8F 80-BF 80-BF
//! ```

/// Validator state. [`Accept`](Self::Accept) is both the initial state and
/// the only state that ends on a code-point boundary;
/// [`Reject`](Self::Reject) is sticky.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Utf8State {
    /// At a code-point boundary.
    #[default]
    Accept,
    /// One unrestricted continuation byte expected.
    Need1,
    /// Two unrestricted continuation bytes expected.
    Need2,
    /// Three unrestricted continuation bytes expected.
    Need3,
    /// Next byte restricted to `A0-BF` (after `E0`).
    Range1,
    /// Next byte restricted to `80-9F` (after `ED`).
    Range2,
    /// Next byte restricted to `90-BF` (after `F0`).
    Range3,
    /// Next byte restricted to `80-8F` (after `F4`).
    Range4,
    /// Invalid input was seen.
    Reject,
}

/// Advance the DFA by one byte.
#[must_use]
pub fn step(state: Utf8State, byte: u8) -> Utf8State {
    use Utf8State as S;
    let continuation = byte & 0xC0 == 0x80;
    match state {
        S::Accept => match byte {
            0x00..=0x7F => S::Accept,
            0xC2..=0xDF => S::Need1,
            0xE0 => S::Range1,
            0xE1..=0xEC | 0xEE..=0xEF => S::Need2,
            0xED => S::Range2,
            0xF0 => S::Range3,
            0xF1..=0xF3 => S::Need3,
            0xF4 => S::Range4,
            _ => S::Reject,
        },
        S::Need1 if continuation => S::Accept,
        S::Need2 if continuation => S::Need1,
        S::Need3 if continuation => S::Need2,
        S::Range1 if (0xA0..=0xBF).contains(&byte) => S::Need1,
        S::Range2 if (0x80..=0x9F).contains(&byte) => S::Need1,
        S::Range3 if (0x90..=0xBF).contains(&byte) => S::Need2,
        S::Range4 if (0x80..=0x8F).contains(&byte) => S::Need2,
        _ => S::Reject,
    }
}

/// Run the DFA over a chunk, resuming from `state`.
#[must_use]
pub fn validate_chunk(state: Utf8State, bytes: &[u8]) -> Utf8State {
    let mut state = state;
    for &byte in bytes {
        if state == Utf8State::Reject {
            break;
        }
        state = step(state, byte);
    }
    state
}

/// Offset of the first byte that starts an invalid or truncated sequence,
/// or `None` when the whole slice is well-formed UTF-8.
#[must_use]
pub fn find_invalid(bytes: &[u8]) -> Option<usize> {
    let mut i = 0;
    while i < bytes.len() {
        let start = i;
        let mut state = step(Utf8State::Accept, bytes[i]);
        i += 1;
        loop {
            match state {
                Utf8State::Reject => return Some(start),
                Utf8State::Accept => break,
                _ => {
                    if i >= bytes.len() {
                        return Some(start);
                    }
                    state = step(state, bytes[i]);
                    i += 1;
                },
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepts(bytes: &[u8]) -> bool {
        validate_chunk(Utf8State::Accept, bytes) == Utf8State::Accept
    }

    #[test]
    fn matches_std_on_interesting_inputs() {
        let cases: &[&[u8]] = &[
            b"",
            b"hello",
            "héllo wörld".as_bytes(),
            "\u{10FFFF}\u{FFFD}\u{0800}".as_bytes(),
            "\u{FFFE}\u{FFFF}".as_bytes(), // noncharacters are permitted
            &[0xC0, 0x80],                 // overlong NUL
            &[0xE0, 0x80, 0x80],           // overlong
            &[0xED, 0xA0, 0x80],           // surrogate half
            &[0xF4, 0x90, 0x80, 0x80],     // > U+10FFFF
            &[0xF5, 0x80, 0x80, 0x80],
            &[0x80],
            &[0xC2],
        ];
        for &case in cases {
            assert_eq!(
                accepts(case),
                std::str::from_utf8(case).is_ok(),
                "{case:02x?}"
            );
        }
    }

    #[test]
    fn resumes_across_chunks() {
        let text = "née".as_bytes();
        for split in 0..=text.len() {
            let mid = validate_chunk(Utf8State::Accept, &text[..split]);
            assert_ne!(mid, Utf8State::Reject, "split {split}");
            assert_eq!(validate_chunk(mid, &text[split..]), Utf8State::Accept);
        }
    }

    #[test]
    fn reject_is_sticky() {
        let state = validate_chunk(Utf8State::Accept, &[0xFF]);
        assert_eq!(state, Utf8State::Reject);
        assert_eq!(validate_chunk(state, b"ok"), Utf8State::Reject);
    }

    #[test]
    fn find_invalid_points_at_sequence_start() {
        assert_eq!(find_invalid(b"plain"), None);
        assert_eq!(find_invalid("à la".as_bytes()), None);
        assert_eq!(find_invalid(&[b'a', 0xFF, b'b']), Some(1));
        // Bad continuation: offset of the lead byte, not the continuation.
        assert_eq!(find_invalid(&[b'a', 0xC2, 0x20]), Some(1));
        // Truncated tail sequence.
        assert_eq!(find_invalid(&[b'a', b'b', 0xE2, 0x82]), Some(2));
    }
}
