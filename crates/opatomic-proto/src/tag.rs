//! One-byte wire type tags.
//!
//! For the vardec/bigdec tags the first `Pos`/`Neg` names the exponent sign
//! and the second names the significand sign.

use crate::error::ProtocolError;

/// Type tag of an encoded value. Each variant's discriminant is the literal
/// byte that appears on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Tag {
    /// Undefined sentinel.
    Undefined = b'U',
    /// Null.
    Null = b'N',
    /// Boolean false.
    False = b'F',
    /// Boolean true.
    True = b'T',
    /// Sorts greater than every other value.
    SortMax = b'Z',
    /// Empty binary blob.
    BinEmpty = b'A',
    /// Empty string.
    StrEmpty = b'R',
    /// Empty array.
    ArrayEmpty = b'M',
    /// Negative infinity.
    NegInf = b'P',
    /// Positive infinity.
    PosInf = b'Q',
    /// Numeric zero.
    Zero = b'O',
    /// Positive integer, varint payload.
    PosVarint = b'D',
    /// Negative integer, varint magnitude payload.
    NegVarint = b'E',
    /// Positive exponent, positive significand vardec.
    PosPosVardec = b'G',
    /// Positive exponent, negative significand vardec.
    PosNegVardec = b'H',
    /// Negative exponent, positive significand vardec.
    NegPosVardec = b'I',
    /// Negative exponent, negative significand vardec.
    NegNegVardec = b'J',
    /// Positive big integer: varint byte count, then magnitude bytes.
    PosBigint = b'K',
    /// Negative big integer.
    NegBigint = b'L',
    /// Positive exponent, positive significand bigdec.
    PosPosBigdec = b'V',
    /// Positive exponent, negative significand bigdec.
    PosNegBigdec = b'W',
    /// Negative exponent, positive significand bigdec.
    NegPosBigdec = b'X',
    /// Negative exponent, negative significand bigdec.
    NegNegBigdec = b'Y',
    /// Binary blob: varint length, then raw bytes.
    BinLpvi = b'B',
    /// String: varint length, then UTF-8 bytes.
    StrLpvi = b'S',
    /// Array open.
    ArrayStart = b'[',
    /// Array close.
    ArrayEnd = b']',
}

impl Tag {
    /// Decode a tag byte.
    ///
    /// # Errors
    ///
    /// `UnknownTag` for any byte outside the table.
    pub fn from_byte(byte: u8) -> Result<Self, ProtocolError> {
        Ok(match byte {
            b'U' => Self::Undefined,
            b'N' => Self::Null,
            b'F' => Self::False,
            b'T' => Self::True,
            b'Z' => Self::SortMax,
            b'A' => Self::BinEmpty,
            b'R' => Self::StrEmpty,
            b'M' => Self::ArrayEmpty,
            b'P' => Self::NegInf,
            b'Q' => Self::PosInf,
            b'O' => Self::Zero,
            b'D' => Self::PosVarint,
            b'E' => Self::NegVarint,
            b'G' => Self::PosPosVardec,
            b'H' => Self::PosNegVardec,
            b'I' => Self::NegPosVardec,
            b'J' => Self::NegNegVardec,
            b'K' => Self::PosBigint,
            b'L' => Self::NegBigint,
            b'V' => Self::PosPosBigdec,
            b'W' => Self::PosNegBigdec,
            b'X' => Self::NegPosBigdec,
            b'Y' => Self::NegNegBigdec,
            b'B' => Self::BinLpvi,
            b'S' => Self::StrLpvi,
            b'[' => Self::ArrayStart,
            b']' => Self::ArrayEnd,
            other => return Err(ProtocolError::UnknownTag(other)),
        })
    }

    /// The wire byte for this tag.
    #[must_use]
    pub fn to_byte(self) -> u8 {
        self as u8
    }

    /// `true` for every numeric tag (zero, infinities, varint, vardec,
    /// bigint, bigdec).
    #[must_use]
    pub fn is_number(self) -> bool {
        matches!(
            self,
            Self::NegInf
                | Self::PosInf
                | Self::Zero
                | Self::PosVarint
                | Self::NegVarint
                | Self::PosBigint
                | Self::NegBigint
                | Self::PosPosVardec
                | Self::PosNegVardec
                | Self::NegPosVardec
                | Self::NegNegVardec
                | Self::PosPosBigdec
                | Self::PosNegBigdec
                | Self::NegPosBigdec
                | Self::NegNegBigdec
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_tag() {
        for byte in 0u8..=255 {
            if let Ok(tag) = Tag::from_byte(byte) {
                assert_eq!(tag.to_byte(), byte);
            }
        }
        assert_eq!(Tag::from_byte(b'['), Ok(Tag::ArrayStart));
        assert_eq!(Tag::from_byte(0x00), Err(ProtocolError::UnknownTag(0)));
    }

    #[test]
    fn number_tags() {
        assert!(Tag::Zero.is_number());
        assert!(Tag::NegNegBigdec.is_number());
        assert!(!Tag::Null.is_number());
        assert!(!Tag::StrLpvi.is_number());
        assert!(!Tag::ArrayStart.is_number());
    }
}
