//! SO encode/decode and length computation.
//!
//! Encoding is total and canonical: the most compact wire form is chosen
//! for every value (empty-collection tags, varint before bigint). Decoding
//! enforces canonical varints, minimal big-integer magnitudes, exponent
//! bounds, and string UTF-8. Both directions are iterative so hostile
//! nesting depth cannot exhaust the call stack.

use opatomic_num::{BigInt, Sign};

use crate::error::ProtocolError;
use crate::tag::Tag;
use crate::value::Value;
use crate::varint;
use crate::{NumInt, Number};

/// On-wire byte length of the encoded value starting at `buf[0]`.
///
/// Arrays are traversed to their matching `ARRAY_END`. The input is
/// expected to be well-formed (run the framer first on untrusted bytes);
/// corrupt input yields an error rather than a bogus length.
///
/// # Errors
///
/// `Truncated`, `UnknownTag`, `InvalidVarint`, or `Malformed` when the
/// buffer does not hold a complete value.
pub fn so_len(buf: &[u8]) -> Result<usize, ProtocolError> {
    let mut i = 0usize;
    let mut depth = 0u64;
    loop {
        let tag = Tag::from_byte(*buf.get(i).ok_or(ProtocolError::Truncated)?)?;
        i += 1;
        match tag {
            Tag::Undefined
            | Tag::Null
            | Tag::False
            | Tag::True
            | Tag::SortMax
            | Tag::BinEmpty
            | Tag::StrEmpty
            | Tag::ArrayEmpty
            | Tag::NegInf
            | Tag::PosInf
            | Tag::Zero => {},
            Tag::PosVarint | Tag::NegVarint => {
                i += varint_len_at(buf, i)?;
            },
            Tag::BinLpvi | Tag::StrLpvi | Tag::PosBigint | Tag::NegBigint => {
                i = skip_len_prefixed(buf, i)?;
            },
            Tag::PosPosVardec | Tag::PosNegVardec | Tag::NegPosVardec | Tag::NegNegVardec => {
                i += varint_len_at(buf, i)?;
                i += varint_len_at(buf, i)?;
            },
            Tag::PosPosBigdec | Tag::PosNegBigdec | Tag::NegPosBigdec | Tag::NegNegBigdec => {
                i += varint_len_at(buf, i)?;
                i = skip_len_prefixed(buf, i)?;
            },
            Tag::ArrayStart => {
                depth += 1;
                continue;
            },
            Tag::ArrayEnd => {
                if depth == 0 {
                    return Err(ProtocolError::Malformed("unmatched array end"));
                }
                depth -= 1;
            },
        }
        if depth == 0 {
            return Ok(i);
        }
    }
}

fn varint_len_at(buf: &[u8], at: usize) -> Result<usize, ProtocolError> {
    let rest = buf.get(at..).ok_or(ProtocolError::Truncated)?;
    varint::stored_len(rest).ok_or(ProtocolError::Truncated)
}

/// Past-the-end index of a varint length prefix plus that many raw bytes.
fn skip_len_prefixed(buf: &[u8], at: usize) -> Result<usize, ProtocolError> {
    let rest = buf.get(at..).ok_or(ProtocolError::Truncated)?;
    let (count, used) = varint::decode(rest)?;
    let count = usize::try_from(count).map_err(|_| ProtocolError::Truncated)?;
    if rest.len() - used < count {
        return Err(ProtocolError::Truncated);
    }
    Ok(at + used + count)
}

/// Payload bytes of a string or binary object (empty slice for the
/// dedicated empty tags).
///
/// # Errors
///
/// `Malformed` when the object is not a string or binary; `Truncated` or
/// `InvalidVarint` when the length prefix is broken.
pub fn str_or_bin(buf: &[u8]) -> Result<&[u8], ProtocolError> {
    match Tag::from_byte(*buf.first().ok_or(ProtocolError::Truncated)?)? {
        Tag::StrEmpty | Tag::BinEmpty => Ok(&[]),
        Tag::StrLpvi | Tag::BinLpvi => {
            let rest = buf.get(1..).ok_or(ProtocolError::Truncated)?;
            let (count, used) = varint::decode(rest)?;
            let count = usize::try_from(count).map_err(|_| ProtocolError::Truncated)?;
            rest.get(used..used + count).ok_or(ProtocolError::Truncated)
        },
        _ => Err(ProtocolError::Malformed("not a string or binary")),
    }
}

/// Decode the exponent varint of a vardec/bigdec. The magnitude bound is
/// `2^31` for a negative exponent (`i32::MIN` is representable) and
/// `2^31 - 1` for a positive one.
fn decode_exponent(
    buf: &[u8],
    i: &mut usize,
    negative: bool,
) -> Result<i32, ProtocolError> {
    let rest = buf.get(*i..).ok_or(ProtocolError::Truncated)?;
    let (magnitude, used) = varint::decode(rest)?;
    let limit = if negative {
        u64::from(i32::MAX as u32) + 1
    } else {
        u64::from(i32::MAX as u32)
    };
    if magnitude > limit {
        return Err(ProtocolError::ExponentRange);
    }
    *i += used;
    let exp = if negative { -(magnitude as i64) } else { magnitude as i64 };
    Ok(exp as i32)
}

/// Decode a big-integer magnitude (varint byte count + big-endian bytes).
/// The count must be at least one and the magnitude minimal.
fn decode_magnitude(buf: &[u8], i: &mut usize) -> Result<NumInt, ProtocolError> {
    let rest = buf.get(*i..).ok_or(ProtocolError::Truncated)?;
    let (count, used) = varint::decode(rest)?;
    if count == 0 {
        return Err(ProtocolError::BigIntLen);
    }
    let count = usize::try_from(count).map_err(|_| ProtocolError::Truncated)?;
    let bytes = rest.get(used..used + count).ok_or(ProtocolError::Truncated)?;
    if count > 1 && bytes[0] == 0 {
        return Err(ProtocolError::BigIntLeadingZero);
    }
    *i += used + count;
    Ok(NumInt::from_magnitude_be(bytes))
}

/// Decode the number whose tag byte sits at `buf[0]`, returning the value
/// and the encoded length.
///
/// # Errors
///
/// `Malformed` when the tag is not numeric, plus the usual decode errors.
pub fn decode_number(buf: &[u8]) -> Result<(Number, usize), ProtocolError> {
    let tag = Tag::from_byte(*buf.first().ok_or(ProtocolError::Truncated)?)?;
    let mut i = 1usize;
    let number = match tag {
        Tag::Zero => Number::zero(),
        Tag::NegInf => Number::infinity(Sign::Neg),
        Tag::PosInf => Number::infinity(Sign::Pos),
        Tag::PosVarint | Tag::NegVarint => {
            let rest = buf.get(i..).ok_or(ProtocolError::Truncated)?;
            let (magnitude, used) = varint::decode(rest)?;
            i += used;
            Number::from_u64(magnitude, tag == Tag::NegVarint, 0)
        },
        Tag::PosPosVardec | Tag::PosNegVardec | Tag::NegPosVardec | Tag::NegNegVardec => {
            let neg_exp = matches!(tag, Tag::NegPosVardec | Tag::NegNegVardec);
            let neg_man = matches!(tag, Tag::PosNegVardec | Tag::NegNegVardec);
            let exp = decode_exponent(buf, &mut i, neg_exp)?;
            let rest = buf.get(i..).ok_or(ProtocolError::Truncated)?;
            let (magnitude, used) = varint::decode(rest)?;
            i += used;
            Number::from_u64(magnitude, neg_man, exp)
        },
        Tag::PosBigint | Tag::NegBigint => {
            let mut sig = decode_magnitude(buf, &mut i)?;
            if tag == Tag::NegBigint {
                sig.negate_in_place();
            }
            Number::from_parts(sig, 0)
        },
        Tag::PosPosBigdec | Tag::PosNegBigdec | Tag::NegPosBigdec | Tag::NegNegBigdec => {
            let neg_exp = matches!(tag, Tag::NegPosBigdec | Tag::NegNegBigdec);
            let neg_man = matches!(tag, Tag::PosNegBigdec | Tag::NegNegBigdec);
            let exp = decode_exponent(buf, &mut i, neg_exp)?;
            let mut sig = decode_magnitude(buf, &mut i)?;
            if neg_man {
                sig.negate_in_place();
            }
            Number::from_parts(sig, exp)
        },
        _ => return Err(ProtocolError::Malformed("not a number")),
    };
    Ok((number, i))
}

/// Append the canonical encoding of `number` to `out`.
///
/// Selection rules: infinity and zero get their one-byte tags; a
/// significand under 64 bits gets a varint (exponent zero) or vardec
/// (exponent nonzero); everything else gets bigint/bigdec. The tag byte
/// alone carries both signs.
pub fn encode_number(number: &Number, out: &mut Vec<u8>) {
    if let Some(sign) = number.infinity_sign() {
        out.push(match sign {
            Sign::Neg => Tag::NegInf,
            Sign::Pos => Tag::PosInf,
        }.to_byte());
        return;
    }
    if number.is_zero() {
        out.push(Tag::Zero.to_byte());
        return;
    }
    let sig = number.significand();
    let negative = sig.is_negative();
    let exp = number.exponent();
    if sig.bit_count() < 64 {
        let magnitude = sig.magnitude_u64();
        if exp == 0 {
            out.push(if negative { Tag::NegVarint } else { Tag::PosVarint }.to_byte());
            varint::write(magnitude, out);
        } else {
            out.push(vardec_tag(exp < 0, negative).to_byte());
            varint::write(u64::from(exp.unsigned_abs()), out);
            varint::write(magnitude, out);
        }
    } else if exp == 0 {
        out.push(if negative { Tag::NegBigint } else { Tag::PosBigint }.to_byte());
        write_magnitude(sig, out);
    } else {
        out.push(bigdec_tag(exp < 0, negative).to_byte());
        varint::write(u64::from(exp.unsigned_abs()), out);
        write_magnitude(sig, out);
    }
}

fn vardec_tag(neg_exp: bool, neg_man: bool) -> Tag {
    match (neg_exp, neg_man) {
        (false, false) => Tag::PosPosVardec,
        (false, true) => Tag::PosNegVardec,
        (true, false) => Tag::NegPosVardec,
        (true, true) => Tag::NegNegVardec,
    }
}

fn bigdec_tag(neg_exp: bool, neg_man: bool) -> Tag {
    match (neg_exp, neg_man) {
        (false, false) => Tag::PosPosBigdec,
        (false, true) => Tag::PosNegBigdec,
        (true, false) => Tag::NegPosBigdec,
        (true, true) => Tag::NegNegBigdec,
    }
}

fn write_magnitude(sig: &NumInt, out: &mut Vec<u8>) {
    let bytes = sig.magnitude_be();
    varint::write(bytes.len() as u64, out);
    out.extend_from_slice(&bytes);
}

fn write_len_prefixed(tag: Tag, payload: &[u8], out: &mut Vec<u8>) {
    out.push(tag.to_byte());
    varint::write(payload.len() as u64, out);
    out.extend_from_slice(payload);
}

/// Append the canonical encoding of `value` to `out`.
///
/// Total: every [`Value`] is encodable. Empty strings, binaries, and
/// arrays use their dedicated one-byte tags.
pub fn encode_value(value: &Value, out: &mut Vec<u8>) {
    let mut stack: Vec<std::slice::Iter<'_, Value>> = Vec::new();
    let mut pending = Some(value);
    loop {
        if let Some(current) = pending.take() {
            match current {
                Value::Undefined => out.push(Tag::Undefined.to_byte()),
                Value::Null => out.push(Tag::Null.to_byte()),
                Value::Bool(false) => out.push(Tag::False.to_byte()),
                Value::Bool(true) => out.push(Tag::True.to_byte()),
                Value::SortMax => out.push(Tag::SortMax.to_byte()),
                Value::Num(number) => encode_number(number, out),
                Value::Str(s) if s.is_empty() => out.push(Tag::StrEmpty.to_byte()),
                Value::Str(s) => write_len_prefixed(Tag::StrLpvi, s.as_bytes(), out),
                Value::Bin(b) if b.is_empty() => out.push(Tag::BinEmpty.to_byte()),
                Value::Bin(b) => write_len_prefixed(Tag::BinLpvi, b, out),
                Value::Array(items) if items.is_empty() => {
                    out.push(Tag::ArrayEmpty.to_byte());
                },
                Value::Array(items) => {
                    out.push(Tag::ArrayStart.to_byte());
                    stack.push(items.iter());
                },
            }
        } else {
            match stack.last_mut() {
                None => return,
                Some(iter) => match iter.next() {
                    Some(next) => pending = Some(next),
                    None => {
                        out.push(Tag::ArrayEnd.to_byte());
                        stack.pop();
                    },
                },
            }
        }
    }
}

/// Decode the value starting at `buf[0]`, returning it and the number of
/// bytes consumed.
///
/// Enforces everything the wire contract demands: canonical varints,
/// minimal magnitudes, exponent bounds, UTF-8 strings. `ARRAY_START`
/// immediately followed by `ARRAY_END` is accepted as an empty array even
/// though the canonical encoding is the dedicated tag.
///
/// # Errors
///
/// Any [`ProtocolError`] flavor matching the violated rule.
pub fn decode_value(buf: &[u8]) -> Result<(Value, usize), ProtocolError> {
    let mut stack: Vec<Vec<Value>> = Vec::new();
    let mut i = 0usize;
    loop {
        let tag = Tag::from_byte(*buf.get(i).ok_or(ProtocolError::Truncated)?)?;
        let value = match tag {
            Tag::Undefined => {
                i += 1;
                Value::Undefined
            },
            Tag::Null => {
                i += 1;
                Value::Null
            },
            Tag::False => {
                i += 1;
                Value::Bool(false)
            },
            Tag::True => {
                i += 1;
                Value::Bool(true)
            },
            Tag::SortMax => {
                i += 1;
                Value::SortMax
            },
            Tag::StrEmpty => {
                i += 1;
                Value::Str(String::new())
            },
            Tag::BinEmpty => {
                i += 1;
                Value::Bin(Vec::new())
            },
            Tag::ArrayEmpty => {
                i += 1;
                Value::Array(Vec::new())
            },
            Tag::Zero
            | Tag::NegInf
            | Tag::PosInf
            | Tag::PosVarint
            | Tag::NegVarint
            | Tag::PosPosVardec
            | Tag::PosNegVardec
            | Tag::NegPosVardec
            | Tag::NegNegVardec
            | Tag::PosBigint
            | Tag::NegBigint
            | Tag::PosPosBigdec
            | Tag::PosNegBigdec
            | Tag::NegPosBigdec
            | Tag::NegNegBigdec => {
                let (number, used) = decode_number(&buf[i..])?;
                i += used;
                Value::Num(number)
            },
            Tag::BinLpvi => {
                let payload = str_or_bin(&buf[i..])?;
                i += 1 + varint::encoded_len(payload.len() as u64) + payload.len();
                Value::Bin(payload.to_vec())
            },
            Tag::StrLpvi => {
                let payload = str_or_bin(&buf[i..])?;
                let text = std::str::from_utf8(payload)
                    .map_err(|_| ProtocolError::InvalidUtf8)?;
                i += 1 + varint::encoded_len(payload.len() as u64) + payload.len();
                Value::Str(text.to_string())
            },
            Tag::ArrayStart => {
                i += 1;
                stack.push(Vec::new());
                continue;
            },
            Tag::ArrayEnd => {
                i += 1;
                let items = stack
                    .pop()
                    .ok_or(ProtocolError::Malformed("unmatched array end"))?;
                Value::Array(items)
            },
        };
        match stack.last_mut() {
            Some(top) => top.push(value),
            None => return Ok((value, i)),
        }
    }
}
