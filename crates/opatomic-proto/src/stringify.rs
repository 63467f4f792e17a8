//! Human-readable rendering of encoded values.
//!
//! The output is a superset of JSON: `undefined` and `SORTMAX` tokens,
//! `inf`/`-inf` numbers, and single-quoted binary literals with `\xNN`
//! escapes for bytes that are not printable UTF-8. Strings use
//! double-quoted JSON escapes (control characters as `\u00NN`).

use crate::codec::{decode_number, str_or_bin};
use crate::error::ProtocolError;
use crate::tag::Tag;
use crate::utf8;
use crate::varint;

const HEX: &[u8; 16] = b"0123456789ABCDEF";

fn write_indent(out: &mut String, indent: Option<&str>, depth: usize) {
    if let Some(space) = indent {
        if !space.is_empty() {
            out.push('\n');
            for _ in 0..depth {
                out.push_str(space);
            }
        }
    }
}

fn push_hex_escape(out: &mut String, prefix: &str, byte: u8) {
    out.push_str(prefix);
    out.push(char::from(HEX[usize::from(byte >> 4)]));
    out.push(char::from(HEX[usize::from(byte & 0x0F)]));
}

/// Escape printable text. `is_bin` selects the quoting convention:
/// binary literals escape `'` and render control bytes as `\xNN`, strings
/// escape `"` and render control characters as `\u00NN`.
fn escape_text(s: &str, is_bin: bool, out: &mut String) {
    for ch in s.chars() {
        match ch {
            '"' if !is_bin => out.push_str("\\\""),
            '"' => out.push('"'),
            '\'' if is_bin => out.push_str("\\'"),
            '\'' => out.push('\''),
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            '\n' => out.push_str("\\n"),
            '\u{08}' => out.push_str("\\b"),
            '\u{0C}' => out.push_str("\\f"),
            // 0x7F is technically printable per JSON but usually invisible.
            c if (c as u32) < 0x20 || c == '\u{7F}' => {
                let prefix = if is_bin { "\\x" } else { "\\u00" };
                push_hex_escape(out, prefix, c as u32 as u8);
            },
            c => out.push(c),
        }
    }
}

/// Escape a binary payload: valid UTF-8 runs pass through the text rules,
/// every byte at an invalid position becomes `\xNN`.
fn escape_bin(bytes: &[u8], out: &mut String) {
    let mut rest = bytes;
    loop {
        match utf8::find_invalid(rest) {
            None => {
                if let Ok(text) = std::str::from_utf8(rest) {
                    escape_text(text, true, out);
                }
                return;
            },
            Some(pos) => {
                if let Ok(text) = std::str::from_utf8(&rest[..pos]) {
                    escape_text(text, true, out);
                }
                push_hex_escape(out, "\\x", rest[pos]);
                rest = &rest[pos + 1..];
            },
        }
    }
}

/// Render the encoded value at `src[0]` as text.
///
/// `indent` of `None` (or `Some("")`) produces the compact single-line
/// form; otherwise arrays are pretty-printed one element per line with the
/// given string repeated per nesting level.
///
/// # Errors
///
/// Any [`ProtocolError`] when the bytes are not a well-formed value.
pub fn stringify(src: &[u8], indent: Option<&str>) -> Result<String, ProtocolError> {
    let mut out = String::new();
    // Per open array: whether an element has already been written.
    let mut stack: Vec<bool> = Vec::new();
    let mut i = 0usize;
    loop {
        let byte = *src.get(i).ok_or(ProtocolError::Truncated)?;
        let tag = Tag::from_byte(byte)?;
        if tag == Tag::ArrayEnd {
            stack
                .pop()
                .ok_or(ProtocolError::Malformed("unmatched array end"))?;
            i += 1;
            write_indent(&mut out, indent, stack.len());
            out.push(']');
        } else {
            if let Some(started) = stack.last_mut() {
                if *started {
                    out.push(',');
                }
                *started = true;
                write_indent(&mut out, indent, stack.len());
            }
            match tag {
                Tag::Undefined => {
                    out.push_str("undefined");
                    i += 1;
                },
                Tag::Null => {
                    out.push_str("null");
                    i += 1;
                },
                Tag::False => {
                    out.push_str("false");
                    i += 1;
                },
                Tag::True => {
                    out.push_str("true");
                    i += 1;
                },
                Tag::SortMax => {
                    out.push_str("SORTMAX");
                    i += 1;
                },
                Tag::BinEmpty => {
                    out.push_str("''");
                    i += 1;
                },
                Tag::StrEmpty => {
                    out.push_str("\"\"");
                    i += 1;
                },
                Tag::ArrayEmpty => {
                    out.push_str("[]");
                    i += 1;
                },
                Tag::Zero => {
                    out.push('0');
                    i += 1;
                },
                Tag::NegInf => {
                    out.push_str("-inf");
                    i += 1;
                },
                Tag::PosInf => {
                    out.push_str("inf");
                    i += 1;
                },
                Tag::ArrayStart => {
                    if src.get(i + 1) == Some(&Tag::ArrayEnd.to_byte()) {
                        out.push_str("[]");
                        i += 2;
                    } else {
                        out.push('[');
                        stack.push(false);
                        i += 1;
                        continue;
                    }
                },
                Tag::StrLpvi => {
                    let payload = str_or_bin(&src[i..])?;
                    let text = std::str::from_utf8(payload)
                        .map_err(|_| ProtocolError::InvalidUtf8)?;
                    out.push('"');
                    escape_text(text, false, &mut out);
                    out.push('"');
                    i += 1 + varint::encoded_len(payload.len() as u64) + payload.len();
                },
                Tag::BinLpvi => {
                    let payload = str_or_bin(&src[i..])?;
                    out.push('\'');
                    escape_bin(payload, &mut out);
                    out.push('\'');
                    i += 1 + varint::encoded_len(payload.len() as u64) + payload.len();
                },
                _ => {
                    let (number, used) = decode_number(&src[i..])?;
                    out.push_str(&number.to_string());
                    i += used;
                },
            }
        }
        if stack.is_empty() {
            return Ok(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_value;
    use crate::value::Value;
    use crate::Number;

    fn encoded(value: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        encode_value(value, &mut out);
        out
    }

    #[test]
    fn scalars() {
        assert_eq!(stringify(b"U", None).expect("ok"), "undefined");
        assert_eq!(stringify(b"N", None).expect("ok"), "null");
        assert_eq!(stringify(b"Z", None).expect("ok"), "SORTMAX");
        assert_eq!(stringify(b"O", None).expect("ok"), "0");
        assert_eq!(stringify(b"P", None).expect("ok"), "-inf");
        assert_eq!(stringify(b"Q", None).expect("ok"), "inf");
        assert_eq!(stringify(b"R", None).expect("ok"), "\"\"");
        assert_eq!(stringify(b"A", None).expect("ok"), "''");
        assert_eq!(stringify(b"M", None).expect("ok"), "[]");
        assert_eq!(stringify(b"[]", None).expect("ok"), "[]");
    }

    #[test]
    fn string_escapes() {
        let bytes = encoded(&Value::from("a\"b\\c\nd\u{01}e'f"));
        assert_eq!(
            stringify(&bytes, None).expect("ok"),
            r#""a\"b\\c\nd\u0001e'f""#
        );
    }

    #[test]
    fn binary_escapes() {
        let bytes = encoded(&Value::from(vec![b'o', b'k', 0xFF, b'\'', 0x00, 0xC3, 0xA9]));
        // 0xFF is invalid UTF-8, 0x00 is a control byte, C3 A9 is a valid
        // two-byte sequence and passes through raw.
        assert_eq!(
            stringify(&bytes, None).expect("ok"),
            "'ok\\xFF\\'\\x00\u{E9}'"
        );
    }

    #[test]
    fn numbers() {
        let bytes = encoded(&Value::Num("1.25e-3".parse::<Number>().expect("valid")));
        assert_eq!(stringify(&bytes, None).expect("ok"), "0.00125");
        let bytes = encoded(&Value::from(-42i64));
        assert_eq!(stringify(&bytes, None).expect("ok"), "-42");
    }

    #[test]
    fn compact_array() {
        let value = Value::Array(vec![
            Value::from(1i64),
            Value::from("hi"),
            Value::Array(vec![Value::Null]),
        ]);
        assert_eq!(stringify(&encoded(&value), None).expect("ok"), "[1,\"hi\",[null]]");
    }

    #[test]
    fn pretty_array() {
        let value = Value::Array(vec![
            Value::from(1i64),
            Value::Array(vec![Value::from("x"), Value::Bool(true)]),
            Value::Array(Vec::new()),
        ]);
        insta::assert_snapshot!(
            stringify(&encoded(&value), Some("  ")).expect("ok"),
            @r#"
        [
          1,
          [
            "x",
            true
          ],
          []
        ]
        "#
        );
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(stringify(b"x", None), Err(ProtocolError::UnknownTag(b'x')));
        assert_eq!(stringify(b"[N", None), Err(ProtocolError::Truncated));
        assert_eq!(stringify(b"]", None), Err(ProtocolError::Malformed("unmatched array end")));
    }
}
