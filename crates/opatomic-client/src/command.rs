//! User command parser.
//!
//! Turns a human-typed command line into a well-formed request. The grammar
//! is forgiving: whitespace and commas separate tokens, `"..."` is a string,
//! `'...'` is a binary literal, `[`/`]` build nested arrays, `//` and
//! `/* */` are comments. Case-sensitive keywords (`undefined`, `null`,
//! `true`, `false`, `SORTMAX`) and case-insensitive infinities map to their
//! sentinels; bare tokens matching the numeric grammar become numbers,
//! anything else becomes a string.
//!
//! ```text
//! PING              -> [null, "PING", []]
//! ECHO hi           -> [null, "ECHO", ["hi"]]
//! ECHO [a [] b] 1   -> [null, "ECHO", [["a", [], "b"], 1]]
//! ```

use opatomic_num::is_inf_str;
use opatomic_proto::Tag;

use crate::builder::RequestBuilder;
use crate::error::BuildError;
use crate::request::Request;

fn hex_val(byte: u8) -> Option<u32> {
    match byte {
        b'0'..=b'9' => Some(u32::from(byte - b'0')),
        b'A'..=b'F' => Some(u32::from(byte - b'A') + 10),
        b'a'..=b'f' => Some(u32::from(byte - b'a') + 10),
        _ => None,
    }
}

fn is_alphanum(byte: u8) -> bool {
    byte.is_ascii_alphanumeric()
}

/// Which characters may follow a backslash. Alphanumerics are reserved for
/// named escapes, control characters cannot be escaped at all (except
/// space), and everything else stands for itself.
fn is_valid_escape_char(byte: u8) -> bool {
    if is_alphanum(byte) {
        matches!(byte, b'b' | b'f' | b'n' | b'r' | b't' | b'u' | b'x')
    } else if byte >= 0x80 {
        false
    } else if byte <= 0x20 {
        byte == b' '
    } else {
        byte != 0x7F
    }
}

fn push_code_point(out: &mut Vec<u8>, code: u32) {
    if code < 0x80 {
        out.push(code as u8);
    } else if code < 0x800 {
        out.push(0xC0 | ((code >> 6) & 0x1F) as u8);
        out.push(0x80 | (code & 0x3F) as u8);
    } else if code < 0x1_0000 {
        out.push(0xE0 | ((code >> 12) & 0x0F) as u8);
        out.push(0x80 | ((code >> 6) & 0x3F) as u8);
        out.push(0x80 | (code & 0x3F) as u8);
    } else {
        out.push(0xF0 | ((code >> 18) & 0x07) as u8);
        out.push(0x80 | ((code >> 12) & 0x3F) as u8);
        out.push(0x80 | ((code >> 6) & 0x3F) as u8);
        out.push(0x80 | (code & 0x3F) as u8);
    }
}

fn hex4(s: &[u8], at: usize) -> Option<u32> {
    let a = hex_val(*s.get(at)?)?;
    let b = hex_val(*s.get(at + 1)?)?;
    let c = hex_val(*s.get(at + 2)?)?;
    let d = hex_val(*s.get(at + 3)?)?;
    Some((a << 12) | (b << 8) | (c << 4) | d)
}

/// Resolve backslash escapes into raw bytes. `\uNNNN` emits UTF-8 and
/// understands UTF-16 surrogate pairs; `\xNN` emits a single raw byte.
fn unescape(s: &[u8]) -> Result<Vec<u8>, BuildError> {
    const BAD: BuildError = BuildError::Parse("invalid escape sequence");
    let mut out = Vec::with_capacity(s.len());
    let mut i = 0usize;
    while i < s.len() {
        let ch = s[i];
        if ch != b'\\' {
            out.push(ch);
            i += 1;
            continue;
        }
        i += 1;
        let &esc = s.get(i).ok_or(BAD)?;
        if !is_valid_escape_char(esc) {
            return Err(BAD);
        }
        match esc {
            b'b' => {
                out.push(0x08);
                i += 1;
            },
            b'f' => {
                out.push(0x0C);
                i += 1;
            },
            b'n' => {
                out.push(b'\n');
                i += 1;
            },
            b'r' => {
                out.push(b'\r');
                i += 1;
            },
            b't' => {
                out.push(b'\t');
                i += 1;
            },
            b'x' => {
                let hi = s.get(i + 1).copied().and_then(hex_val).ok_or(BAD)?;
                let lo = s.get(i + 2).copied().and_then(hex_val).ok_or(BAD)?;
                out.push(((hi << 4) | lo) as u8);
                i += 3;
            },
            b'u' => {
                let code = hex4(s, i + 1).ok_or(BAD)?;
                if (0xD800..=0xDFFF).contains(&code) {
                    // Surrogate pair: a low half alone is invalid, a high
                    // half must be chased by an escaped low half.
                    if code >= 0xDC00 {
                        return Err(BAD);
                    }
                    if s.get(i + 5) != Some(&b'\\') || s.get(i + 6) != Some(&b'u') {
                        return Err(BAD);
                    }
                    let low = hex4(s, i + 7).ok_or(BAD)?;
                    if !(0xDC00..=0xDFFF).contains(&low) {
                        return Err(BAD);
                    }
                    let combined = (((code & 0x3FF) << 10) | (low & 0x3FF)) + 0x1_0000;
                    push_code_point(&mut out, combined);
                    i += 11;
                } else {
                    push_code_point(&mut out, code);
                    i += 5;
                }
            },
            other => {
                out.push(other);
                i += 1;
            },
        }
    }
    Ok(out)
}

/// The numeric token grammar: optional `-`, digits, optional `.` with at
/// least one following digit (before the exponent), optional `e`/`E`
/// exponent with optional sign and at least one digit.
fn is_num_str(s: &[u8]) -> bool {
    let mut i = 0usize;
    if s.first() == Some(&b'-') {
        i += 1;
    }
    match s.get(i) {
        Some(d) if d.is_ascii_digit() => i += 1,
        _ => return false,
    }
    let mut saw_dot = false;
    let mut saw_exp = false;
    while i < s.len() {
        let ch = s[i];
        if !ch.is_ascii_digit() {
            if !saw_exp && (ch == b'e' || ch == b'E') {
                saw_exp = true;
                if matches!(s.get(i + 1), Some(b'-' | b'+')) {
                    i += 1;
                }
                if i + 1 >= s.len() {
                    return false;
                }
            } else if !saw_exp && !saw_dot && ch == b'.' {
                saw_dot = true;
                if i + 1 >= s.len() {
                    return false;
                }
            } else {
                return false;
            }
        }
        i += 1;
    }
    true
}

/// End offset of the bare token starting at `start`: alphanumerics, bytes
/// outside ASCII, `_ . - +`, and backslash escapes.
fn find_token_end(s: &[u8], start: usize) -> usize {
    let mut i = start;
    while i < s.len() {
        let ch = s[i];
        if is_alphanum(ch) || ch >= 0x80 || matches!(ch, b'_' | b'.' | b'-' | b'+') {
            i += 1;
        } else if ch == b'\\' && i + 1 < s.len() {
            i += 2;
        } else {
            break;
        }
    }
    i
}

/// Offset of the closing quote, skipping escaped characters.
fn find_quote_end(s: &[u8], start: usize, quote: u8) -> Option<usize> {
    let mut i = start;
    while i < s.len() {
        if s[i] == quote {
            return Some(i);
        }
        if s[i] == b'\\' {
            i += 1;
            if i >= s.len() {
                return None;
            }
        }
        i += 1;
    }
    None
}

fn keyword_tag(token: &[u8]) -> Option<Tag> {
    match token {
        b"undefined" => Some(Tag::Undefined),
        b"null" => Some(Tag::Null),
        b"false" => Some(Tag::False),
        b"true" => Some(Tag::True),
        b"SORTMAX" => Some(Tag::SortMax),
        _ => None,
    }
}

fn add_unescaped_str(builder: &mut RequestBuilder, raw: &[u8]) -> Result<(), BuildError> {
    let text = std::str::from_utf8(raw)
        .map_err(|_| BuildError::Parse("invalid utf-8 bytes in string"))?;
    builder.add_str(text);
    Ok(())
}

fn add_token(builder: &mut RequestBuilder, token: &[u8]) -> Result<(), BuildError> {
    if let Some(tag) = keyword_tag(token) {
        builder.add_so(&[tag.to_byte()]);
        return Ok(());
    }
    if let Ok(text) = std::str::from_utf8(token) {
        if let Some(sign) = is_inf_str(text) {
            let tag = match sign {
                opatomic_num::Sign::Neg => Tag::NegInf,
                opatomic_num::Sign::Pos => Tag::PosInf,
            };
            builder.add_so(&[tag.to_byte()]);
            return Ok(());
        }
        if is_num_str(token) {
            builder.add_num_str(text);
            return Ok(());
        }
    }
    add_unescaped_str(builder, &unescape(token)?)
}

/// Parse a command line into a request with a `NULL` async-id placeholder.
/// The first token is the command; everything after it lands in the args
/// array.
///
/// # Errors
///
/// `Parse` with a description of the offending construct, or whatever the
/// builder reports at [`finish`](RequestBuilder::finish).
pub fn parse_user_command(input: &str) -> Result<Request, BuildError> {
    let bytes = input.as_bytes();
    let mut builder = RequestBuilder::new();
    let mut depth = 0u32;
    let mut i = 0usize;
    while let Some(&ch) = bytes.get(i) {
        match ch {
            b'"' | b'\'' => {
                i += 1;
                let end = find_quote_end(bytes, i, ch)
                    .ok_or(BuildError::Parse("string or bin end char not found"))?;
                let raw = unescape(&bytes[i..end])?;
                if ch == b'\'' {
                    builder.add_bin(&raw);
                } else {
                    add_unescaped_str(&mut builder, &raw)?;
                }
                i = end + 1;
            },
            b'/' => match bytes.get(i + 1) {
                Some(b'/') => {
                    match bytes[i + 2..].iter().position(|&b| b == b'\n') {
                        Some(pos) => i += 2 + pos + 1,
                        None => break,
                    }
                },
                Some(b'*') => {
                    match bytes[i + 2..].windows(2).position(|w| w == b"*/") {
                        Some(pos) => i += 2 + pos + 2,
                        None => {
                            return Err(BuildError::Parse(
                                "end of comment \"*/\" not found",
                            ));
                        },
                    }
                },
                _ => {
                    return Err(BuildError::Parse(
                        "the / character must be inside quotes, escaped, or used as comment",
                    ));
                },
            },
            b'[' => {
                builder.start_array();
                depth += 1;
                i += 1;
            },
            b']' => {
                if depth == 0 {
                    return Err(BuildError::Parse("extra array end token ']'"));
                }
                builder.stop_array();
                depth -= 1;
                i += 1;
            },
            b',' | b' ' | b'\t' | b'\r' | b'\n' => i += 1,
            _ => {
                let end = find_token_end(bytes, i);
                if end == i {
                    return Err(BuildError::Parse(
                        "reserved/special/control characters must be inside quotes or escaped",
                    ));
                }
                add_token(&mut builder, &bytes[i..end])?;
                i = end;
            },
        }
    }
    if depth > 0 {
        return Err(BuildError::Parse("array end token ']' not found"));
    }
    builder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Vec<u8> {
        parse_user_command(input).expect("valid command").request_bytes().to_vec()
    }

    fn parse_err(input: &str) -> &'static str {
        match parse_user_command(input) {
            Err(BuildError::Parse(desc)) => desc,
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn bare_command() {
        assert_eq!(parse("PING"), b"[NS\x04PINGM]");
        assert_eq!(parse("  PING , "), b"[NS\x04PINGM]");
    }

    #[test]
    fn args_and_arrays() {
        assert_eq!(parse("ECHO hi"), b"[NS\x04ECHO[S\x02hi]]");
        assert_eq!(parse("ECHO [arg1[]arg3]"), b"[NS\x04ECHO[[S\x04arg1MS\x04arg3]]]");
    }

    #[test]
    fn keywords_and_numbers() {
        assert_eq!(parse("CMD null true SORTMAX"), b"[NS\x03CMD[NTZ]]");
        assert_eq!(parse("CMD -INFINITY inf"), b"[NS\x03CMD[PQ]]");
        assert_eq!(parse("CMD 42 -1 1.25e-3"), b"[NS\x03CMD[D\x2AE\x01I\x05\x7D]]");
        // Keywords are case-sensitive; mismatches become strings.
        assert_eq!(parse("CMD Null"), b"[NS\x03CMD[S\x04Null]]");
    }

    #[test]
    fn quoted_strings_and_bins() {
        assert_eq!(parse(r#"CMD "a b""#), b"[NS\x03CMD[S\x03a b]]");
        assert_eq!(parse("CMD 'a\\xFF'"), b"[NS\x03CMD[B\x02a\xFF]]");
        assert_eq!(parse(r#"CMD "\u0041\u00e9""#), b"[NS\x03CMD[S\x03A\xC3\xA9]]");
        // Surrogate pair for U+1F600.
        assert_eq!(
            parse(r#"CMD "\uD83D\uDE00""#),
            b"[NS\x03CMD[S\x04\xF0\x9F\x98\x80]]"
        );
    }

    #[test]
    fn escaped_bare_tokens() {
        assert_eq!(parse(r"CMD a\ b"), b"[NS\x03CMD[S\x03a b]]");
        assert_eq!(parse(r"CMD \[x\]"), b"[NS\x03CMD[S\x03[x]]]");
    }

    #[test]
    fn comments() {
        assert_eq!(parse("CMD // trailing"), b"[NS\x03CMDM]");
        assert_eq!(parse("CMD /* x */ arg"), b"[NS\x03CMD[S\x03arg]]");
        assert_eq!(parse("CMD // line\narg"), b"[NS\x03CMD[S\x03arg]]");
    }

    #[test]
    fn error_descriptions() {
        assert_eq!(parse_err("CMD \"unterminated"), "string or bin end char not found");
        assert_eq!(parse_err("CMD /* open"), "end of comment \"*/\" not found");
        assert_eq!(
            parse_err("CMD /x"),
            "the / character must be inside quotes, escaped, or used as comment"
        );
        assert_eq!(parse_err("CMD ]"), "extra array end token ']'");
        assert_eq!(parse_err("CMD ["), "array end token ']' not found");
        assert_eq!(parse_err("CMD (x)"), "reserved/special/control characters must be inside quotes or escaped");
        assert_eq!(parse_err(r#"CMD "\q""#), "invalid escape sequence");
        assert_eq!(parse_err(r#"CMD "\uDC00""#), "invalid escape sequence");
        assert_eq!(parse_err("CMD '\\xZZ'"), "invalid escape sequence");
        assert_eq!(parse_err("CMD \"\\xC3\""), "invalid utf-8 bytes in string");
    }

    #[test]
    fn empty_input_is_an_empty_request() {
        assert!(matches!(
            parse_user_command("   // nothing\n"),
            Err(BuildError::InvalidState("empty request"))
        ));
    }
}
