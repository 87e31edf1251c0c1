//! A hand-written lexer for CEL source.
//!
//! Produces a flat token stream with byte-offset spans. This replaces
//! the published ANTLR grammar's generated lexer (see §9 design notes
//! in SPEC_FULL.md): a hand-rolled scanner is equivalent for this
//! grammar and removes a large generated-code dependency.

use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Tok {
    Int(i64),
    UInt(u64),
    Double(f64),
    Str(Arc<str>),
    Bytes(Arc<[u8]>),
    Ident(Arc<str>),
    True,
    False,
    Null,
    In,
    As,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Dot,
    Comma,
    Colon,
    Question,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Eof,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tok: Tok,
    pub offset: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LexError {
    pub offset: u32,
    pub message: String,
}

pub fn lex(src: &str) -> Result<Vec<Token>, LexError> {
    let bytes = src.as_bytes();
    let mut i = 0usize;
    let mut out = Vec::new();

    macro_rules! push {
        ($tok:expr, $off:expr) => {
            out.push(Token { tok: $tok, offset: $off as u32 })
        };
    }

    while i < bytes.len() {
        let start = i;
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\r' | b'\n' => {
                i += 1;
            }
            b'/' if bytes.get(i + 1) == Some(&b'/') => {
                while i < bytes.len() && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'(' => {
                push!(Tok::LParen, start);
                i += 1;
            }
            b')' => {
                push!(Tok::RParen, start);
                i += 1;
            }
            b'[' => {
                push!(Tok::LBracket, start);
                i += 1;
            }
            b']' => {
                push!(Tok::RBracket, start);
                i += 1;
            }
            b'{' => {
                push!(Tok::LBrace, start);
                i += 1;
            }
            b'}' => {
                push!(Tok::RBrace, start);
                i += 1;
            }
            b'.' if !bytes.get(i + 1).is_some_and(u8::is_ascii_digit) => {
                push!(Tok::Dot, start);
                i += 1;
            }
            b',' => {
                push!(Tok::Comma, start);
                i += 1;
            }
            b':' => {
                push!(Tok::Colon, start);
                i += 1;
            }
            b'?' => {
                push!(Tok::Question, start);
                i += 1;
            }
            b'+' => {
                push!(Tok::Plus, start);
                i += 1;
            }
            b'-' => {
                push!(Tok::Minus, start);
                i += 1;
            }
            b'*' => {
                push!(Tok::Star, start);
                i += 1;
            }
            b'/' => {
                push!(Tok::Slash, start);
                i += 1;
            }
            b'%' => {
                push!(Tok::Percent, start);
                i += 1;
            }
            b'!' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    push!(Tok::Ne, start);
                    i += 2;
                } else {
                    push!(Tok::Bang, start);
                    i += 1;
                }
            }
            b'=' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    push!(Tok::Eq, start);
                    i += 2;
                } else {
                    return Err(LexError {
                        offset: start as u32,
                        message: "unexpected '='; did you mean '=='?".into(),
                    });
                }
            }
            b'<' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    push!(Tok::Le, start);
                    i += 2;
                } else {
                    push!(Tok::Lt, start);
                    i += 1;
                }
            }
            b'>' => {
                if bytes.get(i + 1) == Some(&b'=') {
                    push!(Tok::Ge, start);
                    i += 2;
                } else {
                    push!(Tok::Gt, start);
                    i += 1;
                }
            }
            b'&' if bytes.get(i + 1) == Some(&b'&') => {
                push!(Tok::AndAnd, start);
                i += 2;
            }
            b'|' if bytes.get(i + 1) == Some(&b'|') => {
                push!(Tok::OrOr, start);
                i += 2;
            }
            b'"' | b'\'' => {
                let (tok, next) = lex_string(src, i, false, false)?;
                push!(tok, start);
                i = next;
            }
            b'r' | b'R' if matches!(bytes.get(i + 1), Some(b'"') | Some(b'\'')) => {
                let (tok, next) = lex_string(src, i + 1, true, false)?;
                push!(tok, start);
                i = next;
            }
            b'b' | b'B' if matches!(bytes.get(i + 1), Some(b'"') | Some(b'\'')) => {
                let (tok, next) = lex_string(src, i + 1, false, true)?;
                push!(tok, start);
                i = next;
            }
            b'0'..=b'9' => {
                let (tok, next) = lex_number(src, i)?;
                push!(tok, start);
                i = next;
            }
            c if c == b'_' || c.is_ascii_alphabetic() => {
                let next = advance_ident(bytes, i);
                let word = &src[i..next];
                let tok = match word {
                    "true" => Tok::True,
                    "false" => Tok::False,
                    "null" => Tok::Null,
                    "in" => Tok::In,
                    "as" => Tok::As,
                    _ => Tok::Ident(Arc::from(word)),
                };
                push!(tok, start);
                i = next;
            }
            _ => {
                return Err(LexError {
                    offset: start as u32,
                    message: format!("unexpected character '{}'", c as char),
                });
            }
        }
    }
    out.push(Token {
        tok: Tok::Eof,
        offset: bytes.len() as u32,
    });
    Ok(out)
}

fn advance_ident(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && (bytes[i] == b'_' || bytes[i].is_ascii_alphanumeric()) {
        i += 1;
    }
    i
}

fn lex_number(src: &str, start: usize) -> Result<(Tok, usize), LexError> {
    let bytes = src.as_bytes();
    let mut i = start;
    let mut is_double = false;
    let is_hex = bytes.get(i) == Some(&b'0') && matches!(bytes.get(i + 1), Some(b'x') | Some(b'X'));
    if is_hex {
        i += 2;
        while i < bytes.len() && bytes[i].is_ascii_hexdigit() {
            i += 1;
        }
    } else {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if bytes.get(i) == Some(&b'.') && bytes.get(i + 1).is_some_and(u8::is_ascii_digit) {
            is_double = true;
            i += 1;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
        }
        if matches!(bytes.get(i), Some(b'e') | Some(b'E')) {
            let mut j = i + 1;
            if matches!(bytes.get(j), Some(b'+') | Some(b'-')) {
                j += 1;
            }
            if bytes.get(j).is_some_and(u8::is_ascii_digit) {
                is_double = true;
                i = j;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
            }
        }
    }
    let text = &src[start..i];
    let is_unsigned = matches!(bytes.get(i), Some(b'u') | Some(b'U'));
    if is_unsigned {
        i += 1;
    }

    if is_double {
        let v: f64 = text
            .parse()
            .map_err(|_| LexError { offset: start as u32, message: format!("invalid float literal '{text}'") })?;
        return Ok((Tok::Double(v), i));
    }
    if is_hex {
        let digits = &text[2..];
        if is_unsigned {
            let v = u64::from_str_radix(digits, 16)
                .map_err(|_| LexError { offset: start as u32, message: format!("invalid hex literal '{text}'") })?;
            return Ok((Tok::UInt(v), i));
        }
        let v = i64::from_str_radix(digits, 16)
            .map_err(|_| LexError { offset: start as u32, message: format!("invalid hex literal '{text}'") })?;
        return Ok((Tok::Int(v), i));
    }
    if is_unsigned {
        let v: u64 = text
            .parse()
            .map_err(|_| LexError { offset: start as u32, message: format!("invalid uint literal '{text}'") })?;
        return Ok((Tok::UInt(v), i));
    }
    let v: i64 = text
        .parse()
        .map_err(|_| LexError { offset: start as u32, message: format!("invalid int literal '{text}'") })?;
    Ok((Tok::Int(v), i))
}

/// Lexes a quoted string or bytes literal starting at `quote_start`
/// (which must point at the opening quote character). Supports single,
/// double, and triple-quoted forms; `raw` disables escape processing;
/// `is_bytes` yields a `Tok::Bytes` built from the raw byte values.
fn lex_string(src: &str, quote_start: usize, raw: bool, is_bytes: bool) -> Result<(Tok, usize), LexError> {
    let bytes = src.as_bytes();
    let quote = bytes[quote_start];
    let triple = bytes.get(quote_start + 1) == Some(&quote) && bytes.get(quote_start + 2) == Some(&quote);
    let delim_len = if triple { 3 } else { 1 };
    let mut i = quote_start + delim_len;
    let mut text_bytes: Vec<u8> = Vec::new();

    loop {
        if i >= bytes.len() {
            return Err(LexError {
                offset: quote_start as u32,
                message: "unterminated string literal".into(),
            });
        }
        if bytes[i] == quote {
            let closes = if triple {
                bytes.get(i + 1) == Some(&quote) && bytes.get(i + 2) == Some(&quote)
            } else {
                true
            };
            if closes {
                i += delim_len;
                break;
            }
        }
        if bytes[i] == b'\\' && !raw {
            let (unescaped, next) = unescape(src, i)?;
            text_bytes.extend_from_slice(&unescaped);
            i = next;
        } else {
            let ch_len = utf8_len(bytes[i]);
            text_bytes.extend_from_slice(&bytes[i..i + ch_len]);
            i += ch_len;
        }
    }

    if is_bytes {
        Ok((Tok::Bytes(Arc::from(text_bytes)), i))
    } else {
        let s = String::from_utf8(text_bytes).map_err(|_| LexError {
            offset: quote_start as u32,
            message: "string literal is not valid UTF-8".into(),
        })?;
        Ok((Tok::Str(Arc::from(s.as_str())), i))
    }
}

fn utf8_len(b: u8) -> usize {
    if b & 0x80 == 0 {
        1
    } else if b & 0xE0 == 0xC0 {
        2
    } else if b & 0xF0 == 0xE0 {
        3
    } else {
        4
    }
}

/// Unescapes one `\...` sequence starting at `i` (which points at the
/// backslash), returning the decoded UTF-8 bytes and the offset past
/// the sequence.
fn unescape(src: &str, i: usize) -> Result<(Vec<u8>, usize), LexError> {
    let bytes = src.as_bytes();
    let err = |msg: &str| LexError { offset: i as u32, message: msg.to_string() };
    let Some(&kind) = bytes.get(i + 1) else {
        return Err(err("dangling escape at end of string"));
    };
    let simple = |c: u8| Ok((vec![c], i + 2));
    match kind {
        b'a' => simple(0x07),
        b'b' => simple(0x08),
        b'f' => simple(0x0C),
        b'n' => simple(b'\n'),
        b'r' => simple(b'\r'),
        b't' => simple(b'\t'),
        b'v' => simple(0x0B),
        b'\\' => simple(b'\\'),
        b'\'' => simple(b'\''),
        b'"' => simple(b'"'),
        b'`' => simple(b'`'),
        b'x' | b'X' => {
            let hex = bytes.get(i + 2..i + 4).ok_or_else(|| err("incomplete \\x escape"))?;
            let hex = std::str::from_utf8(hex).map_err(|_| err("invalid \\x escape"))?;
            let v = u8::from_str_radix(hex, 16).map_err(|_| err("invalid \\x escape"))?;
            Ok((vec![v], i + 4))
        }
        b'u' => {
            let hex = bytes.get(i + 2..i + 6).ok_or_else(|| err("incomplete \\u escape"))?;
            let hex = std::str::from_utf8(hex).map_err(|_| err("invalid \\u escape"))?;
            let cp = u32::from_str_radix(hex, 16).map_err(|_| err("invalid \\u escape"))?;
            let c = char::from_u32(cp).ok_or_else(|| err("invalid \\u escape: not a valid code point"))?;
            let mut buf = [0u8; 4];
            Ok((c.encode_utf8(&mut buf).as_bytes().to_vec(), i + 6))
        }
        b'U' => {
            let hex = bytes.get(i + 2..i + 10).ok_or_else(|| err("incomplete \\U escape"))?;
            let hex = std::str::from_utf8(hex).map_err(|_| err("invalid \\U escape"))?;
            let cp = u32::from_str_radix(hex, 16).map_err(|_| err("invalid \\U escape"))?;
            let c = char::from_u32(cp).ok_or_else(|| err("invalid \\U escape: not a valid code point"))?;
            let mut buf = [0u8; 4];
            Ok((c.encode_utf8(&mut buf).as_bytes().to_vec(), i + 10))
        }
        other => Err(err(&format!("unknown escape sequence '\\{}'", other as char))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(src: &str) -> Vec<Tok> {
        lex(src).unwrap().into_iter().map(|t| t.tok).collect()
    }

    #[test]
    fn lexes_arithmetic() {
        assert_eq!(
            toks("1 + 2 * 3"),
            vec![Tok::Int(1), Tok::Plus, Tok::Int(2), Tok::Star, Tok::Int(3), Tok::Eof]
        );
    }

    #[test]
    fn lexes_uint_suffix() {
        assert_eq!(toks("5u"), vec![Tok::UInt(5), Tok::Eof]);
    }

    #[test]
    fn lexes_double_with_exponent() {
        assert_eq!(toks("1.5e3"), vec![Tok::Double(1500.0), Tok::Eof]);
    }

    #[test]
    fn lexes_escaped_string() {
        assert_eq!(toks(r#""a\nb""#), vec![Tok::Str(Arc::from("a\nb")), Tok::Eof]);
    }

    #[test]
    fn lexes_raw_string_ignores_escapes() {
        assert_eq!(toks(r#"r"a\nb""#), vec![Tok::Str(Arc::from("a\\nb")), Tok::Eof]);
    }

    #[test]
    fn lexes_bytes_literal() {
        assert_eq!(toks(r#"b"ab""#), vec![Tok::Bytes(Arc::from(&b"ab"[..])), Tok::Eof]);
    }

    #[test]
    fn lexes_triple_quoted_string_with_embedded_quote() {
        assert_eq!(toks(r#"'''a"b'''"#), vec![Tok::Str(Arc::from("a\"b")), Tok::Eof]);
    }

    #[test]
    fn field_select_dot_not_confused_with_float() {
        assert_eq!(toks("a.b"), vec![Tok::Ident(Arc::from("a")), Tok::Dot, Tok::Ident(Arc::from("b")), Tok::Eof]);
    }
}
