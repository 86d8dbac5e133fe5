//! # `std.json`
//!
//! A JSON codec with a JSON5-leaning parser and a canonical formatter.
//!
//! ## Parser extensions over strict JSON
//! - Unquoted identifier keys (`[A-Za-z_$][A-Za-z0-9_$]*`).
//! - Single-quoted strings.
//! - An optional leading `+` on numbers, and `Infinity` / `NaN`.
//!
//! The input must be valid UTF-8 at the byte level; nesting is limited to
//! 32 levels; duplicate object keys are rejected. All numbers parse as
//! reals.
//!
//! ## Formatter
//! Integers are emitted as doubles, which is lossy at very large magnitude.
//! Non-finite reals, functions and opaques emit `null`. Strings escape
//! everything outside printable ASCII as UTF-16 `\u` sequences. The indent
//! may be a string or a space count clamped to 40.

use std::collections::HashSet;
use std::rc::Rc;

use crate::binding::{NativeFunction, NativeTarget};
use crate::error::{Result, RuntimeError};
use crate::global::ApiVersion;
use crate::library::bytes_to_path;
use crate::library::string::{utf8_decode_one, utf8_encode_one};
use crate::value::{skey, Bytes, Object, Value};

const NESTING_LIMIT: usize = 32;

#[derive(Clone, Debug, PartialEq)]
enum Token {
    Punct(u8),
    Ident(String),
    Number(f64),
    Str(Bytes),
    Eof,
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a [u8]) -> Lexer<'a> {
        let mut lexer = Lexer { src, pos: 0 };
        // Skip the UTF-8 BOM, if any.
        if src.starts_with(b"\xEF\xBB\xBF") {
            lexer.pos = 3;
        }
        lexer
    }

    fn err(&self, what: &str) -> RuntimeError {
        RuntimeError::Parse(format!(
            "could not parse JSON string: {what} at offset `{}`",
            self.pos
        ))
    }

    /// Decode one Unicode character, strictly.
    fn next_char(&mut self) -> Result<Option<u32>> {
        if self.pos >= self.src.len() {
            return Ok(None);
        }
        match utf8_decode_one(self.src, &mut self.pos) {
            Some(cp) => Ok(Some(cp)),
            None => Err(self.err("invalid UTF-8 sequence")),
        }
    }

    fn skip_blank(&mut self) {
        while let Some(&b) = self.src.get(self.pos) {
            if matches!(b, b' ' | b'\t' | b'\r' | b'\n') {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn take_escape(&mut self) -> Result<u32> {
        let c = self.next_char()?.ok_or_else(|| self.err("incomplete escape sequence"))?;
        Ok(match c {
            c @ (0x5C | 0x22 | 0x2F) => c, // \ " /
            0x62 => 0x08,
            0x66 => 0x0C,
            0x6E => 0x0A,
            0x72 => 0x0D,
            0x74 => 0x09,
            0x75 => {
                let mut unit = 0u32;
                for _ in 0..4 {
                    let d = self.next_char()?.ok_or_else(|| self.err("incomplete escape sequence"))?;
                    unit <<= 4;
                    unit |= match d {
                        0x30..=0x39 => d - 0x30,
                        0x41..=0x46 => d - 0x41 + 10,
                        0x61..=0x66 => d - 0x61 + 10,
                        _ => return Err(self.err("invalid hexadecimal digit")),
                    };
                }
                if (0xDC00..=0xDFFF).contains(&unit) {
                    return Err(self.err("dangling UTF-16 trailing surrogate"));
                }
                if (0xD800..=0xDBFF).contains(&unit) {
                    // A leading surrogate requires another `\uXXXX`.
                    if self.next_char()? != Some(0x5C) {
                        return Err(self.err("missing UTF-16 trailing surrogate"));
                    }
                    if self.next_char()? != Some(0x75) {
                        return Err(self.err("missing UTF-16 trailing surrogate"));
                    }
                    let mut trail = 0u32;
                    for _ in 0..4 {
                        let d = self
                            .next_char()?
                            .ok_or_else(|| self.err("incomplete escape sequence"))?;
                        trail <<= 4;
                        trail |= match d {
                            0x30..=0x39 => d - 0x30,
                            0x41..=0x46 => d - 0x41 + 10,
                            0x61..=0x66 => d - 0x61 + 10,
                            _ => return Err(self.err("invalid hexadecimal digit")),
                        };
                    }
                    if !(0xDC00..=0xDFFF).contains(&trail) {
                        return Err(self.err("missing UTF-16 trailing surrogate"));
                    }
                    0x10000 + ((unit - 0xD800) << 10) + (trail - 0xDC00)
                } else {
                    unit
                }
            }
            _ => return Err(self.err("invalid escape sequence")),
        })
    }

    fn take_quoted(&mut self, quote: u8) -> Result<Bytes> {
        let mut text = Bytes::new();
        loop {
            let c = self.next_char()?.ok_or_else(|| self.err("string not terminated properly"))?;
            if (c <= 0x1F) || (c == 0x7F) {
                return Err(self.err("control character not allowed in string"));
            }
            if c == quote as u32 {
                return Ok(text);
            }
            let c = if c == 0x5C { self.take_escape()? } else { c };
            if !utf8_encode_one(&mut text, c) {
                return Err(self.err("invalid Unicode character"));
            }
        }
    }

    /// The first digit has already been consumed.
    fn take_number_body(&mut self) -> Result<f64> {
        let start = self.pos - 1;
        while let Some(&b) = self.src.get(self.pos) {
            if b.is_ascii_digit() {
                self.pos += 1;
            } else {
                break;
            }
        }
        if self.src.get(self.pos) == Some(&b'.') {
            self.pos += 1;
            if !self.src.get(self.pos).is_some_and(|b| b.is_ascii_digit()) {
                return Err(self.err("invalid number"));
            }
            while self.src.get(self.pos).is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        if self.src.get(self.pos).is_some_and(|&b| (b | 0x20) == b'e') {
            self.pos += 1;
            if self.src.get(self.pos).is_some_and(|&b| (b == b'+') || (b == b'-')) {
                self.pos += 1;
            }
            if !self.src.get(self.pos).is_some_and(|b| b.is_ascii_digit()) {
                return Err(self.err("invalid number"));
            }
            while self.src.get(self.pos).is_some_and(|b| b.is_ascii_digit()) {
                self.pos += 1;
            }
        }
        let body = std::str::from_utf8(&self.src[start..self.pos])
            .map_err(|_| self.err("invalid number"))?;
        let value: f64 = body.parse().map_err(|_| self.err("invalid number"))?;
        if !value.is_finite() {
            return Err(self.err("number value out of range"));
        }
        Ok(value)
    }

    fn take_ident(&mut self) -> String {
        let start = self.pos;
        while self
            .src
            .get(self.pos)
            .is_some_and(|&b| b.is_ascii_alphanumeric() || (b == b'_') || (b == b'$'))
        {
            self.pos += 1;
        }
        String::from_utf8_lossy(&self.src[start..self.pos]).into_owned()
    }

    fn next_token(&mut self) -> Result<Token> {
        self.skip_blank();
        let b = match self.src.get(self.pos) {
            None => return Ok(Token::Eof),
            Some(&b) => b,
        };
        match b {
            b'[' | b']' | b'{' | b'}' | b':' | b',' => {
                self.pos += 1;
                Ok(Token::Punct(b))
            }
            b'"' | b'\'' => {
                self.pos += 1;
                Ok(Token::Str(self.take_quoted(b)?))
            }
            b'A'..=b'Z' | b'a'..=b'z' | b'_' | b'$' => Ok(Token::Ident(self.take_ident())),
            b'+' | b'-' => {
                self.pos += 1;
                let negative = b == b'-';
                match self.src.get(self.pos) {
                    Some(d) if d.is_ascii_digit() => {
                        self.pos += 1;
                        let v = self.take_number_body()?;
                        Ok(Token::Number(if negative { -v } else { v }))
                    }
                    Some(c) if c.is_ascii_alphabetic() => {
                        // Signed `Infinity` and `NaN`.
                        match self.take_ident().as_str() {
                            "Infinity" => Ok(Token::Number(if negative {
                                f64::NEG_INFINITY
                            } else {
                                f64::INFINITY
                            })),
                            "NaN" => Ok(Token::Number(if negative { -f64::NAN } else { f64::NAN })),
                            _ => Err(self.err("invalid number")),
                        }
                    }
                    _ => Err(self.err("invalid number")),
                }
            }
            b'0'..=b'9' => {
                self.pos += 1;
                Ok(Token::Number(self.take_number_body()?))
            }
            _ => Err(self.err("invalid character")),
        }
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    fn parse_value(&mut self, token: Token, depth: usize) -> Result<Value> {
        if depth > NESTING_LIMIT {
            return Err(self.lexer.err("nesting limit exceeded"));
        }
        match token {
            Token::Punct(b'[') => {
                let mut array = Vec::new();
                let mut token = self.lexer.next_token()?;
                if token == Token::Punct(b']') {
                    return Ok(Value::from(array));
                }
                loop {
                    array.push(self.parse_value(token, depth + 1)?);
                    match self.lexer.next_token()? {
                        Token::Punct(b']') => return Ok(Value::from(array)),
                        Token::Punct(b',') => {
                            token = self.lexer.next_token()?;
                            if token == Token::Punct(b']') {
                                return Ok(Value::from(array));
                            }
                        }
                        Token::Eof => return Err(self.lexer.err("array not terminated properly")),
                        _ => return Err(self.lexer.err("missing comma or closed bracket")),
                    }
                }
            }
            Token::Punct(b'{') => {
                let mut object = Object::new();
                let mut token = self.lexer.next_token()?;
                if token == Token::Punct(b'}') {
                    return Ok(Value::from(object));
                }
                loop {
                    let key = match token {
                        Token::Str(key) => key,
                        Token::Ident(name) => name.into_bytes(),
                        Token::Eof => return Err(self.lexer.err("object not terminated properly")),
                        _ => return Err(self.lexer.err("missing key string")),
                    };
                    if self.lexer.next_token()? != Token::Punct(b':') {
                        return Err(self.lexer.err("missing colon"));
                    }
                    let next = self.lexer.next_token()?;
                    if next == Token::Eof {
                        return Err(self.lexer.err("missing value"));
                    }
                    let value = self.parse_value(next, depth + 1)?;
                    if object.insert(key, value).is_some() {
                        return Err(self.lexer.err("duplicate key string"));
                    }
                    match self.lexer.next_token()? {
                        Token::Punct(b'}') => return Ok(Value::from(object)),
                        Token::Punct(b',') => {
                            token = self.lexer.next_token()?;
                            if token == Token::Punct(b'}') {
                                return Ok(Value::from(object));
                            }
                        }
                        Token::Eof => return Err(self.lexer.err("object not terminated properly")),
                        _ => return Err(self.lexer.err("missing comma or closed brace")),
                    }
                }
            }
            Token::Number(v) => Ok(Value::Real(v)),
            Token::Str(s) => Ok(Value::from(s)),
            Token::Ident(name) => match name.as_str() {
                "null" => Ok(Value::Null),
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                "Infinity" => Ok(Value::Real(f64::INFINITY)),
                "NaN" => Ok(Value::Real(f64::NAN)),
                _ => Err(self.lexer.err("invalid token")),
            },
            Token::Eof => Err(self.lexer.err("blank input")),
            Token::Punct(_) => Err(self.lexer.err("invalid token")),
        }
    }
}

pub fn parse(text: &[u8]) -> Result<Value> {
    let mut parser = Parser { lexer: Lexer::new(text) };
    let token = parser.lexer.next_token()?;
    let value = parser.parse_value(token, 0)?;
    if parser.lexer.next_token()? != Token::Eof {
        return Err(parser.lexer.err("excess data after value"));
    }
    Ok(value)
}

pub fn parse_file(path: &[u8]) -> Result<Value> {
    let path = bytes_to_path(path);
    let text = std::fs::read(&path).map_err(|err| {
        RuntimeError::io_op("open", &format!("could not open file '{}'", path.display()), &err)
    })?;
    parse(&text)
}

/// Render a double the way JSON expects: plain positional digits in the
/// common range, exponent notation far outside it.
fn json_number(value: f64) -> String {
    if value == value.trunc() && value.abs() < 1e17 {
        // Integral and small enough to print exactly without a fraction.
        return format!("{}", value.trunc() as i64);
    }
    let abs = value.abs();
    if (abs >= 1e17) || (abs > 0.0 && abs < 1e-5) {
        format!("{value:e}")
    } else {
        format!("{value}")
    }
}

fn escape_string_utf16(out: &mut Bytes, text: &[u8]) {
    let mut offset = 0;
    while offset < text.len() {
        let b = text[offset];
        if matches!(b, b'\\' | b'"' | b'/') {
            out.push(b'\\');
            out.push(b);
            offset += 1;
            continue;
        }
        if (0x20..=0x7E).contains(&b) {
            out.push(b);
            offset += 1;
            continue;
        }
        match b {
            0x08 => out.extend_from_slice(b"\\b"),
            0x0C => out.extend_from_slice(b"\\f"),
            0x0A => out.extend_from_slice(b"\\n"),
            0x0D => out.extend_from_slice(b"\\r"),
            0x09 => out.extend_from_slice(b"\\t"),
            _ => {
                // Re-encode the character in UTF-16; bad sequences become
                // the replacement character, one byte at a time.
                match utf8_decode_one(text, &mut offset) {
                    Some(cp) => {
                        let mut units = [0u16; 2];
                        let ch = char::from_u32(cp).unwrap_or('\u{FFFD}');
                        for unit in ch.encode_utf16(&mut units) {
                            out.extend_from_slice(format!("\\u{:04X}", unit).as_bytes());
                        }
                    }
                    None => {
                        out.extend_from_slice(b"\\uFFFD");
                        offset += 1;
                    }
                }
                continue;
            }
        }
        offset += 1;
    }
}

struct Indenter {
    cur: String,
    add: String,
}

impl Indenter {
    fn from_string(add: &[u8]) -> Indenter {
        if add.is_empty() {
            return Indenter { cur: String::new(), add: String::new() };
        }
        Indenter {
            cur: "\n".to_string(),
            add: String::from_utf8_lossy(add).into_owned(),
        }
    }

    fn from_count(count: i64) -> Indenter {
        if count <= 0 {
            return Indenter { cur: String::new(), add: String::new() };
        }
        Indenter {
            cur: "\n".to_string(),
            add: " ".repeat(count.min(40) as usize),
        }
    }

    fn open(&mut self, out: &mut Bytes) {
        self.cur.push_str(&self.add);
        out.extend_from_slice(self.cur.as_bytes());
    }

    fn close(&mut self, out: &mut Bytes) {
        self.cur.truncate(self.cur.len() - self.add.len());
        out.extend_from_slice(self.cur.as_bytes());
    }

    fn separator(&self, out: &mut Bytes) {
        out.push(b',');
        out.extend_from_slice(self.cur.as_bytes());
    }

    fn key_colon(&self, out: &mut Bytes) {
        if self.cur.is_empty() {
            out.extend_from_slice(b":");
        } else {
            out.extend_from_slice(b": ");
        }
    }
}

fn print_value(out: &mut Bytes, indent: &mut Indenter, value: &Value, seen: &mut HashSet<usize>) {
    match value {
        Value::Null | Value::Opaque(_) | Value::Function(_) => out.extend_from_slice(b"null"),
        Value::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Integer(i) => {
            // Deliberately emitted as a double; lossy at large magnitude.
            out.extend_from_slice(json_number(*i as f64).as_bytes())
        }
        Value::Real(r) => {
            if r.is_finite() {
                out.extend_from_slice(json_number(*r).as_bytes());
            } else {
                out.extend_from_slice(b"null");
            }
        }
        Value::String(s) => {
            out.push(b'"');
            escape_string_utf16(out, s);
            out.push(b'"');
        }
        Value::Array(arr) => {
            let ptr = Rc::as_ptr(arr) as usize;
            if arr.is_empty() || !seen.insert(ptr) {
                out.extend_from_slice(b"[]");
                return;
            }
            out.push(b'[');
            indent.open(out);
            for (k, elem) in arr.iter().enumerate() {
                if k != 0 {
                    indent.separator(out);
                }
                print_value(out, indent, elem, seen);
            }
            indent.close(out);
            out.push(b']');
            seen.remove(&ptr);
        }
        Value::Object(obj) => {
            let ptr = Rc::as_ptr(obj) as usize;
            if obj.is_empty() || !seen.insert(ptr) {
                out.extend_from_slice(b"{}");
                return;
            }
            out.push(b'{');
            indent.open(out);
            for (k, (key, elem)) in obj.iter().enumerate() {
                if k != 0 {
                    indent.separator(out);
                }
                out.push(b'"');
                escape_string_utf16(out, key);
                out.push(b'"');
                indent.key_colon(out);
                print_value(out, indent, elem, seen);
            }
            indent.close(out);
            out.push(b'}');
            seen.remove(&ptr);
        }
    }
}

pub fn format_with_string_indent(value: &Value, indent: Option<&[u8]>) -> Bytes {
    let mut out = Bytes::new();
    let mut indenter = Indenter::from_string(indent.unwrap_or(b""));
    print_value(&mut out, &mut indenter, value, &mut HashSet::new());
    out
}

pub fn format_with_count_indent(value: &Value, indent: i64) -> Bytes {
    let mut out = Bytes::new();
    let mut indenter = Indenter::from_count(indent);
    print_value(&mut out, &mut indenter, value, &mut HashSet::new());
    out
}

pub fn format_to_file_string_indent(path: &[u8], value: &Value, indent: Option<&[u8]>) -> Result<()> {
    let text = format_with_string_indent(value, indent);
    let path = bytes_to_path(path);
    std::fs::write(&path, text).map_err(|err| {
        RuntimeError::io_op("open", &format!("could not write file '{}'", path.display()), &err)
    })
}

pub fn format_to_file_count_indent(path: &[u8], value: &Value, indent: i64) -> Result<()> {
    let text = format_with_count_indent(value, indent);
    let path = bytes_to_path(path);
    std::fs::write(&path, text).map_err(|err| {
        RuntimeError::io_op("open", &format!("could not write file '{}'", path.display()), &err)
    })
}

pub fn create_bindings_json(result: &mut Object, version: ApiVersion) {
    result.insert(
        skey("format"),
        Value::from(NativeFunction::new(
            "std.json.format",
            "[value], [indent]",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.optional_value()?;
                reader.save_state(0);
                let indent = reader.optional_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(format_with_string_indent(&value, indent.as_deref())));
                }
                reader.load_state(0);
                let indent = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(format_with_count_indent(&value, indent)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("parse"),
        Value::from(NativeFunction::new(
            "std.json.parse",
            "text",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let text = reader.required_string()?;
                if reader.end_overload() {
                    return parse(&text);
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    if version >= ApiVersion::V0002_0000 {
        result.insert(
            skey("format_to_file"),
            Value::from(NativeFunction::new(
                "std.json.format_to_file",
                "path, [value], [indent]",
                NativeTarget::VoidA(|mut reader| {
                    reader.start_overload();
                    let path = reader.required_string()?;
                    let value = reader.optional_value()?;
                    reader.save_state(0);
                    let indent = reader.optional_string()?;
                    if reader.end_overload() {
                        return format_to_file_string_indent(&path, &value, indent.as_deref());
                    }
                    reader.load_state(0);
                    let indent = reader.required_integer()?;
                    if reader.end_overload() {
                        return format_to_file_count_indent(&path, &value, indent);
                    }
                    Err(reader.no_matching_function_call())
                }),
            )),
        );

        result.insert(
            skey("parse_file"),
            Value::from(NativeFunction::new(
                "std.json.parse_file",
                "path",
                NativeTarget::ValA(|mut reader| {
                    reader.start_overload();
                    let path = reader.required_string()?;
                    if reader.end_overload() {
                        return parse_file(&path);
                    }
                    Err(reader.no_matching_function_call())
                }),
            )),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &Value, indent: Option<&[u8]>) -> String {
        String::from_utf8(format_with_string_indent(v, indent)).unwrap()
    }

    #[test]
    fn numbers_parse_as_reals() {
        let v = parse(b"[1, 2, 3]").unwrap();
        let arr = v.as_array().unwrap();
        assert_eq!(arr[0], Value::Real(1.0));
        assert!(arr[0].is_real() && !arr[0].is_integer());
        assert_eq!(parse(b"+1.5e2").unwrap(), Value::Real(150.0));
        assert_eq!(parse(b"-0.25").unwrap(), Value::Real(-0.25));
    }

    #[test]
    fn json5_leanings() {
        let v = parse(b"{a: 1, 'b': 'x', \"c\": true}").unwrap();
        let obj = v.as_object().unwrap();
        assert_eq!(obj.get(&skey("a")).unwrap(), &Value::Real(1.0));
        assert_eq!(obj.get(&skey("b")).unwrap(), &Value::from("x"));
        assert_eq!(obj.get(&skey("c")).unwrap(), &Value::Boolean(true));

        assert_eq!(parse(b"Infinity").unwrap(), Value::Real(f64::INFINITY));
        assert_eq!(parse(b"-Infinity").unwrap(), Value::Real(f64::NEG_INFINITY));
        assert!(parse(b"NaN").unwrap().as_real().unwrap().is_nan());
        assert_eq!(parse(b"null").unwrap(), Value::Null);
    }

    #[test]
    fn surrogate_pair_escapes() {
        let v = parse(br#""\uD83D\uDE00""#).unwrap();
        assert_eq!(v, Value::from("\u{1F600}"));
        assert!(parse(br#""\uDE00""#).is_err());
        assert!(parse(br#""\uD83Dxx""#).is_err());
    }

    #[test]
    fn rejections() {
        assert!(parse(b"").is_err());
        assert!(parse(b"[1, 2").is_err());
        assert!(parse(b"{\"a\": 1,, }").is_err());
        assert!(parse(b"{\"a\": 1} trailing").is_err());
        assert!(parse(b"{\"a\":1, \"a\":2}").is_err());
        assert!(parse(b"\xFF").is_err());
        assert!(parse(b"\"\xC0\x80\"").is_err());

        // Depth limit.
        let mut deep = Vec::new();
        deep.extend_from_slice(&[b'['; 40]);
        deep.extend_from_slice(&[b']'; 40]);
        assert!(parse(&deep).is_err());
        let mut ok = Vec::new();
        ok.extend_from_slice(&[b'['; 20]);
        ok.extend_from_slice(&[b']'; 20]);
        assert!(parse(&ok).is_ok());
    }

    #[test]
    fn trailing_commas_are_tolerated() {
        assert_eq!(parse(b"[1, 2,]").unwrap().as_array().unwrap().len(), 2);
        assert_eq!(parse(b"{a: 1,}").unwrap().as_object().unwrap().len(), 1);
    }

    #[test]
    fn compact_formatting() {
        let v = Value::from(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        assert_eq!(s(&v, None), "[1,2,3]");

        let mut obj = Object::new();
        obj.insert(skey("a"), Value::Integer(1));
        obj.insert(skey("b"), Value::from("x/y"));
        let v = Value::from(obj);
        assert_eq!(s(&v, None), "{\"a\":1,\"b\":\"x\\/y\"}");
    }

    #[test]
    fn indented_formatting() {
        let v = Value::from(vec![Value::Integer(1), Value::Integer(2)]);
        let out = String::from_utf8(format_with_count_indent(&v, 2)).unwrap();
        assert_eq!(out, "[\n  1,\n  2\n]");
        // Indent counts clamp at 40 columns.
        let out = String::from_utf8(format_with_count_indent(&Value::from(vec![Value::Null]), 100)).unwrap();
        assert!(out.contains(&" ".repeat(40)));
        assert!(!out.contains(&" ".repeat(41)));
    }

    #[test]
    fn lossy_and_nullified_values() {
        assert_eq!(s(&Value::Real(f64::NAN), None), "null");
        assert_eq!(s(&Value::Real(f64::INFINITY), None), "null");
        assert_eq!(s(&Value::Integer(3), None), "3");
        assert_eq!(s(&Value::Real(2.5), None), "2.5");
        // Large integers go through double precision.
        assert_eq!(s(&Value::Integer(1 << 60), None), "1.152921504606847e18");
    }

    #[test]
    fn string_escapes_are_utf16() {
        assert_eq!(s(&Value::from("ab\nc"), None), "\"ab\\nc\"");
        assert_eq!(s(&Value::from("\u{20AC}"), None), "\"\\u20AC\"");
        assert_eq!(s(&Value::from("\u{1F600}"), None), "\"\\uD83D\\uDE00\"");
        // Invalid UTF-8 bytes degrade to the replacement character.
        assert_eq!(s(&Value::from(vec![0xFFu8]), None), "\"\\uFFFD\"");
    }

    #[test]
    fn round_trip_through_text() {
        let mut obj = Object::new();
        obj.insert(skey("list"), Value::from(vec![Value::Real(1.0), Value::from("two")]));
        obj.insert(skey("flag"), Value::Boolean(false));
        let v = Value::from(obj);
        let text = format_with_string_indent(&v, Some(b"  "));
        let parsed = parse(&text).unwrap();
        assert_eq!(parsed, v);
    }

    #[test]
    fn file_variants() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let pb = crate::library::path_to_bytes(&path);
        let v = Value::from(vec![Value::Real(1.0), Value::Real(2.0)]);
        format_to_file_string_indent(&pb, &v, None).unwrap();
        assert_eq!(parse_file(&pb).unwrap(), v);
        assert!(parse_file(b"/no/such/file").is_err());
    }
}
