//! # `std.ini`
//!
//! Strict INI. `[section]` headers open objects under the root; `key=value`
//! lines are properties; `;` and `#` start comments. Keys and values must
//! not contain any of ``[]=;#`` and must not begin or end with a space. A
//! UTF-8 BOM is stripped, both CRLF and LF are accepted, and the formatter
//! emits CRLF. Duplicate keys replace earlier ones.

use crate::binding::{NativeFunction, NativeTarget};
use crate::error::{Result, RuntimeError};
use crate::global::ApiVersion;
use crate::library::bytes_to_path;
use crate::value::{format_real, skey, Bytes, Object, Value};

const REJECT: &[u8] = b"[]=;#";
const COMMENT: &[u8] = b";#";
const SPACE: &[u8] = b" \t";

fn check_key(key: &[u8]) -> Result<()> {
    if key.is_empty() {
        return Err(RuntimeError::Parse("empty key is not allowed".to_string()));
    }
    if key.iter().any(|b| REJECT.contains(b)) {
        return Err(RuntimeError::Parse(format!(
            "key contains invalid characters: {}",
            String::from_utf8_lossy(key)
        )));
    }
    if SPACE.contains(&key[0]) {
        return Err(RuntimeError::Parse(format!(
            "key shall not begin with a space: {}",
            String::from_utf8_lossy(key)
        )));
    }
    if SPACE.contains(&key[key.len() - 1]) {
        return Err(RuntimeError::Parse(format!(
            "key shall not end with a space: {}",
            String::from_utf8_lossy(key)
        )));
    }
    Ok(())
}

/// Whether `value` formats as a scalar cell; containers are skipped.
fn check_scalar(value: &Value) -> Result<bool> {
    match value {
        Value::Null | Value::Boolean(_) | Value::Integer(_) | Value::Real(_) => Ok(true),
        Value::String(s) => {
            if s.is_empty() {
                return Ok(true);
            }
            if s.iter().any(|b| REJECT.contains(b)) {
                return Err(RuntimeError::Parse(format!(
                    "value contains invalid characters: {}",
                    String::from_utf8_lossy(s)
                )));
            }
            if SPACE.contains(&s[0]) {
                return Err(RuntimeError::Parse(format!(
                    "value shall not begin with a space: {}",
                    String::from_utf8_lossy(s)
                )));
            }
            if SPACE.contains(&s[s.len() - 1]) {
                return Err(RuntimeError::Parse(format!(
                    "value shall not end with a space: {}",
                    String::from_utf8_lossy(s)
                )));
            }
            Ok(true)
        }
        _ => Ok(false),
    }
}

fn append_scalar(out: &mut Bytes, value: &Value) {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
        Value::Real(r) => out.extend_from_slice(format_real(*r).as_bytes()),
        Value::String(s) => out.extend_from_slice(s),
        _ => {}
    }
}

pub fn format(value: &Object) -> Result<Bytes> {
    let mut out = Bytes::new();

    for (key, val) in value {
        if check_scalar(val)? {
            check_key(key)?;
            out.extend_from_slice(key);
            out.push(b'=');
            append_scalar(&mut out, val);
            out.extend_from_slice(b"\r\n");
        }
    }

    for (key, val) in value {
        if let Value::Object(section) = val {
            check_key(key)?;
            out.push(b'[');
            out.extend_from_slice(key);
            out.extend_from_slice(b"]\r\n");

            for (pkey, pval) in section.iter() {
                if check_scalar(pval)? {
                    check_key(pkey)?;
                    out.extend_from_slice(pkey);
                    out.push(b'=');
                    append_scalar(&mut out, pval);
                    out.extend_from_slice(b"\r\n");
                }
            }
        }
    }
    Ok(out)
}

fn trim_spaces(line: &[u8]) -> &[u8] {
    let begin = match line.iter().position(|b| !SPACE.contains(b)) {
        Some(p) => p,
        None => return b"",
    };
    let end = line.iter().rposition(|b| !SPACE.contains(b)).map_or(0, |p| p + 1);
    &line[begin..end]
}

pub fn parse(text: &[u8]) -> Result<Object> {
    let mut root = Object::new();
    let mut section: Option<Bytes> = None;

    for (index, raw) in text.split(|&b| b == b'\n').enumerate() {
        let nline = index + 1;
        let mut line = raw;

        // Strip the UTF-8 BOM and the CR of a CRLF pair.
        if (nline == 1) && line.starts_with(b"\xEF\xBB\xBF") {
            line = &line[3..];
        }
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }

        // Remove comments, then surrounding blanks.
        if let Some(pos) = line.iter().position(|b| COMMENT.contains(b)) {
            line = &line[..pos];
        }
        let line = trim_spaces(line);
        if line.is_empty() {
            continue;
        }

        if line[0] == b'[' {
            if line[line.len() - 1] != b']' {
                return Err(RuntimeError::Parse(format!(
                    "invalid section name on line {nline}"
                )));
            }
            let name = &line[1..line.len() - 1];
            if trim_spaces(name).is_empty() {
                return Err(RuntimeError::Parse(format!(
                    "empty section name on line {nline}"
                )));
            }
            // Open (or reopen) the section.
            root.entry(name.to_vec())
                .or_insert_with(|| Value::from(Object::new()))
                .open_object();
            section = Some(name.to_vec());
            continue;
        }

        // A property line; everything before the first `=` is the key.
        let (key, value) = match line.iter().position(|&b| b == b'=') {
            Some(eqpos) => {
                let key = trim_spaces(&line[..eqpos]);
                if key.is_empty() {
                    return Err(RuntimeError::Parse(format!(
                        "empty property name on line {nline}"
                    )));
                }
                (key.to_vec(), trim_spaces(&line[eqpos + 1..]).to_vec())
            }
            None => (line.to_vec(), Bytes::new()),
        };

        let sink = match &section {
            None => &mut root,
            Some(name) => root
                .entry(name.clone())
                .or_insert_with(|| Value::from(Object::new()))
                .open_object(),
        };
        sink.insert(key, Value::from(value));
    }
    Ok(root)
}

pub fn format_to_file(path: &[u8], value: &Object) -> Result<()> {
    let text = format(value)?;
    let path = bytes_to_path(path);
    std::fs::write(&path, text).map_err(|err| {
        RuntimeError::io_op("open", &format!("could not write file '{}'", path.display()), &err)
    })
}

pub fn parse_file(path: &[u8]) -> Result<Object> {
    let path = bytes_to_path(path);
    let text = std::fs::read(&path).map_err(|err| {
        RuntimeError::io_op("open", &format!("could not open file '{}'", path.display()), &err)
    })?;
    parse(&text)
}

pub fn create_bindings_ini(result: &mut Object, version: ApiVersion) {
    result.insert(
        skey("format"),
        Value::from(NativeFunction::new(
            "std.ini.format",
            "value",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.required_object()?;
                if reader.end_overload() {
                    return Ok(Value::from(format(&value)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("parse"),
        Value::from(NativeFunction::new(
            "std.ini.parse",
            "text",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let text = reader.required_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(parse(&text)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    if version >= ApiVersion::V0002_0000 {
        result.insert(
            skey("format_to_file"),
            Value::from(NativeFunction::new(
                "std.ini.format_to_file",
                "path, value",
                NativeTarget::VoidA(|mut reader| {
                    reader.start_overload();
                    let path = reader.required_string()?;
                    let value = reader.required_object()?;
                    if reader.end_overload() {
                        return format_to_file(&path, &value);
                    }
                    Err(reader.no_matching_function_call())
                }),
            )),
        );

        result.insert(
            skey("parse_file"),
            Value::from(NativeFunction::new(
                "std.ini.parse_file",
                "path",
                NativeTarget::ValA(|mut reader| {
                    reader.start_overload();
                    let path = reader.required_string()?;
                    if reader.end_overload() {
                        return Ok(Value::from(parse_file(&path)?));
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

    #[test]
    fn round_trip_of_the_canonical_sample() {
        let text = b"a=1\r\n[s]\r\nb=2\r\n";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.get(&skey("a")).unwrap(), &Value::from("1"));
        let section = parsed.get(&skey("s")).unwrap().as_object().unwrap();
        assert_eq!(section.get(&skey("b")).unwrap(), &Value::from("2"));

        assert_eq!(format(&parsed).unwrap(), text.to_vec());
    }

    #[test]
    fn comments_blanks_and_bom() {
        let text = b"\xEF\xBB\xBF ; leading comment\n\n  a = hello  # trailing\n[ s ]\nk=v\n";
        let parsed = parse(text).unwrap();
        assert_eq!(parsed.get(&skey("a")).unwrap(), &Value::from("hello"));
        assert!(parsed.get(&skey(" s ")).unwrap().is_object());
    }

    #[test]
    fn duplicates_replace() {
        let parsed = parse(b"a=1\na=2\n[s]\nb=1\nb=3\n").unwrap();
        assert_eq!(parsed.get(&skey("a")).unwrap(), &Value::from("2"));
        let section = parsed.get(&skey("s")).unwrap().as_object().unwrap();
        assert_eq!(section.get(&skey("b")).unwrap(), &Value::from("3"));
    }

    #[test]
    fn value_free_lines_become_empty_properties() {
        let parsed = parse(b"flag\nkey=\n").unwrap();
        assert_eq!(parsed.get(&skey("flag")).unwrap(), &Value::from(""));
        assert_eq!(parsed.get(&skey("key")).unwrap(), &Value::from(""));
    }

    #[test]
    fn malformed_sections_and_keys() {
        assert!(parse(b"[s\n").is_err());
        assert!(parse(b"[ ]\n").is_err());
        assert!(parse(b"=x\n").is_err());
    }

    #[test]
    fn formatter_validates_and_skips() {
        let mut root = Object::new();
        root.insert(skey("n"), Value::Integer(7));
        root.insert(skey("t"), Value::Boolean(true));
        root.insert(skey("list"), Value::from(vec![Value::Integer(1)]));
        let out = format(&root).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("n=7\r\n"));
        assert!(text.contains("t=true\r\n"));
        assert!(!text.contains("list"));

        let mut bad = Object::new();
        bad.insert(skey("k;"), Value::Integer(1));
        assert!(format(&bad).is_err());

        let mut bad = Object::new();
        bad.insert(skey("k"), Value::from("a=b"));
        assert!(format(&bad).is_err());
    }
}
