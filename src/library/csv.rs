//! # `std.csv`
//!
//! Comma-separated values, RFC 4180 flavour. Fields are separated by
//! commas and rows by line feeds (a CR before the LF is stripped). Double
//! quoted fields may span lines and embed commas and doubled `""` escapes.
//! A BOM on the first line is stripped. The formatter emits CRLF rows and
//! quotes a field only when it has to; cells that are not scalars are
//! written as empty.

use crate::binding::{NativeFunction, NativeTarget};
use crate::error::{Result, RuntimeError};
use crate::global::ApiVersion;
use crate::library::bytes_to_path;
use crate::value::{format_real, skey, Array, Bytes, Object, Value};

pub fn format(value: &Array) -> Result<Bytes> {
    let mut out = Bytes::new();
    for row in value {
        let row = row.as_array()?;
        for (k, cell) in row.iter().enumerate() {
            if k != 0 {
                out.push(b',');
            }
            match cell {
                Value::Null => out.extend_from_slice(b"null"),
                Value::Boolean(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
                Value::Integer(i) => out.extend_from_slice(i.to_string().as_bytes()),
                Value::Real(r) => out.extend_from_slice(format_real(*r).as_bytes()),
                Value::String(s) => {
                    if s.iter().any(|b| matches!(b, b',' | b'\n' | b'"')) {
                        out.push(b'"');
                        for &b in s.iter() {
                            if b == b'"' {
                                out.extend_from_slice(b"\"\"");
                            } else {
                                out.push(b);
                            }
                        }
                        out.push(b'"');
                    } else {
                        out.extend_from_slice(s);
                    }
                }
                // Not convertible to a cell; leave it empty.
                _ => {}
            }
        }
        out.extend_from_slice(b"\r\n");
    }
    Ok(out)
}

pub fn parse(text: &[u8]) -> Result<Array> {
    let mut rows: Vec<Vec<Bytes>> = Vec::new();
    let mut quote_allowed = true;
    let mut quote_at_line = 0usize;

    let segments: Vec<&[u8]> = text.split(|&b| b == b'\n').collect();
    let last_index = segments.len() - 1;
    for (index, raw) in segments.into_iter().enumerate() {
        let nline = index + 1;
        let mut line = raw;

        if (nline == 1) && line.starts_with(b"\xEF\xBB\xBF") {
            line = &line[3..];
        }
        if line.last() == Some(&b'\r') {
            line = &line[..line.len() - 1];
        }
        // The final empty segment after a trailing line feed is not a row.
        if line.is_empty() && (index == last_index) && (quote_at_line == 0) {
            break;
        }

        // Start a new row unless a quoted cell is continuing.
        if quote_at_line == 0 {
            rows.push(Vec::new());
        }

        let mut offset = 0;
        while offset < line.len() {
            if quote_at_line == 0 {
                let row = rows.last_mut().ok_or_else(|| {
                    RuntimeError::Invariant("row list cannot be empty".to_string())
                })?;
                if row.is_empty() {
                    row.push(Bytes::new());
                }

                if quote_allowed && (line[offset] == b'"') {
                    // Enter quotation mode.
                    offset += 1;
                    quote_at_line = nline;
                    continue;
                }

                match line[offset..].iter().position(|&b| b == b',') {
                    None => {
                        let cell = row.last_mut().ok_or_else(|| {
                            RuntimeError::Invariant("cell list cannot be empty".to_string())
                        })?;
                        cell.extend_from_slice(&line[offset..]);
                        quote_allowed = true;
                        break;
                    }
                    Some(epos) => {
                        let cell = row.last_mut().ok_or_else(|| {
                            RuntimeError::Invariant("cell list cannot be empty".to_string())
                        })?;
                        cell.extend_from_slice(&line[offset..offset + epos]);
                        offset += epos + 1;
                        quote_allowed = true;
                        row.push(Bytes::new());
                    }
                }
            } else {
                let row = rows.last_mut().ok_or_else(|| {
                    RuntimeError::Invariant("row list cannot be empty".to_string())
                })?;
                let cell = row.last_mut().ok_or_else(|| {
                    RuntimeError::Invariant("cell list cannot be empty".to_string())
                })?;
                match line[offset..].iter().position(|&b| b == b'"') {
                    None => {
                        // The quoted cell swallows the line break too.
                        cell.extend_from_slice(&line[offset..]);
                        cell.push(b'\n');
                        break;
                    }
                    Some(epos) => {
                        let epos = offset + epos;
                        if line.get(epos + 1) == Some(&b'"') {
                            // A doubled quotation mark is an escape.
                            cell.extend_from_slice(&line[offset..=epos]);
                            offset = epos + 2;
                        } else {
                            cell.extend_from_slice(&line[offset..epos]);
                            offset = epos + 1;
                            quote_allowed = false;
                            quote_at_line = 0;
                        }
                    }
                }
            }
        }

        // An empty line inside a quoted cell still contributes its break.
        if (quote_at_line != 0) && line.is_empty() {
            if let Some(cell) = rows.last_mut().and_then(|r| r.last_mut()) {
                cell.push(b'\n');
            }
        }
    }

    if quote_at_line != 0 {
        return Err(RuntimeError::Parse(format!(
            "unmatched \" at line {quote_at_line}"
        )));
    }

    Ok(rows
        .into_iter()
        .map(|row| Value::from(row.into_iter().map(Value::from).collect::<Array>()))
        .collect())
}

pub fn format_to_file(path: &[u8], value: &Array) -> Result<()> {
    let text = format(value)?;
    let path = bytes_to_path(path);
    std::fs::write(&path, text).map_err(|err| {
        RuntimeError::io_op("open", &format!("could not write file '{}'", path.display()), &err)
    })
}

pub fn parse_file(path: &[u8]) -> Result<Array> {
    let path = bytes_to_path(path);
    let text = std::fs::read(&path).map_err(|err| {
        RuntimeError::io_op("open", &format!("could not open file '{}'", path.display()), &err)
    })?;
    parse(&text)
}

pub fn create_bindings_csv(result: &mut Object, version: ApiVersion) {
    result.insert(
        skey("format"),
        Value::from(NativeFunction::new(
            "std.csv.format",
            "value",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.required_array()?;
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
            "std.csv.parse",
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
                "std.csv.format_to_file",
                "path, value",
                NativeTarget::VoidA(|mut reader| {
                    reader.start_overload();
                    let path = reader.required_string()?;
                    let value = reader.required_array()?;
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
                "std.csv.parse_file",
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

    fn cell(v: &Value, row: usize, col: usize) -> Bytes {
        v.as_array().unwrap()[row].as_array().unwrap()[col]
            .as_string()
            .unwrap()
            .clone()
    }

    #[test]
    fn plain_rows_and_cells() {
        let v = Value::from(parse(b"a,b,c\r\n1,2,3\r\n").unwrap());
        assert_eq!(cell(&v, 0, 0), b"a".to_vec());
        assert_eq!(cell(&v, 1, 2), b"3".to_vec());
        assert_eq!(v.as_array().unwrap().len(), 2);
    }

    #[test]
    fn quoted_cells_embed_commas_breaks_and_quotes() {
        let v = Value::from(parse(b"\"x,y\",\"he said \"\"hi\"\"\"\r\n").unwrap());
        assert_eq!(cell(&v, 0, 0), b"x,y".to_vec());
        assert_eq!(cell(&v, 0, 1), b"he said \"hi\"".to_vec());

        let v = Value::from(parse(b"\"line1\nline2\",b\r\n").unwrap());
        assert_eq!(cell(&v, 0, 0), b"line1\nline2".to_vec());
        assert_eq!(cell(&v, 0, 1), b"b".to_vec());
    }

    #[test]
    fn unterminated_quote_reports_opening_line() {
        let err = parse(b"ok,fine\r\nbad,\"open\r\nmore\r\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn bom_and_empty_cells() {
        let v = Value::from(parse(b"\xEF\xBB\xBFa,,c\r\n").unwrap());
        assert_eq!(cell(&v, 0, 0), b"a".to_vec());
        assert_eq!(cell(&v, 0, 1), b"".to_vec());
        assert_eq!(cell(&v, 0, 2), b"c".to_vec());
    }

    #[test]
    fn formatter_quotes_on_demand() {
        let rows = vec![Value::from(vec![
            Value::from("plain"),
            Value::from("a,b"),
            Value::from("say \"hi\""),
            Value::Integer(7),
            Value::from(vec![Value::Integer(1)]),
        ])];
        let out = format(&rows).unwrap();
        assert_eq!(
            out,
            b"plain,\"a,b\",\"say \"\"hi\"\"\",7,\r\n".to_vec()
        );
    }

    #[test]
    fn format_parse_round_trip() {
        let rows = vec![
            Value::from(vec![Value::from("a"), Value::from("b,c"), Value::from("d\"e")]),
            Value::from(vec![Value::from("multi\nline"), Value::from("")]),
        ];
        let text = format(&rows).unwrap();
        let parsed = parse(&text).unwrap();
        assert_eq!(cell(&Value::from(parsed.clone()), 0, 1), b"b,c".to_vec());
        assert_eq!(cell(&Value::from(parsed.clone()), 0, 2), b"d\"e".to_vec());
        assert_eq!(cell(&Value::from(parsed), 1, 0), b"multi\nline".to_vec());
    }

    #[test]
    fn rows_need_to_be_arrays() {
        let rows = vec![Value::Integer(3)];
        assert!(format(&rows).is_err());
    }
}
