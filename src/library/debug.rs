//! # `std.debug`
//!
//! Unbuffered diagnostics on the standard error stream. Both functions
//! return the number of bytes written, or null if the stream rejected the
//! write; they never raise I/O errors.

use std::io::Write;

use crate::binding::{NativeFunction, NativeTarget};
use crate::global::ApiVersion;
use crate::library::string;
use crate::value::{skey, Bytes, Object, Value};

fn write_stderr(data: &[u8]) -> Option<i64> {
    let mut err = std::io::stderr().lock();
    match err.write_all(data).and_then(|_| err.flush()) {
        Ok(()) => Some(data.len() as i64),
        Err(_) => None,
    }
}

/// Compose a line from a template (see `std.string.format`) and write it.
pub fn logf(templ: &[u8], values: &[Value]) -> crate::error::Result<Option<i64>> {
    let mut text: Bytes = string::format(templ, values)?;
    text.push(b'\n');
    Ok(write_stderr(&text))
}

/// Dump a value in its typed multi-line form. The indent is clamped so the
/// output stays readable.
pub fn dump(value: &Value, indent: Option<i64>) -> Option<i64> {
    let rindent = indent.unwrap_or(2).clamp(0, 10) as usize;
    let mut text = String::new();
    value.dump_to(&mut text, rindent);
    text.push('\n');
    write_stderr(text.as_bytes())
}

pub fn create_bindings_debug(result: &mut Object, _version: ApiVersion) {
    result.insert(
        skey("logf"),
        Value::from(NativeFunction::new(
            "std.debug.logf",
            "templ, ...",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let templ = reader.required_string()?;
                if let Some(values) = reader.end_overload_values()? {
                    return Ok(Value::from(logf(&templ, &values)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("dump"),
        Value::from(NativeFunction::new(
            "std.debug.dump",
            "[value], [indent]",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.optional_value()?;
                let indent = reader.optional_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(dump(&value, indent)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logf_formats_and_reports_length() {
        // "x=1\n" is four bytes.
        let n = logf(b"x=$1", &[Value::Integer(1)]).unwrap();
        assert_eq!(n, Some(4));
        assert!(logf(b"$9", &[]).is_err());
    }

    #[test]
    fn dump_writes_the_typed_form() {
        let n = dump(&Value::Integer(5), None).unwrap();
        // "integer 5\n"
        assert_eq!(n, 10);
    }
}
