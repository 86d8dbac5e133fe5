//! # Error Handling for the Asteria Runtime
//!
//! This module defines [`RuntimeError`], the single error type raised by the
//! runtime core and by every host library function. The execution engine
//! unwinds these errors through the script-level exception mechanism and
//! augments them with source-location frames; the runtime itself only
//! guarantees a formatted message and a coarse category.
//!
//! ## Categories
//! - `TypeMismatch` – a value was accessed as the wrong tag, or a required
//!   parameter received an argument of the wrong type.
//! - `ArgumentDispatch` – no overload of a host function matched; the message
//!   carries the full overload listing produced by the argument reader.
//! - `Range` – slice indices, numeric limits, base/ebase constraints.
//! - `Parse` – malformed INI/CSV/JSON/config/hex/base32/base64/URL input.
//! - `Ordering` – a sort or search comparator yielded an unordered pair.
//! - `Io` – an underlying OS call failed; the message carries the `errno`
//!   description of the failure.
//! - `Crypto` – PEM key loading or PKCS#1 sign/verify failures.
//! - `Compression` – a zlib stream error, together with the failing
//!   operation name.
//! - `Invariant` – an internal contract was violated; indicates a bug in the
//!   embedding or the runtime itself.

use std::io;

/// Errors that can occur inside the runtime core or a host library call.
///
/// Each variant carries a human-readable message. Variants correspond to
/// failure categories rather than call sites, so a single host function may
/// raise several different kinds.
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// A value was used as a type it does not have.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// No overload of a host function accepted the argument list.
    #[error("{0}")]
    ArgumentDispatch(String),

    /// An index, length or numeric constraint was violated.
    #[error("range error: {0}")]
    Range(String),

    /// Textual input could not be parsed.
    #[error("parse error: {0}")]
    Parse(String),

    /// A comparison required an order that does not exist.
    #[error("ordering error: {0}")]
    Ordering(String),

    /// An operating system call failed.
    #[error("I/O error: {0}")]
    Io(String),

    /// A cryptographic operation failed.
    #[error("crypto error: {0}")]
    Crypto(String),

    /// A compression or decompression stream failed.
    #[error("compression error: {0}")]
    Compression(String),

    /// An internal invariant was violated.
    #[error("invariant violation: {0}")]
    Invariant(String),
}

impl RuntimeError {
    /// Wrap an [`io::Error`] together with the operation and subject that
    /// produced it. The `errno` text of the failure is preserved.
    pub fn io_op(op: &str, what: &str, err: &io::Error) -> RuntimeError {
        RuntimeError::Io(format!("{what}\n[`{op}()` failed: {err}]"))
    }
}

/// Shorthand for fallible runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_carry_category_prefix() {
        let e = RuntimeError::TypeMismatch("value is `null`".to_string());
        assert_eq!(e.to_string(), "type mismatch: value is `null`");

        let e = RuntimeError::Compression("stream error\n[`deflate()` returned `-2`]".to_string());
        assert!(e.to_string().starts_with("compression error:"));
    }

    #[test]
    fn io_errors_keep_errno_text() {
        let ioe = io::Error::from_raw_os_error(2);
        let e = RuntimeError::io_op("open", "could not open file 'x'", &ioe);
        let msg = e.to_string();
        assert!(msg.contains("could not open file 'x'"));
        assert!(msg.contains("`open()` failed"));
    }
}
