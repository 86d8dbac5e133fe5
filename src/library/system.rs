//! # `std.system`
//!
//! Process and host facilities: identity queries, environment access,
//! process spawning with and without captured output, daemonization,
//! interruptible sleep, and the extended configuration-file reader.
//!
//! ## Process exit reporting
//! `call` returns the exit status for a normal exit and `128 + signal`
//! when the child was killed. `pipe` returns the captured standard output
//! only on a clean zero exit; a non-zero exit or a signal yields null.
//!
//! ## `load_conf`
//! The configuration grammar is a JSON5-like superset: `//` and `/* */`
//! comments, unquoted keys, `=` interchangeable with `:`, `;` with `,`,
//! optional separators, backtick digit grouping, `0x`/`0b` literals with
//! `p` exponents, and `\u`/`\U` escapes. Nesting is limited to 32 levels
//! and diagnostics carry `path:line:column`.

use std::io::{Read, Write};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::process::ExitStatusExt;
use std::process::{Command, Stdio};

use unicode_width::UnicodeWidthChar;

use crate::binding::{NativeFunction, NativeTarget};
use crate::error::{Result, RuntimeError};
use crate::global::{ApiVersion, Global};
use crate::library::{bytes_to_path, string::utf8_decode_one, string::utf8_encode_one};
use crate::value::{skey, Array, Bytes, Object, Value};

pub fn get_working_directory() -> Result<Bytes> {
    let cwd = std::env::current_dir().map_err(|err| {
        RuntimeError::io_op("getcwd", "could not get current working directory", &err)
    })?;
    Ok(crate::library::path_to_bytes(&cwd))
}

pub fn get_environment_variable(name: &[u8]) -> Option<Bytes> {
    let name = std::ffi::OsStr::from_bytes(name);
    std::env::var_os(name).map(|val| val.as_bytes().to_vec())
}

pub fn get_environment_variables() -> Object {
    let mut vars = Object::new();
    for (key, val) in std::env::vars_os() {
        vars.insert(key.as_bytes().to_vec(), Value::from(val.as_bytes().to_vec()));
    }
    vars
}

fn cstr_field(field: &[libc::c_char]) -> Bytes {
    field
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect()
}

pub fn get_properties() -> Object {
    let mut uts: libc::utsname = unsafe { std::mem::zeroed() };
    unsafe {
        libc::uname(&mut uts);
    }

    let mut names = Object::new();
    names.insert(skey("os"), Value::from(cstr_field(&uts.sysname)));
    let mut kernel = cstr_field(&uts.release);
    kernel.push(b' ');
    kernel.extend_from_slice(&cstr_field(&uts.version));
    names.insert(skey("kernel"), Value::from(kernel));
    names.insert(skey("arch"), Value::from(cstr_field(&uts.machine)));
    let nprocs = unsafe { libc::sysconf(libc::_SC_NPROCESSORS_ONLN) };
    names.insert(skey("nprocs"), Value::Integer(nprocs as i64));
    names
}

/// A version-4 UUID in the canonical lowercase form, from the context's
/// random engine.
pub fn random_uuid(global: &Global) -> Bytes {
    let words = [
        global.random_u32(),
        global.random_u32(),
        global.random_u32(),
        global.random_u32(),
    ];
    let mut nibbles = Vec::with_capacity(32);
    for w in words {
        for shift in (0..8).rev() {
            nibbles.push(((w >> (shift * 4)) & 0xF) as u8);
        }
    }
    // Stamp the version and variant nibbles.
    nibbles[12] = 4;
    nibbles[16] = nibbles[16] & 0x3 | 8;

    let mut text = Bytes::with_capacity(36);
    for (k, nib) in nibbles.iter().enumerate() {
        if matches!(k, 8 | 12 | 16 | 20) {
            text.push(b'-');
        }
        text.push(b"0123456789abcdef"[*nib as usize]);
    }
    text
}

pub fn get_pid() -> i64 {
    std::process::id() as i64
}

pub fn get_ppid() -> i64 {
    unsafe { libc::getppid() as i64 }
}

pub fn get_uid() -> i64 {
    unsafe { libc::getuid() as i64 }
}

pub fn get_euid() -> i64 {
    unsafe { libc::geteuid() as i64 }
}

fn build_command(cmd: &[u8], argv: Option<&Array>, envp: Option<&Array>) -> Result<Command> {
    let mut command = Command::new(std::ffi::OsStr::from_bytes(cmd));
    if let Some(argv) = argv {
        for arg in argv {
            command.arg(std::ffi::OsStr::from_bytes(arg.as_string()?));
        }
    }
    if let Some(envp) = envp {
        command.env_clear();
        for pair in envp {
            let pair = pair.as_string()?;
            let split = pair.iter().position(|&b| b == b'=').unwrap_or(pair.len());
            command.env(
                std::ffi::OsStr::from_bytes(&pair[..split]),
                std::ffi::OsStr::from_bytes(pair.get(split + 1..).unwrap_or(b"")),
            );
        }
    }
    Ok(command)
}

fn status_code(status: std::process::ExitStatus) -> i64 {
    if let Some(code) = status.code() {
        code as i64
    } else if let Some(signal) = status.signal() {
        128 + signal as i64
    } else {
        128
    }
}

/// Spawn a process and await its termination.
pub fn call(cmd: &[u8], argv: Option<&Array>, envp: Option<&Array>) -> Result<i64> {
    let status = build_command(cmd, argv, envp)?
        .status()
        .map_err(|err| {
            RuntimeError::io_op(
                "posix_spawnp",
                &format!("could not spawn process `{}`", String::from_utf8_lossy(cmd)),
                &err,
            )
        })?;
    Ok(status_code(status))
}

/// Spawn a process with connected standard streams, write `input` while
/// collecting standard output, and wait.
pub fn pipe(
    cmd: &[u8],
    argv: Option<&Array>,
    envp: Option<&Array>,
    input: Option<&[u8]>,
) -> Result<Option<Bytes>> {
    let mut command = build_command(cmd, argv, envp)?;
    command.stdin(Stdio::piped()).stdout(Stdio::piped());

    let mut child = command.spawn().map_err(|err| {
        RuntimeError::io_op(
            "posix_spawnp",
            &format!("could not spawn process `{}`", String::from_utf8_lossy(cmd)),
            &err,
        )
    })?;

    // Feed the input from a helper thread so neither pipe can deadlock.
    let stdin = child.stdin.take();
    let writer = match (stdin, input) {
        (Some(mut stdin), Some(input)) if !input.is_empty() => {
            let payload = input.to_vec();
            Some(std::thread::spawn(move || {
                // A broken pipe only means the child stopped reading.
                let _ = stdin.write_all(&payload);
            }))
        }
        _ => None,
    };

    let mut output = Bytes::new();
    if let Some(mut stdout) = child.stdout.take() {
        stdout.read_to_end(&mut output).map_err(|err| {
            RuntimeError::io_op(
                "read",
                &format!(
                    "could not receive output data from process `{}`",
                    String::from_utf8_lossy(cmd)
                ),
                &err,
            )
        })?;
    }

    let status = child.wait().map_err(|err| {
        RuntimeError::io_op("waitpid", "error awaiting child process", &err)
    })?;
    if let Some(writer) = writer {
        let _ = writer.join();
    }

    match status.code() {
        Some(0) => Ok(Some(output)),
        Some(_) => Ok(None),
        None => Ok(None),
    }
}

/// Detach from the controlling session via the classic double fork. The
/// calling process image continues in the grandchild with its standard
/// streams redirected to a connectionless AF_UNIX socket.
pub fn daemonize() -> Result<()> {
    unsafe {
        let tfd = libc::socket(libc::AF_UNIX, libc::SOCK_STREAM, 0);
        if tfd == -1 {
            return Err(RuntimeError::io_op(
                "socket",
                "could not create blackhole stream",
                &std::io::Error::last_os_error(),
            ));
        }

        let cpid = libc::fork();
        if cpid == -1 {
            let err = std::io::Error::last_os_error();
            libc::close(tfd);
            return Err(RuntimeError::io_op("fork", "could not create child process", &err));
        }
        if cpid != 0 {
            // Await the CHILD and forward its exit status.
            loop {
                let mut wstatus = 0;
                if libc::waitpid(cpid, &mut wstatus, 0) != cpid {
                    continue;
                }
                if libc::WIFEXITED(wstatus) {
                    libc::_exit(libc::WEXITSTATUS(wstatus));
                }
                if libc::WIFSIGNALED(wstatus) {
                    libc::_exit(128 + libc::WTERMSIG(wstatus));
                }
            }
        }

        // The CHILD becomes a session leader, so the GRANDCHILD cannot
        // regain a controlling terminal.
        libc::setsid();

        let cpid = libc::fork();
        if cpid == -1 {
            libc::_exit(127);
        }
        if cpid != 0 {
            libc::_exit(0);
        }

        // The GRANDCHILD continues execution with dead standard streams.
        libc::shutdown(tfd, libc::SHUT_RDWR);
        libc::dup2(tfd, libc::STDIN_FILENO);
        libc::dup2(tfd, libc::STDOUT_FILENO);
        libc::dup2(tfd, libc::STDERR_FILENO);
        libc::close(tfd);
    }
    Ok(())
}

/// Sleep for `duration` milliseconds; returns the time remaining if the
/// sleep was interrupted by a signal.
pub fn sleep(duration: f64) -> f64 {
    if !(duration >= 0.0) {
        return 0.0;
    }
    let secs = duration * 0.001;
    let mut ts = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    if secs >= 0x7FFF_FFFF_FFFF_FC00u64 as f64 {
        ts.tv_sec = i64::MAX - 1024;
    } else if secs > 0.0 {
        let secs = secs + 0.000_000_000_999;
        ts.tv_sec = secs as i64;
        ts.tv_nsec = ((secs - ts.tv_sec as f64) * 1_000_000_000.0) as i64;
    }
    let mut rem = libc::timespec { tv_sec: 0, tv_nsec: 0 };
    let rc = unsafe { libc::nanosleep(&ts, &mut rem) };
    if rc == 0 {
        return 0.0;
    }
    rem.tv_sec as f64 * 1000.0 + rem.tv_nsec as f64 * 0.000_001
}

// ---------------------------------------------------------------------
// Configuration reader
// ---------------------------------------------------------------------

struct ConfLexer<'a> {
    src: &'a [u8],
    path: String,
    pos: usize,
    line: usize,
    column: usize,
    tok_line: usize,
    tok_column: usize,
}

#[derive(Clone, PartialEq)]
enum ConfToken {
    Punct(u8),
    Ident(String),
    Number(String),
    Str(Bytes),
    Eof,
}

impl<'a> ConfLexer<'a> {
    fn err_at(&self, what: &str, line: usize, column: usize) -> RuntimeError {
        RuntimeError::Parse(format!("{what} at '{}:{line}:{column}'", self.path))
    }

    fn err(&self, what: &str) -> RuntimeError {
        self.err_at(what, self.tok_line, self.tok_column)
    }

    fn advance_position(&mut self, cp: u32) {
        if cp == b'\n' as u32 {
            self.line += 1;
            self.column = 1;
        } else if cp == b'\t' as u32 {
            self.column += 8 - ((self.column - 1) & 7);
        } else {
            let w = char::from_u32(cp).and_then(|c| c.width()).unwrap_or(0);
            self.column += w;
        }
    }

    fn next_char(&mut self) -> Result<Option<u32>> {
        if self.pos >= self.src.len() {
            return Ok(None);
        }
        match utf8_decode_one(self.src, &mut self.pos) {
            Some(cp) => {
                self.advance_position(cp);
                Ok(Some(cp))
            }
            None => Err(self.err_at("invalid UTF-8 sequence", self.line, self.column)),
        }
    }

    fn peek_byte(&self) -> Option<u8> {
        self.src.get(self.pos).copied()
    }

    fn skip_blank_and_comments(&mut self) -> Result<()> {
        loop {
            match self.peek_byte() {
                Some(b' ') | Some(b'\t') | Some(b'\r') | Some(b'\n') | Some(0x0B) | Some(0x0C) => {
                    self.next_char()?;
                }
                Some(b'/') => {
                    let open_line = self.line;
                    let open_column = self.column;
                    self.next_char()?;
                    match self.peek_byte() {
                        Some(b'/') => loop {
                            match self.next_char()? {
                                None => return Ok(()),
                                Some(c) if c == b'\n' as u32 => break,
                                _ => {}
                            }
                        },
                        Some(b'*') => {
                            self.next_char()?;
                            loop {
                                match self.next_char()? {
                                    None => {
                                        return Err(self.err_at(
                                            "incomplete comment",
                                            open_line,
                                            open_column,
                                        ))
                                    }
                                    Some(c) if c == b'*' as u32 => {
                                        if self.peek_byte() == Some(b'/') {
                                            self.next_char()?;
                                            break;
                                        }
                                    }
                                    _ => {}
                                }
                            }
                        }
                        _ => return Err(self.err_at("invalid character", open_line, open_column)),
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    fn take_digits(&mut self, out: &mut String, pred: impl Fn(u8) -> bool) -> Result<usize> {
        let mut count = 0;
        while let Some(b) = self.peek_byte() {
            if b == b'`' {
                // Digit group separator, skipped.
                self.next_char()?;
                continue;
            }
            if !pred(b) {
                break;
            }
            out.push(b as char);
            self.next_char()?;
            count += 1;
        }
        Ok(count)
    }

    fn take_number(&mut self, first: u8) -> Result<ConfToken> {
        let mut text = String::new();
        if (first == b'+') || (first == b'-') {
            text.push(first as char);
            self.next_char()?;
            if !self.peek_byte().is_some_and(|b| b.is_ascii_digit()) {
                return Err(self.err("invalid number"));
            }
        }

        let mut is_hex = false;
        let mut is_bin = false;
        if self.peek_byte() == Some(b'0') {
            text.push('0');
            self.next_char()?;
            match self.peek_byte().map(|b| b | 0x20) {
                Some(b'x') => {
                    text.push('x');
                    self.next_char()?;
                    is_hex = true;
                }
                Some(b'b') => {
                    text.push('b');
                    self.next_char()?;
                    is_bin = true;
                }
                _ => {}
            }
        }

        let digit_pred: fn(u8) -> bool = if is_hex {
            |b| b.is_ascii_hexdigit()
        } else if is_bin {
            |b| matches!(b, b'0' | b'1')
        } else {
            |b| b.is_ascii_digit()
        };
        let exp_marker = if is_hex || is_bin { b'p' } else { b'e' };

        let ndigits = self.take_digits(&mut text, digit_pred)?;
        if (is_hex || is_bin) && (ndigits == 0) {
            return Err(self.err("invalid number"));
        }

        if self.peek_byte() == Some(b'.') {
            text.push('.');
            self.next_char()?;
            if self.take_digits(&mut text, digit_pred)? == 0 {
                return Err(self.err("invalid number"));
            }
        }

        if self.peek_byte().map(|b| b | 0x20) == Some(exp_marker) {
            text.push(exp_marker as char);
            self.next_char()?;
            if matches!(self.peek_byte(), Some(b'+') | Some(b'-')) {
                text.push(self.peek_byte().map_or(' ', |b| b as char));
                self.next_char()?;
            }
            if self.take_digits(&mut text, |b| b.is_ascii_digit())? == 0 {
                return Err(self.err("invalid number"));
            }
        }
        Ok(ConfToken::Number(text))
    }

    fn take_escape(&mut self) -> Result<u32> {
        let esc_line = self.line;
        let esc_column = self.column;
        let c = self
            .next_char()?
            .ok_or_else(|| self.err_at("incomplete escape sequence", esc_line, esc_column))?;
        let hex4 = |lexer: &mut Self| -> Result<u32> {
            let mut unit = 0u32;
            for _ in 0..4 {
                let d = lexer
                    .next_char()?
                    .ok_or_else(|| lexer.err_at("incomplete escape sequence", esc_line, esc_column))?;
                unit <<= 4;
                unit |= match d {
                    0x30..=0x39 => d - 0x30,
                    0x41..=0x46 => d - 0x41 + 10,
                    0x61..=0x66 => d - 0x61 + 10,
                    _ => return Err(lexer.err_at("incomplete escape sequence", esc_line, esc_column)),
                };
            }
            Ok(unit)
        };
        Ok(match c {
            c @ (0x5C | 0x22 | 0x2F) => c,
            0x62 => 0x08,
            0x66 => 0x0C,
            0x6E => 0x0A,
            0x72 => 0x0D,
            0x74 => 0x09,
            0x75 => {
                let unit = hex4(self)?;
                if (0xDC00..=0xDFFF).contains(&unit) {
                    return Err(self.err_at("dangling UTF-16 trailing surrogate", esc_line, esc_column));
                }
                if (0xD800..=0xDBFF).contains(&unit) {
                    if self.next_char()? != Some(0x5C) {
                        return Err(self.err_at("missing UTF-16 trailing surrogate", esc_line, esc_column));
                    }
                    if self.next_char()? != Some(0x75) {
                        return Err(self.err_at("missing UTF-16 trailing surrogate", esc_line, esc_column));
                    }
                    let trail = hex4(self)?;
                    if !(0xDC00..=0xDFFF).contains(&trail) {
                        return Err(self.err_at("invalid UTF-16 trailing surrogate", esc_line, esc_column));
                    }
                    0x10000 + ((unit - 0xD800) << 10) + (trail - 0xDC00)
                } else {
                    unit
                }
            }
            0x55 => {
                // A six-digit UTF-32 escape.
                let mut cp = 0u32;
                for _ in 0..6 {
                    let d = self
                        .next_char()?
                        .ok_or_else(|| self.err_at("incomplete escape sequence", esc_line, esc_column))?;
                    cp <<= 4;
                    cp |= match d {
                        0x30..=0x39 => d - 0x30,
                        0x41..=0x46 => d - 0x41 + 10,
                        0x61..=0x66 => d - 0x61 + 10,
                        _ => {
                            return Err(self.err_at("incomplete escape sequence", esc_line, esc_column))
                        }
                    };
                }
                if cp >= 0x10FFFF {
                    return Err(self.err_at("invalid UTF-32 character", esc_line, esc_column));
                }
                if (0xD800..=0xDFFF).contains(&cp) {
                    return Err(self.err_at("dangling UTF-16 surrogate", esc_line, esc_column));
                }
                cp
            }
            _ => return Err(self.err_at("invalid escape sequence", esc_line, esc_column)),
        })
    }

    fn take_quoted(&mut self, quote: u8) -> Result<Bytes> {
        let mut text = Bytes::new();
        loop {
            let ch_line = self.line;
            let ch_column = self.column;
            let c = self
                .next_char()?
                .ok_or_else(|| self.err("incomplete string"))?;
            if (c <= 0x1F) || (c == 0x7F) {
                return Err(self.err_at("control character not allowed", ch_line, ch_column));
            }
            if c == quote as u32 {
                return Ok(text);
            }
            // Escape sequences only exist in double-quoted strings.
            let c = if (quote == b'"') && (c == 0x5C) {
                self.take_escape()?
            } else {
                c
            };
            if !utf8_encode_one(&mut text, c) {
                return Err(self.err_at("invalid Unicode character", ch_line, ch_column));
            }
        }
    }

    fn next_token(&mut self) -> Result<ConfToken> {
        self.skip_blank_and_comments()?;
        self.tok_line = self.line;
        self.tok_column = self.column;

        // Skip a byte-order mark at the very beginning.
        if (self.pos == 0) && self.src.starts_with(b"\xEF\xBB\xBF") {
            self.pos = 3;
            return self.next_token();
        }

        let b = match self.peek_byte() {
            None => return Ok(ConfToken::Eof),
            Some(b) => b,
        };
        match b {
            b'[' | b']' | b'{' | b'}' | b':' | b'=' | b',' | b';' => {
                self.next_char()?;
                Ok(ConfToken::Punct(b))
            }
            b'A'..=b'Z' | b'a'..=b'z' | b'_' | b'$' => {
                let mut name = String::new();
                while self
                    .peek_byte()
                    .is_some_and(|b| b.is_ascii_alphanumeric() || (b == b'_') || (b == b'$'))
                {
                    name.push(self.peek_byte().map_or(' ', |b| b as char));
                    self.next_char()?;
                }
                Ok(ConfToken::Ident(name))
            }
            b'+' | b'-' => self.take_number(b),
            b'0'..=b'9' => self.take_number(0),
            b'\'' | b'"' => {
                self.next_char()?;
                Ok(ConfToken::Str(self.take_quoted(b)?))
            }
            _ => Err(self.err_at("invalid character", self.line, self.column)),
        }
    }
}

const CONF_NESTING_LIMIT: usize = 32;

struct ConfParser<'a> {
    lexer: ConfLexer<'a>,
}

impl<'a> ConfParser<'a> {
    fn parse_number(&self, text: &str) -> Result<Value> {
        let value = crate::library::numeric::parse(text.as_bytes())
            .map_err(|_| self.lexer.err("invalid number"))?;
        if text.contains('.') {
            Ok(Value::Real(value.as_real().map_err(|_| self.lexer.err("invalid number"))?))
        } else {
            match value {
                Value::Integer(_) => Ok(value),
                _ => Err(self.lexer.err("integer out of range")),
            }
        }
    }

    fn parse_value(&mut self, token: ConfToken, depth: usize) -> Result<Value> {
        if depth > CONF_NESTING_LIMIT {
            return Err(self.lexer.err("nesting limit exceeded"));
        }
        match token {
            ConfToken::Punct(b'[') => {
                let mut array = Array::new();
                loop {
                    match self.lexer.next_token()? {
                        ConfToken::Punct(b',' | b';') => continue,
                        ConfToken::Punct(b']') => return Ok(Value::from(array)),
                        ConfToken::Eof => {
                            return Err(self.lexer.err("array not terminated properly"))
                        }
                        other => array.push(self.parse_value(other, depth + 1)?),
                    }
                }
            }
            ConfToken::Punct(b'{') => {
                let object = self.parse_object_body(depth + 1, true)?;
                Ok(Value::from(object))
            }
            ConfToken::Number(text) => self.parse_number(&text),
            ConfToken::Str(s) => Ok(Value::from(s)),
            ConfToken::Ident(name) => match name.as_str() {
                "null" => Ok(Value::Null),
                "true" => Ok(Value::Boolean(true)),
                "false" => Ok(Value::Boolean(false)),
                _ => Err(self.lexer.err("invalid token")),
            },
            _ => Err(self.lexer.err("invalid token")),
        }
    }

    /// Parse `key value` pairs up to a closing brace (or end of input for
    /// the top level).
    fn parse_object_body(&mut self, depth: usize, braced: bool) -> Result<Object> {
        if depth > CONF_NESTING_LIMIT {
            return Err(self.lexer.err("nesting limit exceeded"));
        }
        let mut object = Object::new();
        loop {
            let token = self.lexer.next_token()?;
            match token {
                ConfToken::Eof => {
                    if braced {
                        return Err(self.lexer.err("object not terminated properly"));
                    }
                    return Ok(object);
                }
                ConfToken::Punct(b'}') if braced => return Ok(object),
                ConfToken::Punct(b',' | b';') => continue,
                ConfToken::Str(key) => {
                    self.parse_pair(&mut object, key, depth)?;
                }
                ConfToken::Ident(name) => {
                    self.parse_pair(&mut object, name.into_bytes(), depth)?;
                }
                _ => return Err(self.lexer.err("key expected")),
            }
        }
    }

    fn parse_pair(&mut self, object: &mut Object, key: Bytes, depth: usize) -> Result<()> {
        let mut token = self.lexer.next_token()?;
        if matches!(token, ConfToken::Punct(b':') | ConfToken::Punct(b'=')) {
            token = self.lexer.next_token()?;
        }
        if token == ConfToken::Eof {
            return Err(self.lexer.err("missing value"));
        }
        let value = self.parse_value(token, depth)?;
        if object.insert(key.clone(), value).is_some() {
            return Err(self.lexer.err(&format!(
                "duplicate key `{}`",
                String::from_utf8_lossy(&key)
            )));
        }
        Ok(())
    }
}

pub fn load_conf(path: &[u8]) -> Result<Object> {
    let pathbuf = bytes_to_path(path);
    let text = std::fs::read(&pathbuf).map_err(|err| {
        RuntimeError::io_op(
            "fopen",
            &format!("could not open configuration file '{}'", pathbuf.display()),
            &err,
        )
    })?;
    let lexer = ConfLexer {
        src: &text,
        path: pathbuf.display().to_string(),
        pos: 0,
        line: 1,
        column: 1,
        tok_line: 1,
        tok_column: 1,
    };
    let mut parser = ConfParser { lexer };
    parser.parse_object_body(0, false)
}

pub fn create_bindings_system(result: &mut Object, _version: ApiVersion) {
    result.insert(
        skey("get_working_directory"),
        Value::from(NativeFunction::new(
            "std.system.get_working_directory",
            "",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                if reader.end_overload() {
                    return Ok(Value::from(get_working_directory()?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("get_environment_variable"),
        Value::from(NativeFunction::new(
            "std.system.get_environment_variable",
            "name",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let name = reader.required_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(get_environment_variable(&name)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("get_environment_variables"),
        Value::from(NativeFunction::new(
            "std.system.get_environment_variables",
            "",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                if reader.end_overload() {
                    return Ok(Value::from(get_environment_variables()));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("get_properties"),
        Value::from(NativeFunction::new(
            "std.system.get_properties",
            "",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                if reader.end_overload() {
                    return Ok(Value::from(get_properties()));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("random_uuid"),
        Value::from(NativeFunction::new(
            "std.system.random_uuid",
            "",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                if reader.end_overload() {
                    return Ok(Value::from(random_uuid(global)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("get_pid"),
        Value::from(NativeFunction::new(
            "std.system.get_pid",
            "",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                if reader.end_overload() {
                    return Ok(Value::from(get_pid()));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("get_ppid"),
        Value::from(NativeFunction::new(
            "std.system.get_ppid",
            "",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                if reader.end_overload() {
                    return Ok(Value::from(get_ppid()));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("get_uid"),
        Value::from(NativeFunction::new(
            "std.system.get_uid",
            "",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                if reader.end_overload() {
                    return Ok(Value::from(get_uid()));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("get_euid"),
        Value::from(NativeFunction::new(
            "std.system.get_euid",
            "",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                if reader.end_overload() {
                    return Ok(Value::from(get_euid()));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("call"),
        Value::from(NativeFunction::new(
            "std.system.call",
            "cmd, [argv], [envp]",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let cmd = reader.required_string()?;
                let argv = reader.optional_array()?;
                let envp = reader.optional_array()?;
                if reader.end_overload() {
                    return Ok(Value::from(call(&cmd, argv.as_ref(), envp.as_ref())?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("pipe"),
        Value::from(NativeFunction::new(
            "std.system.pipe",
            "cmd, [argv], [envp], [input]",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let cmd = reader.required_string()?;
                let argv = reader.optional_array()?;
                let envp = reader.optional_array()?;
                let input = reader.optional_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(pipe(
                        &cmd,
                        argv.as_ref(),
                        envp.as_ref(),
                        input.as_deref(),
                    )?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("daemonize"),
        Value::from(NativeFunction::new(
            "std.system.daemonize",
            "",
            NativeTarget::VoidA(|mut reader| {
                reader.start_overload();
                if reader.end_overload() {
                    return daemonize();
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("sleep"),
        Value::from(NativeFunction::new(
            "std.system.sleep",
            "duration",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let duration = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(sleep(duration)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("load_conf"),
        Value::from(NativeFunction::new(
            "std.system.load_conf",
            "path",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let path = reader.required_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(load_conf(&path)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    fn write_conf(content: &str) -> (tempfile::TempDir, Bytes) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.conf");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        let pb = crate::library::path_to_bytes(&path);
        (dir, pb)
    }

    #[test]
    fn identity_queries() {
        assert!(get_pid() > 0);
        assert!(get_ppid() >= 0);
        assert!(get_uid() >= 0);
        assert!(!get_working_directory().unwrap().is_empty());
        let props = get_properties();
        assert!(props.get(&skey("os")).unwrap().as_string().unwrap().len() > 0);
        assert!(props.get(&skey("nprocs")).unwrap().as_integer().unwrap() >= 1);
    }

    #[test]
    fn environment_access() {
        std::env::set_var("ASTERIA_TEST_VAR", "marker");
        assert_eq!(
            get_environment_variable(b"ASTERIA_TEST_VAR"),
            Some(b"marker".to_vec())
        );
        assert_eq!(get_environment_variable(b"ASTERIA_NO_SUCH_VAR"), None);
        let vars = get_environment_variables();
        assert_eq!(
            vars.get(&skey("ASTERIA_TEST_VAR")).unwrap(),
            &Value::from("marker")
        );
    }

    #[test]
    fn uuid_shape_and_uniqueness() {
        let global = Global::new(ApiVersion::V0001_0000);
        let a = random_uuid(&global);
        let b = random_uuid(&global);
        assert_ne!(a, b);
        assert_eq!(a.len(), 36);
        assert_eq!(a[8], b'-');
        assert_eq!(a[13], b'-');
        assert_eq!(a[14], b'4');
        assert_eq!(a[18], b'-');
        assert!(matches!(a[19], b'8' | b'9' | b'a' | b'b'));
        assert_eq!(a[23], b'-');
        assert!(a.iter().all(|&c| c.is_ascii_hexdigit() || c == b'-'));
    }

    #[test]
    fn call_reports_exit_status() {
        assert_eq!(call(b"true", None, None).unwrap(), 0);
        assert_eq!(call(b"false", None, None).unwrap(), 1);
        let argv = vec![Value::from("-c"), Value::from("exit 42")];
        assert_eq!(call(b"sh", Some(&argv), None).unwrap(), 42);
        assert!(call(b"no-such-command-zzz", None, None).is_err());
    }

    #[test]
    fn pipe_captures_stdout_on_clean_exit() {
        let argv = vec![Value::from("-c"), Value::from("cat")];
        let out = pipe(b"sh", Some(&argv), None, Some(b"payload")).unwrap();
        assert_eq!(out, Some(b"payload".to_vec()));

        let argv = vec![Value::from("-c"), Value::from("echo ok; exit 3")];
        assert_eq!(pipe(b"sh", Some(&argv), None, None).unwrap(), None);

        // A cleared environment is visible to the child.
        let argv = vec![Value::from("-c"), Value::from("echo -n $MARKER")];
        let envp = vec![Value::from("MARKER=42"), Value::from("PATH=/bin:/usr/bin")];
        let out = pipe(b"sh", Some(&argv), Some(&envp), None).unwrap();
        assert_eq!(out, Some(b"42".to_vec()));
    }

    #[test]
    fn sleep_returns_zero_when_uninterrupted() {
        assert_eq!(sleep(f64::NAN), 0.0);
        assert_eq!(sleep(-5.0), 0.0);
        let begin = std::time::Instant::now();
        assert_eq!(sleep(20.0), 0.0);
        assert!(begin.elapsed().as_millis() >= 19);
    }

    #[test]
    fn load_conf_literals() {
        let (_dir, path) = write_conf(
            r#"
            // line comment
            name "example"
            port: 8080
            group = 1`000`000
            mask 0xFF
            bits 0b1010
            scale 1.5e2
            flag true
            empty null
            /* block
               comment */
            nested {
                key: 'single quoted'
                list [1, 2, 3,]
            }
            escapes "a\tbA\U01F600"
            "#,
        );
        let conf = load_conf(&path).unwrap();
        assert_eq!(conf.get(&skey("name")).unwrap(), &Value::from("example"));
        assert_eq!(conf.get(&skey("port")).unwrap(), &Value::Integer(8080));
        assert_eq!(conf.get(&skey("group")).unwrap(), &Value::Integer(1_000_000));
        assert_eq!(conf.get(&skey("mask")).unwrap(), &Value::Integer(255));
        assert_eq!(conf.get(&skey("bits")).unwrap(), &Value::Integer(10));
        assert_eq!(conf.get(&skey("scale")).unwrap(), &Value::Real(150.0));
        assert_eq!(conf.get(&skey("flag")).unwrap(), &Value::Boolean(true));
        assert_eq!(conf.get(&skey("empty")).unwrap(), &Value::Null);

        let nested = conf.get(&skey("nested")).unwrap().as_object().unwrap();
        assert_eq!(nested.get(&skey("key")).unwrap(), &Value::from("single quoted"));
        let list = nested.get(&skey("list")).unwrap().as_array().unwrap();
        assert_eq!(list.len(), 3);

        assert_eq!(
            conf.get(&skey("escapes")).unwrap(),
            &Value::from("a\tbA\u{1F600}")
        );
    }

    #[test]
    fn load_conf_rejects_malformed_input() {
        let (_dir, path) = write_conf("a {");
        assert!(load_conf(&path).is_err());

        let (_dir, path) = write_conf("a 1 a 2");
        let err = load_conf(&path).unwrap_err().to_string();
        assert!(err.contains("duplicate key"));

        let (_dir, path) = write_conf("a /* unterminated");
        assert!(load_conf(&path).is_err());

        let (_dir, path) = write_conf("a @");
        let err = load_conf(&path).unwrap_err().to_string();
        assert!(err.contains(":1:"));

        assert!(load_conf(b"/no/such/file.conf").is_err());
    }

    #[test]
    fn load_conf_reports_positions() {
        let (_dir, path) = write_conf("ok 1\nbad @\n");
        let err = load_conf(&path).unwrap_err().to_string();
        assert!(err.contains(":2:"), "unexpected message: {err}");
    }
}
