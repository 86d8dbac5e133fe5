//! # `std.numeric`
//!
//! Classification, rounding, formatting and parsing of numbers, plus the
//! binary packers.
//!
//! ## Notes
//! - The `i*` rounding family converts to integer and fails on values that
//!   do not fit; the plain family preserves the operand type.
//! - `format` understands bases 2, 10 and 16; the exponent-normal forms use
//!   `p` for power-of-two exponents (bases 2 and 16) and `e` for decimal.
//!   Any other base/ebase combination is an error.
//! - `parse` accepts decimal, hexadecimal (`0x`) and binary (`0b`) literals
//!   with optional sign, fraction and exponent, as well as `infinity` and
//!   `nan`. Text without a decimal point that denotes an exactly
//!   representable 64-bit integer parses as integer, everything else as
//!   real.
//! - Packers produce two's-complement bytes for integers and raw IEEE-754
//!   images for reals; unpackers require the length to divide evenly.

use crate::binding::{NativeFunction, NativeTarget};
use crate::error::{Result, RuntimeError};
use crate::global::{ApiVersion, Global};
use crate::value::{format_real, skey, Array, Bytes, Compare, Object, Value};

pub fn abs_integer(value: i64) -> Result<i64> {
    value.checked_abs().ok_or_else(|| {
        RuntimeError::Range(format!("integer absolute value overflow (value `{value}`)"))
    })
}

pub fn abs_real(value: f64) -> f64 {
    value.abs()
}

/// The sign bit: true for negative values, including negative zero and
/// negative NaN.
pub fn sign_integer(value: i64) -> bool {
    value < 0
}

pub fn sign_real(value: f64) -> bool {
    value.is_sign_negative()
}

pub fn is_finite(value: f64) -> bool {
    value.is_finite()
}

pub fn is_infinity(value: f64) -> bool {
    value.is_infinite()
}

pub fn is_nan(value: f64) -> bool {
    value.is_nan()
}

pub fn max(values: &[Value]) -> Value {
    let mut result = Value::Null;
    for r in values {
        if result.is_null() || (result.compare_partial(r) == Compare::Less) {
            result = r.clone();
        }
    }
    result
}

pub fn min(values: &[Value]) -> Value {
    let mut result = Value::Null;
    for r in values {
        if result.is_null() || (result.compare_partial(r) == Compare::Greater) {
            result = r.clone();
        }
    }
    result
}

pub fn clamp(value: Value, lower: Value, upper: Value) -> Value {
    if value.compare_total(&lower) == Compare::Less {
        return lower;
    }
    if value.compare_total(&upper) == Compare::Greater {
        return upper;
    }
    value
}

fn safe_f64_to_i64(value: f64) -> Result<i64> {
    // 2^63 is exactly representable; i64::MAX is not.
    if !(value >= -9_223_372_036_854_775_808.0 && value < 9_223_372_036_854_775_808.0) {
        return Err(RuntimeError::Range(format!(
            "value not representable as a 64-bit integer (value `{}`)",
            format_real(value)
        )));
    }
    Ok(value as i64)
}

pub fn round_real(value: f64) -> f64 {
    value.round()
}

pub fn iround(value: f64) -> Result<i64> {
    safe_f64_to_i64(value.round())
}

pub fn floor_real(value: f64) -> f64 {
    value.floor()
}

pub fn ifloor(value: f64) -> Result<i64> {
    safe_f64_to_i64(value.floor())
}

pub fn ceil_real(value: f64) -> f64 {
    value.ceil()
}

pub fn iceil(value: f64) -> Result<i64> {
    safe_f64_to_i64(value.ceil())
}

pub fn trunc_real(value: f64) -> f64 {
    value.trunc()
}

pub fn itrunc(value: f64) -> Result<i64> {
    safe_f64_to_i64(value.trunc())
}

/// A random real in [0,1), scaled by `limit` when given. Consumes two PRNG
/// words to build 53 bits.
pub fn random(global: &Global, limit: Option<f64>) -> Result<f64> {
    let mut ireg = global.random_u32() as i64;
    ireg <<= 21;
    ireg ^= global.random_u32() as i64;
    let ratio = ireg as f64 * 2f64.powi(-53);

    match limit {
        None => Ok(ratio),
        Some(l) if l == 0.0 => Err(RuntimeError::Range("random number limit was zero".to_string())),
        Some(l) if !l.is_finite() => Err(RuntimeError::Range(format!(
            "random number limit `{}` was not finite",
            format_real(l)
        ))),
        Some(l) => Ok(ratio * l),
    }
}

pub fn remainder(x: f64, y: f64) -> f64 {
    libm::remainder(x, y)
}

pub fn frexp(x: f64) -> (f64, i64) {
    let (frac, exp) = libm::frexp(x);
    (frac, exp as i64)
}

pub fn ldexp(frac: f64, exp: i64) -> f64 {
    libm::ldexp(frac, exp.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
}

pub fn rotl(m: i64, x: i64, n: i64) -> Result<i64> {
    if !(0..=64).contains(&m) {
        return Err(RuntimeError::Range(format!(
            "invalid modulo bit count (`{m}` is not between 0 and 64)"
        )));
    }
    if m == 0 {
        return Ok(0);
    }
    let mut ireg = x as u64;
    let mask = (2u128.pow(m as u32) - 1) as u64;
    let mut sh = n % m;
    if sh != 0 {
        if sh < 0 {
            sh += m;
        }
        ireg = (ireg << sh) | ((ireg & mask) >> (m - sh));
    }
    Ok((ireg & mask) as i64)
}

pub fn rotr(m: i64, x: i64, n: i64) -> Result<i64> {
    if !(0..=64).contains(&m) {
        return Err(RuntimeError::Range(format!(
            "invalid modulo bit count (`{m}` is not between 0 and 64)"
        )));
    }
    if m == 0 {
        return Ok(0);
    }
    let mut ireg = x as u64;
    let mask = (2u128.pow(m as u32) - 1) as u64;
    let mut sh = n % m;
    if sh != 0 {
        if sh < 0 {
            sh += m;
        }
        ireg = ((ireg & mask) >> sh) | (ireg << (m - sh));
    }
    Ok((ireg & mask) as i64)
}

/// Factor out powers of `ebase` from `value`.
fn decompose_integer(ebase: i64, value: i64) -> (i64, i32) {
    let mut ireg = value;
    let mut iexp = 0;
    while ireg != 0 && ireg % ebase == 0 {
        ireg /= ebase;
        iexp += 1;
    }
    (ireg, iexp)
}

fn append_exponent(text: &mut String, delim: char, exp: i32) {
    text.push(delim);
    if exp >= 0 {
        text.push_str(&format!("+{:02}", exp));
    } else {
        text.push_str(&format!("-{:02}", -exp));
    }
}

fn format_integer_radix(value: i64, radix: u32, prefix: &str) -> String {
    let mut text = String::new();
    if value < 0 {
        text.push('-');
    }
    text.push_str(prefix);
    let mut magnitude = value.unsigned_abs();
    let mut digits = Vec::new();
    loop {
        let d = (magnitude % radix as u64) as usize;
        digits.push(b"0123456789ABCDEF"[d] as char);
        magnitude /= radix as u64;
        if magnitude == 0 {
            break;
        }
    }
    text.extend(digits.iter().rev());
    text
}

pub fn format_integer(value: i64, base: Option<i64>, ebase: Option<i64>) -> Result<String> {
    match base.unwrap_or(10) {
        2 => match ebase {
            None => Ok(format_integer_radix(value, 2, "0b")),
            Some(2) => {
                let (ireg, iexp) = decompose_integer(2, value);
                let mut text = format_integer_radix(ireg, 2, "0b");
                append_exponent(&mut text, 'p', iexp);
                Ok(text)
            }
            Some(e) => Err(RuntimeError::Range(format!(
                "invalid exponent base for binary notation (`{e}` is not 2)"
            ))),
        },
        16 => match ebase {
            None => Ok(format_integer_radix(value, 16, "0x")),
            Some(2) => {
                let (ireg, iexp) = decompose_integer(2, value);
                let mut text = format_integer_radix(ireg, 16, "0x");
                append_exponent(&mut text, 'p', iexp);
                Ok(text)
            }
            Some(e) => Err(RuntimeError::Range(format!(
                "invalid exponent base for hexadecimal notation (`{e}` is not 2)"
            ))),
        },
        10 => match ebase {
            None => Ok(value.to_string()),
            Some(10) => {
                let (ireg, iexp) = decompose_integer(10, value);
                let mut text = ireg.to_string();
                append_exponent(&mut text, 'e', iexp);
                Ok(text)
            }
            Some(e) => Err(RuntimeError::Range(format!(
                "invalid exponent base for decimal notation (`{e}` is not 10)"
            ))),
        },
        b => Err(RuntimeError::Range(format!(
            "invalid number base (base `{b}` is not one of {{ 2, 10, 16 }})"
        ))),
    }
}

/// Decompose a finite nonzero real into `(mantissa, exponent)` with
/// `value = ±mantissa * 2^exponent` and the mantissa top bit set.
fn real_to_mantissa(value: f64) -> (u64, i32) {
    let bits = value.to_bits();
    let exp_bits = ((bits >> 52) & 0x7FF) as i32;
    let frac = bits & 0xF_FFFF_FFFF_FFFF;
    if exp_bits == 0 {
        (frac, -1074)
    } else {
        (frac | (1 << 52), exp_bits - 1075)
    }
}

/// Positional base-2^k rendering of a finite real, digits without prefix.
fn format_real_radix(value: f64, k: u32) -> String {
    let mut text = String::new();
    if value.is_sign_negative() {
        text.push('-');
    }
    if value == 0.0 {
        text.push('0');
        return text;
    }
    let (mantissa, exponent) = real_to_mantissa(value.abs());

    // Bit `i` (weight 2^i) of the magnitude.
    let bit = |i: i32| -> u64 {
        let j = i - exponent;
        if (0..64).contains(&j) {
            (mantissa >> j) & 1
        } else {
            0
        }
    };
    let digit = |d: i32| -> u64 {
        let mut v = 0;
        for j in (0..k as i32).rev() {
            v = (v << 1) | bit(d * k as i32 + j);
        }
        v
    };

    let dmax = (exponent + 52).div_euclid(k as i32).max(0);
    let dmin = exponent.div_euclid(k as i32).min(0);

    let mut int_digits: Vec<u64> = (0..=dmax).rev().map(digit).collect();
    while int_digits.len() > 1 && int_digits[0] == 0 {
        int_digits.remove(0);
    }
    for d in int_digits {
        text.push(b"0123456789ABCDEF"[d as usize] as char);
    }

    let mut frac_digits: Vec<u64> = (dmin..0).rev().map(digit).collect();
    while frac_digits.last() == Some(&0) {
        frac_digits.pop();
    }
    if !frac_digits.is_empty() {
        text.push('.');
        for d in frac_digits {
            text.push(b"0123456789ABCDEF"[d as usize] as char);
        }
    }
    text
}

/// Exponent-normal base-2^k rendering: one leading digit `1`, fractional
/// digits, and a power-of-two exponent.
fn format_real_radix_exp(value: f64, k: u32) -> String {
    let mut text = String::new();
    if value.is_sign_negative() {
        text.push('-');
    }
    if value == 0.0 {
        text.push('0');
        append_exponent(&mut text, 'p', 0);
        return text;
    }
    let (mantissa, exponent) = real_to_mantissa(value.abs());
    let top = 63 - mantissa.leading_zeros() as i32;
    let e2 = exponent + top;

    text.push('1');
    // The bits below the top one, left-aligned into base-2^k digits.
    let frac_bits = top as u32;
    let mut frac_digits = Vec::new();
    let mut taken = 0;
    while taken < frac_bits {
        let mut v: u64 = 0;
        for j in 0..k {
            let idx = top - 1 - (taken + j) as i32;
            let b = if idx >= 0 { (mantissa >> idx) & 1 } else { 0 };
            v = (v << 1) | b;
        }
        frac_digits.push(v);
        taken += k;
    }
    while frac_digits.last() == Some(&0) {
        frac_digits.pop();
    }
    if !frac_digits.is_empty() {
        text.push('.');
        for d in frac_digits {
            text.push(b"0123456789ABCDEF"[d as usize] as char);
        }
    }
    append_exponent(&mut text, 'p', e2);
    text
}

fn with_prefix(body: String, prefix: &str) -> String {
    match body.strip_prefix('-') {
        Some(rest) => format!("-{prefix}{rest}"),
        None => format!("{prefix}{body}"),
    }
}

pub fn format_real_value(value: f64, base: Option<i64>, ebase: Option<i64>) -> Result<String> {
    if !value.is_finite() {
        return Ok(format_real(value));
    }
    match base.unwrap_or(10) {
        2 => match ebase {
            None => Ok(with_prefix(format_real_radix(value, 1), "0b")),
            Some(2) => Ok(with_prefix(format_real_radix_exp(value, 1), "0b")),
            Some(e) => Err(RuntimeError::Range(format!(
                "invalid exponent base for binary notation (`{e}` is not 2)"
            ))),
        },
        16 => match ebase {
            None => Ok(with_prefix(format_real_radix(value, 4), "0x")),
            Some(2) => Ok(with_prefix(format_real_radix_exp(value, 4), "0x")),
            Some(e) => Err(RuntimeError::Range(format!(
                "invalid exponent base for hexadecimal notation (`{e}` is not 2)"
            ))),
        },
        10 => match ebase {
            None => Ok(format_real(value)),
            Some(10) => {
                let sci = format!("{value:e}");
                let (mant, exp) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
                let exp: i32 = exp.parse().unwrap_or(0);
                let mut text = mant.to_string();
                append_exponent(&mut text, 'e', exp);
                Ok(text)
            }
            Some(e) => Err(RuntimeError::Range(format!(
                "invalid exponent base for decimal notation (`{e}` is not 10)"
            ))),
        },
        b => Err(RuntimeError::Range(format!(
            "invalid number base (base `{b}` is not one of {{ 2, 10, 16 }})"
        ))),
    }
}

/// Parse a numeric literal. See the module documentation for the accepted
/// grammar.
pub fn parse(text: &[u8]) -> Result<Value> {
    const BLANKS: &[u8] = b" \x0C\n\r\t\x0B";
    let begin = match text.iter().position(|b| !BLANKS.contains(b)) {
        Some(p) => p,
        None => return Err(RuntimeError::Parse("blank string".to_string())),
    };
    let end = text.iter().rposition(|b| !BLANKS.contains(b)).map_or(0, |p| p + 1);
    let trimmed = &text[begin..end];
    let fail = || {
        RuntimeError::Parse(format!(
            "string not convertible to a number (text was `{}`)",
            String::from_utf8_lossy(text)
        ))
    };

    let mut s = trimmed;
    let mut negative = false;
    match s.first() {
        Some(b'+') => s = &s[1..],
        Some(b'-') => {
            negative = true;
            s = &s[1..];
        }
        _ => {}
    }

    if s.eq_ignore_ascii_case(b"infinity") {
        return Ok(Value::Real(if negative { f64::NEG_INFINITY } else { f64::INFINITY }));
    }
    if s.eq_ignore_ascii_case(b"nan") {
        return Ok(Value::Real(if negative { -f64::NAN } else { f64::NAN }));
    }

    // Identify the radix.
    let (radix, exp_marker, exp_base): (u64, u8, i64) =
        if s.len() > 2 && s[0] == b'0' && (s[1] | 0x20) == b'x' {
            s = &s[2..];
            (16, b'p', 2)
        } else if s.len() > 2 && s[0] == b'0' && (s[1] | 0x20) == b'b' {
            s = &s[2..];
            (2, b'p', 2)
        } else {
            (10, b'e', 10)
        };

    let digit_value = |b: u8| -> Option<u64> {
        let v = match b {
            b'0'..=b'9' => (b - b'0') as u64,
            b'a'..=b'f' => (b - b'a' + 10) as u64,
            b'A'..=b'F' => (b - b'A' + 10) as u64,
            _ => return None,
        };
        (v < radix).then_some(v)
    };

    // Collect integral and fractional digits into one big register.
    let mut mantissa: u128 = 0;
    let mut truncated = 0i64;
    let mut ndigits = 0;
    let mut nfrac = 0i64;
    let mut seen_point = false;
    let mut pos = 0;
    while pos < s.len() {
        let b = s[pos];
        if b == b'.' {
            if seen_point {
                return Err(fail());
            }
            seen_point = true;
            pos += 1;
            continue;
        }
        match digit_value(b) {
            Some(v) => {
                if mantissa <= (u128::MAX - 15) / 16 / radix as u128 {
                    mantissa = mantissa * radix as u128 + v as u128;
                    if seen_point {
                        nfrac += 1;
                    }
                } else if !seen_point {
                    truncated += 1;
                }
                ndigits += 1;
            }
            None => break,
        }
        pos += 1;
    }
    if ndigits == 0 {
        return Err(fail());
    }

    // Optional exponent.
    let mut exponent: i64 = 0;
    if pos < s.len() && (s[pos] | 0x20) == exp_marker {
        pos += 1;
        let mut exp_negative = false;
        match s.get(pos) {
            Some(b'+') => pos += 1,
            Some(b'-') => {
                exp_negative = true;
                pos += 1;
            }
            _ => {}
        }
        let mut any = false;
        let mut acc: i64 = 0;
        while pos < s.len() && s[pos].is_ascii_digit() {
            acc = acc.saturating_mul(10).saturating_add((s[pos] - b'0') as i64);
            any = true;
            pos += 1;
        }
        if !any {
            return Err(fail());
        }
        exponent = if exp_negative { -acc } else { acc };
    }
    if pos != s.len() {
        return Err(fail());
    }

    // Exact integer path: no decimal point in the text.
    if !seen_point && truncated == 0 {
        let scaled: Option<i128> = if exponent >= 0 {
            let mut acc = i128::try_from(mantissa).ok();
            for _ in 0..exponent.min(256) {
                acc = acc.and_then(|a| a.checked_mul(exp_base as i128));
            }
            acc
        } else {
            let mut acc = i128::try_from(mantissa).ok();
            let mut ok = true;
            for _ in 0..(-exponent).min(256) {
                acc = acc.map(|a| {
                    if a % exp_base as i128 != 0 {
                        ok = false;
                    }
                    a / exp_base as i128
                });
            }
            if ok {
                acc
            } else {
                None
            }
        };
        if let Some(v) = scaled {
            let v = if negative { -v } else { v };
            if let Ok(small) = i64::try_from(v) {
                return Ok(Value::Integer(small));
            }
        }
    }

    // Real path. Each fractional digit scales down by the digit radix; the
    // exponent scales by `exp_base` (a power of two for hex and binary).
    let magnitude = if radix == 10 {
        let body = format!("{mantissa}e{}", exponent - nfrac + truncated);
        body.parse::<f64>().map_err(|_| fail())?
    } else {
        let bits_per_digit = radix.trailing_zeros() as i64;
        let scale = exponent - nfrac * bits_per_digit + truncated * bits_per_digit;
        mantissa as f64 * 2f64.powi(scale.clamp(-9000, 9000) as i32)
    };
    Ok(Value::Real(if negative { -magnitude } else { magnitude }))
}

macro_rules! pack_int {
    ($name:ident, $ty:ty, $conv:ident) => {
        pub fn $name(values: &[i64]) -> Bytes {
            let mut text = Bytes::with_capacity(values.len() * std::mem::size_of::<$ty>());
            for &v in values {
                text.extend_from_slice(&(v as $ty).$conv());
            }
            text
        }
    };
}

pack_int!(pack_i16be_impl, i16, to_be_bytes);
pack_int!(pack_i16le_impl, i16, to_le_bytes);
pack_int!(pack_i32be_impl, i32, to_be_bytes);
pack_int!(pack_i32le_impl, i32, to_le_bytes);
pack_int!(pack_i64be_impl, i64, to_be_bytes);
pack_int!(pack_i64le_impl, i64, to_le_bytes);

pub fn pack_i8_impl(values: &[i64]) -> Bytes {
    values.iter().map(|&v| v as u8).collect()
}

fn require_divisible(len: usize, width: usize) -> Result<()> {
    if len % width != 0 {
        return Err(RuntimeError::Range(format!(
            "string length `{len}` not divisible by {width}"
        )));
    }
    Ok(())
}

pub fn unpack_i8(text: &[u8]) -> Array {
    text.iter().map(|&b| Value::Integer(b as i8 as i64)).collect()
}

macro_rules! unpack_int {
    ($name:ident, $ty:ty, $conv:ident) => {
        pub fn $name(text: &[u8]) -> Result<Array> {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            require_divisible(text.len(), WIDTH)?;
            Ok(text
                .chunks_exact(WIDTH)
                .map(|chunk| {
                    let mut piece = [0u8; WIDTH];
                    piece.copy_from_slice(chunk);
                    Value::Integer(<$ty>::$conv(piece) as i64)
                })
                .collect())
        }
    };
}

unpack_int!(unpack_i16be_fn, i16, from_be_bytes);
unpack_int!(unpack_i16le_fn, i16, from_le_bytes);
unpack_int!(unpack_i32be_fn, i32, from_be_bytes);
unpack_int!(unpack_i32le_fn, i32, from_le_bytes);
unpack_int!(unpack_i64be_fn, i64, from_be_bytes);
unpack_int!(unpack_i64le_fn, i64, from_le_bytes);

macro_rules! pack_float {
    ($name:ident, $ty:ty, $conv:ident) => {
        pub fn $name(values: &[f64]) -> Bytes {
            let mut text = Bytes::with_capacity(values.len() * std::mem::size_of::<$ty>());
            for &v in values {
                text.extend_from_slice(&(v as $ty).$conv());
            }
            text
        }
    };
}

pack_float!(pack_f32be_impl, f32, to_be_bytes);
pack_float!(pack_f32le_impl, f32, to_le_bytes);
pack_float!(pack_f64be_impl, f64, to_be_bytes);
pack_float!(pack_f64le_impl, f64, to_le_bytes);

macro_rules! unpack_float {
    ($name:ident, $ty:ty, $conv:ident) => {
        pub fn $name(text: &[u8]) -> Result<Array> {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            require_divisible(text.len(), WIDTH)?;
            Ok(text
                .chunks_exact(WIDTH)
                .map(|chunk| {
                    let mut piece = [0u8; WIDTH];
                    piece.copy_from_slice(chunk);
                    Value::Real(<$ty>::$conv(piece) as f64)
                })
                .collect())
        }
    };
}

unpack_float!(unpack_f32be_fn, f32, from_be_bytes);
unpack_float!(unpack_f32le_fn, f32, from_le_bytes);
unpack_float!(unpack_f64be_fn, f64, from_be_bytes);
unpack_float!(unpack_f64le_fn, f64, from_le_bytes);

/// Insert the scalar/array overload pair for an integer packer.
macro_rules! bind_pack_int {
    ($result:ident, $key:literal, $full:literal, $pack:ident) => {
        $result.insert(
            skey($key),
            Value::from(NativeFunction::new(
                $full,
                "values",
                NativeTarget::ValA(|mut reader| {
                    reader.start_overload();
                    let value = reader.required_integer()?;
                    if reader.end_overload() {
                        return Ok(Value::from($pack(&[value])));
                    }
                    reader.start_overload();
                    let values = reader.required_array()?;
                    if reader.end_overload() {
                        let ints = values
                            .iter()
                            .map(|v| v.as_integer())
                            .collect::<Result<Vec<i64>>>()?;
                        return Ok(Value::from($pack(&ints)));
                    }
                    Err(reader.no_matching_function_call())
                }),
            )),
        );
    };
}

macro_rules! bind_pack_float {
    ($result:ident, $key:literal, $full:literal, $pack:ident) => {
        $result.insert(
            skey($key),
            Value::from(NativeFunction::new(
                $full,
                "values",
                NativeTarget::ValA(|mut reader| {
                    reader.start_overload();
                    let value = reader.required_real()?;
                    if reader.end_overload() {
                        return Ok(Value::from($pack(&[value])));
                    }
                    reader.start_overload();
                    let values = reader.required_array()?;
                    if reader.end_overload() {
                        let reals = values
                            .iter()
                            .map(|v| v.as_real())
                            .collect::<Result<Vec<f64>>>()?;
                        return Ok(Value::from($pack(&reals)));
                    }
                    Err(reader.no_matching_function_call())
                }),
            )),
        );
    };
}

macro_rules! bind_unpack {
    ($result:ident, $key:literal, $full:literal, $unpack:expr) => {
        $result.insert(
            skey($key),
            Value::from(NativeFunction::new(
                $full,
                "text",
                NativeTarget::ValA(|mut reader| {
                    reader.start_overload();
                    let text = reader.required_string()?;
                    if reader.end_overload() {
                        return Ok(Value::from(($unpack)(&text)?));
                    }
                    Err(reader.no_matching_function_call())
                }),
            )),
        );
    };
}

pub fn create_bindings_numeric(result: &mut Object, _version: ApiVersion) {
    result.insert(
        skey("abs"),
        Value::from(NativeFunction::new(
            "std.numeric.abs",
            "value",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(abs_integer(value)?));
                }
                reader.start_overload();
                let value = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(abs_real(value)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("sign"),
        Value::from(NativeFunction::new(
            "std.numeric.sign",
            "value",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(sign_integer(value)));
                }
                reader.start_overload();
                let value = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(sign_real(value)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("is_finite"),
        Value::from(NativeFunction::new(
            "std.numeric.is_finite",
            "value",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let _ = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(true));
                }
                reader.start_overload();
                let value = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(is_finite(value)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("is_infinity"),
        Value::from(NativeFunction::new(
            "std.numeric.is_infinity",
            "value",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let _ = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(false));
                }
                reader.start_overload();
                let value = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(is_infinity(value)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("is_nan"),
        Value::from(NativeFunction::new(
            "std.numeric.is_nan",
            "value",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let _ = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(false));
                }
                reader.start_overload();
                let value = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(is_nan(value)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("max"),
        Value::from(NativeFunction::new(
            "std.numeric.max",
            "...",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                if let Some(values) = reader.end_overload_values()? {
                    return Ok(max(&values));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("min"),
        Value::from(NativeFunction::new(
            "std.numeric.min",
            "...",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                if let Some(values) = reader.end_overload_values()? {
                    return Ok(min(&values));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("clamp"),
        Value::from(NativeFunction::new(
            "std.numeric.clamp",
            "value, lower, upper",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.optional_value()?;
                let lower = reader.optional_value()?;
                let upper = reader.optional_value()?;
                if reader.end_overload() {
                    return Ok(clamp(value, lower, upper));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    // The rounding family: the plain forms preserve the operand type, the
    // `i` forms convert to integer.
    result.insert(
        skey("round"),
        Value::from(NativeFunction::new(
            "std.numeric.round",
            "value",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(value));
                }
                reader.start_overload();
                let value = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(round_real(value)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("iround"),
        Value::from(NativeFunction::new(
            "std.numeric.iround",
            "value",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(value));
                }
                reader.start_overload();
                let value = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(iround(value)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("floor"),
        Value::from(NativeFunction::new(
            "std.numeric.floor",
            "value",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(value));
                }
                reader.start_overload();
                let value = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(floor_real(value)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("ifloor"),
        Value::from(NativeFunction::new(
            "std.numeric.ifloor",
            "value",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(value));
                }
                reader.start_overload();
                let value = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(ifloor(value)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("ceil"),
        Value::from(NativeFunction::new(
            "std.numeric.ceil",
            "value",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(value));
                }
                reader.start_overload();
                let value = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(ceil_real(value)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("iceil"),
        Value::from(NativeFunction::new(
            "std.numeric.iceil",
            "value",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(value));
                }
                reader.start_overload();
                let value = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(iceil(value)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("trunc"),
        Value::from(NativeFunction::new(
            "std.numeric.trunc",
            "value",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(value));
                }
                reader.start_overload();
                let value = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(trunc_real(value)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("itrunc"),
        Value::from(NativeFunction::new(
            "std.numeric.itrunc",
            "value",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(value));
                }
                reader.start_overload();
                let value = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(itrunc(value)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("random"),
        Value::from(NativeFunction::new(
            "std.numeric.random",
            "[limit]",
            NativeTarget::ValGa(|global, mut reader| {
                reader.start_overload();
                let limit = reader.optional_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(random(global, limit)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("remainder"),
        Value::from(NativeFunction::new(
            "std.numeric.remainder",
            "x, y",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let x = reader.required_real()?;
                let y = reader.required_real()?;
                if reader.end_overload() {
                    return Ok(Value::from(remainder(x, y)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("frexp"),
        Value::from(NativeFunction::new(
            "std.numeric.frexp",
            "x",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let x = reader.required_real()?;
                if reader.end_overload() {
                    let (frac, exp) = frexp(x);
                    return Ok(Value::from(vec![Value::from(frac), Value::from(exp)]));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("ldexp"),
        Value::from(NativeFunction::new(
            "std.numeric.ldexp",
            "frac, exp",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let frac = reader.required_real()?;
                let exp = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(ldexp(frac, exp)));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("rotl"),
        Value::from(NativeFunction::new(
            "std.numeric.rotl",
            "m, x, n",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let m = reader.required_integer()?;
                let x = reader.required_integer()?;
                let n = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(rotl(m, x, n)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("rotr"),
        Value::from(NativeFunction::new(
            "std.numeric.rotr",
            "m, x, n",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let m = reader.required_integer()?;
                let x = reader.required_integer()?;
                let n = reader.required_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(rotr(m, x, n)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("format"),
        Value::from(NativeFunction::new(
            "std.numeric.format",
            "value, [base, [ebase]]",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let value = reader.required_integer()?;
                let base = reader.optional_integer()?;
                let ebase = reader.optional_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(format_integer(value, base, ebase)?.into_bytes()));
                }
                reader.start_overload();
                let value = reader.required_real()?;
                let base = reader.optional_integer()?;
                let ebase = reader.optional_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(format_real_value(value, base, ebase)?.into_bytes()));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("parse"),
        Value::from(NativeFunction::new(
            "std.numeric.parse",
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

    bind_pack_int!(result, "pack_i8", "std.numeric.pack_i8", pack_i8_impl);
    bind_unpack!(result, "unpack_i8", "std.numeric.unpack_i8", |t: &[u8]| -> Result<Array> {
        Ok(unpack_i8(t))
    });
    bind_pack_int!(result, "pack_i16be", "std.numeric.pack_i16be", pack_i16be_impl);
    bind_pack_int!(result, "pack_i16le", "std.numeric.pack_i16le", pack_i16le_impl);
    bind_unpack!(result, "unpack_i16be", "std.numeric.unpack_i16be", unpack_i16be_fn);
    bind_unpack!(result, "unpack_i16le", "std.numeric.unpack_i16le", unpack_i16le_fn);
    bind_pack_int!(result, "pack_i32be", "std.numeric.pack_i32be", pack_i32be_impl);
    bind_pack_int!(result, "pack_i32le", "std.numeric.pack_i32le", pack_i32le_impl);
    bind_unpack!(result, "unpack_i32be", "std.numeric.unpack_i32be", unpack_i32be_fn);
    bind_unpack!(result, "unpack_i32le", "std.numeric.unpack_i32le", unpack_i32le_fn);
    bind_pack_int!(result, "pack_i64be", "std.numeric.pack_i64be", pack_i64be_impl);
    bind_pack_int!(result, "pack_i64le", "std.numeric.pack_i64le", pack_i64le_impl);
    bind_unpack!(result, "unpack_i64be", "std.numeric.unpack_i64be", unpack_i64be_fn);
    bind_unpack!(result, "unpack_i64le", "std.numeric.unpack_i64le", unpack_i64le_fn);
    bind_pack_float!(result, "pack_f32be", "std.numeric.pack_f32be", pack_f32be_impl);
    bind_pack_float!(result, "pack_f32le", "std.numeric.pack_f32le", pack_f32le_impl);
    bind_unpack!(result, "unpack_f32be", "std.numeric.unpack_f32be", unpack_f32be_fn);
    bind_unpack!(result, "unpack_f32le", "std.numeric.unpack_f32le", unpack_f32le_fn);
    bind_pack_float!(result, "pack_f64be", "std.numeric.pack_f64be", pack_f64be_impl);
    bind_pack_float!(result, "pack_f64le", "std.numeric.pack_f64le", pack_f64le_impl);
    bind_unpack!(result, "unpack_f64be", "std.numeric.unpack_f64be", unpack_f64be_fn);
    bind_unpack!(result, "unpack_f64le", "std.numeric.unpack_f64le", unpack_f64le_fn);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abs_and_sign() {
        assert_eq!(abs_integer(-42).unwrap(), 42);
        assert!(abs_integer(i64::MIN).is_err());
        assert_eq!(abs_real(-42.5), 42.5);
        assert!(!sign_integer(42));
        assert!(sign_integer(-42));
        assert!(sign_real(-0.0));
        assert!(!sign_real(0.0));
        assert!(sign_real(-f64::NAN));
    }

    #[test]
    fn min_max_clamp() {
        let vals = vec![Value::Integer(3), Value::Null, Value::Real(4.5), Value::Integer(1)];
        assert_eq!(max(&vals), Value::Real(4.5));
        assert_eq!(min(&vals), Value::Integer(1));
        assert_eq!(max(&[]), Value::Null);

        assert_eq!(clamp(Value::Integer(1), Value::Integer(2), Value::Integer(3)), Value::Integer(2));
        assert_eq!(clamp(Value::Integer(4), Value::Integer(2), Value::Integer(3)), Value::Integer(3));
        assert_eq!(clamp(Value::Real(2.5), Value::Integer(2), Value::Integer(3)), Value::Real(2.5));
        assert_eq!(clamp(Value::Integer(1), Value::Real(2.5), Value::Real(3.5)), Value::Real(2.5));
    }

    #[test]
    fn rounding_family() {
        assert_eq!(round_real(42.5), 43.0);
        assert_eq!(round_real(-42.5), -43.0);
        assert_eq!(iround(42.4).unwrap(), 42);
        assert_eq!(ifloor(-42.4).unwrap(), -43);
        assert_eq!(iceil(-42.4).unwrap(), -42);
        assert_eq!(itrunc(-42.9).unwrap(), -42);
        assert!(iround(1e20).is_err());
        assert!(iround(f64::NAN).is_err());
        assert_eq!(itrunc(-9.223372036854776e18).unwrap(), i64::MIN);
    }

    #[test]
    fn rotations() {
        assert_eq!(rotl(8, 0b1000_0001, 1).unwrap(), 0b0000_0011);
        assert_eq!(rotr(8, 0b1000_0001, 1).unwrap(), 0b1100_0000);
        assert_eq!(rotl(8, 0xFF, 4).unwrap(), 0xFF);
        assert_eq!(rotl(0, 0xFF, 3).unwrap(), 0);
        assert_eq!(rotl(64, 1, -1).unwrap(), i64::MIN);
        assert!(rotl(65, 1, 1).is_err());
        assert!(rotr(-1, 1, 1).is_err());
        // Shift counts wrap modulo the width.
        assert_eq!(rotl(8, 0x81, 9).unwrap(), rotl(8, 0x81, 1).unwrap());
    }

    #[test]
    fn integer_formatting() {
        assert_eq!(format_integer(42, None, None).unwrap(), "42");
        assert_eq!(format_integer(-5, Some(2), None).unwrap(), "-0b101");
        assert_eq!(format_integer(255, Some(16), None).unwrap(), "0xFF");
        assert_eq!(format_integer(1536, Some(16), Some(2)).unwrap(), "0x3p+09");
        assert_eq!(format_integer(1500, Some(10), Some(10)).unwrap(), "15e+02");
        assert_eq!(format_integer(6, Some(2), Some(2)).unwrap(), "0b11p+01");
        assert!(format_integer(1, Some(8), None).is_err());
        assert!(format_integer(1, Some(10), Some(2)).is_err());
        assert!(format_integer(1, Some(16), Some(10)).is_err());
    }

    #[test]
    fn real_formatting() {
        assert_eq!(format_real_value(42.5, None, None).unwrap(), "42.5");
        assert_eq!(format_real_value(2.5, Some(16), None).unwrap(), "0x2.8");
        assert_eq!(format_real_value(-0.5, Some(2), None).unwrap(), "-0b0.1");
        assert_eq!(format_real_value(2.5, Some(16), Some(2)).unwrap(), "0x1.4p+01");
        assert_eq!(format_real_value(1.0, Some(2), Some(2)).unwrap(), "0b1p+00");
        assert_eq!(format_real_value(f64::INFINITY, None, None).unwrap(), "infinity");
        assert_eq!(format_real_value(f64::NAN, Some(16), None).unwrap(), "nan");
        assert!(format_real_value(1.0, Some(3), None).is_err());
    }

    #[test]
    fn parse_literals() {
        assert_eq!(parse(b"  42 ").unwrap(), Value::Integer(42));
        assert!(parse(b"42").unwrap().is_integer());
        assert_eq!(parse(b"-7").unwrap(), Value::Integer(-7));
        assert_eq!(parse(b"+0x10").unwrap(), Value::Integer(16));
        assert_eq!(parse(b"0b101").unwrap(), Value::Integer(5));
        assert_eq!(parse(b"1e3").unwrap(), Value::Integer(1000));
        assert_eq!(parse(b"42.5").unwrap(), Value::Real(42.5));
        assert!(parse(b"42.0").unwrap().is_real() && !parse(b"42.0").unwrap().is_integer());
        assert_eq!(parse(b"15e-1").unwrap(), Value::Real(1.5));
        assert_eq!(parse(b"0x1p4").unwrap(), Value::Integer(16));
        assert_eq!(parse(b"0x1.8p1").unwrap(), Value::Real(3.0));
        assert_eq!(parse(b"infinity").unwrap(), Value::Real(f64::INFINITY));
        assert_eq!(parse(b"-infinity").unwrap(), Value::Real(f64::NEG_INFINITY));
        assert!(parse(b"nan").unwrap().as_real().unwrap().is_nan());
        assert_eq!(parse(b"9223372036854775807").unwrap(), Value::Integer(i64::MAX));
        assert!(parse(b"9223372036854775808").unwrap().is_real());
        assert!(parse(b"").is_err());
        assert!(parse(b"  ").is_err());
        assert!(parse(b"12abc").is_err());
        assert!(parse(b"1.2.3").is_err());
    }

    #[test]
    fn pack_round_trip() {
        let xs = vec![-2i64, -1, 0, 1, 127, -128];
        assert_eq!(
            unpack_i8(&pack_i8_impl(&xs)),
            xs.iter().map(|&i| Value::Integer(i)).collect::<Array>()
        );

        let xs = vec![-30000i64, 0, 30000];
        assert_eq!(
            unpack_i16be_fn(&pack_i16be_impl(&xs)).unwrap(),
            xs.iter().map(|&i| Value::Integer(i)).collect::<Array>()
        );
        assert_eq!(
            unpack_i16le_fn(&pack_i16le_impl(&xs)).unwrap(),
            xs.iter().map(|&i| Value::Integer(i)).collect::<Array>()
        );

        let xs = vec![i64::MIN, -1, 0, i64::MAX];
        assert_eq!(
            unpack_i64be_fn(&pack_i64be_impl(&xs)).unwrap(),
            xs.iter().map(|&i| Value::Integer(i)).collect::<Array>()
        );

        // Width truncation sign-extends back out.
        assert_eq!(unpack_i16be_fn(&pack_i16be_impl(&[0x1_FFFF])).unwrap(), vec![Value::Integer(-1)]);
    }

    #[test]
    fn pack_floats_are_bit_exact() {
        let xs = vec![0.0f64, -1.5, f64::INFINITY];
        assert_eq!(
            unpack_f64le_fn(&pack_f64le_impl(&xs)).unwrap(),
            xs.iter().map(|&r| Value::Real(r)).collect::<Array>()
        );
        let packed = pack_f32be_impl(&[1.5]);
        assert_eq!(packed, vec![0x3F, 0xC0, 0x00, 0x00]);
        assert!(unpack_f32be_fn(&[1, 2, 3]).is_err());
        assert!(unpack_i64le_fn(&[1, 2, 3, 4]).is_err());
    }

    #[test]
    fn packed_endianness() {
        assert_eq!(pack_i16be_impl(&[0x0102]), vec![0x01, 0x02]);
        assert_eq!(pack_i16le_impl(&[0x0102]), vec![0x02, 0x01]);
        assert_eq!(pack_i32be_impl(&[0x01020304]), vec![1, 2, 3, 4]);
        assert_eq!(pack_i64le_impl(&[0x0102030405060708]), vec![8, 7, 6, 5, 4, 3, 2, 1]);
    }
}
