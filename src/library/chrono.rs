//! # `std.chrono`
//!
//! Clocks plus formatting and parsing of the fixed date/time grammar
//! `YYYY-MM-DD HH:MM:SS[.mmm][ (UTC|±HHMM)]`.
//!
//! The two monotonic clocks add fixed offsets so their readings cannot be
//! mistaken for realtime timestamps. Out-of-range timestamps saturate: the
//! minimum renders as `0000-01-01`, anything at or past `9999-01-01` as
//! `9999-01-01`, and parsing saturates to the integer extremes.

use chrono::{Datelike, Duration, Local, NaiveDate, NaiveDateTime, TimeZone, Timelike, Utc};
use once_cell::sync::Lazy;

use crate::binding::{NativeFunction, NativeTarget};
use crate::error::{Result, RuntimeError};
use crate::global::ApiVersion;
use crate::value::{skey, Bytes, Object, Value};

/// First millisecond of year 10000; the saturation bound.
const TIMESTAMP_MAX: i64 = 253_370_764_800_000;

/// Anchor for the monotonic clocks.
static MONOTONIC_ANCHOR: Lazy<std::time::Instant> = Lazy::new(std::time::Instant::now);

/// Milliseconds since the Unix epoch, realtime clock.
pub fn now() -> i64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(d) => d.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    }
}

/// Coarse monotonic clock in milliseconds, offset from realtime.
pub fn steady_now() -> i64 {
    MONOTONIC_ANCHOR.elapsed().as_millis() as i64 + 987_654_321
}

/// High-resolution monotonic clock in milliseconds, offset from realtime.
pub fn hires_now() -> f64 {
    MONOTONIC_ANCHOR.elapsed().as_secs_f64() * 1000.0 + 123_456_789.0
}

fn push_2digit(out: &mut String, v: u32) {
    out.push((b'0' + (v / 10 % 10) as u8) as char);
    out.push((b'0' + (v % 10) as u8) as char);
}

pub fn format(time_point: i64, with_ms: Option<bool>, utc_offset: Option<i64>) -> Result<Bytes> {
    let mut year = 0u32;
    let mut mon = 1u32;
    let mut day = 1u32;
    let mut hour = 0u32;
    let mut min = 0u32;
    let mut sec = 0u32;
    let mut ms = 0u32;
    let mut gmtoff_min: i64 = 0;

    if time_point >= TIMESTAMP_MAX {
        year = 9999;
    } else if time_point >= 0 {
        let naive: NaiveDateTime;
        match utc_offset {
            None => {
                // Obtain the offset from the system time zone.
                let dt = Local
                    .timestamp_millis_opt(time_point)
                    .earliest()
                    .ok_or_else(|| RuntimeError::Range("timestamp not representable".to_string()))?;
                gmtoff_min = (dt.offset().local_minus_utc() / 60) as i64;
                naive = dt.naive_local();
            }
            Some(off) => {
                if (off <= -1440) || (off >= 1440) {
                    return Err(RuntimeError::Range(format!(
                        "UTC time offset out of range (`{off}` exceeds 1440 minutes)"
                    )));
                }
                gmtoff_min = off;
                let dt = Utc
                    .timestamp_millis_opt(time_point)
                    .earliest()
                    .ok_or_else(|| RuntimeError::Range("timestamp not representable".to_string()))?;
                naive = dt.naive_utc() + Duration::minutes(off);
            }
        }
        year = naive.year() as u32;
        mon = naive.month();
        day = naive.day();
        hour = naive.hour();
        min = naive.minute();
        sec = naive.second();
        ms = (time_point % 1000) as u32;
    }

    let mut text = String::with_capacity(32);
    push_2digit(&mut text, year / 100);
    push_2digit(&mut text, year % 100);
    text.push('-');
    push_2digit(&mut text, mon);
    text.push('-');
    push_2digit(&mut text, day);
    text.push(' ');
    push_2digit(&mut text, hour);
    text.push(':');
    push_2digit(&mut text, min);
    text.push(':');
    push_2digit(&mut text, sec);

    if with_ms == Some(true) {
        text.push('.');
        text.push((b'0' + (ms / 100) as u8) as char);
        push_2digit(&mut text, ms % 100);
    }

    if gmtoff_min == 0 {
        text.push_str(" UTC");
    } else {
        text.push(' ');
        text.push(if gmtoff_min < 0 { '-' } else { '+' });
        let abs = gmtoff_min.unsigned_abs() as u32;
        push_2digit(&mut text, abs / 60);
        push_2digit(&mut text, abs % 60);
    }
    Ok(text.into_bytes())
}

struct Cursor<'a> {
    s: &'a [u8],
    pos: usize,
    ok: bool,
}

impl<'a> Cursor<'a> {
    fn take_2digit(&mut self) -> u32 {
        if !self.ok {
            return 0;
        }
        if self.pos + 2 <= self.s.len()
            && self.s[self.pos].is_ascii_digit()
            && self.s[self.pos + 1].is_ascii_digit()
        {
            let v = (self.s[self.pos] - b'0') as u32 * 10 + (self.s[self.pos + 1] - b'0') as u32;
            self.pos += 2;
            v
        } else {
            self.ok = false;
            0
        }
    }

    fn take(&mut self, c: u8) {
        if !self.ok {
            return;
        }
        if self.s.get(self.pos) == Some(&c) {
            self.pos += 1;
        } else {
            self.ok = false;
        }
    }

    fn peek(&self) -> Option<u8> {
        if self.ok {
            self.s.get(self.pos).copied()
        } else {
            None
        }
    }
}

pub fn parse(time_str: &[u8]) -> Result<i64> {
    let fail = || {
        RuntimeError::Parse(format!(
            "invalid date/time string `{}`",
            String::from_utf8_lossy(time_str)
        ))
    };

    let mut cur = Cursor { s: time_str, pos: 0, ok: true };
    while cur.peek() == Some(b' ') {
        cur.pos += 1;
    }

    let year = cur.take_2digit() * 100 + cur.take_2digit();
    cur.take(b'-');
    let mon = cur.take_2digit();
    cur.take(b'-');
    let day = cur.take_2digit();
    cur.take(b' ');
    let hour = cur.take_2digit();
    cur.take(b':');
    let min = cur.take_2digit();
    cur.take(b':');
    let sec = cur.take_2digit();

    let mut ms: i64 = 0;
    if cur.peek() == Some(b'.') {
        cur.pos += 1;
        let mut weight = 100;
        while let Some(c) = cur.peek() {
            if !c.is_ascii_digit() {
                break;
            }
            ms += (c - b'0') as i64 * weight;
            weight /= 10;
            cur.pos += 1;
        }
    }

    // 0 = local time, 1 = explicit offset.
    let mut gmtoff_min: Option<i64> = None;
    if cur.peek() == Some(b' ') {
        cur.pos += 1;
        match cur.peek() {
            Some(b'U') | Some(b'G') => {
                let tail = &cur.s[cur.pos..];
                if tail.starts_with(b"UTC") || tail.starts_with(b"GMT") {
                    cur.pos += 3;
                    gmtoff_min = Some(0);
                } else {
                    cur.ok = false;
                }
            }
            Some(sign @ (b'+' | b'-')) => {
                cur.pos += 1;
                let hh = cur.take_2digit() as i64;
                let mm = cur.take_2digit() as i64;
                let abs = hh * 60 + mm;
                gmtoff_min = Some(if sign == b'-' { -abs } else { abs });
            }
            _ => cur.ok = false,
        }
    }

    while cur.peek() == Some(b' ') {
        cur.pos += 1;
    }
    if !cur.ok || cur.pos != cur.s.len() {
        return Err(fail());
    }

    let date = NaiveDate::from_ymd_opt(year as i32, mon, day).ok_or_else(fail)?;
    let naive = date
        .and_hms_opt(hour, min, sec)
        .ok_or_else(fail)?;

    let mut time_point = ms;
    match gmtoff_min {
        None => {
            // Interpret in the system time zone.
            let dt = Local
                .from_local_datetime(&naive)
                .earliest()
                .ok_or_else(fail)?;
            time_point += dt.timestamp() * 1000;
        }
        Some(off) => {
            time_point += naive.and_utc().timestamp() * 1000;
            time_point -= off * 60_000;
        }
    }

    if time_point < 0 {
        Ok(i64::MIN)
    } else if time_point >= TIMESTAMP_MAX {
        Ok(i64::MAX)
    } else {
        Ok(time_point)
    }
}

pub fn create_bindings_chrono(result: &mut Object, _version: ApiVersion) {
    result.insert(
        skey("now"),
        Value::from(NativeFunction::new(
            "std.chrono.now",
            "",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                if reader.end_overload() {
                    return Ok(Value::from(now()));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("steady_now"),
        Value::from(NativeFunction::new(
            "std.chrono.steady_now",
            "",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                if reader.end_overload() {
                    return Ok(Value::from(steady_now()));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("hires_now"),
        Value::from(NativeFunction::new(
            "std.chrono.hires_now",
            "",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                if reader.end_overload() {
                    return Ok(Value::from(hires_now()));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("format"),
        Value::from(NativeFunction::new(
            "std.chrono.format",
            "time_point, [with_ms], [utc_offset]",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let tp = reader.required_integer()?;
                let with_ms = reader.optional_boolean()?;
                let off = reader.optional_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(format(tp, with_ms, off)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("parse"),
        Value::from(NativeFunction::new(
            "std.chrono.parse",
            "time_str",
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
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_utc_timestamps() {
        // 2001-02-03 04:05:06.789 UTC
        let tp = 981_173_106_789;
        assert_eq!(format(tp, None, Some(0)).unwrap(), b"2001-02-03 04:05:06 UTC".to_vec());
        assert_eq!(
            format(tp, Some(true), Some(0)).unwrap(),
            b"2001-02-03 04:05:06.789 UTC".to_vec()
        );
        assert_eq!(
            format(tp, None, Some(90)).unwrap(),
            b"2001-02-03 05:35:06 +0130".to_vec()
        );
        assert_eq!(
            format(tp, None, Some(-300)).unwrap(),
            b"2001-02-02 23:05:06 -0500".to_vec()
        );
        assert!(format(tp, None, Some(1440)).is_err());
    }

    #[test]
    fn saturation_at_the_extremes() {
        assert_eq!(format(-5, None, Some(0)).unwrap(), b"0000-01-01 00:00:00 UTC".to_vec());
        assert_eq!(
            format(TIMESTAMP_MAX, None, Some(0)).unwrap(),
            b"9999-01-01 00:00:00 UTC".to_vec()
        );
        assert_eq!(parse(b"0000-01-01 00:00:00 UTC").unwrap(), i64::MIN);
        assert_eq!(parse(b"9999-06-01 00:00:00 UTC").unwrap(), i64::MAX);
    }

    #[test]
    fn parse_round_trips_explicit_offsets() {
        let tp = 981_173_106_789;
        let text = format(tp, Some(true), Some(0)).unwrap();
        assert_eq!(parse(&text).unwrap(), tp);

        let text = format(tp, Some(true), Some(123)).unwrap();
        assert_eq!(parse(&text).unwrap(), tp);

        assert_eq!(
            parse(b"2001-02-03 04:05:06 GMT").unwrap(),
            parse(b"2001-02-03 04:05:06 UTC").unwrap()
        );
        assert_eq!(
            parse(b"  2001-02-03 04:05:06.5 UTC  ").unwrap(),
            981_173_106_500
        );
    }

    #[test]
    fn parse_rejects_malformed_text() {
        assert!(parse(b"").is_err());
        assert!(parse(b"2001-02-03").is_err());
        assert!(parse(b"2001-99-99 00:00:00 UTC").is_err());
        assert!(parse(b"2001-02-03 04:05:06 XYZ").is_err());
        assert!(parse(b"2001-02-03 04:05:06 trailing").is_err());
    }

    #[test]
    fn clocks_are_monotonic_and_offset() {
        let a = steady_now();
        let b = steady_now();
        assert!(b >= a);
        assert!(a >= 987_654_321);
        assert!(hires_now() >= 123_456_789.0);
        assert!(now() > 1_500_000_000_000);
    }
}
