//! # `std.zlib`
//!
//! Streaming compression. A Deflator or Inflator is constructed for one
//! framing (`raw`, `deflate` with the zlib wrapper, or `gzip`) and carries
//! an `output` member string that every operation appends to. `flush`
//! emits a sync flush, `finish` completes the stream and returns the whole
//! output, `clear` rewinds the stream for reuse.
//!
//! Errors wrap the underlying stream message together with the name of the
//! failing operation.

use flate2::{Compress, Compression, Decompress, FlushCompress, FlushDecompress, Status};

use crate::binding::{NativeFunction, NativeTarget};
use crate::error::{Result, RuntimeError};
use crate::global::ApiVersion;
use crate::reference::Reference;
use crate::value::{make_opaque, skey, Bytes, Object, Value};
use crate::variable::{Opaque, OpaqueRef};

const ZLIB_PRIVATE_KEY: &str = "{3c8e0d5a-41f7-4ba9-8e2f-6d3a97c05b11}";

#[derive(Copy, Clone, PartialEq, Eq)]
pub enum Framing {
    Raw,
    Deflate,
    Gzip,
}

fn parse_framing(format: &[u8]) -> Result<Framing> {
    match format {
        b"raw" => Ok(Framing::Raw),
        b"deflate" => Ok(Framing::Deflate),
        b"gzip" => Ok(Framing::Gzip),
        other => Err(RuntimeError::Range(format!(
            "invalid compression format `{}`",
            String::from_utf8_lossy(other)
        ))),
    }
}

fn parse_level(level: Option<i64>) -> Result<Compression> {
    match level {
        None => Ok(Compression::default()),
        Some(l) if l < 0 => Err(RuntimeError::Range(format!(
            "negative compression level `{l}`"
        ))),
        Some(l) => Ok(Compression::new(l.min(9) as u32)),
    }
}

fn stream_error(fname: &str, message: impl std::fmt::Display) -> RuntimeError {
    RuntimeError::Compression(format!("zlib error: {message}\n[`{fname}()` failed]"))
}

fn new_compress(framing: Framing, level: Compression) -> Compress {
    match framing {
        Framing::Raw => Compress::new_with_window_bits(level, false, 15),
        Framing::Deflate => Compress::new_with_window_bits(level, true, 15),
        Framing::Gzip => Compress::new_gzip(level, 15),
    }
}

fn new_decompress(framing: Framing) -> Decompress {
    match framing {
        Framing::Raw => Decompress::new_with_window_bits(false, 15),
        Framing::Deflate => Decompress::new_with_window_bits(true, 15),
        Framing::Gzip => Decompress::new_gzip(15),
    }
}

/// Streaming deflate with a fixed framing and level.
pub struct DeflatorOpaque {
    framing: Framing,
    level: Compression,
    strm: Compress,
}

impl DeflatorOpaque {
    pub fn new(framing: Framing, level: Compression) -> DeflatorOpaque {
        DeflatorOpaque { framing, level, strm: new_compress(framing, level) }
    }

    pub fn clear(&mut self) {
        self.strm.reset();
    }

    pub fn update(&mut self, out: &mut Bytes, data: &[u8]) -> Result<()> {
        let mut consumed: u64 = 0;
        while (consumed as usize) < data.len() {
            out.reserve(4096);
            let before = self.strm.total_in();
            self.strm
                .compress_vec(&data[consumed as usize..], out, FlushCompress::None)
                .map_err(|e| stream_error("deflate", e))?;
            consumed += self.strm.total_in() - before;
        }
        Ok(())
    }

    pub fn flush(&mut self, out: &mut Bytes) -> Result<()> {
        loop {
            out.reserve(4096);
            let before = out.len();
            let status = self
                .strm
                .compress_vec(&[], out, FlushCompress::Sync)
                .map_err(|e| stream_error("deflate", e))?;
            if (status == Status::BufError) || (out.len() == before) {
                return Ok(());
            }
        }
    }

    pub fn finish(&mut self, out: &mut Bytes) -> Result<()> {
        loop {
            out.reserve(4096);
            let status = self
                .strm
                .compress_vec(&[], out, FlushCompress::Finish)
                .map_err(|e| stream_error("deflate", e))?;
            if status == Status::StreamEnd {
                return Ok(());
            }
        }
    }
}

impl Opaque for DeflatorOpaque {
    fn describe(&self) -> String {
        "instance of `std.zlib.Deflator`".to_string()
    }

    /// Deflate streams carry compressor state that cannot be duplicated
    /// mid-stream portably; a clone restarts from a fresh stream.
    fn clone_opaque(&self) -> OpaqueRef {
        make_opaque(DeflatorOpaque::new(self.framing, self.level))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

/// Streaming inflate; the symmetric reader.
pub struct InflatorOpaque {
    framing: Framing,
    strm: Decompress,
}

impl InflatorOpaque {
    pub fn new(framing: Framing) -> InflatorOpaque {
        InflatorOpaque { framing, strm: new_decompress(framing) }
    }

    pub fn clear(&mut self) {
        self.strm = new_decompress(self.framing);
    }

    pub fn update(&mut self, out: &mut Bytes, data: &[u8]) -> Result<()> {
        let mut consumed: u64 = 0;
        while (consumed as usize) < data.len() {
            out.reserve(4096);
            let before = self.strm.total_in();
            let status = self
                .strm
                .decompress_vec(&data[consumed as usize..], out, FlushDecompress::None)
                .map_err(|e| stream_error("inflate", e))?;
            consumed += self.strm.total_in() - before;
            if status == Status::StreamEnd {
                break;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self, out: &mut Bytes) -> Result<()> {
        loop {
            out.reserve(4096);
            let before = out.len();
            let status = self
                .strm
                .decompress_vec(&[], out, FlushDecompress::Sync)
                .map_err(|e| stream_error("inflate", e))?;
            if (status == Status::StreamEnd) || (status == Status::BufError) || (out.len() == before) {
                return Ok(());
            }
        }
    }

    pub fn finish(&mut self, out: &mut Bytes) -> Result<()> {
        loop {
            out.reserve(4096);
            let before = out.len();
            let status = self
                .strm
                .decompress_vec(&[], out, FlushDecompress::Finish)
                .map_err(|e| stream_error("inflate", e))?;
            match status {
                Status::StreamEnd => return Ok(()),
                Status::BufError if out.len() == before => {
                    return Err(stream_error("inflate", "incomplete stream"))
                }
                _ => {}
            }
        }
    }
}

impl Opaque for InflatorOpaque {
    fn describe(&self) -> String {
        "instance of `std.zlib.Inflator`".to_string()
    }

    fn clone_opaque(&self) -> OpaqueRef {
        make_opaque(InflatorOpaque::new(self.framing))
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

fn member_fail() -> RuntimeError {
    RuntimeError::TypeMismatch("invalid member function: type validation failure".to_string())
}

/// Run `op` with the private stream opaque and the `output` member of the
/// stream object designated by `self_ref`.
fn with_stream_members<R>(
    self_ref: &Reference,
    op: impl FnOnce(&OpaqueRef, &mut Bytes) -> Result<R>,
) -> Result<R> {
    self_ref.dereference_mutable(|val| {
        if !val.is_object() {
            return Err(member_fail());
        }
        let obj = val.open_object();
        let opq = obj
            .get_mut(&skey(ZLIB_PRIVATE_KEY))
            .ok_or_else(member_fail)?
            .open_opaque()?
            .clone();
        let out_slot = obj.get_mut(&skey("output")).ok_or_else(member_fail)?;
        let mut out = std::mem::take(out_slot.open_string());
        let result = op(&opq, &mut out);
        *out_slot = Value::from(out);
        result
    })
}

macro_rules! stream_object {
    ($ctor_fn:ident, $opaque:ident, $update_name:literal, $flush_name:literal,
     $finish_name:literal, $clear_name:literal) => {
        fn $ctor_fn(opaque: $opaque) -> Object {
            let mut result = Object::new();
            result.insert(skey(ZLIB_PRIVATE_KEY), Value::from(make_opaque(opaque)));
            result.insert(skey("output"), Value::from(Bytes::new()));

            result.insert(
                skey("update"),
                Value::from(NativeFunction::new(
                    $update_name,
                    "data",
                    NativeTarget::VoidSa(|self_ref, mut reader| {
                        reader.start_overload();
                        let data = reader.required_string()?;
                        if reader.end_overload() {
                            return with_stream_members(&self_ref, |opq, out| {
                                let mut guard = opq.borrow_mut();
                                let strm = guard
                                    .as_any_mut()
                                    .downcast_mut::<$opaque>()
                                    .ok_or_else(member_fail)?;
                                strm.update(out, &data)
                            });
                        }
                        Err(reader.no_matching_function_call())
                    }),
                )),
            );

            result.insert(
                skey("flush"),
                Value::from(NativeFunction::new(
                    $flush_name,
                    "",
                    NativeTarget::VoidSa(|self_ref, mut reader| {
                        reader.start_overload();
                        if reader.end_overload() {
                            return with_stream_members(&self_ref, |opq, out| {
                                let mut guard = opq.borrow_mut();
                                let strm = guard
                                    .as_any_mut()
                                    .downcast_mut::<$opaque>()
                                    .ok_or_else(member_fail)?;
                                strm.flush(out)
                            });
                        }
                        Err(reader.no_matching_function_call())
                    }),
                )),
            );

            result.insert(
                skey("finish"),
                Value::from(NativeFunction::new(
                    $finish_name,
                    "",
                    NativeTarget::ValSa(|self_ref, mut reader| {
                        reader.start_overload();
                        if reader.end_overload() {
                            return with_stream_members(&self_ref, |opq, out| {
                                let mut guard = opq.borrow_mut();
                                let strm = guard
                                    .as_any_mut()
                                    .downcast_mut::<$opaque>()
                                    .ok_or_else(member_fail)?;
                                strm.finish(out)?;
                                Ok(Value::from(out.clone()))
                            });
                        }
                        Err(reader.no_matching_function_call())
                    }),
                )),
            );

            result.insert(
                skey("clear"),
                Value::from(NativeFunction::new(
                    $clear_name,
                    "",
                    NativeTarget::VoidSa(|self_ref, mut reader| {
                        reader.start_overload();
                        if reader.end_overload() {
                            return with_stream_members(&self_ref, |opq, _out| {
                                let mut guard = opq.borrow_mut();
                                let strm = guard
                                    .as_any_mut()
                                    .downcast_mut::<$opaque>()
                                    .ok_or_else(member_fail)?;
                                strm.clear();
                                Ok(())
                            });
                        }
                        Err(reader.no_matching_function_call())
                    }),
                )),
            );
            result
        }
    };
}

stream_object!(
    deflator_object_impl, DeflatorOpaque,
    "std.zlib.Deflator::update", "std.zlib.Deflator::flush",
    "std.zlib.Deflator::finish", "std.zlib.Deflator::clear"
);
stream_object!(
    inflator_object_impl, InflatorOpaque,
    "std.zlib.Inflator::update", "std.zlib.Inflator::flush",
    "std.zlib.Inflator::finish", "std.zlib.Inflator::clear"
);

pub fn deflator(format: &[u8], level: Option<i64>) -> Result<Object> {
    Ok(deflator_object_impl(DeflatorOpaque::new(
        parse_framing(format)?,
        parse_level(level)?,
    )))
}

pub fn inflator(format: &[u8]) -> Result<Object> {
    Ok(inflator_object_impl(InflatorOpaque::new(parse_framing(format)?)))
}

fn deflate_oneshot(framing: Framing, data: &[u8], level: Option<i64>) -> Result<Bytes> {
    let mut defl = DeflatorOpaque::new(framing, parse_level(level)?);
    let mut output = Bytes::new();
    defl.update(&mut output, data)?;
    defl.finish(&mut output)?;
    Ok(output)
}

fn inflate_oneshot(framing: Framing, data: &[u8]) -> Result<Bytes> {
    let mut infl = InflatorOpaque::new(framing);
    let mut output = Bytes::new();
    infl.update(&mut output, data)?;
    infl.finish(&mut output)?;
    Ok(output)
}

pub fn deflate(data: &[u8], level: Option<i64>) -> Result<Bytes> {
    deflate_oneshot(Framing::Deflate, data, level)
}

pub fn inflate(data: &[u8]) -> Result<Bytes> {
    inflate_oneshot(Framing::Deflate, data)
}

pub fn gzip(data: &[u8], level: Option<i64>) -> Result<Bytes> {
    deflate_oneshot(Framing::Gzip, data, level)
}

pub fn gunzip(data: &[u8]) -> Result<Bytes> {
    inflate_oneshot(Framing::Gzip, data)
}

pub fn create_bindings_zlib(result: &mut Object, _version: ApiVersion) {
    result.insert(
        skey("Deflator"),
        Value::from(NativeFunction::new(
            "std.zlib.Deflator",
            "format, [level]",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let format = reader.required_string()?;
                let level = reader.optional_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(deflator(&format, level)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("Inflator"),
        Value::from(NativeFunction::new(
            "std.zlib.Inflator",
            "format",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let format = reader.required_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(inflator(&format)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("deflate"),
        Value::from(NativeFunction::new(
            "std.zlib.deflate",
            "data, [level]",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let data = reader.required_string()?;
                let level = reader.optional_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(deflate(&data, level)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("inflate"),
        Value::from(NativeFunction::new(
            "std.zlib.inflate",
            "data",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let data = reader.required_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(inflate(&data)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("gzip"),
        Value::from(NativeFunction::new(
            "std.zlib.gzip",
            "data, [level]",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let data = reader.required_string()?;
                let level = reader.optional_integer()?;
                if reader.end_overload() {
                    return Ok(Value::from(gzip(&data, level)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );

    result.insert(
        skey("gunzip"),
        Value::from(NativeFunction::new(
            "std.zlib.gunzip",
            "data",
            NativeTarget::ValA(|mut reader| {
                reader.start_overload();
                let data = reader.required_string()?;
                if reader.end_overload() {
                    return Ok(Value::from(gunzip(&data)?));
                }
                Err(reader.no_matching_function_call())
            }),
        )),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Bytes {
        let mut data = Bytes::new();
        for k in 0..4096u32 {
            data.extend_from_slice(format!("block {k};").as_bytes());
        }
        data
    }

    #[test]
    fn round_trip_every_framing_and_level() {
        let data = sample();
        for framing in [Framing::Raw, Framing::Deflate, Framing::Gzip] {
            for level in 0..=9 {
                let packed = deflate_oneshot(framing, &data, Some(level)).unwrap();
                let unpacked = inflate_oneshot(framing, &packed).unwrap();
                assert_eq!(unpacked, data);
            }
        }
    }

    #[test]
    fn empty_input_round_trips() {
        for framing in [Framing::Raw, Framing::Deflate, Framing::Gzip] {
            let packed = deflate_oneshot(framing, b"", None).unwrap();
            assert!(!packed.is_empty());
            assert_eq!(inflate_oneshot(framing, &packed).unwrap(), b"".to_vec());
        }
    }

    #[test]
    fn gzip_emits_the_gzip_magic() {
        let packed = gzip(b"hello", None).unwrap();
        assert_eq!(&packed[..2], &[0x1F, 0x8B]);
        assert_eq!(gunzip(&packed).unwrap(), b"hello".to_vec());
    }

    #[test]
    fn sync_flush_makes_data_available() {
        let mut defl = DeflatorOpaque::new(Framing::Deflate, Compression::default());
        let mut packed = Bytes::new();
        defl.update(&mut packed, b"first part").unwrap();
        defl.flush(&mut packed).unwrap();
        let after_flush = packed.len();
        assert!(after_flush > 0);

        // Everything up to the sync flush inflates without the final block.
        let mut infl = InflatorOpaque::new(Framing::Deflate);
        let mut text = Bytes::new();
        infl.update(&mut text, &packed).unwrap();
        assert_eq!(text, b"first part".to_vec());

        defl.update(&mut packed, b", second part").unwrap();
        defl.finish(&mut packed).unwrap();
        let mut infl = InflatorOpaque::new(Framing::Deflate);
        let mut text = Bytes::new();
        infl.update(&mut text, &packed).unwrap();
        infl.finish(&mut text).unwrap();
        assert_eq!(text, b"first part, second part".to_vec());
    }

    #[test]
    fn clear_rewinds_the_stream() {
        let data = sample();
        let mut defl = DeflatorOpaque::new(Framing::Deflate, Compression::default());
        let mut first = Bytes::new();
        defl.update(&mut first, &data).unwrap();
        defl.finish(&mut first).unwrap();

        defl.clear();
        let mut second = Bytes::new();
        defl.update(&mut second, &data).unwrap();
        defl.finish(&mut second).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn truncated_streams_fail_to_finish() {
        let packed = deflate(&sample(), None).unwrap();
        let mut infl = InflatorOpaque::new(Framing::Deflate);
        let mut text = Bytes::new();
        infl.update(&mut text, &packed[..packed.len() / 2]).unwrap();
        assert!(infl.finish(&mut text).is_err());
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(parse_framing(b"bogus").is_err());
        assert!(parse_level(Some(-1)).is_err());
        assert!(parse_level(Some(99)).is_ok());
        assert!(deflator(b"zip", None).is_err());
    }

    #[test]
    fn stream_objects_carry_members() {
        let obj = deflator(b"gzip", Some(6)).unwrap();
        assert!(obj.get(&skey("update")).unwrap().is_function());
        assert!(obj.get(&skey("output")).unwrap().is_string());
        let obj = inflator(b"raw").unwrap();
        assert!(obj.get(&skey("finish")).unwrap().is_function());
    }
}
