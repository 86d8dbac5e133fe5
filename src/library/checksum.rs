//! # `std.checksum`
//!
//! Streaming hashers and their one-shot wrappers.
//!
//! Each algorithm exposes three surfaces: a constructor returning an object
//! with `update`/`finish`/`clear` methods over a private opaque state, a
//! whole-buffer convenience `<algo>(data)`, and `<algo>_file(path)` which
//! streams a file in blocks. `finish` returns the digest and resets the
//! state, so a hasher can be reused immediately. Hashers are value-typed:
//! a copied hasher diverges from the original on the next update.
//!
//! The 32-bit algorithms (CRC-32, Adler-32, FNV-1a) yield unsigned values
//! promoted to integers; the digest family yields lowercase hex strings.

use std::io::Read;

use digest::{Digest, FixedOutputReset};

use crate::binding::{NativeFunction, NativeTarget};
use crate::error::{Result, RuntimeError};
use crate::global::ApiVersion;
use crate::reference::Reference;
use crate::value::{make_opaque, skey, Bytes, Object, Value};
use crate::variable::{Opaque, OpaqueRef};

const CHECKSUM_PRIVATE_KEY: &str = "{6f103a42-90c2-4ef6-b822-e4b1b3fbd1a4}";

fn hex_lower(digest: &[u8]) -> Bytes {
    let mut text = Bytes::with_capacity(digest.len() * 2);
    for &b in digest {
        text.push(b"0123456789abcdef"[(b >> 4) as usize]);
        text.push(b"0123456789abcdef"[(b & 0x0F) as usize]);
    }
    text
}

#[derive(Clone)]
pub struct Crc32Core {
    state: crc32fast::Hasher,
}

impl Crc32Core {
    pub fn new() -> Crc32Core {
        Crc32Core { state: crc32fast::Hasher::new() }
    }

    pub fn clear(&mut self) {
        self.state.reset();
    }

    pub fn update(&mut self, data: &[u8]) {
        self.state.update(data);
    }

    pub fn finish(&mut self) -> Value {
        let value = self.state.clone().finalize();
        self.state.reset();
        Value::Integer(value as i64)
    }
}

const ADLER_MODULUS: u32 = 65_521;

#[derive(Clone)]
pub struct Adler32Core {
    a: u32,
    b: u32,
}

impl Adler32Core {
    pub fn new() -> Adler32Core {
        Adler32Core { a: 1, b: 0 }
    }

    pub fn clear(&mut self) {
        self.a = 1;
        self.b = 0;
    }

    pub fn update(&mut self, data: &[u8]) {
        // 5552 is the largest run that cannot overflow 32 bits.
        for chunk in data.chunks(5552) {
            for &byte in chunk {
                self.a += byte as u32;
                self.b += self.a;
            }
            self.a %= ADLER_MODULUS;
            self.b %= ADLER_MODULUS;
        }
    }

    pub fn finish(&mut self) -> Value {
        let value = (self.b << 16) | self.a;
        self.clear();
        Value::Integer(value as i64)
    }
}

#[derive(Clone)]
pub struct Fnv1a32Core {
    reg: u32,
}

impl Fnv1a32Core {
    pub fn new() -> Fnv1a32Core {
        Fnv1a32Core { reg: 0x811C_9DC5 }
    }

    pub fn clear(&mut self) {
        self.reg = 0x811C_9DC5;
    }

    pub fn update(&mut self, data: &[u8]) {
        for &byte in data {
            self.reg = (self.reg ^ byte as u32).wrapping_mul(0x0100_0193);
        }
    }

    pub fn finish(&mut self) -> Value {
        let value = self.reg;
        self.clear();
        Value::Integer(value as i64)
    }
}

macro_rules! digest_core {
    ($core:ident, $digest:ty) => {
        #[derive(Clone)]
        pub struct $core {
            ctx: $digest,
        }

        impl $core {
            pub fn new() -> $core {
                $core { ctx: <$digest as Digest>::new() }
            }

            pub fn clear(&mut self) {
                self.ctx = <$digest as Digest>::new();
            }

            pub fn update(&mut self, data: &[u8]) {
                Digest::update(&mut self.ctx, data);
            }

            pub fn finish(&mut self) -> Value {
                let digest = FixedOutputReset::finalize_fixed_reset(&mut self.ctx);
                Value::from(hex_lower(&digest))
            }
        }
    };
}

digest_core!(Md5Core, md5::Md5);
digest_core!(Sha1Core, sha1::Sha1);
digest_core!(Sha224Core, sha2::Sha224);
digest_core!(Sha256Core, sha2::Sha256);
digest_core!(Sha384Core, sha2::Sha384);
digest_core!(Sha512Core, sha2::Sha512);

/// Fetch a hasher's private opaque out of `self`, detaching shared state.
fn self_hasher(self_ref: &Reference) -> Result<OpaqueRef> {
    let fail =
        || RuntimeError::TypeMismatch("invalid member function: type validation failure".to_string());
    self_ref.dereference_mutable(|val| {
        if !val.is_object() {
            return Err(fail());
        }
        let obj = val.open_object();
        let slot = obj.get_mut(&skey(CHECKSUM_PRIVATE_KEY)).ok_or_else(fail)?;
        Ok(slot.open_opaque()?.clone())
    })
}

macro_rules! hasher_algorithm {
    ($opaque:ident, $core:ident, $ctor_fn:ident, $oneshot_fn:ident, $file_fn:ident,
     $describe:literal, $ctor_name:literal, $update_name:literal, $finish_name:literal,
     $clear_name:literal) => {
        #[derive(Clone)]
        pub struct $opaque {
            core: $core,
        }

        impl Opaque for $opaque {
            fn describe(&self) -> String {
                $describe.to_string()
            }

            fn clone_opaque(&self) -> OpaqueRef {
                make_opaque(self.clone())
            }

            fn as_any(&self) -> &dyn std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
                self
            }
        }

        /// Construct the hasher object with its member functions.
        pub fn $ctor_fn() -> Object {
            let mut result = Object::new();
            result.insert(
                skey(CHECKSUM_PRIVATE_KEY),
                Value::from(make_opaque($opaque { core: $core::new() })),
            );

            result.insert(
                skey("update"),
                Value::from(NativeFunction::new(
                    $update_name,
                    "data",
                    NativeTarget::VoidSa(|self_ref, mut reader| {
                        reader.start_overload();
                        let data = reader.required_string()?;
                        if reader.end_overload() {
                            let handle = self_hasher(&self_ref)?;
                            let mut guard = handle.borrow_mut();
                            let hasher = guard
                                .as_any_mut()
                                .downcast_mut::<$opaque>()
                                .ok_or_else(|| {
                                    RuntimeError::TypeMismatch(
                                        "invalid member function: type validation failure"
                                            .to_string(),
                                    )
                                })?;
                            hasher.core.update(&data);
                            return Ok(());
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
                            let handle = self_hasher(&self_ref)?;
                            let mut guard = handle.borrow_mut();
                            let hasher = guard
                                .as_any_mut()
                                .downcast_mut::<$opaque>()
                                .ok_or_else(|| {
                                    RuntimeError::TypeMismatch(
                                        "invalid member function: type validation failure"
                                            .to_string(),
                                    )
                                })?;
                            return Ok(hasher.core.finish());
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
                            let handle = self_hasher(&self_ref)?;
                            let mut guard = handle.borrow_mut();
                            let hasher = guard
                                .as_any_mut()
                                .downcast_mut::<$opaque>()
                                .ok_or_else(|| {
                                    RuntimeError::TypeMismatch(
                                        "invalid member function: type validation failure"
                                            .to_string(),
                                    )
                                })?;
                            hasher.core.clear();
                            return Ok(());
                        }
                        Err(reader.no_matching_function_call())
                    }),
                )),
            );
            result
        }

        /// Hash a whole byte string.
        pub fn $oneshot_fn(data: &[u8]) -> Value {
            let mut core = $core::new();
            core.update(data);
            core.finish()
        }

        /// Hash a file, streaming it in blocks.
        pub fn $file_fn(path: &[u8]) -> Result<Value> {
            let path = crate::library::bytes_to_path(path);
            let mut file = std::fs::File::open(&path).map_err(|err| {
                RuntimeError::io_op("open", &format!("could not open file '{}'", path.display()), &err)
            })?;
            let mut core = $core::new();
            let mut buffer = vec![0u8; 16384];
            loop {
                let nread = file.read(&mut buffer).map_err(|err| {
                    RuntimeError::io_op("read", &format!("error reading file '{}'", path.display()), &err)
                })?;
                if nread == 0 {
                    break;
                }
                core.update(&buffer[..nread]);
            }
            Ok(core.finish())
        }
    };
}

hasher_algorithm!(
    Crc32Hasher, Crc32Core, crc32_new, crc32, crc32_file,
    "instance of `std.checksum.CRC32`", "std.checksum.CRC32",
    "std.checksum.CRC32::update", "std.checksum.CRC32::finish", "std.checksum.CRC32::clear"
);
hasher_algorithm!(
    Adler32Hasher, Adler32Core, adler32_new, adler32, adler32_file,
    "instance of `std.checksum.Adler32`", "std.checksum.Adler32",
    "std.checksum.Adler32::update", "std.checksum.Adler32::finish", "std.checksum.Adler32::clear"
);
hasher_algorithm!(
    Fnv1a32Hasher, Fnv1a32Core, fnv1a32_new, fnv1a32, fnv1a32_file,
    "instance of `std.checksum.FNV1a32`", "std.checksum.FNV1a32",
    "std.checksum.FNV1a32::update", "std.checksum.FNV1a32::finish", "std.checksum.FNV1a32::clear"
);
hasher_algorithm!(
    Md5Hasher, Md5Core, md5_new, md5, md5_file,
    "instance of `std.checksum.MD5`", "std.checksum.MD5",
    "std.checksum.MD5::update", "std.checksum.MD5::finish", "std.checksum.MD5::clear"
);
hasher_algorithm!(
    Sha1Hasher, Sha1Core, sha1_new, sha1, sha1_file,
    "instance of `std.checksum.SHA1`", "std.checksum.SHA1",
    "std.checksum.SHA1::update", "std.checksum.SHA1::finish", "std.checksum.SHA1::clear"
);
hasher_algorithm!(
    Sha224Hasher, Sha224Core, sha224_new, sha224, sha224_file,
    "instance of `std.checksum.SHA224`", "std.checksum.SHA224",
    "std.checksum.SHA224::update", "std.checksum.SHA224::finish", "std.checksum.SHA224::clear"
);
hasher_algorithm!(
    Sha256Hasher, Sha256Core, sha256_new, sha256, sha256_file,
    "instance of `std.checksum.SHA256`", "std.checksum.SHA256",
    "std.checksum.SHA256::update", "std.checksum.SHA256::finish", "std.checksum.SHA256::clear"
);
hasher_algorithm!(
    Sha384Hasher, Sha384Core, sha384_new, sha384, sha384_file,
    "instance of `std.checksum.SHA384`", "std.checksum.SHA384",
    "std.checksum.SHA384::update", "std.checksum.SHA384::finish", "std.checksum.SHA384::clear"
);
hasher_algorithm!(
    Sha512Hasher, Sha512Core, sha512_new, sha512, sha512_file,
    "instance of `std.checksum.SHA512`", "std.checksum.SHA512",
    "std.checksum.SHA512::update", "std.checksum.SHA512::finish", "std.checksum.SHA512::clear"
);

macro_rules! bind_algorithm {
    ($result:ident, $ctor_key:literal, $oneshot_key:literal, $file_key:literal,
     $ctor_full:literal, $oneshot_full:literal, $file_full:literal,
     $ctor_fn:ident, $oneshot_fn:ident, $file_fn:ident) => {
        $result.insert(
            skey($ctor_key),
            Value::from(NativeFunction::new(
                $ctor_full,
                "",
                NativeTarget::ValA(|mut reader| {
                    reader.start_overload();
                    if reader.end_overload() {
                        return Ok(Value::from($ctor_fn()));
                    }
                    Err(reader.no_matching_function_call())
                }),
            )),
        );
        $result.insert(
            skey($oneshot_key),
            Value::from(NativeFunction::new(
                $oneshot_full,
                "data",
                NativeTarget::ValA(|mut reader| {
                    reader.start_overload();
                    let data = reader.required_string()?;
                    if reader.end_overload() {
                        return Ok($oneshot_fn(&data));
                    }
                    Err(reader.no_matching_function_call())
                }),
            )),
        );
        $result.insert(
            skey($file_key),
            Value::from(NativeFunction::new(
                $file_full,
                "path",
                NativeTarget::ValA(|mut reader| {
                    reader.start_overload();
                    let path = reader.required_string()?;
                    if reader.end_overload() {
                        return $file_fn(&path);
                    }
                    Err(reader.no_matching_function_call())
                }),
            )),
        );
    };
}

pub fn create_bindings_checksum(result: &mut Object, _version: ApiVersion) {
    bind_algorithm!(
        result, "CRC32", "crc32", "crc32_file",
        "std.checksum.CRC32", "std.checksum.crc32", "std.checksum.crc32_file",
        crc32_new, crc32, crc32_file
    );
    bind_algorithm!(
        result, "Adler32", "adler32", "adler32_file",
        "std.checksum.Adler32", "std.checksum.adler32", "std.checksum.adler32_file",
        adler32_new, adler32, adler32_file
    );
    bind_algorithm!(
        result, "FNV1a32", "fnv1a32", "fnv1a32_file",
        "std.checksum.FNV1a32", "std.checksum.fnv1a32", "std.checksum.fnv1a32_file",
        fnv1a32_new, fnv1a32, fnv1a32_file
    );
    bind_algorithm!(
        result, "MD5", "md5", "md5_file",
        "std.checksum.MD5", "std.checksum.md5", "std.checksum.md5_file",
        md5_new, md5, md5_file
    );
    bind_algorithm!(
        result, "SHA1", "sha1", "sha1_file",
        "std.checksum.SHA1", "std.checksum.sha1", "std.checksum.sha1_file",
        sha1_new, sha1, sha1_file
    );
    bind_algorithm!(
        result, "SHA224", "sha224", "sha224_file",
        "std.checksum.SHA224", "std.checksum.sha224", "std.checksum.sha224_file",
        sha224_new, sha224, sha224_file
    );
    bind_algorithm!(
        result, "SHA256", "sha256", "sha256_file",
        "std.checksum.SHA256", "std.checksum.sha256", "std.checksum.sha256_file",
        sha256_new, sha256, sha256_file
    );
    bind_algorithm!(
        result, "SHA384", "sha384", "sha384_file",
        "std.checksum.SHA384", "std.checksum.sha384", "std.checksum.sha384_file",
        sha384_new, sha384, sha384_file
    );
    bind_algorithm!(
        result, "SHA512", "sha512", "sha512_file",
        "std.checksum.SHA512", "std.checksum.sha512", "std.checksum.sha512_file",
        sha512_new, sha512, sha512_file
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn b(s: &str) -> Bytes {
        s.as_bytes().to_vec()
    }

    #[test]
    fn known_vectors() {
        assert_eq!(crc32(b""), Value::Integer(0x0000_0000));
        assert_eq!(crc32(b"abcdefg"), Value::Integer(0x312A_6AA6));
        assert_eq!(adler32(b""), Value::Integer(1));
        assert_eq!(adler32(b"Wikipedia"), Value::Integer(0x11E6_0398));
        assert_eq!(fnv1a32(b""), Value::Integer(0x811C_9DC5));
        assert_eq!(
            md5(b""),
            Value::from("d41d8cd98f00b204e9800998ecf8427e")
        );
        assert_eq!(
            sha1(b""),
            Value::from("da39a3ee5e6b4b0d3255bfef95601890afd80709")
        );
        assert_eq!(
            sha256(b""),
            Value::from("e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855")
        );
        assert_eq!(
            sha256(b"abc"),
            Value::from("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
        assert_eq!(
            sha224(b"abc"),
            Value::from("23097d223405d8228642a477bda255b32aadbce4bda0b3f7e36c9da7")
        );
        assert_eq!(
            sha384(b"abc"),
            Value::from(
                "cb00753f45a35e8bb5a03d699ac65007272c32ab0eded1631a8b605a43ff5bed8086072ba1e7cc2358baeca134c825a7"
            )
        );
        assert_eq!(
            sha512(b"abc"),
            Value::from(
                "ddaf35a193617abacc417349ae20413112e6fa4e89a97ea20a9eeee64b55d39a2192992a274fc1a836ba3c23a3feebbd454d4423643ce80e2a9ac94fa54ca49f"
            )
        );
    }

    #[test]
    fn finish_resets_state() {
        let mut core = Sha256Core::new();
        core.update(b"hello");
        let first = core.finish();
        core.update(b"hello");
        let second = core.finish();
        assert_eq!(first, second);

        let mut core = Crc32Core::new();
        core.update(b"abcdefg");
        assert_eq!(core.finish(), Value::Integer(0x312A_6AA6));
        core.update(b"abcdefg");
        assert_eq!(core.finish(), Value::Integer(0x312A_6AA6));
    }

    #[test]
    fn incremental_updates_match_one_shot() {
        let mut core = Md5Core::new();
        core.update(b"hello ");
        core.update(b"world");
        assert_eq!(core.finish(), md5(&b("hello world")));

        let mut core = Adler32Core::new();
        core.update(b"Wiki");
        core.update(b"pedia");
        assert_eq!(core.finish(), adler32(b"Wikipedia"));
    }

    #[test]
    fn clones_are_independent() {
        let mut a = Fnv1a32Core::new();
        a.update(b"xy");
        let mut b = a.clone();
        a.update(b"z");
        b.update(b"z");
        assert_eq!(a.finish(), b.finish());

        let mut c = Sha1Core::new();
        c.update(b"12");
        let mut d = c.clone();
        c.update(b"3");
        d.update(b"4");
        assert_ne!(c.finish(), d.finish());
    }

    #[test]
    fn file_hashing_streams_the_whole_file() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let data: Bytes = (0..100_000u32).map(|i| (i % 251) as u8).collect();
        tmp.write_all(&data).unwrap();
        tmp.flush().unwrap();
        let path = tmp.path().as_os_str().to_string_lossy().into_owned().into_bytes();
        assert_eq!(sha256_file(&path).unwrap(), sha256(&data));
        assert_eq!(crc32_file(&path).unwrap(), crc32(&data));
        assert!(crc32_file(b"/no/such/file/here").is_err());
    }

    #[test]
    fn hasher_object_carries_members() {
        let obj = sha256_new();
        assert!(obj.get(&skey("update")).unwrap().is_function());
        assert!(obj.get(&skey("finish")).unwrap().is_function());
        assert!(obj.get(&skey("clear")).unwrap().is_function());
        assert!(obj.get(&skey(CHECKSUM_PRIVATE_KEY)).unwrap().is_opaque());
    }
}
