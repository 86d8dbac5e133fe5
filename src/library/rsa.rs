//! # `std.rsa`
//!
//! PKCS#1 v1.5 signatures over MD5, SHA-1 and SHA-256, with PEM-encoded
//! keys on disk. Private keys may be PKCS#1 (`RSA PRIVATE KEY`) or PKCS#8
//! (`PRIVATE KEY`); public keys may be PKCS#1 (`RSA PUBLIC KEY`) or SPKI
//! (`PUBLIC KEY`).
//!
//! Verification returns a boolean; only loading failures raise errors, a
//! mere signature mismatch never does.

use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};

use crate::binding::{NativeFunction, NativeTarget};
use crate::error::{Result, RuntimeError};
use crate::global::ApiVersion;
use crate::library::bytes_to_path;
use crate::value::{skey, Bytes, Object, Value};

fn load_private_key(path: &[u8]) -> Result<RsaPrivateKey> {
    let path = bytes_to_path(path);
    let text = std::fs::read_to_string(&path).map_err(|err| {
        RuntimeError::io_op(
            "open",
            &format!("could not open private key file '{}'", path.display()),
            &err,
        )
    })?;
    RsaPrivateKey::from_pkcs1_pem(&text)
        .or_else(|_| RsaPrivateKey::from_pkcs8_pem(&text))
        .map_err(|_| {
            RuntimeError::Crypto(format!(
                "could not read private key file '{}'",
                path.display()
            ))
        })
}

fn load_public_key(path: &[u8]) -> Result<RsaPublicKey> {
    let path = bytes_to_path(path);
    let text = std::fs::read_to_string(&path).map_err(|err| {
        RuntimeError::io_op(
            "open",
            &format!("could not open public key file '{}'", path.display()),
            &err,
        )
    })?;
    RsaPublicKey::from_pkcs1_pem(&text)
        .or_else(|_| RsaPublicKey::from_public_key_pem(&text))
        .map_err(|_| {
            RuntimeError::Crypto(format!(
                "could not read public key file '{}'",
                path.display()
            ))
        })
}

macro_rules! rsa_algorithm {
    ($sign_fn:ident, $verify_fn:ident, $digest:ty) => {
        pub fn $sign_fn(private_key_path: &[u8], data: &[u8]) -> Result<Bytes> {
            let key = load_private_key(private_key_path)?;
            let signing_key = rsa::pkcs1v15::SigningKey::<$digest>::new(key);
            let signature = rsa::signature::Signer::try_sign(&signing_key, data).map_err(|err| {
                RuntimeError::Crypto(format!("could not sign data: {err}"))
            })?;
            Ok(rsa::signature::SignatureEncoding::to_vec(&signature))
        }

        pub fn $verify_fn(public_key_path: &[u8], data: &[u8], sig: &[u8]) -> Result<bool> {
            let key = load_public_key(public_key_path)?;
            let verifying_key = rsa::pkcs1v15::VerifyingKey::<$digest>::new(key);
            let signature = match rsa::pkcs1v15::Signature::try_from(sig) {
                Ok(signature) => signature,
                Err(_) => return Ok(false),
            };
            Ok(rsa::signature::Verifier::verify(&verifying_key, data, &signature).is_ok())
        }
    };
}

rsa_algorithm!(sign_md5, verify_md5, md5::Md5);
rsa_algorithm!(sign_sha1, verify_sha1, sha1::Sha1);
rsa_algorithm!(sign_sha256, verify_sha256, sha2::Sha256);

macro_rules! bind_rsa {
    ($result:ident, $sign_key:literal, $verify_key:literal, $sign_full:literal,
     $verify_full:literal, $sign_fn:ident, $verify_fn:ident) => {
        $result.insert(
            skey($sign_key),
            Value::from(NativeFunction::new(
                $sign_full,
                "private_key_path, data",
                NativeTarget::ValA(|mut reader| {
                    reader.start_overload();
                    let path = reader.required_string()?;
                    let data = reader.required_string()?;
                    if reader.end_overload() {
                        return Ok(Value::from($sign_fn(&path, &data)?));
                    }
                    Err(reader.no_matching_function_call())
                }),
            )),
        );
        $result.insert(
            skey($verify_key),
            Value::from(NativeFunction::new(
                $verify_full,
                "public_key_path, data, sig",
                NativeTarget::ValA(|mut reader| {
                    reader.start_overload();
                    let path = reader.required_string()?;
                    let data = reader.required_string()?;
                    let sig = reader.required_string()?;
                    if reader.end_overload() {
                        return Ok(Value::from($verify_fn(&path, &data, &sig)?));
                    }
                    Err(reader.no_matching_function_call())
                }),
            )),
        );
    };
}

pub fn create_bindings_rsa(result: &mut Object, _version: ApiVersion) {
    bind_rsa!(
        result, "sign_md5", "verify_md5",
        "std.rsa.sign_md5", "std.rsa.verify_md5", sign_md5, verify_md5
    );
    bind_rsa!(
        result, "sign_sha1", "verify_sha1",
        "std.rsa.sign_sha1", "std.rsa.verify_sha1", sign_sha1, verify_sha1
    );
    bind_rsa!(
        result, "sign_sha256", "verify_sha256",
        "std.rsa.sign_sha256", "std.rsa.verify_sha256", sign_sha256, verify_sha256
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use rsa::pkcs1::EncodeRsaPrivateKey;
    use rsa::pkcs8::EncodePublicKey;

    fn write_key_pair(dir: &std::path::Path) -> (Bytes, Bytes) {
        let mut rng = rand_core::OsRng;
        let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public = RsaPublicKey::from(&private);

        let priv_path = dir.join("key.pem");
        let pub_path = dir.join("key.pub.pem");
        std::fs::write(
            &priv_path,
            private.to_pkcs1_pem(rsa::pkcs8::LineEnding::LF).unwrap().as_bytes(),
        )
        .unwrap();
        std::fs::write(
            &pub_path,
            public.to_public_key_pem(rsa::pkcs8::LineEnding::LF).unwrap(),
        )
        .unwrap();
        (
            crate::library::path_to_bytes(&priv_path),
            crate::library::path_to_bytes(&pub_path),
        )
    }

    #[test]
    fn sign_verify_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (priv_path, pub_path) = write_key_pair(dir.path());

        let sig = sign_sha256(&priv_path, b"message").unwrap();
        assert!(!sig.is_empty());
        assert!(verify_sha256(&pub_path, b"message", &sig).unwrap());
        assert!(!verify_sha256(&pub_path, b"tampered", &sig).unwrap());
        assert!(!verify_sha256(&pub_path, b"message", b"garbage").unwrap());

        // Digest algorithms are not interchangeable.
        assert!(!verify_sha1(&pub_path, b"message", &sig).unwrap());

        let sig = sign_md5(&priv_path, b"message").unwrap();
        assert!(verify_md5(&pub_path, b"message", &sig).unwrap());
        let sig = sign_sha1(&priv_path, b"message").unwrap();
        assert!(verify_sha1(&pub_path, b"message", &sig).unwrap());
    }

    #[test]
    fn key_loading_failures() {
        assert!(sign_sha256(b"/no/such/key.pem", b"x").is_err());

        let dir = tempfile::tempdir().unwrap();
        let bogus = dir.path().join("bogus.pem");
        std::fs::write(&bogus, "not a key").unwrap();
        let pb = crate::library::path_to_bytes(&bogus);
        assert!(sign_sha256(&pb, b"x").is_err());
        assert!(verify_sha256(&pb, b"x", b"y").is_err());
    }
}
