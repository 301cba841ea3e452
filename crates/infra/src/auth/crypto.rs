//! Credential sealing against the server's published key material.
//!
//! The discovery endpoint serves DER bytes that have been observed both as
//! a bare SubjectPublicKeyInfo and as a full X.509 certificate, so loading
//! tries the raw key first and falls back to certificate extraction.
//! Encryption is RSA-OAEP with SHA-256 and no label, encode-then-encrypt:
//! the plaintext is the UTF-8 bytes of `"{secret}|{timestamp_ms}"`, no
//! trailing bytes and no fixed length.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ksef_domain::{KsefError, Result};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Oaep, RsaPublicKey};
use sha2::Sha256;
use x509_cert::der::referenced::OwnedToRef;
use x509_cert::der::Decode;
use x509_cert::Certificate;

/// Load DER key material as an SPKI public key, falling back to an X.509
/// certificate from which the public key is extracted.
pub fn load_public_key(der: &[u8]) -> Result<RsaPublicKey> {
    if let Ok(key) = RsaPublicKey::from_public_key_der(der) {
        return Ok(key);
    }
    let certificate = Certificate::from_der(der).map_err(|err| {
        KsefError::Encryption(format!(
            "key material is neither a DER public key nor a certificate: {err}"
        ))
    })?;
    RsaPublicKey::try_from(certificate.tbs_certificate.subject_public_key_info.owned_to_ref())
        .map_err(|err| {
            KsefError::Encryption(format!("certificate does not carry an RSA public key: {err}"))
        })
}

/// Encrypt `"{secret}|{timestamp_ms}"` under `key` and return the base64
/// ciphertext expected by the auth-initiation endpoint.
pub fn encrypt_credential(key: &RsaPublicKey, secret: &str, timestamp_ms: i64) -> Result<String> {
    let plaintext = format!("{secret}|{timestamp_ms}");
    let mut rng = rand::thread_rng();
    let ciphertext = key
        .encrypt(&mut rng, Oaep::new::<Sha256>(), plaintext.as_bytes())
        .map_err(|err| KsefError::Encryption(format!("OAEP encryption failed: {err}")))?;
    Ok(BASE64.encode(ciphertext))
}
