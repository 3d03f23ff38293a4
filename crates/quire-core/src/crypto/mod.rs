//! Per-document envelope encryption.
//!
//! Keys are derived from the user's password with PBKDF2-HMAC-SHA256 and a
//! random per-envelope salt; content is sealed with AES-256-GCM under a random
//! nonce. The 16-byte GCM tag is stored apart from the ciphertext.

mod cache;

pub use cache::{PasswordCache, SweeperGuard, PASSWORD_TTL, SWEEP_INTERVAL};

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Error, Result};
use crate::models::Envelope;

pub const PBKDF2_ITERATIONS: u32 = 100_000;
pub const KEY_LEN: usize = 32;
pub const SALT_LEN: usize = 16;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;

/// Derive a 256-bit key from `password` and `salt`.
///
/// Deterministic for the same inputs.
pub fn derive_key(password: &str, salt: &[u8]) -> Zeroizing<[u8; KEY_LEN]> {
    let mut key = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key[..]);
    key
}

/// Encrypt `plaintext` under a key derived from `password`.
///
/// Salt and nonce are fresh on every call, so the same input never produces
/// the same envelope twice.
pub fn encrypt(plaintext: &str, password: &str) -> Result<Envelope> {
    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt);
    let cipher = Aes256Gcm::new_from_slice(&key[..])
        .map_err(|error| Error::Storage(format!("AES key init failed: {error}")))?;
    let mut sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|error| Error::Storage(format!("AES-GCM encrypt failed: {error}")))?;

    let tag = sealed.split_off(sealed.len() - TAG_LEN);
    Ok(Envelope {
        cipher_text: BASE64.encode(&sealed),
        salt: BASE64.encode(salt),
        nonce: BASE64.encode(nonce),
        auth_tag: BASE64.encode(tag),
    })
}

/// Recover the plaintext sealed in `envelope`.
///
/// Any failure (wrong password, malformed encoding, tampered bytes) surfaces as
/// [`Error::Authentication`] and no partial plaintext is ever returned.
pub fn decrypt(envelope: &Envelope, password: &str) -> Result<String> {
    let cipher_text = decode(&envelope.cipher_text)?;
    let salt = decode(&envelope.salt)?;
    let nonce = decode(&envelope.nonce)?;
    let tag = decode(&envelope.auth_tag)?;
    if nonce.len() != NONCE_LEN || tag.len() != TAG_LEN {
        return Err(Error::Authentication);
    }

    let mut sealed = cipher_text;
    sealed.extend_from_slice(&tag);

    let key = derive_key(password, &salt);
    let cipher =
        Aes256Gcm::new_from_slice(&key[..]).map_err(|_| Error::Authentication)?;
    let plaintext = Zeroizing::new(
        cipher
            .decrypt(Nonce::from_slice(&nonce), sealed.as_slice())
            .map_err(|_| Error::Authentication)?,
    );

    String::from_utf8(plaintext.to_vec()).map_err(|_| Error::Authentication)
}

fn decode(value: &str) -> Result<Vec<u8>> {
    BASE64.decode(value).map_err(|_| Error::Authentication)
}
