//! Low-level cryptographic operations.
//!
//! This module is the only place in the crate that imports `ring`, `aes`,
//! `cbc` or `base64` directly. The codecs (`opdata`, `keywrap`) and the key
//! derivation in `keys` go through the functions exposed here.
//!
//! Primitive choices are fixed by the vault format:
//! - **Cipher**: AES-256-CBC, no padding (the formats pad themselves)
//! - **MAC**: HMAC-SHA256, verified in constant time
//! - **Password KDF**: PBKDF2-HMAC-SHA512
//! - **Key split**: SHA-512
//! - **Text encoding**: standard base64 with padding

use std::num::NonZeroU32;

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::{digest, hmac, pbkdf2};
use zeroize::Zeroizing;

use crate::error::OpvaultError;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// Size of an encryption or HMAC key in bytes (256 bits).
pub const KEY_LEN: usize = 32;

/// Size of an HMAC-SHA256 tag in bytes.
pub const MAC_LEN: usize = 32;

/// AES block size, which is also the CBC IV size.
pub const BLOCK_LEN: usize = 16;

/// Verify an HMAC-SHA256 tag over `data`.
///
/// The comparison is constant time. Any mismatch, including a tag of the
/// wrong length, is `AuthenticationFailed`.
pub fn verify_hmac(key: &[u8; KEY_LEN], data: &[u8], tag: &[u8]) -> Result<(), OpvaultError> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::verify(&key, data, tag).map_err(|_| OpvaultError::AuthenticationFailed)
}

/// Decrypt `ciphertext` with AES-256-CBC and no padding removal.
///
/// The ciphertext length must be a multiple of the block size. The output
/// has exactly the same length as the input.
pub fn cbc_decrypt(
    key: &[u8; KEY_LEN],
    iv: &[u8],
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>, OpvaultError> {
    if ciphertext.len() % BLOCK_LEN != 0 {
        return Err(OpvaultError::invalid("ciphertext is not a whole number of blocks"));
    }
    if ciphertext.is_empty() {
        return Ok(Zeroizing::new(Vec::new()));
    }

    let decryptor = Aes256CbcDec::new_from_slices(key, iv)
        .map_err(|_| OpvaultError::invalid("CBC initialization vector"))?;

    let mut buf = Zeroizing::new(ciphertext.to_vec());
    decryptor
        .decrypt_padded_mut::<NoPadding>(&mut buf)
        .map_err(|_| OpvaultError::invalid("ciphertext is not a whole number of blocks"))?;

    Ok(buf)
}

/// SHA-512 digest of `data`.
pub fn sha512(data: &[u8]) -> Zeroizing<[u8; 64]> {
    let d = digest::digest(&digest::SHA512, data);
    let mut out = Zeroizing::new([0u8; 64]);
    out.copy_from_slice(d.as_ref());
    out
}

/// PBKDF2-HMAC-SHA512 producing 64 bytes.
pub fn pbkdf2_sha512(
    password: &[u8],
    salt: &[u8],
    iterations: NonZeroU32,
) -> Zeroizing<[u8; 64]> {
    let mut out = Zeroizing::new([0u8; 64]);
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA512,
        iterations,
        salt,
        password,
        &mut out[..],
    );
    out
}

/// Decode standard base64. `what` names the field for the error message.
pub fn decode_base64(raw: &str, what: &str) -> Result<Vec<u8>, OpvaultError> {
    STANDARD
        .decode(raw.trim())
        .map_err(|_| OpvaultError::invalid(format!("{what} is not valid base64")))
}
