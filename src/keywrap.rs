//! Per-item key records.
//!
//! Each item carries its own encryption and HMAC keys, wrapped with the
//! master key pair in a fixed-size record:
//!
//! ```text
//! [ 0..16   ) CBC initialization vector
//! [ 16..80  ) AES-256-CBC ciphertext, exactly four blocks, no length field
//! [ 80..112 ) HMAC-SHA256 over bytes [0..80)
//! ```
//!
//! The 64 decrypted bytes are the item's (encryption, HMAC) pair. The same
//! pair decrypts the item's detail and all of its attachment content.

use zeroize::Zeroize;

use crate::crypto::{self, BLOCK_LEN, KEY_LEN, MAC_LEN};
use crate::error::OpvaultError;
use crate::keys::KeyPair;

/// Length of the encrypted key material.
const WRAPPED_LEN: usize = 2 * KEY_LEN;

/// Total length of a decoded record.
pub const RECORD_LEN: usize = BLOCK_LEN + WRAPPED_LEN + MAC_LEN;

/// Unwrap a base64 item key record with the master key pair.
pub fn unwrap(wrapped: &str, master: &KeyPair) -> Result<KeyPair, OpvaultError> {
    let record = crypto::decode_base64(wrapped, "item key")?;
    if record.len() != RECORD_LEN {
        return Err(OpvaultError::invalid(format!(
            "item key record is {} bytes, expected {RECORD_LEN}",
            record.len()
        )));
    }
    let (data, tag) = record.split_at(BLOCK_LEN + WRAPPED_LEN);

    crypto::verify_hmac(master.mac(), data, tag)?;

    let (iv, ciphertext) = data.split_at(BLOCK_LEN);
    let secret = crypto::cbc_decrypt(master.enc(), iv, ciphertext)?;

    let mut halves = [0u8; WRAPPED_LEN];
    halves.copy_from_slice(&secret);
    let pair = KeyPair::from_halves(&halves);
    halves.zeroize();
    Ok(pair)
}
