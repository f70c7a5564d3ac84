//! Key derivation and ownership.
//!
//! This module owns two responsibilities:
//! 1. Deriving the key hierarchy of a vault: password to unlock key, and
//!    decrypted key blobs to the master and overview key pairs.
//! 2. Holding key material in types that are opaque, not `Clone`, and
//!    zeroised on drop.
//!
//! ## Derivation structure
//!
//! ```text
//! password --PBKDF2-HMAC-SHA512(salt, iterations)--> unlock key pair
//! unlock key pair --opdata--> masterKey secret   --SHA-512--> master pair
//! unlock key pair --opdata--> overviewKey secret --SHA-512--> overview pair
//! master pair --keywrap--> per-item key pair
//! ```
//!
//! Every pair is 64 bytes split in half: the first 32 bytes encrypt, the
//! last 32 bytes authenticate.

use std::fmt;
use std::num::NonZeroU32;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::crypto::{self, KEY_LEN};

// ---------------------------------------------------------------------------
// Key pair
// ---------------------------------------------------------------------------

/// An AES-256 encryption key and its companion HMAC-SHA256 key.
///
/// - Not `Clone`. Shared ownership goes through `Arc`.
/// - Zeroised on drop.
/// - Raw bytes are `pub(crate)` only.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyPair {
    enc: [u8; KEY_LEN],
    mac: [u8; KEY_LEN],
}

impl KeyPair {
    /// Build a pair from explicit halves.
    pub fn new(enc: [u8; KEY_LEN], mac: [u8; KEY_LEN]) -> Self {
        Self { enc, mac }
    }

    /// Split 64 bytes into (encryption, HMAC) halves.
    pub(crate) fn from_halves(bytes: &[u8; 2 * KEY_LEN]) -> Self {
        let mut enc = [0u8; KEY_LEN];
        let mut mac = [0u8; KEY_LEN];
        enc.copy_from_slice(&bytes[..KEY_LEN]);
        mac.copy_from_slice(&bytes[KEY_LEN..]);
        Self { enc, mac }
    }

    pub(crate) fn enc(&self) -> &[u8; KEY_LEN] {
        &self.enc
    }

    pub(crate) fn mac(&self) -> &[u8; KEY_LEN] {
        &self.mac
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("KeyPair([REDACTED])")
    }
}

/// The four keys of a decrypted profile.
pub struct ProfileKeys {
    /// Gates item detail, through each item's own wrapped key.
    pub master: KeyPair,
    /// Gates every overview: items, folders, attachment metadata.
    pub overview: KeyPair,
}

impl fmt::Debug for ProfileKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProfileKeys")
            .field("master", &self.master)
            .field("overview", &self.overview)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Derivation
// ---------------------------------------------------------------------------

/// Derive the unlock key pair from the master password.
///
/// A wrong password produces a well-formed but wrong pair. Nothing here can
/// tell; the mistake surfaces when the profile key blobs fail their HMAC.
pub fn derive_unlock_key(password: &str, salt: &[u8], iterations: NonZeroU32) -> KeyPair {
    let okm = crypto::pbkdf2_sha512(password.as_bytes(), salt, iterations);
    KeyPair::from_halves(&okm)
}

/// Derive a master or overview key pair from the decrypted key blob.
///
/// The secret is hashed with SHA-512 and the digest is split in half.
pub fn derive_level_keys(raw_secret: &[u8]) -> KeyPair {
    let digest = crypto::sha512(raw_secret);
    KeyPair::from_halves(&digest)
}
