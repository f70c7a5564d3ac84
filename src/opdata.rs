//! The `opdata01` authenticated block codec.
//!
//! Every encrypted field of a vault (profile key blobs, item overview and
//! detail, folder overviews, attachment metadata overviews) is an opdata
//! block, base64 encoded. Attachment content uses the same physical layout
//! without the magic.
//!
//! # Layout
//! ```text
//! [ 0..8   ) magic "opdata01"
//! [ 8..16  ) plaintext length, u64 little-endian
//! [ 16..32 ) CBC initialization vector
//! [ 32..N-32 ) AES-256-CBC ciphertext, random padding at the front
//! [ N-32..N ) HMAC-SHA256 over bytes [0..N-32)
//! ```
//!
//! Decoding verifies the HMAC before anything else is looked at. On
//! mismatch no plaintext is produced.

use zeroize::Zeroizing;

use crate::crypto::{self, BLOCK_LEN, MAC_LEN};
use crate::error::OpvaultError;
use crate::keys::KeyPair;

/// Magic prefix of a tagged block.
pub const MAGIC: &[u8; 8] = b"opdata01";

/// Length of the header that precedes the ciphertext.
pub const HEADER_LEN: usize = 32;

/// Decode a base64 `opdata01` block.
pub fn decode(raw: &str, keys: &KeyPair) -> Result<Zeroizing<Vec<u8>>, OpvaultError> {
    let bytes = crypto::decode_base64(raw, "opdata block")?;
    open(&bytes, keys, true)
}

/// Decode an untagged block already in binary form.
///
/// Same as [`decode`] except that the magic is not checked. Used for
/// attachment content.
pub fn decode_raw(bytes: &[u8], keys: &KeyPair) -> Result<Zeroizing<Vec<u8>>, OpvaultError> {
    open(bytes, keys, false)
}

fn open(bytes: &[u8], keys: &KeyPair, tagged: bool) -> Result<Zeroizing<Vec<u8>>, OpvaultError> {
    if bytes.len() < HEADER_LEN + MAC_LEN {
        return Err(OpvaultError::invalid("opdata block is truncated"));
    }
    let (body, tag) = bytes.split_at(bytes.len() - MAC_LEN);

    // 1. Authenticate.
    crypto::verify_hmac(keys.mac(), body, tag)?;

    // 2. Check the header.
    if tagged && &body[..MAGIC.len()] != MAGIC {
        return Err(OpvaultError::invalid("opdata block has wrong magic"));
    }
    let mut len_bytes = [0u8; 8];
    len_bytes.copy_from_slice(&body[8..16]);
    let declared = u64::from_le_bytes(len_bytes);
    let iv = &body[16..HEADER_LEN];
    let ciphertext = &body[HEADER_LEN..];

    if ciphertext.len() % BLOCK_LEN != 0 {
        return Err(OpvaultError::invalid("opdata ciphertext is not block aligned"));
    }
    let declared = usize::try_from(declared)
        .ok()
        .filter(|&n| n <= ciphertext.len())
        .ok_or_else(|| OpvaultError::invalid("opdata length exceeds ciphertext"))?;

    // 3. Decrypt the ciphertext region only.
    let decrypted = crypto::cbc_decrypt(keys.enc(), iv, ciphertext)?;

    // 4. Drop the leading padding.
    let pad = decrypted.len() - declared;
    Ok(Zeroizing::new(decrypted[pad..].to_vec()))
}
