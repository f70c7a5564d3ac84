//! Test-only encoders producing blocks in the on-disk layouts.

use std::num::NonZeroU32;

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::hmac;
use ring::rand::{SecureRandom, SystemRandom};

use crate::keys::{self, KeyPair};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    SystemRandom::new().fill(&mut buf).unwrap();
    buf
}

pub fn base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn cbc_encrypt(key: &[u8; 32], iv: &[u8], data: &[u8]) -> Vec<u8> {
    let mut buf = data.to_vec();
    let len = buf.len();
    Aes256CbcEnc::new_from_slices(key, iv)
        .unwrap()
        .encrypt_padded_mut::<NoPadding>(&mut buf, len)
        .unwrap();
    buf
}

fn sign(key: &[u8; 32], data: &[u8]) -> Vec<u8> {
    let key = hmac::Key::new(hmac::HMAC_SHA256, key);
    hmac::sign(&key, data).as_ref().to_vec()
}

pub fn seal_opdata_with_length(keys: &KeyPair, plaintext: &[u8], declared: u64) -> Vec<u8> {
    seal(keys, plaintext, declared, true)
}

pub fn seal_opdata_bytes(keys: &KeyPair, plaintext: &[u8], tagged: bool) -> Vec<u8> {
    seal(keys, plaintext, plaintext.len() as u64, tagged)
}

pub fn seal_opdata(keys: &KeyPair, plaintext: &[u8]) -> String {
    base64(&seal_opdata_bytes(keys, plaintext, true))
}

fn seal(keys: &KeyPair, plaintext: &[u8], declared: u64, tagged: bool) -> Vec<u8> {
    let pad_len = 16 - plaintext.len() % 16;
    let mut padded = random_bytes(pad_len);
    padded.extend_from_slice(plaintext);

    let iv = random_bytes(16);
    let mut out = Vec::new();
    if tagged {
        out.extend_from_slice(b"opdata01");
    } else {
        out.extend_from_slice(&random_bytes(8));
    }
    out.extend_from_slice(&declared.to_le_bytes());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&cbc_encrypt(keys.enc(), &iv, &padded));
    let tag = sign(keys.mac(), &out);
    out.extend_from_slice(&tag);
    out
}

/// Wrap an item key pair with the master pair, in the 112-byte record layout.
pub fn wrap_item_key(master: &KeyPair, item: &KeyPair) -> String {
    let iv = random_bytes(16);
    let mut secret = item.enc().to_vec();
    secret.extend_from_slice(item.mac());

    let mut out = iv.clone();
    out.extend_from_slice(&cbc_encrypt(master.enc(), &iv, &secret));
    let tag = sign(master.mac(), &out);
    out.extend_from_slice(&tag);
    base64(&out)
}

/// Secret behind the master key blob written by [`profile_js`].
pub const MASTER_SECRET: [u8; 256] = [1u8; 256];
/// Secret behind the overview key blob written by [`profile_js`].
pub const OVERVIEW_SECRET: [u8; 64] = [2u8; 64];
pub const SALT: &[u8] = b"0123456789abcdef";

/// A profile.js whose key blobs open under `password`.
pub fn profile_js(password: &str, iterations: u32) -> Vec<u8> {
    let unlock = keys::derive_unlock_key(password, SALT, NonZeroU32::new(iterations).unwrap());
    let json = serde_json::json!({
        "uuid": "2B894A18997C4638BACC55F2D56A4890",
        "profileName": "default",
        "passwordHint": "a dog",
        "salt": base64(SALT),
        "masterKey": seal_opdata(&unlock, &MASTER_SECRET),
        "overviewKey": seal_opdata(&unlock, &OVERVIEW_SECRET),
        "iterations": iterations,
        "createdAt": 1_373_753_414,
        "updatedAt": 1_373_754_128,
    });
    format!("var profile={json};").into_bytes()
}
