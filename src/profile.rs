//! The vault profile and its unlock lifecycle.
//!
//! `profile.js` holds the PBKDF2 parameters and the two key blobs that guard
//! everything else. A profile moves through three states:
//!
//! ```text
//! Locked --unlock(password)--> KeyMaterialDerived --decrypt()--> Decrypted
//!    ^                                                              |
//!    +---------------------------- lock() -------------------------+
//! ```
//!
//! Only a `Decrypted` profile hands out keys.

use std::fmt;
use std::fs;
use std::num::NonZeroU32;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crypto;
use crate::error::OpvaultError;
use crate::format::{self, PROFILE};
use crate::keys::{self, KeyPair, ProfileKeys};
use crate::opdata;

/// File name of the profile inside the profile directory.
pub const PROFILE_FILE: &str = "profile.js";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRecord {
    #[serde(default)]
    uuid: String,
    #[serde(default)]
    last_updated_by: String,
    #[serde(default)]
    profile_name: String,
    #[serde(default)]
    password_hint: String,
    salt: String,
    master_key: String,
    overview_key: String,
    iterations: i64,
    #[serde(default)]
    created_at: i64,
    #[serde(default)]
    updated_at: i64,
}

/// Non-secret profile metadata. Readable while locked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProfileInfo {
    pub uuid: String,
    pub profile_name: String,
    pub password_hint: String,
    pub last_updated_by: String,
    pub iterations: u32,
    pub created: DateTime<Utc>,
    pub updated: DateTime<Utc>,
}

enum State {
    Locked,
    KeyMaterialDerived(KeyPair),
    Decrypted(ProfileKeys),
}

/// A loaded profile.
pub struct Profile {
    info: ProfileInfo,
    salt: Vec<u8>,
    iterations: NonZeroU32,
    master_key_raw: String,
    overview_key_raw: String,
    state: State,
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self.state {
            State::Locked => "Locked",
            State::KeyMaterialDerived(_) => "KeyMaterialDerived",
            State::Decrypted(_) => "Decrypted",
        };
        f.debug_struct("Profile")
            .field("info", &self.info)
            .field("state", &state)
            .finish_non_exhaustive()
    }
}

impl Profile {
    /// Read and parse `profile.js` from a profile directory.
    ///
    /// Iteration counts of zero or above `max_iterations` are rejected.
    pub fn load(profile_dir: &Path, max_iterations: u32) -> Result<Self, OpvaultError> {
        let path = profile_dir.join(PROFILE_FILE);
        let buf = fs::read(&path).map_err(|e| OpvaultError::io(&path, e))?;
        let profile = Self::parse(&buf, max_iterations)?;
        debug!(
            uuid = %profile.info.uuid,
            iterations = profile.info.iterations,
            "profile loaded"
        );
        Ok(profile)
    }

    /// Parse the contents of `profile.js`.
    pub fn parse(buf: &[u8], max_iterations: u32) -> Result<Self, OpvaultError> {
        let record: ProfileRecord = PROFILE.parse(buf, PROFILE_FILE)?;

        let iterations = u32::try_from(record.iterations)
            .ok()
            .filter(|&n| n <= max_iterations)
            .and_then(NonZeroU32::new)
            .ok_or_else(|| {
                OpvaultError::invalid(format!(
                    "profile iteration count {} is out of range",
                    record.iterations
                ))
            })?;
        let salt = crypto::decode_base64(&record.salt, "profile salt")?;

        Ok(Self {
            info: ProfileInfo {
                uuid: record.uuid,
                profile_name: record.profile_name,
                password_hint: record.password_hint,
                last_updated_by: record.last_updated_by,
                iterations: iterations.get(),
                created: format::timestamp(record.created_at, "profile created")?,
                updated: format::timestamp(record.updated_at, "profile updated")?,
            },
            salt,
            iterations,
            master_key_raw: record.master_key,
            overview_key_raw: record.overview_key,
            state: State::Locked,
        })
    }

    pub fn info(&self) -> &ProfileInfo {
        &self.info
    }

    /// Derive the unlock key from `password`.
    ///
    /// Always succeeds: a wrong password is only detected by [`decrypt`].
    /// Any previously decrypted keys are discarded.
    ///
    /// [`decrypt`]: Profile::decrypt
    pub fn unlock(&mut self, password: &str) {
        let unlock_key = keys::derive_unlock_key(password, &self.salt, self.iterations);
        self.state = State::KeyMaterialDerived(unlock_key);
    }

    /// Decrypt the master and overview key blobs.
    ///
    /// Requires [`unlock`](Profile::unlock) first. A no-op once decrypted.
    pub fn decrypt(&mut self) -> Result<(), OpvaultError> {
        let unlock_key = match &self.state {
            State::Locked => return Err(OpvaultError::Locked),
            State::Decrypted(_) => return Ok(()),
            State::KeyMaterialDerived(k) => k,
        };

        let master_secret = opdata::decode(&self.master_key_raw, unlock_key)?;
        let overview_secret = opdata::decode(&self.overview_key_raw, unlock_key)?;

        // Replacing the state drops the unlock key.
        self.state = State::Decrypted(ProfileKeys {
            master: keys::derive_level_keys(&master_secret),
            overview: keys::derive_level_keys(&overview_secret),
        });
        debug!(uuid = %self.info.uuid, "profile keys decrypted");
        Ok(())
    }

    /// Discard all derived key material.
    pub fn lock(&mut self) {
        self.state = State::Locked;
    }

    pub fn is_decrypted(&self) -> bool {
        matches!(self.state, State::Decrypted(_))
    }

    /// Borrow the profile keys, or fail with `Locked`.
    pub fn keys(&self) -> Result<&ProfileKeys, OpvaultError> {
        match &self.state {
            State::Decrypted(keys) => Ok(keys),
            _ => Err(OpvaultError::Locked),
        }
    }
}
