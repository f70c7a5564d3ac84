//! The vault handle.
//!
//! A [`Vault`] owns the profile and every piece of derived state: the
//! unlock and profile keys (inside the profile), the per-item key cache and
//! the decrypted item and folder listings. All of it lives in one session
//! behind a lock so a vault can be shared between threads; attachments keep
//! a weak handle to the same session for on-demand content decryption.
//!
//! `lock()` drops the whole session state, which zeroises the keys.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;
use tracing::debug;

use crate::config::VaultConfig;
use crate::error::OpvaultError;
use crate::folder::{self, Folder};
use crate::item::{self, Item};
use crate::keys::KeyPair;
use crate::keywrap;
use crate::profile::{Profile, ProfileInfo};

/// Mutable state shared by a vault and its attachments.
pub(crate) struct Session {
    profile: Profile,
    item_keys: HashMap<String, Arc<KeyPair>>,
    items: Option<BTreeMap<String, Item>>,
    folders: Option<BTreeMap<String, Folder>>,
}

/// The handle attachments keep to their vault's session.
pub(crate) type SessionHandle = Weak<RwLock<Session>>;

impl Session {
    pub(crate) fn profile(&self) -> &Profile {
        &self.profile
    }

    pub(crate) fn cached_item_key(&self, uuid: &str) -> Option<&KeyPair> {
        self.item_keys.get(uuid).map(Arc::as_ref)
    }

    /// The key pair of item `uuid`, unwrapped from `wrapped` at most once.
    pub(crate) fn item_key(&mut self, uuid: &str, wrapped: &str) -> Result<Arc<KeyPair>, OpvaultError> {
        if let Some(key) = self.item_keys.get(uuid) {
            return Ok(Arc::clone(key));
        }
        let master = &self.profile.keys()?.master;
        let key = Arc::new(keywrap::unwrap(wrapped, master)?);
        self.item_keys.insert(uuid.to_string(), Arc::clone(&key));
        Ok(key)
    }

    /// Drop all derived keys and decrypted data.
    fn clear(&mut self) {
        self.profile.lock();
        self.item_keys.clear();
        self.items = None;
        self.folders = None;
    }
}

/// Run `f` with the key pair of item `uuid`, unwrapping it from `wrapped`
/// if it is not cached yet.
///
/// `f` runs under the session's read lock, so a concurrent `lock()` waits
/// for it and no key escapes the session.
pub(crate) fn with_item_key<R>(
    handle: &SessionHandle,
    uuid: &str,
    wrapped: &str,
    f: impl FnOnce(&KeyPair) -> Result<R, OpvaultError>,
) -> Result<R, OpvaultError> {
    let session = handle.upgrade().ok_or(OpvaultError::Locked)?;
    if session.read().cached_item_key(uuid).is_none() {
        session.write().item_key(uuid, wrapped)?;
    }

    // A lock may land between the two guards; the cache is empty then.
    let guard = session.read();
    let key = guard.cached_item_key(uuid).ok_or(OpvaultError::Locked)?;
    f(key)
}

/// An OPVault on disk.
pub struct Vault {
    path: PathBuf,
    profile_dir: PathBuf,
    config: VaultConfig,
    session: Arc<RwLock<Session>>,
}

impl fmt::Debug for Vault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vault")
            .field("path", &self.path)
            .field("profile", &self.config.profile)
            .field("locked", &self.is_locked())
            .finish()
    }
}

impl Vault {
    /// Open the vault at `path` with the default configuration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OpvaultError> {
        Self::open_with_config(path, VaultConfig::default())
    }

    /// Open the vault at `path`. Reads the profile; decrypts nothing.
    pub fn open_with_config(path: impl AsRef<Path>, config: VaultConfig) -> Result<Self, OpvaultError> {
        let path = path.as_ref().to_path_buf();
        let profile_dir = path.join(&config.profile);
        let profile = Profile::load(&profile_dir, config.max_iterations)?;

        debug!(path = %path.display(), profile = %config.profile, "vault opened");
        Ok(Self {
            path,
            profile_dir,
            config,
            session: Arc::new(RwLock::new(Session {
                profile,
                item_keys: HashMap::new(),
                items: None,
                folders: None,
            })),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    /// Non-secret profile metadata.
    pub fn profile_info(&self) -> ProfileInfo {
        self.session.read().profile.info().clone()
    }

    /// Unlock the vault with the master password.
    ///
    /// Derives the unlock key and decrypts the profile keys. A wrong
    /// password and a damaged profile both fail with `AuthenticationFailed`
    /// and leave the vault locked.
    pub fn unlock(&self, password: &str) -> Result<(), OpvaultError> {
        let mut session = self.session.write();
        session.clear();
        session.profile.unlock(password);

        if session.profile.decrypt().is_err() {
            session.clear();
            debug!(path = %self.path.display(), "unlock failed");
            return Err(OpvaultError::AuthenticationFailed);
        }
        debug!(path = %self.path.display(), "vault unlocked");
        Ok(())
    }

    /// Lock the vault, discarding all keys and decrypted data.
    pub fn lock(&self) {
        self.session.write().clear();
        debug!(path = %self.path.display(), "vault locked");
    }

    pub fn is_locked(&self) -> bool {
        !self.session.read().profile.is_decrypted()
    }

    /// Decrypt every item.
    ///
    /// The first run decodes all bands and caches the result; later calls
    /// return the cached listing until the vault is locked.
    pub fn items(&self) -> Result<BTreeMap<String, Item>, OpvaultError> {
        {
            let session = self.session.read();
            session.profile.keys()?;
            if let Some(items) = &session.items {
                return Ok(items.clone());
            }
        }

        let mut session = self.session.write();
        session.profile.keys()?;
        if let Some(items) = &session.items {
            return Ok(items.clone());
        }
        let handle = Arc::downgrade(&self.session);
        let items = item::read_items(&self.profile_dir, &self.config, &mut session, &handle)?;
        debug!(count = items.len(), "items decoded");
        session.items = Some(items.clone());
        Ok(items)
    }

    /// Look up one item by uuid.
    pub fn item(&self, uuid: &str) -> Result<Item, OpvaultError> {
        self.items()?
            .remove(uuid)
            .ok_or_else(|| OpvaultError::NotFound(uuid.to_string()))
    }

    /// Decrypt every folder. Cached like [`items`](Vault::items).
    pub fn folders(&self) -> Result<BTreeMap<String, Folder>, OpvaultError> {
        {
            let session = self.session.read();
            session.profile.keys()?;
            if let Some(folders) = &session.folders {
                return Ok(folders.clone());
            }
        }

        let mut session = self.session.write();
        let overview = &session.profile.keys()?.overview;
        let folders = match &session.folders {
            Some(folders) => folders.clone(),
            None => folder::read_folders(&self.profile_dir, overview)?,
        };
        session.folders = Some(folders.clone());
        Ok(folders)
    }

    /// Look up one folder by uuid.
    pub fn folder(&self, uuid: &str) -> Result<Folder, OpvaultError> {
        self.folders()?
            .remove(uuid)
            .ok_or_else(|| OpvaultError::NotFound(uuid.to_string()))
    }
}
