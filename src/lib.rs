//! # opvault
//!
//! Read-only decoder for OPVault password-manager vaults.
//!
//! A vault is a directory holding a profile (`profile.js`), item shards
//! (`band_*.js`), a folder index (`folders.js`) and attachment files. Every
//! secret in it is encrypted with AES-256-CBC and authenticated with
//! HMAC-SHA256 under a key hierarchy rooted in the master password.
//!
//! ```no_run
//! let vault = opvault::open("/path/to/Freddy.opvault")?;
//! vault.unlock("freddy")?;
//! for (uuid, item) in vault.items()? {
//!     println!("{uuid} {}", item.title().unwrap_or("(untitled)"));
//! }
//! vault.lock();
//! # Ok::<(), opvault::OpvaultError>(())
//! ```
//!
//! ## Public API
//!
//! [`Vault`] is the entry point. The block codecs ([`opdata`], [`keywrap`])
//! and key derivation ([`keys`]) are public for callers that work with
//! individual encrypted fields. Nothing in this crate writes to the vault.

// Module declarations.
pub(crate) mod crypto;
pub(crate) mod format;
pub mod attachment;
pub mod category;
pub mod config;
pub mod error;
pub mod folder;
pub mod item;
pub mod keys;
pub mod keywrap;
pub mod opdata;
pub mod profile;
pub mod vault;

#[cfg(test)]
pub(crate) mod testutil;

pub use attachment::Attachment;
pub use category::Category;
pub use config::VaultConfig;
pub use error::{ErrorKind, OpvaultError};
pub use folder::Folder;
pub use item::Item;
pub use keys::KeyPair;
pub use profile::ProfileInfo;
pub use vault::Vault;

/// Open the vault at `path` with the default configuration.
///
/// Only the profile is read. Call [`Vault::unlock`] before listing items.
pub fn open(path: impl AsRef<std::path::Path>) -> Result<Vault, OpvaultError> {
    Vault::open(path)
}
