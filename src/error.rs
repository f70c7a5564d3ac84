//! Error types for opvault.
//!
//! Every variant is a distinct failure mode of the reader. Messages name the
//! structure or file that failed and never include key material or
//! plaintext.
//!
//! Aggregate calls (`Vault::items`, `Vault::folders`) wrap the first failure
//! in a context variant carrying the offending uuid or path. Use
//! [`OpvaultError::kind`] to get at the underlying failure class.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The single error type for all opvault operations.
#[derive(Debug, Error)]
pub enum OpvaultError {
    /// A structure did not have the expected shape: missing wrapper prefix
    /// or suffix, wrong magic, bad base64, truncated buffer, bad length.
    #[error("invalid format: {0}")]
    InvalidFormat(String),

    /// HMAC verification failed. Wrong password and tampered data are
    /// reported identically.
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Decryption was attempted before the vault was unlocked.
    #[error("vault is locked")]
    Locked,

    /// No item or folder with the given uuid exists.
    #[error("not found: {0}")]
    NotFound(String),

    /// A vault file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A vault file contained malformed JSON.
    #[error("malformed JSON in {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Decoding an item failed.
    #[error("item {uuid}: {source}")]
    Item {
        uuid: String,
        #[source]
        source: Box<OpvaultError>,
    },

    /// Decoding a folder failed.
    #[error("folder {uuid}: {source}")]
    Folder {
        uuid: String,
        #[source]
        source: Box<OpvaultError>,
    },

    /// Decoding an attachment file failed.
    #[error("attachment {}: {source}", path.display())]
    Attachment {
        path: PathBuf,
        #[source]
        source: Box<OpvaultError>,
    },
}

/// The failure class of an [`OpvaultError`], with context wrappers removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidFormat,
    AuthenticationFailed,
    Locked,
    NotFound,
    Io,
}

impl OpvaultError {
    /// Return the failure class, looking through item/folder/attachment
    /// context.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFormat(_) | Self::Json { .. } => ErrorKind::InvalidFormat,
            Self::AuthenticationFailed => ErrorKind::AuthenticationFailed,
            Self::Locked => ErrorKind::Locked,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Io { .. } => ErrorKind::Io,
            Self::Item { source, .. }
            | Self::Folder { source, .. }
            | Self::Attachment { source, .. } => source.kind(),
        }
    }

    pub(crate) fn invalid(what: impl Into<String>) -> Self {
        Self::InvalidFormat(what.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn in_item(self, uuid: &str) -> Self {
        Self::Item {
            uuid: uuid.to_string(),
            source: Box::new(self),
        }
    }

    pub(crate) fn in_folder(self, uuid: &str) -> Self {
        Self::Folder {
            uuid: uuid.to_string(),
            source: Box::new(self),
        }
    }

    pub(crate) fn in_attachment(self, path: impl Into<PathBuf>) -> Self {
        Self::Attachment {
            path: path.into(),
            source: Box::new(self),
        }
    }
}
