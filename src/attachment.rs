//! Attachment files.
//!
//! An attachment lives next to the band files as
//! `<itemUUID>_<attachmentUUID>.attachment`:
//!
//! ```text
//! [ 0..7   ) magic "OPCLDAT"
//! [ 7      ) format version
//! [ 8..10  ) metadata length, u16 little-endian
//! [ 10..12 ) reserved
//! [ 12..16 ) icon length, u32 little-endian
//! [ 16..   ) metadata JSON, then icon, then content
//! ```
//!
//! The metadata's `overview` is an opdata block under the overview keys, so
//! attachments can be listed without touching item keys. The content is an
//! untagged opdata block under the owning item's key pair and is only
//! decrypted when [`Attachment::data`] is called.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::trace;
use zeroize::Zeroizing;

use crate::error::OpvaultError;
use crate::format;
use crate::item::decode_json;
use crate::keys::KeyPair;
use crate::opdata;
use crate::vault::{self, SessionHandle};

/// Magic prefix of an attachment file.
pub const MAGIC: &[u8; 7] = b"OPCLDAT";

/// Fixed header length.
pub const HEADER_LEN: usize = 16;

const EXTENSION: &str = ".attachment";

/// The fixed-size header at the start of an attachment file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    version: u8,
    metadata_len: usize,
    icon_len: usize,
}

impl Header {
    /// Parse the fixed header from the first bytes of a file of `file_len`
    /// bytes.
    fn parse(buf: &[u8], file_len: u64) -> Result<Self, OpvaultError> {
        if buf.len() < HEADER_LEN {
            return Err(OpvaultError::invalid("attachment header is truncated"));
        }
        if &buf[..MAGIC.len()] != MAGIC {
            return Err(OpvaultError::invalid("attachment has wrong magic"));
        }
        let header = Self {
            version: buf[7],
            metadata_len: usize::from(u16::from_le_bytes([buf[8], buf[9]])),
            icon_len: u32::from_le_bytes([buf[12], buf[13], buf[14], buf[15]]) as usize,
        };
        if file_len < header.content_offset() as u64 {
            return Err(OpvaultError::invalid("attachment is shorter than its header declares"));
        }
        Ok(header)
    }

    /// Read the header and the metadata block of the file at `path`,
    /// leaving `reader` positioned at the icon.
    fn read_with_metadata<R: Read>(
        reader: &mut R,
        file_len: u64,
        path: &Path,
    ) -> Result<(Self, Vec<u8>), OpvaultError> {
        if file_len < HEADER_LEN as u64 {
            return Err(OpvaultError::invalid("attachment header is truncated"));
        }
        let mut head = [0u8; HEADER_LEN];
        reader.read_exact(&mut head).map_err(|e| OpvaultError::io(path, e))?;
        let header = Self::parse(&head, file_len)?;

        let mut metadata = vec![0u8; header.metadata_len];
        reader.read_exact(&mut metadata).map_err(|e| OpvaultError::io(path, e))?;
        Ok((header, metadata))
    }

    fn content_offset(&self) -> usize {
        HEADER_LEN + self.metadata_len + self.icon_len
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Metadata {
    #[serde(alias = "UUID")]
    uuid: String,
    #[serde(rename = "itemUUID")]
    item_uuid: String,
    #[serde(default)]
    contents_size: u64,
    #[serde(default)]
    external: bool,
    #[serde(default)]
    tx_timestamp: i64,
    overview: String,
    #[serde(default)]
    created_at: i64,
    #[serde(default)]
    updated_at: i64,
}

/// An attachment with decrypted metadata. Content is read on demand.
#[derive(Clone)]
pub struct Attachment {
    path: PathBuf,
    version: u8,
    uuid: String,
    item_uuid: String,
    contents_size: u64,
    external: bool,
    transaction: i64,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    overview: Value,
    owner: String,
    item_key_raw: String,
    session: SessionHandle,
}

impl PartialEq for Attachment {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.version == other.version
            && self.uuid == other.uuid
            && self.item_uuid == other.item_uuid
            && self.owner == other.owner
            && self.contents_size == other.contents_size
            && self.external == other.external
            && self.transaction == other.transaction
            && self.created == other.created
            && self.updated == other.updated
            && self.overview == other.overview
    }
}

impl fmt::Debug for Attachment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attachment")
            .field("uuid", &self.uuid)
            .field("item_uuid", &self.item_uuid)
            .field("path", &self.path)
            .field("version", &self.version)
            .field("contents_size", &self.contents_size)
            .finish_non_exhaustive()
    }
}

impl Attachment {
    /// Read an attachment's header and metadata.
    ///
    /// `item_key_raw` is the owning item's still-wrapped key record; it is
    /// only unwrapped when the content is requested.
    pub(crate) fn read(
        path: &Path,
        item_uuid: &str,
        item_key_raw: &str,
        overview_keys: &KeyPair,
        session: SessionHandle,
    ) -> Result<Self, OpvaultError> {
        let mut file = File::open(path).map_err(|e| OpvaultError::io(path, e))?;
        let file_len = file.metadata().map_err(|e| OpvaultError::io(path, e))?.len();
        let (header, metadata) = Header::read_with_metadata(&mut file, file_len, path)?;

        let metadata: Metadata = serde_json::from_slice(&metadata)
            .map_err(|e| OpvaultError::json("attachment metadata", e))?;
        let overview = decode_json(&metadata.overview, overview_keys, "attachment overview")?;

        trace!(uuid = %metadata.uuid, item = item_uuid, "attachment metadata decoded");
        Ok(Self {
            path: path.to_path_buf(),
            version: header.version,
            uuid: metadata.uuid,
            item_uuid: metadata.item_uuid,
            contents_size: metadata.contents_size,
            external: metadata.external,
            transaction: metadata.tx_timestamp,
            created: format::timestamp(metadata.created_at, "attachment created")?,
            updated: format::timestamp(metadata.updated_at, "attachment updated")?,
            overview,
            owner: item_uuid.to_string(),
            item_key_raw: item_key_raw.to_string(),
            session,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    /// Uuid of the owning item, as recorded in the metadata.
    pub fn item_uuid(&self) -> &str {
        &self.item_uuid
    }

    /// Plaintext size declared by the metadata.
    pub fn contents_size(&self) -> u64 {
        self.contents_size
    }

    pub fn is_external(&self) -> bool {
        self.external
    }

    pub fn transaction(&self) -> i64 {
        self.transaction
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn updated(&self) -> DateTime<Utc> {
        self.updated
    }

    /// The decrypted metadata overview (filename, ...).
    pub fn overview(&self) -> &Value {
        &self.overview
    }

    pub fn filename(&self) -> Option<&str> {
        self.overview.get("filename").and_then(Value::as_str)
    }

    /// Decrypt the attachment content.
    ///
    /// Uses the owning item's key pair, unwrapping it first if it is not
    /// cached yet. Fails with `Locked` once the vault is locked or dropped.
    pub fn data(&self) -> Result<Zeroizing<Vec<u8>>, OpvaultError> {
        self.read_content().map_err(|e| e.in_attachment(&self.path))
    }

    fn read_content(&self) -> Result<Zeroizing<Vec<u8>>, OpvaultError> {
        vault::with_item_key(&self.session, &self.owner, &self.item_key_raw, |key| {
            let buf = fs::read(&self.path).map_err(|e| OpvaultError::io(&self.path, e))?;
            let header = Header::parse(&buf, buf.len() as u64)?;
            let content = opdata::decode_raw(&buf[header.content_offset()..], key)?;
            trace!(uuid = %self.uuid, len = content.len(), "attachment content decrypted");
            Ok(content)
        })
    }
}

fn owner_from_path(path: &Path) -> Option<&str> {
    path.file_name()?
        .to_str()?
        .split_once('_')
        .map(|(owner, _)| owner)
}

/// Group the `*.attachment` files of a profile directory by owning item.
///
/// Files whose name has no `_` separator are ignored.
pub(crate) fn scan(profile_dir: &Path) -> Result<BTreeMap<String, Vec<PathBuf>>, OpvaultError> {
    let files = format::files_matching(profile_dir, |name| name.ends_with(EXTENSION))?;

    let mut by_item: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
    for path in files {
        let Some(owner) = owner_from_path(&path).map(str::to_string) else {
            continue;
        };
        by_item.entry(owner).or_default().push(path);
    }
    Ok(by_item)
}
