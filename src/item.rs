//! Items and the band files that store them.
//!
//! Items are sharded across `band_*.js` files, each a JSON object mapping
//! item uuid to record. For every record:
//! - the overview opens with the profile's overview keys alone;
//! - the detail opens with the item's own key pair, which is first
//!   unwrapped from the record's key field with the master keys;
//! - attachments named `<uuid>_*.attachment` are attached, reading only
//!   their metadata.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::attachment::{self, Attachment};
use crate::category::Category;
use crate::config::VaultConfig;
use crate::error::OpvaultError;
use crate::format::{self, BAND};
use crate::keys::KeyPair;
use crate::opdata;
use crate::vault::{Session, SessionHandle};

// The record's `hmac` field is not read; every encrypted field carries its
// own opdata tag.
#[derive(Deserialize)]
struct ItemRecord {
    category: Category,
    #[serde(rename = "k", default)]
    key: String,
    #[serde(rename = "o", default)]
    overview: String,
    #[serde(rename = "d", default)]
    detail: String,
    #[serde(default)]
    folder: Option<String>,
    #[serde(rename = "fave", default)]
    favorite: Option<i64>,
    #[serde(default)]
    trashed: bool,
    #[serde(rename = "tx", default)]
    transaction: i64,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    updated: i64,
}

/// A decrypted item.
#[derive(Clone, PartialEq)]
pub struct Item {
    uuid: String,
    category: Category,
    folder: Option<String>,
    favorite: Option<i64>,
    trashed: bool,
    transaction: i64,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    overview: Value,
    detail: Value,
    attachments: Vec<Attachment>,
}

impl fmt::Debug for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Item")
            .field("uuid", &self.uuid)
            .field("category", &self.category)
            .field("title", &self.title())
            .field("attachments", &self.attachments.len())
            .finish_non_exhaustive()
    }
}

impl Item {
    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn category(&self) -> Category {
        self.category
    }

    /// Uuid of the containing folder, if any.
    pub fn folder(&self) -> Option<&str> {
        self.folder.as_deref()
    }

    pub fn is_favorite(&self) -> bool {
        self.favorite.is_some()
    }

    pub fn is_trashed(&self) -> bool {
        self.trashed
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

    /// The decrypted overview document (title, URLs, tags, ...).
    pub fn overview(&self) -> &Value {
        &self.overview
    }

    /// The decrypted detail document (fields, notes, ...).
    pub fn detail(&self) -> &Value {
        &self.detail
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn title(&self) -> Option<&str> {
        self.overview.get("title").and_then(Value::as_str)
    }

    /// The primary URL: `url`, falling back to the first of `URLs`.
    pub fn url(&self) -> Option<&str> {
        self.overview
            .get("url")
            .and_then(Value::as_str)
            .or_else(|| self.urls().into_iter().next())
    }

    pub fn urls(&self) -> Vec<&str> {
        self.overview
            .get("URLs")
            .and_then(Value::as_array)
            .map(|urls| {
                urls.iter()
                    .filter_map(|u| u.get("u").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn tags(&self) -> Vec<&str> {
        self.overview
            .get("tags")
            .and_then(Value::as_array)
            .map(|tags| tags.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    /// The password: the field designated `password`, else the first field
    /// of type `P`, else a top-level `password` (password-category items).
    pub fn password(&self) -> Option<&str> {
        self.designated_field("password")
            .or_else(|| {
                self.fields()
                    .find(|f| f.get("type").and_then(Value::as_str) == Some("P"))
                    .and_then(|f| f.get("value"))
                    .and_then(Value::as_str)
            })
            .or_else(|| self.detail.get("password").and_then(Value::as_str))
    }

    pub fn username(&self) -> Option<&str> {
        self.designated_field("username")
    }

    pub fn notes(&self) -> Option<&str> {
        self.detail.get("notesPlain").and_then(Value::as_str)
    }

    fn fields(&self) -> impl Iterator<Item = &Value> {
        self.detail
            .get("fields")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    }

    fn designated_field(&self, designation: &str) -> Option<&str> {
        self.fields()
            .find(|f| f.get("designation").and_then(Value::as_str) == Some(designation))
            .and_then(|f| f.get("value"))
            .and_then(Value::as_str)
    }

    fn decode(
        uuid: &str,
        record: ItemRecord,
        attachment_files: &[PathBuf],
        session: &mut Session,
        handle: &SessionHandle,
    ) -> Result<Self, OpvaultError> {
        let created = format::timestamp(record.created, "item created")?;
        let updated = format::timestamp(record.updated, "item updated")?;

        let detail = if record.detail.is_empty() {
            Value::Null
        } else {
            let key = session.item_key(uuid, &record.key)?;
            decode_json(&record.detail, &key, "item detail")?
        };

        let overview_keys = &session.profile().keys()?.overview;
        let overview = if record.overview.is_empty() {
            Value::Null
        } else {
            decode_json(&record.overview, overview_keys, "item overview")?
        };

        let mut attachments = Vec::with_capacity(attachment_files.len());
        for path in attachment_files {
            let a = Attachment::read(path, uuid, &record.key, overview_keys, handle.clone())
                .map_err(|e| e.in_attachment(path))?;
            attachments.push(a);
        }

        trace!(uuid, attachments = attachments.len(), "item decoded");
        Ok(Self {
            uuid: uuid.to_string(),
            category: record.category,
            folder: record.folder,
            favorite: record.favorite,
            trashed: record.trashed,
            transaction: record.transaction,
            created,
            updated,
            overview,
            detail,
            attachments,
        })
    }
}

/// Open an opdata field and parse the plaintext as JSON.
pub(crate) fn decode_json(raw: &str, keys: &KeyPair, context: &str) -> Result<Value, OpvaultError> {
    let plaintext = opdata::decode(raw, keys)?;
    serde_json::from_slice(&plaintext).map_err(|e| OpvaultError::json(context, e))
}

/// Decode every item in every band of a profile directory.
///
/// The first item that fails to decode fails the whole call.
pub(crate) fn read_items(
    profile_dir: &Path,
    config: &VaultConfig,
    session: &mut Session,
    handle: &SessionHandle,
) -> Result<BTreeMap<String, Item>, OpvaultError> {
    let bands = format::files_matching(profile_dir, |name| {
        name.starts_with("band_") && name.ends_with(".js")
    })?;
    let attachment_files = if config.load_attachments {
        attachment::scan(profile_dir)?
    } else {
        Default::default()
    };

    let mut items = BTreeMap::new();
    for band in bands {
        let buf = fs::read(&band).map_err(|e| OpvaultError::io(&band, e))?;
        let records: BTreeMap<String, ItemRecord> =
            BAND.parse(&buf, &band.display().to_string())?;
        debug!(band = %band.display(), count = records.len(), "decoding band");

        for (uuid, record) in records {
            let files = attachment_files
                .get(&uuid)
                .map(Vec::as_slice)
                .unwrap_or_default();
            let item = Item::decode(&uuid, record, files, session, handle)
                .map_err(|e| e.in_item(&uuid))?;
            items.insert(uuid, item);
        }
    }

    Ok(items)
}
