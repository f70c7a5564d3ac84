//! Folders.
//!
//! `folders.js` maps folder uuid to record. A folder has no key of its own;
//! its overview opens with the profile's overview keys.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::OpvaultError;
use crate::format::{self, FOLDERS};
use crate::item::decode_json;
use crate::keys::KeyPair;

/// File name of the folder index inside the profile directory.
pub const FOLDERS_FILE: &str = "folders.js";

#[derive(Deserialize)]
struct FolderRecord {
    overview: String,
    #[serde(default)]
    smart: bool,
    #[serde(rename = "tx", default)]
    transaction: i64,
    #[serde(default)]
    created: i64,
    #[serde(default)]
    updated: i64,
}

/// A decrypted folder.
#[derive(Debug, Clone, PartialEq)]
pub struct Folder {
    uuid: String,
    smart: bool,
    transaction: i64,
    created: DateTime<Utc>,
    updated: DateTime<Utc>,
    overview: Value,
}

impl Folder {
    fn decode(uuid: &str, record: FolderRecord, overview_keys: &KeyPair) -> Result<Self, OpvaultError> {
        Ok(Self {
            uuid: uuid.to_string(),
            smart: record.smart,
            transaction: record.transaction,
            created: format::timestamp(record.created, "folder created")?,
            updated: format::timestamp(record.updated, "folder updated")?,
            overview: decode_json(&record.overview, overview_keys, "folder overview")?,
        })
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn title(&self) -> Option<&str> {
        self.overview.get("title").and_then(Value::as_str)
    }

    /// Smart folders are saved searches rather than containers.
    pub fn is_smart(&self) -> bool {
        self.smart
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

    pub fn overview(&self) -> &Value {
        &self.overview
    }
}

/// Decode every folder of a profile directory.
///
/// A missing `folders.js` means no folders. The first folder that fails to
/// decode fails the whole call.
pub(crate) fn read_folders(
    profile_dir: &Path,
    overview_keys: &KeyPair,
) -> Result<BTreeMap<String, Folder>, OpvaultError> {
    let path = profile_dir.join(FOLDERS_FILE);
    let buf = match fs::read(&path) {
        Ok(buf) => buf,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!("no folders.js, vault has no folders");
            return Ok(BTreeMap::new());
        }
        Err(e) => return Err(OpvaultError::io(&path, e)),
    };

    let records: BTreeMap<String, FolderRecord> = FOLDERS.parse(&buf, FOLDERS_FILE)?;
    let mut folders = BTreeMap::new();
    for (uuid, record) in records {
        let folder = Folder::decode(&uuid, record, overview_keys).map_err(|e| e.in_folder(&uuid))?;
        folders.insert(uuid, folder);
    }

    debug!(count = folders.len(), "folders decoded");
    Ok(folders)
}
