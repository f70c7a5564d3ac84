//! Textual wrappers around the vault's JSON files, and timestamp handling.
//!
//! The `.js` files in a profile directory are JSON wrapped in just enough
//! JavaScript to be loaded by a browser:
//!
//! ```text
//! profile.js   var profile={...};
//! band_0.js    ld({...});
//! folders.js   loadFolders({...});
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::error::OpvaultError;

/// A prefix/suffix pair wrapped around a JSON document.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Wrapper {
    pub name: &'static str,
    pub prefix: &'static [u8],
    pub suffix: &'static [u8],
}

pub(crate) const PROFILE: Wrapper = Wrapper {
    name: "profile.js",
    prefix: b"var profile=",
    suffix: b";",
};

pub(crate) const BAND: Wrapper = Wrapper {
    name: "band file",
    prefix: b"ld(",
    suffix: b");",
};

pub(crate) const FOLDERS: Wrapper = Wrapper {
    name: "folders.js",
    prefix: b"loadFolders(",
    suffix: b");",
};

impl Wrapper {
    /// Return the JSON between prefix and suffix.
    ///
    /// Whitespace after the suffix is tolerated; anything else is not.
    pub fn strip<'a>(&self, buf: &'a [u8]) -> Result<&'a [u8], OpvaultError> {
        let inner = buf
            .strip_prefix(self.prefix)
            .ok_or_else(|| OpvaultError::invalid(format!("{} has no expected prefix", self.name)))?;
        inner
            .trim_ascii_end()
            .strip_suffix(self.suffix)
            .ok_or_else(|| OpvaultError::invalid(format!("{} has no expected suffix", self.name)))
    }

    /// Strip the wrapper and deserialize the JSON inside.
    pub fn parse<T: DeserializeOwned>(&self, buf: &[u8], context: &str) -> Result<T, OpvaultError> {
        let json = self.strip(buf)?;
        serde_json::from_slice(json).map_err(|e| OpvaultError::json(context, e))
    }
}

/// Convert a Unix timestamp in seconds to UTC.
pub(crate) fn timestamp(secs: i64, what: &str) -> Result<DateTime<Utc>, OpvaultError> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| OpvaultError::invalid(format!("{what} timestamp out of range")))
}

/// List the regular files in `dir` whose name satisfies `keep`, sorted.
///
/// Names that are not valid UTF-8 are skipped.
pub(crate) fn files_matching(
    dir: &Path,
    keep: impl Fn(&str) -> bool,
) -> Result<Vec<PathBuf>, OpvaultError> {
    let entries = fs::read_dir(dir).map_err(|e| OpvaultError::io(dir, e))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| OpvaultError::io(dir, e))?;
        let is_file = entry
            .file_type()
            .map_err(|e| OpvaultError::io(entry.path(), e))?
            .is_file();
        let wanted = entry.file_name().to_str().is_some_and(&keep);
        if is_file && wanted {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}
