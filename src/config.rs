//! Reader configuration.

use serde::{Deserialize, Serialize};

use crate::error::OpvaultError;

/// Options for opening a vault.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// let config = opvault::VaultConfig::from_json(r#"{"load_attachments": false}"#).unwrap();
/// assert_eq!(config.profile, "default");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VaultConfig {
    /// Profile sub-directory of the vault.
    pub profile: String,
    /// Whether `items()` cross-references `*.attachment` files.
    pub load_attachments: bool,
    /// Largest PBKDF2 iteration count a profile may ask for.
    pub max_iterations: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            profile: "default".to_string(),
            load_attachments: true,
            max_iterations: 10_000_000,
        }
    }
}

impl VaultConfig {
    pub fn from_json(json: &str) -> Result<Self, OpvaultError> {
        serde_json::from_str(json).map_err(|e| OpvaultError::json("vault config", e))
    }
}
