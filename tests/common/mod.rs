//! Builds complete vaults on disk for the integration tests.
//!
//! The fixture mirrors a real vault: PBKDF2 profile, master and overview
//! key blobs, wrapped per-item keys, several bands, a folder index and
//! attachment files.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};

use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ring::rand::{SecureRandom, SystemRandom};
use ring::{digest, hmac, pbkdf2};
use serde_json::{json, Value};
use tempfile::TempDir;

pub const PASSWORD: &str = "freddy";
pub const ITERATIONS: u32 = 1_000;
pub const FOLDER_COUNT: usize = 3;
pub const ITEM_COUNT: usize = 29;

const CATEGORIES: [&str; 6] = ["001", "002", "003", "004", "005", "101"];

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// Raw (encryption, HMAC) halves.
#[derive(Clone)]
pub struct Keys {
    pub enc: [u8; 32],
    pub mac: [u8; 32],
}

impl Keys {
    fn from_64(bytes: &[u8]) -> Self {
        let mut enc = [0u8; 32];
        let mut mac = [0u8; 32];
        enc.copy_from_slice(&bytes[..32]);
        mac.copy_from_slice(&bytes[32..64]);
        Self { enc, mac }
    }

    pub fn random() -> Self {
        Self::from_64(&random_bytes(64))
    }

    pub fn to_pair(&self) -> opvault::KeyPair {
        opvault::KeyPair::new(self.enc, self.mac)
    }
}

/// What the fixture wrote for one item.
pub struct ExpectedItem {
    pub title: String,
    pub password: String,
    pub category: String,
    pub folder: Option<String>,
    pub attachments: BTreeMap<String, Vec<u8>>,
}

pub struct Fixture {
    pub dir: TempDir,
    pub overview: Keys,
    pub master: Keys,
    pub items: BTreeMap<String, ExpectedItem>,
    pub folders: BTreeMap<String, String>,
}

impl Fixture {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn profile_dir(&self) -> PathBuf {
        self.dir.path().join("default")
    }

    pub fn open(&self) -> opvault::Vault {
        opvault::open(self.path()).unwrap()
    }

    pub fn unlocked(&self) -> opvault::Vault {
        let vault = self.open();
        vault.unlock(PASSWORD).unwrap();
        vault
    }

    /// Uuids of items that own at least one attachment.
    pub fn items_with_attachments(&self) -> Vec<&str> {
        self.items
            .iter()
            .filter(|(_, item)| !item.attachments.is_empty())
            .map(|(uuid, _)| uuid.as_str())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Encoders
// ---------------------------------------------------------------------------

pub fn random_bytes(n: usize) -> Vec<u8> {
    let mut buf = vec![0u8; n];
    SystemRandom::new().fill(&mut buf).unwrap();
    buf
}

pub fn b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

fn cbc_encrypt(key: &[u8; 32], iv: &[u8], data: &[u8]) -> Vec<u8> {
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

/// An opdata block in binary form. `tagged` controls the magic.
pub fn opdata_bytes(keys: &Keys, plaintext: &[u8], tagged: bool) -> Vec<u8> {
    let mut padded = random_bytes(16 - plaintext.len() % 16);
    padded.extend_from_slice(plaintext);
    let iv = random_bytes(16);

    let mut out = if tagged {
        b"opdata01".to_vec()
    } else {
        vec![0u8; 8]
    };
    out.extend_from_slice(&(plaintext.len() as u64).to_le_bytes());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&cbc_encrypt(&keys.enc, &iv, &padded));
    let tag = sign(&keys.mac, &out);
    out.extend_from_slice(&tag);
    out
}

pub fn opdata(keys: &Keys, plaintext: &[u8]) -> String {
    b64(&opdata_bytes(keys, plaintext, true))
}

fn wrap_key(master: &Keys, item: &Keys) -> String {
    let iv = random_bytes(16);
    let mut secret = item.enc.to_vec();
    secret.extend_from_slice(&item.mac);
    let mut out = iv.clone();
    out.extend_from_slice(&cbc_encrypt(&master.enc, &iv, &secret));
    let tag = sign(&master.mac, &out);
    out.extend_from_slice(&tag);
    b64(&out)
}

fn level_keys(secret: &[u8]) -> Keys {
    Keys::from_64(digest::digest(&digest::SHA512, secret).as_ref())
}

fn unlock_keys(password: &str, salt: &[u8]) -> Keys {
    let mut out = [0u8; 64];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA512,
        NonZeroU32::new(ITERATIONS).unwrap(),
        salt,
        password.as_bytes(),
        &mut out,
    );
    Keys::from_64(&out)
}

fn attachment_file(metadata: &Value, icon: &[u8], content: &[u8]) -> Vec<u8> {
    let metadata = metadata.to_string().into_bytes();
    let mut buf = b"OPCLDAT".to_vec();
    buf.push(1);
    buf.extend_from_slice(&(metadata.len() as u16).to_le_bytes());
    buf.extend_from_slice(&[0, 0]);
    buf.extend_from_slice(&(icon.len() as u32).to_le_bytes());
    buf.extend_from_slice(&metadata);
    buf.extend_from_slice(icon);
    buf.extend_from_slice(content);
    buf
}

// ---------------------------------------------------------------------------
// Vault
// ---------------------------------------------------------------------------

/// Write a vault unlocked by [`PASSWORD`] with [`FOLDER_COUNT`] folders and
/// [`ITEM_COUNT`] items spread over three bands. Items 3 and 17 carry
/// attachments.
pub fn build_vault() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let profile_dir = dir.path().join("default");
    fs::create_dir_all(&profile_dir).unwrap();

    // Profile.
    let salt = random_bytes(16);
    let unlock = unlock_keys(PASSWORD, &salt);
    let master_secret = random_bytes(256);
    let overview_secret = random_bytes(64);
    let master = level_keys(&master_secret);
    let overview = level_keys(&overview_secret);

    let profile = json!({
        "uuid": "2B894A18997C4638BACC55F2D56A4890",
        "lastUpdatedBy": "Dropbox",
        "profileName": "default",
        "passwordHint": "",
        "salt": b64(&salt),
        "masterKey": opdata(&unlock, &master_secret),
        "overviewKey": opdata(&unlock, &overview_secret),
        "iterations": ITERATIONS,
        "createdAt": 1_373_753_414,
        "updatedAt": 1_373_754_128,
    });
    fs::write(profile_dir.join("profile.js"), format!("var profile={profile};")).unwrap();

    // Folders.
    let mut folders = BTreeMap::new();
    let mut folder_records = serde_json::Map::new();
    for (i, title) in ["Work", "Personal", "Recently Used"].iter().enumerate() {
        let uuid = format!("F{:031X}", i + 1);
        let smart = i == 2;
        folder_records.insert(
            uuid.clone(),
            json!({
                "uuid": uuid,
                "overview": opdata(&overview, json!({"title": title}).to_string().as_bytes()),
                "smart": smart,
                "tx": 1_373_754_200 + i as i64,
                "created": 1_373_754_100,
                "updated": 1_373_754_150,
            }),
        );
        folders.insert(uuid, title.to_string());
    }
    fs::write(
        profile_dir.join("folders.js"),
        format!("loadFolders({});", Value::Object(folder_records)),
    )
    .unwrap();

    // Items.
    let folder_uuids: Vec<String> = folders.keys().cloned().collect();
    let mut items = BTreeMap::new();
    let mut bands: BTreeMap<char, serde_json::Map<String, Value>> = BTreeMap::new();
    for i in 0..ITEM_COUNT {
        let band = ['0', 'A', 'F'][i % 3];
        let uuid = format!("{band}{:031X}", 0x1000 + i);
        let item_keys = Keys::random();
        let key_raw = wrap_key(&master, &item_keys);

        let title = format!("Item {i}");
        let password = format!("pw-{i}-{}", b64(&random_bytes(6)));
        let category = CATEGORIES[i % CATEGORIES.len()].to_string();
        let folder = (i % 4 == 0).then(|| folder_uuids[(i / 4) % 2].clone());

        let overview_json = json!({
            "title": title,
            "url": format!("https://site{i}.example"),
            "URLs": [{"u": format!("https://site{i}.example")}],
            "tags": ["fixture"],
            "ainfo": "freddy",
        });
        let detail_json = json!({
            "fields": [
                {"designation": "username", "name": "username", "type": "T", "value": "freddy"},
                {"designation": "password", "name": "password", "type": "P", "value": password},
            ],
            "notesPlain": format!("note {i}"),
        });

        let mut record = json!({
            "uuid": uuid,
            "category": category,
            "k": key_raw,
            "o": opdata(&overview, overview_json.to_string().as_bytes()),
            "d": opdata(&item_keys, detail_json.to_string().as_bytes()),
            "hmac": b64(&random_bytes(32)),
            "tx": 1_373_754_300 + i as i64,
            "created": 1_373_754_000 + i as i64,
            "updated": 1_373_755_000 + i as i64,
            "trashed": i == 28,
        });
        if let Some(f) = &folder {
            record["folder"] = json!(f);
        }
        if i % 5 == 0 {
            record["fave"] = json!(100 + i);
        }

        let mut attachments = BTreeMap::new();
        let sizes: &[usize] = match i {
            3 => &[1_000, 4_096],
            17 => &[33],
            _ => &[],
        };
        for (n, &size) in sizes.iter().enumerate() {
            let att_uuid = format!("{:032X}", 0xA000 + i * 16 + n);
            let content = random_bytes(size);
            let metadata = json!({
                "uuid": att_uuid,
                "itemUUID": uuid,
                "contentsSize": size,
                "external": false,
                "txTimestamp": 1_373_756_000,
                "overview": opdata(&overview, json!({"filename": format!("file{n}.bin")}).to_string().as_bytes()),
                "createdAt": 1_373_756_000,
                "updatedAt": 1_373_756_001,
            });
            let file = attachment_file(
                &metadata,
                &random_bytes(24),
                &opdata_bytes(&item_keys, &content, false),
            );
            fs::write(profile_dir.join(format!("{uuid}_{att_uuid}.attachment")), file).unwrap();
            attachments.insert(att_uuid, content);
        }

        bands.entry(band).or_default().insert(uuid.clone(), record);
        items.insert(
            uuid,
            ExpectedItem {
                title,
                password,
                category,
                folder,
                attachments,
            },
        );
    }
    for (band, records) in bands {
        fs::write(
            profile_dir.join(format!("band_{band}.js")),
            format!("ld({});", Value::Object(records)),
        )
        .unwrap();
    }

    Fixture {
        dir,
        overview,
        master,
        items,
        folders,
    }
}

/// Rewrite one band file through `edit`, which receives the parsed records.
pub fn edit_band(fixture: &Fixture, band: char, edit: impl FnOnce(&mut serde_json::Map<String, Value>)) {
    let path = fixture.profile_dir().join(format!("band_{band}.js"));
    let text = fs::read_to_string(&path).unwrap();
    let json = text.strip_prefix("ld(").unwrap().strip_suffix(");").unwrap();
    let mut records: serde_json::Map<String, Value> = serde_json::from_str(json).unwrap();
    edit(&mut records);
    fs::write(&path, format!("ld({});", Value::Object(records))).unwrap();
}

/// Decoded length of a base64 field.
pub fn b64_len(raw: &str) -> usize {
    STANDARD.decode(raw).unwrap().len()
}

/// Flip one bit of a base64 opdata field.
pub fn flip_bit(raw: &str, byte: usize) -> String {
    let mut bytes = STANDARD.decode(raw).unwrap();
    bytes[byte] ^= 0x01;
    b64(&bytes)
}
