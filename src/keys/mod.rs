//! Per-user key registry.
//!
//! Keys are distributed as a line-oriented CSV file:
//!
//! ```text
//! userid,hex_aes_key,api_key[,relay_url[,relay_credential]]
//! ```
//!
//! The loader is tolerant of bad rows: a line that fails mandatory
//! field parsing is logged, counted, and skipped, so one corrupt row
//! cannot take down the whole registry. A missing or unreadable file
//! is still fatal.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{info, warn};

use crate::config::KeysConfig;
use crate::crypto::{PayloadKey, KEY_SIZE};
use crate::error::{Error, KeyStoreError, Result};

/// Longest accepted API key, matching the on-disk field width.
pub const MAX_API_KEY_LEN: usize = 128;

/// Optional forwarding target attached to a key record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relay {
    /// Relay host URL.
    pub url: String,
    /// Credential presented to the relay, when one is configured.
    pub credential: Option<String>,
}

/// One user's entry in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRecord {
    /// User ID the record is keyed under.
    pub user_id: u32,
    /// Payload cipher key.
    pub aes_key: PayloadKey,
    /// API key forwarded to the resolution backend.
    pub api_key: String,
    /// Optional relay target.
    pub relay: Option<Relay>,
}

/// Registry of key records, ordered by user ID.
///
/// Read-only after construction. Lookups never fall back to a default
/// key: an absent user ID is a hard failure for the caller.
#[derive(Debug, Default)]
pub struct KeyStore {
    records: BTreeMap<u32, KeyRecord>,
}

impl KeyStore {
    /// Load a registry from a key file.
    ///
    /// Returns the store together with the number of lines skipped as
    /// malformed. When the same user ID appears on several valid
    /// lines, the last one wins.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<(Self, usize)> {
        let file = File::open(path.as_ref())?;
        let reader = BufReader::new(file);

        let mut records = BTreeMap::new();
        let mut skipped = 0usize;

        for (idx, line) in reader.lines().enumerate() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            match parse_record(&line) {
                Ok(record) => {
                    records.insert(record.user_id, record);
                }
                Err(err) => {
                    warn!(line = idx + 1, error = %err, "skipping malformed key record");
                    skipped += 1;
                }
            }
        }

        info!(records = records.len(), skipped, "loaded key registry");
        Ok((Self { records }, skipped))
    }

    /// Load the registry named by a `[keys]` config section.
    ///
    /// A section without a `key_file` is a configuration error.
    pub fn from_config(config: &KeysConfig) -> Result<(Self, usize)> {
        let path = config
            .key_file
            .as_ref()
            .ok_or_else(|| Error::Config("no key file configured".into()))?;
        Self::load(path)
    }

    /// Build a store from records already in memory. Later records win
    /// on duplicate user IDs.
    pub fn from_records(records: Vec<KeyRecord>) -> Self {
        let mut map = BTreeMap::new();
        for record in records {
            map.insert(record.user_id, record);
        }
        Self { records: map }
    }

    /// Exact-match lookup by user ID.
    pub fn find(&self, user_id: u32) -> Option<&KeyRecord> {
        self.records.get(&user_id)
    }

    /// Number of records in the store.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Iterate records in ascending user-ID order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyRecord> {
        self.records.values()
    }

    /// Consume the store and drop every record.
    ///
    /// Key material is wiped as each record drops. Taking the store by
    /// value means no borrowed record can outlive the registry.
    pub fn unload(self) {}
}

/// Parse one CSV line into a key record.
fn parse_record(line: &str) -> std::result::Result<KeyRecord, KeyStoreError> {
    let fields: Vec<&str> = line.split(',').collect();
    if fields.len() < 3 {
        return Err(KeyStoreError::MalformedRecord(
            "missing mandatory fields".into(),
        ));
    }

    let user_id = fields[0]
        .trim()
        .parse::<u32>()
        .map_err(|_| KeyStoreError::MalformedRecord(format!("bad user id {:?}", fields[0])))?;

    let key_bytes = hex::decode(fields[1].trim())
        .map_err(|_| KeyStoreError::MalformedRecord("AES key is not valid hex".into()))?;
    if key_bytes.len() < KEY_SIZE {
        return Err(KeyStoreError::MalformedRecord(format!(
            "AES key decodes to {} bytes, need at least {KEY_SIZE}",
            key_bytes.len()
        )));
    }
    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&key_bytes[..KEY_SIZE]);

    let api_key = fields[2].trim();
    if api_key.is_empty() {
        return Err(KeyStoreError::MalformedRecord("empty API key".into()));
    }
    if api_key.len() > MAX_API_KEY_LEN {
        return Err(KeyStoreError::MalformedRecord(format!(
            "API key longer than {MAX_API_KEY_LEN} characters"
        )));
    }

    // Both relay fields are optional, but a credential field that is
    // present must not be empty.
    let relay_url = fields.get(3).map(|f| f.trim()).filter(|url| !url.is_empty());
    let credential = match fields.get(4).map(|f| f.trim()) {
        Some("") => {
            return Err(KeyStoreError::MalformedRecord(
                "empty relay credential".into(),
            ))
        }
        other => other,
    };

    Ok(KeyRecord {
        user_id,
        aes_key: PayloadKey::from_bytes(key),
        api_key: api_key.to_string(),
        relay: relay_url.map(|url| Relay {
            url: url.to_string(),
            credential: credential.map(String::from),
        }),
    })
}
