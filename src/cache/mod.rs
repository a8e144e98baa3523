//! Last-scan cache.
//!
//! Holds the access-point scan that produced the most recent location
//! fix. When the next scan looks up mostly the same beacons, the
//! device has not moved and the client can skip a server round trip.
//! The cache is a single slot: any scan that fails to match replaces
//! the previous contents wholesale.
//!
//! Contents survive restarts through a small text file. Persistence
//! failures are logged and treated as an empty cache, never surfaced
//! to the caller; the cache is an optimization, not a correctness
//! requirement.

use std::path::PathBuf;
use std::time::{Duration, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::types::{AccessPoint, DataType};

/// Most entries a cache slot can hold.
pub const DEFAULT_CAPACITY: usize = 100;

/// Fewer populated entries than this and the cache is not trusted.
pub const DEFAULT_MIN_ENTRIES: usize = 5;

/// Cache contents older than this are discarded.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(3600);

/// Largest tolerated fraction of scan records absent from the cache.
pub const DEFAULT_MATCH_THRESHOLD: f32 = 0.2;

/// Fixed name of the persisted cache file.
pub const CACHE_FILENAME: &str = "ap_scan_cache.data";

/// Scan cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Maximum entries kept from one scan.
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Minimum entries required to trust the cache.
    #[serde(default = "default_min_entries")]
    pub min_entries: usize,

    /// Maximum age before the cache goes stale.
    #[serde(default = "default_max_age", with = "humantime_serde")]
    pub max_age: Duration,

    /// Largest miss ratio still counted as "same place".
    #[serde(default = "default_match_threshold")]
    pub match_threshold: f32,

    /// Directory holding the persisted cache file. Defaults to the
    /// working directory.
    pub data_dir: Option<PathBuf>,
}

fn default_capacity() -> usize {
    DEFAULT_CAPACITY
}
fn default_min_entries() -> usize {
    DEFAULT_MIN_ENTRIES
}
fn default_max_age() -> Duration {
    DEFAULT_MAX_AGE
}
fn default_match_threshold() -> f32 {
    DEFAULT_MATCH_THRESHOLD
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            min_entries: default_min_entries(),
            max_age: default_max_age(),
            match_threshold: default_match_threshold(),
            data_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CacheEntry {
    key: Vec<u8>,
    value: Vec<u8>,
}

/// Single-slot scan cache with percentage-overlap matching.
///
/// Keys and values are fixed-width byte strings declared at
/// construction; the stock configuration caches access points with MAC
/// keys and signed RSSI values.
#[derive(Debug)]
pub struct ScanCache {
    data_type: DataType,
    key_width: usize,
    value_width: usize,
    capacity: usize,
    min_entries: usize,
    max_age: Duration,
    file: PathBuf,
    entries: Vec<CacheEntry>,
    /// Seconds since the epoch when the slot was populated.
    timestamp: u64,
    loaded: bool,
}

impl ScanCache {
    /// Create an empty cache for the given record shape.
    pub fn new(config: &CacheConfig, data_type: DataType, key_width: usize, value_width: usize) -> Self {
        debug_assert!(key_width > 0);
        debug_assert!(value_width > 0 && value_width <= 8);

        let file = config.data_dir.as_ref().map_or_else(
            || PathBuf::from(CACHE_FILENAME),
            |dir| dir.join(CACHE_FILENAME),
        );

        Self {
            data_type,
            key_width,
            value_width,
            capacity: config.capacity,
            min_entries: config.min_entries,
            max_age: config.max_age,
            file,
            entries: Vec::new(),
            timestamp: 0,
            loaded: false,
        }
    }

    /// Create a cache shaped for access-point scans: 6-byte MAC keys
    /// and 1-byte RSSI values.
    pub fn for_access_points(config: &CacheConfig) -> Self {
        Self::new(config, DataType::AccessPoint, 6, 1)
    }

    /// Record type this cache was declared for.
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Number of populated entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the slot holds no scan.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Epoch seconds when the slot was last populated. Zero when empty.
    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Look up one key, returning its stored value bytes.
    pub fn lookup(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|entry| entry.key == key)
            .map(|entry| entry.value.as_slice())
    }

    /// Replace the slot with a fresh scan and persist it.
    ///
    /// Scans longer than the capacity are truncated. Persistence
    /// failures are logged and ignored.
    pub fn populate(&mut self, aps: &[AccessPoint]) {
        let aps = &aps[..aps.len().min(self.capacity)];

        self.entries.clear();
        for ap in aps {
            self.entries.push(CacheEntry {
                key: ap.mac.as_bytes().to_vec(),
                value: ap.rssi.to_le_bytes().to_vec(),
            });
        }
        self.timestamp = unix_seconds();

        if let Err(err) = self.write_file() {
            warn!(error = %err, file = %self.file.display(), "failed to persist scan cache");
        }
    }

    /// Whether a scan overlaps the cached one closely enough.
    ///
    /// Counts how many incoming records miss the cache and compares
    /// the miss fraction against `threshold`: strictly fewer misses
    /// than the threshold fraction is a match. An empty scan never
    /// matches. Only the prefix that could have fit the slot takes
    /// part in the comparison.
    pub fn matches(&self, aps: &[AccessPoint], threshold: f32) -> bool {
        let total = aps.len().min(self.capacity);
        if total == 0 {
            return false;
        }

        let hits = aps[..total]
            .iter()
            .filter(|ap| self.lookup(ap.mac.as_bytes()).is_some())
            .count();

        let miss_ratio = (total - hits) as f32 / total as f32;
        miss_ratio < threshold
    }

    /// Decide whether `aps` is the same scan as the cached one.
    ///
    /// Returns true when the caller may reuse the previous fix and
    /// skip resolution. Every false return replaces the slot with the
    /// incoming scan, so the next identical scan will match.
    pub fn check(&mut self, aps: &[AccessPoint], threshold: f32) -> bool {
        self.ensure_loaded();

        if self.is_stale() {
            debug!(
                entries = self.entries.len(),
                age_secs = self.age().as_secs(),
                "clearing stale scan cache"
            );
            self.clear();
        }

        if self.is_empty() {
            self.populate(aps);
            return false;
        }

        if self.matches(aps, threshold) {
            debug!(entries = self.entries.len(), "scan cache matched");
            return true;
        }

        self.clear();
        self.populate(aps);
        false
    }

    /// Drop the slot contents and the persisted file.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.timestamp = 0;
        if let Err(err) = std::fs::remove_file(&self.file) {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!(error = %err, file = %self.file.display(), "failed to remove scan cache file");
            }
        }
    }

    /// Load the persisted slot from disk.
    ///
    /// A missing file leaves the cache empty and is not an error. The
    /// file's modification time stands in for the populate timestamp.
    pub fn load(&mut self) -> Result<()> {
        self.loaded = true;
        self.entries = self.read_file()?;
        self.timestamp = if self.entries.is_empty() {
            0
        } else {
            file_mtime_seconds(&self.file).unwrap_or_else(unix_seconds)
        };
        Ok(())
    }

    /// Persist the slot to disk.
    pub fn save(&self) -> Result<()> {
        self.write_file()?;
        Ok(())
    }

    fn ensure_loaded(&mut self) {
        if self.loaded {
            return;
        }
        if let Err(err) = self.load() {
            warn!(error = %err, file = %self.file.display(), "failed to load scan cache, starting empty");
            self.entries.clear();
            self.timestamp = 0;
        }
    }

    fn is_stale(&self) -> bool {
        if self.entries.is_empty() {
            return false;
        }
        self.entries.len() < self.min_entries || self.age() > self.max_age
    }

    fn age(&self) -> Duration {
        Duration::from_secs(unix_seconds().saturating_sub(self.timestamp))
    }

    fn read_file(&self) -> std::result::Result<Vec<CacheEntry>, CacheError> {
        let text = match std::fs::read_to_string(&self.file) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Vec::new());
            }
            Err(err) => return Err(err.into()),
        };

        let mut lines = text.lines();
        let count: usize = lines
            .next()
            .unwrap_or("")
            .trim()
            .parse()
            .map_err(|_| CacheError::Corrupt("bad entry count line".into()))?;

        let mut entries = Vec::new();
        for line in lines {
            let (key_hex, value_dec) = line
                .split_once(' ')
                .ok_or_else(|| CacheError::Corrupt(format!("bad entry line {line:?}")))?;

            let key = hex::decode(key_hex)
                .map_err(|_| CacheError::Corrupt(format!("bad entry key {key_hex:?}")))?;
            if key.len() != self.key_width {
                return Err(CacheError::Corrupt(format!(
                    "entry key has {} bytes, cache declares {}",
                    key.len(),
                    self.key_width
                )));
            }

            let value: i64 = value_dec
                .trim()
                .parse()
                .map_err(|_| CacheError::Corrupt(format!("bad entry value {value_dec:?}")))?;

            entries.push(CacheEntry {
                key,
                value: value.to_le_bytes()[..self.value_width].to_vec(),
            });
        }

        if entries.len() != count {
            return Err(CacheError::Corrupt(format!(
                "file declares {count} entries but holds {}",
                entries.len()
            )));
        }
        entries.truncate(self.capacity);
        Ok(entries)
    }

    fn write_file(&self) -> std::result::Result<(), CacheError> {
        let mut text = format!("{}\n", self.entries.len());
        for entry in &self.entries {
            text.push_str(&hex::encode_upper(&entry.key));
            text.push(' ');
            text.push_str(&value_to_i64(&entry.value).to_string());
            text.push('\n');
        }
        std::fs::write(&self.file, text)?;
        Ok(())
    }
}

/// Interpret fixed-width value bytes as a little-endian signed integer.
fn value_to_i64(bytes: &[u8]) -> i64 {
    let mut buf = [0u8; 8];
    buf[..bytes.len()].copy_from_slice(bytes);
    let raw = i64::from_le_bytes(buf);
    let shift = 64 - 8 * bytes.len() as u32;
    (raw << shift) >> shift
}

fn unix_seconds() -> u64 {
    crate::types::unix_millis() / 1000
}

fn file_mtime_seconds(path: &std::path::Path) -> Option<u64> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let age = modified.duration_since(UNIX_EPOCH).ok()?;
    Some(age.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Mac;

    fn scan(macs: &[[u8; 6]]) -> Vec<AccessPoint> {
        macs.iter()
            .map(|mac| AccessPoint {
                mac: Mac::new(*mac),
                rssi: -60,
            })
            .collect()
    }

    fn cache_in(dir: &std::path::Path) -> ScanCache {
        let config = CacheConfig {
            data_dir: Some(dir.to_path_buf()),
            ..CacheConfig::default()
        };
        ScanCache::for_access_points(&config)
    }

    #[test]
    fn test_value_sign_extension() {
        assert_eq!(value_to_i64(&[0xC3]), -61);
        assert_eq!(value_to_i64(&[0x05]), 5);
        assert_eq!(value_to_i64(&[0xFF, 0xFF]), -1);
        assert_eq!(value_to_i64(&0x7Fi64.to_le_bytes()), 127);
    }

    #[test]
    fn test_populate_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(dir.path());

        let aps = scan(&[[1; 6], [2; 6], [3; 6]]);
        cache.populate(&aps);

        assert_eq!(cache.len(), 3);
        assert_eq!(cache.data_type(), DataType::AccessPoint);
        assert_eq!(cache.lookup(&[2u8; 6]), Some(&[0xC4u8][..])); // -60
        assert_eq!(cache.lookup(&[9u8; 6]), None);
    }

    #[test]
    fn test_populate_truncates_to_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let config = CacheConfig {
            capacity: 4,
            data_dir: Some(dir.path().to_path_buf()),
            ..CacheConfig::default()
        };
        let mut cache = ScanCache::for_access_points(&config);

        let macs: Vec<[u8; 6]> = (0..10u8).map(|i| [i; 6]).collect();
        cache.populate(&scan(&macs));
        assert_eq!(cache.len(), 4);
        assert!(cache.lookup(&[3u8; 6]).is_some());
        assert!(cache.lookup(&[4u8; 6]).is_none());
    }

    #[test]
    fn test_matches_threshold_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(dir.path());

        let macs: Vec<[u8; 6]> = (0..10u8).map(|i| [i; 6]).collect();
        cache.populate(&scan(&macs));

        // Identical scan: miss ratio 0.
        assert!(cache.matches(&scan(&macs), 0.2));

        // Exactly the threshold fraction missing is not a match.
        let mut two_new = macs.clone();
        two_new[0] = [0xA0; 6];
        two_new[1] = [0xA1; 6];
        assert!(!cache.matches(&scan(&two_new), 0.2));

        // One record missing out of ten stays under 0.2.
        let mut one_new = macs.clone();
        one_new[0] = [0xA0; 6];
        assert!(cache.matches(&scan(&one_new), 0.2));

        // An empty scan never matches.
        assert!(!cache.matches(&[], 0.2));
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let aps = vec![
            AccessPoint {
                mac: Mac::new([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]),
                rssi: -42,
            },
            AccessPoint {
                mac: Mac::new([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x02]),
                rssi: 5,
            },
        ];

        let mut cache = cache_in(dir.path());
        cache.populate(&aps);

        let text = std::fs::read_to_string(dir.path().join(CACHE_FILENAME)).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("2"));
        assert_eq!(lines.next(), Some("DEADBEEF0001 -42"));
        assert_eq!(lines.next(), Some("DEADBEEF0002 5"));

        let mut reloaded = cache_in(dir.path());
        reloaded.load().unwrap();
        assert_eq!(reloaded.len(), 2);
        assert_eq!(
            reloaded.lookup(&[0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01]),
            Some(&[0xD6u8][..]) // -42
        );
        assert!(reloaded.timestamp() > 0);
    }

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(dir.path());
        cache.load().unwrap();
        assert!(cache.is_empty());
        assert_eq!(cache.timestamp(), 0);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();

        for bad in [
            "not a number\n",
            "1\nzz -1\n",
            "1\nAABBCCDDEEFF\n",
            "1\nAABBCC -1\n",          // key width mismatch
            "3\nAABBCCDDEEFF -1\n",    // count mismatch
            "1\nAABBCCDDEEFF abc\n",   // bad value
        ] {
            std::fs::write(dir.path().join(CACHE_FILENAME), bad).unwrap();
            let mut cache = cache_in(dir.path());
            let err = cache.load().unwrap_err();
            assert!(
                matches!(err, crate::Error::Cache(CacheError::Corrupt(_))),
                "{bad:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_clear_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = cache_in(dir.path());
        cache.populate(&scan(&[[1; 6]]));
        assert!(dir.path().join(CACHE_FILENAME).exists());

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.timestamp(), 0);
        assert!(!dir.path().join(CACHE_FILENAME).exists());

        // Clearing again with no file present stays quiet.
        cache.clear();
    }
}
