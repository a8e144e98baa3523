//! Caching client session.
//!
//! One session per device. The session owns the last-scan cache and
//! decides, before any bytes move, whether the current scan already
//! has an answer: a scan that matches the previous one means the
//! device has not moved, and the caller can reuse its last fix
//! instead of paying for a round trip.

use tracing::debug;

use crate::cache::{CacheConfig, ScanCache};
use crate::config::Config;
use crate::crypto::{open_response, seal_request, PayloadKey};
use crate::error::Result;
use crate::protocol::{LocationRequest, LocationResponse};
use crate::types::AccessPoint;

/// Transport seam for one request/response exchange.
///
/// The core owns no sockets; callers supply whatever moves the bytes.
pub trait Exchange {
    /// Send a sealed request frame and return the raw response frame.
    fn round_trip(&mut self, frame: &[u8]) -> Result<Vec<u8>>;
}

/// Per-device session state: one scan cache plus its match threshold.
pub struct Session {
    cache: ScanCache,
    match_threshold: f32,
}

impl Session {
    /// Create a session with a fresh access-point cache.
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            cache: ScanCache::for_access_points(config),
            match_threshold: config.match_threshold,
        }
    }

    /// Create a session from a loaded configuration file.
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.cache)
    }

    /// Whether `aps` is the same scan this session last resolved.
    ///
    /// Every no-match replaces the cache contents with `aps`, so the
    /// next identical scan matches.
    pub fn check_scan(&mut self, aps: &[AccessPoint]) -> bool {
        self.cache.check(aps, self.match_threshold)
    }

    /// Resolve a location request, consulting the scan cache first.
    ///
    /// Returns `Ok(None)` when the scan matches the cached one and the
    /// caller should reuse its previous fix. Otherwise the request is
    /// sealed with `key`, exchanged over `transport`, and the opened
    /// response returned. A response carrying an error code clears the
    /// cache, forcing the next scan to round-trip again.
    pub fn query<T: Exchange>(
        &mut self,
        request: &LocationRequest,
        key: &PayloadKey,
        transport: &mut T,
    ) -> Result<Option<LocationResponse>> {
        if self.check_scan(&request.access_points) {
            debug!(
                user_id = request.user_id,
                "scan cache matched, skipping round trip"
            );
            return Ok(None);
        }

        let mut buf = vec![0u8; request.encoded_len()];
        let len = seal_request(request, key, &mut buf)?;
        let mut reply = transport.round_trip(&buf[..len])?;
        let response = open_response(&mut reply, key)?;

        if response.is_error() {
            debug!(
                user_id = request.user_id,
                payload_type = %response.payload_type,
                "location unresolved, clearing scan cache"
            );
            self.cache.clear();
        }

        Ok(Some(response))
    }

    /// Read access to the session's scan cache.
    pub fn cache(&self) -> &ScanCache {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{open_request, seal_response};
    use crate::keys::{KeyRecord, KeyStore};
    use crate::types::{Location, Mac, PayloadType};

    /// In-process server: opens the request, answers with a canned
    /// location or failure code.
    struct MockServer {
        store: KeyStore,
        fail_with: Option<PayloadType>,
        calls: usize,
    }

    impl MockServer {
        fn new(user_id: u32, key: &PayloadKey) -> Self {
            Self {
                store: KeyStore::from_records(vec![KeyRecord {
                    user_id,
                    aes_key: key.clone(),
                    api_key: "mock".into(),
                    relay: None,
                }]),
                fail_with: None,
                calls: 0,
            }
        }
    }

    impl Exchange for MockServer {
        fn round_trip(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
            self.calls += 1;
            let mut buf = frame.to_vec();
            let (request, record) = open_request(&mut buf, &self.store)?;

            let response = match self.fail_with {
                Some(kind) => LocationResponse::failure(&request, kind),
                None => LocationResponse::success(
                    &request,
                    Location {
                        lat: 37.7749,
                        lon: -122.4194,
                        hpe: 25.0,
                    },
                ),
            };

            let mut out = vec![0u8; response.encoded_len()?];
            let len = seal_response(&response, &record.aes_key, &mut out)?;
            out.truncate(len);
            Ok(out)
        }
    }

    fn scan_request(user_id: u32, macs: &[[u8; 6]]) -> LocationRequest {
        let mut request = LocationRequest::new(user_id, Mac::new([0xCC; 6]));
        request.access_points = macs
            .iter()
            .map(|mac| AccessPoint {
                mac: Mac::new(*mac),
                rssi: -58,
            })
            .collect();
        request
    }

    fn session_in(dir: &std::path::Path) -> Session {
        Session::new(&CacheConfig {
            data_dir: Some(dir.to_path_buf()),
            ..CacheConfig::default()
        })
    }

    #[test]
    fn test_query_then_cache_hit() {
        let dir = tempfile::tempdir().unwrap();
        let key = PayloadKey::from_bytes([7u8; 16]);
        let mut server = MockServer::new(33, &key);
        let mut session = session_in(dir.path());

        let macs: Vec<[u8; 6]> = (0..10u8).map(|i| [i; 6]).collect();
        let request = scan_request(33, &macs);

        let first = session.query(&request, &key, &mut server).unwrap();
        assert!(first.unwrap().location.is_some());
        assert_eq!(server.calls, 1);

        // Same scan again: no bytes move.
        let second = session.query(&request, &key, &mut server).unwrap();
        assert!(second.is_none());
        assert_eq!(server.calls, 1);

        // Mostly new beacons force a fresh round trip.
        let moved: Vec<[u8; 6]> = (40..50u8).map(|i| [i; 6]).collect();
        let third = session
            .query(&scan_request(33, &moved), &key, &mut server)
            .unwrap();
        assert!(third.is_some());
        assert_eq!(server.calls, 2);
    }

    #[test]
    fn test_error_response_clears_cache() {
        let dir = tempfile::tempdir().unwrap();
        let key = PayloadKey::from_bytes([7u8; 16]);
        let mut server = MockServer::new(33, &key);
        server.fail_with = Some(PayloadType::LocationApiError);
        let mut session = session_in(dir.path());

        let macs: Vec<[u8; 6]> = (0..10u8).map(|i| [i; 6]).collect();
        let request = scan_request(33, &macs);

        let response = session.query(&request, &key, &mut server).unwrap();
        assert!(response.unwrap().is_error());
        assert!(session.cache().is_empty());

        // The identical scan must round-trip again, not hit the cache.
        let response = session.query(&request, &key, &mut server).unwrap();
        assert!(response.is_some());
        assert_eq!(server.calls, 2);
    }
}
