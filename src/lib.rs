//! # Trilat
//!
//! Core protocol library for beacon-based location resolution.
//!
//! Trilat implements the wire format, payload encryption, key registry, and
//! scan caching that let low-power devices trade a radio-beacon scan (WiFi
//! access points, cell towers, BLE beacons, GPS fixes) for a position fix
//! from a location server, over any byte transport the caller provides.
//!
//! ## Architecture
//!
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Client Application                        │
//! ├─────────────────────────────────────────────────────────────────┤
//! │             Session (scan cache, skip-if-unmoved)               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │          Envelope (seal / open, key registry lookup)            │
//! ├─────────────────────────────────────────────────────────────────┤
//! │    Packet Codec (headers, typed entries, Fletcher checksum)     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                 AES-128-CBC Payload Encryption                  │
//! ├─────────────────────────────────────────────────────────────────┤
//! │            Caller Transport (Exchange trait seam)               │
//! └─────────────────────────────────────────────────────────────────┘

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow stylistic lints that don't affect correctness
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_const_for_fn)]      // Many functions can't be const due to trait bounds
#![allow(clippy::doc_markdown)]              // ASCII diagrams in docs
#![allow(clippy::unreadable_literal)]        // Checksum and key test vectors
#![allow(clippy::cast_possible_truncation)]  // Lengths are range-checked before narrowing
#![allow(clippy::cast_sign_loss)]            // Intentional for RSSI byte packing
#![allow(clippy::cast_precision_loss)]       // Acceptable for cache hit ratios
#![allow(clippy::cast_possible_wrap)]        // Intentional for sign extension
#![allow(clippy::similar_names)]             // aps/gps are intentionally named
#![allow(clippy::option_if_let_else)]        // More readable in context
#![allow(clippy::use_self)]                  // Explicit type names in matches
#![allow(clippy::redundant_pub_crate)]       // Explicit visibility
#![allow(clippy::cognitive_complexity)]      // Entry decode loops
#![allow(clippy::too_many_lines)]            // Complete implementations
#![allow(clippy::match_same_arms)]           // Explicit arm per variant is clearer
#![allow(clippy::ignored_unit_patterns)]     // Ok(_) vs Ok(()) is stylistic

pub mod cache;
pub mod config;
pub mod crypto;
pub mod error;
pub mod keys;
pub mod protocol;
pub mod session;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use protocol::{LocationRequest, LocationResponse};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Protocol version for wire compatibility
pub const PROTOCOL_VERSION: u8 = 1;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cache::{CacheConfig, ScanCache};
    pub use crate::config::Config;
    pub use crate::crypto::PayloadKey;
    pub use crate::error::{Error, Result};
    pub use crate::keys::{KeyRecord, KeyStore};
    pub use crate::protocol::{LocationRequest, LocationResponse, PacketCodec};
    pub use crate::session::{Exchange, Session};
    pub use crate::types::*;
}
