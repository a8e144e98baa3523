//! Error types for Trilat.

use std::io;

use thiserror::Error;

/// Result type alias for Trilat operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for Trilat.
#[derive(Error, Debug)]
pub enum Error {
    // Wire protocol errors
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // Payload encryption errors
    #[error("cryptographic error: {0}")]
    Crypto(#[from] CryptoError),

    // Key store errors
    #[error("key store error: {0}")]
    KeyStore(#[from] KeyStoreError),

    // Scan cache errors
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    // Configuration errors
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // General errors
    #[error("internal error: {0}")]
    Internal(String),
}

/// Wire encoding and decoding errors.
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("buffer truncated: needed {needed} bytes, {available} available")]
    ShortBuffer { needed: usize, available: usize },

    #[error("output buffer too small: needed {needed} bytes, {available} available")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("checksum mismatch")]
    ChecksumMismatch,

    #[error("unknown payload type: {0}")]
    UnknownPayloadType(u8),

    #[error("payload type {0} not valid here")]
    UnsupportedPayloadType(u8),

    #[error("unknown data entry type: {0}")]
    UnknownDataType(u8),

    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("too many records for entry type {tag}: {count} (max 255)")]
    EntryOverflow { tag: u8, count: usize },

    #[error("invalid length for entry type {tag}: {len} bytes")]
    InvalidEntryLength { tag: u8, len: u8 },

    #[error("malformed packet: {0}")]
    MalformedPacket(String),
}

/// Payload encryption and decryption errors.
#[derive(Error, Debug)]
pub enum CryptoError {
    #[error("encryption failed: {0}")]
    EncryptionFailed(String),

    #[error("decryption failed: {0}")]
    DecryptionFailed(String),

    #[error("payload length {len} is not a multiple of the cipher block size")]
    UnalignedBuffer { len: usize },
}

/// Key registry errors.
#[derive(Error, Debug)]
pub enum KeyStoreError {
    #[error("no key registered for user {0}")]
    KeyNotFound(u32),

    #[error("malformed key record: {0}")]
    MalformedRecord(String),
}

/// Scan cache persistence errors.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache IO error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt cache file: {0}")]
    Corrupt(String),
}

impl Error {
    /// Check if the error means the peer sent bytes we cannot accept.
    ///
    /// A server drops such packets and answers with a gateway error rather
    /// than tearing anything down.
    pub fn is_malformed_packet(&self) -> bool {
        matches!(
            self,
            Error::Protocol(_)
                | Error::Crypto(CryptoError::DecryptionFailed(_))
                | Error::Crypto(CryptoError::UnalignedBuffer { .. })
        )
    }

    /// Check if the error means the sender is not in the key registry.
    pub fn is_unknown_user(&self) -> bool {
        matches!(self, Error::KeyStore(KeyStoreError::KeyNotFound(_)))
    }
}
