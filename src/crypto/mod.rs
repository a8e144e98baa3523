//! Payload encryption for the location protocol.
//!
//! This module provides:
//! - AES-128-CBC payload encryption (unpadded; the wire format pads)
//! - Per-user payload keys with zeroizing storage
//! - Sealed-packet helpers combining the codec and cipher steps

mod envelope;
mod payload;

pub use envelope::{open_request, open_response, seal_request, seal_response};
pub use payload::{decrypt_payload, encrypt_payload, PayloadKey, KEY_SIZE};

use crate::protocol::IV_SIZE;

/// Generate a random initialization vector.
pub fn generate_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    rand::RngCore::fill_bytes(&mut rand::rngs::OsRng, &mut iv);
    iv
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_iv() {
        let a = generate_iv();
        let b = generate_iv();
        assert_ne!(a, b);
    }
}
