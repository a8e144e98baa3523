//! AES-128-CBC payload encryption.

use std::fmt;

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;
use crate::protocol::{BLOCK_SIZE, IV_SIZE};

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;

/// Key size for AES-128.
pub const KEY_SIZE: usize = 16;

/// Symmetric key shared between one user and the server.
///
/// Key material is wiped when the value is dropped and never appears
/// in `Debug` output.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct PayloadKey([u8; KEY_SIZE]);

impl PayloadKey {
    /// Create from raw bytes.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes (use with caution).
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for PayloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayloadKey([REDACTED])")
    }
}

/// Encrypt a payload region in place.
///
/// `payload` is the padded payload of a packet, excluding the cleartext
/// header and the trailing checksum. Its length must be a multiple of
/// the cipher block size; the wire encoder guarantees this.
pub fn encrypt_payload(
    key: &PayloadKey,
    iv: &[u8; IV_SIZE],
    payload: &mut [u8],
) -> Result<(), CryptoError> {
    if payload.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::UnalignedBuffer {
            len: payload.len(),
        });
    }

    let len = payload.len();
    Aes128CbcEnc::new(key.as_bytes().into(), iv.into())
        .encrypt_padded_mut::<NoPadding>(payload, len)
        .map_err(|_| CryptoError::EncryptionFailed("block alignment".into()))?;
    Ok(())
}

/// Decrypt a payload region in place.
pub fn decrypt_payload(
    key: &PayloadKey,
    iv: &[u8; IV_SIZE],
    payload: &mut [u8],
) -> Result<(), CryptoError> {
    if payload.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::UnalignedBuffer {
            len: payload.len(),
        });
    }

    Aes128CbcDec::new(key.as_bytes().into(), iv.into())
        .decrypt_padded_mut::<NoPadding>(payload)
        .map_err(|_| CryptoError::DecryptionFailed("block alignment".into()))?;
    Ok(())
}
