//! Sealed-packet helpers.
//!
//! A sealed packet is a fully encoded frame whose payload region has
//! been encrypted in place. The cleartext header survives sealing so a
//! receiver can pick a key from the user ID and run the cipher with
//! the IV before it can read anything else.

use crate::error::{KeyStoreError, ProtocolError, Result};
use crate::keys::{KeyRecord, KeyStore};
use crate::protocol::{
    decode_request, decode_response, encode_request, encode_response, peek_user_id, LocationRequest,
    LocationResponse, PacketHeader, CHECKSUM_SIZE, HEADER_SIZE,
};

use super::payload::{decrypt_payload, encrypt_payload, PayloadKey};

/// Encode and encrypt a request into `buf`, returning the frame length.
///
/// A fresh IV is generated for every call.
pub fn seal_request(request: &LocationRequest, key: &PayloadKey, buf: &mut [u8]) -> Result<usize> {
    let iv = super::generate_iv();
    let total = encode_request(request, &iv, buf)?;
    encrypt_payload(key, &iv, &mut buf[HEADER_SIZE..total - CHECKSUM_SIZE])?;
    Ok(total)
}

/// Decrypt and decode a request frame, selecting the key by user ID.
///
/// The payload region of `buf` is decrypted in place, so the buffer
/// holds plaintext afterwards. Returns the decoded request together
/// with the key record it was sealed under, letting the caller reuse
/// the same key for the response.
pub fn open_request<'a>(
    buf: &mut [u8],
    keys: &'a KeyStore,
) -> Result<(LocationRequest, &'a KeyRecord)> {
    let user_id = peek_user_id(buf)?;
    let record = keys
        .find(user_id)
        .ok_or(KeyStoreError::KeyNotFound(user_id))?;

    decrypt_frame(buf, &record.aes_key)?;
    let request = decode_request(buf)?;
    Ok((request, record))
}

/// Encode and encrypt a response into `buf`, returning the frame length.
pub fn seal_response(
    response: &LocationResponse,
    key: &PayloadKey,
    buf: &mut [u8],
) -> Result<usize> {
    let iv = super::generate_iv();
    let total = encode_response(response, &iv, buf)?;
    encrypt_payload(key, &iv, &mut buf[HEADER_SIZE..total - CHECKSUM_SIZE])?;
    Ok(total)
}

/// Decrypt and decode a response frame with an explicit key.
///
/// Clients know their own key, so no registry lookup happens here.
pub fn open_response(buf: &mut [u8], key: &PayloadKey) -> Result<LocationResponse> {
    decrypt_frame(buf, key)?;
    decode_response(buf)
}

/// Decrypt the payload region of a frame in place.
fn decrypt_frame(buf: &mut [u8], key: &PayloadKey) -> Result<()> {
    let header = PacketHeader::decode(buf)?;
    let payload_len = usize::from(header.payload_len);
    let total = HEADER_SIZE + payload_len + CHECKSUM_SIZE;
    if buf.len() < total {
        return Err(ProtocolError::ShortBuffer {
            needed: total,
            available: buf.len(),
        }
        .into());
    }

    decrypt_payload(
        key,
        &header.iv,
        &mut buf[HEADER_SIZE..HEADER_SIZE + payload_len],
    )?;
    Ok(())
}
