// ============================================
// File: crates/ferrolink-core/src/crypto/record.rs
// ============================================
//! # Record Codec
//!
//! ## Creation Reason
//! Seals plaintext into authenticated records and opens received records,
//! implementing the secure connection's wire unit.
//!
//! ## Record Format
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ running_total (u64_be, 8 bytes)   │ outside the MAC          │
//! ├──────────────────────────────────────────────────────────────┤
//! │ iv (16 bytes, random)             │ ← MAC coverage starts    │
//! ├──────────────────────────────────────────────────────────────┤
//! │ ciphertext (AES-256-CBC, PKCS#7)  │   multiple of 16 bytes   │
//! ├──────────────────────────────────────────────────────────────┤
//! │ hmac_tag (32 bytes)               │ HMAC-SHA256(iv ║ ct)     │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//! `running_total` is the sender's cumulative count of iv+ciphertext bytes,
//! inclusive of this record. It is NOT covered by the MAC; the receiver's
//! equality check against its own counter is what binds record order.
//!
//! ## ⚠️ Important Note for Next Developer
//! - PKCS#7 padding always adds a full block for block-aligned plaintext;
//!   do not "optimize" this away, the peer depends on it
//! - MAC verification is constant-time and happens before decryption
//!
//! ## Last Modified
//! v0.1.0 - Initial record codec

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;

use crate::crypto::keys::SessionKeySet;
use crate::crypto::primitives::HmacSha256;
use crate::crypto::{
    AES_BLOCK_SIZE, MIN_RECORD_SIZE, RECORD_HEADER_SIZE, RECORD_IV_SIZE, RECORD_MAC_SIZE,
};
use crate::error::{CoreError, Result};

type Aes256CbcEncryptor = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDecryptor = cbc::Decryptor<aes::Aes256>;

// ============================================
// Size Helpers
// ============================================

/// Ciphertext length for `plaintext_len` bytes: PKCS#7 always pads, so a
/// block-aligned plaintext still grows by a full block.
#[must_use]
pub const fn ciphertext_len(plaintext_len: usize) -> usize {
    (plaintext_len / AES_BLOCK_SIZE + 1) * AES_BLOCK_SIZE
}

/// MAC-covered byte count of a record (iv plus ciphertext).
#[must_use]
pub const fn mac_covered_len(plaintext_len: usize) -> u64 {
    (RECORD_IV_SIZE + ciphertext_len(plaintext_len)) as u64
}

// ============================================
// Seal (send direction)
// ============================================

/// Seals `plaintext` into a record.
///
/// `running_total_after` must be the sender's cumulative iv+ciphertext byte
/// count including this record; the caller owns that counter.
///
/// # Errors
/// Returns `Crypto` if a primitive fails to initialize.
pub fn seal(keys: &SessionKeySet, running_total_after: u64, plaintext: &[u8]) -> Result<Vec<u8>> {
    let mut iv = [0u8; RECORD_IV_SIZE];
    OsRng.fill_bytes(&mut iv);

    let encryptor = Aes256CbcEncryptor::new_from_slices(&keys.my_crypto_key, &iv)
        .map_err(|_| CoreError::crypto("cipher setup failed"))?;
    let ciphertext = encryptor.encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    debug_assert_eq!(ciphertext.len(), ciphertext_len(plaintext.len()));

    let mut frame = Vec::with_capacity(
        RECORD_HEADER_SIZE + RECORD_IV_SIZE + ciphertext.len() + RECORD_MAC_SIZE,
    );
    frame.extend_from_slice(&running_total_after.to_be_bytes());
    frame.extend_from_slice(&iv);
    frame.extend_from_slice(&ciphertext);

    let mut mac = HmacSha256::new(&keys.my_hmac_key)?;
    mac.update(&frame[RECORD_HEADER_SIZE..]);
    frame.extend_from_slice(&mac.finalize());

    Ok(frame)
}

// ============================================
// Open (receive direction)
// ============================================

/// Extracts the running total a record declares.
///
/// # Errors
/// Returns `MalformedFrame` if the record is shorter than the minimum
/// structurally valid size.
pub fn declared_running_total(frame: &[u8]) -> Result<u64> {
    if frame.len() < MIN_RECORD_SIZE {
        return Err(CoreError::malformed_frame(format!(
            "record of {} bytes is below the {MIN_RECORD_SIZE}-byte minimum",
            frame.len()
        )));
    }
    let header: [u8; RECORD_HEADER_SIZE] = frame[..RECORD_HEADER_SIZE]
        .try_into()
        .expect("length checked above");
    Ok(u64::from_be_bytes(header))
}

/// Verifies and decrypts a record, returning its plaintext.
///
/// The caller must have already validated the declared running total
/// against its local counter; this function handles MAC verification and
/// decryption only.
///
/// # Errors
/// - `MalformedFrame` on structural violations
/// - `MacInvalid` if the tag does not verify
pub fn open(keys: &SessionKeySet, frame: &[u8]) -> Result<Vec<u8>> {
    if frame.len() < MIN_RECORD_SIZE {
        return Err(CoreError::malformed_frame(format!(
            "record of {} bytes is below the {MIN_RECORD_SIZE}-byte minimum",
            frame.len()
        )));
    }
    let body = &frame[RECORD_HEADER_SIZE..frame.len() - RECORD_MAC_SIZE];
    let tag = &frame[frame.len() - RECORD_MAC_SIZE..];

    let mut mac = HmacSha256::new(&keys.peer_hmac_key)?;
    mac.update(body);
    if !mac.verify(tag) {
        return Err(CoreError::MacInvalid);
    }

    let iv = &body[..RECORD_IV_SIZE];
    let ciphertext = &body[RECORD_IV_SIZE..];
    if ciphertext.is_empty() || ciphertext.len() % AES_BLOCK_SIZE != 0 {
        return Err(CoreError::malformed_frame(format!(
            "ciphertext of {} bytes is not a positive multiple of the block size",
            ciphertext.len()
        )));
    }

    let decryptor = Aes256CbcDecryptor::new_from_slices(&keys.peer_crypto_key, iv)
        .map_err(|_| CoreError::crypto("cipher setup failed"))?;
    decryptor
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CoreError::malformed_frame("invalid padding"))
}

// ============================================
// Tests
// ============================================
