// ============================================
// File: crates/ferrolink-core/src/crypto/primitives.rs
// ============================================
//! # Hash & MAC Primitives
//!
//! ## Creation Reason
//! Thin facades over the RustCrypto hash stack so the rest of the crate
//! speaks in fixed-size arrays instead of generic digest types.
//!
//! ## Main Functionality
//! - `sha256`: one-shot SHA-256
//! - `HmacSha256`: incremental HMAC with constant-time verification
//! - `hmac_sha256`: one-shot HMAC-SHA256
//! - `pbkdf2_sha256`: PBKDF2-HMAC-SHA256 key stretching
//!
//! ## ⚠️ Important Note for Next Developer
//! - Verification goes through `Mac::verify_slice`, which compares in
//!   constant time; never replace it with `==` on tag bytes
//!
//! ## Last Modified
//! v0.1.0 - Initial primitive facades

use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};

use crate::crypto::HASH_SIZE;
use crate::error::{CoreError, Result};

// ============================================
// SHA-256
// ============================================

/// Computes the SHA-256 digest of `data`.
#[must_use]
pub fn sha256(data: &[u8]) -> [u8; HASH_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

// ============================================
// HMAC-SHA256
// ============================================

/// Incremental HMAC-SHA256 computation.
pub struct HmacSha256 {
    mac: Hmac<Sha256>,
}

impl HmacSha256 {
    /// Creates an HMAC context keyed with `key`.
    ///
    /// # Errors
    /// Returns `Crypto` if the MAC cannot be initialized.
    pub fn new(key: &[u8]) -> Result<Self> {
        let mac = Hmac::<Sha256>::new_from_slice(key)
            .map_err(|_| CoreError::crypto("HMAC key setup failed"))?;
        Ok(Self { mac })
    }

    /// Feeds `data` into the MAC.
    pub fn update(&mut self, data: &[u8]) {
        self.mac.update(data);
    }

    /// Finalizes the MAC and returns the tag.
    #[must_use]
    pub fn finalize(self) -> [u8; HASH_SIZE] {
        self.mac.finalize().into_bytes().into()
    }

    /// Finalizes the MAC and compares against `tag` in constant time.
    #[must_use]
    pub fn verify(self, tag: &[u8]) -> bool {
        self.mac.verify_slice(tag).is_ok()
    }
}

/// One-shot HMAC-SHA256.
///
/// # Errors
/// Returns `Crypto` if the MAC cannot be initialized.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; HASH_SIZE]> {
    let mut mac = HmacSha256::new(key)?;
    mac.update(data);
    Ok(mac.finalize())
}

// ============================================
// PBKDF2-HMAC-SHA256
// ============================================

/// Stretches `secret` into `output.len()` bytes of key material.
pub fn pbkdf2_sha256(secret: &[u8], salt: &[u8], iterations: u32, output: &mut [u8]) {
    pbkdf2::pbkdf2_hmac::<Sha256>(secret, salt, iterations, output);
}

// ============================================
// Tests
// ============================================
