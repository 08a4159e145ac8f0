// ============================================
// File: crates/ferrolink-core/src/crypto/kdf.rs
// ============================================
//! # Key Schedule
//!
//! ## Creation Reason
//! Turns the agreed shared secret into the four directional session keys,
//! mirrored between the two connection roles.
//!
//! ## Main Functionality
//! - `ConnectionRole`: which end of the connection this is
//! - `xor_session_ids`: mixes both peers' session ids into the PBKDF2 salt
//! - `derive_session_keys`: PBKDF2 expansion plus role-aware split
//!
//! ## Key Schedule
//! ```text
//! salt = my_session_id XOR peer_session_id
//! okm  = PBKDF2-HMAC-SHA256(shared_secret, salt, 1024 iter, 128 bytes)
//!
//! role = Connected:  okm = my_crypto ║ peer_crypto ║ my_hmac ║ peer_hmac
//! role = Accepted:   okm = peer_crypto ║ my_crypto ║ peer_hmac ║ my_hmac
//! ```
//! Both peers read the same 128 bytes; the swapped split is what makes the
//! key sets mirror images of each other.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Session ids are fixed at 32 bytes today; the pad-to-longer branch in
//!   `xor_session_ids` is defensive and intentionally kept
//!
//! ## Last Modified
//! v0.1.0 - Initial key schedule

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::crypto::keys::SessionKeySet;
use crate::crypto::primitives::pbkdf2_sha256;
use crate::crypto::{CRYPTO_KEY_SIZE, DERIVED_KEY_MATERIAL_SIZE, PBKDF2_ITERATIONS};

// ============================================
// ConnectionRole
// ============================================

/// Which end of the connection this side is; determines the key-schedule
/// split order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionRole {
    /// The side that initiated the connection.
    Connected,
    /// The side that accepted the connection.
    Accepted,
}

impl std::fmt::Display for ConnectionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connected => write!(f, "Connected"),
            Self::Accepted => write!(f, "Accepted"),
        }
    }
}

// ============================================
// Session-ID Mixing
// ============================================

/// XORs the two session ids element-wise, padding the shorter with zeros.
///
/// Both ids are 32 bytes in the current protocol, so the padding branch is
/// unreachable in practice; it is kept so a future id-size change cannot
/// silently truncate the salt.
#[must_use]
pub fn xor_session_ids(mine: &[u8], theirs: &[u8]) -> Vec<u8> {
    let len = mine.len().max(theirs.len());
    let mut out = vec![0u8; len];
    for (i, slot) in out.iter_mut().enumerate() {
        let a = mine.get(i).copied().unwrap_or(0);
        let b = theirs.get(i).copied().unwrap_or(0);
        *slot = a ^ b;
    }
    out
}

// ============================================
// Key Derivation
// ============================================

/// Derives the session key set from the agreed shared secret.
///
/// # Arguments
/// * `shared_secret` - ECDH agreement output
/// * `salt` - XOR of both session ids (see [`xor_session_ids`])
/// * `role` - this side's connection role
#[must_use]
pub fn derive_session_keys(
    shared_secret: &[u8],
    salt: &[u8],
    role: ConnectionRole,
) -> SessionKeySet {
    let mut okm = Zeroizing::new([0u8; DERIVED_KEY_MATERIAL_SIZE]);
    pbkdf2_sha256(shared_secret, salt, PBKDF2_ITERATIONS, &mut *okm);

    let mut parts = [[0u8; CRYPTO_KEY_SIZE]; 4];
    for (part, chunk) in parts.iter_mut().zip(okm.chunks_exact(CRYPTO_KEY_SIZE)) {
        part.copy_from_slice(chunk);
    }
    let [first, second, third, fourth] = parts;

    let keys = match role {
        ConnectionRole::Connected => SessionKeySet::new(first, second, third, fourth),
        ConnectionRole::Accepted => SessionKeySet::new(second, first, fourth, third),
    };
    parts.iter_mut().for_each(|p| p.fill(0));
    keys
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_xor_session_ids_basic() {
        let a = [0b1010_1010u8; 4];
        let b = [0b0101_0101u8; 4];
        assert_eq!(xor_session_ids(&a, &b), vec![0xFF; 4]);
        assert_eq!(xor_session_ids(&a, &a), vec![0x00; 4]);
    }

    #[test]
    fn test_xor_session_ids_pads_shorter_input() {
        let long = [0x11u8, 0x22, 0x33, 0x44];
        let short = [0xFFu8];
        assert_eq!(
            xor_session_ids(&long, &short),
            vec![0xEE, 0x22, 0x33, 0x44]
        );
        assert_eq!(
            xor_session_ids(&short, &long),
            vec![0xEE, 0x22, 0x33, 0x44]
        );
    }

    #[test]
    fn test_roles_derive_mirrored_key_sets() {
        let secret = [0x42u8; 66];
        let salt = [0x17u8; 32];
        let connected = derive_session_keys(&secret, &salt, ConnectionRole::Connected);
        let accepted = derive_session_keys(&secret, &salt, ConnectionRole::Accepted);
        assert!(connected.mirrors(&accepted));
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let secret = [0x01u8; 66];
        let salt = [0x02u8; 32];
        let a = derive_session_keys(&secret, &salt, ConnectionRole::Connected);
        let b = derive_session_keys(&secret, &salt, ConnectionRole::Connected);
        assert_eq!(a, b);
    }

    #[test]
    fn test_salt_changes_keys() {
        let secret = [0x01u8; 66];
        let a = derive_session_keys(&secret, &[0x02u8; 32], ConnectionRole::Connected);
        let b = derive_session_keys(&secret, &[0x03u8; 32], ConnectionRole::Connected);
        assert_ne!(a, b);
    }
}
