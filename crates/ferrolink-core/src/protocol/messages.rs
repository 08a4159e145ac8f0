// ============================================
// File: crates/ferrolink-core/src/protocol/messages.rs
// ============================================
//! # Handshake Messages
//!
//! ## Creation Reason
//! Defines the messages exchanged during the secure-connection handshake
//! and the algorithm enumerations they advertise.
//!
//! ## Main Functionality
//! - `ProfileMessage`: session id, authentication type, algorithm sets
//! - `AgreementPublicKey`: ephemeral public key with creation time
//! - `AuthenticationMessage`: password proof hashes
//! - Algorithm enumerations (extensible; one value implemented per category)
//!
//! ## Negotiation Rule
//! For each category both peers advertise a set of `u64` identifiers; the
//! greatest value present in both sets wins. The enumerations deliberately
//! stay open: unknown identifiers travel fine on the wire, they just cannot
//! be selected by this implementation.
//!
//! ## Last Modified
//! v0.1.0 - Initial message definitions

use rand::rngs::OsRng;
use rand::RngCore;

use ferrolink_common::time::Timestamp;

// ============================================
// Constants
// ============================================

/// Size of a handshake session identifier in bytes.
pub const SESSION_ID_SIZE: usize = 32;

// ============================================
// AuthenticationType
// ============================================

/// Whether the handshake performs password-based mutual authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AuthenticationType {
    /// Anonymous handshake; confidentiality and integrity only.
    None = 0,
    /// Mutual proof-of-knowledge over a shared password set.
    Password = 1,
}

impl AuthenticationType {
    /// Converts a wire byte to an authentication type.
    #[must_use]
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::None),
            1 => Some(Self::Password),
            _ => None,
        }
    }

    /// Converts the authentication type to its wire byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

// ============================================
// Algorithm Enumerations
// ============================================

/// Key-exchange algorithms; negotiation picks the greatest common value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum KeyExchangeAlgorithm {
    /// Ephemeral ECDH over NIST P-521 with SHA-256 companions.
    EcDhP521Sha2_256 = 1,
}

/// Key-derivation algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum KeyDerivationAlgorithm {
    /// PBKDF2 over the agreed shared secret.
    Pbkdf2 = 1,
}

/// Symmetric ciphers for the record layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum CryptoAlgorithm {
    /// AES with 256-bit keys in CBC mode.
    Aes256 = 1,
}

/// Hash algorithms for MACs and digests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u64)]
pub enum HashAlgorithm {
    /// SHA-2 with 256-bit output.
    Sha2_256 = 1,
}

macro_rules! algorithm_conversions {
    ($ty:ty { $($variant:path = $value:literal),+ $(,)? }) => {
        impl $ty {
            /// Converts a wire identifier to a known algorithm.
            #[must_use]
            pub const fn from_value(value: u64) -> Option<Self> {
                match value {
                    $($value => Some($variant),)+
                    _ => None,
                }
            }

            /// Converts the algorithm to its wire identifier.
            #[must_use]
            pub const fn as_value(self) -> u64 {
                self as u64
            }
        }
    };
}

algorithm_conversions!(KeyExchangeAlgorithm {
    KeyExchangeAlgorithm::EcDhP521Sha2_256 = 1,
});
algorithm_conversions!(KeyDerivationAlgorithm {
    KeyDerivationAlgorithm::Pbkdf2 = 1,
});
algorithm_conversions!(CryptoAlgorithm { CryptoAlgorithm::Aes256 = 1 });
algorithm_conversions!(HashAlgorithm { HashAlgorithm::Sha2_256 = 1 });

// ============================================
// ProfileMessage
// ============================================

/// First handshake message: identifies the session and advertises
/// capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileMessage {
    /// Random per-connection identifier; XORed with the peer's to salt the
    /// key schedule.
    pub session_id: [u8; SESSION_ID_SIZE],
    /// Whether this side expects password authentication.
    pub authentication_type: AuthenticationType,
    /// Advertised key-exchange algorithm identifiers.
    pub key_exchange_algorithms: Vec<u64>,
    /// Advertised key-derivation algorithm identifiers.
    pub key_derivation_algorithms: Vec<u64>,
    /// Advertised cipher identifiers.
    pub crypto_algorithms: Vec<u64>,
    /// Advertised hash identifiers.
    pub hash_algorithms: Vec<u64>,
}

impl ProfileMessage {
    /// Creates a profile with a fresh random session id and this
    /// implementation's supported algorithm sets.
    #[must_use]
    pub fn new(authentication_type: AuthenticationType) -> Self {
        let mut session_id = [0u8; SESSION_ID_SIZE];
        OsRng.fill_bytes(&mut session_id);
        Self {
            session_id,
            authentication_type,
            key_exchange_algorithms: vec![KeyExchangeAlgorithm::EcDhP521Sha2_256.as_value()],
            key_derivation_algorithms: vec![KeyDerivationAlgorithm::Pbkdf2.as_value()],
            crypto_algorithms: vec![CryptoAlgorithm::Aes256.as_value()],
            hash_algorithms: vec![HashAlgorithm::Sha2_256.as_value()],
        }
    }
}

// ============================================
// AgreementPublicKey
// ============================================

/// Ephemeral agreement public key, bound to its creation time.
///
/// Peers reject keys whose creation time lies outside the freshness window
/// in either direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgreementPublicKey {
    /// When the key pair was generated (Unix seconds).
    pub creation_time: Timestamp,
    /// Key-exchange algorithm this key belongs to.
    pub algorithm_type: u64,
    /// SEC1-encoded public key point.
    pub public_key: Vec<u8>,
}

// ============================================
// AuthenticationMessage
// ============================================

/// Password proof hashes, one per (de-duplicated) configured password,
/// shuffled before transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticationMessage {
    /// HMAC-SHA256 proofs keyed by each password digest.
    pub hashes: Vec<Vec<u8>>,
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authentication_type_roundtrip() {
        assert_eq!(
            AuthenticationType::from_byte(0),
            Some(AuthenticationType::None)
        );
        assert_eq!(
            AuthenticationType::from_byte(1),
            Some(AuthenticationType::Password)
        );
        assert_eq!(AuthenticationType::from_byte(2), None);
        assert_eq!(AuthenticationType::Password.as_byte(), 1);
    }

    #[test]
    fn test_algorithm_value_roundtrip() {
        assert_eq!(
            KeyExchangeAlgorithm::from_value(1),
            Some(KeyExchangeAlgorithm::EcDhP521Sha2_256)
        );
        assert_eq!(KeyExchangeAlgorithm::from_value(99), None);
        assert_eq!(CryptoAlgorithm::Aes256.as_value(), 1);
        assert_eq!(HashAlgorithm::Sha2_256.as_value(), 1);
        assert_eq!(KeyDerivationAlgorithm::Pbkdf2.as_value(), 1);
    }

    #[test]
    fn test_fresh_profiles_have_distinct_session_ids() {
        let a = ProfileMessage::new(AuthenticationType::None);
        let b = ProfileMessage::new(AuthenticationType::None);
        assert_ne!(a.session_id, b.session_id);
        assert_eq!(a.key_exchange_algorithms, vec![1]);
    }
}
