// ============================================
// File: crates/ferrolink-core/src/crypto/keys.rs
// ============================================
//! # Cryptographic Key Types
//!
//! ## Creation Reason
//! Defines the key material used by the secure connection with proper
//! security properties (zeroize on drop, redacted debug output).
//!
//! ## Main Functionality
//! - `AgreementKeyPair`: ephemeral ECDH P-521 key pair, single-use
//! - `SessionKeySet`: the four directional keys the record layer runs on
//!
//! ## Key Lifecycle
//! ```text
//! AgreementKeyPair (per handshake)
//!   ├─ generated fresh, creation time travels with the public key
//!   ├─ consumed by `exchange` - the private scalar cannot be reused
//!   └─ shared secret feeds the PBKDF2 key schedule
//!
//! SessionKeySet (per connection)
//!   ├─ derived by the key schedule, mirrored between the two roles
//!   └─ zeroed on drop
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Private scalars never leave this module
//! - NEVER log or serialize key material; `Debug` output is redacted
//!
//! ## Last Modified
//! v0.1.0 - Initial key type definitions

use std::fmt;

use p521::ecdh::EphemeralSecret;
use p521::elliptic_curve::sec1::ToEncodedPoint;
use p521::PublicKey;
use rand::rngs::OsRng;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use ferrolink_common::time::Timestamp;

use crate::crypto::{CRYPTO_KEY_SIZE, HMAC_KEY_SIZE};
use crate::error::{CoreError, Result};
use crate::protocol::messages::{AgreementPublicKey, KeyExchangeAlgorithm};

// ============================================
// AgreementKeyPair (ECDH P-521)
// ============================================

/// Ephemeral ECDH P-521 key pair for the handshake key agreement.
///
/// # Security
/// - Generated from the OS random number generator
/// - Single-use: `exchange` consumes the pair
/// - Provides forward secrecy for the session keys
pub struct AgreementKeyPair {
    secret: Option<EphemeralSecret>,
    public: PublicKey,
    created_at: Timestamp,
}

impl AgreementKeyPair {
    /// Generates a new random agreement key pair stamped with the current
    /// time.
    #[must_use]
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random(&mut OsRng);
        let public = secret.public_key();
        Self {
            secret: Some(secret),
            public,
            created_at: Timestamp::now(),
        }
    }

    /// Returns the wire message carrying this pair's public half.
    #[must_use]
    pub fn public_message(&self) -> AgreementPublicKey {
        AgreementPublicKey {
            creation_time: self.created_at,
            algorithm_type: KeyExchangeAlgorithm::EcDhP521Sha2_256.as_value(),
            public_key: self.public.to_encoded_point(false).as_bytes().to_vec(),
        }
    }

    /// When this pair was generated.
    #[must_use]
    pub const fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Performs the key agreement with the peer's public key.
    ///
    /// # Consumes Self
    /// The private scalar is single-use; the pair cannot perform a second
    /// agreement.
    ///
    /// # Errors
    /// Returns `KeyExchange` if the peer's public key is not a valid P-521
    /// point.
    pub fn exchange(mut self, peer: &AgreementPublicKey) -> Result<Zeroizing<Vec<u8>>> {
        let peer_key = PublicKey::from_sec1_bytes(&peer.public_key)
            .map_err(|_| CoreError::key_exchange("invalid peer public key encoding"))?;
        let secret = self.secret.take().expect("agreement key already consumed");
        let shared = secret.diffie_hellman(&peer_key);
        Ok(Zeroizing::new(shared.raw_secret_bytes().to_vec()))
    }
}

impl fmt::Debug for AgreementKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let point = self.public.to_encoded_point(false);
        let bytes = point.as_bytes();
        f.debug_struct("AgreementKeyPair")
            .field(
                "public",
                &format_args!(
                    "{:02x}{:02x}{:02x}{:02x}...",
                    bytes[0], bytes[1], bytes[2], bytes[3]
                ),
            )
            .field("created_at", &self.created_at)
            .finish_non_exhaustive()
    }
}

// ============================================
// SessionKeySet
// ============================================

/// The four directional keys negotiated by a handshake.
///
/// The key schedule mirrors the set between roles: `my_*` on one end equals
/// `peer_*` on the other. Sending uses the `my_*` keys; receiving validates
/// and decrypts with the `peer_*` keys.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeySet {
    /// Cipher key for records this side sends.
    pub(crate) my_crypto_key: [u8; CRYPTO_KEY_SIZE],
    /// Cipher key for records the peer sends.
    pub(crate) peer_crypto_key: [u8; CRYPTO_KEY_SIZE],
    /// MAC key for records this side sends.
    pub(crate) my_hmac_key: [u8; HMAC_KEY_SIZE],
    /// MAC key for records the peer sends.
    pub(crate) peer_hmac_key: [u8; HMAC_KEY_SIZE],
}

impl SessionKeySet {
    pub(crate) const fn new(
        my_crypto_key: [u8; CRYPTO_KEY_SIZE],
        peer_crypto_key: [u8; CRYPTO_KEY_SIZE],
        my_hmac_key: [u8; HMAC_KEY_SIZE],
        peer_hmac_key: [u8; HMAC_KEY_SIZE],
    ) -> Self {
        Self {
            my_crypto_key,
            peer_crypto_key,
            my_hmac_key,
            peer_hmac_key,
        }
    }

    /// Returns `true` if `self` and `other` are mirror images of each other,
    /// i.e. the two ends of one successfully keyed connection.
    #[must_use]
    pub fn mirrors(&self, other: &Self) -> bool {
        self.my_crypto_key == other.peer_crypto_key
            && self.peer_crypto_key == other.my_crypto_key
            && self.my_hmac_key == other.peer_hmac_key
            && self.peer_hmac_key == other.my_hmac_key
    }
}

impl fmt::Debug for SessionKeySet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print key material
        write!(f, "SessionKeySet([REDACTED])")
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agreement_produces_matching_shared_secret() {
        let alice = AgreementKeyPair::generate();
        let bob = AgreementKeyPair::generate();

        let alice_public = alice.public_message();
        let bob_public = bob.public_message();

        let alice_shared = alice.exchange(&bob_public).unwrap();
        let bob_shared = bob.exchange(&alice_public).unwrap();

        assert_eq!(*alice_shared, *bob_shared);
        assert!(!alice_shared.is_empty());
    }

    #[test]
    fn test_public_message_shape() {
        let pair = AgreementKeyPair::generate();
        let msg = pair.public_message();
        assert_eq!(
            msg.algorithm_type,
            KeyExchangeAlgorithm::EcDhP521Sha2_256.as_value()
        );
        // Uncompressed SEC1 point for P-521: 0x04 || X(66) || Y(66).
        assert_eq!(msg.public_key.len(), 133);
        assert_eq!(msg.public_key[0], 0x04);
        assert!(msg.creation_time.is_within(5));
    }

    #[test]
    fn test_invalid_peer_key_is_rejected() {
        let pair = AgreementKeyPair::generate();
        let bogus = AgreementPublicKey {
            creation_time: Timestamp::now(),
            algorithm_type: KeyExchangeAlgorithm::EcDhP521Sha2_256.as_value(),
            public_key: vec![0x02; 7],
        };
        assert!(matches!(
            pair.exchange(&bogus),
            Err(CoreError::KeyExchange { .. })
        ));
    }

    #[test]
    fn test_session_key_set_mirroring() {
        let a = SessionKeySet::new([1; 32], [2; 32], [3; 32], [4; 32]);
        let b = SessionKeySet::new([2; 32], [1; 32], [4; 32], [3; 32]);
        assert!(a.mirrors(&b));
        assert!(b.mirrors(&a));
        assert!(!a.mirrors(&a.clone()));
    }

    #[test]
    fn test_session_key_set_debug_is_redacted() {
        let keys = SessionKeySet::new([0xAB; 32], [0xCD; 32], [0xEF; 32], [0x01; 32]);
        let printed = format!("{keys:?}");
        assert!(!printed.contains("ab"));
        assert!(printed.contains("REDACTED"));
    }
}
