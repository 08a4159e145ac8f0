// ============================================
// File: crates/ferrolink-core/src/secure/handshake.rs
// ============================================
//! # Handshake Engine
//!
//! ## Creation Reason
//! Drives the symmetric secure-connection handshake over a framed
//! connection: profile exchange, algorithm negotiation, key agreement,
//! optional password authentication, and the key schedule.
//!
//! ## Handshake Flow
//! ```text
//! Peer A                                            Peer B
//!   │                                                 │
//!   │ ◄════════ ProfileMessage (concurrent) ════════► │
//!   │           check auth type, negotiate            │
//!   │                                                 │
//!   │ ◄══════ AgreementPublicKey (concurrent) ══════► │
//!   │           check freshness, ECDH                 │
//!   │                                                 │
//!   │ ◄═══ AuthenticationMessage (if passwords) ════► │
//!   │           intersect password proofs             │
//!   │                                                 │
//!   │           PBKDF2 key schedule                   │
//!   │                                                 │
//! ```
//! Every step sends and receives concurrently. The peers are symmetric;
//! serializing the halves deadlocks because both sides would wait to
//! receive before sending.
//!
//! ## Password Proofs
//! `proof = HMAC-SHA256(key: SHA256(password),
//!                      msg: SHA256(verification transcript))`
//! where the transcript is the sender's profile plus its agreement public
//! key. Proof lists are de-duplicated (so the wire does not leak how many
//! passwords are configured) and shuffled before sending.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Proofs commit to the *sender's* transcript; to check the peer you must
//!   recompute over the peer's profile and public key, not your own
//! - Reject agreement keys outside the freshness window in both directions
//!
//! ## Last Modified
//! v0.1.0 - Initial handshake engine

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use tracing::{debug, trace, warn};

use ferrolink_common::cancel::CancelToken;
use ferrolink_common::time::Timestamp;
use ferrolink_transport::connection::BaseConnection;
use ferrolink_transport::error::TransportError;

use crate::crypto::kdf::{derive_session_keys, xor_session_ids, ConnectionRole};
use crate::crypto::keys::{AgreementKeyPair, SessionKeySet};
use crate::crypto::primitives::{hmac_sha256, sha256};
use crate::crypto::AGREEMENT_KEY_FRESHNESS_SECS;
use crate::error::{CoreError, Result};
use crate::protocol::codec::{
    decode_agreement_key, decode_authentication, decode_profile, encode_agreement_key,
    encode_authentication, encode_profile, encode_verification,
};
use crate::protocol::messages::{
    AgreementPublicKey, AuthenticationMessage, AuthenticationType, CryptoAlgorithm,
    HashAlgorithm, KeyDerivationAlgorithm, KeyExchangeAlgorithm, ProfileMessage,
};

// ============================================
// Negotiation Results
// ============================================

/// The algorithm tuple both peers agreed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectedAlgorithms {
    /// Negotiated key-exchange algorithm.
    pub key_exchange: KeyExchangeAlgorithm,
    /// Negotiated key-derivation algorithm.
    pub key_derivation: KeyDerivationAlgorithm,
    /// Negotiated record cipher.
    pub crypto: CryptoAlgorithm,
    /// Negotiated hash algorithm.
    pub hash: HashAlgorithm,
}

/// Everything a completed handshake hands to the secure connection.
pub(crate) struct HandshakeOutcome {
    pub keys: SessionKeySet,
    pub algorithms: SelectedAlgorithms,
    pub matched_passwords: Vec<String>,
}

// ============================================
// Algorithm Selection
// ============================================

fn greatest_common(ours: &[u64], theirs: &[u64], category: &'static str) -> Result<u64> {
    ours.iter()
        .filter(|value| theirs.contains(*value))
        .max()
        .copied()
        .ok_or(CoreError::NoCommonAlgorithm { category })
}

/// Selects, per category, the greatest algorithm advertised by both peers.
///
/// # Errors
/// - `NoCommonAlgorithm` if any category fails to intersect
/// - `Unsupported` if a selected value is not implemented here
pub(crate) fn select_algorithms(
    ours: &ProfileMessage,
    theirs: &ProfileMessage,
) -> Result<SelectedAlgorithms> {
    let key_exchange = greatest_common(
        &ours.key_exchange_algorithms,
        &theirs.key_exchange_algorithms,
        "key-exchange",
    )?;
    let key_derivation = greatest_common(
        &ours.key_derivation_algorithms,
        &theirs.key_derivation_algorithms,
        "key-derivation",
    )?;
    let crypto = greatest_common(
        &ours.crypto_algorithms,
        &theirs.crypto_algorithms,
        "crypto",
    )?;
    let hash = greatest_common(&ours.hash_algorithms, &theirs.hash_algorithms, "hash")?;

    Ok(SelectedAlgorithms {
        key_exchange: KeyExchangeAlgorithm::from_value(key_exchange).ok_or(
            CoreError::Unsupported {
                category: "key-exchange",
                value: key_exchange,
            },
        )?,
        key_derivation: KeyDerivationAlgorithm::from_value(key_derivation).ok_or(
            CoreError::Unsupported {
                category: "key-derivation",
                value: key_derivation,
            },
        )?,
        crypto: CryptoAlgorithm::from_value(crypto).ok_or(CoreError::Unsupported {
            category: "crypto",
            value: crypto,
        })?,
        hash: HashAlgorithm::from_value(hash).ok_or(CoreError::Unsupported {
            category: "hash",
            value: hash,
        })?,
    })
}

// ============================================
// Password Proofs
// ============================================

fn transcript_digest(profile: &ProfileMessage, key: &AgreementPublicKey) -> [u8; 32] {
    sha256(&encode_verification(profile, key))
}

fn password_proof(password: &str, transcript: &[u8; 32]) -> Result<Vec<u8>> {
    let proof = hmac_sha256(&sha256(password.as_bytes()), transcript)?;
    Ok(proof.to_vec())
}

fn deduplicated<'a>(passwords: &'a [String]) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for password in passwords {
        if !seen.contains(&password.as_str()) {
            seen.push(password.as_str());
        }
    }
    seen
}

/// Computes this side's proof list over its own transcript.
pub(crate) fn password_proofs(
    passwords: &[String],
    profile: &ProfileMessage,
    key: &AgreementPublicKey,
) -> Result<Vec<Vec<u8>>> {
    let transcript = transcript_digest(profile, key);
    deduplicated(passwords)
        .into_iter()
        .map(|password| password_proof(password, &transcript))
        .collect()
}

/// Intersects the peer's proof list with our password set, recomputed over
/// the peer's transcript.
pub(crate) fn matched_passwords(
    passwords: &[String],
    peer_profile: &ProfileMessage,
    peer_key: &AgreementPublicKey,
    peer_proofs: &[Vec<u8>],
) -> Result<Vec<String>> {
    let transcript = transcript_digest(peer_profile, peer_key);
    let mut matched = Vec::new();
    for password in deduplicated(passwords) {
        let expected = password_proof(password, &transcript)?;
        if peer_proofs.iter().any(|proof| proof == &expected) {
            matched.push(password.to_owned());
        }
    }
    Ok(matched)
}

// ============================================
// Frame Exchange
// ============================================

/// Sends `payload` and receives the peer's frame concurrently.
async fn exchange(
    base: &BaseConnection,
    payload: Vec<u8>,
    cancel: &CancelToken,
) -> Result<Vec<u8>> {
    let send = base.enqueue(|w| w.write_all(&payload), cancel);
    let receive = async {
        let mut frame = Vec::new();
        base.dequeue(
            |r| {
                frame = r.copy_to_vec();
                Ok(())
            },
            cancel,
        )
        .await?;
        Ok::<Vec<u8>, TransportError>(frame)
    };
    let ((), frame) = tokio::try_join!(send, receive).map_err(CoreError::from_transport)?;
    Ok(frame)
}

// ============================================
// Handshake Driver
// ============================================

/// Runs the full handshake over `base`.
pub(crate) async fn run(
    base: &BaseConnection,
    role: ConnectionRole,
    passwords: &[String],
    cancel: &CancelToken,
) -> Result<HandshakeOutcome> {
    // Step 1: profile exchange.
    let authentication_type = if passwords.is_empty() {
        AuthenticationType::None
    } else {
        AuthenticationType::Password
    };
    let my_profile = ProfileMessage::new(authentication_type);
    trace!(
        role = %role,
        ?authentication_type,
        session = %hex::encode(&my_profile.session_id[..4]),
        "handshake starting"
    );

    let peer_frame = exchange(base, encode_profile(&my_profile), cancel).await?;
    let peer_profile = decode_profile(&peer_frame)?;
    if peer_profile.authentication_type != my_profile.authentication_type {
        warn!("handshake aborted: authentication type mismatch");
        return Err(CoreError::AuthTypeMismatch {
            ours: my_profile.authentication_type.as_byte(),
            theirs: peer_profile.authentication_type.as_byte(),
        });
    }

    // Step 2: algorithm selection.
    let algorithms = select_algorithms(&my_profile, &peer_profile)?;
    trace!(?algorithms, "algorithms negotiated");

    // Step 3: key agreement.
    let my_agreement = AgreementKeyPair::generate();
    let my_public = my_agreement.public_message();
    let peer_frame = exchange(base, encode_agreement_key(&my_public), cancel).await?;
    let peer_public = decode_agreement_key(&peer_frame)?;

    if !peer_public.creation_time.is_within(AGREEMENT_KEY_FRESHNESS_SECS) {
        let skew_secs = peer_public.creation_time.abs_delta(&Timestamp::now());
        warn!(skew_secs, "handshake aborted: stale agreement public key");
        return Err(CoreError::StalePublicKey { skew_secs });
    }
    if peer_public.algorithm_type != algorithms.key_exchange.as_value() {
        return Err(CoreError::Unsupported {
            category: "key-exchange",
            value: peer_public.algorithm_type,
        });
    }

    // Step 4: optional password authentication.
    let matched = if authentication_type == AuthenticationType::Password {
        let mut proofs = password_proofs(passwords, &my_profile, &my_public)?;
        proofs.shuffle(&mut OsRng);
        let message = AuthenticationMessage { hashes: proofs };

        let peer_frame = exchange(base, encode_authentication(&message), cancel).await?;
        let peer_auth = decode_authentication(&peer_frame)?;
        let matched =
            matched_passwords(passwords, &peer_profile, &peer_public, &peer_auth.hashes)?;
        if matched.is_empty() {
            warn!("handshake aborted: no password matched");
            return Err(CoreError::PasswordMismatch);
        }
        matched
    } else {
        Vec::new()
    };

    // Step 5: key schedule.
    let shared_secret = my_agreement.exchange(&peer_public)?;
    let salt = xor_session_ids(&my_profile.session_id, &peer_profile.session_id);
    let keys = derive_session_keys(&shared_secret, &salt, role);
    debug!(role = %role, matched = matched.len(), "handshake complete");

    Ok(HandshakeOutcome {
        keys,
        algorithms,
        matched_passwords: matched,
    })
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with(
        key_exchange: Vec<u64>,
        crypto: Vec<u64>,
    ) -> ProfileMessage {
        let mut profile = ProfileMessage::new(AuthenticationType::None);
        profile.key_exchange_algorithms = key_exchange;
        profile.crypto_algorithms = crypto;
        profile
    }

    #[test]
    fn test_selection_picks_greatest_common_value() {
        let ours = profile_with(vec![1, 5, 9], vec![1]);
        let theirs = profile_with(vec![1, 5], vec![1]);
        // 5 is the greatest common key-exchange value but not implemented.
        let err = select_algorithms(&ours, &theirs).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Unsupported {
                category: "key-exchange",
                value: 5,
            }
        ));
    }

    #[test]
    fn test_selection_of_supported_tuple() {
        let ours = ProfileMessage::new(AuthenticationType::None);
        let theirs = ProfileMessage::new(AuthenticationType::None);
        let selected = select_algorithms(&ours, &theirs).unwrap();
        assert_eq!(
            selected.key_exchange,
            KeyExchangeAlgorithm::EcDhP521Sha2_256
        );
        assert_eq!(selected.crypto, CryptoAlgorithm::Aes256);
    }

    #[test]
    fn test_empty_intersection_fails() {
        let ours = profile_with(vec![1], vec![1]);
        let theirs = profile_with(vec![2], vec![1]);
        let err = select_algorithms(&ours, &theirs).unwrap_err();
        assert!(matches!(
            err,
            CoreError::NoCommonAlgorithm {
                category: "key-exchange"
            }
        ));
    }

    #[test]
    fn test_password_proofs_are_deduplicated() {
        let profile = ProfileMessage::new(AuthenticationType::Password);
        let key = AgreementKeyPair::generate().public_message();
        let passwords = vec![
            "alpha".to_owned(),
            "beta".to_owned(),
            "alpha".to_owned(),
        ];
        let proofs = password_proofs(&passwords, &profile, &key).unwrap();
        assert_eq!(proofs.len(), 2);
    }

    #[test]
    fn test_proof_intersection_finds_shared_password() {
        // Peer's identity material.
        let peer_profile = ProfileMessage::new(AuthenticationType::Password);
        let peer_key = AgreementKeyPair::generate().public_message();

        let peer_passwords = vec!["y".to_owned(), "z".to_owned()];
        let peer_proofs =
            password_proofs(&peer_passwords, &peer_profile, &peer_key).unwrap();

        let our_passwords = vec!["x".to_owned(), "y".to_owned()];
        let matched =
            matched_passwords(&our_passwords, &peer_profile, &peer_key, &peer_proofs)
                .unwrap();
        assert_eq!(matched, vec!["y".to_owned()]);
    }

    #[test]
    fn test_disjoint_password_sets_match_nothing() {
        let peer_profile = ProfileMessage::new(AuthenticationType::Password);
        let peer_key = AgreementKeyPair::generate().public_message();

        let peer_proofs =
            password_proofs(&["a".to_owned()], &peer_profile, &peer_key).unwrap();
        let matched =
            matched_passwords(&["b".to_owned()], &peer_profile, &peer_key, &peer_proofs)
                .unwrap();
        assert!(matched.is_empty());
    }

    #[test]
    fn test_proofs_bind_to_the_senders_transcript() {
        let profile_a = ProfileMessage::new(AuthenticationType::Password);
        let profile_b = ProfileMessage::new(AuthenticationType::Password);
        let key = AgreementKeyPair::generate().public_message();

        let passwords = vec!["shared".to_owned()];
        let proofs_a = password_proofs(&passwords, &profile_a, &key).unwrap();
        // Recomputing over a different profile must not match.
        let matched =
            matched_passwords(&passwords, &profile_b, &key, &proofs_a).unwrap();
        assert!(matched.is_empty());
    }
}
