// ============================================
// File: crates/ferrolink-core/src/protocol/mod.rs
// ============================================
//! # Handshake Protocol Module
//!
//! ## Creation Reason
//! Defines the wire protocol spoken during the secure-connection handshake:
//! message structures, algorithm enumerations, and the tag/length/value
//! codec.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`messages`]: Handshake message structures and algorithm enumerations
//! - [`codec`]: Tag/length/value serialization
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Handshake Phase                          │
//! │                                                             │
//! │  Peer A ◄═══════ ProfileMessage (both ways) ═══════► Peer B │
//! │  Peer A ◄═══════ AgreementPublicKey (both ways) ═══► Peer B │
//! │  Peer A ◄═══ AuthenticationMessage (if passwords) ═► Peer B │
//! │                                                             │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    Record Phase                             │
//! │                                                             │
//! │  Peer A ══════ encrypted records (both ways) ══════► Peer B │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format Principles
//! - Records are sequences of `id(u8) || length(u32_be) || value` fields
//! - A field id of zero terminates a record
//! - Unknown field ids are skipped for forward compatibility
//! - Multi-byte integers are big-endian, matching the frame and record
//!   layers
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;
pub mod messages;

// Re-export primary types
pub use codec::{
    decode_agreement_key, decode_authentication, decode_profile, encode_agreement_key,
    encode_authentication, encode_profile, encode_verification,
};
pub use messages::{
    AgreementPublicKey, AuthenticationMessage, AuthenticationType, CryptoAlgorithm,
    HashAlgorithm, KeyDerivationAlgorithm, KeyExchangeAlgorithm, ProfileMessage,
    SESSION_ID_SIZE,
};
