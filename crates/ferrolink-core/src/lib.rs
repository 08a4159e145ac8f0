// ============================================
// File: crates/ferrolink-core/src/lib.rs
// ============================================
//! # Ferrolink Core - Secure Connection Library
//!
//! ## Creation Reason
//! Provides the cryptographic layer of Ferrolink: the handshake protocol,
//! the key schedule, and the authenticated record codec that together turn a
//! framed connection into a secure connection.
//!
//! ## Main Functionality
//!
//! ### Protocol Module ([`protocol`])
//! - Handshake message definitions (profile, agreement key, authentication)
//! - Tag/length/value codec for the handshake wire format
//!
//! ### Crypto Module ([`crypto`])
//! - Hash/HMAC/PBKDF2 facades over RustCrypto implementations
//! - ECDH P-521 agreement key pairs with freshness binding
//! - AES-256-CBC + HMAC-SHA256 record sealing and opening
//!
//! ### Secure Module ([`secure`])
//! - `SecureConnection`: handshake state machine and record layer over a
//!   [`ferrolink_transport::BaseConnection`]
//!
//! ## Security Guarantees
//! - **Confidentiality**: AES-256-CBC with per-record random IVs
//! - **Integrity**: HMAC-SHA256 over every record body
//! - **Ordering**: running-total binding detects reorder, drop, injection
//! - **Forward Secrecy**: ephemeral P-521 agreement per connection
//! - **Mutual Authentication** (optional): password proof-of-knowledge
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL cryptographic code uses audited RustCrypto implementations
//! - NEVER implement custom crypto primitives
//! - ALL key containers MUST implement Zeroize for secure cleanup
//! - The record's running-total header sits outside the MAC; the counter
//!   equality check in the receive path is load-bearing
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod protocol;
pub mod secure;

// Re-export commonly used items
pub use crypto::kdf::ConnectionRole;
pub use error::{CoreError, Result};
pub use protocol::{
    AgreementPublicKey, AuthenticationMessage, AuthenticationType, ProfileMessage,
};
pub use secure::{SecureConnection, SecureConnectionConfig, SecureStatus};
