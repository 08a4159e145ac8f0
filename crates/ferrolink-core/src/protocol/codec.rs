// ============================================
// File: crates/ferrolink-core/src/protocol/codec.rs
// ============================================
//! # Handshake Codec
//!
//! ## Creation Reason
//! Provides binary serialization for the handshake messages. The format is
//! a sequence of tagged fields so that future revisions can add fields
//! without breaking old peers.
//!
//! ## Wire Format
//! ```text
//! record   := field* terminator
//! field    := id(u8, nonzero) || length(u32_be) || value(length bytes)
//! terminator := 0x00
//! ```
//! `u64` array fields carry big-endian values back to back; their length is
//! therefore always a multiple of eight.
//!
//! ## Parsing Strategy
//! 1. Walk fields until the zero terminator
//! 2. Skip unknown ids (forward compatibility)
//! 3. Validate presence and shape of every required field
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always validate buffer lengths before reading
//! - A record without a terminator is malformed, not merely truncated
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use bytes::{BufMut, BytesMut};

use ferrolink_common::time::Timestamp;

use crate::error::{CoreError, Result};
use crate::protocol::messages::{
    AgreementPublicKey, AuthenticationMessage, AuthenticationType, ProfileMessage,
    SESSION_ID_SIZE,
};

// ============================================
// Field Identifiers
// ============================================

const FIELD_END: u8 = 0;

mod profile_fields {
    pub const SESSION_ID: u8 = 1;
    pub const AUTHENTICATION_TYPE: u8 = 2;
    pub const KEY_EXCHANGE_ALGORITHMS: u8 = 3;
    pub const KEY_DERIVATION_ALGORITHMS: u8 = 4;
    pub const CRYPTO_ALGORITHMS: u8 = 5;
    pub const HASH_ALGORITHMS: u8 = 6;
}

mod agreement_fields {
    pub const CREATION_TIME: u8 = 1;
    pub const ALGORITHM_TYPE: u8 = 2;
    pub const PUBLIC_KEY: u8 = 3;
}

mod authentication_fields {
    pub const HASH: u8 = 1;
}

mod verification_fields {
    pub const PROFILE: u8 = 1;
    pub const PUBLIC_KEY: u8 = 2;
}

// ============================================
// Field Writer
// ============================================

#[allow(clippy::cast_possible_truncation)]
fn put_field(buf: &mut BytesMut, id: u8, value: &[u8]) {
    debug_assert_ne!(id, FIELD_END);
    debug_assert!(value.len() <= u32::MAX as usize);
    buf.put_u8(id);
    buf.put_u32(value.len() as u32);
    buf.put_slice(value);
}

fn put_u64_array_field(buf: &mut BytesMut, id: u8, values: &[u64]) {
    let mut payload = BytesMut::with_capacity(values.len() * 8);
    for value in values {
        payload.put_u64(*value);
    }
    put_field(buf, id, &payload);
}

fn put_end(buf: &mut BytesMut) {
    buf.put_u8(FIELD_END);
}

// ============================================
// Field Reader
// ============================================

struct FieldReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Returns the next field, or `None` at the terminator.
    fn next_field(&mut self) -> Result<Option<(u8, &'a [u8])>> {
        let Some(&id) = self.buf.get(self.pos) else {
            return Err(CoreError::malformed_message("record missing terminator"));
        };
        self.pos += 1;
        if id == FIELD_END {
            return Ok(None);
        }
        let Some(length_bytes) = self.buf.get(self.pos..self.pos + 4) else {
            return Err(CoreError::malformed_message("truncated field length"));
        };
        let length = u32::from_be_bytes(
            length_bytes.try_into().expect("slice is four bytes"),
        ) as usize;
        self.pos += 4;
        let Some(value) = self.buf.get(self.pos..self.pos + length) else {
            return Err(CoreError::malformed_message("truncated field value"));
        };
        self.pos += length;
        Ok(Some((id, value)))
    }
}

fn parse_u64_array(value: &[u8]) -> Result<Vec<u64>> {
    if value.len() % 8 != 0 {
        return Err(CoreError::malformed_message(
            "algorithm array length not a multiple of 8",
        ));
    }
    Ok(value
        .chunks_exact(8)
        .map(|chunk| u64::from_be_bytes(chunk.try_into().expect("chunk is eight bytes")))
        .collect())
}

fn required<T>(field: Option<T>, name: &str) -> Result<T> {
    field.ok_or_else(|| CoreError::malformed_message(format!("missing field: {name}")))
}

// ============================================
// ProfileMessage
// ============================================

/// Encodes a profile message to its wire form.
#[must_use]
pub fn encode_profile(msg: &ProfileMessage) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(128);
    put_field(&mut buf, profile_fields::SESSION_ID, &msg.session_id);
    put_field(
        &mut buf,
        profile_fields::AUTHENTICATION_TYPE,
        &[msg.authentication_type.as_byte()],
    );
    put_u64_array_field(
        &mut buf,
        profile_fields::KEY_EXCHANGE_ALGORITHMS,
        &msg.key_exchange_algorithms,
    );
    put_u64_array_field(
        &mut buf,
        profile_fields::KEY_DERIVATION_ALGORITHMS,
        &msg.key_derivation_algorithms,
    );
    put_u64_array_field(
        &mut buf,
        profile_fields::CRYPTO_ALGORITHMS,
        &msg.crypto_algorithms,
    );
    put_u64_array_field(
        &mut buf,
        profile_fields::HASH_ALGORITHMS,
        &msg.hash_algorithms,
    );
    put_end(&mut buf);
    buf.to_vec()
}

/// Decodes a profile message from its wire form.
///
/// # Errors
/// Returns `MalformedMessage` on structural violations.
pub fn decode_profile(buf: &[u8]) -> Result<ProfileMessage> {
    let mut session_id = None;
    let mut authentication_type = None;
    let mut key_exchange = None;
    let mut key_derivation = None;
    let mut crypto = None;
    let mut hash = None;

    let mut reader = FieldReader::new(buf);
    while let Some((id, value)) = reader.next_field()? {
        match id {
            profile_fields::SESSION_ID => {
                let bytes: [u8; SESSION_ID_SIZE] = value.try_into().map_err(|_| {
                    CoreError::malformed_message(format!(
                        "session id must be {SESSION_ID_SIZE} bytes, got {}",
                        value.len()
                    ))
                })?;
                session_id = Some(bytes);
            }
            profile_fields::AUTHENTICATION_TYPE => {
                let &[byte] = value else {
                    return Err(CoreError::malformed_message(
                        "authentication type must be one byte",
                    ));
                };
                authentication_type = Some(AuthenticationType::from_byte(byte).ok_or_else(
                    || {
                        CoreError::malformed_message(format!(
                            "unknown authentication type {byte}"
                        ))
                    },
                )?);
            }
            profile_fields::KEY_EXCHANGE_ALGORITHMS => {
                key_exchange = Some(parse_u64_array(value)?);
            }
            profile_fields::KEY_DERIVATION_ALGORITHMS => {
                key_derivation = Some(parse_u64_array(value)?);
            }
            profile_fields::CRYPTO_ALGORITHMS => {
                crypto = Some(parse_u64_array(value)?);
            }
            profile_fields::HASH_ALGORITHMS => {
                hash = Some(parse_u64_array(value)?);
            }
            _ => {} // forward compatibility
        }
    }

    Ok(ProfileMessage {
        session_id: required(session_id, "session_id")?,
        authentication_type: required(authentication_type, "authentication_type")?,
        key_exchange_algorithms: required(key_exchange, "key_exchange_algorithms")?,
        key_derivation_algorithms: required(key_derivation, "key_derivation_algorithms")?,
        crypto_algorithms: required(crypto, "crypto_algorithms")?,
        hash_algorithms: required(hash, "hash_algorithms")?,
    })
}

// ============================================
// AgreementPublicKey
// ============================================

/// Encodes an agreement public key to its wire form.
#[must_use]
pub fn encode_agreement_key(msg: &AgreementPublicKey) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(32 + msg.public_key.len());
    put_field(
        &mut buf,
        agreement_fields::CREATION_TIME,
        &msg.creation_time.as_secs().to_be_bytes(),
    );
    put_field(
        &mut buf,
        agreement_fields::ALGORITHM_TYPE,
        &msg.algorithm_type.to_be_bytes(),
    );
    put_field(&mut buf, agreement_fields::PUBLIC_KEY, &msg.public_key);
    put_end(&mut buf);
    buf.to_vec()
}

/// Decodes an agreement public key from its wire form.
///
/// # Errors
/// Returns `MalformedMessage` on structural violations.
pub fn decode_agreement_key(buf: &[u8]) -> Result<AgreementPublicKey> {
    let mut creation_time = None;
    let mut algorithm_type = None;
    let mut public_key = None;

    let mut reader = FieldReader::new(buf);
    while let Some((id, value)) = reader.next_field()? {
        match id {
            agreement_fields::CREATION_TIME => {
                let bytes: [u8; 8] = value.try_into().map_err(|_| {
                    CoreError::malformed_message("creation time must be eight bytes")
                })?;
                creation_time = Some(Timestamp::from_secs(i64::from_be_bytes(bytes)));
            }
            agreement_fields::ALGORITHM_TYPE => {
                let bytes: [u8; 8] = value.try_into().map_err(|_| {
                    CoreError::malformed_message("algorithm type must be eight bytes")
                })?;
                algorithm_type = Some(u64::from_be_bytes(bytes));
            }
            agreement_fields::PUBLIC_KEY => {
                if value.is_empty() {
                    return Err(CoreError::malformed_message("empty public key"));
                }
                public_key = Some(value.to_vec());
            }
            _ => {}
        }
    }

    Ok(AgreementPublicKey {
        creation_time: required(creation_time, "creation_time")?,
        algorithm_type: required(algorithm_type, "algorithm_type")?,
        public_key: required(public_key, "public_key")?,
    })
}

// ============================================
// AuthenticationMessage
// ============================================

/// Encodes an authentication message to its wire form.
#[must_use]
pub fn encode_authentication(msg: &AuthenticationMessage) -> Vec<u8> {
    let mut buf = BytesMut::with_capacity(8 + msg.hashes.len() * 40);
    for hash in &msg.hashes {
        put_field(&mut buf, authentication_fields::HASH, hash);
    }
    put_end(&mut buf);
    buf.to_vec()
}

/// Decodes an authentication message from its wire form.
///
/// # Errors
/// Returns `MalformedMessage` on structural violations.
pub fn decode_authentication(buf: &[u8]) -> Result<AuthenticationMessage> {
    let mut hashes = Vec::new();
    let mut reader = FieldReader::new(buf);
    while let Some((id, value)) = reader.next_field()? {
        if id == authentication_fields::HASH {
            hashes.push(value.to_vec());
        }
    }
    Ok(AuthenticationMessage { hashes })
}

// ============================================
// VerificationMessage
// ============================================

/// Serializes the verification transcript a password proof commits to: the
/// sender's profile plus its agreement public key. Never sent on the wire
/// directly; both peers recompute it.
#[must_use]
pub fn encode_verification(profile: &ProfileMessage, key: &AgreementPublicKey) -> Vec<u8> {
    let profile_bytes = encode_profile(profile);
    let key_bytes = encode_agreement_key(key);
    let mut buf = BytesMut::with_capacity(profile_bytes.len() + key_bytes.len() + 16);
    put_field(&mut buf, verification_fields::PROFILE, &profile_bytes);
    put_field(&mut buf, verification_fields::PUBLIC_KEY, &key_bytes);
    put_end(&mut buf);
    buf.to_vec()
}

// ============================================
// Tests
// ============================================
