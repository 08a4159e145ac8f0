// ============================================
// File: crates/ferrolink-core/src/secure/mod.rs
// ============================================
//! # Secure Connection
//!
//! ## Creation Reason
//! Wraps a framed [`BaseConnection`] with the handshake state machine and
//! the authenticated record layer, giving applications an encrypted,
//! integrity-protected, ordered byte-message channel.
//!
//! ## Main Functionality
//! - `SecureConnection`: handshake, `send`, `receive`, status
//! - `SecureConnectionConfig`: role and optional password set
//! - `SecureStatus`: post-handshake snapshot
//!
//! ## State Machine
//! ```text
//! ┌─────┐  handshake()   ┌─────────────┐  success   ┌───────┐
//! │ New │ ─────────────► │ Handshaking │ ─────────► │ Ready │
//! └─────┘                └──────┬──────┘            └───┬───┘
//!                               │ failure               │ fatal error
//!                               ▼                       ▼   or close()
//!                          ┌──────────────────────────────┐
//!                          │            Closed            │  (absorbing)
//!                          └──────────────────────────────┘
//! ```
//! `send`/`receive` fail with `NotHandshaked` before `Ready`. The first
//! fatal error is recorded and replayed to every later caller.
//!
//! ## Ordering Guarantee
//! Every record carries the sender's running total of MAC-covered bytes.
//! The receiver maintains its own counter and fails closed on any
//! disagreement, which turns reordering, dropping, and injection into
//! immediate `SequenceMismatch` failures.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Send and receive paths are serialized by async gates; record order on
//!   the wire must match counter order or peers will hard-fail
//! - The running total advances only after a record is accepted by the
//!   framed connection; a cancelled send leaves no gap
//!
//! ## Last Modified
//! v0.1.0 - Initial secure connection

pub mod handshake;

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use ferrolink_common::cancel::CancelToken;
use ferrolink_common::hub::{ByteHub, HubReader, HubWriter};
use ferrolink_common::pool::BytePool;
use ferrolink_transport::connection::BaseConnection;
use ferrolink_transport::error::TransportError;

use crate::crypto::kdf::ConnectionRole;
use crate::crypto::keys::SessionKeySet;
use crate::crypto::record;
use crate::crypto::{RECORD_HEADER_SIZE, RECORD_MAC_SIZE};
use crate::error::{CoreError, Result};
use crate::protocol::messages::{CryptoAlgorithm, HashAlgorithm};

pub use handshake::SelectedAlgorithms;

// ============================================
// Phases
// ============================================

const PHASE_NEW: u8 = 0;
const PHASE_HANDSHAKING: u8 = 1;
const PHASE_READY: u8 = 2;
const PHASE_CLOSED: u8 = 3;

// ============================================
// SecureConnectionConfig
// ============================================

/// Configuration for a [`SecureConnection`].
#[derive(Clone, Serialize, Deserialize)]
pub struct SecureConnectionConfig {
    /// This side's connection role (determines the key-schedule split).
    pub role: ConnectionRole,
    /// Passwords for mutual authentication; empty for an anonymous
    /// handshake.
    pub passwords: Vec<String>,
}

impl SecureConnectionConfig {
    /// Anonymous configuration for the given role.
    #[must_use]
    pub const fn anonymous(role: ConnectionRole) -> Self {
        Self {
            role,
            passwords: Vec::new(),
        }
    }

    /// Password-authenticated configuration for the given role.
    #[must_use]
    pub fn with_passwords(role: ConnectionRole, passwords: Vec<String>) -> Self {
        Self { role, passwords }
    }
}

impl std::fmt::Debug for SecureConnectionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print password contents
        f.debug_struct("SecureConnectionConfig")
            .field("role", &self.role)
            .field("passwords", &format_args!("[{} redacted]", self.passwords.len()))
            .finish()
    }
}

// ============================================
// SecureStatus
// ============================================

/// Post-handshake status snapshot.
#[derive(Debug, Clone)]
pub struct SecureStatus {
    /// This side's connection role.
    pub role: ConnectionRole,
    /// Negotiated record cipher.
    pub cipher: CryptoAlgorithm,
    /// Negotiated hash algorithm.
    pub hash: HashAlgorithm,
    /// Passwords both peers proved knowledge of (empty when anonymous).
    pub matched_passwords: Vec<String>,
    /// Cumulative MAC-covered bytes sent.
    pub total_sent_size: u64,
    /// Cumulative MAC-covered bytes received.
    pub total_received_size: u64,
}

// ============================================
// SecureConnection
// ============================================

struct SessionState {
    keys: SessionKeySet,
    algorithms: SelectedAlgorithms,
    matched_passwords: Vec<String>,
}

/// Encrypted, authenticated, ordered message channel over a
/// [`BaseConnection`].
///
/// The underlying framed connection must be registered with a dispatcher
/// (or pumped manually); the secure layer only stages and consumes frames.
pub struct SecureConnection {
    base: Arc<BaseConnection>,
    role: ConnectionRole,
    passwords: Vec<String>,
    pool: Arc<BytePool>,
    phase: AtomicU8,
    session: RwLock<Option<SessionState>>,
    /// First fatal error, replayed to callers after `Closed`.
    terminal: RwLock<Option<CoreError>>,
    total_sent: AtomicU64,
    total_received: AtomicU64,
    /// Serializes the send path: counter order must equal wire order.
    send_gate: tokio::sync::Mutex<()>,
    /// Serializes the receive path for the same reason.
    recv_gate: tokio::sync::Mutex<()>,
}

impl SecureConnection {
    /// Creates a secure connection over `base`.
    ///
    /// The connection starts in the `New` phase; call
    /// [`SecureConnection::handshake`] before sending or receiving.
    #[must_use]
    pub fn new(
        base: Arc<BaseConnection>,
        config: SecureConnectionConfig,
        pool: Arc<BytePool>,
    ) -> Self {
        Self {
            base,
            role: config.role,
            passwords: config.passwords,
            pool,
            phase: AtomicU8::new(PHASE_NEW),
            session: RwLock::new(None),
            terminal: RwLock::new(None),
            total_sent: AtomicU64::new(0),
            total_received: AtomicU64::new(0),
            send_gate: tokio::sync::Mutex::new(()),
            recv_gate: tokio::sync::Mutex::new(()),
        }
    }

    // ========================================
    // Handshake
    // ========================================

    /// Runs the handshake with the peer.
    ///
    /// Both peers must call this concurrently; each step sends and receives
    /// at the same time.
    ///
    /// # Errors
    /// Handshake failures (`AuthTypeMismatch`, `NoCommonAlgorithm`,
    /// `Unsupported`, `StalePublicKey`, `PasswordMismatch`), transport
    /// errors, and `Cancelled`. Any failure closes the connection.
    pub async fn handshake(&self, cancel: &CancelToken) -> Result<()> {
        match self.phase.compare_exchange(
            PHASE_NEW,
            PHASE_HANDSHAKING,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => {}
            Err(phase) if phase == PHASE_CLOSED => return Err(self.terminal_error()),
            Err(_) => {
                return Err(CoreError::invalid_state("handshake", "New"));
            }
        }

        match handshake::run(&self.base, self.role, &self.passwords, cancel).await {
            Ok(outcome) => {
                *self.session.write() = Some(SessionState {
                    keys: outcome.keys,
                    algorithms: outcome.algorithms,
                    matched_passwords: outcome.matched_passwords,
                });
                self.phase.store(PHASE_READY, Ordering::SeqCst);
                debug!(role = %self.role, "secure connection ready");
                Ok(())
            }
            Err(e) => {
                self.fail(e.clone());
                Err(e)
            }
        }
    }

    // ========================================
    // Send / Receive
    // ========================================

    /// Encrypts the bytes produced by `write` into one record and hands it
    /// to the framed connection.
    ///
    /// # Errors
    /// - `NotHandshaked` before the handshake completes
    /// - `Cancelled` if `cancel` fires before the record is staged
    /// - transport and crypto errors; fatal ones close the connection
    pub async fn send<F>(&self, write: F, cancel: &CancelToken) -> Result<()>
    where
        F: FnOnce(&mut HubWriter<'_>) -> ferrolink_common::Result<()>,
    {
        self.ensure_ready()?;
        let _gate = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CoreError::Cancelled),
            guard = self.send_gate.lock() => guard,
        };
        self.ensure_ready()?;

        // Run the producer into a scratch hub.
        let mut scratch = ByteHub::new(Arc::clone(&self.pool));
        {
            let mut writer = scratch.writer();
            write(&mut writer)?;
        }
        let plaintext = scratch.reader().copy_to_vec();

        let keys = self.session_keys()?;
        let total_after =
            self.total_sent.load(Ordering::Acquire) + record::mac_covered_len(plaintext.len());
        let frame = record::seal(&keys, total_after, &plaintext)?;

        match self.base.enqueue(|w| w.write_all(&frame), cancel).await {
            Ok(()) => {
                // Advance only once the record is committed to the wire
                // order; a cancelled send must not leave a counter gap.
                self.total_sent.store(total_after, Ordering::Release);
                trace!(
                    plaintext = plaintext.len(),
                    total = total_after,
                    "record sent"
                );
                Ok(())
            }
            Err(e) => Err(self.map_transport_failure(e)),
        }
    }

    /// Receives one record, decrypts it, and passes the plaintext to
    /// `read`.
    ///
    /// # Errors
    /// - `NotHandshaked` before the handshake completes
    /// - `Cancelled` if `cancel` fires before a record arrives
    /// - `SequenceMismatch`, `MacInvalid`, `MalformedFrame` on tampering or
    ///   desync; all are fatal
    pub async fn receive<F>(&self, read: F, cancel: &CancelToken) -> Result<()>
    where
        F: FnOnce(&mut HubReader<'_>) -> ferrolink_common::Result<()>,
    {
        self.ensure_ready()?;
        let _gate = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(CoreError::Cancelled),
            guard = self.recv_gate.lock() => guard,
        };
        self.ensure_ready()?;

        let mut frame = Vec::new();
        self.base
            .dequeue(
                |r| {
                    frame = r.copy_to_vec();
                    Ok(())
                },
                cancel,
            )
            .await
            .map_err(|e| self.map_transport_failure(e))?;

        let declared = match record::declared_running_total(&frame) {
            Ok(declared) => declared,
            Err(e) => return Err(self.fail_with(e)),
        };
        let covered = (frame.len() - RECORD_HEADER_SIZE - RECORD_MAC_SIZE) as u64;
        let expected = self.total_received.fetch_add(covered, Ordering::AcqRel) + covered;
        if declared != expected {
            warn!(declared, expected, "record sequence mismatch");
            return Err(self.fail_with(CoreError::SequenceMismatch { declared, expected }));
        }

        let keys = self.session_keys()?;
        let plaintext = match record::open(&keys, &frame) {
            Ok(plaintext) => plaintext,
            Err(e) => {
                warn!(error = %e, "record rejected");
                return Err(self.fail_with(e));
            }
        };
        trace!(
            plaintext = plaintext.len(),
            total = expected,
            "record received"
        );

        let mut scratch = ByteHub::new(Arc::clone(&self.pool));
        {
            let mut writer = scratch.writer();
            writer.write_all(&plaintext)?;
            writer.complete();
        }
        let mut reader = scratch.reader();
        read(&mut reader)?;
        Ok(())
    }

    // ========================================
    // Status & lifecycle
    // ========================================

    /// Post-handshake status snapshot.
    ///
    /// # Errors
    /// Returns `NotHandshaked` before the handshake completes.
    pub fn status(&self) -> Result<SecureStatus> {
        self.ensure_ready()?;
        let session = self.session.read();
        let state = session.as_ref().expect("ready phase implies session state");
        Ok(SecureStatus {
            role: self.role,
            cipher: state.algorithms.crypto,
            hash: state.algorithms.hash,
            matched_passwords: state.matched_passwords.clone(),
            total_sent_size: self.total_sent.load(Ordering::Acquire),
            total_received_size: self.total_received.load(Ordering::Acquire),
        })
    }

    /// This side's connection role.
    #[must_use]
    pub const fn role(&self) -> ConnectionRole {
        self.role
    }

    /// Cumulative MAC-covered bytes sent.
    #[must_use]
    pub fn total_sent_size(&self) -> u64 {
        self.total_sent.load(Ordering::Acquire)
    }

    /// Cumulative MAC-covered bytes received.
    #[must_use]
    pub fn total_received_size(&self) -> u64 {
        self.total_received.load(Ordering::Acquire)
    }

    /// Returns `true` once the handshake has completed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.phase.load(Ordering::SeqCst) == PHASE_READY
    }

    /// The framed connection this secure connection rides on.
    #[must_use]
    pub const fn base(&self) -> &Arc<BaseConnection> {
        &self.base
    }

    /// Closes the connection; `Closed` is absorbing.
    pub fn close(&self) {
        let phase = self.phase.swap(PHASE_CLOSED, Ordering::SeqCst);
        if phase != PHASE_CLOSED {
            debug!(role = %self.role, "secure connection closed");
        }
        self.base.close();
    }

    fn ensure_ready(&self) -> Result<()> {
        match self.phase.load(Ordering::SeqCst) {
            PHASE_READY => Ok(()),
            PHASE_CLOSED => Err(self.terminal_error()),
            _ => Err(CoreError::NotHandshaked),
        }
    }

    fn terminal_error(&self) -> CoreError {
        self.terminal
            .read()
            .clone()
            .unwrap_or(CoreError::Connection(TransportError::ConnectionClosed))
    }

    fn session_keys(&self) -> Result<SessionKeySet> {
        self.session
            .read()
            .as_ref()
            .map(|state| state.keys.clone())
            .ok_or(CoreError::NotHandshaked)
    }

    fn fail(&self, error: CoreError) {
        {
            let mut terminal = self.terminal.write();
            if terminal.is_none() {
                *terminal = Some(error);
            }
        }
        self.phase.store(PHASE_CLOSED, Ordering::SeqCst);
        self.base.close();
    }

    fn fail_with(&self, error: CoreError) -> CoreError {
        self.fail(error.clone());
        error
    }

    fn map_transport_failure(&self, error: TransportError) -> CoreError {
        let mapped = CoreError::from_transport(error);
        if mapped.is_fatal() {
            self.fail(mapped.clone());
        }
        mapped
    }
}

impl std::fmt::Debug for SecureConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecureConnection")
            .field("role", &self.role)
            .field("ready", &self.is_ready())
            .field("total_sent", &self.total_sent_size())
            .field("total_received", &self.total_received_size())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================
