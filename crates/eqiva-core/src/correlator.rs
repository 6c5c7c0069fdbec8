//! Request/response correlation.
//!
//! The protocol carries no request tag, so a session allows one command in
//! flight and treats the next suitable notification as its answer. The
//! [`Mailbox`] is a single slot holding the most recent notification; it is
//! cleared before every write and polled until a payload of the expected
//! [`ResponseKind`] shows up or the settle window runs out.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::Notify;
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use eqiva_types::ParseError;
use eqiva_types::parse::{ACK_BYTES, MIN_SERIAL_BYTES, MIN_STATUS_BYTES, MIN_TIMER_BYTES};

/// The shape of the notification an operation waits for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
    /// The shared status notification (every setter answers with one).
    Status,
    /// Serial number and firmware version.
    Serial,
    /// A day's timer schedule.
    Timer,
    /// Write-timer acknowledgement.
    TimerAck,
    /// Factory-reset acknowledgement.
    ResetAck,
}

impl ResponseKind {
    /// Whether `payload` has the length this kind requires.
    pub fn accepts(self, payload: &[u8]) -> bool {
        match self {
            ResponseKind::Status => payload.len() >= MIN_STATUS_BYTES,
            ResponseKind::Serial => payload.len() >= MIN_SERIAL_BYTES,
            ResponseKind::Timer => payload.len() >= MIN_TIMER_BYTES,
            ResponseKind::TimerAck | ResponseKind::ResetAck => payload.len() == ACK_BYTES,
        }
    }

    /// The decoding failure for a payload of `actual` bytes that this kind
    /// rejected.
    pub fn mismatch(self, actual: usize) -> ParseError {
        match self {
            ResponseKind::Status => ParseError::InsufficientBytes {
                expected: MIN_STATUS_BYTES,
                actual,
            },
            ResponseKind::Serial => ParseError::InsufficientBytes {
                expected: MIN_SERIAL_BYTES,
                actual,
            },
            ResponseKind::Timer => ParseError::InsufficientBytes {
                expected: MIN_TIMER_BYTES,
                actual,
            },
            ResponseKind::TimerAck | ResponseKind::ResetAck => ParseError::UnexpectedLength {
                expected: ACK_BYTES,
                actual,
            },
        }
    }
}

/// Result of waiting on the mailbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// A payload of the expected kind arrived.
    Matched(Bytes),
    /// Only payloads of another shape arrived; the last one is kept.
    Mismatched(Bytes),
    /// Nothing arrived before the settle window ended.
    Empty,
    /// The link went down while waiting.
    Interrupted,
}

/// Single-slot, latest-value handoff between the event handler and the
/// waiting operation.
#[derive(Debug, Default)]
pub struct Mailbox {
    slot: Mutex<Option<Bytes>>,
    interrupted: AtomicBool,
    notify: Notify,
}

impl Mailbox {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Discard any stored payload and a pending interruption.
    pub fn clear(&self) {
        self.lock().take();
        self.interrupted.store(false, Ordering::SeqCst);
    }

    /// Store `payload`, replacing whatever was there, and wake the waiter.
    pub fn deliver(&self, payload: Bytes) {
        *self.lock() = Some(payload);
        self.notify.notify_one();
    }

    /// Wake the waiter with [`Outcome::Interrupted`].
    pub fn interrupt(&self) {
        self.interrupted.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Take the stored payload, if any.
    pub fn take(&self) -> Option<Bytes> {
        self.lock().take()
    }

    /// Wait up to `settle` for a payload accepted by `kind`.
    pub async fn wait_for(&self, kind: ResponseKind, settle: Duration) -> Outcome {
        let deadline = Instant::now() + settle;
        let mut last = None;

        loop {
            if self.interrupted.swap(false, Ordering::SeqCst) {
                return Outcome::Interrupted;
            }
            if let Some(payload) = self.take() {
                if kind.accepts(&payload) {
                    return Outcome::Matched(payload);
                }
                debug!(?kind, len = payload.len(), "Ignoring notification of another shape");
                last = Some(payload);
            }
            if timeout_at(deadline, self.notify.notified()).await.is_err() {
                break;
            }
        }

        match self.take() {
            Some(payload) if kind.accepts(&payload) => Outcome::Matched(payload),
            Some(payload) => Outcome::Mismatched(payload),
            None => last.map_or(Outcome::Empty, Outcome::Mismatched),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Option<Bytes>> {
        // A poisoned slot still holds a valid Option<Bytes>.
        self.slot.lock().unwrap_or_else(|e| e.into_inner())
    }
}
