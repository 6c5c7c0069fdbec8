//! Mock transport implementation for testing.
//!
//! This module provides a transport that can be used for unit testing
//! without requiring actual BLE hardware.
//!
//! The [`MockTransport`] implements the [`Transport`] trait, so a
//! [`crate::Thermostat`] can run against it exactly as it runs against
//! [`crate::ble::BleTransport`].
//!
//! # Features
//!
//! - **Scripted responses**: queue notification payloads per command opcode
//! - **Failure injection**: reject connects, never bring the link up, fail writes
//! - **Latency simulation**: deliver responses after a delay
//! - **Inspection**: every written frame is logged

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;

use eqiva_types::DeviceAddress;

use crate::error::{Error, Result};
use crate::transport::{EventHandler, Transport, TransportEvent};

/// A scriptable in-memory transport.
///
/// # Example
///
/// ```
/// use eqiva_core::{MockTransport, SessionConfig, Thermostat};
///
/// #[tokio::main]
/// async fn main() {
///     let transport = MockTransport::new()
///         .with_response(0x03, [0x02, 0x01, 0x08, 0x00, 0x04, 0x2A]);
///     let thermostat = Thermostat::new(transport, SessionConfig::default());
///
///     thermostat.connect("00:1A:22:0A:0B:0C".parse().unwrap()).await.unwrap();
///     let status = thermostat.read_status().await.unwrap();
///     assert_eq!(status.temperature.celsius(), 21.0);
/// }
/// ```
#[derive(Default)]
pub struct MockTransport {
    handler: Mutex<Option<EventHandler>>,
    address: Mutex<Option<DeviceAddress>>,
    responses: Mutex<HashMap<u8, VecDeque<Bytes>>>,
    writes: Mutex<Vec<Bytes>>,
    advertisements: Mutex<Vec<(DeviceAddress, Option<i16>)>>,
    never_connect: AtomicBool,
    fail_writes: AtomicBool,
    remaining_connect_failures: AtomicU32,
    connect_calls: AtomicU32,
    disconnect_calls: AtomicU32,
    scanning: AtomicBool,
    /// Simulated response latency in milliseconds (0 = deliver immediately).
    response_latency_ms: AtomicU64,
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("address", &*lock(&self.address))
            .field("connect_calls", &self.connect_calls())
            .field("writes", &lock(&self.writes).len())
            .finish_non_exhaustive()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

impl MockTransport {
    /// Create a transport that connects immediately and answers nothing.
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept connect calls but never bring the link up.
    #[must_use]
    pub fn never_connect(self) -> Self {
        self.never_connect.store(true, Ordering::Relaxed);
        self
    }

    /// Reject the next `count` connect calls with a transport error.
    #[must_use]
    pub fn fail_connects(self, count: u32) -> Self {
        self.remaining_connect_failures
            .store(count, Ordering::Relaxed);
        self
    }

    /// Queue `payload` as the answer to the next frame starting with `opcode`.
    #[must_use]
    pub fn with_response(self, opcode: u8, payload: impl AsRef<[u8]>) -> Self {
        self.push_response(opcode, payload);
        self
    }

    /// Report `address` when a scan starts.
    #[must_use]
    pub fn with_advertisement(self, address: DeviceAddress, rssi: Option<i16>) -> Self {
        lock(&self.advertisements).push((address, rssi));
        self
    }

    /// Queue `payload` as the answer to the next frame starting with `opcode`.
    ///
    /// Answers for the same opcode are used in order, one per write.
    pub fn push_response(&self, opcode: u8, payload: impl AsRef<[u8]>) {
        lock(&self.responses)
            .entry(opcode)
            .or_default()
            .push_back(Bytes::copy_from_slice(payload.as_ref()));
    }

    /// Make every following write fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Relaxed);
    }

    /// Set simulated response latency.
    ///
    /// Responses are delivered from a spawned task after this duration.
    /// Set to `Duration::ZERO` to deliver them during the write.
    pub fn set_response_latency(&self, latency: Duration) {
        self.response_latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Push an arbitrary event to the installed handler.
    pub fn emit(&self, event: TransportEvent) {
        let handler = lock(&self.handler).clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    /// Simulate the device dropping the link.
    pub fn drop_link(&self) {
        if let Some(address) = lock(&self.address).take() {
            self.emit(TransportEvent::Disconnected(address));
        }
    }

    /// Every frame written so far.
    pub fn writes(&self) -> Vec<Bytes> {
        lock(&self.writes).clone()
    }

    /// The most recent frame written.
    pub fn last_write(&self) -> Option<Bytes> {
        lock(&self.writes).last().cloned()
    }

    /// Number of connect calls received.
    pub fn connect_calls(&self) -> u32 {
        self.connect_calls.load(Ordering::Relaxed)
    }

    /// Number of disconnect calls received.
    pub fn disconnect_calls(&self) -> u32 {
        self.disconnect_calls.load(Ordering::Relaxed)
    }

    /// Whether a scan is running.
    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::Relaxed)
    }

    fn respond(&self, payload: Bytes) {
        let latency = self.response_latency_ms.load(Ordering::Relaxed);
        if latency == 0 {
            self.emit(TransportEvent::Notification(payload));
            return;
        }
        let handler = lock(&self.handler).clone();
        if let Some(handler) = handler {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(latency)).await;
                handler(TransportEvent::Notification(payload));
            });
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn set_event_handler(&self, handler: EventHandler) {
        *lock(&self.handler) = Some(handler);
    }

    async fn connect(&self, address: DeviceAddress) -> Result<()> {
        self.connect_calls.fetch_add(1, Ordering::Relaxed);

        if self.remaining_connect_failures.load(Ordering::Relaxed) > 0 {
            self.remaining_connect_failures
                .fetch_sub(1, Ordering::Relaxed);
            return Err(Error::transport("mock connect rejected"));
        }
        if self.never_connect.load(Ordering::Relaxed) {
            return Ok(());
        }

        *lock(&self.address) = Some(address);
        self.emit(TransportEvent::Connected(address));
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.disconnect_calls.fetch_add(1, Ordering::Relaxed);
        self.drop_link();
        Ok(())
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        if lock(&self.address).is_none() {
            return Err(Error::NotConnected);
        }
        if self.fail_writes.load(Ordering::Relaxed) {
            return Err(Error::transport("mock write failure"));
        }

        lock(&self.writes).push(Bytes::copy_from_slice(data));
        let answer = data
            .first()
            .and_then(|opcode| lock(&self.responses).get_mut(opcode)?.pop_front());
        if let Some(payload) = answer {
            self.respond(payload);
        }
        Ok(())
    }

    async fn start_scan(&self) -> Result<()> {
        self.scanning.store(true, Ordering::Relaxed);
        let advertisements = lock(&self.advertisements).clone();
        for (address, rssi) in advertisements {
            self.emit(TransportEvent::Advertisement { address, rssi });
        }
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.scanning.store(false, Ordering::Relaxed);
        Ok(())
    }
}
