//! Transport abstraction for thermostat sessions.
//!
//! The session never talks to a Bluetooth stack directly. It drives a
//! [`Transport`], which performs GATT-level work (connect, write to the
//! command characteristic, scan) and reports everything asynchronous through
//! a single [`EventHandler`]. [`crate::ble::BleTransport`] implements this
//! on top of btleplug and [`crate::mock::MockTransport`] implements it for
//! tests.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use eqiva_types::DeviceAddress;

use crate::error::Result;

/// Something that happened on the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TransportEvent {
    /// A link to `address` is up and notifications are enabled.
    Connected(DeviceAddress),
    /// The link to `address` went down.
    Disconnected(DeviceAddress),
    /// A payload arrived on the notification characteristic.
    Notification(Bytes),
    /// An advertisement was seen while scanning.
    Advertisement {
        /// Advertiser address.
        address: DeviceAddress,
        /// Signal strength in dBm, if the stack reports it.
        rssi: Option<i16>,
    },
}

/// Callback receiving every [`TransportEvent`].
///
/// Handlers may be invoked from any task and must not block.
pub type EventHandler = Arc<dyn Fn(TransportEvent) + Send + Sync>;

/// GATT-level operations a thermostat session needs.
///
/// # Example
///
/// ```ignore
/// use eqiva_core::{Transport, TransportEvent};
///
/// async fn send_raw<T: Transport>(transport: &T, frame: &[u8]) -> eqiva_core::Result<()> {
///     transport.write(frame).await
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Replace the handler that receives transport events.
    fn set_event_handler(&self, handler: EventHandler);

    /// Start connecting to `address`.
    ///
    /// Success of the link itself is reported through
    /// [`TransportEvent::Connected`]; an `Ok` return only means the attempt
    /// was issued.
    async fn connect(&self, address: DeviceAddress) -> Result<()>;

    /// Drop the current link, if any.
    async fn disconnect(&self) -> Result<()>;

    /// Write a command frame to the command characteristic.
    async fn write(&self, data: &[u8]) -> Result<()>;

    /// Start reporting advertisements.
    async fn start_scan(&self) -> Result<()>;

    /// Stop reporting advertisements.
    async fn stop_scan(&self) -> Result<()>;
}
