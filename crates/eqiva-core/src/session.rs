//! Thermostat session.
//!
//! [`Thermostat`] is the single entry point for talking to one device: it
//! composes the connection state machine, the wire codec, the response
//! mailbox and the parsers. Every device operation follows the same path:
//! validate and encode, check the link, clear the mailbox, write, wait for
//! the expected response shape, decode.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use time::{OffsetDateTime, PrimitiveDateTime};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info};

use eqiva_types::command::{self, Command};
use eqiva_types::parse;
use eqiva_types::{
    DeviceAddress, ModeCommand, Preset, SerialInfo, StatusSnapshot, TimerSchedule, Weekday,
};

use crate::config::SessionConfig;
use crate::connection::{Connection, ConnectionState};
use crate::correlator::{Outcome, ResponseKind};
use crate::error::{Error, Result};
use crate::scan::{DiscoveredDevice, ScanOptions, scan_with};
use crate::transport::Transport;
use crate::util::format_hex;

/// A session with one Eqiva thermostat.
///
/// At most one command is in flight at a time; concurrent callers are
/// serialized.
///
/// # Example
///
/// ```no_run
/// use eqiva_core::{BleTransport, SessionConfig, Thermostat};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let thermostat = Thermostat::new(BleTransport::new().await?, SessionConfig::default());
///
///     thermostat.connect("00:1A:22:0C:3B:7F".parse()?).await?;
///     let status = thermostat.set_temperature(21.5).await?;
///     println!("Target: {}", status.temperature);
///     thermostat.disconnect().await?;
///     Ok(())
/// }
/// ```
pub struct Thermostat<T: Transport + 'static> {
    connection: Connection<T>,
    in_flight: AsyncMutex<()>,
    last_status: Mutex<Option<StatusSnapshot>>,
}

impl<T: Transport + 'static> std::fmt::Debug for Thermostat<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Thermostat")
            .field("address", &self.address())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl<T: Transport + 'static> Thermostat<T> {
    /// Create a session over `transport`.
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self::with_shared_transport(Arc::new(transport), config)
    }

    /// Create a session over a transport that is shared with other code.
    pub fn with_shared_transport(transport: Arc<T>, config: SessionConfig) -> Self {
        Self {
            connection: Connection::new(transport, config),
            in_flight: AsyncMutex::new(()),
            last_status: Mutex::new(None),
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<T> {
        self.connection.transport()
    }

    /// The session's timing policy.
    pub fn config(&self) -> &SessionConfig {
        self.connection.config()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Address of the current or last attempted device.
    pub fn address(&self) -> Option<DeviceAddress> {
        self.connection.link().address()
    }

    /// The most recent status decoded by this session.
    pub fn last_status(&self) -> Option<StatusSnapshot> {
        *self.last_status.lock().unwrap_or_else(|e| e.into_inner())
    }

    // --- Lifecycle ---

    /// Scan for thermostats. Does not need (or disturb) a connection.
    pub async fn scan(&self, options: ScanOptions) -> Result<Vec<DiscoveredDevice>> {
        let session = self.connection.link().event_handler();
        scan_with(self.transport(), session, options).await
    }

    /// Connect using the configured number of attempts.
    pub async fn connect(&self, address: DeviceAddress) -> Result<()> {
        let attempts = self.config().max_connect_attempts;
        self.connect_with_attempts(address, attempts).await
    }

    /// Connect, trying up to `max_attempts` times.
    pub async fn connect_with_attempts(
        &self,
        address: DeviceAddress,
        max_attempts: u32,
    ) -> Result<()> {
        let _busy = self.in_flight.lock().await;
        self.connection.connect(address, max_attempts).await
    }

    /// Disconnect. Does nothing when already disconnected.
    pub async fn disconnect(&self) -> Result<()> {
        self.connection.disconnect().await
    }

    // --- Status ---

    /// Request a status notification, stamping the request with the
    /// thermostat's local time.
    pub async fn read_status(&self) -> Result<StatusSnapshot> {
        let now = OffsetDateTime::now_utc().to_offset(self.config().utc_offset);
        self.read_status_at(PrimitiveDateTime::new(now.date(), now.time()))
            .await
    }

    /// Request a status notification with an explicit local time stamp.
    ///
    /// The device sets its clock from the stamp.
    #[tracing::instrument(level = "info", skip(self), fields(address = ?self.address()))]
    pub async fn read_status_at(&self, now: PrimitiveDateTime) -> Result<StatusSnapshot> {
        let frame = command::encode_status_request(now)?;
        self.status_command("read_status", frame).await
    }

    // --- Mode and setpoint ---

    /// Switch to auto, manual, or a vacation hold.
    #[tracing::instrument(level = "info", skip(self), fields(address = ?self.address()))]
    pub async fn set_mode(&self, mode: ModeCommand) -> Result<StatusSnapshot> {
        let frame = command::encode_mode_command(&mode)?;
        self.status_command("set_mode", frame).await
    }

    /// Set the manual setpoint in °C.
    #[tracing::instrument(level = "info", skip(self), fields(address = ?self.address()))]
    pub async fn set_temperature(&self, celsius: f32) -> Result<StatusSnapshot> {
        let frame = command::encode_manual_temp(celsius)?;
        self.status_command("set_temperature", frame).await
    }

    /// Select the comfort or eco setpoint, or toggle boost.
    #[tracing::instrument(level = "info", skip(self), fields(address = ?self.address()))]
    pub async fn set_preset(&self, preset: Preset) -> Result<StatusSnapshot> {
        let frame = command::encode_preset(preset);
        self.status_command("set_preset", frame).await
    }

    // --- Timers ---

    /// Read the schedule of `day`.
    #[tracing::instrument(level = "info", skip(self), fields(address = ?self.address()))]
    pub async fn read_timer(&self, day: Weekday) -> Result<TimerSchedule> {
        const OP: &str = "read_timer";
        let payload = self
            .request(OP, command::encode_timer_request(day), ResponseKind::Timer)
            .await?;
        parse::parse_timer(&payload).map_err(|e| Error::decode(OP, e))
    }

    /// Replace the schedule of `day` and return the day the device
    /// acknowledged.
    #[tracing::instrument(level = "info", skip(self, schedule), fields(address = ?self.address()))]
    pub async fn write_timer(&self, day: Weekday, schedule: &TimerSchedule) -> Result<Weekday> {
        const OP: &str = "write_timer";
        let frame = command::encode_timer(day, schedule)?;
        let payload = self.request(OP, frame, ResponseKind::TimerAck).await?;
        let acknowledged = parse::parse_timer_ack(&payload).map_err(|e| Error::decode(OP, e))?;
        if acknowledged != day {
            debug!(?day, ?acknowledged, "Device acknowledged another day");
        }
        Ok(acknowledged)
    }

    // --- Configuration ---

    /// Set the comfort and eco setpoints in °C.
    #[tracing::instrument(level = "info", skip(self), fields(address = ?self.address()))]
    pub async fn set_comfort_eco(&self, comfort: f32, eco: f32) -> Result<StatusSnapshot> {
        let frame = command::encode_comfort_eco(comfort, eco)?;
        self.status_command("set_comfort_eco", frame).await
    }

    /// Set the open-window setpoint and how long it holds.
    #[tracing::instrument(level = "info", skip(self), fields(address = ?self.address()))]
    pub async fn set_window_open(&self, celsius: f32, minutes: u16) -> Result<StatusSnapshot> {
        let frame = command::encode_window_open(celsius, minutes)?;
        self.status_command("set_window_open", frame).await
    }

    /// Set the temperature sensor offset in °C.
    #[tracing::instrument(level = "info", skip(self), fields(address = ?self.address()))]
    pub async fn set_offset(&self, offset: f32) -> Result<StatusSnapshot> {
        let frame = command::encode_offset(offset)?;
        self.status_command("set_offset", frame).await
    }

    /// Lock or unlock the device's buttons.
    #[tracing::instrument(level = "info", skip(self), fields(address = ?self.address()))]
    pub async fn set_lock(&self, locked: bool) -> Result<StatusSnapshot> {
        self.status_command("set_lock", command::encode_lock(locked))
            .await
    }

    // --- Device ---

    /// Reset the device to factory settings.
    ///
    /// Returns the device's result code; `0` means the reset was accepted.
    #[tracing::instrument(level = "info", skip(self), fields(address = ?self.address()))]
    pub async fn factory_reset(&self) -> Result<u8> {
        const OP: &str = "factory_reset";
        let payload = self
            .request(OP, command::encode_factory_reset(), ResponseKind::ResetAck)
            .await?;
        let code = parse::parse_reset_ack(&payload).map_err(|e| Error::decode(OP, e))?;
        if code == 0 {
            info!("Factory reset accepted");
        }
        Ok(code)
    }

    /// Read serial number and firmware version, and derive the pairing PIN.
    #[tracing::instrument(level = "info", skip(self), fields(address = ?self.address()))]
    pub async fn read_serial(&self) -> Result<SerialInfo> {
        const OP: &str = "read_serial";
        let payload = self
            .request(OP, command::encode_serial_request(), ResponseKind::Serial)
            .await?;
        parse::parse_serial(&payload).map_err(|e| Error::decode(OP, e))
    }

    // --- Internals ---

    async fn status_command(&self, operation: &'static str, frame: Command) -> Result<StatusSnapshot> {
        let payload = self.request(operation, frame, ResponseKind::Status).await?;
        let status = parse::parse_status(&payload).map_err(|e| Error::decode(operation, e))?;
        *self.last_status.lock().unwrap_or_else(|e| e.into_inner()) = Some(status);
        Ok(status)
    }

    /// Write `frame` and wait for a response of `kind`.
    async fn request(
        &self,
        operation: &'static str,
        frame: Command,
        kind: ResponseKind,
    ) -> Result<Bytes> {
        let _busy = self.in_flight.lock().await;
        self.connection.ensure_connected()?;

        let mailbox = self.connection.link().mailbox();
        mailbox.clear();
        debug!(operation, frame = %format_hex(frame.as_bytes()), "Writing command");
        self.transport().write(frame.as_bytes()).await?;

        let settle = self.config().response_settle;
        match mailbox.wait_for(kind, settle).await {
            Outcome::Matched(payload) => Ok(payload),
            Outcome::Mismatched(payload) => {
                Err(Error::decode(operation, kind.mismatch(payload.len())))
            }
            Outcome::Empty => Err(Error::response_timeout(operation, settle)),
            Outcome::Interrupted => Err(Error::NotConnected),
        }
    }
}
