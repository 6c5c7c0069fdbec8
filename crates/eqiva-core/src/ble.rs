//! btleplug-backed [`Transport`].
//!
//! The transport looks the thermostat up among the adapter's known
//! peripherals (scanning briefly if it has not been seen yet), connects,
//! discovers services, subscribes to the notification characteristic and
//! forwards every notification to the installed [`EventHandler`]. Adapter
//! events are watched in a background task so that advertisements and
//! unsolicited link drops reach the session too.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Manager, Peripheral, PeripheralId};
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use eqiva_types::DeviceAddress;
use eqiva_types::uuid::{COMMAND, NOTIFY};

use crate::error::{Error, Result};
use crate::transport::{EventHandler, Transport, TransportEvent};
use crate::util::{device_address, format_hex};

/// Default timeout for locating a peripheral the adapter has not seen yet.
const DEFAULT_LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for BLE connection operations.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for service discovery.
const DEFAULT_DISCOVERY_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for BLE characteristic write operations.
const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Interval between peripheral lookups while scanning for a device.
const LOOKUP_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Timeouts for the btleplug transport.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use eqiva_core::ble::BleConfig;
///
/// let config = BleConfig::default().connection_timeout(Duration::from_secs(20));
/// ```
#[derive(Debug, Clone)]
pub struct BleConfig {
    /// Timeout for finding a peripheral the adapter does not know yet.
    pub lookup_timeout: Duration,
    /// Timeout for establishing a BLE connection.
    pub connection_timeout: Duration,
    /// Timeout for service discovery after connection.
    pub discovery_timeout: Duration,
    /// Timeout for BLE write operations.
    pub write_timeout: Duration,
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            connection_timeout: DEFAULT_CONNECT_TIMEOUT,
            discovery_timeout: DEFAULT_DISCOVERY_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl BleConfig {
    /// Create a config for challenging RF environments.
    pub fn challenging_environment() -> Self {
        Self {
            lookup_timeout: Duration::from_secs(15),
            connection_timeout: Duration::from_secs(25),
            discovery_timeout: Duration::from_secs(15),
            write_timeout: Duration::from_secs(10),
        }
    }

    /// Set the peripheral lookup timeout.
    #[must_use]
    pub fn lookup_timeout(mut self, timeout: Duration) -> Self {
        self.lookup_timeout = timeout;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Set the service discovery timeout.
    #[must_use]
    pub fn discovery_timeout(mut self, timeout: Duration) -> Self {
        self.discovery_timeout = timeout;
        self
    }

    /// Set the write timeout.
    #[must_use]
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

/// State shared with the background tasks.
#[derive(Default)]
struct Shared {
    handler: RwLock<Option<EventHandler>>,
    scanning: AtomicBool,
    current: RwLock<Option<(PeripheralId, DeviceAddress)>>,
}

impl Shared {
    fn emit(&self, event: TransportEvent) {
        let handler = self
            .handler
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        if let Some(handler) = handler {
            handler(event);
        }
    }

    fn current(&self) -> Option<(PeripheralId, DeviceAddress)> {
        self.current
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn set_current(&self, current: Option<(PeripheralId, DeviceAddress)>) {
        *self.current.write().unwrap_or_else(|e| e.into_inner()) = current;
    }
}

/// An established link.
struct ActiveLink {
    peripheral: Peripheral,
    address: DeviceAddress,
    command: Characteristic,
    notification_task: JoinHandle<()>,
}

/// Transport over the first Bluetooth adapter of the host.
///
/// # Cleanup
///
/// Dropping the transport stops its background tasks but does not
/// disconnect; call [`Transport::disconnect`] (or let the session do it)
/// first.
pub struct BleTransport {
    adapter: Adapter,
    config: BleConfig,
    shared: Arc<Shared>,
    active: Mutex<Option<ActiveLink>>,
    events_task: JoinHandle<()>,
}

impl std::fmt::Debug for BleTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BleTransport")
            .field("config", &self.config)
            .field("current", &self.shared.current().map(|(_, address)| address))
            .finish_non_exhaustive()
    }
}

/// Get the first available Bluetooth adapter.
pub async fn get_adapter() -> Result<Adapter> {
    let manager = Manager::new().await?;
    let adapters = manager.adapters().await?;

    adapters
        .into_iter()
        .next()
        .ok_or_else(|| Error::device_not_found("no Bluetooth adapter available"))
}

impl BleTransport {
    /// Open the first adapter with default timeouts.
    pub async fn new() -> Result<Self> {
        Self::with_config(BleConfig::default()).await
    }

    /// Open the first adapter with custom timeouts.
    pub async fn with_config(config: BleConfig) -> Result<Self> {
        let adapter = get_adapter().await?;
        Self::from_adapter(adapter, config).await
    }

    /// Use an already opened adapter.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn from_adapter(adapter: Adapter, config: BleConfig) -> Result<Self> {
        let shared = Arc::new(Shared::default());
        let events = adapter.events().await?;
        let events_task = tokio::spawn(watch_adapter(
            adapter.clone(),
            events,
            Arc::clone(&shared),
        ));

        Ok(Self {
            adapter,
            config,
            shared,
            active: Mutex::new(None),
            events_task,
        })
    }

    /// Find the peripheral with `address`, scanning if the adapter has not
    /// seen it yet.
    async fn find_peripheral(&self, address: DeviceAddress) -> Result<Peripheral> {
        if let Some(peripheral) = self.known_peripheral(address).await? {
            return Ok(peripheral);
        }

        info!(%address, "Device not cached, scanning");
        let was_scanning = self.shared.scanning.load(Ordering::SeqCst);
        if !was_scanning {
            self.adapter.start_scan(ScanFilter::default()).await?;
        }
        let found = timeout(self.config.lookup_timeout, async {
            loop {
                if let Some(peripheral) = self.known_peripheral(address).await? {
                    return Ok::<_, Error>(peripheral);
                }
                sleep(LOOKUP_POLL_INTERVAL).await;
            }
        })
        .await;
        if !was_scanning {
            self.adapter.stop_scan().await?;
        }

        match found {
            Ok(result) => result,
            Err(_) => Err(Error::device_not_found(address.to_string())),
        }
    }

    async fn known_peripheral(&self, address: DeviceAddress) -> Result<Option<Peripheral>> {
        for peripheral in self.adapter.peripherals().await? {
            if device_address(peripheral.address()) == address {
                return Ok(Some(peripheral));
            }
        }
        Ok(None)
    }

    async fn open_link(&self, address: DeviceAddress, peripheral: Peripheral) -> Result<ActiveLink> {
        timeout(self.config.connection_timeout, peripheral.connect())
            .await
            .map_err(|_| Error::transport(format!("connect to {address} timed out")))??;

        timeout(self.config.discovery_timeout, peripheral.discover_services())
            .await
            .map_err(|_| Error::transport("service discovery timed out"))??;

        let characteristics = peripheral.characteristics();
        let find = |uuid: uuid::Uuid| {
            characteristics
                .iter()
                .find(|c| c.uuid == uuid)
                .cloned()
                .ok_or_else(|| {
                    Error::characteristic_not_found(uuid.to_string(), peripheral.services().len())
                })
        };
        let command = find(COMMAND)?;
        let notify = find(NOTIFY)?;

        peripheral.subscribe(&notify).await?;
        let mut stream = peripheral.notifications().await?;
        let shared = Arc::clone(&self.shared);
        let notification_task = tokio::spawn(async move {
            while let Some(notification) = stream.next().await {
                if notification.uuid == NOTIFY {
                    shared.emit(TransportEvent::Notification(Bytes::from(notification.value)));
                }
            }
        });

        Ok(ActiveLink {
            peripheral,
            address,
            command,
            notification_task,
        })
    }
}

impl Drop for BleTransport {
    fn drop(&mut self) {
        self.events_task.abort();
    }
}

/// Map adapter events onto transport events.
async fn watch_adapter(
    adapter: Adapter,
    mut events: std::pin::Pin<Box<dyn futures::Stream<Item = CentralEvent> + Send>>,
    shared: Arc<Shared>,
) {
    while let Some(event) = events.next().await {
        match event {
            CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                if !shared.scanning.load(Ordering::SeqCst) {
                    continue;
                }
                let Ok(peripheral) = adapter.peripheral(&id).await else {
                    continue;
                };
                match peripheral.properties().await {
                    Ok(Some(props)) => shared.emit(TransportEvent::Advertisement {
                        address: device_address(props.address),
                        rssi: props.rssi,
                    }),
                    Ok(None) => {}
                    Err(e) => debug!("Error reading peripheral properties: {}", e),
                }
            }
            CentralEvent::DeviceDisconnected(id) => {
                if let Some((current, address)) = shared.current()
                    && current == id
                {
                    warn!(%address, "Device disconnected");
                    shared.set_current(None);
                    shared.emit(TransportEvent::Disconnected(address));
                }
            }
            _ => {}
        }
    }
}

#[async_trait]
impl Transport for BleTransport {
    fn set_event_handler(&self, handler: EventHandler) {
        *self
            .shared
            .handler
            .write()
            .unwrap_or_else(|e| e.into_inner()) = Some(handler);
    }

    #[tracing::instrument(level = "info", skip(self), fields(address = %address))]
    async fn connect(&self, address: DeviceAddress) -> Result<()> {
        let mut active = self.active.lock().await;
        if let Some(link) = active.as_ref()
            && link.address == address
            && link.peripheral.is_connected().await.unwrap_or(false)
        {
            self.shared.emit(TransportEvent::Connected(address));
            return Ok(());
        }

        let peripheral = self.find_peripheral(address).await?;
        let id = peripheral.id();
        let link = match self.open_link(address, peripheral.clone()).await {
            Ok(link) => link,
            Err(e) => {
                if let Err(e) = peripheral.disconnect().await {
                    debug!("Cleanup disconnect failed: {}", e);
                }
                return Err(e);
            }
        };

        if let Some(old) = active.replace(link) {
            old.notification_task.abort();
        }
        self.shared.set_current(Some((id, address)));
        info!("Connected and subscribed");
        self.shared.emit(TransportEvent::Connected(address));
        Ok(())
    }

    #[tracing::instrument(level = "info", skip(self))]
    async fn disconnect(&self) -> Result<()> {
        let Some(link) = self.active.lock().await.take() else {
            return Ok(());
        };
        link.notification_task.abort();
        self.shared.set_current(None);
        let result = link.peripheral.disconnect().await;
        self.shared.emit(TransportEvent::Disconnected(link.address));
        result.map_err(Error::from)
    }

    async fn write(&self, data: &[u8]) -> Result<()> {
        let active = self.active.lock().await;
        let link = active.as_ref().ok_or(Error::NotConnected)?;

        debug!(data = %format_hex(data), "Writing command");
        timeout(
            self.config.write_timeout,
            link.peripheral
                .write(&link.command, data, WriteType::WithResponse),
        )
        .await
        .map_err(|_| Error::transport(format!("write timed out after {:?}", self.config.write_timeout)))??;
        Ok(())
    }

    async fn start_scan(&self) -> Result<()> {
        self.shared.scanning.store(true, Ordering::SeqCst);
        if let Err(e) = self.adapter.start_scan(ScanFilter::default()).await {
            self.shared.scanning.store(false, Ordering::SeqCst);
            return Err(e.into());
        }
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.shared.scanning.store(false, Ordering::SeqCst);
        self.adapter.stop_scan().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = BleConfig::default();
        assert_eq!(config.lookup_timeout, Duration::from_secs(5));
        assert_eq!(config.connection_timeout, Duration::from_secs(10));
        assert_eq!(config.write_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_builder() {
        let config = BleConfig::challenging_environment()
            .write_timeout(Duration::from_secs(3))
            .discovery_timeout(Duration::from_secs(7));
        assert_eq!(config.write_timeout, Duration::from_secs(3));
        assert_eq!(config.discovery_timeout, Duration::from_secs(7));
        assert_eq!(config.connection_timeout, Duration::from_secs(25));
    }

    #[test]
    fn test_shared_emit_without_handler() {
        let shared = Shared::default();
        shared.emit(TransportEvent::Notification(Bytes::from_static(&[1])));
    }

    #[test]
    fn test_shared_emit_reaches_handler() {
        use std::sync::atomic::AtomicUsize;

        let shared = Shared::default();
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        *shared.handler.write().unwrap() = Some(Arc::new(move |_| {
            seen.fetch_add(1, Ordering::SeqCst);
        }));
        shared.emit(TransportEvent::Notification(Bytes::from_static(&[1])));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
