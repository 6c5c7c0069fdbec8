//! Device discovery.
//!
//! Scanning is stateless: it listens for advertisements for a fixed time,
//! keeps addresses under the eQ-3 vendor prefix and reports each address
//! once, in the order it was first seen.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info};

use eqiva_types::DeviceAddress;

use crate::error::Result;
use crate::guard::ScanGuard;
use crate::transport::{EventHandler, Transport, TransportEvent};

/// A thermostat seen during a scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    /// Device address.
    pub address: DeviceAddress,
    /// Signal strength of the first advertisement, in dBm.
    pub rssi: Option<i16>,
}

/// Options for scanning.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// How long to listen for advertisements.
    pub duration: Duration,
    /// Only return devices under the eQ-3 vendor prefix.
    pub filter_eq3_only: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(10),
            filter_eq3_only: true,
        }
    }
}

impl ScanOptions {
    /// Create new scan options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the scan duration.
    #[must_use]
    pub fn duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    /// Set scan duration in seconds.
    #[must_use]
    pub fn duration_secs(mut self, secs: u64) -> Self {
        self.duration = Duration::from_secs(secs);
        self
    }

    /// Report every advertiser, not just eQ-3 devices.
    #[must_use]
    pub fn all_devices(mut self) -> Self {
        self.filter_eq3_only = false;
        self
    }
}

/// Collects advertisements into a de-duplicated list.
#[derive(Debug, Default)]
struct Collector {
    filter_eq3_only: bool,
    found: Mutex<Vec<DiscoveredDevice>>,
}

impl Collector {
    fn record(&self, address: DeviceAddress, rssi: Option<i16>) {
        if self.filter_eq3_only && !address.is_eq3() {
            return;
        }
        let mut found = self.found.lock().unwrap_or_else(|e| e.into_inner());
        if found.iter().any(|d| d.address == address) {
            return;
        }
        info!(%address, ?rssi, "Found Eqiva thermostat");
        found.push(DiscoveredDevice { address, rssi });
    }

    fn take(&self) -> Vec<DiscoveredDevice> {
        std::mem::take(&mut *self.found.lock().unwrap_or_else(|e| e.into_inner()))
    }
}

/// Scan for thermostats through `transport`.
///
/// Advertisements go to a collector for the duration of the scan; every
/// other event still reaches `session`, which is reinstalled as the
/// transport's sole handler on every exit path.
#[tracing::instrument(level = "info", skip_all, fields(duration = ?options.duration))]
pub async fn scan_with<T: Transport + 'static>(
    transport: &Arc<T>,
    session: EventHandler,
    options: ScanOptions,
) -> Result<Vec<DiscoveredDevice>> {
    let collector = Arc::new(Collector {
        filter_eq3_only: options.filter_eq3_only,
        found: Mutex::default(),
    });

    let sink = Arc::clone(&collector);
    let passthrough = Arc::clone(&session);
    let redirect: EventHandler = Arc::new(move |event| match event {
        TransportEvent::Advertisement { address, rssi } => sink.record(address, rssi),
        other => passthrough(other),
    });
    let mut guard = ScanGuard::redirect(Arc::clone(transport), redirect, session);

    info!("Starting BLE scan for {} seconds...", options.duration.as_secs());
    transport.start_scan().await?;
    guard.set_scanning(true);

    sleep(options.duration).await;

    transport.stop_scan().await?;
    guard.set_scanning(false);
    drop(guard);

    let devices = collector.take();
    debug!("Scan complete. Found {} device(s)", devices.len());
    Ok(devices)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn addr(s: &str) -> DeviceAddress {
        s.parse().unwrap()
    }

    fn session_counter() -> (Arc<AtomicUsize>, EventHandler) {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&count);
        (
            count,
            Arc::new(move |_| {
                seen.fetch_add(1, Ordering::SeqCst);
            }),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_filters_and_dedups() {
        let transport = Arc::new(
            MockTransport::new()
                .with_advertisement(addr("00:1A:22:00:00:01"), Some(-70))
                .with_advertisement(addr("AA:BB:CC:00:00:02"), Some(-40))
                .with_advertisement(addr("00:1A:22:00:00:01"), Some(-65))
                .with_advertisement(addr("00:1A:22:00:00:03"), None),
        );
        let (_, session) = session_counter();

        let devices = scan_with(&transport, session, ScanOptions::default())
            .await
            .unwrap();

        assert_eq!(
            devices,
            vec![
                DiscoveredDevice {
                    address: addr("00:1A:22:00:00:01"),
                    rssi: Some(-70)
                },
                DiscoveredDevice {
                    address: addr("00:1A:22:00:00:03"),
                    rssi: None
                },
            ]
        );
        assert!(!transport.is_scanning());
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_all_devices() {
        let transport = Arc::new(
            MockTransport::new().with_advertisement(addr("AA:BB:CC:00:00:02"), Some(-40)),
        );
        let (_, session) = session_counter();

        let devices = scan_with(&transport, session, ScanOptions::new().all_devices())
            .await
            .unwrap();
        assert_eq!(devices.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_takes_configured_duration() {
        let transport = Arc::new(MockTransport::new());
        let (_, session) = session_counter();

        let start = tokio::time::Instant::now();
        let devices = scan_with(&transport, session, ScanOptions::new().duration_secs(3))
            .await
            .unwrap();
        assert!(devices.is_empty());
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_handler_restored() {
        let transport = Arc::new(
            MockTransport::new().with_advertisement(addr("00:1A:22:00:00:01"), None),
        );
        let (count, session) = session_counter();
        transport.set_event_handler(Arc::clone(&session));

        scan_with(&transport, session, ScanOptions::default())
            .await
            .unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // Advertisements after the scan go to the session handler again.
        transport.start_scan().await.unwrap();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
