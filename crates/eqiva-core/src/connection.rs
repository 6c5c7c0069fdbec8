//! Connection lifecycle.
//!
//! A [`Connection`] owns the transport, the device address and the
//! [`ConnectionState`]. State changes come from two directions: the
//! connect/disconnect calls made here, and [`TransportEvent`]s reported by
//! the transport through [`Link::handle_event`].

use std::sync::{Arc, Mutex};

use serde::Serialize;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use eqiva_types::DeviceAddress;

use crate::config::SessionConfig;
use crate::correlator::Mailbox;
use crate::error::{Error, Result};
use crate::transport::{EventHandler, Transport, TransportEvent};
use crate::util::format_hex;

/// Link state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No link, no attempt in progress.
    #[default]
    Disconnected,
    /// A connect call is waiting for the link.
    Connecting,
    /// The link is up and notifications are routed to the mailbox.
    Connected,
}

#[derive(Debug, Default)]
struct LinkState {
    state: ConnectionState,
    address: Option<DeviceAddress>,
}

/// State shared between a session and its transport's event handler.
#[derive(Debug, Default)]
pub struct Link {
    inner: Mutex<LinkState>,
    mailbox: Mailbox,
}

impl Link {
    /// Create a disconnected link.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Address of the current or last attempted device.
    pub fn address(&self) -> Option<DeviceAddress> {
        self.lock().address
    }

    /// The response mailbox fed by notifications.
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    /// Apply a transport event.
    pub fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected(address) => {
                let mut inner = self.lock();
                if inner.state == ConnectionState::Connecting && inner.address == Some(address) {
                    inner.state = ConnectionState::Connected;
                    debug!(%address, "Link up");
                } else {
                    debug!(%address, state = ?inner.state, "Ignoring unexpected link-up");
                }
            }
            TransportEvent::Disconnected(address) => {
                let was = std::mem::replace(&mut self.lock().state, ConnectionState::Disconnected);
                if was == ConnectionState::Connected {
                    info!(%address, "Link lost");
                }
                self.mailbox.interrupt();
            }
            TransportEvent::Notification(payload) => {
                debug!(data = %format_hex(&payload), "Notification");
                self.mailbox.deliver(payload);
            }
            TransportEvent::Advertisement { .. } => {}
        }
    }

    /// Build a transport event handler feeding this link.
    pub fn event_handler(self: &Arc<Self>) -> EventHandler {
        let link = Arc::clone(self);
        Arc::new(move |event| link.handle_event(event))
    }

    fn set(&self, state: ConnectionState, address: Option<DeviceAddress>) {
        let mut inner = self.lock();
        inner.state = state;
        if address.is_some() {
            inner.address = address;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LinkState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Connection state machine over a [`Transport`].
pub struct Connection<T: Transport> {
    transport: Arc<T>,
    link: Arc<Link>,
    config: SessionConfig,
}

impl<T: Transport> std::fmt::Debug for Connection<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("link", &self.link)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<T: Transport> Connection<T> {
    /// Wrap `transport` and route its events into a fresh [`Link`].
    pub fn new(transport: Arc<T>, config: SessionConfig) -> Self {
        let link = Arc::new(Link::new());
        transport.set_event_handler(link.event_handler());
        Self {
            transport,
            link,
            config,
        }
    }

    /// The underlying transport.
    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    /// The shared link state.
    pub fn link(&self) -> &Arc<Link> {
        &self.link
    }

    /// The timing policy.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.link.state()
    }

    /// Fail with [`Error::NotConnected`] unless the link is up.
    pub fn ensure_connected(&self) -> Result<()> {
        match self.state() {
            ConnectionState::Connected => Ok(()),
            _ => Err(Error::NotConnected),
        }
    }

    /// Connect to `address`, trying up to `max_attempts` times.
    ///
    /// An existing link is dropped first. Each attempt asks the transport to
    /// connect and then checks the link `connect_polls` times,
    /// `connect_poll_interval` apart. A failed attempt is followed by
    /// `connect_backoff` unless it was the last one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionFailed`] once every attempt has failed, or
    /// [`Error::InvalidConfig`] if `max_attempts` is zero.
    #[tracing::instrument(level = "info", skip(self), fields(address = %address))]
    pub async fn connect(&self, address: DeviceAddress, max_attempts: u32) -> Result<()> {
        if max_attempts == 0 {
            return Err(Error::invalid_config("max_attempts must be at least 1"));
        }
        if self.state() == ConnectionState::Connected {
            if let Err(e) = self.disconnect().await {
                warn!(error = %e, "Failed to drop previous link");
            }
        }

        for attempt in 1..=max_attempts {
            // A link drop reported during an earlier attempt resets the state.
            self.link.set(ConnectionState::Connecting, Some(address));
            info!(attempt, max_attempts, "Connection attempt");
            match self.transport.connect(address).await {
                Ok(()) => {
                    if self.wait_for_link().await {
                        info!(attempt, "Connected");
                        return Ok(());
                    }
                    warn!(
                        attempt,
                        window = ?self.config.attempt_window(),
                        "Link did not come up"
                    );
                }
                Err(e) => warn!(attempt, error = %e, "Connection attempt failed"),
            }
            if attempt < max_attempts {
                debug!(backoff = ?self.config.connect_backoff, "Waiting before retry");
                sleep(self.config.connect_backoff).await;
            }
        }

        // Cancel a link that might still come up late.
        if let Err(e) = self.transport.disconnect().await {
            debug!(error = %e, "Cancelling pending link failed");
        }
        self.link.set(ConnectionState::Disconnected, None);
        Err(Error::ConnectionFailed {
            address,
            attempts: max_attempts,
        })
    }

    async fn wait_for_link(&self) -> bool {
        for _ in 0..self.config.connect_polls {
            if self.state() == ConnectionState::Connected {
                return true;
            }
            sleep(self.config.connect_poll_interval).await;
        }
        self.state() == ConnectionState::Connected
    }

    /// Drop the link.
    ///
    /// If a link is held (or being established) the transport is asked to
    /// disconnect and the session waits `disconnect_settle`. The state is
    /// `Disconnected` afterwards even if the transport reports an error.
    /// Calling this while disconnected does nothing.
    #[tracing::instrument(level = "info", skip(self), fields(address = ?self.link.address()))]
    pub async fn disconnect(&self) -> Result<()> {
        if self.state() == ConnectionState::Disconnected {
            return Ok(());
        }

        info!("Disconnecting from device...");
        let result = self.transport.disconnect().await;
        sleep(self.config.disconnect_settle).await;
        self.link.set(ConnectionState::Disconnected, None);
        self.link.mailbox.interrupt();
        result
    }
}
