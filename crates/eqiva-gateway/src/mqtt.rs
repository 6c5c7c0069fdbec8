//! MQTT front end of the gateway.
//!
//! # Topic Structure
//!
//! The gateway subscribes to:
//!
//! - `{device_name}/radin/scan` - any message triggers a scan
//! - `{device_name}/radin/trv` - a thermostat request (see [`crate::request`])
//!
//! and publishes to:
//!
//! - `{device_name}/radout/devlist` - scan results, `{"devices": [...]}`
//! - `{device_name}/radout/status` - command results or `{"error": "..."}`
//!
//! # Reconnection
//!
//! The client reconnects on its own when the broker connection drops and
//! re-subscribes after every `ConnAck`. BLE work runs on a separate worker
//! task so the MQTT event loop keeps being polled while a thermostat
//! request is in progress.

use std::sync::Arc;
use std::time::Duration;

use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use eqiva_core::Transport;

use crate::config::{MqttConfig, parse_broker_url};
use crate::handler::Gateway;

/// Requests waiting for the BLE worker.
const QUEUE_DEPTH: usize = 8;

/// Delay before polling again after a broker connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// MQTT errors.
#[derive(Debug, thiserror::Error)]
pub enum MqttError {
    #[error("Invalid MQTT broker URL: {0}")]
    InvalidBroker(String),
}

/// The gateway's topics under one device name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// Scan trigger.
    pub scan: String,
    /// Thermostat requests.
    pub trv: String,
    /// Scan results.
    pub devlist: String,
    /// Command results.
    pub status: String,
}

impl Topics {
    /// Topics rooted at `device_name`.
    pub fn new(device_name: &str) -> Self {
        Self {
            scan: format!("{device_name}/radin/scan"),
            trv: format!("{device_name}/radin/trv"),
            devlist: format!("{device_name}/radout/devlist"),
            status: format!("{device_name}/radout/status"),
        }
    }

    /// Classify an incoming message.
    pub fn route(&self, topic: &str, payload: &[u8]) -> Option<Job> {
        if topic == self.scan {
            Some(Job::Scan)
        } else if topic == self.trv {
            Some(Job::Thermostat(payload.to_vec()))
        } else {
            None
        }
    }
}

/// Work for the BLE worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Scan for thermostats.
    Scan,
    /// Run a thermostat request.
    Thermostat(Vec<u8>),
}

/// Build client options from configuration.
pub fn mqtt_options(config: &MqttConfig) -> Result<MqttOptions, MqttError> {
    let (host, port, use_tls) = parse_broker_url(&config.broker).map_err(MqttError::InvalidBroker)?;

    let mut options = MqttOptions::new(&config.client_id, host, port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive));

    if let (Some(username), Some(password)) = (&config.username, &config.password) {
        options.set_credentials(username, password);
    }
    if use_tls {
        options.set_transport(rumqttc::Transport::tls_with_default_config());
    }

    Ok(options)
}

/// Run the gateway until `shutdown` is cancelled.
pub async fn run<T: Transport + 'static>(
    config: &MqttConfig,
    gateway: Arc<Gateway<T>>,
    shutdown: CancellationToken,
) -> Result<(), MqttError> {
    let topics = Topics::new(&config.device_name);
    let (client, mut eventloop) = AsyncClient::new(mqtt_options(config)?, 16);
    let (jobs_tx, jobs_rx) = mpsc::channel(QUEUE_DEPTH);

    info!("Connecting to MQTT broker {}", config.broker);
    let worker = tokio::spawn(run_worker(
        client.clone(),
        gateway,
        topics.clone(),
        jobs_rx,
        shutdown.clone(),
    ));

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                info!("MQTT gateway received stop signal");
                break;
            }
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!("MQTT connected: {:?}", ack.code);
                    subscribe(&client, &topics);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    debug!("Received message on {}", publish.topic);
                    match topics.route(&publish.topic, &publish.payload) {
                        Some(job) => {
                            if let Err(e) = jobs_tx.try_send(job) {
                                warn!("Dropping request, gateway busy: {}", e);
                            }
                        }
                        None => warn!("Unknown topic: {}", publish.topic),
                    }
                }
                Ok(Event::Incoming(Packet::PingResp)) => {
                    debug!("MQTT ping response received");
                }
                Ok(_) => {}
                Err(e) => {
                    warn!("MQTT connection error: {}. Reconnecting...", e);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }
    }

    drop(jobs_tx);
    if let Err(e) = worker.await {
        error!("Gateway worker panicked: {}", e);
    }
    if let Err(e) = client.disconnect().await {
        debug!("Error disconnecting MQTT client: {}", e);
    }

    info!("MQTT gateway stopped");
    Ok(())
}

/// Queue subscriptions to the request topics.
///
/// A failure is logged and the loop keeps running; the next `ConnAck`
/// subscribes again.
fn subscribe(client: &AsyncClient, topics: &Topics) -> usize {
    let mut subscribed = 0;
    for topic in [&topics.scan, &topics.trv] {
        match client.try_subscribe(topic.as_str(), QoS::AtMostOnce) {
            Ok(()) => {
                info!("Subscribed to {}", topic);
                subscribed += 1;
            }
            Err(e) => warn!("Failed to subscribe to {}: {}", topic, e),
        }
    }
    subscribed
}

/// Execute jobs one at a time and publish their results.
async fn run_worker<T: Transport + 'static>(
    client: AsyncClient,
    gateway: Arc<Gateway<T>>,
    topics: Topics,
    mut jobs: mpsc::Receiver<Job>,
    shutdown: CancellationToken,
) {
    loop {
        let job = tokio::select! {
            _ = shutdown.cancelled() => break,
            job = jobs.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        let (topic, response) = match job {
            Job::Scan => (&topics.devlist, gateway.scan().await),
            Job::Thermostat(payload) => (&topics.status, gateway.handle_request(&payload).await),
        };

        debug!("Publishing to {}: {}", topic, response);
        if let Err(e) = client
            .publish(topic.as_str(), QoS::AtMostOnce, false, response.to_string())
            .await
        {
            warn!("Failed to publish to {}: {}", topic, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topics() {
        let topics = Topics::new("flat");
        assert_eq!(topics.scan, "flat/radin/scan");
        assert_eq!(topics.trv, "flat/radin/trv");
        assert_eq!(topics.devlist, "flat/radout/devlist");
        assert_eq!(topics.status, "flat/radout/status");
    }

    #[test]
    fn test_route() {
        let topics = Topics::new("flat");
        assert_eq!(topics.route("flat/radin/scan", b"{}"), Some(Job::Scan));
        assert_eq!(
            topics.route("flat/radin/trv", b"{\"cmd\":\"status\"}"),
            Some(Job::Thermostat(b"{\"cmd\":\"status\"}".to_vec()))
        );
        assert_eq!(topics.route("flat/radout/status", b"{}"), None);
        assert_eq!(topics.route("other/radin/scan", b"{}"), None);
    }

    #[test]
    fn test_mqtt_options() {
        let config = MqttConfig {
            username: Some("heating".to_string()),
            password: Some("secret".to_string()),
            ..MqttConfig::default()
        };
        let options = mqtt_options(&config).unwrap();
        assert_eq!(options.broker_address(), ("localhost".to_string(), 1883));
        assert_eq!(options.keep_alive(), Duration::from_secs(7200));
        assert_eq!(options.client_id(), "eqiva-gateway");
    }

    #[test]
    fn test_subscribe_failure_is_not_fatal() {
        // Capacity 1: the first request fills the queue and the second is refused.
        let (client, _eventloop) = AsyncClient::new(MqttOptions::new("test", "localhost", 1883), 1);
        assert_eq!(subscribe(&client, &Topics::new("flat")), 1);
    }

    #[test]
    fn test_mqtt_options_invalid_broker() {
        let config = MqttConfig {
            broker: "tcp://localhost".to_string(),
            ..MqttConfig::default()
        };
        assert!(matches!(
            mqtt_options(&config),
            Err(MqttError::InvalidBroker(_))
        ));
    }
}
