//! MQTT link over `rumqttc`
//!
//! A deliberately thin adapter: the broker owns delivery, retained
//! messages and reconnects; this module only maps the [`AsyncConnector`]
//! contract onto a `rumqttc` client and keeps delivery counters. QoS is
//! at-most-once throughout - the system tolerates a lost sample far
//! better than a duplicated calibration read.
//!
//! The returned [`rumqttc::EventLoop`] must be polled by the embedding
//! application; inbound publishes it yields are decoded with
//! [`crate::service::Inbound::from_transport`].

use std::time::Duration;

use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};

use crate::{
    payload::{TOPIC_DATA, TOPIC_RPC},
    AsyncConnector, ConnectionStats, ConnectorError,
};

/// MQTT connection configuration
#[derive(Debug, Clone)]
pub struct MqttConfig {
    /// Broker hostname or address
    pub broker_host: String,
    /// Broker port
    pub broker_port: u16,
    /// MQTT client identifier
    pub client_id: String,
    /// Keep-alive interval
    pub keep_alive: Duration,
    /// Capacity of the client's request queue
    pub queue_capacity: usize,
}

impl MqttConfig {
    /// Configuration with conventional defaults
    pub fn new(broker_host: impl Into<String>, broker_port: u16) -> Self {
        Self {
            broker_host: broker_host.into(),
            broker_port,
            client_id: "aquaspec_gateway".to_owned(),
            keep_alive: Duration::from_secs(60),
            queue_capacity: 32,
        }
    }

    /// Override the client identifier
    pub fn client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Override the keep-alive interval in seconds
    pub fn keep_alive_secs(mut self, secs: u64) -> Self {
        self.keep_alive = Duration::from_secs(secs);
        self
    }

    /// Override the request queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}

/// Publish-side MQTT connector
pub struct MqttLink {
    client: AsyncClient,
    connected: bool,
    stats: ConnectionStats,
}

impl MqttLink {
    /// Create the client; the caller drives the returned event loop
    pub fn connect(config: &MqttConfig) -> (Self, EventLoop) {
        let mut options = MqttOptions::new(
            config.client_id.clone(),
            config.broker_host.clone(),
            config.broker_port,
        );
        options.set_keep_alive(config.keep_alive);
        let (client, event_loop) = AsyncClient::new(options, config.queue_capacity);
        (
            Self {
                client,
                connected: false,
                stats: ConnectionStats::default(),
            },
            event_loop,
        )
    }

    /// Subscribe to the topics the gateway consumes
    pub async fn subscribe_inbound(&self) -> Result<(), ConnectorError> {
        for topic in [TOPIC_DATA, TOPIC_RPC] {
            self.client
                .subscribe(topic, QoS::AtMostOnce)
                .await
                .map_err(|err| ConnectorError::Protocol(err.to_string()))?;
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl AsyncConnector for MqttLink {
    type Error = ConnectorError;

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), ConnectorError> {
        match self
            .client
            .publish(topic, QoS::AtMostOnce, retain, payload)
            .await
        {
            Ok(()) => {
                self.connected = true;
                self.stats.messages_sent += 1;
                self.stats.bytes_sent += payload.len() as u64;
                Ok(())
            }
            Err(err) => {
                self.connected = false;
                self.stats.messages_failed += 1;
                self.stats.last_error = Some(err.to_string());
                Err(ConnectorError::Protocol(err.to_string()))
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn stats(&self) -> ConnectionStats {
        self.stats.clone()
    }
}
