//! Transport contracts for AquaSpec
//!
//! ## Overview
//!
//! Everything the core exchanges with the outside world crosses this
//! crate as a well-defined data contract:
//!
//! - [`payload`] - the JSON wire formats: device samples in, telemetry
//!   records and device commands out, plus the topic layout
//! - [`rpc`] - cloud-RPC request decoding and the method table mapping
//!   requests onto core commands
//! - [`service`] - the single-task async ingest loop that owns the
//!   pipeline and fans emissions out to the sinks
//! - [`mqtt`] - a thin `rumqttc` link implementing [`AsyncConnector`]
//!   (feature `mqtt`)
//!
//! ## Delivery semantics
//!
//! [`AsyncConnector::publish`] carries an explicit `retain` flag because
//! retained-versus-ephemeral is part of the device contract: mode
//! commands must wait for a sleeping probe, while a calibration read
//! request is only meaningful while its session is alive and must NOT be
//! queued. The transport itself (reconnects, QoS, broker persistence) is
//! the collaborator's problem; sink failures are logged here and never
//! surface back into pipeline state.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod payload;
pub mod rpc;
pub mod service;

#[cfg(feature = "mqtt")]
pub mod mqtt;

// Re-export common types
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttConfig, MqttLink};
pub use service::{Inbound, ServiceConfig, TelemetryService};

use thiserror::Error;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// The underlying transport is not connected
    #[error("not connected")]
    NotConnected,

    /// The transport's outbound queue is full
    #[error("buffer full")]
    BufferFull,

    /// The transport did not answer in time
    #[error("timeout")]
    Timeout,

    /// Protocol-level failure from the transport library
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Invalid connector configuration
    #[error("configuration error: {0}")]
    Config(String),
}

/// Asynchronous publish-side transport
///
/// One implementation per collaborator (device broker, cloud platform,
/// time-series store). Implementations are fire-and-forget from the
/// pipeline's perspective: a failed publish is reported to the caller
/// once and never retried here.
#[async_trait::async_trait]
pub trait AsyncConnector: Send {
    /// Transport-specific error type
    type Error;

    /// Publish one payload to a topic
    ///
    /// `retain` asks the transport to keep the message for absent
    /// subscribers; pass `false` for ephemeral traffic.
    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        retain: bool,
    ) -> Result<(), Self::Error>;

    /// Whether the transport currently believes it is connected
    fn is_connected(&self) -> bool;

    /// Delivery counters for monitoring
    fn stats(&self) -> ConnectionStats;
}

/// Connection statistics common to all connectors
#[derive(Debug, Default, Clone)]
pub struct ConnectionStats {
    /// Total messages sent successfully
    pub messages_sent: u64,
    /// Total messages that failed to send
    pub messages_failed: u64,
    /// Total payload bytes sent
    pub bytes_sent: u64,
    /// Last error message, if any
    pub last_error: Option<String>,
}
