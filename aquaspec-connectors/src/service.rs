//! The async ingest service
//!
//! ## Concurrency model
//!
//! One bounded mpsc channel carries every inbound message - device
//! samples and cloud RPC alike - and a single task drains it. Each
//! message is processed to completion (including a synchronous model
//! refit when one is due) before the next is taken, which is exactly the
//! sequencing the calibration ping-pong and the baseline-replacement
//! atomicity rely on. No locks are needed because nothing is shared.
//!
//! ## Dispatch
//!
//! Pipeline emissions fan out fire-and-forget:
//!
//! - device commands go to the device sink with the retain flag from
//!   the payload contract
//! - telemetry records go to every record sink (cloud platform and
//!   time-series store)
//! - calibration results go to the status topic - never to the
//!   telemetry topic, where they would read as a sample
//!
//! A sink failure is logged and does not stop processing, retry, or
//! touch pipeline state.

use aquaspec_core::{OutboundEvent, RawSample, TelemetryPipeline};
use aquaspec_ml::ModelStore;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{
    payload::{self, PayloadError},
    rpc::{self, RpcError, RpcRequest},
    AsyncConnector, ConnectorError,
};

/// Boxed connector as used by the service
pub type DynConnector = Box<dyn AsyncConnector<Error = ConnectorError> + Send>;

/// One message from the transport collaborators
#[derive(Debug)]
pub enum Inbound {
    /// A decoded device sample
    Sample(RawSample),
    /// A decoded cloud RPC request
    Rpc(RpcRequest),
}

/// Failures while turning transport traffic into [`Inbound`] messages
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Sample payload rejected at the boundary
    #[error(transparent)]
    Payload(#[from] PayloadError),
    /// RPC payload rejected at the boundary
    #[error(transparent)]
    Rpc(#[from] RpcError),
    /// Traffic on a topic the gateway does not consume
    #[error("no inbound route for topic {0}")]
    UnknownTopic(String),
}

impl Inbound {
    /// Decode one transport message by topic
    ///
    /// Samples are stamped with the current wall clock at this boundary.
    pub fn from_transport(topic: &str, body: &[u8]) -> Result<Self, DecodeError> {
        match topic {
            payload::TOPIC_DATA => Ok(Inbound::Sample(payload::decode_raw_sample(
                body,
                payload::now_millis(),
            )?)),
            payload::TOPIC_RPC => Ok(Inbound::Rpc(rpc::decode_request(body)?)),
            other => Err(DecodeError::UnknownTopic(other.to_owned())),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Capacity of the inbound channel
    pub channel_capacity: usize,
    /// Topic for assembled records
    pub telemetry_topic: String,
    /// Topic for device commands
    pub device_topic: String,
    /// Topic for calibration results
    pub status_topic: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 16,
            telemetry_topic: payload::TOPIC_TELEMETRY.to_owned(),
            device_topic: payload::TOPIC_DEVICE.to_owned(),
            status_topic: payload::TOPIC_STATUS.to_owned(),
        }
    }
}

impl ServiceConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inbound channel capacity
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity.max(1);
        self
    }

    /// Override the telemetry topic
    pub fn telemetry_topic(mut self, topic: impl Into<String>) -> Self {
        self.telemetry_topic = topic.into();
        self
    }

    /// Override the device command topic
    pub fn device_topic(mut self, topic: impl Into<String>) -> Self {
        self.device_topic = topic.into();
        self
    }

    /// Override the status topic
    pub fn status_topic(mut self, topic: impl Into<String>) -> Self {
        self.status_topic = topic.into();
        self
    }
}

/// Owns the pipeline and drives it from the inbound channel
pub struct TelemetryService {
    config: ServiceConfig,
    pipeline: TelemetryPipeline<ModelStore>,
    inbound: mpsc::Receiver<Inbound>,
    device_sink: DynConnector,
    record_sinks: Vec<DynConnector>,
}

impl TelemetryService {
    /// Build the service around a (possibly restored) model store
    ///
    /// The store's persisted baseline, if any, seeds the absorbance
    /// engine so a restart resumes calibrated.
    pub fn new(
        config: ServiceConfig,
        store: ModelStore,
        device_sink: DynConnector,
        record_sinks: Vec<DynConnector>,
    ) -> (Self, mpsc::Sender<Inbound>) {
        let (sender, inbound) = mpsc::channel(config.channel_capacity);
        let pipeline = match store.baseline().copied() {
            Some(baseline) => {
                log::info!("resuming with persisted baseline");
                TelemetryPipeline::with_baseline(store, baseline)
            }
            None => {
                log::info!("no persisted baseline; starting uncalibrated");
                TelemetryPipeline::new(store)
            }
        };
        (
            Self {
                config,
                pipeline,
                inbound,
                device_sink,
                record_sinks,
            },
            sender,
        )
    }

    /// The pipeline, for inspection in tests and health endpoints
    pub fn pipeline(&self) -> &TelemetryPipeline<ModelStore> {
        &self.pipeline
    }

    /// Drain the inbound channel until every sender is gone
    pub async fn run(mut self) {
        while let Some(message) = self.inbound.recv().await {
            self.handle(message).await;
        }
        log::info!("inbound channel closed; service stopping");
    }

    async fn handle(&mut self, message: Inbound) {
        let emitted = match message {
            Inbound::Sample(sample) => self.pipeline.process_sample(sample),
            Inbound::Rpc(request) => match rpc::map_request(&request) {
                Ok(command) => self.pipeline.handle_command(command),
                Err(err) => {
                    log::warn!("RPC request dropped: {}", err);
                    return;
                }
            },
        };
        for event in emitted {
            self.dispatch(event).await;
        }
    }

    async fn dispatch(&mut self, event: OutboundEvent) {
        match event {
            OutboundEvent::Device(command) => {
                let (body, retain) = payload::encode_device_command(&command);
                let bytes = body.to_string().into_bytes();
                if let Err(err) = self
                    .device_sink
                    .publish(&self.config.device_topic, &bytes, retain)
                    .await
                {
                    log::warn!("device command {} not delivered: {}", command.name(), err);
                }
            }
            OutboundEvent::Record(record) => {
                let bytes = payload::encode_record(&record).to_string().into_bytes();
                for sink in self.record_sinks.iter_mut() {
                    if let Err(err) = sink
                        .publish(&self.config.telemetry_topic, &bytes, false)
                        .await
                    {
                        log::warn!("telemetry record not delivered: {}", err);
                    }
                }
            }
            OutboundEvent::CalibrationFinished { success } => {
                log::info!("calibration finished, success={}", success);
                let bytes = payload::encode_calibration_result(success, payload::now_millis())
                    .to_string()
                    .into_bytes();
                for sink in self.record_sinks.iter_mut() {
                    if let Err(err) = sink
                        .publish(&self.config.status_topic, &bytes, false)
                        .await
                    {
                        log::warn!("calibration result not delivered: {}", err);
                    }
                }
            }
        }
    }
}
