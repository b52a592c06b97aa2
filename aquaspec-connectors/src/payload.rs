//! JSON wire formats and topic layout
//!
//! ## Topics
//!
//! | topic | direction | content |
//! |---|---|---|
//! | [`TOPIC_DATA`] | device → gateway | raw channel map |
//! | [`TOPIC_RPC`] | cloud → gateway | RPC requests |
//! | [`TOPIC_DEVICE`] | gateway → device | command payloads |
//! | [`TOPIC_TELEMETRY`] | gateway → platform | assembled records |
//! | [`TOPIC_STATUS`] | gateway → platform | calibration results |
//!
//! ## Record namespace convention
//!
//! Absorbance values are published under the bare channel names; the raw
//! counts that produced them ride along under a fixed [`RAW_PREFIX`].
//! Collision avoidance is this convention, never runtime negotiation.

use aquaspec_core::{
    channels::{channel_index, RAW_DEFAULT},
    DeviceCommand, RawSample, SpectrumVector, TelemetryRecord, Timestamp,
};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// Raw channel maps published by the device
pub const TOPIC_DATA: &str = "aquaspec/data";

/// Cloud RPC requests addressed to the gateway
pub const TOPIC_RPC: &str = "aquaspec/rpc";

/// Command payloads addressed to the device
pub const TOPIC_DEVICE: &str = "aquaspec/device";

/// Assembled telemetry records
pub const TOPIC_TELEMETRY: &str = "aquaspec/telemetry";

/// Calibration results and other gateway status events
pub const TOPIC_STATUS: &str = "aquaspec/status";

/// Prefix separating raw channel fields from absorbance fields
pub const RAW_PREFIX: &str = "raw_";

/// Wire decoding failures, absorbed at the boundary
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Payload parsed but is not a JSON object
    #[error("payload is not a JSON object")]
    NotAnObject,

    /// A known channel carries a non-numeric value
    #[error("channel {channel} is not numeric")]
    NonNumeric {
        /// The offending channel name
        channel: String,
    },

    /// Payload is not valid JSON at all
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Current wall-clock time in milliseconds, for stamping inbound samples
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis() as Timestamp
}

/// Decode a device sample payload
///
/// Known channels must be numeric; a non-numeric value on one of them
/// rejects the whole sample (it indicates a faulted reading, not
/// metadata). Keys outside the channel set are ignored whatever their
/// type, and channels absent from the payload take the neutral raw
/// default.
pub fn decode_raw_sample(payload: &[u8], timestamp: Timestamp) -> Result<RawSample, PayloadError> {
    let value: Value = serde_json::from_slice(payload)?;
    let object = value.as_object().ok_or(PayloadError::NotAnObject)?;

    let mut pairs = Vec::with_capacity(object.len());
    for (key, entry) in object {
        match entry.as_f64() {
            Some(number) => pairs.push((key.as_str(), number as f32)),
            None if channel_index(key).is_some() => {
                return Err(PayloadError::NonNumeric {
                    channel: key.clone(),
                });
            }
            None => {}
        }
    }
    Ok(RawSample::new(
        SpectrumVector::from_pairs(pairs, RAW_DEFAULT),
        timestamp,
    ))
}

/// Assemble a telemetry record into its outbound JSON object
pub fn encode_record(record: &TelemetryRecord) -> Value {
    let mut fields = Map::new();
    for (name, value) in record.absorbance.iter_named() {
        fields.insert(name.to_owned(), json!(value));
    }
    for (name, value) in record.raw.iter_named() {
        fields.insert(format!("{}{}", RAW_PREFIX, name), json!(value));
    }

    let (pc1, pc2) = record.projection.coords();
    fields.insert(
        "target_label".to_owned(),
        record
            .target_label
            .as_deref()
            .map(|label| json!(label))
            .unwrap_or(Value::Null),
    );
    fields.insert("class".to_owned(), json!(record.classification.label()));
    fields.insert("pc1".to_owned(), json!(pc1));
    fields.insert("pc2".to_owned(), json!(pc2));
    fields.insert("calibrated".to_owned(), json!(record.calibrated));
    fields.insert("ts".to_owned(), json!(record.timestamp));
    Value::Object(fields)
}

/// Encode a device command; the second element is the retain flag
pub fn encode_device_command(command: &DeviceCommand) -> (Value, bool) {
    let payload = match command {
        DeviceCommand::DeepSleep { duration_sec } => json!({
            "cmd": command.name(),
            "duration_sec": duration_sec,
        }),
        DeviceCommand::StartTraining => json!({
            "cmd": command.name(),
            "value": true,
        }),
        _ => json!({ "cmd": command.name() }),
    };
    (payload, !command.is_ephemeral())
}

/// Encode a calibration result for the status topic
pub fn encode_calibration_result(success: bool, timestamp: Timestamp) -> Value {
    json!({
        "event": "calibration",
        "success": success,
        "ts": timestamp,
    })
}
