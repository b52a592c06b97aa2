//! Cloud RPC decoding
//!
//! The cloud platform addresses the gateway with `{method, params}`
//! requests. This module owns the method table: two methods are
//! interpreted by the core (`setTarget`, `calibrate`), the rest are
//! device-mode pass-throughs forwarded verbatim.
//!
//! | method | action |
//! |---|---|
//! | `setTarget` | update the ambient training label |
//! | `calibrate` | start a session (param = sample count, default 10) |
//! | `setIdle` | forward idle mode |
//! | `startTraining` | forward continuous sampling mode |
//! | `deepSleep` | forward sleep (param = minutes) |
//! | `singleMeasure` | forward one-shot measurement |
//! | `startOTA` | forward firmware update |

use aquaspec_core::{calibration::DEFAULT_SAMPLE_TARGET, Command, DeviceCommand};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

/// RPC decoding and mapping failures
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RpcError {
    /// The method name is not in the table
    #[error("unknown method: {0}")]
    UnknownMethod(String),

    /// The method is known but its parameter is unusable
    #[error("invalid parameters for {method}: {reason}")]
    InvalidParams {
        /// The method that rejected its parameter
        method: &'static str,
        /// What was wrong with it
        reason: &'static str,
    },

    /// The request body is not valid JSON
    #[error("request is not valid JSON: {0}")]
    Json(String),
}

/// One decoded RPC request
#[derive(Debug, Clone, Deserialize)]
pub struct RpcRequest {
    /// Method name from the table
    pub method: String,
    /// Optional single parameter
    #[serde(default)]
    pub params: Option<Value>,
}

/// Parse a raw RPC payload
pub fn decode_request(payload: &[u8]) -> Result<RpcRequest, RpcError> {
    serde_json::from_slice(payload).map_err(|err| RpcError::Json(err.to_string()))
}

/// Map a request onto a core command
pub fn map_request(request: &RpcRequest) -> Result<Command, RpcError> {
    let params = request.params.as_ref();
    match request.method.as_str() {
        "setTarget" => {
            let label = params
                .and_then(Value::as_str)
                .filter(|label| !label.is_empty())
                .map(str::to_owned);
            Ok(Command::SetTarget(label))
        }
        "calibrate" => {
            let target = match params {
                None | Some(Value::Null) => DEFAULT_SAMPLE_TARGET,
                Some(value) => value
                    .as_u64()
                    .map(|n| n as u32)
                    .ok_or(RpcError::InvalidParams {
                        method: "calibrate",
                        reason: "sample count must be a non-negative integer",
                    })?,
            };
            Ok(Command::Calibrate { target })
        }
        "setIdle" => Ok(Command::Device(DeviceCommand::SetIdle)),
        "startTraining" => Ok(Command::Device(DeviceCommand::StartTraining)),
        "deepSleep" => {
            let minutes =
                params
                    .and_then(Value::as_u64)
                    .ok_or(RpcError::InvalidParams {
                        method: "deepSleep",
                        reason: "duration in minutes is required",
                    })?;
            Ok(Command::Device(DeviceCommand::DeepSleep {
                duration_sec: (minutes as u32).saturating_mul(60),
            }))
        }
        "singleMeasure" => Ok(Command::Device(DeviceCommand::SingleMeasure)),
        "startOTA" => Ok(Command::Device(DeviceCommand::StartOta)),
        other => Err(RpcError::UnknownMethod(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(method: &str, params: Option<Value>) -> RpcRequest {
        RpcRequest {
            method: method.to_owned(),
            params,
        }
    }

    #[test]
    fn set_target_carries_the_label() {
        assert_eq!(
            map_request(&request("setTarget", Some(json!("Chlorine")))),
            Ok(Command::SetTarget(Some("Chlorine".to_owned())))
        );
        // empty and missing labels both clear
        assert_eq!(
            map_request(&request("setTarget", Some(json!("")))),
            Ok(Command::SetTarget(None))
        );
        assert_eq!(
            map_request(&request("setTarget", None)),
            Ok(Command::SetTarget(None))
        );
    }

    #[test]
    fn calibrate_defaults_to_ten_samples() {
        assert_eq!(
            map_request(&request("calibrate", None)),
            Ok(Command::Calibrate { target: 10 })
        );
        assert_eq!(
            map_request(&request("calibrate", Some(json!(25)))),
            Ok(Command::Calibrate { target: 25 })
        );
        assert!(matches!(
            map_request(&request("calibrate", Some(json!("lots")))),
            Err(RpcError::InvalidParams { .. })
        ));
    }

    #[test]
    fn deep_sleep_converts_minutes_to_seconds() {
        assert_eq!(
            map_request(&request("deepSleep", Some(json!(5)))),
            Ok(Command::Device(DeviceCommand::DeepSleep {
                duration_sec: 300
            }))
        );
        assert!(matches!(
            map_request(&request("deepSleep", None)),
            Err(RpcError::InvalidParams { .. })
        ));
    }

    #[test]
    fn pass_throughs_map_one_to_one() {
        assert_eq!(
            map_request(&request("setIdle", None)),
            Ok(Command::Device(DeviceCommand::SetIdle))
        );
        assert_eq!(
            map_request(&request("startTraining", None)),
            Ok(Command::Device(DeviceCommand::StartTraining))
        );
        assert_eq!(
            map_request(&request("singleMeasure", None)),
            Ok(Command::Device(DeviceCommand::SingleMeasure))
        );
        assert_eq!(
            map_request(&request("startOTA", None)),
            Ok(Command::Device(DeviceCommand::StartOta))
        );
    }

    #[test]
    fn unknown_methods_are_rejected() {
        assert_eq!(
            map_request(&request("selfDestruct", None)),
            Err(RpcError::UnknownMethod("selfDestruct".to_owned()))
        );
    }

    #[test]
    fn decodes_wire_requests() {
        let request = decode_request(br#"{"method": "calibrate", "params": 5}"#).unwrap();
        assert_eq!(request.method, "calibrate");
        assert_eq!(
            map_request(&request),
            Ok(Command::Calibrate { target: 5 })
        );
        assert!(decode_request(b"garbage").is_err());
    }
}
