//! # Control response definitions

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Status of a handled control command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CtrlStatus {
    Ok,
    Error,
    Pong,
}

/// Wire error codes reported to a client when a command is rejected or
/// fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CtrlErrorCode {
    InvalidAction,
    InvalidJson,
    ChannelNotFound,
    MissingParameters,
    SpeedOutOfRange,
    InvalidDirection,
    InvalidCommand,
    LengthMismatch,
    InvalidFormat,
    ExecutionError,
    InternalError,
}

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Response returned to the client for every handled control command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CtrlResponse {
    pub status: CtrlStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Milliseconds since the vehicle software started.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<u64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CtrlErrorCode>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    /// Set when a demanded angle was clamped to a joint's configured range.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clamped_value: Option<f64>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CtrlResponse {
    /// Successful command response.
    pub fn ok(action: &str, timestamp: u64) -> Self {
        Self {
            status: CtrlStatus::Ok,
            action: Some(action.to_string()),
            timestamp: Some(timestamp),
            error: None,
            message: None,
            clamped_value: None,
        }
    }

    /// Heartbeat response.
    pub fn pong(timestamp: u64) -> Self {
        Self {
            status: CtrlStatus::Pong,
            action: None,
            timestamp: Some(timestamp),
            error: None,
            message: None,
            clamped_value: None,
        }
    }

    /// Error response.
    pub fn error<S: Into<String>>(action: Option<&str>, code: CtrlErrorCode, message: S) -> Self {
        Self {
            status: CtrlStatus::Error,
            action: action.map(String::from),
            timestamp: None,
            error: Some(code),
            message: Some(message.into()),
            clamped_value: None,
        }
    }

    /// Attach the clamped angle and a note to a successful response.
    pub fn with_clamped(mut self, demanded: f64, clamped: f64) -> Self {
        self.clamped_value = Some(clamped);
        self.message = Some(format!("Angle clamped from {} to {}", demanded, clamped));
        self
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_response_wire_format() {
        let resp = CtrlResponse::ok("track", 1234);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["action"], "track");
        assert_eq!(json["timestamp"], 1234);
        assert!(json.get("error").is_none());

        let resp = CtrlResponse::error(
            Some("servo"),
            CtrlErrorCode::ChannelNotFound,
            "Servo channel 9 not configured",
        );
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "channel_not_found");

        let resp = CtrlResponse::pong(55);
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "pong");
    }

    #[test]
    fn test_clamped_note() {
        let resp = CtrlResponse::ok("servo", 10).with_clamped(200.0, 180.0);
        assert_eq!(resp.clamped_value, Some(180.0));
        assert!(resp.message.unwrap().contains("clamped"));
    }
}
