//! # Control command module
//!
//! This module defines the control commands sent to the vehicle by a client,
//! and the parsing which turns a decoded JSON message into a typed command.
//! Parsing is deliberately field-by-field rather than derived, so that every
//! malformed message maps onto one of the wire error codes a client
//! understands.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

mod response;

pub use response::*;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// A control command, i.e. an instruction sent to the vehicle by a client.
#[derive(Debug, Clone, PartialEq)]
pub enum CtrlCmd {
    /// Heartbeat request, answered with a pong.
    Ping,

    /// Track drive command.
    Track(TrackArgs),

    /// Single arm joint command.
    Servo {
        channel: u8,
        angle: f64,
        /// Step linearly toward the target rather than jumping to it.
        smooth: bool,
    },

    /// Whole-arm joint command, one angle per configured joint in channel
    /// order.
    ServoBatch { angles: Vec<f64> },

    /// Return all arm joints to their configured initial angles.
    ServoReset,

    /// Base rotation command.
    Base { direction: BaseDir, speed: f64 },
}

/// Arguments to a track command: either a named manoeuvre with a speed
/// preset, or direct per-track speeds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TrackArgs {
    Named {
        manoeuvre: TrackManoeuvre,
        speed: SpeedPreset,
    },
    Direct {
        left: f64,
        right: f64,
    },
}

/// A named track manoeuvre.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackManoeuvre {
    Forward,
    Backward,
    Left,
    Right,
    Stop,
}

/// A named speed preset, mapped to a percentage by the vehicle's parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeedPreset {
    Slow,
    Medium,
    Fast,
}

/// Base rotation direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaseDir {
    Cw,
    Ccw,
    Stop,
}

/// Possible command parsing errors.
#[derive(Debug, Error)]
pub enum CmdParseError {
    #[error("Command contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Unknown action: {0}")]
    InvalidAction(String),

    #[error("{1}")]
    MissingParameters(&'static str, &'static str),

    #[error("{1}")]
    InvalidFormat(&'static str, String),

    #[error("Unknown command: {0}")]
    InvalidCommand(String),

    #[error("Direction must be 'cw', 'ccw', or 'stop', got '{0}'")]
    InvalidDirection(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CtrlCmd {
    /// Parse a new command from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, CmdParseError> {
        let val: Value = serde_json::from_str(json_str).map_err(CmdParseError::InvalidJson)?;

        Self::from_value(&val)
    }

    /// Parse a new command from an already-decoded JSON value.
    ///
    /// The value must carry a string `action` field naming the command kind;
    /// the remaining fields are kind-specific.
    pub fn from_value(val: &Value) -> Result<Self, CmdParseError> {
        // Get the action of the command
        let action = match val["action"].as_str() {
            Some(s) => s,
            None => {
                return Err(CmdParseError::InvalidAction(String::from(
                    "expected \"action\" to be a string",
                )))
            }
        };

        match action {
            "ping" => Ok(CtrlCmd::Ping),
            "track" => Self::track_from_value(val),
            "servo" => Self::servo_from_value(val),
            "servo_batch" => Self::servo_batch_from_value(val),
            "servo_reset" => Ok(CtrlCmd::ServoReset),
            "base" => Self::base_from_value(val),
            _ => Err(CmdParseError::InvalidAction(action.to_string())),
        }
    }

    /// Parse the arguments of a `track` command.
    ///
    /// A named shorthand (`command` field) takes precedence over direct
    /// per-track speeds; missing direct speeds read as zero.
    fn track_from_value(val: &Value) -> Result<Self, CmdParseError> {
        if !val["command"].is_null() {
            let manoeuvre = match val["command"].as_str() {
                Some("forward") => TrackManoeuvre::Forward,
                Some("backward") => TrackManoeuvre::Backward,
                Some("left") => TrackManoeuvre::Left,
                Some("right") => TrackManoeuvre::Right,
                Some("stop") => TrackManoeuvre::Stop,
                Some(other) => return Err(CmdParseError::InvalidCommand(other.to_string())),
                None => {
                    return Err(CmdParseError::InvalidFormat(
                        "track",
                        String::from("command must be a string"),
                    ))
                }
            };

            // Unrecognised preset names fall back to medium
            let speed = match val["speed"].as_str() {
                Some("slow") => SpeedPreset::Slow,
                Some("fast") => SpeedPreset::Fast,
                _ => SpeedPreset::Medium,
            };

            return Ok(CtrlCmd::Track(TrackArgs::Named { manoeuvre, speed }));
        }

        let left = number_or(val, "track", "left", 0.0)?;
        let right = number_or(val, "track", "right", 0.0)?;

        Ok(CtrlCmd::Track(TrackArgs::Direct { left, right }))
    }

    /// Parse the arguments of a `servo` command.
    fn servo_from_value(val: &Value) -> Result<Self, CmdParseError> {
        if val["channel"].is_null() || val["angle"].is_null() {
            return Err(CmdParseError::MissingParameters(
                "servo",
                "channel and angle are required",
            ));
        }

        let channel = match val["channel"].as_u64() {
            Some(c) if c <= u8::MAX as u64 => c as u8,
            _ => {
                return Err(CmdParseError::InvalidFormat(
                    "servo",
                    String::from("channel must be a small unsigned integer"),
                ))
            }
        };

        let angle = match val["angle"].as_f64() {
            Some(a) => a,
            None => {
                return Err(CmdParseError::InvalidFormat(
                    "servo",
                    String::from("angle must be a number"),
                ))
            }
        };

        let smooth = val["smooth"].as_bool().unwrap_or(false);

        Ok(CtrlCmd::Servo {
            channel,
            angle,
            smooth,
        })
    }

    /// Parse the arguments of a `servo_batch` command.
    ///
    /// A missing `angles` field reads as an empty list, which the dispatcher
    /// rejects against the configured joint count.
    fn servo_batch_from_value(val: &Value) -> Result<Self, CmdParseError> {
        if val["angles"].is_null() {
            return Ok(CtrlCmd::ServoBatch { angles: Vec::new() });
        }

        let list = match val["angles"].as_array() {
            Some(l) => l,
            None => {
                return Err(CmdParseError::InvalidFormat(
                    "servo_batch",
                    String::from("angles must be a list"),
                ))
            }
        };

        let mut angles = Vec::with_capacity(list.len());

        for entry in list {
            match entry.as_f64() {
                Some(a) => angles.push(a),
                None => {
                    return Err(CmdParseError::InvalidFormat(
                        "servo_batch",
                        String::from("angles must be a list of numbers"),
                    ))
                }
            }
        }

        Ok(CtrlCmd::ServoBatch { angles })
    }

    /// Parse the arguments of a `base` command.
    ///
    /// A missing direction reads as `stop` and a missing speed as full speed.
    fn base_from_value(val: &Value) -> Result<Self, CmdParseError> {
        let direction = match &val["direction"] {
            Value::Null => BaseDir::Stop,
            Value::String(s) => match s.as_str() {
                "cw" => BaseDir::Cw,
                "ccw" => BaseDir::Ccw,
                "stop" => BaseDir::Stop,
                other => return Err(CmdParseError::InvalidDirection(other.to_string())),
            },
            _ => {
                return Err(CmdParseError::InvalidFormat(
                    "base",
                    String::from("direction must be a string"),
                ))
            }
        };

        let speed = number_or(val, "base", "speed", 100.0)?;

        Ok(CtrlCmd::Base { direction, speed })
    }
}

impl CmdParseError {
    /// The wire error code associated with this parse error.
    pub fn error_code(&self) -> CtrlErrorCode {
        match self {
            CmdParseError::InvalidJson(_) => CtrlErrorCode::InvalidJson,
            CmdParseError::InvalidAction(_) => CtrlErrorCode::InvalidAction,
            CmdParseError::MissingParameters(_, _) => CtrlErrorCode::MissingParameters,
            CmdParseError::InvalidFormat(_, _) => CtrlErrorCode::InvalidFormat,
            CmdParseError::InvalidCommand(_) => CtrlErrorCode::InvalidCommand,
            CmdParseError::InvalidDirection(_) => CtrlErrorCode::InvalidDirection,
        }
    }

    /// The action the error occurred in, if one was recognised.
    pub fn action(&self) -> Option<&str> {
        match self {
            CmdParseError::InvalidJson(_) => None,
            CmdParseError::InvalidAction(a) => Some(a.as_str()),
            CmdParseError::MissingParameters(a, _) => Some(a),
            CmdParseError::InvalidFormat(a, _) => Some(a),
            CmdParseError::InvalidCommand(_) => Some("track"),
            CmdParseError::InvalidDirection(_) => Some("base"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Read an optional numeric field, returning the default if the field is
/// absent.
fn number_or(
    val: &Value,
    action: &'static str,
    field: &'static str,
    default: f64,
) -> Result<f64, CmdParseError> {
    match &val[field] {
        Value::Null => Ok(default),
        v => v.as_f64().ok_or_else(|| {
            CmdParseError::InvalidFormat(action, format!("{} must be a number", field))
        }),
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_parse_ping() {
        let cmd = CtrlCmd::from_json(r#"{"action": "ping"}"#).unwrap();
        assert_eq!(cmd, CtrlCmd::Ping);
    }

    #[test]
    fn test_parse_track_named() {
        let cmd =
            CtrlCmd::from_json(r#"{"action": "track", "command": "forward", "speed": "fast"}"#)
                .unwrap();
        assert_eq!(
            cmd,
            CtrlCmd::Track(TrackArgs::Named {
                manoeuvre: TrackManoeuvre::Forward,
                speed: SpeedPreset::Fast,
            })
        );

        // Missing or unknown presets fall back to medium
        let cmd = CtrlCmd::from_json(r#"{"action": "track", "command": "stop"}"#).unwrap();
        assert_eq!(
            cmd,
            CtrlCmd::Track(TrackArgs::Named {
                manoeuvre: TrackManoeuvre::Stop,
                speed: SpeedPreset::Medium,
            })
        );
    }

    #[test]
    fn test_parse_track_direct_defaults() {
        let cmd = CtrlCmd::from_json(r#"{"action": "track", "left": 30}"#).unwrap();
        assert_eq!(
            cmd,
            CtrlCmd::Track(TrackArgs::Direct {
                left: 30.0,
                right: 0.0
            })
        );
    }

    #[test]
    fn test_parse_track_bad_command() {
        let err = CtrlCmd::from_json(r#"{"action": "track", "command": "sideways"}"#).unwrap_err();
        assert_eq!(err.error_code(), CtrlErrorCode::InvalidCommand);
        assert_eq!(err.action(), Some("track"));
    }

    #[test]
    fn test_parse_servo_missing_params() {
        let err = CtrlCmd::from_json(r#"{"action": "servo", "channel": 0}"#).unwrap_err();
        assert_eq!(err.error_code(), CtrlErrorCode::MissingParameters);
    }

    #[test]
    fn test_parse_servo_batch_formats() {
        let cmd =
            CtrlCmd::from_json(r#"{"action": "servo_batch", "angles": [90, 90, 45]}"#).unwrap();
        assert_eq!(
            cmd,
            CtrlCmd::ServoBatch {
                angles: vec![90.0, 90.0, 45.0]
            }
        );

        let err =
            CtrlCmd::from_json(r#"{"action": "servo_batch", "angles": "ninety"}"#).unwrap_err();
        assert_eq!(err.error_code(), CtrlErrorCode::InvalidFormat);
    }

    #[test]
    fn test_parse_base() {
        let cmd =
            CtrlCmd::from_json(r#"{"action": "base", "direction": "ccw", "speed": 40}"#).unwrap();
        assert_eq!(
            cmd,
            CtrlCmd::Base {
                direction: BaseDir::Ccw,
                speed: 40.0
            }
        );

        // Defaults: stop at full speed
        let cmd = CtrlCmd::from_json(r#"{"action": "base"}"#).unwrap();
        assert_eq!(
            cmd,
            CtrlCmd::Base {
                direction: BaseDir::Stop,
                speed: 100.0
            }
        );

        let err = CtrlCmd::from_json(r#"{"action": "base", "direction": "up"}"#).unwrap_err();
        assert_eq!(err.error_code(), CtrlErrorCode::InvalidDirection);
        assert_eq!(err.action(), Some("base"));
    }

    #[test]
    fn test_parse_unknown_action() {
        let err = CtrlCmd::from_json(r#"{"action": "warp"}"#).unwrap_err();
        assert_eq!(err.error_code(), CtrlErrorCode::InvalidAction);
    }

    #[test]
    fn test_parse_invalid_json() {
        let err = CtrlCmd::from_json("{not json").unwrap_err();
        assert_eq!(err.error_code(), CtrlErrorCode::InvalidJson);
        assert_eq!(err.action(), None);
    }
}
