//! # Device State Module
//!
//! The single shared snapshot of the vehicle: mirrors of the joint, track
//! and base rotation states, the command timing the safety watchdog runs
//! on, uptime, and a bounded log of recent errors. Created once at startup
//! and owned by the dispatcher for the life of the process; the status
//! reporting surface reads it through [`DeviceState::snapshot`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use log::error;
use serde::Serialize;

use comms_if::tc::BaseDir;

use crate::arm_ctrl::JointConfig;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Maximum number of entries retained in the error log.
const ERROR_LOG_CAPACITY: usize = 10;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Mirrored state of a single arm joint.
#[derive(Debug, Clone, Serialize)]
pub struct JointMirror {
    pub channel: u8,
    pub name: String,

    /// Last angle successfully applied, `None` until the joint is driven.
    pub current_angle: Option<f64>,

    pub min_angle: f64,
    pub max_angle: f64,
}

/// Mirrored track state.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct TrackMirror {
    pub left_speed: f64,
    pub right_speed: f64,
    pub enabled: bool,
}

/// Mirrored base rotation state.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BaseMirror {
    pub direction: BaseDir,
    pub speed: f64,
    pub sleeping: bool,
}

/// An entry in the bounded error log.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub message: String,

    /// Uptime at which the error was recorded, in milliseconds.
    pub uptime_ms: u64,
}

/// Process-wide device state.
pub struct DeviceState {
    start_time: Instant,
    last_command_time: Option<Instant>,

    joints: Vec<JointMirror>,
    track: TrackMirror,
    base: BaseMirror,

    errors: VecDeque<ErrorEntry>,
}

/// Serializable snapshot of the device state, as reported over the status
/// surface.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceStateReport {
    pub servos: Vec<JointMirror>,
    pub tracks: TrackMirror,
    pub base_rotation: BaseMirror,

    pub uptime_ms: u64,

    /// Milliseconds since the last command, `None` if none received yet.
    pub last_command_age_ms: Option<u64>,

    pub errors: Vec<String>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DeviceState {
    /// Create the state from the static joint configuration.
    pub fn new(joint_configs: &[JointConfig], now: Instant) -> Self {
        let joints = joint_configs
            .iter()
            .map(|c| JointMirror {
                channel: c.channel,
                name: c.name.clone(),
                current_angle: None,
                min_angle: c.min_angle,
                max_angle: c.max_angle,
            })
            .collect();

        Self {
            start_time: now,
            last_command_time: None,
            joints,
            track: TrackMirror {
                left_speed: 0.0,
                right_speed: 0.0,
                enabled: true,
            },
            base: BaseMirror {
                direction: BaseDir::Stop,
                speed: 0.0,
                sleeping: true,
            },
            errors: VecDeque::with_capacity(ERROR_LOG_CAPACITY),
        }
    }

    /// Record that a command was received.
    pub fn stamp_last_command(&mut self, now: Instant) {
        self.last_command_time = Some(now);
    }

    /// Time since the last command, `None` if none has been received.
    pub fn last_command_age(&self, now: Instant) -> Option<Duration> {
        self.last_command_time
            .map(|t| now.saturating_duration_since(t))
    }

    /// Milliseconds since the software started.
    pub fn uptime_ms(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.start_time).as_millis() as u64
    }

    /// Update the mirrored angle of a joint. Unknown channels are ignored:
    /// mirrors exist only for configured joints.
    pub fn update_joint(&mut self, channel: u8, angle: f64) {
        if let Some(j) = self.joints.iter_mut().find(|j| j.channel == channel) {
            j.current_angle = Some(angle);
        }
    }

    /// Update the mirrored track speeds.
    pub fn update_track(&mut self, left_speed: f64, right_speed: f64) {
        self.track.left_speed = left_speed;
        self.track.right_speed = right_speed;
    }

    /// Update the mirrored track enable flag.
    pub fn update_track_enabled(&mut self, enabled: bool) {
        self.track.enabled = enabled;
    }

    /// Update the mirrored base rotation state. A fresh command always means
    /// the driver is awake; going to sleep is recorded separately by
    /// [`DeviceState::set_base_sleeping`].
    pub fn update_base(&mut self, direction: BaseDir, speed: f64) {
        self.base.direction = direction;
        self.base.speed = speed;
        self.base.sleeping = false;
    }

    /// Record that the base driver has been put to sleep.
    pub fn set_base_sleeping(&mut self) {
        self.base.sleeping = true;
    }

    /// Append an error to the bounded log, evicting the oldest entry past
    /// capacity.
    pub fn add_error<S: Into<String>>(&mut self, message: S, now: Instant) {
        let message = message.into();
        error!("Device error: {}", message);

        if self.errors.len() == ERROR_LOG_CAPACITY {
            self.errors.pop_front();
        }

        let uptime_ms = self.uptime_ms(now);
        self.errors.push_back(ErrorEntry { message, uptime_ms });
    }

    /// Recent error messages, oldest first.
    pub fn errors(&self) -> Vec<&str> {
        self.errors.iter().map(|e| e.message.as_str()).collect()
    }

    /// Clear the error log.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    /// Mirrored track state.
    pub fn track_state(&self) -> &TrackMirror {
        &self.track
    }

    /// Mirrored base rotation state.
    pub fn base_state(&self) -> &BaseMirror {
        &self.base
    }

    /// Mirrored state of the joint on the given channel.
    pub fn joint_state(&self, channel: u8) -> Option<&JointMirror> {
        self.joints.iter().find(|j| j.channel == channel)
    }

    /// Read-only snapshot for status reporting.
    pub fn snapshot(&self, now: Instant) -> DeviceStateReport {
        DeviceStateReport {
            servos: self.joints.clone(),
            tracks: self.track,
            base_rotation: self.base,
            uptime_ms: self.uptime_ms(now),
            last_command_age_ms: self.last_command_age(now).map(|d| d.as_millis() as u64),
            errors: self.errors.iter().map(|e| e.message.clone()).collect(),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn configs() -> Vec<JointConfig> {
        vec![JointConfig {
            channel: 0,
            name: String::from("Joint 1"),
            min_angle: 0.0,
            max_angle: 180.0,
            min_pulse: 500.0,
            max_pulse: 2500.0,
            initial_angle: 90.0,
        }]
    }

    #[test]
    fn test_no_command_yet() {
        let t0 = Instant::now();
        let state = DeviceState::new(&configs(), t0);

        assert!(state.last_command_age(t0 + Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_command_age_and_uptime() {
        let t0 = Instant::now();
        let mut state = DeviceState::new(&configs(), t0);

        state.stamp_last_command(t0 + Duration::from_millis(100));

        let age = state
            .last_command_age(t0 + Duration::from_millis(400))
            .unwrap();
        assert_eq!(age, Duration::from_millis(300));
        assert_eq!(state.uptime_ms(t0 + Duration::from_millis(400)), 400);
    }

    #[test]
    fn test_error_log_bounded() {
        let t0 = Instant::now();
        let mut state = DeviceState::new(&configs(), t0);

        for i in 0..15 {
            state.add_error(format!("error {}", i), t0);
        }

        let errors = state.errors();
        assert_eq!(errors.len(), 10);
        assert_eq!(errors[0], "error 5");
        assert_eq!(errors[9], "error 14");

        state.clear_errors();
        assert!(state.errors().is_empty());
    }

    #[test]
    fn test_snapshot_reflects_mirrors() {
        let t0 = Instant::now();
        let mut state = DeviceState::new(&configs(), t0);

        state.update_track(30.0, -30.0);
        state.update_base(BaseDir::Cw, 50.0);
        state.update_joint(0, 120.0);

        let report = state.snapshot(t0 + Duration::from_millis(10));
        assert_eq!(report.tracks.left_speed, 30.0);
        assert_eq!(report.base_rotation.direction, BaseDir::Cw);
        assert!(!report.base_rotation.sleeping);
        assert_eq!(report.servos[0].current_angle, Some(120.0));
        assert_eq!(report.uptime_ms, 10);
    }
}
