//! # Command Dispatcher Module
//!
//! Interprets decoded control messages, validates them against the vehicle's
//! configuration, drives the actuator facades, and mirrors the results into
//! the shared device state. Also hosts the safety watchdog, which forces a
//! full stop after command silence and lets the base driver power down once
//! a stop has gone idle.
//!
//! The dispatcher is handed each facade at construction as a typed,
//! possibly-absent handle. Dispatch against an absent subsystem reports an
//! execution error rather than silently doing nothing.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{info, warn};
use serde_json::Value;

use comms_if::tc::{
    BaseDir, CtrlCmd, CtrlErrorCode, CtrlResponse, TrackArgs,
};

use crate::arm_ctrl::{ArmCtrl, ArmCtrlError, JointConfig, ServoDriver};
use crate::base_ctrl::BaseCtrl;
use crate::device_state::DeviceState;
use crate::motor_driver::{DigitalOut, PwmOut};
use crate::params::SpeedPresets;
use crate::track_ctrl::TrackCtrl;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The command dispatcher and safety watchdog.
///
/// Owns the actuator facades and the shared device state for the lifetime
/// of the process. All methods take the current time from the caller, so
/// the control loop samples the clock once per iteration and tests can
/// drive time explicitly.
pub struct Dispatcher<P: PwmOut, D: DigitalOut, S: ServoDriver> {
    track: Option<TrackCtrl<P, D>>,
    base: Option<BaseCtrl<P, D>>,
    arm: Option<ArmCtrl<S>>,

    state: DeviceState,

    joint_configs: Vec<JointConfig>,
    presets: SpeedPresets,
    command_timeout: Duration,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<P: PwmOut, D: DigitalOut, S: ServoDriver> Dispatcher<P, D, S> {
    /// Create a new dispatcher over the given facades.
    ///
    /// A facade passed as `None` marks that subsystem as not fitted; its
    /// commands will be rejected with an execution error.
    pub fn new(
        joint_configs: &[JointConfig],
        presets: SpeedPresets,
        command_timeout: Duration,
        track: Option<TrackCtrl<P, D>>,
        base: Option<BaseCtrl<P, D>>,
        arm: Option<ArmCtrl<S>>,
        now: Instant,
    ) -> Self {
        Self {
            track,
            base,
            arm,
            state: DeviceState::new(joint_configs, now),
            joint_configs: joint_configs.to_vec(),
            presets,
            command_timeout,
        }
    }

    /// Handle one decoded control message, returning exactly one response.
    ///
    /// Any message which parses as JSON stamps the last command time, even
    /// one subsequently rejected by validation: a stream of bad input keeps
    /// the watchdog from firing spurious stops while every error is still
    /// reported to the caller.
    pub fn handle(&mut self, raw: &str, now: Instant) -> CtrlResponse {
        let val: Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                warn!("Discarding message with invalid JSON: {}", e);
                return CtrlResponse::error(None, CtrlErrorCode::InvalidJson, e.to_string());
            }
        };

        self.state.stamp_last_command(now);

        let cmd = match CtrlCmd::from_value(&val) {
            Ok(c) => c,
            Err(e) => {
                warn!("Rejecting command: {}", e);
                return CtrlResponse::error(e.action(), e.error_code(), e.to_string());
            }
        };

        match cmd {
            CtrlCmd::Ping => CtrlResponse::pong(self.state.uptime_ms(now)),
            CtrlCmd::Track(args) => self.handle_track(args, now),
            CtrlCmd::Servo {
                channel,
                angle,
                smooth,
            } => self.handle_servo(channel, angle, smooth, now),
            CtrlCmd::ServoBatch { angles } => self.handle_servo_batch(&angles, now),
            CtrlCmd::ServoReset => self.handle_servo_reset(now),
            CtrlCmd::Base { direction, speed } => self.handle_base(direction, speed, now),
        }
    }

    /// Periodic safety watchdog tick.
    ///
    /// Forces a full stop once command silence exceeds the configured
    /// timeout, restamping the command time so the forced stop does not
    /// re-trigger on the next tick. Then gives the base facade its chance
    /// to power down an idle driver.
    pub fn check_safety(&mut self, now: Instant) {
        if let Some(age) = self.state.last_command_age(now) {
            if age > self.command_timeout {
                warn!(
                    "Command timeout ({} ms), stopping all motors",
                    age.as_millis()
                );
                self.force_stop(now);
                self.state.stamp_last_command(now);
            }
        }

        if let Some(base) = self.base.as_mut() {
            match base.check_idle_sleep(now) {
                Ok(true) => self.state.set_base_sleeping(),
                Ok(false) => (),
                Err(e) => {
                    let msg = format!("Base sleep failed: {}", e);
                    self.state.add_error(msg, now);
                }
            }
        }
    }

    /// Stop everything and power the drivers down.
    ///
    /// Used on shutdown and after fatal transport errors, not by normal
    /// dispatch.
    pub fn make_safe(&mut self, now: Instant) {
        info!("Making the vehicle safe");

        self.force_stop(now);

        if let Some(track) = self.track.as_mut() {
            track.standby();
            self.state.update_track_enabled(false);
        }

        if let Some(base) = self.base.as_mut() {
            match base.disable() {
                Ok(()) => self.state.set_base_sleeping(),
                Err(e) => {
                    let msg = format!("Base disable failed: {}", e);
                    self.state.add_error(msg, now);
                }
            }
        }
    }

    /// Drive the arm to its configured initial pose, mirroring the result.
    ///
    /// Used at startup and by the `servo_reset` command. Per-joint failures
    /// are logged and driver faults recorded, never fatal.
    pub fn reset_arm(&mut self, now: Instant) {
        let arm = match self.arm.as_mut() {
            Some(a) => a,
            None => return,
        };

        let failures = arm.reset_all();
        let applied = arm.angles();

        for (channel, angle) in applied {
            if let Some(a) = angle {
                self.state.update_joint(channel, a);
            }
        }

        for (channel, e) in failures {
            if let ArmCtrlError::Driver(_) = e {
                let msg = format!("Joint {} reset failed: {}", channel, e);
                self.state.add_error(msg, now);
            }
        }
    }

    /// Read-only access to the shared device state.
    pub fn state(&self) -> &DeviceState {
        &self.state
    }

    /// Handle a track command.
    fn handle_track(&mut self, args: TrackArgs, now: Instant) -> CtrlResponse {
        // Resolve the demand into a (left, right) pair first, so named
        // shorthands and direct speeds validate the same way
        let (left, right) = match args {
            TrackArgs::Named { manoeuvre, speed } => {
                let s = self.presets.percent(speed);

                use comms_if::tc::TrackManoeuvre::*;
                match manoeuvre {
                    Forward => (s, s),
                    Backward => (-s, -s),
                    Left => (-s, s),
                    Right => (s, -s),
                    Stop => (0.0, 0.0),
                }
            }
            TrackArgs::Direct { left, right } => (left, right),
        };

        if !(-100.0..=100.0).contains(&left) || !(-100.0..=100.0).contains(&right) {
            return CtrlResponse::error(
                Some("track"),
                CtrlErrorCode::SpeedOutOfRange,
                "Speed must be between -100 and 100",
            );
        }

        let track = match self.track.as_mut() {
            Some(t) => t,
            None => {
                return CtrlResponse::error(
                    Some("track"),
                    CtrlErrorCode::ExecutionError,
                    "Track controller not available",
                )
            }
        };

        match track.set_speeds(left, right) {
            Ok(()) => {
                let (left, right) = track.speeds();
                let enabled = track.enabled();
                self.state.update_track(left, right);
                self.state.update_track_enabled(enabled);

                CtrlResponse::ok("track", self.state.uptime_ms(now))
            }
            Err(e) => {
                let msg = format!("Track drive failed: {}", e);
                self.state.add_error(msg, now);

                CtrlResponse::error(Some("track"), CtrlErrorCode::ExecutionError, e.to_string())
            }
        }
    }

    /// Handle a single servo command.
    fn handle_servo(&mut self, channel: u8, angle: f64, smooth: bool, now: Instant) -> CtrlResponse {
        // The static configuration is consulted first, so unknown channels
        // report the same way whether or not an arm is fitted
        let (min_angle, max_angle) = match self
            .joint_configs
            .iter()
            .find(|c| c.channel == channel)
        {
            Some(c) => (c.min_angle, c.max_angle),
            None => {
                return CtrlResponse::error(
                    Some("servo"),
                    CtrlErrorCode::ChannelNotFound,
                    format!("Servo channel {} not configured", channel),
                )
            }
        };

        // Advisory clamp, reported to the caller; the arm controller
        // re-validates regardless
        let demanded = angle;
        let angle = util::maths::clamp(&angle, &min_angle, &max_angle);

        let arm = match self.arm.as_mut() {
            Some(a) => a,
            None => {
                return CtrlResponse::error(
                    Some("servo"),
                    CtrlErrorCode::ExecutionError,
                    "Arm controller not available",
                )
            }
        };

        let result = if smooth {
            arm.set_angle_smooth(channel, angle)
        } else {
            arm.set_angle(channel, angle)
        };

        // Mirror whatever the controller now holds; a smooth move may have
        // applied intermediate steps before a rejection
        let applied = self.arm.as_ref().and_then(|a| a.current_angle(channel));
        if let Some(a) = applied {
            self.state.update_joint(channel, a);
        }

        match result {
            Ok(set) => {
                let response = CtrlResponse::ok("servo", self.state.uptime_ms(now));

                if (demanded - set.angle).abs() > f64::EPSILON {
                    response.with_clamped(demanded, set.angle)
                } else {
                    response
                }
            }
            Err(e) => self.arm_error_response("servo", e, now),
        }
    }

    /// Handle a batch servo command.
    fn handle_servo_batch(&mut self, angles: &[f64], now: Instant) -> CtrlResponse {
        if angles.len() != self.joint_configs.len() {
            return CtrlResponse::error(
                Some("servo_batch"),
                CtrlErrorCode::LengthMismatch,
                format!(
                    "Expected {} angles, got {}",
                    self.joint_configs.len(),
                    angles.len()
                ),
            );
        }

        // Positional: the i-th angle addresses the i-th configured joint.
        // Advisory clamp against each joint's own bounds; the controller
        // re-validates the whole set
        let mut demands: HashMap<u8, f64> = HashMap::with_capacity(angles.len());

        for (config, &angle) in self.joint_configs.iter().zip(angles) {
            demands.insert(
                config.channel,
                util::maths::clamp(&angle, &config.min_angle, &config.max_angle),
            );
        }

        let arm = match self.arm.as_mut() {
            Some(a) => a,
            None => {
                return CtrlResponse::error(
                    Some("servo_batch"),
                    CtrlErrorCode::ExecutionError,
                    "Arm controller not available",
                )
            }
        };

        let result = arm.set_multiple(&demands);

        // Mirror whatever the controller now holds; a driver fault mid-apply
        // leaves the successfully driven joints recorded
        let applied = arm.angles();
        for (channel, angle) in applied {
            if let Some(a) = angle {
                self.state.update_joint(channel, a);
            }
        }

        match result {
            Ok(()) => CtrlResponse::ok("servo_batch", self.state.uptime_ms(now)),
            Err(e) => self.arm_error_response("servo_batch", e, now),
        }
    }

    /// Handle a servo reset command.
    fn handle_servo_reset(&mut self, now: Instant) -> CtrlResponse {
        if self.arm.is_none() {
            return CtrlResponse::error(
                Some("servo_reset"),
                CtrlErrorCode::ExecutionError,
                "Arm controller not available",
            );
        }

        self.reset_arm(now);

        CtrlResponse::ok("servo_reset", self.state.uptime_ms(now))
    }

    /// Handle a base rotation command.
    fn handle_base(&mut self, direction: BaseDir, speed: f64, now: Instant) -> CtrlResponse {
        if !(0.0..=100.0).contains(&speed) {
            return CtrlResponse::error(
                Some("base"),
                CtrlErrorCode::SpeedOutOfRange,
                "Speed must be between 0 and 100",
            );
        }

        let base = match self.base.as_mut() {
            Some(b) => b,
            None => {
                return CtrlResponse::error(
                    Some("base"),
                    CtrlErrorCode::ExecutionError,
                    "Base controller not available",
                )
            }
        };

        match base.set_direction(direction, speed, now) {
            Ok(()) => {
                self.state.update_base(direction, speed);

                CtrlResponse::ok("base", self.state.uptime_ms(now))
            }
            Err(e) => {
                let msg = format!("Base drive failed: {}", e);
                self.state.add_error(msg, now);

                CtrlResponse::error(Some("base"), CtrlErrorCode::ExecutionError, e.to_string())
            }
        }
    }

    /// Stop both motion subsystems and zero their mirrors.
    fn force_stop(&mut self, now: Instant) {
        if let Some(track) = self.track.as_mut() {
            if let Err(e) = track.stop() {
                let msg = format!("Forced track stop failed: {}", e);
                self.state.add_error(msg, now);
            }
        }

        if let Some(base) = self.base.as_mut() {
            if let Err(e) = base.stop(now) {
                let msg = format!("Forced base stop failed: {}", e);
                self.state.add_error(msg, now);
            }
        }

        self.state.update_track(0.0, 0.0);
        self.state.update_base(BaseDir::Stop, 0.0);
    }

    /// Convert an arm controller error into the matching wire response.
    ///
    /// Interference rejections stay distinguishable from clamping through
    /// the `invalid_command` code and a message naming the violated
    /// constraint.
    fn arm_error_response(
        &mut self,
        action: &'static str,
        e: ArmCtrlError,
        now: Instant,
    ) -> CtrlResponse {
        match e {
            ArmCtrlError::UnknownChannel(ch) => CtrlResponse::error(
                Some(action),
                CtrlErrorCode::ChannelNotFound,
                format!("Servo channel {} not configured", ch),
            ),
            ArmCtrlError::Interference { .. } => {
                CtrlResponse::error(Some(action), CtrlErrorCode::InvalidCommand, e.to_string())
            }
            ArmCtrlError::Driver(_) => {
                let msg = format!("Servo drive failed: {}", e);
                self.state.add_error(msg, now);

                CtrlResponse::error(Some(action), CtrlErrorCode::ExecutionError, e.to_string())
            }
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::arm_ctrl::sim::SimServoDriver;
    use crate::motor_driver::sim::{SimPin, SimPwm};
    use crate::motor_driver::{Drv8837, Tb6612};
    use comms_if::tc::CtrlStatus;

    type SimDispatcher = Dispatcher<SimPwm, SimPin, SimServoDriver>;

    fn joint_configs() -> Vec<JointConfig> {
        vec![
            JointConfig {
                channel: 0,
                name: String::from("Joint 1"),
                min_angle: 0.0,
                max_angle: 180.0,
                min_pulse: 500.0,
                max_pulse: 2500.0,
                initial_angle: 90.0,
            },
            JointConfig {
                channel: 1,
                name: String::from("Joint 2"),
                min_angle: 0.0,
                max_angle: 180.0,
                min_pulse: 500.0,
                max_pulse: 2500.0,
                initial_angle: 90.0,
            },
            JointConfig {
                channel: 2,
                name: String::from("Gripper"),
                min_angle: 0.0,
                max_angle: 180.0,
                min_pulse: 500.0,
                max_pulse: 2500.0,
                initial_angle: 90.0,
            },
        ]
    }

    fn presets() -> SpeedPresets {
        SpeedPresets {
            slow: 30.0,
            medium: 60.0,
            fast: 100.0,
        }
    }

    fn track() -> TrackCtrl<SimPwm, SimPin> {
        TrackCtrl::new(Tb6612::new(
            SimPwm::new("pwma"),
            SimPin::new("ain1"),
            SimPin::new("ain2"),
            SimPwm::new("pwmb"),
            SimPin::new("bin1"),
            SimPin::new("bin2"),
            SimPin::new("stby"),
        ))
    }

    fn base(idle_sleep_ms: u64) -> BaseCtrl<SimPwm, SimPin> {
        BaseCtrl::new(
            Drv8837::new(
                SimPwm::new("in1"),
                SimPwm::new("in2"),
                Some(SimPin::new("sleep")),
            ),
            Duration::from_millis(idle_sleep_ms),
        )
    }

    fn arm() -> ArmCtrl<SimServoDriver> {
        ArmCtrl::new(SimServoDriver::new(), &joint_configs())
    }

    fn dispatcher(now: Instant) -> SimDispatcher {
        Dispatcher::new(
            &joint_configs(),
            presets(),
            Duration::from_millis(2000),
            Some(track()),
            Some(base(5000)),
            Some(arm()),
            now,
        )
    }

    #[test]
    fn test_ping_pong_monotonic() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        let first = d.handle(r#"{"action": "ping"}"#, t0 + Duration::from_millis(10));
        let second = d.handle(r#"{"action": "ping"}"#, t0 + Duration::from_millis(30));

        assert_eq!(first.status, CtrlStatus::Pong);
        assert_eq!(second.status, CtrlStatus::Pong);
        assert!(second.timestamp.unwrap() >= first.timestamp.unwrap());
    }

    #[test]
    fn test_track_direct() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        let resp = d.handle(r#"{"action": "track", "left": 40, "right": -40}"#, t0);

        assert_eq!(resp.status, CtrlStatus::Ok);
        assert_eq!(d.state().track_state().left_speed, 40.0);
        assert_eq!(d.state().track_state().right_speed, -40.0);
    }

    #[test]
    fn test_track_named_preset() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        let resp = d.handle(
            r#"{"action": "track", "command": "forward", "speed": "fast"}"#,
            t0,
        );

        assert_eq!(resp.status, CtrlStatus::Ok);
        assert_eq!(d.state().track_state().left_speed, 100.0);
        assert_eq!(d.state().track_state().right_speed, 100.0);

        let resp = d.handle(r#"{"action": "track", "command": "left"}"#, t0);

        assert_eq!(resp.status, CtrlStatus::Ok);
        assert_eq!(d.state().track_state().left_speed, -60.0);
        assert_eq!(d.state().track_state().right_speed, 60.0);
    }

    #[test]
    fn test_track_speed_out_of_range() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        let resp = d.handle(r#"{"action": "track", "left": 150, "right": 0}"#, t0);

        assert_eq!(resp.status, CtrlStatus::Error);
        assert_eq!(resp.error, Some(CtrlErrorCode::SpeedOutOfRange));

        // The facade must not have been driven
        assert_eq!(d.state().track_state().left_speed, 0.0);
    }

    #[test]
    fn test_track_not_fitted() {
        let t0 = Instant::now();
        let mut d: SimDispatcher = Dispatcher::new(
            &joint_configs(),
            presets(),
            Duration::from_millis(2000),
            None,
            Some(base(5000)),
            Some(arm()),
            t0,
        );

        let resp = d.handle(r#"{"action": "track", "left": 10, "right": 10}"#, t0);

        assert_eq!(resp.status, CtrlStatus::Error);
        assert_eq!(resp.error, Some(CtrlErrorCode::ExecutionError));
    }

    #[test]
    fn test_servo_clamp_reported() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        let resp = d.handle(r#"{"action": "servo", "channel": 2, "angle": 250}"#, t0);

        assert_eq!(resp.status, CtrlStatus::Ok);
        assert_eq!(resp.clamped_value, Some(180.0));
        assert_eq!(
            d.state().joint_state(2).unwrap().current_angle,
            Some(180.0)
        );
    }

    #[test]
    fn test_servo_unknown_channel() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        let resp = d.handle(r#"{"action": "servo", "channel": 99, "angle": 10}"#, t0);

        assert_eq!(resp.status, CtrlStatus::Error);
        assert_eq!(resp.error, Some(CtrlErrorCode::ChannelNotFound));

        // Device state must be unmodified
        for config in joint_configs() {
            assert_eq!(
                d.state().joint_state(config.channel).unwrap().current_angle,
                None
            );
        }
    }

    #[test]
    fn test_servo_interference_rejected() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        let resp = d.handle(r#"{"action": "servo", "channel": 0, "angle": 90}"#, t0);
        assert_eq!(resp.status, CtrlStatus::Ok);

        // 90 + 10 < 145: blocked by the interlock, state untouched
        let resp = d.handle(r#"{"action": "servo", "channel": 1, "angle": 10}"#, t0);

        assert_eq!(resp.status, CtrlStatus::Error);
        assert_eq!(resp.error, Some(CtrlErrorCode::InvalidCommand));
        assert!(resp.message.unwrap().contains("interference"));
        assert_eq!(d.state().joint_state(1).unwrap().current_angle, None);
    }

    #[test]
    fn test_servo_batch_length_mismatch() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        let resp = d.handle(r#"{"action": "servo_batch", "angles": [90, 90]}"#, t0);

        assert_eq!(resp.status, CtrlStatus::Error);
        assert_eq!(resp.error, Some(CtrlErrorCode::LengthMismatch));
    }

    #[test]
    fn test_servo_batch_all_or_nothing() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        let resp = d.handle(r#"{"action": "servo_batch", "angles": [90, 90, 90]}"#, t0);
        assert_eq!(resp.status, CtrlStatus::Ok);

        let resp = d.handle(r#"{"action": "servo_batch", "angles": [90, 10, 90]}"#, t0);

        assert_eq!(resp.status, CtrlStatus::Error);
        assert_eq!(resp.error, Some(CtrlErrorCode::InvalidCommand));
        assert_eq!(d.state().joint_state(0).unwrap().current_angle, Some(90.0));
        assert_eq!(d.state().joint_state(1).unwrap().current_angle, Some(90.0));
    }

    #[test]
    fn test_servo_reset() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        let resp = d.handle(r#"{"action": "servo_reset"}"#, t0);

        assert_eq!(resp.status, CtrlStatus::Ok);
        for config in joint_configs() {
            assert_eq!(
                d.state().joint_state(config.channel).unwrap().current_angle,
                Some(config.initial_angle)
            );
        }
    }

    #[test]
    fn test_servo_smooth() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        d.handle(r#"{"action": "servo_reset"}"#, t0);

        let resp = d.handle(
            r#"{"action": "servo", "channel": 2, "angle": 96, "smooth": true}"#,
            t0,
        );

        assert_eq!(resp.status, CtrlStatus::Ok);
        assert_eq!(d.state().joint_state(2).unwrap().current_angle, Some(96.0));
    }

    #[test]
    fn test_base_command() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        let resp = d.handle(r#"{"action": "base", "direction": "cw", "speed": 70}"#, t0);

        assert_eq!(resp.status, CtrlStatus::Ok);
        assert_eq!(d.state().base_state().direction, BaseDir::Cw);
        assert_eq!(d.state().base_state().speed, 70.0);
        assert!(!d.state().base_state().sleeping);
    }

    #[test]
    fn test_base_invalid_direction() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        let resp = d.handle(r#"{"action": "base", "direction": "up", "speed": 50}"#, t0);

        assert_eq!(resp.status, CtrlStatus::Error);
        assert_eq!(resp.error, Some(CtrlErrorCode::InvalidDirection));
    }

    #[test]
    fn test_base_speed_out_of_range() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        let resp = d.handle(r#"{"action": "base", "direction": "cw", "speed": 150}"#, t0);

        assert_eq!(resp.status, CtrlStatus::Error);
        assert_eq!(resp.error, Some(CtrlErrorCode::SpeedOutOfRange));
        assert_eq!(d.state().base_state().speed, 0.0);
    }

    #[test]
    fn test_invalid_json_does_not_stamp() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        let resp = d.handle("{not json", t0);

        assert_eq!(resp.status, CtrlStatus::Error);
        assert_eq!(resp.error, Some(CtrlErrorCode::InvalidJson));
        assert!(d.state().last_command_age(t0).is_none());
    }

    #[test]
    fn test_rejected_command_still_stamps() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        let resp = d.handle(r#"{"action": "warp"}"#, t0);

        assert_eq!(resp.status, CtrlStatus::Error);
        assert_eq!(resp.error, Some(CtrlErrorCode::InvalidAction));

        // Even a rejected command resets the safety timer
        assert_eq!(
            d.state().last_command_age(t0),
            Some(Duration::from_millis(0))
        );
    }

    #[test]
    fn test_watchdog_command_timeout() {
        let t0 = Instant::now();

        let pwm_a = SimPwm::new("pwma");
        let writes = pwm_a.writes();

        let track = TrackCtrl::new(Tb6612::new(
            pwm_a,
            SimPin::new("ain1"),
            SimPin::new("ain2"),
            SimPwm::new("pwmb"),
            SimPin::new("bin1"),
            SimPin::new("bin2"),
            SimPin::new("stby"),
        ));

        let mut d: SimDispatcher = Dispatcher::new(
            &joint_configs(),
            presets(),
            Duration::from_millis(2000),
            Some(track),
            Some(base(5000)),
            Some(arm()),
            t0,
        );

        d.handle(r#"{"action": "track", "left": 50, "right": 50}"#, t0);
        assert_eq!(d.state().track_state().left_speed, 50.0);

        // Within the timeout nothing happens
        d.check_safety(t0 + Duration::from_millis(1000));
        assert_eq!(d.state().track_state().left_speed, 50.0);

        // Past the timeout the watchdog forces a stop
        d.check_safety(t0 + Duration::from_millis(2500));
        assert_eq!(d.state().track_state().left_speed, 0.0);
        assert_eq!(d.state().track_state().right_speed, 0.0);
        assert_eq!(d.state().base_state().direction, BaseDir::Stop);

        // The forced stop restamped the timer: the next tick must not issue
        // redundant stop demands
        let writes_after_stop = writes.get();
        d.check_safety(t0 + Duration::from_millis(2600));
        assert_eq!(writes.get(), writes_after_stop);
    }

    #[test]
    fn test_no_timeout_before_first_command() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        // With no command ever received the watchdog must not fire
        d.check_safety(t0 + Duration::from_secs(60));
        assert!(d.state().last_command_age(t0 + Duration::from_secs(60)).is_none());
    }

    #[test]
    fn test_idle_sleep_independent_of_command_timeout() {
        let t0 = Instant::now();

        // Idle sleep fires well before the command timeout
        let mut d: SimDispatcher = Dispatcher::new(
            &joint_configs(),
            presets(),
            Duration::from_millis(10_000),
            Some(track()),
            Some(base(1000)),
            Some(arm()),
            t0,
        );

        let resp = d.handle(r#"{"action": "base", "direction": "stop"}"#, t0);
        assert_eq!(resp.status, CtrlStatus::Ok);
        assert!(!d.state().base_state().sleeping);

        // A stop is itself a valid recent command, so the command timeout
        // has not elapsed; the idle sleep still must
        d.check_safety(t0 + Duration::from_millis(1500));

        assert!(d.state().base_state().sleeping);
        assert_eq!(d.state().track_state().left_speed, 0.0);
        assert_eq!(
            d.state().last_command_age(t0 + Duration::from_millis(1500)),
            Some(Duration::from_millis(1500))
        );
    }

    #[test]
    fn test_make_safe() {
        let t0 = Instant::now();
        let mut d = dispatcher(t0);

        d.handle(r#"{"action": "track", "left": 50, "right": 50}"#, t0);
        d.handle(r#"{"action": "base", "direction": "cw", "speed": 50}"#, t0);

        d.make_safe(t0 + Duration::from_millis(100));

        assert_eq!(d.state().track_state().left_speed, 0.0);
        assert!(!d.state().track_state().enabled);
        assert_eq!(d.state().base_state().direction, BaseDir::Stop);
        assert!(d.state().base_state().sleeping);
    }
}
