//! # Arm Control Module
//!
//! Joint controller for the 3-joint mechanical arm. Tracks per-joint angle
//! state, clamps demands into each joint's configured range, and enforces
//! the linkage interference envelope between the two coupled shoulder
//! joints before any demand reaches the servo board.
//!
//! The interference model is two linear inequalities fitted to the linkage,
//! not a kinematic solver: it has to run on every command, so it must stay
//! O(1) and trigonometry-free.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// [`ServoDriver`] implementation for the PCA9685 16 channel servo board.
pub mod pca9685;

/// Simulated servo driver for off-target builds and tests.
pub mod sim;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::collections::HashMap;
use std::thread;
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use util::maths::{clamp, lin_map};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// The two joint channels whose linkage can mechanically interfere.
pub const COUPLED_CHANNELS: (u8, u8) = (0, 1);

/// Lower interference limit: the coupled joint angles must satisfy
/// `s0 + s1 >= INTERFERENCE_SUM_MIN`.
pub const INTERFERENCE_SUM_MIN: f64 = 145.0;

/// Upper interference limit: the coupled joint angles must satisfy
/// `s0 + 6 * s1 <= INTERFERENCE_WEIGHTED_SUM_MAX`.
pub const INTERFERENCE_WEIGHTED_SUM_MAX: f64 = 630.0;

/// Weight applied to the second coupled joint in the upper limit.
const INTERFERENCE_WEIGHT: f64 = 6.0;

/// The actuation range the pulse calibration spans, in degrees.
const ACTUATION_RANGE_DEG: f64 = 180.0;

/// Step size for smooth moves, in degrees.
const SMOOTH_STEP_DEG: f64 = 2.0;

/// Delay between smooth move steps.
const SMOOTH_STEP_DELAY: Duration = Duration::from_millis(20);

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Static configuration of a single arm joint.
///
/// Loaded once at startup and never mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JointConfig {
    /// Servo board channel the joint is driven on. Unique per joint.
    pub channel: u8,

    /// Human readable joint name.
    pub name: String,

    /// Minimum allowed angle in degrees.
    pub min_angle: f64,

    /// Maximum allowed angle in degrees. Must be greater than `min_angle`.
    pub max_angle: f64,

    /// Pulse width driven at 0 degrees, in microseconds.
    pub min_pulse: f64,

    /// Pulse width driven at the full actuation range, in microseconds.
    pub max_pulse: f64,

    /// Angle the joint is driven to on reset, in degrees.
    pub initial_angle: f64,
}

/// A configured joint and the last angle successfully applied to it, `None`
/// until the joint is first driven.
struct Joint {
    config: JointConfig,
    current_angle: Option<f64>,
}

/// The arm joint controller.
pub struct ArmCtrl<D: ServoDriver> {
    driver: D,
    joints: Vec<Joint>,
}

/// Result of a successful angle set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AngleSet {
    /// The angle actually applied, after clamping.
    pub angle: f64,

    /// Whether the demanded angle was clamped to the joint's range.
    pub clamped: bool,
}

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// Trait to provide a unified API for accessing servo driver boards.
pub trait ServoDriver {
    /// Drive the given channel with the given pulse width.
    fn set_pulse_us(&mut self, channel: u8, pulse_us: f64) -> Result<(), ServoError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors raised by a servo driver board.
#[derive(Debug, Error)]
pub enum ServoError {
    #[error("An I2C error occured")]
    I2c,

    #[error("Channel {0} is not addressable on this board")]
    InvalidChannel(u8),

    #[error("Pulse width {0} us is not drivable at the board's period")]
    InvalidPulse(f64),

    #[error("The board rejected the demanded output")]
    InvalidOutput,
}

/// Errors raised by the arm controller.
#[derive(Debug, Error)]
pub enum ArmCtrlError {
    #[error("No joint is configured on channel {0}")]
    UnknownChannel(u8),

    #[error(
        "Blocked by mechanical interference: joint 0 at {s0:.0} deg and joint 1 at {s1:.0} deg \
         violate {constraint}"
    )]
    Interference {
        s0: f64,
        s1: f64,
        constraint: &'static str,
    },

    #[error("Servo driver error: {0}")]
    Driver(#[from] ServoError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<D: ServoDriver> ArmCtrl<D> {
    /// Create a new arm controller over the given driver.
    ///
    /// No joint is driven until the first angle demand; callers wanting the
    /// configured initial pose should follow construction with
    /// [`ArmCtrl::reset_all`].
    pub fn new(driver: D, configs: &[JointConfig]) -> Self {
        let joints = configs
            .iter()
            .map(|c| Joint {
                config: c.clone(),
                current_angle: None,
            })
            .collect();

        Self { driver, joints }
    }

    /// Set a single joint angle.
    ///
    /// The demand is clamped into the joint's configured range, then checked
    /// against the interference envelope using the other coupled joint's
    /// last applied angle. On success the clamped angle is driven and
    /// recorded. Rejection leaves all joint state unchanged.
    pub fn set_angle(&mut self, channel: u8, angle: f64) -> Result<AngleSet, ArmCtrlError> {
        self.set_angle_inner(channel, angle, None)
    }

    /// Set a single joint angle, stepping linearly toward the target.
    ///
    /// Each step goes through the validated [`ArmCtrl::set_angle`] path, so
    /// bounds and interference hold at every intermediate position. The
    /// first rejected step aborts the move; steps already taken are kept.
    pub fn set_angle_smooth(&mut self, channel: u8, angle: f64) -> Result<AngleSet, ArmCtrlError> {
        let (min, max, current) = match self.joint(channel) {
            Some(j) => (j.config.min_angle, j.config.max_angle, j.current_angle),
            None => return Err(ArmCtrlError::UnknownChannel(channel)),
        };

        // With no applied angle yet there is nothing to step from
        let mut position = match current {
            Some(a) => a,
            None => return self.set_angle(channel, angle),
        };

        let target = clamp(&angle, &min, &max);

        while (target - position).abs() > SMOOTH_STEP_DEG {
            position += SMOOTH_STEP_DEG * (target - position).signum();
            self.set_angle(channel, position)?;
            thread::sleep(SMOOTH_STEP_DELAY);
        }

        self.set_angle(channel, angle)
    }

    /// Set several joint angles with all-or-nothing semantics.
    ///
    /// Every entry is validated first, with the batch itself supplying the
    /// other coupled angle where it proposes one; only if all entries pass
    /// is anything driven. A rejected batch leaves every joint unchanged.
    pub fn set_multiple(&mut self, demands: &HashMap<u8, f64>) -> Result<(), ArmCtrlError> {
        // Phase one: clamp and validate everything against the proposed set
        let mut clamped_set: HashMap<u8, f64> = HashMap::with_capacity(demands.len());

        for (&channel, &angle) in demands {
            let (min, max) = match self.joint(channel) {
                Some(j) => (j.config.min_angle, j.config.max_angle),
                None => return Err(ArmCtrlError::UnknownChannel(channel)),
            };

            clamped_set.insert(channel, clamp(&angle, &min, &max));
        }

        for (&channel, &angle) in &clamped_set {
            self.check_interference(channel, angle, Some(&clamped_set))?;
        }

        // Phase two: apply. Each set keeps the batch as its interference
        // context, so orderings which pass through a transiently invalid
        // pair cannot fail halfway. Driver faults can still surface here.
        for (&channel, &angle) in &clamped_set {
            self.set_angle_inner(channel, angle, Some(&clamped_set))?;
        }

        Ok(())
    }

    /// Drive every joint to its configured initial angle.
    ///
    /// Failures are collected per joint and do not abort the remaining
    /// resets.
    pub fn reset_all(&mut self) -> Vec<(u8, ArmCtrlError)> {
        info!("Resetting all joints to their initial angles");

        let targets: Vec<(u8, f64)> = self
            .joints
            .iter()
            .map(|j| (j.config.channel, j.config.initial_angle))
            .collect();

        self.apply_all(&targets)
    }

    /// Drive every joint to the centre of its configured range.
    pub fn center_all(&mut self) -> Vec<(u8, ArmCtrlError)> {
        info!("Centering all joints");

        let targets: Vec<(u8, f64)> = self
            .joints
            .iter()
            .map(|j| {
                (
                    j.config.channel,
                    (j.config.min_angle + j.config.max_angle) / 2.0,
                )
            })
            .collect();

        self.apply_all(&targets)
    }

    /// Configuration of the joint on the given channel.
    pub fn config(&self, channel: u8) -> Option<&JointConfig> {
        self.joint(channel).map(|j| &j.config)
    }

    /// Last applied angle of the joint on the given channel.
    pub fn current_angle(&self, channel: u8) -> Option<f64> {
        self.joint(channel).and_then(|j| j.current_angle)
    }

    /// Channel and last applied angle of every configured joint, in
    /// configuration order.
    pub fn angles(&self) -> Vec<(u8, Option<f64>)> {
        self.joints
            .iter()
            .map(|j| (j.config.channel, j.current_angle))
            .collect()
    }

    /// Set a single joint angle using the given batch as the interference
    /// context for the other coupled joint.
    fn set_angle_inner(
        &mut self,
        channel: u8,
        angle: f64,
        batch: Option<&HashMap<u8, f64>>,
    ) -> Result<AngleSet, ArmCtrlError> {
        let (min, max) = match self.joint(channel) {
            Some(j) => (j.config.min_angle, j.config.max_angle),
            None => return Err(ArmCtrlError::UnknownChannel(channel)),
        };

        let clamped = clamp(&angle, &min, &max);
        let was_clamped = (clamped - angle).abs() > f64::EPSILON;

        self.check_interference(channel, clamped, batch)?;

        self.drive(channel, clamped)?;

        if was_clamped {
            info!(
                "Joint on channel {}: {:.0} deg clamped to {:.0} deg",
                channel, angle, clamped
            );
        }

        Ok(AngleSet {
            angle: clamped,
            clamped: was_clamped,
        })
    }

    /// Check a proposed angle for a channel against the interference
    /// envelope.
    ///
    /// The other coupled joint's angle is taken from `batch` if it proposes
    /// one, else from the last applied angle. With either angle unknown the
    /// check passes, as no envelope can be evaluated yet.
    fn check_interference(
        &self,
        channel: u8,
        proposed: f64,
        batch: Option<&HashMap<u8, f64>>,
    ) -> Result<(), ArmCtrlError> {
        let (ch0, ch1) = COUPLED_CHANNELS;

        if channel != ch0 && channel != ch1 {
            return Ok(());
        }

        let angle_of = |ch: u8| -> Option<f64> {
            if ch == channel {
                return Some(proposed);
            }
            if let Some(b) = batch {
                if let Some(&a) = b.get(&ch) {
                    return Some(a);
                }
            }
            self.joint(ch).and_then(|j| j.current_angle)
        };

        let (s0, s1) = match (angle_of(ch0), angle_of(ch1)) {
            (Some(s0), Some(s1)) => (s0, s1),
            _ => return Ok(()),
        };

        if s0 + s1 < INTERFERENCE_SUM_MIN {
            warn!(
                "Interference: {:.0} + {:.0} = {:.0} < {}",
                s0,
                s1,
                s0 + s1,
                INTERFERENCE_SUM_MIN
            );
            return Err(ArmCtrlError::Interference {
                s0,
                s1,
                constraint: "s0 + s1 >= 145",
            });
        }

        if s0 + INTERFERENCE_WEIGHT * s1 > INTERFERENCE_WEIGHTED_SUM_MAX {
            warn!(
                "Interference: {:.0} + 6*{:.0} = {:.0} > {}",
                s0,
                s1,
                s0 + INTERFERENCE_WEIGHT * s1,
                INTERFERENCE_WEIGHTED_SUM_MAX
            );
            return Err(ArmCtrlError::Interference {
                s0,
                s1,
                constraint: "s0 + 6*s1 <= 630",
            });
        }

        Ok(())
    }

    /// Drive the servo and record the new angle. The angle must already be
    /// validated.
    fn drive(&mut self, channel: u8, angle: f64) -> Result<(), ArmCtrlError> {
        let joint = self
            .joints
            .iter_mut()
            .find(|j| j.config.channel == channel)
            .ok_or(ArmCtrlError::UnknownChannel(channel))?;

        let pulse_us = lin_map(
            (0.0, ACTUATION_RANGE_DEG),
            (joint.config.min_pulse, joint.config.max_pulse),
            angle,
        );

        self.driver.set_pulse_us(channel, pulse_us)?;
        joint.current_angle = Some(angle);

        Ok(())
    }

    /// Apply a set of targets one joint at a time, collecting failures.
    fn apply_all(&mut self, targets: &[(u8, f64)]) -> Vec<(u8, ArmCtrlError)> {
        let mut failures = Vec::new();

        for &(channel, angle) in targets {
            if let Err(e) = self.set_angle(channel, angle) {
                warn!("Failed to drive joint on channel {}: {}", channel, e);
                failures.push((channel, e));
            }
        }

        failures
    }

    fn joint(&self, channel: u8) -> Option<&Joint> {
        self.joints.iter().find(|j| j.config.channel == channel)
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
