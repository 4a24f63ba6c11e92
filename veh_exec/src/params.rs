//! # Vehicle Executable Parameters

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::Deserialize;
use thiserror::Error;

use comms_if::tc::SpeedPreset;

use crate::arm_ctrl::JointConfig;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Top level parameters for the vehicle exec.
#[derive(Debug, Clone, Deserialize)]
pub struct VehExecParams {
    /// Endpoint for the control command socket
    pub ctrl_endpoint: String,

    /// Safety timeouts
    pub safety: SafetyParams,

    /// Named speed presets for track manoeuvres
    pub speed_presets: SpeedPresets,

    /// Arm servo configuration
    pub arm: ArmParams,

    /// Motor pin bindings
    pub motors: MotorParams,
}

/// Safety timeouts, both measured from the last received command.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SafetyParams {
    /// Command silence after which the watchdog forces a full stop
    pub command_timeout_ms: u64,

    /// Stopped-base idle time after which the base driver is put to sleep
    pub idle_sleep_ms: u64,
}

/// Percentages for the named speed presets.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SpeedPresets {
    pub slow: f64,
    pub medium: f64,
    pub fast: f64,
}

/// Arm configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ArmParams {
    /// Servo update frequency for the PCA9685 board, in Hz
    pub pca9685_frequency_hz: f64,

    /// Per joint configuration, in channel order
    pub servos: Vec<JointConfig>,
}

/// GPIO pin bindings for the motor drivers. Opaque to the core; only the
/// hardware construction reads them.
#[derive(Debug, Clone, Deserialize)]
pub struct MotorParams {
    pub tracks: TrackPins,
    pub base_rotation: BasePins,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct TrackPins {
    pub pwma_pin: u8,
    pub ain1_pin: u8,
    pub ain2_pin: u8,
    pub pwmb_pin: u8,
    pub bin1_pin: u8,
    pub bin2_pin: u8,
    pub stby_pin: u8,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct BasePins {
    pub in1_pin: u8,
    pub in2_pin: u8,
    pub sleep_pin: Option<u8>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Ways in which loaded parameters can be invalid.
#[derive(Debug, Error)]
pub enum ParamsError {
    #[error("No servos are configured")]
    NoServos,

    #[error("Joint {0}: min_angle must be less than max_angle")]
    AngleRangeInvalid(String),

    #[error("Joint {0}: initial_angle must be between min_angle and max_angle")]
    InitialAngleInvalid(String),

    #[error("Joint {0}: min_pulse must be less than max_pulse")]
    PulseRangeInvalid(String),

    #[error("Servo channels are not unique")]
    NonUniqueChannels,

    #[error("Speed preset {0} must be between 0 and 100")]
    PresetInvalid(&'static str),

    #[error("Safety timeouts must be greater than zero")]
    TimeoutInvalid,

    #[error("Servo update frequency must be greater than zero")]
    FrequencyInvalid,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl VehExecParams {
    /// Determines if the parameters are valid.
    pub fn are_valid(&self) -> Result<(), ParamsError> {
        if self.arm.servos.is_empty() {
            return Err(ParamsError::NoServos);
        }

        for servo in &self.arm.servos {
            if servo.min_angle >= servo.max_angle {
                return Err(ParamsError::AngleRangeInvalid(servo.name.clone()));
            }
            if servo.initial_angle < servo.min_angle || servo.initial_angle > servo.max_angle {
                return Err(ParamsError::InitialAngleInvalid(servo.name.clone()));
            }
            if servo.min_pulse >= servo.max_pulse {
                return Err(ParamsError::PulseRangeInvalid(servo.name.clone()));
            }
        }

        // Non unique channels
        for servo in &self.arm.servos {
            if self
                .arm
                .servos
                .iter()
                .filter(|s| s.channel == servo.channel)
                .count()
                > 1
            {
                return Err(ParamsError::NonUniqueChannels);
            }
        }

        for &(name, value) in &[
            ("slow", self.speed_presets.slow),
            ("medium", self.speed_presets.medium),
            ("fast", self.speed_presets.fast),
        ] {
            if !(0.0..=100.0).contains(&value) {
                return Err(ParamsError::PresetInvalid(name));
            }
        }

        if self.safety.command_timeout_ms == 0 || self.safety.idle_sleep_ms == 0 {
            return Err(ParamsError::TimeoutInvalid);
        }

        if self.arm.pca9685_frequency_hz <= 0.0 {
            return Err(ParamsError::FrequencyInvalid);
        }

        Ok(())
    }
}

impl SpeedPresets {
    /// Percentage for a named preset.
    pub fn percent(&self, preset: SpeedPreset) -> f64 {
        match preset {
            SpeedPreset::Slow => self.slow,
            SpeedPreset::Medium => self.medium,
            SpeedPreset::Fast => self.fast,
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    fn params() -> VehExecParams {
        VehExecParams {
            ctrl_endpoint: String::from("tcp://0.0.0.0:5020"),
            safety: SafetyParams {
                command_timeout_ms: 2000,
                idle_sleep_ms: 5000,
            },
            speed_presets: SpeedPresets {
                slow: 30.0,
                medium: 60.0,
                fast: 100.0,
            },
            arm: ArmParams {
                pca9685_frequency_hz: 50.0,
                servos: vec![JointConfig {
                    channel: 0,
                    name: String::from("Joint 1"),
                    min_angle: 0.0,
                    max_angle: 180.0,
                    min_pulse: 500.0,
                    max_pulse: 2500.0,
                    initial_angle: 90.0,
                }],
            },
            motors: MotorParams {
                tracks: TrackPins {
                    pwma_pin: 6,
                    ain1_pin: 7,
                    ain2_pin: 8,
                    pwmb_pin: 9,
                    bin1_pin: 10,
                    bin2_pin: 11,
                    stby_pin: 12,
                },
                base_rotation: BasePins {
                    in1_pin: 14,
                    in2_pin: 15,
                    sleep_pin: Some(13),
                },
            },
        }
    }

    #[test]
    fn test_valid_params() {
        assert!(params().are_valid().is_ok());
    }

    #[test]
    fn test_bad_angle_range() {
        let mut p = params();
        p.arm.servos[0].min_angle = 200.0;

        assert!(matches!(
            p.are_valid(),
            Err(ParamsError::AngleRangeInvalid(_))
        ));
    }

    #[test]
    fn test_initial_angle_out_of_range() {
        let mut p = params();
        p.arm.servos[0].initial_angle = 300.0;

        assert!(matches!(
            p.are_valid(),
            Err(ParamsError::InitialAngleInvalid(_))
        ));
    }

    #[test]
    fn test_duplicate_channels() {
        let mut p = params();
        let dup = p.arm.servos[0].clone();
        p.arm.servos.push(dup);

        assert!(matches!(p.are_valid(), Err(ParamsError::NonUniqueChannels)));
    }

    #[test]
    fn test_bad_preset() {
        let mut p = params();
        p.speed_presets.fast = 150.0;

        assert!(matches!(
            p.are_valid(),
            Err(ParamsError::PresetInvalid("fast"))
        ));
    }

    #[test]
    fn test_zero_timeout() {
        let mut p = params();
        p.safety.command_timeout_ms = 0;

        assert!(matches!(p.are_valid(), Err(ParamsError::TimeoutInvalid)));
    }
}
