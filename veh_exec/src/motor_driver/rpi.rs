//! # Raspberry Pi output lines
//!
//! rppal-backed implementations of the motor driver output traits.
//! Direction, standby and sleep lines are plain GPIO outputs; the PWM
//! magnitude lines use rppal's software PWM, so any GPIO pin can carry one.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use rppal::gpio::OutputPin;

use super::{DigitalOut, MotorError, PwmOut};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// PWM frequency for the motor magnitude lines, matching the 1 kHz the
/// driver chips are rated for.
pub const MOTOR_PWM_FREQUENCY_HZ: f64 = 1000.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A GPIO pin used as a digital output.
pub struct RpiPin(pub OutputPin);

/// A GPIO pin used as a software PWM output.
pub struct RpiPwm(pub OutputPin);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl DigitalOut for RpiPin {
    fn set_high(&mut self) {
        self.0.set_high()
    }

    fn set_low(&mut self) {
        self.0.set_low()
    }
}

impl PwmOut for RpiPwm {
    fn set_duty_cycle(&mut self, duty: f64) -> Result<(), MotorError> {
        self.0
            .set_pwm_frequency(MOTOR_PWM_FREQUENCY_HZ, duty)
            .map_err(|e| MotorError::PwmWrite(e.to_string()))
    }
}
