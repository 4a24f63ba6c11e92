//! # Motor driver module
//!
//! Low-level drivers for the vehicle's motor driver chips: a TB6612 dual
//! H-bridge for the two tracks and a DRV8837 single H-bridge for the base
//! rotation. The drivers map signed percentage speeds onto direction and PWM
//! duty-cycle signals. Range validation belongs to the layers above; the
//! drivers only clamp to `[-100, 100]` as a last line of defence.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// TB6612 dual H-bridge driver (tracks).
pub mod tb6612;

/// DRV8837 single H-bridge driver (base rotation).
pub mod drv8837;

/// Simulated output lines for off-target builds and tests.
pub mod sim;

/// Raspberry Pi implementations of the output traits.
#[cfg(target_arch = "arm")]
pub mod rpi;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use thiserror::Error;

use util::maths::clamp;

// Re-exports
pub use drv8837::Drv8837;
pub use tb6612::Tb6612;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A digital output line.
pub trait DigitalOut {
    /// Drive the line high.
    fn set_high(&mut self);

    /// Drive the line low.
    fn set_low(&mut self);
}

/// A PWM output line.
pub trait PwmOut {
    /// Set the duty cycle of the line.
    ///
    /// `duty` is a fraction between 0.0 and 1.0.
    fn set_duty_cycle(&mut self, duty: f64) -> Result<(), MotorError>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur while driving a motor.
#[derive(Debug, Error)]
pub enum MotorError {
    #[error("Failed to set a PWM duty cycle: {0}")]
    PwmWrite(String),
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Convert a signed percentage speed into a PWM duty fraction.
pub(crate) fn speed_to_duty(speed: f64) -> f64 {
    clamp(&(speed.abs() / 100.0), &0.0, &1.0)
}
