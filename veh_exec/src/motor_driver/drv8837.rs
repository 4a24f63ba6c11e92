//! # DRV8837 single H-bridge driver
//!
//! Drives the base rotation motor. The speed sign is encoded on two PWM
//! lines: IN1 carries the duty for forward rotation, IN2 for reverse. Zero
//! speed drives both lines to full duty, braking the motor actively; this is
//! distinct from coasting, which drives both lines to zero. An optional
//! sleep line cuts holding current; without one, enable and disable degrade
//! to duty-zeroing only.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;

use util::maths::clamp;

use super::{speed_to_duty, DigitalOut, MotorError, PwmOut};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// DRV8837 single H-bridge motor driver.
pub struct Drv8837<P: PwmOut, D: DigitalOut> {
    in_1: P,
    in_2: P,
    sleep: Option<D>,

    current_speed: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<P: PwmOut, D: DigitalOut> Drv8837<P, D> {
    /// Create a new driver over the given output lines.
    ///
    /// The chip starts asleep if a sleep line is fitted; it wakes on the
    /// first speed demand.
    pub fn new(in_1: P, in_2: P, sleep: Option<D>) -> Self {
        let mut drv = Self {
            in_1,
            in_2,
            sleep,
            current_speed: 0.0,
        };

        if let Some(pin) = drv.sleep.as_mut() {
            pin.set_low();
        }

        drv
    }

    /// Wake the chip from sleep.
    pub fn enable(&mut self) {
        if let Some(pin) = self.sleep.as_mut() {
            pin.set_high();
        }
    }

    /// Put the chip to sleep and zero both lines.
    pub fn disable(&mut self) -> Result<(), MotorError> {
        if let Some(pin) = self.sleep.as_mut() {
            pin.set_low();
        }

        self.current_speed = 0.0;
        self.in_1.set_duty_cycle(0.0)?;
        self.in_2.set_duty_cycle(0.0)
    }

    /// Set the motor speed in signed percent, waking the chip first.
    ///
    /// Zero speed is an active brake: both lines at full duty.
    pub fn set_speed(&mut self, speed: f64) -> Result<(), MotorError> {
        let speed = clamp(&speed, &-100.0, &100.0);
        self.current_speed = speed;

        self.enable();

        if speed == 0.0 {
            self.in_1.set_duty_cycle(1.0)?;
            self.in_2.set_duty_cycle(1.0)?;
        } else if speed > 0.0 {
            self.in_1.set_duty_cycle(speed_to_duty(speed))?;
            self.in_2.set_duty_cycle(0.0)?;
        } else {
            self.in_1.set_duty_cycle(0.0)?;
            self.in_2.set_duty_cycle(speed_to_duty(speed))?;
        }

        trace!("DRV8837 set to {}%", speed);

        Ok(())
    }

    /// Brake the motor.
    pub fn stop(&mut self) -> Result<(), MotorError> {
        self.set_speed(0.0)
    }

    /// Let the motor spin freely to rest: both lines at zero.
    pub fn coast(&mut self) -> Result<(), MotorError> {
        self.current_speed = 0.0;
        self.in_1.set_duty_cycle(0.0)?;
        self.in_2.set_duty_cycle(0.0)
    }

    /// Last speed applied to the motor.
    pub fn current_speed(&self) -> f64 {
        self.current_speed
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
