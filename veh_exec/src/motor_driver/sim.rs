//! # Simulated output lines
//!
//! Off-target stand-ins for the vehicle's GPIO and PWM lines. Each line
//! keeps its last driven value behind a shared handle, so the exec can run
//! on a development machine and tests can observe the signals a driver
//! produced.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::cell::Cell;
use std::rc::Rc;

use log::trace;

use super::{DigitalOut, MotorError, PwmOut};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A simulated digital output line.
pub struct SimPin {
    label: &'static str,
    level: Rc<Cell<bool>>,
}

/// A simulated PWM output line. Records the last duty cycle and the number
/// of duty writes.
pub struct SimPwm {
    label: &'static str,
    duty: Rc<Cell<f64>>,
    writes: Rc<Cell<u32>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimPin {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            level: Rc::new(Cell::new(false)),
        }
    }

    /// Handle observing the line's level.
    pub fn level(&self) -> Rc<Cell<bool>> {
        self.level.clone()
    }
}

impl DigitalOut for SimPin {
    fn set_high(&mut self) {
        self.level.set(true);
        trace!("sim pin {} -> high", self.label);
    }

    fn set_low(&mut self) {
        self.level.set(false);
        trace!("sim pin {} -> low", self.label);
    }
}

impl SimPwm {
    pub fn new(label: &'static str) -> Self {
        Self {
            label,
            duty: Rc::new(Cell::new(0.0)),
            writes: Rc::new(Cell::new(0)),
        }
    }

    /// Handle observing the line's duty cycle.
    pub fn duty(&self) -> Rc<Cell<f64>> {
        self.duty.clone()
    }

    /// Handle observing the number of duty writes.
    pub fn writes(&self) -> Rc<Cell<u32>> {
        self.writes.clone()
    }
}

impl PwmOut for SimPwm {
    fn set_duty_cycle(&mut self, duty: f64) -> Result<(), MotorError> {
        self.duty.set(duty);
        self.writes.set(self.writes.get() + 1);
        trace!("sim pwm {} -> {:.3}", self.label, duty);
        Ok(())
    }
}
