//! Simulated servo driver

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::trace;

use super::{ServoDriver, ServoError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A servo driver which records demanded pulses instead of driving hardware.
pub struct SimServoDriver {
    pulses: Rc<RefCell<HashMap<u8, f64>>>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimServoDriver {
    pub fn new() -> Self {
        Self {
            pulses: Rc::new(RefCell::new(HashMap::new())),
        }
    }

    /// Handle observing the last pulse demanded per channel.
    pub fn pulses(&self) -> Rc<RefCell<HashMap<u8, f64>>> {
        self.pulses.clone()
    }
}

impl Default for SimServoDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ServoDriver for SimServoDriver {
    fn set_pulse_us(&mut self, channel: u8, pulse_us: f64) -> Result<(), ServoError> {
        trace!("sim servo channel {} -> {:.0} us", channel, pulse_us);
        self.pulses.borrow_mut().insert(channel, pulse_us);
        Ok(())
    }
}
