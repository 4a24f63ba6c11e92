//! # Track Control Module
//!
//! Differential steering facade over the TB6612 track driver.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;

use crate::motor_driver::{DigitalOut, MotorError, PwmOut, Tb6612};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// High level track control with differential steering semantics.
pub struct TrackCtrl<P: PwmOut, D: DigitalOut> {
    driver: Tb6612<P, D>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<P: PwmOut, D: DigitalOut> TrackCtrl<P, D> {
    /// Create the facade over an initialised driver, enabling it.
    pub fn new(mut driver: Tb6612<P, D>) -> Self {
        driver.enable();

        Self { driver }
    }

    /// Set both track speeds in signed percent.
    pub fn set_speeds(&mut self, left: f64, right: f64) -> Result<(), MotorError> {
        trace!("track speeds: left {}%, right {}%", left, right);
        self.driver.set_motors(left, right)
    }

    /// Drive forwards.
    pub fn forward(&mut self, speed: f64) -> Result<(), MotorError> {
        self.set_speeds(speed, speed)
    }

    /// Drive backwards.
    pub fn backward(&mut self, speed: f64) -> Result<(), MotorError> {
        self.set_speeds(-speed, -speed)
    }

    /// Turn left on the spot (left track reverses, right track drives).
    pub fn turn_left(&mut self, speed: f64) -> Result<(), MotorError> {
        self.set_speeds(-speed, speed)
    }

    /// Turn right on the spot.
    pub fn turn_right(&mut self, speed: f64) -> Result<(), MotorError> {
        self.set_speeds(speed, -speed)
    }

    /// Stop both tracks, holding them at zero demand.
    pub fn stop(&mut self) -> Result<(), MotorError> {
        self.set_speeds(0.0, 0.0)
    }

    /// Put the driver into standby, releasing the tracks.
    pub fn standby(&mut self) {
        self.driver.standby()
    }

    /// Last applied `(left, right)` speeds.
    pub fn speeds(&self) -> (f64, f64) {
        (self.driver.left_speed(), self.driver.right_speed())
    }

    /// Whether the driver is out of standby.
    pub fn enabled(&self) -> bool {
        self.driver.enabled()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::motor_driver::sim::{SimPin, SimPwm};

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

    #[test]
    fn test_manoeuvre_compositions() {
        let mut track = track();

        track.forward(50.0).unwrap();
        assert_eq!(track.speeds(), (50.0, 50.0));

        track.backward(50.0).unwrap();
        assert_eq!(track.speeds(), (-50.0, -50.0));

        track.turn_left(50.0).unwrap();
        assert_eq!(track.speeds(), (-50.0, 50.0));

        track.turn_right(50.0).unwrap();
        assert_eq!(track.speeds(), (50.0, -50.0));

        track.stop().unwrap();
        assert_eq!(track.speeds(), (0.0, 0.0));
    }

    #[test]
    fn test_set_speeds_reenables() {
        let mut track = track();

        track.standby();
        assert!(!track.enabled());

        track.set_speeds(20.0, -20.0).unwrap();
        assert!(track.enabled());
        assert_eq!(track.speeds(), (20.0, -20.0));
    }
}
