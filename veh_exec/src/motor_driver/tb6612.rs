//! # TB6612 dual H-bridge driver
//!
//! Drives the two track motors. Each channel has a pair of direction pins
//! and a PWM magnitude line; a shared standby line must be held high for the
//! chip to drive at all. Channel A is the left track, channel B the right.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::trace;

use util::maths::clamp;

use super::{speed_to_duty, DigitalOut, MotorError, PwmOut};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// TB6612 dual H-bridge motor driver.
pub struct Tb6612<P: PwmOut, D: DigitalOut> {
    pwm_a: P,
    ain_1: D,
    ain_2: D,

    pwm_b: P,
    bin_1: D,
    bin_2: D,

    stby: D,

    left_speed: f64,
    right_speed: f64,
    enabled: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<P: PwmOut, D: DigitalOut> Tb6612<P, D> {
    /// Create a new driver over the given output lines.
    ///
    /// The chip starts in standby; it is enabled on the first speed demand.
    pub fn new(pwm_a: P, ain_1: D, ain_2: D, pwm_b: P, bin_1: D, bin_2: D, mut stby: D) -> Self {
        stby.set_low();

        Self {
            pwm_a,
            ain_1,
            ain_2,
            pwm_b,
            bin_1,
            bin_2,
            stby,
            left_speed: 0.0,
            right_speed: 0.0,
            enabled: false,
        }
    }

    /// Take the chip out of standby.
    pub fn enable(&mut self) {
        self.stby.set_high();
        self.enabled = true;
    }

    /// Put the chip into standby and zero the cached speeds.
    ///
    /// This is the only path which releases the driver from an active state.
    pub fn standby(&mut self) {
        self.stby.set_low();
        self.enabled = false;
        self.left_speed = 0.0;
        self.right_speed = 0.0;
    }

    /// Set both motor speeds in signed percent, enabling the chip first.
    pub fn set_motors(&mut self, left_speed: f64, right_speed: f64) -> Result<(), MotorError> {
        self.enable();
        self.set_channel_a(left_speed)?;
        self.set_channel_b(right_speed)
    }

    /// Stop both motors.
    pub fn stop(&mut self) -> Result<(), MotorError> {
        self.set_motors(0.0, 0.0)
    }

    /// Last speed applied to the left track.
    pub fn left_speed(&self) -> f64 {
        self.left_speed
    }

    /// Last speed applied to the right track.
    pub fn right_speed(&self) -> f64 {
        self.right_speed
    }

    /// Whether the chip is out of standby.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Set the channel A (left track) speed.
    ///
    /// Zero speed clears both direction pins and the duty, letting the motor
    /// coast.
    fn set_channel_a(&mut self, speed: f64) -> Result<(), MotorError> {
        let speed = clamp(&speed, &-100.0, &100.0);
        self.left_speed = speed;

        if speed == 0.0 {
            self.ain_1.set_low();
            self.ain_2.set_low();
            self.pwm_a.set_duty_cycle(0.0)?;
        } else if speed > 0.0 {
            self.ain_1.set_high();
            self.ain_2.set_low();
            self.pwm_a.set_duty_cycle(speed_to_duty(speed))?;
        } else {
            self.ain_1.set_low();
            self.ain_2.set_high();
            self.pwm_a.set_duty_cycle(speed_to_duty(speed))?;
        }

        trace!("TB6612 channel A set to {}%", speed);

        Ok(())
    }

    /// Set the channel B (right track) speed.
    fn set_channel_b(&mut self, speed: f64) -> Result<(), MotorError> {
        let speed = clamp(&speed, &-100.0, &100.0);
        self.right_speed = speed;

        if speed == 0.0 {
            self.bin_1.set_low();
            self.bin_2.set_low();
            self.pwm_b.set_duty_cycle(0.0)?;
        } else if speed > 0.0 {
            self.bin_1.set_high();
            self.bin_2.set_low();
            self.pwm_b.set_duty_cycle(speed_to_duty(speed))?;
        } else {
            self.bin_1.set_low();
            self.bin_2.set_high();
            self.pwm_b.set_duty_cycle(speed_to_duty(speed))?;
        }

        trace!("TB6612 channel B set to {}%", speed);

        Ok(())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::motor_driver::sim::{SimPin, SimPwm};

    fn driver() -> (
        Tb6612<SimPwm, SimPin>,
        std::rc::Rc<std::cell::Cell<f64>>,
        std::rc::Rc<std::cell::Cell<bool>>,
        std::rc::Rc<std::cell::Cell<bool>>,
        std::rc::Rc<std::cell::Cell<bool>>,
    ) {
        let pwm_a = SimPwm::new("pwma");
        let ain_1 = SimPin::new("ain1");
        let ain_2 = SimPin::new("ain2");
        let stby = SimPin::new("stby");

        let duty_a = pwm_a.duty();
        let ain_1_level = ain_1.level();
        let ain_2_level = ain_2.level();
        let stby_level = stby.level();

        let drv = Tb6612::new(
            pwm_a,
            ain_1,
            ain_2,
            SimPwm::new("pwmb"),
            SimPin::new("bin1"),
            SimPin::new("bin2"),
            stby,
        );

        (drv, duty_a, ain_1_level, ain_2_level, stby_level)
    }

    #[test]
    fn test_forward_mapping() {
        let (mut drv, duty_a, ain_1, ain_2, stby) = driver();

        drv.set_motors(60.0, 60.0).unwrap();

        assert!(stby.get());
        assert!(ain_1.get());
        assert!(!ain_2.get());
        assert!((duty_a.get() - 0.6).abs() < 1e-9);
        assert_eq!(drv.left_speed(), 60.0);
        assert_eq!(drv.right_speed(), 60.0);
    }

    #[test]
    fn test_reverse_mapping() {
        let (mut drv, duty_a, ain_1, ain_2, _) = driver();

        drv.set_motors(-45.0, 45.0).unwrap();

        assert!(!ain_1.get());
        assert!(ain_2.get());
        assert!((duty_a.get() - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_zero_coasts() {
        let (mut drv, duty_a, ain_1, ain_2, _) = driver();

        drv.set_motors(80.0, 80.0).unwrap();
        drv.stop().unwrap();

        assert!(!ain_1.get());
        assert!(!ain_2.get());
        assert_eq!(duty_a.get(), 0.0);
    }

    #[test]
    fn test_out_of_range_clamped() {
        let (mut drv, duty_a, _, _, _) = driver();

        drv.set_motors(150.0, -150.0).unwrap();

        assert_eq!(drv.left_speed(), 100.0);
        assert_eq!(drv.right_speed(), -100.0);
        assert_eq!(duty_a.get(), 1.0);
    }

    #[test]
    fn test_standby_zeroes_cache() {
        let (mut drv, _, _, _, stby) = driver();

        drv.set_motors(50.0, 50.0).unwrap();
        drv.standby();

        assert!(!stby.get());
        assert!(!drv.enabled());
        assert_eq!(drv.left_speed(), 0.0);
        assert_eq!(drv.right_speed(), 0.0);
    }
}
