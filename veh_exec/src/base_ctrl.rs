//! # Base Rotation Control Module
//!
//! Facade over the DRV8837 base rotation driver: direction and unsigned
//! speed on the way in, with an idle timeout that puts the driver to sleep
//! once the base has been logically stopped for long enough. Stopping is
//! immediate (active brake); the power-down is deferred so that rapid
//! stop/start sequences do not thrash the driver's sleep line.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::{Duration, Instant};

use log::debug;

use comms_if::tc::BaseDir;

use crate::motor_driver::{DigitalOut, Drv8837, MotorError, PwmOut};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// High level base rotation control with idle sleep management.
pub struct BaseCtrl<P: PwmOut, D: DigitalOut> {
    driver: Drv8837<P, D>,

    idle_sleep_timeout: Duration,

    last_command_time: Option<Instant>,
    current_direction: BaseDir,
    sleeping: bool,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<P: PwmOut, D: DigitalOut> BaseCtrl<P, D> {
    /// Create the facade over an initialised driver.
    ///
    /// The driver stays asleep until the first rotation demand.
    pub fn new(driver: Drv8837<P, D>, idle_sleep_timeout: Duration) -> Self {
        Self {
            driver,
            idle_sleep_timeout,
            last_command_time: None,
            current_direction: BaseDir::Stop,
            sleeping: true,
        }
    }

    /// Set the rotation direction and speed (unsigned percent).
    ///
    /// `stop` brakes immediately; the power-down is left to
    /// [`BaseCtrl::check_idle_sleep`]. The command time is stamped on every
    /// call regardless of direction.
    pub fn set_direction(
        &mut self,
        direction: BaseDir,
        speed: f64,
        now: Instant,
    ) -> Result<(), MotorError> {
        self.last_command_time = Some(now);
        self.current_direction = direction;
        self.sleeping = false;

        match direction {
            BaseDir::Cw => self.driver.set_speed(speed),
            BaseDir::Ccw => self.driver.set_speed(-speed),
            BaseDir::Stop => self.driver.stop(),
        }
    }

    /// Brake the base rotation.
    pub fn stop(&mut self, now: Instant) -> Result<(), MotorError> {
        self.set_direction(BaseDir::Stop, 0.0, now)
    }

    /// Put the driver to sleep if the base has been stopped past the idle
    /// timeout. Returns whether the driver is now sleeping.
    ///
    /// Invoked periodically by the safety watchdog, not per command.
    pub fn check_idle_sleep(&mut self, now: Instant) -> Result<bool, MotorError> {
        if self.sleeping || self.current_direction != BaseDir::Stop {
            return Ok(self.sleeping);
        }

        let idle = match self.last_command_time {
            Some(t) => now.saturating_duration_since(t),
            None => return Ok(false),
        };

        if idle > self.idle_sleep_timeout {
            debug!("Base idle for {} ms, putting the driver to sleep", idle.as_millis());
            self.driver.disable()?;
            self.sleeping = true;
        }

        Ok(self.sleeping)
    }

    /// Disable the driver immediately. Used by the make-safe path, not by
    /// normal dispatch.
    pub fn disable(&mut self) -> Result<(), MotorError> {
        self.driver.disable()?;
        self.current_direction = BaseDir::Stop;
        self.sleeping = true;

        Ok(())
    }

    /// Current logical direction.
    pub fn direction(&self) -> BaseDir {
        self.current_direction
    }

    /// Last applied speed in signed percent.
    pub fn speed(&self) -> f64 {
        self.driver.current_speed()
    }

    /// Whether the driver is currently sleeping.
    pub fn sleeping(&self) -> bool {
        self.sleeping
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::motor_driver::sim::{SimPin, SimPwm};

    fn base(timeout_ms: u64) -> (BaseCtrl<SimPwm, SimPin>, std::rc::Rc<std::cell::Cell<bool>>) {
        let sleep = SimPin::new("sleep");
        let sleep_level = sleep.level();

        let ctrl = BaseCtrl::new(
            Drv8837::new(SimPwm::new("in1"), SimPwm::new("in2"), Some(sleep)),
            Duration::from_millis(timeout_ms),
        );

        (ctrl, sleep_level)
    }

    #[test]
    fn test_direction_mapping() {
        let (mut base, _) = base(1000);
        let t0 = Instant::now();

        base.set_direction(BaseDir::Cw, 60.0, t0).unwrap();
        assert_eq!(base.speed(), 60.0);
        assert_eq!(base.direction(), BaseDir::Cw);

        base.set_direction(BaseDir::Ccw, 60.0, t0).unwrap();
        assert_eq!(base.speed(), -60.0);

        base.stop(t0).unwrap();
        assert_eq!(base.direction(), BaseDir::Stop);
        assert_eq!(base.speed(), 0.0);
    }

    #[test]
    fn test_idle_sleep_after_stop() {
        let (mut base, sleep_level) = base(1000);
        let t0 = Instant::now();

        base.set_direction(BaseDir::Stop, 0.0, t0).unwrap();
        assert!(!base.sleeping());

        // Before the timeout the driver stays awake
        let asleep = base
            .check_idle_sleep(t0 + Duration::from_millis(500))
            .unwrap();
        assert!(!asleep);
        assert!(sleep_level.get());

        // Past the timeout it powers down
        let asleep = base
            .check_idle_sleep(t0 + Duration::from_millis(1500))
            .unwrap();
        assert!(asleep);
        assert!(!sleep_level.get());
    }

    #[test]
    fn test_no_sleep_while_rotating() {
        let (mut base, _) = base(1000);
        let t0 = Instant::now();

        base.set_direction(BaseDir::Cw, 40.0, t0).unwrap();

        let asleep = base
            .check_idle_sleep(t0 + Duration::from_millis(5000))
            .unwrap();
        assert!(!asleep);
        assert_eq!(base.speed(), 40.0);
    }

    #[test]
    fn test_new_command_wakes() {
        let (mut base, sleep_level) = base(1000);
        let t0 = Instant::now();

        base.stop(t0).unwrap();
        base.check_idle_sleep(t0 + Duration::from_millis(1500))
            .unwrap();
        assert!(base.sleeping());

        base.set_direction(BaseDir::Ccw, 80.0, t0 + Duration::from_millis(2000))
            .unwrap();
        assert!(!base.sleeping());
        assert!(sleep_level.get());
    }
}
