//! # Hardware construction
//!
//! Builds the actuator stack handed to the dispatcher: rppal GPIO, software
//! PWM and the PCA9685 board when running on the vehicle itself, simulated
//! lines everywhere else. The rest of the exec is identical on both.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use std::time::{Duration, Instant};

use log::info;
use thiserror::Error;

use crate::arm_ctrl::{self, ArmCtrl};
use crate::base_ctrl::BaseCtrl;
use crate::dispatcher::Dispatcher;
use crate::motor_driver::{Drv8837, Tb6612};
use crate::params::VehExecParams;
use crate::track_ctrl::TrackCtrl;

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// The dispatcher type built for this target.
#[cfg(target_arch = "arm")]
pub type VehDispatcher = Dispatcher<
    crate::motor_driver::rpi::RpiPwm,
    crate::motor_driver::rpi::RpiPin,
    arm_ctrl::pca9685::Pca9685Servo<rppal::i2c::I2c>,
>;

/// The dispatcher type built for this target.
#[cfg(not(target_arch = "arm"))]
pub type VehDispatcher = Dispatcher<
    crate::motor_driver::sim::SimPwm,
    crate::motor_driver::sim::SimPin,
    arm_ctrl::sim::SimServoDriver,
>;

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur while acquiring the hardware.
#[derive(Debug, Error)]
pub enum HwError {
    #[error("Failed to open the GPIO interface: {0}")]
    Gpio(String),

    #[error("Failed to open the I2C bus: {0}")]
    I2c(String),

    #[error("Failed to initialise the servo board: {0}")]
    ServoBoard(#[from] arm_ctrl::ServoError),
}

// ------------------------------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Build the dispatcher over the vehicle's hardware.
#[cfg(target_arch = "arm")]
pub fn build_dispatcher(params: &VehExecParams, now: Instant) -> Result<VehDispatcher, HwError> {
    use crate::motor_driver::rpi::{RpiPin, RpiPwm};
    use rppal::gpio::Gpio;
    use rppal::i2c::I2c;

    let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;

    let t = &params.motors.tracks;
    let track = TrackCtrl::new(Tb6612::new(
        RpiPwm(output(&gpio, t.pwma_pin)?),
        RpiPin(output(&gpio, t.ain1_pin)?),
        RpiPin(output(&gpio, t.ain2_pin)?),
        RpiPwm(output(&gpio, t.pwmb_pin)?),
        RpiPin(output(&gpio, t.bin1_pin)?),
        RpiPin(output(&gpio, t.bin2_pin)?),
        RpiPin(output(&gpio, t.stby_pin)?),
    ));

    let b = &params.motors.base_rotation;
    let sleep = match b.sleep_pin {
        Some(p) => Some(RpiPin(output(&gpio, p)?)),
        None => None,
    };
    let base = BaseCtrl::new(
        Drv8837::new(
            RpiPwm(output(&gpio, b.in1_pin)?),
            RpiPwm(output(&gpio, b.in2_pin)?),
            sleep,
        ),
        Duration::from_millis(params.safety.idle_sleep_ms),
    );

    let i2c = I2c::new().map_err(|e| HwError::I2c(e.to_string()))?;
    let board = arm_ctrl::pca9685::Pca9685Servo::new(i2c, params.arm.pca9685_frequency_hz)?;
    let arm = ArmCtrl::new(board, &params.arm.servos);

    info!("Actuators initialised on the vehicle hardware");

    Ok(Dispatcher::new(
        &params.arm.servos,
        params.speed_presets,
        Duration::from_millis(params.safety.command_timeout_ms),
        Some(track),
        Some(base),
        Some(arm),
        now,
    ))
}

/// Build the dispatcher over simulated hardware.
#[cfg(not(target_arch = "arm"))]
pub fn build_dispatcher(params: &VehExecParams, now: Instant) -> Result<VehDispatcher, HwError> {
    use crate::arm_ctrl::sim::SimServoDriver;
    use crate::motor_driver::sim::{SimPin, SimPwm};

    info!("Not running on the vehicle, actuators are simulated");

    let track = TrackCtrl::new(Tb6612::new(
        SimPwm::new("pwma"),
        SimPin::new("ain1"),
        SimPin::new("ain2"),
        SimPwm::new("pwmb"),
        SimPin::new("bin1"),
        SimPin::new("bin2"),
        SimPin::new("stby"),
    ));

    let base = BaseCtrl::new(
        Drv8837::new(
            SimPwm::new("in1"),
            SimPwm::new("in2"),
            Some(SimPin::new("sleep")),
        ),
        Duration::from_millis(params.safety.idle_sleep_ms),
    );

    let arm = ArmCtrl::new(SimServoDriver::new(), &params.arm.servos);

    Ok(Dispatcher::new(
        &params.arm.servos,
        params.speed_presets,
        Duration::from_millis(params.safety.command_timeout_ms),
        Some(track),
        Some(base),
        Some(arm),
        now,
    ))
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Acquire a GPIO pin as an output.
#[cfg(target_arch = "arm")]
fn output(gpio: &rppal::gpio::Gpio, pin: u8) -> Result<rppal::gpio::OutputPin, HwError> {
    gpio.get(pin)
        .map(|p| p.into_output())
        .map_err(|e| HwError::Gpio(e.to_string()))
}
