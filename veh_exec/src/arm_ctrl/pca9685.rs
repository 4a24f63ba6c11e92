//! [`ServoDriver`] implementation for the PCA9685 driver

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use embedded_hal::blocking::i2c::{Write, WriteRead};
use pwm_pca9685::{Channel, Pca9685, SlaveAddr};

use super::{ServoDriver, ServoError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Number of counter ticks in one PWM period on the PCA9685.
const TICKS_PER_PERIOD: f64 = 4096.0;

/// Internal oscillator frequency of the board, in Hz.
const OSC_CLOCK_HZ: f64 = 25_000_000.0;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// A PCA9685 board driving the arm's servos at a fixed update frequency.
pub struct Pca9685Servo<I2C> {
    board: Pca9685<I2C>,
    period_us: f64,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl<I2C, E> Pca9685Servo<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    /// Initialise the board at the given servo update frequency.
    pub fn new(i2c: I2C, frequency_hz: f64) -> Result<Self, ServoError> {
        let mut board = Pca9685::new(i2c, SlaveAddr::default());

        // Prescale setting for the demanded update frequency
        let prescale = (OSC_CLOCK_HZ / (TICKS_PER_PERIOD * frequency_hz)).round() as u8 - 1;

        board.set_prescale(prescale).map_err(to_servo_error)?;
        board.enable().map_err(to_servo_error)?;

        Ok(Self {
            board,
            period_us: 1_000_000.0 / frequency_hz,
        })
    }
}

impl<I2C, E> ServoDriver for Pca9685Servo<I2C>
where
    I2C: Write<Error = E> + WriteRead<Error = E>,
{
    fn set_pulse_us(&mut self, channel: u8, pulse_us: f64) -> Result<(), ServoError> {
        let channel = board_channel(channel)?;

        let off = (pulse_us / self.period_us) * TICKS_PER_PERIOD;

        if off < 0.0 || off >= TICKS_PER_PERIOD {
            return Err(ServoError::InvalidPulse(pulse_us));
        }

        self.board
            .set_channel_on_off(channel, 0, off as u16)
            .map_err(to_servo_error)
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Map a configuration channel number onto a board channel.
fn board_channel(channel: u8) -> Result<Channel, ServoError> {
    let ch = match channel {
        0 => Channel::C0,
        1 => Channel::C1,
        2 => Channel::C2,
        3 => Channel::C3,
        4 => Channel::C4,
        5 => Channel::C5,
        6 => Channel::C6,
        7 => Channel::C7,
        8 => Channel::C8,
        9 => Channel::C9,
        10 => Channel::C10,
        11 => Channel::C11,
        12 => Channel::C12,
        13 => Channel::C13,
        14 => Channel::C14,
        15 => Channel::C15,
        _ => return Err(ServoError::InvalidChannel(channel)),
    };

    Ok(ch)
}

fn to_servo_error<E>(e: pwm_pca9685::Error<E>) -> ServoError {
    match e {
        pwm_pca9685::Error::I2C(_) => ServoError::I2c,
        pwm_pca9685::Error::InvalidInputData => ServoError::InvalidOutput,
    }
}
