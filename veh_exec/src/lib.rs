//! # Vehicle Control Library
//!
//! Core library for the tracked arm vehicle: the actuator drivers, the track
//! and base rotation facades, the arm joint controller with its interference
//! interlock, the shared device state, and the command dispatcher with its
//! safety watchdog.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Arm joint controller.
pub mod arm_ctrl;

/// Base rotation facade.
pub mod base_ctrl;

/// Control server abstraction.
pub mod ctrl_server;

/// Shared device state.
pub mod device_state;

/// Command dispatcher and safety watchdog.
pub mod dispatcher;

/// Hardware construction for the exec.
pub mod hw;

/// Low-level motor drivers.
pub mod motor_driver;

/// Parameters for the vehicle executable.
pub mod params;

/// Track drive facade.
pub mod track_ctrl;
