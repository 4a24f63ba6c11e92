//! # Vehicle Control Executable
//!
//! This executable is responsible for controlling the tracked arm vehicle:
//! - Track drive motors (TB6612 dual H-bridge)
//! - Arm joint servos (PCA9685 servo board)
//! - Base rotation motor (DRV8837 single H-bridge)
//!
//! Commands arrive over the control server and are dispatched through the
//! safety-interlocked core; every loop iteration also runs the watchdog, so
//! command silence always brings the vehicle to a stop.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

// External
use color_eyre::{eyre::WrapErr, Result};
use log::{info, warn};
use std::time::Instant;

// Internal
use util::{
    host,
    logger::{logger_init, LevelFilter},
    session::Session,
};
use veh_lib::ctrl_server::CtrlServer;
use veh_lib::hw;
use veh_lib::params::VehExecParams;

// ------------------------------------------------------------------------------------------------
// MAIN
// ------------------------------------------------------------------------------------------------

fn main() -> Result<()> {
    // ---- EARLY INITIALISATION ----

    // Initialise session
    let session = Session::new("veh_exec", "sessions").wrap_err("Failed to create the session")?;

    // Initialise logger
    logger_init(LevelFilter::Trace, &session).wrap_err("Failed to initialise logging")?;

    // Log information on this execution.
    info!("Vehicle Control Executable\n");
    info!(
        "Running on: {:#?}",
        host::get_uname().wrap_err("Failed to get host information")?
    );
    info!("Session directory: {:?}\n", session.session_root);

    info!("Initialising...");

    // ---- LOAD PARAMETERS ----

    let params: VehExecParams = util::params::load("veh_exec.toml")?;

    params
        .are_valid()
        .wrap_err("Loaded parameters are invalid")?;

    info!("Parameters loaded");

    // ---- HARDWARE INITIALISATION ----

    let mut dispatcher =
        hw::build_dispatcher(&params, Instant::now()).wrap_err("Failed to initialise actuators")?;

    // Drive the arm to its configured initial pose
    dispatcher.reset_arm(Instant::now());

    info!("Actuators initialised");

    // ---- SERVER INITIALISATION ----

    let mut server = CtrlServer::new(&params).wrap_err("Failed to initialise the server")?;

    info!("Server initialised on {}", params.ctrl_endpoint);

    // ---- MAIN LOOP ----

    info!("Initialisation complete, entering main loop");

    let mut client_seen = false;

    loop {
        // At most one command is processed per iteration, and the watchdog
        // check below shares its clock sample, so a command's effect on the
        // command timer is always visible to the same iteration's check.
        let cmd = server.get_command();
        let now = Instant::now();

        if let Some(raw) = cmd {
            if !client_seen {
                info!("First command received");
                client_seen = true;
            }

            let response = dispatcher.handle(&raw, now);

            if let Err(e) = server.send_response(&response) {
                warn!(
                    "Couldn't send response to client, making the vehicle safe: {}",
                    e
                );
                dispatcher.make_safe(now);
            }
        }

        dispatcher.check_safety(now);
    }
}
