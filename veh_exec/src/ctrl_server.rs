//! # Control Server Module
//!
//! This module abstracts over the networking side of the vehicle executable.
//! The server accepts a connection from a client, hands raw message text to
//! the dispatcher, and returns the dispatcher's response. The receive poll
//! is bounded so that the main loop's watchdog check always runs; absence
//! of a message is not an error.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    tc::CtrlResponse,
};
use log::warn;

use crate::params::VehExecParams;

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Receive poll timeout in milliseconds. Bounds each main loop iteration so
/// the safety watchdog runs at this cadence even with no client connected.
const RECV_TIMEOUT_MS: i32 = 100;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An abstraction over the networking part of the vehicle executable.
///
/// The server accepts a connection from a client, allowing commands to be
/// received and their responses returned.
pub struct CtrlServer {
    /// REP socket which accepts commands from the client
    cmd_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Errors which can occur in the [`CtrlServer`]
#[derive(thiserror::Error, Debug)]
pub enum CtrlServerError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("Could not send a response to the client: {0}")]
    SendError(zmq::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CtrlServer {
    /// Create a new instance of the control server.
    ///
    /// This function will not wait for a connection from a client before
    /// returning.
    pub fn new(params: &VehExecParams) -> Result<Self, CtrlServerError> {
        // Create the zmq context
        let ctx = zmq::Context::new();

        // Create the socket options
        let cmd_socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            recv_timeout: RECV_TIMEOUT_MS,
            send_timeout: 10,
            ..Default::default()
        };

        // Create the socket
        let cmd_socket = MonitoredSocket::new(
            &ctx,
            zmq::REP,
            cmd_socket_options,
            &params.ctrl_endpoint,
        )?;

        // Create self
        Ok(Self { cmd_socket })
    }

    /// Retrieve the next raw command from the client, or `None` if nothing
    /// arrived within the receive timeout.
    ///
    /// Every `Some` return MUST be answered with
    /// [`CtrlServer::send_response`] before the next receive (REP socket
    /// contract).
    pub fn get_command(&mut self) -> Option<String> {
        let msg = self.cmd_socket.recv_msg(0).ok()?;

        match msg.as_str() {
            Some(s) => Some(s.to_string()),
            None => {
                // A reply is still owed; hand the dispatcher an empty
                // message so it produces the invalid JSON error
                warn!("Received a command which is not valid UTF-8");
                Some(String::new())
            }
        }
    }

    /// Send a response to the client for the last received command.
    pub fn send_response(&mut self, response: &CtrlResponse) -> Result<(), CtrlServerError> {
        // Serialize response
        let resp_str = serde_json::to_string(response)
            .expect("Response serialization failed. This should not happen");

        // Send response
        self.cmd_socket
            .send(&resp_str, 0)
            .map_err(CtrlServerError::SendError)
    }
}
