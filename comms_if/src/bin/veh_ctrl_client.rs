//! Simple control client test
//!
//! Sends a ping to the vehicle exec once a second and prints the response.
//! Useful for checking the control chain end to end without a real client.

use comms_if::net::{MonitoredSocket, SocketOptions};
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Create the context for zmq
    let ctx = zmq::Context::new();

    // Set the socket options
    let socket_options = SocketOptions {
        connect_timeout: 1000,
        linger: 1,
        recv_timeout: 1000,
        send_timeout: 10,
        ..Default::default()
    };

    // Create the socket
    let socket = match MonitoredSocket::new(&ctx, zmq::REQ, socket_options, "tcp://localhost:5020")
    {
        Ok(s) => s,
        Err(e) => {
            println!("Could not connect to the vehicle exec");
            return Err(e.into());
        }
    };

    // Loop over sending commands to the exec
    loop {
        // If the socket isn't connected wait a bit, so that zmq doesn't buffer a backlog of
        // commands to deliver all at once when the exec comes back up.
        if !socket.connected() {
            println!("Waiting for connection");
            std::thread::sleep(std::time::Duration::from_millis(1000));
            continue;
        }

        let cmd = json!({"action": "ping"}).to_string();

        // Send the command to the exec
        print!("{} -> ", cmd);
        if let Err(e) = socket.send(&cmd, 0) {
            println!("could not send: {}", e);
            std::thread::sleep(std::time::Duration::from_millis(1000));
            continue;
        }

        // Receive the response from the exec
        match socket.recv_msg(0) {
            Ok(m) => println!("{}", m.as_str().unwrap_or("<non utf-8 response>")),
            Err(e) => println!("no response: {}", e),
        }

        // Wait a bit
        std::thread::sleep(std::time::Duration::from_millis(1000));
    }
}
