//! Syslog deamplifier: the far side of [`super::amplify`]. Receives the
//! amplifier's resent copies, drops every duplicate by counter, and
//! forwards exactly one copy of each distinct line to the local syslog
//! listener.
//!
//! Grounded on `datadiode-deamplify-syslog.c`'s `main`.

use std::net::UdpSocket;

use crate::constants::{DEAMPLIFY_INITIAL_COUNTER, SYSLOG_DEAMPLIFY_LISTEN_PORT, SYSLOG_MAXLINE, SYSLOG_OUTPUT_PORT};
use crate::error::Fatal;
use crate::syslog::{should_forward, Amplified};

/// Run the deamplifier. Never returns except on a fatal socket error.
pub fn run() -> Result<(), Fatal> {
    let listen_socket = UdpSocket::bind(("::1", SYSLOG_DEAMPLIFY_LISTEN_PORT))
        .map_err(|e| Fatal::SocketBind(format!("[::1]:{}: {}", SYSLOG_DEAMPLIFY_LISTEN_PORT, e)))?;
    let output_socket = UdpSocket::bind(("::1", 0))
        .map_err(|e| Fatal::SocketSetup(format!("output socket bind: {}", e)))?;
    output_socket
        .connect(("::1", SYSLOG_OUTPUT_PORT))
        .map_err(|e| Fatal::SocketSetup(format!("connect to local syslog: {}", e)))?;

    info!("syslog deamplifier listening on [::1]:{}", SYSLOG_DEAMPLIFY_LISTEN_PORT);

    let mut last_forwarded = DEAMPLIFY_INITIAL_COUNTER;
    let mut buf = [0u8; 2 + SYSLOG_MAXLINE];
    loop {
        let (n, _src) = listen_socket
            .recv_from(&mut buf)
            .map_err(|e| Fatal::SocketRecv(format!("syslog deamplifier: {}", e)))?;

        let amplified = match Amplified::parse(&buf[..n]) {
            Some(a) => a,
            None => {
                warn!("syslog deamplifier: dropped short datagram ({} bytes)", n);
                continue;
            }
        };

        if !should_forward(amplified.counter, last_forwarded) {
            continue;
        }
        last_forwarded = amplified.counter;

        if let Err(e) = output_socket.send(&amplified.line) {
            warn!("syslog deamplifier: forward failed: {}", e);
        }
    }
}
