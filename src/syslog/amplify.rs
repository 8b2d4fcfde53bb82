//! Syslog amplifier: listens on the clear side of the diode, tags each
//! inbound datagram with an incrementing counter, and fires `AMPFACTOR`
//! copies across to the deamplifier to survive the link's packet loss.
//!
//! Grounded on `datadiode-amplify-syslog.c`'s `main`.

use std::net::UdpSocket;

use crate::constants::{AMPFACTOR, SYSLOG_AMPLIFY_LISTEN_PORT, SYSLOG_DEAMPLIFY_LISTEN_PORT, SYSLOG_MAXLINE};
use crate::error::Fatal;
use crate::syslog::Amplified;

/// Run the amplifier. Never returns except on a fatal socket error.
pub fn run() -> Result<(), Fatal> {
    let listen_socket = UdpSocket::bind(("::", SYSLOG_AMPLIFY_LISTEN_PORT))
        .map_err(|e| Fatal::SocketBind(format!("[::]:{}: {}", SYSLOG_AMPLIFY_LISTEN_PORT, e)))?;
    let forward_socket = UdpSocket::bind(("::1", 0))
        .map_err(|e| Fatal::SocketSetup(format!("forward socket bind: {}", e)))?;
    forward_socket
        .connect(("::1", SYSLOG_DEAMPLIFY_LISTEN_PORT))
        .map_err(|e| Fatal::SocketSetup(format!("connect to deamplifier: {}", e)))?;

    info!("syslog amplifier listening on [::]:{}", SYSLOG_AMPLIFY_LISTEN_PORT);

    let mut counter: u16 = 0;
    let mut buf = [0u8; SYSLOG_MAXLINE];
    loop {
        let (n, _src) = listen_socket
            .recv_from(&mut buf)
            .map_err(|e| Fatal::SocketRecv(format!("syslog amplifier: {}", e)))?;

        let amplified = Amplified { counter, line: buf[..n].to_vec() };
        let datagram = amplified.serialize();

        for _ in 0..AMPFACTOR {
            if let Err(e) = forward_socket.send(&datagram) {
                warn!("syslog amplifier: send to deamplifier failed: {}", e);
            }
        }
        trace!("amplified datagram counter={} len={}", counter, n);
        counter = counter.wrapping_add(1);
    }
}
