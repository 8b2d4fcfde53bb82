//! The syslog amplifier/deamplifier pair: a second, much smaller one-way
//! relay sharing the diode with the file transfer, carrying low-latency
//! syslog lines instead of bulk files.
//!
//! Grounded on `datadiode-amplify-syslog.c` / `datadiode-deamplify-syslog.c`.
//! Both sides talk UDP/IPv6; the wire format is a 2-byte big-endian
//! sequence counter prepended to the raw syslog line, so the deamplifier
//! can drop the `AMPFACTOR` duplicate resends the amplifier emits to paper
//! over the diode's unreliability.

pub mod amplify;
pub mod deamplify;

use crate::constants::SYSLOG_MAXLINE;

/// One amplified datagram: a sequence counter plus the original syslog
/// line it was cut from.
pub struct Amplified {
    pub counter: u16,
    pub line: Vec<u8>,
}

impl Amplified {
    /// Serialize as `counter (2 bytes, big-endian) ‖ line`.
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(2 + self.line.len());
        buf.extend_from_slice(&self.counter.to_be_bytes());
        buf.extend_from_slice(&self.line);
        buf
    }

    /// Parse a received datagram. Returns `None` if it's too short to
    /// carry even an empty line under the counter.
    pub fn parse(buf: &[u8]) -> Option<Amplified> {
        if buf.len() < 2 {
            return None;
        }
        let counter = u16::from_be_bytes([buf[0], buf[1]]);
        let line = buf[2..buf.len().min(2 + SYSLOG_MAXLINE)].to_vec();
        Some(Amplified { counter, line })
    }
}

/// Should a datagram carrying `counter` be forwarded, given the counter of
/// the last-forwarded datagram? A pure function so the dedup rule can be
/// tested without any socket I/O.
///
/// Mirrors the deamplifier's duplicate-suppression check: forward iff the
/// counter differs from the last one forwarded. `AMPFACTOR` identical
/// resends of the same source line thus produce exactly one forwarded
/// copy, as long as at least one of them arrives.
pub fn should_forward(counter: u16, last_forwarded: u16) -> bool {
    counter != last_forwarded
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amplified_round_trips() {
        let a = Amplified { counter: 42, line: b"hello world".to_vec() };
        let buf = a.serialize();
        let parsed = Amplified::parse(&buf).unwrap();
        assert_eq!(parsed.counter, 42);
        assert_eq!(parsed.line, b"hello world");
    }

    #[test]
    fn should_forward_dedupes_identical_counters() {
        assert!(should_forward(0, crate::constants::DEAMPLIFY_INITIAL_COUNTER));
        assert!(!should_forward(5, 5));
        assert!(should_forward(6, 5));
    }
}
