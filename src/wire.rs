//! Wire format: the fixed `MAXBUFLEN`-byte datagram shared by the clear,
//! parity and checksum channels.
//!
//! Layout: `file-id (FILEIDLEN)` ‖ `file_size (TOTALLEN, big-endian)` ‖
//! `part_no (PARTLEN, big-endian)` ‖ `payload (DATALEN)`. This is a direct
//! port of `serialize()` in `datadiode-send.c` and the matching
//! byte-reassembly performed by hand in `datadiode-recv.c` /
//! `datadiode-recovery.c`, expressed with `byteorder` instead of manual
//! shifts.

use byteorder::{BigEndian, ByteOrder};

use crate::constants::{DATALEN, FILEIDLEN, MAXBUFLEN, PARTLEN, TOTALLEN};

/// One parsed datagram from the file-transfer wire protocol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Packet {
    /// Raw, NUL-padded 100-byte file-id field.
    pub file_id: [u8; FILEIDLEN],
    /// Total size of the source file, in bytes.
    pub file_size: u32,
    /// 1-based slice index, `0` for checksum packets, `0xFFFF_FFFF` for EOF.
    pub part_no: u32,
    /// The DATALEN-byte payload (clear slice, parity XOR, or checksum).
    pub payload: [u8; DATALEN],
}

impl Packet {
    /// Build a packet, truncating or zero-padding `file_id_str` to
    /// `FILEIDLEN` bytes exactly as `serialize()` does.
    pub fn new(file_id_str: &[u8], file_size: u32, part_no: u32, payload: [u8; DATALEN]) -> Self {
        let mut file_id = [0u8; FILEIDLEN];
        let n = file_id_str.len().min(FILEIDLEN);
        file_id[..n].copy_from_slice(&file_id_str[..n]);
        Packet {
            file_id,
            file_size,
            part_no,
            payload,
        }
    }

    /// Serialize into a fresh `MAXBUFLEN`-byte buffer, ready for `send_to`.
    pub fn serialize(&self) -> [u8; MAXBUFLEN] {
        let mut buf = [0u8; MAXBUFLEN];
        buf[..FILEIDLEN].copy_from_slice(&self.file_id);
        BigEndian::write_u32(&mut buf[FILEIDLEN..FILEIDLEN + TOTALLEN], self.file_size);
        BigEndian::write_u32(
            &mut buf[FILEIDLEN + TOTALLEN..FILEIDLEN + TOTALLEN + PARTLEN],
            self.part_no,
        );
        buf[FILEIDLEN + TOTALLEN + PARTLEN..].copy_from_slice(&self.payload);
        buf
    }

    /// Parse a received `MAXBUFLEN`-byte datagram. Returns `None` if the
    /// datagram is short -- a length anomaly, treated as best-effort
    /// discard per the error handling policy, never a fatal error.
    pub fn parse(buf: &[u8]) -> Option<Packet> {
        if buf.len() < MAXBUFLEN {
            return None;
        }
        let mut file_id = [0u8; FILEIDLEN];
        file_id.copy_from_slice(&buf[..FILEIDLEN]);
        let file_size = BigEndian::read_u32(&buf[FILEIDLEN..FILEIDLEN + TOTALLEN]);
        let part_no = BigEndian::read_u32(&buf[FILEIDLEN + TOTALLEN..FILEIDLEN + TOTALLEN + PARTLEN]);
        let mut payload = [0u8; DATALEN];
        payload.copy_from_slice(&buf[FILEIDLEN + TOTALLEN + PARTLEN..MAXBUFLEN]);
        Some(Packet {
            file_id,
            file_size,
            part_no,
            payload,
        })
    }

    /// The file-id, trimmed at the first NUL byte, as a lossy UTF-8 string.
    /// Used to build slice-store file paths.
    pub fn file_id_str(&self) -> String {
        let end = self.file_id.iter().position(|&b| b == 0).unwrap_or(FILEIDLEN);
        String::from_utf8_lossy(&self.file_id[..end]).into_owned()
    }

    /// `true` if this is an EOF-storm packet (`part_no == 0xFFFF_FFFF`).
    pub fn is_eof(&self) -> bool {
        self.part_no == crate::constants::PART_NO_EOF
    }

    /// `true` if this is a checksum packet (`part_no == 0`).
    pub fn is_checksum(&self) -> bool {
        self.part_no == crate::constants::PART_NO_CHECKSUM
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[quickcheck]
    fn round_trip(file_id: Vec<u8>, file_size: u32, part_no: u32, payload: Vec<u8>) -> bool {
        let mut fixed_payload = [0u8; DATALEN];
        for (i, b) in payload.iter().take(DATALEN).enumerate() {
            fixed_payload[i] = *b;
        }
        let packet = Packet::new(&file_id, file_size, part_no, fixed_payload);
        let buf = packet.serialize();
        let parsed = Packet::parse(&buf).expect("full buffer must parse");
        parsed.file_id == packet.file_id
            && parsed.file_size == packet.file_size
            && parsed.part_no == packet.part_no
            && parsed.payload == packet.payload
    }

    #[test]
    fn short_buffer_fails_to_parse() {
        assert!(Packet::parse(&[0u8; 10]).is_none());
    }

    #[test]
    fn file_id_str_trims_at_nul() {
        let p = Packet::new(b"hello.bin", 0, 0, [0u8; DATALEN]);
        assert_eq!(p.file_id_str(), "hello.bin");
    }

    #[test]
    fn eof_and_checksum_classification() {
        let eof = Packet::new(b"f", 0, crate::constants::PART_NO_EOF, [0u8; DATALEN]);
        assert!(eof.is_eof());
        assert!(!eof.is_checksum());

        let checksum = Packet::new(b"f", 0, crate::constants::PART_NO_CHECKSUM, [0u8; DATALEN]);
        assert!(checksum.is_checksum());
        assert!(!checksum.is_eof());
    }
}
