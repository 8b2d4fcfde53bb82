//! The file sender: slices the source file, builds XOR parity groups over
//! a shared pseudorandom permutation, and emits the sequential pass, the
//! ten-round spray loop, and the EOF storm described in the send schedule.
//!
//! A direct generalisation of `send_file`/`get_socket`/`prepare_fountain`/
//! `fill_clear_data`/`fill_xor_data`/`get_checksum`/`send_slice` in
//! `datadiode-send.c`.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::net::{Ipv4Addr, UdpSocket};
use std::thread;
use std::time::{Duration, Instant};

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::constants::*;
use crate::error::Fatal;
use crate::fountain;
use crate::wire::Packet;

/// Everything the sender needs to know, threaded explicitly instead of
/// living in C globals (`XOR_GROUP_SIZE`, `SPRAY`, `total_bytes`, ...).
#[derive(Clone, Debug)]
pub struct SenderConfig {
    pub destination: Ipv4Addr,
    pub base_port: u16,
    pub file: std::path::PathBuf,
    pub xor_group_size: u32,
    pub spray: u32,
    pub target_mbps: f64,
}

/// Bandwidth-pacing state: `total_bytes` and `start_time` from the C
/// source, now owned instead of global.
struct Pacing {
    total_bytes: u64,
    start: Instant,
    target_mbps: f64,
}

impl Pacing {
    fn new(target_mbps: f64) -> Self {
        Pacing {
            total_bytes: 0,
            start: Instant::now(),
            target_mbps,
        }
    }

    /// After sending `n` bytes, sleep long enough to stay at or below
    /// `target_mbps`, matching `send_slice`'s `expected - elapsed` wait.
    fn after_send(&mut self, n: usize) {
        self.total_bytes += n as u64;
        let expected_secs = (self.total_bytes as f64 * 8.0) / (self.target_mbps * 1e6);
        let elapsed_secs = self.start.elapsed().as_secs_f64();
        if elapsed_secs < expected_secs {
            thread::sleep(Duration::from_secs_f64(expected_secs - elapsed_secs));
        }
    }
}

fn connected_socket(ip: Ipv4Addr, port: u16) -> Result<UdpSocket, Fatal> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .map_err(|e| Fatal::SocketSetup(format!("bind: {}", e)))?;
    socket
        .connect((ip, port))
        .map_err(|e| Fatal::SocketSetup(format!("connect {}:{}: {}", ip, port, e)))?;
    Ok(socket)
}

/// Send one packet, fire-and-forget: a `send` failure is logged and the
/// caller continues, per the error handling policy (losing datagrams is
/// the normal operating condition).
fn send_packet(socket: &UdpSocket, packet: &Packet, pacing: &mut Pacing) {
    let buf = packet.serialize();
    match socket.send(&buf) {
        Ok(n) => pacing.after_send(n),
        Err(e) => warn!("sendto failed: {}", e),
    }
}

fn fill_clear_data(file: &mut File, slice_index: u32) -> [u8; DATALEN] {
    let mut buf = [0u8; DATALEN];
    if file.seek(SeekFrom::Start(slice_index as u64 * DATALEN as u64)).is_err() {
        return buf;
    }
    let n = file.read(&mut buf).unwrap_or(0);
    if n < DATALEN {
        for b in buf.iter_mut().skip(n) {
            *b = 0;
        }
    }
    buf
}

fn fill_xor_data(file: &mut File, index: &[u32], group: u32, slices: u32, xor_group_size: u32) -> [u8; DATALEN] {
    let mut out = [0u8; DATALEN];
    for i in 0..xor_group_size {
        let slice_index = index[((group + i) % slices) as usize];
        let piece = fill_clear_data(file, slice_index);
        for (o, p) in out.iter_mut().zip(piece.iter()) {
            *o ^= p;
        }
    }
    out
}

/// Whole-file XOR checksum: XOR of every (zero-padded) clear slice.
pub fn get_checksum(file: &mut File, slices: u32) -> [u8; DATALEN] {
    let mut checksum = [0u8; DATALEN];
    for i in 0..slices {
        let slice = fill_clear_data(file, i);
        for (c, s) in checksum.iter_mut().zip(slice.iter()) {
            *c ^= s;
        }
    }
    checksum
}

fn basename(path: &std::path::Path) -> Vec<u8> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
        .into_bytes()
}

/// Run the complete send schedule described in the send schedule: the
/// sequential pass, the pause, the ten-round spray loop, and the EOF
/// storm. Blocks until the EOF storm completes.
pub fn run(config: &SenderConfig) -> Result<(), Fatal> {
    let clear_socket = connected_socket(config.destination, config.base_port)?;
    let xor_socket = connected_socket(config.destination, config.base_port + 1)?;
    let checksum_socket = connected_socket(config.destination, config.base_port + 2)?;

    let metadata = std::fs::metadata(&config.file)
        .map_err(|e| Fatal::StatSource(format!("{}: {}", config.file.display(), e)))?;
    let file_size = metadata.len();
    if file_size > u32::MAX as u64 {
        return Err(Fatal::StatSource(format!(
            "{}: file too large ({} bytes exceeds u32 file_size field)",
            config.file.display(),
            file_size
        )));
    }
    let file_size = file_size as u32;

    let mut file = File::open(&config.file)
        .map_err(|e| Fatal::FileOpen(format!("{}: {}", config.file.display(), e)))?;

    let raw_slices = (file_size as u64 + DATALEN as u64 - 1) / DATALEN as u64;
    let slices = (raw_slices as u32).max(config.xor_group_size);

    info!(
        "{} file_size={} slices={}",
        config.file.display(),
        file_size,
        slices
    );

    let checksum = get_checksum(&mut file, slices);

    let file_id = basename(&config.file);
    let transmission_seed = u64::from(fountain::fnv1a32(&file_id));
    let mut spray_rng = SmallRng::seed_from_u64(transmission_seed);

    let index = fountain::build_permutation(slices, FOUNTAIN_SEED);

    let mut pacing = Pacing::new(config.target_mbps);

    // A. SEQUENTIAL PASS
    for s in 1..=slices {
        let payload = fill_clear_data(&mut file, s - 1);
        let packet = Packet::new(&file_id, file_size, s, payload);
        send_packet(&clear_socket, &packet, &mut pacing);
        spin_sleep_micros(SEQUENTIAL_SPACING_US);
    }
    debug!("sent the sequential packets");

    // B. 500ms pause
    thread::sleep(Duration::from_millis(SPRAY_PAUSE_MS));
    debug!("sending shuffled clear/XORed packets mix + checksum");

    // C. SPRAY LOOP
    let rounds = (slices + 9) / 10;
    let mut parts1: u64 = 0;
    let mut parts2: u64 = 0;
    let clear_target = slices as u64 * config.spray as u64;
    let xor_target = slices as u64 * config.spray as u64;

    for _ in 0..SPRAY_ROUNDS {
        let checksum_packet = Packet::new(&file_id, file_size, PART_NO_CHECKSUM, checksum);
        send_packet(&checksum_socket, &checksum_packet, &mut pacing);

        for _ in 0..(rounds as u64 * config.spray as u64) {
            if parts1 >= clear_target {
                break;
            }
            let part_no = spray_rng.gen_range(0..slices) + 1;
            let payload = fill_clear_data(&mut file, part_no - 1);
            let packet = Packet::new(&file_id, file_size, part_no, payload);
            send_packet(&clear_socket, &packet, &mut pacing);
            parts1 += 1;
        }

        let checksum_packet = Packet::new(&file_id, file_size, PART_NO_CHECKSUM, checksum);
        send_packet(&checksum_socket, &checksum_packet, &mut pacing);

        for _ in 0..(rounds as u64 * config.spray as u64) {
            if parts2 >= xor_target {
                break;
            }
            let part_no = spray_rng.gen_range(0..slices) + 1;
            let payload = fill_xor_data(&mut file, &index, part_no - 1, slices, config.xor_group_size);
            let packet = Packet::new(&file_id, file_size, part_no, payload);
            send_packet(&xor_socket, &packet, &mut pacing);
            parts2 += 1;
        }
    }
    debug!("done sending shuffled clear/XORed packets mix");

    // D. EOF STORM
    debug!("sending {} EOF packets", EOF_STORM_COUNT);
    for _ in 0..EOF_STORM_COUNT {
        let packet = Packet::new(&file_id, file_size, PART_NO_EOF, checksum);
        send_packet(&checksum_socket, &packet, &mut pacing);
        thread::sleep(Duration::from_micros(EOF_STORM_SPACING_US));
    }
    info!("finished sending {}", config.file.display());

    Ok(())
}

/// A short busy/park spin to approximate the C source's `usleep(100)`
/// without relying on OS timer-slice granularity for sub-millisecond
/// sleeps (`thread::sleep` on most platforms rounds up past 1ms).
fn spin_sleep_micros(micros: u64) {
    let deadline = Instant::now() + Duration::from_micros(micros);
    while Instant::now() < deadline {
        std::hint::spin_loop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn checksum_matches_manual_xor() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..(DATALEN * 3 + 10)).map(|i| (i % 251) as u8).collect();
        tmp.write_all(&data).unwrap();
        tmp.flush().unwrap();

        let mut file = File::open(tmp.path()).unwrap();
        let slices = 4u32;
        let checksum = get_checksum(&mut file, slices);

        let mut expected = [0u8; DATALEN];
        for i in 0..slices {
            let start = i as usize * DATALEN;
            for j in 0..DATALEN {
                let byte = data.get(start + j).copied().unwrap_or(0);
                expected[j] ^= byte;
            }
        }
        assert_eq!(checksum, expected);
    }

    #[test]
    fn fill_xor_data_is_xor_of_group_members() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        let data: Vec<u8> = (0..(DATALEN * 4)).map(|i| (i % 97) as u8).collect();
        tmp.write_all(&data).unwrap();
        tmp.flush().unwrap();

        let mut file = File::open(tmp.path()).unwrap();
        let index: Vec<u32> = vec![3, 1, 0, 2];
        let group = fill_xor_data(&mut file, &index, 0, 4, 4);

        let mut expected = [0u8; DATALEN];
        for &slice_idx in &index {
            let s = fill_clear_data(&mut file, slice_idx);
            for (e, b) in expected.iter_mut().zip(s.iter()) {
                *e ^= b;
            }
        }
        assert_eq!(group, expected);
    }
}
