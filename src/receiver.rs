//! The receiver: three worker threads, one per channel (clear, xor,
//! checksum), each binding one UDP port and writing straight into the
//! slice-store.
//!
//! A generalisation of `main`/`process_data`/`process_checksum` in
//! `datadiode-recv.c`: the three `while(1) { recvfrom(); ... }` loops become
//! three joined threads here instead of three `fork()`ed processes, since
//! nothing in the loop body needs process isolation.

use std::net::UdpSocket;
use std::path::{Path, PathBuf};
use std::thread;

use crate::constants::*;
use crate::error::Fatal;
use crate::store::{self, StorePaths};
use crate::wire::Packet;

/// Everything a receiver run needs.
#[derive(Clone, Debug)]
pub struct ReceiverConfig {
    pub base_port: u16,
    pub temp_folder: PathBuf,
    /// Pin each worker thread to a distinct CPU core (Linux only; a no-op
    /// elsewhere). Matches the C source's `sched_setaffinity` calls.
    pub pin_cores: bool,
}

/// Pin the calling thread to `core`. Linux-only; logs a warning and does
/// nothing on every other target, since `sched_setaffinity` has no
/// portable equivalent.
#[cfg(target_os = "linux")]
fn pin_to_core(core: usize) {
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core, &mut set);
        let rc = libc::sched_setaffinity(0, std::mem::size_of::<libc::cpu_set_t>(), &set);
        if rc != 0 {
            warn!("sched_setaffinity(core={}) failed: {}", core, std::io::Error::last_os_error());
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn pin_to_core(core: usize) {
    warn!("core pinning requested (core={}) but not supported on this platform", core);
}

/// Bind a UDP/IPv4 socket to the wildcard address on `port`, with
/// `SO_REUSEADDR` set before bind, matching `get_socket` in
/// `datadiode-recv.c`. `std::net::UdpSocket` has no portable way to touch
/// socket options pre-bind, so the socket is built with raw `libc` calls
/// and only handed to `UdpSocket` once bound.
#[cfg(target_os = "linux")]
fn bind_socket(port: u16) -> Result<UdpSocket, Fatal> {
    use std::os::unix::io::FromRawFd;

    unsafe {
        let fd = libc::socket(libc::AF_INET, libc::SOCK_DGRAM, 0);
        if fd < 0 {
            return Err(Fatal::SocketSetup(format!("socket(): {}", std::io::Error::last_os_error())));
        }

        let reuse: libc::c_int = 1;
        let rc = libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &reuse as *const _ as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        );
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            libc::close(fd);
            return Err(Fatal::SocketSetup(format!("setsockopt(SO_REUSEADDR): {}", err)));
        }

        let addr = libc::sockaddr_in {
            sin_family: libc::AF_INET as libc::sa_family_t,
            sin_port: port.to_be(),
            sin_addr: libc::in_addr { s_addr: libc::INADDR_ANY.to_be() },
            sin_zero: [0; 8],
        };
        let rc = libc::bind(
            fd,
            &addr as *const libc::sockaddr_in as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        );
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            libc::close(fd);
            return Err(Fatal::SocketBind(format!("0.0.0.0:{}: {}", port, err)));
        }

        Ok(UdpSocket::from_raw_fd(fd))
    }
}

/// Non-Linux fallback: `sockaddr_in`'s layout (notably BSD/macOS's extra
/// `sin_len` field) isn't portable across `libc` targets, and this crate's
/// receiver is deployed on Linux, so the raw-socket path above is gated
/// there; elsewhere this just binds directly and logs the gap.
#[cfg(not(target_os = "linux"))]
fn bind_socket(port: u16) -> Result<UdpSocket, Fatal> {
    warn!("SO_REUSEADDR not set on this platform; binding 0.0.0.0:{} directly", port);
    let socket = UdpSocket::bind(("0.0.0.0", port))
        .map_err(|e| Fatal::SocketBind(format!("0.0.0.0:{}: {}", port, e)))?;
    Ok(socket)
}

/// Handle one datagram on the clear-slice channel: mark presence, write the
/// slice, and create the EOF sentinel if this is an EOF-storm packet and
/// the canonical output doesn't exist yet.
fn handle_clear_packet(temp_folder: &Path, packet: &Packet) -> Result<(), Fatal> {
    let file_id = packet.file_id_str();
    let paths = StorePaths::new(temp_folder, &file_id);

    if packet.is_eof() {
        if !paths.canonical.exists() {
            store::create_eof_sentinel_if_absent(&paths.finished)?;
        }
        return Ok(());
    }
    if packet.is_checksum() || packet.part_no == 0 {
        return Ok(());
    }

    let index = packet.part_no - 1;
    if store::mark_present(&paths.clear_list, index)? {
        store::write_data_slice(&paths.clear_data, index, &packet.payload)?;
    }
    Ok(())
}

/// Handle one datagram on the xor-parity channel: mark presence and write
/// the parity slice.
fn handle_xor_packet(temp_folder: &Path, packet: &Packet) -> Result<(), Fatal> {
    if packet.is_eof() || packet.is_checksum() {
        return Ok(());
    }
    let file_id = packet.file_id_str();
    let paths = StorePaths::new(temp_folder, &file_id);
    let index = packet.part_no - 1;
    if store::mark_present(&paths.xor_list, index)? {
        store::write_data_slice(&paths.xor_data, index, &packet.payload)?;
    }
    Ok(())
}

/// Handle one datagram on the checksum channel: write the checksum header
/// once, and treat a checksum-channel EOF packet the same as the clear
/// channel's (the EOF storm runs on the checksum socket).
fn handle_checksum_packet(temp_folder: &Path, packet: &Packet) -> Result<(), Fatal> {
    let file_id = packet.file_id_str();
    let paths = StorePaths::new(temp_folder, &file_id);

    if packet.is_eof() {
        if !paths.canonical.exists() {
            store::create_eof_sentinel_if_absent(&paths.finished)?;
        }
        return Ok(());
    }
    if !packet.is_checksum() {
        return Ok(());
    }
    store::write_checksum_header_if_absent(&paths.checksum, &packet.file_id, packet.file_size, &packet.payload)?;
    Ok(())
}

/// One channel's receive loop: bind, optionally pin to a core, then loop
/// forever dispatching datagrams through `handler`. A malformed (short)
/// datagram is logged and skipped; a slice-store I/O failure is fatal,
/// since it signals a broken filesystem rather than network loss.
fn run_channel<F>(name: &'static str, socket: UdpSocket, core: Option<usize>, handler: F) -> Result<(), Fatal>
where
    F: Fn(&Packet) -> Result<(), Fatal>,
{
    if let Some(core) = core {
        pin_to_core(core);
    }
    let mut buf = [0u8; MAXBUFLEN];
    loop {
        let (n, _src) = socket
            .recv_from(&mut buf)
            .map_err(|e| Fatal::SocketRecv(format!("{} channel: {}", name, e)))?;
        match Packet::parse(&buf[..n]) {
            Some(packet) => {
                if let Err(e) = handler(&packet) {
                    return Err(e);
                }
            }
            None => warn!("{} channel: dropped short datagram ({} bytes)", name, n),
        }
    }
}

/// Run the three receive loops on their own threads and block until all
/// three have been joined (which in practice means until one of them hits
/// a fatal error, since the loops never return otherwise).
pub fn run(config: &ReceiverConfig) -> Result<(), Fatal> {
    let clear_socket = bind_socket(config.base_port)?;
    let xor_socket = bind_socket(config.base_port + 1)?;
    let checksum_socket = bind_socket(config.base_port + 2)?;

    let clear_folder = config.temp_folder.clone();
    let xor_folder = config.temp_folder.clone();
    let checksum_folder = config.temp_folder.clone();

    let cores = if config.pin_cores { (Some(0), Some(1), Some(2)) } else { (None, None, None) };

    let checksum_handle = thread::Builder::new()
        .name("datadiode-checksum".into())
        .spawn(move || run_channel("checksum", checksum_socket, cores.2, |p| handle_checksum_packet(&checksum_folder, p)))
        .map_err(|e| Fatal::ThreadSpawn(format!("checksum worker: {}", e)))?;

    let clear_handle = thread::Builder::new()
        .name("datadiode-clear".into())
        .spawn(move || run_channel("clear", clear_socket, cores.0, |p| handle_clear_packet(&clear_folder, p)))
        .map_err(|e| Fatal::ThreadSpawn(format!("clear worker: {}", e)))?;

    let xor_handle = thread::Builder::new()
        .name("datadiode-xor".into())
        .spawn(move || run_channel("xor", xor_socket, cores.1, |p| handle_xor_packet(&xor_folder, p)))
        .map_err(|e| Fatal::ThreadSpawn(format!("xor worker: {}", e)))?;

    info!("listening on ports {}/{}/{} (clear/xor/checksum)", config.base_port, config.base_port + 1, config.base_port + 2);

    // Join order mirrors the C source's wait order: checksum, clear, xor.
    checksum_handle
        .join()
        .map_err(|_| Fatal::ThreadJoin("checksum worker panicked".to_string()))??;
    clear_handle
        .join()
        .map_err(|_| Fatal::ThreadJoin("clear worker panicked".to_string()))??;
    xor_handle
        .join()
        .map_err(|_| Fatal::ThreadJoin("xor worker panicked".to_string()))??;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn handle_clear_packet_writes_slice_once() {
        let dir = tempdir().unwrap();
        let payload = [7u8; DATALEN];
        let packet = Packet::new(b"f.bin", 4000, 3, payload);
        handle_clear_packet(dir.path(), &packet).unwrap();

        let paths = StorePaths::new(dir.path(), "f.bin");
        assert_eq!(store::read_presence(&paths.clear_list, 2), MAGICNUMBER);
        assert_eq!(store::read_data_slice(&paths.clear_data, 2).unwrap(), payload);

        // Re-delivery of the same slice is a no-op (idempotence).
        let other_payload = [9u8; DATALEN];
        let dup = Packet::new(b"f.bin", 4000, 3, other_payload);
        handle_clear_packet(dir.path(), &dup).unwrap();
        assert_eq!(store::read_data_slice(&paths.clear_data, 2).unwrap(), payload);
    }

    #[test]
    fn handle_checksum_packet_writes_header_once() {
        let dir = tempdir().unwrap();
        let payload = [5u8; DATALEN];
        let packet = Packet::new(b"f.bin", 9999, PART_NO_CHECKSUM, payload);
        handle_checksum_packet(dir.path(), &packet).unwrap();

        let paths = StorePaths::new(dir.path(), "f.bin");
        let hdr = store::read_checksum_header(&paths.checksum).unwrap();
        assert_eq!(hdr.file_size, 9999);
        assert_eq!(hdr.checksum, payload);
    }

    #[test]
    fn eof_packet_creates_sentinel_unless_canonical_exists() {
        let dir = tempdir().unwrap();
        let packet = Packet::new(b"f.bin", 0, PART_NO_EOF, [0u8; DATALEN]);
        handle_clear_packet(dir.path(), &packet).unwrap();

        let paths = StorePaths::new(dir.path(), "f.bin");
        assert!(paths.finished.exists());

        // If the canonical output already exists (a finished prior transfer),
        // a fresh EOF storm for the same file-id must not recreate the
        // sentinel.
        let dir2 = tempdir().unwrap();
        let paths2 = StorePaths::new(dir2.path(), "f.bin");
        std::fs::write(&paths2.canonical, b"done").unwrap();
        handle_clear_packet(dir2.path(), &packet).unwrap();
        assert!(!paths2.finished.exists());
    }
}
