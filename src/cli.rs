//! CLI option parsers, one function per binary.
//!
//! Built with `clap`'s `App`/`Arg` builder in the same idiom as the
//! teacher's `src/cli.rs` / `src/config.rs` (no derive macros), returning a
//! small plain struct per binary that the corresponding `src/bin/*.rs`
//! consumes directly.

use clap::{App, Arg};
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::str::FromStr;

const VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

fn verbose_arg<'a, 'b>() -> Arg<'a, 'b> {
    Arg::with_name("verbose")
        .short("v")
        .long("verbose")
        .multiple(true)
        .help("Increase logging verbosity (repeatable)")
}

/// Parsed arguments for `datadiode-send`.
#[derive(Clone, Debug)]
pub struct SendArgs {
    pub destination: Ipv4Addr,
    pub port: u16,
    pub file: PathBuf,
    pub xor_group_size: u32,
    pub spray: u32,
    pub target_mbps: f64,
    pub verbose: u64,
}

/// Parse `argv` for `datadiode-send`.
pub fn parse_send_args() -> SendArgs {
    let matches = App::new("datadiode-send")
        .version(VERSION.unwrap_or("unknown"))
        .about("Sends a file across the data diode using fountain-coded UDP")
        .arg(Arg::with_name("ip").required(true).index(1).help("Destination IPv4 address"))
        .arg(Arg::with_name("port").required(true).index(2).help("Base UDP port (clear=port, xor=port+1, checksum=port+2)"))
        .arg(Arg::with_name("file").required(true).index(3).help("Path of the file to send"))
        .arg(Arg::with_name("xor-group-size").required(true).index(4).help("Number of slices XORed per parity group"))
        .arg(Arg::with_name("spray").required(true).index(5).help("Spray (re-emission) multiplier"))
        .arg(
            Arg::with_name("target-mbps")
                .long("target-mbps")
                .takes_value(true)
                .default_value("900")
                .help("Target send bandwidth in megabits per second"),
        )
        .arg(verbose_arg())
        .get_matches();

    SendArgs {
        destination: Ipv4Addr::from_str(matches.value_of("ip").unwrap())
            .unwrap_or_else(|e| panic!("invalid destination IPv4 address: {}", e)),
        port: u16::from_str(matches.value_of("port").unwrap())
            .unwrap_or_else(|e| panic!("invalid port: {}", e)),
        file: PathBuf::from(matches.value_of("file").unwrap()),
        xor_group_size: u32::from_str(matches.value_of("xor-group-size").unwrap())
            .unwrap_or_else(|e| panic!("invalid xor-group-size: {}", e)),
        spray: u32::from_str(matches.value_of("spray").unwrap())
            .unwrap_or_else(|e| panic!("invalid spray: {}", e)),
        target_mbps: f64::from_str(matches.value_of("target-mbps").unwrap())
            .unwrap_or_else(|e| panic!("invalid target-mbps: {}", e)),
        verbose: matches.occurrences_of("verbose"),
    }
}

/// Parsed arguments for `datadiode-recv`.
#[derive(Clone, Debug)]
pub struct RecvArgs {
    pub port: u16,
    pub temp_folder: PathBuf,
    pub verbose: u64,
}

/// Parse `argv` for `datadiode-recv`.
pub fn parse_recv_args() -> RecvArgs {
    let matches = App::new("datadiode-recv")
        .version(VERSION.unwrap_or("unknown"))
        .about("Receives fountain-coded UDP slices into an on-disk slice-store")
        .arg(Arg::with_name("port").required(true).index(1).help("Base UDP port (clear=port, xor=port+1, checksum=port+2)"))
        .arg(Arg::with_name("temp-folder").required(true).index(2).help("Directory holding the slice-store files"))
        .arg(verbose_arg())
        .get_matches();

    RecvArgs {
        port: u16::from_str(matches.value_of("port").unwrap())
            .unwrap_or_else(|e| panic!("invalid port: {}", e)),
        temp_folder: PathBuf::from(matches.value_of("temp-folder").unwrap()),
        verbose: matches.occurrences_of("verbose"),
    }
}

/// Parsed arguments for `datadiode-recovery`.
#[derive(Clone, Debug)]
pub struct RecoveryArgs {
    pub input_folder: PathBuf,
    pub file_basename: String,
    pub xor_group_size: u32,
    pub verbose: u64,
}

/// Parse `argv` for `datadiode-recovery`.
pub fn parse_recovery_args() -> RecoveryArgs {
    let matches = App::new("datadiode-recovery")
        .version(VERSION.unwrap_or("unknown"))
        .about("Reconstructs missing slices from a receiver's slice-store")
        .arg(Arg::with_name("input-folder").required(true).index(1).help("Directory holding the slice-store files"))
        .arg(Arg::with_name("file-basename").required(true).index(2).help("File-id of the transfer to recover"))
        .arg(Arg::with_name("xor-group-size").required(true).index(3).help("Must match the sender's xor-group-size"))
        .arg(verbose_arg())
        .get_matches();

    RecoveryArgs {
        input_folder: PathBuf::from(matches.value_of("input-folder").unwrap()),
        file_basename: matches.value_of("file-basename").unwrap().to_string(),
        xor_group_size: u32::from_str(matches.value_of("xor-group-size").unwrap())
            .unwrap_or_else(|e| panic!("invalid xor-group-size: {}", e)),
        verbose: matches.occurrences_of("verbose"),
    }
}

/// Parsed arguments shared by the syslog amplifier/deamplifier (no
/// positional args; ports are compiled in per spec).
#[derive(Clone, Debug)]
pub struct SyslogRelayArgs {
    pub verbose: u64,
}

fn parse_syslog_relay_args(name: &str, about: &str) -> SyslogRelayArgs {
    let matches = App::new(name)
        .version(VERSION.unwrap_or("unknown"))
        .about(about)
        .arg(verbose_arg())
        .get_matches();

    SyslogRelayArgs {
        verbose: matches.occurrences_of("verbose"),
    }
}

/// Parse `argv` for `datadiode-amplify-syslog`.
pub fn parse_amplify_args() -> SyslogRelayArgs {
    parse_syslog_relay_args(
        "datadiode-amplify-syslog",
        "Amplifies inbound syslog UDP datagrams across the data diode",
    )
}

/// Parse `argv` for `datadiode-deamplify-syslog`.
pub fn parse_deamplify_args() -> SyslogRelayArgs {
    parse_syslog_relay_args(
        "datadiode-deamplify-syslog",
        "Suppresses amplified duplicate syslog UDP datagrams",
    )
}
