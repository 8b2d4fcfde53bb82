//! Wire-format and protocol constants shared by every binary in this crate.
//!
//! These mirror the `#define`s duplicated across `datadiode-send.c`,
//! `datadiode-recv.c` and `datadiode-recovery.c` in the original C
//! implementation; here they live in one place.

/// Length, in bytes, of the file-id field (zero-padded printable name).
pub const FILEIDLEN: usize = 100;
/// Length, in bytes, of the big-endian file-size field.
pub const TOTALLEN: usize = 4;
/// Length, in bytes, of the big-endian part-number field.
pub const PARTLEN: usize = 4;
/// Length, in bytes, of a slice / payload.
pub const DATALEN: usize = 1364;
/// Total length of one datagram: FILEIDLEN + TOTALLEN + PARTLEN + DATALEN.
pub const MAXBUFLEN: usize = FILEIDLEN + TOTALLEN + PARTLEN + DATALEN;

/// Value written into a slice-list byte to mean "present".
pub const MAGICNUMBER: u8 = 42;

/// Part number reserved for checksum packets.
pub const PART_NO_CHECKSUM: u32 = 0;
/// Part number reserved for EOF-storm packets: the bit pattern of `(unsigned)(-1)`.
pub const PART_NO_EOF: u32 = 0xFFFF_FFFF;

/// Seed shared end-to-end by the sender and the recovery engine so both
/// sides reconstruct the identical permutation.
pub const FOUNTAIN_SEED: u64 = 777;

/// Default XOR parity-group size.
pub const DEFAULT_XOR_GROUP_SIZE: u32 = 4;
/// Default spray (re-emission) multiplier for parity packets.
pub const DEFAULT_SPRAY: u32 = 6;

/// Default target bandwidth, in megabits per second, for send pacing.
pub const TARGET_MBPS: f64 = 900.0;

/// Number of spray rounds in the fountain send schedule.
pub const SPRAY_ROUNDS: u32 = 10;
/// Number of EOF-storm packets sent after the spray rounds complete.
pub const EOF_STORM_COUNT: u32 = 10_000;
/// Spacing, in microseconds, between consecutive EOF-storm packets.
pub const EOF_STORM_SPACING_US: u64 = 1_000;
/// Spin-sleep, in microseconds, after each sequential-pass send.
pub const SEQUENTIAL_SPACING_US: u64 = 100;
/// Pause between the sequential pass and the spray loop.
pub const SPRAY_PAUSE_MS: u64 = 500;

/// Suffix for the sparse clear-data file.
pub const SUFFIX_CLEAR_DATA: &str = "_clear_data.in";
/// Suffix for the sparse xor-data file.
pub const SUFFIX_XOR_DATA: &str = "_xor_data.in";
/// Suffix for the checksum header file.
pub const SUFFIX_CHECKSUM: &str = "_checksum.in";
/// Suffix for the clear-slice presence list.
pub const SUFFIX_CLEAR_LIST: &str = "_clear_list.in";
/// Suffix for the xor-group presence list.
pub const SUFFIX_XOR_LIST: &str = "_xor_list.in";
/// Suffix for the EOF sentinel.
pub const SUFFIX_FINISHED: &str = ".finished";

/// FNV-1a 32-bit offset basis.
pub const FNV_OFFSET_BASIS_32: u32 = 2_166_136_261;
/// FNV-1a 32-bit prime.
pub const FNV_PRIME_32: u32 = 16_777_619;

/// AMPFACTOR: how many times the syslog amplifier re-sends each datagram.
pub const AMPFACTOR: u32 = 1000;
/// Maximum syslog line length carried by the amplify/deamplify pair.
pub const SYSLOG_MAXLINE: usize = 1024;
/// Initial "previously forwarded" counter value on the deamplifier side.
pub const DEAMPLIFY_INITIAL_COUNTER: u16 = 65535;

/// Syslog amplifier listen port (UDP/IPv6).
pub const SYSLOG_AMPLIFY_LISTEN_PORT: u16 = 1514;
/// Syslog amplifier -> deamplifier forwarding port (UDP/IPv6, localhost).
pub const SYSLOG_DEAMPLIFY_LISTEN_PORT: u16 = 2514;
/// Syslog deamplifier -> local syslog forwarding port (UDP/IPv6, localhost).
pub const SYSLOG_OUTPUT_PORT: u16 = 514;
