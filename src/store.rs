//! The on-disk slice-store: five sparse files per file-id, managed with the
//! same stateless, per-call open/seek/read-or-write/close pattern as
//! `process_data`/`process_checksum` in `datadiode-recv.c` and the
//! file-by-file helpers in `datadiode-recovery.c`.
//!
//! Every operation here opens the relevant file fresh, does one seek and
//! one read-or-write, and returns. This is deliberately not cached across
//! calls (see spec §9 / `SPEC_FULL.md` ambient notes): caching descriptors
//! per file-id would be cheap, but the stateless form makes the receiver's
//! idempotence property (P3) trivially true by construction, and real
//! filesystems keep the relevant pages hot regardless.

use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use byteorder::{BigEndian, ByteOrder};

use crate::constants::*;
use crate::error::Fatal;

/// The five (plus sentinel, plus canonical output) paths for one file-id's
/// slice-store under a given temp folder.
#[derive(Clone, Debug)]
pub struct StorePaths {
    pub clear_data: PathBuf,
    pub xor_data: PathBuf,
    pub checksum: PathBuf,
    pub clear_list: PathBuf,
    pub xor_list: PathBuf,
    pub finished: PathBuf,
    pub canonical: PathBuf,
}

impl StorePaths {
    /// Build every slice-store path for `file_id` under `temp_folder`.
    pub fn new(temp_folder: &Path, file_id: &str) -> StorePaths {
        let base = temp_folder.join(file_id);
        let with_suffix = |suffix: &str| {
            let mut s = base.as_os_str().to_owned();
            s.push(suffix);
            PathBuf::from(s)
        };
        StorePaths {
            clear_data: with_suffix(SUFFIX_CLEAR_DATA),
            xor_data: with_suffix(SUFFIX_XOR_DATA),
            checksum: with_suffix(SUFFIX_CHECKSUM),
            clear_list: with_suffix(SUFFIX_CLEAR_LIST),
            xor_list: with_suffix(SUFFIX_XOR_LIST),
            finished: with_suffix(SUFFIX_FINISHED),
            canonical: base,
        }
    }
}

/// `slices = max(xor_group_size, ceil(file_size / DATALEN))`, the
/// min-group padding rule from the data model.
pub fn slice_count(file_size: u32, xor_group_size: u32) -> u32 {
    let by_size = ((file_size as u64 + DATALEN as u64 - 1) / DATALEN as u64) as u32;
    by_size.max(xor_group_size)
}

fn open_rw_create(path: &Path) -> Result<File, Fatal> {
    OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)
        .map_err(|e| Fatal::FileOpen(format!("{}: {}", path.display(), e)))
}

/// Write `MAGICNUMBER` at byte offset `index` in a presence-list file,
/// creating the file if absent. Returns `true` if this call newly marked
/// the slot present, `false` if it was already marked (a duplicate).
///
/// Mirrors the check-then-set in `process_data`: open, seek, read one
/// byte, compare, and only write if not already `MAGICNUMBER`.
pub fn mark_present(list_path: &Path, index: u32) -> Result<bool, Fatal> {
    let mut f = open_rw_create(list_path)?;
    f.seek(SeekFrom::Start(index as u64))
        .map_err(|e| Fatal::FileWrite(format!("{}: seek: {}", list_path.display(), e)))?;
    let mut byte = [0u8; 1];
    let already_present = match f.read(&mut byte) {
        Ok(1) => byte[0] == MAGICNUMBER,
        _ => false,
    };
    if already_present {
        return Ok(false);
    }
    f.seek(SeekFrom::Start(index as u64))
        .map_err(|e| Fatal::FileWrite(format!("{}: seek: {}", list_path.display(), e)))?;
    f.write_all(&[MAGICNUMBER])
        .map_err(|e| Fatal::FileWrite(format!("{}: {}", list_path.display(), e)))?;
    Ok(true)
}

/// Read one presence byte. Returns `0` (absent) if the file or offset
/// doesn't exist yet -- equivalent to the C source's "short read leaves
/// `store` at its prior/zero value" behaviour.
pub fn read_presence(list_path: &Path, index: u32) -> u8 {
    let mut f = match File::open(list_path) {
        Ok(f) => f,
        Err(_) => return 0,
    };
    if f.seek(SeekFrom::Start(index as u64)).is_err() {
        return 0;
    }
    let mut byte = [0u8; 1];
    match f.read(&mut byte) {
        Ok(1) => byte[0],
        _ => 0,
    }
}

/// Write `MAGICNUMBER` at byte offset `index`, unconditionally (used by
/// recovery's Layer-1 peeling once a missing member has been rebuilt).
pub fn set_presence(list_path: &Path, index: u32, value: u8) -> Result<(), Fatal> {
    let mut f = open_rw_create(list_path)?;
    f.seek(SeekFrom::Start(index as u64))
        .map_err(|e| Fatal::FileWrite(format!("{}: seek: {}", list_path.display(), e)))?;
    f.write_all(&[value])
        .map_err(|e| Fatal::FileWrite(format!("{}: {}", list_path.display(), e)))
}

/// Chunk size for the counting loop below, matching the 4096-byte chunks
/// `log_at_zero_round` reads in `datadiode-recovery.c`.
const COUNT_CHUNK: usize = 4096;

/// Count how many of the first `slices` bytes equal `MAGICNUMBER`.
/// Mirrors `log_at_zero_round`'s chunked counting loop: a single `read`
/// call is free to return short of what was asked for, so this reads in
/// a loop until `slices` bytes have been seen or the file runs out.
pub fn count_present(list_path: &Path, slices: u32) -> u32 {
    let mut f = match File::open(list_path) {
        Ok(f) => f,
        Err(_) => return 0,
    };
    if f.seek(SeekFrom::Start(0)).is_err() {
        return 0;
    }
    let mut remaining = slices as usize;
    let mut count = 0u32;
    let mut chunk = [0u8; COUNT_CHUNK];
    while remaining > 0 {
        let want = remaining.min(COUNT_CHUNK);
        let n = match f.read(&mut chunk[..want]) {
            Ok(0) => break,
            Ok(n) => n,
            Err(_) => break,
        };
        count += chunk[..n].iter().filter(|&&b| b == MAGICNUMBER).count() as u32;
        remaining -= n;
    }
    count
}

/// Write a DATALEN-byte slice at slot `index` (i.e. byte offset
/// `index * DATALEN`), creating the file if absent.
pub fn write_data_slice(data_path: &Path, index: u32, payload: &[u8; DATALEN]) -> Result<(), Fatal> {
    let mut f = open_rw_create(data_path)?;
    f.seek(SeekFrom::Start(index as u64 * DATALEN as u64))
        .map_err(|e| Fatal::FileWrite(format!("{}: seek: {}", data_path.display(), e)))?;
    f.write_all(payload)
        .map_err(|e| Fatal::FileWrite(format!("{}: {}", data_path.display(), e)))
}

/// Read the DATALEN-byte slice at slot `index`. The slice-store is sparse,
/// so an unwritten slot reads back as zeros.
pub fn read_data_slice(data_path: &Path, index: u32) -> Result<[u8; DATALEN], Fatal> {
    let mut f = File::open(data_path)
        .map_err(|e| Fatal::FileRead(format!("{}: {}", data_path.display(), e)))?;
    f.seek(SeekFrom::Start(index as u64 * DATALEN as u64))
        .map_err(|e| Fatal::FileRead(format!("{}: seek: {}", data_path.display(), e)))?;
    let mut buf = [0u8; DATALEN];
    let n = f
        .read(&mut buf)
        .map_err(|e| Fatal::FileRead(format!("{}: {}", data_path.display(), e)))?;
    if n < DATALEN {
        // Past-EOF reads on a sparse file fall back to an implicit zero
        // fill, matching the C source's semantics for an unwritten slot.
        for b in buf.iter_mut().skip(n) {
            *b = 0;
        }
    }
    Ok(buf)
}

/// Write the checksum header file (`file-id ‖ file_size ‖ checksum`) if it
/// does not already exist. Returns `true` if this call created it.
pub fn write_checksum_header_if_absent(
    checksum_path: &Path,
    file_id: &[u8; FILEIDLEN],
    file_size: u32,
    payload: &[u8; DATALEN],
) -> Result<bool, Fatal> {
    if checksum_path.exists() {
        return Ok(false);
    }
    let res = OpenOptions::new().write(true).create_new(true).open(checksum_path);
    let mut f = match res {
        Ok(f) => f,
        Err(ref e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(Fatal::FileOpen(format!("{}: {}", checksum_path.display(), e))),
    };
    f.write_all(file_id)
        .map_err(|e| Fatal::FileWrite(format!("{}: {}", checksum_path.display(), e)))?;
    let mut size_buf = [0u8; TOTALLEN];
    BigEndian::write_u32(&mut size_buf, file_size);
    f.write_all(&size_buf)
        .map_err(|e| Fatal::FileWrite(format!("{}: {}", checksum_path.display(), e)))?;
    f.write_all(payload)
        .map_err(|e| Fatal::FileWrite(format!("{}: {}", checksum_path.display(), e)))?;
    Ok(true)
}

/// Parsed checksum-file header: file size and the whole-file XOR checksum.
pub struct ChecksumHeader {
    pub file_size: u32,
    pub checksum: [u8; DATALEN],
}

/// Read the checksum header back (file size at offset `FILEIDLEN`,
/// checksum at offset `FILEIDLEN + TOTALLEN`), as `get_filesize`/
/// `get_checksum` do in `datadiode-recovery.c`.
pub fn read_checksum_header(checksum_path: &Path) -> Result<ChecksumHeader, Fatal> {
    let mut f = File::open(checksum_path)
        .map_err(|e| Fatal::FileOpen(format!("{}: {}", checksum_path.display(), e)))?;
    f.seek(SeekFrom::Start(FILEIDLEN as u64))
        .map_err(|e| Fatal::FileRead(format!("{}: seek: {}", checksum_path.display(), e)))?;
    let mut size_buf = [0u8; TOTALLEN];
    f.read_exact(&mut size_buf)
        .map_err(|e| Fatal::FileRead(format!("{}: file_size: {}", checksum_path.display(), e)))?;
    let file_size = BigEndian::read_u32(&size_buf);

    let mut checksum = [0u8; DATALEN];
    f.read_exact(&mut checksum)
        .map_err(|e| Fatal::FileRead(format!("{}: checksum: {}", checksum_path.display(), e)))?;
    Ok(ChecksumHeader { file_size, checksum })
}

/// Create the EOF sentinel exactly once, `O_CREAT|O_EXCL` semantics:
/// `Ok(true)` if this call created it, `Ok(false)` if it already existed
/// (the normal, expected outcome for every duplicate EOF packet).
pub fn create_eof_sentinel_if_absent(finished_path: &Path) -> Result<bool, Fatal> {
    match OpenOptions::new().write(true).create_new(true).open(finished_path) {
        Ok(_) => Ok(true),
        Err(ref e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
        Err(e) => Err(Fatal::FileOpen(format!("{}: {}", finished_path.display(), e))),
    }
}

/// Truncate `clear_data` to `file_size`, dropping the zero-padding tail.
pub fn truncate_clear_data(clear_data_path: &Path, file_size: u32) -> Result<(), Fatal> {
    let f = OpenOptions::new()
        .write(true)
        .open(clear_data_path)
        .map_err(|e| Fatal::FileOpen(format!("{}: {}", clear_data_path.display(), e)))?;
    f.set_len(file_size as u64)
        .map_err(|e| Fatal::FileFinalize(format!("{}: {}", clear_data_path.display(), e)))
}

/// Rename `clear_data` onto the canonical output path and unlink the four
/// auxiliary files plus the EOF sentinel. Failures to remove an auxiliary
/// file are logged but non-fatal (matches `clean_tempfiles`'s `perror` +
/// continue behaviour in the C source).
pub fn finalize_success(paths: &StorePaths) -> Result<(), Fatal> {
    fs::rename(&paths.clear_data, &paths.canonical)
        .map_err(|e| Fatal::FileFinalize(format!("rename {} -> {}: {}", paths.clear_data.display(), paths.canonical.display(), e)))?;

    for p in [&paths.xor_data, &paths.checksum, &paths.clear_list, &paths.xor_list, &paths.finished] {
        if let Err(e) = fs::remove_file(p) {
            warn!("failed to delete temporary file {}: {}", p.display(), e);
        }
    }
    Ok(())
}
