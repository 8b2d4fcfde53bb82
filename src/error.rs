//! Fatal error sites and their stable process exit codes.
//!
//! The original C implementation calls `exit(N)` at dozens of call sites,
//! one `N` per distinct failure, so operators can triage from logs alone.
//! This module keeps that contract: every site that touches the slice-store
//! filesystem, a socket at setup time, or a worker thread, maps to one
//! `Fatal` variant with a stable `code()`. Best-effort paths (a dropped
//! datagram, a single failed `sendto`) are never represented here -- they
//! are logged and the caller continues, per the error handling policy.

use std::fmt;
use std::process;

/// A fatal error site. Each variant owns one stable exit code.
#[derive(Debug)]
pub enum Fatal {
    /// Resolving or constructing a UDP socket failed.
    SocketSetup(String),
    /// Binding a UDP socket failed.
    SocketBind(String),
    /// A blocking `recv_from` failed (the socket itself is broken).
    SocketRecv(String),
    /// Opening a slice-store file failed.
    FileOpen(String),
    /// Reading from a slice-store file failed.
    FileRead(String),
    /// Writing to a slice-store file failed.
    FileWrite(String),
    /// Closing/flushing a slice-store file failed.
    FileClose(String),
    /// Truncating or renaming a slice-store file failed.
    FileFinalize(String),
    /// Reading source file metadata (size) failed.
    StatSource(String),
    /// Spawning a worker thread failed.
    ThreadSpawn(String),
    /// Joining a worker thread failed.
    ThreadJoin(String),
}

impl Fatal {
    /// Stable, site-specific process exit code.
    pub fn code(&self) -> i32 {
        match self {
            Fatal::SocketSetup(_) => 1,
            Fatal::SocketBind(_) => 2,
            Fatal::SocketRecv(_) => 3,
            Fatal::FileOpen(_) => 4,
            Fatal::FileRead(_) => 5,
            Fatal::FileWrite(_) => 6,
            Fatal::FileClose(_) => 7,
            Fatal::FileFinalize(_) => 8,
            Fatal::StatSource(_) => 9,
            Fatal::ThreadSpawn(_) => 10,
            Fatal::ThreadJoin(_) => 11,
        }
    }

    /// Log the error at `error!` level and terminate the process with this
    /// site's stable exit code. Never returns.
    pub fn die(self) -> ! {
        error!("{}", self);
        process::exit(self.code());
    }
}

impl fmt::Display for Fatal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Fatal::SocketSetup(s) => write!(f, "[fatal:{}] socket setup failed: {}", self.code(), s),
            Fatal::SocketBind(s) => write!(f, "[fatal:{}] socket bind failed: {}", self.code(), s),
            Fatal::SocketRecv(s) => write!(f, "[fatal:{}] recv_from failed: {}", self.code(), s),
            Fatal::FileOpen(s) => write!(f, "[fatal:{}] open failed: {}", self.code(), s),
            Fatal::FileRead(s) => write!(f, "[fatal:{}] read failed: {}", self.code(), s),
            Fatal::FileWrite(s) => write!(f, "[fatal:{}] write failed: {}", self.code(), s),
            Fatal::FileClose(s) => write!(f, "[fatal:{}] close failed: {}", self.code(), s),
            Fatal::FileFinalize(s) => write!(f, "[fatal:{}] truncate/rename failed: {}", self.code(), s),
            Fatal::StatSource(s) => write!(f, "[fatal:{}] stat failed: {}", self.code(), s),
            Fatal::ThreadSpawn(s) => write!(f, "[fatal:{}] thread spawn failed: {}", self.code(), s),
            Fatal::ThreadJoin(s) => write!(f, "[fatal:{}] thread join failed: {}", self.code(), s),
        }
    }
}

/// Extension trait so IO call sites read like the teacher's
/// `.expect("...")` but die with a site-specific code instead of panicking.
pub trait OrDie<T> {
    /// Unwrap `self`, logging and exiting with `fatal(err)`'s code on failure.
    fn or_die<F>(self, fatal: F) -> T
    where
        F: FnOnce(String) -> Fatal;
}

impl<T, E: fmt::Display> OrDie<T> for Result<T, E> {
    fn or_die<F>(self, fatal: F) -> T
    where
        F: FnOnce(String) -> Fatal,
    {
        match self {
            Ok(v) => v,
            Err(e) => fatal(e.to_string()).die(),
        }
    }
}
