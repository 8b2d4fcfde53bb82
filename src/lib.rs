//! One-way bulk file and syslog transport across an optical data diode.
//!
//! This crate backs five independent binaries sharing one permutation
//! scheme, one wire format, and one on-disk slice-store: a sender and
//! receiver pair move files across the diode with fountain-coded forward
//! error correction, a separate recovery tool reconstructs slices the
//! receiver never got, and an amplifier/deamplifier pair carries syslog
//! traffic the same direction.
//!
//! See each module for the corresponding piece of the C implementation
//! this crate replaces.

#![deny(unused_must_use)]

#[macro_use]
extern crate log;

pub mod cli;
pub mod constants;
pub mod error;
pub mod fountain;
pub mod logging;
pub mod receiver;
pub mod recovery;
pub mod sender;
pub mod store;
pub mod syslog;
pub mod wire;
