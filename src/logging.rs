//! Logging setup shared by all five binaries.
//!
//! Ported from the `fern::Dispatch` wiring in the teacher's
//! `src/bin/cernan.rs`: a `[module][line][timestamp][level] message`
//! format, verbosity controlled by a repeated `-v` flag, chained to
//! stdout.

use chrono::Utc;

/// Map a repeated `-v` count to a `log::LevelFilter`, exactly as
/// `src/bin/cernan.rs` maps `args.verbose`.
pub fn level_from_verbosity(verbose: u64) -> log::LevelFilter {
    match verbose {
        0 => log::LevelFilter::Error,
        1 => log::LevelFilter::Warn,
        2 => log::LevelFilter::Info,
        3 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    }
}

/// Install the process-wide logger. Call once, near the top of `main`.
pub fn init(verbose: u64) {
    let level = level_from_verbosity(verbose);
    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}][{}][{}][{}] {}",
                record.target(),
                record.line().unwrap_or(0),
                Utc::now().to_rfc3339(),
                record.level(),
                message
            ))
        })
        .level(level)
        .chain(std::io::stdout())
        .apply()
        .expect("could not set up logging");
}
