//! `datadiode-deamplify-syslog [-v...]`

use datadiode::{cli, logging, syslog};

fn main() {
    let args = cli::parse_deamplify_args();
    logging::init(args.verbose);

    if let Err(e) = syslog::deamplify::run() {
        e.die();
    }
}
