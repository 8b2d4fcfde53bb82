//! `datadiode-amplify-syslog [-v...]`

use datadiode::{cli, logging, syslog};

fn main() {
    let args = cli::parse_amplify_args();
    logging::init(args.verbose);

    if let Err(e) = syslog::amplify::run() {
        e.die();
    }
}
