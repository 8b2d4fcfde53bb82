//! `datadiode-recv PORT TEMP_FOLDER [-v...]`

use datadiode::{cli, logging, receiver};

fn main() {
    let args = cli::parse_recv_args();
    logging::init(args.verbose);

    let config = receiver::ReceiverConfig {
        base_port: args.port,
        temp_folder: args.temp_folder,
        pin_cores: cfg!(target_os = "linux"),
    };

    if let Err(e) = receiver::run(&config) {
        e.die();
    }
}
