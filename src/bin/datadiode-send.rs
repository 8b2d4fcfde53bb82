//! `datadiode-send DESTINATION_IP PORT FILE XOR_GROUP_SIZE SPRAY [--target-mbps N] [-v...]`

use datadiode::{cli, logging, sender};

fn main() {
    let args = cli::parse_send_args();
    logging::init(args.verbose);

    let config = sender::SenderConfig {
        destination: args.destination,
        base_port: args.port,
        file: args.file,
        xor_group_size: args.xor_group_size,
        spray: args.spray,
        target_mbps: args.target_mbps,
    };

    if let Err(e) = sender::run(&config) {
        e.die();
    }
}
