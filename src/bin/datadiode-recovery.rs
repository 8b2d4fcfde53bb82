//! `datadiode-recovery INPUT_FOLDER FILE_BASENAME XOR_GROUP_SIZE [-v...]`

use std::process;

use datadiode::{cli, logging, recovery};
use log::{info, warn};

fn main() {
    let args = cli::parse_recovery_args();
    logging::init(args.verbose);

    let config = recovery::RecoveryConfig {
        input_folder: args.input_folder,
        file_basename: args.file_basename,
        xor_group_size: args.xor_group_size,
    };

    match recovery::recover(&config) {
        Ok(true) => info!("recovery complete"),
        Ok(false) => {
            warn!("recovery incomplete: slices still missing");
            process::exit(1);
        }
        Err(e) => e.die(),
    }
}
