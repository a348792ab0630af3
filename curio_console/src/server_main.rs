use std::io;
use std::net::TcpListener;

use curio_cabinet::persistence::{FileSnapshotStore, SnapshotStore};
use curio_cabinet::server::{run_with_listener, ServerOptions};
use log::info;

use crate::server_config::ServerConfig;

pub fn run(config: ServerConfig) -> io::Result<()> {
    let snapshot_store: Option<Box<dyn SnapshotStore + Send>> = match &config.save_dir {
        Some(dir) => {
            info!("Saving game snapshots to {dir}");
            Some(Box::new(FileSnapshotStore::new(dir)?))
        }
        None => None,
    };
    let options = ServerOptions {
        liveness_timeout: config.liveness_timeout,
        watchdog_interval: config.watchdog_interval,
        watchdog_max_attempts: config.watchdog_max_attempts,
        snapshot_store,
    };
    let listener = TcpListener::bind(("0.0.0.0", config.port))?;
    run_with_listener(listener, options)
}
