use std::time::Duration;

use curio_cabinet::heartbeat::DEFAULT_LIVENESS_TIMEOUT;
use curio_cabinet::network::DEFAULT_PORT;
use curio_cabinet::server::{DEFAULT_WATCHDOG_INTERVAL, DEFAULT_WATCHDOG_MAX_ATTEMPTS};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    // How long a silent connection is tolerated before it is dropped.
    #[serde(with = "humantime_serde", default = "default_liveness_timeout")]
    pub liveness_timeout: Duration,
    // How often a paused game re-announces the pause while waiting for
    // disconnected players.
    #[serde(with = "humantime_serde", default = "default_watchdog_interval")]
    pub watchdog_interval: Duration,
    #[serde(default = "default_watchdog_max_attempts")]
    pub watchdog_max_attempts: usize,
    // Directory for game snapshots. No directory means no autosave and no
    // game restoration.
    #[serde(default)]
    pub save_dir: Option<String>,
}

fn default_port() -> u16 { DEFAULT_PORT }
fn default_liveness_timeout() -> Duration { DEFAULT_LIVENESS_TIMEOUT }
fn default_watchdog_interval() -> Duration { DEFAULT_WATCHDOG_INTERVAL }
fn default_watchdog_max_attempts() -> usize { DEFAULT_WATCHDOG_MAX_ATTEMPTS }
