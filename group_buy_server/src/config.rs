use std::env;

use chrono::Duration;
use gbe_common::parse_boolean_flag;
use log::*;

const DEFAULT_GBS_HOST: &str = "127.0.0.1";
const DEFAULT_GBS_PORT: u16 = 8360;
const DEFAULT_SWEEP_INTERVAL: Duration = Duration::seconds(60);

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// How often the background sweep wakes up to expire lapsed groups.
    pub sweep_interval: Duration,
    /// Set to false to disable the background sweep entirely. The `/sweep` endpoint still works, so an
    /// external cron can drive expiry instead.
    pub enable_sweep_worker: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_GBS_HOST.to_string(),
            port: DEFAULT_GBS_PORT,
            database_url: String::default(),
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            enable_sweep_worker: true,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("GBS_HOST").ok().unwrap_or_else(|| DEFAULT_GBS_HOST.into());
        let port = env::var("GBS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for GBS_PORT. {e} Using the default, {DEFAULT_GBS_PORT}, instead."
                    );
                    DEFAULT_GBS_PORT
                })
            })
            .ok()
            .unwrap_or(DEFAULT_GBS_PORT);
        let database_url = env::var("GBE_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ GBE_DATABASE_URL is not set. Please set it to the URL for the settlement database.");
            String::default()
        });
        let sweep_interval = env::var("GBS_SWEEP_INTERVAL_SECS")
            .map_err(|_| {
                info!(
                    "🪛️ GBS_SWEEP_INTERVAL_SECS is not set. Using the default value of {}s.",
                    DEFAULT_SWEEP_INTERVAL.num_seconds()
                )
            })
            .and_then(|s| {
                s.parse::<i64>()
                    .map(Duration::seconds)
                    .map_err(|e| warn!("🪛️ Invalid configuration value for GBS_SWEEP_INTERVAL_SECS. {e}"))
            })
            .ok()
            .unwrap_or(DEFAULT_SWEEP_INTERVAL);
        let enable_sweep_worker = parse_boolean_flag(env::var("GBS_ENABLE_SWEEP_WORKER").ok(), true);
        Self { host, port, database_url, sweep_interval, enable_sweep_worker }
    }
}
