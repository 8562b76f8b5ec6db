use std::{env, fmt::Display, net::SocketAddr, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub bind_addr: SocketAddr,
    /// Set to use Postgres. Without it, polls live in memory.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub polls_file: String,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Ok(Self {
            bind_addr: try_load("BIND_ADDR", "0.0.0.0:3000")?,
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            db_max_connections: try_load("DB_MAX_CONNECTIONS", "5")?,
            polls_file: try_load("POLLS_FILE", "polls.txt")?,
        })
    }
}

fn try_load<T: FromStr>(key: &str, default: &str) -> anyhow::Result<T>
where
    T::Err: Display,
{
    let raw = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow::anyhow!("environment misconfigured: {key}={raw} ({e})")
    })
}
