use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use crate::auth::jwt::JwtConfig;

/// Runtime settings for the classroom server, read once at start-up.
///
/// Only `JWT_SECRET` is mandatory. Without `DATABASE_URL` the server keeps
/// sessions, attendance, polls and chat in memory, which suits local runs
/// and the integration tests but loses everything on restart.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Origins allowed to call the REST API and open sockets from a browser.
    pub cors_origins: Vec<String>,
    /// Per-request deadline for REST calls. Socket connections are exempt
    /// once upgraded.
    pub request_timeout_secs: u64,
    /// Upper bound on the relay drain and socket close after the listener stops.
    pub shutdown_timeout_secs: u64,
    /// Seconds between ping frames sent to every open socket.
    pub ws_heartbeat_secs: u64,
    /// PostgreSQL connection string. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// Read the environment (after `dotenvy` has loaded any `.env` file).
    ///
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `WS_HEARTBEAT_SECS`     | `30`                    |
    /// | `DATABASE_URL`          | unset (in-memory store) |
    ///
    /// # Panics
    ///
    /// Panics on a value that does not parse, and when `JWT_SECRET` is missing.
    pub fn from_env() -> Self {
        let cors_origins = split_origins(
            &std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".into()),
        );
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: parse_env("PORT", 3000),
            cors_origins,
            request_timeout_secs: parse_env("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: parse_env("SHUTDOWN_TIMEOUT_SECS", 30),
            ws_heartbeat_secs: parse_env("WS_HEARTBEAT_SECS", 30),
            database_url,
            jwt: JwtConfig::from_env(),
        }
    }

    pub fn ws_heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.ws_heartbeat_secs.max(1))
    }
}

/// Parse `key` from the environment, falling back to `default` when unset.
fn parse_env<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} has an invalid value '{raw}': {e}")),
        Err(_) => default,
    }
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
