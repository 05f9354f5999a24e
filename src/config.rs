use std::{env, fmt::Display, str::FromStr, time::Duration};

use anyhow::{anyhow, Context};
use tracing::info;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub channel: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub idle_timeout: Duration,
    pub production: bool,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL must be set to the reporting Postgres instance")?;

        Ok(Self {
            database_url,
            port: try_load(&lookup, "PORT", "5000")?,
            channel: try_load(&lookup, "DASHBOARD_CHANNEL", "shopify")?,
            max_connections: try_load(&lookup, "DB_MAX_CONNECTIONS", "10")?,
            acquire_timeout: Duration::from_secs(try_load(&lookup, "DB_ACQUIRE_TIMEOUT_SECS", "30")?),
            idle_timeout: Duration::from_secs(try_load(&lookup, "DB_IDLE_TIMEOUT_SECS", "30")?),
            production: lookup("APP_ENV").is_some_and(|value| value.eq_ignore_ascii_case("production")),
        })
    }

    /// Whether server errors may carry their underlying cause to clients.
    pub fn expose_errors(&self) -> bool {
        !self.production
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    raw.trim()
        .parse()
        .map_err(|e| anyhow!("Invalid {key} value '{raw}': {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Config::from_lookup(lookup_from(&[("DATABASE_URL", "postgres://localhost/db")])).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.channel, "shopify");
        assert_eq!(config.max_connections, 10);
        assert_eq!(config.acquire_timeout, Duration::from_secs(30));
        assert!(config.expose_errors());
    }

    #[test]
    fn database_url_is_required() {
        assert!(Config::from_lookup(lookup_from(&[])).is_err());
    }

    #[test]
    fn invalid_numbers_are_rejected() {
        let result = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/db"),
            ("PORT", "eighty"),
        ]));
        let message = result.unwrap_err().to_string();
        assert!(message.contains("PORT"));
    }

    #[test]
    fn production_hides_errors() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "postgres://localhost/db"),
            ("APP_ENV", "Production"),
            ("DASHBOARD_CHANNEL", "amazon"),
        ]))
        .unwrap();
        assert!(config.production);
        assert!(!config.expose_errors());
        assert_eq!(config.channel, "amazon");
    }
}
