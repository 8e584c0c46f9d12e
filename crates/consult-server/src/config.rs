use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{bail, Result};

use consult_app::config::SweepConfig;

/// Daemon settings, read from `CONSULT_*` environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub database_url: String,
    pub sweep_interval: Duration,
    pub lookup_timeout: Duration,
    pub max_escalation_level: u32,
    pub default_escalation_minutes: u32,
    pub cache_ttl: Duration,
    pub sweep_attempts: u32,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let database_url = lookup("CONSULT_DATABASE_URL")
            .unwrap_or_else(|| "sqlite://consult.db?mode=rwc".into());
        Ok(Self {
            database_url,
            sweep_interval: Duration::from_secs(positive(&lookup, "CONSULT_SWEEP_INTERVAL_SECS", 60)?),
            lookup_timeout: Duration::from_millis(positive(&lookup, "CONSULT_LOOKUP_TIMEOUT_MS", 2000)?),
            max_escalation_level: positive(&lookup, "CONSULT_MAX_ESCALATION_LEVEL", 3)?,
            default_escalation_minutes: positive(&lookup, "CONSULT_DEFAULT_ESCALATION_MINUTES", 30)?,
            cache_ttl: Duration::from_secs(parsed(&lookup, "CONSULT_CACHE_TTL_SECS", 30)?),
            sweep_attempts: positive(&lookup, "CONSULT_SWEEP_ATTEMPTS", 3)?,
        })
    }

    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            max_escalation_level: self.max_escalation_level,
            fallback_escalation_minutes: self.default_escalation_minutes,
            max_item_attempts: self.sweep_attempts,
            lookup_timeout: self.lookup_timeout,
            ..SweepConfig::default()
        }
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, var: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: Display,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => Ok(value),
            Err(e) => bail!("{var}: invalid value {raw:?}: {e}"),
        },
    }
}

fn positive<T>(lookup: &impl Fn(&str) -> Option<String>, var: &str, default: T) -> Result<T>
where
    T: FromStr + PartialOrd + Default,
    T::Err: Display,
{
    let value = parsed(lookup, var, default)?;
    if value <= T::default() {
        bail!("{var}: must be greater than zero");
    }
    Ok(value)
}
