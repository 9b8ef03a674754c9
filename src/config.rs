use std::env;

use chrono::NaiveDate;
use thiserror::Error;

pub const DEFAULT_REFERENCE_DATE: &str = "2025-12-04";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("REFERENCE_DATE must be YYYY-MM-DD, got '{0}'")]
    ReferenceDate(String),
    #[error("EVENT_BUFFER must be a positive integer, got '{0}'")]
    EventBuffer(String),
}

#[derive(Clone, Debug)]
pub struct Config {
    pub bind_addr: String,
    /// "Today" for age calculation; fixed so displayed ages are reproducible.
    pub reference_date: NaiveDate,
    pub seed_path: Option<String>,
    pub event_buffer: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());

        let raw_date = lookup("REFERENCE_DATE").unwrap_or_else(|| DEFAULT_REFERENCE_DATE.to_string());
        let reference_date = NaiveDate::parse_from_str(raw_date.trim(), "%Y-%m-%d")
            .map_err(|_| ConfigError::ReferenceDate(raw_date.clone()))?;

        let seed_path = lookup("SEED_PATH").filter(|s| !s.trim().is_empty());

        let event_buffer = match lookup("EVENT_BUFFER") {
            None => 256,
            Some(s) => s
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::EventBuffer(s))?,
        };

        Ok(Self {
            bind_addr,
            reference_date,
            seed_path,
            event_buffer,
        })
    }
}
