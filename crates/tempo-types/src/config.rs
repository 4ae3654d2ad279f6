use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{Result, TempoError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClockConfig {
    /// Display tick period for the derived clock view.
    pub tick_interval_ms: u64,
    /// Ceiling on one-way network delay compensation at snapshot time.
    pub max_delay_compensation_ms: u64,
}

impl Default for ClockConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            max_delay_compensation_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub endpoint: String,
    pub auth_token: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Maximum number of undelivered notices retained for the UI.
    pub notice_backlog: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { notice_backlog: 32 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TempoConfig {
    pub clock: ClockConfig,
    pub transport: TransportConfig,
    pub session: SessionConfig,
    pub ops: OpsConfig,
}

impl TempoConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            TempoError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            TempoError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.clock.tick_interval_ms == 0 || self.clock.tick_interval_ms > 1_000 {
            return Err(TempoError::Configuration(
                "clock.tick_interval_ms must be within 1..=1000".into(),
            ));
        }
        if self.clock.max_delay_compensation_ms == 0 {
            return Err(TempoError::Configuration(
                "clock.max_delay_compensation_ms must be greater than zero".into(),
            ));
        }
        if self.transport.endpoint.is_empty() {
            return Err(TempoError::Configuration(
                "transport.endpoint must not be empty".into(),
            ));
        }
        if self.session.notice_backlog == 0 {
            return Err(TempoError::Configuration(
                "session.notice_backlog must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
