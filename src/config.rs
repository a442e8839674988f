//! Configuration for the crash game service
//!
//! Defaults work out of the box; a TOML file and `CRASHLINE_*` environment
//! variables can override them. Everything is validated before the engine
//! starts so a bad value fails fast instead of surfacing mid-round.

use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

/// Round engine timing and generator settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// WAITING phase duration in seconds
    pub waiting_secs: u64,
    /// Pause after CRASHED before the next round, in seconds
    pub crash_pause_secs: u64,
    /// Tick period while RUNNING, in milliseconds
    pub tick_ms: u64,
    /// Growth constant k in multiplier = exp(k * elapsed_secs)
    pub growth_rate: f64,
    /// Per-subscriber event queue capacity
    pub subscriber_buffer: usize,
    /// Optional discrete crash point candidates; empty means the default
    /// weighted distribution
    pub crash_point_candidates: Vec<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            waiting_secs: 6,
            crash_pause_secs: 3,
            tick_ms: 100,
            growth_rate: 0.06,
            subscriber_buffer: 256,
            crash_point_candidates: vec![],
        }
    }
}

/// HTTP/WebSocket server settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_address: String,
    pub port: u16,
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_address: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
        }
    }
}

impl AppConfig {
    /// Load from a TOML file, then apply environment overrides
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().display().to_string();
        let contents = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path_str.clone(),
            source,
        })?;
        let mut config: AppConfig =
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path_str,
                source,
            })?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Defaults plus environment overrides, for runs without a config file
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env_overrides();
        config
    }

    fn apply_env_overrides(&mut self) {
        env_override("CRASHLINE_HOST", &mut self.server.listen_address);
        env_override("CRASHLINE_PORT", &mut self.server.port);
        env_override("CRASHLINE_WAITING_SECS", &mut self.engine.waiting_secs);
        env_override("CRASHLINE_PAUSE_SECS", &mut self.engine.crash_pause_secs);
        env_override("CRASHLINE_TICK_MS", &mut self.engine.tick_ms);
        env_override("CRASHLINE_GROWTH_RATE", &mut self.engine.growth_rate);
        env_override(
            "CRASHLINE_SUBSCRIBER_BUFFER",
            &mut self.engine.subscriber_buffer,
        );
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        if self.server.listen_address.is_empty() {
            return Err(ConfigError::Invalid {
                field: "server.listen_address",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.waiting_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.waiting_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.crash_pause_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.crash_pause_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.tick_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.tick_ms",
                reason: "must be at least 1".to_string(),
            });
        }
        if !self.growth_rate.is_finite() || self.growth_rate <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "engine.growth_rate",
                reason: format!("{} is not a positive finite value", self.growth_rate),
            });
        }
        if self.subscriber_buffer == 0 {
            return Err(ConfigError::Invalid {
                field: "engine.subscriber_buffer",
                reason: "must be at least 1".to_string(),
            });
        }
        for candidate in &self.crash_point_candidates {
            if !candidate.is_finite() || *candidate < 1.0 {
                return Err(ConfigError::Invalid {
                    field: "engine.crash_point_candidates",
                    reason: format!("{} is below the 1.00 floor", candidate),
                });
            }
        }
        Ok(())
    }
}

fn env_override<T: FromStr>(key: &str, target: &mut T) {
    if let Ok(raw) = env::var(key) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(_) => warn!("ignoring unparseable {}={}", key, raw),
        }
    }
}
