//! Simulation configuration

use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Grid and worker pool configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Grid width in cells
    pub width: u32,
    /// Grid height in cells
    pub height: u32,
    /// Edge length of a lock tile; every rule must reach no further than this
    pub tile_size: u32,
    /// Number of worker threads
    pub workers: usize,
    /// Pause after every worker iteration, in nanoseconds
    pub update_delay_nanos: u64,
    /// Seed for reproducible runs; worker `i` uses `seed + i`
    pub seed: Option<u64>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            width: 200,
            height: 200,
            tile_size: 10,
            workers: 7,
            update_delay_nanos: 200,
            seed: None,
        }
    }
}

fn env_or<T: FromStr>(key: &str, fallback: T) -> Result<T> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{key}={raw} is not a valid value"))),
        Err(_) => Ok(fallback),
    }
}

impl SimConfig {
    /// Builds a configuration from `SANDLANG_*` environment variables, falling
    /// back to the defaults for anything unset.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let seed = match env::var("SANDLANG_SEED") {
            Ok(raw) => Some(
                raw.trim()
                    .parse()
                    .map_err(|_| Error::Config(format!("SANDLANG_SEED={raw} is not a valid value")))?,
            ),
            Err(_) => defaults.seed,
        };

        let config = Self {
            width: env_or("SANDLANG_WIDTH", defaults.width)?,
            height: env_or("SANDLANG_HEIGHT", defaults.height)?,
            tile_size: env_or("SANDLANG_TILE_SIZE", defaults.tile_size)?,
            workers: env_or("SANDLANG_WORKERS", defaults.workers)?,
            update_delay_nanos: env_or("SANDLANG_UPDATE_DELAY_NANOS", defaults.update_delay_nanos)?,
            seed,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::Config("grid must be at least 1x1".into()));
        }
        if self.tile_size == 0 {
            return Err(Error::Config("tile_size must be positive".into()));
        }
        if self.workers == 0 {
            return Err(Error::Config("at least one worker is required".into()));
        }
        Ok(())
    }

    pub fn update_delay(&self) -> Duration {
        Duration::from_nanos(self.update_delay_nanos)
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_tile_size(mut self, tile_size: u32) -> Self {
        self.tile_size = tile_size;
        self
    }

    pub fn with_update_delay(mut self, delay: Duration) -> Self {
        self.update_delay_nanos = delay.as_nanos().min(u64::MAX as u128) as u64;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = SimConfig::default();
        assert_eq!((config.width, config.height), (200, 200));
        assert_eq!(config.tile_size, 10);
        assert_eq!(config.workers, 7);
        assert_eq!(config.update_delay(), Duration::from_nanos(200));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SimConfig::from_toml_str("width = 64\nseed = 9\n").unwrap();
        assert_eq!(config.width, 64);
        assert_eq!(config.height, 200);
        assert_eq!(config.seed, Some(9));
    }

    #[test]
    fn test_toml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "workers = 2\ntile_size = 4").unwrap();
        let config = SimConfig::from_toml_file(file.path()).unwrap();
        assert_eq!(config.workers, 2);
        assert_eq!(config.tile_size, 4);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            SimConfig::from_toml_str("workers = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            SimConfig::from_toml_str("width = \"wide\""),
            Err(Error::ConfigParse(_))
        ));
        assert!(SimConfig::default().with_size(0, 5).validate().is_err());
    }
}
