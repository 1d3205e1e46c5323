//! Configuration module for filedrop.

use serde::Deserialize;
use std::path::Path;

use crate::{FiledropError, Result};

/// Upload policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Maximum size of a single file in megabytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size_mb: u64,
    /// MIME types accepted by the validator.
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
    /// Maximum number of flows running at the same time.
    #[serde(default = "default_max_concurrent_uploads")]
    pub max_concurrent_uploads: usize,
}

fn default_max_file_size() -> u64 {
    100
}

fn default_allowed_types() -> Vec<String> {
    crate::file::DEFAULT_ALLOWED_TYPES
        .iter()
        .map(|t| t.to_string())
        .collect()
}

fn default_max_concurrent_uploads() -> usize {
    6
}

impl UploadConfig {
    /// Maximum file size in bytes, saturating at `u64::MAX`.
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: default_max_file_size(),
            allowed_types: default_allowed_types(),
            max_concurrent_uploads: default_max_concurrent_uploads(),
        }
    }
}

/// Timing and step sizes for the simulated transfer.
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorConfig {
    /// Lower bound of the wait between steps, in milliseconds.
    #[serde(default = "default_min_delay")]
    pub min_delay_ms: u64,
    /// Upper bound of the wait between steps, in milliseconds.
    #[serde(default = "default_max_delay")]
    pub max_delay_ms: u64,
    /// Smallest progress increment per step.
    #[serde(default = "default_min_step")]
    pub min_step: u8,
    /// Largest progress increment per step.
    #[serde(default = "default_max_step")]
    pub max_step: u8,
}

fn default_min_delay() -> u64 {
    100
}

fn default_max_delay() -> u64 {
    300
}

fn default_min_step() -> u8 {
    5
}

fn default_max_step() -> u8 {
    20
}

impl SimulatorConfig {
    /// A configuration without waits, for tests and dry runs.
    pub fn instant() -> Self {
        Self {
            min_delay_ms: 0,
            max_delay_ms: 0,
            ..Self::default()
        }
    }
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            min_delay_ms: default_min_delay(),
            max_delay_ms: default_max_delay(),
            min_step: default_min_step(),
            max_step: default_max_step(),
        }
    }
}

/// Persistence and on-disk storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Record store backend ("memory" or "sqlite").
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Directory receiving files written by the chunked transfer.
    #[serde(default = "default_files_path")]
    pub files_path: String,
    /// Chunk size for the chunked transfer, in kilobytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size_kb: usize,
}

fn default_backend() -> String {
    "memory".to_string()
}

fn default_database_path() -> String {
    "data/filedrop.db".to_string()
}

fn default_files_path() -> String {
    "data/files".to_string()
}

fn default_chunk_size() -> usize {
    64
}

impl StorageConfig {
    /// Chunk size in bytes.
    pub fn chunk_size_bytes(&self) -> usize {
        self.chunk_size_kb.saturating_mul(1024)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            database_path: default_database_path(),
            files_path: default_files_path(),
            chunk_size_kb: default_chunk_size(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional path to a log file. Console only when unset.
    #[serde(default)]
    pub file: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Upload policy.
    #[serde(default)]
    pub upload: UploadConfig,
    /// Simulated transfer settings.
    #[serde(default)]
    pub simulator: SimulatorConfig,
    /// Storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FiledropError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s)
            .map_err(|e| FiledropError::Validation(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `FILEDROP_MAX_CONCURRENT_UPLOADS`
    /// - `FILEDROP_STORAGE_BACKEND`
    /// - `FILEDROP_LOG_LEVEL`
    ///
    /// Empty or unparsable values are ignored.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("FILEDROP_MAX_CONCURRENT_UPLOADS") {
            if let Ok(limit) = value.trim().parse::<usize>() {
                self.upload.max_concurrent_uploads = limit;
            }
        }

        if let Ok(backend) = std::env::var("FILEDROP_STORAGE_BACKEND") {
            if !backend.is_empty() {
                self.storage.backend = backend;
            }
        }

        if let Ok(level) = std::env::var("FILEDROP_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.upload.max_concurrent_uploads == 0 {
            return Err(FiledropError::Config(
                "max_concurrent_uploads must be at least 1".to_string(),
            ));
        }

        let sim = &self.simulator;
        if sim.min_step == 0 {
            return Err(FiledropError::Config(
                "simulator min_step must be at least 1".to_string(),
            ));
        }
        if sim.min_step > sim.max_step || sim.max_step > 100 {
            return Err(FiledropError::Config(format!(
                "simulator step range {}..={} is invalid",
                sim.min_step, sim.max_step
            )));
        }
        if sim.min_delay_ms > sim.max_delay_ms {
            return Err(FiledropError::Config(format!(
                "simulator delay range {}..={}ms is invalid",
                sim.min_delay_ms, sim.max_delay_ms
            )));
        }

        if self.storage.chunk_size_kb == 0 {
            return Err(FiledropError::Config(
                "chunk_size_kb must be at least 1".to_string(),
            ));
        }

        match self.storage.backend.as_str() {
            "memory" | "sqlite" => Ok(()),
            other => Err(FiledropError::Config(format!(
                "unknown storage backend: {other}"
            ))),
        }
    }
}
