use clap::Parser;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::clock::DEFAULT_TICKS_PER_SECOND;
use crate::{MeterError, Result};

// Main application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub replay: ReplayConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ticks_per_second: u64,
    pub record_event_log: bool,
    pub skill_names_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    pub producers: usize,
    pub report_interval_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Unset falls back to `RUST_LOG`, then `info`.
    pub level: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ticks_per_second: DEFAULT_TICKS_PER_SECOND,
            record_event_log: true,
            skill_names_path: None,
        }
    }
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            producers: num_cpus::get(),
            report_interval_ms: 1000,
        }
    }
}

const VALID_LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const DEFAULT_LOG_LEVEL: &str = "info";

impl LoggingConfig {
    /// Filter for the logger: an explicit level beats `rust_log`, which beats the default.
    pub fn filter(&self, rust_log: Option<String>) -> String {
        self.level
            .clone()
            .or(rust_log.filter(|filter| !filter.trim().is_empty()))
            .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string())
    }
}

impl AppConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(MeterError::Config(format!("Config file not found: {:?}", path)));
        }

        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        log::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(&path, content)?;
        log::info!("Saved configuration to {:?}", path.as_ref());
        Ok(())
    }

    /// Applies `METER_ENGINE_*` overrides from the process environment.
    pub fn load_from_env(&mut self) -> Result<()> {
        self.apply_env(|key| std::env::var(key).ok())
    }

    fn apply_env<F>(&mut self, var: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(log_level) = var("METER_ENGINE_LOG_LEVEL") {
            self.logging.level = Some(log_level);
        }

        if let Some(ticks) = var("METER_ENGINE_TICKS_PER_SECOND") {
            self.engine.ticks_per_second = ticks.parse().map_err(|e| {
                MeterError::Config(format!("METER_ENGINE_TICKS_PER_SECOND={}: {}", ticks, e))
            })?;
        }

        if let Some(producers) = var("METER_ENGINE_PRODUCERS") {
            self.replay.producers = producers.parse().map_err(|e| {
                MeterError::Config(format!("METER_ENGINE_PRODUCERS={}: {}", producers, e))
            })?;
        }

        Ok(())
    }

    pub fn validate(&self) -> std::result::Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.engine.ticks_per_second == 0 {
            errors.push("Ticks per second cannot be 0".to_string());
        }

        if self.replay.producers == 0 {
            errors.push("Replay producers cannot be 0".to_string());
        }

        if self.replay.report_interval_ms == 0 {
            errors.push("Replay report interval cannot be 0".to_string());
        }

        if let Some(level) = &self.logging.level {
            if !VALID_LOG_LEVELS.contains(&level.as_str()) {
                errors.push(format!(
                    "Invalid log level: {}. Valid levels are: {}",
                    level,
                    VALID_LOG_LEVELS.join(", ")
                ));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Replays captured protocol messages through the engine and prints the resulting statistics.
#[derive(Debug, Parser)]
#[command(name = "meter-engine", version, about)]
pub struct AppArgs {
    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,

    /// JSON-lines capture to replay
    #[arg(short, long)]
    pub input: PathBuf,

    /// Number of producer workers
    #[arg(short, long)]
    pub producers: Option<usize>,

    /// Print the final snapshot as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

impl AppArgs {
    /// Command line values win over the file and the environment.
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(level) = &self.log_level {
            config.logging.level = Some(level.clone());
        }
        if let Some(producers) = self.producers {
            config.replay.producers = producers;
        }
    }
}
