//! Configuration module for the cloaking engine
//!
//! This module provides centralized configuration management with support for:
//! - Environment variable loading (with `.env` support)
//! - Default values
//! - Configuration validation

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use shared::{LogConfig, LogFormat, LogLevel};

use crate::driver::DEFAULT_ADAPTER_BASE;
use crate::machine::MachineSpec;

/// Main configuration structure for the cloaking engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub profiles: ProfileConfig,
    pub machine: MachineConfig,
    pub resolution: ResolutionConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            profiles: ProfileConfig::from_env()?,
            machine: MachineConfig::from_env()?,
            resolution: ResolutionConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
        })
    }

    /// Machine spec with `CLOAK_SEED` applied to machine-level identifiers
    pub fn machine_spec(&self) -> MachineSpec {
        MachineSpec {
            seed: self.resolution.seed,
            ..self.machine.spec()
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.profiles.validate()?;
        self.machine.validate()?;
        self.resolution.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

fn optional_path(key: &str) -> Option<PathBuf> {
    env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
        .map(PathBuf::from)
}

/// Hardware profile store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileConfig {
    pub directory: PathBuf,
    pub name: String,
}

impl ProfileConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            directory: env::var("CLOAK_PROFILE_DIR")
                .unwrap_or_else(|_| "./hwconf".to_string())
                .into(),
            name: env::var("CLOAK_PROFILE").unwrap_or_else(|_| "default".to_string()),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Profile name cannot be empty");
        }
        if !self.directory.is_dir() {
            anyhow::bail!("Profile directory does not exist: {:?}", self.directory);
        }
        Ok(())
    }
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./hwconf"),
            name: "default".to_string(),
        }
    }
}

/// Target machine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MachineConfig {
    pub name: String,
    pub vm_dir: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
    pub temp_dir: Option<PathBuf>,
    pub adapter_base: u32,
}

impl MachineConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            name: env::var("CLOAK_VM_NAME").unwrap_or_else(|_| "cloaked".to_string()),
            vm_dir: optional_path("CLOAK_VM_DIR"),
            data_dir: optional_path("CLOAK_DATA_DIR"),
            temp_dir: optional_path("CLOAK_TEMP_DIR"),
            adapter_base: env::var("CLOAK_ADAPTER_BASE")
                .unwrap_or_else(|_| DEFAULT_ADAPTER_BASE.to_string())
                .parse()
                .context("Invalid CLOAK_ADAPTER_BASE")?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("Machine name cannot be empty");
        }
        if let Some(temp_dir) = &self.temp_dir {
            if !temp_dir.is_dir() {
                anyhow::bail!("Temp directory does not exist: {:?}", temp_dir);
            }
        }
        Ok(())
    }

    pub fn spec(&self) -> MachineSpec {
        MachineSpec {
            name: self.name.clone(),
            vm_dir: self.vm_dir.clone(),
            data_dir: self.data_dir.clone(),
            temp_dir: self.temp_dir.clone(),
            adapter_base: self.adapter_base,
            seed: None,
        }
    }
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            name: "cloaked".to_string(),
            vm_dir: None,
            data_dir: None,
            temp_dir: None,
            adapter_base: DEFAULT_ADAPTER_BASE,
        }
    }
}

/// Template resolution configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResolutionConfig {
    /// JSON field template; the built-in VirtualBox template when unset
    pub template_path: Option<PathBuf>,
    /// Fixed RNG seed for reproducible builds
    pub seed: Option<u64>,
}

impl ResolutionConfig {
    pub fn from_env() -> Result<Self> {
        let seed = match env::var("CLOAK_SEED") {
            Ok(value) if !value.trim().is_empty() => {
                Some(value.trim().parse().context("Invalid CLOAK_SEED")?)
            }
            _ => None,
        };

        Ok(Self {
            template_path: optional_path("CLOAK_TEMPLATE"),
            seed,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.template_path {
            if !path.is_file() {
                anyhow::bail!("Template file does not exist: {:?}", path);
            }
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            format: env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.log_config().map(|_| ())
    }

    pub fn log_config(&self) -> Result<LogConfig> {
        let level: LogLevel = self.level.parse().context("Invalid LOG_LEVEL")?;
        let format: LogFormat = self.format.parse().context("Invalid LOG_FORMAT")?;

        Ok(LogConfig {
            level,
            format,
            tool_name: env!("CARGO_PKG_NAME").to_string(),
            ..Default::default()
        })
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
