// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Supplies the window parameters, the validation layer/extension lists and the
// diagnostics flag at process start. Falls back to defaults if the file is
// missing or malformed.

use crate::backend::{DeviceRequirements, ValidationConfig};
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const CONFIG_PATH: &str = "config.toml";

/// Root configuration structure
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub window: WindowConfig,
    pub validation: ValidationSettings,
    pub device: DeviceSettings,
    pub logging: LoggingConfig,
}

/// Window settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "VulkanEngine".to_string(),
            width: 800,
            height: 800,
            resizable: false,
        }
    }
}

/// Validation layers and instance extensions
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Enables the layers below and the diagnostic channel.
    pub enabled: bool,
    pub layers: Vec<String>,
    /// Extra instance extensions on top of what the window system needs.
    pub extensions: Vec<String>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            enabled: cfg!(debug_assertions),
            layers: vec!["VK_LAYER_KHRONOS_validation".to_string()],
            extensions: Vec::new(),
        }
    }
}

/// Physical/logical device settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Device extensions every candidate must support.
    pub extensions: Vec<String>,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            extensions: vec!["VK_KHR_swapchain".to_string()],
        }
    }
}

/// Logging settings
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// env_logger level filter ("error", "warn", "info", "debug", "trace").
    pub level: String,
    /// Empty disables the log file.
    pub log_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            log_file: "log.txt".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn log_file_path(&self) -> Option<PathBuf> {
        if self.log_file.trim().is_empty() {
            None
        } else {
            Some(PathBuf::from(&self.log_file))
        }
    }
}

impl Config {
    /// Load `config.toml`, falling back to defaults if it is missing or
    /// malformed. The load error is returned alongside the defaults so it
    /// can be reported once logging is up.
    pub fn load() -> (Self, Option<anyhow::Error>) {
        Self::load_or_default(CONFIG_PATH)
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> (Self, Option<anyhow::Error>) {
        match Self::load_from_path(path) {
            Ok(config) => (config, None),
            Err(e) => (Config::default(), Some(e)),
        }
    }

    /// Load configuration from a specific path. A missing file yields defaults.
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        Self::parse(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Validation settings as handed to the instance builder.
    pub fn validation_config(&self) -> ValidationConfig {
        if self.validation.enabled {
            ValidationConfig::new(
                self.validation.layers.clone(),
                self.validation.extensions.clone(),
                true,
            )
        } else {
            ValidationConfig::new(Vec::new(), self.validation.extensions.clone(), false)
        }
    }

    pub fn device_requirements(&self) -> DeviceRequirements {
        DeviceRequirements::new(self.device.extensions.clone())
    }
}
