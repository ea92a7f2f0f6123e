//==================================================
// File: config.rs
//==================================================
// Author: ZobieLabs
// License: Duality Public License (DPL v1.0)
// Goal: Runtime settings for cast checks and fault reports
// Objective: Load rtti.toml with serde defaults so absent keys keep the
//            native runtime behaviour
//==================================================

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::cast::DowncastPolicy;
use crate::fault::trace::{DEFAULT_FRAME_LIMIT, DEFAULT_MODULE_MARKERS};

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "SOLVRA_RTTI_CONFIG";

const CONFIG_DIR: &str = "solvra";
const CONFIG_FILE: &str = "rtti.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("faults.frame_limit must be greater than zero")]
    ZeroFrameLimit,
    #[error("faults.exit_code must be non-zero")]
    ZeroExitCode,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RtConfig {
    pub casts: CastConfig,
    pub faults: FaultConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CastConfig {
    pub downcast: DowncastPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    /// Maximum number of frames captured per fault.
    pub frame_limit: usize,
    /// Substrings that identify frames of dynamically loaded modules.
    pub module_markers: Vec<String>,
    /// Process exit status after a fault.
    pub exit_code: i32,
    pub color: ColorMode,
    pub stream: FaultStream,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            frame_limit: DEFAULT_FRAME_LIMIT,
            module_markers: DEFAULT_MODULE_MARKERS.iter().map(|m| m.to_string()).collect(),
            exit_code: -1,
            color: ColorMode::Auto,
            stream: FaultStream::Stderr,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    pub fn enabled(self, is_terminal: bool) -> bool {
        match self {
            ColorMode::Auto => is_terminal,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FaultStream {
    #[default]
    Stderr,
    Stdout,
}

impl RtConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.faults.frame_limit == 0 {
            return Err(ConfigError::ZeroFrameLimit);
        }
        if self.faults.exit_code == 0 {
            return Err(ConfigError::ZeroExitCode);
        }
        Ok(())
    }

    /// Default per-user location, `<config dir>/solvra/rtti.toml`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Resolves the configuration file: explicit path, then `$SOLVRA_RTTI_CONFIG`,
    /// then the per-user default. A missing file yields the defaults.
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(|| env::var_os(CONFIG_ENV).map(PathBuf::from))
            .or_else(Self::default_path);
        match path {
            Some(path) => Self::load_file(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_file(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading configuration from {}", path.display()))?;
        Self::from_toml_str(&data)
            .with_context(|| format!("parsing configuration {}", path.display()))
    }

    /// Persist the configuration back to disk.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let serialized = toml::to_string_pretty(self)?;
        fs::write(path, serialized)
            .with_context(|| format!("writing configuration to {}", path.display()))?;
        Ok(())
    }
}
