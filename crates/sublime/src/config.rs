//! Bot configuration, loaded from TOML.
//!
//! ```toml
//! command_threshold = 4
//! message_attach_threshold = 1500
//!
//! [toolchain]
//! supervisor = "./timeout"
//! compiler = "bfmake"
//! interpreter = "bfi"
//! work_dir = "."
//! memory_limit_mb = 32
//! time_limit_secs = 5
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use sublime_sandbox::{Ceilings, ToolchainConfig};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Top-level configuration for the bot.
#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    /// Largest alias distance still accepted as a command.
    #[serde(default = "default_command_threshold")]
    pub command_threshold: usize,

    /// Output of this many bytes or more is sent as an attachment.
    #[serde(default = "default_message_attach_threshold")]
    pub message_attach_threshold: usize,

    /// Name shown in the tutorial.
    #[serde(default = "default_bot_name")]
    pub bot_name: String,

    #[serde(default)]
    pub toolchain: ToolchainSection,
}

/// `[toolchain]` table: where the binaries live and how they are bounded.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolchainSection {
    #[serde(default = "default_supervisor")]
    pub supervisor: PathBuf,

    #[serde(default = "default_compiler")]
    pub compiler: String,

    #[serde(default = "default_interpreter")]
    pub interpreter: String,

    /// Directory the toolchain runs in (and litters with error logs).
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Scratch directory; the system temp dir when unset.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,

    #[serde(default = "default_memory_limit_mb")]
    pub memory_limit_mb: u64,

    #[serde(default = "default_time_limit_secs")]
    pub time_limit_secs: u64,
}

fn default_command_threshold() -> usize {
    4
}

fn default_message_attach_threshold() -> usize {
    1500
}

fn default_bot_name() -> String {
    "Sublime v2".to_string()
}

fn default_supervisor() -> PathBuf {
    PathBuf::from("./timeout")
}

fn default_compiler() -> String {
    "bfmake".to_string()
}

fn default_interpreter() -> String {
    "bfi".to_string()
}

fn default_work_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_memory_limit_mb() -> u64 {
    sublime_sandbox::runner::MEMORY_LIMIT_MB
}

fn default_time_limit_secs() -> u64 {
    sublime_sandbox::runner::TIME_LIMIT_SECS
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            command_threshold: default_command_threshold(),
            message_attach_threshold: default_message_attach_threshold(),
            bot_name: default_bot_name(),
            toolchain: ToolchainSection::default(),
        }
    }
}

impl Default for ToolchainSection {
    fn default() -> Self {
        Self {
            supervisor: default_supervisor(),
            compiler: default_compiler(),
            interpreter: default_interpreter(),
            work_dir: default_work_dir(),
            scratch_dir: None,
            memory_limit_mb: default_memory_limit_mb(),
            time_limit_secs: default_time_limit_secs(),
        }
    }
}

impl BotConfig {
    /// Load and validate configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: BotConfig = toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.message_attach_threshold == 0 {
            return Err(ConfigError::Invalid(
                "message_attach_threshold must be positive".to_string(),
            ));
        }
        if self.toolchain.memory_limit_mb == 0 {
            return Err(ConfigError::Invalid(
                "toolchain.memory_limit_mb must be positive".to_string(),
            ));
        }
        if self.toolchain.time_limit_secs == 0 {
            return Err(ConfigError::Invalid(
                "toolchain.time_limit_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl ToolchainSection {
    pub fn to_toolchain_config(&self) -> ToolchainConfig {
        ToolchainConfig {
            supervisor: self.supervisor.clone(),
            compiler: self.compiler.clone(),
            interpreter: self.interpreter.clone(),
            work_dir: self.work_dir.clone(),
            scratch_dir: self
                .scratch_dir
                .clone()
                .unwrap_or_else(std::env::temp_dir),
            ceilings: Ceilings {
                memory_limit_mb: self.memory_limit_mb,
                time_limit: Duration::from_secs(self.time_limit_secs),
            },
        }
    }
}
