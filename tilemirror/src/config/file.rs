use std::path::{Path, PathBuf};

use ini::Ini;
use thiserror::Error;

use crate::mosaic::{DEFAULT_TRANSFORM_PROGRAM, DEFAULT_TRANSLATE_PROGRAM};
use crate::provider::DEFAULT_TIMEOUT_SECS;
use crate::schedule::{DEFAULT_ACTIVE_WINDOW_SECS, DEFAULT_IDLE_WINDOW_SECS};
use crate::session::DEFAULT_OUTPUT_ROOT;

/// Errors from loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigFileError {
    /// The file exists but could not be read or parsed.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] ini::Error),

    #[error("Invalid configuration: {section}.{key} = '{value}' - {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// `[output]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSettings {
    pub root: PathBuf,
}

impl Default for OutputSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from(DEFAULT_OUTPUT_ROOT),
        }
    }
}

/// `[download]` section. Durations are in seconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSettings {
    pub active_window: u64,
    pub idle_window: u64,
    pub workers: usize,
    pub timeout: u64,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            active_window: DEFAULT_ACTIVE_WINDOW_SECS,
            idle_window: DEFAULT_IDLE_WINDOW_SECS,
            workers: 1,
            timeout: DEFAULT_TIMEOUT_SECS,
        }
    }
}

/// `[georef]` section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeorefSettings {
    pub transform_program: String,
    pub translate_program: String,
}

impl Default for GeorefSettings {
    fn default() -> Self {
        Self {
            transform_program: DEFAULT_TRANSFORM_PROGRAM.to_string(),
            translate_program: DEFAULT_TRANSLATE_PROGRAM.to_string(),
        }
    }
}

/// Contents of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub output: OutputSettings,
    pub download: DownloadSettings,
    pub georef: GeorefSettings,
}

impl ConfigFile {
    /// Loads from the default path, or returns defaults if it does not exist.
    pub fn load() -> Result<Self, ConfigFileError> {
        Self::load_from(&config_file_path())
    }

    /// Loads from `path`, or returns defaults if it does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigFileError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let ini = Ini::load_from_file(path)?;
        super::parser::parse_ini(&ini)
    }

    /// Parses configuration from INI text.
    pub fn from_ini_str(content: &str) -> Result<Self, ConfigFileError> {
        let ini = Ini::load_from_str(content).map_err(ini::Error::Parse)?;
        super::parser::parse_ini(&ini)
    }
}

/// Directory holding the configuration file.
pub fn config_directory() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tilemirror")
}

/// Default configuration file path.
pub fn config_file_path() -> PathBuf {
    config_directory().join("config.ini")
}
