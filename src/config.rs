//src/config.rs
use comfy_table::Color;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;
use strum_macros::EnumIter;
use thiserror::Error;

use crate::calendar::WeekStart;

const CONFIG_FILE_NAME: &str = "config.toml";
pub(crate) const APP_CONFIG_DIR: &str = "train-now";
const CONFIG_ENV_VAR: &str = "TRAIN_NOW_CONFIG_DIR"; // Environment variable name

/// Origin passed to the video host when no embed origin is configured.
pub const DEFAULT_EMBED_ORIGIN: &str = "http://localhost";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine configuration directory.")]
    CannotDetermineConfigDir,
    #[error("I/O error accessing config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config file (TOML): {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Failed to serialize config data (TOML): {0}")]
    TomlSerialize(#[from] toml::ser::Error),
    #[error("Invalid color name: {0}")]
    InvalidColor(String),
    #[error("Backend URL or API key not set. Update the [backend] section of {0:?}.")]
    BackendNotConfigured(PathBuf),
    #[error("No user id configured. Set backend.user_id in {0:?}.")]
    UserNotSet(PathBuf),
}

// Define standard colors using strum for easy iteration/parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter)]
pub enum StandardColor {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
    DarkGrey,
    DarkRed,
    DarkGreen,
    DarkYellow,
    DarkBlue,
    DarkMagenta,
    DarkCyan,
    Grey,
}

// Helper to convert our enum to comfy_table::Color
impl From<StandardColor> for Color {
    fn from(value: StandardColor) -> Self {
        match value {
            StandardColor::Black => Self::Black,
            StandardColor::Red => Self::Red,
            StandardColor::Green => Self::Green,
            StandardColor::Yellow => Self::Yellow,
            StandardColor::Blue => Self::Blue,
            StandardColor::Magenta => Self::Magenta,
            StandardColor::Cyan => Self::Cyan,
            StandardColor::White => Self::White,
            StandardColor::DarkGrey => Self::DarkGrey,
            StandardColor::DarkRed => Self::DarkRed,
            StandardColor::DarkGreen => Self::DarkGreen,
            StandardColor::DarkYellow => Self::DarkYellow,
            StandardColor::DarkBlue => Self::DarkBlue,
            StandardColor::DarkMagenta => Self::DarkMagenta,
            StandardColor::DarkCyan => Self::DarkCyan,
            StandardColor::Grey => Self::Grey,
        }
    }
}

/// Parses a color name case-insensitively ("green", "DarkBlue", ...).
pub fn parse_color(color_str: &str) -> Result<StandardColor, ConfigError> {
    StandardColor::iter()
        .find(|color| format!("{color:?}").eq_ignore_ascii_case(color_str.trim()))
        .ok_or_else(|| ConfigError::InvalidColor(color_str.to_string()))
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)] // Ensure defaults are used if fields are missing
pub struct Theme {
    pub header_color: String,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            header_color: "Green".to_string(),
        }
    }
}

impl Theme {
    /// Header color for tables, falling back to green on an unknown name.
    pub fn header(&self) -> Color {
        parse_color(&self.header_color)
            .map(Color::from)
            .unwrap_or(Color::Green)
    }
}

/// Connection settings for the remote database API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct BackendConfig {
    pub url: Option<String>,
    pub api_key: Option<String>,
    /// Token of the signed-in user. Requests fall back to the API key when unset.
    pub access_token: Option<String>,
    pub user_id: Option<String>,
    pub timeout_secs: u64,
    /// Also push completion dates to the backend.
    pub sync_completions: bool,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            access_token: None,
            user_id: None,
            timeout_secs: 10,
            sync_completions: false,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)] // Ensure defaults are used if fields are missing
pub struct Config {
    pub week_start: WeekStart,
    pub embed_origin: String,
    /// TOML file with custom training programs. The built-in programs are used when unset.
    pub programs_file: Option<PathBuf>,
    pub theme: Theme,
    pub backend: BackendConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            week_start: WeekStart::default(),
            embed_origin: DEFAULT_EMBED_ORIGIN.to_string(),
            programs_file: None,
            theme: Theme::default(),
            backend: BackendConfig::default(),
        }
    }
}

/// Determines the path to the configuration file.
/// Exposed at crate root as `get_config_path_util`
pub fn get_config_path() -> Result<PathBuf, ConfigError> {
    let config_dir_path = match std::env::var(CONFIG_ENV_VAR).ok() {
        Some(path_str) => {
            let path = PathBuf::from(path_str);
            if !path.is_dir() {
                tracing::warn!(
                    "Environment variable {} points to '{}', which is not a directory. Trying to create it.",
                    CONFIG_ENV_VAR,
                    path.display()
                );
                fs::create_dir_all(&path)?;
            }
            path
        }
        None => {
            let base_config_dir =
                dirs::config_dir().ok_or(ConfigError::CannotDetermineConfigDir)?;
            base_config_dir.join(APP_CONFIG_DIR)
        }
    };

    if !config_dir_path.exists() {
        fs::create_dir_all(&config_dir_path)?;
    }

    Ok(config_dir_path.join(CONFIG_FILE_NAME))
}

/// Loads the configuration from the TOML file at the given path.
/// A missing file is created with defaults.
pub fn load(config_path: &Path) -> Result<Config, ConfigError> {
    if !config_path.exists() {
        let default_config = Config::default();
        save(config_path, &default_config)?;
        return Ok(default_config);
    }
    let config_content = fs::read_to_string(config_path)?;
    let config: Config = toml::from_str(&config_content)?;
    Ok(config)
}

/// Saves the configuration to the TOML file.
pub fn save(config_path: &Path, config: &Config) -> Result<(), ConfigError> {
    if let Some(parent_dir) = config_path.parent() {
        if !parent_dir.as_os_str().is_empty() && !parent_dir.exists() {
            fs::create_dir_all(parent_dir)?;
        }
    }
    let config_content = toml::to_string_pretty(config)?;
    fs::write(config_path, config_content)?;
    Ok(())
}
