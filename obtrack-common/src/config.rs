//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable `OBTRACK_ROOT_FOLDER`
//! 3. TOML config file `root_folder`
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or unreadable config file never aborts startup: defaults are
//! used and a warning is logged.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "OBTRACK_ROOT_FOLDER";

/// Database file name used when the config does not name one
pub const DEFAULT_DATABASE_FILE: &str = "obtrack.db";

/// Contents of `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub database_file: Option<String>,
    pub logging: LoggingConfig,
    pub planning: PlanningConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when RUST_LOG is not set
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Defaults for obligation generation commands
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanningConfig {
    /// How many months ahead bulk planning looks
    pub months_ahead: u32,
    /// How many occurrences preview/generate chain when not told otherwise
    pub default_count: u32,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            months_ahead: 3,
            default_count: 3,
        }
    }
}

impl TomlConfig {
    /// Parse config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config TOML: {}", e)))
    }

    /// Load config from a file that must exist
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load config from an explicit path or the platform default location,
    /// falling back to defaults when nothing usable is found
    pub fn load_or_default(explicit: Option<&Path>) -> Self {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path(),
        };

        let Some(path) = path else {
            info!("No config file found, using defaults");
            return Self::default();
        };

        match Self::load(&path) {
            Ok(config) => {
                info!("Loaded config: {}", path.display());
                config
            }
            Err(e) => {
                warn!("Ignoring config {}: {} (using defaults)", path.display(), e);
                Self::default()
            }
        }
    }

    /// Resolve the SQLite file inside the given root folder
    pub fn database_path(&self, root_folder: &Path) -> PathBuf {
        let file = self
            .database_file
            .as_deref()
            .unwrap_or(DEFAULT_DATABASE_FILE);
        root_folder.join(file)
    }
}

/// Platform config file location, if one exists
///
/// Linux checks `~/.config/obtrack/config.toml` first, then `/etc/obtrack/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("obtrack").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Some(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/obtrack/config.toml");
        if system_config.exists() {
            return Some(system_config);
        }
    }

    None
}

/// Resolves the data root folder following the four-tier priority order
#[derive(Debug, Clone, Default)]
pub struct RootFolderResolver {
    cli_arg: Option<PathBuf>,
    config_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(cli_arg: Option<PathBuf>, config: &TomlConfig) -> Self {
        Self {
            cli_arg,
            config_root: config.root_folder.clone(),
        }
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        // Priority 2: Environment variable
        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.is_empty() {
                return PathBuf::from(path);
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.config_root {
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        default_root_folder()
    }
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/obtrack (or /var/lib/obtrack for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("obtrack"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/obtrack"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("obtrack"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/obtrack"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("obtrack"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\obtrack"))
    } else {
        PathBuf::from("./obtrack_data")
    }
}
