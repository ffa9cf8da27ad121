//! Configuration loading and root folder resolution
//!
//! Bootstrap settings come from a TOML file. Values that must be known before
//! the file is read (the root folder) follow this priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "CINEBOOT_ROOT_FOLDER";

/// Environment variable overriding the configuration file location
pub const CONFIG_FILE_ENV: &str = "CINEBOOT_CONFIG";

/// Bootstrap configuration loaded from TOML
///
/// Only concerns needed before the catalog run starts live here. The
/// catalog tuning knobs are read from the `[catalog]` table by the catalog
/// crate itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Folder holding caches, the metadata snapshot and output files
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,

    /// OMDb API key (environment variable takes precedence)
    #[serde(default)]
    pub omdb_api_key: Option<String>,

    /// Path to the read-only IMDb SQLite snapshot (relative to root folder)
    #[serde(default)]
    pub metadata_db: Option<PathBuf>,

    /// Contact address sent in the User-Agent header
    #[serde(default)]
    pub contact: Option<String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Compiled-in defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub metadata_db: PathBuf,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: get_default_root_folder(),
            log_level: default_log_level(),
            metadata_db: PathBuf::from("imdb.sqlite"),
        }
    }
}

/// Resolves the root folder following the priority order in the module docs
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
        }
    }

    /// Highest priority override, typically from `--root-folder`
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            debug!(module = %self.module_name, "Root folder from command line");
            return path.clone();
        }

        if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
            if !path.trim().is_empty() {
                debug!(module = %self.module_name, "Root folder from {}", ROOT_FOLDER_ENV);
                return PathBuf::from(path);
            }
        }

        if let Ok(config_path) = locate_config_file() {
            match load_toml_config(&config_path) {
                Ok(config) => {
                    if let Some(root) = config.root_folder {
                        debug!(module = %self.module_name, "Root folder from TOML config");
                        return root;
                    }
                }
                Err(e) => warn!("Ignoring unreadable config {}: {}", config_path.display(), e),
            }
        }

        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Find the configuration file for the platform
///
/// `CINEBOOT_CONFIG` wins; otherwise `~/.config/cineboot/config.toml`,
/// then `/etc/cineboot/config.toml` on Linux.
pub fn locate_config_file() -> Result<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Ok(path);
        }
        return Err(Error::Config(format!("Config file not found: {}", path.display())));
    }

    let user_config = dirs::config_dir().map(|d| d.join("cineboot").join("config.toml"));
    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/cineboot/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Load the bootstrap configuration, or defaults when the file is missing
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!("Config file {} missing, using defaults", path.display());
        return Ok(TomlConfig::default());
    }
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))
}

/// Read one table of the config file as its own type
///
/// A missing file or table yields `T::default()`.
pub fn load_toml_section<T>(path: &Path, table: &str) -> Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if !path.exists() {
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path)?;
    let root: toml::Table = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;
    match root.get(table) {
        Some(value) => value
            .clone()
            .try_into()
            .map_err(|e| Error::Config(format!("Invalid [{}] table: {}", table, e))),
        None => Ok(T::default()),
    }
}

/// Write TOML configuration atomically
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;
    write_atomic(path, content.as_bytes())
}

/// Write a file through a temp file + rename so readers never see a partial file
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Resolve the OMDb API key
///
/// **Priority:** ENV → TOML
pub fn resolve_omdb_api_key(toml_config: &TomlConfig) -> Result<String> {
    let env_key = std::env::var("CINEBOOT_OMDB_API_KEY").ok();
    if let Some(key) = env_key {
        if is_valid_key(&key) {
            tracing::info!("OMDb API key loaded from environment variable");
            return Ok(key);
        }
    }

    if let Some(key) = &toml_config.omdb_api_key {
        if is_valid_key(key) {
            tracing::info!("OMDb API key loaded from TOML config");
            return Ok(key.clone());
        }
    }

    Err(Error::Config(
        "OMDb API key not configured. Set CINEBOOT_OMDB_API_KEY or omdb_api_key in config.toml"
            .to_string(),
    ))
}

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// User-Agent for outbound HTTP requests
///
/// Wikimedia asks for a contact address in every client's User-Agent.
pub fn get_user_agent(contact: Option<&str>) -> String {
    match contact {
        Some(c) if !c.trim().is_empty() => {
            format!("CineBoot/{} ({})", env!("CARGO_PKG_VERSION"), c.trim())
        }
        _ => format!("CineBoot/{}", env!("CARGO_PKG_VERSION")),
    }
}

/// Get OS-dependent default root folder path
fn get_default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        dirs::data_local_dir()
            .map(|d| d.join("cineboot"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/cineboot"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("cineboot"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/cineboot"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("cineboot"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\cineboot"))
    } else {
        PathBuf::from("./cineboot_data")
    }
}
