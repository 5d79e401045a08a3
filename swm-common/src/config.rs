//! Configuration loading and root folder resolution
//!
//! Root folder priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`SWM_ROOT_FOLDER`, then `SWM_ROOT`)
//! 3. TOML config file (`root_folder` key)
//! 4. OS-dependent compiled default (fallback)
//!
//! A missing or invalid TOML file is never fatal: defaults apply and the
//! returned [`ConfigSource`] carries the warning to log.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable checked first for the root folder
pub const ROOT_FOLDER_ENV: &str = "SWM_ROOT_FOLDER";

/// Shorter alias checked when `SWM_ROOT_FOLDER` is unset
pub const ROOT_ENV: &str = "SWM_ROOT";

/// Default similarity a field-log site name must exceed to count as a match
pub const DEFAULT_SITE_MATCH_THRESHOLD: f64 = 0.8;

/// Default field-log year buffer (visits logged under the adjoining year)
pub const DEFAULT_YEAR_BUFFER: i32 = 1;

/// Largest accepted field-log year buffer
pub const MAX_YEAR_BUFFER: i32 = 10;

/// Values used when neither CLI, environment nor TOML provide one
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
    pub database_file: String,
    pub field_log_file: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            log_level: "info".to_string(),
            database_file: "swm.db".to_string(),
            field_log_file: "field_work_dates.csv".to_string(),
        }
    }
}

/// `[logging]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[matching]` table: field-log lookup tuning
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MatchingConfig {
    #[serde(default = "default_site_threshold")]
    pub site_threshold: f64,
    #[serde(default = "default_year_buffer")]
    pub year_buffer: i32,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            site_threshold: DEFAULT_SITE_MATCH_THRESHOLD,
            year_buffer: DEFAULT_YEAR_BUFFER,
        }
    }
}

fn default_site_threshold() -> f64 {
    DEFAULT_SITE_MATCH_THRESHOLD
}

fn default_year_buffer() -> i32 {
    DEFAULT_YEAR_BUFFER
}

/// Contents of `<config_dir>/swm/<module>.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Database file name (relative to the root folder) or absolute path
    pub database: Option<PathBuf>,
    /// Field-work log CSV (relative to the root folder) or absolute path
    pub field_log_path: Option<PathBuf>,
    #[serde(default)]
    pub matching: MatchingConfig,
}

impl TomlConfig {
    /// Parse a TOML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Read TOML failed for {}: {}", path.display(), e)))?;
        let config: TomlConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Parse TOML failed for {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the given file, or the module's default file, falling back to defaults
    ///
    /// Nothing is logged here: the caller usually has no subscriber installed yet,
    /// so the returned [`ConfigSource`] is reported with [`ConfigSource::log`] once
    /// tracing is up.
    pub fn load_or_default(explicit: Option<&Path>, module_name: &str) -> (Self, ConfigSource) {
        let path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match default_config_path(module_name) {
                Some(p) => p,
                None => return (Self::default(), ConfigSource::NoConfigDir),
            },
        };

        if !path.exists() {
            return (Self::default(), ConfigSource::NotFound(path));
        }

        match Self::load(&path) {
            Ok(config) => (config, ConfigSource::File(path)),
            Err(e) => (
                Self::default(),
                ConfigSource::Invalid {
                    path,
                    reason: e.to_string(),
                },
            ),
        }
    }

    fn validate(&self) -> Result<()> {
        let threshold = self.matching.site_threshold;
        if !(0.0..=1.0).contains(&threshold) {
            return Err(Error::Config(format!(
                "matching.site_threshold must be within 0.0..=1.0, got {}",
                threshold
            )));
        }
        if !(0..=MAX_YEAR_BUFFER).contains(&self.matching.year_buffer) {
            return Err(Error::Config(format!(
                "matching.year_buffer must be within 0..={}, got {}",
                MAX_YEAR_BUFFER, self.matching.year_buffer
            )));
        }
        Ok(())
    }
}

/// Where the effective configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    File(PathBuf),
    NotFound(PathBuf),
    Invalid { path: PathBuf, reason: String },
    NoConfigDir,
}

impl ConfigSource {
    /// True when compiled defaults replaced the file contents
    pub fn is_fallback(&self) -> bool {
        !matches!(self, ConfigSource::File(_))
    }

    /// Report the outcome through the installed subscriber
    pub fn log(&self) {
        match self {
            ConfigSource::File(path) => info!(path = %path.display(), "Loaded configuration"),
            ConfigSource::NotFound(path) => {
                warn!(path = %path.display(), "Config file not found, using defaults")
            }
            ConfigSource::Invalid { path, reason } => {
                warn!(path = %path.display(), error = %reason, "Invalid config file, using defaults")
            }
            ConfigSource::NoConfigDir => warn!("Could not determine config directory, using defaults"),
        }
    }
}

/// Default config file path for a module: `<config_dir>/swm/<module>.toml`
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("swm").join(format!("{}.toml", module_name)))
}

/// Resolves the root folder holding the database and auxiliary files
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_root: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: &str) -> Self {
        Self {
            module_name: module_name.to_string(),
            cli_arg: None,
            toml_root: None,
        }
    }

    pub fn with_cli_arg(mut self, cli_arg: Option<&Path>) -> Self {
        self.cli_arg = cli_arg.map(Path::to_path_buf);
        self
    }

    pub fn with_config(mut self, config: &TomlConfig) -> Self {
        self.toml_root = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        // Priority 1: Command-line argument
        if let Some(path) = &self.cli_arg {
            info!(module = %self.module_name, "Root folder from command line: {}", path.display());
            return path.clone();
        }

        // Priority 2: Environment variables
        for var in [ROOT_FOLDER_ENV, ROOT_ENV] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    info!(module = %self.module_name, "Root folder from {}: {}", var, path);
                    return PathBuf::from(path);
                }
            }
        }

        // Priority 3: TOML config file
        if let Some(path) = &self.toml_root {
            info!(module = %self.module_name, "Root folder from config file: {}", path.display());
            return path.clone();
        }

        // Priority 4: OS-dependent compiled default
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and derives file locations inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    pub fn root_folder(&self) -> &Path {
        &self.root_folder
    }

    pub fn ensure_directory_exists(&self) -> Result<()> {
        if !self.root_folder.exists() {
            std::fs::create_dir_all(&self.root_folder)?;
            info!("Created root folder: {}", self.root_folder.display());
        }
        Ok(())
    }

    /// Database path: config override (absolute or root-relative) or the default file name
    pub fn database_path(&self, config: &TomlConfig) -> PathBuf {
        let defaults = CompiledDefaults::for_current_platform();
        self.under_root(config.database.as_deref(), &defaults.database_file)
    }

    /// Field-work log path: config override (absolute or root-relative) or the default file name
    pub fn field_log_path(&self, config: &TomlConfig) -> PathBuf {
        let defaults = CompiledDefaults::for_current_platform();
        self.under_root(config.field_log_path.as_deref(), &defaults.field_log_file)
    }

    fn under_root(&self, configured: Option<&Path>, default_name: &str) -> PathBuf {
        match configured {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => self.root_folder.join(p),
            None => self.root_folder.join(default_name),
        }
    }
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    if cfg!(target_os = "linux") {
        // ~/.local/share/swm (or /var/lib/swm for system-wide)
        dirs::data_local_dir()
            .map(|d| d.join("swm"))
            .unwrap_or_else(|| PathBuf::from("/var/lib/swm"))
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .map(|d| d.join("swm"))
            .unwrap_or_else(|| PathBuf::from("/Library/Application Support/swm"))
    } else if cfg!(target_os = "windows") {
        dirs::data_local_dir()
            .map(|d| d.join("swm"))
            .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\swm"))
    } else {
        PathBuf::from("./swm_data")
    }
}
