//! Configuration management for spack.
//!
//! Parses `spack.toml` with serde. An explicit path is loaded as given;
//! otherwise `spack.toml` in the current directory is used when present.
//! Relative paths in the file are resolved against the file's directory.
//!
//! CLI settings can be applied during load via [`CliSettings`].

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use spack_bundler::{Entry, ResolveOptions, normalize};

/// CLI settings that override configuration file values.
///
/// All fields are optional. Only non-None values override the loaded config.
#[derive(Debug, Default)]
pub struct CliSettings {
    /// Override server host.
    pub host: Option<String>,
    /// Override server port.
    pub port: Option<u16>,
    /// Override watch mode.
    pub watch: Option<bool>,
}

/// Configuration filename looked up in the current directory.
const CONFIG_FILENAME: &str = "spack.toml";

/// Application configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Shared library root (relative to the config file).
    libs_root: Option<String>,
    /// Prefix of development override files, used by `serve` only.
    pub override_prefix: Option<String>,
    /// Output configuration.
    pub output: OutputConfig,
    /// Development server configuration.
    pub server: ServerConfig,
    /// Entry definitions keyed by entry name.
    #[serde(rename = "entries")]
    entry_configs: BTreeMap<String, EntryConfig>,

    /// Directory relative paths are resolved against (set after loading).
    #[serde(skip)]
    pub workdir: PathBuf,
    /// Path to the config file (set after loading).
    #[serde(skip)]
    pub config_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_with_base(Path::new("."))
    }
}

/// Output configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Output directory.
    pub dir: String,
    /// Output file name; `[name]` is replaced by the entry name.
    pub filename: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "dist".to_owned(),
            filename: "[name]".to_owned(),
        }
    }
}

/// Development server configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Rebuild entries when their files change.
    pub watch: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_owned(),
            port: 9081,
            watch: false,
        }
    }
}

/// One `[entries.<name>]` table.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EntryConfig {
    /// Entry source file.
    pub path: String,
    /// Template the source is merged into.
    pub template: Option<String>,
    #[serde(default)]
    pub extract_styles: bool,
    #[serde(default = "default_true")]
    pub monolith: bool,
    #[serde(default)]
    pub include_template: bool,
    /// Disabled entries are kept in the file but never built.
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File not found.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),
    /// Validation error.
    #[error("Configuration error: {0}")]
    Validation(String),
}

/// Require a string field to be non-empty.
fn require_non_empty(value: &str, field: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(ConfigError::Validation(format!("{field} cannot be empty")));
    }
    Ok(())
}

impl Config {
    /// Load configuration from file with optional CLI settings.
    ///
    /// If `config_path` is provided, loads from that file. Otherwise loads
    /// `spack.toml` from the current directory, falling back to defaults.
    ///
    /// # Errors
    ///
    /// Returns error if explicit `config_path` doesn't exist, parsing fails
    /// or validation fails.
    pub fn load(
        config_path: Option<&Path>,
        cli_settings: Option<&CliSettings>,
    ) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = config_path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Self::load_from_file(path)?
        } else if Path::new(CONFIG_FILENAME).exists() {
            Self::load_from_file(Path::new(CONFIG_FILENAME))?
        } else {
            Self::default_with_base(&std::env::current_dir()?)
        };

        if let Some(settings) = cli_settings {
            config.apply_cli_settings(settings);
            config.validate()?;
        }

        Ok(config)
    }

    fn apply_cli_settings(&mut self, settings: &CliSettings) {
        if let Some(host) = &settings.host {
            self.server.host.clone_from(host);
        }
        if let Some(port) = settings.port {
            self.server.port = port;
        }
        if let Some(watch) = settings.watch {
            self.server.watch = watch;
        }
    }

    fn default_with_base(base: &Path) -> Self {
        Self {
            libs_root: None,
            override_prefix: None,
            output: OutputConfig::default(),
            server: ServerConfig::default(),
            entry_configs: BTreeMap::new(),
            workdir: base.to_path_buf(),
            config_path: None,
        }
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&content)?;

        let config_dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir,
            _ => Path::new("."),
        };
        config.workdir = normalize(&std::path::absolute(config_dir)?);
        config.config_path = Some(path.to_path_buf());

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` if any validation fails.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty(&self.server.host, "server.host")?;
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "server.port cannot be 0".to_owned(),
            ));
        }
        require_non_empty(&self.output.filename, "output.filename")?;
        for (name, entry) in &self.entry_configs {
            require_non_empty(&entry.path, &format!("entries.{name}.path"))?;
        }
        Ok(())
    }

    /// Enabled entries in name order, with paths resolved against the
    /// working directory.
    pub fn entries(&self) -> Vec<Entry> {
        self.entry_configs
            .iter()
            .filter(|(_, entry)| entry.enabled)
            .map(|(name, entry)| Entry {
                name: name.clone(),
                source: self.workdir.join(&entry.path),
                template: entry.template.as_ref().map(|t| self.workdir.join(t)),
                extract_styles: entry.extract_styles,
                monolith: entry.monolith,
                include_template: entry.include_template,
            })
            .collect()
    }

    /// Path resolution policy. Development overrides only apply in `dev`.
    pub fn resolve_options(&self, dev: bool) -> ResolveOptions {
        ResolveOptions {
            libs_root: self.libs_root.as_ref().map(|root| self.workdir.join(root)),
            override_prefix: if dev {
                self.override_prefix.clone()
            } else {
                None
            },
        }
    }

    /// Absolute output directory.
    pub fn output_dir(&self) -> PathBuf {
        self.workdir.join(&self.output.dir)
    }
}
