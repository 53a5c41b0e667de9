//! Configuration management for flowgraph
//!
//! Values are resolved from defaults, then `FLOWGRAPH_*` environment variables, then a
//! `flowgraph.yaml` file. Command line flags are applied on top by the CLI through the
//! builder methods.

use crate::common::env_loader::EnvLoader;
use crate::paths::ExpansionMode;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default maximum expansion depth (root is depth 0)
pub const DEFAULT_MAX_DEPTH: usize = 2;

/// Default ceiling on the total number of expanded paths
pub const DEFAULT_MAX_PATHS: u64 = 10_000;

/// Default ceiling on the number of files considered by a filesystem search
pub const DEFAULT_MAX_SEARCH_FILES: usize = 10_000;

/// Upper bound accepted for `max_depth`
pub const MAX_DEPTH_LIMIT: usize = 64;

/// Name of the YAML configuration file
pub const CONFIG_FILE_NAME: &str = "flowgraph.yaml";

const DEFAULT_EXTENSIONS: [&str; 2] = ["md", "mermaid"];

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read a configuration file from disk
    #[error("Failed to read configuration file {path}: {source}")]
    FileRead {
        /// Path to the configuration file that could not be read
        path: PathBuf,
        /// Underlying I/O error that occurred during file reading
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML content from a configuration file
    #[error("Invalid YAML syntax in {path}:\n{source}\n\nHint: Check for proper indentation and YAML formatting")]
    YamlParse {
        /// Path to the configuration file with invalid YAML content
        path: PathBuf,
        /// Underlying YAML parsing error
        #[source]
        source: serde_yaml::Error,
    },

    /// Invalid configuration value for a specific field
    #[error("Invalid configuration value for '{field}': {value}\n{hint}")]
    InvalidValue {
        /// Name of the configuration field that has an invalid value
        field: String,
        /// The invalid value that was provided
        value: String,
        /// Helpful hint about how to fix the issue
        hint: String,
    },

    /// Configuration validation failed
    #[error("Configuration validation failed: {message}")]
    Validation {
        /// Descriptive message about the validation failure
        message: String,
    },
}

/// What the resolver does when a child workflow cannot be found by any tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingChildPolicy {
    /// Abort the whole graph build
    #[default]
    Fail,
    /// Record the edge as unresolved and keep resolving siblings
    Mark,
}

impl FromStr for MissingChildPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "mark" => Ok(Self::Mark),
            other => Err(ConfigError::InvalidValue {
                field: "on_missing_child".to_string(),
                value: other.to_string(),
                hint: "Expected one of: fail, mark".to_string(),
            }),
        }
    }
}

impl fmt::Display for MissingChildPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fail => write!(f, "fail"),
            Self::Mark => write!(f, "mark"),
        }
    }
}

/// Configuration settings for one analysis
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum expansion depth, root is depth 0 (default: 2)
    pub max_depth: usize,
    /// Ceiling on the total expanded path count (default: 10 000)
    pub max_paths: u64,
    /// Expansion mode (default: reference)
    pub mode: ExpansionMode,
    /// Root of the filesystem search (default: ".")
    pub search_root: PathBuf,
    /// File extensions considered by the index, without the dot
    pub extensions: Vec<String>,
    /// Ceiling on the number of candidate files a search may consider
    pub max_search_files: usize,
    /// Overall analysis deadline (default: none)
    pub deadline: Option<Duration>,
    /// Missing child policy (default: fail)
    pub on_missing_child: MissingChildPolicy,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_paths: DEFAULT_MAX_PATHS,
            mode: ExpansionMode::default(),
            search_root: PathBuf::from("."),
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
            max_search_files: DEFAULT_MAX_SEARCH_FILES,
            deadline: None,
            on_missing_child: MissingChildPolicy::default(),
        }
    }
}

impl Config {
    /// Create a new configuration instance with values loaded from:
    /// 1. YAML file (highest precedence)
    /// 2. Environment variables
    /// 3. Defaults (lowest precedence)
    pub fn new() -> Self {
        let mut config = Self::default();
        config.apply_env_vars();

        match YamlConfig::load_or_default() {
            Ok(yaml_config) => {
                if let Err(validation_error) = yaml_config.validate() {
                    tracing::warn!(
                        "Invalid YAML configuration: {}. Continuing with environment variables and defaults.",
                        validation_error
                    );
                } else {
                    yaml_config.apply_to_config(&mut config);
                }
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to load YAML configuration, falling back to env vars and defaults: {}",
                    e
                );
            }
        }

        config
    }

    /// Apply environment variable configuration to this config
    fn apply_env_vars(&mut self) {
        let loader = EnvLoader::new("FLOWGRAPH");

        self.max_depth = loader.load_parsed("MAX_DEPTH", self.max_depth);
        self.max_paths = loader.load_parsed("MAX_PATHS", self.max_paths);
        self.mode = loader.load_parsed("MODE", self.mode);
        self.max_search_files = loader.load_parsed("MAX_SEARCH_FILES", self.max_search_files);
        self.on_missing_child = loader.load_parsed("ON_MISSING_CHILD", self.on_missing_child);

        if let Some(root) = loader.load_optional::<PathBuf>("SEARCH_ROOT") {
            self.search_root = root;
        }
        if let Some(extensions) = loader.load_list("EXTENSIONS") {
            self.extensions = extensions;
        }
        if let Some(secs) = loader.load_optional::<u64>("DEADLINE_SECS") {
            self.deadline = Some(Duration::from_secs(secs));
        }
    }

    /// Find the flowgraph.yaml configuration file
    ///
    /// The search order is:
    /// 1. Current working directory: `flowgraph.yaml`
    /// 2. `~/.config/flowgraph/flowgraph.yaml`
    /// 3. `~/flowgraph.yaml`
    pub fn find_yaml_config_file() -> Option<PathBuf> {
        let mut search_paths = vec![PathBuf::from(CONFIG_FILE_NAME)];

        if let Some(home_dir) = dirs::home_dir() {
            search_paths.push(
                home_dir
                    .join(".config")
                    .join("flowgraph")
                    .join(CONFIG_FILE_NAME),
            );
            search_paths.push(home_dir.join(CONFIG_FILE_NAME));
        }

        let found = search_paths
            .iter()
            .find_map(|path| Self::check_config_file(path));

        match &found {
            Some(path) => tracing::debug!("Found configuration file: {:?}", path),
            None => tracing::debug!("No {} found in any search location", CONFIG_FILE_NAME),
        }
        found
    }

    /// Check if a configuration file exists and is readable
    pub fn check_config_file(config_path: &Path) -> Option<PathBuf> {
        match config_path.try_exists() {
            Ok(true) if config_path.is_file() => match std::fs::File::open(config_path) {
                Ok(_) => Some(config_path.to_path_buf()),
                Err(e) => {
                    tracing::warn!(
                        "Configuration file {:?} exists but cannot be read: {}",
                        config_path,
                        e
                    );
                    None
                }
            },
            Ok(false) => None,
            Ok(true) => {
                tracing::debug!("Found {:?} but it is not a file", config_path);
                None
            }
            Err(e) => {
                tracing::warn!(
                    "Error checking for configuration file {:?}: {}",
                    config_path,
                    e
                );
                None
            }
        }
    }

    /// Validate the current configuration settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_depth > MAX_DEPTH_LIMIT {
            return Err(ConfigError::InvalidValue {
                field: "max_depth".to_string(),
                value: self.max_depth.to_string(),
                hint: format!("max_depth cannot exceed {}", MAX_DEPTH_LIMIT),
            });
        }

        if self.max_paths == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_paths".to_string(),
                value: "0".to_string(),
                hint: "max_paths must be at least 1".to_string(),
            });
        }

        if self.max_search_files == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_search_files".to_string(),
                value: "0".to_string(),
                hint: "max_search_files must be at least 1".to_string(),
            });
        }

        validate_extensions(&self.extensions)?;

        if self.search_root.as_os_str().is_empty() {
            return Err(ConfigError::Validation {
                message: "search_root cannot be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Set the expansion mode
    pub fn with_mode(mut self, mode: ExpansionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the maximum expansion depth
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the path-count ceiling
    pub fn with_max_paths(mut self, max_paths: u64) -> Self {
        self.max_paths = max_paths;
        self
    }

    /// Set the filesystem search root
    pub fn with_search_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.search_root = root.into();
        self
    }

    /// Set the overall deadline
    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Set the missing child policy
    pub fn with_missing_child_policy(mut self, policy: MissingChildPolicy) -> Self {
        self.on_missing_child = policy;
        self
    }

    /// Generate an example YAML configuration file content
    pub fn example_yaml_config() -> &'static str {
        r#"# flowgraph.yaml
max_depth: 2
max_paths: 10000
mode: reference          # reference | inline | subgraph
search_root: "."
extensions: [md, mermaid]
max_search_files: 10000
# deadline_secs: 30
on_missing_child: fail   # fail | mark
"#
    }
}

fn validate_extensions(extensions: &[String]) -> Result<(), ConfigError> {
    if extensions.is_empty() {
        return Err(ConfigError::Validation {
            message: "at least one file extension is required".to_string(),
        });
    }

    for ext in extensions {
        if ext.is_empty() || ext.starts_with('.') || ext.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                field: "extensions".to_string(),
                value: ext.clone(),
                hint: "Extensions are bare names such as 'md' or 'mermaid'".to_string(),
            });
        }
    }
    Ok(())
}

/// Configuration loaded from flowgraph.yaml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct YamlConfig {
    /// Maximum expansion depth
    pub max_depth: Option<usize>,
    /// Path-count ceiling
    pub max_paths: Option<u64>,
    /// Expansion mode
    pub mode: Option<ExpansionMode>,
    /// Filesystem search root
    pub search_root: Option<PathBuf>,
    /// Indexed file extensions
    pub extensions: Option<Vec<String>>,
    /// Candidate file ceiling for searches
    pub max_search_files: Option<usize>,
    /// Overall deadline in seconds
    pub deadline_secs: Option<u64>,
    /// Missing child policy
    pub on_missing_child: Option<MissingChildPolicy>,
}

impl YamlConfig {
    /// Apply YAML configuration values to an existing Config
    pub fn apply_to_config(&self, config: &mut Config) {
        if let Some(max_depth) = self.max_depth {
            config.max_depth = max_depth;
        }
        if let Some(max_paths) = self.max_paths {
            config.max_paths = max_paths;
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(ref root) = self.search_root {
            config.search_root = root.clone();
        }
        if let Some(ref extensions) = self.extensions {
            config.extensions = extensions.clone();
        }
        if let Some(max_search_files) = self.max_search_files {
            config.max_search_files = max_search_files;
        }
        if let Some(secs) = self.deadline_secs {
            config.deadline = Some(Duration::from_secs(secs));
        }
        if let Some(policy) = self.on_missing_child {
            config.on_missing_child = policy;
        }
    }

    /// Load YAML configuration from a file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::info!("Loading YAML configuration from: {:?}", path);

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        // An empty document deserializes to unit, not to a struct of Nones
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: YamlConfig =
            serde_yaml::from_str(&content).map_err(|e| ConfigError::YamlParse {
                path: path.to_path_buf(),
                source: e,
            })?;

        config.validate()?;
        Ok(config)
    }

    /// Try to load YAML configuration, returning default if file not found
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Config::find_yaml_config_file() {
            Some(path) => Self::load_from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate the YAML values that can be checked in isolation
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(max_depth) = self.max_depth {
            if max_depth > MAX_DEPTH_LIMIT {
                return Err(ConfigError::InvalidValue {
                    field: "max_depth".to_string(),
                    value: max_depth.to_string(),
                    hint: format!("max_depth cannot exceed {}", MAX_DEPTH_LIMIT),
                });
            }
        }
        if self.max_paths == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_paths".to_string(),
                value: "0".to_string(),
                hint: "max_paths must be at least 1".to_string(),
            });
        }
        if self.max_search_files == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_search_files".to_string(),
                value: "0".to_string(),
                hint: "max_search_files must be at least 1".to_string(),
            });
        }
        if let Some(ref extensions) = self.extensions {
            validate_extensions(extensions)?;
        }
        Ok(())
    }
}
