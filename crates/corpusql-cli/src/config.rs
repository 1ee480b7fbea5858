use anyhow::{Context, Result};
use corpusql_query::{Schema, SchemaDefinition};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding the results table
pub const RESULTS_TABLE_ENV: &str = "CORPUSQL_RESULTS_TABLE";
/// Environment variable overriding the configured log level
pub const LOG_ENV: &str = "CORPUSQL_LOG";
/// Environment variable overriding the config directory
pub const CONFIG_DIR_ENV: &str = "CORPUSQL_CONFIG_DIR";

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CliConfig {
    /// Store layout; the standard schema when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaDefinition>,

    /// Search matrix settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Search matrix configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Table that receives search results
    #[serde(default = "default_results_table")]
    pub results_table: String,

    /// Only match turns of main participants
    #[serde(default)]
    pub main_participant_only: bool,
}

fn default_results_table() -> String {
    "_result".to_string()
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            results_table: default_results_table(),
            main_participant_only: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default log level (off, error, warn, info, debug, trace)
    pub level: Option<String>,
}

impl CliConfig {
    /// Load configuration: defaults, then the config file, then environment
    /// variables. Command-line flags are applied by the caller.
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = Self::from_file_or_default(config_file)?;

        if let Ok(table) = std::env::var(RESULTS_TABLE_ENV) {
            config.search.results_table = table;
        }
        if let Ok(level) = std::env::var(LOG_ENV) {
            config.logging.level = Some(level);
        }

        Ok(config)
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = match std::env::var_os(CONFIG_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => dirs::config_dir()
                .context("Could not determine config directory")?
                .join("corpusql"),
        };
        Ok(config_dir.join("config.toml"))
    }

    /// Read an explicit config file, or the default one when it exists
    pub fn from_file_or_default(config_file: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = config_file {
            return Self::from_path(&path);
        }
        match Self::default_config_path() {
            Ok(path) if path.exists() => Self::from_path(&path),
            _ => Ok(Self::default()),
        }
    }

    /// Parse a config file; `.json` files are JSON, anything else TOML
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        }
    }

    /// The configured schema, validated
    pub fn schema(&self) -> Result<Schema> {
        match &self.schema {
            Some(definition) => {
                Schema::new(definition.clone()).context("Invalid schema in configuration")
            }
            None => Ok(Schema::standard()),
        }
    }
}
