//! Configuration loader
//!
//! Loading pipeline:
//! 1. Size check
//! 2. Read (UTF-8 BOM stripped)
//! 3. YAML deserialization into [`SequenceConfig`] (empty file = defaults)
//! 4. Command-line overrides
//! 5. Validation
//! 6. Freeze with `Arc`

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::schema::SequenceConfig;
use crate::config::validation::Validator;
use crate::error::ConfigError;

/// Label used in errors for the built-in configuration.
pub const BUILT_IN: &str = "<built-in>";

// ============================================================================
// Public API
// ============================================================================

/// Options for the configuration loader.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Maximum configuration file size in bytes.
    pub max_config_size: u64,

    /// Replaces `pace` from the file when set.
    pub pace: Option<f64>,

    /// Replaces `processing.gate.enabled` from the file when set.
    pub gated: Option<bool>,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            max_config_size: env_or("AKASHIC_MAX_CONFIG_SIZE", 1024 * 1024),
            pace: None,
            gated: None,
        }
    }
}

/// Result of loading a configuration.
#[derive(Debug)]
pub struct LoadResult {
    /// The loaded and validated configuration.
    pub config: Arc<SequenceConfig>,

    /// Warnings encountered during loading.
    pub warnings: Vec<LoadWarning>,
}

/// Warning during configuration loading.
#[derive(Debug, Clone)]
pub struct LoadWarning {
    /// Warning message.
    pub message: String,

    /// Location where the warning occurred.
    pub location: Option<String>,
}

/// Configuration loader.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: LoaderOptions,
}

impl ConfigLoader {
    /// Creates a new configuration loader with the given options.
    #[must_use]
    pub const fn new(options: LoaderOptions) -> Self {
        Self { options }
    }

    /// Creates a new configuration loader with default options.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(LoaderOptions::default())
    }

    /// Loads a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The file cannot be read or exceeds the size limit
    /// - YAML parsing fails
    /// - Validation fails
    pub fn load(&self, path: &Path) -> Result<LoadResult, ConfigError> {
        let metadata = std::fs::metadata(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        if metadata.len() > self.options.max_config_size {
            return Err(ConfigError::FileTooLarge {
                path: path.to_path_buf(),
                size: metadata.len(),
                limit: self.options.max_config_size,
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|_| ConfigError::MissingFile {
            path: path.to_path_buf(),
        })?;
        let raw = raw.strip_prefix('\u{feff}').unwrap_or(&raw);

        let config = parse_yaml(raw, path)?;
        debug!(path = %path.display(), "configuration parsed");
        self.finish(config, &path.display().to_string())
    }

    /// Loads the built-in narrative, applying overrides and validation.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ValidationError`] if the overrides make the
    /// configuration invalid (e.g. a non-positive pace).
    pub fn load_default(&self) -> Result<LoadResult, ConfigError> {
        self.finish(SequenceConfig::default(), BUILT_IN)
    }

    /// Loads `path` when given, otherwise the built-in narrative.
    ///
    /// # Errors
    ///
    /// See [`load`](Self::load) and [`load_default`](Self::load_default).
    pub fn load_optional(&self, path: Option<&Path>) -> Result<LoadResult, ConfigError> {
        path.map_or_else(|| self.load_default(), |p| self.load(p))
    }

    fn finish(&self, mut config: SequenceConfig, label: &str) -> Result<LoadResult, ConfigError> {
        if let Some(pace) = self.options.pace {
            config.pace = pace;
        }
        if let Some(gated) = self.options.gated {
            config.processing.gate.enabled = gated;
        }

        let result = Validator::new().validate(&config);
        if result.has_errors() {
            return Err(ConfigError::ValidationError {
                path: label.to_string(),
                errors: result.errors,
            });
        }

        let warnings: Vec<LoadWarning> = result
            .warnings
            .into_iter()
            .map(|issue| LoadWarning {
                message: issue.message,
                location: Some(issue.path),
            })
            .collect();
        for w in &warnings {
            warn!(location = w.location.as_deref().unwrap_or(""), "{}", w.message);
        }

        Ok(LoadResult {
            config: Arc::new(config),
            warnings,
        })
    }
}

fn parse_yaml(raw: &str, path: &Path) -> Result<SequenceConfig, ConfigError> {
    if raw.trim().is_empty() {
        return Ok(SequenceConfig::default());
    }
    serde_yaml::from_str(raw).map_err(|e| ConfigError::ParseError {
        path: PathBuf::from(path),
        line: e.location().map(|l| l.line()),
        message: e.to_string(),
    })
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
