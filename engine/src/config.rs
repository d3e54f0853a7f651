//! Dispatch configuration.
//!
//! Controls the exit codes the engine reports and whether binding may fall
//! back to interactive prompts.
//!
//! # Example YAML
//!
//! ```yaml
//! exit_codes:
//!   success: 0
//!   failure: 1
//!   usage: 2
//!   cancelled: 130
//! interactive: false
//! list_separator: ","
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Exit codes reported by the engine itself.
///
/// # Examples
///
/// ```
/// # use command_dispatch::ExitCodes;
/// let codes = ExitCodes::default();
/// assert_eq!(codes.success, 0);
/// assert_eq!(codes.failure, 1);
/// assert_eq!(codes.cancelled, 130);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitCodes {
    /// Reported when an action returns nothing or `Success`.
    pub success: i32,
    /// Generic failure code for unmapped action errors.
    pub failure: i32,
    /// Reported when resolution, binding or validation fails.
    pub usage: i32,
    /// Reported when the cancellation signal is observed.
    pub cancelled: i32,
}

impl Default for ExitCodes {
    fn default() -> Self {
        Self {
            success: 0,
            failure: 1,
            usage: 2,
            cancelled: 130,
        }
    }
}

/// Engine configuration.
///
/// Missing keys take their defaults, so an empty YAML document is valid.
///
/// # Examples
///
/// ```
/// # use command_dispatch::DispatchConfig;
/// let config = DispatchConfig::from_yaml_str("interactive: false\n").unwrap();
/// assert!(!config.interactive);
/// assert_eq!(config.list_separator, ',');
/// assert_eq!(config.exit_codes.usage, 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub exit_codes: ExitCodes,
    /// Whether binding may prompt for missing values.
    pub interactive: bool,
    /// Separator for collection and flags-enum values.
    pub list_separator: char,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            exit_codes: ExitCodes::default(),
            interactive: true,
            list_separator: ',',
        }
    }
}

impl DispatchConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`IoError`](ConfigError::IoError) if the file cannot be read,
    /// or [`YamlError`](ConfigError::YamlError) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }

    /// Parses configuration from a YAML string.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Returns a copy with prompting disabled.
    pub fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_exit_codes_keep_defaults() {
        let config = DispatchConfig::from_yaml_str("exit_codes:\n  usage: 64\n").unwrap();
        assert_eq!(config.exit_codes.usage, 64);
        assert_eq!(config.exit_codes.failure, 1);
        assert!(config.interactive);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dispatch.yaml");

        let mut config = DispatchConfig::default().non_interactive();
        config.list_separator = ';';
        config.exit_codes.cancelled = 2;
        config.save(&path).unwrap();

        let loaded = DispatchConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let err = DispatchConfig::load("/nonexistent/dispatch.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));
    }
}
