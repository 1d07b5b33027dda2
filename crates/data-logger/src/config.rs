//! Logger Configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::LoggerError;

/// Static logger configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Directory log files are written to
    pub root_path: PathBuf,
    /// Records buffered between the receiver and the file writer
    pub buffer_capacity: usize,
    /// Evict the oldest buffered record instead of rejecting new ones
    pub buffer_overwrite: bool,
    pub file_prefix: String,
    pub delimiter: String,
    pub entries_per_file: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            root_path: PathBuf::from("systa-logs"),
            buffer_capacity: 256,
            buffer_overwrite: false,
            file_prefix: "SystaREST".to_string(),
            delimiter: ";".to_string(),
            entries_per_file: 60,
        }
    }
}

impl LoggerConfig {
    /// Session settings built from the configured defaults
    pub fn settings(&self) -> LoggingSettings {
        LoggingSettings {
            root_path: self.root_path.clone(),
            file_prefix: self.file_prefix.clone(),
            delimiter: self.delimiter.clone(),
            entries_per_file: self.entries_per_file,
        }
    }
}

/// Settings of one logging session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingSettings {
    pub root_path: PathBuf,
    pub file_prefix: String,
    pub delimiter: String,
    pub entries_per_file: usize,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        LoggerConfig::default().settings()
    }
}

impl LoggingSettings {
    /// Check everything that does not need the filesystem
    pub fn validate(&self) -> Result<(), LoggerError> {
        if self.entries_per_file == 0 {
            return Err(LoggerError::InvalidSettings(
                "entries per file must be greater than zero".to_string(),
            ));
        }
        if self.file_prefix.is_empty() {
            return Err(LoggerError::InvalidSettings(
                "file prefix must not be empty".to_string(),
            ));
        }
        if self.file_prefix.contains(['/', '\\']) || self.file_prefix.contains("..") {
            return Err(LoggerError::InvalidSettings(format!(
                "file prefix {:?} must not contain path separators",
                self.file_prefix
            )));
        }
        if self.delimiter.is_empty() || self.delimiter.contains(['\n', '\r']) {
            return Err(LoggerError::InvalidSettings(format!(
                "delimiter {:?} must be non-empty and on one line",
                self.delimiter
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let settings = LoggingSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.file_prefix, "SystaREST");
        assert_eq!(settings.delimiter, ";");
        assert_eq!(settings.entries_per_file, 60);
    }

    #[test]
    fn test_invalid_settings() {
        let base = LoggingSettings::default();

        let zero = LoggingSettings {
            entries_per_file: 0,
            ..base.clone()
        };
        assert!(zero.validate().is_err());

        for prefix in ["", "a/b", "..", "x\\y"] {
            let settings = LoggingSettings {
                file_prefix: prefix.to_string(),
                ..base.clone()
            };
            assert!(settings.validate().is_err(), "prefix {:?}", prefix);
        }

        let newline = LoggingSettings {
            delimiter: "\n".to_string(),
            ..base
        };
        assert!(newline.validate().is_err());
    }
}
