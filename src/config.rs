//! Lookahead session configuration
//!
//! Configuration is read once when a session is built, from explicit values,
//! environment variables or an rc-style key-value file. It is never consulted
//! live; changing the environment after a session exists has no effect.

use std::path::{Path, PathBuf};

use crate::error::{OutriderError, Result};

/// Environment variable names, also usable as rc-file documentation.
pub const ENV_ENABLED: &str = "OUTRIDER_ENABLED";
pub const ENV_BUFFERS: &str = "OUTRIDER_BUFFERS";
pub const ENV_STATS: &str = "OUTRIDER_STATS";
pub const ENV_LOG_FILE: &str = "OUTRIDER_LOG_FILE";
pub const ENV_LOG_LEVEL: &str = "OUTRIDER_LOG_LEVEL";

/// Configuration for a lookahead session
#[derive(Debug, Clone, PartialEq)]
pub struct LookaheadConfig {
    /// Whether asynchronous lookahead is enabled at all
    pub enabled: bool,
    /// Number of slots in the buffer ring
    pub ring_buffers: usize,
    /// Whether to collect performance statistics
    pub collect_stats: bool,
    /// Optional diagnostic log file path
    pub log_file: Option<PathBuf>,
    /// Diagnostic verbosity, 0 (off) through 5 (trace)
    pub log_level: u8,
}

impl Default for LookaheadConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ring_buffers: 2,
            collect_stats: false,
            log_file: None,
            log_level: 0,
        }
    }
}

impl LookaheadConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the enabled flag
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the number of ring buffers
    pub fn with_ring_buffers(mut self, count: usize) -> Self {
        self.ring_buffers = count;
        self
    }

    /// Enable or disable statistics collection
    pub fn with_stats(mut self, collect: bool) -> Self {
        self.collect_stats = collect;
        self
    }

    /// Set the diagnostic log file
    pub fn with_log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = Some(path.into());
        self
    }

    /// Set the diagnostic verbosity
    pub fn with_log_level(mut self, level: u8) -> Self {
        self.log_level = level;
        self
    }

    /// Load the default configuration overridden from the environment
    pub fn from_env() -> Result<Self> {
        Self::default().override_from_env()
    }

    /// Override any field for which an environment variable is set
    pub fn override_from_env(mut self) -> Result<Self> {
        if let Ok(value) = std::env::var(ENV_ENABLED) {
            self.enabled = parse_bool(ENV_ENABLED, &value)?;
        }
        if let Ok(value) = std::env::var(ENV_BUFFERS) {
            self.ring_buffers = parse_count(ENV_BUFFERS, &value)?;
        }
        if let Ok(value) = std::env::var(ENV_STATS) {
            self.collect_stats = parse_bool(ENV_STATS, &value)?;
        }
        if let Ok(value) = std::env::var(ENV_LOG_FILE) {
            self.log_file = Some(PathBuf::from(value));
        }
        if let Ok(value) = std::env::var(ENV_LOG_LEVEL) {
            self.log_level = parse_level(ENV_LOG_LEVEL, &value)?;
        }
        Ok(self)
    }

    /// Load the default configuration overridden from an rc-style file.
    ///
    /// Each line is `key value`; `#` starts a comment. Recognized keys are
    /// `outrider.enabled`, `outrider.buffers`, `outrider.stats`,
    /// `outrider.logfile` and `outrider.loglevel`. Unrecognized keys are
    /// ignored so the file can be shared with other subsystems.
    pub fn from_rc_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| OutriderError::from_io(e, &format!("reading {}", path.display())))?;

        let mut config = Self::default();
        for line in text.lines() {
            let line = match line.find('#') {
                Some(at) => &line[..at],
                None => line,
            }
            .trim();
            if line.is_empty() {
                continue;
            }
            let (key, value) = match line.split_once(char::is_whitespace) {
                Some((key, value)) => (key.trim(), value.trim()),
                None => (line, ""),
            };
            match key {
                "outrider.enabled" => config.enabled = parse_bool(key, value)?,
                "outrider.buffers" => config.ring_buffers = parse_count(key, value)?,
                "outrider.stats" => config.collect_stats = parse_bool(key, value)?,
                "outrider.logfile" => config.log_file = Some(PathBuf::from(value)),
                "outrider.loglevel" => config.log_level = parse_level(key, value)?,
                _ => {}
            }
        }
        Ok(config)
    }

    /// The `tracing` level this verbosity maps to, if any
    pub fn tracing_level(&self) -> Option<tracing::Level> {
        match self.log_level {
            0 => None,
            1 => Some(tracing::Level::ERROR),
            2 => Some(tracing::Level::WARN),
            3 => Some(tracing::Level::INFO),
            4 => Some(tracing::Level::DEBUG),
            _ => Some(tracing::Level::TRACE),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ring_buffers == 0 {
            return Err(OutriderError::invalid_parameter(
                "ring_buffers",
                "at least one ring buffer is required",
            ));
        }
        Ok(())
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(OutriderError::invalid_parameter(
            key,
            format!("expected a boolean, got {:?}", value),
        )),
    }
}

fn parse_count(key: &str, value: &str) -> Result<usize> {
    value.parse::<usize>().map_err(|_| {
        OutriderError::invalid_parameter(key, format!("expected a positive integer, got {:?}", value))
    })
}

fn parse_level(key: &str, value: &str) -> Result<u8> {
    value.parse::<u8>().map_err(|_| {
        OutriderError::invalid_parameter(key, format!("expected a verbosity 0-5, got {:?}", value))
    })
}

/// Builder pattern for lookahead configuration
pub struct LookaheadConfigBuilder {
    config: LookaheadConfig,
}

impl LookaheadConfigBuilder {
    /// Create a new builder from the defaults
    pub fn new() -> Self {
        Self {
            config: LookaheadConfig::default(),
        }
    }

    /// Enable or disable lookahead
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// Set the ring size
    pub fn ring_buffers(mut self, count: usize) -> Self {
        self.config.ring_buffers = count;
        self
    }

    /// Enable or disable statistics
    pub fn collect_stats(mut self, collect: bool) -> Self {
        self.config.collect_stats = collect;
        self
    }

    /// Set the diagnostic log file
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.log_file = Some(path.into());
        self
    }

    /// Set the diagnostic verbosity
    pub fn log_level(mut self, level: u8) -> Self {
        self.config.log_level = level;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<LookaheadConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for LookaheadConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = LookaheadConfig::default();
        assert!(config.enabled);
        assert_eq!(config.ring_buffers, 2);
        assert!(!config.collect_stats);
        assert!(config.log_file.is_none());
        assert_eq!(config.log_level, 0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_buffers_rejected() {
        let config = LookaheadConfig::default().with_ring_buffers(0);
        assert!(matches!(
            config.validate(),
            Err(OutriderError::InvalidParameter { .. })
        ));
        assert!(LookaheadConfigBuilder::new().ring_buffers(0).build().is_err());
    }

    #[test]
    fn test_builder() {
        let config = LookaheadConfigBuilder::new()
            .enabled(false)
            .ring_buffers(4)
            .collect_stats(true)
            .log_level(3)
            .build()
            .unwrap();
        assert!(!config.enabled);
        assert_eq!(config.ring_buffers, 4);
        assert!(config.collect_stats);
        assert_eq!(config.tracing_level(), Some(tracing::Level::INFO));
    }

    #[test]
    fn test_rc_file_parsing() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# lookahead settings").unwrap();
        writeln!(file, "outrider.enabled yes").unwrap();
        writeln!(file, "outrider.buffers 8  # ring size").unwrap();
        writeln!(file, "outrider.stats on").unwrap();
        writeln!(file, "outrider.logfile /tmp/outrider.log").unwrap();
        writeln!(file, "some.other.subsystem 42").unwrap();
        file.flush().unwrap();

        let config = LookaheadConfig::from_rc_file(file.path()).unwrap();
        assert!(config.enabled);
        assert_eq!(config.ring_buffers, 8);
        assert!(config.collect_stats);
        assert_eq!(config.log_file.as_deref(), Some(Path::new("/tmp/outrider.log")));
    }

    #[test]
    fn test_rc_file_bad_value() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "outrider.buffers many").unwrap();
        file.flush().unwrap();

        let err = LookaheadConfig::from_rc_file(file.path()).unwrap_err();
        assert!(matches!(err, OutriderError::InvalidParameter { .. }));
    }

    #[test]
    fn test_missing_rc_file_is_io_error() {
        let err = LookaheadConfig::from_rc_file("/nonexistent/outrider.rc").unwrap_err();
        assert!(matches!(err, OutriderError::Io { .. }));
    }

    #[test]
    fn test_env_override() {
        // The only test that touches these variables, so no cross-test race.
        std::env::set_var(ENV_BUFFERS, "5");
        std::env::set_var(ENV_STATS, "true");
        let config = LookaheadConfig::from_env().unwrap();
        std::env::remove_var(ENV_BUFFERS);
        std::env::remove_var(ENV_STATS);
        assert_eq!(config.ring_buffers, 5);
        assert!(config.collect_stats);
        assert!(config.enabled);
    }
}
