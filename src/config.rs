use crate::error::{PipelineError, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Default ring buffer capacity
pub const DEFAULT_BUFFER_CAPACITY: usize = 5;

/// Default per-item release delay of the ring buffer, in milliseconds
pub const DEFAULT_RELEASE_DELAY_MS: u64 = 100;

/// Assembly-time settings for the buffering stage.
///
/// Loaded from TOML; every key is optional:
///
/// ```toml
/// buffer_capacity = 5
/// release_delay_ms = 100
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Ring buffer capacity, at least 1
    pub buffer_capacity: usize,
    /// Delay before each buffered value is released
    pub release_delay_ms: u64,
}

impl PipelineConfig {
    /// Parse a configuration from TOML text and validate it
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Override the buffer capacity
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Override the release delay
    pub fn with_release_delay_ms(mut self, delay_ms: u64) -> Self {
        self.release_delay_ms = delay_ms;
        self
    }

    /// Per-item release delay as a duration
    pub fn release_delay(&self) -> Duration {
        Duration::from_millis(self.release_delay_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.buffer_capacity == 0 {
            return Err(PipelineError::Config(
                "buffer_capacity must be a positive integer".into(),
            ));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            release_delay_ms: DEFAULT_RELEASE_DELAY_MS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.buffer_capacity, 5);
        assert_eq!(config.release_delay(), Duration::from_millis(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = PipelineConfig::from_toml_str("buffer_capacity = 8").unwrap();
        assert_eq!(config.buffer_capacity, 8);
        assert_eq!(config.release_delay_ms, DEFAULT_RELEASE_DELAY_MS);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = PipelineConfig::from_toml_str("buffer_capacity = 0");
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result = PipelineConfig::from_toml_str("buffer_size = 3");
        assert!(matches!(result, Err(PipelineError::ConfigParse(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "buffer_capacity = 3\nrelease_delay_ms = 0").unwrap();

        let config = PipelineConfig::load(file.path()).unwrap();
        assert_eq!(config, PipelineConfig::default().with_buffer_capacity(3).with_release_delay_ms(0));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = PipelineConfig::load("/nonexistent/pipeline.toml");
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }
}
