use thiserror::Error;

/// Result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that can occur while assembling or tearing down a pipeline
#[derive(Error, Debug)]
pub enum PipelineError {
    /// No stages in pipeline
    #[error("Cannot assemble a pipeline with no stages")]
    NoStages,

    /// A stage worker thread panicked
    #[error("Stage worker panicked: {0}")]
    WorkerPanicked(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// I/O error from a source or sink adapter
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
