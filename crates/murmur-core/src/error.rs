use thiserror::Error;

/// Top-level error type for the Murmur system.
///
/// Each variant wraps a subsystem-specific failure. Subsystem crates define
/// their own error types and implement `From<SubsystemError> for MurmurError`
/// so that the `?` operator works seamlessly across crate boundaries.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum MurmurError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Transcription error: {0}")]
    Transcription(String),

    #[error("Refinement error: {0}")]
    Refinement(String),

    #[error("Insertion error: {0}")]
    Insertion(String),

    /// Decode or storage failure. Callers treat a read-side persistence
    /// failure as "no data" rather than aborting.
    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Job error: {0}")]
    Job(String),

    #[error("Session error: {0}")]
    Session(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<toml::de::Error> for MurmurError {
    fn from(err: toml::de::Error) -> Self {
        MurmurError::Config(err.to_string())
    }
}

impl From<toml::ser::Error> for MurmurError {
    fn from(err: toml::ser::Error) -> Self {
        MurmurError::Config(err.to_string())
    }
}

impl From<serde_json::Error> for MurmurError {
    fn from(err: serde_json::Error) -> Self {
        MurmurError::Serialization(err.to_string())
    }
}

/// A specialized `Result` type for Murmur operations.
pub type Result<T> = std::result::Result<T, MurmurError>;
