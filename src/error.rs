use std::path::PathBuf;

/// Application-level failures. Request failures never surface here; the
/// harness turns them into metrics.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("duplicate endpoint name in catalog: {0}")]
    DuplicateEndpoint(String),

    #[error("invalid stage '{0}': {1}")]
    InvalidStage(String, String),

    #[error("invalid duration '{0}': {1}")]
    InvalidDuration(String, String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("failed to write summary to {path}: {source}")]
    SummaryWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
