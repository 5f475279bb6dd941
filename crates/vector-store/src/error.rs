use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Embedding backend error: {0}")]
    EmbeddingBackend(String),

    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl VectorStoreError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::EmbeddingBackend(msg.into())
    }

    pub fn corrupt(msg: impl Into<String>) -> Self {
        Self::CorruptSnapshot(msg.into())
    }
}

impl From<docbrief_chunker::ChunkerError> for VectorStoreError {
    fn from(err: docbrief_chunker::ChunkerError) -> Self {
        Self::Configuration(err.to_string())
    }
}
