use crate::error::{ChunkerError, Result};
use serde::{Deserialize, Serialize};

/// Default window length in words
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default number of words shared with the previous window
pub const DEFAULT_OVERLAP: usize = 50;

/// Configuration for word-window chunking
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Number of words per chunk
    pub chunk_size: usize,

    /// Number of trailing words repeated at the start of the next chunk
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkerConfig {
    #[must_use]
    pub const fn new(chunk_size: usize, overlap: usize) -> Self {
        Self {
            chunk_size,
            overlap,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ChunkerError::invalid_config("chunk_size must be > 0"));
        }

        if self.chunk_size <= self.overlap {
            return Err(ChunkerError::invalid_config(format!(
                "chunk_size ({}) must exceed overlap ({})",
                self.chunk_size, self.overlap
            )));
        }

        Ok(())
    }

    /// Number of words the window start advances per chunk.
    ///
    /// Only meaningful after [`ChunkerConfig::validate`] succeeded.
    #[must_use]
    pub const fn step(&self) -> usize {
        self.chunk_size.saturating_sub(self.overlap)
    }
}
