use crate::config::ChunkerConfig;
use crate::error::Result;
use crate::types::ChunkSpan;

/// Word-window chunker for embedding input
#[derive(Debug, Clone, Copy)]
pub struct Chunker {
    config: ChunkerConfig,
}

impl Chunker {
    /// Create a new chunker, rejecting windows that cannot advance
    pub fn new(config: ChunkerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    #[must_use]
    pub const fn config(&self) -> &ChunkerConfig {
        &self.config
    }

    /// Chunk text into window strings, in document order
    #[must_use]
    pub fn chunk(&self, text: &str) -> Vec<String> {
        self.chunk_spans(text).into_iter().map(String::from).collect()
    }

    /// Chunk text and keep the word offsets of every window
    #[must_use]
    pub fn chunk_spans(&self, text: &str) -> Vec<ChunkSpan> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let step = self.config.step();
        let mut spans = Vec::with_capacity(words.len() / step + 1);
        let mut start = 0;

        while start < words.len() {
            let end = (start + self.config.chunk_size).min(words.len());
            let joined = words[start..end].join(" ");
            if !joined.trim().is_empty() {
                spans.push(ChunkSpan {
                    start_word: start,
                    end_word: end,
                    text: joined,
                });
            }
            start += step;
        }

        log::debug!(
            "Chunked {} words into {} chunks (size {}, overlap {})",
            words.len(),
            spans.len(),
            self.config.chunk_size,
            self.config.overlap
        );
        spans
    }
}

/// Split `text` into overlapping windows of `chunk_size` words.
///
/// Fails with [`crate::ChunkerError::InvalidConfig`] when `chunk_size <= overlap`.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    let chunker = Chunker::new(ChunkerConfig::new(chunk_size, overlap))?;
    Ok(chunker.chunk(text))
}
