use serde::{Deserialize, Serialize};

/// A window of words cut from a document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Index of the first word (0-indexed)
    pub start_word: usize,

    /// Index one past the last word
    pub end_word: usize,

    /// Words of the window joined by single spaces
    pub text: String,
}

impl ChunkSpan {
    /// Get the number of words in this chunk
    #[must_use]
    pub const fn word_count(&self) -> usize {
        self.end_word.saturating_sub(self.start_word)
    }

    /// Check if chunk covers a specific word offset
    #[must_use]
    pub const fn contains_word(&self, word: usize) -> bool {
        word >= self.start_word && word < self.end_word
    }
}

impl From<ChunkSpan> for String {
    fn from(span: ChunkSpan) -> Self {
        span.text
    }
}
