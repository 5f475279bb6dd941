//! # Docbrief Chunker
//!
//! Splits extracted document text into overlapping word windows ready for
//! embedding.
//!
//! ## Windowing
//!
//! ```text
//! words:   w0 w1 w2 w3 w4 w5 w6 w7 w8 w9
//!          └──── chunk 0 ────┘
//!                      └──── chunk 1 ────┘   (chunk_size = 6, overlap = 2)
//! ```
//!
//! The window start advances by `chunk_size - overlap` words until it reaches
//! the end of the document, so the last window may be shorter.
//!
//! ## Example
//!
//! ```rust
//! use docbrief_chunker::{Chunker, ChunkerConfig};
//!
//! let chunker = Chunker::new(ChunkerConfig::new(4, 1)).unwrap();
//! let chunks = chunker.chunk("one two three four five six seven");
//! assert_eq!(chunks, vec!["one two three four", "four five six seven", "seven"]);
//! ```

mod chunker;
mod config;
mod error;
mod types;

pub use chunker::{chunk_text, Chunker};
pub use config::{ChunkerConfig, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP};
pub use error::{ChunkerError, Result};
pub use types::ChunkSpan;
