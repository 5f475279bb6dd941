//! # Docbrief Vector Store
//!
//! Embedding cache and exact nearest-neighbour retrieval for document chunks.
//!
//! ## Features
//!
//! - **Pluggable embeddings**: offline hash backend, Hugging Face inference, OpenAI-compatible
//!   APIs (OpenAI, Groq) and local ONNX models
//! - **Exact search** by squared Euclidean distance over a flat index
//! - **Durable snapshots** written atomically next to each other
//! - **Concurrent access**: parallel searches, serialized writers
//!
//! ## Architecture
//!
//! ```text
//! texts[]
//!     │
//!     ├──> EmbeddingClient (batched)
//!     │      └─> EmbeddingBackend::embed_batch
//!     │
//!     ├──> FlatIndex  ──┐
//!     │                 ├─> position-aligned
//!     ├──> TextStore  ──┘
//!     │
//!     └──> Snapshot (index.bin + texts.json)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use docbrief_vector_store::{EmbeddingClient, EmbeddingConfig, VectorStore};
//!
//! #[tokio::main]
//! async fn main() -> docbrief_vector_store::Result<()> {
//!     let client = EmbeddingClient::from_config(&EmbeddingConfig::from_env()?)?;
//!     let store = VectorStore::open(".docbrief", client).await;
//!
//!     store
//!         .add_texts(vec!["Q3 revenue grew 12%".to_string()])
//!         .await?;
//!
//!     for hit in store.search_with_scores("revenue", 3).await? {
//!         println!("{:.3}  {}", hit.distance, hit.text);
//!     }
//!     Ok(())
//! }
//! ```

mod backend;
mod client;
mod config;
mod error;
mod flat_index;
mod onnx;
mod remote;
mod snapshot;
mod store;
mod text_store;
mod types;

pub use backend::{EmbeddingBackend, HashBackend};
pub use client::EmbeddingClient;
pub use config::{
    BackendKind, EmbeddingConfig, RetryConfig, DEFAULT_BATCH_SIZE, DEFAULT_HASH_DIMENSION,
};
pub use error::{Result, VectorStoreError};
pub use flat_index::{squared_l2, FlatIndex};
pub use onnx::OnnxBackend;
pub use remote::{HuggingFaceBackend, OpenAiBackend};
pub use snapshot::{SnapshotPaths, INDEX_FILE_NAME, TEXTS_FILE_NAME};
pub use store::VectorStore;
pub use text_store::TextStore;
pub use types::{AddOutcome, SearchHit, SnapshotStatus, StoreState};
