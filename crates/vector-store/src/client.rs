use crate::backend::{EmbeddingBackend, HashBackend};
use crate::config::{BackendKind, EmbeddingConfig, DEFAULT_BATCH_SIZE};
use crate::error::{Result, VectorStoreError};
use crate::onnx::OnnxBackend;
use crate::remote::{HuggingFaceBackend, OpenAiBackend};
use once_cell::sync::OnceCell;
use std::sync::Arc;

/// Batching front-end over an [`EmbeddingBackend`].
///
/// Splits input into bounded batches, validates every backend response and guarantees one
/// vector per input in input order. The dimensionality seen on the first successful call is
/// remembered and enforced on later calls.
pub struct EmbeddingClient {
    backend: Arc<dyn EmbeddingBackend>,
    batch_size: usize,
    dimension: OnceCell<usize>,
}

impl EmbeddingClient {
    pub fn new(backend: Arc<dyn EmbeddingBackend>, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(VectorStoreError::configuration("batch_size must be > 0"));
        }
        Ok(Self {
            backend,
            batch_size,
            dimension: OnceCell::new(),
        })
    }

    /// Build the backend named by `config`.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        config.validate()?;
        let backend: Arc<dyn EmbeddingBackend> = match config.backend {
            BackendKind::Hash => Arc::new(HashBackend::new(config.dimension)),
            BackendKind::HuggingFace => Arc::new(HuggingFaceBackend::new(config)?),
            BackendKind::OpenAi | BackendKind::Groq => Arc::new(OpenAiBackend::new(config)?),
            BackendKind::Onnx => Arc::new(OnnxBackend::new(config)?),
        };
        log::info!(
            "Embedding backend '{}' (model {}, batch {})",
            backend.name(),
            config.model(),
            config.batch_size
        );
        Self::new(backend, config.batch_size)
    }

    /// Hash backend with the default batch size, for offline use
    #[must_use]
    pub fn hashing(dimension: usize) -> Self {
        Self {
            backend: Arc::new(HashBackend::new(dimension)),
            batch_size: DEFAULT_BATCH_SIZE,
            dimension: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    #[must_use]
    pub const fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Dimensionality observed so far (or advertised by the backend)
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
            .get()
            .copied()
            .or_else(|| self.backend.dimension_hint())
    }

    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| VectorStoreError::backend("Empty embedding result"))
    }

    /// Embed all `texts`; either every batch succeeds or nothing is returned.
    pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut expected_dim = self.dimension.get().copied();
        let mut out = Vec::with_capacity(texts.len());
        for (batch_no, batch) in texts.chunks(self.batch_size).enumerate() {
            let vectors = self.backend.embed_batch(batch).await.map_err(|err| match err {
                VectorStoreError::EmbeddingBackend(msg) => VectorStoreError::backend(format!(
                    "{} batch {batch_no}: {msg}",
                    self.backend.name()
                )),
                other => other,
            })?;

            if vectors.len() != batch.len() {
                return Err(VectorStoreError::backend(format!(
                    "{} returned {} embeddings for a batch of {}",
                    self.backend.name(),
                    vectors.len(),
                    batch.len()
                )));
            }

            for vector in vectors {
                let dim = *expected_dim.get_or_insert(vector.len());
                if vector.is_empty() || vector.len() != dim {
                    return Err(VectorStoreError::backend(format!(
                        "{} returned a {}-dimensional embedding, expected {dim}",
                        self.backend.name(),
                        vector.len()
                    )));
                }
                out.push(vector);
            }
        }

        if let Some(dim) = expected_dim {
            let _ = self.dimension.set(dim);
        }
        log::debug!(
            "Embedded {} texts in {} batches",
            texts.len(),
            texts.len().div_ceil(self.batch_size)
        );
        Ok(out)
    }
}
