use crate::backend::{normalize, EmbeddingBackend};
use crate::config::EmbeddingConfig;
use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use ndarray::{Array2, ArrayD, ArrayView1, ArrayView2, Axis, Ix2, Ix3};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::{builder::GraphOptimizationLevel, Session, SessionInputs};
use ort::value::{DynTensor, Tensor};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokenizers::{Encoding, PaddingParams, PaddingStrategy, Tokenizer, TruncationParams};
use tokio::task::spawn_blocking;

const MODEL_FILE: &str = "model.onnx";
const TOKENIZER_FILE: &str = "tokenizer.json";
const MAX_SEQUENCE_LENGTH: usize = 256;

/// Local sentence-transformer running on ONNX Runtime (CPU).
///
/// Expects `<model_dir>/<model>/model.onnx` and `<model_dir>/<model>/tokenizer.json`, where
/// `<model>` is the configured model id with `/` replaced by `__`.
pub struct OnnxBackend {
    inner: Arc<OnnxSession>,
}

struct OnnxSession {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    max_length: usize,
}

impl OnnxBackend {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let model_path = model_path(&config.model_dir, config.model());
        let onnx_path = model_path.join(MODEL_FILE);
        let tokenizer_path = model_path.join(TOKENIZER_FILE);
        if !onnx_path.exists() || !tokenizer_path.exists() {
            return Err(VectorStoreError::configuration(format!(
                "Model files for '{}' are missing. Expected ONNX at {} and tokenizer at {}.",
                config.model(),
                onnx_path.display(),
                tokenizer_path.display(),
            )));
        }

        if !tokenizers::utils::parallelism::is_parallelism_configured() {
            tokenizers::utils::parallelism::set_parallelism(false);
        }

        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| VectorStoreError::configuration(format!("Tokenizer load failed: {e}")))?;
        tokenizer.with_padding(Some(PaddingParams {
            strategy: PaddingStrategy::BatchLongest,
            ..PaddingParams::default()
        }));
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_LENGTH,
                ..TruncationParams::default()
            }))
            .map_err(|e| {
                VectorStoreError::configuration(format!("Tokenizer truncation failed: {e}"))
            })?;

        let threads = std::thread::available_parallelism()
            .map(|n| n.get().min(4))
            .unwrap_or(1);
        let session = Session::builder()
            .map_err(|e| VectorStoreError::configuration(format!("{e}")))?
            .with_intra_threads(threads)
            .map_err(|e| {
                VectorStoreError::configuration(format!("Failed to set ORT intra threads: {e}"))
            })?
            .with_execution_providers(vec![CPUExecutionProvider::default().build()])
            .map_err(|e| {
                VectorStoreError::configuration(format!(
                    "Failed to register CPU execution provider: {e}"
                ))
            })?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                VectorStoreError::configuration(format!("Failed to set optimization level: {e}"))
            })?
            .commit_from_file(&onnx_path)
            .map_err(|e| {
                VectorStoreError::configuration(format!("Failed to load ONNX model: {e}"))
            })?;

        log::info!(
            "Loaded ONNX model '{}' from {} ({threads} threads)",
            config.model(),
            onnx_path.display()
        );

        Ok(Self {
            inner: Arc::new(OnnxSession {
                session: Mutex::new(session),
                tokenizer,
                max_length: MAX_SEQUENCE_LENGTH,
            }),
        })
    }
}

#[async_trait]
impl EmbeddingBackend for OnnxBackend {
    fn name(&self) -> &str {
        "onnx"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let inner = self.inner.clone();
        let owned = texts.to_vec();
        spawn_blocking(move || inner.embed_blocking(&owned))
            .await
            .map_err(|e| VectorStoreError::backend(format!("Join error: {e}")))?
    }
}

impl OnnxSession {
    fn embed_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| VectorStoreError::backend(format!("Tokenization failed: {e}")))?;

        let seq_len = encodings.first().map_or(0, Encoding::len);
        if seq_len == 0 || seq_len > self.max_length {
            return Err(VectorStoreError::backend(format!(
                "Tokenized length {seq_len} outside 1..={}",
                self.max_length
            )));
        }
        if encodings.iter().any(|e| e.len() != seq_len) {
            return Err(VectorStoreError::backend(
                "Inconsistent sequence lengths after padding",
            ));
        }
        let batch = BatchTensors::from_encodings(&encodings, seq_len);
        let mask = batch.attention_mask.clone();

        let mut available: HashMap<String, DynTensor> = HashMap::new();
        available.insert("input_ids".to_string(), to_tensor(batch.input_ids)?);
        available.insert("attention_mask".to_string(), to_tensor(batch.attention_mask)?);
        available.insert("token_type_ids".to_string(), to_tensor(batch.token_type_ids)?);

        let array = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| VectorStoreError::backend("Failed to lock ONNX session"))?;

            let mut feed: HashMap<String, DynTensor> = HashMap::new();
            for input in &session.inputs {
                let value = available.remove(&input.name).ok_or_else(|| {
                    VectorStoreError::backend(format!("Unsupported ONNX input '{}'", input.name))
                })?;
                feed.insert(input.name.clone(), value);
            }

            let outputs = session
                .run(SessionInputs::from(feed))
                .map_err(|e| VectorStoreError::backend(format!("ONNX forward failed: {e}")))?;
            if outputs.len() == 0 {
                return Err(VectorStoreError::backend("ONNX returned no outputs"));
            }

            let array = outputs[0]
                .try_extract_array::<f32>()
                .map_err(|e| {
                    VectorStoreError::backend(format!("Failed to decode ONNX output: {e}"))
                })?
                .to_owned();

            drop(outputs);
            drop(session);

            array
        };

        embeddings_from_output(array, mask.view())
    }
}

fn model_path(model_dir: &Path, model_id: &str) -> PathBuf {
    model_dir.join(model_id.trim().replace('/', "__"))
}

fn to_tensor(array: Array2<i64>) -> Result<DynTensor> {
    Ok(Tensor::from_array(array.into_dyn())
        .map_err(|e| VectorStoreError::backend(format!("{e}")))?
        .upcast())
}

/// Token-level inputs for one padded batch
struct BatchTensors {
    input_ids: Array2<i64>,
    attention_mask: Array2<i64>,
    token_type_ids: Array2<i64>,
}

impl BatchTensors {
    fn from_encodings(encodings: &[Encoding], seq_len: usize) -> Self {
        let shape = (encodings.len(), seq_len);
        let column = |field: fn(&Encoding) -> &[u32]| {
            Array2::from_shape_fn(shape, |(row, col)| {
                field(&encodings[row]).get(col).copied().map_or(0, i64::from)
            })
        };
        Self {
            input_ids: column(Encoding::get_ids),
            attention_mask: column(Encoding::get_attention_mask),
            token_type_ids: column(Encoding::get_type_ids),
        }
    }
}

/// Sentence embeddings from either pooled `[batch, hidden]` or token-level
/// `[batch, tokens, hidden]` output.
fn embeddings_from_output(
    array: ArrayD<f32>,
    mask: ArrayView2<'_, i64>,
) -> Result<Vec<Vec<f32>>> {
    let shape_err =
        |e: ndarray::ShapeError| VectorStoreError::backend(format!("Bad output shape: {e}"));
    let mut out = match array.ndim() {
        2 => array
            .into_dimensionality::<Ix2>()
            .map_err(shape_err)?
            .outer_iter()
            .map(|row| row.to_vec())
            .collect::<Vec<_>>(),
        3 => {
            let hidden = array.into_dimensionality::<Ix3>().map_err(shape_err)?;
            if hidden.len_of(Axis(0)) != mask.nrows() {
                return Err(VectorStoreError::backend(format!(
                    "ONNX returned {} rows for a batch of {}",
                    hidden.len_of(Axis(0)),
                    mask.nrows()
                )));
            }
            hidden
                .outer_iter()
                .zip(mask.outer_iter())
                .map(|(tokens, row_mask)| mean_pool(tokens, row_mask))
                .collect()
        }
        _ => {
            return Err(VectorStoreError::backend(format!(
                "Unexpected ONNX output dims: {:?}",
                array.shape()
            )))
        }
    };
    for embedding in &mut out {
        normalize(embedding);
    }
    Ok(out)
}

/// Average of the token vectors whose mask is set
fn mean_pool(tokens: ArrayView2<'_, f32>, mask: ArrayView1<'_, i64>) -> Vec<f32> {
    let mut sum = vec![0.0f32; tokens.ncols()];
    let mut kept = 0usize;
    for (token, _) in tokens.outer_iter().zip(mask.iter()).filter(|(_, m)| **m != 0) {
        kept += 1;
        for (acc, value) in sum.iter_mut().zip(token.iter()) {
            *acc += value;
        }
    }
    if kept > 0 {
        #[allow(clippy::cast_precision_loss)]
        let n = kept as f32;
        sum.iter_mut().for_each(|v| *v /= n);
    }
    sum
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn mean_pool_skips_padding_tokens() {
        let sample = array![[1.0f32, 2.0], [3.0, 4.0], [100.0, 100.0]];
        let pooled = mean_pool(sample.view(), array![1i64, 1, 0].view());
        assert_eq!(pooled, vec![2.0, 3.0]);
    }

    #[test]
    fn token_level_output_is_pooled_and_normalized() {
        let hidden = array![[[3.0f32, 0.0], [3.0, 0.0]], [[0.0, 2.0], [0.0, 0.0]]].into_dyn();
        let mask = array![[1i64, 1], [1, 0]];
        let out = embeddings_from_output(hidden, mask.view()).unwrap();
        assert_eq!(out, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn model_ids_map_to_flat_directories() {
        let path = model_path(Path::new("models"), "sentence-transformers/all-MiniLM-L6-v2");
        assert_eq!(
            path,
            PathBuf::from("models/sentence-transformers__all-MiniLM-L6-v2")
        );
    }

    #[test]
    fn missing_model_files_are_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = EmbeddingConfig {
            model_dir: dir.path().to_path_buf(),
            ..EmbeddingConfig::new(crate::config::BackendKind::Onnx)
        };
        assert!(matches!(
            OnnxBackend::new(&config),
            Err(VectorStoreError::Configuration(_))
        ));
    }
}
