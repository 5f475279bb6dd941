use crate::backend::EmbeddingBackend;
use crate::config::{EmbeddingConfig, RetryConfig};
use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const ERROR_BODY_PREVIEW: usize = 200;

fn build_http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| VectorStoreError::configuration(format!("Failed to build HTTP client: {e}")))
}

fn require_api_key(config: &EmbeddingConfig) -> Result<String> {
    config.validate()?;
    config.api_key().map(ToString::to_string).ok_or_else(|| {
        VectorStoreError::configuration(format!(
            "Missing credentials for the {} embedding backend",
            config.backend
        ))
    })
}

/// Whether a failed request is worth repeating
fn is_transient_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

fn preview(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    match trimmed.char_indices().nth(ERROR_BODY_PREVIEW) {
        Some((cut, _)) => format!("{}…", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

/// POST a JSON body with bearer auth, retrying transient failures with exponential backoff.
async fn post_json_with_retry<T: Serialize + ?Sized>(
    http: &Client,
    url: &str,
    api_key: &str,
    body: &T,
    retry: &RetryConfig,
) -> Result<Vec<u8>> {
    let mut attempt: u8 = 0;
    loop {
        let outcome = http
            .post(url)
            .header("Authorization", format!("Bearer {api_key}"))
            .json(body)
            .send()
            .await;

        let failure = match outcome {
            Ok(response) => {
                let status = response.status();
                let bytes = response.bytes().await.map_err(|e| {
                    VectorStoreError::backend(format!("Failed to read response from {url}: {e}"))
                })?;
                if status.is_success() {
                    return Ok(bytes.to_vec());
                }
                let err = VectorStoreError::backend(format!(
                    "{url} returned {status}: {}",
                    preview(&bytes)
                ));
                if !is_transient_status(status) {
                    return Err(err);
                }
                err
            }
            Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
                VectorStoreError::backend(format!("Request to {url} failed: {e}"))
            }
            Err(e) => {
                return Err(VectorStoreError::backend(format!(
                    "Request to {url} failed: {e}"
                )))
            }
        };

        if attempt >= retry.max_retries {
            return Err(failure);
        }
        attempt += 1;
        let delay = retry.delay_for(attempt);
        log::warn!(
            "Embedding request failed, retry {attempt}/{} in {delay:?}: {failure}",
            retry.max_retries
        );
        tokio::time::sleep(delay).await;
    }
}

fn ensure_count(vectors: &[Vec<f32>], expected: usize) -> Result<()> {
    if vectors.len() != expected {
        return Err(VectorStoreError::backend(format!(
            "Backend returned {} embeddings for {expected} inputs",
            vectors.len()
        )));
    }
    Ok(())
}

/// HuggingFace inference API (`pipeline/feature-extraction`)
pub struct HuggingFaceBackend {
    http: Client,
    endpoint: String,
    api_key: String,
    retry: RetryConfig,
}

#[derive(Serialize)]
struct FeatureExtractionRequest<'a> {
    inputs: &'a [String],
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FeatureExtractionResponse {
    Pooled(Vec<Vec<f32>>),
    Tokens(Vec<Vec<Vec<f32>>>),
}

impl HuggingFaceBackend {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = require_api_key(config)?;
        let endpoint = format!(
            "{}/pipeline/feature-extraction/{}",
            config.base_url(),
            config.model()
        );
        Ok(Self {
            http: build_http_client(config.timeout)?,
            endpoint,
            api_key,
            retry: config.retry.clone(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EmbeddingBackend for HuggingFaceBackend {
    fn name(&self) -> &str {
        "huggingface"
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = FeatureExtractionRequest { inputs: texts };
        let body = post_json_with_retry(
            &self.http,
            &self.endpoint,
            &self.api_key,
            &request,
            &self.retry,
        )
        .await?;
        parse_feature_extraction(&body, texts.len())
    }
}

/// Decode a feature-extraction payload. Token-level outputs are mean-pooled per input.
pub(crate) fn parse_feature_extraction(body: &[u8], expected: usize) -> Result<Vec<Vec<f32>>> {
    let parsed: FeatureExtractionResponse = serde_json::from_slice(body).map_err(|e| {
        VectorStoreError::backend(format!(
            "Malformed feature-extraction response ({e}): {}",
            preview(body)
        ))
    })?;

    let vectors = match parsed {
        FeatureExtractionResponse::Pooled(vectors) => vectors,
        FeatureExtractionResponse::Tokens(samples) => samples
            .into_iter()
            .map(|tokens| mean_pool_tokens(&tokens))
            .collect::<Result<Vec<_>>>()?,
    };
    ensure_count(&vectors, expected)?;
    Ok(vectors)
}

fn mean_pool_tokens(tokens: &[Vec<f32>]) -> Result<Vec<f32>> {
    let Some(first) = tokens.first() else {
        return Err(VectorStoreError::backend(
            "Feature-extraction returned an empty token sequence",
        ));
    };
    let hidden = first.len();
    let mut sum = vec![0.0f32; hidden];
    for token in tokens {
        if token.len() != hidden {
            return Err(VectorStoreError::backend(
                "Feature-extraction token vectors have inconsistent widths",
            ));
        }
        for (acc, value) in sum.iter_mut().zip(token) {
            *acc += value;
        }
    }
    #[allow(clippy::cast_precision_loss)]
    let count = tokens.len() as f32;
    for value in &mut sum {
        *value /= count;
    }
    Ok(sum)
}

/// Any OpenAI-compatible `/embeddings` endpoint (OpenAI, Groq, local gateways)
pub struct OpenAiBackend {
    http: Client,
    endpoint: String,
    model: String,
    api_key: String,
    retry: RetryConfig,
    name: &'static str,
}

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingsDatum>,
}

#[derive(Deserialize)]
struct EmbeddingsDatum {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiBackend {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = require_api_key(config)?;
        Ok(Self {
            http: build_http_client(config.timeout)?,
            endpoint: format!("{}/embeddings", config.base_url()),
            model: config.model().to_string(),
            api_key,
            retry: config.retry.clone(),
            name: config.backend.as_str(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl EmbeddingBackend for OpenAiBackend {
    fn name(&self) -> &str {
        self.name
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbeddingsRequest {
            model: &self.model,
            input: texts,
        };
        let body = post_json_with_retry(
            &self.http,
            &self.endpoint,
            &self.api_key,
            &request,
            &self.retry,
        )
        .await?;
        parse_embeddings_response(&body, texts.len())
    }
}

/// Decode an `/embeddings` payload, restoring input order from `data[].index`.
pub(crate) fn parse_embeddings_response(body: &[u8], expected: usize) -> Result<Vec<Vec<f32>>> {
    let parsed: EmbeddingsResponse = serde_json::from_slice(body).map_err(|e| {
        VectorStoreError::backend(format!(
            "Malformed embeddings response ({e}): {}",
            preview(body)
        ))
    })?;

    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    let returned = parsed.data.len();
    for datum in parsed.data {
        let slot = slots.get_mut(datum.index).ok_or_else(|| {
            VectorStoreError::backend(format!(
                "Embedding index {} out of range for {expected} inputs",
                datum.index
            ))
        })?;
        if slot.replace(datum.embedding).is_some() {
            return Err(VectorStoreError::backend(format!(
                "Duplicate embedding index {}",
                datum.index
            )));
        }
    }

    let vectors: Vec<Vec<f32>> = slots.into_iter().flatten().collect();
    if vectors.len() != expected {
        return Err(VectorStoreError::backend(format!(
            "Backend returned {returned} embeddings for {expected} inputs"
        )));
    }
    Ok(vectors)
}
