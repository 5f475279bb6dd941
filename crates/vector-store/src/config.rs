use crate::error::{Result, VectorStoreError};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BATCH_SIZE: usize = 16;
pub const DEFAULT_HASH_DIMENSION: usize = 384;
pub const DEFAULT_HF_MODEL: &str = "sentence-transformers/all-MiniLM-L6-v2";
pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_GROQ_MODEL: &str = "nomic-embed-text-v1_5";

const HF_BASE_URL: &str = "https://api-inference.huggingface.co";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Which embedding backend produces vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Deterministic local hashing, no network or model files
    Hash,
    /// HuggingFace inference API, feature-extraction pipeline
    HuggingFace,
    /// OpenAI `/embeddings` endpoint
    OpenAi,
    /// Groq's OpenAI-compatible `/embeddings` endpoint
    Groq,
    /// Local ONNX sentence-transformer
    Onnx,
}

impl BackendKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hash => "hash",
            Self::HuggingFace => "huggingface",
            Self::OpenAi => "openai",
            Self::Groq => "groq",
            Self::Onnx => "onnx",
        }
    }

    #[must_use]
    pub const fn is_remote(self) -> bool {
        matches!(self, Self::HuggingFace | Self::OpenAi | Self::Groq)
    }

    const fn default_model(self) -> Option<&'static str> {
        match self {
            Self::Hash => None,
            Self::HuggingFace | Self::Onnx => Some(DEFAULT_HF_MODEL),
            Self::OpenAi => Some(DEFAULT_OPENAI_MODEL),
            Self::Groq => Some(DEFAULT_GROQ_MODEL),
        }
    }

    const fn default_base_url(self) -> Option<&'static str> {
        match self {
            Self::HuggingFace => Some(HF_BASE_URL),
            Self::OpenAi => Some(OPENAI_BASE_URL),
            Self::Groq => Some(GROQ_BASE_URL),
            Self::Hash | Self::Onnx => None,
        }
    }

    const fn api_key_var(self) -> Option<&'static str> {
        match self {
            Self::HuggingFace => Some("HF_TOKEN"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Groq => Some("GROQ_API_KEY"),
            Self::Hash | Self::Onnx => None,
        }
    }
}

impl Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = VectorStoreError;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hash" | "stub" => Ok(Self::Hash),
            "huggingface" | "hf" => Ok(Self::HuggingFace),
            "openai" => Ok(Self::OpenAi),
            "groq" => Ok(Self::Groq),
            "onnx" | "local" => Ok(Self::Onnx),
            other => Err(VectorStoreError::configuration(format!(
                "Unsupported embedding backend '{other}' (expected hash, huggingface, openai, groq or onnx)"
            ))),
        }
    }
}

/// Bounded retry for transient backend failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u8,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub exponential_base: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            exponential_base: 2.0,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay to wait before retry number `attempt` (1-based)
    #[must_use]
    pub fn delay_for(&self, attempt: u8) -> Duration {
        let exponent = i32::from(attempt.saturating_sub(1));
        let secs = self.initial_delay.as_secs_f64() * self.exponential_base.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs)
    }
}

/// Embedding backend selection and tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub backend: BackendKind,

    /// Model identifier sent to remote APIs, or the ONNX model directory name
    pub model: Option<String>,

    /// Override for the remote API base URL
    pub base_url: Option<String>,

    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Texts per backend request
    pub batch_size: usize,

    /// Output dimension of the hash backend
    pub dimension: usize,

    /// Directory holding `<model>/model.onnx` and `<model>/tokenizer.json`
    pub model_dir: PathBuf,

    /// Per-request timeout for remote backends
    pub timeout: Duration,

    pub retry: RetryConfig,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Hash,
            model: None,
            base_url: None,
            api_key: None,
            batch_size: DEFAULT_BATCH_SIZE,
            dimension: DEFAULT_HASH_DIMENSION,
            model_dir: PathBuf::from("models"),
            timeout: Duration::from_secs(60),
            retry: RetryConfig::default(),
        }
    }
}

impl EmbeddingConfig {
    #[must_use]
    pub fn new(backend: BackendKind) -> Self {
        Self {
            backend,
            ..Self::default()
        }
    }

    /// Resolve configuration from `DOCBRIEF_*` variables and provider credentials.
    pub fn from_env() -> Result<Self> {
        let backend = match env::var("DOCBRIEF_EMBEDDING_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => BackendKind::Hash,
        };

        let mut config = Self::new(backend);
        config.model = env::var("DOCBRIEF_EMBEDDING_MODEL").ok();
        config.base_url = env::var("DOCBRIEF_EMBEDDING_URL").ok();
        if let Ok(raw) = env::var("DOCBRIEF_EMBEDDING_BATCH") {
            config.batch_size = parse_env_number("DOCBRIEF_EMBEDDING_BATCH", &raw)?;
        }
        if let Ok(raw) = env::var("DOCBRIEF_EMBEDDING_DIM") {
            config.dimension = parse_env_number("DOCBRIEF_EMBEDDING_DIM", &raw)?;
        }
        if let Ok(path) = env::var("DOCBRIEF_MODEL_DIR") {
            config.model_dir = PathBuf::from(path);
        }
        config.api_key = backend.api_key_var().and_then(|var| env::var(var).ok());
        Ok(config)
    }

    /// Switch backend and pick up that provider's credential from the environment.
    pub fn set_backend(&mut self, backend: BackendKind) {
        if self.backend == backend {
            return;
        }
        self.backend = backend;
        self.api_key = backend.api_key_var().and_then(|var| env::var(var).ok());
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(VectorStoreError::configuration("batch_size must be > 0"));
        }
        if self.backend == BackendKind::Hash && self.dimension == 0 {
            return Err(VectorStoreError::configuration(
                "hash backend dimension must be > 0",
            ));
        }
        if self.backend.is_remote() && self.api_key().is_none() {
            let var = self.backend.api_key_var().unwrap_or("api_key");
            return Err(VectorStoreError::configuration(format!(
                "Missing credentials for the {} embedding backend (set {var})",
                self.backend
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .or_else(|| self.backend.default_model())
            .unwrap_or("hash")
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base_url
            .as_deref()
            .or_else(|| self.backend.default_base_url())
            .unwrap_or_default()
            .trim_end_matches('/')
    }

    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|key| !key.trim().is_empty())
    }
}

fn parse_env_number(var: &str, raw: &str) -> Result<usize> {
    raw.trim().parse::<usize>().map_err(|e| {
        VectorStoreError::configuration(format!("Invalid {var} '{raw}': {e}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_aliases() {
        assert_eq!("HF".parse::<BackendKind>().unwrap(), BackendKind::HuggingFace);
        assert_eq!("stub".parse::<BackendKind>().unwrap(), BackendKind::Hash);
        assert_eq!(" groq ".parse::<BackendKind>().unwrap(), BackendKind::Groq);
        assert!("faiss".parse::<BackendKind>().is_err());
    }

    #[test]
    fn remote_backend_requires_credentials() {
        let mut config = EmbeddingConfig::new(BackendKind::OpenAi);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("OPENAI_API_KEY"), "{err}");

        config.api_key = Some("   ".to_string());
        assert!(config.validate().is_err());

        config.api_key = Some("sk-test".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_batch_size_is_rejected() {
        let config = EmbeddingConfig {
            batch_size: 0,
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(VectorStoreError::Configuration(_))
        ));
    }

    #[test]
    fn defaults_resolve_per_backend() {
        let hf = EmbeddingConfig::new(BackendKind::HuggingFace);
        assert_eq!(hf.model(), DEFAULT_HF_MODEL);
        assert_eq!(hf.base_url(), HF_BASE_URL);

        let custom = EmbeddingConfig {
            base_url: Some("http://localhost:8080/v1/".to_string()),
            model: Some("bge-small".to_string()),
            ..EmbeddingConfig::new(BackendKind::OpenAi)
        };
        assert_eq!(custom.base_url(), "http://localhost:8080/v1");
        assert_eq!(custom.model(), "bge-small");
    }

    #[test]
    fn retry_delay_grows_and_caps() {
        let retry = RetryConfig {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            exponential_base: 2.0,
        };
        assert_eq!(retry.delay_for(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for(3), Duration::from_millis(350));
    }
}
