use crate::error::{Result, VectorStoreError};
use serde::{Deserialize, Serialize};

pub const TEXT_STORE_SCHEMA_VERSION: u32 = 1;

/// Chunk texts in insertion order, position-aligned with the vector index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextStore {
    texts: Vec<String>,
}

#[derive(Serialize)]
struct PersistedTextsRef<'a> {
    schema_version: u32,
    texts: &'a [String],
}

#[derive(Deserialize)]
struct PersistedTexts {
    schema_version: u32,
    texts: Vec<String>,
}

impl TextStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append<I, S>(&mut self, texts: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.texts.extend(texts.into_iter().map(Into::into));
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.texts.truncate(len);
    }

    #[must_use]
    pub fn get(&self, position: usize) -> Option<&str> {
        self.texts.get(position).map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.texts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.texts.iter().map(String::as_str)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let persisted = PersistedTextsRef {
            schema_version: TEXT_STORE_SCHEMA_VERSION,
            texts: &self.texts,
        };
        Ok(serde_json::to_vec(&persisted)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let persisted: PersistedTexts = serde_json::from_slice(bytes)
            .map_err(|e| VectorStoreError::corrupt(format!("text snapshot: {e}")))?;
        if persisted.schema_version != TEXT_STORE_SCHEMA_VERSION {
            return Err(VectorStoreError::corrupt(format!(
                "Unsupported text snapshot schema_version {} (expected {TEXT_STORE_SCHEMA_VERSION})",
                persisted.schema_version
            )));
        }
        Ok(Self {
            texts: persisted.texts,
        })
    }
}
