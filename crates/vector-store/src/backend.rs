use crate::error::Result;
use async_trait::async_trait;

/// A source of embedding vectors.
///
/// Implementations receive one bounded batch at a time and must return exactly one vector per
/// input, in input order, all of the same dimensionality. Any failure (transport, auth, quota,
/// malformed payload) is reported as [`crate::VectorStoreError::EmbeddingBackend`].
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Short identifier used in logs
    fn name(&self) -> &str;

    /// Dimensionality, when known before the first call
    fn dimension_hint(&self) -> Option<usize> {
        None
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Deterministic local backend: hashes each text into a unit vector.
///
/// Identical texts always map to identical vectors, which makes it suitable for offline runs
/// and reproducible tests. It carries no semantic similarity.
#[derive(Clone, Debug)]
pub struct HashBackend {
    dimension: usize,
}

impl HashBackend {
    #[must_use]
    pub const fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl EmbeddingBackend for HashBackend {
    fn name(&self) -> &str {
        "hash"
    }

    fn dimension_hint(&self) -> Option<usize> {
        Some(self.dimension)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| hash_embed(text, self.dimension))
            .collect())
    }
}

pub(crate) fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vec {
        *value /= norm;
    }
}

fn hash_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let high = (bits >> 32) as u32;
        let mantissa = high >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hash_backend_is_deterministic_and_unit_length() {
        let backend = HashBackend::new(32);
        let texts = vec!["alpha".to_string(), "beta".to_string(), "alpha".to_string()];
        let vectors = backend.embed_batch(&texts).await.unwrap();

        assert_eq!(vectors.len(), 3);
        assert_eq!(vectors[0], vectors[2]);
        assert_ne!(vectors[0], vectors[1]);
        for vector in &vectors {
            assert_eq!(vector.len(), 32);
            let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-4);
        }
    }

    #[test]
    fn normalize_leaves_zero_vector_untouched() {
        let mut zero = vec![0.0f32; 4];
        normalize(&mut zero);
        assert_eq!(zero, vec![0.0; 4]);
    }
}
