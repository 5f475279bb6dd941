use crate::error::{Result, VectorStoreError};
use std::cmp::Ordering;

const SNAPSHOT_MAGIC: &[u8; 4] = b"DBX1";
const HEADER_LEN: usize = 4 + 4 + 8;

/// Exact nearest-neighbour index over squared Euclidean distance.
///
/// Vectors are stored contiguously in insertion order; a vector's position is its id. The
/// dimensionality is fixed by the first non-empty [`FlatIndex::add`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatIndex {
    dimension: Option<usize>,
    data: Vec<f32>,
    len: usize,
}

impl FlatIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append vectors. The whole batch is validated before anything is stored.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<()> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        let expected = self.dimension.unwrap_or(first.len());
        if expected == 0 {
            return Err(VectorStoreError::DimensionMismatch {
                expected: 1,
                actual: 0,
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(VectorStoreError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        self.dimension = Some(expected);
        self.data.reserve(vectors.len() * expected);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        self.len += vectors.len();
        Ok(())
    }

    /// Up to `k` `(position, squared distance)` pairs, nearest first.
    ///
    /// Equal distances are ordered by position.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if k == 0 || self.len == 0 {
            return Ok(Vec::new());
        }
        if query.len() != dimension {
            return Err(VectorStoreError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        // Brute-force scan (O(n), exact)
        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(dimension)
            .enumerate()
            .map(|(position, vector)| (position, squared_l2(query, vector)))
            .collect();

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }

    /// Vector stored at `position`
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&[f32]> {
        let dimension = self.dimension?;
        if position >= self.len {
            return None;
        }
        let start = position * dimension;
        self.data.get(start..start + dimension)
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fixed dimensionality, `None` until the first vector arrives
    #[must_use]
    pub const fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Binary snapshot: magic, `u32` dimension, `u64` count, little-endian `f32` payload.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        out.extend_from_slice(SNAPSHOT_MAGIC);
        #[allow(clippy::cast_possible_truncation)]
        let dim = self.dimension.unwrap_or(0) as u32;
        out.extend_from_slice(&dim.to_le_bytes());
        out.extend_from_slice(&(self.len as u64).to_le_bytes());
        for value in &self.data {
            out.extend_from_slice(&value.to_le_bytes());
        }
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN || &bytes[0..4] != SNAPSHOT_MAGIC {
            return Err(VectorStoreError::corrupt("index snapshot header is invalid"));
        }
        let dim = u32::from_le_bytes(read_array(&bytes[4..8])?) as usize;
        let count = usize::try_from(u64::from_le_bytes(read_array(&bytes[8..16])?))
            .map_err(|_| VectorStoreError::corrupt("index snapshot count overflows usize"))?;

        if count == 0 || dim == 0 {
            if count != 0 || bytes.len() != HEADER_LEN {
                return Err(VectorStoreError::corrupt(
                    "index snapshot header does not match its payload",
                ));
            }
            // An empty index has no dimension yet, whatever the header says
            return Ok(Self::new());
        }

        let expected_len = count
            .checked_mul(dim)
            .and_then(|n| n.checked_mul(4))
            .and_then(|n| n.checked_add(HEADER_LEN))
            .ok_or_else(|| VectorStoreError::corrupt("index snapshot size overflows"))?;
        if bytes.len() != expected_len {
            return Err(VectorStoreError::corrupt(format!(
                "index snapshot is {} bytes, expected {expected_len} for {count} x {dim}",
                bytes.len()
            )));
        }

        let mut data = Vec::with_capacity(count * dim);
        for raw in bytes[HEADER_LEN..].chunks_exact(4) {
            data.push(f32::from_le_bytes(read_array(raw)?));
        }

        Ok(Self {
            dimension: Some(dim),
            data,
            len: count,
        })
    }
}

fn read_array<const N: usize>(bytes: &[u8]) -> Result<[u8; N]> {
    bytes
        .try_into()
        .map_err(|_| VectorStoreError::corrupt("index snapshot is truncated"))
}

#[must_use]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_and_search() {
        let mut index = FlatIndex::new();

        index
            .add(&[vec![1.0, 0.0, 0.0], vec![0.9, 0.1, 0.0], vec![0.0, 1.0, 0.0]])
            .unwrap();

        assert_eq!(index.len(), 3);
        assert_eq!(index.dimension(), Some(3));

        // Search for nearest to [1, 0, 0]
        let results = index.search(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);

        // First result should be id=0 (exact match)
        assert_eq!(results[0].0, 0);
        assert!(results[0].1.abs() < 1e-6);

        // Second should be id=1 (close)
        assert_eq!(results[1].0, 1);
        assert!((results[1].1 - 0.02).abs() < 1e-6);
    }

    #[test]
    fn test_dimension_fixed_by_first_add() {
        let mut index = FlatIndex::new();
        index.add(&[vec![1.0, 0.0]]).unwrap();

        let err = index.add(&[vec![1.0, 0.0, 0.0]]).unwrap_err();
        assert!(matches!(
            err,
            VectorStoreError::DimensionMismatch {
                expected: 2,
                actual: 3
            }
        ));

        let err = index.search(&[1.0], 1).unwrap_err();
        assert!(matches!(err, VectorStoreError::DimensionMismatch { .. }));
    }

    #[test]
    fn test_rejected_batch_leaves_index_unchanged() {
        let mut index = FlatIndex::new();
        index.add(&[vec![1.0, 1.0]]).unwrap();
        let before = index.clone();

        assert!(index.add(&[vec![2.0, 2.0], vec![3.0]]).is_err());
        assert_eq!(index, before);

        let mut fresh = FlatIndex::new();
        assert!(fresh.add(&[vec![1.0], vec![1.0, 2.0]]).is_err());
        assert_eq!(fresh.dimension(), None);
        assert!(fresh.is_empty());
    }

    #[test]
    fn test_empty_cases() {
        let mut index = FlatIndex::new();
        assert!(index.search(&[1.0, 2.0], 5).unwrap().is_empty());

        index.add(&[]).unwrap();
        assert_eq!(index.dimension(), None);

        index.add(&[vec![0.0, 0.0]]).unwrap();
        assert!(index.search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn test_k_larger_than_len_returns_all_sorted() {
        let mut index = FlatIndex::new();
        index
            .add(&[vec![5.0], vec![1.0], vec![3.0], vec![1.0]])
            .unwrap();

        let results = index.search(&[0.0], 10).unwrap();
        let positions: Vec<usize> = results.iter().map(|r| r.0).collect();
        assert_eq!(positions, vec![1, 3, 2, 0]);
        assert!(results.windows(2).all(|w| w[0].1 <= w[1].1));
    }

    #[test]
    fn test_snapshot_roundtrip() {
        let mut index = FlatIndex::new();
        index.add(&[vec![0.25, -1.5], vec![3.0, 4.0]]).unwrap();

        let decoded = FlatIndex::decode(&index.encode()).unwrap();
        assert_eq!(decoded, index);
        assert_eq!(decoded.get(1), Some(&[3.0f32, 4.0][..]));
        assert_eq!(decoded.get(2), None);

        let empty = FlatIndex::decode(&FlatIndex::new().encode()).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_decode_zero_count_leaves_dimension_unset() {
        let mut header = SNAPSHOT_MAGIC.to_vec();
        header.extend_from_slice(&384u32.to_le_bytes());
        header.extend_from_slice(&0u64.to_le_bytes());

        let decoded = FlatIndex::decode(&header).unwrap();
        assert!(decoded.is_empty());
        assert_eq!(decoded.dimension(), None);

        header.extend_from_slice(&1.0f32.to_le_bytes());
        assert!(FlatIndex::decode(&header).is_err());
    }

    #[test]
    fn test_decode_rejects_damage() {
        let mut index = FlatIndex::new();
        index.add(&[vec![1.0, 2.0]]).unwrap();
        let bytes = index.encode();

        assert!(FlatIndex::decode(&bytes[..bytes.len() - 1]).is_err());
        assert!(FlatIndex::decode(&[]).is_err());

        let mut bad_magic = bytes.clone();
        bad_magic[0] = b'X';
        assert!(matches!(
            FlatIndex::decode(&bad_magic),
            Err(VectorStoreError::CorruptSnapshot(_))
        ));

        let mut extra = bytes;
        extra.extend_from_slice(&[0, 0, 0, 0]);
        assert!(FlatIndex::decode(&extra).is_err());
    }
}
