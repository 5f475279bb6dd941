use crate::client::EmbeddingClient;
use crate::error::Result;
use crate::flat_index::FlatIndex;
use crate::snapshot::SnapshotPaths;
use crate::text_store::TextStore;
use crate::types::{AddOutcome, SearchHit, SnapshotStatus, StoreState};
use docbrief_chunker::Chunker;
use std::path::Path;
use tokio::sync::{Mutex, RwLock};

/// Embedding cache with exact nearest-neighbour retrieval.
///
/// Owns the vector index and the position-aligned text store. Share it as `Arc<VectorStore>`:
/// searches run concurrently, writers are serialized, and readers only ever observe the state
/// before or after a complete `add_texts`.
pub struct VectorStore {
    client: EmbeddingClient,
    inner: RwLock<Inner>,
    commit: Mutex<()>,
    snapshot: Option<SnapshotPaths>,
}

struct Inner {
    index: FlatIndex,
    texts: TextStore,
}

impl VectorStore {
    /// Open the store persisted in `dir`, or start empty when there is no usable snapshot.
    pub async fn open(dir: impl AsRef<Path>, client: EmbeddingClient) -> Self {
        log::info!("Opening VectorStore at {:?}", dir.as_ref());
        let paths = SnapshotPaths::in_dir(dir.as_ref());
        let (index, texts) = paths.load_or_empty().await;
        Self {
            client,
            inner: RwLock::new(Inner { index, texts }),
            commit: Mutex::new(()),
            snapshot: Some(paths),
        }
    }

    /// Store without persistence
    #[must_use]
    pub fn in_memory(client: EmbeddingClient) -> Self {
        Self {
            client,
            inner: RwLock::new(Inner {
                index: FlatIndex::new(),
                texts: TextStore::new(),
            }),
            commit: Mutex::new(()),
            snapshot: None,
        }
    }

    /// Embed `texts` and append them.
    ///
    /// Embedding happens before any lock is taken; if it fails nothing is applied. The index
    /// and the text store are then extended together and the snapshot rewritten. A snapshot
    /// failure is logged and reported in [`AddOutcome::snapshot`] without rolling back memory.
    pub async fn add_texts(&self, texts: Vec<String>) -> Result<AddOutcome> {
        if texts.is_empty() {
            return Ok(AddOutcome {
                added: 0,
                total: self.len().await,
                snapshot: SnapshotStatus::Unchanged,
            });
        }

        log::info!("Adding {} texts to store", texts.len());
        let vectors = self.client.embed(&texts).await?;
        let added = texts.len();

        let _gate = self.commit.lock().await;
        let mut inner = self.inner.write().await;
        inner.index.add(&vectors)?;
        inner.texts.append(texts);
        debug_assert_eq!(inner.index.len(), inner.texts.len());
        let total = inner.index.len();

        let inner = inner.downgrade();
        let snapshot = match &self.snapshot {
            None => SnapshotStatus::InMemory,
            Some(paths) => match paths.save(&inner.index, &inner.texts).await {
                Ok(()) => SnapshotStatus::Written,
                Err(err) => {
                    log::error!("Snapshot write failed, in-memory store is ahead of disk: {err}");
                    SnapshotStatus::Failed(err.to_string())
                }
            },
        };

        log::info!("Successfully added texts. Total: {total}");
        Ok(AddOutcome {
            added,
            total,
            snapshot,
        })
    }

    /// Chunk a document and add its chunks
    pub async fn add_document(&self, chunker: &Chunker, text: &str) -> Result<AddOutcome> {
        self.add_texts(chunker.chunk(text)).await
    }

    /// Add one entry per CSV data row, rendered as `header: value, header: value`.
    ///
    /// The first record is the header row. Short rows pair only the fields they have.
    pub async fn add_csv(&self, data: &[u8]) -> Result<AddOutcome> {
        self.add_texts(csv_rows(data)?).await
    }

    /// Texts of the `k` nearest entries, nearest first
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<String>> {
        Ok(self
            .search_with_scores(query, k)
            .await?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }

    /// Like [`VectorStore::search`], keeping positions and distances
    pub async fn search_with_scores(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        log::debug!("Searching for: '{query}' (k: {k})");
        if k == 0 || self.is_empty().await {
            return Ok(Vec::new());
        }

        let query_vector = self.client.embed_one(query).await?;

        let inner = self.inner.read().await;
        let neighbors = inner.index.search(&query_vector, k)?;
        let hits: Vec<SearchHit> = neighbors
            .into_iter()
            .filter_map(|(position, distance)| {
                inner.texts.get(position).map(|text| SearchHit {
                    position,
                    text: text.to_string(),
                    distance,
                })
            })
            .collect();

        log::debug!("Found {} results", hits.len());
        Ok(hits)
    }

    /// Rewrite the snapshot from the current in-memory state
    pub async fn flush(&self) -> Result<()> {
        let Some(paths) = &self.snapshot else {
            return Ok(());
        };
        let _gate = self.commit.lock().await;
        let inner = self.inner.read().await;
        paths.save(&inner.index, &inner.texts).await?;
        log::info!("VectorStore saved to {}", paths.index.display());
        Ok(())
    }

    pub async fn state(&self) -> StoreState {
        if self.is_empty().await {
            StoreState::Uninitialized
        } else {
            StoreState::Ready
        }
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.index.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.index.is_empty()
    }

    /// Index dimensionality, `None` while uninitialized
    pub async fn dimension(&self) -> Option<usize> {
        self.inner.read().await.index.dimension()
    }

    /// Text stored at `position`
    pub async fn text(&self, position: usize) -> Option<String> {
        self.inner
            .read()
            .await
            .texts
            .get(position)
            .map(ToString::to_string)
    }

    #[must_use]
    pub fn client(&self) -> &EmbeddingClient {
        &self.client
    }

    #[must_use]
    pub const fn snapshot_paths(&self) -> Option<&SnapshotPaths> {
        self.snapshot.as_ref()
    }
}

fn csv_rows(data: &[u8]) -> Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(data);
    let headers = reader.headers()?.clone();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| format!("{header}: {value}"))
            .collect::<Vec<_>>()
            .join(", ");
        rows.push(row);
    }
    log::debug!("Parsed {} CSV rows", rows.len());
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VectorStoreError;
    use docbrief_chunker::ChunkerConfig;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_add_and_search() {
        let temp_dir = TempDir::new().unwrap();
        let store = VectorStore::open(temp_dir.path(), EmbeddingClient::hashing(16)).await;
        assert_eq!(store.state().await, StoreState::Uninitialized);

        let outcome = store
            .add_texts(vec![
                "marketing plan for Q3".to_string(),
                "sales pipeline review".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(outcome.added, 2);
        assert_eq!(outcome.total, 2);
        assert_eq!(outcome.snapshot, SnapshotStatus::Written);
        assert_eq!(store.state().await, StoreState::Ready);
        assert_eq!(store.dimension().await, Some(16));

        let results = store.search("sales pipeline review", 5).await.unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0], "sales pipeline review");
    }

    #[tokio::test]
    async fn test_empty_store_search_is_empty() {
        let store = VectorStore::in_memory(EmbeddingClient::hashing(4));
        for k in [0, 1, 100] {
            assert!(store.search("anything", k).await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_add_empty_is_noop_without_write() {
        let temp_dir = TempDir::new().unwrap();
        let store = VectorStore::open(temp_dir.path(), EmbeddingClient::hashing(4)).await;

        let outcome = store.add_texts(Vec::new()).await.unwrap();
        assert_eq!(outcome.snapshot, SnapshotStatus::Unchanged);
        assert_eq!(store.len().await, 0);
        assert!(!temp_dir.path().join("index.bin").exists());
    }

    #[tokio::test]
    async fn test_add_document_chunks_first() {
        let store = VectorStore::in_memory(EmbeddingClient::hashing(8));
        let chunker = Chunker::new(ChunkerConfig::new(3, 1)).unwrap();

        let outcome = store
            .add_document(&chunker, "one two three four five")
            .await
            .unwrap();
        assert_eq!(outcome.added, 3);
        assert_eq!(outcome.snapshot, SnapshotStatus::InMemory);
        assert_eq!(store.text(0).await.as_deref(), Some("one two three"));
        assert_eq!(store.text(1).await.as_deref(), Some("three four five"));
        assert_eq!(store.text(2).await.as_deref(), Some("five"));
    }

    #[tokio::test]
    async fn test_add_csv_one_entry_per_row() {
        let store = VectorStore::in_memory(EmbeddingClient::hashing(8));
        let data = b"dept,revenue,region\nsales,12,emea\nhr,3\n";

        let outcome = store.add_csv(data).await.unwrap();
        assert_eq!(outcome.added, 2);
        assert_eq!(
            store.text(0).await.as_deref(),
            Some("dept: sales, revenue: 12, region: emea")
        );
        assert_eq!(store.text(1).await.as_deref(), Some("dept: hr, revenue: 3"));
    }

    #[tokio::test]
    async fn test_add_csv_without_rows_adds_nothing() {
        let store = VectorStore::in_memory(EmbeddingClient::hashing(8));
        for data in [&b""[..], &b"dept,revenue\n"[..]] {
            let outcome = store.add_csv(data).await.unwrap();
            assert_eq!(outcome.added, 0);
            assert_eq!(outcome.snapshot, SnapshotStatus::Unchanged);
        }
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_add_csv_rejects_invalid_utf8() {
        let store = VectorStore::in_memory(EmbeddingClient::hashing(8));
        let err = store.add_csv(b"dept\n\xff\xfe\n").await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Csv(_)));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_failure_keeps_memory_state() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"file, not dir").unwrap();

        let store = VectorStore::open(blocker.join("store"), EmbeddingClient::hashing(4)).await;
        let outcome = store.add_texts(vec!["kept".to_string()]).await.unwrap();

        assert!(matches!(outcome.snapshot, SnapshotStatus::Failed(_)));
        assert_eq!(store.len().await, 1);
        assert_eq!(store.search("kept", 1).await.unwrap(), vec!["kept".to_string()]);
        assert!(store.flush().await.is_err());
    }
}
