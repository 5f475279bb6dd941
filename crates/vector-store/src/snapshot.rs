use crate::error::{Result, VectorStoreError};
use crate::flat_index::FlatIndex;
use crate::text_store::TextStore;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

pub const INDEX_FILE_NAME: &str = "index.bin";
pub const TEXTS_FILE_NAME: &str = "texts.json";

/// Locations of the two co-located snapshot artifacts of one store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotPaths {
    pub index: PathBuf,
    pub texts: PathBuf,
}

impl SnapshotPaths {
    #[must_use]
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            index: dir.join(INDEX_FILE_NAME),
            texts: dir.join(TEXTS_FILE_NAME),
        }
    }

    /// Load both snapshots, falling back to an empty state on any inconsistency.
    pub async fn load_or_empty(&self) -> (FlatIndex, TextStore) {
        match self.load().await {
            Ok(Some((index, texts))) => {
                log::info!(
                    "Loaded {} vectors (dim {:?}) from {}",
                    index.len(),
                    index.dimension(),
                    self.index.display()
                );
                (index, texts)
            }
            Ok(None) => {
                log::debug!("No snapshot at {}, starting empty", self.index.display());
                (FlatIndex::new(), TextStore::new())
            }
            Err(err) => {
                log::warn!(
                    "Ignoring unusable snapshot at {}: {err}. Starting from an empty store.",
                    self.index.display()
                );
                (FlatIndex::new(), TextStore::new())
            }
        }
    }

    /// `Ok(None)` means there is no prior state: the index file is absent or zero-length.
    pub async fn load(&self) -> Result<Option<(FlatIndex, TextStore)>> {
        let Some(index_bytes) = read_if_present(&self.index).await? else {
            return Ok(None);
        };
        if index_bytes.is_empty() {
            return Ok(None);
        }
        let index = FlatIndex::decode(&index_bytes)?;

        let mut texts = match read_if_present(&self.texts).await? {
            Some(bytes) if !bytes.is_empty() => TextStore::decode(&bytes)?,
            _ => {
                return Err(VectorStoreError::corrupt(format!(
                    "index snapshot present but {} is missing or empty",
                    self.texts.display()
                )))
            }
        };

        if texts.len() > index.len() {
            // Trailing texts from a save interrupted between the two renames
            log::warn!(
                "Text snapshot holds {} entries beyond the index, dropping them",
                texts.len() - index.len()
            );
            texts.truncate(index.len());
        }
        if index.len() != texts.len() {
            return Err(VectorStoreError::corrupt(format!(
                "index holds {} vectors but text snapshot holds {} texts",
                index.len(),
                texts.len()
            )));
        }
        Ok(Some((index, texts)))
    }

    /// Write both snapshots.
    ///
    /// Both payloads are staged as temporary siblings before either target is replaced, so a
    /// failed write leaves the previous pair on disk. Texts are renamed before the index.
    pub async fn save(&self, index: &FlatIndex, texts: &TextStore) -> Result<()> {
        let index_bytes = index.encode();
        let text_bytes = texts.encode()?;

        let texts_tmp = stage(&self.texts, &text_bytes)
            .await
            .map_err(|e| persistence_error(&self.texts, &e))?;
        let index_tmp = match stage(&self.index, &index_bytes).await {
            Ok(tmp) => tmp,
            Err(err) => {
                let _ = tokio::fs::remove_file(&texts_tmp).await;
                return Err(persistence_error(&self.index, &err));
            }
        };

        if let Err(err) = tokio::fs::rename(&texts_tmp, &self.texts).await {
            let _ = tokio::fs::remove_file(&texts_tmp).await;
            let _ = tokio::fs::remove_file(&index_tmp).await;
            return Err(persistence_error(&self.texts, &err));
        }
        if let Err(err) = tokio::fs::rename(&index_tmp, &self.index).await {
            let _ = tokio::fs::remove_file(&index_tmp).await;
            return Err(persistence_error(&self.index, &err));
        }
        Ok(())
    }
}

async fn read_if_present(path: &Path) -> Result<Option<Vec<u8>>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(VectorStoreError::corrupt(format!(
            "failed to read {}: {err}",
            path.display()
        ))),
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

/// Write `bytes` next to `path` and return the temporary file's location.
async fn stage(path: &Path, bytes: &[u8]) -> std::io::Result<PathBuf> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    let tmp = tmp_path(path);
    if let Err(err) = tokio::fs::write(&tmp, bytes).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(err);
    }
    Ok(tmp)
}

fn persistence_error(path: &Path, err: &std::io::Error) -> VectorStoreError {
    VectorStoreError::Persistence(format!("failed to write {}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> (FlatIndex, TextStore) {
        let mut index = FlatIndex::new();
        index.add(&[vec![1.0, 0.0], vec![0.0, 1.0]]).unwrap();
        let mut texts = TextStore::new();
        texts.append(["left", "up"]);
        (index, texts)
    }

    #[tokio::test]
    async fn save_then_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let paths = SnapshotPaths::in_dir(&tmp.path().join("nested").join("store"));
        let (index, texts) = sample();

        paths.save(&index, &texts).await.unwrap();
        let (loaded_index, loaded_texts) = paths.load().await.unwrap().unwrap();
        assert_eq!(loaded_index, index);
        assert_eq!(loaded_texts, texts);
        assert!(!tmp.path().join("nested/store/index.bin.tmp").exists());
    }

    #[tokio::test]
    async fn missing_or_zero_length_index_means_no_state() {
        let tmp = TempDir::new().unwrap();
        let paths = SnapshotPaths::in_dir(tmp.path());
        assert!(paths.load().await.unwrap().is_none());

        std::fs::write(&paths.index, b"").unwrap();
        std::fs::write(&paths.texts, br#"{"schema_version":1,"texts":["orphan"]}"#).unwrap();
        assert!(paths.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn index_without_texts_resets_to_empty() {
        let tmp = TempDir::new().unwrap();
        let paths = SnapshotPaths::in_dir(tmp.path());
        let (index, texts) = sample();
        paths.save(&index, &texts).await.unwrap();
        std::fs::remove_file(&paths.texts).unwrap();

        assert!(matches!(
            paths.load().await,
            Err(VectorStoreError::CorruptSnapshot(_))
        ));
        let (index, texts) = paths.load_or_empty().await;
        assert!(index.is_empty());
        assert!(texts.is_empty());
    }

    #[tokio::test]
    async fn length_mismatch_resets_to_empty() {
        let tmp = TempDir::new().unwrap();
        let paths = SnapshotPaths::in_dir(tmp.path());
        let (index, _) = sample();
        let mut short = TextStore::new();
        short.append(["only one"]);
        paths.save(&index, &short).await.unwrap();

        assert!(paths.load().await.is_err());
        let (index, texts) = paths.load_or_empty().await;
        assert_eq!((index.len(), texts.len()), (0, 0));
    }

    #[tokio::test]
    async fn failed_index_write_keeps_previous_pair() {
        let tmp = TempDir::new().unwrap();
        let paths = SnapshotPaths::in_dir(tmp.path());
        let (index, texts) = sample();
        paths.save(&index, &texts).await.unwrap();

        std::fs::create_dir(tmp.path().join("index.bin.tmp")).unwrap();
        let mut grown_index = index.clone();
        grown_index.add(&[vec![1.0, 1.0]]).unwrap();
        let mut grown_texts = texts.clone();
        grown_texts.append(["diagonal"]);

        assert!(matches!(
            paths.save(&grown_index, &grown_texts).await,
            Err(VectorStoreError::Persistence(_))
        ));
        assert!(!tmp.path().join("texts.json.tmp").exists());

        let (loaded_index, loaded_texts) = paths.load().await.unwrap().unwrap();
        assert_eq!(loaded_index, index);
        assert_eq!(loaded_texts, texts);
    }

    #[tokio::test]
    async fn trailing_texts_are_dropped_on_load() {
        let tmp = TempDir::new().unwrap();
        let paths = SnapshotPaths::in_dir(tmp.path());
        let (index, texts) = sample();
        paths.save(&index, &texts).await.unwrap();

        let mut ahead = texts.clone();
        ahead.append(["renamed before the index"]);
        std::fs::write(&paths.texts, ahead.encode().unwrap()).unwrap();

        let (loaded_index, loaded_texts) = paths.load().await.unwrap().unwrap();
        assert_eq!(loaded_index.len(), 2);
        assert_eq!(loaded_texts, texts);
    }

    #[tokio::test]
    async fn truncated_index_resets_to_empty() {
        let tmp = TempDir::new().unwrap();
        let paths = SnapshotPaths::in_dir(tmp.path());
        let (index, texts) = sample();
        paths.save(&index, &texts).await.unwrap();

        let bytes = std::fs::read(&paths.index).unwrap();
        std::fs::write(&paths.index, &bytes[..bytes.len() / 2]).unwrap();

        let (index, texts) = paths.load_or_empty().await;
        assert!(index.is_empty() && texts.is_empty());
    }

    #[tokio::test]
    async fn save_into_unwritable_location_is_persistence_error() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();
        let paths = SnapshotPaths::in_dir(&blocker.join("store"));
        let (index, texts) = sample();

        assert!(matches!(
            paths.save(&index, &texts).await,
            Err(VectorStoreError::Persistence(_))
        ));
    }
}
