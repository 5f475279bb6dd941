use serde::{Deserialize, Serialize};

/// One ranked search result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Position in the index and text store
    pub position: usize,
    pub text: String,
    /// Squared Euclidean distance to the query vector
    pub distance: f32,
}

/// Lifecycle of a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreState {
    /// Nothing embedded yet, dimension unknown
    Uninitialized,
    /// Dimension fixed, at least one entry
    Ready,
}

/// What happened to the on-disk snapshot during a write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "error")]
pub enum SnapshotStatus {
    Written,
    /// Nothing changed, nothing written
    Unchanged,
    /// The store has no snapshot location
    InMemory,
    /// In-memory state was updated but the snapshot lags behind
    Failed(String),
}

/// Result of [`crate::VectorStore::add_texts`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddOutcome {
    pub added: usize,
    pub total: usize,
    pub snapshot: SnapshotStatus,
}
