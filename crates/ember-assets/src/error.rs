use thiserror::Error;

/// Errors raised by the asset-sync engine (§4.6). A `MissingIndex` is a
/// contract violation by the caller: the `IndexedLookupTable` must be updated
/// with every affected id before a generator runs over it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AssetSyncError {
    #[error("asset id {0:?} has no assigned lookup-table index")]
    MissingIndex(String),
}

pub type AssetSyncResult<T> = Result<T, AssetSyncError>;
