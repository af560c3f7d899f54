use location_state_kv::KVError;
use thiserror::Error;

/// Errors surfaced by the location-state layer.
///
/// Only misuse of the API (`MissingProvider`, `MissingStore`) and invalid
/// host input (`InvalidUrl`) reach callers. Backing-medium failures
/// (`Serialize`, `Deserialize`, `Storage`) are caught at the store boundary
/// and logged; they appear here so the internals can use `?`.
#[derive(Error, Debug)]
pub enum LocationStateError {
    #[error("no location-state provider is mounted on this thread")]
    MissingProvider,

    #[error("store not found: {0}")]
    MissingStore(String),

    #[error("invalid url: {0}")]
    InvalidUrl(String),

    #[error("serialize error: {0}")]
    Serialize(String),

    #[error("deserialize error: {0}")]
    Deserialize(String),

    #[error(transparent)]
    Storage(#[from] KVError),
}

pub type Result<T, E = LocationStateError> = std::result::Result<T, E>;
