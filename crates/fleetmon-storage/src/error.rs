/// Errors raised by the machine, metric and incident stores.
///
/// Every variant is fatal for the sweep or evaluation pass that hit it; fetch
/// failures never show up here.
///
/// # Examples
///
/// ```rust
/// use fleetmon_storage::error::StorageError;
///
/// let err = StorageError::NotFound {
///     entity: "machine",
///     id: "42".to_string(),
/// };
/// assert!(err.to_string().contains("machine"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// A required record was not found.
    #[error("Storage: {entity} not found (id={id})")]
    NotFound { entity: &'static str, id: String },

    /// An underlying SQLite error (locked database, constraint violation, I/O).
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The `details` column could not be encoded or decoded.
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Creating the data directory failed.
    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The `incident_type` column held a value outside the known set.
    #[error("Storage: unknown incident type '{0}'")]
    UnknownIncidentType(String),
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
