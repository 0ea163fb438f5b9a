/// Why a single machine's fetch produced no sample.
///
/// These are ordinary values: the collector logs them, counts them and moves
/// on to the next machine.
///
/// # Examples
///
/// ```rust
/// use fleetmon_source::error::FetchError;
///
/// let err = FetchError::Status { status: 503 };
/// assert_eq!(err.kind(), "status");
/// assert!(err.to_string().contains("503"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The endpoint answered with something other than 200.
    #[error("unexpected HTTP status {status}")]
    Status { status: u16 },

    /// The request did not finish within the per-request timeout.
    #[error("request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Connection refused, DNS failure, reset, invalid URL.
    #[error("transport error: {0}")]
    Transport(String),

    /// The body was not a JSON object.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    /// A required field was absent or null.
    #[error("missing field '{0}'")]
    MissingField(&'static str),

    /// A field was present but could not be coerced to a number.
    #[error("invalid value for '{field}': {value}")]
    InvalidField { field: &'static str, value: String },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl FetchError {
    /// Short label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Timeout { .. } => "timeout",
            Self::Transport(_) => "transport",
            Self::MalformedPayload(_) => "malformed_payload",
            Self::MissingField(_) => "missing_field",
            Self::InvalidField { .. } => "invalid_field",
            Self::Client(_) => "client",
        }
    }
}

/// Convenience type alias so callers can write `error::Result<T>`.
pub type Result<T> = std::result::Result<T, FetchError>;
