/// Failures of the persistence layer.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// A row for the same (room_id, month_key) already exists.
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Bill {0} not found")]
    NotFound(i64),

    /// The request may or may not have reached the backend.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// HTTP transport error (boxed to keep enum small)
    #[error("HTTP error: {0}")]
    Http(#[source] Box<reqwest::Error>),

    #[error("Backend returned {status}: {message}")]
    Backend { status: u16, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }

    /// True when the write could have been applied despite the error.
    pub fn is_ambiguous(&self) -> bool {
        match self {
            StoreError::Timeout(_) => true,
            StoreError::Http(err) => err.is_timeout() || err.is_body() || err.is_decode(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StoreError::Timeout(err.to_string())
        } else {
            StoreError::Http(Box::new(err))
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures of the billing operations that never reached the store.
#[derive(thiserror::Error, Debug)]
pub enum BillingError {
    #[error("No month is loaded yet")]
    NothingLoaded,

    #[error("Bill {0} is not part of the loaded month")]
    UnknownBill(i64),

    #[error("Invalid rates: {0}")]
    InvalidRates(String),
}
