use thiserror::Error;

pub type Result<T> = std::result::Result<T, MarketError>;

/// Typed rejections surfaced at the lifecycle/ledger boundary.
///
/// Every guard failure is one of these variants and leaves the stores
/// untouched; callers decide whether a retry makes sense (`PaymentFailed`
/// is the only retry-eligible case).
#[derive(Error, Debug)]
pub enum MarketError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("revision limit of {0} exceeded")]
    RevisionLimitExceeded(u32),
    #[error("already settled: {0}")]
    AlreadySettled(String),
    #[error("payment failed: {0}")]
    PaymentFailed(String),
    #[error("validation error: {0}")]
    ValidationError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl MarketError {
    pub fn internal<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::InternalError(Box::new(err))
    }
}
