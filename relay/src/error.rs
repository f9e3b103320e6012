use std::{borrow, error, fmt, result};

/// Type alias for convenience when using the Result type with our Error.
pub type RelayResult<T> = result::Result<T, RelayError>;

/// Internal error representation with kind and optional source error.
///
/// Uses boxing to keep the public error type size consistent and enable
/// rich error context without penalizing the success path.
struct ErrorInner {
    kind: ErrorKind,
    source: Option<Box<dyn error::Error + Send + Sync>>,
}

/// Error classification for the sync relay.
///
/// Each variant corresponds to a failure class with a distinct handling
/// policy: some are resolved in-process by the orchestrator, some mark the
/// item as failed, and the rest surface to the worker loop so the queue
/// redelivers the job.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The per-item sync lock is already held by another worker.
    LockBusy { key: String },
    /// Lock service operation failure (acquire or release transport).
    LockTransport,

    /// Rate limiter backend operation failure.
    LimiterTransport,

    /// The upstream cursor is invalid and the sync must restart from the
    /// beginning with an empty cursor.
    CursorReset,
    /// The upstream connection requires user intervention before syncing
    /// can resume (re-login, unlock, token rotation).
    UserActionRequired { code: String },
    /// Upstream transport failure (network, 5xx, timeouts).
    ProviderTransport,
    /// Upstream response could not be decoded.
    ProviderDecodeFailed,
    /// A value received from the upstream could not be converted to its
    /// domain representation.
    DataConversionFailed { field: String, value: String },

    /// Item lookup returned no row.
    ItemNotFound { key: String },
    /// Item creation hit the unique constraint on the provider item id.
    ItemAlreadyExists { provider_item_id: String },
    /// The item is in a status that is not eligible to sync.
    ItemNotSyncable { item_id: String, status: String },

    /// Database connection failure.
    StoreConnection,
    /// Database statement execution failure.
    StoreQuery,

    /// Job queue transport failure.
    QueueTransport,
    /// A queued job payload could not be decoded.
    QueueDecodeFailed,

    /// Event publication failure. Fatal for the current job since downstream
    /// reconcilers depend on the event stream.
    EventPublishFailed,

    /// JSON serialization failure.
    JsonSerializationFailed,

    /// Configuration parameter is missing or invalid.
    ConfigurationInvalid { parameter: String, reason: String },

    /// A worker task panicked.
    WorkerPanicked { worker_id: usize },
    /// The operation was cancelled by shutdown.
    Cancelled,
}

/// Recovery policy for a failed sync job.
///
/// The orchestrator handles [`RecoveryStrategy::ResetCursor`] and
/// [`RecoveryStrategy::MarkError`] in-process; the worker loop drops
/// [`RecoveryStrategy::Drop`] jobs quietly and relies on queue redelivery
/// for [`RecoveryStrategy::Redeliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStrategy {
    /// Non-fatal; drop the job, another worker owns the item or shutdown won.
    Drop,
    /// Restart the pagination loop with an empty cursor.
    ResetCursor,
    /// Mark the item as errored and stop; no retry.
    MarkError,
    /// Permanent failure; do not retry and do not touch item status.
    NoRetry,
    /// Transient failure; the job is re-delivered by the queue.
    Redeliver,
}

/// A stable error type for the relay library.
///
/// Carries a structured [`ErrorKind`] plus an optional source error, so
/// callers can branch on classification while logs retain the full chain.
pub struct RelayError(Box<ErrorInner>);

impl RelayError {
    /// Creates a new error with the specified kind.
    pub fn new(kind: ErrorKind) -> Self {
        RelayError(Box::new(ErrorInner { kind, source: None }))
    }

    /// Creates a new error with the specified kind and source error.
    pub fn with_source<E>(kind: ErrorKind, source: E) -> Self
    where
        E: Into<Box<dyn error::Error + Send + Sync>>,
    {
        RelayError(Box::new(ErrorInner {
            kind,
            source: Some(source.into()),
        }))
    }

    /// Creates a lock busy error for the given lock key.
    pub fn lock_busy(key: impl Into<String>) -> Self {
        Self::new(ErrorKind::LockBusy { key: key.into() })
    }

    /// Creates a cursor reset error.
    pub fn cursor_reset() -> Self {
        Self::new(ErrorKind::CursorReset)
    }

    /// Creates a user action required error for the given provider code.
    pub fn user_action_required(code: impl Into<String>) -> Self {
        Self::new(ErrorKind::UserActionRequired { code: code.into() })
    }

    /// Creates an item not found error.
    pub fn item_not_found(key: impl fmt::Display) -> Self {
        Self::new(ErrorKind::ItemNotFound {
            key: key.to_string(),
        })
    }

    /// Creates an item already exists error.
    pub fn item_already_exists(provider_item_id: impl Into<String>) -> Self {
        Self::new(ErrorKind::ItemAlreadyExists {
            provider_item_id: provider_item_id.into(),
        })
    }

    /// Creates an item not syncable error.
    pub fn item_not_syncable(item_id: impl fmt::Display, status: impl fmt::Display) -> Self {
        Self::new(ErrorKind::ItemNotSyncable {
            item_id: item_id.to_string(),
            status: status.to_string(),
        })
    }

    /// Creates a data conversion error for a named upstream field.
    pub fn data_conversion(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ErrorKind::DataConversionFailed {
            field: field.into(),
            value: value.into(),
        })
    }

    /// Creates a cancellation error.
    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled)
    }

    /// Returns the error kind.
    pub fn kind(&self) -> &ErrorKind {
        &self.0.kind
    }

    /// Returns the recovery strategy for this error.
    pub fn recovery_strategy(&self) -> RecoveryStrategy {
        use ErrorKind::*;
        match &self.0.kind {
            LockBusy { .. } | Cancelled => RecoveryStrategy::Drop,

            CursorReset => RecoveryStrategy::ResetCursor,

            UserActionRequired { .. } => RecoveryStrategy::MarkError,

            ItemNotFound { .. }
            | ItemAlreadyExists { .. }
            | ItemNotSyncable { .. }
            | ConfigurationInvalid { .. } => RecoveryStrategy::NoRetry,

            // Everything else is treated as transient: the job fails and the
            // queue's at-least-once delivery re-runs it.
            _ => RecoveryStrategy::Redeliver,
        }
    }

    /// Returns true if this error is likely transient and the job should be
    /// retried via queue redelivery.
    pub fn is_retryable(&self) -> bool {
        matches!(self.recovery_strategy(), RecoveryStrategy::Redeliver)
    }

    /// Returns true if the error means another worker holds the item lock.
    pub fn is_lock_busy(&self) -> bool {
        matches!(self.0.kind, ErrorKind::LockBusy { .. })
    }
}

impl fmt::Debug for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayError")
            .field("kind", &self.0.kind)
            .field("source", &self.0.source)
            .finish()
    }
}

impl fmt::Display for RelayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ErrorKind::*;

        match &self.0.kind {
            LockBusy { key } => write!(f, "lock '{key}' is already held"),
            LockTransport => write!(f, "lock service operation failed"),

            LimiterTransport => write!(f, "rate limiter operation failed"),

            CursorReset => write!(f, "upstream requires a cursor reset"),
            UserActionRequired { code } => {
                write!(f, "user action required (provider code: {code})")
            }
            ProviderTransport => write!(f, "upstream provider request failed"),
            ProviderDecodeFailed => write!(f, "failed to decode upstream provider response"),
            DataConversionFailed { field, value } => {
                write!(f, "failed to convert upstream field '{field}' value '{value}'")
            }

            ItemNotFound { key } => write!(f, "item '{key}' not found"),
            ItemAlreadyExists { provider_item_id } => {
                write!(f, "item for provider item '{provider_item_id}' already exists")
            }
            ItemNotSyncable { item_id, status } => {
                write!(f, "item '{item_id}' is in status '{status}' and cannot sync")
            }

            StoreConnection => write!(f, "database connection failed"),
            StoreQuery => write!(f, "database statement failed"),

            QueueTransport => write!(f, "job queue operation failed"),
            QueueDecodeFailed => write!(f, "failed to decode queued job payload"),

            EventPublishFailed => write!(f, "failed to publish sync events"),

            JsonSerializationFailed => write!(f, "json serialization failed"),

            ConfigurationInvalid { parameter, reason } => {
                write!(f, "configuration parameter '{parameter}' invalid: {reason}")
            }

            WorkerPanicked { worker_id } => write!(f, "worker {worker_id} panicked"),
            Cancelled => write!(f, "operation cancelled by shutdown"),
        }
    }
}

impl error::Error for RelayError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        self.0
            .source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn error::Error + 'static))
    }
}

impl From<sqlx::Error> for RelayError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            // Communication and infrastructure errors.
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed => Self::with_source(ErrorKind::StoreConnection, err),

            // Database-specific errors with SQLSTATE handling.
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().unwrap_or(borrow::Cow::Borrowed("unknown"));
                match code.as_ref() {
                    // Connection errors (Class 08).
                    "08000" | "08001" | "08003" | "08004" | "08006" => {
                        Self::with_source(ErrorKind::StoreConnection, err)
                    }
                    // Unique violations surface as already-exists; callers
                    // that know the conflicting key attach it themselves.
                    "23505" => Self::with_source(
                        ErrorKind::ItemAlreadyExists {
                            provider_item_id: "unknown".to_string(),
                        },
                        err,
                    ),
                    _ => Self::with_source(ErrorKind::StoreQuery, err),
                }
            }

            _ => Self::with_source(ErrorKind::StoreQuery, err),
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(ErrorKind::JsonSerializationFailed, err)
    }
}
