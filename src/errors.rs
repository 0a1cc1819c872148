//! Error types for the backup engine
//!
//! Every fallible operation in the crate returns [`BackupResult`]. Lower
//! layers (the wire reader, the domain store) have their own narrower error
//! types that convert into [`BackupError`] with `?`.

use crate::library_store::StoreError;
use crate::wire::WireError;
use thiserror::Error;

/// Message shown for any container that cannot be understood.
pub const UNRECOGNIZED_BACKUP_MESSAGE: &str =
    "Invalid backup file: unrecognized format or corrupted data";

/// Message shown when a legacy JSON backup is opened.
pub const LEGACY_JSON_MESSAGE: &str = concat!(
    "Invalid backup file: JSON backups are no longer supported. ",
    "Export a new backup from the app that created it"
);

/// Main error type for backup decoding, validation and restore
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Legacy JSON backup detected")]
    LegacyJson,

    #[error("Unrecognized backup: {reason}")]
    Unrecognized { reason: String },

    #[error("Malformed container: {source}")]
    Malformed {
        #[source]
        source: WireError,
    },

    #[error("Backup exceeds size limit of {limit} bytes")]
    SizeLimitExceeded { limit: u64 },

    #[error("Backup validation failed: {source}")]
    Validation {
        #[source]
        source: Box<BackupError>,
    },

    #[error("I/O operation failed: {operation}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Store operation failed: {operation}")]
    Store {
        operation: String,
        #[source]
        source: StoreError,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Restore task failed: {message}")]
    Task { message: String },

    #[error("Mutex lock failed: {resource}")]
    MutexPoisoned { resource: String },
}

/// Type alias for Result with BackupError
pub type BackupResult<T> = Result<T, BackupError>;

impl BackupError {
    /// Create an unrecognized-backup error
    pub fn unrecognized(reason: impl Into<String>) -> Self {
        Self::Unrecognized {
            reason: reason.into(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            source,
        }
    }

    /// Create a store error
    pub fn store(operation: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            operation: operation.into(),
            source,
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Wrap a failure raised while validating a backup
    pub fn validation(source: BackupError) -> Self {
        Self::Validation {
            source: Box::new(source),
        }
    }

    /// Create a task error
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task {
            message: message.into(),
        }
    }

    /// True for every failure that means "this file is not a usable backup".
    pub fn is_unrecognized(&self) -> bool {
        match self {
            BackupError::Unrecognized { .. }
            | BackupError::Malformed { .. }
            | BackupError::SizeLimitExceeded { .. } => true,
            BackupError::Validation { source } => source.is_unrecognized(),
            _ => false,
        }
    }

    /// The message to show an end user. Container-level details are not
    /// actionable, so they collapse into one generic message.
    pub fn user_message(&self) -> String {
        match self {
            BackupError::LegacyJson => LEGACY_JSON_MESSAGE.to_string(),
            BackupError::Validation { source } => source.user_message(),
            e if e.is_unrecognized() => UNRECOGNIZED_BACKUP_MESSAGE.to_string(),
            e => e.to_string(),
        }
    }
}

/// Helper trait for safe mutex operations
pub trait SafeLock<T: ?Sized> {
    /// Lock a mutex, returning a BackupError on poison
    fn safe_lock(&self) -> BackupResult<std::sync::MutexGuard<'_, T>>;
}

impl<T: ?Sized> SafeLock<T> for std::sync::Mutex<T> {
    fn safe_lock(&self) -> BackupResult<std::sync::MutexGuard<'_, T>> {
        self.lock().map_err(|_| BackupError::MutexPoisoned {
            resource: std::any::type_name::<T>().to_string(),
        })
    }
}

impl From<WireError> for BackupError {
    fn from(err: WireError) -> Self {
        BackupError::Malformed { source: err }
    }
}

impl From<prost::DecodeError> for BackupError {
    fn from(err: prost::DecodeError) -> Self {
        BackupError::unrecognized(err.to_string())
    }
}

impl From<std::io::Error> for BackupError {
    fn from(err: std::io::Error) -> Self {
        BackupError::io("io_operation", err)
    }
}

impl From<StoreError> for BackupError {
    fn from(err: StoreError) -> Self {
        BackupError::store("store_operation", err)
    }
}

impl From<sled::Error> for BackupError {
    fn from(err: sled::Error) -> Self {
        BackupError::store("sled_operation", StoreError::from(err))
    }
}

impl From<serde_json::Error> for BackupError {
    fn from(err: serde_json::Error) -> Self {
        BackupError::store("json_operation", StoreError::from(err))
    }
}

impl From<figment::Error> for BackupError {
    fn from(err: figment::Error) -> Self {
        BackupError::config(err.to_string())
    }
}

impl From<tokio::task::JoinError> for BackupError {
    fn from(err: tokio::task::JoinError) -> Self {
        BackupError::task(err.to_string())
    }
}
