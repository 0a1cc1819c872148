//! Library root for the `tsundoku_backup` crate
//! Backup decoding, validation and restore for the tsundoku library

// Core error handling
pub mod errors;

// Container format
pub mod backup_decoder;
pub mod container;
pub mod models;
pub mod wire;

// Domain store
pub mod library_store;
pub mod library_store_sled;
pub mod registry;

// Validation & restore
pub mod backup_restorer;
pub mod backup_validator;
pub mod error_log;
pub mod restore_progress;
pub mod restorers;

// Configuration & CLI
pub mod cli;
pub mod config_loader;


pub use backup_decoder::{encode_backup, BackupDecoder};
pub use backup_restorer::{BackupRestorer, RestoreOptions, RestoreOutcome};
pub use backup_validator::{BackupValidator, ValidationReport};
pub use container::{ContainerSource, FileContainer, MemoryContainer};
pub use errors::{BackupError, BackupResult};
