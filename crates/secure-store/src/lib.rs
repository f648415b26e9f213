//! Persisted session storage for the Liftlog client.
//!
//! This crate provides:
//! - The [`SecureStorage`] trait over string-keyed records
//! - A file-backed implementation under the client base directory
//! - [`SessionVault`], the sole owner of the persisted session record

mod file;
mod keys;
mod traits;
mod vault;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use traits::SecureStorage;
pub use vault::SessionVault;

use client_core::Paths;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Storage medium unavailable or rejected the operation
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create the default file-backed storage implementation.
pub fn create_storage(paths: &Paths) -> StorageResult<Box<dyn SecureStorage>> {
    let storage = FileStorage::new(paths.session_file());
    Ok(Box::new(storage))
}

/// Create a SessionVault over the default storage.
pub fn create_session_vault(paths: &Paths) -> StorageResult<SessionVault> {
    let storage = create_storage(paths)?;
    Ok(SessionVault::new(storage))
}
