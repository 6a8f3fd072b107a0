//! Error types for metadata patching and load redirection.
//!
//! All fallible functions in this crate return [`Result<T>`], which uses [`Error`]
//! as the error type. External error types (`std::io::Error`, `serde_json::Error`,
//! `binrw::Error`) are automatically converted via `From` impls.
//!
//! Errors fall into the families reported by [`Error::kind`]: rejected edits,
//! faults while patching, reverts of records that are not live, and faults inside
//! the host callbacks. Hook faults never leave the callback boundary; they are
//! logged and turned into a pass-through.

use crate::imc::ImcSelector;
use crate::path::GamePath;
use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while editing or serving patched files.
#[derive(Error, Debug)]
pub enum Error {
    /// The edit failed validation against the decoded file; nothing was mutated.
    #[error("Rejected edit for {selector} in {path}: {reason}")]
    RejectedEdit {
        path: GamePath,
        selector: ImcSelector,
        reason: String,
    },

    /// Decoding or encoding failed while applying an otherwise valid edit.
    ///
    /// The file keeps its pre-fault content.
    #[error("Failed to apply edit to {path}: {reason}")]
    ApplyFault { path: GamePath, reason: String },

    /// A revert was requested for a record that is not live in the store.
    #[error("No live manipulation for {0}")]
    MissingTarget(ImcSelector),

    /// A fault inside a host load callback.
    #[error("Load hook fault: {0}")]
    HookFault(String),

    /// The hook could not be installed into the host loader.
    #[error("Failed to install load hook: {0}")]
    HookInstall(String),

    /// Filesystem I/O failed (reading canonical files, config, etc.).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse or serialize JSON (config, manipulation records).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A structured file could not be decoded or encoded.
    #[error("Decode error: {0}")]
    Decode(#[from] binrw::Error),

    /// A logical path failed normalization.
    #[error("Invalid game path '{path}': {reason}")]
    InvalidGamePath { path: String, reason: &'static str },

    /// A string did not follow the `|{collection}_{generation}|{path}` layout.
    #[error("Invalid virtual path: {0}")]
    InvalidVirtualPath(String),

    /// Collection names must be non-empty and must not contain `|`.
    #[error("Invalid collection name: {0:?}")]
    InvalidCollectionName(String),

    /// A live store is already registered under this collection name.
    #[error("Collection '{0}' already has a registered store")]
    DuplicateCollection(String),

    /// The store was disposed and accepts no further operations.
    #[error("Store for collection '{0}' was disposed")]
    StoreDisposed(String),

    /// A mutex or rwlock was poisoned by a panicking thread.
    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    RejectedEdit,
    ApplyFault,
    MissingTarget,
    HookFault,
    Other,
}

impl Error {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::RejectedEdit { .. } => ErrorKind::RejectedEdit,
            Error::ApplyFault { .. } => ErrorKind::ApplyFault,
            Error::MissingTarget(_) => ErrorKind::MissingTarget,
            Error::HookFault(_) | Error::HookInstall(_) => ErrorKind::HookFault,
            _ => ErrorKind::Other,
        }
    }
}

/// Map poisoned lock results into [`Error::LockPoisoned`].
pub(crate) trait MutexResultExt<T> {
    fn mutex_err(self) -> Result<T>;
}

impl<T, E> MutexResultExt<T> for std::result::Result<T, std::sync::PoisonError<E>> {
    fn mutex_err(self) -> Result<T> {
        self.map_err(|_| Error::LockPoisoned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            Error::HookFault("panic".to_string()).kind(),
            ErrorKind::HookFault
        );
        assert_eq!(
            Error::InvalidVirtualPath("|x".to_string()).kind(),
            ErrorKind::Other
        );
        assert_eq!(Error::LockPoisoned.kind(), ErrorKind::Other);
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        assert_eq!(Error::from(io).kind(), ErrorKind::Other);
    }
}
