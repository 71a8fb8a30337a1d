//! Error types for santasheet.
//!
//! This module defines all error types used throughout the santasheet crate.
//! Every error is contained to the action that triggered it; callers render
//! [`Error::display_message`] as an inline status line.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for santasheet operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Storage Errors ===
    /// Failed to open or create the database.
    #[error("failed to open database at {path}: {source}")]
    DatabaseOpen {
        /// Path to the database file.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: rusqlite::Error,
    },

    /// A database query failed.
    #[error("database query failed: {0}")]
    DatabaseQuery(#[from] rusqlite::Error),

    /// Failed to run database migrations.
    #[error("database migration failed: {message}")]
    DatabaseMigration {
        /// Description of what went wrong.
        message: String,
    },

    /// No sheet exists with the given id.
    #[error("sheet not found: {id}")]
    NotFound {
        /// The id that was looked up.
        id: String,
    },

    /// A page token was not issued by this store.
    #[error("invalid page token: {token}")]
    InvalidPageToken {
        /// The rejected token.
        token: String,
    },

    /// The store's connection lock was poisoned by a panicking writer.
    #[error("record store lock poisoned")]
    LockPoisoned,

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    // === Import Errors ===
    /// The uploaded import file has an unusable shape.
    #[error("invalid import file: {message}")]
    InvalidImport {
        /// Description of the validation failure.
        message: String,
    },

    // === Session Errors ===
    /// No user is signed in.
    #[error("not signed in")]
    NotSignedIn,

    /// Fetching profile attributes for a user failed.
    #[error("failed to fetch profile attributes for {login_id}: {message}")]
    ProfileFetch {
        /// The login identifier whose attributes were requested.
        login_id: String,
        /// Description of what went wrong.
        message: String,
    },

    /// The signed-in user is not on the admin allow-list.
    #[error("{login_id} is not an administrator")]
    NotAuthorized {
        /// The login identifier of the rejected user.
        login_id: String,
    },

    // === Form Errors ===
    /// The same action is already running.
    #[error("{action} already in progress")]
    ActionInProgress {
        /// Name of the running action.
        action: &'static str,
    },

    /// A field name does not match any sheet field.
    #[error("unknown sheet field: {name}")]
    UnknownField {
        /// The name that was given.
        name: String,
    },

    /// The editor is bound in read-only mode.
    #[error("sheet is read-only in this view")]
    ReadOnly,

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // === Generic Errors ===
    /// An internal error occurred (bug).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A specialized Result type for santasheet operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Create an invalid import error.
    #[must_use]
    pub fn invalid_import(message: impl Into<String>) -> Self {
        Self::InvalidImport {
            message: message.into(),
        }
    }

    /// Create a not-found error for the given id.
    #[must_use]
    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    /// Create a profile fetch error.
    #[must_use]
    pub fn profile_fetch(login_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProfileFetch {
            login_id: login_id.into(),
            message: message.into(),
        }
    }

    /// Check if this error means the record does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error is an import validation failure.
    #[must_use]
    pub fn is_invalid_import(&self) -> bool {
        matches!(self, Self::InvalidImport { .. })
    }

    /// The text shown in an inline status line for this error.
    ///
    /// Internal errors carry no useful message for a user, so they are
    /// replaced by `fallback` (for example `"Failed to save sheet."`).
    #[must_use]
    pub fn display_message(&self, fallback: &str) -> String {
        match self {
            Self::Internal(_) => fallback.to_string(),
            other => other.to_string(),
        }
    }
}
