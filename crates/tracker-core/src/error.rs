//! Error taxonomy for the forecast tracker.
//!
//! Per-item failures (`ProviderError`, `ResolutionError`) are recovered by the
//! caller: the item is skipped and the run continues. `PersistenceError` and
//! `ConfigError` stop the run before anything is written.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;

/// Top-level run error.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Grid resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Nothing useful could be done, e.g. every fetch failed.
    #[error("No progress: {0}")]
    NoProgress(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl TrackerError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            TrackerError::Config(_) => 2,
            TrackerError::Persistence(_) => 3,
            TrackerError::NoProgress(_) => 4,
            TrackerError::Provider(_) | TrackerError::Resolution(_) | TrackerError::Other(_) => 1,
        }
    }
}

/// Errors from a forecast or historical-weather provider.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Server error: {status} - {message}")]
    Status { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The provider answered but had nothing for the requested date.
    #[error("No data for {0}")]
    NoData(String),

    /// The provider's current forecast was issued on another day, so its
    /// rows cannot be filed under the requested issue date.
    #[error("Forecast served was issued {served}, not {requested}")]
    IssueDateMismatch {
        requested: NaiveDate,
        served: NaiveDate,
    },
}

impl ProviderError {
    /// Network blips, 5xx, 408 and 429 are worth one more attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::Timeout | ProviderError::Connection(_) | ProviderError::RateLimited(_) => {
                true
            }
            ProviderError::Status { status, .. } => *status >= 500 || *status == 408,
            ProviderError::InvalidResponse(_)
            | ProviderError::NoData(_)
            | ProviderError::IssueDateMismatch { .. } => false,
        }
    }
}

/// Grid point lookup failed for a location; the location is skipped for that
/// provider until the next run.
#[derive(Debug, Clone, Error)]
pub enum ResolutionError {
    #[error("Grid lookup for {location} failed: {source}")]
    Provider {
        location: String,
        #[source]
        source: ProviderError,
    },

    #[error("No usable grid token for {location}")]
    NoToken { location: String },
}

/// State file or database problems. Always fatal for the run.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt state file {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Database corruption detected: {0}")]
    DatabaseCorrupt(String),
}

impl PersistenceError {
    pub fn read(path: &Path, source: std::io::Error) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn write(path: &Path, source: std::io::Error) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn corrupt(path: &Path, message: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(String),

    #[error("Configuration parse error: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration I/O error: {0}")]
    Io(String),
}

/// Extension trait for converting reqwest errors to our error types.
pub trait ReqwestErrorExt {
    fn into_provider_error(self) -> ProviderError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_provider_error(self) -> ProviderError {
        if self.is_timeout() {
            ProviderError::Timeout
        } else if self.is_connect() {
            ProviderError::Connection(self.to_string())
        } else if let Some(status) = self.status() {
            if status.as_u16() == 429 {
                ProviderError::RateLimited(self.to_string())
            } else {
                ProviderError::Status {
                    status: status.as_u16(),
                    message: self.to_string(),
                }
            }
        } else if self.is_decode() {
            ProviderError::InvalidResponse(self.to_string())
        } else {
            ProviderError::Connection(self.to_string())
        }
    }
}

/// Extension trait for converting rusqlite errors to our error types.
pub trait RusqliteErrorExt {
    fn into_persistence_error(self) -> PersistenceError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_persistence_error(self) -> PersistenceError {
        match &self {
            rusqlite::Error::SqliteFailure(err, _)
                if matches!(
                    err.code,
                    rusqlite::ErrorCode::DatabaseCorrupt | rusqlite::ErrorCode::NotADatabase
                ) =>
            {
                PersistenceError::DatabaseCorrupt(self.to_string())
            }
            _ => PersistenceError::Database(self.to_string()),
        }
    }
}
