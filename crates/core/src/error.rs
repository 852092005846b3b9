//! Unified error types for honyaku.
//!
//! Every variant renders with a stable upper-snake code prefix so that
//! callers (and log readers) can match on the failure class.

use tokio_rusqlite::rusqlite;

/// Unified error types for the cache layer, worker runtime and chat layer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., empty chat message).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// Stored entry could not be encoded or decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),

    /// Network-level fetch failure (no HTTP response at all).
    #[error("NETWORK_ERROR: {0}")]
    Network(String),

    /// Static asset pre-population failed; the worker does not activate.
    #[error("INSTALL_FAILED: {0}")]
    InstallFailed(String),

    /// Lifecycle event arrived in the wrong worker state.
    #[error("INVALID_STATE: {0}")]
    InvalidState(String),

    /// Target client is no longer open.
    #[error("CLIENT_GONE: {0}")]
    ClientGone(String),

    /// A generation is already running for this session.
    #[error("GENERATION_BUSY")]
    GenerationBusy,

    /// The inference engine failed mid-request or mid-stream.
    #[error("GENERATION_FAILED: {0}")]
    GenerationFailed(String),
}

impl Error {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::InvalidUrl(_) => "INVALID_URL",
            Error::Database(_) | Error::MigrationFailed(_) | Error::CorruptEntry(_) => "CACHE_ERROR",
            Error::Network(_) => "NETWORK_ERROR",
            Error::InstallFailed(_) => "INSTALL_FAILED",
            Error::InvalidState(_) => "INVALID_STATE",
            Error::ClientGone(_) => "CLIENT_GONE",
            Error::GenerationBusy => "GENERATION_BUSY",
            Error::GenerationFailed(_) => "GENERATION_FAILED",
        }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptEntry(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InstallFailed("/app.js: status 404".to_string());
        assert!(err.to_string().contains("INSTALL_FAILED"));
        assert!(err.to_string().contains("app.js"));
    }

    #[test]
    fn test_error_code_matches_display_prefix() {
        let errors = [
            Error::InvalidInput("x".into()),
            Error::Network("offline".into()),
            Error::InstallFailed("/index.html".into()),
            Error::GenerationBusy,
            Error::CorruptEntry("bad json".into()),
        ];
        for err in errors {
            assert!(err.to_string().starts_with(err.code()), "{err}");
        }
    }

    #[test]
    fn test_serde_error_is_corrupt_entry() {
        let err: Error = serde_json::from_str::<Vec<u8>>("{").unwrap_err().into();
        assert_eq!(err.code(), "CACHE_ERROR");
    }
}
