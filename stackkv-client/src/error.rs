//! Error type for the store facade.

use stackkv_common::ConfigError;
use thiserror::Error;

/// Result type for the sync client.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors surfaced by the sync client.
///
/// Store-side failures keep their native [`redis::RedisError`] so callers can
/// inspect kind, code and detail exactly as the server reported them.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connection settings could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Any error reported by the server or the transport.
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
    /// A JSON document could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Reply shape did not match what the command returns.
    #[error("unexpected response to {command}")]
    UnexpectedResponse { command: &'static str },
}

impl StoreError {
    /// True for transport-level failures: refused, dropped, timed out,
    /// plain I/O, or rejected credentials.
    pub fn is_connection_failure(&self) -> bool {
        match self {
            StoreError::Redis(err) => is_connection_failure(err),
            _ => false,
        }
    }
}

/// Server error codes that mean the session is not authenticated.
const AUTH_ERROR_CODES: [&str; 2] = ["NOAUTH", "WRONGPASS"];

pub(crate) fn is_connection_failure(err: &redis::RedisError) -> bool {
    err.is_io_error()
        || err.is_connection_refusal()
        || err.is_connection_dropped()
        || err.is_timeout()
        || err.kind() == redis::ErrorKind::AuthenticationFailed
        || err
            .code()
            .is_some_and(|code| AUTH_ERROR_CODES.contains(&code))
}

/// True when the server reported that an index does not exist.
///
/// RediSearch has phrased this as `Unknown Index name`, `Unknown index name`
/// and `no such index` across releases.
pub(crate) fn is_unknown_index(err: &redis::RedisError) -> bool {
    let text = format!(
        "{} {} {}",
        err.code().unwrap_or_default(),
        err.detail().unwrap_or_default(),
        err
    )
    .to_ascii_lowercase();
    text.contains("unknown index name") || text.contains("no such index")
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn io_errors_are_connection_failures() {
        let refused = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let err = StoreError::from(redis::RedisError::from(refused));
        assert!(err.is_connection_failure());
    }

    #[test]
    fn response_errors_are_not_connection_failures() {
        let native = redis::RedisError::from((redis::ErrorKind::ResponseError, "boom"));
        assert!(!StoreError::from(native).is_connection_failure());
        assert!(!StoreError::UnexpectedResponse { command: "GET" }.is_connection_failure());
    }

    #[test]
    fn unknown_index_matches_server_wording() {
        let native = redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "An error was signalled by the server",
            "Unknown Index name".to_string(),
        ));
        assert!(is_unknown_index(&native));

        let native = redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "An error was signalled by the server",
            "no such index".to_string(),
        ));
        assert!(is_unknown_index(&native));

        let native = redis::RedisError::from((
            redis::ErrorKind::ResponseError,
            "An error was signalled by the server",
            "Index already exists".to_string(),
        ));
        assert!(!is_unknown_index(&native));
    }
}
