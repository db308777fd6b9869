//! Error types for vroot
//!
//! This module provides error types for the path engine with the following design goals:
//! - Denials surface as ordinary OS error codes to the host
//! - No leakage of sensitive information (resolved paths, base directory, alias targets)
//! - Clear categorization for programmatic handling
//!
//! Detail about *which* path was denied goes to the log sink only.

use std::io;
use thiserror::Error;

/// Result type alias using vroot's Error.
pub type Result<T> = std::result::Result<T, Error>;

/// vroot error types.
///
/// Messages are safe to show to end users: they name the condition, never the
/// path that triggered it.
#[derive(Error, Debug)]
pub enum Error {
    /// A required input was empty or malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The request tried to leave the virtual root, or to delete an alias.
    #[error("permission denied: {0}")]
    PermissionDenied(&'static str),

    /// A resolved or intermediate path exceeded the configured maximum.
    #[error("path too long: {len} bytes exceeds limit of {max}")]
    NameTooLong { len: usize, max: usize },

    /// An alias is already registered for this virtual path.
    #[error("alias already exists")]
    AlreadyExists,

    /// No alias is registered for this virtual path.
    #[error("no such alias")]
    NotFound,

    /// The primitive is intentionally not offered.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// The session's interrupt flag was raised during resolution.
    #[error("interrupted")]
    Interrupted,

    /// The session configuration could not be parsed.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error from the host filesystem, passed through unchanged.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Create a name-too-long error.
    pub fn name_too_long(len: usize, max: usize) -> Self {
        Self::NameTooLong { len, max }
    }

    /// The errno a C host would report for this error.
    ///
    /// Host I/O errors report their own code (if they carry one).
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::InvalidArgument(_) | Error::Config(_) => Some(libc::EINVAL),
            Error::PermissionDenied(_) => Some(libc::EACCES),
            Error::NameTooLong { .. } => Some(libc::ENAMETOOLONG),
            Error::AlreadyExists => Some(libc::EEXIST),
            Error::NotFound => Some(libc::ENOENT),
            Error::Unsupported(_) => Some(libc::ENOSYS),
            Error::Interrupted => Some(libc::EINTR),
            Error::Io(err) => err.raw_os_error(),
        }
    }

    /// Whether this error was injected by the engine rather than the host.
    pub fn is_denial(&self) -> bool {
        matches!(self, Error::PermissionDenied(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<Error> for io::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Io(err) => err,
            other => match other.raw_os_error() {
                Some(code) => io::Error::from_raw_os_error(code),
                None => io::Error::other(other.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denials_map_to_eacces() {
        let err = Error::PermissionDenied("alias is read-only");
        assert_eq!(err.raw_os_error(), Some(libc::EACCES));
        assert!(err.is_denial());

        let io: io::Error = err.into();
        assert_eq!(io.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn host_errors_pass_through() {
        let host = io::Error::from_raw_os_error(libc::ENOTDIR);
        let err = Error::from(host);
        assert_eq!(err.raw_os_error(), Some(libc::ENOTDIR));

        let back: io::Error = err.into();
        assert_eq!(back.raw_os_error(), Some(libc::ENOTDIR));
    }

    #[test]
    fn name_too_long_reports_lengths() {
        let err = Error::name_too_long(5000, 4096);
        assert_eq!(err.raw_os_error(), Some(libc::ENAMETOOLONG));
        assert_eq!(
            err.to_string(),
            "path too long: 5000 bytes exceeds limit of 4096"
        );
    }

    #[test]
    fn messages_do_not_contain_paths() {
        let err = Error::PermissionDenied("path traversal");
        assert!(!err.to_string().contains('/'));
        assert_eq!(Error::AlreadyExists.to_string(), "alias already exists");
    }

    #[test]
    fn config_error_from_json() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = Error::from(json_err);
        assert!(matches!(err, Error::Config(_)));
        assert_eq!(err.raw_os_error(), Some(libc::EINVAL));
    }
}
