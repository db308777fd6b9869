//! Path resolution limits.
//!
//! # Security Mitigations
//!
//! - **Long paths**: every buffer the resolver assembles is bounded by
//!   `max_path_length`; exceeding it is `NameTooLong`, never truncation.
//! - **Symlink loops**: directory opens follow at most `max_symlink_depth`
//!   links before failing with `ELOOP`.

use crate::error::{Error, Result};

/// Default maximum total path length: 4096 bytes (Linux `PATH_MAX`)
pub const DEFAULT_MAX_PATH_LENGTH: usize = 4096;

/// Default maximum number of symlinks followed by `opendir`: 32
pub const DEFAULT_MAX_SYMLINK_DEPTH: usize = 32;

/// Path resolution limits.
///
/// # Example
///
/// ```rust
/// use vroot::PathLimits;
///
/// let limits = PathLimits::new().max_path_length(1024);
/// assert!(limits.check_length(1023).is_ok());
/// assert!(limits.check_length(1024).is_err());
/// ```
///
/// # Default Limits
///
/// | Limit | Default | Purpose |
/// |-------|---------|---------|
/// | `max_path_length` | 4096 | Resolved path length |
/// | `max_symlink_depth` | 32 | Links followed when opening a directory |
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathLimits {
    /// Maximum resolved path length in bytes (exclusive).
    /// Default: 4096 bytes
    pub max_path_length: usize,

    /// Maximum number of symbolic links followed while opening a directory.
    /// Default: 32
    pub max_symlink_depth: usize,
}

impl Default for PathLimits {
    fn default() -> Self {
        Self {
            max_path_length: DEFAULT_MAX_PATH_LENGTH,
            max_symlink_depth: DEFAULT_MAX_SYMLINK_DEPTH,
        }
    }
}

impl PathLimits {
    /// Create new limits with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create limits with no practical bound.
    pub fn unlimited() -> Self {
        Self {
            max_path_length: usize::MAX,
            max_symlink_depth: usize::MAX,
        }
    }

    /// Set maximum path length.
    pub fn max_path_length(mut self, len: usize) -> Self {
        self.max_path_length = len;
        self
    }

    /// Set maximum symlink depth.
    pub fn max_symlink_depth(mut self, depth: usize) -> Self {
        self.max_symlink_depth = depth;
        self
    }

    /// Check a buffer length against the path bound.
    ///
    /// The bound is exclusive, leaving room for a terminator on hosts that
    /// need one.
    pub fn check_length(&self, len: usize) -> Result<()> {
        if len >= self.max_path_length {
            return Err(Error::name_too_long(len, self.max_path_length));
        }
        Ok(())
    }
}
