//! Logging infrastructure for vroot
//!
//! Diagnostic lines go to `tracing` when the `logging` feature is enabled and
//! never into the data path. Targets follow the engine's layers:
//!
//! - `vroot::path`: lookup detail (TRACE/DEBUG)
//! - `vroot::alias`: alias registration and collisions (INFO/WARN)
//! - `vroot::fsio`: denials, directory scans, host failures (DEBUG/WARN)
//!
//! # Security
//!
//! Every path is client-controlled, so logged values are escaped (no log
//! injection through embedded newlines) and truncated.

use std::borrow::Cow;

/// Default maximum length of a logged value.
pub const DEFAULT_MAX_VALUE_LENGTH: usize = 200;

/// Configuration for log-sink formatting.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogConfig {
    /// Maximum length of logged values before truncation (default: 200)
    pub max_value_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            max_value_length: DEFAULT_MAX_VALUE_LENGTH,
        }
    }
}

impl LogConfig {
    /// Create a new log configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum length for logged values
    pub fn max_value_length(mut self, len: usize) -> Self {
        self.max_value_length = len;
        self
    }

    /// Escape and truncate a path for logging.
    pub fn path<'a>(&self, path: &'a str) -> Cow<'a, str> {
        if path.chars().any(char::is_control) {
            Cow::Owned(self.truncate(&sanitize_for_log(path)).into_owned())
        } else {
            self.truncate(path)
        }
    }

    /// Truncate value if it exceeds max length
    ///
    /// Handles UTF-8 char boundaries properly to avoid panics on multi-byte chars.
    pub fn truncate<'a>(&self, value: &'a str) -> Cow<'a, str> {
        if value.len() <= self.max_value_length {
            Cow::Borrowed(value)
        } else {
            let mut end = self.max_value_length;
            while end > 0 && !value.is_char_boundary(end) {
                end -= 1;
            }
            Cow::Owned(format!(
                "{}...[truncated {} bytes]",
                &value[..end],
                value.len() - end
            ))
        }
    }
}

/// Sanitize a value for logging.
///
/// Escapes line breaks and tabs, drops other control characters.
pub fn sanitize_for_log(input: &str) -> String {
    input
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

macro_rules! vroot_trace {
    ($target:literal, $($arg:tt)+) => {
        #[cfg(feature = "logging")]
        tracing::trace!(target: $target, $($arg)+);
    };
}

macro_rules! vroot_debug {
    ($target:literal, $($arg:tt)+) => {
        #[cfg(feature = "logging")]
        tracing::debug!(target: $target, $($arg)+);
    };
}

macro_rules! vroot_info {
    ($target:literal, $($arg:tt)+) => {
        #[cfg(feature = "logging")]
        tracing::info!(target: $target, $($arg)+);
    };
}

macro_rules! vroot_warn {
    ($target:literal, $($arg:tt)+) => {
        #[cfg(feature = "logging")]
        tracing::warn!(target: $target, $($arg)+);
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_escapes_newlines() {
        assert_eq!(sanitize_for_log("/pub\nfake entry"), "/pub\\nfake entry");
        assert_eq!(sanitize_for_log("a\tb\rc"), "a\\tb\\rc");
        assert_eq!(sanitize_for_log("bell\u{7}"), "bell");
    }

    #[test]
    fn path_borrows_clean_values() {
        let config = LogConfig::new();
        assert!(matches!(config.path("/store/pub"), Cow::Borrowed(_)));
        assert_eq!(config.path("/a\nb"), "/a\\nb");
    }

    #[test]
    fn truncation() {
        let config = LogConfig::new().max_value_length(10);
        let long_value = "/".repeat(30);
        let truncated = config.truncate(&long_value);
        assert!(truncated.starts_with("//////////..."));
        assert!(truncated.ends_with("[truncated 20 bytes]"));
    }

    #[test]
    fn truncation_respects_char_boundaries() {
        let config = LogConfig::new().max_value_length(3);
        // 'é' is two bytes; byte 3 falls inside the second one
        let truncated = config.truncate("éé");
        assert!(truncated.starts_with("é..."));
    }

    #[test]
    fn deserializes_with_defaults() {
        let config: LogConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.max_value_length, DEFAULT_MAX_VALUE_LENGTH);
    }
}
