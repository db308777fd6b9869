//! Session configuration.
//!
//! A [`VrootConfig`] carries everything an operator sets up for a session:
//! whether the engine is on, the root to confine to, the aliases to install
//! and the tunables. It deserializes from JSON:
//!
//! ```json
//! {
//!   "engine": true,
//!   "root": "/srv/ftp/store",
//!   "aliases": [{ "source": "/var/shared", "destination": "/pub" }],
//!   "options": { "allow_symlinks": false, "server_root": "/srv/ftp" },
//!   "limits": { "max_path_length": 4096, "max_symlink_depth": 32 },
//!   "log": { "max_value_length": 200 }
//! }
//! ```
//!
//! Every field is optional; unknown fields are rejected.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::limits::PathLimits;
use crate::logging::LogConfig;

/// Full session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct VrootConfig {
    /// Master switch. When off the session behaves like the plain host
    /// filesystem.
    pub engine: bool,
    /// Directory the session is confined to.
    pub root: Option<String>,
    /// Aliases installed after the root.
    pub aliases: Vec<AliasConfig>,
    pub options: VrootOptions,
    pub limits: PathLimits,
    pub log: LogConfig,
}

impl Default for VrootConfig {
    fn default() -> Self {
        Self {
            engine: true,
            root: None,
            aliases: Vec::new(),
            options: VrootOptions::default(),
            limits: PathLimits::default(),
            log: LogConfig::default(),
        }
    }
}

impl VrootConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration document.
    ///
    /// # Example
    ///
    /// ```rust
    /// use vroot::VrootConfig;
    ///
    /// let config = VrootConfig::from_json(r#"{"root": "/srv/ftp", "options": {"allow_symlinks": true}}"#)?;
    /// assert!(config.engine);
    /// assert_eq!(config.root.as_deref(), Some("/srv/ftp"));
    /// assert!(config.options.allow_symlinks);
    /// # Ok::<(), vroot::Error>(())
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Enable or disable the engine.
    pub fn engine(mut self, enabled: bool) -> Self {
        self.engine = enabled;
        self
    }

    /// Set the root directory.
    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Add an alias: the real path `source` appears at virtual `destination`.
    pub fn alias(mut self, source: impl Into<String>, destination: impl Into<String>) -> Self {
        self.aliases.push(AliasConfig {
            source: source.into(),
            destination: destination.into(),
        });
        self
    }

    pub fn options(mut self, options: VrootOptions) -> Self {
        self.options = options;
        self
    }

    pub fn limits(mut self, limits: PathLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn log(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    fn validate(&self) -> Result<()> {
        if let Some(root) = &self.root {
            if !root.starts_with('/') {
                return Err(Error::Config(format!("root must be absolute: {root}")));
            }
        }
        if let Some(server_root) = &self.options.server_root {
            if !server_root.starts_with('/') {
                return Err(Error::Config(format!(
                    "server_root must be absolute: {server_root}"
                )));
            }
        }
        if self.limits.max_path_length == 0 {
            return Err(Error::Config("max_path_length must be positive".into()));
        }
        Ok(())
    }
}

/// One configured alias.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AliasConfig {
    /// Real path on the host.
    pub source: String,
    /// Virtual path the source appears at.
    pub destination: String,
}

/// Behavior switches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct VrootOptions {
    /// Report symlinks as symlinks from `lstat`. Off by default: symlinks
    /// look like their targets so clients never see links pointing outside
    /// the root.
    pub allow_symlinks: bool,
    /// Real chroot for the whole server. Session roots beneath it are
    /// reached by a real `chroot(2)` here plus a vroot base for the
    /// remainder.
    pub server_root: Option<String>,
}

impl VrootOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow_symlinks(mut self, allow: bool) -> Self {
        self.allow_symlinks = allow;
        self
    }

    pub fn server_root(mut self, root: impl Into<String>) -> Self {
        self.server_root = Some(root.into());
        self
    }
}

/// Outcome of installing configured aliases.
///
/// Rejected aliases never fail the session; they are logged and counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AliasReport {
    pub installed: usize,
    pub skipped: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let config = VrootConfig::from_json("{}").unwrap();
        assert_eq!(config, VrootConfig::default());
        assert!(config.engine);
        assert!(!config.options.allow_symlinks);
        assert_eq!(config.limits.max_path_length, 4096);
        assert_eq!(config.log.max_value_length, 200);
    }

    #[test]
    fn full_document() {
        let config = VrootConfig::from_json(
            r#"{
                "engine": true,
                "root": "/srv/ftp/store",
                "aliases": [
                    {"source": "/var/shared", "destination": "/pub"},
                    {"source": "/tmp", "destination": "tmp"}
                ],
                "options": {"allow_symlinks": true, "server_root": "/srv/ftp"},
                "limits": {"max_path_length": 1024, "max_symlink_depth": 8},
                "log": {"max_value_length": 64}
            }"#,
        )
        .unwrap();

        let expected = VrootConfig::new()
            .root("/srv/ftp/store")
            .alias("/var/shared", "/pub")
            .alias("/tmp", "tmp")
            .options(
                VrootOptions::new()
                    .allow_symlinks(true)
                    .server_root("/srv/ftp"),
            )
            .limits(PathLimits::new().max_path_length(1024).max_symlink_depth(8))
            .log(LogConfig::new().max_value_length(64));
        assert_eq!(config, expected);
    }

    #[test]
    fn unknown_fields_rejected() {
        let err = VrootConfig::from_json(r#"{"rooot": "/srv"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err = VrootConfig::from_json(r#"{"options": {"symlinks": true}}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn relative_root_rejected() {
        let err = VrootConfig::from_json(r#"{"root": "srv"}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));

        let err =
            VrootConfig::from_json(r#"{"options": {"server_root": "srv"}}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn zero_path_length_rejected() {
        let err = VrootConfig::from_json(r#"{"limits": {"max_path_length": 0}}"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn from_file_reads_json() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("vroot.json");
        std::fs::write(&path, r#"{"engine": false}"#).unwrap();
        assert!(!VrootConfig::from_file(&path).unwrap().engine);

        let missing = VrootConfig::from_file(tmp.path().join("missing.json")).unwrap_err();
        assert!(matches!(missing, Error::Io(_)));
    }

    #[test]
    fn serializes_back() {
        let config = VrootConfig::new().root("/srv").alias("/a", "/b");
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(VrootConfig::from_json(&json).unwrap(), config);
    }
}
