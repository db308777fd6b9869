//! Virtual-to-real path resolution.
//!
//! Every relative movement is string surgery against a fixed base prefix, so
//! the host filesystem is never asked to resolve `..`. A resolved path always
//! starts with the base unless an alias substitutes an administrator-configured
//! prefix.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use super::clean::{clean_in_place, trim_trailing_slash, trim_trailing_slashes};
use crate::alias::AliasTable;
use crate::error::{Error, Result};
use crate::limits::PathLimits;

/// Options for [`Resolver::lookup`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupFlags {
    /// Do not follow aliases; report the path as it lies under the base.
    pub no_alias: bool,
}

impl LookupFlags {
    /// Follow aliases.
    pub const NONE: Self = Self { no_alias: false };
    /// Stop at the virtual path, ignoring aliases.
    pub const NO_ALIAS: Self = Self { no_alias: true };
}

/// Result of a lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    /// Path to hand to the host filesystem.
    pub real: String,
    /// Full virtual path when the lookup crossed an alias boundary.
    pub alias: Option<String>,
}

/// Path resolver for one session.
///
/// Owns the base path, the alias table and the tracked virtual working
/// directory.
///
/// # Example
///
/// ```rust
/// use vroot::{LookupFlags, Resolver};
///
/// let mut resolver = Resolver::new();
/// resolver.set_base("/store")?;
///
/// let resolved = resolver.lookup("/pub/../incoming", LookupFlags::NONE)?;
/// assert_eq!(resolved.real, "/store/incoming");
///
/// // Already-real paths are not prefixed twice.
/// assert_eq!(resolver.lookup("/store/incoming", LookupFlags::NONE)?.real, "/store/incoming");
/// # Ok::<(), vroot::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Resolver {
    base: Option<String>,
    aliases: AliasTable,
    cwd: String,
    limits: PathLimits,
    interrupt: Option<Arc<AtomicBool>>,
}

impl Default for Resolver {
    fn default() -> Self {
        Self::new()
    }
}

impl Resolver {
    /// Create a resolver with no base, no aliases and cwd `/`.
    pub fn new() -> Self {
        Self::with_limits(PathLimits::default())
    }

    pub fn with_limits(limits: PathLimits) -> Self {
        Self {
            base: None,
            aliases: AliasTable::new(),
            cwd: "/".to_string(),
            limits,
            interrupt: None,
        }
    }

    pub fn limits(&self) -> &PathLimits {
        &self.limits
    }

    /// Replace the limits. Already-installed paths are not rechecked.
    pub fn set_limits(&mut self, limits: PathLimits) {
        self.limits = limits;
    }

    /// Install the base path, replacing any previous one.
    ///
    /// The base is cleaned and trailing slashes are dropped (root stays `/`).
    pub fn set_base(&mut self, base: &str) -> Result<()> {
        if base.is_empty() {
            return Err(Error::InvalidArgument("empty base path"));
        }
        if !base.starts_with('/') {
            return Err(Error::InvalidArgument("base path must be absolute"));
        }

        let mut buf = base.to_owned();
        clean_in_place(&mut buf);
        trim_trailing_slashes(&mut buf);
        self.limits.check_length(buf.len())?;

        vroot_debug!("vroot::path", base = %buf, "installed vroot base");
        self.base = Some(buf);
        Ok(())
    }

    /// Current base path, if one is installed.
    pub fn base(&self) -> Option<&str> {
        self.base.as_deref()
    }

    pub fn has_base(&self) -> bool {
        self.base.is_some()
    }

    pub fn clear_base(&mut self) {
        self.base = None;
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    pub fn aliases_mut(&mut self) -> &mut AliasTable {
        &mut self.aliases
    }

    /// Tracked virtual working directory.
    pub fn cwd(&self) -> &str {
        &self.cwd
    }

    /// Set the tracked virtual working directory.
    pub fn set_cwd(&mut self, cwd: &str) -> Result<()> {
        if !cwd.starts_with('/') {
            return Err(Error::InvalidArgument("working directory must be absolute"));
        }
        let mut buf = cwd.to_owned();
        clean_in_place(&mut buf);
        trim_trailing_slash(&mut buf);
        self.limits.check_length(buf.len())?;
        self.cwd = buf;
        Ok(())
    }

    /// Return the tracked working directory to `/`.
    pub fn reset_cwd(&mut self) {
        self.cwd = "/".to_string();
    }

    /// Install a flag that aborts long resolutions when raised.
    pub fn set_interrupt(&mut self, flag: Arc<AtomicBool>) {
        self.interrupt = Some(flag);
    }

    fn check_interrupt(&self) -> Result<()> {
        match &self.interrupt {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(Error::Interrupted),
            _ => Ok(()),
        }
    }

    fn base_str(&self) -> &str {
        self.base.as_deref().unwrap_or("")
    }

    /// The base with exactly one trailing `/`.
    fn base_root(&self) -> String {
        let base = self.base_str();
        if base.ends_with('/') {
            base.to_owned()
        } else {
            format!("{base}/")
        }
    }

    /// Whether `path` lies strictly below the base.
    pub fn is_within_base(&self, path: &str) -> bool {
        let base = self.base_str();
        if base.len() <= 1 {
            return path.starts_with('/');
        }
        path.starts_with(base) && path[base.len()..].starts_with('/')
    }

    /// Express a real path relative to the base (`/` for the base itself).
    ///
    /// Paths outside the base are returned unchanged.
    pub fn strip_base<'a>(&self, path: &'a str) -> &'a str {
        let base = self.base_str();
        if base.len() <= 1 || !path.starts_with(base) {
            return path;
        }
        match &path[base.len()..] {
            "" => "/",
            rest if rest.starts_with('/') => rest,
            _ => path,
        }
    }

    /// Clean a path, anchoring relative paths at the virtual cwd when
    /// `absolute` is set. One trailing `/` is dropped.
    pub fn realpath(&self, path: &str, absolute: bool) -> String {
        let mut buf = if absolute && !path.starts_with('/') {
            format!("{}/{}", self.cwd, path)
        } else {
            path.to_owned()
        };
        clean_in_place(&mut buf);
        trim_trailing_slash(&mut buf);
        buf
    }

    /// Resolve a requested path to the real path under the base.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty path
    /// - `PermissionDenied` for a standalone `..` segment that would escape
    /// - `NameTooLong` when any assembled buffer reaches the path limit
    /// - `Interrupted` when the interrupt flag is raised
    pub fn lookup(&self, path: &str, flags: LookupFlags) -> Result<Resolved> {
        if path.is_empty() {
            return Err(Error::InvalidArgument("empty path"));
        }

        let mut buf = if path == "." {
            self.cwd.clone()
        } else {
            path.to_owned()
        };
        self.limits.check_length(buf.len())?;
        clean_in_place(&mut buf);

        // Paths already expressed under the base would otherwise be prefixed
        // twice. The base alone ("/store") is not stripped and resolves to
        // "/store/store".
        let base = self.base_str();
        let mut rest: &str = &buf;
        if base.len() > 1 && rest.starts_with(base) && rest[base.len()..].starts_with('/') {
            rest = &rest[base.len()..];
        }

        let mut out = String::new();
        loop {
            self.check_interrupt()?;

            if rest == ".." || rest.starts_with("../") {
                match out.rfind('/') {
                    Some(i) => out.truncate(i),
                    None => out.clear(),
                }
                if out.is_empty() || !self.is_within_base(&out) {
                    out = self.base_root();
                }
                rest = rest.get(3..).unwrap_or("");
            } else if let Some(tail) = rest.strip_prefix('/') {
                out = self.base_root();
                rest = tail;
            } else {
                if !rest.is_empty() {
                    if rest.split('/').any(|segment| segment == "..") {
                        vroot_debug!(
                            "vroot::path",
                            path = %crate::logging::sanitize_for_log(path),
                            "denying path traversal"
                        );
                        return Err(Error::PermissionDenied("path traversal"));
                    }
                    self.limits.check_length(out.len() + 1 + rest.len())?;
                    out.push('/');
                    out.push_str(rest);
                }
                break;
            }
        }

        clean_in_place(&mut out);
        if out.is_empty() {
            out = self.base_root();
        }

        let mut alias = None;
        if !flags.no_alias && !self.aliases.is_empty() {
            let mut end = out.len();
            loop {
                self.check_interrupt()?;

                let candidate = &out[..end];
                vroot_trace!("vroot::path", candidate = %candidate, "checking for alias");
                if let Some(src) = self.aliases.get(candidate) {
                    let suffix = &out[end..];
                    let real = match src.strip_suffix('/') {
                        Some(head) if suffix.starts_with('/') => format!("{head}{suffix}"),
                        _ => format!("{src}{suffix}"),
                    };
                    self.limits.check_length(real.len())?;
                    vroot_trace!("vroot::path", alias = %out, real = %real, "resolved through alias");
                    alias = Some(std::mem::replace(&mut out, real));
                    break;
                }

                // Root is never an alias candidate unless it is the whole path.
                match candidate.rfind('/') {
                    Some(i) if i > 0 => end = i,
                    _ => break,
                }
            }
        }

        vroot_trace!("vroot::path", requested = %path, real = %out, "lookup");
        Ok(Resolved { real: out, alias })
    }

    /// Register an alias from configuration: `src` is a real path, `dst` the
    /// virtual path it appears at.
    ///
    /// The destination is resolved under the base without following other
    /// aliases. An alias whose destination is the very place its source
    /// already resolves to inside the vroot is rejected.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for empty or relative sources, empty destinations,
    ///   or self-mapping aliases
    /// - `AlreadyExists` if the destination is already aliased
    pub fn add_alias(&mut self, src: &str, dst: &str) -> Result<()> {
        if src.is_empty() || dst.is_empty() {
            return Err(Error::InvalidArgument("alias paths must not be empty"));
        }
        if !src.starts_with('/') {
            return Err(Error::InvalidArgument("alias source must be absolute"));
        }

        let mut src_path = src.to_owned();
        clean_in_place(&mut src_path);
        trim_trailing_slashes(&mut src_path);

        let dst_virtual = if dst.starts_with('/') {
            dst.to_owned()
        } else {
            format!("/{dst}")
        };
        let mut dst_path = self.lookup(&dst_virtual, LookupFlags::NO_ALIAS)?.real;
        trim_trailing_slashes(&mut dst_path);

        let mut src_vpath = self.lookup(&src_path, LookupFlags::NO_ALIAS)?.real;
        trim_trailing_slashes(&mut src_vpath);
        if dst_path == src_vpath {
            vroot_warn!(
                "vroot::alias",
                alias = %dst_path,
                real = %src_path,
                "alias maps to its real path inside the vroot, ignoring"
            );
            return Err(Error::InvalidArgument("alias maps to its own real path"));
        }

        self.aliases.add(&dst_path, &src_path)?;
        vroot_info!("vroot::alias", alias = %dst_path, real = %src_path, "aliased");
        Ok(())
    }
}
