//! The virtual-root filesystem.
//!
//! [`VrootFs`] wraps a [`HostFs`] and translates every path through the
//! session's [`Resolver`] before delegating. Operations that name a path are
//! resolved; operations on open handles (read, write, seek, close of files)
//! never pass through here and need no translation.
//!
//! # Bypass
//!
//! With no base installed, or while the session is writing its own logs or
//! tearing down, primitives go straight to the host with the caller's path.
//! `unlink` is the exception: it bypasses only when no base is installed.
//!
//! # Security Mitigations
//!
//! - **Escapes**: resolution never asks the host to interpret `..`
//! - **Alias deletion**: `unlink`/`rmdir` of an alias path is denied
//! - **Symlink leakage**: `lstat` reports link targets unless symlinks are
//!   explicitly allowed
//! - **Symlink loops**: `opendir` follows a bounded number of links

use std::borrow::Cow;
use std::fs::{File, OpenOptions};
use std::io;
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::time::SystemTime;

use super::dirs::{DirHandle, DirTable};
use super::host::StdFs;
use super::traits::{DirEntry, HostFs, Metadata};
use crate::config::{AliasConfig, AliasReport, VrootConfig, VrootOptions};
use crate::error::{Error, Result};
use crate::limits::PathLimits;
use crate::logging::LogConfig;
use crate::path::{
    LookupFlags, Resolver, basename, clean_in_place, parent, trim_trailing_slash,
    trim_trailing_slashes,
};

/// Where the host session currently is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Phase {
    /// Serving client requests; paths are translated.
    #[default]
    Normal,
    /// Writing the host's own logs; paths refer to the real filesystem.
    Logging,
    /// Shutting down; paths refer to the real filesystem.
    Aborted,
}

impl Phase {
    fn bypasses(self) -> bool {
        !matches!(self, Phase::Normal)
    }
}

/// Filesystem view confined to a base directory.
///
/// # Example
///
/// ```rust,no_run
/// use vroot::{StdFs, VrootConfig, VrootFs};
///
/// let config = VrootConfig::new()
///     .root("/srv/ftp/store")
///     .alias("/var/shared", "/pub");
/// let (mut fs, report) = VrootFs::from_config(StdFs::new(), &config)?;
/// assert_eq!(report.installed, 1);
///
/// // "/pub/readme.txt" is served from /var/shared/readme.txt; the listing of
/// // "/" shows a "pub" entry even though /srv/ftp/store has none.
/// let meta = fs.stat("/pub/readme.txt")?;
/// let names: Vec<String> = fs.read_dir("/")?.into_iter().map(|e| e.name).collect();
/// # Ok::<(), vroot::Error>(())
/// ```
#[derive(Debug)]
pub struct VrootFs<H: HostFs = StdFs> {
    host: H,
    resolver: Resolver,
    options: VrootOptions,
    log: LogConfig,
    phase: Phase,
    chroot_path: Option<String>,
    dirs: DirTable,
}

impl<H: HostFs> VrootFs<H> {
    /// Create an inactive session over `host`. Every primitive bypasses until
    /// [`chroot`](Self::chroot) installs a base.
    pub fn new(host: H) -> Self {
        Self {
            host,
            resolver: Resolver::new(),
            options: VrootOptions::default(),
            log: LogConfig::default(),
            phase: Phase::Normal,
            chroot_path: None,
            dirs: DirTable::default(),
        }
    }

    /// Create a session and apply `config` to it.
    pub fn from_config(host: H, config: &VrootConfig) -> Result<(Self, AliasReport)> {
        let mut fs = Self::new(host);
        let report = fs.configure(config)?;
        Ok((fs, report))
    }

    pub fn with_options(mut self, options: VrootOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_limits(mut self, limits: PathLimits) -> Self {
        self.resolver.set_limits(limits);
        self
    }

    pub fn with_log_config(mut self, log: LogConfig) -> Self {
        self.log = log;
        self
    }

    /// Apply a configuration: options and limits first, then the root, then
    /// aliases.
    ///
    /// # Errors
    ///
    /// Fails if the root cannot be installed. Individual aliases never fail
    /// the call; see the returned report.
    pub fn configure(&mut self, config: &VrootConfig) -> Result<AliasReport> {
        self.options = config.options.clone();
        self.log = config.log.clone();
        self.resolver.set_limits(config.limits.clone());

        if !config.engine {
            vroot_debug!("vroot::fsio", "engine disabled, not installing root");
            return Ok(AliasReport::default());
        }
        if let Some(root) = &config.root {
            self.chroot(root)?;
        }
        Ok(self.install_aliases(&config.aliases))
    }

    /// Install aliases. Aliases are only meaningful once a base exists;
    /// without one every entry is skipped.
    pub fn install_aliases(&mut self, aliases: &[AliasConfig]) -> AliasReport {
        let mut report = AliasReport::default();
        if !self.resolver.has_base() {
            if !aliases.is_empty() {
                vroot_debug!("vroot::alias", count = aliases.len(), "no vroot base, skipping aliases");
            }
            report.skipped = aliases.len();
            return report;
        }

        for alias in aliases {
            match self.resolver.add_alias(&alias.source, &alias.destination) {
                Ok(()) => report.installed += 1,
                Err(Error::AlreadyExists) => {
                    vroot_warn!(
                        "vroot::alias",
                        alias = %self.log.path(&alias.destination),
                        "alias already configured, ignoring"
                    );
                    report.skipped += 1;
                }
                Err(_err) => {
                    vroot_warn!(
                        "vroot::alias",
                        alias = %self.log.path(&alias.destination),
                        real = %self.log.path(&alias.source),
                        error = %_err,
                        "error stashing alias"
                    );
                    report.skipped += 1;
                }
            }
        }
        report
    }

    /// Drop all session state: base, aliases, open directories and cwd.
    pub fn teardown(&mut self) {
        self.resolver.clear_base();
        self.resolver.aliases_mut().clear();
        self.resolver.reset_cwd();
        self.dirs.clear();
        self.chroot_path = None;
        self.phase = Phase::Normal;
        vroot_debug!("vroot::fsio", "session torn down");
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn options(&self) -> &VrootOptions {
        &self.options
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Tracked virtual working directory.
    pub fn cwd(&self) -> &str {
        self.resolver.cwd()
    }

    /// Path of the real `chroot(2)` performed by [`chroot`](Self::chroot):
    /// the server root, or `/` when none was used.
    pub fn chroot_path(&self) -> Option<&str> {
        self.chroot_path.as_deref()
    }

    /// Install a flag that aborts long resolutions when raised.
    pub fn set_interrupt(&mut self, flag: Arc<AtomicBool>) {
        self.resolver.set_interrupt(flag);
    }

    /// Number of directories currently open.
    pub fn open_dirs(&self) -> usize {
        self.dirs.len()
    }

    fn bypass(&self) -> bool {
        !self.resolver.has_base() || self.phase.bypasses()
    }

    /// Anchor a relative path at the virtual cwd.
    fn anchored<'a>(&self, path: &'a str) -> Cow<'a, str> {
        if path.starts_with('/') || path == "." || path.is_empty() {
            Cow::Borrowed(path)
        } else {
            Cow::Owned(format!("{}/{}", self.resolver.cwd(), path))
        }
    }

    /// Real path for a client path.
    fn resolve(&self, path: &str) -> Result<String> {
        if path.is_empty() {
            return Err(Error::InvalidArgument("empty path"));
        }
        let cleaned = self.resolver.realpath(path, true);
        Ok(self.resolver.lookup(&cleaned, LookupFlags::NONE)?.real)
    }

    /// Cleaned, anchored, trailing-slash-free form used for alias checks.
    fn normalized(&self, path: &str) -> Result<String> {
        if path.is_empty() {
            return Err(Error::InvalidArgument("empty path"));
        }
        let mut buf = self.anchored(path).into_owned();
        clean_in_place(&mut buf);
        trim_trailing_slash(&mut buf);
        Ok(buf)
    }

    fn is_alias(&self, path: &str) -> Result<bool> {
        if self.resolver.aliases().is_empty() {
            return Ok(false);
        }
        let mut vpath = self.resolver.lookup(path, LookupFlags::NO_ALIAS)?.real;
        trim_trailing_slashes(&mut vpath);
        Ok(self.resolver.aliases().exists(&vpath))
    }

    /// Metadata, following symlinks.
    pub fn stat(&self, path: &str) -> Result<Metadata> {
        if self.bypass() {
            return Ok(self.host.stat(Path::new(path))?);
        }
        let real = self.resolve(path)?;
        Ok(self.host.stat(Path::new(&real))?)
    }

    /// Metadata without following the final symlink.
    ///
    /// Unless symlinks are allowed, links that are not aliases are reported
    /// as their targets. Aliases always report the entry itself.
    pub fn lstat(&self, path: &str) -> Result<Metadata> {
        if self.bypass() {
            return Ok(self.host.lstat(Path::new(path))?);
        }
        let vpath = self.normalized(path)?;
        let real = self.resolver.lookup(&vpath, LookupFlags::NONE)?.real;
        let real = Path::new(&real);

        if !self.options.allow_symlinks && !self.is_alias(&vpath)? {
            let meta = self.host.lstat(real)?;
            if !meta.file_type.is_symlink() {
                return Ok(meta);
            }
            return Ok(self.host.stat(real)?);
        }
        Ok(self.host.lstat(real)?)
    }

    pub fn rename(&self, from: &str, to: &str) -> Result<()> {
        if self.bypass() {
            return Ok(self.host.rename(Path::new(from), Path::new(to))?);
        }
        let from = self.resolve(from)?;
        let to = self.resolve(to)?;
        Ok(self.host.rename(Path::new(&from), Path::new(&to))?)
    }

    /// Remove a file.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` when `path` is an alias.
    pub fn unlink(&self, path: &str) -> Result<()> {
        if !self.resolver.has_base() {
            return Ok(self.host.unlink(Path::new(path))?);
        }
        let real = self.guarded_delete_target(path)?;
        Ok(self.host.unlink(Path::new(&real))?)
    }

    pub fn open(&self, path: &str, options: &OpenOptions) -> Result<File> {
        if self.bypass() {
            return Ok(self.host.open(Path::new(path), options)?);
        }
        let real = self.resolve(path)?;
        Ok(self.host.open(Path::new(&real), options)?)
    }

    /// Not offered: callers use [`open`](Self::open) with `create(true)`.
    pub fn creat(&self, _path: &str, _mode: u32) -> Result<File> {
        Err(Error::Unsupported("creat"))
    }

    pub fn link(&self, src: &str, dst: &str) -> Result<()> {
        if self.bypass() {
            return Ok(self.host.link(Path::new(src), Path::new(dst))?);
        }
        let src = self.resolve(src)?;
        let dst = self.resolve(dst)?;
        Ok(self.host.link(Path::new(&src), Path::new(&dst))?)
    }

    /// Create a symlink at `link`. The target is resolved like any other
    /// path, so links never point outside the root.
    pub fn symlink(&self, target: &str, link: &str) -> Result<()> {
        if self.bypass() {
            return Ok(self.host.symlink(Path::new(target), Path::new(link))?);
        }
        let target = self.resolve(target)?;
        let link = self.resolve(link)?;
        Ok(self.host.symlink(Path::new(&target), Path::new(&link))?)
    }

    /// Read a symlink.
    ///
    /// An alias path is read at its alias target. Otherwise the caller's
    /// path is resolved as given, without trailing-slash trimming.
    pub fn readlink(&self, path: &str) -> Result<PathBuf> {
        if self.bypass() {
            return Ok(self.host.read_link(Path::new(path))?);
        }
        if path.is_empty() {
            return Err(Error::InvalidArgument("empty path"));
        }
        let vpath = self.resolver.realpath(path, true);
        let resolved = self.resolver.lookup(&vpath, LookupFlags::NONE)?;
        let real = match resolved.alias {
            Some(_) => resolved.real,
            None => {
                self.resolver
                    .lookup(&self.anchored(path), LookupFlags::NONE)?
                    .real
            }
        };
        Ok(self.host.read_link(Path::new(&real))?)
    }

    pub fn truncate(&self, path: &str, len: u64) -> Result<()> {
        if self.bypass() {
            return Ok(self.host.truncate(Path::new(path), len)?);
        }
        let real = self.resolve(path)?;
        Ok(self.host.truncate(Path::new(&real), len)?)
    }

    pub fn chmod(&self, path: &str, mode: u32) -> Result<()> {
        if self.bypass() {
            return Ok(self.host.chmod(Path::new(path), mode)?);
        }
        let real = self.resolve(path)?;
        Ok(self.host.chmod(Path::new(&real), mode)?)
    }

    pub fn chown(&self, path: &str, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        if self.bypass() {
            return Ok(self.host.chown(Path::new(path), uid, gid)?);
        }
        let real = self.resolve(path)?;
        Ok(self.host.chown(Path::new(&real), uid, gid)?)
    }

    pub fn lchown(&self, path: &str, uid: Option<u32>, gid: Option<u32>) -> Result<()> {
        if self.bypass() {
            return Ok(self.host.lchown(Path::new(path), uid, gid)?);
        }
        let real = self.resolve(path)?;
        Ok(self.host.lchown(Path::new(&real), uid, gid)?)
    }

    pub fn utimes(&self, path: &str, accessed: SystemTime, modified: SystemTime) -> Result<()> {
        if self.bypass() {
            return Ok(self.host.utimes(Path::new(path), accessed, modified)?);
        }
        let real = self.resolve(path)?;
        Ok(self.host.utimes(Path::new(&real), accessed, modified)?)
    }

    pub fn mkdir(&self, path: &str, mode: u32) -> Result<()> {
        if self.bypass() {
            return Ok(self.host.mkdir(Path::new(path), mode)?);
        }
        let real = self.resolve(path)?;
        Ok(self.host.mkdir(Path::new(&real), mode)?)
    }

    /// Remove an empty directory.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` when `path` is an alias.
    pub fn rmdir(&self, path: &str) -> Result<()> {
        if self.bypass() {
            return Ok(self.host.rmdir(Path::new(path))?);
        }
        let real = self.guarded_delete_target(path)?;
        Ok(self.host.rmdir(Path::new(&real))?)
    }

    /// Real path to delete, refusing alias paths.
    fn guarded_delete_target(&self, path: &str) -> Result<String> {
        let vpath = self.normalized(path)?;
        if self.is_alias(&vpath)? {
            vroot_debug!(
                "vroot::fsio",
                path = %self.log.path(path),
                "denying delete of alias"
            );
            return Err(Error::PermissionDenied("alias cannot be deleted"));
        }
        Ok(self.resolver.lookup(&vpath, LookupFlags::NONE)?.real)
    }

    /// Confine the session to `path`.
    ///
    /// No real `chroot(2)` happens unless a server root is configured and
    /// `path` lies within it; then the process is chrooted to the server
    /// root and the remainder becomes the vroot base.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for empty or relative paths
    /// - `NameTooLong` if the base exceeds the path limit
    /// - host errors from the real `chroot(2)`
    pub fn chroot(&mut self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(Error::InvalidArgument("empty chroot path"));
        }
        if !path.starts_with('/') {
            return Err(Error::InvalidArgument("chroot path must be absolute"));
        }
        if path == "/" {
            vroot_debug!("vroot::fsio", "chroot to / is a no-op");
            return Ok(());
        }

        let mut chroot_path = String::from("/");
        let mut base = path;
        if let Some(server_root) = self.options.server_root.as_deref() {
            let root = server_root.trim_end_matches('/');
            let within = !root.is_empty()
                && path.starts_with(root)
                && matches!(path.as_bytes().get(root.len()), None | Some(b'/'));
            if within {
                if let Err(err) = self.host.chroot(Path::new(root)) {
                    vroot_warn!(
                        "vroot::fsio",
                        server_root = %self.log.path(root),
                        error = %err,
                        "error chrooting to server root"
                    );
                    return Err(err.into());
                }
                chroot_path = root.to_owned();
                base = &path[root.len()..];
            } else {
                vroot_debug!(
                    "vroot::fsio",
                    path = %self.log.path(path),
                    server_root = %self.log.path(server_root),
                    "path not within server root, using vroot only"
                );
            }
        }

        let base = if base.is_empty() { "/" } else { base };
        self.resolver.set_base(base)?;
        vroot_info!(
            "vroot::fsio",
            base = %self.log.path(self.resolver.base().unwrap_or("/")),
            chroot = %self.log.path(&chroot_path),
            "confined session"
        );
        self.chroot_path = Some(chroot_path);
        Ok(())
    }

    /// Change directory and track the new virtual cwd.
    ///
    /// The tracked cwd is the alias path when the target lies under an
    /// alias, otherwise the real path with the base stripped.
    pub fn chdir(&mut self, path: &str) -> Result<()> {
        if self.bypass() {
            return Ok(self.host.chdir(Path::new(path))?);
        }
        let vpath = self.normalized(path)?;
        let resolved = self.resolver.lookup(&vpath, LookupFlags::NONE)?;
        self.host.chdir(Path::new(&resolved.real))?;

        let vpath = resolved.alias.as_deref().unwrap_or(&resolved.real);
        let cwd = self.resolver.strip_base(vpath).to_owned();
        self.resolver.set_cwd(&cwd)?;
        vroot_trace!("vroot::fsio", cwd = %self.log.path(&cwd), "changed directory");
        Ok(())
    }

    /// Open a directory for reading.
    ///
    /// Symlinks are followed up to `max_symlink_depth`, each target resolved
    /// back into the root. Aliases living directly in the directory are
    /// overlaid on the listing.
    ///
    /// # Errors
    ///
    /// - `ELOOP` (as `Io`) when too many links are followed
    /// - host errors from opening the directory
    pub fn opendir(&mut self, path: &str) -> Result<DirHandle> {
        if self.bypass() {
            let stream = self.host.open_dir(Path::new(path))?;
            return Ok(self.dirs.insert(path.to_owned(), stream, Vec::new()));
        }

        let vpath = self.normalized(path)?;
        let mut real = self.resolver.lookup(&vpath, LookupFlags::NONE)?.real;
        real = self.follow_dir_links(real)?;

        let stream = match self.host.open_dir(Path::new(&real)) {
            Ok(stream) => stream,
            Err(err) => {
                vroot_debug!(
                    "vroot::fsio",
                    path = %self.log.path(&real),
                    error = %err,
                    "error opening directory"
                );
                return Err(err.into());
            }
        };

        let aliases = self.aliases_in(&vpath, &real)?;
        Ok(self.dirs.insert(real, stream, aliases))
    }

    /// Next entry of an open directory, `None` at the end.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for unknown or closed handles.
    pub fn readdir(&mut self, handle: DirHandle) -> Result<Option<DirEntry>> {
        let dir = self
            .dirs
            .get_mut(handle)
            .ok_or(Error::InvalidArgument("unknown directory handle"))?;
        Ok(dir.next_entry()?)
    }

    /// Close an open directory, releasing its host stream.
    pub fn closedir(&mut self, handle: DirHandle) -> Result<()> {
        let dir = self
            .dirs
            .remove(handle)
            .ok_or(Error::InvalidArgument("unknown directory handle"))?;
        vroot_trace!("vroot::fsio", path = %self.log.path(dir.path()), "closed directory");
        drop(dir);
        Ok(())
    }

    /// Iterate an open directory's entries.
    pub fn entries(&mut self, handle: DirHandle) -> Entries<'_, H> {
        Entries { fs: self, handle }
    }

    /// Open, drain and close a directory.
    pub fn read_dir(&mut self, path: &str) -> Result<Vec<DirEntry>> {
        let handle = self.opendir(path)?;
        let entries: Result<Vec<DirEntry>> = self.entries(handle).collect();
        self.closedir(handle)?;
        entries
    }

    fn follow_dir_links(&self, mut real: String) -> Result<String> {
        let max_depth = self.resolver.limits().max_symlink_depth;
        let mut depth = 0;
        loop {
            match self.host.lstat(Path::new(&real)) {
                Ok(meta) if meta.file_type.is_symlink() => {}
                // Not a link, or missing: opening reports the real error.
                _ => return Ok(real),
            }
            if depth >= max_depth {
                vroot_warn!(
                    "vroot::fsio",
                    path = %self.log.path(&real),
                    depth,
                    "too many symlinks opening directory"
                );
                return Err(io::Error::from_raw_os_error(libc::ELOOP).into());
            }
            depth += 1;

            let target = self.host.read_link(Path::new(&real))?;
            let Some(target) = target.to_str() else {
                vroot_debug!(
                    "vroot::fsio",
                    link = %self.log.path(&real),
                    "symlink target is not UTF-8"
                );
                return Err(Error::InvalidArgument("symlink target is not UTF-8"));
            };
            // Targets are re-resolved as virtual paths so they stay confined.
            let next = if target.starts_with('/') {
                self.alias_virtual(target)
                    .unwrap_or_else(|| target.to_owned())
            } else {
                let dir = parent(&real).unwrap_or("/");
                let dir = self
                    .alias_virtual(dir)
                    .unwrap_or_else(|| self.resolver.strip_base(dir).to_owned());
                format!("{dir}/{target}")
            };
            vroot_trace!(
                "vroot::fsio",
                link = %self.log.path(&real),
                target = %self.log.path(&next),
                "following directory symlink"
            );
            real = self.resolver.lookup(&next, LookupFlags::NONE)?.real;
        }
    }

    /// Virtual path of a real path lying inside an alias source, mapped
    /// through the closest such alias.
    fn alias_virtual(&self, real: &str) -> Option<String> {
        let mut best: Option<(usize, &str, &str)> = None;
        for (alias, source) in self.resolver.aliases().iter() {
            let rest = if source == "/" {
                real.strip_prefix('/').map(|_| real)
            } else {
                real.strip_prefix(source)
                    .filter(|rest| rest.is_empty() || rest.starts_with('/'))
            };
            let Some(rest) = rest else { continue };
            if best.is_none_or(|(len, _, _)| source.len() > len) {
                best = Some((source.len(), alias, rest));
            }
        }
        let (_, alias, rest) = best?;
        Some(format!("{}{}", self.resolver.strip_base(alias), rest))
    }

    /// Basenames of aliases whose parent is the opened directory.
    ///
    /// The directory is matched by its real path and by its virtual path, so
    /// aliases nested under an aliased directory are listed too. An alias
    /// whose real path is the directory itself is left out.
    fn aliases_in(&self, vpath: &str, real: &str) -> Result<Vec<String>> {
        let aliases = self.resolver.aliases();
        if aliases.is_empty() {
            return Ok(Vec::new());
        }

        let mut dir_real = real.to_owned();
        trim_trailing_slashes(&mut dir_real);
        let mut dir_virtual = self.resolver.lookup(vpath, LookupFlags::NO_ALIAS)?.real;
        trim_trailing_slashes(&mut dir_virtual);

        let mut names = Vec::new();
        aliases.for_each(|alias, target| {
            if target == dir_real {
                return ControlFlow::Continue(());
            }
            if let Some(dir) = parent(alias) {
                if dir == dir_real || dir == dir_virtual {
                    names.push(basename(alias).to_owned());
                }
            }
            ControlFlow::Continue(())
        });
        names.sort();
        names.dedup();

        if !names.is_empty() {
            vroot_debug!(
                "vroot::fsio",
                dir = %self.log.path(&dir_real),
                count = names.len(),
                "found aliases in directory"
            );
        }
        Ok(names)
    }
}

/// Iterator over an open directory, see [`VrootFs::entries`].
///
/// The handle stays open when the iterator is dropped.
pub struct Entries<'a, H: HostFs> {
    fs: &'a mut VrootFs<H>,
    handle: DirHandle,
}

impl<H: HostFs> Iterator for Entries<'_, H> {
    type Item = Result<DirEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.fs.readdir(self.handle).transpose()
    }
}
