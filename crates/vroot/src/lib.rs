//! vroot - Virtual root filesystem confinement for file-serving daemons
//!
//! Confines a session to a base directory without `chroot(2)`: every path a
//! client names is cleaned and rewritten under the base before it reaches the
//! real filesystem, so the host never sees a `..` it could follow out of the
//! root. Operators may graft other host directories into the virtual tree as
//! aliases; listings of the parent directory show them.
//!
//! # Example
//!
//! ```rust
//! use vroot::{LookupFlags, Resolver};
//!
//! let mut resolver = Resolver::new();
//! resolver.set_base("/srv/ftp")?;
//! resolver.add_alias("/var/shared", "/pub")?;
//!
//! assert_eq!(resolver.lookup("/../etc/passwd", LookupFlags::NONE)?.real, "/srv/ftp/etc/passwd");
//! assert_eq!(resolver.lookup("/pub/readme", LookupFlags::NONE)?.real, "/var/shared/readme");
//! # Ok::<(), vroot::Error>(())
//! ```
//!
//! # Layers
//!
//! - [`clean`]: lexical path canonicalization
//! - [`AliasTable`]: virtual-to-real alias map
//! - [`Resolver`]: base, aliases and virtual cwd applied to a path
//! - [`VrootFs`]: filesystem primitives routed through the resolver
//!
//! # Logging
//!
//! With the default `logging` feature, diagnostics are emitted through
//! `tracing` under the `vroot::path`, `vroot::alias` and `vroot::fsio`
//! targets. Paths are escaped and truncated per [`LogConfig`].

#[macro_use]
mod logging;

mod alias;
mod config;
mod error;
mod fs;
mod limits;
pub mod path;

pub use alias::AliasTable;
pub use config::{AliasConfig, AliasReport, VrootConfig, VrootOptions};
pub use error::{Error, Result};
pub use fs::{
    DirEntry, DirHandle, DirStream, Entries, FileType, HostDirEntry, HostFs, Metadata, Phase,
    StdFs, VrootFs,
};
pub use limits::{DEFAULT_MAX_PATH_LENGTH, DEFAULT_MAX_SYMLINK_DEPTH, PathLimits};
pub use logging::{DEFAULT_MAX_VALUE_LENGTH, LogConfig, sanitize_for_log};
pub use path::{LookupFlags, Resolved, Resolver, clean};
