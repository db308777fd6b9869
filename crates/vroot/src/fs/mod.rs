//! Virtual-root filesystem for vroot
//!
//! Provides a host filesystem trait and the confined view over it:
//! - `HostFs`: real filesystem primitives, `StdFs` being the process's own
//! - `VrootFs`: path-translating shim with alias overlays on listings

mod dirs;
mod host;
mod shim;
mod traits;

pub use dirs::DirHandle;
pub use host::StdFs;
pub use shim::{Entries, Phase, VrootFs};
pub use traits::{DirEntry, DirStream, FileType, HostDirEntry, HostFs, Metadata};
