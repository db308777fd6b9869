//! Host filesystem trait definitions

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Real filesystem primitives the shim delegates to.
///
/// Implementations receive already-resolved real paths and report errors
/// unchanged; the shim never remaps them. Calls are synchronous and
/// blocking.
pub trait HostFs {
    /// Metadata, following symlinks.
    fn stat(&self, path: &Path) -> io::Result<Metadata>;

    /// Metadata of the entry itself, not following symlinks.
    fn lstat(&self, path: &Path) -> io::Result<Metadata>;

    /// Open a file.
    fn open(&self, path: &Path, options: &OpenOptions) -> io::Result<File>;

    /// Create a hard link `dst` pointing at `src`.
    fn link(&self, src: &Path, dst: &Path) -> io::Result<()>;

    /// Create a symbolic link at `link` whose target is `target`.
    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()>;

    /// Read a symbolic link's target.
    fn read_link(&self, path: &Path) -> io::Result<PathBuf>;

    /// Rename/move a file or directory.
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Set a file's length.
    fn truncate(&self, path: &Path, len: u64) -> io::Result<()>;

    /// Change permissions.
    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Change ownership, following symlinks.
    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()>;

    /// Change ownership of the entry itself.
    fn lchown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()>;

    /// Set access and modification times.
    fn utimes(&self, path: &Path, accessed: SystemTime, modified: SystemTime) -> io::Result<()>;

    /// Create a directory.
    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()>;

    /// Remove an empty directory.
    fn rmdir(&self, path: &Path) -> io::Result<()>;

    /// Remove a file.
    fn unlink(&self, path: &Path) -> io::Result<()>;

    /// Change the process working directory.
    fn chdir(&self, path: &Path) -> io::Result<()>;

    /// Change the process root directory (`chroot(2)`).
    fn chroot(&self, path: &Path) -> io::Result<()>;

    /// Open a directory stream.
    fn open_dir(&self, path: &Path) -> io::Result<Box<dyn DirStream>>;
}

/// An open host directory stream.
pub trait DirStream {
    /// Next entry, or `None` at end of directory.
    fn next_entry(&mut self) -> io::Result<Option<HostDirEntry>>;
}

/// Entry yielded by a host directory stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostDirEntry {
    /// Entry name (not full path)
    pub name: String,
    /// Entry type, when the host reports it cheaply
    pub file_type: Option<FileType>,
}

/// File metadata.
#[derive(Debug, Clone)]
pub struct Metadata {
    /// File type
    pub file_type: FileType,
    /// File size in bytes
    pub size: u64,
    /// File permissions (Unix mode bits, without the type)
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
    /// Last access time
    pub accessed: SystemTime,
    /// Last modification time
    pub modified: SystemTime,
}

impl From<std::fs::Metadata> for Metadata {
    fn from(meta: std::fs::Metadata) -> Self {
        use std::os::unix::fs::MetadataExt;

        Self {
            file_type: meta.file_type().into(),
            size: meta.len(),
            mode: meta.mode() & 0o7777,
            uid: meta.uid(),
            gid: meta.gid(),
            accessed: meta.accessed().unwrap_or(SystemTime::UNIX_EPOCH),
            modified: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        }
    }
}

/// File type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link
    Symlink,
    /// Device, socket or fifo
    Other,
}

impl FileType {
    /// Check if this is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, FileType::File)
    }

    /// Check if this is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, FileType::Directory)
    }

    /// Check if this is a symlink.
    pub fn is_symlink(&self) -> bool {
        matches!(self, FileType::Symlink)
    }
}

impl From<std::fs::FileType> for FileType {
    fn from(ft: std::fs::FileType) -> Self {
        if ft.is_symlink() {
            FileType::Symlink
        } else if ft.is_dir() {
            FileType::Directory
        } else if ft.is_file() {
            FileType::File
        } else {
            FileType::Other
        }
    }
}

/// Directory entry as seen through the virtual root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name (not full path)
    pub name: String,
    /// Entry type reported by the host; `None` for synthesized alias entries
    pub file_type: Option<FileType>,
    /// Whether this entry was synthesized from an alias
    pub aliased: bool,
}

impl DirEntry {
    pub(crate) fn host(entry: HostDirEntry) -> Self {
        Self {
            name: entry.name,
            file_type: entry.file_type,
            aliased: false,
        }
    }

    pub(crate) fn alias(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            file_type: None,
            aliased: true,
        }
    }
}
