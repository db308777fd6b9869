//! [`HostFs`] backed by the process's real filesystem.
//!
//! Unix only: ownership, modes and `chroot(2)` come from `std::os::unix`.

use std::fs::{self, DirBuilder, File, FileTimes, OpenOptions, Permissions, ReadDir};
use std::io;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use super::traits::{DirStream, HostDirEntry, HostFs, Metadata};

/// The real filesystem, via `std::fs`.
///
/// # Example
///
/// ```rust,no_run
/// use vroot::{StdFs, VrootFs};
///
/// let mut fs = VrootFs::new(StdFs::new());
/// fs.chroot("/srv/ftp/store")?;
/// let meta = fs.stat("/pub/readme.txt")?; // stats /srv/ftp/store/pub/readme.txt
/// # Ok::<(), vroot::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct StdFs;

impl StdFs {
    pub fn new() -> Self {
        Self
    }
}

impl HostFs for StdFs {
    fn stat(&self, path: &Path) -> io::Result<Metadata> {
        fs::metadata(path).map(Metadata::from)
    }

    fn lstat(&self, path: &Path) -> io::Result<Metadata> {
        fs::symlink_metadata(path).map(Metadata::from)
    }

    fn open(&self, path: &Path, options: &OpenOptions) -> io::Result<File> {
        options.open(path)
    }

    fn link(&self, src: &Path, dst: &Path) -> io::Result<()> {
        fs::hard_link(src, dst)
    }

    fn symlink(&self, target: &Path, link: &Path) -> io::Result<()> {
        std::os::unix::fs::symlink(target, link)
    }

    fn read_link(&self, path: &Path) -> io::Result<PathBuf> {
        fs::read_link(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn truncate(&self, path: &Path, len: u64) -> io::Result<()> {
        OpenOptions::new().write(true).open(path)?.set_len(len)
    }

    fn chmod(&self, path: &Path, mode: u32) -> io::Result<()> {
        fs::set_permissions(path, Permissions::from_mode(mode))
    }

    fn chown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        std::os::unix::fs::chown(path, uid, gid)
    }

    fn lchown(&self, path: &Path, uid: Option<u32>, gid: Option<u32>) -> io::Result<()> {
        std::os::unix::fs::lchown(path, uid, gid)
    }

    fn utimes(&self, path: &Path, accessed: SystemTime, modified: SystemTime) -> io::Result<()> {
        let times = FileTimes::new()
            .set_accessed(accessed)
            .set_modified(modified);
        File::open(path)?.set_times(times)
    }

    fn mkdir(&self, path: &Path, mode: u32) -> io::Result<()> {
        DirBuilder::new().mode(mode).create(path)
    }

    fn rmdir(&self, path: &Path) -> io::Result<()> {
        fs::remove_dir(path)
    }

    fn unlink(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }

    fn chdir(&self, path: &Path) -> io::Result<()> {
        std::env::set_current_dir(path)
    }

    fn chroot(&self, path: &Path) -> io::Result<()> {
        std::os::unix::fs::chroot(path)
    }

    fn open_dir(&self, path: &Path) -> io::Result<Box<dyn DirStream>> {
        Ok(Box::new(StdDirStream(fs::read_dir(path)?)))
    }
}

/// `std::fs::ReadDir` as a [`DirStream`].
///
/// `.` and `..` are not reported. Entries whose names are not UTF-8 are
/// skipped: they cannot be named through the string-based API.
struct StdDirStream(ReadDir);

impl DirStream for StdDirStream {
    fn next_entry(&mut self) -> io::Result<Option<HostDirEntry>> {
        while let Some(entry) = self.0.next().transpose()? {
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_raw) => {
                    vroot_debug!(
                        "vroot::fsio",
                        name = %_raw.to_string_lossy(),
                        "skipping entry with non-UTF-8 name"
                    );
                    continue;
                }
            };
            return Ok(Some(HostDirEntry {
                name,
                file_type: entry.file_type().ok().map(Into::into),
            }));
        }
        Ok(None)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fs::FileType;

    #[test]
    fn stat_and_lstat_differ_on_symlinks() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("file");
        let link = tmp.path().join("link");
        fs::write(&file, b"data").unwrap();

        let host = StdFs::new();
        host.symlink(&file, &link).unwrap();

        assert!(host.stat(&link).unwrap().file_type.is_file());
        assert!(host.lstat(&link).unwrap().file_type.is_symlink());
        assert_eq!(host.read_link(&link).unwrap(), file);
    }

    #[test]
    fn mkdir_applies_mode() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("d");
        let host = StdFs::new();
        host.mkdir(&dir, 0o700).unwrap();
        let meta = host.stat(&dir).unwrap();
        assert!(meta.file_type.is_dir());
        assert_eq!(meta.mode & 0o777, 0o700);
    }

    #[test]
    fn truncate_and_chmod() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("f");
        fs::write(&file, b"0123456789").unwrap();

        let host = StdFs::new();
        host.truncate(&file, 4).unwrap();
        assert_eq!(host.stat(&file).unwrap().size, 4);

        host.chmod(&file, 0o600).unwrap();
        assert_eq!(host.stat(&file).unwrap().mode & 0o777, 0o600);
    }

    #[test]
    fn dir_stream_lists_entries() {
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("a"), b"").unwrap();
        fs::create_dir(tmp.path().join("b")).unwrap();

        let host = StdFs::new();
        let mut stream = host.open_dir(tmp.path()).unwrap();
        let mut entries = Vec::new();
        while let Some(entry) = stream.next_entry().unwrap() {
            entries.push(entry);
        }
        entries.sort_by(|x, y| x.name.cmp(&y.name));

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a");
        assert_eq!(entries[0].file_type, Some(FileType::File));
        assert_eq!(entries[1].name, "b");
        assert_eq!(entries[1].file_type, Some(FileType::Directory));
    }

    #[test]
    fn dir_stream_skips_non_utf8_names() {
        use std::os::unix::ffi::OsStrExt;

        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("ok"), b"").unwrap();
        fs::write(tmp.path().join(std::ffi::OsStr::from_bytes(b"bad\xff")), b"").unwrap();

        let host = StdFs::new();
        let mut stream = host.open_dir(tmp.path()).unwrap();
        let mut names = Vec::new();
        while let Some(entry) = stream.next_entry().unwrap() {
            names.push(entry.name);
        }
        assert_eq!(names, vec!["ok"]);
    }

    #[test]
    fn utimes_sets_modified() {
        let tmp = tempfile::tempdir().unwrap();
        let file = tmp.path().join("f");
        fs::write(&file, b"").unwrap();

        let when = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000);
        let host = StdFs::new();
        host.utimes(&file, when, when).unwrap();
        assert_eq!(host.stat(&file).unwrap().modified, when);
    }
}
