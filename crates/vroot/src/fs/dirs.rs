//! Open directory records.
//!
//! Each `opendir` gets its own record holding the host stream and the alias
//! names to overlay on it. Records live in a slab owned by the session; the
//! slab is created on the first open and dropped when the last record closes.

use std::io;

use slab::Slab;

use super::traits::{DirEntry, DirStream};

/// Opaque handle returned by `opendir`.
///
/// Handles are only valid for the session that issued them and become
/// invalid on `closedir`. A stale handle never aliases a newer directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DirHandle {
    key: usize,
    generation: u64,
}

pub(crate) struct OpenDir {
    generation: u64,
    /// Real path the stream was opened on.
    path: String,
    stream: Box<dyn DirStream>,
    /// Basenames of aliases that live directly in this directory.
    aliases: Vec<String>,
    /// Next alias to emit once the host stream is exhausted.
    cursor: usize,
    host_done: bool,
}

impl std::fmt::Debug for OpenDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenDir")
            .field("generation", &self.generation)
            .field("path", &self.path)
            .field("aliases", &self.aliases)
            .field("cursor", &self.cursor)
            .field("host_done", &self.host_done)
            .finish_non_exhaustive()
    }
}

impl OpenDir {
    pub(crate) fn path(&self) -> &str {
        &self.path
    }

    /// Next visible entry.
    ///
    /// Host entries whose name matches an alias are skipped; every alias is
    /// reported exactly once after the host stream ends.
    pub(crate) fn next_entry(&mut self) -> io::Result<Option<DirEntry>> {
        while !self.host_done {
            match self.stream.next_entry()? {
                Some(entry) if self.aliases.iter().any(|name| *name == entry.name) => {
                    vroot_debug!(
                        "vroot::fsio",
                        dir = %self.path,
                        name = %entry.name,
                        "skipping entry shadowed by alias"
                    );
                }
                Some(entry) => return Ok(Some(DirEntry::host(entry))),
                None => self.host_done = true,
            }
        }

        let Some(name) = self.aliases.get(self.cursor) else {
            return Ok(None);
        };
        self.cursor += 1;
        Ok(Some(DirEntry::alias(name)))
    }
}

/// Lazily-allocated table of open directories.
#[derive(Debug, Default)]
pub(crate) struct DirTable {
    slab: Option<Slab<OpenDir>>,
    next_generation: u64,
}

impl DirTable {
    pub(crate) fn insert(
        &mut self,
        path: String,
        stream: Box<dyn DirStream>,
        aliases: Vec<String>,
    ) -> DirHandle {
        self.next_generation += 1;
        let generation = self.next_generation;
        let key = self.slab.get_or_insert_with(Slab::new).insert(OpenDir {
            generation,
            path,
            stream,
            aliases,
            cursor: 0,
            host_done: false,
        });
        DirHandle { key, generation }
    }

    pub(crate) fn get_mut(&mut self, handle: DirHandle) -> Option<&mut OpenDir> {
        self.slab
            .as_mut()?
            .get_mut(handle.key)
            .filter(|dir| dir.generation == handle.generation)
    }

    /// Remove a record, releasing the table once it is empty.
    pub(crate) fn remove(&mut self, handle: DirHandle) -> Option<OpenDir> {
        let slab = self.slab.as_mut()?;
        if slab.get(handle.key)?.generation != handle.generation {
            return None;
        }
        let dir = slab.remove(handle.key);
        if slab.is_empty() {
            self.slab = None;
        }
        Some(dir)
    }

    pub(crate) fn len(&self) -> usize {
        self.slab.as_ref().map_or(0, Slab::len)
    }

    #[cfg(test)]
    pub(crate) fn is_allocated(&self) -> bool {
        self.slab.is_some()
    }

    /// Close every record.
    pub(crate) fn clear(&mut self) {
        self.slab = None;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::fs::traits::{FileType, HostDirEntry};

    struct VecStream(std::vec::IntoIter<&'static str>);

    impl DirStream for VecStream {
        fn next_entry(&mut self) -> io::Result<Option<HostDirEntry>> {
            Ok(self.0.next().map(|name| HostDirEntry {
                name: name.to_string(),
                file_type: Some(FileType::File),
            }))
        }
    }

    fn stream(names: Vec<&'static str>) -> Box<dyn DirStream> {
        Box::new(VecStream(names.into_iter()))
    }

    fn drain(dir: &mut OpenDir) -> Vec<(String, bool)> {
        let mut out = Vec::new();
        while let Some(entry) = dir.next_entry().unwrap() {
            out.push((entry.name, entry.aliased));
        }
        out
    }

    #[test]
    fn aliases_shadow_and_follow_host_entries() {
        let mut table = DirTable::default();
        let handle = table.insert(
            "/store".into(),
            stream(vec!["a", "pub", "b"]),
            vec!["pub".into(), "tmp".into()],
        );

        let entries = drain(table.get_mut(handle).unwrap());
        assert_eq!(
            entries,
            vec![
                ("a".to_string(), false),
                ("b".to_string(), false),
                ("pub".to_string(), true),
                ("tmp".to_string(), true),
            ]
        );
        // Exhausted stays exhausted.
        assert!(table.get_mut(handle).unwrap().next_entry().unwrap().is_none());
    }

    #[test]
    fn table_is_lazy_and_released_when_empty() {
        let mut table = DirTable::default();
        assert!(!table.is_allocated());

        let first = table.insert("/a".into(), stream(vec![]), vec![]);
        let second = table.insert("/b".into(), stream(vec![]), vec![]);
        assert!(table.is_allocated());
        assert_eq!(table.len(), 2);

        assert_eq!(table.remove(first).unwrap().path(), "/a");
        assert!(table.is_allocated());
        assert!(table.remove(second).is_some());
        assert!(!table.is_allocated());
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn stale_handles_are_rejected() {
        let mut table = DirTable::default();
        let old = table.insert("/a".into(), stream(vec![]), vec![]);
        table.remove(old).unwrap();

        // The slab slot gets reused but the generation differs.
        let new = table.insert("/b".into(), stream(vec![]), vec![]);
        assert!(table.get_mut(old).is_none());
        assert!(table.remove(old).is_none());
        assert_eq!(table.get_mut(new).unwrap().path(), "/b");
    }

    #[test]
    fn handles_are_independent() {
        let mut table = DirTable::default();
        let one = table.insert("/a".into(), stream(vec!["x"]), vec!["al".into()]);
        let two = table.insert("/b".into(), stream(vec!["y"]), vec![]);

        assert_eq!(drain(table.get_mut(two).unwrap()), vec![("y".to_string(), false)]);
        assert_eq!(
            drain(table.get_mut(one).unwrap()),
            vec![("x".to_string(), false), ("al".to_string(), true)]
        );
    }
}
