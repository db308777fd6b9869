//! Alias table.
//!
//! An alias maps a virtual path (as the resolver produces it, i.e. expressed
//! under the base path) to an arbitrary real path. Entries are only ever
//! added; the table is torn down as a whole at session end.

use std::collections::HashMap;
use std::ops::ControlFlow;

use crate::error::{Error, Result};

/// Exact-match map from virtual destination path to real source path.
///
/// # Example
///
/// ```rust
/// use vroot::{AliasTable, Error};
///
/// let mut aliases = AliasTable::new();
/// aliases.add("/store/pub", "/var/shared/pub")?;
///
/// assert_eq!(aliases.get("/store/pub"), Some("/var/shared/pub"));
/// assert!(matches!(
///     aliases.add("/store/pub", "/elsewhere"),
///     Err(Error::AlreadyExists)
/// ));
/// // The first mapping stays authoritative.
/// assert_eq!(aliases.get("/store/pub"), Some("/var/shared/pub"));
/// # Ok::<(), vroot::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct AliasTable {
    entries: HashMap<String, String>,
}

impl AliasTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `dst` (virtual) as an alias of `src` (real).
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` if either path is empty
    /// - `AlreadyExists` if `dst` is already registered; the earlier mapping
    ///   is kept
    pub fn add(&mut self, dst: &str, src: &str) -> Result<()> {
        if dst.is_empty() || src.is_empty() {
            return Err(Error::InvalidArgument("alias paths must not be empty"));
        }
        if self.entries.contains_key(dst) {
            return Err(Error::AlreadyExists);
        }
        self.entries.insert(dst.to_owned(), src.to_owned());
        Ok(())
    }

    /// Real path registered for `dst`.
    pub fn get(&self, dst: &str) -> Option<&str> {
        self.entries.get(dst).map(String::as_str)
    }

    /// Real path registered for `dst`, or `NotFound`.
    pub fn try_get(&self, dst: &str) -> Result<&str> {
        self.get(dst).ok_or(Error::NotFound)
    }

    /// Whether `dst` is a registered alias.
    pub fn exists(&self, dst: &str) -> bool {
        self.entries.contains_key(dst)
    }

    /// Number of registered aliases.
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Visit every `(virtual, real)` pair in unspecified order.
    ///
    /// The callback may stop the walk early with `ControlFlow::Break`.
    pub fn for_each<F>(&self, mut callback: F)
    where
        F: FnMut(&str, &str) -> ControlFlow<()>,
    {
        for (dst, src) in &self.entries {
            if callback(dst, src).is_break() {
                break;
            }
        }
    }

    /// Iterate `(virtual, real)` pairs in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(dst, src)| (dst.as_str(), src.as_str()))
    }

    /// Drop every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_and_get() {
        let mut table = AliasTable::new();
        assert_eq!(table.count(), 0);
        assert!(table.is_empty());

        table.add("/store/pub", "/var/pub").unwrap();
        assert_eq!(table.count(), 1);
        assert!(table.exists("/store/pub"));
        assert!(!table.exists("/store/pub/sub"));
        assert_eq!(table.get("/store/pub"), Some("/var/pub"));
        assert_eq!(table.get("/store/other"), None);
    }

    #[test]
    fn empty_arguments_rejected() {
        let mut table = AliasTable::new();
        assert!(matches!(table.add("", "/src"), Err(Error::InvalidArgument(_))));
        assert!(matches!(table.add("/dst", ""), Err(Error::InvalidArgument(_))));
        assert!(table.is_empty());
    }

    #[test]
    fn collision_keeps_first_mapping() {
        let mut table = AliasTable::new();
        table.add("/store/pub", "/first").unwrap();
        assert!(matches!(
            table.add("/store/pub", "/second"),
            Err(Error::AlreadyExists)
        ));
        assert_eq!(table.get("/store/pub"), Some("/first"));
        assert_eq!(table.count(), 1);
    }

    #[test]
    fn try_get_reports_not_found() {
        let table = AliasTable::new();
        assert!(matches!(table.try_get("/nope"), Err(Error::NotFound)));
    }

    #[test]
    fn owns_its_entries() {
        let mut table = AliasTable::new();
        {
            let dst = String::from("/store/tmp");
            let src = String::from("/tmp");
            table.add(&dst, &src).unwrap();
        }
        assert_eq!(table.get("/store/tmp"), Some("/tmp"));
    }

    #[test]
    fn for_each_visits_all_and_can_stop() {
        let mut table = AliasTable::new();
        table.add("/store/a", "/a").unwrap();
        table.add("/store/b", "/b").unwrap();
        table.add("/store/c", "/c").unwrap();

        let mut seen = Vec::new();
        table.for_each(|dst, src| {
            seen.push((dst.to_string(), src.to_string()));
            ControlFlow::Continue(())
        });
        seen.sort();
        assert_eq!(
            seen,
            vec![
                ("/store/a".to_string(), "/a".to_string()),
                ("/store/b".to_string(), "/b".to_string()),
                ("/store/c".to_string(), "/c".to_string()),
            ]
        );

        let mut visits = 0;
        table.for_each(|_, _| {
            visits += 1;
            ControlFlow::Break(())
        });
        assert_eq!(visits, 1);
    }

    #[test]
    fn clear_empties_table() {
        let mut table = AliasTable::new();
        table.add("/store/a", "/a").unwrap();
        table.clear();
        assert_eq!(table.count(), 0);
        assert_eq!(table.iter().count(), 0);
    }
}
