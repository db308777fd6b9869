//! Lexical path canonicalization.
//!
//! [`clean`] simplifies a path string without touching the filesystem: it
//! never expands symlinks and knows nothing about the virtual root. Leading
//! `..` segments are dropped here; deciding whether a `..` may climb is the
//! resolver's job, which has the base path.
//!
//! The rules are applied one rewrite at a time until none matches. Every
//! rewrite shortens the string, so the loop terminates and the output is a
//! fixpoint: `clean(clean(p)) == clean(p)` for every input.

/// Canonicalize a path string.
///
/// ```rust
/// use vroot::path::clean;
///
/// assert_eq!(clean("//"), "/");
/// assert_eq!(clean("/foo/./bar//"), "/foo/bar/");
/// assert_eq!(clean("/foo/../bar//"), "/bar/");
/// assert_eq!(clean("/pub/incoming/.."), "/pub/");
/// ```
pub fn clean(path: &str) -> String {
    let mut buf = path.to_string();
    clean_in_place(&mut buf);
    buf
}

/// Canonicalize a path buffer in place.
pub fn clean_in_place(path: &mut String) {
    while rewrite_once(path) {}
}

/// Apply the first matching rule. Returns false once the buffer is clean.
fn rewrite_once(path: &mut String) -> bool {
    // "//" -> "/"
    if let Some(i) = path.find("//") {
        path.remove(i);
        return true;
    }

    // "/./" -> "/"
    if let Some(i) = path.find("/./") {
        path.replace_range(i..i + 2, "");
        return true;
    }

    // Leading "../" carries no information at the string level.
    if path.starts_with("../") {
        path.replace_range(..3, "");
        return true;
    }

    // "/../" at the start has nothing to cancel.
    if path.starts_with("/../") {
        path.replace_range(..3, "");
        return true;
    }

    // "x/../" -> ""
    if let Some(i) = path.find("/../") {
        let start = path[..i].rfind('/').map_or(0, |p| p + 1);
        path.replace_range(start..i + 4, "");
        return true;
    }

    if path.len() > 1 && path.starts_with("./") {
        path.replace_range(..2, "");
        return true;
    }

    if path.len() > 1 && path.ends_with("/.") {
        path.pop();
        return true;
    }

    // "head/x/.." -> "head/"
    if path.ends_with("/..") {
        let head = path.len() - 3;
        match path[..head].rfind('/') {
            Some(p) => path.truncate(p + 1),
            None => {
                path.clear();
                path.push('/');
            }
        }
        return true;
    }

    false
}

/// Drop a single trailing `/`, keeping root intact.
pub fn trim_trailing_slash(path: &mut String) {
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
}

/// Drop every trailing `/`, keeping root intact.
pub fn trim_trailing_slashes(path: &mut String) {
    while path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
}

/// Parent component of an absolute path (`/` for top-level entries).
///
/// Returns `None` for root and for paths with no `/`.
pub fn parent(path: &str) -> Option<&str> {
    let trimmed = if path.len() > 1 {
        path.trim_end_matches('/')
    } else {
        path
    };
    match trimmed.rfind('/') {
        Some(0) if trimmed.len() > 1 => Some("/"),
        Some(0) | None => None,
        Some(i) => Some(&trimmed[..i]),
    }
}

/// Final component of a path, ignoring trailing slashes.
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    match trimmed.rfind('/') {
        Some(i) => &trimmed[i + 1..],
        None => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_slash_runs() {
        assert_eq!(clean("//"), "/");
        assert_eq!(clean("///a////b"), "/a/b");
    }

    #[test]
    fn collapses_dot_segments() {
        assert_eq!(clean("/foo/./bar//"), "/foo/bar/");
        assert_eq!(clean("/./././a"), "/a");
        assert_eq!(clean("a/./."), "a/");
    }

    #[test]
    fn resolves_interior_parent_segments() {
        assert_eq!(clean("/foo/../bar//"), "/bar/");
        assert_eq!(clean("/a/b/../../c"), "/c");
        assert_eq!(clean("a/../b"), "b");
        assert_eq!(clean("/x/y/../z"), "/x/z");
    }

    #[test]
    fn leading_parent_segments_are_dropped() {
        assert_eq!(clean("../../etc/passwd"), "etc/passwd");
        assert_eq!(clean("/../../etc"), "/etc");
        assert_eq!(clean("/a/../../b"), "/b");
        assert_eq!(clean("a/../../b"), "b");
    }

    #[test]
    fn dot_forms() {
        assert_eq!(clean("."), ".");
        assert_eq!(clean("./a"), "a");
        assert_eq!(clean(".//a"), "a");
        assert_eq!(clean("/."), "/");
        assert_eq!(clean("/a/."), "/a/");
    }

    #[test]
    fn trailing_parent_segment() {
        assert_eq!(clean("/a/b/.."), "/a/");
        assert_eq!(clean("/a/.."), "/");
        assert_eq!(clean("/.."), "/");
        assert_eq!(clean("a/.."), "/");
        assert_eq!(clean("a/b/.."), "a/");
    }

    #[test]
    fn dots_inside_names_are_kept() {
        assert_eq!(clean("/foo..bar"), "/foo..bar");
        assert_eq!(clean("/a/.../b"), "/a/.../b");
        assert_eq!(clean("/.hidden/..x"), "/.hidden/..x");
        assert_eq!(clean(".."), "..");
    }

    #[test]
    fn empty_stays_empty() {
        assert_eq!(clean(""), "");
    }

    #[test]
    fn idempotent_on_samples() {
        for input in [
            "//", "/a/./b/../c//", "../x/..", "./..", "/../..", "a/b/c/../../..", ".//.",
            "x/../", "/..a/../b",
        ] {
            let once = clean(input);
            assert_eq!(clean(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn trims_trailing_slashes() {
        let mut p = String::from("/store///");
        trim_trailing_slash(&mut p);
        assert_eq!(p, "/store//");
        trim_trailing_slashes(&mut p);
        assert_eq!(p, "/store");

        let mut root = String::from("/");
        trim_trailing_slashes(&mut root);
        assert_eq!(root, "/");
    }

    #[test]
    fn parent_and_basename() {
        assert_eq!(parent("/store/pub"), Some("/store"));
        assert_eq!(parent("/pub"), Some("/"));
        assert_eq!(parent("/store/pub/"), Some("/store"));
        assert_eq!(parent("/"), None);
        assert_eq!(parent("pub"), None);

        assert_eq!(basename("/store/pub"), "pub");
        assert_eq!(basename("/store/pub/"), "pub");
        assert_eq!(basename("pub"), "pub");
    }
}
