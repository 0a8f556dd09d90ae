//! Path canonicalization without touching the filesystem.
//!
//! Every path that crosses a component boundary (search locations, resolved
//! headers, visited-set keys) goes through [`normalize`] so that one file has
//! exactly one spelling.

use std::path::Path;

/// Canonical separator for every path produced by this crate
pub const SEPARATOR: char = '/';

/// Collapse `.` and `..` segments and unify separators to `/`.
///
/// Lexical only: symlinks are not followed. Leading `..` segments of a
/// relative path are kept, `..` above the root of an absolute path is
/// dropped. An empty result is spelled `.`.
pub fn normalize(path: &str) -> String {
    let unified = path.replace('\\', "/");
    let absolute = unified.starts_with(SEPARATOR);

    let mut segments: Vec<&str> = Vec::new();
    for segment in unified.split(SEPARATOR) {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if *last != ".." => {
                    segments.pop();
                }
                _ if absolute => {}
                _ => segments.push(".."),
            },
            other => segments.push(other),
        }
    }

    let joined = segments.join("/");
    match (absolute, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}

/// [`normalize`] for `Path` values
pub fn normalize_path(path: &Path) -> String {
    normalize(&path.to_string_lossy())
}

/// Join a location and an include name, then normalize.
///
/// An absolute `name` replaces `base` entirely.
pub fn join(base: &str, name: &str) -> String {
    if base.is_empty() || base == "." || name.starts_with('/') {
        return normalize(name);
    }
    normalize(&format!("{}/{}", base, name))
}

/// Make `path` absolute against the current directory and normalize it
pub fn absolutize(path: &Path) -> std::io::Result<String> {
    if path.is_absolute() {
        Ok(normalize_path(path))
    } else {
        let cwd = std::env::current_dir()?;
        Ok(normalize_path(&cwd.join(path)))
    }
}

/// Express `path` relative to `base`.
///
/// Both are normalized first. Segments of `base` not shared with `path`
/// become `..`, so a header outside the repository comes out as
/// `../elsewhere/foo.h`.
pub fn relative_to(path: &str, base: &str) -> String {
    let path = normalize(path);
    let base = normalize(base);

    let path_segments: Vec<&str> = path.split(SEPARATOR).filter(|s| !s.is_empty() && *s != ".").collect();
    let base_segments: Vec<&str> = base.split(SEPARATOR).filter(|s| !s.is_empty() && *s != ".").collect();

    let shared = path_segments
        .iter()
        .zip(base_segments.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<&str> = Vec::new();
    parts.extend(std::iter::repeat("..").take(base_segments.len() - shared));
    parts.extend(&path_segments[shared..]);

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_dot_segments() {
        assert_eq!(normalize("/repo/./include/../include/linux/mm.h"), "/repo/include/linux/mm.h");
        assert_eq!(normalize("a//b/"), "a/b");
        assert_eq!(normalize("a/.."), ".");
        assert_eq!(normalize(""), ".");
    }

    #[test]
    fn test_unifies_separators() {
        assert_eq!(normalize("arch\\x86\\include"), "arch/x86/include");
    }

    #[test]
    fn test_leading_parent_segments() {
        assert_eq!(normalize("../../x.h"), "../../x.h");
        assert_eq!(normalize("a/../../x.h"), "../x.h");
        assert_eq!(normalize("/../x.h"), "/x.h");
    }

    #[test]
    fn test_idempotent() {
        for p in ["./a/b/../c", "/x/./y//z/..", "..\\q", "", "/"] {
            let once = normalize(p);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_join() {
        assert_eq!(join("/repo/include", "linux/../asm/io.h"), "/repo/include/asm/io.h");
        assert_eq!(join(".", "foo.h"), "foo.h");
        assert_eq!(join("/repo/include", "/usr/include/./stdio.h"), "/usr/include/stdio.h");
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(relative_to("/repo/include/a.h", "/repo"), "include/a.h");
        assert_eq!(relative_to("/other/b.h", "/repo"), "../other/b.h");
        assert_eq!(relative_to("/repo", "/repo"), ".");
        assert_eq!(relative_to("/repo/./x/../y.h", "/repo/"), "y.h");
    }
}
