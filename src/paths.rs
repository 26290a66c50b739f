//! Path normalization.
//!
//! Exact-path exclusions compare paths for equality, so every path that takes
//! part in such a comparison goes through [`normalize`] first. The result is
//! absolute, free of `.`/`..` segments and trailing separators, and has every
//! symlink in its existing prefix resolved.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Resolve `path` against `root` into its canonical absolute form.
///
/// Absolute paths ignore `root`. Missing trailing components are allowed:
/// the longest prefix that exists is canonicalized and the rest is appended
/// lexically. The function is idempotent.
///
/// # Examples
///
/// ```no_run
/// use sift::paths::normalize;
/// use std::path::Path;
///
/// let root = Path::new("/srv/project");
/// assert_eq!(
///     normalize(Path::new("src/../docs/"), root),
///     normalize(Path::new("/srv/project/docs"), root),
/// );
/// ```
pub fn normalize(path: &Path, root: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    resolve(&joined)
}

/// Resolve a user-supplied root directory against the current directory.
pub fn resolve_root(path: &Path) -> io::Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    Ok(normalize(path, &cwd))
}

fn resolve(path: &Path) -> PathBuf {
    let components: Vec<Component<'_>> = path.components().collect();

    for split in (1..=components.len()).rev() {
        let prefix: PathBuf = components[..split].iter().collect();
        if let Ok(real) = fs::canonicalize(&prefix) {
            return push_lexically(real, &components[split..]);
        }
    }

    push_lexically(PathBuf::new(), &components)
}

/// Append components that do not exist on disk, folding `.` and `..`.
fn push_lexically(mut base: PathBuf, rest: &[Component<'_>]) -> PathBuf {
    for component in rest {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                base.pop();
            }
            other => base.push(other.as_os_str()),
        }
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn real_root() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = fs::canonicalize(dir.path()).unwrap();
        (dir, root)
    }

    #[test]
    fn test_relative_joined_under_root() {
        let (_dir, root) = real_root();
        fs::create_dir(root.join("src")).unwrap();

        assert_eq!(normalize(Path::new("src"), &root), root.join("src"));
    }

    #[test]
    fn test_spellings_agree() {
        let (_dir, root) = real_root();
        fs::create_dir_all(root.join("a/b")).unwrap();

        let expected = root.join("a/b");
        assert_eq!(normalize(Path::new("a/b/"), &root), expected);
        assert_eq!(normalize(Path::new("a/./b"), &root), expected);
        assert_eq!(normalize(Path::new("a/b/../b"), &root), expected);
        assert_eq!(normalize(&root.join("a/b"), &root), expected);
    }

    #[test]
    fn test_missing_tail_is_folded() {
        let (_dir, root) = real_root();

        assert_eq!(
            normalize(Path::new("ghost/../other/file.txt"), &root),
            root.join("other/file.txt")
        );
    }

    #[test]
    fn test_idempotent() {
        let (_dir, root) = real_root();
        fs::create_dir(root.join("present")).unwrap();

        for raw in ["present", "present/missing/..", "missing/deeper/", "../x"] {
            let once = normalize(Path::new(raw), &root);
            let twice = normalize(&once, &root);
            assert_eq!(once, twice, "not idempotent for {raw}");
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_resolved() {
        let (_dir, root) = real_root();
        fs::create_dir(root.join("target")).unwrap();
        std::os::unix::fs::symlink(root.join("target"), root.join("link")).unwrap();

        assert_eq!(normalize(Path::new("link"), &root), root.join("target"));
    }
}
