//! Path containment — is a path inside the working-directory root?
//!
//! Both sides are normalized before comparison: `.` and `..` are folded
//! lexically, then the longest existing ancestor is canonicalized so
//! symlinks (e.g. `/tmp` → `/private/tmp`) resolve the same way for the
//! root and the candidate. Paths that do not exist yet (files about to be
//! written) are handled by canonicalizing their nearest existing parent.

use std::path::{Component, Path, PathBuf};

/// Fold `.` and `..` components without touching the filesystem.
/// `..` at the root stays at the root.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Normalize, then resolve symlinks in the longest existing prefix.
fn resolve(path: &Path) -> PathBuf {
    let normalized = normalize(path);

    let mut existing = normalized.as_path();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize() {
            return rest
                .iter()
                .rev()
                .fold(canonical, |acc: PathBuf, part| acc.join(part));
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_os_string());
                existing = parent;
            }
            _ => return normalized,
        }
    }
}

/// Anchor a relative path at the process working directory.
fn absolute(path: &Path) -> Option<PathBuf> {
    if path.is_absolute() {
        Some(path.to_path_buf())
    } else {
        std::path::absolute(path).ok()
    }
}

/// Whether `path` lies within `root`. Relative paths are taken relative
/// to `root`; a relative root is taken relative to the process working
/// directory. An empty root contains nothing.
pub fn is_within_root(path: &Path, root: &Path) -> bool {
    if root.as_os_str().is_empty() {
        return false;
    }
    let Some(root) = absolute(root) else {
        return false;
    };
    let candidate = if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    };
    let root = resolve(&root);
    if !root.has_root() {
        return false;
    }
    resolve(&candidate).starts_with(root)
}
