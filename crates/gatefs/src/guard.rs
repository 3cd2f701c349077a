//! Path validation and access control.
//!
//! Every filesystem operation passes through [`PathGuard::validate`], which
//! canonicalizes the requested path and verifies it lies within one of the
//! allowed roots. Traversal sequences and symlink escapes are defeated by
//! full canonicalization, never by lexical pattern matching.

use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};

/// The sole gate producing [`ValidatedPath`] values.
///
/// Holds the immutable allow-list: canonicalized roots (duplicates
/// collapsed, order preserved) and the symlink policy.
#[derive(Debug, Clone)]
pub struct PathGuard {
    roots: Vec<PathBuf>,
    follow_symlinks: bool,
}

/// An absolute, resolved path known to lie under one of the allowed roots.
///
/// Only [`PathGuard::validate`] constructs these; holding one is proof the
/// access check passed.
#[derive(Debug, Clone)]
pub struct ValidatedPath {
    path: PathBuf,
    root: PathBuf,
}

impl ValidatedPath {
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// The allowed root this path resolved under.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AsRef<Path> for ValidatedPath {
    fn as_ref(&self) -> &Path {
        &self.path
    }
}

impl std::fmt::Display for ValidatedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.path.display().fmt(f)
    }
}

/// Collapse `.` and `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for comp in path.components() {
        match comp {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

impl PathGuard {
    /// Canonicalize and dedupe the allowed roots.
    ///
    /// Fails if the list is empty or any root cannot be canonicalized
    /// (missing directory, permission), so misconfiguration surfaces at
    /// startup rather than per request.
    pub fn new(roots: Vec<PathBuf>, follow_symlinks: bool) -> Result<Self> {
        if roots.is_empty() {
            return Err(Error::InvalidArguments(
                "no allowed directories configured".into(),
            ));
        }
        let mut canonical = Vec::with_capacity(roots.len());
        for root in roots {
            let resolved = root.canonicalize().map_err(|e| Error::io_at(&root, e))?;
            if !canonical.contains(&resolved) {
                canonical.push(resolved);
            }
        }
        Ok(Self {
            roots: canonical,
            follow_symlinks,
        })
    }

    /// The allowed roots, in configured order.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn owning_root(&self, path: &Path) -> Option<&PathBuf> {
        self.roots.iter().find(|root| path.starts_with(root))
    }

    /// Validate a caller-supplied path against the allowed roots.
    ///
    /// Relative input is resolved against the current directory. The cleaned
    /// absolute form is canonicalized (following symlinks to their final
    /// target) and must fall under at least one root. A path that does not
    /// exist yet is validated through its nearest existing ancestor with the
    /// remaining segments re-appended.
    pub fn validate(&self, raw: &str) -> Result<ValidatedPath> {
        if raw.is_empty() {
            return Err(Error::InvalidPath("empty path".into()));
        }
        if raw.contains('\0') {
            return Err(Error::InvalidPath("path contains null byte".into()));
        }

        let requested = PathBuf::from(raw);
        let absolute = if requested.is_absolute() {
            requested
        } else {
            std::env::current_dir()
                .map_err(Error::Io)?
                .join(requested)
        };
        let normalized = normalize_lexically(&absolute);

        match normalized.canonicalize() {
            Ok(resolved) => {
                let root = self
                    .owning_root(&resolved)
                    .ok_or_else(|| Error::AccessDenied(resolved.clone()))?
                    .clone();
                if self.follow_symlinks {
                    return Ok(ValidatedPath {
                        path: resolved,
                        root,
                    });
                }
                // Escape check passed on the resolved target; the operation
                // itself acts on the link, so keep the final component
                // unresolved.
                let unresolved = match (normalized.parent(), normalized.file_name()) {
                    (Some(parent), Some(name)) => parent
                        .canonicalize()
                        .map_err(|e| Error::io_at(parent, e))?
                        .join(name),
                    _ => resolved,
                };
                let root = self
                    .owning_root(&unresolved)
                    .ok_or_else(|| Error::AccessDenied(unresolved.clone()))?
                    .clone();
                Ok(ValidatedPath {
                    path: unresolved,
                    root,
                })
            }
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                self.validate_nonexistent(&normalized)
            }
            Err(err) => Err(Error::io_at(&normalized, err)),
        }
    }

    /// Validate a path whose target does not exist by canonicalizing its
    /// nearest existing ancestor and re-appending the remainder. Supports
    /// nested directory creation and writes behind missing parents.
    fn validate_nonexistent(&self, normalized: &Path) -> Result<ValidatedPath> {
        let mut ancestor = normalized;
        while let Some(parent) = ancestor.parent() {
            if parent.exists() {
                let resolved_parent =
                    parent.canonicalize().map_err(|e| Error::io_at(parent, e))?;
                // `normalized` has no `..` components left, so the suffix
                // cannot climb back out of the resolved ancestor.
                let suffix = normalized.strip_prefix(parent).map_err(|_| {
                    Error::InvalidPath(format!("unresolvable path: {}", normalized.display()))
                })?;
                let candidate = resolved_parent.join(suffix);
                let root = self
                    .owning_root(&candidate)
                    .ok_or_else(|| Error::AccessDenied(candidate.clone()))?
                    .clone();
                return Ok(ValidatedPath {
                    path: candidate,
                    root,
                });
            }
            ancestor = parent;
        }
        Err(Error::NotFound(normalized.to_path_buf()))
    }
}
