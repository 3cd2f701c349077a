//! Recursive traversal: listing, tree rendering, name search, content search.
//!
//! Walks tolerate individual unreadable entries (permission-denied
//! subdirectories, entries that vanish mid-walk) by skipping them and
//! continuing; every skip is reported alongside the results, never dropped
//! without trace. Symlinked directories are rendered as leaves and never
//! traversed, which also prevents cycles.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use serde::Serialize;

use crate::error::{Error, Result};
use crate::guard::ValidatedPath;
use crate::probe::{self, EntryKind, FileEntry};

/// An entry a walk could not read, with the reason it was skipped.
#[derive(Debug, Serialize)]
pub struct SkippedEntry {
    pub path: PathBuf,
    pub reason: String,
}

/// One level of directory entries.
#[derive(Debug, Serialize)]
pub struct Listing {
    pub entries: Vec<FileEntry>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedEntry>,
}

/// A node in a rendered directory tree. A directory at the depth bound has
/// `children: None` (not expanded); an expanded empty directory has
/// `children: Some([])`.
#[derive(Debug, Serialize)]
pub struct TreeNode {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children: Option<Vec<TreeNode>>,
}

/// A depth-bounded tree rendering.
#[derive(Debug, Serialize)]
pub struct Tree {
    pub root: TreeNode,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedEntry>,
}

/// Paths whose names matched a glob pattern.
#[derive(Debug, Serialize)]
pub struct NameSearch {
    pub matches: Vec<PathBuf>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedEntry>,
}

/// A content-search hit: the file, the 1-based line number, and the line.
#[derive(Debug, Serialize)]
pub struct ContentMatch {
    pub path: PathBuf,
    pub line: usize,
    pub text: String,
}

/// Content-search results.
#[derive(Debug, Serialize)]
pub struct ContentSearch {
    pub matches: Vec<ContentMatch>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedEntry>,
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// List one level of a directory, each entry described by the metadata
/// probe. Entries that cannot be described land in `skipped`.
pub async fn list_directory(dir: &ValidatedPath) -> Result<Listing> {
    let mut entries = Vec::new();
    let mut skipped = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::io_at(dir.as_path(), e))?;
    while let Some(entry) = read_dir
        .next_entry()
        .await
        .map_err(|e| Error::io_at(dir.as_path(), e))?
    {
        let path = entry.path();
        match probe::describe(&path).await {
            Ok(described) => entries.push(described),
            Err(err) => skipped.push(SkippedEntry {
                path,
                reason: err.to_string(),
            }),
        }
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Listing { entries, skipped })
}

/// Render a recursive tree bounded by `max_depth` levels below the root.
pub async fn tree(dir: &ValidatedPath, max_depth: usize) -> Result<Tree> {
    let meta = tokio::fs::symlink_metadata(dir)
        .await
        .map_err(|e| Error::io_at(dir.as_path(), e))?;
    if !meta.is_dir() {
        return Err(Error::InvalidArguments(format!(
            "not a directory: {}",
            dir.as_path().display()
        )));
    }
    let mut skipped = Vec::new();
    let root = tree_node(dir.as_path().to_path_buf(), max_depth, &mut skipped).await?;
    Ok(Tree { root, skipped })
}

fn tree_node<'a>(
    path: PathBuf,
    depth: usize,
    skipped: &'a mut Vec<SkippedEntry>,
) -> Pin<Box<dyn Future<Output = Result<TreeNode>> + Send + 'a>> {
    Box::pin(async move {
        let name = name_of(&path);
        if depth == 0 {
            return Ok(TreeNode {
                name,
                kind: EntryKind::Directory,
                children: None,
            });
        }

        let mut children = Vec::new();
        let mut read_dir = match tokio::fs::read_dir(&path).await {
            Ok(rd) => rd,
            Err(err) => {
                tracing::debug!(path = %path.display(), reason = %err, "skipping unreadable directory");
                skipped.push(SkippedEntry {
                    path,
                    reason: err.to_string(),
                });
                return Ok(TreeNode {
                    name,
                    kind: EntryKind::Directory,
                    children: None,
                });
            }
        };
        loop {
            let entry = match read_dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    skipped.push(SkippedEntry {
                        path: path.clone(),
                        reason: err.to_string(),
                    });
                    break;
                }
            };
            let child_path = entry.path();
            let file_type = match entry.file_type().await {
                Ok(ft) => ft,
                Err(err) => {
                    skipped.push(SkippedEntry {
                        path: child_path,
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            if file_type.is_symlink() {
                // Leaf even when the target is a directory; traversing links
                // could cycle or wander outside the root.
                children.push(TreeNode {
                    name: name_of(&child_path),
                    kind: EntryKind::Symlink,
                    children: None,
                });
            } else if file_type.is_dir() {
                children.push(tree_node(child_path, depth - 1, skipped).await?);
            } else {
                children.push(TreeNode {
                    name: name_of(&child_path),
                    kind: EntryKind::File,
                    children: None,
                });
            }
        }
        children.sort_by(|a, b| a.name.cmp(&b.name));

        Ok(TreeNode {
            name,
            kind: EntryKind::Directory,
            children: Some(children),
        })
    })
}

/// Walk entries below `root` up to `max_depth`, calling `visit` for each
/// (entry, file-type) pair. Unreadable directories are reported in
/// `skipped`; symlinked directories are never entered.
async fn walk_entries<F>(
    root: &Path,
    max_depth: usize,
    skipped: &mut Vec<SkippedEntry>,
    mut visit: F,
) -> Result<()>
where
    F: FnMut(&tokio::fs::DirEntry, &std::fs::FileType),
{
    let mut stack = vec![(root.to_path_buf(), 0usize)];
    while let Some((dir, depth)) = stack.pop() {
        let mut read_dir = match tokio::fs::read_dir(&dir).await {
            Ok(rd) => rd,
            Err(err) => {
                if dir == root {
                    return Err(Error::io_at(&dir, err));
                }
                tracing::debug!(path = %dir.display(), reason = %err, "skipping unreadable directory");
                skipped.push(SkippedEntry {
                    path: dir,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        loop {
            let entry = match read_dir.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    skipped.push(SkippedEntry {
                        path: dir.clone(),
                        reason: err.to_string(),
                    });
                    break;
                }
            };
            let file_type = match entry.file_type().await {
                Ok(ft) => ft,
                Err(err) => {
                    skipped.push(SkippedEntry {
                        path: entry.path(),
                        reason: err.to_string(),
                    });
                    continue;
                }
            };
            visit(&entry, &file_type);
            if file_type.is_dir() && !file_type.is_symlink() && depth + 1 < max_depth {
                stack.push((entry.path(), depth + 1));
            }
        }
    }
    Ok(())
}

/// Find entries whose names match a glob pattern, recursing from `root`
/// with the same depth bound as [`tree`]. Returns absolute paths.
pub async fn search_files(
    root: &ValidatedPath,
    pattern: &str,
    max_depth: usize,
) -> Result<NameSearch> {
    let compiled = glob::Pattern::new(pattern)
        .map_err(|e| Error::InvalidArguments(format!("invalid glob pattern: {e}")))?;
    let mut matches = Vec::new();
    let mut skipped = Vec::new();
    walk_entries(root.as_path(), max_depth, &mut skipped, |entry, _| {
        if compiled.matches(&entry.file_name().to_string_lossy()) {
            matches.push(entry.path());
        }
    })
    .await?;
    matches.sort();
    Ok(NameSearch { matches, skipped })
}

/// Search file contents for a literal query, recursing from `root`.
///
/// Candidate files above `max_file_bytes` or sniffed as binary are excluded
/// by contract; symlinks are never followed into. Files that cannot be read
/// are reported in `skipped`.
pub async fn search_within_files(
    root: &ValidatedPath,
    query: &str,
    max_depth: usize,
    max_file_bytes: u64,
) -> Result<ContentSearch> {
    if query.is_empty() {
        return Err(Error::InvalidArguments("query must not be empty".into()));
    }
    let mut candidates = Vec::new();
    let mut skipped = Vec::new();
    walk_entries(root.as_path(), max_depth, &mut skipped, |entry, file_type| {
        if file_type.is_file() {
            candidates.push(entry.path());
        }
    })
    .await?;
    candidates.sort();

    let mut matches = Vec::new();
    for path in candidates {
        match scan_file(&path, query, max_file_bytes).await {
            Ok(Some(hits)) => matches.extend(hits),
            Ok(None) => {} // excluded by size or binary sniff
            Err(err) => skipped.push(SkippedEntry {
                path,
                reason: err.to_string(),
            }),
        }
    }
    Ok(ContentSearch { matches, skipped })
}

/// Scan one file for the query. `Ok(None)` means the file was excluded by
/// the size ceiling or the binary sniff rather than failed.
async fn scan_file(
    path: &Path,
    query: &str,
    max_file_bytes: u64,
) -> std::io::Result<Option<Vec<ContentMatch>>> {
    let meta = tokio::fs::metadata(path).await?;
    if meta.len() > max_file_bytes {
        return Ok(None);
    }
    if probe::sniff_is_binary(path).await? {
        return Ok(None);
    }
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        // Passed the sniff but is not UTF-8 text further in; treat like binary.
        Err(err) if err.kind() == std::io::ErrorKind::InvalidData => return Ok(None),
        Err(err) => return Err(err),
    };
    let hits = content
        .lines()
        .enumerate()
        .filter(|(_, text)| text.contains(query))
        .map(|(index, text)| ContentMatch {
            path: path.to_path_buf(),
            line: index + 1,
            text: text.to_string(),
        })
        .collect::<Vec<_>>();
    Ok(Some(hits))
}
