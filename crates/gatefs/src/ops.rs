//! Single-target filesystem operations.
//!
//! Every function takes a [`ValidatedPath`], so access control has already
//! happened by the time code here runs. Mutating operations replace file
//! content atomically: a temp file in the destination directory is written
//! fully, synced, and renamed into place, so readers never observe partial
//! content. No locking happens between validation and execution; concurrent
//! writers to the same path race at OS granularity and the last rename wins.

use std::future::Future;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use crate::error::{Error, Result};
use crate::guard::ValidatedPath;

/// Read a file's full content as UTF-8 text.
///
/// A file larger than `max_bytes` is a [`Error::TooLarge`], never a
/// truncated response.
pub async fn read_file(path: &ValidatedPath, max_bytes: u64) -> Result<String> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| Error::io_at(path.as_path(), e))?;
    if meta.len() > max_bytes {
        return Err(Error::TooLarge {
            path: path.as_path().to_path_buf(),
            size: meta.len(),
            max: max_bytes,
        });
    }
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| Error::io_at(path.as_path(), e))
}

/// Create or overwrite a file with the given content.
///
/// Intermediate directories are created only when `create_parents` is set.
pub async fn write_file(
    path: &ValidatedPath,
    content: &str,
    create_parents: bool,
    max_bytes: u64,
) -> Result<()> {
    let size = content.len() as u64;
    if size > max_bytes {
        return Err(Error::TooLarge {
            path: path.as_path().to_path_buf(),
            size,
            max: max_bytes,
        });
    }
    if create_parents {
        if let Some(parent) = path.as_path().parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_at(parent, e))?;
        }
    }
    write_atomic(path.as_path(), content.as_bytes().to_vec()).await
}

/// Replace every occurrence of `find` with `replace` and write the result
/// back atomically. Returns the number of occurrences replaced.
///
/// Zero occurrences is a content-level not-found (distinct from a missing
/// path) and leaves the file's bytes untouched.
pub async fn modify_file(
    path: &ValidatedPath,
    find: &str,
    replace: &str,
    max_bytes: u64,
) -> Result<usize> {
    if find.is_empty() {
        return Err(Error::InvalidArguments("find text must not be empty".into()));
    }
    let content = read_file(path, max_bytes).await?;
    let count = content.matches(find).count();
    if count == 0 {
        return Err(Error::SearchTextNotFound(path.as_path().to_path_buf()));
    }
    let updated = content.replace(find, replace);
    write_atomic(path.as_path(), updated.into_bytes()).await?;
    Ok(count)
}

/// Copy a file, or a directory recursively preserving relative structure.
///
/// An existing destination is a collision. A mid-copy failure removes the
/// partial destination before the error surfaces.
pub async fn copy_path(src: &ValidatedPath, dst: &ValidatedPath) -> Result<()> {
    let meta = tokio::fs::symlink_metadata(src)
        .await
        .map_err(|e| Error::io_at(src.as_path(), e))?;
    if tokio::fs::symlink_metadata(dst).await.is_ok() {
        return Err(Error::AlreadyExists(dst.as_path().to_path_buf()));
    }
    copy_with_rollback(src.as_path(), dst.as_path(), meta.is_dir()).await
}

async fn copy_with_rollback(src: &Path, dst: &Path, is_dir: bool) -> Result<()> {
    let result = if is_dir {
        copy_dir_recursive(src.to_path_buf(), dst.to_path_buf()).await
    } else {
        tokio::fs::copy(src, dst)
            .await
            .map(|_| ())
            .map_err(|e| Error::io_at(src, e))
    };
    if result.is_err() {
        remove_any(dst).await;
    }
    result
}

/// Best-effort removal of a partial destination; the original error is what
/// surfaces, not the cleanup's.
async fn remove_any(path: &Path) {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => {
            let _ = tokio::fs::remove_dir_all(path).await;
        }
        Ok(_) => {
            let _ = tokio::fs::remove_file(path).await;
        }
        Err(_) => {}
    }
}

fn copy_dir_recursive(
    src: PathBuf,
    dst: PathBuf,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
    Box::pin(async move {
        tokio::fs::create_dir_all(&dst)
            .await
            .map_err(|e| Error::io_at(&dst, e))?;
        let mut read_dir = tokio::fs::read_dir(&src)
            .await
            .map_err(|e| Error::io_at(&src, e))?;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| Error::io_at(&src, e))?
        {
            let from = entry.path();
            let to = dst.join(entry.file_name());
            let file_type = entry
                .file_type()
                .await
                .map_err(|e| Error::io_at(&from, e))?;
            if file_type.is_dir() {
                copy_dir_recursive(from, to).await?;
            } else if file_type.is_symlink() {
                copy_symlink(&from, &to).await?;
            } else {
                tokio::fs::copy(&from, &to)
                    .await
                    .map_err(|e| Error::io_at(&from, e))?;
            }
        }
        Ok(())
    })
}

/// Recreate a symlink at the destination rather than copying through it;
/// following it here could pull in content from outside the tree.
#[cfg(unix)]
async fn copy_symlink(from: &Path, to: &Path) -> Result<()> {
    let target = tokio::fs::read_link(from)
        .await
        .map_err(|e| Error::io_at(from, e))?;
    tokio::fs::symlink(&target, to)
        .await
        .map_err(|e| Error::io_at(to, e))
}

#[cfg(not(unix))]
async fn copy_symlink(_from: &Path, _to: &Path) -> Result<()> {
    Ok(())
}

/// Move or rename. An existing destination is rejected unless `overwrite`
/// is set. A cross-device rename falls back to copy-then-delete-source,
/// removing the partial destination if any copy step fails.
pub async fn move_path(src: &ValidatedPath, dst: &ValidatedPath, overwrite: bool) -> Result<()> {
    if tokio::fs::symlink_metadata(dst).await.is_ok() && !overwrite {
        return Err(Error::AlreadyExists(dst.as_path().to_path_buf()));
    }
    match tokio::fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::CrossesDevices => {
            tracing::debug!(source = %src, destination = %dst, "cross-device rename, falling back to copy and delete");
            let meta = tokio::fs::symlink_metadata(src)
                .await
                .map_err(|e| Error::io_at(src.as_path(), e))?;
            if overwrite {
                remove_any(dst.as_path()).await;
            }
            copy_with_rollback(src.as_path(), dst.as_path(), meta.is_dir()).await?;
            // Source is deleted only after the copy fully succeeded.
            if meta.is_dir() {
                tokio::fs::remove_dir_all(src)
                    .await
                    .map_err(|e| Error::io_at(src.as_path(), e))
            } else {
                tokio::fs::remove_file(src)
                    .await
                    .map_err(|e| Error::io_at(src.as_path(), e))
            }
        }
        Err(err) => Err(Error::io_at(src.as_path(), err)),
    }
}

/// Delete a file, a symlink, or a directory.
///
/// A populated directory requires `recursive`; otherwise the call fails
/// with [`Error::NotEmpty`].
pub async fn delete_path(path: &ValidatedPath, recursive: bool) -> Result<()> {
    let meta = tokio::fs::symlink_metadata(path)
        .await
        .map_err(|e| Error::io_at(path.as_path(), e))?;
    if meta.is_dir() {
        if recursive {
            tokio::fs::remove_dir_all(path)
                .await
                .map_err(|e| Error::io_at(path.as_path(), e))
        } else {
            match tokio::fs::remove_dir(path).await {
                Ok(()) => Ok(()),
                Err(err) if err.kind() == std::io::ErrorKind::DirectoryNotEmpty => {
                    Err(Error::NotEmpty(path.as_path().to_path_buf()))
                }
                Err(err) => Err(Error::io_at(path.as_path(), err)),
            }
        }
    } else {
        tokio::fs::remove_file(path)
            .await
            .map_err(|e| Error::io_at(path.as_path(), e))
    }
}

/// Create a directory and any missing parents. Idempotent: an existing
/// directory at the path succeeds; an existing non-directory is a collision.
pub async fn create_dir(path: &ValidatedPath) -> Result<()> {
    match tokio::fs::symlink_metadata(path).await {
        Ok(meta) if meta.is_dir() => Ok(()),
        Ok(_) => Err(Error::AlreadyExists(path.as_path().to_path_buf())),
        Err(_) => tokio::fs::create_dir_all(path)
            .await
            .map_err(|e| Error::io_at(path.as_path(), e)),
    }
}

/// Write bytes to a temp file in the destination's directory, sync, and
/// rename over the destination. The temp file is unlinked on every failure
/// path when its handle drops.
async fn write_atomic(dest: &Path, bytes: Vec<u8>) -> Result<()> {
    let parent = dest
        .parent()
        .ok_or_else(|| Error::InvalidPath(format!("no parent directory: {}", dest.display())))?
        .to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || -> Result<()> {
        let mut tmp = tempfile::Builder::new()
            .prefix(".gatefs-")
            .suffix(".tmp")
            .tempfile_in(&parent)
            .map_err(|e| Error::io_at(&parent, e))?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&dest).map_err(|e| Error::Io(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::PathGuard;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    const MAX: u64 = 1024 * 1024;

    fn fixture() -> (TempDir, PathGuard) {
        let dir = tempdir().unwrap();
        let guard = PathGuard::new(vec![dir.path().to_path_buf()], true).unwrap();
        (dir, guard)
    }

    fn vp(guard: &PathGuard, path: &Path) -> ValidatedPath {
        guard.validate(path.to_str().unwrap()).unwrap()
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let (dir, guard) = fixture();
        let path = dir.path().join("data.txt");
        let target = vp(&guard, &path);
        write_file(&target, "exact content\n", false, MAX)
            .await
            .unwrap();
        let content = read_file(&vp(&guard, &path), MAX).await.unwrap();
        assert_eq!(content, "exact content\n");
    }

    #[tokio::test]
    async fn oversized_read_is_too_large_not_truncated() {
        let (dir, guard) = fixture();
        let path = dir.path().join("big.txt");
        fs::write(&path, "0123456789").unwrap();
        let err = read_file(&vp(&guard, &path), 4).await.unwrap_err();
        assert!(matches!(err, Error::TooLarge { size: 10, max: 4, .. }));
    }

    #[tokio::test]
    async fn oversized_write_is_rejected_before_touching_disk() {
        let (dir, guard) = fixture();
        let path = dir.path().join("big.txt");
        let err = write_file(&vp(&guard, &path), "0123456789", false, 4)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TooLarge { .. }));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn write_without_create_parents_fails_into_missing_dir() {
        let (dir, guard) = fixture();
        let path = dir.path().join("missing/deep.txt");
        let err = write_file(&vp(&guard, &path), "x", false, MAX)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
        assert!(!dir.path().join("missing").exists());
    }

    #[tokio::test]
    async fn write_with_create_parents_builds_the_chain() {
        let (dir, guard) = fixture();
        let path = dir.path().join("a/b/deep.txt");
        write_file(&vp(&guard, &path), "x", true, MAX).await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "x");
    }

    #[tokio::test]
    async fn modify_replaces_all_occurrences_and_counts_them() {
        let (dir, guard) = fixture();
        let path = dir.path().join("conf.txt");
        fs::write(&path, "host=old port=1\nhost=old\n").unwrap();
        let count = modify_file(&vp(&guard, &path), "old", "new", MAX)
            .await
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "host=new port=1\nhost=new\n"
        );
    }

    #[tokio::test]
    async fn modify_without_match_leaves_bytes_untouched() {
        let (dir, guard) = fixture();
        let path = dir.path().join("conf.txt");
        fs::write(&path, "untouched").unwrap();
        let err = modify_file(&vp(&guard, &path), "absent", "x", MAX)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::SearchTextNotFound(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), "untouched");
    }

    #[tokio::test]
    async fn copies_a_file() {
        let (dir, guard) = fixture();
        let src = dir.path().join("src.txt");
        fs::write(&src, "payload").unwrap();
        let dst = dir.path().join("dst.txt");
        copy_path(&vp(&guard, &src), &vp(&guard, &dst)).await.unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "payload");
        assert!(src.exists());
    }

    #[tokio::test]
    async fn copy_rejects_existing_destination() {
        let (dir, guard) = fixture();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, "a").unwrap();
        fs::write(&dst, "b").unwrap();
        let err = copy_path(&vp(&guard, &src), &vp(&guard, &dst))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
        assert_eq!(fs::read_to_string(&dst).unwrap(), "b");
    }

    #[tokio::test]
    async fn copies_a_directory_preserving_structure() {
        let (dir, guard) = fixture();
        let src = dir.path().join("tree");
        fs::create_dir_all(src.join("nested")).unwrap();
        fs::write(src.join("top.txt"), "1").unwrap();
        fs::write(src.join("nested/leaf.txt"), "2").unwrap();
        let dst = dir.path().join("copy");
        copy_path(&vp(&guard, &src), &vp(&guard, &dst)).await.unwrap();
        assert_eq!(fs::read_to_string(dst.join("top.txt")).unwrap(), "1");
        assert_eq!(
            fs::read_to_string(dst.join("nested/leaf.txt")).unwrap(),
            "2"
        );
    }

    #[tokio::test]
    async fn moves_a_file() {
        let (dir, guard) = fixture();
        let src = dir.path().join("src.txt");
        fs::write(&src, "payload").unwrap();
        let dst = dir.path().join("dst.txt");
        move_path(&vp(&guard, &src), &vp(&guard, &dst), false)
            .await
            .unwrap();
        assert!(!src.exists());
        assert_eq!(fs::read_to_string(&dst).unwrap(), "payload");
    }

    #[tokio::test]
    async fn move_rejects_existing_destination_without_overwrite() {
        let (dir, guard) = fixture();
        let src = dir.path().join("src.txt");
        let dst = dir.path().join("dst.txt");
        fs::write(&src, "a").unwrap();
        fs::write(&dst, "b").unwrap();
        let err = move_path(&vp(&guard, &src), &vp(&guard, &dst), false)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));

        move_path(&vp(&guard, &src), &vp(&guard, &dst), true)
            .await
            .unwrap();
        assert_eq!(fs::read_to_string(&dst).unwrap(), "a");
    }

    #[tokio::test]
    async fn delete_requires_recursive_for_populated_directory() {
        let (dir, guard) = fixture();
        let sub = dir.path().join("full");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("file.txt"), "x").unwrap();
        let err = delete_path(&vp(&guard, &sub), false).await.unwrap_err();
        assert!(matches!(err, Error::NotEmpty(_)));
        assert!(sub.exists());

        delete_path(&vp(&guard, &sub), true).await.unwrap();
        assert!(!sub.exists());
    }

    #[tokio::test]
    async fn delete_removes_file_and_empty_directory() {
        let (dir, guard) = fixture();
        let file = dir.path().join("file.txt");
        fs::write(&file, "x").unwrap();
        delete_path(&vp(&guard, &file), false).await.unwrap();
        assert!(!file.exists());

        let empty = dir.path().join("empty");
        fs::create_dir(&empty).unwrap();
        delete_path(&vp(&guard, &empty), false).await.unwrap();
        assert!(!empty.exists());
    }

    #[tokio::test]
    async fn create_dir_is_idempotent() {
        let (dir, guard) = fixture();
        let sub = dir.path().join("made/inside");
        create_dir(&vp(&guard, &sub)).await.unwrap();
        assert!(sub.is_dir());
        create_dir(&vp(&guard, &sub)).await.unwrap();
    }

    #[tokio::test]
    async fn create_dir_rejects_existing_file() {
        let (dir, guard) = fixture();
        let file = dir.path().join("taken");
        fs::write(&file, "x").unwrap();
        let err = create_dir(&vp(&guard, &file)).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn concurrent_writes_leave_one_complete_content() {
        let (dir, guard) = fixture();
        let path = dir.path().join("race.txt");
        let a = vp(&guard, &path);
        let b = vp(&guard, &path);
        let first = String::from_utf8(vec![b'a'; 4096]).unwrap();
        let second = String::from_utf8(vec![b'b'; 4096]).unwrap();
        let (ra, rb) = tokio::join!(
            write_file(&a, &first, false, MAX),
            write_file(&b, &second, false, MAX)
        );
        ra.unwrap();
        rb.unwrap();
        let content = fs::read_to_string(&path).unwrap();
        assert!(content == first || content == second);
    }
}
