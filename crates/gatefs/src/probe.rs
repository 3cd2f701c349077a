//! File metadata extraction.
//!
//! [`describe`] builds a [`FileEntry`] from `symlink_metadata`, so the final
//! path component is never followed when it is a symlink. Content-type is a
//! guess from the extension plus a bounded read of the leading bytes; large
//! files are never loaded for classification.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::Serialize;
use tokio::io::AsyncReadExt;

use crate::error::{Error, Result};

/// How many leading bytes the content sniff may read.
const SNIFF_LEN: usize = 512;

/// Filesystem entry type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

/// Metadata for a single filesystem entry, mirroring live state at query
/// time; it may be stale by the time the caller acts on it.
#[derive(Debug, Clone, Serialize)]
pub struct FileEntry {
    pub name: String,
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub size: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modified: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

fn to_rfc3339(time: std::io::Result<SystemTime>) -> Option<String> {
    time.ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .and_then(|d| chrono::DateTime::from_timestamp(d.as_secs() as i64, d.subsec_nanos()))
        .map(|dt| dt.to_rfc3339())
}

fn kind_of(meta: &std::fs::Metadata) -> EntryKind {
    if meta.is_symlink() {
        EntryKind::Symlink
    } else if meta.is_dir() {
        EntryKind::Directory
    } else {
        EntryKind::File
    }
}

/// Describe a filesystem entry.
///
/// Creation time is reported as absent when the platform cannot supply it,
/// never synthesized. Content-type classification is best-effort and only
/// attempted for regular files.
pub async fn describe(path: &Path) -> Result<FileEntry> {
    let meta = tokio::fs::symlink_metadata(path)
        .await
        .map_err(|e| Error::io_at(path, e))?;
    let kind = kind_of(&meta);
    let content_type = if kind == EntryKind::File {
        guess_content_type(path, meta.len()).await
    } else {
        None
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned());

    Ok(FileEntry {
        name,
        path: path.to_path_buf(),
        kind,
        size: meta.len(),
        modified: to_rfc3339(meta.modified()),
        created: to_rfc3339(meta.created()),
        content_type,
    })
}

/// Guess a MIME type from the extension, falling back to a leading-bytes
/// sniff for unknown extensions. Returns `None` only when the file cannot
/// be opened for the sniff.
async fn guess_content_type(path: &Path, size: u64) -> Option<String> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    if let Some(mime) = ext.as_deref().and_then(mime_for_extension) {
        return Some(mime.to_string());
    }
    if size == 0 {
        return Some("text/plain".into());
    }
    match sniff_is_binary(path).await {
        Ok(true) => Some("application/octet-stream".into()),
        Ok(false) => Some("text/plain".into()),
        Err(_) => None,
    }
}

/// Read up to [`SNIFF_LEN`] leading bytes and report whether they look
/// binary (contain a NUL byte).
pub(crate) async fn sniff_is_binary(path: &Path) -> std::io::Result<bool> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut buf = [0u8; SNIFF_LEN];
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(buf[..filled].contains(&0))
}

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    let mime = match ext {
        "txt" | "log" => "text/plain",
        "md" => "text/markdown",
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "csv" => "text/csv",
        "xml" => "application/xml",
        "js" | "mjs" => "text/javascript",
        "json" => "application/json",
        "toml" => "application/toml",
        "yaml" | "yml" => "application/yaml",
        "rs" | "py" | "go" | "c" | "h" | "cpp" | "java" | "sh" => "text/plain",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        "gz" => "application/gzip",
        "tar" => "application/x-tar",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "bmp" => "image/bmp",
        "svg" => "image/svg+xml",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        _ => return None,
    };
    Some(mime)
}
