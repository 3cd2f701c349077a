//! Tool surface for the filesystem gateway.
//!
//! Each tool deserializes a typed parameter struct (the router rejects
//! unknown tool names and malformed arguments before the handlers run),
//! routes every path argument through the guard, and serializes structured
//! results as pretty JSON. Batch operations return one entry per input
//! target in input order; a single target's failure never suppresses the
//! others.

use rmcp::{
    handler::server::wrapper::Parameters,
    schemars::{self, JsonSchema},
    tool, tool_router,
};
use serde::{Deserialize, Serialize};

use crate::FilesystemGateway;
use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::guard::PathGuard;
use crate::{ops, probe, walk};

/// Parameters for reading a single file.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadFileParams {
    /// Path to the file to read.
    pub path: String,
}

/// Parameters for reading multiple files.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ReadMultipleFilesParams {
    /// Paths to the files to read.
    pub paths: Vec<String>,
}

/// Parameters for writing a file.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct WriteFileParams {
    /// Path to the file to write.
    pub path: String,
    /// Content to write to the file.
    pub content: String,
    /// Create missing parent directories before writing.
    pub create_parents: Option<bool>,
}

/// Parameters for copying a file or directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CopyFileParams {
    /// Source path.
    pub source: String,
    /// Destination path; must not already exist.
    pub destination: String,
}

/// Parameters for moving a file or directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct MoveFileParams {
    /// Source path.
    pub source: String,
    /// Destination path.
    pub destination: String,
    /// Replace an existing destination.
    pub overwrite: Option<bool>,
}

/// Parameters for deleting a file or directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct DeleteFileParams {
    /// Path to delete.
    pub path: String,
    /// Required to delete a non-empty directory.
    pub recursive: Option<bool>,
}

/// Parameters for find-and-replace within a file.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ModifyFileParams {
    /// Path to the file to modify.
    pub path: String,
    /// Exact text to find.
    pub find: String,
    /// Replacement text.
    pub replace: String,
}

/// Parameters for listing a directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListDirectoryParams {
    /// Path to the directory to list.
    pub path: String,
}

/// Parameters for creating a directory.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct CreateDirectoryParams {
    /// Path of the directory to create.
    pub path: String,
}

/// Parameters for rendering a directory tree.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct TreeParams {
    /// Path to the root directory for the tree.
    pub path: String,
    /// Maximum depth to recurse; server default when omitted.
    pub max_depth: Option<usize>,
}

/// Parameters for searching entry names.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchFilesParams {
    /// Base directory to search in.
    pub path: String,
    /// Glob pattern to match entry names against (e.g. "*.rs").
    pub pattern: String,
    /// Maximum depth to recurse; server default when omitted.
    pub max_depth: Option<usize>,
}

/// Parameters for searching file contents.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchWithinFilesParams {
    /// Base directory to search in.
    pub path: String,
    /// Literal text to search for.
    pub query: String,
    /// Maximum depth to recurse; server default when omitted.
    pub max_depth: Option<usize>,
}

/// Parameters for getting file info.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetFileInfoParams {
    /// Path to the file or directory.
    pub path: String,
}

/// Result entry for reading multiple files: content or error, never both.
#[derive(Debug, Serialize)]
struct FileReadResult {
    path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[tool_router]
impl FilesystemGateway {
    /// Create a gateway from configuration. Fails when the allowed-directory
    /// set is empty or a root cannot be canonicalized.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let guard = PathGuard::new(
            config.directories.allowed.clone(),
            config.directories.follow_symlinks,
        )?;
        Ok(Self {
            guard,
            limits: config.limits,
            tool_router: Self::tool_router(),
        })
    }

    fn depth_or_default(&self, requested: Option<usize>) -> Result<usize> {
        match requested {
            Some(0) => Err(Error::InvalidArguments(
                "max_depth must be greater than 0".into(),
            )),
            Some(depth) => Ok(depth),
            None => Ok(self.limits.max_depth),
        }
    }

    /// Read the complete contents of a text file.
    #[tool(
        description = "Read the complete contents of a file; files above the configured size limit are rejected"
    )]
    async fn read_file(
        &self,
        Parameters(params): Parameters<ReadFileParams>,
    ) -> std::result::Result<String, String> {
        let path = self.guard.validate(&params.path).map_err(|e| e.to_string())?;
        ops::read_file(&path, self.limits.max_file_size)
            .await
            .map_err(|e| e.to_string())
    }

    /// Read multiple files, returning one result per path in input order.
    #[tool(
        description = "Read multiple files simultaneously, returning content or error for each file"
    )]
    async fn read_multiple_files(
        &self,
        Parameters(params): Parameters<ReadMultipleFilesParams>,
    ) -> std::result::Result<String, String> {
        if params.paths.len() > self.limits.max_batch {
            return Err(Error::InvalidArguments(format!(
                "batch of {} paths exceeds the limit of {}",
                params.paths.len(),
                self.limits.max_batch
            ))
            .to_string());
        }
        let mut results = Vec::with_capacity(params.paths.len());
        for p in &params.paths {
            let outcome = match self.guard.validate(p) {
                Ok(path) => ops::read_file(&path, self.limits.max_file_size).await,
                Err(err) => Err(err),
            };
            let entry = match outcome {
                Ok(content) => FileReadResult {
                    path: p.clone(),
                    content: Some(content),
                    error: None,
                },
                Err(err) => FileReadResult {
                    path: p.clone(),
                    content: None,
                    error: Some(err.to_string()),
                },
            };
            results.push(entry);
        }
        serde_json::to_string_pretty(&results).map_err(|e| e.to_string())
    }

    /// Create or overwrite a file atomically.
    #[tool(
        description = "Create a new file or overwrite an existing file with the given content; set create_parents to create missing directories"
    )]
    async fn write_file(
        &self,
        Parameters(params): Parameters<WriteFileParams>,
    ) -> std::result::Result<String, String> {
        let path = self.guard.validate(&params.path).map_err(|e| e.to_string())?;
        ops::write_file(
            &path,
            &params.content,
            params.create_parents.unwrap_or(false),
            self.limits.max_file_size,
        )
        .await
        .map_err(|e| e.to_string())?;
        Ok(format!("Successfully wrote to {path}"))
    }

    /// Copy a file or directory.
    #[tool(
        description = "Copy a file, or a directory recursively; fails if the destination already exists"
    )]
    async fn copy_file(
        &self,
        Parameters(params): Parameters<CopyFileParams>,
    ) -> std::result::Result<String, String> {
        let source = self
            .guard
            .validate(&params.source)
            .map_err(|e| e.to_string())?;
        let destination = self
            .guard
            .validate(&params.destination)
            .map_err(|e| e.to_string())?;
        ops::copy_path(&source, &destination)
            .await
            .map_err(|e| e.to_string())?;
        Ok(format!("Copied {source} to {destination}"))
    }

    /// Move or rename a file or directory.
    #[tool(
        description = "Move or rename a file or directory; an existing destination is rejected unless overwrite is set"
    )]
    async fn move_file(
        &self,
        Parameters(params): Parameters<MoveFileParams>,
    ) -> std::result::Result<String, String> {
        let source = self
            .guard
            .validate(&params.source)
            .map_err(|e| e.to_string())?;
        let destination = self
            .guard
            .validate(&params.destination)
            .map_err(|e| e.to_string())?;
        ops::move_path(&source, &destination, params.overwrite.unwrap_or(false))
            .await
            .map_err(|e| e.to_string())?;
        Ok(format!("Moved {source} to {destination}"))
    }

    /// Delete a file or directory.
    #[tool(
        description = "Delete a file or directory; deleting a non-empty directory requires the recursive flag"
    )]
    async fn delete_file(
        &self,
        Parameters(params): Parameters<DeleteFileParams>,
    ) -> std::result::Result<String, String> {
        let path = self.guard.validate(&params.path).map_err(|e| e.to_string())?;
        ops::delete_path(&path, params.recursive.unwrap_or(false))
            .await
            .map_err(|e| e.to_string())?;
        Ok(format!("Deleted {path}"))
    }

    /// Find-and-replace within a file.
    #[tool(
        description = "Replace every occurrence of exact text in a file; fails without modifying the file when the text is not found"
    )]
    async fn modify_file(
        &self,
        Parameters(params): Parameters<ModifyFileParams>,
    ) -> std::result::Result<String, String> {
        let path = self.guard.validate(&params.path).map_err(|e| e.to_string())?;
        let count = ops::modify_file(
            &path,
            &params.find,
            &params.replace,
            self.limits.max_file_size,
        )
        .await
        .map_err(|e| e.to_string())?;
        Ok(format!("Replaced {count} occurrence(s) in {path}"))
    }

    /// List a directory with per-entry metadata.
    #[tool(
        description = "List files and directories in a given path with metadata; unreadable entries are reported as skipped"
    )]
    async fn list_directory(
        &self,
        Parameters(params): Parameters<ListDirectoryParams>,
    ) -> std::result::Result<String, String> {
        let path = self.guard.validate(&params.path).map_err(|e| e.to_string())?;
        let listing = walk::list_directory(&path).await.map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&listing).map_err(|e| e.to_string())
    }

    /// Create a directory and any missing parents.
    #[tool(
        description = "Create a new directory or ensure a directory exists, creating parent directories as needed"
    )]
    async fn create_directory(
        &self,
        Parameters(params): Parameters<CreateDirectoryParams>,
    ) -> std::result::Result<String, String> {
        let path = self.guard.validate(&params.path).map_err(|e| e.to_string())?;
        ops::create_dir(&path).await.map_err(|e| e.to_string())?;
        Ok(format!("Successfully created directory {path}"))
    }

    /// Render a depth-bounded tree of files and directories.
    #[tool(
        description = "Get a recursive tree view of files and directories as JSON, bounded by max_depth"
    )]
    async fn tree(
        &self,
        Parameters(params): Parameters<TreeParams>,
    ) -> std::result::Result<String, String> {
        let depth = self
            .depth_or_default(params.max_depth)
            .map_err(|e| e.to_string())?;
        let path = self.guard.validate(&params.path).map_err(|e| e.to_string())?;
        let rendered = walk::tree(&path, depth).await.map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&rendered).map_err(|e| e.to_string())
    }

    /// Search entry names with a glob pattern.
    #[tool(description = "Search for files and directories whose names match a glob pattern")]
    async fn search_files(
        &self,
        Parameters(params): Parameters<SearchFilesParams>,
    ) -> std::result::Result<String, String> {
        let depth = self
            .depth_or_default(params.max_depth)
            .map_err(|e| e.to_string())?;
        let path = self.guard.validate(&params.path).map_err(|e| e.to_string())?;
        let found = walk::search_files(&path, &params.pattern, depth)
            .await
            .map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&found).map_err(|e| e.to_string())
    }

    /// Search file contents for a literal query.
    #[tool(
        description = "Search file contents for a literal text query, returning matching paths with line context; binary and oversized files are skipped"
    )]
    async fn search_within_files(
        &self,
        Parameters(params): Parameters<SearchWithinFilesParams>,
    ) -> std::result::Result<String, String> {
        let depth = self
            .depth_or_default(params.max_depth)
            .map_err(|e| e.to_string())?;
        let path = self.guard.validate(&params.path).map_err(|e| e.to_string())?;
        let found = walk::search_within_files(
            &path,
            &params.query,
            depth,
            self.limits.max_file_size,
        )
        .await
        .map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&found).map_err(|e| e.to_string())
    }

    /// Get detailed metadata about a file or directory.
    #[tool(description = "Get detailed metadata about a file or directory")]
    async fn get_file_info(
        &self,
        Parameters(params): Parameters<GetFileInfoParams>,
    ) -> std::result::Result<String, String> {
        let path = self.guard.validate(&params.path).map_err(|e| e.to_string())?;
        let entry = probe::describe(path.as_path())
            .await
            .map_err(|e| e.to_string())?;
        serde_json::to_string_pretty(&entry).map_err(|e| e.to_string())
    }

    /// List the allowed directories this server can access.
    #[tool(description = "List the directories that this server is allowed to access")]
    async fn list_allowed_directories(&self) -> String {
        self.guard
            .roots()
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DirectoriesConfig;
    use std::fs;
    use std::path::Path;
    use tempfile::{TempDir, tempdir};

    fn gateway_for(dir: &Path) -> FilesystemGateway {
        let config = GatewayConfig {
            directories: DirectoriesConfig {
                allowed: vec![dir.to_path_buf()],
                follow_symlinks: true,
            },
            ..Default::default()
        };
        FilesystemGateway::new(&config).unwrap()
    }

    fn fixture() -> (TempDir, FilesystemGateway) {
        let dir = tempdir().unwrap();
        let gateway = gateway_for(dir.path());
        (dir, gateway)
    }

    #[tokio::test]
    async fn write_then_read_round_trips_through_tools() {
        let (dir, gateway) = fixture();
        let path = dir.path().join("note.txt").display().to_string();
        gateway
            .write_file(Parameters(WriteFileParams {
                path: path.clone(),
                content: "tool content".into(),
                create_parents: None,
            }))
            .await
            .unwrap();
        let content = gateway
            .read_file(Parameters(ReadFileParams { path }))
            .await
            .unwrap();
        assert_eq!(content, "tool content");
    }

    #[tokio::test]
    async fn read_outside_roots_is_denied() {
        let (_dir, gateway) = fixture();
        let err = gateway
            .read_file(Parameters(ReadFileParams {
                path: "/etc/passwd".into(),
            }))
            .await
            .unwrap_err();
        assert!(err.contains("access denied"));
    }

    #[tokio::test]
    async fn batch_read_reports_per_path_results_in_order() {
        let (dir, gateway) = fixture();
        let good = dir.path().join("ok.txt");
        fs::write(&good, "fine").unwrap();
        let text = gateway
            .read_multiple_files(Parameters(ReadMultipleFilesParams {
                paths: vec![good.display().to_string(), "/etc/passwd".into()],
            }))
            .await
            .unwrap();
        let results: serde_json::Value = serde_json::from_str(&text).unwrap();
        let results = results.as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["content"], "fine");
        assert!(results[0].get("error").is_none());
        assert!(
            results[1]["error"]
                .as_str()
                .unwrap()
                .contains("access denied")
        );
    }

    #[tokio::test]
    async fn batch_read_over_the_ceiling_is_rejected() {
        let (dir, gateway) = fixture();
        let paths: Vec<String> = (0..gateway.limits.max_batch + 1)
            .map(|i| dir.path().join(format!("{i}.txt")).display().to_string())
            .collect();
        let err = gateway
            .read_multiple_files(Parameters(ReadMultipleFilesParams { paths }))
            .await
            .unwrap_err();
        assert!(err.contains("invalid arguments"));
    }

    #[tokio::test]
    async fn modify_file_reports_replacement_count() {
        let (dir, gateway) = fixture();
        let path = dir.path().join("conf.ini");
        fs::write(&path, "a=1\na=1\n").unwrap();
        let message = gateway
            .modify_file(Parameters(ModifyFileParams {
                path: path.display().to_string(),
                find: "a=1".into(),
                replace: "a=2".into(),
            }))
            .await
            .unwrap();
        assert!(message.contains("Replaced 2 occurrence(s)"));
    }

    #[tokio::test]
    async fn tree_rejects_zero_depth() {
        let (dir, gateway) = fixture();
        let err = gateway
            .tree(Parameters(TreeParams {
                path: dir.path().display().to_string(),
                max_depth: Some(0),
            }))
            .await
            .unwrap_err();
        assert!(err.contains("max_depth"));
    }

    #[tokio::test]
    async fn get_file_info_returns_entry_json() {
        let (dir, gateway) = fixture();
        let path = dir.path().join("info.rs");
        fs::write(&path, "fn x() {}").unwrap();
        let text = gateway
            .get_file_info(Parameters(GetFileInfoParams {
                path: path.display().to_string(),
            }))
            .await
            .unwrap();
        let info: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(info["type"], "file");
        assert_eq!(info["size"], 9);
        assert_eq!(info["content_type"], "text/plain");
    }

    #[tokio::test]
    async fn list_allowed_directories_reports_canonical_roots() {
        let (dir, gateway) = fixture();
        let listed = gateway.list_allowed_directories().await;
        assert_eq!(
            listed,
            dir.path().canonicalize().unwrap().display().to_string()
        );
    }

    #[tokio::test]
    async fn empty_allowed_set_fails_at_construction() {
        let config = GatewayConfig::default();
        assert!(FilesystemGateway::new(&config).is_err());
    }
}
