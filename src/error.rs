use std::path::PathBuf;

use thiserror::Error;

/// Failures of the guideline knowledge base.
///
/// Only `Validation` is meant to abort an operation; the remaining variants are
/// logged by the index cache and turned into an unavailable knowledge base.
#[derive(Debug, Error)]
pub enum KbError {
    #[error("invalid parameters: {0}")]
    Validation(String),

    #[error("guideline document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    #[error("failed to read guideline document {}: {reason}", .path.display())]
    DocumentRead { path: PathBuf, reason: String },

    #[error("failed to build guideline index at chunk {chunk_index}: {reason}")]
    IndexBuild { chunk_index: usize, reason: String },

    #[error("guideline index snapshot {}: {reason}", .path.display())]
    Snapshot { path: PathBuf, reason: String },
}

/// Every strategy of a remote-first dispatcher failed.
#[derive(Debug, Error)]
#[error("all {attempted} lookup strategies failed; last error: {last_error}")]
pub struct DispatchExhausted {
    pub attempted: usize,
    pub last_error: String,
}

/// Rejections of a tool invocation by the tool server.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments { tool: String, reason: String },

    #[error("failed to encode {tool} result: {source}")]
    Encode {
        tool: String,
        #[source]
        source: serde_json::Error,
    },
}
