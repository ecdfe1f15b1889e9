use std::path::PathBuf;

use thiserror::Error;

pub const DEFAULT_CACHE_BUDGET_BYTES: usize = 64 * 1024 * 1024; // 64 MB

// Bytes read from the front of a file for signature sniffing.
pub const HEADER_PROBE_LEN: usize = 16;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("invalid audio format: {0}")]
    InvalidFormat(String),
    #[error("no decoder for {}; supported extensions: {}", path.display(), supported.join(", "))]
    Unsupported {
        path: PathBuf,
        supported: Vec<String>,
    },
    #[error("decode error: {0}")]
    Decode(String),
}

/// Lowercased extension of `path` without the leading dot.
pub(crate) fn extension_of(path: &std::path::Path) -> Option<String> {
    path.extension()
        .and_then(|s| s.to_str())
        .map(|s| s.to_ascii_lowercase())
}
