//! Static file resolution under the web root.
//!
//! The request target is reduced to a lexically clean relative path, joined
//! under the web root, and the canonicalized result is verified to still
//! live under the root. The boundary check is the traversal defense and is
//! enforced on every request; a target that would escape the root resolves
//! to [`FileError::NotFound`], indistinguishable from a missing file.

use std::fs::Metadata;
use std::path::{Component, Path, PathBuf};

use tokio::fs::File;

/// A filesystem entry resolved from (web root, request target).
///
/// Opened at request time, dropped when streaming completes or on error.
/// Never cached across requests.
pub struct FileResource {
    pub file: File,
    pub metadata: Metadata,
    pub path: PathBuf,
}

#[derive(Debug)]
pub enum FileError {
    /// The target does not resolve to a regular file under the root.
    NotFound,
    /// The file opened but its metadata could not be read.
    Stat(std::io::Error),
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileError::NotFound => write!(f, "file not found"),
            FileError::Stat(e) => write!(f, "file stat failed: {}", e),
        }
    }
}

impl std::error::Error for FileError {}

/// Reduces a request target to a clean path under `root`.
///
/// Strips any query or fragment suffix, then resolves `.` and `..`
/// segments lexically; `..` can never climb above the root. Returns `None`
/// for targets with no usable path (e.g. "/../..").
pub fn resolve_target(root: &Path, target: &str) -> Option<PathBuf> {
    let path_part = target.split(['?', '#']).next().unwrap_or("");

    let mut clean = PathBuf::new();
    for component in Path::new(path_part).components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::ParentDir => {
                clean.pop();
            }
            // Leading "/" and "." segments carry no path information.
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }

    if clean.as_os_str().is_empty() {
        return None;
    }
    Some(root.join(clean))
}

/// Opens the file a request target resolves to.
///
/// `root` must already be canonicalized. Open failures, directories, and
/// any resolution escaping the root map to `NotFound`; a file that opens
/// but cannot be stat'ed maps to `Stat`.
pub async fn open(root: &Path, target: &str) -> Result<FileResource, FileError> {
    let path = resolve_target(root, target).ok_or(FileError::NotFound)?;

    // Symlinks inside the root could still point outside it; canonicalize
    // and re-check the boundary before touching the file.
    let path = tokio::fs::canonicalize(&path)
        .await
        .map_err(|_| FileError::NotFound)?;
    if !path.starts_with(root) {
        return Err(FileError::NotFound);
    }

    let file = File::open(&path).await.map_err(|_| FileError::NotFound)?;
    let metadata = file.metadata().await.map_err(FileError::Stat)?;
    if !metadata.is_file() {
        return Err(FileError::NotFound);
    }

    Ok(FileResource { file, metadata, path })
}

/// Content-Type for a resolved path, by extension.
pub fn mime_type(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .to_string()
}

/// File name component used for the gzip exclude pattern.
pub fn file_name(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}
