//! Wholesale removal of the face database file.

use std::io;
use std::path::Path;

/// Result of [`delete_if_exists`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Delete the database file at `path` if it exists.
///
/// A missing file is not an error. Any other I/O failure (permissions, the
/// path being a directory) is returned to the caller.
pub fn delete_if_exists(path: &Path) -> io::Result<DeleteOutcome> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "deleted face database");
            Ok(DeleteOutcome::Deleted)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "face database not present");
            Ok(DeleteOutcome::NotFound)
        }
        Err(e) => Err(e),
    }
}
