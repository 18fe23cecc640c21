//! Atomic artifact writes.
//!
//! The web layer serves the output directory while the pipeline runs, so
//! every artifact is written to `<name>.tmp` and renamed over the target.
//! Readers see either the previous file or the complete new one.

use std::path::{Path, PathBuf};

/// An artifact could not be written. The previous file, if any, is intact.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    /// Creating, writing, or renaming the temporary file failed.
    #[error("Failed to write {path}: {source}")]
    Io {
        /// Target path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Returns the temporary path used while writing `path`.
#[must_use]
pub fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(ToOwned::to_owned).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Writes `bytes` to `path` via a temporary file and rename.
///
/// # Errors
///
/// Returns [`WriteError`] if the write or rename fails. The temporary file
/// is removed on failure.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), WriteError> {
    let tmp = tmp_path(path);

    let result = std::fs::write(&tmp, bytes).and_then(|()| std::fs::rename(&tmp, path));

    if let Err(source) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(WriteError::Io {
            path: path.to_path_buf(),
            source,
        });
    }

    log::debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
