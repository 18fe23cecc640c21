#![allow(clippy::module_name_repetitions)]
//! Canonical file locations relative to the project root.

use std::path::{Path, PathBuf};

/// Database used in production deployments, preferred when present.
pub const PROD_DATABASE_FILE: &str = "prod-points.sqlite";

/// Development database.
pub const DEV_DATABASE_FILE: &str = "points.sqlite";

/// Returns the workspace root directory.
///
/// Resolved at compile time from `CARGO_MANIFEST_DIR`, falling back to the
/// current directory if the layout is unexpected.
#[must_use]
pub fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .ancestors()
        .nth(2)
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
}

/// Returns the `db/` directory holding the `SQLite` files.
#[must_use]
pub fn db_dir() -> PathBuf {
    project_root().join("db")
}

/// Returns the `dist/` directory that the web layer serves statically.
#[must_use]
pub fn dist_dir() -> PathBuf {
    project_root().join("dist")
}

/// Picks the database file inside `dir`: the production file if it exists,
/// otherwise the development file.
#[must_use]
pub fn default_database_path(dir: &Path) -> PathBuf {
    let prod = dir.join(PROD_DATABASE_FILE);
    if prod.exists() {
        prod
    } else {
        dir.join(DEV_DATABASE_FILE)
    }
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
