//! Database connection utilities.
//!
//! The web application creates the schema on first start. The pipeline only
//! opens an existing file and refuses to run when a table it reads is
//! missing; [`create_db`] exists for fresh development databases and tests.

use std::path::Path;

use moosicbox_json_utils::database::ToValue as _;
use switchy_database::Database;
use switchy_database_connection::init_sqlite_rusqlite;

use crate::DbError;

/// Tables the pipeline reads.
pub const REQUIRED_TABLES: &[&str] = &["points", "duplicates", "user"];

/// Opens an existing `SQLite` database and checks that every table in
/// [`REQUIRED_TABLES`] is present.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the file does not exist,
/// [`DbError::MissingTable`] if a table is absent, or another [`DbError`] if
/// the connection fails.
pub async fn open_db(path: &Path) -> Result<Box<dyn Database>, DbError> {
    if !path.exists() {
        return Err(DbError::NotFound(path.to_path_buf()));
    }

    let db = init_sqlite_rusqlite(Some(path)).map_err(|e| DbError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    require_tables(db.as_ref()).await?;

    log::info!("Opened {}", path.display());
    Ok(db)
}

/// Opens (or creates) a database at `path` and creates any missing tables.
///
/// # Errors
///
/// Returns [`DbError`] if the file cannot be created or the DDL fails.
pub async fn create_db(path: &Path) -> Result<Box<dyn Database>, DbError> {
    if let Some(parent) = path.parent() {
        crate::paths::ensure_dir(parent).map_err(|e| DbError::Open {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
    }

    let db = init_sqlite_rusqlite(Some(path)).map_err(|e| DbError::Open {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    create_schema(db.as_ref()).await?;

    Ok(db)
}

/// Fails with [`DbError::MissingTable`] naming the first absent table.
///
/// # Errors
///
/// Returns [`DbError`] if the catalog query fails or a table is missing.
pub async fn require_tables(db: &dyn Database) -> Result<(), DbError> {
    let rows = db
        .query_raw_params(
            "SELECT name FROM sqlite_master WHERE type = 'table'",
            &[],
        )
        .await?;

    let present: Vec<String> = rows
        .iter()
        .filter_map(|row| row.to_value::<String>("name").ok())
        .collect();

    for &table in REQUIRED_TABLES {
        if !present.iter().any(|name| name == table) {
            log::error!("Table `{table}` not found in database");
            return Err(DbError::MissingTable { table });
        }
    }

    Ok(())
}

/// Creates the tables the web application would create, if absent.
///
/// # Errors
///
/// Returns [`DbError`] if any DDL statement fails.
pub async fn create_schema(db: &dyn Database) -> Result<(), DbError> {
    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS points (
            id INTEGER PRIMARY KEY,
            rating INTEGER,
            wait REAL,
            comment TEXT,
            nickname TEXT,
            datetime TEXT,
            ip TEXT,
            reviewed INTEGER,
            banned INTEGER,
            lat REAL,
            lon REAL,
            dest_lat REAL,
            dest_lon REAL,
            country TEXT,
            signal TEXT,
            ride_datetime TEXT,
            user_id INTEGER
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS duplicates (
            datetime TEXT,
            ip TEXT,
            reviewed INTEGER,
            accepted INTEGER,
            from_lat REAL,
            from_lon REAL,
            to_lat REAL,
            to_lon REAL
        )",
    )
    .await?;

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS \"user\" (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE
        )",
    )
    .await?;

    Ok(())
}

/// Returns the column holding the anonymous nickname. Databases created by
/// older versions of the web application call it `name`.
///
/// # Errors
///
/// Returns [`DbError`] if the table info query fails.
pub async fn nickname_column(db: &dyn Database) -> Result<&'static str, DbError> {
    let rows = db
        .query_raw_params("SELECT name FROM pragma_table_info('points')", &[])
        .await?;

    let has = |column: &str| {
        rows.iter()
            .any(|row| row.to_value::<String>("name").is_ok_and(|n| n == column))
    };

    Ok(if !has("nickname") && has("name") {
        "name"
    } else {
        "nickname"
    })
}
