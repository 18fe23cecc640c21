#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! `SQLite` access for the hitchhiking map.
//!
//! The web application owns the schema; this crate only reads the `points`,
//! `duplicates`, and `user` tables for the pipeline and appends new rows on
//! the write path. All SQL is raw `query_raw_params()`/`exec_raw_params()`
//! with `?` placeholders.

pub mod db;
pub mod paths;
pub mod queries;

use std::path::PathBuf;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The connection could not be opened.
    #[error("Failed to open {path}: {message}")]
    Open {
        /// Database file.
        path: PathBuf,
        /// Underlying error text.
        message: String,
    },

    /// The database file does not exist.
    #[error("Database {0} does not exist")]
    NotFound(PathBuf),

    /// A table the pipeline reads is absent.
    #[error("Table `{table}` is missing; run the web server once to create it")]
    MissingTable {
        /// Name of the missing table.
        table: &'static str,
    },

    /// A submission failed validation on the write path.
    #[error("Invalid submission: {0}")]
    Invalid(#[from] hitchmap_point_models::ReviewValidationError),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
