//! Snapshot reads and append-only writes.
//!
//! Every column is read through an explicit `CAST` so that rows written by
//! older tools (integers in REAL columns, text booleans) still decode, and
//! then promoted to validated records by `hitchmap_database_models`.

use hitchmap_database_models::{DuplicateRow, PointRow, timestamp};
use hitchmap_point_models::{
    DuplicateReport, NewDuplicate, NewReview, Review, ReviewValidationError, User,
};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{Database, DatabaseValue};

use crate::DbError;
use crate::db::nickname_column;

/// Everything the pipeline reads, taken from one connection.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Valid reviews, newest submission first, undated last.
    pub reviews: Vec<Review>,
    /// Valid duplicate reports that are pending or accepted.
    pub duplicates: Vec<DuplicateReport>,
    /// Registered accounts.
    pub users: Vec<User>,
    /// Point rows excluded by validation.
    pub rejected_points: usize,
    /// Duplicate rows excluded by validation.
    pub rejected_duplicates: usize,
}

/// Reads points, duplicate reports, and users.
///
/// # Errors
///
/// Returns [`DbError`] if any query fails.
pub async fn load_snapshot(db: &dyn Database) -> Result<Snapshot, DbError> {
    let (reviews, rejected_points) = load_points(db).await?;
    let (duplicates, rejected_duplicates) = load_duplicates(db).await?;
    let users = load_users(db).await?;

    log::info!(
        "Loaded {} points ({rejected_points} rejected), {} duplicate reports \
         ({rejected_duplicates} rejected), {} users",
        reviews.len(),
        duplicates.len(),
        users.len(),
    );

    Ok(Snapshot {
        reviews,
        duplicates,
        users,
        rejected_points,
        rejected_duplicates,
    })
}

/// Reads every point row, newest submission first with undated rows last.
///
/// Returns the valid reviews and the number of rows rejected. Banned rows
/// are included; downstream stages skip them.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn load_points(db: &dyn Database) -> Result<(Vec<Review>, usize), DbError> {
    let nickname = nickname_column(db).await?;
    let sql = format!(
        "SELECT id,
            CAST(rating AS INTEGER) AS rating,
            CAST(wait AS REAL) AS wait,
            CAST(comment AS TEXT) AS comment,
            CAST({nickname} AS TEXT) AS nickname,
            CAST(datetime AS TEXT) AS datetime,
            CAST(reviewed AS INTEGER) AS reviewed,
            CAST(banned AS INTEGER) AS banned,
            CAST(lat AS REAL) AS lat,
            CAST(lon AS REAL) AS lon,
            CAST(dest_lat AS REAL) AS dest_lat,
            CAST(dest_lon AS REAL) AS dest_lon,
            CAST(country AS TEXT) AS country,
            CAST(signal AS TEXT) AS signal,
            CAST(ride_datetime AS TEXT) AS ride_datetime,
            CAST(user_id AS INTEGER) AS user_id
         FROM points
         ORDER BY datetime IS NOT NULL DESC, datetime DESC"
    );

    let rows = db.query_raw_params(&sql, &[]).await?;

    let mut reviews = Vec::with_capacity(rows.len());
    let mut rejected = 0;
    for row in &rows {
        match row_to_point(row).into_review() {
            Ok(review) => reviews.push(review),
            Err(e) => {
                log::warn!("Skipping point: {e}");
                rejected += 1;
            }
        }
    }

    Ok((reviews, rejected))
}

/// Reads duplicate reports that are either pending (not reviewed, not
/// accepted) or accepted. Rejected reports are never loaded.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn load_duplicates(
    db: &dyn Database,
) -> Result<(Vec<DuplicateReport>, usize), DbError> {
    let rows = db
        .query_raw_params(
            "SELECT rowid AS id,
                CAST(datetime AS TEXT) AS datetime,
                CAST(reviewed AS INTEGER) AS reviewed,
                CAST(accepted AS INTEGER) AS accepted,
                CAST(from_lat AS REAL) AS from_lat,
                CAST(from_lon AS REAL) AS from_lon,
                CAST(to_lat AS REAL) AS to_lat,
                CAST(to_lon AS REAL) AS to_lon
             FROM duplicates
             WHERE reviewed = accepted
             ORDER BY rowid",
            &[],
        )
        .await?;

    let mut reports = Vec::with_capacity(rows.len());
    let mut rejected = 0;
    for row in &rows {
        match row_to_duplicate(row).into_report() {
            Ok(report) => reports.push(report),
            Err(e) => {
                log::warn!("Skipping duplicate report: {e}");
                rejected += 1;
            }
        }
    }

    Ok((reports, rejected))
}

/// Reads all registered accounts.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub async fn load_users(db: &dyn Database) -> Result<Vec<User>, DbError> {
    let rows = db
        .query_raw_params(
            "SELECT id, CAST(username AS TEXT) AS username FROM \"user\" ORDER BY id",
            &[],
        )
        .await?;

    Ok(rows
        .iter()
        .filter_map(|row| {
            let id = row.to_value::<i64>("id").ok()?;
            let username = row.to_value::<Option<String>>("username").unwrap_or(None)?;
            Some(User { id, username })
        })
        .collect())
}

/// Validates and appends a new review, returning its random id.
///
/// # Errors
///
/// Returns [`DbError::Invalid`] if validation fails, or another [`DbError`]
/// if the insert fails.
pub async fn insert_review(
    db: &dyn Database,
    review: NewReview,
    ip: Option<&str>,
) -> Result<i64, DbError> {
    let review = review.validate()?;
    let id = random_id();
    let nickname = nickname_column(db).await?;
    let signal = review.signal.map(|s| s.to_string());

    let (dest_lat, dest_lon) = review
        .destination
        .map_or((DatabaseValue::Null, DatabaseValue::Null), |d| {
            (DatabaseValue::Real64(d.lat), DatabaseValue::Real64(d.lon))
        });

    db.exec_raw_params(
        &format!(
            "INSERT INTO points (id, rating, wait, comment, {nickname}, datetime, ip,
                 reviewed, banned, lat, lon, dest_lat, dest_lon, country, signal,
                 ride_datetime, user_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?, ?, ?, ?, ?, ?, ?)"
        ),
        &[
            DatabaseValue::Int64(id),
            DatabaseValue::Int64(review.rating),
            review.wait.map_or(DatabaseValue::Null, DatabaseValue::Int64),
            opt_str(review.comment.as_deref()),
            opt_str(review.nickname.as_deref()),
            DatabaseValue::String(timestamp::format(&review.submitted_at)),
            opt_str(ip),
            DatabaseValue::Real64(review.origin.lat),
            DatabaseValue::Real64(review.origin.lon),
            dest_lat,
            dest_lon,
            DatabaseValue::String(review.country),
            opt_str(signal.as_deref()),
            opt_str(review.ride_at.as_deref()),
            review.user_id.map_or(DatabaseValue::Null, DatabaseValue::Int64),
        ],
    )
    .await?;

    log::debug!("Inserted point {id}");
    Ok(id)
}

/// Appends a pending duplicate report.
///
/// # Errors
///
/// Returns [`DbError::Invalid`] if either coordinate is out of range, or
/// another [`DbError`] if the insert fails.
pub async fn insert_duplicate(
    db: &dyn Database,
    report: &NewDuplicate,
    ip: Option<&str>,
) -> Result<(), DbError> {
    if !report.from.is_valid() {
        return Err(ReviewValidationError::Origin {
            lat: report.from.lat,
            lon: report.from.lon,
        }
        .into());
    }
    if !report.to.is_valid() {
        return Err(ReviewValidationError::Destination {
            lat: report.to.lat,
            lon: report.to.lon,
        }
        .into());
    }

    db.exec_raw_params(
        "INSERT INTO duplicates (datetime, ip, reviewed, accepted,
             from_lat, from_lon, to_lat, to_lon)
         VALUES (?, ?, 0, 0, ?, ?, ?, ?)",
        &[
            DatabaseValue::String(timestamp::format(&report.submitted_at)),
            opt_str(ip),
            DatabaseValue::Real64(report.from.lat),
            DatabaseValue::Real64(report.from.lon),
            DatabaseValue::Real64(report.to.lat),
            DatabaseValue::Real64(report.to.lon),
        ],
    )
    .await?;

    Ok(())
}

/// Returns a non-negative random 63-bit id.
#[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn random_id() -> i64 {
    (uuid::Uuid::new_v4().as_u128() >> 65) as i64
}

/// Converts an `Option<&str>` to a [`DatabaseValue`], using `Null` for `None`.
fn opt_str(value: Option<&str>) -> DatabaseValue {
    value.map_or(DatabaseValue::Null, |s| DatabaseValue::String(s.to_string()))
}

/// Reads an `INTEGER` column as an `Option<bool>` (non-zero = true).
fn row_opt_bool(row: &switchy_database::Row, col: &str) -> Option<bool> {
    row.to_value::<Option<i64>>(col)
        .unwrap_or(None)
        .map(|v| v != 0)
}

/// Converts a database row into a [`PointRow`].
fn row_to_point(row: &switchy_database::Row) -> PointRow {
    PointRow {
        id: row.to_value("id").unwrap_or(0),
        rating: row.to_value("rating").unwrap_or(None),
        wait: row.to_value("wait").unwrap_or(None),
        comment: row.to_value("comment").unwrap_or(None),
        nickname: row.to_value("nickname").unwrap_or(None),
        datetime: row.to_value("datetime").unwrap_or(None),
        reviewed: row_opt_bool(row, "reviewed"),
        banned: row_opt_bool(row, "banned"),
        lat: row.to_value("lat").unwrap_or(None),
        lon: row.to_value("lon").unwrap_or(None),
        dest_lat: row.to_value("dest_lat").unwrap_or(None),
        dest_lon: row.to_value("dest_lon").unwrap_or(None),
        country: row.to_value("country").unwrap_or(None),
        signal: row.to_value("signal").unwrap_or(None),
        ride_datetime: row.to_value("ride_datetime").unwrap_or(None),
        user_id: row.to_value("user_id").unwrap_or(None),
    }
}

/// Converts a database row into a [`DuplicateRow`].
fn row_to_duplicate(row: &switchy_database::Row) -> DuplicateRow {
    DuplicateRow {
        id: row.to_value("id").unwrap_or(0),
        datetime: row.to_value("datetime").unwrap_or(None),
        reviewed: row_opt_bool(row, "reviewed"),
        accepted: row_opt_bool(row, "accepted"),
        from_lat: row.to_value("from_lat").unwrap_or(None),
        from_lon: row.to_value("from_lon").unwrap_or(None),
        to_lat: row.to_value("to_lat").unwrap_or(None),
        to_lon: row.to_value("to_lon").unwrap_or(None),
    }
}
