#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Raw storage rows for the hitchhiking `SQLite` database.
//!
//! These types mirror the loosely typed `points`, `duplicates`, and `user`
//! tables: every column may be missing or hold something unexpected. They
//! are distinct from the validated records in `hitchmap_point_models`; the
//! `into_*` conversions are the single place where a raw row is checked and
//! either promoted or rejected with an error naming the row.

pub mod legacy;
pub mod timestamp;

use hitchmap_point_models::{Coordinate, DuplicateReport, Review, Signal};
use serde::{Deserialize, Serialize};

/// Country code stored when the pickup spot could not be resolved.
pub const UNKNOWN_COUNTRY: &str = "unknown";

/// Reasons a stored row cannot become a validated record.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RowError {
    /// A mandatory column was `NULL`.
    #[error("row {id}: missing {column}")]
    Missing {
        /// Row identifier.
        id: i64,
        /// Column name.
        column: &'static str,
    },

    /// Rating outside 1-5.
    #[error("row {id}: rating {rating} out of range")]
    Rating {
        /// Row identifier.
        id: i64,
        /// Stored rating.
        rating: i64,
    },

    /// Coordinate outside WGS84 bounds or not finite.
    #[error("row {id}: {column} ({lat}, {lon}) out of range")]
    Coordinate {
        /// Row identifier.
        id: i64,
        /// Which coordinate pair was bad.
        column: &'static str,
        /// Stored latitude.
        lat: f64,
        /// Stored longitude.
        lon: f64,
    },
}

/// One row of the `points` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PointRow {
    /// Primary key.
    pub id: i64,
    /// Rating, expected 1-5.
    pub rating: Option<i64>,
    /// Waiting time in minutes. Stored as REAL by older writers.
    pub wait: Option<f64>,
    /// Free-text comment.
    pub comment: Option<String>,
    /// Anonymous nickname (`name` in older schemas).
    pub nickname: Option<String>,
    /// Submission timestamp as text.
    pub datetime: Option<String>,
    /// Moderation flag. Not used by the pipeline.
    pub reviewed: Option<bool>,
    /// Excluded from every output when set.
    pub banned: Option<bool>,
    /// Pickup latitude.
    pub lat: Option<f64>,
    /// Pickup longitude.
    pub lon: Option<f64>,
    /// Destination latitude.
    pub dest_lat: Option<f64>,
    /// Destination longitude.
    pub dest_lon: Option<f64>,
    /// Country code.
    pub country: Option<String>,
    /// Signal method as kebab-case text.
    pub signal: Option<String>,
    /// Ride timestamp as entered by the user.
    pub ride_datetime: Option<String>,
    /// Owning account.
    pub user_id: Option<i64>,
}

impl PointRow {
    /// Validates the row and converts it into a [`Review`].
    ///
    /// Rating and pickup coordinates are mandatory. Everything else degrades
    /// to "absent" with a warning: a negative wait is dropped, an unknown
    /// signal is dropped, a half-filled or out-of-range destination means no
    /// destination, and unparseable timestamps become `None`. Comments of
    /// rows imported from the legacy dataset are run through
    /// [`legacy::repair_mojibake`].
    ///
    /// # Errors
    ///
    /// Returns [`RowError`] if the rating or pickup coordinate is missing or
    /// out of range.
    pub fn into_review(self) -> Result<Review, RowError> {
        let id = self.id;

        let rating = self.rating.ok_or(RowError::Missing {
            id,
            column: "rating",
        })?;
        let rating = u8::try_from(rating)
            .ok()
            .filter(|r| (1..=5).contains(r))
            .ok_or(RowError::Rating { id, rating })?;

        let (Some(lat), Some(lon)) = (self.lat, self.lon) else {
            return Err(RowError::Missing {
                id,
                column: "lat/lon",
            });
        };
        let origin = Coordinate::new(lat, lon);
        if !origin.is_valid() {
            return Err(RowError::Coordinate {
                id,
                column: "lat/lon",
                lat,
                lon,
            });
        }

        let destination = match (self.dest_lat, self.dest_lon) {
            (Some(lat), Some(lon)) if lat.is_nan() && lon.is_nan() => None,
            (Some(lat), Some(lon)) => {
                let dest = Coordinate::new(lat, lon);
                if dest.is_valid() {
                    Some(dest)
                } else {
                    log::warn!("Point {id}: ignoring destination ({lat}, {lon}) out of range");
                    None
                }
            }
            (None, None) => None,
            _ => {
                log::warn!("Point {id}: ignoring half-filled destination");
                None
            }
        };

        let wait = self.wait.and_then(|w| wait_minutes(id, w));

        let signal = self
            .signal
            .filter(|s| !s.is_empty())
            .and_then(|s| match s.parse::<Signal>() {
                Ok(signal) => Some(signal),
                Err(_) => {
                    log::warn!("Point {id}: unknown signal {s:?}");
                    None
                }
            });

        let comment = self
            .comment
            .map(|c| {
                if legacy::is_legacy_import(id) {
                    legacy::repair_mojibake(&c)
                } else {
                    c
                }
            })
            .filter(|c| !c.is_empty());

        let nickname = self.nickname.filter(|n| !n.is_empty());

        let submitted_at = self.datetime.as_deref().and_then(timestamp::parse);
        let ride_at = self.ride_datetime.as_deref().and_then(timestamp::parse);

        let country = self
            .country
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());

        Ok(Review {
            id,
            rating,
            wait,
            signal,
            comment,
            nickname,
            user_id: self.user_id,
            submitted_at,
            ride_at,
            origin,
            destination,
            country,
            banned: self.banned.unwrap_or(false),
        })
    }
}

fn wait_minutes(id: i64, wait: f64) -> Option<f64> {
    if !wait.is_finite() {
        return None;
    }
    if wait < 0.0 {
        log::warn!("Point {id}: dropping negative wait {wait}");
        return None;
    }
    Some(wait)
}

/// One row of the `duplicates` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DuplicateRow {
    /// `SQLite` row id; the table has no explicit key.
    pub id: i64,
    /// Submission timestamp as text.
    pub datetime: Option<String>,
    /// Moderator looked at the report.
    pub reviewed: Option<bool>,
    /// Moderator agreed with the report.
    pub accepted: Option<bool>,
    /// Latitude of the spot to merge away.
    pub from_lat: Option<f64>,
    /// Longitude of the spot to merge away.
    pub from_lon: Option<f64>,
    /// Latitude of the spot to merge into.
    pub to_lat: Option<f64>,
    /// Longitude of the spot to merge into.
    pub to_lon: Option<f64>,
}

impl DuplicateRow {
    /// Validates the row and converts it into a [`DuplicateReport`].
    ///
    /// # Errors
    ///
    /// Returns [`RowError`] if either endpoint is missing or out of range.
    pub fn into_report(self) -> Result<DuplicateReport, RowError> {
        let id = self.id;
        let from = endpoint(id, "from_lat/from_lon", self.from_lat, self.from_lon)?;
        let to = endpoint(id, "to_lat/to_lon", self.to_lat, self.to_lon)?;

        Ok(DuplicateReport {
            id,
            from,
            to,
            reviewed: self.reviewed.unwrap_or(false),
            accepted: self.accepted.unwrap_or(false),
        })
    }
}

fn endpoint(
    id: i64,
    column: &'static str,
    lat: Option<f64>,
    lon: Option<f64>,
) -> Result<Coordinate, RowError> {
    let (Some(lat), Some(lon)) = (lat, lon) else {
        return Err(RowError::Missing { id, column });
    };
    let coord = Coordinate::new(lat, lon);
    if coord.is_valid() {
        Ok(coord)
    } else {
        Err(RowError::Coordinate {
            id,
            column,
            lat,
            lon,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> PointRow {
        PointRow {
            id: 7,
            rating: Some(4),
            wait: Some(15.0),
            comment: Some("Good spot".to_string()),
            datetime: Some("2023-05-01 10:00:00.123456".to_string()),
            lat: Some(52.5),
            lon: Some(13.4),
            country: Some("DE".to_string()),
            signal: Some("ask-sign".to_string()),
            ..PointRow::default()
        }
    }

    #[test]
    fn converts_complete_row() {
        let review = row().into_review().unwrap();
        assert_eq!(review.rating, 4);
        assert_eq!(review.wait, Some(15.0));
        assert_eq!(review.signal, Some(Signal::AskSign));
        assert_eq!(review.origin, Coordinate::new(52.5, 13.4));
        assert!(review.destination.is_none());
        assert!(review.submitted_at.is_some());
        assert!(!review.banned);
    }

    #[test]
    fn rejects_bad_rating_with_row_id() {
        let err = PointRow {
            rating: Some(9),
            ..row()
        }
        .into_review()
        .unwrap_err();
        assert_eq!(err, RowError::Rating { id: 7, rating: 9 });

        let err = PointRow {
            rating: None,
            ..row()
        }
        .into_review()
        .unwrap_err();
        assert!(matches!(err, RowError::Missing { id: 7, .. }));
    }

    #[test]
    fn rejects_out_of_range_origin() {
        let err = PointRow {
            lat: Some(91.0),
            ..row()
        }
        .into_review()
        .unwrap_err();
        assert!(matches!(err, RowError::Coordinate { id: 7, .. }));
    }

    #[test]
    fn keeps_fractional_wait() {
        let review = PointRow {
            wait: Some(7.5),
            ..row()
        }
        .into_review()
        .unwrap();
        assert_eq!(review.wait, Some(7.5));
    }

    #[test]
    fn degrades_optional_fields() {
        let review = PointRow {
            wait: Some(-3.0),
            signal: Some("wave".to_string()),
            dest_lat: Some(f64::NAN),
            dest_lon: Some(f64::NAN),
            comment: Some(String::new()),
            country: None,
            datetime: Some("not a date".to_string()),
            ..row()
        }
        .into_review()
        .unwrap();
        assert_eq!(review.wait, None);
        assert_eq!(review.signal, None);
        assert_eq!(review.destination, None);
        assert_eq!(review.comment, None);
        assert_eq!(review.country, UNKNOWN_COUNTRY);
        assert_eq!(review.submitted_at, None);
    }

    #[test]
    fn keeps_valid_destination() {
        let review = PointRow {
            dest_lat: Some(48.1),
            dest_lon: Some(11.6),
            ..row()
        }
        .into_review()
        .unwrap();
        assert_eq!(review.destination, Some(Coordinate::new(48.1, 11.6)));
    }

    #[test]
    fn repairs_legacy_comments_only_in_import_range() {
        let legacy = PointRow {
            id: 1_000_001,
            comment: Some("cafÃ©".to_string()),
            ..row()
        }
        .into_review()
        .unwrap();
        assert_eq!(legacy.comment.as_deref(), Some("café"));

        let modern = PointRow {
            comment: Some("cafÃ©".to_string()),
            ..row()
        }
        .into_review()
        .unwrap();
        assert_eq!(modern.comment.as_deref(), Some("cafÃ©"));
    }

    #[test]
    fn duplicate_row_needs_both_endpoints() {
        let ok = DuplicateRow {
            id: 3,
            reviewed: Some(true),
            accepted: Some(true),
            from_lat: Some(1.0),
            from_lon: Some(2.0),
            to_lat: Some(1.001),
            to_lon: Some(2.0),
            ..DuplicateRow::default()
        };
        let report = ok.clone().into_report().unwrap();
        assert!(report.is_accepted());

        let err = DuplicateRow {
            to_lon: None,
            ..ok
        }
        .into_report()
        .unwrap_err();
        assert!(matches!(err, RowError::Missing { id: 3, .. }));
    }
}
