#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Hitchhiking point, duplicate report, and user types.
//!
//! A "point" is one submitted ride experience at a pickup spot. These types
//! are the validated, immutable records that flow through deduplication,
//! text synthesis, and place aggregation. Raw storage rows are converted
//! into them by `hitchmap_database_models`.

use std::cmp::Ordering;
use std::sync::LazyLock;

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Maximum comment length (exclusive) accepted on the write path.
pub const MAX_COMMENT_CHARS: usize = 10_000;

/// Nicknames are 1-32 word characters.
static NICKNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\w{1,32}$").expect("valid regex"));

/// A WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude, -90 to 90.
    pub lat: f64,
    /// Longitude, -180 to 180.
    pub lon: f64,
}

impl Coordinate {
    /// Creates a new coordinate.
    #[must_use]
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Returns `true` if both components are finite and within WGS84 bounds.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lon.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lon)
    }

    /// Returns the exact-identity key for this coordinate.
    #[must_use]
    pub fn key(&self) -> CoordinateKey {
        CoordinateKey::from(*self)
    }
}

/// Exact identity of a [`Coordinate`], usable as a map key.
///
/// Two coordinates are the same key only when their latitude and longitude
/// are bit-identical (after folding `-0.0` into `0.0`). Ordering is by
/// latitude, then longitude, using IEEE total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoordinateKey {
    lat_bits: u64,
    lon_bits: u64,
}

impl CoordinateKey {
    /// Returns the coordinate this key identifies.
    #[must_use]
    pub const fn coordinate(self) -> Coordinate {
        Coordinate {
            lat: f64::from_bits(self.lat_bits),
            lon: f64::from_bits(self.lon_bits),
        }
    }
}

const fn fold_signed_zero(value: f64) -> f64 {
    if value == 0.0 { 0.0 } else { value }
}

impl From<Coordinate> for CoordinateKey {
    fn from(coord: Coordinate) -> Self {
        Self {
            lat_bits: fold_signed_zero(coord.lat).to_bits(),
            lon_bits: fold_signed_zero(coord.lon).to_bits(),
        }
    }
}

impl Ord for CoordinateKey {
    fn cmp(&self, other: &Self) -> Ordering {
        let a = self.coordinate();
        let b = other.coordinate();
        a.lat.total_cmp(&b.lat).then_with(|| a.lon.total_cmp(&b.lon))
    }
}

impl PartialOrd for CoordinateKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// How the hitchhiker attracted drivers.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Signal {
    /// Thumb out at the roadside.
    Thumb,
    /// Holding a cardboard sign.
    Sign,
    /// Asking drivers directly (petrol stations, parking lots).
    Ask,
    /// Asking drivers while also holding a sign.
    AskSign,
}

impl Signal {
    /// All signal variants.
    pub const ALL: &[Self] = &[Self::Thumb, Self::Sign, Self::Ask, Self::AskSign];

    /// Returns the display glyph shown after the wait time.
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Thumb => "👍",
            Self::Sign => "🪧",
            Self::Ask => "💬",
            Self::AskSign => "💬+🪧",
        }
    }
}

/// A single, validated hitchhiking review ("point").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    /// Unique review identifier.
    pub id: i64,
    /// Rating from 1 (worst) to 5 (best).
    pub rating: u8,
    /// Waiting time in minutes, as stored.
    pub wait: Option<f64>,
    /// How the ride was solicited.
    pub signal: Option<Signal>,
    /// Free-text comment.
    pub comment: Option<String>,
    /// Anonymous display name chosen at submission time.
    pub nickname: Option<String>,
    /// Owning account, if the reviewer was logged in.
    pub user_id: Option<i64>,
    /// When the review was submitted. Absent for some imported records.
    pub submitted_at: Option<NaiveDateTime>,
    /// When the ride actually happened.
    pub ride_at: Option<NaiveDateTime>,
    /// Pickup spot.
    pub origin: Coordinate,
    /// Where the ride went, if reported.
    pub destination: Option<Coordinate>,
    /// ISO 3166 alpha-2 country code, or `"unknown"`.
    pub country: String,
    /// Excluded from every aggregate and feed when `true`.
    pub banned: bool,
}

/// A user-submitted claim that two coordinates are the same spot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DuplicateReport {
    /// Storage row identifier.
    pub id: i64,
    /// The coordinate to be merged away.
    pub from: Coordinate,
    /// The coordinate to merge into.
    pub to: Coordinate,
    /// Whether a moderator has looked at the report.
    pub reviewed: bool,
    /// Whether the moderator agreed with the report.
    pub accepted: bool,
}

impl DuplicateReport {
    /// Returns `true` if the report was reviewed and accepted, which is the
    /// only state that participates in duplicate resolution.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        self.reviewed && self.accepted
    }
}

/// A registered account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Account identifier referenced by [`Review::user_id`].
    pub id: i64,
    /// Public username.
    pub username: String,
}

/// Reasons a submission is rejected on the write path.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReviewValidationError {
    /// Rating outside 1-5.
    #[error("rating {0} out of range: expected 1-5")]
    Rating(i64),

    /// Negative waiting time.
    #[error("wait {0} must not be negative")]
    Wait(i64),

    /// Comment too long.
    #[error("comment has {0} characters, limit is {MAX_COMMENT_CHARS}")]
    CommentTooLong(usize),

    /// Pickup coordinate outside WGS84 bounds.
    #[error("origin ({lat}, {lon}) out of range")]
    Origin {
        /// Offending latitude.
        lat: f64,
        /// Offending longitude.
        lon: f64,
    },

    /// Destination coordinate outside WGS84 bounds.
    #[error("destination ({lat}, {lon}) out of range")]
    Destination {
        /// Offending latitude.
        lat: f64,
        /// Offending longitude.
        lon: f64,
    },
}

/// A new review as it arrives from the web form, before storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
    /// Rating from 1 to 5.
    pub rating: i64,
    /// Waiting time in minutes.
    pub wait: Option<i64>,
    /// How the ride was solicited.
    pub signal: Option<Signal>,
    /// Free-text comment; empty strings are stored as absent.
    pub comment: Option<String>,
    /// Requested nickname.
    pub nickname: Option<String>,
    /// Owning account.
    pub user_id: Option<i64>,
    /// Submission time.
    pub submitted_at: NaiveDateTime,
    /// Ride time as entered by the user (free text, parsed downstream).
    pub ride_at: Option<String>,
    /// Pickup spot.
    pub origin: Coordinate,
    /// Where the ride went.
    pub destination: Option<Coordinate>,
    /// Country code resolved for the pickup spot.
    pub country: String,
}

impl NewReview {
    /// Validates the submission and normalizes optional fields.
    ///
    /// Empty comments become `None` and nicknames that are not 1-32 word
    /// characters are dropped rather than rejected.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewValidationError`] describing the first invalid field.
    pub fn validate(mut self) -> Result<Self, ReviewValidationError> {
        if !(1..=5).contains(&self.rating) {
            return Err(ReviewValidationError::Rating(self.rating));
        }
        if let Some(wait) = self.wait
            && wait < 0
        {
            return Err(ReviewValidationError::Wait(wait));
        }

        self.comment = self.comment.filter(|c| !c.is_empty());
        if let Some(comment) = &self.comment {
            let len = comment.chars().count();
            if len >= MAX_COMMENT_CHARS {
                return Err(ReviewValidationError::CommentTooLong(len));
            }
        }

        self.nickname = self.nickname.filter(|n| is_valid_nickname(n));

        if !self.origin.is_valid() {
            return Err(ReviewValidationError::Origin {
                lat: self.origin.lat,
                lon: self.origin.lon,
            });
        }
        if let Some(dest) = self.destination
            && !dest.is_valid()
        {
            return Err(ReviewValidationError::Destination {
                lat: dest.lat,
                lon: dest.lon,
            });
        }

        Ok(self)
    }
}

/// A new duplicate report as it arrives from the web form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewDuplicate {
    /// The coordinate to be merged away.
    pub from: Coordinate,
    /// The coordinate to merge into.
    pub to: Coordinate,
    /// Submission time.
    pub submitted_at: NaiveDateTime,
}

/// Returns `true` if `name` is 1-32 word characters (letters, digits, `_`).
#[must_use]
pub fn is_valid_nickname(name: &str) -> bool {
    NICKNAME_RE.is_match(name)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use chrono::NaiveDate;

    use super::*;

    fn new_review() -> NewReview {
        NewReview {
            rating: 4,
            wait: Some(15),
            signal: Some(Signal::Thumb),
            comment: Some("good spot".to_string()),
            nickname: Some("tramp_42".to_string()),
            user_id: None,
            submitted_at: NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            ride_at: None,
            origin: Coordinate::new(52.5, 13.4),
            destination: None,
            country: "DE".to_string(),
        }
    }

    #[test]
    fn signal_parses_kebab_case() {
        assert_eq!(Signal::from_str("ask-sign").unwrap(), Signal::AskSign);
        assert_eq!(Signal::from_str("thumb").unwrap(), Signal::Thumb);
        assert!(Signal::from_str("wave").is_err());
        assert_eq!(Signal::AskSign.as_ref(), "ask-sign");
    }

    #[test]
    fn every_signal_has_a_glyph() {
        for signal in Signal::ALL {
            assert!(!signal.glyph().is_empty(), "{signal:?} has no glyph");
        }
        assert_eq!(Signal::AskSign.glyph(), "💬+🪧");
    }

    #[test]
    fn coordinate_bounds() {
        assert!(Coordinate::new(90.0, -180.0).is_valid());
        assert!(!Coordinate::new(90.1, 0.0).is_valid());
        assert!(!Coordinate::new(0.0, f64::NAN).is_valid());
    }

    #[test]
    fn coordinate_key_is_exact() {
        let a = Coordinate::new(10.0, 20.0).key();
        let b = Coordinate::new(10.0, 20.000_000_000_001).key();
        assert_ne!(a, b);
        assert_eq!(a, Coordinate::new(10.0, 20.0).key());
        assert_eq!(Coordinate::new(-0.0, 5.0).key(), Coordinate::new(0.0, 5.0).key());
    }

    #[test]
    fn coordinate_key_orders_by_lat_then_lon() {
        let mut keys = vec![
            Coordinate::new(2.0, 1.0).key(),
            Coordinate::new(1.0, 5.0).key(),
            Coordinate::new(1.0, -5.0).key(),
        ];
        keys.sort();
        let coords: Vec<(f64, f64)> = keys
            .iter()
            .map(|k| (k.coordinate().lat, k.coordinate().lon))
            .collect();
        assert_eq!(coords, vec![(1.0, -5.0), (1.0, 5.0), (2.0, 1.0)]);
    }

    #[test]
    fn accepted_requires_review() {
        let mut report = DuplicateReport {
            id: 1,
            from: Coordinate::new(1.0, 1.0),
            to: Coordinate::new(1.0, 1.001),
            reviewed: false,
            accepted: true,
        };
        assert!(!report.is_accepted());
        report.reviewed = true;
        assert!(report.is_accepted());
    }

    #[test]
    fn validate_accepts_well_formed_submission() {
        let review = new_review().validate().unwrap();
        assert_eq!(review.nickname.as_deref(), Some("tramp_42"));
    }

    #[test]
    fn validate_rejects_bad_rating_and_wait() {
        let mut review = new_review();
        review.rating = 6;
        assert_eq!(review.validate(), Err(ReviewValidationError::Rating(6)));

        let mut review = new_review();
        review.wait = Some(-1);
        assert_eq!(review.validate(), Err(ReviewValidationError::Wait(-1)));
    }

    #[test]
    fn validate_rejects_out_of_range_destination() {
        let mut review = new_review();
        review.destination = Some(Coordinate::new(10.0, 200.0));
        assert!(matches!(
            review.validate(),
            Err(ReviewValidationError::Destination { .. })
        ));
    }

    #[test]
    fn validate_rejects_long_comment() {
        let mut review = new_review();
        review.comment = Some("x".repeat(MAX_COMMENT_CHARS));
        assert_eq!(
            review.validate(),
            Err(ReviewValidationError::CommentTooLong(MAX_COMMENT_CHARS))
        );
    }

    #[test]
    fn validate_drops_invalid_nickname_and_empty_comment() {
        let mut review = new_review();
        review.nickname = Some("not valid!".to_string());
        review.comment = Some(String::new());
        let review = review.validate().unwrap();
        assert!(review.nickname.is_none());
        assert!(review.comment.is_none());
    }

    #[test]
    fn nickname_rules() {
        assert!(is_valid_nickname("Zoë_1"));
        assert!(!is_valid_nickname(""));
        assert!(!is_valid_nickname(&"a".repeat(33)));
        assert!(!is_valid_nickname("a b"));
    }

    #[test]
    fn nickname_length_counts_characters_not_bytes() {
        assert!(is_valid_nickname(&"ё".repeat(32)));
        assert!(!is_valid_nickname(&"ё".repeat(33)));
        assert!(is_valid_nickname("東京_2024"));
        assert!(!is_valid_nickname("bob\n"));
        assert!(!is_valid_nickname("tramp-42"));
    }
}
