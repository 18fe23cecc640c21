#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Popup text synthesis for individual reviews.
//!
//! Every review shown on the map gets an HTML fragment made of its
//! comment, a short italic summary (rating, wait, ride distance), an
//! attribution, and a timestamp. Reviews submitted on or before the legacy
//! cutoff year predate reliable rating/wait metadata, so they are shown
//! with the comment, attribution, and month only.

pub mod html;

use std::collections::HashMap;
use std::fmt::Write as _;

use chrono::{Datelike as _, NaiveDateTime};
use hitchmap_point_models::{Review, User};
use hitchmap_spatial::{MIN_RIDE_KM, RideVector};

/// Last submission year rendered in the legacy format.
pub const LEGACY_CUTOFF_YEAR: i32 = 2021;

/// Separator between the attribution and the rest of the popup.
const ATTRIBUTION_DASH: &str = "―";

/// Tunables for text synthesis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextOptions {
    /// Reviews submitted in this year or earlier use the legacy format.
    pub legacy_cutoff_year: i32,
    /// Rides shorter than this many kilometers are not shown.
    pub min_ride_km: f64,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            legacy_cutoff_year: LEGACY_CUTOFF_YEAR,
            min_ride_km: MIN_RIDE_KM,
        }
    }
}

/// Formatting era of a review, decided by its submission year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Era {
    /// Submitted on or before the cutoff year.
    Legacy,
    /// Submitted after the cutoff year.
    Current,
    /// No submission timestamp; rendered like [`Era::Current`] but only
    /// when there is a comment.
    Undated,
}

impl Era {
    /// Classifies a submission timestamp.
    #[must_use]
    pub fn of(submitted_at: Option<NaiveDateTime>, cutoff_year: i32) -> Self {
        match submitted_at {
            Some(ts) if ts.year() <= cutoff_year => Self::Legacy,
            Some(_) => Self::Current,
            None => Self::Undated,
        }
    }
}

/// Lookup of account usernames by user id.
#[derive(Debug, Clone, Default)]
pub struct Usernames {
    by_id: HashMap<i64, String>,
}

impl Usernames {
    /// Builds the lookup from user rows.
    #[must_use]
    pub fn from_users(users: &[User]) -> Self {
        Self {
            by_id: users
                .iter()
                .map(|u| (u.id, u.username.clone()))
                .collect(),
        }
    }

    /// Returns the public name for a review: its nickname, else the
    /// username of its owning account.
    #[must_use]
    pub fn display_name<'a>(&'a self, review: &'a Review) -> Option<&'a str> {
        review.nickname.as_deref().or_else(|| {
            review
                .user_id
                .and_then(|id| self.by_id.get(&id))
                .map(String::as_str)
        })
    }
}

/// Derived text for a single review.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewText {
    /// Review this text belongs to.
    pub review_id: i64,
    /// Ride vector, present only for rides of at least the minimum length.
    pub ride: Option<RideVector>,
    /// Compass arrow for the ride direction.
    pub arrow: Option<&'static str>,
    /// `", wait: N min 👍"` or empty.
    pub wait_text: String,
    /// `", ride: N km ↗"` or empty.
    pub destination_text: String,
    /// Rating, wait and ride summary.
    pub extra_text: String,
    /// Public reviewer name, if any.
    pub display_name: Option<String>,
    /// HTML attribution (link to the reviewer, or "Anonymous").
    pub attribution: String,
    /// Full popup fragment. `None` when there is nothing worth showing.
    pub display_text: Option<String>,
}

/// Builds the derived text for `review`.
///
/// `review` is expected to carry its canonical origin already; the ride
/// vector is computed from it.
#[must_use]
pub fn synthesize(review: &Review, usernames: &Usernames, options: &TextOptions) -> ReviewText {
    let ride = hitchmap_spatial::significant_ride(
        review.origin,
        review.destination,
        options.min_ride_km,
    );
    let arrow = ride.and_then(|r| hitchmap_spatial::compass_arrow(r.bearing_deg));

    let wait_text = wait_text(review);
    let destination_text = ride.map_or_else(String::new, |r| destination_text(r, arrow));
    let extra_text = format!("{}{wait_text}{destination_text}", rating_text(review.rating));

    let display_name = usernames.display_name(review).map(str::to_string);
    let attribution = attribution(review, display_name.as_deref());

    let era = Era::of(review.submitted_at, options.legacy_cutoff_year);
    let display_text = display_text(review, era, &extra_text, &attribution);

    ReviewText {
        review_id: review.id,
        ride,
        arrow,
        wait_text,
        destination_text,
        extra_text,
        display_name,
        attribution,
        display_text,
    }
}

/// `"rating: N/5"`.
#[must_use]
pub fn rating_text(rating: u8) -> String {
    format!("rating: {rating}/5")
}

/// Wait summary, shown only when the review has both a wait time and a
/// submission timestamp. Fractional minutes are truncated.
#[must_use]
pub fn wait_text(review: &Review) -> String {
    let (Some(wait), Some(_)) = (review.wait, review.submitted_at) else {
        return String::new();
    };

    let mut text = format!(", wait: {} min", wait.trunc());
    if let Some(signal) = review.signal {
        text.push(' ');
        text.push_str(signal.glyph());
    }
    text
}

/// Ride summary, e.g. `", ride: 255 km ↖"`.
///
/// Distance is rounded half-to-even to whole kilometers.
#[must_use]
pub fn destination_text(ride: RideVector, arrow: Option<&str>) -> String {
    format!(
        ", ride: {:.0} km {}",
        ride.distance_km.round_ties_even(),
        arrow.unwrap_or_default()
    )
}

/// Reviewer attribution.
///
/// Named reviewers link to their filtered spot list. Anonymous reviews
/// that no account owns carry a claim hook with the review id so the web
/// layer can offer "this was me" to a logged-in user.
#[must_use]
pub fn attribution(review: &Review, display_name: Option<&str>) -> String {
    match display_name {
        Some(name) => {
            let name = html::escape_multiline(name);
            format!("<a href='/?user={name}#filters'>{name}</a>")
        }
        None if review.user_id.is_none() => format!(
            "Anonymous<span class='claim-review' data-review-id='{}'></span>",
            review.id
        ),
        None => "Anonymous".to_string(),
    }
}

/// Timestamp appended after the attribution.
///
/// Uses the ride time when known, else the submission month.
#[must_use]
pub fn timestamp_suffix(review: &Review) -> String {
    review.ride_at.map_or_else(
        || month_suffix(review.submitted_at),
        |ride_at| ride_at.format(", %a %d %b %Y, %H:%M").to_string(),
    )
}

fn month_suffix(ts: Option<NaiveDateTime>) -> String {
    ts.map(|ts| ts.format(", %B %Y").to_string())
        .unwrap_or_default()
}

fn display_text(review: &Review, era: Era, extra_text: &str, attribution: &str) -> Option<String> {
    let comment_block = match (&review.comment, era) {
        (Some(comment), _) => format!("{comment}\n\n"),
        (None, Era::Current) => String::new(),
        (None, Era::Legacy | Era::Undated) => return None,
    };

    let mut text = html::escape_multiline(&comment_block);

    match era {
        Era::Legacy => {
            text.push_str(ATTRIBUTION_DASH);
            text.push_str(attribution);
            text.push_str(&month_suffix(review.submitted_at));
        }
        Era::Current | Era::Undated => {
            let _ = write!(
                text,
                "<i>{}</i><br><br>{ATTRIBUTION_DASH}{attribution}{}",
                html::escape_multiline(extra_text),
                timestamp_suffix(review)
            );
        }
    }

    Some(text)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use hitchmap_point_models::{Coordinate, Signal};

    use super::*;

    fn ts(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn review() -> Review {
        Review {
            id: 42,
            rating: 4,
            wait: Some(10.0),
            signal: Some(Signal::Thumb),
            comment: Some("Nice & easy".to_string()),
            nickname: Some("anna".to_string()),
            user_id: None,
            submitted_at: Some(ts(2024, 5, 3, 9, 15)),
            ride_at: None,
            origin: Coordinate::new(52.52, 13.405),
            destination: None,
            country: "DE".to_string(),
            banned: false,
        }
    }

    fn synth(review: &Review) -> ReviewText {
        synthesize(review, &Usernames::default(), &TextOptions::default())
    }

    #[test]
    fn wait_text_with_thumb_signal() {
        assert_eq!(wait_text(&review()), ", wait: 10 min 👍");
    }

    #[test]
    fn wait_text_requires_submission_timestamp() {
        let mut r = review();
        r.submitted_at = None;
        assert_eq!(wait_text(&r), "");
    }

    #[test]
    fn wait_text_truncates_fractional_minutes() {
        let mut r = review();
        r.wait = Some(7.9);
        assert_eq!(wait_text(&r), ", wait: 7 min 👍");
        r.wait = Some(0.4);
        assert_eq!(wait_text(&r), ", wait: 0 min 👍");
    }

    #[test]
    fn wait_text_without_signal_has_no_glyph() {
        let mut r = review();
        r.signal = None;
        assert_eq!(wait_text(&r), ", wait: 10 min");
    }

    #[test]
    fn short_ride_has_no_destination_fields() {
        let mut r = review();
        r.destination = Some(Coordinate::new(r.origin.lat + 0.0054, r.origin.lon));
        let text = synth(&r);
        assert!(text.ride.is_none());
        assert!(text.arrow.is_none());
        assert_eq!(text.destination_text, "");
    }

    #[test]
    fn long_ride_gets_distance_and_arrow() {
        let mut r = review();
        r.destination = Some(Coordinate::new(53.5511, 9.9937));
        let text = synth(&r);
        assert_eq!(text.arrow, Some("↖"));
        assert!(text.destination_text.starts_with(", ride: 25"));
        assert!(text.destination_text.ends_with(" km ↖"));
        assert_eq!(
            text.extra_text,
            format!("rating: 4/5, wait: 10 min 👍{}", text.destination_text)
        );
    }

    #[test]
    fn destination_text_rounds_half_to_even() {
        let ride = RideVector {
            distance_km: 12.5,
            bearing_deg: 90.0,
        };
        assert_eq!(destination_text(ride, Some("→")), ", ride: 12 km →");
    }

    #[test]
    fn current_era_display_text() {
        let text = synth(&review());
        assert_eq!(
            text.display_text.as_deref(),
            Some(
                "Nice &amp; easy<br><br><i>rating: 4/5, wait: 10 min 👍</i><br><br>―\
                 <a href='/?user=anna#filters'>anna</a>, May 2024"
            )
        );
    }

    #[test]
    fn ride_time_replaces_month_suffix() {
        let mut r = review();
        r.ride_at = Some(ts(2024, 5, 1, 7, 5));
        assert_eq!(timestamp_suffix(&r), ", Wed 01 May 2024, 07:05");
        assert!(synth(&r).display_text.unwrap().ends_with(", Wed 01 May 2024, 07:05"));
    }

    #[test]
    fn legacy_era_omits_summary() {
        let mut r = review();
        r.submitted_at = Some(ts(2021, 12, 31, 23, 0));
        r.ride_at = Some(ts(2021, 12, 30, 8, 0));
        assert_eq!(
            synth(&r).display_text.as_deref(),
            Some("Nice &amp; easy<br><br>―<a href='/?user=anna#filters'>anna</a>, December 2021")
        );
    }

    #[test]
    fn missing_comment_is_empty_in_current_era() {
        let mut r = review();
        r.comment = None;
        let text = synth(&r).display_text.unwrap();
        assert!(text.starts_with("<i>rating: 4/5"));
        assert!(!text.contains("None"));
    }

    #[test]
    fn missing_comment_hides_legacy_and_undated_reviews() {
        let mut r = review();
        r.comment = None;
        r.submitted_at = Some(ts(2019, 1, 1, 0, 0));
        assert!(synth(&r).display_text.is_none());

        r.submitted_at = None;
        assert!(synth(&r).display_text.is_none());
    }

    #[test]
    fn anonymous_review_carries_claim_hook() {
        let mut r = review();
        r.nickname = None;
        let text = synth(&r);
        assert!(text.display_name.is_none());
        assert_eq!(
            text.attribution,
            "Anonymous<span class='claim-review' data-review-id='42'></span>"
        );
    }

    #[test]
    fn owned_review_resolves_username() {
        let mut r = review();
        r.nickname = None;
        r.user_id = Some(7);
        let users = Usernames::from_users(&[User {
            id: 7,
            username: "<bob>".to_string(),
        }]);
        let text = synthesize(&r, &users, &TextOptions::default());
        assert_eq!(text.display_name.as_deref(), Some("<bob>"));
        assert_eq!(
            text.attribution,
            "<a href='/?user=&lt;bob&gt;#filters'>&lt;bob&gt;</a>"
        );
    }

    #[test]
    fn owned_review_with_unknown_user_is_plain_anonymous() {
        let mut r = review();
        r.nickname = None;
        r.user_id = Some(99);
        assert_eq!(synth(&r).attribution, "Anonymous");
    }

    #[test]
    fn era_classification() {
        assert_eq!(Era::of(Some(ts(2021, 6, 1, 0, 0)), 2021), Era::Legacy);
        assert_eq!(Era::of(Some(ts(2022, 1, 1, 0, 0)), 2021), Era::Current);
        assert_eq!(Era::of(None, 2021), Era::Undated);
    }
}
