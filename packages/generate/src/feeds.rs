//! JSON feeds consumed by the map frontend.
//!
//! All feeds are compact JSON with UTF-8 left unescaped. Field order is the
//! declaration order of the row structs, so repeated runs over the same
//! snapshot produce identical bytes. `serde_json` writes non-finite floats
//! as `null`, so no feed ever contains `NaN` or `Infinity`.

use std::collections::HashMap;

use chrono::{Datelike as _, NaiveDateTime};
use hitchmap_aggregate::{Place, SynthesizedReview};
use hitchmap_database_models::timestamp;
use hitchmap_dedup::SurvivingDuplicate;
use hitchmap_point_models::{Coordinate, Review, User};
use serde::Serialize;

/// Marker appended to the recent-feed timestamp when the ride time is known.
const RIDE_TIME_MARKER: &str = " 🕒";

/// Serializes `value` as compact JSON.
///
/// # Errors
///
/// Returns a [`serde_json::Error`] if serialization fails.
pub fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(value)
}

/// Formats a coordinate component as the shortest text that round-trips,
/// always with a decimal point (`10.0`, not `10`).
#[must_use]
pub fn coordinate_text(value: f64) -> String {
    let text = value.to_string();
    if value.is_finite() && !text.contains('.') {
        format!("{text}.0")
    } else {
        text
    }
}

/// Link that opens the map centered on `coord`.
#[must_use]
pub fn share_url(site_url: &str, coord: Coordinate) -> String {
    format!(
        "{site_url}/#{},{}",
        coordinate_text(coord.lat),
        coordinate_text(coord.lon)
    )
}

/// One place in `data.json` and its filtered variants.
#[derive(Debug, Serialize)]
pub struct PlaceRow<'a> {
    lat: f64,
    lon: f64,
    rating: Option<u8>,
    text: &'a str,
    wait: Option<f64>,
    distance: Option<f64>,
    review_users: &'a [String],
    dest_lats: &'a [f64],
    dest_lons: &'a [f64],
}

impl<'a> From<&'a Place> for PlaceRow<'a> {
    fn from(place: &'a Place) -> Self {
        Self {
            lat: place.lat,
            lon: place.lon,
            rating: place.rating,
            text: &place.text,
            wait: place.wait,
            distance: place.distance,
            review_users: &place.review_users,
            dest_lats: &place.dest_lats,
            dest_lons: &place.dest_lons,
        }
    }
}

/// Rows for every place, in place order.
#[must_use]
pub fn place_rows<'a>(places: impl IntoIterator<Item = &'a Place>) -> Vec<PlaceRow<'a>> {
    places.into_iter().map(PlaceRow::from).collect()
}

/// Places with text or a ride destination.
pub fn light_places(places: &[Place]) -> impl Iterator<Item = &Place> {
    places.iter().filter(|p| p.is_light())
}

/// Places with a ride destination.
pub fn destination_places(places: &[Place]) -> impl Iterator<Item = &Place> {
    places.iter().filter(|p| p.has_destination())
}

/// One entry of `data_recent.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentRow {
    /// Review id, used by the claim affordance.
    pub id: i64,
    /// Share link to the (canonical) spot.
    pub url: String,
    /// Country code.
    pub country: String,
    /// Submission time, with a clock marker when the ride time is known.
    pub datetime: String,
    /// Public reviewer name, empty when anonymous.
    pub hitchhiker: String,
    /// Rating 1-5.
    pub rating: u8,
    /// Ride distance rounded to one decimal.
    pub distance: Option<f64>,
    /// Comment followed by the rating/wait/ride summary.
    pub text: String,
}

/// The `limit` most recently submitted reviews, newest first.
///
/// Undated reviews are left out. Ties keep snapshot order.
#[must_use]
pub fn recent_rows(reviews: &[SynthesizedReview], site_url: &str, limit: usize) -> Vec<RecentRow> {
    let mut dated: Vec<(&SynthesizedReview, NaiveDateTime)> = reviews
        .iter()
        .filter(|item| !item.review.banned)
        .filter_map(|item| item.review.submitted_at.map(|ts| (item, ts)))
        .collect();

    dated.sort_by(|a, b| b.1.cmp(&a.1));
    dated.truncate(limit);

    dated
        .into_iter()
        .map(|(item, submitted_at)| {
            let review = &item.review;
            let text = &item.text;

            let mut datetime = timestamp::format(&submitted_at);
            if review.ride_at.is_some() {
                datetime.push_str(RIDE_TIME_MARKER);
            }

            RecentRow {
                id: review.id,
                url: share_url(site_url, review.origin),
                country: review.country.clone(),
                datetime,
                hitchhiker: text
                    .display_name
                    .as_deref()
                    .map(|name| name.replace("://", ""))
                    .unwrap_or_default(),
                rating: review.rating,
                distance: text.ride.map(|r| round_one_decimal(r.distance_km)),
                text: format!(
                    "{} {}",
                    review.comment.as_deref().unwrap_or_default(),
                    text.extra_text
                ),
            }
        })
        .collect()
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// One entry of `data_duplicates.json`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateFeedRow {
    /// Report row id.
    pub id: i64,
    /// Share link to the spot being merged away.
    pub from_url: String,
    /// Share link to the spot being merged into.
    pub to_url: String,
    /// Great-circle distance between the two spots, in kilometers.
    pub distance: f64,
    /// Moderator looked at the report.
    pub reviewed: bool,
    /// Moderator agreed with the report.
    pub accepted: bool,
}

/// Rows for every report that survived the distance filter.
#[must_use]
pub fn duplicate_rows(duplicates: &[SurvivingDuplicate], site_url: &str) -> Vec<DuplicateFeedRow> {
    duplicates
        .iter()
        .map(|d| DuplicateFeedRow {
            id: d.report.id,
            from_url: share_url(site_url, d.report.from),
            to_url: share_url(site_url, d.report.to),
            distance: d.distance_km,
            reviewed: d.report.reviewed,
            accepted: d.report.accepted,
        })
        .collect()
}

/// One ranked line of the contributors leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributorRow {
    /// 1-based position.
    pub rank: usize,
    /// Account username, `None` if the account no longer exists.
    pub hitchhiker: Option<String>,
    /// Number of reviews.
    pub total_contributions: u64,
}

/// `data_contributors.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContributorsFeed {
    /// All-time ranking.
    pub overall: Vec<ContributorRow>,
    /// Ranking for the calendar month of `now`.
    pub monthly: Vec<ContributorRow>,
}

/// Counts non-banned reviews per owning account.
///
/// Reviews without an account are not counted. Rankings are by count
/// descending, then username, then account id.
#[must_use]
pub fn contributors(reviews: &[Review], users: &[User], now: NaiveDateTime) -> ContributorsFeed {
    let usernames: HashMap<i64, &str> = users.iter().map(|u| (u.id, u.username.as_str())).collect();

    let in_month = |review: &Review| {
        review
            .submitted_at
            .is_some_and(|ts| ts.year() == now.year() && ts.month() == now.month())
    };

    let owned = || reviews.iter().filter(|r| !r.banned).filter(|r| r.user_id.is_some());

    ContributorsFeed {
        overall: rank(owned(), &usernames),
        monthly: rank(owned().filter(|r| in_month(r)), &usernames),
    }
}

fn rank<'a>(
    reviews: impl Iterator<Item = &'a Review>,
    usernames: &HashMap<i64, &str>,
) -> Vec<ContributorRow> {
    let mut counts: HashMap<i64, u64> = HashMap::new();
    for review in reviews {
        if let Some(user_id) = review.user_id {
            *counts.entry(user_id).or_default() += 1;
        }
    }

    let mut ranked: Vec<(i64, Option<&str>, u64)> = counts
        .into_iter()
        .map(|(id, count)| (id, usernames.get(&id).copied(), count))
        .collect();
    ranked.sort_by(|a, b| b.2.cmp(&a.2).then_with(|| a.1.cmp(&b.1)).then(a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .enumerate()
        .map(|(i, (_, name, count))| ContributorRow {
            rank: i + 1,
            hitchhiker: name.map(str::to_string),
            total_contributions: count,
        })
        .collect()
}
