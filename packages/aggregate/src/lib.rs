#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Place aggregation.
//!
//! Reviews are grouped by their exact canonical coordinate. Each group
//! becomes a [`Place`] with averaged rating, wait and ride distance, the
//! concatenated popup text of its reviews, the distinct names of its
//! reviewers, and the destinations of its rides.
//!
//! Output order is rating descending. Places with equal ratings keep their
//! coordinate order (latitude, then longitude, ascending).

use std::collections::BTreeMap;

use hitchmap_point_models::{Coordinate, CoordinateKey, Review};
use hitchmap_text::ReviewText;

/// Separator placed between the popup texts of a place's reviews.
pub const TEXT_SEPARATOR: &str = "<hr>";

/// A review with its canonical origin and synthesized text.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizedReview {
    /// The review, with `origin` already replaced by its canonical spot.
    pub review: Review,
    /// Text derived from the review.
    pub text: ReviewText,
}

/// Aggregate of every review at one canonical coordinate.
#[derive(Debug, Clone, PartialEq)]
pub struct Place {
    /// Canonical latitude.
    pub lat: f64,
    /// Canonical longitude.
    pub lon: f64,
    /// First country code seen among the place's reviews.
    pub country: Option<String>,
    /// Mean rating rounded to the nearest integer, ties rounding up.
    pub rating: Option<u8>,
    /// Mean wait over reviews that reported one, in minutes.
    pub wait: Option<f64>,
    /// Mean ride distance over reviews with a meaningful destination.
    pub distance: Option<f64>,
    /// Popup texts joined by [`TEXT_SEPARATOR`].
    pub text: String,
    /// Distinct reviewer names, in first-seen order.
    pub review_users: Vec<String>,
    /// Destination latitudes, parallel to `dest_lons`.
    pub dest_lats: Vec<f64>,
    /// Destination longitudes, parallel to `dest_lats`.
    pub dest_lons: Vec<f64>,
}

impl Place {
    /// Returns the canonical coordinate of this place.
    #[must_use]
    pub const fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.lat, self.lon)
    }

    /// Places worth showing on the light map: they have text or rides.
    #[must_use]
    pub fn is_light(&self) -> bool {
        !self.text.is_empty() || self.distance.is_some()
    }

    /// Places with at least one meaningful ride destination.
    #[must_use]
    pub const fn has_destination(&self) -> bool {
        self.distance.is_some()
    }
}

/// Running sums for one group.
#[derive(Default)]
struct Accumulator<'a> {
    country: Option<&'a str>,
    rating_sum: u32,
    rating_count: u32,
    wait_sum: f64,
    wait_count: u32,
    distance_sum: f64,
    distance_count: u32,
    texts: Vec<&'a str>,
    review_users: Vec<&'a str>,
    dest_lats: Vec<f64>,
    dest_lons: Vec<f64>,
}

impl<'a> Accumulator<'a> {
    fn push(&mut self, item: &'a SynthesizedReview) {
        let review = &item.review;
        let text = &item.text;

        if self.country.is_none() && !review.country.is_empty() {
            self.country = Some(&review.country);
        }

        self.rating_sum += u32::from(review.rating);
        self.rating_count += 1;

        if let Some(wait) = review.wait {
            self.wait_sum += wait;
            self.wait_count += 1;
        }

        if let Some(ride) = text.ride {
            self.distance_sum += ride.distance_km;
            self.distance_count += 1;
            if let Some(dest) = review.destination {
                self.dest_lats.push(dest.lat);
                self.dest_lons.push(dest.lon);
            }
        }

        if let Some(display_text) = text.display_text.as_deref().filter(|t| !t.is_empty()) {
            self.texts.push(display_text);
            if let Some(name) = text.display_name.as_deref()
                && !self.review_users.contains(&name)
            {
                self.review_users.push(name);
            }
        }
    }

    fn finish(self, key: CoordinateKey) -> Place {
        let coord = key.coordinate();
        Place {
            lat: coord.lat,
            lon: coord.lon,
            country: self.country.map(str::to_string),
            rating: rounded_mean_rating(self.rating_sum, self.rating_count),
            wait: mean(self.wait_sum, self.wait_count),
            distance: mean(self.distance_sum, self.distance_count),
            text: self.texts.join(TEXT_SEPARATOR),
            review_users: self.review_users.into_iter().map(str::to_string).collect(),
            dest_lats: self.dest_lats,
            dest_lons: self.dest_lons,
        }
    }
}

fn mean(sum: f64, count: u32) -> Option<f64> {
    (count > 0).then(|| sum / f64::from(count))
}

/// Mean rating rounded half-up. Ratings are 1-5, so the result is too.
fn rounded_mean_rating(sum: u32, count: u32) -> Option<u8> {
    if count == 0 {
        return None;
    }
    // floor(sum / count + 1/2) in integer arithmetic
    let rounded = (2 * sum + count) / (2 * count);
    u8::try_from(rounded).ok()
}

/// Groups reviews into places.
///
/// Banned reviews are skipped. Within a place, reviews contribute in input
/// order, which decides the first country, text order and reviewer order.
#[must_use]
pub fn aggregate(reviews: &[SynthesizedReview]) -> Vec<Place> {
    let mut groups: BTreeMap<CoordinateKey, Accumulator<'_>> = BTreeMap::new();
    let mut banned = 0usize;

    for item in reviews {
        if item.review.banned {
            banned += 1;
            continue;
        }
        groups
            .entry(item.review.origin.key())
            .or_default()
            .push(item);
    }

    if banned > 0 {
        log::debug!("Skipped {banned} banned reviews during aggregation");
    }

    let mut places: Vec<Place> = groups
        .into_iter()
        .map(|(key, acc)| acc.finish(key))
        .collect();

    // Stable: equal ratings keep coordinate order; missing ratings sort last.
    places.sort_by(|a, b| b.rating.cmp(&a.rating));

    log::info!("Aggregated {} reviews into {} places", reviews.len() - banned, places.len());

    places
}
