//! Positional marker rows for the clustered map layer.
//!
//! The renderer reads each marker as an array indexed by position:
//! `[lat, lon, rating, text, wait, distance, review_users, dest_lats,
//! dest_lons]`. Index 2 picks the marker color and index 6 its outline.

use hitchmap_aggregate::Place;

/// One marker, serialized as a JSON array.
pub type MarkerRow<'a> = (
    f64,
    f64,
    Option<u8>,
    &'a str,
    Option<f64>,
    Option<f64>,
    &'a [String],
    &'a [f64],
    &'a [f64],
);

/// Converts a place into its marker row.
#[must_use]
pub fn marker_row(place: &Place) -> MarkerRow<'_> {
    (
        place.lat,
        place.lon,
        place.rating,
        &place.text,
        place.wait,
        place.distance,
        &place.review_users,
        &place.dest_lats,
        &place.dest_lons,
    )
}

/// Marker rows for `places`, in place order.
#[must_use]
pub fn marker_rows<'a>(places: impl IntoIterator<Item = &'a Place>) -> Vec<MarkerRow<'a>> {
    places.into_iter().map(marker_row).collect()
}
