//! The in-memory transformation from a database snapshot to places.
//!
//! Pure: no I/O, no clock. The caller loads the [`Snapshot`] and renders
//! the [`Built`] result into artifacts.

use hitchmap_aggregate::{Place, SynthesizedReview, aggregate};
use hitchmap_database::queries::Snapshot;
use hitchmap_dedup::{Resolution, SurvivingDuplicate, resolve, surviving_reports};
use hitchmap_text::{Usernames, synthesize};

use crate::config::PipelineConfig;

/// Everything the artifacts are rendered from.
#[derive(Debug, Clone, Default)]
pub struct Built {
    /// Non-banned reviews with canonical origins and their derived text, in
    /// snapshot order.
    pub reviews: Vec<SynthesizedReview>,
    /// Places ordered by rating.
    pub places: Vec<Place>,
    /// Duplicate reports under the distance threshold.
    pub duplicates: Vec<SurvivingDuplicate>,
    /// Outcome of duplicate resolution.
    pub resolution: Resolution,
    /// Number of banned reviews left out.
    pub banned: usize,
}

/// Runs deduplication, canonicalization, text synthesis, and aggregation.
#[must_use]
pub fn build(snapshot: &Snapshot, config: &PipelineConfig) -> Built {
    let duplicates = surviving_reports(&snapshot.duplicates, config.max_duplicate_km);
    let resolution = resolve(&duplicates);

    let usernames = Usernames::from_users(&snapshot.users);
    let options = config.text_options();

    let mut banned = 0;
    let mut moved = 0;
    let mut reviews = Vec::with_capacity(snapshot.reviews.len());

    for review in &snapshot.reviews {
        if review.banned {
            banned += 1;
            continue;
        }

        let mut review = review.clone();
        if let Some(canonical) = resolution.canonical.get(review.origin) {
            review.origin = canonical;
            moved += 1;
        }

        let text = synthesize(&review, &usernames, &options);
        reviews.push(SynthesizedReview { review, text });
    }

    log::info!(
        "Moved {moved} reviews onto canonical spots, skipped {banned} banned reviews"
    );

    let places = aggregate(&reviews);

    Built {
        reviews,
        places,
        duplicates,
        resolution,
        banned,
    }
}
