#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Builds the static JSON artifacts of the hitchhiking map.
//!
//! Reads points, duplicate reports, and users from `SQLite`, merges
//! duplicate spots, renders per-review popup text, aggregates reviews into
//! places, and writes the place feeds, the recent/duplicates/contributors
//! feeds, and the marker data into the output directory.
//!
//! Supports checksum-based caching: `manifest.json` stores a SHA-256
//! fingerprint of the input snapshot and configuration. Each output is
//! tracked independently, so an interrupted run only regenerates what is
//! missing.

pub mod config;
pub mod feeds;
pub mod interactive;
pub mod markers;
pub mod output;
pub mod pipeline;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::NaiveDateTime;
use hitchmap_cli_utils::progress::{ProgressCallback, null_progress};
use hitchmap_database::queries::{Snapshot, load_snapshot};
use serde::{Deserialize, Serialize};
use sha2::{Digest as _, Sha256};
use switchy_database::Database;

use crate::config::PipelineConfig;
use crate::pipeline::Built;

/// Current manifest schema version. Bump this when the manifest format or
/// any artifact format changes.
const MANIFEST_VERSION: u32 = 1;

/// Every place.
pub const OUTPUT_DATA: &str = "data";

/// Places with text or a ride destination.
pub const OUTPUT_DATA_LIGHT: &str = "data_light";

/// Places with a ride destination.
pub const OUTPUT_DATA_NEW: &str = "data_new";

/// Most recent reviews.
pub const OUTPUT_DATA_RECENT: &str = "data_recent";

/// Duplicate reports under the distance threshold.
pub const OUTPUT_DATA_DUPLICATES: &str = "data_duplicates";

/// Contribution leaderboard.
pub const OUTPUT_DATA_CONTRIBUTORS: &str = "data_contributors";

/// Marker rows for every place.
pub const OUTPUT_MARKERS: &str = "markers";

/// Marker rows for places with text or a ride destination.
pub const OUTPUT_MARKERS_LIGHT: &str = "markers_light";

/// Marker rows for places with a ride destination.
pub const OUTPUT_MARKERS_NEW: &str = "markers_new";

/// The JSON feeds.
pub const FEED_OUTPUTS: &[&str] = &[
    OUTPUT_DATA,
    OUTPUT_DATA_LIGHT,
    OUTPUT_DATA_NEW,
    OUTPUT_DATA_RECENT,
    OUTPUT_DATA_DUPLICATES,
    OUTPUT_DATA_CONTRIBUTORS,
];

/// The marker files.
pub const MARKER_OUTPUTS: &[&str] = &[OUTPUT_MARKERS, OUTPUT_MARKERS_LIGHT, OUTPUT_MARKERS_NEW];

/// Every output.
pub const ALL_OUTPUTS: &[&str] = &[
    OUTPUT_DATA,
    OUTPUT_DATA_LIGHT,
    OUTPUT_DATA_NEW,
    OUTPUT_DATA_RECENT,
    OUTPUT_DATA_DUPLICATES,
    OUTPUT_DATA_CONTRIBUTORS,
    OUTPUT_MARKERS,
    OUTPUT_MARKERS_LIGHT,
    OUTPUT_MARKERS_NEW,
];

/// Generation manifest stored at `<output_dir>/manifest.json`.
///
/// Records the input fingerprint at the time of last generation so
/// subsequent runs can skip unchanged outputs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Manifest {
    version: u32,
    fingerprint: String,
    /// Map of output name to ISO 8601 timestamp of last successful
    /// generation.
    outputs: BTreeMap<String, String>,
}

/// Outcome of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Fingerprint of the inputs that were used.
    pub fingerprint: String,
    /// Outputs written by this run.
    pub written: Vec<String>,
    /// Outputs that were already up to date.
    pub skipped: Vec<String>,
}

/// Settings that change artifact content, hashed into the fingerprint.
#[derive(Serialize)]
struct FingerprintInput<'a> {
    version: u32,
    site_url: &'a str,
    recent_limit: usize,
    legacy_cutoff_year: i32,
    max_duplicate_km: f64,
    min_ride_km: f64,
    /// The contributors feed has a monthly section.
    month: String,
}

/// Hashes the snapshot and the content-relevant configuration.
///
/// # Errors
///
/// Returns an error if any record fails to serialize.
pub fn fingerprint(
    snapshot: &Snapshot,
    config: &PipelineConfig,
    now: NaiveDateTime,
) -> Result<String, serde_json::Error> {
    let input = FingerprintInput {
        version: MANIFEST_VERSION,
        site_url: &config.site_url,
        recent_limit: config.recent_limit,
        legacy_cutoff_year: config.legacy_cutoff_year,
        max_duplicate_km: config.max_duplicate_km,
        min_ride_km: config.min_ride_km,
        month: now.format("%Y-%m").to_string(),
    };

    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(&input)?);
    for review in &snapshot.reviews {
        hasher.update(serde_json::to_vec(review)?);
    }
    hasher.update(b"\0duplicates");
    for report in &snapshot.duplicates {
        hasher.update(serde_json::to_vec(report)?);
    }
    hasher.update(b"\0users");
    for user in &snapshot.users {
        hasher.update(serde_json::to_vec(user)?);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Runs the pipeline with manifest-based caching, using the current UTC
/// time for the contributors feed.
///
/// # Errors
///
/// Returns an error if the database query, serialization, or any artifact
/// write fails.
pub async fn run_with_cache(
    db: &dyn Database,
    config: &PipelineConfig,
    requested_outputs: &[&str],
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    run_at(
        db,
        config,
        requested_outputs,
        chrono::Utc::now().naive_utc(),
        progress,
    )
    .await
}

/// Runs the pipeline with manifest-based caching as of `now`.
///
/// Loads a snapshot, compares its fingerprint against the stored manifest
/// to decide which `requested_outputs` need regeneration, and writes only
/// those. Skips everything when up to date unless `config.force` is set.
///
/// # Errors
///
/// Returns an error if the database query, serialization, or any artifact
/// write fails. Artifacts written before the failure stay in place;
/// artifacts not yet written keep their previous contents.
pub async fn run_at(
    db: &dyn Database,
    config: &PipelineConfig,
    requested_outputs: &[&str],
    now: NaiveDateTime,
    progress: Option<Arc<dyn ProgressCallback>>,
) -> Result<RunSummary, Box<dyn std::error::Error>> {
    let progress = progress.unwrap_or_else(null_progress);
    let dir = config.output_dir.as_path();

    progress.set_message("Loading snapshot...".to_string());
    let snapshot = load_snapshot(db).await?;
    let fingerprint = fingerprint(&snapshot, config, now)?;
    log::info!("Input fingerprint {fingerprint}");

    let manifest = load_manifest(dir);

    let mut summary = RunSummary {
        fingerprint: fingerprint.clone(),
        ..RunSummary::default()
    };

    let mut needed = Vec::new();
    for &name in requested_outputs {
        let path = output_file_path(dir, name);
        if output_needs_regen(manifest.as_ref(), &fingerprint, name, &path, config.force) {
            log::info!("{name}: needs regeneration");
            needed.push(name);
        } else {
            log::info!("{name}: up-to-date, skipping");
            summary.skipped.push(name.to_string());
        }
    }

    if needed.is_empty() {
        log::info!("All requested outputs are up-to-date, nothing to regenerate");
        progress.finish("Up to date".to_string());
        return Ok(summary);
    }

    progress.set_message("Building places...".to_string());
    let built = pipeline::build(&snapshot, config);

    // Outputs from an older snapshot must not be mistaken for current ones.
    let mut manifest = match manifest {
        Some(m) if m.version == MANIFEST_VERSION && m.fingerprint == fingerprint => m,
        _ => Manifest {
            version: MANIFEST_VERSION,
            fingerprint: fingerprint.clone(),
            outputs: BTreeMap::new(),
        },
    };

    hitchmap_database::paths::ensure_dir(dir)?;
    progress.set_total(needed.len() as u64);
    for name in needed {
        progress.set_message(format!("Writing {name}..."));
        let bytes = render(name, &built, &snapshot, config, now)?;
        output::write_atomic(&output_file_path(dir, name), &bytes)?;
        record_output(&mut manifest, name, now);
        save_manifest(dir, &manifest)?;
        summary.written.push(name.to_string());
        progress.inc(1);
    }

    progress.finish(format!("Wrote {} outputs", summary.written.len()));
    Ok(summary)
}

/// Loads a snapshot and returns its fingerprint without writing anything.
///
/// # Errors
///
/// Returns an error if the database query or serialization fails.
pub async fn current_fingerprint(
    db: &dyn Database,
    config: &PipelineConfig,
) -> Result<String, Box<dyn std::error::Error>> {
    let snapshot = load_snapshot(db).await?;
    Ok(fingerprint(
        &snapshot,
        config,
        chrono::Utc::now().naive_utc(),
    )?)
}

/// Renders one output to bytes.
///
/// # Errors
///
/// Returns an error if `name` is not a known output or serialization fails.
pub fn render(
    name: &str,
    built: &Built,
    snapshot: &Snapshot,
    config: &PipelineConfig,
    now: NaiveDateTime,
) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let places = &built.places;
    let bytes = match name {
        OUTPUT_DATA => feeds::to_json(&feeds::place_rows(places))?,
        OUTPUT_DATA_LIGHT => feeds::to_json(&feeds::place_rows(feeds::light_places(places)))?,
        OUTPUT_DATA_NEW => {
            feeds::to_json(&feeds::place_rows(feeds::destination_places(places)))?
        }
        OUTPUT_DATA_RECENT => feeds::to_json(&feeds::recent_rows(
            &built.reviews,
            &config.site_url,
            config.recent_limit,
        ))?,
        OUTPUT_DATA_DUPLICATES => {
            feeds::to_json(&feeds::duplicate_rows(&built.duplicates, &config.site_url))?
        }
        OUTPUT_DATA_CONTRIBUTORS => {
            feeds::to_json(&feeds::contributors(&snapshot.reviews, &snapshot.users, now))?
        }
        OUTPUT_MARKERS => feeds::to_json(&markers::marker_rows(places))?,
        OUTPUT_MARKERS_LIGHT => {
            feeds::to_json(&markers::marker_rows(feeds::light_places(places)))?
        }
        OUTPUT_MARKERS_NEW => {
            feeds::to_json(&markers::marker_rows(feeds::destination_places(places)))?
        }
        _ => return Err(format!("Unknown output: {name}").into()),
    };
    Ok(bytes)
}

// ============================================================
// Manifest / caching infrastructure
// ============================================================

/// Loads the generation manifest from `dir/manifest.json`.
///
/// Returns `None` if the file does not exist or cannot be parsed.
fn load_manifest(dir: &Path) -> Option<Manifest> {
    let path = dir.join("manifest.json");
    let Ok(contents) = std::fs::read_to_string(&path) else {
        log::info!("No existing manifest found");
        return None;
    };
    match serde_json::from_str(&contents) {
        Ok(m) => {
            log::info!("Loaded manifest from {}", path.display());
            Some(m)
        }
        Err(e) => {
            log::warn!("Failed to parse manifest {}: {e}", path.display());
            None
        }
    }
}

/// Writes the generation manifest to `dir/manifest.json` atomically.
///
/// # Errors
///
/// Returns an error if the manifest cannot be serialized or written.
fn save_manifest(dir: &Path, manifest: &Manifest) -> Result<(), Box<dyn std::error::Error>> {
    let path = dir.join("manifest.json");
    let contents = serde_json::to_string_pretty(manifest)?;
    output::write_atomic(&path, contents.as_bytes())?;
    log::debug!("Saved manifest to {}", path.display());
    Ok(())
}

/// Records a successful output generation in the manifest.
fn record_output(manifest: &mut Manifest, output_name: &str, now: NaiveDateTime) {
    manifest
        .outputs
        .insert(output_name.to_string(), now.and_utc().to_rfc3339());
}

/// Returns the file path for a given output name.
#[must_use]
pub fn output_file_path(dir: &Path, output_name: &str) -> PathBuf {
    dir.join(format!("{output_name}.json"))
}

/// Determines whether a specific output needs regeneration.
///
/// Returns `true` if any of: `force` is set, no manifest exists, manifest
/// version mismatch, input fingerprint changed, output not recorded in
/// manifest, or output file missing from disk.
fn output_needs_regen(
    manifest: Option<&Manifest>,
    fingerprint: &str,
    output_name: &str,
    output_path: &Path,
    force: bool,
) -> bool {
    if force {
        return true;
    }

    let Some(m) = manifest else {
        return true;
    };

    if m.version != MANIFEST_VERSION {
        return true;
    }

    if m.fingerprint != fingerprint {
        return true;
    }

    if !m.outputs.contains_key(output_name) {
        return true;
    }

    !output_path.exists()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use hitchmap_database::db::create_db;
    use hitchmap_database::queries::{insert_duplicate, insert_review};
    use hitchmap_point_models::{Coordinate, NewDuplicate, NewReview, Signal};

    use super::*;

    fn at(month: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, month, day)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn submission(rating: i64, lat: f64, lon: f64, day: u32) -> NewReview {
        NewReview {
            rating,
            wait: Some(30),
            signal: Some(Signal::Thumb),
            comment: Some(format!("rated {rating}")),
            nickname: None,
            user_id: None,
            submitted_at: at(6, day),
            ride_at: None,
            origin: Coordinate::new(lat, lon),
            destination: None,
            country: "NL".to_string(),
        }
    }

    fn setup(name: &str) -> (PathBuf, PipelineConfig) {
        let root = std::env::temp_dir().join(format!("hitchmap_generate_test_{name}"));
        let _ = std::fs::remove_dir_all(&root);
        std::fs::create_dir_all(&root).unwrap();
        let config = PipelineConfig {
            database: root.join("points.sqlite"),
            output_dir: root.join("dist"),
            ..PipelineConfig::default()
        };
        (root, config)
    }

    #[test]
    fn regen_rules() {
        let dir = std::env::temp_dir();
        let missing = dir.join("hitchmap_generate_test_never_written.json");
        let manifest = Manifest {
            version: MANIFEST_VERSION,
            fingerprint: "abc".to_string(),
            outputs: BTreeMap::from([(OUTPUT_DATA.to_string(), String::new())]),
        };

        assert!(output_needs_regen(None, "abc", OUTPUT_DATA, &dir, false));
        assert!(!output_needs_regen(Some(&manifest), "abc", OUTPUT_DATA, &dir, false));
        assert!(output_needs_regen(Some(&manifest), "abc", OUTPUT_DATA, &dir, true));
        assert!(output_needs_regen(Some(&manifest), "def", OUTPUT_DATA, &dir, false));
        assert!(output_needs_regen(Some(&manifest), "abc", OUTPUT_MARKERS, &dir, false));
        assert!(output_needs_regen(Some(&manifest), "abc", OUTPUT_DATA, &missing, false));
    }

    #[test]
    fn fingerprint_tracks_inputs_and_month() {
        let config = PipelineConfig::default();
        let empty = Snapshot::default();

        let a = fingerprint(&empty, &config, at(6, 1)).unwrap();
        assert_eq!(a, fingerprint(&empty, &config, at(6, 30)).unwrap());
        assert_ne!(a, fingerprint(&empty, &config, at(7, 1)).unwrap());

        let other = PipelineConfig {
            recent_limit: 5,
            ..config
        };
        assert_ne!(a, fingerprint(&empty, &other, at(6, 1)).unwrap());
        assert_eq!(a.len(), 64);
    }

    #[tokio::test]
    async fn writes_every_output_then_skips_when_unchanged() {
        let (root, config) = setup("end_to_end");
        let db = create_db(&config.database).await.unwrap();

        insert_review(db.as_ref(), submission(3, 10.0, 20.0, 1), None)
            .await
            .unwrap();
        insert_review(db.as_ref(), submission(5, 10.0, 20.0, 2), None)
            .await
            .unwrap();
        insert_review(db.as_ref(), submission(1, 10.005, 20.0, 3), None)
            .await
            .unwrap();
        insert_duplicate(
            db.as_ref(),
            &NewDuplicate {
                from: Coordinate::new(10.005, 20.0),
                to: Coordinate::new(10.0, 20.0),
                submitted_at: at(6, 4),
            },
            None,
        )
        .await
        .unwrap();

        let first = run_at(db.as_ref(), &config, ALL_OUTPUTS, at(6, 10), None)
            .await
            .unwrap();
        assert_eq!(first.written.len(), ALL_OUTPUTS.len());

        // The pending report is listed but does not merge anything.
        let data = std::fs::read_to_string(config.output_dir.join("data.json")).unwrap();
        let places: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(places.as_array().unwrap().len(), 2);
        assert_eq!(places[0]["rating"], 4);
        assert_eq!(places[0]["lat"], 10.0);
        assert_eq!(places[1]["rating"], 1);

        let duplicates =
            std::fs::read_to_string(config.output_dir.join("data_duplicates.json")).unwrap();
        assert!(duplicates.contains(r#""reviewed":false,"accepted":false"#));

        let recent = std::fs::read_to_string(config.output_dir.join("data_recent.json")).unwrap();
        let recent: serde_json::Value = serde_json::from_str(&recent).unwrap();
        assert_eq!(recent.as_array().unwrap().len(), 3);
        assert_eq!(recent[0]["rating"], 1);

        let second = run_at(db.as_ref(), &config, ALL_OUTPUTS, at(6, 11), None)
            .await
            .unwrap();
        assert!(second.written.is_empty());
        assert_eq!(second.skipped.len(), ALL_OUTPUTS.len());
        assert_eq!(second.fingerprint, first.fingerprint);

        let forced = PipelineConfig {
            force: true,
            ..config.clone()
        };
        run_at(db.as_ref(), &forced, FEED_OUTPUTS, at(6, 11), None)
            .await
            .unwrap();
        let again = std::fs::read_to_string(config.output_dir.join("data.json")).unwrap();
        assert_eq!(again, data);

        let _ = std::fs::remove_dir_all(&root);
    }

    #[tokio::test]
    async fn accepted_duplicate_merges_places() {
        let (root, config) = setup("accepted_duplicate");
        let db = create_db(&config.database).await.unwrap();

        insert_review(db.as_ref(), submission(2, 10.0, 20.0, 1), None)
            .await
            .unwrap();
        insert_review(db.as_ref(), submission(4, 10.005, 20.0, 2), None)
            .await
            .unwrap();
        db.exec_raw(
            "INSERT INTO duplicates (reviewed, accepted, from_lat, from_lon, to_lat, to_lon)
             VALUES (1, 1, 10.005, 20.0, 10.0, 20.0)",
        )
        .await
        .unwrap();

        run_at(db.as_ref(), &config, &[OUTPUT_MARKERS], at(6, 10), None)
            .await
            .unwrap();

        let markers = std::fs::read_to_string(config.output_dir.join("markers.json")).unwrap();
        let markers: serde_json::Value = serde_json::from_str(&markers).unwrap();
        assert_eq!(markers.as_array().unwrap().len(), 1);
        assert_eq!(markers[0][0], 10.0);
        assert_eq!(markers[0][2], 3);
        assert!(!config.output_dir.join("data.json").exists());

        let manifest = load_manifest(&config.output_dir).unwrap();
        assert_eq!(manifest.outputs.len(), 1);
        assert_eq!(manifest.outputs[OUTPUT_MARKERS], "2024-06-10T10:00:00+00:00");

        let _ = std::fs::remove_dir_all(&root);
    }

    #[test]
    fn unknown_output_is_an_error() {
        let built = Built::default();
        let snapshot = Snapshot::default();
        let config = PipelineConfig::default();
        assert!(render("nope", &built, &snapshot, &config, at(1, 1)).is_err());
        assert_eq!(
            render(OUTPUT_DATA, &built, &snapshot, &config, at(1, 1)).unwrap(),
            b"[]"
        );
    }
}
