#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Duplicate spot resolution.
//!
//! Users report that two map coordinates are the same real-world spot.
//! Accepted reports that are close enough become edges in an undirected
//! graph whose nodes are exact coordinates. Each connected component
//! ("island") collapses into its single *parent*: the one node that was
//! never reported as the side being merged away. Islands with no parent or
//! several parents are left alone until a moderator disambiguates them.
//!
//! The result is a [`CanonicalMap`] that is recomputed on every run and
//! depends only on the set of input reports, not their order.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use hitchmap_point_models::{Coordinate, CoordinateKey, DuplicateReport};
use petgraph::algo::tarjan_scc;
use petgraph::graph::{NodeIndex, UnGraph};

/// Reports spanning this distance or more are not treated as duplicates.
pub const MAX_DUPLICATE_KM: f64 = 1.25;

/// A duplicate report that passed the distance filter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurvivingDuplicate {
    /// The original report.
    pub report: DuplicateReport,
    /// Distance between `from` and `to`, in kilometers.
    pub distance_km: f64,
}

/// Mapping from a raw coordinate to the coordinate it merges into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CanonicalMap {
    entries: BTreeMap<CoordinateKey, CoordinateKey>,
}

impl CanonicalMap {
    /// Returns the canonical coordinate for `coord`, or `coord` itself if it
    /// is not part of a resolved island.
    #[must_use]
    pub fn canonicalize(&self, coord: Coordinate) -> Coordinate {
        self.get(coord).unwrap_or(coord)
    }

    /// Returns the canonical coordinate if `coord` has an entry.
    #[must_use]
    pub fn get(&self, coord: Coordinate) -> Option<Coordinate> {
        self.entries
            .get(&coord.key())
            .map(|parent| parent.coordinate())
    }

    /// Number of coordinates that get replaced.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing gets replaced.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates `(raw, canonical)` pairs in coordinate order.
    pub fn iter(&self) -> impl Iterator<Item = (Coordinate, Coordinate)> + '_ {
        self.entries
            .iter()
            .map(|(raw, parent)| (raw.coordinate(), parent.coordinate()))
    }
}

/// Outcome of a resolution run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Raw coordinate to canonical coordinate.
    pub canonical: CanonicalMap,
    /// Islands that collapsed into a single parent.
    pub resolved_islands: usize,
    /// Islands with zero or several candidate parents.
    pub unresolved_islands: usize,
}

/// Computes the distance of every report and keeps those under `max_km`.
///
/// Reports whose distance cannot be computed (non-finite coordinates) are
/// dropped as well.
#[must_use]
pub fn surviving_reports(reports: &[DuplicateReport], max_km: f64) -> Vec<SurvivingDuplicate> {
    reports
        .iter()
        .filter_map(|report| {
            let distance_km = hitchmap_spatial::distance_between(report.from, report.to);
            (distance_km < max_km).then_some(SurvivingDuplicate {
                report: *report,
                distance_km,
            })
        })
        .collect()
}

/// Resolves duplicate islands from already distance-filtered reports.
///
/// Only reports that are both reviewed and accepted contribute edges; any
/// others in `surviving` are ignored here.
#[must_use]
pub fn resolve(surviving: &[SurvivingDuplicate]) -> Resolution {
    let accepted: Vec<&DuplicateReport> = surviving
        .iter()
        .map(|s| &s.report)
        .filter(|r| r.is_accepted())
        .collect();

    let mut graph: UnGraph<CoordinateKey, i64> = UnGraph::new_undirected();
    let mut nodes: HashMap<CoordinateKey, NodeIndex> = HashMap::new();
    let mut merged_away: BTreeSet<CoordinateKey> = BTreeSet::new();

    for report in &accepted {
        let from = report.from.key();
        let to = report.to.key();
        let a = *nodes.entry(from).or_insert_with(|| graph.add_node(from));
        let b = *nodes.entry(to).or_insert_with(|| graph.add_node(to));
        graph.add_edge(a, b, report.id);
        merged_away.insert(from);
    }

    // Every edge goes both ways, so strongly connected components are islands.
    let islands = tarjan_scc(&graph);

    let mut resolution = Resolution::default();

    for island in &islands {
        let members: Vec<CoordinateKey> = island.iter().map(|&index| graph[index]).collect();
        let parents: Vec<CoordinateKey> = members
            .iter()
            .copied()
            .filter(|node| !merged_away.contains(node))
            .collect();

        let [parent] = parents.as_slice() else {
            log::debug!(
                "Leaving island of {} spots unresolved ({} candidate parents)",
                members.len(),
                parents.len()
            );
            resolution.unresolved_islands += 1;
            continue;
        };

        for node in &members {
            if node != parent {
                resolution.canonical.entries.insert(*node, *parent);
            }
        }
        resolution.resolved_islands += 1;
    }

    log::info!(
        "Resolved {} duplicate islands ({} spots replaced), {} islands need disambiguation",
        resolution.resolved_islands,
        resolution.canonical.len(),
        resolution.unresolved_islands
    );

    resolution
}
