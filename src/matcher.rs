// 🔍 Place Matcher - Do two records denote the same physical venue?
// Name similarity (token-sort edit distance) combined with great-circle distance.
//
// The matcher is purely lexical/geometric. Category gating happens in the
// engine so the same functions serve the category-agnostic enrichment pass.

use crate::model::{CandidateRecord, CanonicalRecord};
use crate::normalize::{normalize_name, token_sort};
use serde::{Deserialize, Serialize};

/// Minimum token-sort similarity for a binary match
pub const NAME_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Maximum distance (meters) for a binary match
pub const MATCH_DISTANCE_M: f64 = 200.0;

/// Search radius (meters) for ranked enrichment matches
pub const ENRICHMENT_RADIUS_M: f64 = 120.0;

/// Weight of proximity in the ranked score
pub const DISTANCE_WEIGHT: f64 = 0.2;

/// Mean Earth radius (spherical approximation)
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

// ============================================================================
// VENUE ABSTRACTION
// ============================================================================

/// Anything with a name and a coordinate pair can be matched
pub trait Venue {
    fn name(&self) -> &str;
    fn coordinates(&self) -> (f64, f64);
}

impl Venue for CandidateRecord {
    fn name(&self) -> &str {
        &self.name
    }

    fn coordinates(&self) -> (f64, f64) {
        (self.location.lat, self.location.lon)
    }
}

impl Venue for CanonicalRecord {
    fn name(&self) -> &str {
        &self.name
    }

    fn coordinates(&self) -> (f64, f64) {
        (self.location.lat, self.location.lon)
    }
}

// ============================================================================
// PRIMITIVES
// ============================================================================

/// Great-circle distance in meters (haversine)
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);
    // Clamp guards asin against a > 1.0 from rounding on antipodal points
    2.0 * EARTH_RADIUS_M * a.sqrt().min(1.0).asin()
}

/// Word-order-insensitive similarity in [0, 1] between two raw names.
///
/// A name that normalizes to nothing (e.g. Arabic-only) carries no lexical
/// evidence, so it scores 0.0 against everything, itself included.
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let a = token_sort(&normalize_name(a));
    let b = token_sort(&normalize_name(b));
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b)
}

// ============================================================================
// MATCH ASSESSMENT
// ============================================================================

/// The two measurements behind every match decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchAssessment {
    pub name_similarity: f64,
    pub distance_m: f64,
}

impl MatchAssessment {
    /// Binary decision used when merging a source into the canonical set
    pub fn is_match(&self) -> bool {
        self.name_similarity >= NAME_SIMILARITY_THRESHOLD && self.distance_m <= MATCH_DISTANCE_M
    }

    pub fn within_enrichment_radius(&self) -> bool {
        self.distance_m <= ENRICHMENT_RADIUS_M
    }

    /// Ranked score: proximity adds up to DISTANCE_WEIGHT on top of the name similarity
    pub fn ranked_score(&self) -> f64 {
        let proximity = 1.0 - (self.distance_m / ENRICHMENT_RADIUS_M).min(1.0);
        self.name_similarity + DISTANCE_WEIGHT * proximity
    }
}

pub fn evaluate<T: Venue + ?Sized, C: Venue + ?Sized>(target: &T, candidate: &C) -> MatchAssessment {
    let (lat1, lon1) = target.coordinates();
    let (lat2, lon2) = candidate.coordinates();

    MatchAssessment {
        name_similarity: name_similarity(target.name(), candidate.name()),
        distance_m: haversine_m(lat1, lon1, lat2, lon2),
    }
}

/// Same venue? `name_similarity >= 0.85 && distance <= 200 m`
pub fn matches<T: Venue + ?Sized, C: Venue + ?Sized>(target: &T, candidate: &C) -> bool {
    evaluate(target, candidate).is_match()
}

/// Ranked score used for many-targets-one-candidate enrichment
pub fn score<T: Venue + ?Sized, C: Venue + ?Sized>(target: &T, candidate: &C) -> f64 {
    evaluate(target, candidate).ranked_score()
}

/// Pick the single best target within the enrichment radius.
///
/// Returns the target index and its score. Ties keep the earliest target;
/// a zero score never attaches.
pub fn best_enrichment_target<T: Venue, C: Venue + ?Sized>(
    targets: &[T],
    candidate: &C,
) -> Option<(usize, f64)> {
    let mut best: Option<(usize, f64)> = None;

    for (i, target) in targets.iter().enumerate() {
        let assessment = evaluate(target, candidate);
        if !assessment.within_enrichment_radius() {
            continue;
        }

        let s = assessment.ranked_score();
        let best_score = best.map(|(_, b)| b).unwrap_or(0.0);
        if s > best_score {
            best = Some((i, s));
        }
    }

    best
}

// ============================================================================
// TESTS
// ============================================================================
