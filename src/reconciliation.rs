// ⚖️ Reconciliation Engine - Many source lists → one canonical place list
//
// One run walks the sources in caller order:
//   EMPTY → SEEDED → MERGING → ENRICHING → FINALIZED
//
// The first primary source seeds the set unconditionally. Every later primary
// candidate merges into the FIRST same-category entry it matches (insertion
// order), or is appended. Enrichment candidates only attach to the best entry
// within 120 m and never create entries. Finalization infers missing
// categories, drops what stays uncategorized, and assigns ids.

use crate::category::CategoryInference;
use crate::matcher::{self, Venue};
use crate::model::{
    CandidateRecord, CanonicalRecord, Category, Contacts, Location, PlaceStatus, Provenance, Rating,
};
use crate::normalize::{normalize_name, slugify, SLUG_MAX_LEN};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, trace};

/// Default id namespace
pub const DEFAULT_NAMESPACE: &str = "bestmuscat";

// ============================================================================
// SOURCES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRole {
    /// May seed and append venues
    Primary,
    /// Knowledge-base records: attach to existing venues only
    Enrichment,
}

/// One source's candidates, in payload order
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source: String,
    pub role: SourceRole,
    pub candidates: Vec<CandidateRecord>,
}

impl SourceBatch {
    pub fn primary(source: impl Into<String>, candidates: Vec<CandidateRecord>) -> Self {
        SourceBatch {
            source: source.into(),
            role: SourceRole::Primary,
            candidates,
        }
    }

    pub fn enrichment(source: impl Into<String>, candidates: Vec<CandidateRecord>) -> Self {
        SourceBatch {
            source: source.into(),
            role: SourceRole::Enrichment,
            candidates,
        }
    }

    pub fn empty(source: impl Into<String>, role: SourceRole) -> Self {
        SourceBatch {
            source: source.into(),
            role,
            candidates: Vec::new(),
        }
    }
}

// ============================================================================
// WORKING ENTRY
// ============================================================================

/// A canonical entry while the run is still merging into it
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceDraft {
    pub name: String,
    pub category: Option<Category>,
    pub location: Location,
    pub contacts: Contacts,
    pub open_hours: Option<String>,
    pub price_tier: Option<String>,
    pub rating: Rating,
    pub wikimedia_image_url: Option<String>,
    pub sources: Provenance,
}

impl From<CandidateRecord> for PlaceDraft {
    fn from(c: CandidateRecord) -> Self {
        PlaceDraft {
            name: c.name,
            category: c.category,
            location: c.location,
            contacts: c.contacts,
            open_hours: c.open_hours,
            price_tier: c.price_tier,
            rating: c.rating,
            wikimedia_image_url: c.wikimedia_image_url,
            sources: c.provenance,
        }
    }
}

impl Venue for PlaceDraft {
    fn name(&self) -> &str {
        &self.name
    }

    fn coordinates(&self) -> (f64, f64) {
        (self.location.lat, self.location.lon)
    }
}

/// Only null → value transitions
fn fill<T>(slot: &mut Option<T>, incoming: Option<T>, field: &'static str, adopted: &mut Vec<&'static str>) {
    if slot.is_none() && incoming.is_some() {
        *slot = incoming;
        adopted.push(field);
    }
}

impl PlaceDraft {
    /// Merge a matched candidate into this entry.
    ///
    /// Populated fields are never overwritten. Provenance always accumulates:
    /// a second, different id from the same source is kept alongside the first.
    /// Returns the names of the fields that were adopted.
    pub fn absorb(&mut self, c: CandidateRecord) -> Vec<&'static str> {
        let mut adopted = Vec::new();

        fill(&mut self.category, c.category, "category", &mut adopted);
        fill(&mut self.location.address, c.location.address, "location.address", &mut adopted);
        fill(&mut self.contacts.phone, c.contacts.phone, "contacts.phone", &mut adopted);
        fill(&mut self.contacts.website, c.contacts.website, "contacts.website", &mut adopted);
        fill(&mut self.open_hours, c.open_hours, "open_hours", &mut adopted);
        fill(&mut self.price_tier, c.price_tier, "price_tier", &mut adopted);
        fill(&mut self.rating.score, c.rating.score, "rating.score", &mut adopted);
        fill(&mut self.rating.count, c.rating.count, "rating.count", &mut adopted);
        fill(&mut self.wikimedia_image_url, c.wikimedia_image_url, "wikimedia_image_url", &mut adopted);

        for (source, id) in c.provenance {
            accumulate_source(&mut self.sources, source, id);
        }

        adopted
    }
}

fn accumulate_source(sources: &mut Provenance, source: String, id: Value) {
    match sources.get_mut(&source) {
        None => {
            sources.insert(source, id);
        }
        Some(Value::Array(ids)) => {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
        Some(existing) => {
            if *existing != id {
                let first = existing.take();
                *existing = Value::Array(vec![first, id]);
            }
        }
    }
}

/// Same-category gate for the binary path. An unknown category is compatible with anything.
fn categories_compatible(a: Option<Category>, b: Option<Category>) -> bool {
    match (a, b) {
        (Some(x), Some(y)) => x == y,
        _ => true,
    }
}

// ============================================================================
// RUN BOOKKEEPING
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EngineState {
    Empty,
    Seeded,
    Merging,
    Enriching,
    Finalized,
}

#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// First segment of every id
    pub namespace: String,

    /// Maximum slug length (default: 80)
    pub slug_max_len: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            namespace: DEFAULT_NAMESPACE.to_string(),
            slug_max_len: SLUG_MAX_LEN,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationStats {
    pub sources_processed: usize,
    pub candidates_seen: usize,
    pub seeded: usize,
    pub merged: usize,
    pub appended: usize,
    /// Candidates that matched more than one existing entry (first one won)
    pub ambiguous_matches: usize,
    pub enriched: usize,
    pub enrichment_discarded: usize,
    pub inferred_categories: usize,
    pub dropped_uncategorized: usize,
    pub emitted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueKind {
    /// Source payload missing or unreadable; treated as empty
    SourceUnavailable,
    /// Entry had no category even after inference; excluded from output
    UnresolvableCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationIssue {
    pub kind: IssueKind,
    /// Source name or place name
    pub subject: String,
    pub detail: String,
}

impl ReconciliationIssue {
    pub fn source_unavailable(source: &str, detail: impl Into<String>) -> Self {
        ReconciliationIssue {
            kind: IssueKind::SourceUnavailable,
            subject: source.to_string(),
            detail: detail.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationReport {
    /// Canonical list, in insertion order
    pub places: Vec<CanonicalRecord>,
    pub stats: ReconciliationStats,
    pub issues: Vec<ReconciliationIssue>,
    pub reconciled_at: DateTime<Utc>,
}

impl ReconciliationReport {
    /// Zero places after a full run. Not an error here; quality gates decide.
    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }

    pub fn summary(&self) -> String {
        format!(
            "{} places from {} candidates across {} sources: {} seeded, {} merged, {} appended, {} enriched, {} dropped uncategorized",
            self.stats.emitted,
            self.stats.candidates_seen,
            self.stats.sources_processed,
            self.stats.seeded,
            self.stats.merged,
            self.stats.appended,
            self.stats.enriched,
            self.stats.dropped_uncategorized
        )
    }
}

// ============================================================================
// RECONCILIATION ENGINE
// ============================================================================

/// Single-threaded, order-sensitive merge over one run.
/// Owns the growing canonical set until `finalize` hands it off.
pub struct ReconciliationEngine {
    options: EngineOptions,
    inference: CategoryInference,
    state: EngineState,
    places: Vec<PlaceDraft>,
    stats: ReconciliationStats,
    issues: Vec<ReconciliationIssue>,
}

impl ReconciliationEngine {
    pub fn new(options: EngineOptions) -> Self {
        ReconciliationEngine {
            options,
            inference: CategoryInference::new(),
            state: EngineState::Empty,
            places: Vec::new(),
            stats: ReconciliationStats::default(),
            issues: Vec::new(),
        }
    }

    pub fn with_inference(mut self, inference: CategoryInference) -> Self {
        self.inference = inference;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn places(&self) -> &[PlaceDraft] {
        &self.places
    }

    /// Note a problem found outside the engine (e.g. an unreadable source).
    /// The run carries on.
    pub fn record_issue(&mut self, issue: ReconciliationIssue) {
        self.issues.push(issue);
    }

    /// Route a batch by role and engine state
    pub fn ingest(&mut self, batch: SourceBatch) {
        match batch.role {
            SourceRole::Enrichment => self.enrich(&batch.source, batch.candidates),
            SourceRole::Primary if self.state == EngineState::Empty => {
                self.seed(&batch.source, batch.candidates)
            }
            SourceRole::Primary => self.merge(&batch.source, batch.candidates),
        }
    }

    /// Append every candidate unconditionally. A source is assumed internally
    /// deduplicated, so there is no matching within the seed batch.
    pub fn seed(&mut self, source: &str, candidates: Vec<CandidateRecord>) {
        self.stats.sources_processed += 1;
        self.stats.candidates_seen += candidates.len();

        if candidates.is_empty() {
            debug!(source, "seed batch empty, waiting for next primary source");
            return;
        }

        self.stats.seeded += candidates.len();
        self.places.extend(candidates.into_iter().map(PlaceDraft::from));
        self.state = EngineState::Seeded;

        info!(source, places = self.places.len(), "seeded canonical set");
    }

    /// First-match-wins merge of a primary source, in insertion order
    pub fn merge(&mut self, source: &str, candidates: Vec<CandidateRecord>) {
        self.stats.sources_processed += 1;
        self.stats.candidates_seen += candidates.len();
        if self.state != EngineState::Empty || !candidates.is_empty() {
            self.state = EngineState::Merging;
        }

        let (mut merged, mut appended) = (0usize, 0usize);

        for candidate in candidates {
            let mut hits = self.places.iter().enumerate().filter(|(_, place)| {
                categories_compatible(place.category, candidate.category)
                    && matcher::matches(*place, &candidate)
            });

            let first = hits.next().map(|(i, _)| i);
            if first.is_some() && hits.next().is_some() {
                self.stats.ambiguous_matches += 1;
                debug!(source, name = %candidate.name, "candidate matches several entries, first one wins");
            }

            match first {
                Some(i) => {
                    let adopted = self.places[i].absorb(candidate);
                    trace!(source, target = %self.places[i].name, ?adopted, "merged");
                    merged += 1;
                }
                None => {
                    trace!(source, name = %candidate.name, "appended");
                    self.places.push(PlaceDraft::from(candidate));
                    appended += 1;
                }
            }
        }

        self.stats.merged += merged;
        self.stats.appended += appended;
        info!(source, merged, appended, places = self.places.len(), "merged source");
    }

    /// Attach knowledge-base candidates to the best entry within 120 m.
    /// Candidates with nothing in radius are discarded.
    pub fn enrich(&mut self, source: &str, candidates: Vec<CandidateRecord>) {
        self.stats.sources_processed += 1;
        self.stats.candidates_seen += candidates.len();
        if !self.places.is_empty() {
            self.state = EngineState::Enriching;
        }

        let (mut enriched, mut discarded) = (0usize, 0usize);

        for candidate in candidates {
            match matcher::best_enrichment_target(&self.places, &candidate) {
                Some((i, score)) => {
                    let adopted = self.places[i].absorb(candidate);
                    trace!(source, target = %self.places[i].name, score, ?adopted, "enriched");
                    enriched += 1;
                }
                None => {
                    trace!(source, name = %candidate.name, "no entry in radius, discarded");
                    discarded += 1;
                }
            }
        }

        self.stats.enriched += enriched;
        self.stats.enrichment_discarded += discarded;
        info!(source, enriched, discarded, "enrichment pass");
    }

    /// Resolve categories, assign ids, and hand off the immutable list
    pub fn finalize(mut self) -> ReconciliationReport {
        let drafts = std::mem::take(&mut self.places);
        let mut places = Vec::with_capacity(drafts.len());

        for draft in drafts {
            let category = match draft.category {
                Some(category) => category,
                None => match self.inference.infer(&normalize_name(&draft.name)) {
                    Some(category) => {
                        self.stats.inferred_categories += 1;
                        category
                    }
                    None => {
                        self.stats.dropped_uncategorized += 1;
                        self.issues.push(ReconciliationIssue {
                            kind: IssueKind::UnresolvableCategory,
                            subject: draft.name.clone(),
                            detail: "no category supplied and none inferable from name".to_string(),
                        });
                        continue;
                    }
                },
            };

            places.push(self.to_canonical(draft, category));
        }

        self.stats.emitted = places.len();
        self.state = EngineState::Finalized;

        let report = ReconciliationReport {
            places,
            stats: self.stats,
            issues: self.issues,
            reconciled_at: Utc::now(),
        };
        info!("{}", report.summary());
        report
    }

    fn to_canonical(&self, draft: PlaceDraft, category: Category) -> CanonicalRecord {
        let slug = slugify(&draft.name, self.options.slug_max_len);

        CanonicalRecord {
            id: format!("{}:{}:{}", self.options.namespace, category, slug),
            name: draft.name,
            category,
            subcategories: Vec::new(),
            location: draft.location.into(),
            contacts: draft.contacts,
            open_hours: draft.open_hours,
            price_tier: draft.price_tier,
            rating: draft.rating,
            amenities: Vec::new(),
            photos: Vec::new(),
            wikimedia_image_url: draft.wikimedia_image_url,
            sources: draft.sources,
            status: PlaceStatus::Active,
        }
    }
}

impl Default for ReconciliationEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

/// Run a whole reconciliation over batches in the given order
pub fn reconcile(batches: Vec<SourceBatch>, options: EngineOptions) -> ReconciliationReport {
    let mut engine = ReconciliationEngine::new(options);
    for batch in batches {
        engine.ingest(batch);
    }
    engine.finalize()
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const M_PER_DEG_LAT: f64 = matcher::EARTH_RADIUS_M * std::f64::consts::PI / 180.0;

    fn place(name: &str, category: Option<Category>, lat: f64, lon: f64, source: &str, id: i64) -> CandidateRecord {
        CandidateRecord::new(name, lat, lon)
            .unwrap()
            .with_category(category)
            .with_provenance(source, json!({ "id": id }))
    }

    fn run(batches: Vec<SourceBatch>) -> ReconciliationReport {
        reconcile(batches, EngineOptions::default())
    }

    #[test]
    fn test_end_to_end_muscat_grand_mall() {
        let a = vec![place("Muscat Grand Mall", Some(Category::Mall), 23.60, 58.40, "osm", 1)];
        let b = vec![place("muscat grand mall", Some(Category::Mall), 23.6001, 58.4002, "opentripmap", 2)
            .with_address(Some("Ruwi St".to_string()))];

        let report = run(vec![SourceBatch::primary("osm", a), SourceBatch::primary("opentripmap", b)]);

        assert_eq!(report.places.len(), 1);
        let p = &report.places[0];
        assert_eq!(p.id, "bestmuscat:mall:muscat-grand-mall");
        assert_eq!(p.location.address.as_deref(), Some("Ruwi St"));
        assert!(p.sources.contains_key("osm"));
        assert!(p.sources.contains_key("opentripmap"));
        assert_eq!(report.stats.merged, 1);
    }

    #[test]
    fn test_seed_does_not_self_merge() {
        // Two near-identical entries in one batch stay separate
        let a = vec![
            place("Costa Coffee", Some(Category::Restaurant), 23.6, 58.4, "osm", 1),
            place("Costa Coffee", Some(Category::Restaurant), 23.6, 58.4, "osm", 2),
            place("Kargeen Cafe", Some(Category::Restaurant), 23.59, 58.43, "osm", 3),
        ];

        let report = run(vec![SourceBatch::primary("osm", a)]);
        assert_eq!(report.places.len(), 3);
        assert_eq!(report.stats.seeded, 3);
    }

    #[test]
    fn test_source_against_itself_is_idempotent() {
        let a = vec![
            place("Crowne Plaza", Some(Category::Hotel), 23.61, 58.47, "osm", 1),
            place("Kargeen Cafe", Some(Category::Restaurant), 23.59, 58.43, "osm", 2),
        ];

        let report = run(vec![
            SourceBatch::primary("osm", a.clone()),
            SourceBatch::primary("osm", a),
        ]);
        assert_eq!(report.places.len(), 2);
        assert_eq!(report.stats.merged, 2);
        // Same id twice is not duplicated in provenance
        assert_eq!(report.places[0].sources["osm"], json!({ "id": 1 }));
    }

    #[test]
    fn test_merge_union_regardless_of_order() {
        let x = place("Kempinski Hotel Muscat", Some(Category::Hotel), 23.55, 58.65, "osm", 1)
            .with_website(Some("https://kempinski.com".to_string()));
        let x2 = place("Kempinsky Hotel Muscat", Some(Category::Hotel), 23.5502, 58.6501, "foursquare", 2)
            .with_address(Some("Al Mouj St".to_string()))
            .with_phone(Some("+968 2498 0000".to_string()));

        for report in [
            run(vec![SourceBatch::primary("osm", vec![x.clone()]), SourceBatch::primary("foursquare", vec![x2.clone()])]),
            run(vec![SourceBatch::primary("foursquare", vec![x2.clone()]), SourceBatch::primary("osm", vec![x.clone()])]),
        ] {
            assert_eq!(report.places.len(), 1);
            let p = &report.places[0];
            assert_eq!(p.contacts.website.as_deref(), Some("https://kempinski.com"));
            assert_eq!(p.contacts.phone.as_deref(), Some("+968 2498 0000"));
            assert_eq!(p.location.address.as_deref(), Some("Al Mouj St"));
            assert!(p.sources.contains_key("osm") && p.sources.contains_key("foursquare"));
        }
    }

    #[test]
    fn test_anchor_depends_on_order() {
        let x = place("Kempinski Hotel Muscat", Some(Category::Hotel), 23.55, 58.65, "osm", 1);
        let x2 = place("Kempinsky Hotel Muscat", Some(Category::Hotel), 23.5502, 58.6501, "foursquare", 2);

        let ab = run(vec![SourceBatch::primary("osm", vec![x.clone()]), SourceBatch::primary("foursquare", vec![x2.clone()])]);
        let ba = run(vec![SourceBatch::primary("foursquare", vec![x2]), SourceBatch::primary("osm", vec![x])]);

        assert_eq!(ab.places[0].name, "Kempinski Hotel Muscat");
        assert_eq!(ba.places[0].name, "Kempinsky Hotel Muscat");
    }

    #[test]
    fn test_field_merge_non_destructive() {
        let mut draft = PlaceDraft::from(
            place("Ubhar", Some(Category::Restaurant), 23.6, 58.4, "osm", 1).with_website(Some("a.com".to_string())),
        );

        draft.absorb(place("Ubhar", Some(Category::Restaurant), 23.6, 58.4, "opentripmap", 2).with_website(Some("b.com".to_string())));
        assert_eq!(draft.contacts.website.as_deref(), Some("a.com"));

        let adopted = draft.absorb(place("Ubhar", Some(Category::Restaurant), 23.6, 58.4, "foursquare", 3));
        assert_eq!(draft.contacts.website.as_deref(), Some("a.com"));
        assert!(!adopted.contains(&"contacts.website"));

        // Provenance accumulated from all three even though fields "lost"
        assert_eq!(draft.sources.len(), 3);
    }

    #[test]
    fn test_provenance_keeps_both_ids_from_same_source() {
        let mut draft = PlaceDraft::from(place("Ubhar", None, 23.6, 58.4, "osm", 1));
        draft.absorb(place("Ubhar", None, 23.6, 58.4, "osm", 2));
        draft.absorb(place("Ubhar", None, 23.6, 58.4, "osm", 2));
        assert_eq!(draft.sources["osm"], json!([{ "id": 1 }, { "id": 2 }]));
    }

    #[test]
    fn test_different_categories_never_merge() {
        let a = vec![place("Al Bustan Palace", Some(Category::Hotel), 23.57, 58.61, "osm", 1)];
        let b = vec![place("Al Bustan Palace", Some(Category::Restaurant), 23.57, 58.61, "opentripmap", 2)];

        let report = run(vec![SourceBatch::primary("osm", a), SourceBatch::primary("opentripmap", b)]);
        assert_eq!(report.places.len(), 2);
    }

    #[test]
    fn test_distinct_arabic_named_venues_stay_separate() {
        let a = vec![place("مطعم البحر", Some(Category::Restaurant), 23.6, 58.4, "osm", 1)];
        let b = vec![place("مقهى الشاطئ", Some(Category::Restaurant), 23.6 + 30.0 / M_PER_DEG_LAT, 58.4, "foursquare", 2)];

        let report = run(vec![SourceBatch::primary("osm", a), SourceBatch::primary("foursquare", b)]);
        assert_eq!(report.places.len(), 2);
        assert_eq!(report.stats.merged, 0);
        assert_ne!(report.places[0].id, report.places[1].id);
        assert!(report.places.iter().all(|p| p.sources.len() == 1));
    }

    #[test]
    fn test_first_match_wins_and_is_flagged() {
        // Two separate entries from the seed, both within match distance of the incoming candidate
        let a = vec![
            place("Lulu Hypermarket Mall", Some(Category::Mall), 23.6, 58.4, "osm", 1),
            place("Lulu Hypermarket Mall", Some(Category::Mall), 23.6 + 50.0 / M_PER_DEG_LAT, 58.4, "osm", 2),
        ];
        let b = vec![place("Lulu Hypermarket Mall", Some(Category::Mall), 23.6 + 25.0 / M_PER_DEG_LAT, 58.4, "foursquare", 3)];

        let report = run(vec![SourceBatch::primary("osm", a), SourceBatch::primary("foursquare", b)]);
        assert_eq!(report.places.len(), 2);
        assert!(report.places[0].sources.contains_key("foursquare"));
        assert!(!report.places[1].sources.contains_key("foursquare"));
        assert_eq!(report.stats.ambiguous_matches, 1);
    }

    #[test]
    fn test_later_source_merges_into_its_own_appended_entries() {
        let a = vec![place("Crowne Plaza", Some(Category::Hotel), 23.61, 58.47, "osm", 1)];
        let b = vec![
            place("Ubhar", Some(Category::Restaurant), 23.6, 58.4, "opentripmap", 10),
            place("Ubhar", Some(Category::Restaurant), 23.6, 58.4, "opentripmap", 11),
        ];

        let report = run(vec![SourceBatch::primary("osm", a), SourceBatch::primary("opentripmap", b)]);
        assert_eq!(report.places.len(), 2);
        assert_eq!(report.stats.appended, 1);
        assert_eq!(report.stats.merged, 1);
    }

    #[test]
    fn test_category_inference_and_drop() {
        let a = vec![
            place("Grand Regency Resort", None, 23.1, 58.1, "osm", 1),
            place("City Center Mall", None, 23.2, 58.2, "osm", 2),
            place("XYZ Trading LLC", None, 23.3, 58.3, "osm", 3),
        ];

        let report = run(vec![SourceBatch::primary("osm", a)]);
        assert_eq!(report.places.len(), 2);
        assert_eq!(report.places[0].category, Category::Hotel);
        assert_eq!(report.places[0].id, "bestmuscat:hotel:grand-regency-resort");
        assert_eq!(report.places[1].category, Category::Mall);
        assert_eq!(report.stats.inferred_categories, 2);
        assert_eq!(report.stats.dropped_uncategorized, 1);
        assert_eq!(report.issues.len(), 1);
        assert_eq!(report.issues[0].kind, IssueKind::UnresolvableCategory);
        assert_eq!(report.issues[0].subject, "XYZ Trading LLC");
    }

    #[test]
    fn test_uncategorized_entry_can_adopt_category_from_merge() {
        let a = vec![place("Bait Al Luban", None, 23.62, 58.56, "osm", 1)];
        let b = vec![place("Bait Al Luban", Some(Category::Restaurant), 23.62, 58.56, "foursquare", 2)];

        let report = run(vec![SourceBatch::primary("osm", a), SourceBatch::primary("foursquare", b)]);
        assert_eq!(report.places.len(), 1);
        assert_eq!(report.places[0].category, Category::Restaurant);
    }

    #[test]
    fn test_enrichment_attaches_within_radius() {
        let a = vec![place("Royal Opera House Muscat", Some(Category::Mall), 23.6133, 58.4536, "osm", 1)];
        let wd = vec![
            CandidateRecord::new("Royal Opera House Muscat", 23.6134, 58.4537)
                .unwrap()
                .with_website(Some("https://www.rohmuscat.org.om".to_string()))
                .with_image(Some("http://commons.wikimedia.org/ROHM.jpg".to_string()))
                .with_provenance("wikidata", json!({ "id": "Q1" })),
            // Nothing near this one
            CandidateRecord::new("Nizwa Fort", 22.93, 57.53)
                .unwrap()
                .with_provenance("wikidata", json!({ "id": "Q2" })),
        ];

        let report = run(vec![SourceBatch::primary("osm", a), SourceBatch::enrichment("wikidata", wd)]);
        assert_eq!(report.places.len(), 1);
        let p = &report.places[0];
        assert_eq!(p.contacts.website.as_deref(), Some("https://www.rohmuscat.org.om"));
        assert!(p.wikimedia_image_url.is_some());
        assert_eq!(p.sources["wikidata"], json!({ "id": "Q1" }));
        assert_eq!(report.stats.enriched, 1);
        assert_eq!(report.stats.enrichment_discarded, 1);
    }

    #[test]
    fn test_enrichment_never_seeds() {
        let wd = vec![CandidateRecord::new("Grand Hyatt Muscat Hotel", 23.6, 58.4).unwrap()];
        let report = run(vec![SourceBatch::enrichment("wikidata", wd)]);
        assert!(report.is_empty());
        assert_eq!(report.stats.enrichment_discarded, 1);
    }

    #[test]
    fn test_empty_first_source_lets_next_primary_seed() {
        let mut engine = ReconciliationEngine::default();
        engine.record_issue(ReconciliationIssue::source_unavailable("osm", "payload not found"));
        engine.ingest(SourceBatch::empty("osm", SourceRole::Primary));
        assert_eq!(engine.state(), EngineState::Empty);

        engine.ingest(SourceBatch::primary(
            "opentripmap",
            vec![
                place("Ubhar", Some(Category::Restaurant), 23.6, 58.4, "opentripmap", 1),
                place("Ubhar", Some(Category::Restaurant), 23.6, 58.4, "opentripmap", 2),
            ],
        ));
        assert_eq!(engine.state(), EngineState::Seeded);
        assert_eq!(engine.places().len(), 2);

        let report = engine.finalize();
        assert_eq!(report.issues[0].kind, IssueKind::SourceUnavailable);
    }

    #[test]
    fn test_state_transitions() {
        let mut engine = ReconciliationEngine::default();
        assert_eq!(engine.state(), EngineState::Empty);

        engine.ingest(SourceBatch::primary("osm", vec![place("Ubhar", Some(Category::Restaurant), 23.6, 58.4, "osm", 1)]));
        assert_eq!(engine.state(), EngineState::Seeded);

        engine.ingest(SourceBatch::primary("opentripmap", vec![]));
        assert_eq!(engine.state(), EngineState::Merging);

        engine.ingest(SourceBatch::enrichment("wikidata", vec![]));
        assert_eq!(engine.state(), EngineState::Enriching);
    }

    #[test]
    fn test_zero_candidates_is_empty_result() {
        let report = run(vec![
            SourceBatch::empty("osm", SourceRole::Primary),
            SourceBatch::empty("wikidata", SourceRole::Enrichment),
        ]);
        assert!(report.is_empty());
        assert_eq!(report.stats.emitted, 0);
    }

    #[test]
    fn test_custom_inference_table() {
        use crate::category::{CategoryInference, CategoryRule};

        let inference = CategoryInference::from_rules(vec![CategoryRule::new(&["souq"], Category::Mall)]);
        let mut engine = ReconciliationEngine::default().with_inference(inference);
        engine.ingest(SourceBatch::primary(
            "osm",
            vec![
                place("Mutrah Souq", None, 23.62, 58.56, "osm", 1),
                place("Kargeen Cafe", None, 23.59, 58.43, "osm", 2),
            ],
        ));

        let report = engine.finalize();
        assert_eq!(report.places.len(), 1);
        assert_eq!(report.places[0].id, "bestmuscat:mall:mutrah-souq");
    }

    #[test]
    fn test_custom_namespace() {
        let options = EngineOptions {
            namespace: "bestsalalah".to_string(),
            slug_max_len: 8,
        };
        let report = reconcile(
            vec![SourceBatch::primary("osm", vec![place("Muscat Grand Mall", Some(Category::Mall), 23.6, 58.4, "osm", 1)])],
            options,
        );
        assert_eq!(report.places[0].id, "bestsalalah:mall:muscat-g");
    }
}
