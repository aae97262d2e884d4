// Place Reconciliation - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod model;
pub mod error;
pub mod normalize;
pub mod category;       // Keyword inference + provider tag maps
pub mod adapters;       // Source Adapters - one per provider
pub mod matcher;        // Name similarity + haversine distance
pub mod reconciliation; // Reconciliation Engine
pub mod config;
pub mod sources;
pub mod quality;        // Downstream quality gate
pub mod store;

// Re-export commonly used types
pub use model::{
    CandidateRecord, CanonicalLocation, CanonicalRecord, Category, Contacts, Location,
    PlaceStatus, Provenance, Rating,
};
pub use error::{CandidateError, ConfigError, SourceError};
pub use normalize::{normalize_name, slugify, token_sort};
pub use category::{CategoryInference, CategoryRule, TagCategoryMap, TagRule};
pub use adapters::{
    SourceAdapter, SourceKind,
    detect_source, get_adapter,
    OsmAdapter, OpenTripMapAdapter, FoursquareAdapter, WikidataAdapter,
};
pub use matcher::{MatchAssessment, Venue, best_enrichment_target, haversine_m, matches, name_similarity, score};
pub use reconciliation::{
    EngineOptions, EngineState, IssueKind, PlaceDraft, ReconciliationEngine, ReconciliationIssue,
    ReconciliationReport, ReconciliationStats, SourceBatch, SourceRole, reconcile,
};
pub use config::{PipelineConfig, SourceConfig};
pub use sources::{load_batch, load_payload, reconcile_sources};
pub use quality::{QualityGate, QualityIssue, QualityReport, QualityThresholds, write_issues_csv};
pub use store::{
    Event, PlaceChange, StoreStats,
    setup_database, open_database, replace_places, insert_event, recent_events, place_history,
    get_all_places, get_place, get_places_by_category, category_counts, count_places,
    read_places_json, write_places_json,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
