// 📥 Source loading - payload files → SourceBatch
// A source that cannot be read degrades to an empty batch; the run goes on.

use crate::adapters::get_adapter;
use crate::config::SourceConfig;
use crate::error::SourceError;
use crate::reconciliation::{
    EngineOptions, ReconciliationEngine, ReconciliationIssue, ReconciliationReport, SourceBatch,
};
use serde_json::Value;
use std::path::Path;
use tracing::{info, warn};

/// Read and parse one provider payload
pub fn load_payload(path: &Path) -> Result<Value, SourceError> {
    let text = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            SourceError::Missing(path.to_path_buf())
        } else {
            SourceError::Unreadable {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    serde_json::from_str(&text).map_err(|source| SourceError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

/// Load and adapt one configured source
pub fn load_batch(config: &SourceConfig) -> (SourceBatch, Option<ReconciliationIssue>) {
    let role = config.role();

    let kind = match config.kind() {
        Ok(kind) => kind,
        Err(err) => {
            warn!(source = %config.name, error = %err, "no adapter for source, treating as empty");
            return (
                SourceBatch::empty(&config.name, role),
                Some(ReconciliationIssue::source_unavailable(&config.name, err.to_string())),
            );
        }
    };

    let payload = match load_payload(&config.path) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(source = %config.name, error = %err, "source unavailable, treating as empty");
            return (
                SourceBatch::empty(&config.name, role),
                Some(ReconciliationIssue::source_unavailable(&config.name, err.to_string())),
            );
        }
    };

    let adapter = get_adapter(kind, config.tag_map());
    let mut candidates = adapter.adapt(&payload);

    // Provenance is keyed by the configured name, not the adapter code
    if config.name != adapter.source().code() {
        for candidate in &mut candidates {
            if let Some(id) = candidate.provenance.remove(adapter.source().code()) {
                candidate.provenance.insert(config.name.clone(), id);
            }
        }
    }

    info!(
        source = %config.name,
        adapter = %adapter.source(),
        adapter_version = adapter.version(),
        candidates = candidates.len(),
        "loaded source"
    );

    (
        SourceBatch {
            source: config.name.clone(),
            role,
            candidates,
        },
        None,
    )
}

/// Load every source in order and run one reconciliation over them
pub fn reconcile_sources(sources: &[SourceConfig], options: EngineOptions) -> ReconciliationReport {
    let mut engine = ReconciliationEngine::new(options);

    for config in sources {
        let (batch, issue) = load_batch(config);
        if let Some(issue) = issue {
            engine.record_issue(issue);
        }
        engine.ingest(batch);
    }

    engine.finalize()
}

// ============================================================================
// TESTS
// ============================================================================
