// ⚠️ Error taxonomy
// None of these abort a reconciliation run: candidates are skipped,
// sources degrade to empty, configs are rejected before a run starts.

use std::path::PathBuf;
use thiserror::Error;

/// Why a single raw record could not become a candidate (InvalidCandidate)
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CandidateError {
    #[error("record has no name")]
    MissingName,

    #[error("record has no coordinate pair")]
    MissingCoordinates,

    #[error("malformed coordinate value: {0}")]
    MalformedCoordinate(String),

    #[error("coordinates out of range: ({lat}, {lon})")]
    CoordinatesOutOfRange { lat: f64, lon: f64 },

    #[error("category not supported: {0}")]
    UnsupportedCategory(String),

    #[error("record is not a JSON object")]
    NotAnObject,
}

/// Why a whole source payload could not be read (SourceUnavailable)
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("payload not found: {0}")]
    Missing(PathBuf),

    #[error("payload unreadable: {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("payload is not valid JSON: {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    Validation(String),

    #[error("unknown adapter: {0}")]
    UnknownAdapter(String),
}
