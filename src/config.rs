// ⚙️ Pipeline configuration (TOML)
//
// namespace = "bestmuscat"
// output = "data/places.json"
//
// [[sources]]
// name = "osm"
// adapter = "osm"                  # optional, detected from the path
// path = "data/raw/osm/places.json"
//
// Sources are processed in file order. The first primary source seeds.

use crate::adapters::{detect_source, SourceKind};
use crate::category::{TagCategoryMap, TagRule};
use crate::error::ConfigError;
use crate::normalize::SLUG_MAX_LEN;
use crate::quality::QualityThresholds;
use crate::reconciliation::{EngineOptions, SourceRole, DEFAULT_NAMESPACE};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Provenance key and log label
    pub name: String,

    /// Detected from `path` when omitted
    #[serde(default)]
    pub adapter: Option<SourceKind>,

    pub path: PathBuf,

    /// Defaults to the adapter's role (Wikidata enriches, the rest are primary)
    #[serde(default)]
    pub role: Option<SourceRole>,

    /// Replaces the adapter's default tag → category map when non-empty
    #[serde(default)]
    pub tags: Vec<TagRule>,
}

impl SourceConfig {
    pub fn new(name: &str, adapter: SourceKind, path: impl Into<PathBuf>) -> Self {
        SourceConfig {
            name: name.to_string(),
            adapter: Some(adapter),
            path: path.into(),
            role: None,
            tags: Vec::new(),
        }
    }

    pub fn kind(&self) -> Result<SourceKind, ConfigError> {
        match self.adapter {
            Some(kind) => Ok(kind),
            None => detect_source(&self.path)
                .map_err(|_| ConfigError::UnknownAdapter(self.path.display().to_string())),
        }
    }

    pub fn role(&self) -> SourceRole {
        self.role.unwrap_or_else(|| {
            self.kind()
                .map(|kind| kind.default_role())
                .unwrap_or(SourceRole::Primary)
        })
    }

    pub fn tag_map(&self) -> Option<TagCategoryMap> {
        if self.tags.is_empty() {
            None
        } else {
            Some(TagCategoryMap::new(self.tags.clone()))
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default = "default_slug_max_len")]
    pub slug_max_len: usize,

    /// Canonical list output (JSON)
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Optional SQLite store for the read-only API
    #[serde(default)]
    pub database: Option<PathBuf>,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    #[serde(default)]
    pub quality: QualityThresholds,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_slug_max_len() -> usize {
    SLUG_MAX_LEN
}

fn default_output() -> PathBuf {
    PathBuf::from("data/places.json")
}

impl PipelineConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let config: PipelineConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.namespace.trim().is_empty() || self.namespace.contains(':') {
            return Err(ConfigError::Validation(format!(
                "namespace must be non-empty and contain no ':' (got {:?})",
                self.namespace
            )));
        }
        if self.slug_max_len == 0 {
            return Err(ConfigError::Validation("slug_max_len must be > 0".to_string()));
        }

        let mut seen = HashSet::new();
        for source in &self.sources {
            source.kind()?;
            if !seen.insert(source.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate source name: {}",
                    source.name
                )));
            }
        }

        Ok(())
    }

    /// Standard layout: OSM → OpenTripMap → Foursquare → Wikidata under `<data_dir>/raw`
    pub fn default_layout(data_dir: &Path) -> Self {
        let raw = data_dir.join("raw");
        PipelineConfig {
            namespace: default_namespace(),
            slug_max_len: default_slug_max_len(),
            output: data_dir.join("places.json"),
            database: None,
            sources: vec![
                SourceConfig::new("osm", SourceKind::Osm, raw.join("osm").join("places.json")),
                SourceConfig::new("opentripmap", SourceKind::OpenTripMap, raw.join("opentripmap").join("places.json")),
                SourceConfig::new("foursquare", SourceKind::Foursquare, raw.join("foursquare").join("places.json")),
                SourceConfig::new("wikidata", SourceKind::Wikidata, raw.join("wikidata").join("muscat.json")),
            ],
            quality: QualityThresholds::default(),
        }
    }

    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            namespace: self.namespace.clone(),
            slug_max_len: self.slug_max_len,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::default_layout(Path::new("data"))
    }
}

// ============================================================================
// TESTS
// ============================================================================
