// 📍 Place Model - Candidate and canonical records
// Candidates come out of one adapter call; canonical records are what the engine emits.

use crate::error::CandidateError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

// ============================================================================
// CATEGORY
// ============================================================================

/// The three venue categories the directory supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Hotel,
    Restaurant,
    Mall,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Hotel => "hotel",
            Category::Restaurant => "restaurant",
            Category::Mall => "mall",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = CandidateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hotel" => Ok(Category::Hotel),
            "restaurant" => Ok(Category::Restaurant),
            "mall" => Ok(Category::Mall),
            other => Err(CandidateError::UnsupportedCategory(other.to_string())),
        }
    }
}

// ============================================================================
// SHARED FIELD GROUPS
// ============================================================================

/// Source name → source-specific identifier, e.g. `{"osm": {"type": "node", "id": 123}}`
pub type Provenance = BTreeMap<String, serde_json::Value>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contacts {
    pub phone: Option<String>,
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub score: Option<f64>,
    pub count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lon: f64,
    pub address: Option<String>,
}

// ============================================================================
// CANDIDATE RECORD
// ============================================================================

/// One adapter's view of a venue. Consumed once by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRecord {
    pub name: String,

    /// None = unknown, to be inferred at finalization
    pub category: Option<Category>,

    pub location: Location,
    pub contacts: Contacts,
    pub open_hours: Option<String>,
    pub price_tier: Option<String>,
    pub rating: Rating,
    pub wikimedia_image_url: Option<String>,
    pub provenance: Provenance,
}

impl CandidateRecord {
    /// Create a candidate with the fields every source must provide.
    /// Rejects blank names and out-of-range or non-finite coordinates.
    pub fn new(name: &str, lat: f64, lon: f64) -> Result<Self, CandidateError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CandidateError::MissingName);
        }
        if !lat.is_finite() || !lon.is_finite() || lat.abs() > 90.0 || lon.abs() > 180.0 {
            return Err(CandidateError::CoordinatesOutOfRange { lat, lon });
        }

        Ok(CandidateRecord {
            name: name.to_string(),
            category: None,
            location: Location { lat, lon, address: None },
            contacts: Contacts::default(),
            open_hours: None,
            price_tier: None,
            rating: Rating::default(),
            wikimedia_image_url: None,
            provenance: Provenance::new(),
        })
    }

    pub fn with_category(mut self, category: Option<Category>) -> Self {
        self.category = category;
        self
    }

    pub fn with_address(mut self, address: Option<String>) -> Self {
        self.location.address = non_blank(address);
        self
    }

    pub fn with_phone(mut self, phone: Option<String>) -> Self {
        self.contacts.phone = non_blank(phone);
        self
    }

    pub fn with_website(mut self, website: Option<String>) -> Self {
        self.contacts.website = non_blank(website);
        self
    }

    pub fn with_open_hours(mut self, hours: Option<String>) -> Self {
        self.open_hours = non_blank(hours);
        self
    }

    pub fn with_price_tier(mut self, tier: Option<String>) -> Self {
        self.price_tier = non_blank(tier);
        self
    }

    pub fn with_rating(mut self, score: Option<f64>, count: Option<u64>) -> Self {
        self.rating = Rating { score, count };
        self
    }

    pub fn with_image(mut self, url: Option<String>) -> Self {
        self.wikimedia_image_url = non_blank(url);
        self
    }

    /// Builder pattern: record which source produced this candidate
    pub fn with_provenance(mut self, source: &str, id: serde_json::Value) -> Self {
        self.provenance.insert(source.to_string(), id);
        self
    }
}

/// Empty strings count as missing everywhere in the pipeline
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ============================================================================
// CANONICAL RECORD
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceStatus {
    Active,
}

/// Output location: `lng` is an alias of `lon` kept for downstream consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalLocation {
    pub lat: f64,
    pub lon: f64,
    pub lng: f64,
    pub address: Option<String>,
}

impl From<Location> for CanonicalLocation {
    fn from(loc: Location) -> Self {
        CanonicalLocation {
            lat: loc.lat,
            lon: loc.lon,
            lng: loc.lon,
            address: loc.address,
        }
    }
}

/// One venue in the published directory. Immutable once emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    /// `<namespace>:<category>:<slug>`
    pub id: String,
    pub name: String,
    pub category: Category,
    #[serde(default)]
    pub subcategories: Vec<String>,
    pub location: CanonicalLocation,
    pub contacts: Contacts,
    pub open_hours: Option<String>,
    pub price_tier: Option<String>,
    pub rating: Rating,
    #[serde(default)]
    pub amenities: Vec<String>,

    /// Filled by the photo-enrichment collaborator, always empty here
    #[serde(default)]
    pub photos: Vec<serde_json::Value>,

    pub wikimedia_image_url: Option<String>,
    pub sources: Provenance,
    pub status: PlaceStatus,
}

impl CanonicalRecord {
    /// Trailing slug segment of the id (photo/logo enrichment key)
    pub fn slug(&self) -> &str {
        self.id.rsplit(':').next().unwrap_or(&self.id)
    }

    pub fn has_address(&self) -> bool {
        self.location.address.is_some()
    }
}

// ============================================================================
// TESTS
// ============================================================================
