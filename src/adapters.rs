// 🏗️ Source Adapters - Provider payload → CandidateRecord
// One adapter per upstream provider. Pure mappings over already-fetched JSON.
//
// Adding a provider = implementing `SourceAdapter`. Nothing else changes.

use crate::category::TagCategoryMap;
use crate::error::{CandidateError, ConfigError};
use crate::model::{CandidateRecord, Category};
use crate::reconciliation::SourceRole;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

// ============================================================================
// SOURCE KIND
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Osm,
    OpenTripMap,
    Foursquare,
    Wikidata,
}

impl SourceKind {
    /// Human-readable name for display
    pub fn name(&self) -> &str {
        match self {
            SourceKind::Osm => "OpenStreetMap",
            SourceKind::OpenTripMap => "OpenTripMap",
            SourceKind::Foursquare => "Foursquare",
            SourceKind::Wikidata => "Wikidata",
        }
    }

    /// Provenance key written into `sources`
    pub fn code(&self) -> &'static str {
        match self {
            SourceKind::Osm => "osm",
            SourceKind::OpenTripMap => "opentripmap",
            SourceKind::Foursquare => "foursquare",
            SourceKind::Wikidata => "wikidata",
        }
    }

    /// Knowledge-base sources only enrich; they never seed venues
    pub fn default_role(&self) -> SourceRole {
        match self {
            SourceKind::Wikidata => SourceRole::Enrichment,
            _ => SourceRole::Primary,
        }
    }

    pub fn default_tags(&self) -> TagCategoryMap {
        match self {
            SourceKind::Osm => TagCategoryMap::osm_default(),
            SourceKind::OpenTripMap => TagCategoryMap::opentripmap_default(),
            SourceKind::Foursquare => TagCategoryMap::foursquare_default(),
            SourceKind::Wikidata => TagCategoryMap::default(),
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for SourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "osm" | "openstreetmap" | "overpass" => Ok(SourceKind::Osm),
            "opentripmap" | "otm" => Ok(SourceKind::OpenTripMap),
            "foursquare" | "fsq" => Ok(SourceKind::Foursquare),
            "wikidata" | "wd" => Ok(SourceKind::Wikidata),
            other => Err(ConfigError::UnknownAdapter(other.to_string())),
        }
    }
}

// ============================================================================
// ADAPTER TRAIT
// ============================================================================

/// SourceAdapter - the only interface a provider must implement
pub trait SourceAdapter: Send + Sync {
    /// Which provider this adapter handles
    fn source(&self) -> SourceKind;

    /// Locate the individual raw records inside a provider payload
    fn records<'a>(&self, payload: &'a Value) -> Vec<&'a Value>;

    /// Map one raw record. Errors mean "skip this record", never "abort the batch".
    fn adapt_record(&self, raw: &Value) -> Result<CandidateRecord, CandidateError>;

    /// Map a whole payload, skipping records that fail
    fn adapt(&self, payload: &Value) -> Vec<CandidateRecord> {
        let records = self.records(payload);
        let total = records.len();
        let mut candidates = Vec::with_capacity(total);

        for (index, raw) in records.into_iter().enumerate() {
            match self.adapt_record(raw) {
                Ok(candidate) => candidates.push(candidate),
                Err(reason) => {
                    debug!(source = %self.source(), index, %reason, "skipping record");
                }
            }
        }

        if total > 0 && candidates.is_empty() {
            warn!(source = %self.source(), total, "no usable records in payload, check its shape");
        } else {
            debug!(
                source = %self.source(),
                total,
                kept = candidates.len(),
                "adapted payload"
            );
        }
        candidates
    }

    /// Adapter version (for provenance tracking)
    fn version(&self) -> &str {
        "1.0.0"
    }
}

// ============================================================================
// JSON HELPERS
// ============================================================================

/// Dotted path lookup, e.g. `geocodes.main.latitude`
fn value_at<'a>(v: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(v, |cur, key| cur.get(key))
}

/// Non-empty string at path (numbers are stringified)
fn str_at(v: &Value, path: &str) -> Option<String> {
    match value_at(v, path)? {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Coordinate at path. Absent/null → Ok(None); present but unusable → error.
fn coord_at(v: &Value, path: &str) -> Result<Option<f64>, CandidateError> {
    match value_at(v, path) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| CandidateError::MalformedCoordinate(n.to_string())),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| CandidateError::MalformedCoordinate(s.clone())),
        Some(other) => Err(CandidateError::MalformedCoordinate(other.to_string())),
    }
}

/// First coordinate pair found among the candidate (lat, lon) paths
fn coords_from(v: &Value, pairs: &[(&str, &str)]) -> Result<(f64, f64), CandidateError> {
    for (lat_path, lon_path) in pairs {
        if let (Some(lat), Some(lon)) = (coord_at(v, lat_path)?, coord_at(v, lon_path)?) {
            return Ok((lat, lon));
        }
    }
    Err(CandidateError::MissingCoordinates)
}

fn require_name(v: &Value, path: &str) -> Result<String, CandidateError> {
    str_at(v, path).ok_or(CandidateError::MissingName)
}

fn require_object(v: &Value) -> Result<(), CandidateError> {
    if v.is_object() {
        Ok(())
    } else {
        Err(CandidateError::NotAnObject)
    }
}

/// Array at the top level or under `key`
fn array_records<'a>(payload: &'a Value, key: &str) -> Vec<&'a Value> {
    payload
        .as_array()
        .or_else(|| payload.get(key).and_then(Value::as_array))
        .map(|items| items.iter().collect())
        .unwrap_or_default()
}

/// Join non-empty address components with ", ". None when nothing remains.
pub fn join_address<I, S>(parts: I) -> Option<String>
where
    I: IntoIterator<Item = Option<S>>,
    S: AsRef<str>,
{
    let kept: Vec<String> = parts
        .into_iter()
        .flatten()
        .map(|p| p.as_ref().trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    if kept.is_empty() {
        None
    } else {
        Some(kept.join(", "))
    }
}

/// Category from the provider tag map, falling back to the fetcher-stamped
/// `_bm_category`. An empty map means the taxonomy is unknown: leave it open.
fn resolve_category<'a, I>(
    tags: &TagCategoryMap,
    raw: &Value,
    record_tags: I,
) -> Result<Option<Category>, CandidateError>
where
    I: IntoIterator<Item = &'a str>,
{
    if tags.is_empty() {
        return Ok(None);
    }
    let record_tags: Vec<&str> = record_tags.into_iter().collect();
    if let Some(category) = tags.lookup(record_tags.iter().copied()) {
        return Ok(Some(category));
    }
    if let Some(stamped) = str_at(raw, "_bm_category") {
        return stamped.parse::<Category>().map(Some);
    }
    Err(CandidateError::UnsupportedCategory(record_tags.join(",")))
}

// ============================================================================
// OPENSTREETMAP (Overpass)
// ============================================================================

const OSM_ADDRESS_KEYS: [&str; 5] = [
    "addr:housenumber",
    "addr:street",
    "addr:suburb",
    "addr:city",
    "addr:postcode",
];

pub struct OsmAdapter {
    tags: TagCategoryMap,
}

impl OsmAdapter {
    pub fn new(tags: TagCategoryMap) -> Self {
        OsmAdapter { tags }
    }
}

impl Default for OsmAdapter {
    fn default() -> Self {
        Self::new(TagCategoryMap::osm_default())
    }
}

impl SourceAdapter for OsmAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::Osm
    }

    fn records<'a>(&self, payload: &'a Value) -> Vec<&'a Value> {
        array_records(payload, "elements")
    }

    fn adapt_record(&self, raw: &Value) -> Result<CandidateRecord, CandidateError> {
        require_object(raw)?;
        match raw.get("tags").filter(|t| t.is_object()) {
            Some(tags) => self.adapt_element(raw, tags),
            None => self.adapt_flat(raw),
        }
    }
}

impl OsmAdapter {
    /// Raw Overpass element: `{type, id, lat/lon | center, tags}`
    fn adapt_element(&self, raw: &Value, tags: &Value) -> Result<CandidateRecord, CandidateError> {
        let name = require_name(tags, "name")?;
        let (lat, lon) = coords_from(
            raw,
            &[("lat", "lon"), ("center.lat", "center.lon")],
        )?;

        let pairs: Vec<String> = tags
            .as_object()
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|v| format!("{}={}", k, v)))
                    .collect()
            })
            .unwrap_or_default();
        let category = resolve_category(&self.tags, raw, pairs.iter().map(String::as_str))?;

        let address = join_address(OSM_ADDRESS_KEYS.into_iter().map(|k| str_at(tags, k)));
        let osm_type = str_at(raw, "type").unwrap_or_else(|| "node".to_string());
        let osm_id = raw.get("id").cloned().unwrap_or(Value::Null);

        Ok(CandidateRecord::new(&name, lat, lon)?
            .with_category(category)
            .with_address(address)
            .with_phone(str_at(tags, "phone").or_else(|| str_at(tags, "contact:phone")))
            .with_website(str_at(tags, "website").or_else(|| str_at(tags, "contact:website")))
            .with_open_hours(str_at(tags, "opening_hours"))
            .with_provenance(self.source().code(), json!({ "type": osm_type, "id": osm_id })))
    }

    /// Record already flattened by the Overpass fetcher:
    /// `{id, name, category, location:{lat,lon,address}, contacts, sources:{osm}}`.
    /// The fetcher queried per category, so its `category` is trusted as-is.
    fn adapt_flat(&self, raw: &Value) -> Result<CandidateRecord, CandidateError> {
        let name = require_name(raw, "name")?;
        let (lat, lon) = coords_from(raw, &[("location.lat", "location.lon")])?;

        let category = match str_at(raw, "category") {
            Some(stamped) => Some(stamped.parse::<Category>()?),
            None => resolve_category(&self.tags, raw, std::iter::empty::<&str>())?,
        };

        let osm_id = value_at(raw, "sources.osm")
            .filter(|v| !v.is_null())
            .cloned()
            .or_else(|| raw.get("id").cloned())
            .unwrap_or(Value::Null);

        Ok(CandidateRecord::new(&name, lat, lon)?
            .with_category(category)
            .with_address(str_at(raw, "location.address"))
            .with_phone(str_at(raw, "contacts.phone"))
            .with_website(str_at(raw, "contacts.website"))
            .with_provenance(self.source().code(), osm_id))
    }
}

// ============================================================================
// OPENTRIPMAP
// ============================================================================

const OTM_ADDRESS_KEYS: [&str; 5] = ["house_number", "road", "suburb", "city", "postcode"];

pub struct OpenTripMapAdapter {
    tags: TagCategoryMap,
}

impl OpenTripMapAdapter {
    pub fn new(tags: TagCategoryMap) -> Self {
        OpenTripMapAdapter { tags }
    }
}

impl Default for OpenTripMapAdapter {
    fn default() -> Self {
        Self::new(TagCategoryMap::opentripmap_default())
    }
}

impl SourceAdapter for OpenTripMapAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::OpenTripMap
    }

    fn records<'a>(&self, payload: &'a Value) -> Vec<&'a Value> {
        array_records(payload, "features")
    }

    fn adapt_record(&self, raw: &Value) -> Result<CandidateRecord, CandidateError> {
        require_object(raw)?;
        let name = require_name(raw, "name")?;
        let (lat, lon) = coords_from(
            raw,
            &[
                ("point.lat", "point.lon"),
                ("location.lat", "location.lon"),
            ],
        )?;

        let kinds = str_at(raw, "kinds").unwrap_or_default();
        let category = resolve_category(&self.tags, raw, kinds.split(','))?;

        let address = match raw.get("address").filter(|a| a.is_object()) {
            Some(addr) => join_address(OTM_ADDRESS_KEYS.into_iter().map(|k| str_at(addr, k))),
            None => str_at(raw, "location.address"),
        };

        Ok(CandidateRecord::new(&name, lat, lon)?
            .with_category(category)
            .with_address(address)
            .with_website(str_at(raw, "url").or_else(|| str_at(raw, "contacts.website")))
            .with_provenance(self.source().code(), json!({ "id": raw.get("xid").cloned().unwrap_or(Value::Null) })))
    }
}

// ============================================================================
// FOURSQUARE (Places API v3)
// ============================================================================

pub struct FoursquareAdapter {
    tags: TagCategoryMap,
}

impl FoursquareAdapter {
    pub fn new(tags: TagCategoryMap) -> Self {
        FoursquareAdapter { tags }
    }

    /// Foursquare prices are 1..=4, rendered as "$".."$$$$"
    fn price_tier(raw: &Value) -> Option<String> {
        raw.get("price")
            .and_then(Value::as_u64)
            .filter(|p| (1..=4).contains(p))
            .map(|p| "$".repeat(p as usize))
    }
}

impl Default for FoursquareAdapter {
    fn default() -> Self {
        Self::new(TagCategoryMap::foursquare_default())
    }
}

impl SourceAdapter for FoursquareAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::Foursquare
    }

    fn records<'a>(&self, payload: &'a Value) -> Vec<&'a Value> {
        array_records(payload, "results")
    }

    fn adapt_record(&self, raw: &Value) -> Result<CandidateRecord, CandidateError> {
        require_object(raw)?;
        let name = require_name(raw, "name")?;
        let (lat, lon) = coords_from(
            raw,
            &[("geocodes.main.latitude", "geocodes.main.longitude")],
        )?;

        let category_ids: Vec<String> = raw
            .get("categories")
            .and_then(Value::as_array)
            .map(|cats| cats.iter().filter_map(|c| str_at(c, "id")).collect())
            .unwrap_or_default();
        let category = resolve_category(&self.tags, raw, category_ids.iter().map(String::as_str))?;

        let address = join_address([
            str_at(raw, "location.address"),
            str_at(raw, "location.locality"),
            str_at(raw, "location.postcode"),
        ])
        .or_else(|| str_at(raw, "location.formatted_address"));

        Ok(CandidateRecord::new(&name, lat, lon)?
            .with_category(category)
            .with_address(address)
            .with_phone(str_at(raw, "tel"))
            .with_website(str_at(raw, "website"))
            .with_open_hours(str_at(raw, "hours.display"))
            .with_price_tier(Self::price_tier(raw))
            .with_rating(
                raw.get("rating").and_then(Value::as_f64),
                value_at(raw, "stats.total_ratings").and_then(Value::as_u64),
            )
            .with_provenance(self.source().code(), json!({ "id": raw.get("fsq_id").cloned().unwrap_or(Value::Null) })))
    }
}

// ============================================================================
// WIKIDATA (SPARQL JSON results)
// ============================================================================

/// Knowledge-base adapter: no native category, sparse on everything
/// except name, coordinate, website and image.
#[derive(Default)]
pub struct WikidataAdapter;

impl WikidataAdapter {
    pub fn new() -> Self {
        WikidataAdapter
    }

    /// WKT `Point(lon lat)` → (lat, lon)
    pub fn parse_point(wkt: &str) -> Result<(f64, f64), CandidateError> {
        let malformed = || CandidateError::MalformedCoordinate(wkt.to_string());

        let inner = wkt
            .trim()
            .strip_prefix("Point(")
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(malformed)?;

        let mut parts = inner.split_whitespace();
        let lon = parts.next().and_then(|p| p.parse::<f64>().ok()).ok_or_else(malformed)?;
        let lat = parts.next().and_then(|p| p.parse::<f64>().ok()).ok_or_else(malformed)?;
        Ok((lat, lon))
    }

    /// Unlabelled items come back labelled with their bare Q-id
    fn is_bare_qid(label: &str) -> bool {
        label.len() > 1
            && label.starts_with('Q')
            && label[1..].chars().all(|c| c.is_ascii_digit())
    }
}

impl SourceAdapter for WikidataAdapter {
    fn source(&self) -> SourceKind {
        SourceKind::Wikidata
    }

    fn records<'a>(&self, payload: &'a Value) -> Vec<&'a Value> {
        value_at(payload, "results.bindings")
            .and_then(Value::as_array)
            .map(|rows| rows.iter().collect())
            .unwrap_or_default()
    }

    fn adapt_record(&self, raw: &Value) -> Result<CandidateRecord, CandidateError> {
        require_object(raw)?;
        let name = require_name(raw, "itemLabel.value")?;
        if Self::is_bare_qid(&name) {
            return Err(CandidateError::MissingName);
        }

        let coord = str_at(raw, "coord.value").ok_or(CandidateError::MissingCoordinates)?;
        let (lat, lon) = Self::parse_point(&coord)?;

        Ok(CandidateRecord::new(&name, lat, lon)?
            .with_website(str_at(raw, "website.value"))
            .with_image(str_at(raw, "image.value"))
            .with_provenance(self.source().code(), json!({ "id": str_at(raw, "item.value") })))
    }
}

// ============================================================================
// FACTORY FUNCTIONS
// ============================================================================

/// Detect the provider from a payload path (file name or parent directory),
/// e.g. `data/raw/osm/places.json` → Osm, `wikidata/muscat.json` → Wikidata.
pub fn detect_source(path: &Path) -> Result<SourceKind> {
    let components: Vec<String> = path
        .iter()
        .rev()
        .take(2)
        .filter_map(|c| c.to_str())
        .map(str::to_lowercase)
        .collect();

    for component in &components {
        if component.contains("opentripmap") || component.starts_with("otm") {
            return Ok(SourceKind::OpenTripMap);
        }
        if component.contains("foursquare") || component.starts_with("fsq") {
            return Ok(SourceKind::Foursquare);
        }
        if component.contains("wikidata") {
            return Ok(SourceKind::Wikidata);
        }
        if component.contains("osm") || component.contains("overpass") || component.contains("openstreetmap") {
            return Ok(SourceKind::Osm);
        }
    }

    Err(anyhow::anyhow!(
        "Could not detect source type from path: {}",
        path.display()
    ))
}

/// Adapter for a provider. `tags` overrides the provider's default taxonomy map.
pub fn get_adapter(kind: SourceKind, tags: Option<TagCategoryMap>) -> Box<dyn SourceAdapter> {
    let tags = tags.unwrap_or_else(|| kind.default_tags());
    match kind {
        SourceKind::Osm => Box::new(OsmAdapter::new(tags)),
        SourceKind::OpenTripMap => Box::new(OpenTripMapAdapter::new(tags)),
        SourceKind::Foursquare => Box::new(FoursquareAdapter::new(tags)),
        SourceKind::Wikidata => Box::new(WikidataAdapter::new()),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_address() {
        assert_eq!(
            join_address([Some("12"), Some(" Way 3109 "), None, Some(""), Some("Muscat")]),
            Some("12, Way 3109, Muscat".to_string())
        );
        assert_eq!(join_address::<_, &str>([None, Some("  ")]), None);
    }

    #[test]
    fn test_osm_node_and_way() {
        let payload = json!({
            "elements": [
                {
                    "type": "node", "id": 123, "lat": 23.61, "lon": 58.54,
                    "tags": {
                        "name": "Ubhar", "amenity": "restaurant",
                        "addr:street": "Bareeq Al Shatti", "addr:city": "Muscat",
                        "contact:phone": "+968 2469 9826", "opening_hours": "Mo-Su 12:00-23:00"
                    }
                },
                {
                    "type": "way", "id": 456, "center": { "lat": 23.58, "lon": 58.39 },
                    "tags": { "name": "Muscat Grand Mall", "shop": "mall", "website": "https://mgm.om" }
                }
            ]
        });

        let out = OsmAdapter::default().adapt(&payload);
        assert_eq!(out.len(), 2);

        assert_eq!(out[0].category, Some(Category::Restaurant));
        assert_eq!(out[0].location.address.as_deref(), Some("Bareeq Al Shatti, Muscat"));
        assert_eq!(out[0].contacts.phone.as_deref(), Some("+968 2469 9826"));
        assert_eq!(out[0].open_hours.as_deref(), Some("Mo-Su 12:00-23:00"));
        assert_eq!(out[0].provenance["osm"], json!({"type": "node", "id": 123}));

        assert_eq!(out[1].category, Some(Category::Mall));
        assert_eq!(out[1].location.lat, 23.58);
        assert_eq!(out[1].location.address, None);
        assert_eq!(out[1].contacts.website.as_deref(), Some("https://mgm.om"));
    }

    #[test]
    fn test_osm_fetcher_flat_records() {
        let payload = json!([
            {
                "id": "osm:node:123", "name": "Ubhar", "category": "restaurant",
                "location": { "lat": 23.61, "lon": 58.54, "address": "Bareeq Al Shatti, Muscat" },
                "contacts": { "website": "https://ubhar.om" },
                "sources": { "osm": { "id": "node/123" } }
            },
            {
                "id": "osm:way:456", "name": "Muscat Grand Mall", "category": "mall",
                "location": { "lat": 23.58, "lon": 58.39, "address": null },
                "contacts": { "website": null },
                "sources": { "osm": { "id": "way/456" } }
            },
            {
                "id": "osm:node:789", "name": "Bank Muscat", "category": "bank",
                "location": { "lat": 23.6, "lon": 58.4, "address": null },
                "sources": { "osm": { "id": "node/789" } }
            }
        ]);

        let out = OsmAdapter::default().adapt(&payload);
        assert_eq!(out.len(), 2);

        assert_eq!(out[0].name, "Ubhar");
        assert_eq!(out[0].category, Some(Category::Restaurant));
        assert_eq!(out[0].location.lat, 23.61);
        assert_eq!(out[0].location.address.as_deref(), Some("Bareeq Al Shatti, Muscat"));
        assert_eq!(out[0].contacts.website.as_deref(), Some("https://ubhar.om"));
        assert_eq!(out[0].provenance["osm"], json!({ "id": "node/123" }));

        assert_eq!(out[1].category, Some(Category::Mall));
        assert_eq!(out[1].location.address, None);
        assert_eq!(out[1].contacts.website, None);
    }

    #[test]
    fn test_osm_skips_bad_records() {
        let payload = json!([
            { "type": "node", "id": 1, "lat": 23.6, "lon": 58.4, "tags": { "amenity": "restaurant" } },
            { "type": "node", "id": 2, "tags": { "name": "No Coords", "amenity": "restaurant" } },
            { "type": "node", "id": 3, "lat": "north", "lon": 58.4, "tags": { "name": "Bad", "amenity": "restaurant" } },
            { "type": "node", "id": 4, "lat": 23.6, "lon": 58.4, "tags": { "name": "Bank Muscat", "amenity": "bank" } },
            "garbage",
            { "type": "node", "id": 5, "lat": "23.6", "lon": "58.4", "tags": { "name": "Kept", "tourism": "hotel" } }
        ]);

        let out = OsmAdapter::default().adapt(&payload);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].name, "Kept");
        assert_eq!(out[0].category, Some(Category::Hotel));
    }

    #[test]
    fn test_osm_malformed_coordinate_reason() {
        let raw = json!({ "type": "node", "id": 3, "lat": "north", "lon": 58.4, "tags": { "name": "Bad" } });
        assert!(matches!(
            OsmAdapter::default().adapt_record(&raw),
            Err(CandidateError::MalformedCoordinate(_))
        ));
    }

    #[test]
    fn test_opentripmap_kinds_and_fallback() {
        let payload = json!([
            {
                "xid": "N1", "name": "Crowne Plaza Muscat", "kinds": "accomodations,other_hotels",
                "point": { "lon": 58.47, "lat": 23.61 },
                "address": { "road": "Qurum Heights", "city": "Muscat", "postcode": "114" }
            },
            {
                "xid": "N2", "name": "Bin Ateeq", "kinds": "foods",
                "_bm_category": "restaurant", "point": { "lon": 58.41, "lat": 23.59 }
            },
            {
                "xid": "N3", "name": "Fort", "kinds": "fortifications", "point": { "lon": 58.4, "lat": 23.6 }
            }
        ]);

        let out = OpenTripMapAdapter::default().adapt(&payload);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].category, Some(Category::Hotel));
        assert_eq!(out[0].location.address.as_deref(), Some("Qurum Heights, Muscat, 114"));
        assert_eq!(out[0].provenance["opentripmap"], json!({"id": "N1"}));
        assert_eq!(out[1].category, Some(Category::Restaurant));
    }

    #[test]
    fn test_foursquare_full_record() {
        let payload = json!({
            "results": [{
                "fsq_id": "4b5", "name": "Kargeen Caffe",
                "geocodes": { "main": { "latitude": 23.59, "longitude": 58.43 } },
                "categories": [{ "id": 13034, "name": "Café" }, { "id": 13065, "name": "Restaurant" }],
                "location": { "address": "Madinat Qaboos", "locality": "Muscat", "formatted_address": "ignored" },
                "tel": "+968 2469 2269", "website": "http://kargeen.com",
                "hours": { "display": "Sun-Sat 9:00-1:00" },
                "price": 2, "rating": 8.4, "stats": { "total_ratings": 310 }
            }]
        });

        let out = FoursquareAdapter::default().adapt(&payload);
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert_eq!(c.category, Some(Category::Restaurant));
        assert_eq!(c.location.address.as_deref(), Some("Madinat Qaboos, Muscat"));
        assert_eq!(c.price_tier.as_deref(), Some("$$"));
        assert_eq!(c.rating.score, Some(8.4));
        assert_eq!(c.rating.count, Some(310));
        assert_eq!(c.open_hours.as_deref(), Some("Sun-Sat 9:00-1:00"));
        assert_eq!(c.provenance["foursquare"], json!({"id": "4b5"}));
    }

    #[test]
    fn test_wikidata_bindings() {
        let payload = json!({
            "results": { "bindings": [
                {
                    "item": { "value": "http://www.wikidata.org/entity/Q1" },
                    "itemLabel": { "value": "Royal Opera House Muscat" },
                    "coord": { "value": "Point(58.4536 23.6133)" },
                    "website": { "value": "https://www.rohmuscat.org.om" },
                    "image": { "value": "http://commons.wikimedia.org/wiki/Special:FilePath/ROHM.jpg" }
                },
                {
                    "item": { "value": "http://www.wikidata.org/entity/Q2" },
                    "itemLabel": { "value": "Q2" },
                    "coord": { "value": "Point(58.4 23.6)" }
                },
                {
                    "itemLabel": { "value": "Broken" },
                    "coord": { "value": "Point(abc)" }
                },
                {
                    "itemLabel": { "value": "No coord" }
                }
            ]}
        });

        let out = WikidataAdapter::new().adapt(&payload);
        assert_eq!(out.len(), 1);
        let c = &out[0];
        assert_eq!(c.category, None);
        assert_eq!(c.location.lat, 23.6133);
        assert_eq!(c.location.lon, 58.4536);
        assert!(c.wikimedia_image_url.is_some());
        assert_eq!(
            c.provenance["wikidata"],
            json!({"id": "http://www.wikidata.org/entity/Q1"})
        );
    }

    #[test]
    fn test_empty_tag_map_leaves_category_open() {
        let adapter = OsmAdapter::new(TagCategoryMap::default());
        let raw = json!({ "type": "node", "id": 9, "lat": 23.6, "lon": 58.4, "tags": { "name": "Somewhere", "amenity": "bank" } });
        let c = adapter.adapt_record(&raw).unwrap();
        assert_eq!(c.category, None);
    }

    #[test]
    fn test_unrecognized_payload_shape_is_empty() {
        assert!(OsmAdapter::default().adapt(&json!({"unexpected": true})).is_empty());
        assert!(WikidataAdapter::new().adapt(&json!([])).is_empty());
    }

    #[test]
    fn test_detect_source() {
        assert_eq!(detect_source(Path::new("data/raw/osm/places.json")).unwrap(), SourceKind::Osm);
        assert_eq!(
            detect_source(Path::new("data/raw/opentripmap/places.json")).unwrap(),
            SourceKind::OpenTripMap
        );
        assert_eq!(
            detect_source(Path::new("data/raw/foursquare/places.json")).unwrap(),
            SourceKind::Foursquare
        );
        assert_eq!(
            detect_source(Path::new("data/raw/wikidata/muscat.json")).unwrap(),
            SourceKind::Wikidata
        );
        assert!(detect_source(Path::new("data/raw/misc/places.json")).is_err());
    }

    #[test]
    fn test_source_kind_parse_and_roles() {
        assert_eq!("OTM".parse::<SourceKind>().unwrap(), SourceKind::OpenTripMap);
        assert!("yelp".parse::<SourceKind>().is_err());
        assert_eq!(SourceKind::Wikidata.default_role(), SourceRole::Enrichment);
        assert_eq!(SourceKind::Osm.default_role(), SourceRole::Primary);
    }

    #[test]
    fn test_get_adapter_uses_override() {
        let tags = TagCategoryMap::from_pairs(&[("amenity=cafe", Category::Restaurant)]);
        let adapter = get_adapter(SourceKind::Osm, Some(tags));
        let raw = json!({ "type": "node", "id": 7, "lat": 23.6, "lon": 58.4, "tags": { "name": "Starbucks", "amenity": "cafe" } });
        assert_eq!(adapter.adapt_record(&raw).unwrap().category, Some(Category::Restaurant));
    }
}
