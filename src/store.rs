// 💾 Place store - canonical list on disk (JSON) and in SQLite (read API)
//
// Each reconciliation run replaces the whole table in one transaction.
// A content hash per place tells unchanged rows from changed ones, and every
// run is written to the `events` audit table.

use crate::model::{CanonicalRecord, Category};
use crate::reconciliation::ReconciliationReport;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use tracing::{info, warn};

// ============================================================================
// JSON FILES
// ============================================================================

pub fn write_places_json(path: &Path, places: &[CanonicalRecord]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let json = serde_json::to_string_pretty(places)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

pub fn read_places_json(path: &Path) -> Result<Vec<CanonicalRecord>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid place list {}", path.display()))
}

// ============================================================================
// SQLITE
// ============================================================================

pub fn setup_database(conn: &Connection) -> Result<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS places (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            category TEXT NOT NULL,
            lat REAL NOT NULL,
            lon REAL NOT NULL,
            address TEXT,
            record TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS events (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            event_id TEXT UNIQUE NOT NULL,
            timestamp TEXT NOT NULL,
            event_type TEXT NOT NULL,
            entity_type TEXT NOT NULL,
            entity_id TEXT NOT NULL,
            data TEXT NOT NULL,
            actor TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_places_category ON places(category)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_events_entity ON events(entity_type, entity_id)",
        [],
    )?;

    Ok(())
}

pub fn open_database(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let conn = Connection::open(path)
        .with_context(|| format!("Failed to open database {}", path.display()))?;
    setup_database(&conn)?;
    Ok(conn)
}

/// SHA-256 over the serialized record
pub fn content_hash(place: &CanonicalRecord) -> Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(place)?);
    Ok(format!("{:x}", hasher.finalize()))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
    pub inserted: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub removed: usize,
    /// Later entries whose id was already taken in the same list; not stored
    pub duplicates: usize,
}

/// Replace the stored list with `places` in a single transaction.
///
/// Ids are the table key. When two entries share one (same name and category,
/// never matched), the first is stored and the rest are counted as duplicates.
/// Every insert, update and removal is written to the audit trail.
pub fn replace_places(conn: &mut Connection, places: &[CanonicalRecord]) -> Result<StoreStats> {
    let tx = conn.transaction()?;
    let now = Utc::now().to_rfc3339();
    let mut stats = StoreStats::default();

    let existing: HashMap<String, String> = {
        let mut stmt = tx.prepare("SELECT id, content_hash FROM places")?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<HashMap<String, String>, _>>()?;
        rows
    };

    let mut kept: HashSet<&str> = HashSet::new();
    for place in places {
        if !kept.insert(place.id.as_str()) {
            warn!(id = %place.id, name = %place.name, "duplicate place id, keeping the first entry");
            stats.duplicates += 1;
            continue;
        }

        let hash = content_hash(place)?;
        let change = match existing.get(&place.id) {
            Some(old) if *old == hash => {
                stats.unchanged += 1;
                continue;
            }
            Some(_) => {
                stats.updated += 1;
                PlaceChange::Updated
            }
            None => {
                stats.inserted += 1;
                PlaceChange::Inserted
            }
        };

        tx.execute(
            "INSERT OR REPLACE INTO places (
                id, name, category, lat, lon, address, record, content_hash, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                place.id,
                place.name,
                place.category.as_str(),
                place.location.lat,
                place.location.lon,
                place.location.address,
                serde_json::to_string(place)?,
                hash,
                now,
            ],
        )?;
        insert_event(&tx, &Event::place_changed(&place.id, change, Some(&hash)))?;
    }

    for id in existing.keys().filter(|id| !kept.contains(id.as_str())) {
        tx.execute("DELETE FROM places WHERE id = ?1", params![id])?;
        insert_event(&tx, &Event::place_changed(id, PlaceChange::Removed, None))?;
        stats.removed += 1;
    }

    tx.commit()?;
    info!(?stats, "stored places");
    Ok(stats)
}

fn parse_record(json: String) -> rusqlite::Result<CanonicalRecord> {
    serde_json::from_str(&json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })
}

pub fn get_all_places(conn: &Connection) -> Result<Vec<CanonicalRecord>> {
    let mut stmt = conn.prepare("SELECT record FROM places ORDER BY category, name")?;
    let places = stmt
        .query_map([], |row| parse_record(row.get(0)?))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(places)
}

pub fn get_place(conn: &Connection, id: &str) -> Result<Option<CanonicalRecord>> {
    let place = conn
        .query_row("SELECT record FROM places WHERE id = ?1", params![id], |row| {
            parse_record(row.get(0)?)
        })
        .optional()?;
    Ok(place)
}

pub fn get_places_by_category(conn: &Connection, category: Category) -> Result<Vec<CanonicalRecord>> {
    let mut stmt = conn.prepare("SELECT record FROM places WHERE category = ?1 ORDER BY name")?;
    let places = stmt
        .query_map(params![category.as_str()], |row| parse_record(row.get(0)?))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(places)
}

/// (category, count) for every category with at least one place
pub fn category_counts(conn: &Connection) -> Result<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT category, COUNT(*) FROM places GROUP BY category ORDER BY category",
    )?;
    let counts = stmt
        .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(counts)
}

pub fn count_places(conn: &Connection) -> Result<i64> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM places", [], |row| row.get(0))?;
    Ok(count)
}

// ============================================================================
// AUDIT TRAIL
// ============================================================================

/// What a run did to one stored place
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceChange {
    Inserted,
    Updated,
    Removed,
}

impl PlaceChange {
    pub fn event_type(&self) -> &'static str {
        match self {
            PlaceChange::Inserted => "place_inserted",
            PlaceChange::Updated => "place_updated",
            PlaceChange::Removed => "place_removed",
        }
    }
}

const ACTOR: &str = "place-reconciliation";

/// One row of the `events` audit table
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Event {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    /// `place` or `namespace`
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub actor: String,
}

impl Event {
    fn stamped(event_type: &str, entity_type: &str, entity_id: &str, data: serde_json::Value) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            entity_type: entity_type.to_string(),
            entity_id: entity_id.to_string(),
            data,
            actor: ACTOR.to_string(),
        }
    }

    /// A stored place was inserted, changed or dropped by a run
    pub fn place_changed(place_id: &str, change: PlaceChange, content_hash: Option<&str>) -> Self {
        Self::stamped(
            change.event_type(),
            "place",
            place_id,
            serde_json::json!({ "change": change, "content_hash": content_hash }),
        )
    }

    /// One event per reconciliation run, keyed by namespace
    pub fn reconciliation_run(namespace: &str, report: &ReconciliationReport, stored: &StoreStats) -> Self {
        Self::stamped(
            "reconciliation_run",
            "namespace",
            namespace,
            serde_json::json!({
                "reconciled_at": report.reconciled_at.to_rfc3339(),
                "stats": report.stats,
                "issues": report.issues.len(),
                "stored": stored,
            }),
        )
    }
}

pub fn insert_event(conn: &Connection, event: &Event) -> Result<()> {
    conn.execute(
        "INSERT INTO events (
            event_id, timestamp, event_type, entity_type, entity_id, data, actor
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            event.event_id,
            event.timestamp.to_rfc3339(),
            event.event_type,
            event.entity_type,
            event.entity_id,
            serde_json::to_string(&event.data)?,
            event.actor,
        ],
    )?;
    Ok(())
}

fn event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let timestamp: String = row.get(1)?;
    let data: String = row.get(5)?;

    Ok(Event {
        event_id: row.get(0)?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e)))?
            .with_timezone(&Utc),
        event_type: row.get(2)?,
        entity_type: row.get(3)?,
        entity_id: row.get(4)?,
        data: serde_json::from_str(&data)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e)))?,
        actor: row.get(6)?,
    })
}

/// Most recent first, optionally only one event type
pub fn recent_events(conn: &Connection, event_type: Option<&str>, limit: usize) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE ?1 IS NULL OR event_type = ?1
         ORDER BY id DESC
         LIMIT ?2",
    )?;

    let events = stmt
        .query_map(params![event_type, limit as i64], event_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

/// Change history of one place, oldest first
pub fn place_history(conn: &Connection, place_id: &str) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT event_id, timestamp, event_type, entity_type, entity_id, data, actor
         FROM events
         WHERE entity_type = 'place' AND entity_id = ?1
         ORDER BY id ASC",
    )?;

    let events = stmt
        .query_map(params![place_id], event_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(events)
}

// ============================================================================
// TESTS
// ============================================================================
