// Place Reconciliation - Web Server
// Read-only JSON API over the reconciled place store

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use place_reconciliation::{
    category_counts, count_places, get_all_places, get_place, get_places_by_category,
    place_history, recent_events, setup_database, CanonicalRecord, Category, Event,
};

/// Shared application state
#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Connection>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    fn ok(data: T) -> Response {
        (
            StatusCode::OK,
            Json(Self {
                success: true,
                data: Some(data),
                error: None,
            }),
        )
            .into_response()
    }

    fn fail(status: StatusCode, message: impl Into<String>) -> Response {
        (
            status,
            Json(Self {
                success: false,
                data: None,
                error: Some(message.into()),
            }),
        )
            .into_response()
    }
}

#[derive(Serialize)]
struct StatsResponse {
    total_places: i64,
    by_category: Vec<CategoryStat>,
    last_run: Option<Event>,
}

#[derive(Serialize)]
struct CategoryStat {
    category: String,
    count: i64,
}

#[derive(Deserialize)]
struct PlacesQuery {
    category: Option<Category>,
}

/// Run a store query against the shared connection, mapping failures to 500
fn with_db<T, F>(state: &AppState, what: &str, f: F) -> Response
where
    T: Serialize,
    F: FnOnce(&Connection) -> anyhow::Result<T>,
{
    let conn = match state.db.lock() {
        Ok(conn) => conn,
        Err(_) => {
            error!("database mutex poisoned");
            return ApiResponse::<T>::fail(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable");
        }
    };

    match f(&conn) {
        Ok(data) => ApiResponse::ok(data),
        Err(e) => {
            error!(error = %e, "error getting {}", what);
            ApiResponse::<T>::fail(StatusCode::INTERNAL_SERVER_ERROR, format!("error getting {}", what))
        }
    }
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> Response {
    ApiResponse::ok("OK")
}

/// GET /api/places?category=mall - All places, optionally one category
async fn list_places(State(state): State<AppState>, Query(query): Query<PlacesQuery>) -> Response {
    with_db(&state, "places", |conn| match query.category {
        Some(category) => get_places_by_category(conn, category),
        None => get_all_places(conn),
    })
}

/// GET /api/places/:id - One place by canonical id
async fn place_detail(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let conn = match state.db.lock() {
        Ok(conn) => conn,
        Err(_) => return ApiResponse::<CanonicalRecord>::fail(StatusCode::INTERNAL_SERVER_ERROR, "database unavailable"),
    };

    match get_place(&conn, &id) {
        Ok(Some(place)) => ApiResponse::ok(place),
        Ok(None) => ApiResponse::<CanonicalRecord>::fail(StatusCode::NOT_FOUND, format!("no place {}", id)),
        Err(e) => {
            error!(error = %e, id = %id, "error getting place");
            ApiResponse::<CanonicalRecord>::fail(StatusCode::INTERNAL_SERVER_ERROR, "error getting place")
        }
    }
}

/// GET /api/places/:id/history - Audit trail of one place
async fn place_events(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    with_db(&state, "place history", |conn| place_history(conn, &id))
}

/// GET /api/categories/:category - Places in one category
async fn category_places(State(state): State<AppState>, Path(category): Path<String>) -> Response {
    let category: Category = match category.parse() {
        Ok(category) => category,
        Err(e) => return ApiResponse::<Vec<CanonicalRecord>>::fail(StatusCode::BAD_REQUEST, format!("{}", e)),
    };

    with_db(&state, "category places", |conn| get_places_by_category(conn, category))
}

/// GET /api/stats - Place counts and the last reconciliation run
async fn get_stats(State(state): State<AppState>) -> Response {
    with_db(&state, "stats", |conn| {
        Ok(StatsResponse {
            total_places: count_places(conn)?,
            by_category: category_counts(conn)?
                .into_iter()
                .map(|(category, count)| CategoryStat { category, count })
                .collect(),
            last_run: recent_events(conn, Some("reconciliation_run"), 1)?.into_iter().next(),
        })
    })
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "places_server=info,place_reconciliation=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let db_path = std::env::var("PLACES_DB").unwrap_or_else(|_| "data/places.db".to_string());
    let db_path = std::path::Path::new(&db_path);

    if !db_path.exists() {
        anyhow::bail!(
            "database not found at {} (run `place-reconciliation reconcile --db {}` first)",
            db_path.display(),
            db_path.display()
        );
    }

    let conn = Connection::open(db_path)?;
    setup_database(&conn)?;
    info!(db = %db_path.display(), "database opened");

    let state = AppState {
        db: Arc::new(Mutex::new(conn)),
    };

    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/places", get(list_places))
        .route("/places/:id", get(place_detail))
        .route("/places/:id/history", get(place_events))
        .route("/categories/:category", get(category_places))
        .route("/stats", get(get_stats))
        .with_state(state);

    let static_dir = std::env::var("PLACES_STATIC_DIR").unwrap_or_else(|_| "static".to_string());

    let app = Router::new()
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()));

    let addr = std::env::var("PLACES_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "🚀 server running");
    axum::serve(listener, app).await?;
    Ok(())
}
