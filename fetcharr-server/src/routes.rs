use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use serde_json::json;

use fetcharr_contracts::capability::EmitterKind;
use fetcharr_model::MediaItem;

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/webhook/:source", post(webhook))
        .with_state(state)
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.stats().await {
        Ok(_) => (
            StatusCode::OK,
            Json(json!({ "status": "healthy", "timestamp": chrono::Utc::now().to_rfc3339() })),
        ),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unhealthy", "error": err.to_string() })),
        ),
    }
}

async fn stats(State(state): State<AppState>) -> impl IntoResponse {
    match state.store.stats().await {
        Ok(stats) => (
            StatusCode::OK,
            Json(json!({
                "total": stats.total,
                "by_state": stats.by_state,
                "by_kind": stats.by_kind,
                "symlinked": stats.symlinked,
                "not_symlinked": stats.not_symlinked,
            })),
        )
            .into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
struct WebhookBody {
    item: MediaItem,
}

/// Manually starts an Item Workflow for an externally supplied item,
/// `started_by` taken from the path's `:source` segment — the same entry
/// point the content poller uses internally, exposed for integrations that
/// push rather than get polled (a request source's own webhook, a manual
/// retry trigger).
async fn webhook(
    State(state): State<AppState>,
    axum::extract::Path(source): axum::extract::Path<String>,
    Json(body): Json<WebhookBody>,
) -> impl IntoResponse {
    let started_by = match source.as_str() {
        "overseerr" => EmitterKind::Overseerr,
        "plex-watchlist" => EmitterKind::PlexWatchlist,
        "listrr" => EmitterKind::Listrr,
        "mdblist" => EmitterKind::Mdblist,
        "symlink-library" => EmitterKind::SymlinkLibrary,
        "trakt-content" => EmitterKind::TraktContent,
        other => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("unknown source '{other}'") })),
            )
                .into_response();
        }
    };

    match state.workflow.submit(started_by, body.item).await {
        Ok(()) => (StatusCode::ACCEPTED, Json(json!({ "status": "submitted" }))).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": err.to_string() })),
        )
            .into_response(),
    }
}
