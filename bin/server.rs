// Monitor Comisiones - Trigger Server
// REST endpoints that run one provider updater on request

use anyhow::Context;
use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use monitor_comisiones::{load_data, provider_config, run, Entity, HttpFetcher, Provider, RunOptions};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

const DEFAULT_ADDR: &str = "0.0.0.0:5000";

/// Shared application state
#[derive(Clone)]
struct AppState {
    opts: Arc<RunOptions>,
    api_key: Option<Arc<str>>,
    /// One lock per provider: a second trigger while a run is active gets 409
    locks: Arc<HashMap<Provider, Arc<Mutex<()>>>>,
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    success: bool,
    error: String,
}

fn error_response(status: StatusCode, error: String) -> Response {
    (status, Json(ErrorResponse { success: false, error })).into_response()
}

#[derive(Serialize)]
struct StatusResponse {
    status: &'static str,
    updaters: Vec<&'static str>,
}

#[derive(Serialize)]
struct UpdateResponse {
    success: bool,
    provider: String,
    updated: bool,
    warnings: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Bearer token check; everything passes when no key is configured
fn authorized(api_key: Option<&str>, headers: &HeaderMap) -> bool {
    let Some(expected) = api_key else {
        return true;
    };
    let presented = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let token = presented.strip_prefix("Bearer ").unwrap_or(presented).trim();
    token == expected
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /status - Health check
async fn status() -> impl IntoResponse {
    Json(StatusResponse {
        status: "ok",
        updaters: Provider::ALL.iter().map(|p| p.id()).collect(),
    })
}

/// POST /update/:provider - Run one updater
async fn update(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Response {
    if !authorized(state.api_key.as_deref(), &headers) {
        return error_response(StatusCode::UNAUTHORIZED, "Unauthorized".to_string());
    }

    let Ok(provider) = name.parse::<Provider>() else {
        return error_response(StatusCode::NOT_FOUND, format!("Unknown updater: {}", name));
    };

    let Some(lock) = state.locks.get(&provider) else {
        return error_response(StatusCode::NOT_FOUND, format!("Unknown updater: {}", name));
    };
    let Ok(guard) = lock.clone().try_lock_owned() else {
        return error_response(
            StatusCode::CONFLICT,
            format!("Updater '{}' is already running", provider),
        );
    };

    tracing::info!(%provider, "running updater");
    let opts = state.opts.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        let _guard = guard;
        run(&provider_config(provider), &HttpFetcher::new(), &opts)
    })
    .await;

    match outcome {
        Ok(Ok(summary)) => {
            tracing::info!(%provider, updated = summary.updated(), "updater finished");
            let body = UpdateResponse {
                success: true,
                provider: provider.id().to_string(),
                updated: summary.updated(),
                warnings: summary.warnings.iter().map(|w| w.to_string()).collect(),
                error: None,
            };
            (StatusCode::OK, Json(body)).into_response()
        }
        Ok(Err(e)) => {
            tracing::error!(%provider, error = %e, "updater failed");
            let body = UpdateResponse {
                success: false,
                provider: provider.id().to_string(),
                updated: false,
                warnings: Vec::new(),
                error: Some(e.to_string()),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
        Err(e) => {
            tracing::error!(%provider, error = %e, "updater task aborted");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// GET /api/entities - Current record store
async fn get_entities(State(state): State<AppState>) -> Response {
    match load_data(&state.opts.data_file) {
        Ok(entities) => (StatusCode::OK, Json(ApiResponse::<Vec<Entity>>::ok(entities))).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "loading record store");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/update/:provider", post(update))
        .route("/api/entities", get(get_entities))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Main Server
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let env_path = |key: &str, default: &str| {
        PathBuf::from(std::env::var(key).unwrap_or_else(|_| default.to_string()))
    };
    let opts = RunOptions {
        data_file: env_path("COMISIONES_DATA_FILE", "data.json"),
        index_file: env_path("COMISIONES_INDEX_FILE", "index.html"),
        refresh_date_stamp: true,
    };

    let state = AppState {
        opts: Arc::new(opts),
        api_key: std::env::var("API_KEY").ok().map(Arc::from),
        locks: Arc::new(
            Provider::ALL
                .into_iter()
                .map(|p| (p, Arc::new(Mutex::new(()))))
                .collect(),
        ),
    };

    println!("🌐 Monitor Comisiones - Trigger Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ Record store: {}", state.opts.data_file.display());
    if state.api_key.is_some() {
        println!("✓ API key required (Authorization: Bearer ...)");
    }

    let addr = std::env::var("COMISIONES_ADDR").unwrap_or_else(|_| DEFAULT_ADDR.to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {}", addr))?;

    println!("\n🚀 Server running on http://{}", addr);
    println!("   POST /update/<mercadopago|bna|bapro|uala>");
    println!("   GET  /status");
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, router(state)).await.context("serving")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(auth: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(auth).unwrap());
        h
    }

    #[test]
    fn test_no_key_configured_allows_all() {
        assert!(authorized(None, &HeaderMap::new()));
    }

    #[test]
    fn test_bearer_token() {
        assert!(authorized(Some("s3cret"), &headers("Bearer s3cret")));
        assert!(!authorized(Some("s3cret"), &headers("Bearer otro")));
        assert!(!authorized(Some("s3cret"), &HeaderMap::new()));
    }
}
