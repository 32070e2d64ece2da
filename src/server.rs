//!
//! provost HTTP server
//! -------------------
//! Axum-based single-endpoint API. `GET /` runs the enrichment pipeline:
//! session cookie -> cosign validation -> realm check -> directory lookup ->
//! role classification -> profile JSON.
//!
//! The pipeline is strictly linear per request; every decision point is
//! terminal on failure and no upstream call is ever retried. Requests are
//! independent of each other: the only shared state is the immutable config
//! and the two stateless clients.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{HeaderMap, HeaderValue};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::cosign::{CosignClient, Verdict};
use crate::directory::DirectoryResolver;
use crate::error::ApiError;
use crate::roles;

/// How long in-flight requests get to drain after a shutdown signal.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Shared server state injected into all handlers. Built once at startup;
/// both clients are stateless per request (the directory resolver opens a
/// fresh connection per call).
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cosign: CosignClient,
    pub directory: DirectoryResolver,
}

/// Normalized profile document returned to authenticated callers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub username: String,
    pub display_name: String,
    pub year: String,
    pub degree: String,
    pub cohort: String,
    pub modules: Vec<String>,
    pub is_student: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(provide))
        .layer(middleware::from_fn_with_state(state.clone(), response_headers))
        .with_state(state)
}

/// Bind the listener and serve until interrupted.
pub async fn run(cfg: Config) -> anyhow::Result<()> {
    let state = AppState {
        cosign: CosignClient::new(&cfg),
        directory: DirectoryResolver::new(&cfg),
        config: Arc::new(cfg),
    };
    let addr: SocketAddr = state.config.address.parse()?;
    let app = router(state);

    info!(target: "init", "starting the API server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;
    info!(target: "init", "provost has shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!(target: "init", "shutdown signal received, draining requests");
    // Hard stop if the drain outlives the grace period
    tokio::spawn(async {
        tokio::time::sleep(SHUTDOWN_GRACE).await;
        std::process::exit(0);
    });
}

/// Cross-origin and caching headers applied to every response. Only the
/// configured origins get credentialed access; everyone else is pointed at
/// the primary origin.
async fn response_headers(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get("origin")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let mut response = next.run(request).await;

    let allowed = &state.config.allowed_origins;
    let allow = match origin {
        Some(o) if allowed.iter().any(|a| a == &o) => o,
        _ => allowed[0].clone(),
    };
    let headers = response.headers_mut();
    if let Ok(v) = HeaderValue::from_str(&allow) {
        headers.insert("Access-Control-Allow-Origin", v);
    }
    headers.insert(
        "Access-Control-Allow-Credentials",
        HeaderValue::from_static("true"),
    );
    headers.insert("Vary", HeaderValue::from_static("Origin, Cookie"));
    headers.insert("Cache-Control", HeaderValue::from_static("max-age=3600"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    response
}

fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    let cookie = headers.get("cookie").or_else(|| headers.get("Cookie"))?;
    let s = cookie.to_str().ok()?;
    for part in s.split(';') {
        let p = part.trim();
        if let Some(eq) = p.find('=') {
            let (k, v) = p.split_at(eq);
            if k == name {
                return Some(v[1..].to_string());
            }
        }
    }
    None
}

/// Caller address passed to the validator: first X-Forwarded-For hop when a
/// proxy supplied one, else the peer socket address.
fn client_ip(headers: &HeaderMap, peer: &SocketAddr) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| peer.ip().to_string())
}

async fn provide(
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    // No cookie: answer without touching the network
    let Some(cookie) = parse_cookie(&headers, &state.config.cookie_name) else {
        return Err(ApiError::NotLoggedIn);
    };

    let ip = client_ip(&headers, &peer);
    let verdict = state.cosign.check(&cookie, &ip).await.map_err(|e| {
        error!("cosign check failed: {e}");
        ApiError::Upstream(e.to_string())
    })?;
    let (principal, realm) = match verdict {
        Verdict::Authenticated { principal, realm } => (principal, realm),
        Verdict::Unauthenticated => return Err(ApiError::NotLoggedIn),
        Verdict::Rejected { message } => {
            return Err(ApiError::Upstream(format!("cosign-webapi: {message}")))
        }
    };

    if realm != state.config.accepted_realm {
        return Err(ApiError::RealmRejected(realm));
    }

    let attrs = state.directory.resolve(&principal).await.map_err(|e| {
        error!("directory resolve failed for {principal}: {e}");
        ApiError::Upstream(format!("ldap: {e}"))
    })?;
    let role = roles::classify(&attrs.groups);
    debug!(
        username = %principal,
        is_student = role.is_student,
        groups = attrs.groups.len(),
        "profile assembled"
    );

    let profile = Profile {
        username: principal,
        display_name: attrs.display_name,
        year: role.year,
        degree: role.degree,
        cohort: role.cohort,
        modules: role.modules,
        is_student: role.is_student,
    };
    Ok(Json(json!({"status": "success", "data": profile})))
}
