//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the rewrite handler
//! - Wire up middleware (tracing, timeout, request ID)
//! - Bind server to listener
//! - Resolve every request against the rewrite table
//! - Forward rewritten requests to the upstream, or answer with JSON
//! - Swap in recompiled tables on config updates
//! - Observability (metrics, per-destination stats)

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderName, HeaderValue, Request, StatusCode},
    response::{IntoResponse, Response},
    Json, Router,
};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::{ConfigError, RewriterConfig};
use crate::config::validation::{validate_config, ValidationError};
use crate::http::forward::{build_client, forward, HttpClient, Upstream};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer, RequestIdExt};
use crate::lifecycle::shutdown::wait as shutdown_requested;
use crate::observability::metrics;
use crate::observability::stats::RewriteStats;
use crate::routing::{normalize_path, Params, RewriteTable, TableOptions};

/// Response header naming the page a request was rewritten to.
pub const X_REWRITE_DESTINATION: HeaderName = HeaderName::from_static("x-rewrite-destination");

/// Everything derived from one configuration generation.
#[derive(Debug)]
pub struct RuntimeState {
    pub config: RewriterConfig,
    pub table: RewriteTable,
    pub upstream: Option<Upstream>,
    /// 0 for the startup config, +1 per applied reload.
    pub generation: u64,
}

impl RuntimeState {
    /// Validate `config` and compile its table.
    pub fn build(config: RewriterConfig, generation: u64) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let table = RewriteTable::compile(
            &config.effective_rules(),
            &TableOptions::from(&config.rewriting),
        )?;

        let upstream = match &config.upstream.url {
            Some(url) => Some(Upstream::parse(url).map_err(|e| {
                ConfigError::Validation(vec![ValidationError::Upstream {
                    value: url.clone(),
                    reason: e.to_string(),
                }])
            })?),
            None => None,
        };

        Ok(Self {
            config,
            table,
            upstream,
            generation,
        })
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<ArcSwap<RuntimeState>>,
    pub stats: Arc<RewriteStats>,
    pub client: HttpClient,
}

impl AppState {
    pub fn new(runtime: RuntimeState) -> Self {
        Self {
            runtime: Arc::new(ArcSwap::from_pointee(runtime)),
            stats: Arc::new(RewriteStats::new()),
            client: build_client(),
        }
    }

    /// Validate and compile `config`, then make it the active table.
    /// On error the current table stays in place.
    pub fn apply_config(&self, config: RewriterConfig) -> Result<u64, ConfigError> {
        let generation = self.runtime.load().generation + 1;
        let next = RuntimeState::build(config, generation)?;
        metrics::set_rule_count(next.table.len());
        self.runtime.store(Arc::new(next));
        Ok(generation)
    }
}

/// HTTP server for the rewrite gateway.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    /// Create a new HTTP server. Fails if any rewrite rule is malformed.
    pub fn new(config: RewriterConfig) -> Result<Self, ConfigError> {
        let runtime = RuntimeState::build(config, 0)?;
        tracing::info!(
            rules = runtime.table.len(),
            upstream = runtime.upstream.as_ref().map(Upstream::as_str),
            "Rewrite table ready"
        );
        metrics::set_rule_count(runtime.table.len());
        Ok(Self {
            state: AppState::new(runtime),
        })
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// The gateway's router with all middleware layers.
    pub fn router(&self) -> Router {
        let timeout = Duration::from_secs(self.state.runtime.load().config.timeouts.request_secs);
        Self::build_router(self.state.clone(), timeout)
    }

    #[allow(deprecated)]
    fn build_router(state: AppState, request_timeout: Duration) -> Router {
        Router::new()
            .fallback(rewrite_handler)
            .with_state(state)
            .layer(TimeoutLayer::new(request_timeout))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                tracing::info_span!(
                    "request",
                    method = %req.method(),
                    path = %req.uri().path(),
                    request_id = %req.request_id()
                )
            }))
            .layer(set_request_id_layer())
    }

    /// Run the server until `shutdown` fires. Configs received on
    /// `config_updates` are compiled and swapped in atomically.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<RewriterConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let reload_state = self.state.clone();
        tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                match reload_state.apply_config(config) {
                    Ok(generation) => {
                        metrics::record_reload("applied");
                        tracing::info!(generation, "Rewrite table reloaded");
                    }
                    Err(e) => {
                        metrics::record_reload("rejected");
                        tracing::error!(error = %e, "Rejected config update, keeping current rewrite table");
                    }
                }
            }
        });

        let admin = self.state.runtime.load().config.admin.clone();
        if admin.enabled {
            let admin_listener = TcpListener::bind(&admin.bind_address).await?;
            tracing::info!(address = %admin.bind_address, "Admin API listening");
            let admin_app = crate::admin::setup_admin_router(self.state.clone());
            let admin_shutdown = shutdown.resubscribe();
            tokio::spawn(async move {
                let result = axum::serve(admin_listener, admin_app)
                    .with_graceful_shutdown(shutdown_requested(admin_shutdown))
                    .await;
                if let Err(e) = result {
                    tracing::error!(error = %e, "Admin API stopped");
                }
            });
        }

        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                shutdown_requested(shutdown).await;
                tracing::info!("Draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// JSON answer when no upstream is configured.
#[derive(Debug, Serialize)]
pub struct ResolutionBody<'a> {
    pub rule: usize,
    pub source: &'a str,
    pub destination: &'a str,
    pub params: &'a Params,
    pub uri: String,
}

/// Main handler: normalize, resolve, then forward or describe.
async fn rewrite_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let request_id = request.request_id().to_string();
    let runtime = state.runtime.load_full();

    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);
    let normalized = normalize_path(&path);

    if runtime.config.rewriting.redirect_trailing_slash && normalized != path.as_str() {
        let location = redirect_location(&normalized, query.as_deref());
        tracing::debug!(request_id = %request_id, path = %path, location = %location, "Redirecting to normalized path");
        metrics::record_request("redirect", start);
        return (StatusCode::PERMANENT_REDIRECT, [(header::LOCATION, location)]).into_response();
    }

    let Some(resolution) = runtime.table.resolve(&normalized) else {
        state.stats.record_unmatched();
        if runtime.config.rewriting.forward_unmatched {
            if let Some(upstream) = &runtime.upstream {
                let target = request
                    .uri()
                    .path_and_query()
                    .map(|pq| pq.as_str().to_string())
                    .unwrap_or_else(|| path.clone());
                return forward_to(
                    &state,
                    upstream,
                    request,
                    &target,
                    &request_id,
                    "forwarded_unmatched",
                    start,
                )
                .await;
            }
        }
        tracing::debug!(request_id = %request_id, path = %path, "No rewrite rule matched");
        metrics::record_request("unmatched", start);
        return (StatusCode::NOT_FOUND, "No matching rewrite rule").into_response();
    };

    state.stats.record_hit(&resolution.destination);
    let uri = resolution.rewritten_uri(query.as_deref());

    tracing::debug!(
        request_id = %request_id,
        path = %path,
        rule = resolution.rule_index,
        destination = %resolution.destination,
        "Path rewritten"
    );

    match &runtime.upstream {
        Some(upstream) => {
            let mut response =
                forward_to(&state, upstream, request, &uri, &request_id, "rewritten", start).await;
            if let Ok(value) = HeaderValue::from_str(&resolution.destination) {
                response.headers_mut().insert(X_REWRITE_DESTINATION, value);
            }
            response
        }
        None => {
            metrics::record_request("resolved", start);
            Json(ResolutionBody {
                rule: resolution.rule_index,
                source: &resolution.source,
                destination: &resolution.destination,
                params: &resolution.params,
                uri,
            })
            .into_response()
        }
    }
}

/// `Location` for the normalization redirect. Leading slashes and
/// backslashes collapse to one `/` so the target can never be read as a
/// protocol-relative URL (`//other.host`).
fn redirect_location(normalized: &str, query: Option<&str>) -> String {
    let path = normalized.trim_start_matches(['/', '\\']);
    match query {
        Some(q) => format!("/{}?{}", path, q),
        None => format!("/{}", path),
    }
}

async fn forward_to(
    state: &AppState,
    upstream: &Upstream,
    request: Request<Body>,
    target: &str,
    request_id: &str,
    outcome: &'static str,
    start: Instant,
) -> Response {
    match forward(&state.client, upstream, request, target, request_id).await {
        Ok(response) => {
            metrics::record_request(outcome, start);
            response
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, target = %target, error = %e, "Upstream error");
            metrics::record_request("upstream_error", start);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    #[test]
    fn test_redirect_location_stays_on_host() {
        assert_eq!(redirect_location("/acme", None), "/acme");
        assert_eq!(redirect_location("/acme", Some("a=1")), "/acme?a=1");
        assert_eq!(redirect_location("//evil.example", None), "/evil.example");
        assert_eq!(redirect_location("/\\evil.example", Some("x")), "/evil.example?x");
        assert_eq!(redirect_location("/", None), "/");
    }

    #[tokio::test]
    async fn test_double_slash_redirect_is_local() {
        let server = HttpServer::new(RewriterConfig::default()).unwrap();
        let response = server
            .router()
            .oneshot(Request::builder().uri("//evil.example/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PERMANENT_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/evil.example");
    }
}
