//! HTTP server setup.
//!
//! # Responsibilities
//! - Create the Axum router and its handlers
//! - Wire up middleware (tracing, request ID, timeout)
//! - Serve until the shutdown signal fires
//!
//! # Routes
//! - `GET /status`: the client's own state, negotiated
//! - `GET /fetch/{*path}`: cached upstream GET under `base_url`, JSON body re-served negotiated

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde_json::{Map, Value};
use tokio::net::TcpListener;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::client::{CachedHttpClient, RequestOptions};
use crate::config::{CommonsConfig, NegotiationConfig};
use crate::error::HttpResult;
use crate::http::response::serve_negotiated;
use crate::lifecycle::Shutdown;

/// Response header telling whether `/fetch` was served from the cache.
pub const X_CACHE: &str = "x-cache";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: CachedHttpClient,
    pub negotiation: Arc<NegotiationConfig>,
}

/// Demo server exposing the client through negotiated responses.
pub struct HttpServer {
    router: Router,
    config: CommonsConfig,
}

impl HttpServer {
    /// Create a server with a `reqwest`-backed client built from `config`.
    pub fn new(config: CommonsConfig) -> HttpResult<Self> {
        let client = CachedHttpClient::from_config(&config)?;
        Ok(Self::with_client(client, config))
    }

    /// Create a server around an existing client.
    pub fn with_client(client: CachedHttpClient, config: CommonsConfig) -> Self {
        let state = AppState {
            client,
            negotiation: Arc::new(config.negotiation.clone()),
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &CommonsConfig, state: AppState) -> Router {
        Router::new()
            .route("/status", get(status_handler))
            .route("/fetch/{*path}", get(fetch_handler))
            .with_state(state)
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.server.request_timeout_secs,
            )))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The router, for serving on a custom listener or in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn config(&self) -> &CommonsConfig {
        &self.config
    }

    /// Serve on `listener` until `shutdown` is triggered.
    pub async fn run(self, listener: TcpListener, shutdown: &Shutdown) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let mut stop = shutdown.subscribe();
        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = stop.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn status_handler(State(state): State<AppState>, headers: HeaderMap) -> Response {
    serve_negotiated(&state.client, &headers, &state.negotiation)
}

async fn fetch_handler(
    State(state): State<AppState>,
    Path(path): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
    headers: HeaderMap,
) -> Response {
    tracing::debug!(path = %path, params = params.len(), "Fetching upstream");

    let options = RequestOptions::new().params(params).within_base();
    let upstream = match state.client.get_with_options(&path, &options).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(path = %path, error = %e, transient = e.is_transient(), "Upstream fetch failed");
            return e.into_response();
        }
    };

    let body = match upstream.json::<Value>() {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            let mut map = Map::new();
            map.insert("data".to_string(), other);
            map
        }
        Err(e) => return e.into_response(),
    };

    let mut response = serve_negotiated(&body, &headers, &state.negotiation);
    let marker = if upstream.from_cache { "HIT" } else { "MISS" };
    response
        .headers_mut()
        .insert(X_CACHE, HeaderValue::from_static(marker));
    response
}
