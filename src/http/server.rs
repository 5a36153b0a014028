//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the relay routes and `/health`
//! - Wire up middleware (request ID, tracing, timeout, JWT)
//! - Resolve the destination per request and run the destination call
//! - Swap the tenant table when the config file changes
//! - Serve until the shutdown signal fires

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::{Request, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::config::RelayConfig;
use crate::destination::{
    DestinationClient, HttpDestinationResolver, HttpRelayExecutor, OAuthTokenAcquirer,
    RelayError,
};
use crate::http::middleware::jwt::{require_jwt, AuthContext, JwtValidator, KeyError};
use crate::http::{request, response};
use crate::observability::metrics;
use crate::routing::{RelayRouter, TenantMap};

pub const HEALTH_PATH: &str = "/health";

/// Errors that prevent the server from starting or serving.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid inbound auth settings: {0}")]
    Auth(#[from] KeyError),

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("invalid relay route: {0}")]
    Route(#[from] RelayError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub client: DestinationClient,
    pub routes: Arc<RelayRouter>,
    pub tenants: Arc<ArcSwap<TenantMap>>,
}

#[derive(Debug, Serialize)]
struct HealthStatus {
    status: &'static str,
    version: &'static str,
    local: bool,
}

/// HTTP server for the destination relay.
pub struct HttpServer {
    router: Router,
    tenants: Arc<ArcSwap<TenantMap>>,
    config: RelayConfig,
}

impl HttpServer {
    /// Create a server whose destination calls go to the configured services.
    pub fn new(config: RelayConfig) -> Result<Self, ServerError> {
        let mode = config.mode();
        let connect_timeout = Duration::from_secs(config.timeouts.connect_secs);

        let http_client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()?;

        let client = DestinationClient::new(
            Arc::new(OAuthTokenAcquirer::new(http_client.clone(), mode)),
            Arc::new(HttpDestinationResolver::new(http_client, mode)),
            Arc::new(HttpRelayExecutor::new(connect_timeout)?),
            config.service_bindings(),
            mode,
        );

        Self::with_client(config, client)
    }

    /// Create a server around an existing destination client.
    pub fn with_client(config: RelayConfig, client: DestinationClient) -> Result<Self, ServerError> {
        let routes = Arc::new(RelayRouter::from_config(&config.relay.routes)?);
        let tenants = Arc::new(ArcSwap::from_pointee(TenantMap::from_config(&config)));

        let validator = if config.auth.enabled {
            Some(Arc::new(JwtValidator::from_config(&config.auth)?))
        } else {
            tracing::warn!("Inbound authentication is disabled; relay routes are open");
            None
        };

        let state = AppState {
            client,
            routes: routes.clone(),
            tenants: tenants.clone(),
        };

        let router = Self::build_router(&config, &routes, validator, state);
        Ok(Self {
            router,
            tenants,
            config,
        })
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(
        config: &RelayConfig,
        routes: &RelayRouter,
        validator: Option<Arc<JwtValidator>>,
        state: AppState,
    ) -> Router {
        let mut relay = Router::new();
        for route in routes.routes() {
            relay = relay.route(&route.path, get(relay_handler));
        }
        if let (Some(validator), false) = (validator, routes.is_empty()) {
            relay = relay.route_layer(middleware::from_fn_with_state(validator, require_jwt));
        }

        let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            tracing::info_span!(
                "request",
                method = %req.method(),
                path = %req.uri().path(),
                request_id = request::request_id(req.headers()).unwrap_or("-"),
            )
        });

        Router::new()
            .route(HEALTH_PATH, get(health_handler))
            .merge(relay)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(request::set_request_id_layer())
                    .layer(trace)
                    .layer(request::propagate_request_id_layer())
                    .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs))),
            )
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Configurations received on `config_updates` replace the tenant table.
    /// Returns once `shutdown` fires and in-flight requests have drained.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<RelayConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            local = self.config.mode().is_local(),
            relay_routes = self.config.relay.routes.len(),
            "HTTP server starting"
        );

        let tenants = self.tenants.clone();
        let reload = tokio::spawn(async move {
            while let Some(config) = config_updates.recv().await {
                let map = TenantMap::from_config(&config);
                tracing::info!(tenants = map.len(), "Tenant mapping reloaded");
                tenants.store(Arc::new(map));
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        reload.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The assembled router, for serving it elsewhere or driving it in tests.
    pub fn into_router(self) -> Router {
        self.router
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        local: state.client.mode().is_local(),
    })
}

/// Relays one inbound request to the destination of the caller's tenant.
async fn relay_handler(
    State(state): State<AppState>,
    matched: MatchedPath,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let path = matched.as_str();
    let Some(route) = state.routes.lookup(path) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let tenant = request
        .extensions()
        .get::<AuthContext>()
        .and_then(|ctx| ctx.tenant.clone());
    let destination = state
        .tenants
        .load()
        .destination_for(route.destination.as_deref(), tenant.as_deref())
        .map(str::to_owned);

    let result = match destination {
        Some(destination) => {
            tracing::info!(tenant = ?tenant, destination = %destination, "Relaying request");
            state.client.call_destination(route.call_options(&destination)).await
        }
        None => {
            let error = RelayError::Resolution {
                name: tenant.clone().unwrap_or_default(),
                source: "no destination mapped for tenant and no default_destination set".into(),
            };
            metrics::record_stage_failure(error.kind());
            tracing::warn!(tenant = ?tenant, "No destination for request");
            Err(error)
        }
    };

    let outcome = match &result {
        Ok(_) => "success",
        Err(e) => e.kind(),
    };
    metrics::record_request(path, outcome, start);

    response::render(&result)
}
