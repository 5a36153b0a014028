//! Destination call orchestration.
//!
//! Runs the full chain for one call:
//! token (destination service) → resolve → token (connectivity) → build → execute.
//! Nothing is cached between calls; each one re-resolves its destination.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::Instrument;

use crate::destination::relay::RelayExecutor;
use crate::destination::request::{self, ProxyRequestInputs};
use crate::destination::resolver::DestinationResolver;
use crate::destination::token::TokenAcquirer;
use crate::destination::types::{
    Credentials, HttpVerb, RelayError, RelayPayload, RelayResult, RuntimeMode, ServiceKind,
};
use crate::observability::metrics;

/// Credentials and endpoints of the bound platform services.
#[derive(Debug, Clone)]
pub struct ServiceBindings {
    pub destination: Credentials,
    /// `{destination-uri}/destination-configuration/v1/destinations`.
    pub destination_api_url: String,
    pub connectivity: Credentials,
    /// `http://{onpremise_proxy_host}:{onpremise_proxy_port}`, absent in local mode.
    pub proxy_url: Option<String>,
}

/// Parameters of one destination call.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Path in the destination, with leading slash (e.g. `/api/v1/json`).
    pub url: String,
    pub destination_name: String,
    /// Validated against the closed verb set before anything else runs.
    pub http_verb: String,
    pub payload: Option<Value>,
    pub form_data: Option<BTreeMap<String, String>>,
    pub content_type: Option<String>,
    pub full_response: bool,
    pub tech_error_only: bool,
    pub binary: bool,
}

/// Orchestrates token acquisition, destination resolution and the relay call.
#[derive(Clone)]
pub struct DestinationClient {
    tokens: Arc<dyn TokenAcquirer>,
    resolver: Arc<dyn DestinationResolver>,
    executor: Arc<dyn RelayExecutor>,
    bindings: ServiceBindings,
    mode: RuntimeMode,
}

impl DestinationClient {
    pub fn new(
        tokens: Arc<dyn TokenAcquirer>,
        resolver: Arc<dyn DestinationResolver>,
        executor: Arc<dyn RelayExecutor>,
        bindings: ServiceBindings,
        mode: RuntimeMode,
    ) -> Self {
        Self {
            tokens,
            resolver,
            executor,
            bindings,
            mode,
        }
    }

    pub fn mode(&self) -> RuntimeMode {
        self.mode
    }

    /// Call `options.url` in the named destination via the connectivity proxy.
    pub async fn call_destination(&self, options: CallOptions) -> RelayResult<RelayPayload> {
        let verb: HttpVerb = options.http_verb.parse().inspect_err(|e: &RelayError| {
            metrics::record_stage_failure(e.kind());
            tracing::warn!(error = %e, "Rejected destination call");
        })?;

        let span = tracing::info_span!(
            "call_destination",
            destination = %options.destination_name,
            method = %verb,
            path = %options.url,
        );

        async move {
            let start = Instant::now();
            let result = self.run_chain(verb, &options).await;
            match &result {
                Ok(_) => tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "Destination call succeeded"),
                Err(e) => {
                    metrics::record_stage_failure(e.kind());
                    tracing::error!(stage = e.kind(), error = %e, cause = %e.cause(), "Destination call failed");
                }
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn run_chain(&self, verb: HttpVerb, options: &CallOptions) -> RelayResult<RelayPayload> {
        let destination_token = self
            .tokens
            .acquire_token(ServiceKind::Destination, &self.bindings.destination)
            .await?;

        let destination = self
            .resolver
            .resolve(
                &options.destination_name,
                &self.bindings.destination_api_url,
                &destination_token,
            )
            .await?;

        let proxy_token = self
            .tokens
            .acquire_token(ServiceKind::Connectivity, &self.bindings.connectivity)
            .await?;

        let descriptor = request::build(ProxyRequestInputs {
            path: &options.url,
            destination: &destination,
            proxy_url: self.bindings.proxy_url.as_deref(),
            proxy_access_token: &proxy_token,
            verb,
            content_type: options.content_type.as_deref(),
            payload: options.payload.as_ref(),
            form_data: options.form_data.as_ref(),
            full_response: options.full_response,
            tech_error_only: options.tech_error_only,
            binary: options.binary,
            mode: self.mode,
        });

        self.executor.execute(descriptor).await
    }
}

impl std::fmt::Debug for DestinationClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationClient")
            .field("destination_api_url", &self.bindings.destination_api_url)
            .field("proxy_url", &self.bindings.proxy_url)
            .field("mode", &self.mode)
            .finish()
    }
}
