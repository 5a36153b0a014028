//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the relay.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::destination::{Credentials, RuntimeMode, ServiceBindings, DESTINATIONS_API_PATH};

/// Environment variable whose presence marks a platform deployment.
pub const VCAP_APPLICATION: &str = "VCAP_APPLICATION";

/// Root configuration for the destination relay.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RelayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Execution mode.
    pub runtime: RuntimeConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Bound platform services.
    pub services: ServicesConfig,

    /// Inbound JWT validation.
    pub auth: AuthConfig,

    /// Tenant → destination mapping.
    pub tenants: Vec<TenantMapping>,

    /// Destination used when neither the route nor the tenant table names one.
    pub default_destination: Option<String>,

    /// Relay route definitions.
    pub relay: RelaySection,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl RelayConfig {
    /// Effective runtime mode.
    ///
    /// Without an explicit setting the relay is local exactly when
    /// `VCAP_APPLICATION` is absent.
    pub fn mode(&self) -> RuntimeMode {
        let local = self
            .runtime
            .local
            .unwrap_or_else(|| std::env::var_os(VCAP_APPLICATION).is_none());
        if local {
            RuntimeMode::Local
        } else {
            RuntimeMode::Cloud
        }
    }

    /// Credentials and endpoints handed to the destination client.
    pub fn service_bindings(&self) -> ServiceBindings {
        self.services.bindings(self.mode())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Runtime mode selection.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Force local (`true`) or platform (`false`) mode; detected when unset.
    pub local: Option<bool>,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Inbound request timeout in seconds.
    pub request_secs: u64,

    /// Outbound connection establishment timeout in seconds.
    pub connect_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 60,
            connect_secs: 10,
        }
    }
}

/// Platform service credentials.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServicesConfig {
    pub uaa: UaaServiceConfig,
    pub destination: DestinationServiceConfig,
    pub connectivity: ConnectivityServiceConfig,
}

impl ServicesConfig {
    /// Derive service bindings; local mode uses fixed stand-ins.
    pub fn bindings(&self, mode: RuntimeMode) -> ServiceBindings {
        if mode.is_local() {
            let stand_in = |id: &str, secret: &str| Credentials {
                client_id: id.to_string(),
                client_secret: secret.to_string(),
                token_base_url: "http://localhost".to_string(),
            };
            return ServiceBindings {
                destination: stand_in("destinationClientId", "destinationClientSecret"),
                destination_api_url: format!("http://localhost{}", DESTINATIONS_API_PATH),
                connectivity: stand_in("connectivityClientId", "connectivityClientSecret"),
                proxy_url: None,
            };
        }

        let token_base = |own: &Option<String>| own.clone().unwrap_or_else(|| self.uaa.url.clone());

        ServiceBindings {
            destination: Credentials {
                client_id: self.destination.client_id.clone(),
                client_secret: self.destination.client_secret.clone(),
                token_base_url: token_base(&self.destination.token_url),
            },
            destination_api_url: format!(
                "{}{}",
                self.destination.uri.trim_end_matches('/'),
                DESTINATIONS_API_PATH
            ),
            connectivity: Credentials {
                client_id: self.connectivity.client_id.clone(),
                client_secret: self.connectivity.client_secret.clone(),
                token_base_url: token_base(&self.connectivity.token_url),
            },
            proxy_url: Some(format!(
                "http://{}:{}",
                self.connectivity.onpremise_proxy_host, self.connectivity.onpremise_proxy_port
            )),
        }
    }
}

/// Identity service (XSUAA).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UaaServiceConfig {
    /// OAuth server emitting `/oauth/*` endpoints.
    pub url: String,
}

/// Destination service instance.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DestinationServiceConfig {
    /// Service URI, e.g. `https://destination-configuration.cfapps.eu10.hana.ondemand.com`.
    pub uri: String,
    pub client_id: String,
    pub client_secret: String,
    /// OAuth server for this instance; defaults to `services.uaa.url`.
    pub token_url: Option<String>,
}

/// Connectivity service instance.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ConnectivityServiceConfig {
    pub client_id: String,
    pub client_secret: String,
    /// OAuth server for this instance; defaults to `services.uaa.url`.
    pub token_url: Option<String>,
    pub onpremise_proxy_host: String,
    pub onpremise_proxy_port: u16,
}

impl Default for ConnectivityServiceConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_url: None,
            onpremise_proxy_host: "connectivityproxy.internal.cf.eu10.hana.ondemand.com".to_string(),
            onpremise_proxy_port: 20003,
        }
    }
}

/// Inbound JWT validation settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Require a valid bearer JWT on relay routes.
    pub enabled: bool,

    /// Signing algorithm (RS256 for XSUAA, HS256 for shared secrets).
    pub algorithm: String,

    /// PEM public key used with RS* algorithms.
    pub verification_key: Option<String>,

    /// Shared secret used with HS* algorithms.
    pub hmac_secret: Option<String>,

    /// Expected `aud` claim; unchecked when unset.
    pub audience: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            algorithm: "RS256".to_string(),
            verification_key: None,
            hmac_secret: None,
            audience: None,
        }
    }
}

/// One tenant → destination entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct TenantMapping {
    /// Tenant (identity zone) id.
    pub tenant: String,
    /// Destination name configured for that tenant.
    pub destination: String,
}

/// Relay route table.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelaySection {
    pub routes: Vec<RelayRouteConfig>,
}

impl Default for RelaySection {
    fn default() -> Self {
        const SERVICE: &str = "/sap/opu/odata/sap/ZSA_OPPORTUNITY_ODATA_SRV";
        let target = format!("{}/OpportunityHeaderSet", SERVICE);
        let route = |path: String| RelayRouteConfig {
            path,
            target: target.clone(),
            ..RelayRouteConfig::default()
        };
        Self {
            routes: vec![
                route(SERVICE.to_string()),
                route(format!("{}/", SERVICE)),
                route(format!("{}/$metadata", SERVICE)),
            ],
        }
    }
}

/// Inbound GET path relayed to a path inside a destination.
///
/// Body-carrying verbs send the fixed `payload` or, for POST, `form_data`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayRouteConfig {
    /// Inbound path (exact match).
    pub path: String,

    /// Path called in the destination, with leading slash.
    pub target: String,

    /// Outbound HTTP verb.
    pub verb: String,

    /// Fixed destination for this route, bypassing the tenant table.
    pub destination: Option<String>,

    /// Outbound `Content-Type`; `application/json` when unset.
    pub content_type: Option<String>,

    /// Relay status and headers along with the body.
    pub full_response: bool,

    /// Treat HTTP error statuses as results; only transport errors fail.
    pub tech_error_only: bool,

    /// Deliver the target's body as raw bytes.
    pub binary: bool,

    /// JSON body for POST, PUT and PATCH.
    pub payload: Option<Value>,

    /// Multipart form fields; POST only, and sent instead of `payload`.
    pub form_data: Option<BTreeMap<String, String>>,
}

impl Default for RelayRouteConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            target: String::new(),
            verb: "GET".to_string(),
            destination: None,
            content_type: None,
            full_response: false,
            tech_error_only: false,
            binary: false,
            payload: None,
            form_data: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
