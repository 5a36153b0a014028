//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Detect conflicting relay routes and duplicate tenants
//! - Reject route bodies the route's verb never sends
//! - Require credentials and inbound auth outside local mode
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RelayConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::RelayConfig;
use crate::destination::HttpVerb;
use crate::http::server::HEALTH_PATH;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address '{0}' is not a socket address")]
    MetricsAddress(String),

    #[error("timeouts.{0} must be greater than zero")]
    ZeroTimeout(&'static str),

    #[error("relay route '{0}' must be a literal path starting with '/'")]
    RoutePath(String),

    #[error("relay route '{0}' is reserved")]
    ReservedRoute(String),

    #[error("relay route '{0}' has target '{1}' which must start with '/'")]
    RouteTarget(String, String),

    #[error("relay route '{0}' is defined more than once")]
    DuplicateRoute(String),

    #[error("relay route '{path}': {message}")]
    RouteVerb { path: String, message: String },

    #[error("relay route '{path}': {field} is not sent with {verb}")]
    RouteBody { path: String, field: &'static str, verb: HttpVerb },

    #[error("tenant '{0}' is mapped more than once")]
    DuplicateTenant(String),

    #[error("{0} must be set outside local mode")]
    MissingSetting(&'static str),

    #[error("{0} '{1}' is not a valid URL")]
    Url(&'static str, String),

    #[error("auth.algorithm '{0}' is not supported")]
    Algorithm(String),

    #[error("auth is enabled but neither auth.verification_key nor auth.hmac_secret is set")]
    MissingKey,
}

/// Starts with `/` and has no segment axum would read as a parameter.
fn is_literal_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.contains(['{', '}', '*'])
        && !path.split('/').any(|segment| segment.starts_with(':'))
}

fn carries_body(verb: HttpVerb) -> bool {
    matches!(verb, HttpVerb::Post | HttpVerb::Put | HttpVerb::Patch)
}

/// Validate a parsed configuration.
pub fn validate_config(config: &RelayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(config.listener.bind_address.clone()));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("request_secs"));
    }
    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }

    let mut seen_paths = HashSet::new();
    for route in &config.relay.routes {
        if !is_literal_path(&route.path) {
            errors.push(ValidationError::RoutePath(route.path.clone()));
        }
        if route.path == HEALTH_PATH {
            errors.push(ValidationError::ReservedRoute(route.path.clone()));
        }
        if !route.target.starts_with('/') {
            errors.push(ValidationError::RouteTarget(route.path.clone(), route.target.clone()));
        }
        if !seen_paths.insert(route.path.as_str()) {
            errors.push(ValidationError::DuplicateRoute(route.path.clone()));
        }
        match route.verb.parse::<HttpVerb>() {
            Ok(verb) => {
                let bodies = [
                    ("payload", route.payload.is_some(), carries_body(verb)),
                    ("form_data", route.form_data.is_some(), verb == HttpVerb::Post),
                ];
                for (field, set, allowed) in bodies {
                    if set && !allowed {
                        errors.push(ValidationError::RouteBody {
                            path: route.path.clone(),
                            field,
                            verb,
                        });
                    }
                }
            }
            Err(e) => errors.push(ValidationError::RouteVerb {
                path: route.path.clone(),
                message: e.to_string(),
            }),
        }
    }

    let mut seen_tenants = HashSet::new();
    for mapping in &config.tenants {
        if !seen_tenants.insert(mapping.tenant.as_str()) {
            errors.push(ValidationError::DuplicateTenant(mapping.tenant.clone()));
        }
    }

    if config.auth.enabled {
        if crate::http::middleware::jwt::parse_algorithm(&config.auth.algorithm).is_none() {
            errors.push(ValidationError::Algorithm(config.auth.algorithm.clone()));
        }
        if config.auth.verification_key.is_none() && config.auth.hmac_secret.is_none() {
            errors.push(ValidationError::MissingKey);
        }
    }

    if !config.mode().is_local() {
        let services = &config.services;
        let required = [
            ("services.destination.uri", services.destination.uri.is_empty()),
            ("services.destination.client_id", services.destination.client_id.is_empty()),
            ("services.connectivity.client_id", services.connectivity.client_id.is_empty()),
            ("services.connectivity.onpremise_proxy_host", services.connectivity.onpremise_proxy_host.is_empty()),
        ];
        for (name, missing) in required {
            if missing {
                errors.push(ValidationError::MissingSetting(name));
            }
        }
        if services.uaa.url.is_empty()
            && (services.destination.token_url.is_none() || services.connectivity.token_url.is_none())
        {
            errors.push(ValidationError::MissingSetting("services.uaa.url"));
        }
        let urls = [
            ("services.uaa.url", Some(services.uaa.url.as_str())),
            ("services.destination.uri", Some(services.destination.uri.as_str())),
            ("services.destination.token_url", services.destination.token_url.as_deref()),
            ("services.connectivity.token_url", services.connectivity.token_url.as_deref()),
        ];
        for (name, value) in urls {
            if let Some(value) = value.filter(|v| !v.is_empty()) {
                if url::Url::parse(value).is_err() {
                    errors.push(ValidationError::Url(name, value.to_string()));
                }
            }
        }
        if !config.auth.enabled {
            errors.push(ValidationError::MissingSetting("auth.enabled"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
