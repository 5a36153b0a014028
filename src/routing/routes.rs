//! Relay route table.
//!
//! # Responsibilities
//! - Compile `RelayRouteConfig` entries into typed routes
//! - Look up a route by the inbound path
//! - Produce the `CallOptions` for a resolved destination
//!
//! # Design Decisions
//! - Immutable after construction (shared via Arc, no locks)
//! - O(1) lookup via HashMap on the exact path
//! - Verbs are parsed once here, so a bad route fails at startup

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use crate::config::RelayRouteConfig;
use crate::destination::{CallOptions, HttpVerb, RelayResult};

/// A compiled relay route.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayRoute {
    /// Inbound path served by the relay.
    pub path: String,
    /// Path requested inside the destination.
    pub target: String,
    pub verb: HttpVerb,
    /// Fixed destination; bypasses the tenant table when set.
    pub destination: Option<String>,
    pub content_type: Option<String>,
    pub full_response: bool,
    pub tech_error_only: bool,
    pub binary: bool,
    pub payload: Option<Value>,
    pub form_data: Option<BTreeMap<String, String>>,
}

impl RelayRoute {
    fn compile(config: &RelayRouteConfig) -> RelayResult<Self> {
        Ok(Self {
            path: config.path.clone(),
            target: config.target.clone(),
            verb: config.verb.parse()?,
            destination: config.destination.clone(),
            content_type: config.content_type.clone(),
            full_response: config.full_response,
            tech_error_only: config.tech_error_only,
            binary: config.binary,
            payload: config.payload.clone(),
            form_data: config.form_data.clone(),
        })
    }

    /// Call options for this route against `destination_name`.
    pub fn call_options(&self, destination_name: &str) -> CallOptions {
        CallOptions {
            url: self.target.clone(),
            destination_name: destination_name.to_string(),
            http_verb: self.verb.as_str().to_string(),
            content_type: self.content_type.clone(),
            full_response: self.full_response,
            tech_error_only: self.tech_error_only,
            binary: self.binary,
            payload: self.payload.clone(),
            form_data: self.form_data.clone(),
        }
    }
}

/// Relay routes keyed by inbound path.
#[derive(Debug, Default)]
pub struct RelayRouter {
    routes: HashMap<String, RelayRoute>,
}

impl RelayRouter {
    /// Compile the configured routes. Later duplicates replace earlier ones;
    /// config validation rejects them before this point.
    pub fn from_config(configs: &[RelayRouteConfig]) -> RelayResult<Self> {
        let mut routes = HashMap::with_capacity(configs.len());
        for config in configs {
            let route = RelayRoute::compile(config)?;
            routes.insert(route.path.clone(), route);
        }
        Ok(Self { routes })
    }

    pub fn lookup(&self, path: &str) -> Option<&RelayRoute> {
        self.routes.get(path)
    }

    pub fn routes(&self) -> impl Iterator<Item = &RelayRoute> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
