//! Relay-flow types and error definitions.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Boxed error carried as the cause of a [`RelayError`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias for relay-flow operations.
pub type RelayResult<T> = Result<T, RelayError>;

/// Default `Content-Type` for destination calls.
pub const DEFAULT_CONTENT_TYPE: &str = "application/json";

/// Whether network-dependent steps run for real or use stand-in values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Offline development: fixed tokens, synthesized destinations, no proxy.
    Local,
    /// Running on the platform with live service bindings.
    Cloud,
}

impl RuntimeMode {
    pub fn is_local(self) -> bool {
        matches!(self, RuntimeMode::Local)
    }
}

/// Which platform service a token is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceKind {
    Destination,
    Connectivity,
}

impl ServiceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceKind::Destination => "destination",
            ServiceKind::Connectivity => "connectivity",
        }
    }

    /// Stand-in token handed out in local mode.
    pub fn local_token(self) -> &'static str {
        match self {
            ServiceKind::Destination => "mockLocalAccessToken",
            ServiceKind::Connectivity => "mockLocalProxyToken",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Client-credential pair plus the OAuth server emitting `/oauth/*` endpoints.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub token_base_url: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("token_base_url", &self.token_base_url)
            .finish()
    }
}

/// Credential embedded in a destination by the platform (e.g. `Basic ...`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthToken {
    #[serde(rename = "type")]
    pub token_type: String,
    pub value: String,
}

impl AuthToken {
    /// Value for an `Authorization` header.
    pub fn header_value(&self) -> String {
        format!("{} {}", self.token_type, self.value)
    }
}

/// Resolved destination: where to send the call and how to authenticate it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationConfig {
    pub target_base_url: String,
    pub auth_tokens: Vec<AuthToken>,
}

impl DestinationConfig {
    /// Destination with no embedded credentials.
    pub fn unauthenticated(target_base_url: impl Into<String>) -> Self {
        Self {
            target_base_url: target_base_url.into(),
            auth_tokens: Vec::new(),
        }
    }
}

/// The HTTP verbs a destination call may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpVerb {
    Get,
    Post,
    Patch,
    Put,
    Delete,
    Head,
    Options,
}

impl HttpVerb {
    pub const ALL: [HttpVerb; 7] = [
        HttpVerb::Get,
        HttpVerb::Post,
        HttpVerb::Patch,
        HttpVerb::Put,
        HttpVerb::Delete,
        HttpVerb::Head,
        HttpVerb::Options,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Head => "HEAD",
            HttpVerb::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpVerb {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        HttpVerb::ALL
            .into_iter()
            .find(|verb| verb.as_str() == s)
            .ok_or_else(|| RelayError::Validation {
                message: format!(
                    "unknown http method: {}; allowed values: {}",
                    s,
                    HttpVerb::ALL.map(HttpVerb::as_str).join(", ")
                ),
            })
    }
}

/// How the target's response body is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseEncoding {
    #[default]
    Text,
    Binary,
}

/// Outbound request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum RequestBody {
    /// Serialized as JSON.
    Json(serde_json::Value),
    /// Submitted as a multipart form; the transport sets the content type.
    Form(BTreeMap<String, String>),
}

/// Fully built description of the outbound call. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProxyRequestDescriptor {
    pub method: HttpVerb,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,
    pub encoding: ResponseEncoding,
    pub full_response: bool,
    pub tech_error_only: bool,
}

/// Body returned by the target system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RelayBody {
    Text(String),
    Binary(Vec<u8>),
}

/// What the relay hands back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RelayPayload {
    /// Only the body (default).
    Body(RelayBody),
    /// Status, headers and body of the target's response.
    Full {
        #[serde(rename = "statusCode")]
        status: u16,
        headers: BTreeMap<String, String>,
        body: RelayBody,
    },
}

/// Non-2xx answer from an upstream service.
#[derive(Debug, Error)]
#[error("upstream responded with status {status}: {body}")]
pub struct StatusError {
    pub status: u16,
    pub body: String,
}

/// Failure of one stage of the relay flow.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Token exchange with the OAuth server failed.
    #[error("failed to get access token for {service} service")]
    Auth {
        service: ServiceKind,
        #[source]
        source: BoxError,
    },

    /// Destination lookup failed.
    #[error("failed to resolve destination '{name}'")]
    Resolution {
        name: String,
        #[source]
        source: BoxError,
    },

    /// Outbound call failed, or returned non-2xx outside tech-error-only mode.
    #[error("call via destination to {url} failed")]
    Relay {
        url: String,
        #[source]
        source: BoxError,
    },

    /// Request parameters rejected before any network action.
    #[error("{message}")]
    Validation { message: String },
}

impl RelayError {
    /// Short stage label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayError::Auth { .. } => "auth",
            RelayError::Resolution { .. } => "resolution",
            RelayError::Relay { .. } => "relay",
            RelayError::Validation { .. } => "validation",
        }
    }

    /// The underlying error chain rendered as one line.
    pub fn cause(&self) -> String {
        let mut parts = Vec::new();
        let mut current = std::error::Error::source(self);
        while let Some(err) = current {
            parts.push(err.to_string());
            current = err.source();
        }
        parts.join(": ")
    }
}
