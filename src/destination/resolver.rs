//! Destination lookup against the platform's destination service.

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;

use crate::destination::types::{
    AuthToken, BoxError, DestinationConfig, RelayError, RelayResult, RuntimeMode, StatusError,
};

/// Path of the destination REST API below the service URI.
pub const DESTINATIONS_API_PATH: &str = "/destination-configuration/v1/destinations";

/// Fetches a named destination's configuration.
#[async_trait]
pub trait DestinationResolver: Send + Sync {
    async fn resolve(
        &self,
        destination_name: &str,
        destination_api_base_url: &str,
        token: &str,
    ) -> RelayResult<DestinationConfig>;
}

/// Wire shape of a destination lookup response.
#[derive(Debug, Deserialize)]
struct DestinationDocument {
    #[serde(rename = "destinationConfiguration")]
    configuration: DestinationConfiguration,
    #[serde(rename = "authTokens", default)]
    auth_tokens: Vec<AuthToken>,
}

#[derive(Debug, Deserialize)]
struct DestinationConfiguration {
    #[serde(rename = "URL")]
    url: String,
    #[serde(rename = "Name", default)]
    name: Option<String>,
    #[serde(rename = "ProxyType", default)]
    proxy_type: Option<String>,
    #[serde(rename = "Authentication", default)]
    authentication: Option<String>,
}

/// Resolver calling `GET {api}/{name}` with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpDestinationResolver {
    http_client: reqwest::Client,
    mode: RuntimeMode,
}

impl HttpDestinationResolver {
    pub fn new(http_client: reqwest::Client, mode: RuntimeMode) -> Self {
        Self { http_client, mode }
    }
}

#[async_trait]
impl DestinationResolver for HttpDestinationResolver {
    async fn resolve(
        &self,
        destination_name: &str,
        destination_api_base_url: &str,
        token: &str,
    ) -> RelayResult<DestinationConfig> {
        if self.mode.is_local() {
            // The name stands in for the target URL when offline.
            return Ok(DestinationConfig::unauthenticated(destination_name));
        }

        let fail = |source: BoxError| RelayError::Resolution {
            name: destination_name.to_string(),
            source,
        };

        let url = format!(
            "{}/{}",
            destination_api_base_url.trim_end_matches('/'),
            destination_name
        );

        let response = self
            .http_client
            .get(&url)
            .header(AUTHORIZATION, format!("Bearer {}", token))
            .send()
            .await
            .map_err(|e| fail(Box::new(e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(|e| fail(Box::new(e)))?;
            return Err(fail(Box::new(StatusError {
                status: status.as_u16(),
                body,
            })));
        }

        let document: DestinationDocument = response.json().await.map_err(|e| fail(Box::new(e)))?;

        tracing::debug!(
            destination = %destination_name,
            name = ?document.configuration.name,
            proxy_type = ?document.configuration.proxy_type,
            authentication = ?document.configuration.authentication,
            auth_tokens = document.auth_tokens.len(),
            "Destination resolved"
        );

        Ok(DestinationConfig {
            target_base_url: document.configuration.url,
            auth_tokens: document.auth_tokens,
        })
    }
}
