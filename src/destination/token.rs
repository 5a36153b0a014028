//! OAuth2 client-credentials token acquisition.
//!
//! Every call performs a fresh exchange: tokens are neither cached nor
//! tracked for expiry, so callers must not assume reuse.

use async_trait::async_trait;
use oauth2::basic::BasicClient;
use oauth2::{AuthUrl, ClientId, ClientSecret, TokenResponse, TokenUrl};

use crate::destination::types::{
    BoxError, Credentials, RelayError, RelayResult, RuntimeMode, ServiceKind,
};

/// Exchanges client credentials for a bearer token.
#[async_trait]
pub trait TokenAcquirer: Send + Sync {
    /// Get an access token for `service` using `credentials`.
    async fn acquire_token(
        &self,
        service: ServiceKind,
        credentials: &Credentials,
    ) -> RelayResult<String>;
}

/// Token acquirer backed by the platform's OAuth server.
#[derive(Debug, Clone)]
pub struct OAuthTokenAcquirer {
    http_client: reqwest::Client,
    mode: RuntimeMode,
}

impl OAuthTokenAcquirer {
    /// `http_client` must not follow redirects (token endpoints answer directly).
    pub fn new(http_client: reqwest::Client, mode: RuntimeMode) -> Self {
        Self { http_client, mode }
    }
}

#[async_trait]
impl TokenAcquirer for OAuthTokenAcquirer {
    async fn acquire_token(
        &self,
        service: ServiceKind,
        credentials: &Credentials,
    ) -> RelayResult<String> {
        if self.mode.is_local() {
            return Ok(service.local_token().to_string());
        }

        let auth_err = |source: BoxError| RelayError::Auth { service, source };

        let base = credentials.token_base_url.trim_end_matches('/');
        let auth_url = AuthUrl::new(format!("{}/oauth/authorize", base))
            .map_err(|e| auth_err(Box::new(e)))?;
        let token_url = TokenUrl::new(format!("{}/oauth/token", base))
            .map_err(|e| auth_err(Box::new(e)))?;

        tracing::debug!(service = %service, token_url = %token_url.url(), "Requesting access token");

        let client = BasicClient::new(ClientId::new(credentials.client_id.clone()))
            .set_client_secret(ClientSecret::new(credentials.client_secret.clone()))
            .set_auth_uri(auth_url)
            .set_token_uri(token_url);

        let response = client
            .exchange_client_credentials()
            .request_async(&self.http_client)
            .await
            .map_err(|e| {
                tracing::warn!(service = %service, error = %e, "Token exchange failed");
                auth_err(Box::new(e))
            })?;

        Ok(response.access_token().secret().clone())
    }
}
