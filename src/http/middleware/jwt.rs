//! Bearer JWT authentication for relay routes.
//!
//! Signature, expiry and (optionally) audience are checked by `jsonwebtoken`.
//! The identity zone (`zid`) and subject of a valid token are attached to the
//! request as an [`AuthContext`] extension.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{header, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::config::AuthConfig;

/// Parse a configured algorithm name such as `RS256`.
pub fn parse_algorithm(name: &str) -> Option<Algorithm> {
    name.trim().parse().ok()
}

/// Why a validator could not be built from configuration.
#[derive(Debug, thiserror::Error)]
pub enum KeyError {
    #[error("auth.algorithm '{0}' is not supported")]
    Algorithm(String),

    #[error("auth.{0} is required for the configured algorithm")]
    Missing(&'static str),

    #[error("auth.verification_key is not a valid PEM key: {0}")]
    Pem(#[from] jsonwebtoken::errors::Error),
}

/// Identity of an authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthContext {
    /// Identity zone, i.e. the subscribing tenant.
    pub tenant: Option<String>,
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Claims {
    zid: Option<String>,
    sub: Option<String>,
}

/// Validates bearer tokens against a fixed key.
#[derive(Clone)]
pub struct JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl JwtValidator {
    pub fn from_config(config: &AuthConfig) -> Result<Self, KeyError> {
        let algorithm = parse_algorithm(&config.algorithm)
            .ok_or_else(|| KeyError::Algorithm(config.algorithm.clone()))?;

        let pem = || {
            config
                .verification_key
                .as_deref()
                .map(str::as_bytes)
                .ok_or(KeyError::Missing("verification_key"))
        };
        let key = match algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => {
                let secret = config
                    .hmac_secret
                    .as_deref()
                    .ok_or(KeyError::Missing("hmac_secret"))?;
                DecodingKey::from_secret(secret.as_bytes())
            }
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => DecodingKey::from_rsa_pem(pem()?)?,
            Algorithm::ES256 | Algorithm::ES384 => DecodingKey::from_ec_pem(pem()?)?,
            Algorithm::EdDSA => DecodingKey::from_ed_pem(pem()?)?,
            #[allow(unreachable_patterns)]
            _ => return Err(KeyError::Algorithm(config.algorithm.clone())),
        };

        let mut validation = Validation::new(algorithm);
        match &config.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        Ok(Self { key, validation })
    }

    pub fn validate(&self, token: &str) -> Result<AuthContext, jsonwebtoken::errors::Error> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(AuthContext {
            tenant: data.claims.zid,
            subject: data.claims.sub,
        })
    }
}

impl std::fmt::Debug for JwtValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtValidator")
            .field("algorithms", &self.validation.algorithms)
            .finish()
    }
}

fn bearer_token(request: &Request<Body>) -> Option<&str> {
    request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Rejects requests without a valid bearer JWT with `401`.
pub async fn require_jwt(
    State(validator): State<Arc<JwtValidator>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = bearer_token(&request) else {
        tracing::debug!(path = %request.uri().path(), "Missing bearer token");
        return (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    };

    match validator.validate(token) {
        Ok(context) => {
            request.extensions_mut().insert(context);
            next.run(request).await
        }
        Err(e) => {
            tracing::warn!(path = %request.uri().path(), error = %e, "Rejected bearer token");
            (StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "relay-test-secret";

    fn config(audience: Option<&str>) -> AuthConfig {
        AuthConfig {
            enabled: true,
            algorithm: "HS256".into(),
            hmac_secret: Some(SECRET.into()),
            audience: audience.map(String::from),
            ..Default::default()
        }
    }

    fn token(claims: serde_json::Value, secret: &str) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn exp() -> u64 {
        jsonwebtoken::get_current_timestamp() + 600
    }

    #[test]
    fn test_parse_algorithm() {
        assert_eq!(parse_algorithm("RS256"), Some(Algorithm::RS256));
        assert_eq!(parse_algorithm(" HS512 "), Some(Algorithm::HS512));
        assert_eq!(parse_algorithm("none"), None);
        assert_eq!(parse_algorithm("rs256"), None);
    }

    #[test]
    fn test_valid_token_exposes_zone_and_subject() {
        let validator = JwtValidator::from_config(&config(None)).unwrap();
        let jwt = token(json!({"zid": "tenant-a", "sub": "alice", "exp": exp()}), SECRET);

        let context = validator.validate(&jwt).unwrap();
        assert_eq!(context.tenant.as_deref(), Some("tenant-a"));
        assert_eq!(context.subject.as_deref(), Some("alice"));
    }

    #[test]
    fn test_rejects_bad_signature_and_expiry() {
        let validator = JwtValidator::from_config(&config(None)).unwrap();
        let forged = token(json!({"zid": "tenant-a", "exp": exp()}), "other-secret");
        assert!(validator.validate(&forged).is_err());

        let expired = token(json!({"zid": "tenant-a", "exp": 1_000}), SECRET);
        assert!(validator.validate(&expired).is_err());
    }

    #[test]
    fn test_audience_enforced_when_configured() {
        let validator = JwtValidator::from_config(&config(Some("relay"))).unwrap();
        let wrong = token(json!({"aud": "someone-else", "exp": exp()}), SECRET);
        assert!(validator.validate(&wrong).is_err());

        let right = token(json!({"aud": "relay", "exp": exp()}), SECRET);
        assert!(validator.validate(&right).is_ok());
    }

    #[test]
    fn test_key_errors() {
        let mut cfg = config(None);
        cfg.hmac_secret = None;
        assert!(matches!(JwtValidator::from_config(&cfg), Err(KeyError::Missing("hmac_secret"))));

        cfg.algorithm = "RS256".into();
        assert!(matches!(JwtValidator::from_config(&cfg), Err(KeyError::Missing("verification_key"))));

        cfg.verification_key = Some("not a pem".into());
        assert!(matches!(JwtValidator::from_config(&cfg), Err(KeyError::Pem(_))));
    }
}
