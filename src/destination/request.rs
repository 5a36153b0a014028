//! Proxy request builder.
//!
//! Turns a resolved destination plus call options into a
//! [`ProxyRequestDescriptor`]. Pure: no I/O happens here, the executor in
//! `relay.rs` sends what this module describes.
//!
//! # Header rules
//! - Outside local mode: `Proxy-Authorization: Bearer <token>` and the proxy URL
//! - First destination auth token, if any, becomes `Authorization`
//! - `Content-Type` only for GET/HEAD and JSON bodies

use std::collections::BTreeMap;

use serde_json::Value;

use crate::destination::types::{
    DestinationConfig, HttpVerb, ProxyRequestDescriptor, RequestBody, ResponseEncoding,
    RuntimeMode, DEFAULT_CONTENT_TYPE,
};

pub const AUTHORIZATION: &str = "Authorization";
pub const PROXY_AUTHORIZATION: &str = "Proxy-Authorization";
pub const CONTENT_TYPE: &str = "Content-Type";

/// Everything the builder needs for one outbound call.
#[derive(Debug, Clone)]
pub struct ProxyRequestInputs<'a> {
    /// Path relative to the destination's base URL, with leading slash.
    pub path: &'a str,
    pub destination: &'a DestinationConfig,
    /// On-premise proxy, e.g. `http://10.0.1.23:20003`.
    pub proxy_url: Option<&'a str>,
    pub proxy_access_token: &'a str,
    pub verb: HttpVerb,
    pub content_type: Option<&'a str>,
    pub payload: Option<&'a Value>,
    pub form_data: Option<&'a BTreeMap<String, String>>,
    pub full_response: bool,
    pub tech_error_only: bool,
    pub binary: bool,
    pub mode: RuntimeMode,
}

/// Build the outbound request description.
pub fn build(inputs: ProxyRequestInputs<'_>) -> ProxyRequestDescriptor {
    let content_type = inputs.content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
    let mut headers = BTreeMap::new();
    let mut proxy = None;

    if !inputs.mode.is_local() {
        headers.insert(
            PROXY_AUTHORIZATION.to_string(),
            format!("Bearer {}", inputs.proxy_access_token),
        );
        proxy = inputs.proxy_url.map(str::to_string);
    }

    if let Some(token) = inputs.destination.auth_tokens.first() {
        headers.insert(AUTHORIZATION.to_string(), token.header_value());
    }

    let json_body = || inputs.payload.cloned().map(RequestBody::Json);

    let body = match inputs.verb {
        HttpVerb::Get | HttpVerb::Head => {
            headers.insert(CONTENT_TYPE.to_string(), content_type.to_string());
            None
        }
        HttpVerb::Options | HttpVerb::Delete => None,
        HttpVerb::Post => match inputs.form_data {
            Some(form) => Some(RequestBody::Form(form.clone())),
            None => {
                headers.insert(CONTENT_TYPE.to_string(), content_type.to_string());
                json_body()
            }
        },
        HttpVerb::Put | HttpVerb::Patch => {
            headers.insert(CONTENT_TYPE.to_string(), content_type.to_string());
            json_body()
        }
    };

    ProxyRequestDescriptor {
        method: inputs.verb,
        url: format!("{}{}", inputs.destination.target_base_url, inputs.path),
        headers,
        body,
        proxy,
        encoding: if inputs.binary {
            ResponseEncoding::Binary
        } else {
            ResponseEncoding::Text
        },
        full_response: inputs.full_response,
        tech_error_only: inputs.tech_error_only,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::types::AuthToken;
    use serde_json::json;

    fn api() -> DestinationConfig {
        DestinationConfig::unauthenticated("http://api")
    }

    fn inputs<'a>(destination: &'a DestinationConfig, verb: HttpVerb) -> ProxyRequestInputs<'a> {
        ProxyRequestInputs {
            path: "/x",
            destination,
            proxy_url: Some("http://proxy:20003"),
            proxy_access_token: "T",
            verb,
            content_type: None,
            payload: None,
            form_data: None,
            full_response: false,
            tech_error_only: false,
            binary: false,
            mode: RuntimeMode::Cloud,
        }
    }

    #[test]
    fn test_get_in_cloud_mode() {
        let dest = api();
        let descriptor = build(inputs(&dest, HttpVerb::Get));

        assert_eq!(descriptor.url, "http://api/x");
        assert_eq!(descriptor.method, HttpVerb::Get);
        assert_eq!(
            descriptor.headers,
            BTreeMap::from([
                ("Content-Type".to_string(), "application/json".to_string()),
                ("Proxy-Authorization".to_string(), "Bearer T".to_string()),
            ])
        );
        assert_eq!(descriptor.proxy.as_deref(), Some("http://proxy:20003"));
        assert_eq!(descriptor.body, None);
        assert_eq!(descriptor.encoding, ResponseEncoding::Text);
    }

    #[test]
    fn test_get_in_local_mode() {
        let dest = api();
        let mut local = inputs(&dest, HttpVerb::Get);
        local.mode = RuntimeMode::Local;
        let descriptor = build(local);

        assert_eq!(descriptor.url, "http://api/x");
        assert_eq!(descriptor.method, HttpVerb::Get);
        assert!(!descriptor.headers.contains_key(PROXY_AUTHORIZATION));
        assert_eq!(descriptor.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(descriptor.proxy, None);
    }

    #[test]
    fn test_bodyless_verbs() {
        let dest = api();
        let payload = json!({"ignored": true});
        for verb in [HttpVerb::Get, HttpVerb::Head, HttpVerb::Options, HttpVerb::Delete] {
            let mut i = inputs(&dest, verb);
            i.payload = Some(&payload);
            let descriptor = build(i);
            assert_eq!(descriptor.body, None, "{} must not carry a body", verb);
        }
    }

    #[test]
    fn test_options_and_delete_have_no_content_type() {
        let dest = api();
        for verb in [HttpVerb::Options, HttpVerb::Delete] {
            let descriptor = build(inputs(&dest, verb));
            assert!(!descriptor.headers.contains_key(CONTENT_TYPE));
            assert_eq!(descriptor.method, verb);
        }
    }

    #[test]
    fn test_put_and_patch_always_send_json() {
        let dest = api();
        let payload = json!({"Status": "Won"});
        let form = BTreeMap::from([("field".to_string(), "value".to_string())]);
        for verb in [HttpVerb::Put, HttpVerb::Patch] {
            let mut i = inputs(&dest, verb);
            i.payload = Some(&payload);
            i.form_data = Some(&form);
            let descriptor = build(i);
            assert_eq!(descriptor.body, Some(RequestBody::Json(payload.clone())));
            assert_eq!(descriptor.headers.get(CONTENT_TYPE).unwrap(), "application/json");
        }
    }

    #[test]
    fn test_post_with_form_data_uses_form_encoding() {
        let dest = api();
        let payload = json!({"a": 1});
        let form = BTreeMap::from([("name".to_string(), "x".to_string())]);
        let mut i = inputs(&dest, HttpVerb::Post);
        i.payload = Some(&payload);
        i.form_data = Some(&form);
        let descriptor = build(i);

        assert_eq!(descriptor.body, Some(RequestBody::Form(form)));
        assert!(!descriptor.headers.contains_key(CONTENT_TYPE));
    }

    #[test]
    fn test_post_json_with_custom_content_type() {
        let dest = api();
        let payload = json!({"a": 1});
        let mut i = inputs(&dest, HttpVerb::Post);
        i.payload = Some(&payload);
        i.content_type = Some("application/merge-patch+json");
        let descriptor = build(i);

        assert_eq!(descriptor.body, Some(RequestBody::Json(payload)));
        assert_eq!(
            descriptor.headers.get(CONTENT_TYPE).unwrap(),
            "application/merge-patch+json"
        );
    }

    #[test]
    fn test_first_destination_token_sets_authorization() {
        let dest = DestinationConfig {
            target_base_url: "http://api".into(),
            auth_tokens: vec![
                AuthToken { token_type: "Basic".into(), value: "abc".into() },
                AuthToken { token_type: "Bearer".into(), value: "ignored".into() },
            ],
        };
        for verb in HttpVerb::ALL {
            let descriptor = build(inputs(&dest, verb));
            assert_eq!(descriptor.headers.get(AUTHORIZATION).unwrap(), "Basic abc");
            assert_eq!(descriptor.headers.get(PROXY_AUTHORIZATION).unwrap(), "Bearer T");
        }
    }

    #[test]
    fn test_no_authorization_without_destination_tokens() {
        let dest = api();
        let descriptor = build(inputs(&dest, HttpVerb::Get));
        assert!(!descriptor.headers.contains_key(AUTHORIZATION));
    }

    #[test]
    fn test_flags_carry_through() {
        let dest = api();
        let mut i = inputs(&dest, HttpVerb::Get);
        i.binary = true;
        i.full_response = true;
        i.tech_error_only = true;
        let descriptor = build(i);

        assert_eq!(descriptor.encoding, ResponseEncoding::Binary);
        assert!(descriptor.full_response);
        assert!(descriptor.tech_error_only);
    }
}
