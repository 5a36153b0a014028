//! Executes a [`ProxyRequestDescriptor`] against the network.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::{multipart, Method, Proxy};

use crate::destination::request::PROXY_AUTHORIZATION;
use crate::destination::types::{
    BoxError, HttpVerb, ProxyRequestDescriptor, RelayBody, RelayError, RelayPayload, RelayResult,
    RequestBody, ResponseEncoding, StatusError,
};

/// Sends a built request and shapes the target's answer.
#[async_trait]
pub trait RelayExecutor: Send + Sync {
    async fn execute(&self, descriptor: ProxyRequestDescriptor) -> RelayResult<RelayPayload>;
}

/// Executor backed by `reqwest`.
///
/// Proxy settings are per client in `reqwest`. Plain-HTTP targets behind a
/// proxy share one cached client per proxy URL and carry the proxy token as a
/// request header. HTTPS targets tunnel through CONNECT, so the token has to
/// live on the proxy itself and those clients are built per call.
#[derive(Debug, Clone)]
pub struct HttpRelayExecutor {
    direct: reqwest::Client,
    forwarding: Arc<DashMap<String, reqwest::Client>>,
    connect_timeout: Duration,
}

/// How a descriptor reaches its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hop<'a> {
    Direct,
    /// Absolute-form request to the proxy; the proxy sees every header.
    Forward(&'a str),
    /// CONNECT tunnel; headers travel end to end to the target.
    Tunnel(&'a str),
}

fn hop_for(descriptor: &ProxyRequestDescriptor) -> Hop<'_> {
    match &descriptor.proxy {
        None => Hop::Direct,
        Some(proxy) if descriptor.url.starts_with("http://") => Hop::Forward(proxy),
        Some(proxy) => Hop::Tunnel(proxy),
    }
}

/// Whether a descriptor header goes out on the request itself.
///
/// `Proxy-Authorization` is only meant for the proxy, which sees request
/// headers on forwarded calls alone.
fn sends_header(name: &str, hop: Hop<'_>) -> bool {
    !name.eq_ignore_ascii_case(PROXY_AUTHORIZATION) || matches!(hop, Hop::Forward(_))
}

impl HttpRelayExecutor {
    pub fn new(connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let direct = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .no_proxy()
            .build()?;
        Ok(Self {
            direct,
            forwarding: Arc::new(DashMap::new()),
            connect_timeout,
        })
    }

    fn proxied(&self, proxy: Proxy) -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .proxy(proxy)
            .build()
    }

    fn client_for(&self, descriptor: &ProxyRequestDescriptor) -> Result<reqwest::Client, BoxError> {
        match hop_for(descriptor) {
            Hop::Direct => Ok(self.direct.clone()),
            Hop::Forward(proxy_url) => {
                if let Some(client) = self.forwarding.get(proxy_url) {
                    return Ok(client.value().clone());
                }
                let client = self.proxied(Proxy::all(proxy_url)?)?;
                self.forwarding.insert(proxy_url.to_string(), client.clone());
                Ok(client)
            }
            Hop::Tunnel(proxy_url) => {
                let mut proxy = Proxy::all(proxy_url)?;
                if let Some(value) = descriptor.headers.get(PROXY_AUTHORIZATION) {
                    proxy = proxy.custom_http_auth(HeaderValue::from_str(value)?);
                }
                Ok(self.proxied(proxy)?)
            }
        }
    }
}

fn method_of(verb: HttpVerb) -> Method {
    match verb {
        HttpVerb::Get => Method::GET,
        HttpVerb::Post => Method::POST,
        HttpVerb::Patch => Method::PATCH,
        HttpVerb::Put => Method::PUT,
        HttpVerb::Delete => Method::DELETE,
        HttpVerb::Head => Method::HEAD,
        HttpVerb::Options => Method::OPTIONS,
    }
}

fn to_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

#[async_trait]
impl RelayExecutor for HttpRelayExecutor {
    async fn execute(&self, descriptor: ProxyRequestDescriptor) -> RelayResult<RelayPayload> {
        let url = descriptor.url.clone();
        let fail = |source: BoxError| RelayError::Relay {
            url: url.clone(),
            source,
        };

        let client = self.client_for(&descriptor).map_err(fail)?;
        let hop = hop_for(&descriptor);

        let mut request = client.request(method_of(descriptor.method), &descriptor.url);
        for (name, value) in descriptor.headers.iter().filter(|(name, _)| sends_header(name, hop)) {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| fail(Box::new(e)))?;
            let value = HeaderValue::from_str(value).map_err(|e| fail(Box::new(e)))?;
            request = request.header(name, value);
        }

        request = match descriptor.body {
            Some(RequestBody::Json(value)) => request.json(&value),
            Some(RequestBody::Form(fields)) => {
                let form = fields
                    .into_iter()
                    .fold(multipart::Form::new(), |form, (name, value)| form.text(name, value));
                request.multipart(form)
            }
            None => request,
        };

        tracing::debug!(
            method = %descriptor.method,
            url = %descriptor.url,
            proxied = descriptor.proxy.is_some(),
            "Calling destination"
        );

        let response = request.send().await.map_err(|e| fail(Box::new(e)))?;

        let status = response.status();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let bytes = response.bytes().await.map_err(|e| fail(Box::new(e)))?;

        if !status.is_success() && !descriptor.tech_error_only {
            return Err(fail(Box::new(StatusError {
                status: status.as_u16(),
                body: to_text(&bytes),
            })));
        }

        let body = match descriptor.encoding {
            ResponseEncoding::Binary => RelayBody::Binary(bytes.to_vec()),
            ResponseEncoding::Text => RelayBody::Text(to_text(&bytes)),
        };

        if descriptor.full_response {
            Ok(RelayPayload::Full {
                status: status.as_u16(),
                headers,
                body,
            })
        } else {
            Ok(RelayPayload::Body(body))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::request::{AUTHORIZATION, CONTENT_TYPE};
    use wiremock::matchers::{body_json, header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn descriptor(url: String, method: HttpVerb) -> ProxyRequestDescriptor {
        ProxyRequestDescriptor {
            method,
            url,
            headers: BTreeMap::new(),
            body: None,
            proxy: None,
            encoding: ResponseEncoding::Text,
            full_response: false,
            tech_error_only: false,
        }
    }

    fn executor() -> HttpRelayExecutor {
        HttpRelayExecutor::new(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_get_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sap/opu/odata/OpportunityHeaderSet"))
            .and(header("Authorization", "Basic abc"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"d\":{\"results\":[]}}"))
            .mount(&server)
            .await;

        let mut d = descriptor(format!("{}/sap/opu/odata/OpportunityHeaderSet", server.uri()), HttpVerb::Get);
        d.headers.insert(AUTHORIZATION.into(), "Basic abc".into());
        d.headers.insert(CONTENT_TYPE.into(), "application/json".into());

        let payload = executor().execute(d).await.unwrap();
        assert_eq!(payload, RelayPayload::Body(RelayBody::Text("{\"d\":{\"results\":[]}}".into())));
    }

    #[tokio::test]
    async fn test_json_body_is_sent() {
        let server = MockServer::start().await;
        let body = serde_json::json!({"Status": "Won"});
        Mock::given(method("PATCH"))
            .and(path("/entity"))
            .and(body_json(&body))
            .and(header("Content-Type", "application/json"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let mut d = descriptor(format!("{}/entity", server.uri()), HttpVerb::Patch);
        d.headers.insert(CONTENT_TYPE.into(), "application/json".into());
        d.body = Some(RequestBody::Json(body.clone()));

        let payload = executor().execute(d).await.unwrap();
        assert_eq!(payload, RelayPayload::Body(RelayBody::Text(String::new())));
    }

    #[tokio::test]
    async fn test_form_body_is_multipart() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/upload"))
            .and(header_exists("content-type"))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .expect(1)
            .mount(&server)
            .await;

        let mut d = descriptor(format!("{}/upload", server.uri()), HttpVerb::Post);
        d.body = Some(RequestBody::Form(BTreeMap::from([("name".to_string(), "x".to_string())])));

        executor().execute(d).await.unwrap();

        let received = server.received_requests().await.unwrap();
        let content_type = received[0].headers.get("content-type").unwrap().to_str().unwrap();
        assert!(content_type.starts_with("multipart/form-data"));
    }

    #[tokio::test]
    async fn test_error_status_rejected_unless_tech_error_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Resource not found"))
            .mount(&server)
            .await;

        let url = format!("{}/missing", server.uri());
        let err = executor().execute(descriptor(url.clone(), HttpVerb::Get)).await.unwrap_err();
        assert_eq!(err.kind(), "relay");
        assert_eq!(err.cause(), "upstream responded with status 404: Resource not found");

        let mut d = descriptor(url, HttpVerb::Get);
        d.tech_error_only = true;
        d.full_response = true;
        match executor().execute(d).await.unwrap() {
            RelayPayload::Full { status, body, .. } => {
                assert_eq!(status, 404);
                assert_eq!(body, RelayBody::Text("Resource not found".into()));
            }
            other => panic!("expected full response, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transport_error_with_tech_error_only() {
        let mut d = descriptor("http://127.0.0.1:1/x".into(), HttpVerb::Get);
        d.tech_error_only = true;
        let err = executor().execute(d).await.unwrap_err();
        assert!(matches!(err, RelayError::Relay { .. }));
    }

    #[tokio::test]
    async fn test_binary_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8, 159, 146, 150]))
            .mount(&server)
            .await;

        let mut d = descriptor(format!("{}/file", server.uri()), HttpVerb::Get);
        d.encoding = ResponseEncoding::Binary;
        let payload = executor().execute(d).await.unwrap();
        assert_eq!(payload, RelayPayload::Body(RelayBody::Binary(vec![0, 159, 146, 150])));
    }

    #[tokio::test]
    async fn test_request_routed_through_proxy() {
        // The mock stands in for the connectivity proxy: a plain-HTTP target is
        // requested in absolute form from the proxy itself.
        let proxy = MockServer::start().await;
        Mock::given(method("GET"))
            .and(header("Proxy-Authorization", "Bearer proxy-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string("via proxy"))
            .expect(1)
            .mount(&proxy)
            .await;

        let mut d = descriptor("http://backend.onprem.invalid:44311/odata".into(), HttpVerb::Get);
        d.headers.insert(PROXY_AUTHORIZATION.into(), "Bearer proxy-token".into());
        d.proxy = Some(proxy.uri());

        let payload = executor().execute(d).await.unwrap();
        assert_eq!(payload, RelayPayload::Body(RelayBody::Text("via proxy".into())));

        let received = proxy.received_requests().await.unwrap();
        assert_eq!(received[0].headers.get_all("proxy-authorization").iter().count(), 1);
    }

    #[tokio::test]
    async fn test_direct_call_drops_proxy_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let mut d = descriptor(format!("{}/odata", server.uri()), HttpVerb::Get);
        d.headers.insert(PROXY_AUTHORIZATION.into(), "Bearer proxy-token".into());
        d.headers.insert(AUTHORIZATION.into(), "Basic abc".into());

        executor().execute(d).await.unwrap();

        let received = server.received_requests().await.unwrap();
        assert!(received[0].headers.get("proxy-authorization").is_none());
        assert_eq!(received[0].headers.get("authorization").unwrap(), "Basic abc");
    }

    #[test]
    fn test_tunnelled_target_never_sees_proxy_authorization() {
        let mut d = descriptor("https://backend.example.com/odata".into(), HttpVerb::Get);
        d.proxy = Some("http://proxy.internal:20003".into());

        let hop = hop_for(&d);
        assert_eq!(hop, Hop::Tunnel("http://proxy.internal:20003"));
        assert!(!sends_header(PROXY_AUTHORIZATION, hop));
        assert!(!sends_header("proxy-authorization", hop));
        assert!(sends_header(AUTHORIZATION, hop));

        d.url = "http://backend.onprem.invalid:44311/odata".into();
        assert!(sends_header(PROXY_AUTHORIZATION, hop_for(&d)));
        d.proxy = None;
        assert!(!sends_header(PROXY_AUTHORIZATION, hop_for(&d)));
    }

    #[tokio::test]
    async fn test_forwarding_client_cached_per_proxy() {
        let proxy = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("via proxy"))
            .expect(2)
            .mount(&proxy)
            .await;

        let executor = executor();
        for token in ["Bearer first", "Bearer second"] {
            let mut d = descriptor("http://backend.onprem.invalid:44311/odata".into(), HttpVerb::Get);
            d.headers.insert(PROXY_AUTHORIZATION.into(), token.into());
            d.proxy = Some(proxy.uri());
            executor.clone().execute(d).await.unwrap();
        }

        assert_eq!(executor.forwarding.len(), 1);
        let received = proxy.received_requests().await.unwrap();
        assert_eq!(received[0].headers.get("proxy-authorization").unwrap(), "Bearer first");
        assert_eq!(received[1].headers.get("proxy-authorization").unwrap(), "Bearer second");
    }
}
