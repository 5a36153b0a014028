//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use destination_relay::config::RelayConfig;
use destination_relay::http::HttpServer;
use destination_relay::lifecycle::Shutdown;
use destination_relay::DestinationClient;
use jsonwebtoken::{encode, EncodingKey, Header};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

pub const TEST_SECRET: &str = "integration-test-secret";
pub const ODATA_SERVICE: &str = "/sap/opu/odata/sap/ZSA_OPPORTUNITY_ODATA_SRV";
pub const ODATA_TARGET: &str = "/sap/opu/odata/sap/ZSA_OPPORTUNITY_ODATA_SRV/OpportunityHeaderSet";

/// A relay serving on an ephemeral port.
pub struct TestRelay {
    pub addr: SocketAddr,
    pub shutdown: Shutdown,
    pub config_updates: mpsc::UnboundedSender<RelayConfig>,
}

impl TestRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for TestRelay {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Local mode, auth disabled, default relay routes.
pub fn local_config() -> RelayConfig {
    let mut config = RelayConfig::default();
    config.runtime.local = Some(true);
    config.listener.bind_address = "127.0.0.1:0".into();
    config
}

/// Enable HS256 bearer auth with [`TEST_SECRET`].
pub fn with_auth(mut config: RelayConfig) -> RelayConfig {
    config.auth.enabled = true;
    config.auth.algorithm = "HS256".into();
    config.auth.hmac_secret = Some(TEST_SECRET.into());
    config
}

pub async fn start_relay(config: RelayConfig) -> TestRelay {
    let server = HttpServer::new(config).unwrap();
    serve(server).await
}

pub async fn start_relay_with_client(config: RelayConfig, client: DestinationClient) -> TestRelay {
    let server = HttpServer::with_client(config, client).unwrap();
    serve(server).await
}

async fn serve(server: HttpServer) -> TestRelay {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    TestRelay {
        addr,
        shutdown,
        config_updates,
    }
}

pub fn http_client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

/// HS256 token for identity zone `zid`, valid for ten minutes.
pub fn bearer(zid: &str) -> String {
    let claims = serde_json::json!({
        "zid": zid,
        "sub": "user@example.com",
        "exp": jsonwebtoken::get_current_timestamp() + 600,
    });
    encode(&Header::default(), &claims, &EncodingKey::from_secret(TEST_SECRET.as_bytes())).unwrap()
}
