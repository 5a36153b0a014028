//! Multi-tenant destination relay.
//!
//! Relays authenticated inbound requests to the destination of the caller's
//! tenant: OAuth2 client-credentials tokens for the destination and
//! connectivity services, destination lookup, then the outbound call through
//! the connectivity proxy.

pub mod config;
pub mod destination;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;

pub use config::schema::RelayConfig;
pub use destination::{CallOptions, DestinationClient};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
