//! Destination relay subsystem.
//!
//! # Data Flow
//! ```text
//! CallOptions
//!     → token.rs (client-credentials token for the destination service)
//!     → resolver.rs (named destination → target URL + embedded auth)
//!     → token.rs (client-credentials token for the connectivity proxy)
//!     → request.rs (pure: build the outbound request descriptor)
//!     → relay.rs (send through the on-premise proxy, shape the answer)
//! ```
//!
//! `client.rs` drives the chain; every stage sits behind a trait so the
//! chain can run against fakes.
//!
//! # Local Mode
//! Tokens are fixed placeholders, the destination name doubles as the
//! target URL and no proxy is attached.

pub mod client;
pub mod relay;
pub mod request;
pub mod resolver;
pub mod token;
pub mod types;

pub use client::{CallOptions, DestinationClient, ServiceBindings};
pub use relay::{HttpRelayExecutor, RelayExecutor};
pub use request::{build, ProxyRequestInputs};
pub use resolver::{DestinationResolver, HttpDestinationResolver, DESTINATIONS_API_PATH};
pub use token::{OAuthTokenAcquirer, TokenAcquirer};
pub use types::{
    AuthToken, Credentials, DestinationConfig, HttpVerb, ProxyRequestDescriptor, RelayBody,
    RelayError, RelayPayload, RelayResult, RequestBody, ResponseEncoding, RuntimeMode,
    ServiceKind, StatusError,
};
