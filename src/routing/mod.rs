//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound relay request (matched path, tenant zone from the JWT)
//!     → routes.rs (path → target path + call options)
//!     → tenant.rs (route override / tenant table / default → destination name)
//!     → CallOptions for DestinationClient::call_destination
//! ```
//!
//! # Design Decisions
//! - Route table compiled at startup, immutable at runtime
//! - Tenant table swapped atomically on config reload
//! - Exact path matching only

pub mod routes;
pub mod tenant;

pub use routes::{RelayRoute, RelayRouter};
pub use tenant::TenantMap;
