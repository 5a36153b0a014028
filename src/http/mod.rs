//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, layers)
//!     → request.rs (x-request-id)
//!     → middleware/jwt.rs (bearer JWT → AuthContext, relay routes only)
//!     → relay handler (routing → DestinationClient::call_destination)
//!     → response.rs (render result or failure as HTML)
//!     → Send to client
//! ```

pub mod middleware;
pub mod request;
pub mod response;
pub mod server;

pub use middleware::AuthContext;
pub use request::X_REQUEST_ID;
pub use server::{AppState, HttpServer, ServerError};
