//! Inbound middleware.

pub mod jwt;

pub use jwt::{require_jwt, AuthContext, JwtValidator};
