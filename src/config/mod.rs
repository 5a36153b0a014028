//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse, then PORT / RELAY_LOCAL / Destination_Mapping overrides)
//!     → validation.rs (semantic checks)
//!     → RelayConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps the tenant table atomically
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the tenant table is hot-swapped
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    AuthConfig, LogFormat, ObservabilityConfig, RelayConfig, RelayRouteConfig, TenantMapping,
};
pub use validation::ValidationError;
