//! SecAudit unified configuration layer.
//!
//! All environment variable reads live here; the engine and CLI consume
//! structured configs instead of calling `std::env::var` directly.
//!
//! - `loader`: env_or, env_optional, env_bool and `.env` loading
//! - `schema`: ObservabilityConfig, AuditConfig
//! - `env_keys`: key constants

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, load_dotenv};
pub use schema::{AuditConfig, ObservabilityConfig, DEFAULT_COLLECTOR_TIMEOUT_SECS};
