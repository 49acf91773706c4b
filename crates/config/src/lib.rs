//! Config schema and file discovery for the gateway.

pub mod loader;
pub mod schema;

pub use loader::{clear_config_dir, discover_and_load, load_config, set_config_dir};
pub use schema::{GatewaySection, HuddleConfig, StoreSection};
