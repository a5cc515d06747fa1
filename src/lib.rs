// Product gateway: HTTP façade over the upstream product service

pub mod api;
pub mod booking;
pub mod circuit_breaker;
pub mod config;
pub mod identifier;
pub mod mock_upstream;
pub mod model;
pub mod telemetry;
pub mod upstream;

// Re-export key types for convenience
pub use booking::{BookingError, BookingWorkflow};
pub use config::{ConfigError, GatewayConfig};
pub use identifier::InventoryId;
pub use model::{Inventory, Product, ProductPayload};
pub use upstream::{ClientConfig, ClientError, HttpProductClient, ProductApi, UpstreamError};
