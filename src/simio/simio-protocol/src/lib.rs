pub mod endpoint;

pub use endpoint::{default_endpoint, Endpoint, EndpointError};

/// Every request and every reply on the wire is a single data byte
pub const FRAME_LEN: usize = 1;

/// Channel used when a device is attached without naming one (USCI B0)
pub const DEFAULT_CHANNEL: &str = "UCB0";
