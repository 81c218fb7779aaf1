pub mod args;
pub mod bus;
pub mod constants;
pub mod error;
pub mod expr;

pub use args::ArgTokens;
pub use bus::mods::{SimioDevice, WriteAccess};
pub use bus::registry::{CreateError, DeviceClass, Registry};
pub use bus::sfr::{Sfr, SfrBank};
pub use bus::Simio;
pub use error::{ConfigError, DeviceError, Error, ExprError};

/// Bus address as seen by simulated firmware
pub type Address = u32;
