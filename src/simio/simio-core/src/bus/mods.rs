use crate::args::ArgTokens;
use crate::error::{ConfigError, DeviceError};
use crate::Address;

/// Outcome of offering a bus write to a device
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WriteAccess {
    /// The device claimed the write; no other device sees it
    Handled,
    /// Keep offering the write to the remaining devices
    PassThrough,
}

/// Interface every simulated memory-mapped device exposes to the bus
///
/// Instances are created through a [`crate::Registry`] entry and torn down by
/// dropping them, which releases whatever external resources they own.
pub trait SimioDevice {
    /// Return to power-on state; addressing/configuration is kept
    fn reset(&mut self);

    /// Apply one named configuration parameter
    fn config(&mut self, param: &str, args: &mut ArgTokens<'_>) -> Result<(), ConfigError>;

    /// Human readable dump of configuration and state
    fn info(&self) -> String;

    fn write_b(&mut self, addr: Address, data: u8) -> Result<WriteAccess, DeviceError>;

    /// `Some(byte)` when the device owns `addr`
    fn read_b(&mut self, addr: Address) -> Result<Option<u8>, DeviceError>;
}
