use std::rc::Rc;

use simio_core::Registry;

pub mod spi;
pub mod transport;

pub use spi::{LastOp, Spi};
#[cfg(feature = "inproc")]
pub use transport::{InprocConnector, InprocPeer};
pub use transport::{Connector, SocketConnector, Transport, TransportError};

/// Register every device class provided by this crate
pub fn register_all(registry: &mut Registry, connector: Rc<dyn Connector>) {
    registry.register(spi::class(connector));
}
