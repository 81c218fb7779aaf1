//! Request/reply byte transport between a device and its peer process
//!
//! Every [`Transport::send`] must be answered by exactly one
//! [`Transport::receive`] before the next send; the transport refuses
//! anything else. Both calls block without a timeout, so a silent peer
//! stalls the simulation.

use std::rc::Rc;

use log::{debug, info, warn};
use simio_protocol::Endpoint;

pub mod error;
#[cfg(feature = "inproc")]
pub mod inproc;
pub mod socket;

pub use error::TransportError;
#[cfg(feature = "inproc")]
pub use inproc::{InprocConnector, InprocPeer};
pub use socket::{SocketConnector, SocketLink};

/// One open channel to a peer
pub trait Link {
    fn send(&mut self, byte: u8) -> Result<(), TransportError>;
    fn receive(&mut self) -> Result<u8, TransportError>;
}

/// Opens links for endpoints
pub trait Connector {
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Link>, TransportError>;
}

/// Owned channel endpoint enforcing the request/reply discipline
///
/// The link is released when the transport is dropped.
pub struct Transport {
    connector: Rc<dyn Connector>,
    endpoint: Endpoint,
    link: Box<dyn Link>,
    reply_owed: bool,
    stashed: Option<u8>, // reply drained from a replaced link
}

impl Transport {
    pub fn open(connector: Rc<dyn Connector>, endpoint: Endpoint) -> Result<Self, TransportError> {
        let link = connector.connect(&endpoint)?;
        Ok(Self {
            connector,
            endpoint,
            link,
            reply_owed: false,
            stashed: None,
        })
    }

    /// Issue one request byte; the reply is left on the channel
    pub fn send(&mut self, byte: u8) -> Result<(), TransportError> {
        if self.reply_owed {
            return Err(TransportError::ReplyOwed);
        }
        self.link.send(byte)?;
        self.reply_owed = true;
        debug!("{}: sent 0x{:02x}", self.endpoint, byte);
        Ok(())
    }

    /// Consume the reply to the outstanding request
    pub fn receive(&mut self) -> Result<u8, TransportError> {
        if !self.reply_owed {
            return Err(TransportError::NoRequest);
        }
        let byte = match self.stashed.take() {
            Some(byte) => byte,
            None => self.link.receive()?,
        };
        self.reply_owed = false;
        debug!("{}: received 0x{:02x}", self.endpoint, byte);
        Ok(byte)
    }

    pub fn reply_owed(&self) -> bool {
        self.reply_owed
    }

    /// Switch to `endpoint`, keeping the current link if the new one can't be opened
    pub fn reconfigure(&mut self, endpoint: &str) -> Result<(), TransportError> {
        let endpoint: Endpoint = endpoint.parse()?;
        let link = self.connector.connect(&endpoint)?;

        if self.reply_owed && self.stashed.is_none() {
            warn!(
                "{}: collecting owed reply before switching to {}",
                self.endpoint, endpoint
            );
            self.stashed = Some(self.link.receive()?);
        }

        self.link = link;
        info!("Transport moved from {} to {}", self.endpoint, endpoint);
        self.endpoint = endpoint;
        Ok(())
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Endpoint identifier for reports
    pub fn describe(&self) -> String {
        self.endpoint.to_string()
    }
}

impl Drop for Transport {
    fn drop(&mut self) {
        debug!("Releasing transport to {}", self.endpoint);
    }
}
