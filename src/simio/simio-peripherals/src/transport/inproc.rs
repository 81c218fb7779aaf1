use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use simio_protocol::Endpoint;

use super::{Connector, Link, TransportError};

struct Binding {
    requests: Sender<u8>,
    replies: Receiver<u8>,
}

/// Connector for `inproc://<name>` endpoints served from the same process
///
/// A peer binds a name first; devices connecting to that name exchange
/// bytes with the returned [`InprocPeer`].
#[derive(Clone, Default)]
pub struct InprocConnector {
    bindings: Rc<RefCell<HashMap<String, Binding>>>,
}

impl InprocConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name`, replacing any earlier peer of that name
    pub fn bind(&self, name: &str) -> InprocPeer {
        let (req_tx, req_rx) = unbounded();
        let (rep_tx, rep_rx) = unbounded();
        self.bindings.borrow_mut().insert(
            name.to_string(),
            Binding {
                requests: req_tx,
                replies: rep_rx,
            },
        );
        InprocPeer {
            requests: req_rx,
            replies: rep_tx,
        }
    }

    pub fn unbind(&self, name: &str) {
        self.bindings.borrow_mut().remove(name);
    }
}

impl Connector for InprocConnector {
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Link>, TransportError> {
        let Endpoint::Inproc(name) = endpoint else {
            return Err(TransportError::Unsupported(endpoint.to_string()));
        };
        let bindings = self.bindings.borrow();
        let binding = bindings
            .get(name)
            .ok_or_else(|| TransportError::NoPeer(name.clone()))?;
        Ok(Box::new(InprocLink {
            requests: binding.requests.clone(),
            replies: binding.replies.clone(),
        }))
    }
}

struct InprocLink {
    requests: Sender<u8>,
    replies: Receiver<u8>,
}

impl Link for InprocLink {
    fn send(&mut self, byte: u8) -> Result<(), TransportError> {
        self.requests.send(byte).map_err(|_| TransportError::Closed)
    }

    fn receive(&mut self) -> Result<u8, TransportError> {
        self.replies.recv().map_err(|_| TransportError::Closed)
    }
}

/// Peer side of an in-process binding
pub struct InprocPeer {
    requests: Receiver<u8>,
    replies: Sender<u8>,
}

impl InprocPeer {
    /// Next request byte if one is waiting
    pub fn try_request(&self) -> Option<u8> {
        self.requests.try_recv().ok()
    }

    /// Blocking wait for the next request, `None` once every sender is gone
    pub fn request(&self) -> Option<u8> {
        self.requests.recv().ok()
    }

    /// Queue a reply byte
    pub fn reply(&self, byte: u8) -> Result<(), TransportError> {
        self.replies.send(byte).map_err(|_| TransportError::Closed)
    }

    /// Replies queued but not yet consumed by any device
    pub fn queued_replies(&self) -> usize {
        self.replies.len()
    }

    /// Requests sent but not yet taken by this peer
    pub fn pending_requests(&self) -> usize {
        self.requests.len()
    }
}
