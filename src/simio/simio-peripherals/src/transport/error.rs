use std::io;

use simio_protocol::EndpointError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error(transparent)]
    Endpoint(#[from] EndpointError),
    #[error("can't connect to {endpoint}: {source}")]
    Connect {
        endpoint: String,
        #[source]
        source: io::Error,
    },
    #[error("no in-process peer bound as {0}")]
    NoPeer(String),
    #[error("endpoint not supported by this connector: {0}")]
    Unsupported(String),
    #[error("channel i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("peer closed the channel")]
    Closed,
    #[error("request issued while a reply is still owed")]
    ReplyOwed,
    #[error("receive issued with no request outstanding")]
    NoRequest,
}
