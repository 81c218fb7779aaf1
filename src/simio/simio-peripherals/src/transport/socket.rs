use std::io::{self, Read, Write};
use std::net::TcpStream;
#[cfg(unix)]
use std::os::unix::net::UnixStream;

use log::debug;
use simio_protocol::{Endpoint, FRAME_LEN};

use super::{Connector, Link, TransportError};

enum Stream {
    #[cfg(unix)]
    Unix(UnixStream),
    Tcp(TcpStream),
}

/// Byte-per-message link over a connected stream socket
pub struct SocketLink {
    stream: Stream,
}

impl SocketLink {
    fn writer(&mut self) -> &mut dyn Write {
        match &mut self.stream {
            #[cfg(unix)]
            Stream::Unix(stream) => stream,
            Stream::Tcp(stream) => stream,
        }
    }

    fn reader(&mut self) -> &mut dyn Read {
        match &mut self.stream {
            #[cfg(unix)]
            Stream::Unix(stream) => stream,
            Stream::Tcp(stream) => stream,
        }
    }
}

impl Link for SocketLink {
    fn send(&mut self, byte: u8) -> Result<(), TransportError> {
        let writer = self.writer();
        writer.write_all(&[byte; FRAME_LEN])?;
        writer.flush()?;
        Ok(())
    }

    fn receive(&mut self) -> Result<u8, TransportError> {
        let mut frame = [0u8; FRAME_LEN];
        match self.reader().read_exact(&mut frame) {
            Ok(()) => Ok(frame[0]),
            Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Err(TransportError::Closed),
            Err(err) => Err(err.into()),
        }
    }
}

/// Connects `ipc://` and `tcp://` endpoints
///
/// Connection is eager: an endpoint nobody listens on fails here rather
/// than on the first exchange.
#[derive(Clone, Copy, Debug, Default)]
pub struct SocketConnector;

impl Connector for SocketConnector {
    fn connect(&self, endpoint: &Endpoint) -> Result<Box<dyn Link>, TransportError> {
        let connect_err = |source: io::Error| TransportError::Connect {
            endpoint: endpoint.to_string(),
            source,
        };

        let stream = match endpoint {
            #[cfg(unix)]
            Endpoint::Ipc(path) => Stream::Unix(UnixStream::connect(path).map_err(connect_err)?),
            Endpoint::Tcp(addr) => {
                let stream = TcpStream::connect(addr.as_str()).map_err(connect_err)?;
                stream.set_nodelay(true)?;
                Stream::Tcp(stream)
            }
            _ => return Err(TransportError::Unsupported(endpoint.to_string())),
        };

        debug!("Connected to {}", endpoint);
        Ok(Box::new(SocketLink { stream }))
    }
}
