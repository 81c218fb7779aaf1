use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EndpointError {
    #[error("endpoint has no scheme: {0}")]
    MissingScheme(String),
    #[error("unsupported endpoint scheme: {0}")]
    UnknownScheme(String),
    #[error("endpoint has an empty address: {0}")]
    EmptyAddress(String),
    #[error("tcp endpoint must be host:port: {0}")]
    BadTcpAddress(String),
}

/// Address of the peer process that answers a device's requests
///
/// Textual form follows the familiar message-queue convention:
/// `ipc://<path>`, `tcp://<host>:<port>` or `inproc://<name>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Unix domain stream socket
    Ipc(PathBuf),
    /// TCP stream, kept as `host:port` so resolution happens at connect time
    Tcp(String),
    /// Peer living in the same process
    Inproc(String),
}

/// Default endpoint for a logical channel, e.g. `ipc:///tmp/simio_UCB0.sock`
pub fn default_endpoint(channel: &str) -> Endpoint {
    Endpoint::Ipc(PathBuf::from(format!("/tmp/simio_{}.sock", channel)))
}

impl FromStr for Endpoint {
    type Err = EndpointError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let (scheme, rest) = text
            .split_once("://")
            .ok_or_else(|| EndpointError::MissingScheme(text.to_string()))?;

        if rest.is_empty() {
            return Err(EndpointError::EmptyAddress(text.to_string()));
        }

        match scheme.to_ascii_lowercase().as_str() {
            "ipc" => Ok(Endpoint::Ipc(PathBuf::from(rest))),
            "tcp" => {
                // Port must be numeric, host may itself contain ':' (IPv6 in brackets)
                match rest.rsplit_once(':') {
                    Some((host, port)) if !host.is_empty() && port.parse::<u16>().is_ok() => {
                        Ok(Endpoint::Tcp(rest.to_string()))
                    }
                    _ => Err(EndpointError::BadTcpAddress(text.to_string())),
                }
            }
            "inproc" => Ok(Endpoint::Inproc(rest.to_string())),
            _ => Err(EndpointError::UnknownScheme(scheme.to_string())),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Ipc(path) => write!(f, "ipc://{}", path.display()),
            Endpoint::Tcp(addr) => write!(f, "tcp://{}", addr),
            Endpoint::Inproc(name) => write!(f, "inproc://{}", name),
        }
    }
}
