use thiserror::Error;

/// Boxed cause for failures raised by collaborators outside this crate
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,
    #[error("bad number: {0}")]
    BadNumber(String),
    #[error("unexpected token: {0}")]
    UnexpectedToken(String),
    #[error("unbalanced parentheses")]
    Unbalanced,
    #[error("division by zero")]
    DivideByZero,
    #[error("expression too complex")]
    TooComplex,
}

/// Failure of a single `config` call; the device is left untouched
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config: expected {0}")]
    MissingArgument(&'static str),
    #[error("can't parse {what}: {text}: {source}")]
    BadValue {
        what: &'static str,
        text: String,
        #[source]
        source: ExprError,
    },
    #[error("config: unexpected argument: {0}")]
    ExtraArgument(String),
    #[error("config: unknown parameter: {0}")]
    UnknownParameter(String),
    #[error("config: bad endpoint {endpoint}: {source}")]
    BadEndpoint {
        endpoint: String,
        #[source]
        source: BoxError,
    },
}

/// Failure while a device services a bus access
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("transport failure: {0}")]
    Transport(#[source] BoxError),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("no such device class: {0}")]
    UnknownClass(String),
    #[error("device name already in use: {0}")]
    DuplicateName(String),
    #[error("no such device: {0}")]
    UnknownDevice(String),
    #[error("can't create {class} device: {source}")]
    Create {
        class: String,
        #[source]
        source: BoxError,
    },
    #[error("{device}: {source}")]
    Config {
        device: String,
        #[source]
        source: ConfigError,
    },
    #[error("{device}: {source}")]
    Device {
        device: String,
        #[source]
        source: DeviceError,
    },
}
