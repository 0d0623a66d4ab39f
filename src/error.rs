use std::net::SocketAddr;
use std::path::PathBuf;

use tokio_modbus::Exception;

/// Errors raised while configuring or talking to the device.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: SocketAddr,
        source: std::io::Error,
    },
    #[error("could not resolve host {0}")]
    Resolve(String),
    #[error("modbus transport error: {0}")]
    Transport(#[from] tokio_modbus::Error),
    #[error("device answered with exception {0:?}")]
    Exception(Exception),
    #[error("device returned no register values")]
    EmptyResponse,
    #[error("unable to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<Exception> for Error {
    fn from(code: Exception) -> Self {
        Error::Exception(code)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
