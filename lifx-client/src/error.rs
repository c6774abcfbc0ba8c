use std::net::SocketAddr;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by [crate::Client] operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An argument was rejected, or a frame couldn't be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] lifx_core::Error),

    /// No reply arrived before the request timeout.
    #[error("no reply to message type {typ} from {addr} within {timeout:?}")]
    Timeout {
        typ: u16,
        addr: SocketAddr,
        timeout: Duration,
    },

    /// A network socket operation failed.
    #[error("socket {action} error: {err:?}")]
    Socket { action: String, err: std::io::Error },

    /// The device answered with a message of the wrong type.
    #[error("expected {expected}, got message type {got}")]
    UnexpectedReply { expected: &'static str, got: u16 },

    /// The client's receive task is gone, so no reply can ever arrive.
    #[error("client receive task has stopped")]
    Closed,
}

impl Error {
    pub fn socket(action: &str, err: std::io::Error) -> Self {
        Error::Socket {
            action: action.to_string(),
            err,
        }
    }

    pub(crate) fn unexpected(expected: &'static str, got: &lifx_core::Message) -> Self {
        Error::UnexpectedReply {
            expected,
            got: got.get_num(),
        }
    }

    /// True when the request was rejected before anything was sent.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Protocol(e) if e.is_validation())
    }

    /// True when a reply arrived but couldn't be decoded.
    pub fn is_decode(&self) -> bool {
        matches!(self, Error::Protocol(e) if e.is_decode())
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }
}
