use thiserror::Error;

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Malformed URI: {0}")]
    MalformedUri(&'static str),

    #[error("Invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("Out of memory")]
    OutOfMemory,

    #[error("The socket handler is terminal in the read direction and cannot accept input")]
    CantAcceptInput,

    #[error("Socket is closed")]
    SocketClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this is the transient would-block signal from a non-blocking read.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Self::Io(err) if err.kind() == std::io::ErrorKind::WouldBlock)
    }
}
