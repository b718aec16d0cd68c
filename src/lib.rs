pub mod channel;
pub mod constant;
pub mod error;
mod socket;
mod socket_handler;
mod uri;

pub use error::{Error, Result};
pub use socket::{ReadableCallback, Socket, WriteCompletion};
pub use socket_handler::{SocketHandler, SocketHandlerOptions, SocketHandlerStats};
pub use uri::{QueryParam, QueryParams, Uri, UriBuilder};
