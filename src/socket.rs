use std::io;

use bytes::Bytes;

use crate::channel::Direction;

/// Callback delivering readability transitions to the subscriber.
pub type ReadableCallback = Box<dyn FnMut(io::Result<()>)>;

/// Callback delivering the outcome of an asynchronous write.
pub type WriteCompletion = Box<dyn FnOnce(io::Result<usize>)>;

/// Contract for the non-blocking socket a
/// [`SocketHandler`](crate::SocketHandler) drives.
///
/// Implementations live outside this crate (an event-loop integration, a
/// test double). Two rules keep the single-threaded channel model sound:
///
/// - every callback handed to the socket is invoked on the channel's
///   event-loop thread;
/// - `write` never invokes its completion before returning. Completions are
///   deferred to a later event-loop tick.
pub trait Socket {
    /// Read into `buf`, returning the byte count.
    ///
    /// `Ok(0)` means the peer closed the connection. A read that cannot make
    /// progress returns `ErrorKind::WouldBlock`.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Submit `data` for asynchronous writing.
    ///
    /// On success `completion` fires later with the outcome. On failure the
    /// data is dropped and `completion` never fires.
    fn write(&mut self, data: Bytes, completion: WriteCompletion) -> io::Result<()>;

    /// Register the callback invoked whenever the socket becomes readable.
    fn subscribe_to_readable(&mut self, callback: ReadableCallback) -> io::Result<()>;

    /// Whether the socket is still open.
    fn is_open(&self) -> bool;

    /// Shut down one direction of the socket.
    fn shutdown(&mut self, direction: Direction) -> io::Result<()>;

    /// Release OS resources. Called once, at handler teardown.
    fn clean_up(&mut self);
}
