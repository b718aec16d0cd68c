mod message;
mod task;

#[cfg(test)]
mod message_test;

use std::rc::Rc;

use thiserror::Error as ThisError;

use crate::error::{Error, Result};

pub use message::{Message, MessageCompletion, MessageKind, MessagePool};
pub use task::{Task, TaskStatus};

/// The two data-flow directions of a channel.
///
/// Read travels from the socket toward the application, write the other way.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Read,
    Write,
}

/// A message the receiving party refused.
///
/// Ownership of the message travels back to the caller inside the error,
/// like `std::sync::mpsc::SendError`; nothing is released on the caller's
/// behalf.
#[derive(Debug, ThisError)]
#[error("message rejected: {error}")]
pub struct RejectedMessage {
    pub message: Message,
    #[source]
    pub error: Error,
}

/// The operations a channel invokes on each of its handlers.
///
/// Every method runs on the channel's event-loop thread. Teardown is `Drop`.
pub trait ChannelHandler {
    /// Accept a message traveling in the read direction.
    fn process_read_message(
        &mut self,
        message: Message,
    ) -> core::result::Result<(), RejectedMessage>;

    /// Accept a message traveling in the write direction.
    fn process_write_message(
        &mut self,
        message: Message,
    ) -> core::result::Result<(), RejectedMessage>;

    /// Downstream has opened `size` more bytes of read window.
    fn increment_read_window(&mut self, size: usize);

    /// The read window this handler starts with.
    fn initial_window_size(&self) -> usize;

    /// Begin shutting down one direction of this handler.
    ///
    /// Completion is acknowledged through
    /// [`Slot::on_handler_shutdown_complete`], possibly from a deferred task.
    fn shutdown(&mut self, direction: Direction, error: Option<Error>, abort: bool) -> Result<()>;
}

/// The services a channel exposes to its handlers.
///
/// A channel is pinned to one event-loop thread; implementations are shared
/// as `Rc<dyn Channel>` and need no synchronization.
pub trait Channel {
    /// Acquire a pooled message with at least `size` bytes of capacity.
    fn acquire_message_from_pool(&self, kind: MessageKind, size: usize) -> Result<Message>;

    /// Return a retired message to the pool.
    fn release_message_to_pool(&self, message: Message);

    /// Enqueue `task` to run at `when`, in the clock domain of
    /// [`Channel::current_clock_time`]. Tasks enqueued for the same time run
    /// in FIFO order.
    fn schedule_task(&self, task: Task, when: u64);

    /// The channel clock, in nanoseconds.
    fn current_clock_time(&self) -> u64;

    /// Begin shutting the whole channel down, with `error` as the cause.
    fn shutdown(&self, error: Error);
}

/// A handler's position in its channel.
pub trait Slot {
    /// The channel this slot belongs to.
    fn channel(&self) -> Rc<dyn Channel>;

    /// Hand a message to the adjacent handler in `direction`.
    fn send_message(
        &self,
        message: Message,
        direction: Direction,
    ) -> core::result::Result<(), RejectedMessage>;

    /// How many bytes the downstream side is currently ready to accept.
    fn downstream_read_window(&self) -> usize;

    /// Acknowledge that this slot's handler finished shutting down
    /// `direction`.
    fn on_handler_shutdown_complete(&self, direction: Direction, error: Option<Error>, abort: bool);
}
