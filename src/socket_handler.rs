use std::cell::RefCell;
use std::cmp;
use std::collections::VecDeque;
use std::io;
use std::rc::Rc;

use tracing::{debug, instrument, trace, warn};

use crate::channel::{
    Channel, ChannelHandler, Direction, Message, MessageKind, RejectedMessage, Slot, Task,
    TaskStatus,
};
use crate::constant::DEFAULT_MAX_RW_SIZE;
use crate::error::{Error, Result};
use crate::socket::Socket;

/// Configuration for a [`SocketHandler`].
#[derive(Debug, Clone)]
pub struct SocketHandlerOptions {
    /// Most bytes read from the socket per event-loop quantum. A socket with
    /// more data pending gets a fresh task instead of monopolizing the loop.
    pub max_rw_size: usize,
}

impl Default for SocketHandlerOptions {
    fn default() -> Self {
        Self {
            max_rw_size: DEFAULT_MAX_RW_SIZE,
        }
    }
}

/// Byte counters for one socket handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SocketHandlerStats {
    pub bytes_read: u64,
    pub bytes_written: u64,
}

/// The channel handler at the downstream end of a pipeline, bridging a
/// non-blocking socket to the message-processing chain.
///
/// Read direction: socket readability drives a quantum-bounded drain loop
/// that acquires pooled messages and dispatches them in the read direction,
/// never exceeding the downstream read window. Write direction: messages
/// arriving from the pipeline are handed to the socket's asynchronous write
/// and retired when the completion fires.
///
/// The handler is exclusively owned by its channel and every method runs on
/// the channel's event-loop thread.
pub struct SocketHandler<S: Socket> {
    state: Rc<RefCell<SocketHandlerState<S>>>,
}

struct SocketHandlerState<S: Socket> {
    socket: S,
    slot: Rc<dyn Slot>,
    /// In-flight write messages, oldest first. Socket completions are FIFO,
    /// so the front is always the message whose completion fires next.
    write_queue: VecDeque<Message>,
    max_rw_size: usize,
    shutdown_in_progress: bool,
    stats: SocketHandlerStats,
}

impl<S: Socket> Drop for SocketHandlerState<S> {
    fn drop(&mut self) {
        self.socket.clean_up();
    }
}

impl<S: Socket + 'static> SocketHandler<S> {
    /// Wire `socket` into `slot` and subscribe to readability.
    ///
    /// The handler owns the socket from here on and releases it on drop.
    pub fn new(socket: S, slot: Rc<dyn Slot>, options: SocketHandlerOptions) -> Result<Self> {
        let state = Rc::new(RefCell::new(SocketHandlerState {
            socket,
            slot,
            write_queue: VecDeque::new(),
            max_rw_size: options.max_rw_size,
            shutdown_in_progress: false,
            stats: SocketHandlerStats::default(),
        }));
        let weak = Rc::downgrade(&state);
        state
            .borrow_mut()
            .socket
            .subscribe_to_readable(Box::new(move |readiness| {
                if let Some(state) = weak.upgrade() {
                    on_readable(&state, readiness);
                }
            }))?;
        Ok(Self { state })
    }

    /// Byte counters since creation or the last [`reset_stats`](Self::reset_stats).
    pub fn stats(&self) -> SocketHandlerStats {
        self.state.borrow().stats
    }

    pub fn reset_stats(&self) {
        self.state.borrow_mut().stats = SocketHandlerStats::default();
    }
}

impl<S: Socket + 'static> ChannelHandler for SocketHandler<S> {
    fn process_read_message(
        &mut self,
        message: Message,
    ) -> core::result::Result<(), RejectedMessage> {
        // Terminal in the read direction; a message arriving here is a
        // pipeline wiring bug.
        Err(RejectedMessage {
            message,
            error: Error::CantAcceptInput,
        })
    }

    fn process_write_message(
        &mut self,
        mut message: Message,
    ) -> core::result::Result<(), RejectedMessage> {
        if !self.state.borrow().socket.is_open() {
            return Err(RejectedMessage {
                message,
                error: Error::SocketClosed,
            });
        }

        let payload = message.data.split().freeze();
        let submitted = payload.len();
        let weak = Rc::downgrade(&self.state);
        let result = self.state.borrow_mut().socket.write(
            payload,
            Box::new(move |outcome| {
                if let Some(state) = weak.upgrade() {
                    on_write_complete(&state, outcome);
                }
            }),
        );
        match result {
            Ok(()) => {
                trace!(bytes = submitted, "submitted write to socket");
                self.state.borrow_mut().write_queue.push_back(message);
                Ok(())
            }
            Err(err) => Err(RejectedMessage {
                message,
                error: Error::Io(err),
            }),
        }
    }

    fn increment_read_window(&mut self, _size: usize) {
        let channel = {
            let state = self.state.borrow();
            if state.shutdown_in_progress {
                return;
            }
            state.slot.channel()
        };
        schedule_read_task(&self.state, &channel);
    }

    fn initial_window_size(&self) -> usize {
        usize::MAX
    }

    #[instrument(skip_all, fields(direction = ?direction, abort = abort))]
    fn shutdown(&mut self, direction: Direction, error: Option<Error>, abort: bool) -> Result<()> {
        match direction {
            Direction::Read => shutdown_read(&self.state, error, abort),
            Direction::Write => shutdown_write(&self.state, error, abort),
        }
    }
}

fn on_readable<S: Socket + 'static>(
    state: &Rc<RefCell<SocketHandlerState<S>>>,
    readiness: io::Result<()>,
) {
    match readiness {
        Ok(()) => do_read(state),
        Err(err) => {
            let channel = {
                let s = state.borrow();
                if s.shutdown_in_progress {
                    return;
                }
                s.slot.channel()
            };
            warn!(error = %err, "socket readability reported an error, shutting down channel");
            channel.shutdown(Error::Io(err));
        }
    }
}

/// Drain the socket for one quantum, dispatching pooled messages in the read
/// direction.
#[instrument(skip_all)]
fn do_read<S: Socket + 'static>(state: &Rc<RefCell<SocketHandlerState<S>>>) {
    let (slot, channel, max_rw_size) = {
        let s = state.borrow();
        if s.shutdown_in_progress {
            return;
        }
        (Rc::clone(&s.slot), s.slot.channel(), s.max_rw_size)
    };

    let max = cmp::min(max_rw_size, slot.downstream_read_window());
    if max == 0 {
        trace!("downstream read window is closed, waiting for increment");
        return;
    }

    let mut total_read = 0;
    let mut last_error = None;
    while total_read < max {
        let size = max - total_read;
        let mut message = match channel.acquire_message_from_pool(MessageKind::ApplicationData, size)
        {
            Ok(message) => message,
            Err(err) => {
                last_error = Some(err);
                break;
            }
        };

        message.data.resize(size, 0);
        let read = state.borrow_mut().socket.read(&mut message.data);
        match read {
            Ok(0) => {
                channel.release_message_to_pool(message);
                last_error = Some(Error::SocketClosed);
                break;
            }
            Ok(read) => {
                message.data.truncate(read);
                total_read += read;
                state.borrow_mut().stats.bytes_read += read as u64;
                trace!(bytes = read, "read from socket");
                if let Err(rejected) = slot.send_message(message, Direction::Read) {
                    debug!(error = %rejected.error, "downstream rejected a read message");
                    channel.release_message_to_pool(rejected.message);
                    return;
                }
            }
            Err(err) => {
                channel.release_message_to_pool(message);
                last_error = Some(Error::Io(err));
                break;
            }
        }
    }

    if total_read < max {
        let shutdown_in_progress = state.borrow().shutdown_in_progress;
        match last_error {
            Some(err) if err.is_would_block() => {
                trace!("socket would block, waiting for readability");
            }
            Some(err) if !shutdown_in_progress => {
                warn!(error = %err, "socket read failed, shutting down channel");
                channel.shutdown(err);
            }
            _ => {}
        }
        return;
    }

    if total_read == max_rw_size {
        // A full quantum went by without the socket running dry. Yield the
        // event-loop thread and continue from a fresh task.
        trace!("read quantum exhausted, re-scheduling");
        schedule_read_task(state, &channel);
    }
}

fn schedule_read_task<S: Socket + 'static>(
    state: &Rc<RefCell<SocketHandlerState<S>>>,
    channel: &Rc<dyn Channel>,
) {
    let weak = Rc::downgrade(state);
    let task = Task::new("socket_handler_read", move |status| {
        if status != TaskStatus::Run {
            return;
        }
        if let Some(state) = weak.upgrade() {
            do_read(&state);
        }
    });
    channel.schedule_task(task, channel.current_clock_time());
}

fn on_write_complete<S: Socket + 'static>(
    state: &Rc<RefCell<SocketHandlerState<S>>>,
    outcome: io::Result<usize>,
) {
    let (message, channel, shutdown_in_progress) = {
        let mut s = state.borrow_mut();
        let message = s.write_queue.pop_front();
        if let (Some(_), Ok(written)) = (&message, &outcome) {
            s.stats.bytes_written += *written as u64;
        }
        (message, s.slot.channel(), s.shutdown_in_progress)
    };
    let Some(mut message) = message else {
        // The WRITE-direction drain already retired this message.
        return;
    };
    match outcome {
        Ok(written) => {
            trace!(bytes = written, "socket write completed");
            message.complete(Ok(()));
            channel.release_message_to_pool(message);
        }
        Err(err) => {
            let kind = err.kind();
            message.complete(Err(Error::Io(io::Error::from(kind))));
            channel.release_message_to_pool(message);
            if !shutdown_in_progress {
                warn!(error = %err, "socket write failed, shutting down channel");
                channel.shutdown(Error::Io(err));
            }
        }
    }
}

fn shutdown_read<S: Socket>(
    state: &Rc<RefCell<SocketHandlerState<S>>>,
    error: Option<Error>,
    abort: bool,
) -> Result<()> {
    let (slot, socket_result) = {
        let mut s = state.borrow_mut();
        s.shutdown_in_progress = true;
        let socket_result = if abort && s.socket.is_open() {
            s.socket.shutdown(Direction::Read)
        } else {
            Ok(())
        };
        (Rc::clone(&s.slot), socket_result)
    };
    // The slot must hear the acknowledgment even when the socket refuses to
    // shut down; the failure travels back through the return value only.
    slot.on_handler_shutdown_complete(Direction::Read, error, abort);
    socket_result.map_err(Error::from)
}

fn shutdown_write<S: Socket>(
    state: &Rc<RefCell<SocketHandlerState<S>>>,
    error: Option<Error>,
    abort: bool,
) -> Result<()> {
    let (drained, slot, channel) = {
        let mut s = state.borrow_mut();
        s.shutdown_in_progress = true;
        let drained: Vec<Message> = s.write_queue.drain(..).collect();
        (drained, Rc::clone(&s.slot), s.slot.channel())
    };

    debug!(pending = drained.len(), "draining write queue for shutdown");
    for mut message in drained {
        message.complete(Err(Error::SocketClosed));
        channel.release_message_to_pool(message);
    }

    let socket_result = {
        let mut s = state.borrow_mut();
        if s.socket.is_open() {
            s.socket.shutdown(Direction::Write)
        } else {
            Ok(())
        }
    };

    // Acknowledge from a task rather than inline so that a read task already
    // queued on the channel runs first and observes the latched shutdown. The
    // task is scheduled even when the socket refused to shut down; teardown
    // must not stall waiting for an acknowledgment.
    let task = Task::new("socket_handler_write_shutdown", move |_status| {
        slot.on_handler_shutdown_complete(Direction::Write, error, abort);
    });
    channel.schedule_task(task, channel.current_clock_time());
    socket_result.map_err(Error::from)
}
