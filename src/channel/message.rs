use core::fmt;

use bytes::BytesMut;
use crossbeam_queue::ArrayQueue;

use crate::error::Result;

const POOL_CAPACITY: usize = 128;

/// What a message carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    ApplicationData,
}

/// Callback invoked exactly once when a write message is retired, carrying
/// the outcome of the write.
pub type MessageCompletion = Box<dyn FnOnce(Result<()>)>;

/// A pooled I/O buffer with routing metadata.
///
/// Whoever last acquired a message, or was handed one, owns it and must
/// either dispatch it onward or release it back to the pool.
pub struct Message {
    pub kind: MessageKind,
    pub data: BytesMut,
    pub on_completion: Option<MessageCompletion>,
}

impl Message {
    pub fn new(kind: MessageKind, capacity: usize) -> Self {
        Self {
            kind,
            data: BytesMut::with_capacity(capacity),
            on_completion: None,
        }
    }

    /// Run the completion callback, if any. Later calls are no-ops.
    pub fn complete(&mut self, result: Result<()>) {
        if let Some(callback) = self.on_completion.take() {
            callback(result);
        }
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("kind", &self.kind)
            .field("len", &self.data.len())
            .field("has_completion", &self.on_completion.is_some())
            .finish()
    }
}

/// Recycles message buffers so steady-state reads allocate nothing.
///
/// Channel implementations typically keep one pool per channel and route
/// their `acquire_message_from_pool`/`release_message_to_pool` through it.
#[derive(Debug)]
pub struct MessagePool {
    buffers: ArrayQueue<BytesMut>,
}

impl MessagePool {
    pub fn new(capacity: usize) -> Self {
        Self {
            buffers: ArrayQueue::new(capacity),
        }
    }

    /// Pop a recycled buffer, or allocate one, with at least `size` bytes of
    /// capacity.
    pub fn acquire(&self, kind: MessageKind, size: usize) -> Message {
        let mut data = self.buffers.pop().unwrap_or_default();
        if data.capacity() < size {
            data.reserve(size);
        }
        Message {
            kind,
            data,
            on_completion: None,
        }
    }

    /// Clear a retired message and recycle its buffer.
    ///
    /// The releaser must have settled the completion callback first.
    pub fn release(&self, mut message: Message) {
        debug_assert!(message.on_completion.is_none());
        message.data.clear();
        // Ignore if pool is full
        let _ = self.buffers.push(message.data);
    }
}

impl Default for MessagePool {
    fn default() -> Self {
        Self::new(POOL_CAPACITY)
    }
}
