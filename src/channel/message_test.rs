use std::cell::Cell;
use std::rc::Rc;

use crate::channel::{Message, MessageKind, MessagePool};
use crate::error::Error;

#[test]
fn pool_acquire_reserves_capacity() {
    let pool = MessagePool::default();
    let message = pool.acquire(MessageKind::ApplicationData, 4096);
    assert!(message.data.is_empty());
    assert!(message.data.capacity() >= 4096);
}

#[test]
fn pool_recycles_buffers() {
    let pool = MessagePool::new(4);
    let mut message = pool.acquire(MessageKind::ApplicationData, 1024);
    message.data.extend_from_slice(b"payload");
    pool.release(message);

    let recycled = pool.acquire(MessageKind::ApplicationData, 16);
    assert!(recycled.data.is_empty());
    assert!(recycled.data.capacity() >= 1024);
}

#[test]
fn pool_overflow_is_dropped() {
    let pool = MessagePool::new(1);
    pool.release(Message::new(MessageKind::ApplicationData, 8));
    // The queue is full; this release must not panic or block.
    pool.release(Message::new(MessageKind::ApplicationData, 8));
}

#[test]
fn completion_runs_once() {
    let calls = Rc::new(Cell::new(0));
    let seen_err = Rc::new(Cell::new(false));
    let mut message = Message::new(MessageKind::ApplicationData, 0);
    let calls_in = Rc::clone(&calls);
    let seen_err_in = Rc::clone(&seen_err);
    message.on_completion = Some(Box::new(move |result| {
        calls_in.set(calls_in.get() + 1);
        seen_err_in.set(matches!(result, Err(Error::SocketClosed)));
    }));

    message.complete(Err(Error::SocketClosed));
    message.complete(Ok(()));

    assert_eq!(calls.get(), 1);
    assert!(seen_err.get());
}

#[test]
fn completion_absent_is_noop() {
    let mut message = Message::new(MessageKind::ApplicationData, 0);
    message.complete(Ok(()));
}
