/*
    Copyright (C) 2026  The HPILEMU developers

    This file is part of HPILEMU, a Rust library for emulating HP-IL loop devices.

    For the full copyright notice, see the lib.rs file.
*/
//! Bounded command queues carrying user input to devices owned by a dispatcher thread.
use core::fmt;
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError, TryIter};

#[allow(unused_imports)]
use log::{error, warn, info, debug, trace};

/// The default capacity of a command queue.
pub const QUEUE_CAPACITY: usize = 256;

/// The producer end of a command queue. Never blocks.
#[derive(Debug)]
pub struct QueueSender<T> {
    tx: SyncSender<T>,
}

/// The consumer end of a command queue, owned by a device.
#[derive(Debug)]
pub struct QueueReceiver<T> {
    rx: Receiver<T>,
}

/// The reason a command could not be queued. Holds the rejected command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueueError<T> {
    /// The queue is full.
    Full(T),
    /// The device was dropped.
    Closed(T),
}

impl<T> Clone for QueueSender<T> {
    fn clone(&self) -> Self {
        QueueSender { tx: self.tx.clone() }
    }
}

/// Creates a command queue with the given `capacity`.
pub fn command_queue<T>(capacity: usize) -> (QueueSender<T>, QueueReceiver<T>) {
    let (tx, rx) = sync_channel(capacity);
    (QueueSender { tx }, QueueReceiver { rx })
}

impl<T> QueueSender<T> {
    /// Queues a command without blocking.
    pub fn try_push(&self, command: T) -> Result<(), QueueError<T>> {
        self.tx.try_send(command).map_err(|err| match err {
            TrySendError::Full(cmd) => QueueError::Full(cmd),
            TrySendError::Disconnected(cmd) => QueueError::Closed(cmd),
        })
    }
}

impl<T> QueueReceiver<T> {
    /// Returns an iterator over all commands queued so far.
    pub fn drain(&self) -> TryIter<'_, T> {
        self.rx.try_iter()
    }
    /// Returns the next queued command.
    pub fn pop(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }
}

impl<T> fmt::Display for QueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Full(..) => f.write_str("command queue is full"),
            QueueError::Closed(..) => f.write_str("device is gone"),
        }
    }
}

impl<T: fmt::Debug> std::error::Error for QueueError<T> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_queue_works() {
        let (tx, rx) = command_queue::<u8>(2);
        let tx2 = tx.clone();
        assert_eq!(tx.try_push(1), Ok(()));
        assert_eq!(tx2.try_push(2), Ok(()));
        assert_eq!(tx.try_push(3), Err(QueueError::Full(3)));
        assert_eq!(rx.drain().collect::<Vec<_>>(), [1, 2]);
        assert_eq!(rx.pop(), None);
        tx.try_push(4).unwrap();
        assert_eq!(rx.pop(), Some(4));
        drop(rx);
        assert_eq!(tx.try_push(5), Err(QueueError::Closed(5)));
        assert_eq!(QueueError::Full(0).to_string(), "command queue is full");
    }
}
