//! Non-blocking completion slot for asynchronous operations
//!
//! A `Pending<T>` is the handle a polling loop holds while a worker task
//! produces a single value. The worker resolves the slot exactly once
//! through a oneshot channel; the owner polls it each tick with
//! [`Pending::try_take`] and releases it with [`Pending::release`] when the
//! owning state or task is torn down, no matter which path tears it down.

use tokio::sync::oneshot;
use tokio::sync::oneshot::error::TryRecvError;
use tokio::task::JoinHandle;

/// A single-value asynchronous result slot with cooperative teardown.
///
/// Dropping a `Pending` releases it, so an abandoned handle never leaves its
/// worker task running.
#[derive(Debug)]
pub struct Pending<T> {
    receiver: oneshot::Receiver<T>,
    worker: Option<JoinHandle<()>>,
    released: bool,
}

impl<T> Pending<T> {
    /// Wraps the receiving half of a completion channel together with the
    /// worker task that will resolve it.
    pub fn new(receiver: oneshot::Receiver<T>, worker: JoinHandle<()>) -> Self {
        Self {
            receiver,
            worker: Some(worker),
            released: false,
        }
    }

    /// Wraps a bare receiver with no worker attached. Used where the sender
    /// side is driven externally, such as scripted test doubles.
    pub fn from_receiver(receiver: oneshot::Receiver<T>) -> Self {
        Self {
            receiver,
            worker: None,
            released: false,
        }
    }

    /// Non-blocking poll. Returns `Some(value)` the first time the worker
    /// has resolved the slot, `None` on every tick before that, and `None`
    /// forever after the value was taken or the handle released.
    pub fn try_take(&mut self) -> Option<T> {
        if self.released {
            return None;
        }

        match self.receiver.try_recv() {
            Ok(value) => Some(value),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Closed) => None,
        }
    }

    /// Releases the slot: aborts the worker if one is still attached and
    /// closes the channel so a late send is discarded. Safe to call any
    /// number of times; only the first call has an effect.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;

        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
        self.receiver.close();
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl<T> Drop for Pending<T> {
    fn drop(&mut self) {
        self.release();
    }
}
