//! Generic single-consumer background worker
//!
//! Items are handed to one background thread through a FIFO channel and
//! processed strictly in submission order, one at a time. The worker can be
//! paused cooperatively: the item in progress completes, and nothing new is
//! processed until [`AsyncWorker::continue_work`] is called.

use crate::common::error::{Error, Result};
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

enum Message<T> {
    Item(T),
    Stop,
}

#[derive(Default)]
struct ControlState {
    /// Items queued or in progress
    pending: usize,
    paused: bool,
}

#[derive(Default)]
struct Control {
    state: Mutex<ControlState>,
    changed: Condvar,
}

impl Control {
    fn wait_resumed(&self) {
        let mut state = self.state.lock();
        while state.paused {
            self.changed.wait(&mut state);
        }
    }

    fn finish_one(&self) {
        let mut state = self.state.lock();
        state.pending = state.pending.saturating_sub(1);
        self.changed.notify_all();
    }
}

/// Background worker draining a FIFO queue on a dedicated thread
pub struct AsyncWorker<T: Send + 'static> {
    name: String,
    sender: Sender<Message<T>>,
    receiver: Receiver<Message<T>>,
    control: Arc<Control>,
    thread: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> AsyncWorker<T> {
    /// Create a stopped worker; its thread will carry `name`
    pub fn new<S: Into<String>>(name: S) -> Self {
        let (sender, receiver) = channel::unbounded();
        Self {
            name: name.into(),
            sender,
            receiver,
            control: Arc::new(Control::default()),
            thread: None,
        }
    }

    /// Spawn the worker thread, calling `handler` for every queued item
    ///
    /// # Errors
    ///
    /// Returns an error if the worker is already running or the thread cannot
    /// be spawned.
    pub fn start<F>(&mut self, mut handler: F) -> Result<()>
    where
        F: FnMut(T) + Send + 'static,
    {
        if self.thread.is_some() {
            return Err(Error::internal(format!("worker '{}' already started", self.name)));
        }

        let receiver = self.receiver.clone();
        let control = Arc::clone(&self.control);
        let handle = thread::Builder::new()
            .name(self.name.clone())
            .spawn(move || {
                while let Ok(Message::Item(item)) = receiver.recv() {
                    control.wait_resumed();
                    handler(item);
                    control.finish_one();
                }
            })?;

        self.thread = Some(handle);
        Ok(())
    }

    /// Queue an item for processing
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the worker is not running or the queue is
    /// disconnected.
    pub fn add(&self, item: T) -> Result<()> {
        if self.thread.is_none() {
            return Err(Error::internal(format!("worker '{}' is not running", self.name)));
        }
        self.control.state.lock().pending += 1;
        if self.sender.send(Message::Item(item)).is_err() {
            self.control.finish_one();
            return Err(Error::internal(format!("worker '{}' queue closed", self.name)));
        }
        Ok(())
    }

    /// Process everything already queued, then join the worker thread
    ///
    /// # Errors
    ///
    /// Returns `Error::Internal` if the worker thread panicked.
    pub fn stop(&mut self) -> Result<()> {
        let Some(handle) = self.thread.take() else {
            return Ok(());
        };

        self.continue_work();
        // Stop is queued behind pending items, so they are drained first.
        if self.sender.send(Message::Stop).is_err() {
            return Err(Error::internal(format!("worker '{}' queue closed", self.name)));
        }
        handle
            .join()
            .map_err(|_| Error::internal(format!("worker '{}' panicked", self.name)))
    }

    /// Whether the worker thread is not running
    pub fn is_stopped(&self) -> bool {
        self.thread.is_none()
    }

    /// Whether any item is queued or being processed
    pub fn is_busy(&self) -> bool {
        self.control.state.lock().pending > 0
    }

    /// Block until the queue is empty and no item is in progress
    ///
    /// Returns immediately while the worker is paused.
    pub fn wait_idle(&self) {
        let mut state = self.control.state.lock();
        while state.pending > 0 && !state.paused {
            self.control.changed.wait(&mut state);
        }
    }

    /// Stop picking up new items once the current one completes
    pub fn pause_work(&self) {
        self.control.state.lock().paused = true;
    }

    /// Resume processing after [`AsyncWorker::pause_work`]
    pub fn continue_work(&self) {
        let mut state = self.control.state.lock();
        state.paused = false;
        self.control.changed.notify_all();
    }
}

impl<T: Send + 'static> Drop for AsyncWorker<T> {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
