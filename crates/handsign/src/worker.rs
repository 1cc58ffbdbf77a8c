//! Background threads consuming messages from a channel.

use std::{
    io, mem,
    panic::resume_unwind,
    thread::{self, JoinHandle},
};

use crossbeam::channel::{self, Sender};

/// A named thread that hands every message it receives to a handler closure.
///
/// The thread runs until every [`Sender`] handed out by [`Worker::sender`] and the `Worker` itself
/// are gone. Dropping the `Worker` waits for that and re-raises a panic of the handler on the
/// dropping thread.
pub(crate) struct Worker<I: Send + 'static> {
    name: String,
    sender: Sender<I>,
    thread: Option<JoinHandle<()>>,
}

impl<I: Send + 'static> Worker<I> {
    /// Spawns a thread called `name` that passes messages to `handler` in the order they were sent.
    ///
    /// Up to `capacity` messages are queued before senders block. With a capacity of 0, each send
    /// waits until the thread has picked up the message.
    pub(crate) fn spawn<F>(name: &str, capacity: usize, mut handler: F) -> io::Result<Self>
    where
        F: FnMut(I) + Send + 'static,
    {
        let (sender, messages) = channel::bounded(capacity);
        let thread_name = name.to_string();
        let thread = thread::Builder::new().name(name.into()).spawn(move || {
            log::debug!("{thread_name}: started");
            for message in messages {
                handler(message);
            }
            log::debug!("{thread_name}: all senders dropped, exiting");
        })?;

        Ok(Self {
            name: name.into(),
            sender,
            thread: Some(thread),
        })
    }

    /// Returns a sender feeding this worker.
    pub(crate) fn sender(&self) -> Sender<I> {
        self.sender.clone()
    }
}

impl<I: Send + 'static> Drop for Worker<I> {
    fn drop(&mut self) {
        // Swap in a sender of a dead channel so ours disconnects.
        let (dead, _) = channel::bounded(0);
        drop(mem::replace(&mut self.sender, dead));

        if let Some(thread) = self.thread.take() {
            if let Err(payload) = thread.join() {
                if thread::panicking() {
                    log::error!("worker '{}' panicked", self.name);
                } else {
                    resume_unwind(payload);
                }
            }
        }
    }
}
