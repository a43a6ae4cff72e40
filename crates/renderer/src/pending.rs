//! One-shot results produced off the event loop.
//!
//! Device negotiation and render unit creation are the only places where the
//! gallery waits on something. Both hand back a [`Pending`] that the owner
//! polls from the event loop; nothing ever blocks the loop itself.

use std::thread;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError};

/// Result of polling a [`Pending`].
#[derive(Debug)]
pub enum PendingPoll<T> {
    /// The producer has not delivered yet.
    Waiting,
    /// The value, handed out exactly once.
    Ready(T),
    /// The producer went away without a value, or the value was already taken.
    Closed,
}

/// A value that becomes available later.
#[derive(Debug)]
pub struct Pending<T> {
    state: PendingState<T>,
}

#[derive(Debug)]
enum PendingState<T> {
    Ready(T),
    Waiting(Receiver<T>),
    Taken,
}

/// Producer half of [`Pending::channel`].
#[derive(Debug)]
pub struct Resolver<T> {
    tx: Sender<T>,
}

impl<T> Resolver<T> {
    /// Delivers the value. Returns `false` when the consumer was dropped, in
    /// which case the value is dropped here.
    pub fn resolve(self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }
}

impl<T> Pending<T> {
    pub fn ready(value: T) -> Self {
        Self {
            state: PendingState::Ready(value),
        }
    }

    pub fn channel() -> (Resolver<T>, Self) {
        let (tx, rx) = bounded(1);
        (
            Resolver { tx },
            Self {
                state: PendingState::Waiting(rx),
            },
        )
    }

    pub fn poll(&mut self) -> PendingPoll<T> {
        match std::mem::replace(&mut self.state, PendingState::Taken) {
            PendingState::Ready(value) => PendingPoll::Ready(value),
            PendingState::Waiting(rx) => match rx.try_recv() {
                Ok(value) => PendingPoll::Ready(value),
                Err(TryRecvError::Empty) => {
                    self.state = PendingState::Waiting(rx);
                    PendingPoll::Waiting
                }
                Err(TryRecvError::Disconnected) => PendingPoll::Closed,
            },
            PendingState::Taken => PendingPoll::Closed,
        }
    }

    pub fn is_waiting(&self) -> bool {
        match &self.state {
            PendingState::Ready(_) => false,
            PendingState::Waiting(rx) => rx.is_empty(),
            PendingState::Taken => false,
        }
    }
}

impl<T: Send + 'static> Pending<T> {
    /// Runs `job` on a named worker thread.
    pub fn spawn<F>(name: &str, job: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (resolver, pending) = Self::channel();
        let spawned = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                if !resolver.resolve(job()) {
                    tracing::trace!("worker result discarded; consumer dropped");
                }
            });
        if let Err(err) = spawned {
            // The closure (and its resolver) is gone, so the consumer observes `Closed`.
            tracing::error!(worker = name, %err, "failed to spawn worker thread");
        }
        pending
    }
}
