//! Post-commit notification bus (mechanics only).
//!
//! The journal log is the source of truth; the bus only fans committed events
//! out to interested parties (sales/payroll integrations waiting for a posting
//! confirmation, cache warmers, audit sinks). Delivery is at-least-once and
//! subscribers must tolerate duplicates: every envelope carries its global
//! `position`, which is a natural idempotency key.

use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvError, TryRecvError};

/// A subscription to the bus (broadcast: every subscriber sees every message).
///
/// Intended for single-threaded consumption.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, TryRecvError> {
        self.receiver.try_recv()
    }

    /// Drain everything currently buffered without blocking.
    pub fn drain(&self) -> Vec<M> {
        self.receiver.try_iter().collect()
    }
}

/// Transport-agnostic publish/subscribe abstraction.
///
/// `publish()` is only ever called after the journal log accepted the
/// corresponding append, so a failed publish never loses data: the event can
/// be re-read from the log.
pub trait EventBus<M>: Send + Sync {
    type Error: core::fmt::Debug + Send + Sync + 'static;

    fn publish(&self, message: M) -> Result<(), Self::Error>;

    fn subscribe(&self) -> Subscription<M>;
}

impl<M, B> EventBus<M> for Arc<B>
where
    B: EventBus<M> + ?Sized,
{
    type Error = B::Error;

    fn publish(&self, message: M) -> Result<(), Self::Error> {
        (**self).publish(message)
    }

    fn subscribe(&self) -> Subscription<M> {
        (**self).subscribe()
    }
}
