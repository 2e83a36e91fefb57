//! Stateless pub-sub plumbing for pipeline events.
//!
//! One [`EventHandler`] owns an mpsc channel and a single async handler function. Producers are
//! cheap clones of the sending half; every published event is dispatched onto its own task so one
//! slow subscriber cannot back up the pipeline. Handlers receive the event value and nothing
//! else: all durable state lives in the database, events only say that something happened.
use std::sync::Arc;

use futures_util::future::BoxFuture;
use log::*;
use tokio::{sync::mpsc, task::JoinSet};

pub type Handler<E> = Arc<dyn Fn(E) -> BoxFuture<'static, ()> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    inbox: mpsc::Receiver<E>,
    tx: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(capacity: usize, handler: Handler<E>) -> Self {
        let (tx, inbox) = mpsc::channel(capacity);
        Self { inbox, tx, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.tx.clone())
    }

    /// Receives events until the last producer is dropped, then waits for the in-flight handler
    /// tasks to finish before returning.
    pub async fn start_handler(mut self) {
        debug!("📬️ Event handler running");
        // The handler holds its own sender so that subscribe() works before startup; drop it now
        // so the channel closes once the outside producers are gone.
        drop(self.tx);
        let mut tasks: JoinSet<()> = JoinSet::new();
        loop {
            tokio::select! {
                received = self.inbox.recv() => match received {
                    Some(event) => {
                        trace!("📬️ Dispatching event");
                        tasks.spawn((self.handler)(event));
                    },
                    None => break,
                },
                Some(finished) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = finished {
                        warn!("📬️ An event handler task failed: {e}");
                    }
                },
            }
        }
        while let Some(finished) = tasks.join_next().await {
            if let Err(e) = finished {
                warn!("📬️ An event handler task failed during shutdown: {e}");
            }
        }
        debug!("📬️ Event handler has shut down");
    }
}

/// The sending half of an event channel. Clones freely; dropping the last clone is what lets the
/// matching [`EventHandler`] shut down.
#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    tx: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(tx: mpsc::Sender<E>) -> Self {
        Self { tx }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.tx.send(event).await {
            error!("📬️ Event channel is closed, dropping event: {e}");
        }
    }
}
