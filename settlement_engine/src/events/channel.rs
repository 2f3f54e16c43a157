//! Post-commit settlement notifications
//!
//! Collaborators (receipts, ticket rendering, email) subscribe to settlement events through a bounded mpsc channel.
//! A handler only ever receives the event itself and has no access to the store, so nothing it does can leak back
//! into a settlement. Each event is handled on its own task; a panicking handler is counted and logged, and the
//! remaining events are still delivered.
//!
//! The handler loop ends once every [`EventProducer`] has been dropped. It then drains the in-flight tasks and
//! returns a [`HandlerReport`].
use std::{fmt::Display, future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinSet},
};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

/// How many events a handler loop processed before it shut down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HandlerReport {
    pub handled: u64,
    pub failed: u64,
}

impl HandlerReport {
    fn record(&mut self, res: Result<(), JoinError>, name: &str) {
        match res {
            Ok(()) => self.handled += 1,
            Err(e) => {
                self.failed += 1;
                warn!("📬️ A {name} handler task failed: {e}");
            },
        }
    }
}

impl Display for HandlerReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} handled, {} failed", self.handled, self.failed)
    }
}

pub struct EventHandler<E: Send + Sync + 'static> {
    name: &'static str,
    receiver: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(name: &'static str, buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size.max(1));
        Self { name, receiver, sender, handler }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer { name: self.name, sender: self.sender.clone() }
    }

    pub async fn start_handler(self) -> HandlerReport {
        let Self { name, mut receiver, sender, handler } = self;
        debug!("📬️ Starting {name} handler");
        // Only producers keep the channel open from here on
        drop(sender);
        let mut jobs = JoinSet::new();
        let mut report = HandlerReport::default();
        while let Some(ev) = receiver.recv().await {
            trace!("📬️ {name} event received");
            let handler = Arc::clone(&handler);
            jobs.spawn(async move { (handler)(ev).await });
            while let Some(res) = jobs.try_join_next() {
                report.record(res, name);
            }
        }
        debug!("📬️ All {name} producers are gone. Waiting for {} jobs to complete", jobs.len());
        while let Some(res) = jobs.join_next().await {
            report.record(res, name);
        }
        info!("📬️ {name} handler has shut down. {report}");
        report
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    name: &'static str,
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    /// Waits for buffer space. Only call this once the settlement has been committed.
    pub async fn publish_event(&self, event: E) {
        if self.sender.send(event).await.is_err() {
            error!("📬️ The {} handler has shut down. Event dropped", self.name);
        }
    }
}
