use std::sync::{
    mpsc::{self, Receiver, Sender},
    Mutex, MutexGuard,
};

use tracing::{debug, warn};

use crate::{QuarryEvent, SyncStage};

/// Consumer of [`QuarryEvent`]s.
///
/// Each frontend provides its own implementation.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: QuarryEvent);
}

/// Sends events through an mpsc channel to whoever holds the receiver.
pub struct ChannelSink {
    sender: Sender<QuarryEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, Receiver<QuarryEvent>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender,
            },
            receiver,
        )
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: QuarryEvent) {
        // A dropped receiver just means nobody is listening any more.
        let _ = self.sender.send(event);
    }
}

/// Discards every event.
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: QuarryEvent) {}
}

/// Stores every event for later inspection.
#[derive(Default)]
pub struct CollectorSink {
    events: Mutex<Vec<QuarryEvent>>,
}

impl CollectorSink {
    fn guard(&self) -> MutexGuard<'_, Vec<QuarryEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn events(&self) -> Vec<QuarryEvent> {
        self.guard().clone()
    }

    /// Number of stored events matching `predicate`.
    pub fn count<F>(&self, predicate: F) -> usize
    where
        F: Fn(&QuarryEvent) -> bool,
    {
        self.guard().iter().filter(|event| predicate(event)).count()
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventSink for CollectorSink {
    fn emit(&self, event: QuarryEvent) {
        self.guard().push(event);
    }
}

/// Writes every event to the `tracing` log at debug level, failures and
/// cache fallbacks at warn level.
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: QuarryEvent) {
        match event {
            QuarryEvent::FetchFailed {
                artifact,
                repository,
                error,
                ..
            } => warn!("fetching {} from {} failed: {}", artifact, repository, error),
            QuarryEvent::SyncProgress {
                location,
                stage: SyncStage::CacheFallback {
                    error,
                },
            } => {
                warn!(
                    "using cached metadata for {} after network failure: {}",
                    location, error
                )
            }
            other => debug!("{:?}", other),
        }
    }
}
