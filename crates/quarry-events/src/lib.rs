mod event;
mod sink;

use std::sync::Arc;

pub use event::*;
pub use sink::*;

/// Unique identifier for a running operation.
pub type OperationId = u64;

/// Shared handle to an event sink.
pub type EventSinkHandle = Arc<dyn EventSink>;

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(op_id: OperationId) -> QuarryEvent {
        QuarryEvent::FetchFailed {
            op_id,
            artifact: "binary/app/1.0.0".into(),
            repository: "https://repo.example.org".into(),
            error: "connection reset".into(),
            mirror_retry: false,
        }
    }

    #[test]
    fn test_null_sink() {
        NullSink.emit(failed(1));
    }

    #[test]
    fn test_channel_sink() {
        let (sink, rx) = ChannelSink::new();
        sink.emit(QuarryEvent::FetchAttempt {
            op_id: 1,
            artifact: "binary/app/1.0.0".into(),
            repository: "https://repo.example.org".into(),
            attempt: 1,
        });
        sink.emit(failed(1));
        sink.emit(QuarryEvent::FetchExhausted {
            op_id: 1,
            artifact: "binary/app/1.0.0".into(),
            attempts: 1,
        });

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(events.len(), 3);
        assert!(matches!(
            &events[0],
            QuarryEvent::FetchAttempt { attempt: 1, .. }
        ));
        assert_eq!(events[1], failed(1));
    }

    #[test]
    fn test_channel_sink_receiver_dropped() {
        let (sink, rx) = ChannelSink::new();
        drop(rx);
        sink.emit(failed(2));
    }

    #[test]
    fn test_collector_sink() {
        let sink = CollectorSink::default();
        assert!(sink.is_empty());

        sink.emit(QuarryEvent::SyncProgress {
            location: "central".into(),
            stage: SyncStage::Fetching,
        });
        sink.emit(QuarryEvent::SyncProgress {
            location: "central".into(),
            stage: SyncStage::Complete {
                artifact_count: 12,
            },
        });
        sink.emit(failed(3));

        assert_eq!(sink.len(), 3);
        assert_eq!(
            sink.count(|e| matches!(e, QuarryEvent::SyncProgress { .. })),
            2
        );
        assert!(matches!(
            &sink.events()[1],
            QuarryEvent::SyncProgress {
                stage: SyncStage::Complete { artifact_count: 12 },
                ..
            }
        ));
    }

    #[test]
    fn test_event_sink_handle() {
        let collector = Arc::new(CollectorSink::default());
        let sink: EventSinkHandle = collector.clone();
        sink.emit(QuarryEvent::FetchCancelled {
            op_id: 42,
            artifact: "binary/app/1.0.0".into(),
        });
        assert_eq!(collector.len(), 1);

        let tracing: EventSinkHandle = Arc::new(TracingSink);
        tracing.emit(failed(4));
    }

    #[test]
    fn test_event_sink_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<NullSink>();
        assert_send_sync::<ChannelSink>();
        assert_send_sync::<CollectorSink>();
        assert_send_sync::<TracingSink>();
    }
}
