use crate::OperationId;

/// All event types emitted by quarry operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuarryEvent {
    /// A fetch attempt against one repository is starting.
    FetchAttempt {
        op_id: OperationId,
        artifact: String,
        repository: String,
        attempt: usize,
    },
    /// A fetch attempt failed; the provider may move on.
    FetchFailed {
        op_id: OperationId,
        artifact: String,
        repository: String,
        error: String,
        mirror_retry: bool,
    },
    /// Bytes were written and the sink committed.
    FetchCommitted {
        op_id: OperationId,
        artifact: String,
        repository: String,
        bytes: u64,
    },
    /// The fetch was cancelled; the sink was left uncommitted.
    FetchCancelled {
        op_id: OperationId,
        artifact: String,
    },
    /// No repository could serve the artifact.
    FetchExhausted {
        op_id: OperationId,
        artifact: String,
        attempts: usize,
    },
    /// Repository metadata load stage.
    SyncProgress {
        location: String,
        stage: SyncStage,
    },
}

/// Stages of loading repository metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncStage {
    /// Requesting metadata from the network.
    Fetching,
    /// Served from the manager's in-memory tier.
    Memory,
    /// The stored copy was reused without a network request.
    Cached,
    /// The server reported the stored copy is current.
    UpToDate,
    /// The network failed and a stored copy was used instead.
    CacheFallback { error: String },
    /// Scanning metadata for partial records.
    Validating,
    /// The repository contained partial records and was rejected.
    Rejected { partial_units: Vec<String> },
    Complete { artifact_count: usize },
}
