//! One query and fetch surface over an ordered list of repositories.

use std::{
    collections::{BTreeSet, HashSet},
    io::Write,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use quarry_events::{EventSinkHandle, NullSink, OperationId, QuarryEvent};
use quarry_utils::cancel::CancellationToken;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::{
    artifact::{ArtifactDescriptor, ArtifactKey, ArtifactRef, ProcessingStep},
    error::{QuarryError, TransferError},
    policy::TransferPolicy,
    processing::{CancellableWriter, DecodeChain},
    repository::{ArtifactRepository, KeyPredicate},
    sink::{ArtifactSink, SinkState},
    status::{Status, StatusCode},
    QuarryResult,
};

pub const DEFAULT_MAX_MIRROR_ATTEMPTS: usize = 3;

type Candidate = (Arc<dyn ArtifactRepository>, ArtifactDescriptor);

/// Aggregates repositories in priority order.
///
/// Queries fan out to every repository concurrently and are merged as a set
/// union. Fetches walk the repositories one at a time, so the first child of
/// a fetch status is always the highest-priority repository tried.
pub struct CompositeProvider {
    repositories: Vec<Arc<dyn ArtifactRepository>>,
    policy: Option<TransferPolicy>,
    max_mirror_attempts: usize,
    events: EventSinkHandle,
    next_op: AtomicU64,
}

impl CompositeProvider {
    pub fn new(repositories: Vec<Arc<dyn ArtifactRepository>>) -> Self {
        Self {
            repositories,
            policy: None,
            max_mirror_attempts: DEFAULT_MAX_MIRROR_ATTEMPTS,
            events: Arc::new(NullSink),
            next_op: AtomicU64::new(1),
        }
    }

    /// Uses `policy` for every repository instead of each repository's own.
    pub fn with_policy(mut self, policy: Option<TransferPolicy>) -> Self {
        self.policy = policy;
        self
    }

    /// Attempts per repository when it keeps asking for a mirror retry.
    pub fn with_max_mirror_attempts(mut self, attempts: usize) -> Self {
        self.max_mirror_attempts = attempts.max(1);
        self
    }

    pub fn with_events(mut self, events: EventSinkHandle) -> Self {
        self.events = events;
        self
    }

    pub fn repositories(&self) -> &[Arc<dyn ArtifactRepository>] {
        &self.repositories
    }

    pub fn contains(&self, target: &ArtifactRef) -> bool {
        self.repositories.par_iter().any(|repo| {
            match target {
                ArtifactRef::Key(key) => repo.contains_key(key),
                ArtifactRef::Descriptor(descriptor) => repo.contains(descriptor),
            }
        })
    }

    pub fn query(&self, predicate: KeyPredicate<'_>) -> BTreeSet<ArtifactKey> {
        self.repositories
            .par_iter()
            .map(|repo| repo.query(predicate))
            .reduce(BTreeSet::new, |mut acc, keys| {
                acc.extend(keys);
                acc
            })
    }

    /// Descriptors of `key` across all repositories, in priority order and
    /// without duplicate encodings.
    pub fn descriptors_for(&self, key: &ArtifactKey) -> Vec<ArtifactDescriptor> {
        let per_repo: Vec<Vec<ArtifactDescriptor>> = self
            .repositories
            .par_iter()
            .map(|repo| repo.descriptors_for(key))
            .collect();

        let mut seen = HashSet::new();
        per_repo
            .into_iter()
            .flatten()
            .filter(|descriptor| seen.insert(descriptor.clone()))
            .collect()
    }

    fn emit(&self, event: QuarryEvent) {
        self.events.emit(event);
    }

    /// Repositories holding the target, each with the descriptor to fetch
    /// from it.
    fn candidates(
        &self,
        sink: &dyn ArtifactSink,
        target: &ArtifactRef,
    ) -> QuarryResult<Vec<Candidate>> {
        let wanted = match (sink.target_descriptor(), target) {
            (Some(raw), ArtifactRef::Descriptor(descriptor)) if raw != descriptor => {
                return Err(QuarryError::Configuration(format!(
                    "raw sink for {raw} cannot receive {descriptor}"
                )));
            }
            (Some(raw), _) => Some(raw.clone()),
            (None, ArtifactRef::Descriptor(descriptor)) => Some(descriptor.clone()),
            (None, ArtifactRef::Key(_)) => None,
        };

        let mut candidates = Vec::new();
        for repo in &self.repositories {
            match &wanted {
                Some(descriptor) => {
                    if repo.contains(descriptor) {
                        candidates.push((repo.clone(), descriptor.clone()));
                    }
                }
                None => {
                    let descriptors = repo.descriptors_for(target.key());
                    if descriptors.is_empty() {
                        continue;
                    }
                    let policy = self.policy.unwrap_or_else(|| repo.transfer_policy());
                    let picked = policy.pick_format(&descriptors)?.clone();
                    candidates.push((repo.clone(), picked));
                }
            }
        }
        Ok(candidates)
    }

    /// Fetches an artifact into `sink`.
    ///
    /// Transfer failures never surface as `Err`; they are children of the
    /// returned status. The sink ends committed exactly when the status is
    /// a success, and is never left writing.
    ///
    /// # Errors
    ///
    /// * [`QuarryError::Configuration`] if the sink was built for a different
    ///   artifact or encoding than `target`.
    /// * [`QuarryError::IllegalState`] if the sink is already committed.
    pub fn fetch(
        &self,
        sink: &mut dyn ArtifactSink,
        target: &ArtifactRef,
        cancel: &CancellationToken,
    ) -> QuarryResult<Status> {
        let key = target.key();
        if key != sink.artifact_key() {
            return Err(QuarryError::Configuration(format!(
                "sink for {} cannot receive {}",
                sink.artifact_key(),
                key
            )));
        }
        if !sink.can_begin_write() {
            return Err(QuarryError::IllegalState(format!(
                "sink for {key} is already committed"
            )));
        }

        let op_id = self.next_op.fetch_add(1, Ordering::SeqCst);
        let artifact = key.to_string();
        let mut candidates = self.candidates(sink, target)?;

        if candidates.is_empty() {
            self.emit(QuarryEvent::FetchExhausted {
                op_id,
                artifact: artifact.clone(),
                attempts: 0,
            });
            return Ok(
                Status::error(format!("{target} is not available in any repository"))
                    .with_code(StatusCode::NotFound),
            );
        }

        let restartable = sink.is_restartable();
        if !restartable {
            candidates.truncate(1);
        }
        let raw = sink.target_descriptor().is_some();

        let mut children = Vec::new();
        let mut attempts = 0;
        let mut failures = 0;

        for (repo, descriptor) in candidates {
            let mut repo_attempts = 0;
            loop {
                if cancel.is_cancelled() {
                    return self.cancelled(sink, op_id, artifact, children);
                }

                repo_attempts += 1;
                attempts += 1;
                self.emit(QuarryEvent::FetchAttempt {
                    op_id,
                    artifact: artifact.clone(),
                    repository: repo.name().to_string(),
                    attempt: attempts,
                });
                debug!("fetching {} from {} (attempt {})", descriptor, repo.name(), attempts);

                match self.attempt(sink, repo.as_ref(), &descriptor, raw, cancel)? {
                    Ok(bytes) => {
                        self.emit(QuarryEvent::FetchCommitted {
                            op_id,
                            artifact: artifact.clone(),
                            repository: repo.name().to_string(),
                            bytes,
                        });
                        info!("fetched {} from {} ({} bytes)", descriptor, repo.name(), bytes);

                        if failures == 0 {
                            return Ok(Status::ok(format!(
                                "Fetched {descriptor} from {}",
                                repo.name()
                            )));
                        }
                        children.push(Status::ok(format!(
                            "Attempt {attempts}: fetched {descriptor} from {}",
                            repo.name()
                        )));
                        return Ok(Status::warning(format!(
                            "Fetched {key} from {} after {failures} failed attempt(s)",
                            repo.name()
                        ))
                        .with_children(children));
                    }
                    Err(TransferError::Cancelled) => {
                        return self.cancelled(sink, op_id, artifact, children);
                    }
                    Err(err) => {
                        failures += 1;
                        let mirror_retry = err.is_mirror_retry();
                        warn!("fetching {} from {} failed: {}", descriptor, repo.name(), err);
                        self.emit(QuarryEvent::FetchFailed {
                            op_id,
                            artifact: artifact.clone(),
                            repository: repo.name().to_string(),
                            error: err.to_string(),
                            mirror_retry,
                        });

                        let code = if mirror_retry {
                            StatusCode::MirrorRetry
                        } else {
                            StatusCode::Transfer
                        };
                        children.push(
                            Status::error(format!(
                                "Attempt {attempts}: fetching {descriptor} from {} failed",
                                repo.name()
                            ))
                            .with_code(code)
                            .with_cause(&err),
                        );

                        if mirror_retry && restartable && repo_attempts < self.max_mirror_attempts {
                            continue;
                        }
                        break;
                    }
                }
            }
        }

        self.emit(QuarryEvent::FetchExhausted {
            op_id,
            artifact,
            attempts,
        });
        Ok(Status::error(format!(
            "Failed to fetch {key}: all {failures} attempt(s) failed"
        ))
        .with_code(StatusCode::Transfer)
        .with_children(children))
    }

    /// One `begin -> transfer -> commit` cycle. Transfer failures leave the
    /// sink aborted and come back as the inner error.
    fn attempt(
        &self,
        sink: &mut dyn ArtifactSink,
        repo: &dyn ArtifactRepository,
        descriptor: &ArtifactDescriptor,
        raw: bool,
        cancel: &CancellationToken,
    ) -> QuarryResult<Result<u64, TransferError>> {
        if sink.state() == SinkState::Writing {
            sink.abort_write()?;
        }

        let result = {
            let out = sink.begin_write()?;
            transfer(repo, descriptor, raw, out, cancel)
        };

        match result {
            Ok(bytes) => {
                if let Err(err) = sink.commit_write() {
                    let _ = sink.abort_write();
                    return Err(err);
                }
                Ok(Ok(bytes))
            }
            Err(err) => {
                sink.abort_write()?;
                if cancel.is_cancelled() {
                    return Ok(Err(TransferError::Cancelled));
                }
                Ok(Err(err))
            }
        }
    }

    fn cancelled(
        &self,
        sink: &mut dyn ArtifactSink,
        op_id: OperationId,
        artifact: String,
        children: Vec<Status>,
    ) -> QuarryResult<Status> {
        if sink.state() == SinkState::Writing {
            sink.abort_write()?;
        }
        info!("fetch of {} cancelled", artifact);
        let status = Status::cancel(format!("Fetch of {artifact} was cancelled")).with_children(children);
        self.emit(QuarryEvent::FetchCancelled {
            op_id,
            artifact,
        });
        Ok(status)
    }
}

/// Streams the stored bytes of `descriptor` from `repo` into `out`, undoing
/// processing steps unless `raw` is set.
fn transfer(
    repo: &dyn ArtifactRepository,
    descriptor: &ArtifactDescriptor,
    raw: bool,
    out: &mut dyn Write,
    cancel: &CancellationToken,
) -> Result<u64, TransferError> {
    let steps: &[ProcessingStep] = if raw { &[] } else { descriptor.format.steps() };
    let mut chain = DecodeChain::new(out, steps).map_err(TransferError::Decode)?;
    let bytes = {
        let mut writer = CancellableWriter::new(&mut chain, cancel);
        repo.fetch_raw(descriptor, &mut writer)?
    };
    chain.finish().map_err(TransferError::Decode)?;

    if cancel.is_cancelled() {
        return Err(TransferError::Cancelled);
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use quarry_events::CollectorSink;

    use super::*;
    use crate::{
        sink::{MemorySink, RawSink, StreamSink},
        status::Severity,
        test_utils::{Behavior, ScriptedRepository},
    };

    fn key(id: &str) -> ArtifactKey {
        ArtifactKey::parse("binary", id, "1.0.0").unwrap()
    }

    fn canonical(id: &str) -> ArtifactDescriptor {
        ArtifactDescriptor::canonical(key(id))
    }

    fn zstd(id: &str) -> ArtifactDescriptor {
        ArtifactDescriptor::processed(key(id), vec![ProcessingStep::Zstd])
    }

    fn provider(repos: &[Arc<ScriptedRepository>]) -> CompositeProvider {
        CompositeProvider::new(
            repos
                .iter()
                .map(|repo| repo.clone() as Arc<dyn ArtifactRepository>)
                .collect(),
        )
    }

    fn bad(name: &str) -> Arc<ScriptedRepository> {
        Arc::new(
            ScriptedRepository::new(name)
                .with(canonical("app"), b"bad bytes")
                .behaving(Behavior::Fail),
        )
    }

    fn good(name: &str) -> Arc<ScriptedRepository> {
        Arc::new(ScriptedRepository::new(name).with(canonical("app"), b"good bytes"))
    }

    #[test]
    fn test_query_is_union() {
        let r1 = Arc::new(
            ScriptedRepository::new("one")
                .with(canonical("a"), b"a")
                .with(canonical("b"), b"b"),
        );
        let r2 = Arc::new(
            ScriptedRepository::new("two")
                .with(canonical("b"), b"b")
                .with(canonical("c"), b"c"),
        );

        let keys = provider(&[r1, r2]).query(&|_| true);
        assert_eq!(
            keys.into_iter().collect::<Vec<_>>(),
            vec![key("a"), key("b"), key("c")]
        );
    }

    #[test]
    fn test_descriptors_deduplicated_in_priority_order() {
        let r1 = Arc::new(
            ScriptedRepository::new("one")
                .with(zstd("app"), b"z")
                .with(canonical("app"), b"c"),
        );
        let r2 = Arc::new(ScriptedRepository::new("two").with(canonical("app"), b"c"));

        let provider = provider(&[r1, r2]);
        assert_eq!(provider.descriptors_for(&key("app")), vec![zstd("app"), canonical("app")]);
        assert!(provider.contains(&ArtifactRef::Key(key("app"))));
        assert!(!provider.contains(&ArtifactRef::Key(key("other"))));
    }

    #[test]
    fn test_first_attempt_success_is_ok() {
        let repo = good("central");
        let mut sink = MemorySink::new(key("app"));

        let status = provider(&[repo])
            .fetch(&mut sink, &key("app").into(), &CancellationToken::new())
            .unwrap();

        assert_eq!(status.severity, Severity::Ok);
        assert!(status.children.is_empty());
        assert_eq!(sink.state(), SinkState::Committed);
        assert_eq!(sink.bytes(), b"good bytes");
    }

    #[test]
    fn test_retry_success_is_warning() {
        let repos = [bad("r1"), bad("r2"), good("r3")];
        let events = Arc::new(CollectorSink::default());
        let provider = provider(&repos).with_events(events.clone());
        let mut sink = MemorySink::new(key("app"));

        let status = provider
            .fetch(&mut sink, &key("app").into(), &CancellationToken::new())
            .unwrap();

        assert_eq!(status.severity, Severity::Warning);
        assert_eq!(status.children.len(), 3);
        assert_eq!(status.count(Severity::Error), 2);
        assert_eq!(status.count(Severity::Ok), 1);
        assert_eq!(sink.state(), SinkState::Committed);
        assert_eq!(sink.bytes(), b"good bytes");

        assert_eq!(events.count(|e| matches!(e, QuarryEvent::FetchFailed { .. })), 2);
        assert_eq!(events.count(|e| matches!(e, QuarryEvent::FetchCommitted { .. })), 1);
    }

    #[test]
    fn test_exhaustion_is_error() {
        let repos = [bad("r1"), bad("r2")];
        let mut sink = MemorySink::new(key("app"));

        let status = provider(&repos)
            .fetch(&mut sink, &key("app").into(), &CancellationToken::new())
            .unwrap();

        assert_eq!(status.severity, Severity::Error);
        assert_eq!(status.code, Some(StatusCode::Transfer));
        assert_eq!(status.children.len(), 2);
        assert_eq!(status.count(Severity::Error), 2);
        assert_ne!(sink.state(), SinkState::Committed);
        assert_ne!(sink.state(), SinkState::Writing);
        assert!(sink.bytes().is_empty());
    }

    #[test]
    fn test_not_found_has_no_children() {
        let repo = good("central");
        let mut sink = MemorySink::new(key("missing"));

        let status = provider(&[repo.clone()])
            .fetch(&mut sink, &key("missing").into(), &CancellationToken::new())
            .unwrap();

        assert_eq!(status.severity, Severity::Error);
        assert_eq!(status.code, Some(StatusCode::NotFound));
        assert!(status.children.is_empty());
        assert_eq!(sink.state(), SinkState::NotStarted);
        assert_eq!(repo.accesses(), 0);
    }

    #[test]
    fn test_non_restartable_sink_short_circuits() {
        let r_bad = bad("r1");
        let r_good = good("r2");
        let mut sink = StreamSink::new(key("app"), Vec::new());

        let status = provider(&[r_bad.clone(), r_good.clone()])
            .fetch(&mut sink, &key("app").into(), &CancellationToken::new())
            .unwrap();

        assert_eq!(status.severity, Severity::Error);
        assert_eq!(status.children.len(), 1);
        assert_eq!(r_bad.accesses(), 1);
        assert_eq!(r_good.accesses(), 0);
        assert_ne!(sink.state(), SinkState::Committed);
    }

    #[test]
    fn test_remote_policy_decodes_processed() {
        let canonical_bytes = b"canonical payload".repeat(20);
        let compressed = zstd::encode_all(&canonical_bytes[..], 3).unwrap();
        let repo = Arc::new(
            ScriptedRepository::new("central")
                .with(canonical("app"), &canonical_bytes)
                .with(zstd("app"), &compressed),
        );
        let mut sink = MemorySink::new(key("app"));

        let status = provider(&[repo])
            .fetch(&mut sink, &key("app").into(), &CancellationToken::new())
            .unwrap();

        assert!(status.is_ok());
        assert!(status.message.contains("[zstd]"));
        assert_eq!(sink.bytes(), &canonical_bytes[..]);
    }

    #[test]
    fn test_truncated_zstd_moves_to_next_repository() {
        let canonical_bytes = b"canonical payload".repeat(20);
        let compressed = zstd::encode_all(&canonical_bytes[..], 3).unwrap();
        let truncated = &compressed[..compressed.len() / 2];
        let r1 = Arc::new(ScriptedRepository::new("r1").with(zstd("app"), truncated));
        let r2 = Arc::new(ScriptedRepository::new("r2").with(zstd("app"), &compressed));
        let mut sink = MemorySink::new(key("app"));

        let status = provider(&[r1.clone(), r2.clone()])
            .fetch(&mut sink, &key("app").into(), &CancellationToken::new())
            .unwrap();

        assert_eq!(status.severity, Severity::Warning);
        assert_eq!(status.count(Severity::Error), 1);
        assert_eq!(r1.accesses(), 1);
        assert_eq!(r2.accesses(), 1);
        assert_eq!(sink.state(), SinkState::Committed);
        assert_eq!(sink.bytes(), &canonical_bytes[..]);
    }

    #[test]
    fn test_local_policy_prefers_canonical() {
        let repo = Arc::new(
            ScriptedRepository::new("local")
                .local()
                .with(zstd("app"), b"not zstd at all")
                .with(canonical("app"), b"plain"),
        );
        let mut sink = MemorySink::new(key("app"));

        let status = provider(&[repo])
            .fetch(&mut sink, &key("app").into(), &CancellationToken::new())
            .unwrap();

        assert!(status.is_ok());
        assert_eq!(sink.bytes(), b"plain");
    }

    #[test]
    fn test_raw_sink_receives_stored_bytes() {
        let compressed = zstd::encode_all(&b"payload"[..], 3).unwrap();
        let repo = Arc::new(
            ScriptedRepository::new("central")
                .with(canonical("app"), b"payload")
                .with(zstd("app"), &compressed),
        );
        let provider = provider(&[repo]);

        let mut sink = RawSink::new(MemorySink::new(key("app")), zstd("app")).unwrap();
        let status = provider
            .fetch(&mut sink, &key("app").into(), &CancellationToken::new())
            .unwrap();
        assert!(status.is_ok());
        assert_eq!(sink.inner().bytes(), &compressed[..]);

        let mut mismatched = RawSink::new(MemorySink::new(key("app")), zstd("app")).unwrap();
        assert!(matches!(
            provider.fetch(
                &mut mismatched,
                &canonical("app").into(),
                &CancellationToken::new()
            ),
            Err(QuarryError::Configuration(_))
        ));
        assert_eq!(mismatched.state(), SinkState::NotStarted);
    }

    #[test]
    fn test_sink_key_mismatch_and_committed_sink() {
        let provider = provider(&[good("central")]);
        let cancel = CancellationToken::new();

        let mut other = MemorySink::new(key("other"));
        assert!(matches!(
            provider.fetch(&mut other, &key("app").into(), &cancel),
            Err(QuarryError::Configuration(_))
        ));

        let mut sink = MemorySink::new(key("app"));
        provider.fetch(&mut sink, &key("app").into(), &cancel).unwrap();
        assert!(matches!(
            provider.fetch(&mut sink, &key("app").into(), &cancel),
            Err(QuarryError::IllegalState(_))
        ));
    }

    #[test]
    fn test_mirror_retry_stays_on_repository() {
        let mirrored = Arc::new(
            ScriptedRepository::new("mirrored")
                .with(canonical("app"), b"mirrored bytes")
                .behaving(Behavior::MirrorRetry(2)),
        );
        let backup = good("backup");
        let mut sink = MemorySink::new(key("app"));

        let status = provider(&[mirrored.clone(), backup.clone()])
            .fetch(&mut sink, &key("app").into(), &CancellationToken::new())
            .unwrap();

        assert_eq!(status.severity, Severity::Warning);
        assert_eq!(status.children.len(), 3);
        assert!(status.children[..2]
            .iter()
            .all(|child| child.code == Some(StatusCode::MirrorRetry)));
        assert_eq!(mirrored.accesses(), 3);
        assert_eq!(backup.accesses(), 0);
        assert_eq!(sink.bytes(), b"mirrored bytes");
    }

    #[test]
    fn test_mirror_retry_limit_moves_on() {
        let mirrored = Arc::new(
            ScriptedRepository::new("mirrored")
                .with(canonical("app"), b"never")
                .behaving(Behavior::AlwaysMirrorRetry),
        );
        let backup = good("backup");
        let mut sink = MemorySink::new(key("app"));

        let status = provider(&[mirrored.clone(), backup.clone()])
            .with_max_mirror_attempts(2)
            .fetch(&mut sink, &key("app").into(), &CancellationToken::new())
            .unwrap();

        assert_eq!(status.severity, Severity::Warning);
        assert_eq!(mirrored.accesses(), 2);
        assert_eq!(backup.accesses(), 1);
        assert_eq!(status.children.len(), 3);
        assert_eq!(sink.bytes(), b"good bytes");
    }

    #[test]
    fn test_cancellation_during_transfer() {
        let cancel = CancellationToken::new();
        let slow = Arc::new(
            ScriptedRepository::new("slow")
                .with(canonical("app"), b"bytes that never land")
                .behaving(Behavior::CancelDuring(cancel.clone())),
        );
        let backup = good("backup");
        let events = Arc::new(CollectorSink::default());
        let mut sink = MemorySink::new(key("app"));

        let status = provider(&[slow, backup.clone()])
            .with_events(events.clone())
            .fetch(&mut sink, &key("app").into(), &cancel)
            .unwrap();

        assert_eq!(status.severity, Severity::Cancel);
        assert_eq!(status.code, Some(StatusCode::Cancelled));
        assert_ne!(sink.state(), SinkState::Committed);
        assert!(sink.bytes().is_empty());
        assert_eq!(backup.accesses(), 0);
        assert_eq!(events.count(|e| matches!(e, QuarryEvent::FetchCancelled { .. })), 1);
    }

    #[test]
    fn test_cancelled_before_start() {
        let repo = good("central");
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut sink = MemorySink::new(key("app"));

        let status = provider(&[repo.clone()])
            .fetch(&mut sink, &key("app").into(), &cancel)
            .unwrap();

        assert!(status.is_cancelled());
        assert_eq!(repo.accesses(), 0);
        assert_eq!(sink.state(), SinkState::NotStarted);
    }

    #[test]
    fn test_forced_policy_overrides_repository() {
        let repo = Arc::new(
            ScriptedRepository::new("central")
                .with(zstd("app"), b"not decodable")
                .with(canonical("app"), b"plain"),
        );
        let mut sink = MemorySink::new(key("app"));

        let status = provider(&[repo])
            .with_policy(Some(TransferPolicy::Local))
            .fetch(&mut sink, &key("app").into(), &CancellationToken::new())
            .unwrap();

        assert!(status.is_ok());
        assert_eq!(sink.bytes(), b"plain");
    }
}
