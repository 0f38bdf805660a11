//! Write destinations for fetched artifacts.
//!
//! A sink moves through `NotStarted -> Writing -> Committed`. Aborting a write
//! discards what was written and makes the sink startable again, which is how
//! a fetch retries against the next repository.

use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use quarry_utils::fs::{ensure_dir_exists, part_path, safe_remove};

use crate::{
    artifact::{ArtifactDescriptor, ArtifactKey},
    error::{ErrorContext, QuarryError},
    QuarryResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkState {
    NotStarted,
    Writing,
    Committed,
    Aborted,
}

/// Destination for the bytes of one artifact.
///
/// A sink is owned by exactly one fetch at a time.
pub trait ArtifactSink: Send {
    /// The artifact this sink is meant to receive.
    fn artifact_key(&self) -> &ArtifactKey;

    fn state(&self) -> SinkState;

    /// Opens the sink for writing.
    ///
    /// # Errors
    ///
    /// [`QuarryError::IllegalState`] if the sink is writing or committed.
    fn begin_write(&mut self) -> QuarryResult<&mut dyn Write>;

    /// Finalizes the written bytes.
    ///
    /// # Errors
    ///
    /// [`QuarryError::IllegalState`] unless the sink is writing.
    fn commit_write(&mut self) -> QuarryResult<()>;

    /// Discards everything written since `begin_write`.
    ///
    /// # Errors
    ///
    /// [`QuarryError::IllegalState`] after commit.
    fn abort_write(&mut self) -> QuarryResult<()>;

    fn can_begin_write(&self) -> bool {
        self.state() != SinkState::Committed
    }

    /// Whether the sink can be aborted and written again. Fetches only retry
    /// other repositories for restartable sinks.
    fn is_restartable(&self) -> bool {
        true
    }

    /// The exact encoding a raw sink accepts. Non-raw sinks receive canonical
    /// bytes and return `None`.
    fn target_descriptor(&self) -> Option<&ArtifactDescriptor> {
        None
    }
}

fn check_begin(state: SinkState, key: &ArtifactKey) -> QuarryResult<()> {
    match state {
        SinkState::Writing => {
            Err(QuarryError::IllegalState(format!(
                "sink for {key} is already writing"
            )))
        }
        SinkState::Committed => {
            Err(QuarryError::IllegalState(format!(
                "sink for {key} is already committed"
            )))
        }
        SinkState::NotStarted | SinkState::Aborted => Ok(()),
    }
}

fn check_commit(state: SinkState, key: &ArtifactKey) -> QuarryResult<()> {
    if state != SinkState::Writing {
        return Err(QuarryError::IllegalState(format!(
            "cannot commit sink for {key} in state {state:?}"
        )));
    }
    Ok(())
}

fn check_abort(state: SinkState, key: &ArtifactKey) -> QuarryResult<()> {
    if state == SinkState::Committed {
        return Err(QuarryError::IllegalState(format!(
            "cannot abort committed sink for {key}"
        )));
    }
    Ok(())
}

/// Collects the artifact in memory.
#[derive(Debug)]
pub struct MemorySink {
    key: ArtifactKey,
    state: SinkState,
    buffer: Vec<u8>,
}

impl MemorySink {
    pub fn new(key: ArtifactKey) -> Self {
        Self {
            key,
            state: SinkState::NotStarted,
            buffer: Vec::new(),
        }
    }

    /// Bytes written so far; complete only once committed.
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }
}

impl ArtifactSink for MemorySink {
    fn artifact_key(&self) -> &ArtifactKey {
        &self.key
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn begin_write(&mut self) -> QuarryResult<&mut dyn Write> {
        check_begin(self.state, &self.key)?;
        self.buffer.clear();
        self.state = SinkState::Writing;
        Ok(&mut self.buffer)
    }

    fn commit_write(&mut self) -> QuarryResult<()> {
        check_commit(self.state, &self.key)?;
        self.state = SinkState::Committed;
        Ok(())
    }

    fn abort_write(&mut self) -> QuarryResult<()> {
        check_abort(self.state, &self.key)?;
        self.buffer.clear();
        self.state = SinkState::Aborted;
        Ok(())
    }
}

/// Writes the artifact to `<path>.part` and renames it into place on commit.
#[derive(Debug)]
pub struct FileSink {
    key: ArtifactKey,
    path: PathBuf,
    state: SinkState,
    writer: Option<BufWriter<File>>,
}

impl FileSink {
    pub fn new<P: AsRef<Path>>(key: ArtifactKey, path: P) -> Self {
        Self {
            key,
            path: path.as_ref().to_path_buf(),
            state: SinkState::NotStarted,
            writer: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn part_path(&self) -> PathBuf {
        part_path(&self.path)
    }
}

impl ArtifactSink for FileSink {
    fn artifact_key(&self) -> &ArtifactKey {
        &self.key
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn begin_write(&mut self) -> QuarryResult<&mut dyn Write> {
        check_begin(self.state, &self.key)?;
        if let Some(parent) = self.path.parent() {
            ensure_dir_exists(parent)?;
        }

        let part = self.part_path();
        let file = File::create(&part).with_context(|| format!("creating {}", part.display()))?;
        self.state = SinkState::Writing;
        Ok(self.writer.insert(BufWriter::new(file)))
    }

    fn commit_write(&mut self) -> QuarryResult<()> {
        check_commit(self.state, &self.key)?;
        let part = self.part_path();

        if let Some(writer) = self.writer.take() {
            let file = writer
                .into_inner()
                .map_err(|err| err.into_error())
                .with_context(|| format!("flushing {}", part.display()))?;
            file.sync_all()
                .with_context(|| format!("syncing {}", part.display()))?;
        }

        fs::rename(&part, &self.path).with_context(|| {
            format!("moving {} to {}", part.display(), self.path.display())
        })?;
        self.state = SinkState::Committed;
        Ok(())
    }

    fn abort_write(&mut self) -> QuarryResult<()> {
        check_abort(self.state, &self.key)?;
        self.writer = None;
        safe_remove(self.part_path())?;
        self.state = SinkState::Aborted;
        Ok(())
    }
}

/// Streams the artifact straight into a caller-owned writer such as stdout.
///
/// Bytes cannot be taken back once written, so this sink is not restartable.
pub struct StreamSink<W: Write + Send> {
    key: ArtifactKey,
    state: SinkState,
    writer: W,
}

impl<W: Write + Send> StreamSink<W> {
    pub fn new(key: ArtifactKey, writer: W) -> Self {
        Self {
            key,
            state: SinkState::NotStarted,
            writer,
        }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> ArtifactSink for StreamSink<W> {
    fn artifact_key(&self) -> &ArtifactKey {
        &self.key
    }

    fn state(&self) -> SinkState {
        self.state
    }

    fn begin_write(&mut self) -> QuarryResult<&mut dyn Write> {
        check_begin(self.state, &self.key)?;
        self.state = SinkState::Writing;
        Ok(&mut self.writer)
    }

    fn commit_write(&mut self) -> QuarryResult<()> {
        check_commit(self.state, &self.key)?;
        self.writer
            .flush()
            .with_context(|| format!("flushing output for {}", self.key))?;
        self.state = SinkState::Committed;
        Ok(())
    }

    fn abort_write(&mut self) -> QuarryResult<()> {
        check_abort(self.state, &self.key)?;
        self.state = SinkState::Aborted;
        Ok(())
    }

    fn is_restartable(&self) -> bool {
        false
    }
}

/// Receives the stored bytes of exactly one encoding, without decoding.
pub struct RawSink<S: ArtifactSink> {
    inner: S,
    target: ArtifactDescriptor,
}

impl<S: ArtifactSink> RawSink<S> {
    /// # Errors
    ///
    /// [`QuarryError::Configuration`] if `target` describes a different
    /// artifact than `inner`.
    pub fn new(inner: S, target: ArtifactDescriptor) -> QuarryResult<Self> {
        if target.key != *inner.artifact_key() {
            return Err(QuarryError::Configuration(format!(
                "raw sink for {} cannot receive {}",
                inner.artifact_key(),
                target
            )));
        }
        Ok(Self {
            inner,
            target,
        })
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: ArtifactSink> ArtifactSink for RawSink<S> {
    fn artifact_key(&self) -> &ArtifactKey {
        self.inner.artifact_key()
    }

    fn state(&self) -> SinkState {
        self.inner.state()
    }

    fn begin_write(&mut self) -> QuarryResult<&mut dyn Write> {
        self.inner.begin_write()
    }

    fn commit_write(&mut self) -> QuarryResult<()> {
        self.inner.commit_write()
    }

    fn abort_write(&mut self) -> QuarryResult<()> {
        self.inner.abort_write()
    }

    fn can_begin_write(&self) -> bool {
        self.inner.can_begin_write()
    }

    fn is_restartable(&self) -> bool {
        self.inner.is_restartable()
    }

    fn target_descriptor(&self) -> Option<&ArtifactDescriptor> {
        Some(&self.target)
    }
}
