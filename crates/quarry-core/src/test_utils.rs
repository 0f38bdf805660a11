use std::{
    collections::{BTreeSet, HashMap},
    io::Write,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
};

use quarry_dl::{
    error::DownloadError,
    transport::{FetchResponse, Transport, Validators},
};
use quarry_utils::cancel::CancellationToken;
use url::Url;

use crate::{
    artifact::{ArtifactDescriptor, ArtifactKey},
    error::TransferError,
    policy::TransferPolicy,
    repository::{ArtifactRepository, KeyPredicate},
};

/// Serves fixed bytes per URL; everything else is not found.
#[derive(Default)]
pub struct MapTransport {
    documents: Mutex<HashMap<String, Vec<u8>>>,
    requests: AtomicUsize,
}

impl MapTransport {
    pub fn serve(self, url: &str, body: &[u8]) -> Self {
        self.documents
            .lock()
            .unwrap()
            .insert(url.to_string(), body.to_vec());
        self
    }

    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    fn lookup(&self, url: &Url) -> Result<Vec<u8>, DownloadError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .unwrap()
            .get(url.as_str())
            .cloned()
            .ok_or_else(|| {
                DownloadError::NotFound {
                    url: url.to_string(),
                }
            })
    }
}

impl Transport for MapTransport {
    fn get(&self, url: &Url, _validators: &Validators) -> Result<FetchResponse, DownloadError> {
        Ok(FetchResponse::Content {
            body: self.lookup(url)?,
            etag: None,
            last_modified: None,
        })
    }

    fn download(&self, url: &Url, out: &mut dyn Write) -> Result<u64, DownloadError> {
        let body = self.lookup(url)?;
        out.write_all(&body)?;
        Ok(body.len() as u64)
    }
}

/// How a [`ScriptedRepository`] answers `fetch_raw`.
#[derive(Clone)]
pub enum Behavior {
    Serve,
    /// Writes part of the payload, then fails.
    Fail,
    /// The first `n` accesses ask for a mirror retry, later ones serve.
    MirrorRetry(usize),
    /// Every access asks for a mirror retry.
    AlwaysMirrorRetry,
    /// Writes part of the payload, cancels the token, then keeps writing.
    CancelDuring(CancellationToken),
}

/// In-memory repository with a fixed fetch behavior and an access counter.
pub struct ScriptedRepository {
    name: String,
    location: Url,
    payloads: Vec<(ArtifactDescriptor, Vec<u8>)>,
    behavior: Behavior,
    policy: Option<TransferPolicy>,
    accesses: AtomicUsize,
}

impl ScriptedRepository {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            location: Url::parse(&format!("https://{name}.example.org/")).unwrap(),
            payloads: Vec::new(),
            behavior: Behavior::Serve,
            policy: None,
            accesses: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, descriptor: ArtifactDescriptor, payload: &[u8]) -> Self {
        self.payloads.push((descriptor, payload.to_vec()));
        self
    }

    pub fn behaving(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    pub fn local(mut self) -> Self {
        self.policy = Some(TransferPolicy::Local);
        self
    }

    pub fn accesses(&self) -> usize {
        self.accesses.load(Ordering::SeqCst)
    }

    fn payload(&self, descriptor: &ArtifactDescriptor) -> Option<&[u8]> {
        self.payloads
            .iter()
            .find(|(d, _)| d == descriptor)
            .map(|(_, payload)| payload.as_slice())
    }

    fn failure(&self) -> TransferError {
        TransferError::Download {
            url: self.location.to_string(),
            source: DownloadError::HttpError {
                status: 500,
                url: self.location.to_string(),
            },
        }
    }
}

fn write(out: &mut dyn Write, bytes: &[u8]) -> Result<(), TransferError> {
    out.write_all(bytes).map_err(TransferError::Decode)
}

impl ArtifactRepository for ScriptedRepository {
    fn name(&self) -> &str {
        &self.name
    }

    fn location(&self) -> &Url {
        &self.location
    }

    fn transfer_policy(&self) -> TransferPolicy {
        self.policy
            .unwrap_or_else(|| TransferPolicy::for_location(&self.location))
    }

    fn query(&self, predicate: KeyPredicate<'_>) -> BTreeSet<ArtifactKey> {
        self.payloads
            .iter()
            .map(|(d, _)| d.key.clone())
            .filter(|key| predicate(key))
            .collect()
    }

    fn descriptors_for(&self, key: &ArtifactKey) -> Vec<ArtifactDescriptor> {
        self.payloads
            .iter()
            .filter(|(d, _)| d.key == *key)
            .map(|(d, _)| d.clone())
            .collect()
    }

    fn fetch_raw(
        &self,
        descriptor: &ArtifactDescriptor,
        out: &mut dyn Write,
    ) -> Result<u64, TransferError> {
        let access = self.accesses.fetch_add(1, Ordering::SeqCst) + 1;
        let payload = self
            .payload(descriptor)
            .ok_or_else(|| TransferError::Unavailable(descriptor.to_string()))?;
        let half = payload.len() / 2;

        match &self.behavior {
            Behavior::Serve => {}
            Behavior::Fail => {
                write(out, &payload[..half])?;
                return Err(self.failure());
            }
            Behavior::MirrorRetry(n) if access <= *n => {
                return Err(TransferError::MirrorRetry {
                    url: format!("{}mirror-{access}/", self.location),
                    reason: "connection reset".into(),
                });
            }
            Behavior::MirrorRetry(_) => {}
            Behavior::AlwaysMirrorRetry => {
                return Err(TransferError::MirrorRetry {
                    url: format!("{}mirror-{access}/", self.location),
                    reason: "connection reset".into(),
                });
            }
            Behavior::CancelDuring(token) => {
                write(out, &payload[..half])?;
                token.cancel();
                write(out, &payload[half..])?;
                return Ok(payload.len() as u64);
            }
        }

        write(out, payload)?;
        Ok(payload.len() as u64)
    }
}
